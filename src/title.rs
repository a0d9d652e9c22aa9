use slug::slugify;
use std::collections::HashSet;
use std::path::Path;

/// Derive a readable title from a file name: the extension is dropped and
/// underscores become spaces (`01_the_start.md` -> `01 the start`).
pub fn title_from_path(path: &Path) -> String {
    base_name(path).replace('_', " ")
}

/// File name without its extension.
pub fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Anchor-safe key for a base name.
pub fn anchor_key(base_name: &str) -> String {
    let slug = slugify(base_name);
    if slug.is_empty() {
        "section".to_string()
    } else {
        slug
    }
}

/// Hands out anchor keys that are unique within one combined document.
#[derive(Debug, Default)]
pub struct KeyAllocator {
    used: HashSet<String>,
}

impl KeyAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, base_name: &str) -> String {
        let key = anchor_key(base_name);
        if self.used.insert(key.clone()) {
            return key;
        }

        let mut n = 2;
        loop {
            let candidate = format!("{}-{}", key, n);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}
