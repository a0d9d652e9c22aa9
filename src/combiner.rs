use anyhow::{anyhow, Result};
use colored::*;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use crate::collector::PartitionIndex;
use crate::document::{extract_body, wrap_document, PageStyle};
use crate::fragment::Fragment;
use crate::markdown::escape_html;
use crate::title::{base_name, title_from_path, KeyAllocator};

pub const COMBINED_HTML: &str = "combined_all_parts.html";

/// Title page and table-of-contents wording of a combined document.
#[derive(Debug, Clone)]
pub struct BookInfo {
    pub title: String,
    pub subtitle: Option<String>,
    pub tagline: Option<String>,
    pub toc_heading: String,
}

impl Default for BookInfo {
    fn default() -> Self {
        Self {
            title: "Collected Chapters".to_string(),
            subtitle: None,
            tagline: None,
            toc_heading: "Contents".to_string(),
        }
    }
}

/// Joins converted chapters into one document with a title page and a
/// linked table of contents.
#[derive(Debug, Clone)]
pub struct Combiner {
    book: BookInfo,
    style: PageStyle,
}

impl Combiner {
    pub fn new(book: BookInfo, style: PageStyle) -> Self {
        Self { book, style }
    }

    pub fn render(&self, fragments: &[Fragment]) -> String {
        let mut keys = KeyAllocator::new();
        let anchors: Vec<String> = fragments.iter().map(|f| keys.allocate(&f.key)).collect();

        let mut content = self.title_page();

        content.push_str("<div class=\"toc\">\n");
        let _ = writeln!(content, "<h2>{}</h2>", escape_html(&self.book.toc_heading));
        content.push_str("<ul>\n");
        for (fragment, anchor) in fragments.iter().zip(&anchors) {
            let _ = writeln!(
                content,
                "<li><a href=\"#{}\">{}</a></li>",
                anchor,
                escape_html(&fragment.title)
            );
        }
        content.push_str("</ul>\n</div>\n");

        for (fragment, anchor) in fragments.iter().zip(&anchors) {
            let _ = writeln!(content, "<div id=\"{}\">", anchor);
            content.push_str(&fragment.html);
            content.push_str("\n</div>\n<div class=\"page-break\"></div>\n");
        }

        wrap_document(content.trim_end(), &self.book.title, &self.style)
    }

    pub async fn write(&self, fragments: &[Fragment], path: &Path) -> Result<PathBuf> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| anyhow!("Failed to create directory {}: {}", parent.display(), e))?;
        }

        fs::write(path, self.render(fragments))
            .await
            .map_err(|e| anyhow!("Failed to write combined document {}: {}", path.display(), e))?;

        info!(
            "{} Created combined HTML with {} sections: {}",
            "✓".green(),
            fragments.len(),
            path.display().to_string().blue()
        );
        Ok(path.to_path_buf())
    }

    fn title_page(&self) -> String {
        let mut page = String::from("<div class=\"title-page\">\n");
        let _ = writeln!(page, "<h1>{}</h1>", escape_html(&self.book.title));
        if let Some(subtitle) = &self.book.subtitle {
            let _ = writeln!(page, "<h2>{}</h2>", escape_html(subtitle));
        }
        if let Some(tagline) = &self.book.tagline {
            let _ = writeln!(page, "<h3>{}</h3>", escape_html(tagline));
        }
        page.push_str("</div>\n<div class=\"page-break\"></div>\n");
        page
    }
}

/// Rebuild fragments from previously written standalone pages.
///
/// Files that cannot be read, sit outside a `partN` directory, or have no
/// `<body>` are skipped with a warning.
pub async fn load_fragments_from_html(paths: &[PathBuf]) -> Vec<Fragment> {
    let mut fragments = Vec::new();

    for path in paths {
        let partition = match PartitionIndex::from_path(path) {
            Ok(p) => p,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        let content = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) => {
                warn!("Error reading {}: {}", path.display(), e);
                continue;
            }
        };

        let Some(html) = extract_body(&content) else {
            warn!("No <body> found in {}, skipping", path.display());
            continue;
        };

        fragments.push(Fragment {
            key: base_name(path),
            title: title_from_path(path),
            partition,
            source: path.clone(),
            output: path.clone(),
            html,
        });
    }

    fragments
}
