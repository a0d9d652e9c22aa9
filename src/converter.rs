use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::collector::SourceDocument;
use crate::document::{wrap_document, PageStyle};
use crate::fragment::Fragment;
use crate::markdown::markdown_to_html;
use crate::title::{base_name, title_from_path};

/// Map `source` under `src_dir` to the same relative location under
/// `out_dir`, with the extension replaced. Paths outside `src_dir` land
/// directly in `out_dir`.
pub fn mirror_path(source: &Path, src_dir: &Path, out_dir: &Path, extension: &str) -> PathBuf {
    match source.strip_prefix(src_dir) {
        Ok(rel) => out_dir.join(rel).with_extension(extension),
        Err(_) => flat_path(source, out_dir, extension),
    }
}

/// `out_dir/<base name>.<extension>`.
pub fn flat_path(source: &Path, out_dir: &Path, extension: &str) -> PathBuf {
    out_dir.join(format!("{}.{}", base_name(source), extension))
}

/// Converts one Markdown chapter into a standalone styled HTML page.
#[derive(Debug, Clone)]
pub struct HtmlConverter {
    src_dir: PathBuf,
    out_dir: PathBuf,
    style: PageStyle,
}

impl HtmlConverter {
    pub fn new(src_dir: impl Into<PathBuf>, out_dir: impl Into<PathBuf>, style: PageStyle) -> Self {
        Self {
            src_dir: src_dir.into(),
            out_dir: out_dir.into(),
            style,
        }
    }

    pub fn output_path(&self, source: &Path) -> PathBuf {
        mirror_path(source, &self.src_dir, &self.out_dir, "html")
    }

    /// Read, transform, wrap and write one chapter.
    pub async fn convert(&self, source: &Path) -> Result<Fragment> {
        let document = SourceDocument::read(source).await?;

        let html = markdown_to_html(&document.content);
        let title = title_from_path(&document.path);
        let page = wrap_document(&html, &title, &self.style);

        let output = self.output_path(&document.path);
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| anyhow!("Failed to create directory {}: {}", parent.display(), e))?;
        }

        fs::write(&output, page)
            .await
            .map_err(|e| anyhow!("Failed to write {}: {}", output.display(), e))?;

        debug!("Wrote {} ({} bytes of fragment)", output.display(), html.len());

        Ok(Fragment {
            key: base_name(&document.path),
            title,
            partition: document.partition,
            source: document.path,
            output,
            html,
        })
    }
}
