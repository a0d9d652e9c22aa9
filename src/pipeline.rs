//! The batch jobs behind each subcommand.
//!
//! Every pipeline discovers `src/partN/*.md`, converts file by file, counts
//! successes, and then (optionally) builds one combined artifact from the
//! successes only. A single file failing never stops the batch; structural
//! problems (unparseable partition, no renderer installed) do.

use anyhow::{anyhow, Result};
use colored::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::collector::collect_sources;
use crate::combiner::{load_fragments_from_html, BookInfo, Combiner, COMBINED_HTML};
use crate::converter::{flat_path, HtmlConverter};
use crate::document::PageStyle;
use crate::error::ManifestError;
use crate::fragment::{Fragment, Manifest, MANIFEST_FILE};
use crate::pdf_merger::PdfMerger;
use crate::renderer::RenderChain;
use crate::style::StyleVariant;

pub const COMBINED_PDF: &str = "combined_all_parts.pdf";
pub const INTERMEDIATE_DIR: &str = "intermediate";

/// Settings shared by all conversion pipelines.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub src_dir: PathBuf,
    pub out_dir: PathBuf,
    pub combine: bool,
    pub lang: String,
    pub book: BookInfo,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            src_dir: PathBuf::from("src"),
            out_dir: PathBuf::from("html_output"),
            combine: true,
            lang: "zh-CN".to_string(),
            book: BookInfo::default(),
        }
    }
}

/// Outcome of one batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub total: usize,
    pub converted: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
    pub combined: Option<PathBuf>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.converted.len()
    }

    /// `succeeded/total`, e.g. `2/3`.
    pub fn tally(&self) -> String {
        format!("{}/{}", self.succeeded(), self.total)
    }

    fn record_failure(&mut self, path: &Path, reason: impl Into<String>) {
        let reason = reason.into();
        error!("{} Error converting {}: {}", "✗".red(), path.display(), reason);
        self.failed.push((path.to_path_buf(), reason));
    }
}

async fn discover(src_dir: &Path) -> Result<Vec<PathBuf>> {
    let files = collect_sources(src_dir, "md").await?;

    info!("Found {} markdown files to convert:", files.len());
    for file in &files {
        info!("  - {}", file.display().to_string().blue());
    }

    Ok(files)
}

async fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .await
        .map_err(|e| anyhow!("Failed to create output directory {}: {}", dir.display(), e))
}

/// Markdown to standalone HTML pages, then one combined HTML book.
pub async fn run_html(options: &PipelineOptions) -> Result<BatchReport> {
    info!("Converting content from {} to HTML", options.src_dir.display().to_string().green());
    ensure_dir(&options.out_dir).await?;

    let files = discover(&options.src_dir).await?;
    let converter = HtmlConverter::new(&options.src_dir, &options.out_dir, PageStyle::screen(&options.lang));

    let mut report = BatchReport {
        total: files.len(),
        ..Default::default()
    };
    let mut fragments = Vec::new();

    for md_file in &files {
        match converter.convert(md_file).await {
            Ok(fragment) => {
                info!("{} Converted {} to {}", "✓".green(), md_file.display(), fragment.output.display());
                report.converted.push(fragment.output.clone());
                fragments.push(fragment);
            }
            Err(e) => report.record_failure(md_file, e.to_string()),
        }
    }

    info!("Successfully converted: {} files", report.tally());

    if fragments.is_empty() {
        return Ok(report);
    }

    let manifest = Manifest::new(fragments);
    manifest.save(&options.out_dir.join(MANIFEST_FILE)).await?;

    if options.combine {
        info!("Creating combined HTML file...");
        let combiner = Combiner::new(options.book.clone(), PageStyle::screen(&options.lang));
        let combined = combiner
            .write(&manifest.fragments, &options.out_dir.join(COMBINED_HTML))
            .await?;
        report.combined = Some(combined);
    }

    Ok(report)
}

/// Markdown straight to PDF through the pandoc chain.
pub async fn run_pdf(options: &PipelineOptions, css_path: &Path, chain: &RenderChain) -> Result<BatchReport> {
    info!("Converting content from {} to PDF", options.src_dir.display().to_string().green());

    fs::write(css_path, StyleVariant::Pandoc.css())
        .await
        .map_err(|e| anyhow!("Failed to write stylesheet {}: {}", css_path.display(), e))?;
    info!("{} Created CSS style file {}", "✓".green(), css_path.display());

    ensure_dir(&options.out_dir).await?;
    let files = discover(&options.src_dir).await?;

    let mut report = BatchReport {
        total: files.len(),
        ..Default::default()
    };
    let mut claimed = claimed_outputs(&options.out_dir);

    for md_file in &files {
        let pdf_file = flat_path(md_file, &options.out_dir, "pdf");
        if !claimed.insert(pdf_file.clone()) {
            report.record_failure(md_file, format!("output {} is already taken", pdf_file.display()));
            continue;
        }

        info!("Converting: {}", md_file.display());
        match chain.render(md_file, &pdf_file).await? {
            Some(rendered) => {
                info!("{} Converted {} to {} ({})", "✓".green(), md_file.display(), pdf_file.display(), rendered.provider);
                report.converted.push(pdf_file);
            }
            None => report.record_failure(md_file, "all renderers failed"),
        }
    }

    info!("Successfully converted: {} files", report.tally());
    info!("Output directory: {}", options.out_dir.display());

    if options.combine {
        report.combined = combine_pdfs(&report.converted, &options.out_dir.join(COMBINED_PDF)).await;
    }

    Ok(report)
}

/// Markdown to print-styled HTML, then HTML to PDF through `chain`.
pub async fn run_pdf_html(options: &PipelineOptions, keep_html: bool, chain: &RenderChain) -> Result<BatchReport> {
    info!("Converting content from {} to PDF via HTML", options.src_dir.display().to_string().green());
    ensure_dir(&options.out_dir).await?;

    let files = discover(&options.src_dir).await?;
    let intermediate = options.out_dir.join(INTERMEDIATE_DIR);
    let converter = HtmlConverter::new(&options.src_dir, &intermediate, PageStyle::print(&options.lang));

    let mut report = BatchReport {
        total: files.len(),
        ..Default::default()
    };

    info!("Converting Markdown to HTML...");
    let mut fragments: Vec<Fragment> = Vec::new();
    for md_file in &files {
        match converter.convert(md_file).await {
            Ok(fragment) => {
                info!("{} Converted {} to HTML", "✓".green(), md_file.display());
                fragments.push(fragment);
            }
            Err(e) => report.record_failure(md_file, e.to_string()),
        }
    }

    info!("Converting HTML to PDF...");
    let mut claimed = claimed_outputs(&options.out_dir);
    for fragment in &fragments {
        let pdf_file = flat_path(&fragment.source, &options.out_dir, "pdf");
        if !claimed.insert(pdf_file.clone()) {
            report.record_failure(&fragment.source, format!("output {} is already taken", pdf_file.display()));
            continue;
        }

        info!("Converting: {}", fragment.output.display());
        match chain.render(&fragment.output, &pdf_file).await? {
            Some(rendered) => {
                info!("{} Converted {} to PDF using {}", "✓".green(), fragment.output.display(), rendered.provider);
                report.converted.push(pdf_file);
                if !keep_html {
                    if let Err(e) = fs::remove_file(&fragment.output).await {
                        warn!("Failed to remove {}: {}", fragment.output.display(), e);
                    }
                }
            }
            None => report.record_failure(&fragment.source, "all PDF engines failed"),
        }
    }

    if !keep_html {
        prune_empty_dirs(&intermediate).await;
    }

    info!("Successfully converted: {} files", report.tally());
    info!("Output directory: {}", options.out_dir.display());

    if options.combine {
        report.combined = combine_pdfs(&report.converted, &options.out_dir.join(COMBINED_PDF)).await;
    }

    Ok(report)
}

/// Rebuild the combined HTML book from a previous `html` run in `dir`.
///
/// Uses the manifest when it is present and readable; otherwise falls back
/// to discovering `partN/*.html` and extracting each page body.
pub async fn run_combine(dir: &Path, book: &BookInfo, lang: &str) -> Result<PathBuf> {
    let fragments = match Manifest::load(&dir.join(MANIFEST_FILE)).await {
        Ok(manifest) => {
            info!("Using manifest with {} fragments", manifest.fragments.len());
            manifest.fragments
        }
        Err(e) => {
            match &e {
                ManifestError::Read { .. } => info!("No usable manifest ({}), scanning HTML files", e),
                _ => warn!("Ignoring manifest: {}", e),
            }
            let files = collect_sources(dir, "html").await?;
            load_fragments_from_html(&files).await
        }
    };

    if fragments.is_empty() {
        return Err(anyhow!("No converted chapters found in '{}'", dir.display()));
    }

    let combiner = Combiner::new(book.clone(), PageStyle::screen(lang));
    combiner.write(&fragments, &dir.join(COMBINED_HTML)).await
}

/// Merge every PDF directly inside `input_dir` (sorted by file name) into
/// `output_file`. Returns the number of files merged.
pub async fn merge_directory(input_dir: &Path, output_file: &Path) -> Result<usize> {
    if !input_dir.exists() {
        return Err(anyhow!("Input directory '{}' does not exist", input_dir.display()));
    }

    info!("Scanning directory: {}", input_dir.display().to_string().green());

    let output_name = output_file.file_name();
    let mut entries = fs::read_dir(input_dir).await?;
    let mut pdf_files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_pdf = path.extension().is_some_and(|ext| ext == "pdf");
        let is_output = path.file_name() == output_name && path.parent() == output_file.parent();
        if is_pdf && !is_output && path.file_name().is_some_and(|n| n != COMBINED_PDF) {
            pdf_files.push(path);
        }
    }

    if pdf_files.is_empty() {
        return Err(anyhow!("No PDF files found in '{}'", input_dir.display()));
    }

    pdf_files.sort();

    info!("Found {} PDF files to merge:", pdf_files.len());
    for (i, path) in pdf_files.iter().enumerate() {
        info!("  {}: {}", i + 1, path.display().to_string().blue());
    }

    let mut merger = PdfMerger::new();
    for pdf_path in &pdf_files {
        if let Err(e) = merger.add_pdf(pdf_path).await {
            error!("Failed to add PDF {}: {}", pdf_path.display(), e);
        }
    }

    merger.save(output_file).await?;
    info!("{} Merged {} PDFs into: {}", "✓".green(), merger.len(), output_file.display().to_string().green());

    Ok(merger.len())
}

/// The combined artifact's path is reserved so no chapter can overwrite it.
fn claimed_outputs(out_dir: &Path) -> HashSet<PathBuf> {
    HashSet::from([out_dir.join(COMBINED_PDF)])
}

async fn combine_pdfs(pdf_files: &[PathBuf], combined: &Path) -> Option<PathBuf> {
    if pdf_files.is_empty() {
        return None;
    }

    info!("Attempting to create combined PDF...");
    let mut merger = PdfMerger::new();
    for pdf_file in pdf_files {
        if let Err(e) = merger.add_pdf(pdf_file).await {
            warn!("Failed to add PDF {}: {}", pdf_file.display(), e);
        }
    }

    if merger.is_empty() {
        warn!("No readable PDFs, skipping combined PDF creation");
        return None;
    }

    match merger.save(combined).await {
        Ok(_) => {
            info!("{} Created combined PDF: {}", "✓".green(), combined.display().to_string().blue());
            Some(combined.to_path_buf())
        }
        Err(e) => {
            warn!("Could not create combined PDF: {}", e);
            None
        }
    }
}

/// Remove `root` and any empty directories below it.
///
/// Directories still holding HTML for failed renders stay; that is logged
/// at debug level only.
async fn prune_empty_dirs(root: &Path) {
    let mut entries = match fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot list {}: {}", root.display(), e);
            return;
        }
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.is_dir() {
            if let Err(e) = fs::remove_dir(&path).await {
                debug!("Keeping {}: {}", path.display(), e);
            }
        }
    }

    if let Err(e) = fs::remove_dir(root).await {
        debug!("Keeping {}: {}", root.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally() {
        let report = BatchReport {
            total: 3,
            converted: vec![PathBuf::from("a"), PathBuf::from("b")],
            failed: vec![(PathBuf::from("c"), "unreadable".into())],
            combined: None,
        };
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.tally(), "2/3");
    }

    #[test]
    fn test_combined_pdf_is_reserved() {
        let mut claimed = claimed_outputs(Path::new("pdf_output"));
        assert!(!claimed.insert(PathBuf::from("pdf_output/combined_all_parts.pdf")));
        assert!(claimed.insert(PathBuf::from("pdf_output/ch1.pdf")));
    }

    #[tokio::test]
    async fn test_prune_keeps_directories_with_leftovers() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().join(INTERMEDIATE_DIR);
        std::fs::create_dir_all(root.join("part0")).unwrap();
        std::fs::create_dir_all(root.join("part1")).unwrap();
        std::fs::write(root.join("part1/failed.html"), "<p>x</p>").unwrap();

        prune_empty_dirs(&root).await;

        assert!(!root.join("part0").exists());
        assert!(root.join("part1/failed.html").exists());
    }

    #[tokio::test]
    async fn test_prune_missing_root_is_quiet() {
        let dir = tempfile::TempDir::new().unwrap();
        prune_empty_dirs(&dir.path().join("absent")).await;
        assert!(!dir.path().join("absent").exists());
    }
}
