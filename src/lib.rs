//! # chapter2pdf
//!
//! A CLI utility to turn a tree of Markdown chapters (`src/part0` ..
//! `src/part6`) into styled HTML pages and PDFs, and to merge them into a
//! single book with a title page and table of contents.
//!
//! ## Features
//!
//! - Small built-in Markdown to HTML conversion (headers, emphasis, code, quotes)
//! - PDF output through pandoc, wkhtmltopdf, weasyprint or headless Chromium
//! - Combined HTML and PDF books
//!
//! ## Usage
//!
//! ```bash
//! chapter2pdf html
//! chapter2pdf pdf-html --keep-html
//! ```

mod chromium;
mod collector;
mod combiner;
mod converter;
mod document;
mod error;
mod fragment;
mod markdown;
mod pdf_merger;
mod pipeline;
mod renderer;
mod style;
mod title;

pub use chromium::{ChromiumProvider, PdfOptions};
pub use collector::{collect_sources, sort_by_partition, PartitionIndex, SourceDocument, PARTITION_COUNT};
pub use combiner::{load_fragments_from_html, BookInfo, Combiner, COMBINED_HTML};
pub use converter::{flat_path, mirror_path, HtmlConverter};
pub use document::{extract_body, wrap_document, BodyLayout, PageStyle};
pub use error::{CollectError, ManifestError, RenderError};
pub use fragment::{Fragment, Manifest, MANIFEST_FILE, MANIFEST_VERSION};
pub use markdown::{escape_html, markdown_to_html};
pub use pdf_merger::PdfMerger;
pub use pipeline::{
    merge_directory, run_combine, run_html, run_pdf, run_pdf_html, BatchReport, PipelineOptions, COMBINED_PDF,
    INTERMEDIATE_DIR,
};
pub use renderer::{html_pdf_chain, pandoc_chain, Attempt, CommandProvider, RenderChain, RenderProvider, Rendered};
pub use style::StyleVariant;
pub use title::{anchor_key, base_name, title_from_path, KeyAllocator};
