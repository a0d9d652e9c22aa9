//! End-to-end runs of the batch pipelines against scratch source trees.
//!
//! External renderers are replaced by in-process providers so these tests
//! never need pandoc, wkhtmltopdf, weasyprint or a browser.

use chapter2pdf::{
    merge_directory, run_combine, run_html, run_pdf, run_pdf_html, Attempt, BookInfo, Manifest, PipelineOptions,
    RenderChain, RenderProvider, COMBINED_HTML, COMBINED_PDF, INTERMEDIATE_DIR, MANIFEST_FILE,
};
use futures_util::future::BoxFuture;
use lopdf::{dictionary, Document, Object};
use rstest::rstest;
use scraper::{Html, Selector};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_source(root: &Path, rel: &str, content: &[u8]) -> PathBuf {
    let path = root.join("src").join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();
    path
}

fn options(root: &Path, out: &str) -> PipelineOptions {
    PipelineOptions {
        src_dir: root.join("src"),
        out_dir: root.join(out),
        combine: true,
        lang: "en".to_string(),
        book: BookInfo {
            title: "Test Book".to_string(),
            ..Default::default()
        },
    }
}

fn one_page_pdf() -> Document {
    let mut doc = Document::with_version("1.4");
    let catalog_id = doc.new_object_id();
    let pages_id = doc.new_object_id();
    let page_id = doc.new_object_id();

    doc.objects.insert(
        page_id,
        dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }
        .into(),
    );
    doc.objects.insert(
        pages_id,
        dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1_i64,
        }
        .into(),
    );
    doc.objects.insert(
        catalog_id,
        dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        }
        .into(),
    );
    doc.trailer.set("Root", catalog_id);
    doc
}

/// Writes a one-page PDF unless the input name contains `fail`.
struct FakePdfProvider;

impl RenderProvider for FakePdfProvider {
    fn name(&self) -> &str {
        "fake-pdf"
    }

    fn render<'a>(&'a self, input: &'a Path, output: &'a Path) -> BoxFuture<'a, Attempt> {
        Box::pin(async move {
            if input.file_name().is_some_and(|n| n.to_string_lossy().contains("fail")) {
                return Attempt::Failed("refusing".to_string());
            }
            match one_page_pdf().save(output) {
                Ok(_) => Attempt::Rendered,
                Err(e) => Attempt::Failed(e.to_string()),
            }
        })
    }
}

struct MissingTool;

impl RenderProvider for MissingTool {
    fn name(&self) -> &str {
        "missing"
    }

    fn render<'a>(&'a self, _input: &'a Path, _output: &'a Path) -> BoxFuture<'a, Attempt> {
        Box::pin(async { Attempt::Unavailable("not installed".to_string()) })
    }
}

fn visible_text(html: &str) -> String {
    Html::parse_fragment(html)
        .root_element()
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn body_text(page: &str) -> String {
    let document = Html::parse_document(page);
    let body = Selector::parse("body").unwrap();
    let text = document.select(&body).next().unwrap().text().collect::<String>();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[tokio::test]
async fn test_html_pipeline_tolerates_partial_failure() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "part1/02_second.md", b"# Second\n\nmore text");
    write_source(dir.path(), "part0/01_first.md", b"# First\n\n**bold** start");
    write_source(dir.path(), "part0/03_broken.md", &[0xff, 0xfe, 0x00, 0xc3]);

    let opts = options(dir.path(), "html_output");
    let report = run_html(&opts).await.unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(report.tally(), "2/3");
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].0.ends_with("part0/03_broken.md"));

    let out = &opts.out_dir;
    assert!(out.join("part0/01_first.html").exists());
    assert!(out.join("part1/02_second.html").exists());
    assert!(!out.join("part0/03_broken.html").exists());

    let combined = std::fs::read_to_string(out.join(COMBINED_HTML)).unwrap();
    assert_eq!(report.combined, Some(out.join(COMBINED_HTML)));
    assert!(combined.contains("<div id=\"01-first\">"));
    assert!(combined.contains("<div id=\"02-second\">"));
    assert!(!combined.contains("broken"));

    let first = combined.find("<div id=\"01-first\">").unwrap();
    let second = combined.find("<div id=\"02-second\">").unwrap();
    assert!(first < second);

    let manifest = Manifest::load(&out.join(MANIFEST_FILE)).await.unwrap();
    let keys: Vec<_> = manifest.fragments.iter().map(|f| f.key.as_str()).collect();
    assert_eq!(keys, vec!["01_first", "02_second"]);
}

#[tokio::test]
async fn test_html_pipeline_without_combine() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "part0/a.md", b"alpha");

    let mut opts = options(dir.path(), "html_output");
    opts.combine = false;
    let report = run_html(&opts).await.unwrap();

    assert_eq!(report.tally(), "1/1");
    assert_eq!(report.combined, None);
    assert!(!opts.out_dir.join(COMBINED_HTML).exists());
    assert!(opts.out_dir.join(MANIFEST_FILE).exists());
}

#[tokio::test]
async fn test_missing_source_dir_is_fatal() {
    let dir = TempDir::new().unwrap();
    let opts = options(dir.path(), "html_output");
    let err = run_html(&opts).await.unwrap_err();
    assert!(err.to_string().contains("does not exist"));
}

#[tokio::test]
async fn test_combine_from_disk_preserves_visible_text() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "part0/one.md", b"# One\n\nFirst *chapter* text.\n\n> a quote");
    write_source(dir.path(), "part2/two.md", b"## Two\n\n```\ncode  block\n\nline\n```\n\nClosing `x < y`.");

    let opts = options(dir.path(), "html_output");
    run_html(&opts).await.unwrap();

    // Force the HTML discovery path instead of the manifest.
    std::fs::remove_file(opts.out_dir.join(MANIFEST_FILE)).unwrap();
    std::fs::remove_file(opts.out_dir.join(COMBINED_HTML)).unwrap();

    let combined_path = run_combine(&opts.out_dir, &opts.book, "en").await.unwrap();
    let combined = std::fs::read_to_string(&combined_path).unwrap();
    let document = Html::parse_document(&combined);

    let mut combined_text = Vec::new();
    let mut source_text = Vec::new();
    for (key, rel) in [("one", "part0/one.html"), ("two", "part2/two.html")] {
        let selector = Selector::parse(&format!("div#{key}")).unwrap();
        let section = document.select(&selector).next().unwrap();
        combined_text.push(visible_text(&section.inner_html()));

        let page = std::fs::read_to_string(opts.out_dir.join(rel)).unwrap();
        source_text.push(body_text(&page));
    }

    assert_eq!(combined_text.join(" "), source_text.join(" "));
    assert!(source_text[1].contains("x < y"));
}

#[tokio::test]
async fn test_combine_prefers_manifest() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "part0/one.md", b"from source");

    let opts = options(dir.path(), "html_output");
    run_html(&opts).await.unwrap();

    // The standalone page is gone but the manifest still carries the fragment.
    std::fs::remove_file(opts.out_dir.join("part0/one.html")).unwrap();

    let book = BookInfo {
        title: "Rebuilt".to_string(),
        ..Default::default()
    };
    let path = run_combine(&opts.out_dir, &book, "en").await.unwrap();
    let combined = std::fs::read_to_string(path).unwrap();
    assert!(combined.contains("<p>from source</p>"));
    assert!(combined.contains("<title>Rebuilt</title>"));
}

#[rstest]
#[case::future_version(r#"{"version": 7, "fragments": []}"#)]
#[case::malformed_json("{ not json")]
#[tokio::test]
async fn test_combine_falls_back_when_manifest_unusable(#[case] manifest: &str) {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "part1/hello.md", b"hello");

    let opts = options(dir.path(), "html_output");
    run_html(&opts).await.unwrap();
    std::fs::write(opts.out_dir.join(MANIFEST_FILE), manifest).unwrap();
    std::fs::remove_file(opts.out_dir.join(COMBINED_HTML)).unwrap();

    let path = run_combine(&opts.out_dir, &opts.book, "en").await.unwrap();
    let combined = std::fs::read_to_string(path).unwrap();
    assert!(combined.contains("<div id=\"hello\">"));
    assert!(combined.contains("<p>hello</p>"));
}

#[tokio::test]
async fn test_combine_with_nothing_to_do() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("html_output")).unwrap();
    assert!(run_combine(&dir.path().join("html_output"), &BookInfo::default(), "en").await.is_err());
}

#[tokio::test]
async fn test_pdf_pipeline_with_fake_renderer() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "part0/a.md", b"# A");
    write_source(dir.path(), "part1/fail_b.md", b"# B");
    write_source(dir.path(), "part1/c.md", b"# C");

    let opts = options(dir.path(), "pdf_output");
    let css = dir.path().join("pdf_style.css");
    let chain = RenderChain::new("fake").with_provider(MissingTool).with_provider(FakePdfProvider);

    let report = run_pdf(&opts, &css, &chain).await.unwrap();

    assert_eq!(report.tally(), "2/3");
    assert!(std::fs::read_to_string(&css).unwrap().contains("font-family"));
    assert_eq!(
        report.converted,
        vec![opts.out_dir.join("a.pdf"), opts.out_dir.join("c.pdf")]
    );

    let combined = report.combined.unwrap();
    assert_eq!(combined, opts.out_dir.join(COMBINED_PDF));
    assert_eq!(Document::load(&combined).unwrap().get_pages().len(), 2);
}

#[tokio::test]
async fn test_pdf_pipeline_without_any_renderer_aborts() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "part0/a.md", b"# A");

    let opts = options(dir.path(), "pdf_output");
    let chain = RenderChain::new("empty").with_provider(MissingTool);
    let err = run_pdf(&opts, &dir.path().join("pdf_style.css"), &chain).await.unwrap_err();
    assert!(err.to_string().contains("No renderer available"));
}

#[tokio::test]
async fn test_pdf_html_pipeline_cleans_intermediates() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "part0/a.md", b"# A\n\ntext");
    write_source(dir.path(), "part3/fail_z.md", b"# Z");

    let opts = options(dir.path(), "pdf_output");
    let chain = RenderChain::new("fake").with_provider(FakePdfProvider);
    let report = run_pdf_html(&opts, false, &chain).await.unwrap();

    assert_eq!(report.tally(), "1/2");
    assert!(opts.out_dir.join("a.pdf").exists());

    let intermediate = opts.out_dir.join(INTERMEDIATE_DIR);
    assert!(!intermediate.join("part0/a.html").exists());
    // A failed render leaves its HTML behind for inspection.
    let leftover = std::fs::read_to_string(intermediate.join("part3/fail_z.html")).unwrap();
    assert!(leftover.contains("<div class=\"container\">"));
    assert_eq!(report.combined, Some(opts.out_dir.join(COMBINED_PDF)));
}

#[tokio::test]
async fn test_pdf_html_pipeline_keeps_html_on_request() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "part0/a.md", b"# A");

    let mut opts = options(dir.path(), "pdf_output");
    opts.combine = false;
    let chain = RenderChain::new("fake").with_provider(FakePdfProvider);
    let report = run_pdf_html(&opts, true, &chain).await.unwrap();

    assert_eq!(report.tally(), "1/1");
    assert_eq!(report.combined, None);
    assert!(opts.out_dir.join(INTERMEDIATE_DIR).join("part0/a.html").exists());
}

#[tokio::test]
async fn test_merge_directory_skips_combined_output() {
    let dir = TempDir::new().unwrap();
    let pdfs = dir.path().join("pdf_output");
    std::fs::create_dir_all(&pdfs).unwrap();
    for name in ["b.pdf", "a.pdf", COMBINED_PDF] {
        one_page_pdf().save(pdfs.join(name)).unwrap();
    }
    std::fs::write(pdfs.join("notes.txt"), "ignore me").unwrap();

    let output = dir.path().join("merged.pdf");
    let merged = merge_directory(&pdfs, &output).await.unwrap();

    assert_eq!(merged, 2);
    assert_eq!(Document::load(&output).unwrap().get_pages().len(), 2);
}

#[tokio::test]
async fn test_merge_directory_requires_pdfs() {
    let dir = TempDir::new().unwrap();
    assert!(merge_directory(&dir.path().join("missing"), &dir.path().join("m.pdf")).await.is_err());
    assert!(merge_directory(dir.path(), &dir.path().join("m.pdf")).await.is_err());
}
