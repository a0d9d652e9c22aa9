use anyhow::Result;
use chapter2pdf::{
    html_pdf_chain, merge_directory, pandoc_chain, run_combine, run_html, run_pdf, run_pdf_html, BatchReport,
    BookInfo, ChromiumProvider, PipelineOptions,
};
use clap::{Args as ClapArgs, Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "chapter2pdf")]
#[command(about = "CLI utility to turn a tree of Markdown chapters into styled HTML and PDF books")]
#[command(version = "0.1.0")]
struct Args {
    /// Time limit in seconds for each external tool run (0 disables it)
    #[arg(short = 't', long = "timeout", global = true, default_value = "120", value_parser = parse_timeout)]
    timeout: f64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ClapArgs)]
struct BookArgs {
    /// Title shown on the title page of the combined document
    #[arg(long = "title", default_value = "Collected Chapters")]
    title: String,

    /// Optional second line of the title page
    #[arg(long = "subtitle")]
    subtitle: Option<String>,

    /// Optional third line of the title page
    #[arg(long = "tagline")]
    tagline: Option<String>,

    /// Heading of the table of contents
    #[arg(long = "toc-heading", default_value = "Contents")]
    toc_heading: String,

    /// Value of the html lang attribute
    #[arg(long = "lang", default_value = "zh-CN")]
    lang: String,
}

impl BookArgs {
    fn book_info(&self) -> BookInfo {
        BookInfo {
            title: self.title.clone(),
            subtitle: self.subtitle.clone(),
            tagline: self.tagline.clone(),
            toc_heading: self.toc_heading.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Convert Markdown chapters to HTML pages plus a combined HTML book
    Html {
        /// Directory containing part0..part6
        #[arg(short = 's', long = "src-dir", default_value = "src")]
        src_dir: PathBuf,

        /// Output directory used to save files
        #[arg(short = 'o', long = "out-dir", default_value = "html_output")]
        out_dir: PathBuf,

        /// Don't build the combined document
        #[arg(long = "no-combine")]
        no_combine: bool,

        #[command(flatten)]
        book: BookArgs,
    },
    /// Convert Markdown chapters to PDF with pandoc
    Pdf {
        /// Directory containing part0..part6
        #[arg(short = 's', long = "src-dir", default_value = "src")]
        src_dir: PathBuf,

        /// Output directory used to save files
        #[arg(short = 'o', long = "out-dir", default_value = "pdf_output")]
        out_dir: PathBuf,

        /// Where to write the stylesheet handed to pandoc
        #[arg(long = "css", default_value = "pdf_style.css")]
        css: PathBuf,

        /// Don't merge the PDFs into a single file
        #[arg(long = "no-combine")]
        no_combine: bool,
    },
    /// Convert Markdown chapters to PDF through print-styled HTML
    PdfHtml {
        /// Directory containing part0..part6
        #[arg(short = 's', long = "src-dir", default_value = "src")]
        src_dir: PathBuf,

        /// Output directory used to save files
        #[arg(short = 'o', long = "out-dir", default_value = "pdf_output")]
        out_dir: PathBuf,

        /// Keep the intermediate HTML files (by default they are deleted once rendered)
        #[arg(short = 'k', long = "keep-html")]
        keep_html: bool,

        /// Don't fall back to headless Chromium when wkhtmltopdf and weasyprint fail
        #[arg(long = "no-browser")]
        no_browser: bool,

        /// Don't merge the PDFs into a single file
        #[arg(long = "no-combine")]
        no_combine: bool,

        #[arg(long = "lang", default_value = "zh-CN")]
        lang: String,
    },
    /// Rebuild the combined HTML book from an existing HTML output directory
    Combine {
        /// Directory produced by the html command
        #[arg(short = 'd', long = "dir", default_value = "html_output")]
        dir: PathBuf,

        #[command(flatten)]
        book: BookArgs,
    },
    /// Merge existing PDF files into a single document
    Merge {
        /// Directory containing PDF files to merge
        #[arg(short = 'd', long = "dir", default_value = "pdf_output")]
        input_dir: PathBuf,

        /// Output file path for the merged PDF
        #[arg(short = 'o', long = "output", default_value = "merged.pdf")]
        output_file: PathBuf,
    },
}

fn parse_timeout(s: &str) -> Result<f64, String> {
    let value = s.parse::<f64>().map_err(|_| "Not a number.")?;
    if value < 0.0 || !value.is_finite() {
        return Err("Must be zero or positive number.".to_string());
    }
    if Duration::try_from_secs_f64(value).is_err() {
        return Err("Timeout too large.".to_string());
    }
    Ok(value)
}

fn tool_timeout(seconds: f64) -> Option<Duration> {
    (seconds > 0.0).then(|| Duration::from_secs_f64(seconds))
}

fn report_done(report: &BatchReport) {
    if !report.failed.is_empty() {
        info!("{}", format!("{} file(s) failed, see errors above", report.failed.len()).yellow());
    }
    if let Some(combined) = &report.combined {
        info!("Combined output: {}", combined.display().to_string().green());
    }
}

async fn run(args: Args) -> Result<()> {
    let timeout = tool_timeout(args.timeout);

    match args.command {
        Commands::Html { src_dir, out_dir, no_combine, book } => {
            let options = PipelineOptions {
                src_dir,
                out_dir,
                combine: !no_combine,
                lang: book.lang.clone(),
                book: book.book_info(),
            };
            let report = run_html(&options).await?;
            report_done(&report);
            if let Some(combined) = &report.combined {
                info!("To convert to PDF, run: chapter2pdf pdf-html, or wkhtmltopdf {} output.pdf", combined.display());
            }
        }
        Commands::Pdf { src_dir, out_dir, css, no_combine } => {
            let options = PipelineOptions {
                src_dir,
                out_dir,
                combine: !no_combine,
                ..Default::default()
            };
            let chain = pandoc_chain(&css, timeout);
            let report = run_pdf(&options, &css, &chain).await?;
            report_done(&report);
        }
        Commands::PdfHtml { src_dir, out_dir, keep_html, no_browser, no_combine, lang } => {
            let options = PipelineOptions {
                src_dir,
                out_dir,
                combine: !no_combine,
                lang,
                ..Default::default()
            };
            let mut chain = html_pdf_chain(timeout);
            if !no_browser {
                chain = chain.with_provider(ChromiumProvider::default().with_timeout(timeout));
            }
            let report = run_pdf_html(&options, keep_html, &chain).await?;
            report_done(&report);
        }
        Commands::Combine { dir, book } => {
            run_combine(&dir, &book.book_info(), &book.lang).await?;
        }
        Commands::Merge { input_dir, output_file } => {
            merge_directory(&input_dir, &output_file).await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    // Chromium's protocol chatter is noisy even when rendering succeeds
    let filter = EnvFilter::from_default_env()
        .add_directive("chromiumoxide::conn=off".parse().unwrap())
        .add_directive("chromiumoxide::handler=off".parse().unwrap())
        .add_directive("chapter2pdf=info".parse().unwrap());

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("{}", format!("Error: {}", e).red());
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timeout() {
        assert_eq!(parse_timeout("2.5"), Ok(2.5));
        assert!(parse_timeout("-1").is_err());
        assert!(parse_timeout("abc").is_err());
        assert_eq!(parse_timeout("1e300"), Err("Timeout too large.".to_string()));
    }

    #[test]
    fn test_huge_timeout_is_rejected_by_cli() {
        assert!(Args::try_parse_from(["chapter2pdf", "--timeout", "1e300", "html"]).is_err());
    }

    #[test]
    fn test_zero_timeout_disables_limit() {
        assert_eq!(tool_timeout(0.0), None);
        assert_eq!(tool_timeout(1.5), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_cli_defaults() {
        let args = Args::try_parse_from(["chapter2pdf", "html"]).unwrap();
        assert_eq!(args.timeout, 120.0);
        match args.command {
            Commands::Html { src_dir, out_dir, no_combine, book } => {
                assert_eq!(src_dir, PathBuf::from("src"));
                assert_eq!(out_dir, PathBuf::from("html_output"));
                assert!(!no_combine);
                assert_eq!(book.lang, "zh-CN");
            }
            _ => panic!("expected html command"),
        }
    }

    #[test]
    fn test_cli_verify() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
