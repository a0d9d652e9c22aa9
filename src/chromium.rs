use anyhow::{anyhow, Result};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::{Browser, BrowserConfig};
use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::task::JoinHandle;
use tracing::{debug, error};
use url::Url;

use crate::renderer::{Attempt, RenderProvider};

const CM_PER_INCH: f64 = 2.54;

/// Page geometry handed to Chromium's print-to-PDF, in inches.
#[derive(Debug, Clone)]
pub struct PdfOptions {
    pub scale: f64,
    pub paper_width: f64,
    pub paper_height: f64,
    pub margin_top: f64,
    pub margin_right: f64,
    pub margin_bottom: f64,
    pub margin_left: f64,
    pub print_background: bool,
}

impl Default for PdfOptions {
    /// A4 with 2cm top/bottom and 1.5cm side margins.
    fn default() -> Self {
        Self {
            scale: 1.0,
            paper_width: 21.0 / CM_PER_INCH,
            paper_height: 29.7 / CM_PER_INCH,
            margin_top: 2.0 / CM_PER_INCH,
            margin_right: 1.5 / CM_PER_INCH,
            margin_bottom: 2.0 / CM_PER_INCH,
            margin_left: 1.5 / CM_PER_INCH,
            print_background: true,
        }
    }
}

impl PdfOptions {
    fn params(&self) -> PrintToPdfParams {
        PrintToPdfParams {
            scale: Some(self.scale),
            paper_width: Some(self.paper_width),
            paper_height: Some(self.paper_height),
            margin_top: Some(self.margin_top),
            margin_right: Some(self.margin_right),
            margin_bottom: Some(self.margin_bottom),
            margin_left: Some(self.margin_left),
            print_background: Some(self.print_background),
            prefer_css_page_size: Some(true),
            ..Default::default()
        }
    }
}

/// Prints local HTML files to PDF through a headless Chromium.
///
/// A browser is launched per file and closed afterwards; if it cannot be
/// launched the provider reports itself unavailable.
#[derive(Debug, Clone)]
pub struct ChromiumProvider {
    pdf_options: PdfOptions,
    settle: Duration,
    timeout: Option<Duration>,
}

impl ChromiumProvider {
    pub fn new(pdf_options: PdfOptions) -> Self {
        Self {
            pdf_options,
            settle: Duration::from_millis(500),
            timeout: None,
        }
    }

    /// Bounds browser launch and printing, each on its own.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    async fn launch(&self) -> Result<(Browser, JoinHandle<()>)> {
        let config = BrowserConfig::builder()
            .build()
            .map_err(|e| anyhow!("Failed to create browser config: {}", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| anyhow!("Failed to launch browser: {}", e))?;

        let handle = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if let Err(err) = h {
                    let err_str = err.to_string();
                    if !err_str.contains("data did not match any variant")
                        && !err_str.contains("untagged enum Message")
                    {
                        error!("Browser handler error: {}", err);
                    } else {
                        debug!("Chrome protocol message ignored: {}", err);
                    }
                }
            }
        });

        Ok((browser, handle))
    }

    async fn print(&self, browser: &Browser, input: &Path, output: &Path) -> Result<()> {
        let absolute = fs::canonicalize(input)
            .await
            .map_err(|e| anyhow!("Failed to resolve {}: {}", input.display(), e))?;
        let url = Url::from_file_path(&absolute)
            .map_err(|_| anyhow!("Cannot build file URL for {}", absolute.display()))?;

        let page = browser
            .new_page(url.as_str())
            .await
            .map_err(|e| anyhow!("Failed to open {}: {}", url, e))?;

        page.wait_for_navigation()
            .await
            .map_err(|e| anyhow!("Failed to wait for navigation: {}", e))?;

        tokio::time::sleep(self.settle).await;

        let pdf_data = page
            .pdf(self.pdf_options.params())
            .await
            .map_err(|e| anyhow!("Failed to generate PDF: {}", e))?;

        fs::write(output, pdf_data)
            .await
            .map_err(|e| anyhow!("Failed to write PDF to {}: {}", output.display(), e))?;

        Ok(())
    }

    async fn run(&self, input: &Path, output: &Path) -> Attempt {
        let (mut browser, handle) = match within(self.timeout, self.launch()).await {
            Ok(Ok(launched)) => launched,
            Ok(Err(e)) => return Attempt::Unavailable(e.to_string()),
            Err(limit) => {
                return Attempt::Failed(format!("timed out after {}s launching browser", limit.as_secs_f64()))
            }
        };

        let result = within(self.timeout, self.print(&browser, input, output)).await;

        browser.close().await.ok();
        handle.abort();

        match result {
            Ok(Ok(())) => Attempt::Rendered,
            Ok(Err(e)) => Attempt::Failed(e.to_string()),
            Err(limit) => Attempt::Failed(format!("timed out after {}s printing {}", limit.as_secs_f64(), input.display())),
        }
    }
}

/// Awaits `fut`, giving up once `limit` has passed.
async fn within<F: Future>(limit: Option<Duration>, fut: F) -> Result<F::Output, Duration> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| limit),
        None => Ok(fut.await),
    }
}

impl Default for ChromiumProvider {
    fn default() -> Self {
        Self::new(PdfOptions::default())
    }
}

impl RenderProvider for ChromiumProvider {
    fn name(&self) -> &str {
        "chromium"
    }

    fn render<'a>(&'a self, input: &'a Path, output: &'a Path) -> BoxFuture<'a, Attempt> {
        Box::pin(self.run(input, output))
    }
}
