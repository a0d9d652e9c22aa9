//! External renderers and the fallback chains that try them in order.

use futures_util::future::BoxFuture;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::RenderError;

/// Result of asking a single provider to render one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    Rendered,
    /// The provider ran but did not produce the output.
    Failed(String),
    /// The provider could not be started at all (tool not installed, browser
    /// missing).
    Unavailable(String),
}

/// Something that can turn an input file into an output file.
pub trait RenderProvider: Send + Sync {
    fn name(&self) -> &str;

    fn render<'a>(&'a self, input: &'a Path, output: &'a Path) -> BoxFuture<'a, Attempt>;
}

/// An external program driven by an argument template.
///
/// Arguments equal to `{input}` / `{output}` are replaced by the paths;
/// other arguments have the placeholders substituted textually.
#[derive(Debug, Clone)]
pub struct CommandProvider {
    name: String,
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandProvider {
    pub fn new<I, S>(name: impl Into<String>, program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        self.args
            .iter()
            .map(|arg| match arg.as_str() {
                "{input}" => input.as_os_str().to_os_string(),
                "{output}" => output.as_os_str().to_os_string(),
                other => other
                    .replace("{input}", &input.to_string_lossy())
                    .replace("{output}", &output.to_string_lossy())
                    .into(),
            })
            .collect()
    }

    async fn run(&self, input: &Path, output: &Path) -> Attempt {
        let mut command = Command::new(&self.program);
        command
            .args(self.build_args(input, output))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        debug!("Running {} {:?}", self.program, self.build_args(input, output));

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, command.output()).await {
                Ok(result) => result,
                Err(_) => return Attempt::Failed(format!("timed out after {}s", limit.as_secs_f64())),
            },
            None => command.output().await,
        };

        match result {
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Attempt::Unavailable(format!("'{}' not found on PATH", self.program))
            }
            Err(e) => Attempt::Failed(format!("failed to run '{}': {}", self.program, e)),
            Ok(out) if out.status.success() => {
                if output.exists() {
                    Attempt::Rendered
                } else {
                    Attempt::Failed(format!("exited successfully but {} was not created", output.display()))
                }
            }
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                Attempt::Failed(format!("{}: {}", out.status, tail(&stderr, 5)))
            }
        }
    }
}

impl RenderProvider for CommandProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn render<'a>(&'a self, input: &'a Path, output: &'a Path) -> BoxFuture<'a, Attempt> {
        Box::pin(self.run(input, output))
    }
}

fn tail(text: &str, lines: usize) -> String {
    let collected: Vec<&str> = text.trim_end().lines().collect();
    let start = collected.len().saturating_sub(lines);
    collected[start..].join(" | ")
}

/// Which provider produced a file, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub provider: String,
    pub output: PathBuf,
}

/// Providers tried in priority order until one succeeds.
pub struct RenderChain {
    name: String,
    providers: Vec<Box<dyn RenderProvider>>,
}

impl RenderChain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            providers: Vec::new(),
        }
    }

    pub fn with_provider(mut self, provider: impl RenderProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Render `input` into `output`.
    ///
    /// `Ok(None)` means every provider that could run failed for this file.
    /// An error means none of the providers could run at all, which no
    /// other input will change.
    pub async fn render(&self, input: &Path, output: &Path) -> Result<Option<Rendered>, RenderError> {
        let mut any_available = false;

        for (i, provider) in self.providers.iter().enumerate() {
            if i > 0 {
                info!("Trying {} for {}...", provider.name(), input.display());
            }

            match provider.render(input, output).await {
                Attempt::Rendered => {
                    return Ok(Some(Rendered {
                        provider: provider.name().to_string(),
                        output: output.to_path_buf(),
                    }));
                }
                Attempt::Failed(reason) => {
                    any_available = true;
                    warn!("{} failed on {}: {}", provider.name(), input.display(), reason);
                }
                Attempt::Unavailable(reason) => {
                    debug!("{} unavailable: {}", provider.name(), reason);
                }
            }
        }

        if any_available {
            Ok(None)
        } else {
            Err(RenderError::NoProviderAvailable {
                chain: self.name.clone(),
                tried: self.provider_names().join(", "),
            })
        }
    }
}

/// pandoc with the wkhtmltopdf engine and the generated stylesheet, then
/// plain pandoc as a fallback.
pub fn pandoc_chain(css: &Path, timeout: Option<Duration>) -> RenderChain {
    let styled = CommandProvider::new(
        "pandoc (wkhtmltopdf)",
        "pandoc",
        [
            "{input}".to_string(),
            "-o".to_string(),
            "{output}".to_string(),
            "--pdf-engine=wkhtmltopdf".to_string(),
            format!("--css={}", css.display()),
            "--toc".to_string(),
            "--toc-depth=3".to_string(),
            "--variable".to_string(),
            "geometry:margin=1in".to_string(),
            "--variable".to_string(),
            "fontsize=12pt".to_string(),
            "--variable".to_string(),
            "documentclass=article".to_string(),
            "--variable".to_string(),
            "mainfont=SimSun".to_string(),
            "--variable".to_string(),
            "CJKmainfont=SimSun".to_string(),
        ],
    )
    .with_timeout(timeout);

    let basic = CommandProvider::new(
        "pandoc (basic)",
        "pandoc",
        [
            "{input}",
            "-o",
            "{output}",
            "--toc",
            "--toc-depth=3",
            "--variable",
            "geometry:margin=1in",
            "--variable",
            "fontsize=12pt",
        ],
    )
    .with_timeout(timeout);

    RenderChain::new("pandoc").with_provider(styled).with_provider(basic)
}

/// wkhtmltopdf, then weasyprint, for print-styled HTML input.
pub fn html_pdf_chain(timeout: Option<Duration>) -> RenderChain {
    let wkhtmltopdf = CommandProvider::new(
        "wkhtmltopdf",
        "wkhtmltopdf",
        [
            "--enable-local-file-access",
            "--print-media-type",
            "--page-size",
            "A4",
            "--margin-top",
            "2cm",
            "--margin-bottom",
            "2cm",
            "--margin-left",
            "1.5cm",
            "--margin-right",
            "1.5cm",
            "--encoding",
            "UTF-8",
            "--minimum-font-size",
            "12",
            "{input}",
            "{output}",
        ],
    )
    .with_timeout(timeout);

    let weasyprint = CommandProvider::new("weasyprint", "weasyprint", ["{input}", "{output}"]).with_timeout(timeout);

    RenderChain::new("html-to-pdf").with_provider(wkhtmltopdf).with_provider(weasyprint)
}
