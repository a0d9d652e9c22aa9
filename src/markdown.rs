//! A deliberately small Markdown-to-HTML transformer.
//!
//! Only headers (levels 1-4), bold, italic, fenced and inline code, single
//! line block quotes and paragraphs are recognized. Rules are plain regex
//! substitutions applied in a fixed order, so a later rule sees the output
//! of the earlier ones. Source text is HTML-escaped before any rule runs.

use regex::{Captures, Regex};
use std::sync::LazyLock;

const CODE_OPEN: char = '\u{2}';
const CODE_CLOSE: char = '\u{3}';

/// Tags that mark a segment as already block-level during paragraphing.
const BLOCK_PREFIXES: &[&str] = &["<h1>", "<h2>", "<h3>", "<h4>", "<blockquote>", "<pre>", "<ul>", "<ol>"];

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(#{1,4}) (.*)$").expect("valid regex"));
static BOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("valid regex"));
static ITALIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*(.*?)\*").expect("valid regex"));
static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(.*?)```").expect("valid regex"));
static LANGUAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_+#.-]+$").expect("valid regex"));
static INLINE_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`(.*?)`").expect("valid regex"));
static QUOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^&gt; (.*)$").expect("valid regex"));
static BLANK_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n").expect("valid regex"));
static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("\u{2}CODE(\\d+)\u{3}").expect("valid regex"));

/// Escape the characters that would otherwise be read as markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Convert Markdown text into an HTML fragment.
pub fn markdown_to_html(source: &str) -> String {
    let normalized = source.replace("\r\n", "\n");
    let mut html = escape_html(&normalized);

    html = HEADER_RE
        .replace_all(&html, |caps: &Captures| {
            let level = caps[1].len();
            format!("<h{level}>{}</h{level}>", &caps[2])
        })
        .into_owned();

    html = BOLD_RE.replace_all(&html, "<strong>${1}</strong>").into_owned();
    html = ITALIC_RE.replace_all(&html, "<em>${1}</em>").into_owned();

    // Fenced blocks are parked behind placeholders so that neither inline
    // code nor paragraph splitting can reach inside them.
    let mut code_blocks = Vec::new();
    html = FENCE_RE
        .replace_all(&html, |caps: &Captures| {
            code_blocks.push(render_code_block(&caps[1]));
            format!("{}CODE{}{}", CODE_OPEN, code_blocks.len() - 1, CODE_CLOSE)
        })
        .into_owned();

    html = INLINE_CODE_RE.replace_all(&html, "<code>${1}</code>").into_owned();
    html = QUOTE_RE.replace_all(&html, "<blockquote>${1}</blockquote>").into_owned();

    let paragraphs = wrap_paragraphs(&html);

    PLACEHOLDER_RE
        .replace_all(&paragraphs, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| code_blocks.get(i))
                .cloned()
                .unwrap_or_default()
        })
        .into_owned()
}

fn render_code_block(inner: &str) -> String {
    let (language, body) = match inner.split_once('\n') {
        Some((first, rest)) => {
            let first = first.trim();
            if first.is_empty() {
                (None, rest)
            } else if LANGUAGE_RE.is_match(first) {
                (Some(first), rest)
            } else {
                (None, inner)
            }
        }
        None => (None, inner),
    };

    match language {
        Some(lang) => format!("<pre><code class=\"language-{}\">{}</code></pre>", lang, body),
        None => format!("<pre><code>{}</code></pre>", body),
    }
}

fn wrap_paragraphs(html: &str) -> String {
    BLANK_LINE_RE
        .split(html)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            if is_block(segment) {
                segment.to_string()
            } else {
                format!("<p>{}</p>", segment)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_block(segment: &str) -> bool {
    segment.starts_with(CODE_OPEN) || BLOCK_PREFIXES.iter().any(|tag| segment.starts_with(tag))
}
