use scraper::{CaseSensitivity, ElementRef, Html, Node, Selector};

use crate::markdown::escape_html;
use crate::style::StyleVariant;

/// Where the fragment sits inside `<body>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyLayout {
    Bare,
    /// Wrapped in `<div class="container">`.
    Contained,
}

#[derive(Debug, Clone)]
pub struct PageStyle {
    pub variant: StyleVariant,
    pub layout: BodyLayout,
    pub lang: String,
}

impl PageStyle {
    pub fn screen(lang: impl Into<String>) -> Self {
        Self {
            variant: StyleVariant::Screen,
            layout: BodyLayout::Bare,
            lang: lang.into(),
        }
    }

    pub fn print(lang: impl Into<String>) -> Self {
        Self {
            variant: StyleVariant::Print,
            layout: BodyLayout::Contained,
            lang: lang.into(),
        }
    }
}

impl Default for PageStyle {
    fn default() -> Self {
        Self::screen("zh-CN")
    }
}

/// Embed an HTML fragment into a complete, self-styled document.
pub fn wrap_document(fragment: &str, title: &str, style: &PageStyle) -> String {
    let body = match style.layout {
        BodyLayout::Bare => format!("{}\n", fragment),
        BodyLayout::Contained => format!("<div class=\"container\">\n{}\n</div>\n", fragment),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="{lang}">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{title}</title>
<style>{css}</style>
</head>
<body>
{body}</body>
</html>
"#,
        lang = escape_html(&style.lang),
        title = escape_html(title),
        css = style.variant.css(),
        body = body,
    )
}

/// Pull the content back out of a document produced by [`wrap_document`].
///
/// Returns `None` when the input has no `<body>` element. A single wrapping
/// `div.container` is unwrapped.
pub fn extract_body(html: &str) -> Option<String> {
    if !html.to_ascii_lowercase().contains("<body") {
        return None;
    }

    let document = Html::parse_document(html);
    let body_selector = Selector::parse("body").ok()?;
    let body = document.select(&body_selector).next()?;

    let content = match sole_container(body) {
        Some(container) => container.inner_html(),
        None => body.inner_html(),
    };

    Some(content.trim().to_string())
}

fn sole_container(body: ElementRef<'_>) -> Option<ElementRef<'_>> {
    let mut found = None;
    for child in body.children() {
        match child.value() {
            Node::Text(text) if text.trim().is_empty() => {}
            Node::Comment(_) => {}
            Node::Element(el)
                if found.is_none()
                    && el.name() == "div"
                    && el.has_class("container", CaseSensitivity::CaseSensitive) =>
            {
                found = ElementRef::wrap(child);
            }
            _ => return None,
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_layout() {
        let html = wrap_document("<p>hi</p>", "Chapter 1", &PageStyle::screen("en"));
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<html lang=\"en\">"));
        assert!(html.contains("<title>Chapter 1</title>"));
        assert!(html.contains("<body>\n<p>hi</p>\n</body>"));
        assert!(!html.contains("class=\"container\""));
    }

    #[test]
    fn test_contained_layout() {
        let html = wrap_document("<p>hi</p>", "t", &PageStyle::print("en"));
        assert!(html.contains("<body>\n<div class=\"container\">\n<p>hi</p>\n</div>\n</body>"));
    }

    #[test]
    fn test_title_is_escaped() {
        let html = wrap_document("", "a <b> & c", &PageStyle::default());
        assert!(html.contains("<title>a &lt;b&gt; &amp; c</title>"));
    }

    #[test]
    fn test_wrap_is_deterministic() {
        let style = PageStyle::print("zh-CN");
        assert_eq!(wrap_document("<p>x</p>", "x", &style), wrap_document("<p>x</p>", "x", &style));
    }

    #[test]
    fn test_extract_bare_body() {
        let html = wrap_document("<h1>One</h1>\n<p>two</p>", "t", &PageStyle::screen("en"));
        assert_eq!(extract_body(&html).unwrap(), "<h1>One</h1>\n<p>two</p>");
    }

    #[test]
    fn test_extract_strips_container() {
        let html = wrap_document("<p>inside</p>", "t", &PageStyle::print("en"));
        assert_eq!(extract_body(&html).unwrap(), "<p>inside</p>");
    }

    #[test]
    fn test_extract_keeps_container_with_siblings() {
        let html = "<html><body><div class=\"container\">a</div><p>b</p></body></html>";
        let body = extract_body(html).unwrap();
        assert!(body.contains("<div class=\"container\">a</div>"));
        assert!(body.contains("<p>b</p>"));
    }

    #[test]
    fn test_extract_without_body_marker() {
        assert_eq!(extract_body("<p>loose fragment</p>"), None);
    }
}
