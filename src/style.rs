//! Stylesheets shared by every generated document.
//!
//! There is one rule set; variants only add the parts that differ between
//! reading on screen, printing through an HTML-to-PDF engine, and the
//! standalone sheet handed to pandoc.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleVariant {
    /// Browser reading, with print tweaks under `@media print`.
    Screen,
    /// Input to wkhtmltopdf / weasyprint / Chromium: A4 page box, full-width container.
    Print,
    /// The external `pdf_style.css` passed to pandoc.
    Pandoc,
}

const FONT_STACK: &str = r#""Times New Roman", "SimSun", "Microsoft YaHei", "WenQuanYi Micro Hei", serif"#;

const BLOCK_RULES: &str = r#"
h1, h2, h3, h4, h5, h6 {
    font-family: "Times New Roman", "SimSun", "Microsoft YaHei", serif;
    color: #2c3e50;
    margin-top: 2em;
    margin-bottom: 1em;
    font-weight: bold;
    page-break-after: avoid;
}

h1 {
    font-size: 18pt;
    color: #c0392b;
    border-bottom: 3px solid #e74c3c;
    padding-bottom: 0.5em;
    text-align: center;
    margin-top: 1em;
}

h2 {
    font-size: 16pt;
    color: #34495e;
    border-left: 4px solid #3498db;
    padding-left: 1em;
    background-color: #f8f9fa;
    padding-top: 0.5em;
    padding-bottom: 0.5em;
}

h3 {
    font-size: 14pt;
    color: #7f8c8d;
    font-style: italic;
}

h4 {
    font-size: 13pt;
    color: #95a5a6;
}

p {
    margin-bottom: 1.2em;
    text-indent: 2em;
    orphans: 2;
    widows: 2;
}

blockquote {
    border-left: 4px solid #bdc3c7;
    padding-left: 1.5em;
    margin-left: 0;
    margin-right: 0;
    font-style: italic;
    color: #7f8c8d;
    background-color: #f8f9fa;
    padding-top: 0.5em;
    padding-bottom: 0.5em;
}

code {
    background-color: #f8f9fa;
    padding: 0.2em 0.4em;
    border-radius: 3px;
    font-family: "Courier New", monospace;
    font-size: 0.9em;
    border: 1px solid #e9ecef;
}

pre {
    background-color: #f8f9fa;
    padding: 1em;
    border-radius: 5px;
    overflow-x: auto;
    border: 1px solid #e9ecef;
    font-family: "Courier New", monospace;
    font-size: 0.9em;
    line-height: 1.4;
}

pre code {
    background: none;
    padding: 0;
    border: none;
}

table {
    border-collapse: collapse;
    width: 100%;
    margin: 1em 0;
    font-size: 11pt;
}

th, td {
    border: 1px solid #ddd;
    padding: 0.75em;
    text-align: left;
}

th {
    background-color: #f8f9fa;
    font-weight: bold;
    color: #2c3e50;
}

ul, ol {
    margin-bottom: 1em;
    padding-left: 2em;
}

li {
    margin-bottom: 0.5em;
}

.toc {
    page-break-after: always;
    background-color: #f8f9fa;
    padding: 2em;
    border-radius: 10px;
    margin-bottom: 2em;
}

.toc h2 {
    color: #c0392b;
    border: none;
    background: none;
    padding: 0;
    text-align: center;
    margin-bottom: 1.5em;
}

.toc ul {
    list-style: none;
    padding-left: 0;
}

.toc li {
    margin-bottom: 0.8em;
    padding-left: 1em;
}

.toc a {
    color: #3498db;
    text-decoration: none;
}

.toc a:hover {
    text-decoration: underline;
}

.title-page {
    text-align: center;
    margin-top: 3em;
}

strong {
    color: #c0392b;
    font-weight: bold;
}

em {
    color: #8e44ad;
    font-style: italic;
}

.page-break {
    page-break-after: always;
}
"#;

const PRINT_TWEAKS: &str = r#"
    body {
        font-size: 11pt;
        line-height: 1.6;
    }

    h1 {
        page-break-before: always;
        font-size: 16pt;
    }

    h1:first-of-type {
        page-break-before: auto;
    }

    h2 {
        font-size: 14pt;
    }

    h3 {
        font-size: 12pt;
    }
"#;

const PANDOC_SHEET: &str = r#"
body {
    font-family: "SimSun", "Microsoft YaHei", "WenQuanYi Micro Hei", serif;
    font-size: 12pt;
    line-height: 1.6;
    color: #333;
    margin: 0;
    padding: 0;
}

h1, h2, h3, h4, h5, h6 {
    font-family: "SimSun", "Microsoft YaHei", "WenQuanYi Micro Hei", serif;
    color: #2c3e50;
    margin-top: 1.5em;
    margin-bottom: 0.5em;
    font-weight: bold;
}

h1 {
    font-size: 18pt;
    border-bottom: 2px solid #34495e;
    padding-bottom: 0.3em;
}

h2 {
    font-size: 16pt;
    color: #34495e;
}

h3 {
    font-size: 14pt;
    color: #7f8c8d;
}

p {
    text-align: justify;
    margin-bottom: 1em;
    text-indent: 2em;
}

blockquote {
    border-left: 4px solid #bdc3c7;
    padding-left: 1em;
    margin-left: 0;
    font-style: italic;
    color: #7f8c8d;
}

code {
    background-color: #f8f9fa;
    padding: 0.2em 0.4em;
    border-radius: 3px;
    font-family: "Courier New", monospace;
    font-size: 0.9em;
}

pre {
    background-color: #f8f9fa;
    padding: 1em;
    border-radius: 5px;
    overflow-x: auto;
    border: 1px solid #e9ecef;
}

table {
    border-collapse: collapse;
    width: 100%;
    margin: 1em 0;
}

th, td {
    border: 1px solid #ddd;
    padding: 0.75em;
    text-align: left;
}

th {
    background-color: #f8f9fa;
    font-weight: bold;
}

@media print {
    body {
        font-size: 11pt;
    }

    h1 {
        page-break-before: always;
    }

    h1:first-of-type {
        page-break-before: auto;
    }
}
"#;

impl StyleVariant {
    /// Full stylesheet text for this variant.
    pub fn css(self) -> String {
        match self {
            StyleVariant::Screen => format!(
                r#"
body {{
    font-family: {FONT_STACK};
    font-size: 12pt;
    line-height: 1.8;
    color: #333;
    padding: 20px;
    max-width: 800px;
    margin: 0 auto;
    text-align: justify;
}}
{BLOCK_RULES}
@media print {{
    @page {{
        size: A4;
        margin: 2cm 1.5cm;
    }}
{PRINT_TWEAKS}}}
"#
            ),
            StyleVariant::Print => format!(
                r#"
@page {{
    size: A4;
    margin: 2cm 1.5cm;
}}

body {{
    font-family: {FONT_STACK};
    font-size: 12pt;
    line-height: 1.8;
    color: #333;
    margin: 0;
    padding: 0;
    text-align: justify;
}}

.container {{
    max-width: 100%;
    margin: 0 auto;
    padding: 20px;
}}
{BLOCK_RULES}
@media print {{
{PRINT_TWEAKS}}}
"#
            ),
            StyleVariant::Pandoc => PANDOC_SHEET.to_string(),
        }
    }
}
