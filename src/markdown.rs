//! Markdown notes to HTML.
//!
//! Two renderers share one contract: the output is an HTML fragment in which
//! no author text appears unescaped.
//!
//! - [`CommonMarkRenderer`] (feature `markdown`) - full CommonMark via
//!   pulldown-cmark, with raw HTML passed through as text.
//! - [`SimpleRenderer`] - built-in fallback: `#`/`##`/`###` headings,
//!   paragraphs, `-`/`*` bullet lists, inline links, bold and italic.
//!
//! [`default_renderer`] picks the richest renderer compiled in.

use std::sync::LazyLock;

use regex::Regex;

/// Converts Markdown text into an HTML fragment.
pub trait MarkdownRenderer {
    fn render(&self, markdown: &str) -> String;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// The best renderer available in this build.
pub fn default_renderer() -> Box<dyn MarkdownRenderer> {
    #[cfg(feature = "markdown")]
    {
        Box::new(CommonMarkRenderer)
    }

    #[cfg(not(feature = "markdown"))]
    {
        Box::new(SimpleRenderer)
    }
}

/// Render notes with `renderer`, normalizing CRLF line endings first.
pub fn render(renderer: &dyn MarkdownRenderer, markdown: &str) -> String {
    renderer.render(&markdown.replace("\r\n", "\n"))
}

/// Escape text for HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

// ============================================================================
// CommonMark
// ============================================================================

#[cfg(feature = "markdown")]
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonMarkRenderer;

#[cfg(feature = "markdown")]
impl MarkdownRenderer for CommonMarkRenderer {
    fn render(&self, markdown: &str) -> String {
        use pulldown_cmark::{html, Event, Options, Parser};

        let options = Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_HEADING_ATTRIBUTES;
        let parser = Parser::new_ext(markdown, options).map(|event| match event {
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            other => other,
        });

        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, parser);
        out
    }

    fn name(&self) -> &'static str {
        "commonmark"
    }
}

// ============================================================================
// Built-in fallback
// ============================================================================

static BULLET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*[-*]\s+").expect("valid bullet pattern"));
static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("valid link pattern"));
static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("valid bold pattern"));

/// Line-based converter with no dependencies beyond `regex`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleRenderer;

impl MarkdownRenderer for SimpleRenderer {
    fn render(&self, markdown: &str) -> String {
        let mut out: Vec<String> = Vec::new();
        let mut in_list = false;

        for raw in markdown.split('\n') {
            let line = raw.trim_end();

            if line.trim().is_empty() {
                close_list(&mut out, &mut in_list);
                continue;
            }

            if let Some((level, text)) = heading(line) {
                close_list(&mut out, &mut in_list);
                out.push(format!("<h{level}>{}</h{level}>", inline(text)));
                continue;
            }

            if let Some(marker) = BULLET.find(line) {
                if !in_list {
                    out.push("<ul>".to_string());
                    in_list = true;
                }
                out.push(format!("<li>{}</li>", inline(&line[marker.end()..])));
                continue;
            }

            close_list(&mut out, &mut in_list);
            out.push(format!("<p>{}</p>", inline(line)));
        }

        close_list(&mut out, &mut in_list);
        out.join("\n")
    }

    fn name(&self) -> &'static str {
        "simple"
    }
}

fn close_list(out: &mut Vec<String>, in_list: &mut bool) {
    if *in_list {
        out.push("</ul>".to_string());
        *in_list = false;
    }
}

fn heading(line: &str) -> Option<(usize, &str)> {
    for (prefix, level) in [("### ", 3), ("## ", 2), ("# ", 1)] {
        if let Some(text) = line.strip_prefix(prefix) {
            return Some((level, text));
        }
    }
    None
}

/// Inline markup, applied in order: escape, links, bold, italic.
fn inline(text: &str) -> String {
    let escaped = escape_html(text);
    let linked = LINK.replace_all(&escaped, r#"<a href="${2}">${1}</a>"#);
    let bold = BOLD.replace_all(&linked, "<strong>${1}</strong>");
    italic(&bold)
}

/// `*text*` to `<em>text</em>`, unless either delimiter touches another `*`.
fn italic(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'*' && (i == 0 || bytes[i - 1] != b'*') {
            if let Some(len) = text[i + 1..].find('*') {
                let close = i + 1 + len;
                let after_ok = bytes.get(close + 1) != Some(&b'*');
                if len > 0 && after_ok {
                    out.push_str(&text[copied..i]);
                    out.push_str("<em>");
                    out.push_str(&text[i + 1..close]);
                    out.push_str("</em>");
                    i = close + 1;
                    copied = i;
                    continue;
                }
            }
        }
        i += 1;
    }

    out.push_str(&text[copied..]);
    out
}
