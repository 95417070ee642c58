//! HTML escaping, body-text extraction and the output shells.

use scraper::{Html, Selector};

use fileforge_core::{ConvertError, ConvertResult};

const HEAD: &str = "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n<title>Converted Document</title>\n";

const TEXT_STYLE: &str = "<style>\nbody { font-family: Arial, sans-serif; padding: 20px; max-width: 800px; margin: 0 auto; }\npre { white-space: pre-wrap; word-wrap: break-word; }\n</style>\n";

/// Escape text for an HTML text node, as DOM `innerHTML` serialization does.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
    out
}

/// Text content of the document body, markup removed.
pub fn body_text(html: &str) -> ConvertResult<String> {
    let document = Html::parse_document(html);
    let body = Selector::parse("body")
        .map_err(|e| ConvertError::decode(format!("Invalid body selector: {e}")))?;
    Ok(document
        .select(&body)
        .next()
        .map(|node| node.text().collect())
        .unwrap_or_default())
}

/// Plain text wrapped in a styled `<pre>` page.
pub fn text_page(text: &str) -> String {
    format!(
        "{HEAD}{TEXT_STYLE}</head>\n<body>\n<pre>{}</pre>\n</body>\n</html>",
        escape_html(text)
    )
}

/// Builds the page-per-`div` document produced from PDFs.
#[derive(Debug)]
pub struct PagedHtml {
    out: String,
}

impl PagedHtml {
    /// Start a document.
    pub fn new() -> Self {
        Self {
            out: format!("{HEAD}</head>\n<body>\n"),
        }
    }

    /// Append one page of text.
    pub fn push_page(&mut self, text: &str) {
        self.out.push_str("<div class=\"page\">\n<p>");
        self.out.push_str(&escape_html(text));
        self.out.push_str("</p>\n</div>\n");
    }

    /// Close the document.
    pub fn finish(mut self) -> String {
        self.out.push_str("</body>\n</html>");
        self.out
    }
}

impl Default for PagedHtml {
    fn default() -> Self {
        Self::new()
    }
}
