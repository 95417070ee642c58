//! PDF text extraction and a minimal text-to-PDF writer.
//!
//! The writer lays text out on A4 pages with 20 mm margins and a 7 mm line
//! pitch in 16 pt Helvetica, wrapping on word boundaries using the standard
//! Helvetica advance widths.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, StringFormat, dictionary};

use fileforge_core::{ConvertError, ConvertResult, ErrorKind};

const POINTS_PER_MM: f32 = 72.0 / 25.4;
const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
const LINE_HEIGHT_MM: f32 = 7.0;
const FONT_SIZE: f32 = 16.0;

/// Width of a glyph in 1/1000 em for Helvetica.
fn glyph_width(c: char) -> u16 {
    const ASCII: [u16; 95] = [
        278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
        556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
        278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
        667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
        722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
        278, 278, 278, 469, 556, 333, // '['..'`'
        556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
        556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
        334, 260, 334, 584, // '{'..'~'
    ];
    match c as u32 {
        code @ 32..=126 => ASCII[(code - 32) as usize],
        _ => 556,
    }
}

fn text_width(text: &str) -> f32 {
    text.chars().map(|c| f32::from(glyph_width(c))).sum::<f32>() * FONT_SIZE / 1000.0
}

/// Page geometry in points, origin bottom-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
    pub line_height: f32,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            width: PAGE_WIDTH_MM * POINTS_PER_MM,
            height: PAGE_HEIGHT_MM * POINTS_PER_MM,
            margin: MARGIN_MM * POINTS_PER_MM,
            line_height: LINE_HEIGHT_MM * POINTS_PER_MM,
        }
    }
}

impl PageLayout {
    /// Usable line width.
    pub fn max_line_width(&self) -> f32 {
        self.width - 2.0 * self.margin
    }

    /// Wrap `text` into lines no wider than the text column.
    ///
    /// Line breaks in the input are kept; overlong words are split.
    pub fn wrap(&self, text: &str) -> Vec<String> {
        let max = self.max_line_width();
        let mut lines = Vec::new();

        for paragraph in text.lines() {
            let mut line = String::new();
            for word in paragraph.split(' ').filter(|w| !w.is_empty()) {
                let candidate = if line.is_empty() {
                    word.to_string()
                } else {
                    format!("{line} {word}")
                };
                if text_width(&candidate) <= max {
                    line = candidate;
                    continue;
                }
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                for c in word.chars() {
                    line.push(c);
                    if text_width(&line) > max && line.chars().count() > 1 {
                        line.pop();
                        lines.push(std::mem::replace(&mut line, c.to_string()));
                    }
                }
            }
            lines.push(line);
        }

        lines
    }

    /// Split lines into pages. Always yields at least one (possibly empty)
    /// page.
    pub fn paginate(&self, lines: Vec<String>) -> Vec<Vec<String>> {
        let mut pages = vec![Vec::new()];
        let mut y = self.margin;
        for line in lines {
            if y + self.line_height > self.height - self.margin {
                pages.push(Vec::new());
                y = self.margin;
            }
            if let Some(page) = pages.last_mut() {
                page.push(line);
            }
            y += self.line_height;
        }
        pages
    }
}

/// Map text to WinAnsi bytes; characters outside Latin-1 become `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

fn pdf_error(context: &str, err: lopdf::Error) -> ConvertError {
    ConvertError::with_source(ErrorKind::EncodeFailure, format!("{context}: {err}"), err)
}

/// Render pre-paginated lines as a PDF document.
pub fn write_pdf(layout: &PageLayout, pages: &[Vec<String>]) -> ConvertResult<Vec<u8>> {
    let mut doc = Document::with_version("1.4");
    let pages_id: ObjectId = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let left = layout.margin.round() as i64;
    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());

    for lines in pages {
        let mut operations = Vec::with_capacity(lines.len() * 5);
        let mut y = layout.margin;
        for line in lines {
            let baseline = (layout.height - y).round() as i64;
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new(
                "Tf",
                vec![Object::Name(b"F1".to_vec()), Object::Integer(FONT_SIZE as i64)],
            ));
            operations.push(Operation::new(
                "Td",
                vec![Object::Integer(left), Object::Integer(baseline)],
            ));
            operations.push(Operation::new(
                "Tj",
                vec![Object::String(win_ansi(line), StringFormat::Literal)],
            ));
            operations.push(Operation::new("ET", vec![]));
            y += layout.line_height;
        }

        let content = Content { operations }
            .encode()
            .map_err(|e| pdf_error("Failed to encode page content", e))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(count),
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(layout.width.round() as i64),
                Object::Integer(layout.height.round() as i64),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| ConvertError::with_source(ErrorKind::EncodeFailure, format!("Failed to write PDF: {e}"), e))?;
    Ok(out)
}

/// A parsed PDF ready for per-page text extraction.
pub struct PdfText {
    doc: Document,
    pages: Vec<u32>,
}

impl PdfText {
    /// Parse PDF bytes.
    pub fn load(bytes: &[u8]) -> ConvertResult<Self> {
        let doc = Document::load_mem(bytes).map_err(|e| {
            ConvertError::with_source(ErrorKind::DecodeFailure, format!("Failed to read PDF: {e}"), e)
        })?;
        let pages = doc.get_pages().keys().copied().collect();
        Ok(Self { doc, pages })
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Text of the page at `index` (0-based), whitespace collapsed to single
    /// spaces.
    pub fn page_text(&self, index: usize) -> ConvertResult<String> {
        let number = self
            .pages
            .get(index)
            .copied()
            .ok_or_else(|| ConvertError::decode(format!("PDF has no page {}", index + 1)))?;
        let raw = self.doc.extract_text(&[number]).map_err(|e| {
            ConvertError::with_source(
                ErrorKind::DecodeFailure,
                format!("Failed to extract text from page {number}: {e}"),
                e,
            )
        })?;
        Ok(raw.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}
