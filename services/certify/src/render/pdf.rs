//! Single-page certificate PDF.
//!
//! Text is set in the standard Helvetica font so no font files are needed at
//! runtime. Layout follows a US Letter page with centered lines, top to
//! bottom: title, certification sentence, disclaimer, QR code.

use lopdf::{
    content::{Content, Operation},
    dictionary, Document, Object, Stream, StringFormat,
};
use thiserror::Error;

use super::QrImage;
use crate::name::CertificateName;

pub const TITLE: &str = "Certificate of Completion";
pub const DISCLAIMER: &str = "This is only Example For Certificate";

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 72.0;
const LINE_SPACING: f32 = 1.2;

const TITLE_SIZE: f32 = 25.0;
const BODY_SIZE: f32 = 20.0;
const DISCLAIMER_SIZE: f32 = 14.0;

/// Edge of the square box the QR image is fitted into.
const QR_BOX: f32 = 100.0;

const FONT_RESOURCE: &str = "F1";
const QR_RESOURCE: &str = "Im1";

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("failed to build PDF: {0}")]
    Build(#[from] lopdf::Error),

    #[error("failed to serialize PDF: {0}")]
    Serialize(#[from] std::io::Error),
}

/// The sentence printed under the title.
pub fn certification_sentence(name: &CertificateName) -> String {
    format!("This is to certify that {name} has successfully completed the course.")
}

/// Renders the certificate for `name` with `qr` embedded, returning PDF bytes.
pub fn render_certificate(name: &CertificateName, qr: &QrImage) -> Result<Vec<u8>, PdfError> {
    let mut layout = Layout::new();
    layout.push_text(TITLE, TITLE_SIZE);
    layout.move_down(TITLE_SIZE);
    layout.push_text(&certification_sentence(name), BODY_SIZE);
    layout.push_text(DISCLAIMER, DISCLAIMER_SIZE);
    layout.move_down(DISCLAIMER_SIZE);
    layout.push_image(QR_RESOURCE, QR_BOX, QR_BOX);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let pixels = qr.pixels();
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(pixels.width()),
            "Height" => i64::from(pixels.height()),
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        pixels.as_raw().clone(),
    ));

    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { FONT_RESOURCE => font_id },
        "XObject" => dictionary! { QR_RESOURCE => image_id },
    });

    let content = Content {
        operations: layout.operations,
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(TITLE),
        "Producer" => Object::string_literal(concat!("certify ", env!("CARGO_PKG_VERSION"))),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

/// Top-down cursor that emits content stream operations.
struct Layout {
    cursor: f32,
    operations: Vec<Operation>,
}

impl Layout {
    fn new() -> Self {
        Self {
            cursor: PAGE_HEIGHT - MARGIN,
            operations: Vec::new(),
        }
    }

    fn move_down(&mut self, size: f32) {
        self.cursor -= size * LINE_SPACING;
    }

    /// Word-wraps `text` to the margins and centers every line.
    fn push_text(&mut self, text: &str, size: f32) {
        for line in wrap(text, size, PAGE_WIDTH - 2.0 * MARGIN) {
            self.cursor -= size * LINE_SPACING;
            let x = ((PAGE_WIDTH - text_width(&line, size)) / 2.0).max(MARGIN);
            self.operations.extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![FONT_RESOURCE.into(), size.into()]),
                Operation::new("Td", vec![x.into(), self.cursor.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::String(win_ansi(&line), StringFormat::Literal)],
                ),
                Operation::new("ET", vec![]),
            ]);
        }
    }

    /// Draws an image XObject centered, scaled to `width` x `height`.
    fn push_image(&mut self, resource: &str, width: f32, height: f32) {
        self.cursor -= height;
        let x = (PAGE_WIDTH - width) / 2.0;
        self.operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    width.into(),
                    0.into(),
                    0.into(),
                    height.into(),
                    x.into(),
                    self.cursor.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(resource.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ]);
    }
}

fn wrap(text: &str, size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        for piece in split_word(word, size, max_width) {
            if current.is_empty() {
                current = piece;
                continue;
            }
            let candidate = format!("{current} {piece}");
            if text_width(&candidate, size) <= max_width {
                current = candidate;
            } else {
                lines.push(std::mem::replace(&mut current, piece));
            }
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Breaks a word wider than `max_width` at character boundaries.
fn split_word(word: &str, size: f32, max_width: f32) -> Vec<String> {
    if text_width(word, size) <= max_width {
        return vec![word.to_string()];
    }
    let mut pieces = Vec::new();
    let mut piece = String::new();
    for c in word.chars() {
        piece.push(c);
        if piece.chars().count() > 1 && text_width(&piece, size) > max_width {
            piece.pop();
            pieces.push(std::mem::replace(&mut piece, c.to_string()));
        }
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

fn text_width(text: &str, size: f32) -> f32 {
    let units: u32 = text.chars().map(helvetica_width).sum();
    units as f32 * size / 1000.0
}

/// Helvetica advance widths in 1/1000 em, from the standard AFM metrics.
fn helvetica_width(c: char) -> u32 {
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
    match c {
        ' '..='~' => u32::from(ASCII[c as usize - 0x20]),
        _ => 556,
    }
}

/// Encodes text for a WinAnsi font. Outside printable Latin-1 becomes `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match u32::from(c) {
            code @ (0x20..=0x7E | 0xA0..=0xFF) => code as u8,
            _ => b'?',
        })
        .collect()
}
