//! Diagonal text watermark
//!
//! The overlay is appended as an extra content stream. The page's own
//! streams are bracketed by `q`/`Q` so whatever graphics state they leave
//! behind (CTM, colours, clipping) is reset before the watermark is drawn.

use crate::artifact::Artifact;
use crate::error::{NovaError, Result};
use crate::pdf;
use crate::upload::Upload;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::instrument;

const FONT_RESOURCE: &str = "NovaWmFont";
const STATE_RESOURCE: &str = "NovaWmGs";
const ANGLE_DEGREES: f64 = 35.0;
const GREY: f32 = 0.15;

/// Helvetica-Bold advance widths for WinAnsi codes 32..=126 (1/1000 em)
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // 0..?
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // P.._
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // `..o
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // p..~
];

const DEFAULT_WIDTH: u16 = 556;

#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkOptions {
    pub text: String,
    /// Fill and stroke alpha, in `(0, 1]`
    pub opacity: f64,
}

impl Default for WatermarkOptions {
    fn default() -> Self {
        Self {
            text: String::new(),
            opacity: 0.15,
        }
    }
}

/// Encode `text` for a WinAnsi simple font; unmappable chars become `?`
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            code @ 0x20..=0x7e | code @ 0xa0..=0xff => code as u8,
            _ => b'?',
        })
        .collect()
}

/// Width of WinAnsi-encoded text in points
fn text_width(encoded: &[u8], font_size: f64) -> f64 {
    let units: u32 = encoded
        .iter()
        .map(|&b| match b {
            32..=126 => HELVETICA_BOLD_WIDTHS[(b - 32) as usize],
            _ => DEFAULT_WIDTH,
        } as u32)
        .sum();
    f64::from(units) * font_size / 1000.0
}

/// `min(64, max(24, floor(width / 10)))`
fn font_size_for(page_width: f64) -> f64 {
    (page_width / 10.0).floor().clamp(24.0, 64.0)
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

fn overlay_operations(encoded: &[u8], center: (f64, f64), page_width: f64) -> Vec<Operation> {
    let size = font_size_for(page_width);
    let width = text_width(encoded, size);
    let (sin, cos) = ANGLE_DEGREES.to_radians().sin_cos();

    vec![
        Operation::new("Q", vec![]),
        Operation::new("q", vec![]),
        Operation::new("gs", vec![Object::Name(STATE_RESOURCE.into())]),
        Operation::new("g", vec![Object::Real(GREY)]),
        Operation::new(
            "cm",
            vec![real(1.0), real(0.0), real(0.0), real(1.0), real(center.0), real(center.1)],
        ),
        Operation::new(
            "cm",
            vec![real(cos), real(sin), real(-sin), real(cos), real(0.0), real(0.0)],
        ),
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![Object::Name(FONT_RESOURCE.into()), real(size)]),
        Operation::new("Td", vec![real(-width / 2.0), real(0.0)]),
        Operation::new(
            "Tj",
            vec![Object::String(encoded.to_vec(), StringFormat::Literal)],
        ),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
    ]
}

fn add_stream(doc: &mut Document, operations: Vec<Operation>) -> Result<ObjectId> {
    let bytes = Content { operations }
        .encode()
        .map_err(|e| NovaError::PdfWrite(e.to_string()))?;
    Ok(doc.add_object(Stream::new(Dictionary::new(), bytes)))
}

/// Existing `/Contents` as a list of references or inline streams
fn content_parts(doc: &Document, page_id: ObjectId) -> Vec<Object> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    match page.get(b"Contents") {
        Ok(Object::Array(parts)) => parts.clone(),
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(parts)) => parts.clone(),
            _ => vec![Object::Reference(*id)],
        },
        _ => Vec::new(),
    }
}

#[instrument(skip_all, fields(file = upload.display_name(), opacity = options.opacity))]
pub fn watermark(upload: &Upload, options: &WatermarkOptions) -> Result<Artifact> {
    let text = options.text.trim();
    if text.is_empty() {
        return Err(NovaError::invalid("Watermark text is required."));
    }
    if !(options.opacity > 0.0 && options.opacity <= 1.0) {
        return Err(NovaError::invalid("opacity must be between 0 and 1."));
    }

    let mut doc = pdf::load(upload)?;
    let encoded = win_ansi(text);

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let state_id = doc.add_object(dictionary! {
        "Type" => "ExtGState",
        "ca" => real(options.opacity),
        "CA" => real(options.opacity),
    });
    let open_id = add_stream(&mut doc, vec![Operation::new("q", vec![])])?;

    for page_id in pdf::page_ids(&doc) {
        let media_box = pdf::media_box(&doc, page_id);
        let overlay = overlay_operations(&encoded, media_box.center(), media_box.width());
        let overlay_id = add_stream(&mut doc, overlay)?;

        let mut resources = pdf::owned_resources(&doc, page_id);
        add_resource(&mut resources, b"Font", FONT_RESOURCE, font_id);
        add_resource(&mut resources, b"ExtGState", STATE_RESOURCE, state_id);

        let mut contents = vec![Object::Reference(open_id)];
        contents.extend(content_parts(&doc, page_id));
        contents.push(Object::Reference(overlay_id));

        if let Ok(page) = doc.get_dictionary_mut(page_id) {
            page.set("Resources", resources);
            page.set("Contents", contents);
        }
    }

    let data = pdf::save(&mut doc)?;
    Ok(Artifact::pdf("pdf_nova_watermark.pdf", data))
}

fn add_resource(resources: &mut Dictionary, category: &[u8], name: &str, id: ObjectId) {
    let mut entries = match resources.get(category) {
        Ok(Object::Dictionary(existing)) => existing.clone(),
        _ => Dictionary::new(),
    };
    entries.set(name, id);
    resources.set(category.to_vec(), entries);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, FixturePage};

    fn options(text: &str, opacity: f64) -> WatermarkOptions {
        WatermarkOptions {
            text: text.to_string(),
            opacity,
        }
    }

    #[test]
    fn test_font_size_bounds() {
        assert_eq!(font_size_for(100.0), 24.0);
        assert_eq!(font_size_for(595.0), 59.0);
        assert_eq!(font_size_for(842.0), 64.0);
    }

    #[test]
    fn test_text_width_uses_metrics() {
        // "I" is 278 units, "W" 944
        assert_eq!(text_width(b"I", 1000.0), 278.0);
        assert_eq!(text_width(b"WI", 10.0), 12.22);
        assert_eq!(win_ansi("Été ✓"), vec![0xc9, b't', 0xe9, b' ', b'?']);
    }

    #[test]
    fn test_watermark_wraps_original_content() {
        let upload = Upload::new(
            "doc.pdf",
            fixtures::document(&[FixturePage::Text("Body"), FixturePage::Blank]),
        );
        let artifact = watermark(&upload, &options("  DRAFT  ", 0.3)).unwrap();
        assert_eq!(artifact.file_name, "pdf_nova_watermark.pdf");

        let doc = Document::load_mem(&artifact.data).unwrap();
        let ids = pdf::page_ids(&doc);
        assert_eq!(ids.len(), 2);

        let page = doc.get_dictionary(ids[0]).unwrap();
        let contents = page.get(b"Contents").unwrap().as_array().unwrap();
        assert_eq!(contents.len(), 3);

        let content = String::from_utf8_lossy(&doc.get_page_content(ids[0]).unwrap()).into_owned();
        let open = content.find('q').unwrap();
        let body = content.find("(Body)").unwrap();
        let overlay = content.find("(DRAFT)").unwrap();
        assert!(open < body && body < overlay);

        let resources = pdf::owned_resources(&doc, ids[0]);
        let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
        assert!(fonts.has(b"F1"));
        assert!(fonts.has(FONT_RESOURCE.as_bytes()));

        let states = resources.get(b"ExtGState").unwrap().as_dict().unwrap();
        let state_id = states.get(STATE_RESOURCE.as_bytes()).unwrap().as_reference().unwrap();
        let state = doc.get_dictionary(state_id).unwrap();
        let alpha = pdf::number(state.get(b"ca").unwrap()).unwrap();
        assert!((alpha - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_watermark_validation() {
        let upload = Upload::new("doc.pdf", fixtures::numbered_document(1));
        assert_eq!(
            watermark(&upload, &options("   ", 0.5)).unwrap_err().to_string(),
            "Watermark text is required."
        );
        for opacity in [0.0, -0.1, 1.01, f64::NAN] {
            assert_eq!(
                watermark(&upload, &options("X", opacity)).unwrap_err().to_string(),
                "opacity must be between 0 and 1."
            );
        }
        assert!(watermark(&upload, &options("X", 1.0)).is_ok());
    }
}
