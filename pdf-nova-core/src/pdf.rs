//! Thin helpers over `lopdf` shared by the operations
//!
//! Page attributes such as `/MediaBox`, `/Resources` and `/Rotate` may be
//! inherited from any ancestor `/Pages` node, so every lookup here walks the
//! `/Parent` chain instead of reading the page dictionary alone.

use crate::error::{NovaError, Result};
use crate::upload::Upload;
use chrono::{DateTime, Utc};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use tracing::debug;

/// Attributes a page may inherit from its ancestors
pub const INHERITABLE_KEYS: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Fallback page size (A4) when no `/MediaBox` can be found
const DEFAULT_MEDIA_BOX: Rect = Rect {
    llx: 0.0,
    lly: 0.0,
    urx: 595.0,
    ury: 842.0,
};

/// Rectangle in default user space units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl Rect {
    pub fn width(&self) -> f64 {
        (self.urx - self.llx).abs()
    }

    pub fn height(&self) -> f64 {
        (self.ury - self.lly).abs()
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.llx + self.urx) / 2.0, (self.lly + self.ury) / 2.0)
    }
}

/// Parse an upload as a PDF document
pub fn load(upload: &Upload) -> Result<Document> {
    let doc = Document::load_mem(&upload.data).map_err(|e| {
        debug!(file = upload.display_name(), error = %e, "PDF parse failed");
        NovaError::InvalidPdf(upload.display_name().to_string())
    })?;
    Ok(doc)
}

/// Serialise a document to bytes, stamping `/Producer` and `/ModDate`
pub fn save(doc: &mut Document) -> Result<Vec<u8>> {
    stamp_info(doc, Utc::now());
    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| NovaError::PdfWrite(e.to_string()))?;
    Ok(output)
}

fn format_pdf_date(date: DateTime<Utc>) -> String {
    format!("{}+00'00", date.format("D:%Y%m%d%H%M%S"))
}

/// Set the producer and modification date on the document info dictionary,
/// creating it when the trailer has none
pub fn stamp_info(doc: &mut Document, now: DateTime<Utc>) {
    let producer = Object::string_literal(format!("PDF Nova v{}", crate::VERSION));
    let mod_date = Object::string_literal(format_pdf_date(now));

    let existing = doc
        .trailer
        .get(b"Info")
        .and_then(Object::as_reference)
        .ok()
        .filter(|id| doc.get_dictionary(*id).is_ok());
    match existing {
        Some(id) => {
            if let Ok(info) = doc.get_dictionary_mut(id) {
                info.set("Producer", producer);
                info.set("ModDate", mod_date);
            }
        }
        None => {
            let id = doc.add_object(dictionary! {
                "Producer" => producer,
                "ModDate" => mod_date,
            });
            doc.trailer.set("Info", id);
        }
    }
}

/// Page object ids in document order
pub fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

/// Follow a reference to the object it points at
pub fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        other => other,
    }
}

pub fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(f64::from(*f)),
        _ => None,
    }
}

/// Look up `key` on the page or its nearest ancestor
pub fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = Some(page_id);
    // Guards against malformed trees whose /Parent chain loops
    let mut depth = 0;
    while let Some(id) = current {
        let dict = doc.get_dictionary(id).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        depth += 1;
        if depth > 64 {
            return None;
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

/// Effective `/MediaBox` of a page
pub fn media_box(doc: &Document, page_id: ObjectId) -> Rect {
    inherited(doc, page_id, b"MediaBox")
        .map(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_array().ok())
        .filter(|arr| arr.len() == 4)
        .and_then(|arr| {
            Some(Rect {
                llx: number(resolve(doc, &arr[0]))?,
                lly: number(resolve(doc, &arr[1]))?,
                urx: number(resolve(doc, &arr[2]))?,
                ury: number(resolve(doc, &arr[3]))?,
            })
        })
        .unwrap_or(DEFAULT_MEDIA_BOX)
}

/// Effective `/Rotate` of a page, normalised to 0..360
pub fn rotation(doc: &Document, page_id: ObjectId) -> i64 {
    inherited(doc, page_id, b"Rotate")
        .map(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_i64().ok())
        .unwrap_or(0)
        .rem_euclid(360)
}

/// Owned copy of the page's effective resource dictionary
///
/// Sub-dictionaries given by reference (`/Font`, `/ExtGState`, ...) are
/// resolved so the caller can add entries without touching shared objects.
pub fn owned_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    let Some(resources) = inherited(doc, page_id, b"Resources") else {
        return Dictionary::new();
    };
    let Ok(dict) = resolve(doc, resources).as_dict() else {
        return Dictionary::new();
    };

    let mut owned = Dictionary::new();
    for (key, value) in dict.iter() {
        let value = match resolve(doc, value) {
            Object::Dictionary(sub) => Object::Dictionary(sub.clone()),
            _ => value.clone(),
        };
        owned.set(key.clone(), value);
    }
    owned
}

/// Copy inherited attributes onto the page itself
///
/// Needed before a page is moved under a different `/Pages` parent.
pub fn materialize_inherited(doc: &mut Document, page_id: ObjectId) {
    let mut copied = Vec::new();
    for key in INHERITABLE_KEYS {
        let on_page = doc
            .get_dictionary(page_id)
            .map(|d| d.has(key))
            .unwrap_or(true);
        if on_page {
            continue;
        }
        if let Some(value) = inherited(doc, page_id, key) {
            copied.push((key.to_vec(), value.clone()));
        }
    }
    if let Ok(page) = doc.get_dictionary_mut(page_id) {
        for (key, value) in copied {
            page.set(key, value);
        }
    }
}

/// Text layer of one page (1-based), empty when nothing can be decoded
pub fn page_text(doc: &Document, page_number: u32) -> String {
    doc.extract_text(&[page_number]).unwrap_or_default()
}

/// Decoded size of the page's content streams
pub fn content_size(doc: &Document, page_id: ObjectId) -> usize {
    doc.get_page_content(page_id).map(|c| c.len()).unwrap_or(0)
}

/// Whether the page paints images, through XObjects or inline `BI` operators
pub fn has_images(doc: &Document, page_id: ObjectId) -> bool {
    let resources = owned_resources(doc, page_id);
    let xobject_images = resources
        .get(b"XObject")
        .ok()
        .and_then(|x| resolve(doc, x).as_dict().ok())
        .map(|xobjects| {
            xobjects.iter().any(|(_, value)| match resolve(doc, value) {
                Object::Stream(stream) => stream
                    .dict
                    .get(b"Subtype")
                    .and_then(Object::as_name)
                    .map(|n| n == b"Image")
                    .unwrap_or(false),
                _ => false,
            })
        })
        .unwrap_or(false);

    xobject_images || has_inline_image(doc, page_id)
}

fn has_inline_image(doc: &Document, page_id: ObjectId) -> bool {
    let Ok(content) = doc.get_page_content(page_id) else {
        return false;
    };
    content.windows(4).any(|w| {
        w[1] == b'B' && w[2] == b'I' && w[0].is_ascii_whitespace() && w[3].is_ascii_whitespace()
    }) || content.starts_with(b"BI ")
}

/// Empty document with a catalog and an empty `/Pages` root
pub fn new_document() -> (Document, ObjectId) {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    (doc, pages_id)
}

/// Point `/Kids` of the root `/Pages` at `kids` and reparent them
pub fn set_page_tree(doc: &mut Document, pages_id: ObjectId, kids: &[ObjectId]) -> Result<()> {
    let pages = doc
        .get_dictionary_mut(pages_id)
        .map_err(|e| NovaError::PdfWrite(format!("missing page tree: {e}")))?;
    pages.set(
        "Kids",
        kids.iter().map(|&id| Object::Reference(id)).collect::<Vec<_>>(),
    );
    pages.set("Count", kids.len() as i64);

    for &kid in kids {
        if let Ok(page) = doc.get_dictionary_mut(kid) {
            page.set("Parent", pages_id);
        }
    }
    Ok(())
}

/// Keep only the pages at `keep` (0-based, any order), dropping orphans
pub fn retain_pages(doc: &mut Document, keep: &[usize]) {
    let total = doc.get_pages().len();
    let drop: Vec<u32> = (0..total)
        .filter(|i| !keep.contains(i))
        .map(|i| i as u32 + 1)
        .collect();
    if !drop.is_empty() {
        doc.delete_pages(&drop);
    }
    doc.prune_objects();
}
