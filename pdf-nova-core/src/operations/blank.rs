//! Blank page detection and removal

use crate::artifact::Artifact;
use crate::error::{NovaError, Result};
use crate::pdf;
use crate::upload::Upload;
use lopdf::{Document, ObjectId};
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlankOptions {
    /// Largest decoded content size (bytes) a blank page may have
    pub content_threshold: usize,
}

impl Default for BlankOptions {
    fn default() -> Self {
        Self {
            content_threshold: 80,
        }
    }
}

/// A page is blank when it has no text, no `/Annots` entry, no images and
/// at most `content_threshold` bytes of content
///
/// Any `/Annots` entry keeps the page, even an empty array.
pub fn is_blank_page(
    doc: &Document,
    page_number: u32,
    page_id: ObjectId,
    content_threshold: usize,
) -> bool {
    if !pdf::page_text(doc, page_number).trim().is_empty() {
        return false;
    }
    let has_annots = doc
        .get_dictionary(page_id)
        .map(|page| page.has(b"Annots"))
        .unwrap_or(false);
    if has_annots || pdf::has_images(doc, page_id) {
        return false;
    }
    pdf::content_size(doc, page_id) <= content_threshold
}

#[instrument(skip_all, fields(file = upload.display_name(), threshold = options.content_threshold))]
pub fn remove_blank(upload: &Upload, options: &BlankOptions) -> Result<Artifact> {
    let mut doc = pdf::load(upload)?;

    let keep: Vec<usize> = pdf::page_ids(&doc)
        .into_iter()
        .enumerate()
        .filter(|&(index, page_id)| {
            let blank = is_blank_page(&doc, index as u32 + 1, page_id, options.content_threshold);
            if blank {
                debug!(page = index + 1, "blank page dropped");
            }
            !blank
        })
        .map(|(index, _)| index)
        .collect();

    if keep.is_empty() {
        return Err(NovaError::invalid("All pages were detected as blank."));
    }

    pdf::retain_pages(&mut doc, &keep);
    let data = pdf::save(&mut doc)?;
    Ok(Artifact::pdf("pdf_nova_no_blank.pdf", data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, FixturePage};

    #[test]
    fn test_detection() {
        let doc = Document::load_mem(&fixtures::document(&[
            FixturePage::Text("words"),
            FixturePage::Blank,
            FixturePage::Annotated,
            FixturePage::Image,
        ]))
        .unwrap();
        let ids = pdf::page_ids(&doc);

        assert!(!is_blank_page(&doc, 1, ids[0], 80));
        assert!(is_blank_page(&doc, 2, ids[1], 80));
        assert!(!is_blank_page(&doc, 3, ids[2], 80));
        assert!(!is_blank_page(&doc, 4, ids[3], 80));
    }

    #[test]
    fn test_empty_annots_entry_keeps_page() {
        let mut doc = Document::load_mem(&fixtures::document(&[FixturePage::Blank])).unwrap();
        let id = pdf::page_ids(&doc)[0];
        assert!(is_blank_page(&doc, 1, id, 80));

        doc.get_dictionary_mut(id)
            .unwrap()
            .set("Annots", lopdf::Object::Array(vec![]));
        assert!(!is_blank_page(&doc, 1, id, 80));
    }

    #[test]
    fn test_threshold_applies_to_content_size() {
        // Paints nothing visible but has a non-empty content stream
        let mut doc = Document::load_mem(&fixtures::document(&[FixturePage::Blank])).unwrap();
        let id = pdf::page_ids(&doc)[0];
        let content = b"q 1 0 0 1 0 0 cm Q\n".to_vec();
        doc.change_page_content(id, content.clone()).unwrap();

        assert!(is_blank_page(&doc, 1, id, content.len()));
        assert!(!is_blank_page(&doc, 1, id, content.len() - 1));
    }

    #[test]
    fn test_remove_blank_keeps_order() {
        let upload = Upload::new(
            "mixed.pdf",
            fixtures::document(&[
                FixturePage::Blank,
                FixturePage::Text("first"),
                FixturePage::Blank,
                FixturePage::Text("second"),
            ]),
        );
        let artifact = remove_blank(&upload, &BlankOptions::default()).unwrap();
        assert_eq!(artifact.file_name, "pdf_nova_no_blank.pdf");

        let doc = Document::load_mem(&artifact.data).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
        assert!(pdf::page_text(&doc, 1).contains("first"));
        assert!(pdf::page_text(&doc, 2).contains("second"));
    }

    #[test]
    fn test_all_blank() {
        let upload = Upload::new(
            "empty.pdf",
            fixtures::document(&[FixturePage::Blank, FixturePage::Blank]),
        );
        let err = remove_blank(&upload, &BlankOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "All pages were detected as blank.");
        assert!(err.is_client_error());
    }
}
