use crate::artifact::Artifact;
use crate::error::Result;
use crate::page_range::PageSelection;
use crate::pdf;
use crate::upload::Upload;
use tracing::instrument;

/// Keep only the pages named by `pages` (e.g. `"1-3,5"`), in ascending order
#[instrument(skip_all, fields(file = upload.display_name(), pages = %pages))]
pub fn extract(upload: &Upload, pages: &str) -> Result<Artifact> {
    let mut doc = pdf::load(upload)?;
    let selection = PageSelection::parse(pages, doc.get_pages().len())?;
    pdf::retain_pages(&mut doc, selection.indices());
    let data = pdf::save(&mut doc)?;
    Ok(Artifact::pdf("pdf_nova_extract.pdf", data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use lopdf::Document;

    #[test]
    fn test_extract_sorted_pages() {
        let upload = Upload::new("six.pdf", fixtures::numbered_document(6));
        let artifact = extract(&upload, "5,1-2").unwrap();
        assert_eq!(artifact.file_name, "pdf_nova_extract.pdf");

        let doc = Document::load_mem(&artifact.data).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
        assert!(pdf::page_text(&doc, 1).contains("Page 1"));
        assert!(pdf::page_text(&doc, 2).contains("Page 2"));
        assert!(pdf::page_text(&doc, 3).contains("Page 5"));
    }

    #[test]
    fn test_extract_out_of_range() {
        let upload = Upload::new("two.pdf", fixtures::numbered_document(2));
        let err = extract(&upload, "3").unwrap_err();
        assert_eq!(err.to_string(), "Page out of range: 3");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_extract_requires_a_spec() {
        let upload = Upload::new("two.pdf", fixtures::numbered_document(2));
        let err = extract(&upload, " ").unwrap_err();
        assert_eq!(err.to_string(), "Empty page specification.");
    }
}
