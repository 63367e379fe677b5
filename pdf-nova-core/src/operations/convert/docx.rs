//! PDF text layer to a minimal WordprocessingML package

use crate::artifact::{self, Artifact};
use crate::error::Result;
use crate::operations::split::zip_entries;
use crate::pdf;
use crate::upload::Upload;
use tracing::{debug, instrument};

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const PAGE_BREAK: &str = r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#;

/// Escape text for XML content and attributes, dropping characters XML 1.0
/// cannot carry
pub(crate) fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if (c as u32) < 0x20 || c == '\u{FFFE}' || c == '\u{FFFF}' => {}
            c => out.push(c),
        }
    }
    out
}

fn paragraph(text: &str) -> String {
    format!(
        r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
        escape_xml(text)
    )
}

/// `word/document.xml` for pages of text, a page break between pages
fn document_xml(pages: &[String]) -> String {
    let mut body = String::new();
    for (index, text) in pages.iter().enumerate() {
        if index > 0 {
            body.push_str(PAGE_BREAK);
        }
        let mut lines = text.lines().map(str::trim_end).peekable();
        if lines.peek().is_none() {
            body.push_str("<w:p/>");
        }
        for line in lines {
            body.push_str(&paragraph(line));
        }
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1134" w:right="1134" w:bottom="1134" w:left="1134" w:header="709" w:footer="709" w:gutter="0"/></w:sectPr></w:body></w:document>"#
    )
}

/// Text of every page as paragraphs of `pdf_nova_converted.docx`
#[instrument(skip_all, fields(file = upload.display_name()))]
pub fn pdf_to_docx(upload: &Upload) -> Result<Artifact> {
    let doc = pdf::load(upload)?;
    let total = doc.get_pages().len() as u32;
    let pages: Vec<String> = (1..=total).map(|page| pdf::page_text(&doc, page)).collect();
    debug!(pages = pages.len(), "text extracted");

    let document = document_xml(&pages);
    let data = zip_entries([
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", ROOT_RELS.as_bytes()),
        ("word/document.xml", document.as_bytes()),
    ])?;
    Ok(Artifact::new("pdf_nova_converted.docx", artifact::DOCX, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, FixturePage};
    use std::io::{Cursor, Read};

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a < b & \"c\""), "a &lt; b &amp; &quot;c&quot;");
        assert_eq!(escape_xml("bell\u{7}\ttab"), "bell\ttab");
    }

    #[test]
    fn test_document_xml_breaks_between_pages() {
        let xml = document_xml(&["one\ntwo".to_string(), String::new(), "three".to_string()]);
        assert_eq!(xml.matches(PAGE_BREAK).count(), 2);
        assert!(xml.contains(">one</w:t>"));
        assert!(xml.contains(">two</w:t>"));
        assert!(xml.contains("<w:p/>"));
        assert!(xml.find("two").unwrap() < xml.find("three").unwrap());
    }

    #[test]
    fn test_pdf_to_docx_package() {
        let upload = Upload::new(
            "notes.pdf",
            fixtures::document(&[FixturePage::Text("Hello & welcome"), FixturePage::Text("Second")]),
        );
        let artifact = pdf_to_docx(&upload).unwrap();
        assert_eq!(artifact.file_name, "pdf_nova_converted.docx");
        assert_eq!(artifact.media_type, artifact::DOCX);

        let mut archive = zip::ZipArchive::new(Cursor::new(artifact.data)).unwrap();
        assert!(archive.by_name("[Content_Types].xml").is_ok());
        assert!(archive.by_name("_rels/.rels").is_ok());
        let mut document = String::new();
        archive
            .by_name("word/document.xml")
            .unwrap()
            .read_to_string(&mut document)
            .unwrap();
        assert!(document.contains("Hello &amp; welcome"));
        assert!(document.contains("Second"));
        assert_eq!(document.matches(PAGE_BREAK).count(), 1);
    }

    #[test]
    fn test_rejects_garbage() {
        let err = pdf_to_docx(&Upload::new("bad.pdf", b"nope".to_vec())).unwrap_err();
        assert_eq!(err.to_string(), "Invalid PDF: bad.pdf");
    }
}
