//! End-to-end chains of the PDF rewriting operations

mod common;

use common::{page_texts, text_pdf};
use lopdf::Document;
use pdf_nova::operations::{
    compress, extract, merge, remove_blank, rotate, split, watermark, BlankOptions,
    CompressionLevel, RotateOptions, RotationAngle, SplitOptions, WatermarkOptions,
};
use pdf_nova::{Artifact, Upload, UploadLimits};
use pretty_assertions::assert_eq;
use std::io::Cursor;

fn as_upload(artifact: Artifact) -> Upload {
    Upload::new(artifact.file_name, artifact.data)
}

/// One page per expected label, in order
fn assert_pages(pdf: &[u8], expected: &[&str]) {
    let texts = page_texts(pdf);
    assert_eq!(texts.len(), expected.len(), "{texts:?}");
    for (text, label) in texts.iter().zip(expected) {
        assert!(text.contains(label), "{text:?} should contain {label:?}");
    }
}

#[test]
fn test_merge_extract_rotate_chain() {
    let first = Upload::new("a.pdf", text_pdf(&["Alpha 1", "Alpha 2"]));
    let second = Upload::new("b.pdf", text_pdf(&["Beta 1", "Beta 2", "Beta 3"]));

    let merged = merge(&[first, second], &UploadLimits::default()).unwrap();
    assert_pages(&merged.data, &["Alpha 1", "Alpha 2", "Beta 1", "Beta 2", "Beta 3"]);

    let extracted = extract(&as_upload(merged), "5, 2-3").unwrap();
    assert_pages(&extracted.data, &["Alpha 2", "Beta 1", "Beta 3"]);

    let rotated = rotate(
        &as_upload(extracted),
        &RotateOptions {
            angle: RotationAngle::Clockwise270,
            pages: "2".to_string(),
        },
    )
    .unwrap();
    let doc = Document::load_mem(&rotated.data).unwrap();
    let rotations: Vec<i64> = doc
        .get_pages()
        .values()
        .map(|&id| {
            doc.get_dictionary(id)
                .unwrap()
                .get(b"Rotate")
                .and_then(|r| r.as_i64())
                .unwrap_or(0)
        })
        .collect();
    assert_eq!(rotations, vec![0, 270, 0]);
}

#[test]
fn test_split_parts_reassemble() {
    let source = Upload::new("five.pdf", text_pdf(&["p1", "p2", "p3", "p4", "p5"]));
    let zipped = split(&source, &SplitOptions { chunk_size: 2 }).unwrap();

    let mut archive = zip::ZipArchive::new(Cursor::new(zipped.data)).unwrap();
    let mut parts = Vec::new();
    for index in 0..archive.len() {
        let mut file = archive.by_index(index).unwrap();
        let mut bytes = Vec::new();
        std::io::Read::read_to_end(&mut file, &mut bytes).unwrap();
        parts.push(Upload::new(file.name().to_string(), bytes));
    }
    let names: Vec<&str> = parts.iter().map(|p| p.file_name.as_str()).collect();
    assert_eq!(names, vec!["part_001.pdf", "part_002.pdf", "part_003.pdf"]);

    let rebuilt = merge(&parts, &UploadLimits::default()).unwrap();
    assert_pages(&rebuilt.data, &["p1", "p2", "p3", "p4", "p5"]);
}

#[test]
fn test_watermark_then_compress_keeps_text() {
    let source = Upload::new("memo.pdf", text_pdf(&["Internal memo"]));
    let marked = watermark(
        &source,
        &WatermarkOptions {
            text: "DRAFT".to_string(),
            opacity: 0.3,
        },
    )
    .unwrap();

    let compressed = compress(&as_upload(marked), CompressionLevel::Aggressive).unwrap();
    assert_pages(&compressed.data, &["Internal memo"]);

    let doc = Document::load_mem(&compressed.data).unwrap();
    let page_id = *doc.get_pages().get(&1).unwrap();
    let content = String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned();
    assert!(content.contains("(DRAFT)"), "{content}");
}

#[test]
fn test_remove_blank_after_merge() {
    let text = Upload::new("text.pdf", text_pdf(&["Keep me"]));
    let blank = Upload::new("blank.pdf", text_pdf(&[""]));

    let merged = merge(&[blank.clone(), text, blank], &UploadLimits::default()).unwrap();
    let cleaned = remove_blank(&as_upload(merged), &BlankOptions::default()).unwrap();
    assert_pages(&cleaned.data, &["Keep me"]);
}

#[test]
fn test_errors_name_the_problem() {
    let garbage = Upload::new("notes.txt.pdf", b"%PDF-1.4 truncated".to_vec());
    let err = extract(&garbage, "1").unwrap_err();
    assert_eq!(err.to_string(), "Invalid PDF: notes.txt.pdf");

    let one = Upload::new("one.pdf", text_pdf(&["only"]));
    let err = merge(&[one], &UploadLimits::default()).unwrap_err();
    assert_eq!(err.to_string(), "Add at least 2 PDFs.");
}
