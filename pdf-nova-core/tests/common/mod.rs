//! Documents built directly with lopdf for the integration suites

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};

/// Letter-size document with one line of text per page
pub fn text_pdf(lines: &[&str]) -> Vec<u8> {
    let pages = lines
        .iter()
        .map(|line| {
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 18i64.into()]),
                Operation::new("Td", vec![72i64.into(), 700i64.into()]),
                Operation::new("Tj", vec![Object::string_literal(*line)]),
                Operation::new("ET", vec![]),
            ]
        })
        .collect();
    letter_pdf(pages)
}

/// One-page document with a borderless 10pt table: rows advance with `T*`,
/// each cell sits at its column's x offset from the line start
#[allow(dead_code)]
pub fn table_pdf(rows: &[&[&str]], columns: &[i64]) -> Vec<u8> {
    let mut ops = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 10i64.into()]),
        Operation::new("TL", vec![14i64.into()]),
        Operation::new("Td", vec![72i64.into(), 700i64.into()]),
    ];
    for (index, row) in rows.iter().enumerate() {
        if index > 0 {
            ops.push(Operation::new("T*", vec![]));
        }
        for (cell, x) in row.iter().zip(columns) {
            // Restart at the line start, then shift to the column
            ops.push(Operation::new("Td", vec![(*x).into(), 0i64.into()]));
            ops.push(Operation::new("Tj", vec![Object::string_literal(*cell)]));
            ops.push(Operation::new("Td", vec![(-*x).into(), 0i64.into()]));
        }
    }
    ops.push(Operation::new("ET", vec![]));
    letter_pdf(vec![ops])
}

fn letter_pdf(pages: Vec<Vec<Operation>>) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for operations in pages {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0i64.into(), 0i64.into(), 612i64.into(), 792i64.into()],
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

pub fn page_texts(pdf: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(pdf).unwrap();
    let total = doc.get_pages().len() as u32;
    (1..=total)
        .map(|page| doc.extract_text(&[page]).unwrap_or_default().trim().to_string())
        .collect()
}
