//! Small documents and images for tests
//!
//! Compiled for this crate's own tests and, through the `test-fixtures`
//! feature, for the API and CLI test suites.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use std::io::Cursor;

/// Shape of one fixture page
#[derive(Debug, Clone, Copy)]
pub enum FixturePage<'a> {
    /// A line of Helvetica text
    Text(&'a str),
    /// Empty content stream
    Blank,
    /// No content but a link annotation
    Annotated,
    /// A 2x2 image XObject painted over the page
    Image,
    /// 12pt rows starting at (72, 720); each row placed with `Tm`, each
    /// further cell with a relative `Td`
    Table(&'a [&'a [&'a str]]),
}

/// Horizontal distance between [`FixturePage::Table`] cells
pub const TABLE_COLUMN_STEP: f64 = 200.0;
/// Vertical distance between [`FixturePage::Table`] rows
pub const TABLE_ROW_STEP: f64 = 24.0;

/// A4 document whose MediaBox and font resources live on the `/Pages` root
pub fn document(pages: &[FixturePage<'_>]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut kids = Vec::new();
    for page in pages {
        let (operations, extra) = match page {
            FixturePage::Text(text) => (
                vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24i64.into()]),
                    Operation::new("Td", vec![72i64.into(), 720i64.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
                None,
            ),
            FixturePage::Blank => (vec![], None),
            FixturePage::Table(rows) => {
                let mut ops = vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12i64.into()]),
                ];
                for (index, row) in rows.iter().enumerate() {
                    let y = 720.0 - TABLE_ROW_STEP * index as f64;
                    ops.push(Operation::new(
                        "Tm",
                        vec![
                            1i64.into(),
                            0i64.into(),
                            0i64.into(),
                            1i64.into(),
                            72i64.into(),
                            Object::Real(y as f32),
                        ],
                    ));
                    for (column, cell) in row.iter().enumerate() {
                        if column > 0 {
                            ops.push(Operation::new(
                                "Td",
                                vec![Object::Real(TABLE_COLUMN_STEP as f32), 0i64.into()],
                            ));
                        }
                        ops.push(Operation::new("Tj", vec![Object::string_literal(*cell)]));
                    }
                }
                ops.push(Operation::new("ET", vec![]));
                (ops, None)
            }
            FixturePage::Annotated => {
                let annot = doc.add_object(dictionary! {
                    "Type" => "Annot",
                    "Subtype" => "Link",
                    "Rect" => vec![72i64.into(), 72i64.into(), 144i64.into(), 96i64.into()],
                });
                (vec![], Some(("Annots", Object::Array(vec![annot.into()]))))
            }
            FixturePage::Image => {
                let image = doc.add_object(Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => 2i64,
                        "Height" => 2i64,
                        "ColorSpace" => "DeviceRGB",
                        "BitsPerComponent" => 8i64,
                    },
                    vec![0u8; 12],
                ));
                let resources = dictionary! {
                    "XObject" => dictionary! { "Im1" => image },
                };
                (
                    vec![
                        Operation::new("q", vec![]),
                        Operation::new(
                            "cm",
                            vec![
                                100i64.into(),
                                0i64.into(),
                                0i64.into(),
                                100i64.into(),
                                72i64.into(),
                                600i64.into(),
                            ],
                        ),
                        Operation::new("Do", vec!["Im1".into()]),
                        Operation::new("Q", vec![]),
                    ],
                    Some(("Resources", Object::Dictionary(resources))),
                )
            }
        };

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            Dictionary::new(),
            content.encode().unwrap_or_default(),
        ));
        let mut page_dict = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        if let Some((key, value)) = extra {
            page_dict.set(key, value);
        }
        kids.push(Object::Reference(doc.add_object(page_dict)));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0i64.into(), 0i64.into(), 595i64.into(), 842i64.into()],
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("fixture document serialises");
    bytes
}

/// Document with `count` text pages reading "Page 1", "Page 2", ...
pub fn numbered_document(count: usize) -> Vec<u8> {
    let labels: Vec<String> = (1..=count).map(|i| format!("Page {i}")).collect();
    let pages: Vec<FixturePage<'_>> = labels.iter().map(|l| FixturePage::Text(l)).collect();
    document(&pages)
}

/// Solid colour PNG
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("fixture png encodes");
    bytes
}

/// Solid colour JPEG
pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([20, 90, 160]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Jpeg)
        .expect("fixture jpeg encodes");
    bytes
}

/// Executable shell script standing in for an external program
///
/// The script receives the tool's arguments unchanged; `$last` holds the
/// final argument.
#[cfg(unix)]
pub fn fake_tool(dir: &std::path::Path, name: &str, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    let script = format!("#!/bin/sh\nfor last; do :; done\n{body}\n");
    std::fs::write(&path, script).expect("fake tool written");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("fake tool made executable");
    path
}
