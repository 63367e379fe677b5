//! Images to PDF, one page per image

use crate::artifact::Artifact;
use crate::error::{NovaError, Result};
use crate::pdf;
use crate::upload::{Upload, UploadLimits};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;
use tracing::{debug, instrument};

/// Pixels per inch used to size pages
const RESOLUTION: f64 = 100.0;

/// Decode an image and add it to `doc` as a page under `pages_id`
fn add_image_page(doc: &mut Document, pages_id: ObjectId, upload: &Upload) -> Result<ObjectId> {
    let decoded = image::load_from_memory(&upload.data).map_err(|e| {
        debug!(file = upload.display_name(), error = %e, "image decode failed");
        NovaError::InvalidImage(upload.display_name().to_string())
    })?;
    let rgb = decoded.to_rgb8();
    let (width_px, height_px) = rgb.dimensions();

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(rgb.as_raw())?;
    let compressed = encoder.finish()?;

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width_px as i64,
            "Height" => height_px as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8i64,
            "Filter" => "FlateDecode",
        },
        compressed,
    ));

    let width = f64::from(width_px) * 72.0 / RESOLUTION;
    let height = f64::from(height_px) * 72.0 / RESOLUTION;
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(width as f32),
                    0i64.into(),
                    0i64.into(),
                    Object::Real(height as f32),
                    0i64.into(),
                    0i64.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        Dictionary::new(),
        content
            .encode()
            .map_err(|e| NovaError::PdfWrite(e.to_string()))?,
    ));

    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            0i64.into(),
            0i64.into(),
            Object::Real(width as f32),
            Object::Real(height as f32),
        ],
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
        "Contents" => content_id,
    }))
}

/// Build a PDF from images as `file_name`, one page each
pub(crate) fn build_image_pdf(uploads: &[Upload], file_name: &str) -> Result<Artifact> {
    let (mut doc, pages_id) = pdf::new_document();
    let mut kids = Vec::with_capacity(uploads.len());
    for upload in uploads {
        kids.push(add_image_page(&mut doc, pages_id, upload)?);
    }
    pdf::set_page_tree(&mut doc, pages_id, &kids)?;
    let data = pdf::save(&mut doc)?;
    Ok(Artifact::pdf(file_name, data))
}

/// Convert images, in order, into `pdf_nova_images.pdf`
#[instrument(skip_all, fields(files = uploads.len()))]
pub fn images_to_pdf(uploads: &[Upload], limits: &UploadLimits) -> Result<Artifact> {
    limits.check_count(uploads.len(), 1, "image")?;
    build_image_pdf(uploads, "pdf_nova_images.pdf")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_page_size_follows_pixels() {
        let uploads = vec![
            Upload::new("wide.png", fixtures::png(200, 100)),
            Upload::new("photo.jpg", fixtures::jpeg(50, 100)),
        ];
        let artifact = images_to_pdf(&uploads, &UploadLimits::default()).unwrap();
        assert_eq!(artifact.file_name, "pdf_nova_images.pdf");

        let doc = Document::load_mem(&artifact.data).unwrap();
        let ids = pdf::page_ids(&doc);
        assert_eq!(ids.len(), 2);

        let first = pdf::media_box(&doc, ids[0]);
        assert!((first.width() - 144.0).abs() < 0.01);
        assert!((first.height() - 72.0).abs() < 0.01);
        let second = pdf::media_box(&doc, ids[1]);
        assert!((second.width() - 36.0).abs() < 0.01);
        assert!(pdf::has_images(&doc, ids[0]));
    }

    #[test]
    fn test_image_stream_is_flate_rgb() {
        let uploads = vec![Upload::new("dot.png", fixtures::png(3, 2))];
        let artifact = images_to_pdf(&uploads, &UploadLimits::default()).unwrap();
        let doc = Document::load_mem(&artifact.data).unwrap();

        let image = doc
            .objects
            .values()
            .find_map(|o| match o {
                Object::Stream(s) if s.dict.has(b"Width") => Some(s.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(image.dict.get(b"Filter").unwrap().as_name().unwrap(), b"FlateDecode");
        assert_eq!(image.decompressed_content().unwrap().len(), 3 * 2 * 3);
    }

    #[test]
    fn test_invalid_image_is_named() {
        let uploads = vec![
            Upload::new("ok.png", fixtures::png(2, 2)),
            Upload::new("broken.png", b"not an image".to_vec()),
        ];
        let err = images_to_pdf(&uploads, &UploadLimits::default()).unwrap_err();
        assert_eq!(err.to_string(), "Invalid image: broken.png");
    }

    #[test]
    fn test_requires_one_image() {
        let err = images_to_pdf(&[], &UploadLimits::default()).unwrap_err();
        assert_eq!(err.to_string(), "Add at least 1 image.");
    }
}
