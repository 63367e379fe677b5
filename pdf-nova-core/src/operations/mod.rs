//! Document operations
//!
//! Each operation takes uploaded bytes and produces an [`Artifact`]. The pure
//! PDF rewrites (merge, split, extract, rotate, watermark, images, compress,
//! blank removal) are synchronous and CPU bound; callers on an async runtime
//! should move them to a blocking thread. OCR, video extraction and
//! conversions drive external programs and are async.
//!
//! [`Artifact`]: crate::artifact::Artifact

pub mod blank;
pub mod compress;
pub mod convert;
pub mod extract;
pub mod images;
pub mod merge;
pub mod ocr;
pub mod rotate;
pub mod split;
pub mod video;
pub mod watermark;

pub use blank::{is_blank_page, remove_blank, BlankOptions};
pub use compress::{compress, CompressionLevel};
pub use convert::{convert, ConvertMode};
pub use extract::extract;
pub use images::images_to_pdf;
pub use merge::merge;
pub use ocr::{ocr_text, OcrOptions};
pub use rotate::{rotate, RotateOptions, RotationAngle};
pub use split::{split, SplitOptions};
pub use video::{video_extract, VideoOptions};
pub use watermark::{watermark, WatermarkOptions};

use crate::upload::Upload;

/// Total size of a set of uploads
pub fn input_bytes(uploads: &[Upload]) -> u64 {
    uploads.iter().map(|u| u.len() as u64).sum()
}
