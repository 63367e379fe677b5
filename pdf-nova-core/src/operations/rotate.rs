//! Page rotation through the `/Rotate` page attribute

use crate::artifact::Artifact;
use crate::error::{NovaError, Result};
use crate::page_range::PageSelection;
use crate::pdf;
use crate::upload::Upload;
use tracing::{debug, instrument};

/// Clockwise rotation applied on top of a page's current rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationAngle {
    Clockwise90,
    Rotate180,
    Clockwise270,
}

impl RotationAngle {
    pub fn from_degrees(degrees: i64) -> Result<Self> {
        match degrees {
            90 => Ok(RotationAngle::Clockwise90),
            180 => Ok(RotationAngle::Rotate180),
            270 => Ok(RotationAngle::Clockwise270),
            _ => Err(NovaError::invalid("angle must be 90, 180 or 270.")),
        }
    }

    pub fn to_degrees(self) -> i64 {
        match self {
            RotationAngle::Clockwise90 => 90,
            RotationAngle::Rotate180 => 180,
            RotationAngle::Clockwise270 => 270,
        }
    }

    /// Rotation after applying `self` to a page already at `current` degrees
    pub fn apply_to(self, current: i64) -> i64 {
        (current + self.to_degrees()).rem_euclid(360)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotateOptions {
    pub angle: RotationAngle,
    /// Page specification; blank means every page
    pub pages: String,
}

impl Default for RotateOptions {
    fn default() -> Self {
        Self {
            angle: RotationAngle::Clockwise90,
            pages: String::new(),
        }
    }
}

#[instrument(skip_all, fields(file = upload.display_name(), angle = options.angle.to_degrees()))]
pub fn rotate(upload: &Upload, options: &RotateOptions) -> Result<Artifact> {
    let mut doc = pdf::load(upload)?;
    let page_ids = pdf::page_ids(&doc);
    let targets = PageSelection::parse_or_all(&options.pages, page_ids.len())?;

    for (index, page_id) in page_ids.into_iter().enumerate() {
        if !targets.contains(index) {
            continue;
        }
        // Read through the page tree so an inherited /Rotate is honoured
        let rotation = options.angle.apply_to(pdf::rotation(&doc, page_id));
        if let Ok(page) = doc.get_dictionary_mut(page_id) {
            page.set("Rotate", rotation);
        }
        debug!(page = index + 1, rotation, "rotated");
    }

    let data = pdf::save(&mut doc)?;
    Ok(Artifact::pdf("pdf_nova_rotate.pdf", data))
}
