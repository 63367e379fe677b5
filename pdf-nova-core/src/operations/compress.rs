//! Lossless size reduction
//!
//! No image is resampled. The levels only differ in how much structure is
//! rewritten:
//!
//! - `light`: Flate-compress every stream that has no filter yet
//! - `balanced`: light, then drop empty streams and unreferenced objects and
//!   renumber what is left
//! - `aggressive`: balanced, then point references at a single copy of
//!   byte-identical streams

use crate::artifact::Artifact;
use crate::error::{NovaError, Result};
use crate::pdf;
use crate::upload::Upload;
use lopdf::{Document, Object, ObjectId};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionLevel {
    Light,
    #[default]
    Balanced,
    Aggressive,
}

impl FromStr for CompressionLevel {
    type Err = NovaError;

    /// Trimmed, case-insensitive
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(CompressionLevel::Light),
            "balanced" => Ok(CompressionLevel::Balanced),
            "aggressive" => Ok(CompressionLevel::Aggressive),
            _ => Err(NovaError::invalid(
                "Invalid level. Use: light, balanced, aggressive.",
            )),
        }
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompressionLevel::Light => "light",
            CompressionLevel::Balanced => "balanced",
            CompressionLevel::Aggressive => "aggressive",
        })
    }
}

#[instrument(skip_all, fields(file = upload.display_name(), %level))]
pub fn compress(upload: &Upload, level: CompressionLevel) -> Result<Artifact> {
    let mut doc = pdf::load(upload)?;

    doc.compress();
    if level != CompressionLevel::Light {
        doc.delete_zero_length_streams();
        doc.prune_objects();
    }
    if level == CompressionLevel::Aggressive {
        let merged = dedupe_streams(&mut doc);
        debug!(merged, "identical streams merged");
        doc.prune_objects();
    }
    if level != CompressionLevel::Light {
        doc.renumber_objects();
    }

    let data = pdf::save(&mut doc)?;
    info!(
        input = upload.len(),
        output = data.len(),
        "compressed"
    );
    Ok(Artifact::pdf("pdf_nova_compress.pdf", data))
}

/// Redirect references to byte-identical streams onto one copy
///
/// Returns how many duplicates were found. The duplicates are left in
/// place; pruning removes them once nothing points at them.
fn dedupe_streams(doc: &mut Document) -> usize {
    let mut first_seen: HashMap<(Vec<u8>, Vec<u8>), ObjectId> = HashMap::new();
    let mut replace: HashMap<ObjectId, ObjectId> = HashMap::new();

    for (&id, object) in &doc.objects {
        let Object::Stream(stream) = object else {
            continue;
        };
        // Key order is part of the comparison
        let key = (format!("{:?}", stream.dict).into_bytes(), stream.content.clone());
        match first_seen.get(&key) {
            Some(&original) => {
                replace.insert(id, original);
            }
            None => {
                first_seen.insert(key, id);
            }
        }
    }

    if replace.is_empty() {
        return 0;
    }
    for object in doc.objects.values_mut() {
        redirect(object, &replace);
    }
    redirect_dict(&mut doc.trailer, &replace);
    replace.len()
}

fn redirect(object: &mut Object, replace: &HashMap<ObjectId, ObjectId>) {
    match object {
        Object::Reference(id) => {
            if let Some(&target) = replace.get(id) {
                *id = target;
            }
        }
        Object::Array(items) => {
            for item in items {
                redirect(item, replace);
            }
        }
        Object::Dictionary(dict) => redirect_dict(dict, replace),
        Object::Stream(stream) => redirect_dict(&mut stream.dict, replace),
        _ => {}
    }
}

fn redirect_dict(dict: &mut lopdf::Dictionary, replace: &HashMap<ObjectId, ObjectId>) {
    for (_, value) in dict.iter_mut() {
        redirect(value, replace);
    }
}
