//! Split a PDF into fixed-size parts delivered as a ZIP

use crate::artifact::{self, Artifact};
use crate::error::{NovaError, Result};
use crate::pdf;
use crate::upload::Upload;
use std::io::{Cursor, Write};
use tracing::{debug, instrument};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitOptions {
    /// Pages per part, at least 1
    pub chunk_size: usize,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self { chunk_size: 1 }
    }
}

/// Write `(name, bytes)` entries into a deflated ZIP archive
pub(crate) fn zip_entries<'a, I>(entries: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, data) in entries {
        zip.start_file(name, options)?;
        zip.write_all(data)?;
    }
    Ok(zip.finish()?.into_inner())
}

/// Cut the document into `part_001.pdf`, `part_002.pdf`, ... inside
/// `pdf_nova_split.zip`
#[instrument(skip_all, fields(file = upload.display_name(), chunk_size = options.chunk_size))]
pub fn split(upload: &Upload, options: &SplitOptions) -> Result<Artifact> {
    if options.chunk_size < 1 {
        return Err(NovaError::invalid("chunk_size must be >= 1."));
    }
    let doc = pdf::load(upload)?;
    let total = doc.get_pages().len();
    if total == 0 {
        return Err(NovaError::invalid("The PDF has no pages."));
    }

    let mut parts = Vec::new();
    for (index, start) in (0..total).step_by(options.chunk_size).enumerate() {
        let end = (start + options.chunk_size).min(total);
        let keep: Vec<usize> = (start..end).collect();

        let mut part = doc.clone();
        pdf::retain_pages(&mut part, &keep);
        let bytes = pdf::save(&mut part)?;
        debug!(part = index + 1, pages = keep.len(), bytes = bytes.len(), "part written");
        parts.push((format!("part_{:03}.pdf", index + 1), bytes));
    }

    let data = zip_entries(parts.iter().map(|(n, b)| (n.as_str(), b.as_slice())))?;
    Ok(Artifact::new("pdf_nova_split.zip", artifact::ZIP, data))
}
