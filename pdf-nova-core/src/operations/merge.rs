//! Concatenate several PDFs

use crate::artifact::Artifact;
use crate::error::Result;
use crate::pdf;
use crate::upload::{Upload, UploadLimits};
use tracing::{debug, instrument};

/// Merge `uploads` in order into `pdf_nova_merged.pdf`
///
/// Every source is renumbered past the objects already in the output, so
/// ids never collide. Inherited attributes are copied onto each page first
/// because the pages are re-parented under a single new `/Pages` root.
#[instrument(skip_all, fields(files = uploads.len()))]
pub fn merge(uploads: &[Upload], limits: &UploadLimits) -> Result<Artifact> {
    limits.check_count(uploads.len(), 2, "PDF")?;

    let (mut output, pages_id) = pdf::new_document();
    let mut kids = Vec::new();

    for upload in uploads {
        let mut doc = pdf::load(upload)?;
        for page_id in pdf::page_ids(&doc) {
            pdf::materialize_inherited(&mut doc, page_id);
        }

        doc.renumber_objects_with(output.max_id + 1);
        let page_ids = pdf::page_ids(&doc);
        debug!(file = upload.display_name(), pages = page_ids.len(), "appending");

        output.max_id = output.max_id.max(doc.max_id);
        output.objects.extend(doc.objects);
        kids.extend(page_ids);
    }

    pdf::set_page_tree(&mut output, pages_id, &kids)?;
    // Old catalogs and page tree nodes are now unreachable
    output.prune_objects();

    let data = pdf::save(&mut output)?;
    Ok(Artifact::pdf("pdf_nova_merged.pdf", data))
}
