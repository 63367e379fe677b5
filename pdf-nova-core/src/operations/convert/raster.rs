//! Page rendering through `pdftoppm`

use crate::artifact::{self, Artifact};
use crate::error::{NovaError, Result};
use crate::external::{ExternalTool, ToolLocator};
use crate::operations::split::zip_entries;
use crate::pdf;
use crate::upload::Upload;
use crate::workspace::Workspace;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

/// 2x the 72 dpi user space
pub const PAGES_DPI: u32 = 144;

/// 2.2x, enough for tesseract on body text
pub const OCR_DPI: u32 = 158;

/// Render page `page` (1-based) of `pdf_path` to a PNG inside the workspace
pub async fn render_page(
    locator: &ToolLocator,
    workspace: &Workspace,
    pdf_path: &Path,
    page: u32,
    dpi: u32,
) -> Result<PathBuf> {
    let prefix = workspace.join(format!("render_{page:03}"));
    let page_arg = page.to_string();
    let dpi_arg = dpi.to_string();
    let args: [&OsStr; 10] = [
        "-r".as_ref(),
        dpi_arg.as_ref(),
        "-png".as_ref(),
        "-singlefile".as_ref(),
        "-f".as_ref(),
        page_arg.as_ref(),
        "-l".as_ref(),
        page_arg.as_ref(),
        pdf_path.as_os_str(),
        prefix.as_os_str(),
    ];

    let output = locator
        .run(ExternalTool::Pdftoppm, args, locator.timeout())
        .await?;
    if !output.success() {
        warn!(page, stderr = %output.stderr_summary(), "pdftoppm failed");
        return Err(NovaError::ConversionFailed(format!(
            "Could not render page {page}."
        )));
    }

    let png = prefix.with_extension("png");
    if !png.is_file() {
        return Err(NovaError::OutputMissing(format!(
            "Rendered image for page {page} not found."
        )));
    }
    Ok(png)
}

/// Page number encoded in a `pdftoppm` output name such as `page-07.png`
fn page_number(path: &Path, prefix: &str) -> Option<u32> {
    let name = path.file_name()?.to_str()?;
    name.strip_prefix(prefix)?
        .strip_prefix('-')?
        .strip_suffix(".png")?
        .parse()
        .ok()
}

/// Render every page to `page_001.png`, ... in `pdf_nova_pages.zip`
#[instrument(skip_all, fields(file = upload.display_name()))]
pub async fn pdf_to_images(
    upload: &Upload,
    locator: &ToolLocator,
    workspace: &Workspace,
) -> Result<Artifact> {
    let total = pdf::load(upload)?.get_pages().len();
    if total == 0 {
        return Err(NovaError::invalid("The PDF has no pages."));
    }
    let source = workspace.save_upload(upload)?;

    const PREFIX: &str = "raster";
    let dpi_arg = PAGES_DPI.to_string();
    let prefix = workspace.join(PREFIX);
    let args: [&OsStr; 5] = [
        "-r".as_ref(),
        dpi_arg.as_ref(),
        "-png".as_ref(),
        source.as_os_str(),
        prefix.as_os_str(),
    ];
    let output = locator
        .run(ExternalTool::Pdftoppm, args, locator.timeout())
        .await?;
    if !output.success() {
        warn!(stderr = %output.stderr_summary(), "pdftoppm failed");
        return Err(NovaError::ConversionFailed(
            "Could not render the PDF pages.".to_string(),
        ));
    }

    // pdftoppm pads the page number to the width of the page count
    let mut pages: Vec<(u32, PathBuf)> = workspace
        .files()?
        .into_iter()
        .filter_map(|path| page_number(&path, PREFIX).map(|n| (n, path)))
        .collect();
    pages.sort();
    debug!(expected = total, rendered = pages.len(), "pages rendered");
    if pages.is_empty() {
        return Err(NovaError::OutputMissing(
            "No page images were produced.".to_string(),
        ));
    }

    let mut entries = Vec::with_capacity(pages.len());
    for (number, path) in pages {
        entries.push((format!("page_{number:03}.png"), std::fs::read(path)?));
    }
    let data = zip_entries(entries.iter().map(|(n, b)| (n.as_str(), b.as_slice())))?;
    Ok(Artifact::new("pdf_nova_pages.zip", artifact::ZIP, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_number() {
        let n = |s: &str| page_number(Path::new(s), "raster");
        assert_eq!(n("/tmp/job_x/raster-1.png"), Some(1));
        assert_eq!(n("raster-07.png"), Some(7));
        assert_eq!(n("raster-120.png"), Some(120));
        assert_eq!(n("raster.png"), None);
        assert_eq!(n("other-1.png"), None);
        assert_eq!(n("raster-1.ppm"), None);
    }

    #[cfg(unix)]
    mod with_fake_pdftoppm {
        use super::super::*;
        use crate::config::ToolPaths;
        use crate::fixtures;
        use std::io::{Cursor, Read};
        use std::time::Duration;

        fn locator(pdftoppm: PathBuf) -> ToolLocator {
            ToolLocator::new(
                ToolPaths {
                    pdftoppm: Some(pdftoppm),
                    ..Default::default()
                },
                Duration::from_secs(10),
            )
        }

        #[tokio::test]
        async fn test_pdf_to_images_zips_sorted_pages() {
            let tools = tempfile::tempdir().unwrap();
            let work = tempfile::tempdir().unwrap();
            // Mimics pdftoppm's zero padding for a ten page document
            let fake = fixtures::fake_tool(
                tools.path(),
                "pdftoppm",
                r#"for i in 01 02 03 04 05 06 07 08 09 10; do printf 'png%s' "$i" > "$last-$i.png"; done"#,
            );
            let workspace = Workspace::create(work.path()).unwrap();
            let upload = Upload::new("ten.pdf", fixtures::numbered_document(10));

            let artifact = pdf_to_images(&upload, &locator(fake), &workspace)
                .await
                .unwrap();
            assert_eq!(artifact.file_name, "pdf_nova_pages.zip");

            let mut archive = zip::ZipArchive::new(Cursor::new(artifact.data)).unwrap();
            assert_eq!(archive.len(), 10);
            let mut first = String::new();
            archive
                .by_name("page_001.png")
                .unwrap()
                .read_to_string(&mut first)
                .unwrap();
            assert_eq!(first, "png01");
            assert!(archive.by_name("page_010.png").is_ok());
        }

        #[tokio::test]
        async fn test_render_page_failure() {
            let tools = tempfile::tempdir().unwrap();
            let work = tempfile::tempdir().unwrap();
            let fake = fixtures::fake_tool(tools.path(), "pdftoppm", "exit 1");
            let workspace = Workspace::create(work.path()).unwrap();
            let pdf_path = workspace
                .save_upload(&Upload::new("a.pdf", fixtures::numbered_document(1)))
                .unwrap();

            let err = render_page(&locator(fake), &workspace, &pdf_path, 1, OCR_DPI)
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), "Could not render page 1.");
        }
    }
}
