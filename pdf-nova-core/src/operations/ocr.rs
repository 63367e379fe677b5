//! Text recognition with `tesseract`
//!
//! PDF pages that already carry a usable text layer are not rendered at
//! all; the rest go through `pdftoppm` first.

use crate::artifact::{self, Artifact};
use crate::error::{NovaError, Result};
use crate::external::{ExternalTool, ToolLocator};
use crate::operations::convert::raster::{self, OCR_DPI};
use crate::pdf;
use crate::upload::Upload;
use crate::workspace::Workspace;
use lazy_static::lazy_static;
use regex::Regex;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

lazy_static! {
    static ref LANG: Regex = Regex::new(r"^[A-Za-z0-9_+]+$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrOptions {
    /// Tesseract language list, e.g. `fra+eng`
    pub lang: String,
    /// Use a page's text layer instead of OCR when it has this many chars
    pub min_chars: usize,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            lang: "fra+eng".to_string(),
            min_chars: 40,
        }
    }
}

impl OcrOptions {
    pub fn validate(&self) -> Result<()> {
        if !LANG.is_match(self.lang.trim()) {
            return Err(NovaError::invalid(format!(
                "Invalid OCR language: {}",
                self.lang.trim()
            )));
        }
        Ok(())
    }
}

async fn recognise(locator: &ToolLocator, image: &Path, lang: &str) -> Result<String> {
    let args: [&OsStr; 4] = [image.as_os_str(), "stdout".as_ref(), "-l".as_ref(), lang.as_ref()];
    let output = locator
        .run(ExternalTool::Tesseract, args, locator.timeout())
        .await?;
    if !output.success() {
        warn!(stderr = %output.stderr_summary(), "tesseract failed");
        return Err(NovaError::ConversionFailed(format!(
            "OCR failed. Check that the '{lang}' language data is installed."
        )));
    }
    Ok(output.stdout_text().trim().to_string())
}

/// Trimmed text layer of every page
fn text_layers(upload: &Upload) -> Result<Vec<String>> {
    let doc = pdf::load(upload)?;
    let total = doc.get_pages().len() as u32;
    Ok((1..=total)
        .map(|page| pdf::page_text(&doc, page).trim().to_string())
        .collect())
}

/// Re-encode any decodable image as PNG so tesseract can read it
fn normalised_image(upload: &Upload, workspace: &Workspace) -> Result<PathBuf> {
    let image = image::load_from_memory(&upload.data)
        .map_err(|_| NovaError::invalid("Unsupported image format."))?;
    let path = workspace.join("ocr_input.png");
    image
        .to_rgb8()
        .save_with_format(&path, image::ImageFormat::Png)
        .map_err(|e| NovaError::Io(std::io::Error::other(e)))?;
    Ok(path)
}

/// OCR a PDF or an image into `pdf_nova_ocr.txt`
#[instrument(skip_all, fields(file = upload.display_name(), lang = %options.lang))]
pub async fn ocr_text(
    upload: &Upload,
    options: &OcrOptions,
    locator: &ToolLocator,
    workspace: &Workspace,
) -> Result<Artifact> {
    options.validate()?;
    locator.require(ExternalTool::Tesseract).await?;
    let lang = options.lang.trim();

    let mut blocks = Vec::new();
    if upload.extension() == ".pdf" {
        let mut source: Option<PathBuf> = None;
        for (index, layer) in text_layers(upload)?.into_iter().enumerate() {
            let page = index as u32 + 1;
            let text = if layer.chars().count() >= options.min_chars {
                debug!(page, "using text layer");
                layer
            } else {
                let pdf_path = match source.clone() {
                    Some(path) => path,
                    None => {
                        let path = workspace.save_upload(upload)?;
                        source = Some(path.clone());
                        path
                    }
                };
                let image = raster::render_page(locator, workspace, &pdf_path, page, OCR_DPI).await?;
                recognise(locator, &image, lang).await?
            };
            blocks.push(format!("===== PAGE {page} =====\n{text}\n"));
        }
    } else {
        let image = normalised_image(upload, workspace)?;
        let text = recognise(locator, &image, lang).await?;
        blocks.push(format!("===== IMAGE =====\n{text}\n"));
    }

    Ok(Artifact::new(
        "pdf_nova_ocr.txt",
        artifact::TEXT,
        blocks.join("\n").into_bytes(),
    ))
}
