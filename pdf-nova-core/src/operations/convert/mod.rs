//! Format conversions
//!
//! `pdf_to_docx` and `pdf_to_excel` are built from the text layer and need
//! nothing external. `pdf_to_images` needs `pdftoppm`, `office_to_pdf`
//! needs LibreOffice.

pub mod docx;
pub mod office;
pub mod raster;
pub mod workbook;
pub mod xlsx;

use crate::artifact::Artifact;
use crate::error::{NovaError, Result};
use crate::external::ToolLocator;
use crate::operations::images;
use crate::tools::{OFFICE_EXTENSIONS, PDF_EXTENSIONS};
use crate::upload::Upload;
use crate::workspace::Workspace;
use std::fmt;
use std::str::FromStr;
use tracing::instrument;

/// Raster formats accepted by `image_to_pdf`
const CONVERTIBLE_IMAGES: &[&str] = &[".png", ".jpg", ".jpeg", ".webp", ".bmp", ".tiff", ".tif"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertMode {
    ImageToPdf,
    OfficeToPdf,
    PdfToDocx,
    PdfToExcel,
    PdfToImages,
}

impl ConvertMode {
    pub const ALL: [ConvertMode; 5] = [
        ConvertMode::ImageToPdf,
        ConvertMode::OfficeToPdf,
        ConvertMode::PdfToDocx,
        ConvertMode::PdfToExcel,
        ConvertMode::PdfToImages,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConvertMode::ImageToPdf => "image_to_pdf",
            ConvertMode::OfficeToPdf => "office_to_pdf",
            ConvertMode::PdfToDocx => "pdf_to_docx",
            ConvertMode::PdfToExcel => "pdf_to_excel",
            ConvertMode::PdfToImages => "pdf_to_images",
        }
    }

    /// Reject inputs the mode cannot read, before any work is done
    fn check_input(self, upload: &Upload) -> Result<()> {
        let ext = upload.extension();
        let (accepted, what): (&[&str], &str) = match self {
            ConvertMode::ImageToPdf => (CONVERTIBLE_IMAGES, "an image file"),
            ConvertMode::OfficeToPdf => (OFFICE_EXTENSIONS, "a DOCX/XLSX/PPTX file"),
            _ => (PDF_EXTENSIONS, "a PDF file"),
        };
        if accepted.contains(&ext.as_str()) {
            Ok(())
        } else {
            Err(NovaError::invalid(format!("Mode {self}: {what} is required.")))
        }
    }
}

impl fmt::Display for ConvertMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConvertMode {
    type Err = NovaError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        ConvertMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = ConvertMode::ALL.iter().map(|m| m.as_str()).collect();
                NovaError::invalid(format!("Invalid mode. Use: {}", names.join(", ")))
            })
    }
}

#[instrument(skip_all, fields(file = upload.display_name(), %mode))]
pub async fn convert(
    upload: &Upload,
    mode: ConvertMode,
    locator: &ToolLocator,
    workspace: &Workspace,
) -> Result<Artifact> {
    mode.check_input(upload)?;
    match mode {
        ConvertMode::ImageToPdf => {
            images::build_image_pdf(std::slice::from_ref(upload), "pdf_nova_image.pdf")
        }
        ConvertMode::PdfToDocx => docx::pdf_to_docx(upload),
        ConvertMode::PdfToExcel => xlsx::pdf_to_excel(upload),
        ConvertMode::PdfToImages => raster::pdf_to_images(upload, locator, workspace).await,
        ConvertMode::OfficeToPdf => office::office_to_pdf(upload, locator, workspace).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolPaths;
    use crate::fixtures;
    use std::time::Duration;

    #[test]
    fn test_mode_parsing() {
        assert_eq!(" PDF_to_Docx ".parse::<ConvertMode>().unwrap(), ConvertMode::PdfToDocx);
        for mode in ConvertMode::ALL {
            assert_eq!(mode.as_str().parse::<ConvertMode>().unwrap(), mode);
        }
        assert_eq!(
            "pdf_to_png".parse::<ConvertMode>().unwrap_err().to_string(),
            "Invalid mode. Use: image_to_pdf, office_to_pdf, pdf_to_docx, pdf_to_excel, pdf_to_images"
        );
    }

    #[test]
    fn test_input_checks() {
        let pdf = Upload::new("a.pdf", Vec::new());
        let png = Upload::new("a.PNG", Vec::new());
        let gif = Upload::new("a.gif", Vec::new());
        let pptx = Upload::new("deck.pptx", Vec::new());

        assert!(ConvertMode::PdfToExcel.check_input(&pdf).is_ok());
        assert!(ConvertMode::ImageToPdf.check_input(&png).is_ok());
        assert!(ConvertMode::OfficeToPdf.check_input(&pptx).is_ok());

        let msg = |mode: ConvertMode, upload: &Upload| mode.check_input(upload).unwrap_err().to_string();
        assert_eq!(msg(ConvertMode::PdfToDocx, &png), "Mode pdf_to_docx: a PDF file is required.");
        assert_eq!(msg(ConvertMode::ImageToPdf, &gif), "Mode image_to_pdf: an image file is required.");
        assert_eq!(
            msg(ConvertMode::OfficeToPdf, &pdf),
            "Mode office_to_pdf: a DOCX/XLSX/PPTX file is required."
        );
    }

    #[tokio::test]
    async fn test_image_to_pdf() {
        let work = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(work.path()).unwrap();
        let locator = ToolLocator::new(ToolPaths::default(), Duration::from_secs(5));
        let upload = Upload::new("scan.jpg", fixtures::jpeg(100, 50));

        let artifact = convert(&upload, ConvertMode::ImageToPdf, &locator, &workspace)
            .await
            .unwrap();
        assert_eq!(artifact.file_name, "pdf_nova_image.pdf");
        let doc = lopdf::Document::load_mem(&artifact.data).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }
}
