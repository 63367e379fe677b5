//! DOCX, XLSX and PPTX to PDF through headless LibreOffice

use super::workbook;
use crate::artifact::Artifact;
use crate::error::{NovaError, Result};
use crate::external::{ExternalTool, ToolLocator};
use crate::upload::Upload;
use crate::workspace::Workspace;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

/// LibreOffice cold starts are slow; this is independent of the tool timeout
pub const OFFICE_TIMEOUT: Duration = Duration::from_secs(180);

const SINGLE_PAGE_INPUT: &str = "single_page_input.xlsx";

/// Convert with `soffice --headless --convert-to pdf`
///
/// Workbooks are first rewritten so each sheet prints on one landscape page.
#[instrument(skip_all, fields(file = upload.display_name()))]
pub async fn office_to_pdf(
    upload: &Upload,
    locator: &ToolLocator,
    workspace: &Workspace,
) -> Result<Artifact> {
    locator.require(ExternalTool::Soffice).await?;

    let is_workbook = upload.extension() == ".xlsx";
    let original = workspace.save_upload(upload)?;
    let input = if is_workbook {
        let fitted = workbook::fit_sheets_to_page(&upload.data)?;
        workspace.write(SINGLE_PAGE_INPUT, &fitted)?
    } else {
        original.clone()
    };

    let mut args: Vec<OsString> = vec!["--headless".into()];
    // A private profile keeps concurrent jobs off a running instance's lock
    if let Ok(profile) = Url::from_directory_path(workspace.join("lo_profile")) {
        args.push(format!("-env:UserInstallation={profile}").into());
    }
    args.extend(
        ["--convert-to", "pdf", "--outdir"]
            .iter()
            .map(OsString::from),
    );
    args.push(workspace.path().into());
    args.push(input.clone().into_os_string());

    let output = locator
        .run(ExternalTool::Soffice, &args, OFFICE_TIMEOUT)
        .await?;
    if !output.success() {
        warn!(stderr = %output.stderr_summary(), "soffice failed");
        return Err(NovaError::ConversionFailed(
            "Office -> PDF conversion failed.".to_string(),
        ));
    }

    // Some LibreOffice builds name the output after the original file
    let candidates: Vec<PathBuf> = vec![input.with_extension("pdf"), original.with_extension("pdf")];
    let Some(pdf_path) = candidates.into_iter().find(|p| p.is_file()) else {
        return Err(NovaError::OutputMissing(
            "Converted PDF not found.".to_string(),
        ));
    };
    debug!(path = %pdf_path.display(), "converted");

    let data = std::fs::read(&pdf_path)?;
    let file_name = if is_workbook {
        "pdf_nova_excel_single_page.pdf"
    } else {
        "pdf_nova_office.pdf"
    };
    Ok(Artifact::pdf(file_name, data))
}
