//! External programs: discovery, probing and execution
//!
//! Rasterising, OCR, office conversion and video download are done by
//! separate programs. A [`ToolLocator`] decides which executable to use for
//! each one and runs it with a timeout; [`Capabilities`] summarises what is
//! installed for the front end.

use crate::config::{NovaConfig, ToolPaths};
use crate::error::{NovaError, Result};
use crate::tools::Capability;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Probes only print a version; they never need the full tool timeout
const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalTool {
    Tesseract,
    Pdftoppm,
    Soffice,
    YtDlp,
    Ffmpeg,
}

impl ExternalTool {
    pub const ALL: [ExternalTool; 5] = [
        ExternalTool::Tesseract,
        ExternalTool::Pdftoppm,
        ExternalTool::Soffice,
        ExternalTool::YtDlp,
        ExternalTool::Ffmpeg,
    ];

    /// Executable name looked up on `PATH`
    pub fn program(self) -> &'static str {
        match self {
            ExternalTool::Tesseract => "tesseract",
            ExternalTool::Pdftoppm => "pdftoppm",
            ExternalTool::Soffice => "soffice",
            ExternalTool::YtDlp => "yt-dlp",
            ExternalTool::Ffmpeg => "ffmpeg",
        }
    }

    fn version_args(self) -> &'static [&'static str] {
        match self {
            ExternalTool::Ffmpeg => &["-version"],
            ExternalTool::Pdftoppm => &["-v"],
            _ => &["--version"],
        }
    }

    /// Message returned to the client when the tool cannot be found
    pub fn missing_message(self) -> &'static str {
        match self {
            ExternalTool::Tesseract => {
                "Tesseract not found. Install Tesseract OCR and add it to PATH."
            }
            ExternalTool::Pdftoppm => {
                "pdftoppm not found. Install poppler-utils to render PDF pages."
            }
            ExternalTool::Soffice => {
                "LibreOffice not found. Install LibreOffice to convert to PDF."
            }
            ExternalTool::YtDlp => "yt-dlp not found. Install yt-dlp to extract videos.",
            ExternalTool::Ffmpeg => "ffmpeg not found. Install ffmpeg and add it to PATH.",
        }
    }

    /// Usual install locations outside `PATH`
    fn install_locations(self) -> Vec<PathBuf> {
        let program = self.program();
        let mut found = Vec::new();

        if cfg!(target_os = "windows") {
            let exe = format!("{program}.exe");
            match self {
                ExternalTool::Tesseract => {
                    found.push(PathBuf::from(r"C:\Program Files\Tesseract-OCR").join(&exe));
                }
                ExternalTool::Soffice => {
                    for base in [r"C:\Program Files", r"C:\Program Files (x86)"] {
                        found.push(Path::new(base).join(r"LibreOffice\program").join(&exe));
                    }
                }
                _ => {}
            }
            return found;
        }

        if cfg!(target_os = "macos") {
            if self == ExternalTool::Soffice {
                found.push(PathBuf::from(
                    "/Applications/LibreOffice.app/Contents/MacOS/soffice",
                ));
            }
            found.push(Path::new("/opt/homebrew/bin").join(program));
        }

        found.push(Path::new("/usr/local/bin").join(program));
        found.push(Path::new("/usr/bin").join(program));
        if self == ExternalTool::Soffice {
            found.push(PathBuf::from("/usr/lib/libreoffice/program/soffice"));
            found.push(PathBuf::from("/opt/libreoffice/program/soffice"));
        }
        found
    }
}

impl fmt::Display for ExternalTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExternalTool::Tesseract => "Tesseract",
            ExternalTool::Soffice => "LibreOffice",
            other => other.program(),
        };
        f.write_str(name)
    }
}

/// Captured result of a finished process
#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Last non-empty stderr line, for log messages
    pub fn stderr_summary(&self) -> String {
        String::from_utf8_lossy(&self.stderr)
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or_default()
            .trim()
            .to_string()
    }
}

/// A located tool and the version line it printed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolVersion {
    pub path: PathBuf,
    pub version: Option<String>,
}

/// Finds and runs external programs
///
/// Clones share the set of resolved executables, so a tool is looked up once
/// per locator and not once per page or request.
#[derive(Debug, Clone)]
pub struct ToolLocator {
    paths: ToolPaths,
    timeout: Duration,
    resolved: Arc<Mutex<HashMap<ExternalTool, PathBuf>>>,
}

impl Default for ToolLocator {
    fn default() -> Self {
        Self::new(ToolPaths::default(), Duration::from_secs(180))
    }
}

impl ToolLocator {
    pub fn new(paths: ToolPaths, timeout: Duration) -> Self {
        Self {
            paths,
            timeout,
            resolved: Arc::default(),
        }
    }

    pub fn from_config(config: &NovaConfig) -> Self {
        Self::new(config.tools.clone(), config.tool_timeout())
    }

    /// Default timeout for [`ToolLocator::run`] callers
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn configured(&self, tool: ExternalTool) -> Option<&PathBuf> {
        match tool {
            ExternalTool::Tesseract => self.paths.tesseract.as_ref(),
            ExternalTool::Pdftoppm => self.paths.pdftoppm.as_ref(),
            ExternalTool::Soffice => self.paths.soffice.as_ref(),
            ExternalTool::YtDlp => self.paths.yt_dlp.as_ref(),
            ExternalTool::Ffmpeg => self.paths.ffmpeg.as_ref(),
        }
    }

    /// Candidate executables in lookup order
    pub fn candidates(&self, tool: ExternalTool) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(path) = self.configured(tool) {
            candidates.push(path.clone());
        }
        candidates.push(PathBuf::from(tool.program()));
        for path in tool.install_locations() {
            if !candidates.contains(&path) {
                candidates.push(path);
            }
        }
        candidates
    }

    /// First usable candidate
    ///
    /// Paths with a directory component must exist; bare names must spawn.
    pub async fn locate(&self, tool: ExternalTool) -> Option<PathBuf> {
        for candidate in self.candidates(tool) {
            let is_bare = candidate.components().count() == 1 && !candidate.is_absolute();
            if !is_bare {
                if candidate.is_file() {
                    return Some(candidate);
                }
                continue;
            }
            if self.spawns(tool, &candidate).await {
                return Some(candidate);
            }
        }
        debug!(%tool, "not found");
        None
    }

    async fn spawns(&self, tool: ExternalTool, program: &Path) -> bool {
        let mut cmd = Command::new(program);
        cmd.args(tool.version_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        match cmd.spawn() {
            Ok(mut child) => {
                let _ = tokio::time::timeout(PROBE_TIMEOUT, child.wait()).await;
                true
            }
            Err(_) => false,
        }
    }

    /// Locate a tool and read its version line
    pub async fn probe(&self, tool: ExternalTool) -> Option<ToolVersion> {
        let path = self.locate(tool).await?;
        let version = match self.exec(tool, &path, tool.version_args(), PROBE_TIMEOUT).await {
            Ok(output) => first_line(&output.stdout).or_else(|| first_line(&output.stderr)),
            Err(e) => {
                warn!(%tool, error = %e, "version probe failed");
                None
            }
        };
        Some(ToolVersion { path, version })
    }

    fn cached(&self, tool: ExternalTool) -> Option<PathBuf> {
        self.resolved
            .lock()
            .ok()
            .and_then(|resolved| resolved.get(&tool).cloned())
    }

    /// Locate a tool or fail with a message the client can act on
    ///
    /// Successful lookups are remembered; [`ToolLocator::locate`] always
    /// searches again.
    pub async fn require(&self, tool: ExternalTool) -> Result<PathBuf> {
        if let Some(path) = self.cached(tool) {
            return Ok(path);
        }
        let path = self
            .locate(tool)
            .await
            .ok_or_else(|| NovaError::ToolUnavailable {
                tool,
                message: tool.missing_message().to_string(),
            })?;
        if let Ok(mut resolved) = self.resolved.lock() {
            resolved.insert(tool, path.clone());
        }
        Ok(path)
    }

    /// Run a tool to completion, killing it after `timeout`
    pub async fn run<I, S>(&self, tool: ExternalTool, args: I, timeout: Duration) -> Result<ToolOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let program = self.require(tool).await?;
        self.exec(tool, &program, args, timeout).await
    }

    async fn exec<I, S>(
        &self,
        tool: ExternalTool,
        program: &Path,
        args: I,
        timeout: Duration,
    ) -> Result<ToolOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if tool == ExternalTool::Tesseract {
            if let Some(prefix) = &self.paths.tessdata_prefix {
                cmd.env("TESSDATA_PREFIX", prefix);
            }
        }

        debug!(%tool, program = %program.display(), "running");
        let child = cmd
            .spawn()
            .map_err(|source| NovaError::ToolLaunch { tool, source })?;

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                Ok(ToolOutput {
                    status: output.status,
                    stdout: output.stdout,
                    stderr: output.stderr,
                })
            }
            Err(_) => {
                warn!(%tool, seconds = timeout.as_secs(), "timed out");
                Err(NovaError::ToolTimeout {
                    tool,
                    seconds: timeout.as_secs(),
                })
            }
        }
    }
}

fn first_line(bytes: &[u8]) -> Option<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

/// What the installed external programs allow, as served to the front end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub ocr_available: bool,
    pub ocr_note: String,
    pub video_extract_available: bool,
    pub video_extract_note: String,
    pub office_to_pdf_available: bool,
    pub office_to_pdf_note: String,
    pub raster_available: bool,
    pub raster_note: String,
}

impl Capabilities {
    pub async fn detect(locator: &ToolLocator) -> Self {
        let (tesseract, pdftoppm, soffice, yt_dlp, ffmpeg) = tokio::join!(
            locator.probe(ExternalTool::Tesseract),
            locator.probe(ExternalTool::Pdftoppm),
            locator.probe(ExternalTool::Soffice),
            locator.probe(ExternalTool::YtDlp),
            locator.probe(ExternalTool::Ffmpeg),
        );

        let ocr_note = match &tesseract {
            Some(found) => format!(
                "Tesseract found: {}",
                found.version.as_deref().unwrap_or("unknown version")
            ),
            None => "Tesseract is not installed or not on PATH.".to_string(),
        };
        let video_extract_note = match (&yt_dlp, &ffmpeg) {
            (Some(_), Some(_)) => "yt-dlp and ffmpeg found.".to_string(),
            (Some(_), None) => {
                "yt-dlp found. ffmpeg is needed for best audio+video merging.".to_string()
            }
            (None, _) => ExternalTool::YtDlp.missing_message().to_string(),
        };
        let office_to_pdf_note = match &soffice {
            Some(_) => "LibreOffice found for DOCX/XLSX/PPTX -> PDF.".to_string(),
            None => "LibreOffice required for DOCX/XLSX/PPTX -> PDF.".to_string(),
        };
        let raster_note = match &pdftoppm {
            Some(_) => "pdftoppm found for PDF -> images and scanned-page OCR.".to_string(),
            None => "pdftoppm (poppler) required for PDF -> images and scanned-page OCR."
                .to_string(),
        };

        Self {
            ocr_available: tesseract.is_some(),
            ocr_note,
            video_extract_available: yt_dlp.is_some(),
            video_extract_note,
            office_to_pdf_available: soffice.is_some(),
            office_to_pdf_note,
            raster_available: pdftoppm.is_some(),
            raster_note,
        }
    }

    pub fn allows(&self, gate: Capability) -> bool {
        match gate {
            Capability::Ocr => self.ocr_available,
            Capability::Video => self.video_extract_available,
            Capability::Office => self.office_to_pdf_available,
            Capability::Raster => self.raster_available,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names() {
        assert_eq!(ExternalTool::Tesseract.to_string(), "Tesseract");
        assert_eq!(ExternalTool::Pdftoppm.to_string(), "pdftoppm");
        assert_eq!(ExternalTool::Soffice.to_string(), "LibreOffice");
        assert_eq!(ExternalTool::YtDlp.to_string(), "yt-dlp");
        assert_eq!(ExternalTool::Ffmpeg.to_string(), "ffmpeg");
    }

    #[test]
    fn test_configured_path_comes_first() {
        let paths = ToolPaths {
            soffice: Some(PathBuf::from("/custom/soffice")),
            ..Default::default()
        };
        let locator = ToolLocator::new(paths, Duration::from_secs(5));
        let candidates = locator.candidates(ExternalTool::Soffice);
        assert_eq!(candidates[0], PathBuf::from("/custom/soffice"));
        assert_eq!(candidates[1], PathBuf::from("soffice"));

        let candidates = locator.candidates(ExternalTool::Tesseract);
        assert_eq!(candidates[0], PathBuf::from("tesseract"));
    }

    #[tokio::test]
    async fn test_locate_accepts_existing_configured_file() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("yt-dlp");
        std::fs::write(&fake, b"").unwrap();

        let locator = ToolLocator::new(
            ToolPaths {
                yt_dlp: Some(fake.clone()),
                ..Default::default()
            },
            Duration::from_secs(5),
        );
        assert_eq!(locator.locate(ExternalTool::YtDlp).await, Some(fake));
    }

    #[tokio::test]
    async fn test_require_remembers_the_located_path() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("pdftoppm");
        std::fs::write(&fake, b"").unwrap();

        let locator = ToolLocator::new(
            ToolPaths {
                pdftoppm: Some(fake.clone()),
                ..Default::default()
            },
            Duration::from_secs(5),
        );
        let shared = locator.clone();
        assert_eq!(locator.require(ExternalTool::Pdftoppm).await.unwrap(), fake);

        // Later calls, clones included, skip the lookup
        std::fs::remove_file(&fake).unwrap();
        assert_eq!(shared.require(ExternalTool::Pdftoppm).await.unwrap(), fake);
        assert_ne!(locator.locate(ExternalTool::Pdftoppm).await, Some(fake));
    }

    #[tokio::test]
    async fn test_missing_tool_is_not_remembered() {
        let dir = tempfile::tempdir().unwrap();
        let locator = ToolLocator::new(
            ToolPaths {
                soffice: Some(dir.path().join("soffice")),
                ..Default::default()
            },
            Duration::from_secs(5),
        );
        assert!(locator.cached(ExternalTool::Soffice).is_none());
        if locator.require(ExternalTool::Soffice).await.is_err() {
            assert!(locator.cached(ExternalTool::Soffice).is_none());
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captures_output() {
        let locator = ToolLocator::new(
            ToolPaths {
                ffmpeg: Some(PathBuf::from("/bin/sh")),
                ..Default::default()
            },
            Duration::from_secs(5),
        );
        let output = locator
            .run(ExternalTool::Ffmpeg, ["-c", "echo nova; echo oops >&2"], Duration::from_secs(5))
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout_text().trim(), "nova");
        assert_eq!(output.stderr_summary(), "oops");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_times_out() {
        let locator = ToolLocator::new(
            ToolPaths {
                soffice: Some(PathBuf::from("/bin/sh")),
                ..Default::default()
            },
            Duration::from_secs(5),
        );
        let err = locator
            .run(ExternalTool::Soffice, ["-c", "sleep 5"], Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, NovaError::ToolTimeout { seconds: 0, .. }));
    }

    #[test]
    fn test_capability_gates() {
        let caps = Capabilities {
            ocr_available: true,
            ocr_note: String::new(),
            video_extract_available: false,
            video_extract_note: String::new(),
            office_to_pdf_available: true,
            office_to_pdf_note: String::new(),
            raster_available: false,
            raster_note: String::new(),
        };
        assert!(caps.allows(Capability::Ocr));
        assert!(!caps.allows(Capability::Video));
        assert!(caps.allows(Capability::Office));
        assert!(!caps.allows(Capability::Raster));
    }

    #[test]
    fn test_first_line() {
        assert_eq!(
            first_line(b"\n  tesseract 5.3.0\n leptonica"),
            Some("tesseract 5.3.0".to_string())
        );
        assert_eq!(first_line(b"  \n"), None);
    }
}
