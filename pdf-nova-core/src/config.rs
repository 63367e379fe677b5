//! Server and tool configuration
//!
//! Values are layered: built-in defaults, then an optional JSON file, then
//! environment variables. Binaries apply their command line flags last.

use crate::error::{NovaError, Result};
use crate::upload::UploadLimits;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8091;

/// Explicit locations of external programs; `None` means search for them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub tesseract: Option<PathBuf>,
    /// Passed to tesseract as `TESSDATA_PREFIX`
    pub tessdata_prefix: Option<PathBuf>,
    pub pdftoppm: Option<PathBuf>,
    pub soffice: Option<PathBuf>,
    pub yt_dlp: Option<PathBuf>,
    pub ffmpeg: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NovaConfig {
    pub host: String,
    pub port: u16,
    /// Parent of the per-request `job_*` directories
    pub work_dir: PathBuf,
    /// Serve front-end files from here instead of the embedded copies
    pub static_dir: Option<PathBuf>,
    pub max_files: usize,
    pub max_file_mb: usize,
    pub tool_timeout_secs: u64,
    pub tools: ToolPaths,
}

impl Default for NovaConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            work_dir: std::env::temp_dir().join("pdf_nova"),
            static_dir: None,
            max_files: crate::upload::MAX_FILES,
            max_file_mb: crate::upload::MAX_FILE_BYTES / (1024 * 1024),
            tool_timeout_secs: 180,
            tools: ToolPaths::default(),
        }
    }
}

impl NovaConfig {
    /// Read a JSON file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| NovaError::Config(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| NovaError::Config(format!("{}: {e}", path.display())))
    }

    /// Defaults or `path`, overridden by the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = get("PORT") {
            self.port = parse_env("PORT", &port)?;
        }
        if let Some(host) = get("PDF_NOVA_HOST") {
            self.host = host;
        }
        if let Some(dir) = get("PDF_NOVA_WORK_DIR") {
            self.work_dir = dir.into();
        }
        if let Some(dir) = get("PDF_NOVA_STATIC_DIR") {
            self.static_dir = Some(dir.into());
        }
        if let Some(n) = get("PDF_NOVA_MAX_FILES") {
            self.max_files = parse_env("PDF_NOVA_MAX_FILES", &n)?;
        }
        if let Some(mb) = get("PDF_NOVA_MAX_FILE_MB") {
            self.max_file_mb = parse_env("PDF_NOVA_MAX_FILE_MB", &mb)?;
        }
        if let Some(secs) = get("PDF_NOVA_TOOL_TIMEOUT") {
            self.tool_timeout_secs = parse_env("PDF_NOVA_TOOL_TIMEOUT", &secs)?;
        }

        let tools = &mut self.tools;
        for (key, slot) in [
            ("PDF_NOVA_TESSERACT", &mut tools.tesseract),
            ("TESSDATA_PREFIX", &mut tools.tessdata_prefix),
            ("PDF_NOVA_PDFTOPPM", &mut tools.pdftoppm),
            ("PDF_NOVA_SOFFICE", &mut tools.soffice),
            ("PDF_NOVA_YT_DLP", &mut tools.yt_dlp),
            ("PDF_NOVA_FFMPEG", &mut tools.ffmpeg),
        ] {
            if let Some(path) = get(key) {
                *slot = Some(path.into());
            }
        }
        Ok(())
    }

    pub fn upload_limits(&self) -> UploadLimits {
        UploadLimits {
            max_files: self.max_files.max(1),
            max_file_bytes: self.max_file_mb.max(1).saturating_mul(1024 * 1024),
        }
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs.max(1))
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| NovaError::Config(format!("{key} has an invalid value: {value}")))
}
