//! Uploaded files and the limits applied to them

use crate::error::{NovaError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

/// Default maximum number of files per request
pub const MAX_FILES: usize = 50;

/// Default maximum size of a single uploaded file
pub const MAX_FILE_BYTES: usize = 150 * 1024 * 1024;

lazy_static! {
    static ref UNSAFE_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9_.-]+").unwrap();
}

/// A file received from a form or read from disk
#[derive(Debug, Clone)]
pub struct Upload {
    /// Name as given by the client, possibly empty
    pub file_name: String,
    pub data: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            data,
        }
    }

    /// Read a file from disk, keeping its file name
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { file_name, data })
    }

    /// Lowercase extension with its leading dot, or an empty string
    pub fn extension(&self) -> String {
        extension_of(&self.file_name)
    }

    /// Name used in error messages
    pub fn display_name(&self) -> &str {
        if self.file_name.is_empty() {
            "upload"
        } else {
            &self.file_name
        }
    }

    /// File name safe to create inside a job directory
    pub fn disk_name(&self) -> String {
        format!("{}{}", safe_name(&self.file_name, "file"), self.extension())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Lowercase extension of `name` including the dot (`".pdf"`)
pub fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Reduce a client supplied name to `[A-Za-z0-9_.-]`, using its stem only
pub fn safe_name(name: &str, fallback: &str) -> String {
    let stem = if name.is_empty() {
        fallback.to_string()
    } else {
        Path::new(name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| fallback.to_string())
    };
    let cleaned = UNSAFE_CHARS.replace_all(&stem, "_");
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_');
    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Per-request upload limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_files: usize,
    pub max_file_bytes: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_files: MAX_FILES,
            max_file_bytes: MAX_FILE_BYTES,
        }
    }
}

impl UploadLimits {
    /// Check how many files were sent; `noun` names them in the message
    pub fn check_count(&self, count: usize, min: usize, noun: &str) -> Result<()> {
        if count < min {
            let plural = if min > 1 { "s" } else { "" };
            return Err(NovaError::invalid(format!(
                "Add at least {min} {noun}{plural}."
            )));
        }
        if count > self.max_files {
            return Err(NovaError::invalid(format!(
                "Maximum {} files.",
                self.max_files
            )));
        }
        Ok(())
    }

    pub fn check_size(&self, name: &str, size: usize) -> Result<()> {
        if size > self.max_file_bytes {
            return Err(NovaError::PayloadTooLarge(name.to_string()));
        }
        Ok(())
    }

    /// Largest request body worth reading, capped at 1 GiB
    pub fn body_limit(&self) -> usize {
        const CAP: usize = 1024 * 1024 * 1024;
        self.max_files
            .saturating_mul(self.max_file_bytes)
            .min(CAP)
    }
}
