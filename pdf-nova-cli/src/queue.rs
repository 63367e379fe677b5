//! Files staged for one tool before they are sent

use anyhow::{bail, Result};
use pdf_nova::{FileInput, ToolDescriptor};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct FileQueue {
    tool: &'static str,
    input: FileInput,
    max_files: usize,
    files: Vec<PathBuf>,
}

impl FileQueue {
    /// `None` for tools that take no files
    pub fn new(tool: &ToolDescriptor, max_files: usize) -> Option<Self> {
        tool.file_input.map(|input| Self {
            tool: tool.id,
            input,
            max_files,
            files: Vec::new(),
        })
    }

    /// Stage a file; returns `false` when it was already queued
    ///
    /// Single-file tools replace whatever was staged before.
    pub fn add(&mut self, path: &Path) -> Result<bool> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !self.input.accepts(&name) {
            bail!(
                "{}: {} accepts {}",
                path.display(),
                self.tool,
                self.input.accept.join(", ")
            );
        }

        if !self.input.multiple {
            self.files.clear();
            self.files.push(path.to_path_buf());
            return Ok(true);
        }

        let key = identity(path);
        if self.files.iter().any(|f| identity(f) == key) {
            return Ok(false);
        }
        self.files.push(path.to_path_buf());
        Ok(true)
    }

    pub fn remove(&mut self, index: usize) -> Option<PathBuf> {
        (index < self.files.len()).then(|| self.files.remove(index))
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Multipart field the files are sent under
    pub fn field_name(&self) -> &'static str {
        self.input.name
    }

    /// Count checks run right before submission
    pub fn validate(&self) -> Result<()> {
        let min = self.input.min_files;
        if self.files.len() < min {
            let plural = if min > 1 { "s" } else { "" };
            bail!("{} needs at least {min} file{plural}.", self.tool);
        }
        if self.files.len() > self.max_files {
            bail!("Maximum {} files.", self.max_files);
        }
        Ok(())
    }
}

fn identity(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
