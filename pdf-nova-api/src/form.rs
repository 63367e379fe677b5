//! Multipart form collection

use crate::error::AppError;
use axum::extract::Multipart;
use pdf_nova::{NovaError, Upload, UploadLimits};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;

/// Part names treated as uploaded files
const FILE_FIELDS: &[&str] = &["file", "files", "files[]"];

/// Uploaded files in arrival order plus the text fields of one request
#[derive(Debug, Default)]
pub struct FormData {
    pub files: Vec<Upload>,
    fields: HashMap<String, String>,
}

impl FormData {
    /// Read the whole body, enforcing the per-file size and file count limits
    /// while parts stream in
    pub async fn collect(mut multipart: Multipart, limits: &UploadLimits) -> Result<Self, AppError> {
        let mut form = FormData::default();

        while let Some(mut field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if !FILE_FIELDS.contains(&name.as_str()) {
                let value = field.text().await?;
                form.fields.insert(name, value);
                continue;
            }

            let file_name = field.file_name().unwrap_or_default().to_string();
            let mut data = Vec::new();
            while let Some(chunk) = field.chunk().await? {
                limits.check_size(display(&file_name), data.len() + chunk.len())?;
                data.extend_from_slice(&chunk);
            }
            // Browsers send an empty part for an untouched file input
            if file_name.is_empty() && data.is_empty() {
                continue;
            }
            debug!(file = %file_name, bytes = data.len(), "upload received");
            form.files.push(Upload::new(file_name, data));
            limits.check_count(form.files.len(), 0, "file")?;
        }
        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Value of `name`, or `default` when the field was not sent
    pub fn text_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.text(name).unwrap_or(default)
    }

    /// Parse a numeric field; missing or blank means `default`
    pub fn number<T: FromStr>(&self, name: &str, default: T) -> Result<T, AppError> {
        match self.text(name).map(str::trim) {
            None | Some("") => Ok(default),
            Some(raw) => raw
                .parse()
                .map_err(|_| AppError::BadField(format!("{name} must be a number."))),
        }
    }

    /// The first uploaded file of a single-file tool
    pub fn single_file(&mut self) -> Result<Upload, AppError> {
        if self.files.is_empty() {
            return Err(NovaError::InvalidInput("A file is required.".to_string()).into());
        }
        Ok(self.files.swap_remove(0))
    }
}

fn display(file_name: &str) -> &str {
    if file_name.is_empty() {
        "upload"
    } else {
        file_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(fields: &[(&str, &str)]) -> FormData {
        FormData {
            files: Vec::new(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_number_fields() {
        let data = form(&[("chunk_size", " 3 "), ("opacity", ""), ("min_chars", "many")]);
        assert_eq!(data.number::<usize>("chunk_size", 1).unwrap(), 3);
        assert_eq!(data.number::<f64>("opacity", 0.15).unwrap(), 0.15);
        assert_eq!(data.number::<usize>("missing", 80).unwrap(), 80);
        assert_eq!(
            data.number::<usize>("min_chars", 40).unwrap_err().to_string(),
            "min_chars must be a number."
        );
    }

    #[test]
    fn test_text_defaults() {
        let data = form(&[("pages", "")]);
        assert_eq!(data.text_or("pages", "all"), "");
        assert_eq!(data.text_or("lang", "fra+eng"), "fra+eng");
    }

    #[test]
    fn test_single_file_takes_first() {
        let mut data = form(&[]);
        assert_eq!(
            data.single_file().unwrap_err().to_string(),
            "A file is required."
        );
        data.files.push(Upload::new("a.pdf", vec![1]));
        data.files.push(Upload::new("b.pdf", vec![2]));
        assert_eq!(data.single_file().unwrap().file_name, "a.pdf");
    }
}
