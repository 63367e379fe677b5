//! Operation results and the size figures reported alongside them

use serde::{Deserialize, Serialize};

pub const PDF: &str = "application/pdf";
pub const ZIP: &str = "application/zip";
pub const TEXT: &str = "text/plain; charset=utf-8";
pub const MP4: &str = "video/mp4";
pub const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// A finished file, held in memory until it is sent or written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub media_type: &'static str,
    pub data: Vec<u8>,
}

impl Artifact {
    pub fn new(file_name: impl Into<String>, media_type: &'static str, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            media_type,
            data,
        }
    }

    pub fn pdf(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self::new(file_name, PDF, data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Human readable size: bytes below 1 KiB, then KB, MB, GB with one decimal
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SizeReport {
    pub input_bytes: u64,
    pub output_bytes: u64,
}

impl SizeReport {
    pub fn new(input_bytes: u64, output_bytes: u64) -> Self {
        Self {
            input_bytes,
            output_bytes,
        }
    }

    /// Output size as a fraction of the input, 0 for empty input
    pub fn ratio(&self) -> f64 {
        if self.input_bytes == 0 {
            return 0.0;
        }
        self.output_bytes as f64 / self.input_bytes as f64
    }

    /// Percentage saved; negative when the output grew
    pub fn saved_percent(&self) -> f64 {
        if self.input_bytes == 0 {
            return 0.0;
        }
        (1.0 - self.ratio()) * 100.0
    }

    /// `"1.2 MB -> 640.0 KB (47.9% saved)"`
    pub fn summary(&self) -> String {
        let saved = self.saved_percent();
        let verdict = if saved >= 0.0 {
            format!("{saved:.1}% saved")
        } else {
            format!("{:.1}% larger", -saved)
        };
        format!(
            "{} -> {} ({verdict})",
            format_bytes(self.input_bytes),
            format_bytes(self.output_bytes)
        )
    }
}

/// Name of the response header carrying [`NovaInfo`]
pub const INFO_HEADER: &str = "X-Nova-Info";

/// Per-response summary sent as JSON in the `X-Nova-Info` header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NovaInfo {
    pub operation: String,
    pub files: usize,
    #[serde(flatten)]
    pub sizes: SizeReport,
}

impl NovaInfo {
    pub fn new(operation: impl Into<String>, files: usize, sizes: SizeReport) -> Self {
        Self {
            operation: operation.into(),
            files,
            sizes,
        }
    }

    pub fn to_header_value(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GB");
        assert_eq!(format_bytes(4096 * 1024 * 1024 * 1024), "4096.0 GB");
    }

    #[test]
    fn test_size_report() {
        let report = SizeReport::new(2000, 500);
        assert_eq!(report.ratio(), 0.25);
        assert_eq!(report.saved_percent(), 75.0);
        assert_eq!(report.summary(), "2.0 KB -> 500 B (75.0% saved)");

        let grown = SizeReport::new(100, 150);
        assert_eq!(grown.summary(), "100 B -> 150 B (50.0% larger)");

        let empty = SizeReport::new(0, 10);
        assert_eq!(empty.ratio(), 0.0);
        assert_eq!(empty.saved_percent(), 0.0);
    }

    #[test]
    fn test_info_header_is_flat_json() {
        let info = NovaInfo::new("compress", 1, SizeReport::new(10, 4));
        let value: serde_json::Value = serde_json::from_str(&info.to_header_value()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "operation": "compress",
                "files": 1,
                "input_bytes": 10,
                "output_bytes": 4
            })
        );
    }

    #[test]
    fn test_artifact_helpers() {
        let artifact = Artifact::pdf("pdf_nova_merged.pdf", vec![1, 2]);
        assert_eq!(artifact.media_type, PDF);
        assert_eq!(artifact.len(), 2);
        assert!(!artifact.is_empty());
    }
}
