//! # pdf-nova
//!
//! Document operations behind the PDF Nova server and command line tool.
//!
//! ## Features
//!
//! - **PDF rewriting**: merge, split, extract, rotate, watermark, compress and
//!   blank-page removal on top of `lopdf`
//! - **Images to PDF**: any image the `image` crate decodes, one page each
//! - **Conversions**: PDF to DOCX, XLSX or PNG pages, Office documents to PDF
//! - **OCR and video**: delegated to `tesseract`, `pdftoppm`, `yt-dlp` and
//!   `soffice` when they are installed
//! - **Tool registry**: declarative descriptors the front end renders forms from
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_nova::operations::merge;
//! use pdf_nova::{Upload, UploadLimits};
//!
//! # fn main() -> pdf_nova::Result<()> {
//! let a = Upload::from_path("a.pdf".as_ref())?;
//! let b = Upload::from_path("b.pdf".as_ref())?;
//! let artifact = merge(&[a, b], &UploadLimits::default())?;
//! std::fs::write(&artifact.file_name, &artifact.data)?;
//! # Ok(())
//! # }
//! ```
//!
//! Operations that need an external program take a [`ToolLocator`] and a
//! [`Workspace`], and are async:
//!
//! ```rust,no_run
//! use pdf_nova::operations::{ocr_text, OcrOptions};
//! use pdf_nova::{NovaConfig, ToolLocator, Upload, Workspace};
//!
//! # async fn run() -> pdf_nova::Result<()> {
//! let config = NovaConfig::default();
//! let locator = ToolLocator::from_config(&config);
//! let workspace = Workspace::create(&config.work_dir)?;
//! let scan = Upload::from_path("scan.pdf".as_ref())?;
//! let text = ocr_text(&scan, &OcrOptions::default(), &locator, &workspace).await?;
//! println!("{}", String::from_utf8_lossy(&text.data));
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod config;
pub mod error;
pub mod external;
pub mod layout;
pub mod operations;
pub mod page_range;
pub mod pdf;
pub mod tools;
pub mod upload;
pub mod workspace;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

pub use artifact::{format_bytes, Artifact, NovaInfo, SizeReport};
pub use config::{NovaConfig, ToolPaths};
pub use error::{NovaError, Result};
pub use external::{Capabilities, ExternalTool, ToolLocator};
pub use page_range::PageSelection;
pub use tools::{registry, Capability, FieldKind, FileInput, FormField, ToolDescriptor};
pub use upload::{safe_name, Upload, UploadLimits};
pub use workspace::{cleanup_stale_jobs, Workspace};

/// Current version of pdf-nova
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application id reported by the health endpoint
pub const APP_ID: &str = "pdf_nova";
