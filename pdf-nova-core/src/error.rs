use thiserror::Error;

use crate::external::ExternalTool;

#[derive(Error, Debug)]
pub enum NovaError {
    /// A form value or upload the caller can fix
    #[error("{0}")]
    InvalidInput(String),

    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    /// The external program needed for this operation was not found
    #[error("{message}")]
    ToolUnavailable { tool: ExternalTool, message: String },

    /// The external program ran but refused the input
    #[error("{0}")]
    ConversionFailed(String),

    #[error("{tool} did not finish within {seconds}s")]
    ToolTimeout { tool: ExternalTool, seconds: u64 },

    #[error("Failed to launch {tool}: {source}")]
    ToolLaunch {
        tool: ExternalTool,
        #[source]
        source: std::io::Error,
    },

    /// An expected output file is missing after a successful run
    #[error("{0}")]
    OutputMissing(String),

    #[error("PDF write error: {0}")]
    PdfWrite(String),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NovaError {
    /// True when the request itself was at fault (maps to a 4xx status)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            NovaError::InvalidInput(_)
                | NovaError::InvalidPdf(_)
                | NovaError::InvalidImage(_)
                | NovaError::PayloadTooLarge(_)
                | NovaError::ToolUnavailable { .. }
                | NovaError::ConversionFailed(_)
        )
    }

    pub fn is_payload_too_large(&self) -> bool {
        matches!(self, NovaError::PayloadTooLarge(_))
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        NovaError::InvalidInput(message.into())
    }
}

pub type Result<T> = std::result::Result<T, NovaError>;
