use pdf_nova::{NovaConfig, Result, ToolLocator, UploadLimits, Workspace};
use std::sync::Arc;

/// Shared by every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<NovaConfig>,
    pub locator: ToolLocator,
    pub limits: UploadLimits,
}

impl AppState {
    pub fn new(config: NovaConfig) -> Self {
        Self {
            locator: ToolLocator::from_config(&config),
            limits: config.upload_limits(),
            config: Arc::new(config),
        }
    }

    /// Fresh job directory under the configured work dir
    pub fn workspace(&self) -> Result<Workspace> {
        Workspace::create(&self.config.work_dir)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(NovaConfig::default())
    }
}
