//! Status report source backed by the daemon's status file

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use oa_core::error::SourceError;
use oa_core::traits::StatusSource;

/// Reads the status report the VPN daemon rewrites periodically
pub struct FileStatusSource {
    path: PathBuf,
}

impl FileStatusSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StatusSource for FileStatusSource {
    async fn read_current_report(&self) -> Result<String, SourceError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.path.clone(),
                source,
            })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
