//! Status source trait

use async_trait::async_trait;

use crate::error::SourceError;

/// Provides the VPN daemon's latest status report
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Read the current report text
    async fn read_current_report(&self) -> Result<String, SourceError>;
}
