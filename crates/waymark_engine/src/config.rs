//! Configuration for the sync engine.

use std::time::Duration;

/// Configuration for sync behavior.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum failed upload attempts before an operation is dropped.
    pub max_retries: u32,
    /// Maximum number of operations dispatched per upload batch.
    pub upload_batch_size: usize,
    /// Interval between automatic sync passes while the process is active.
    pub sync_interval: Duration,
    /// Bounded timeout for each remote request.
    pub request_timeout: Duration,
}

impl SyncConfig {
    /// Creates a configuration with the default knobs.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_retries: 3,
            upload_batch_size: 50,
            sync_interval: Duration::from_secs(15 * 60),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the retry budget per operation.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the upload batch size.
    #[must_use]
    pub fn with_upload_batch_size(mut self, size: usize) -> Self {
        self.upload_batch_size = size;
        self
    }

    /// Sets the automatic sync interval.
    #[must_use]
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::new();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.sync_interval, Duration::from_secs(900));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn builder() {
        let config = SyncConfig::new()
            .with_max_retries(5)
            .with_upload_batch_size(10)
            .with_sync_interval(Duration::from_secs(60))
            .with_request_timeout(Duration::from_secs(5));

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.upload_batch_size, 10);
        assert_eq!(config.sync_interval, Duration::from_secs(60));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }
}
