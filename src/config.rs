//! Configuration for CineVault
//!
//! Centralized configuration with sensible defaults; the server binary maps
//! its CLI flags onto the builder.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CineError, Result};

/// Default listener port.
pub const DEFAULT_PORT: u16 = 12345;

/// Default bounded capacity of the work queue; must stay a power of two.
pub const DEFAULT_QUEUE_CAPACITY: usize = 128;

/// Main configuration for a CineVault server instance.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path of the store file.
    pub database_path: PathBuf,

    /// Listener TCP port.
    pub port: u16,

    /// Number of worker threads.
    pub worker_count: usize,

    /// Bounded capacity of the work queue (power of two).
    pub queue_capacity: usize,

    /// Receive and send timeout stamped on every accepted client socket.
    pub client_timeout: Duration,

    /// Spin count of the admission path before a connection is rejected.
    pub max_enqueue_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: PathBuf::from("movies.db"),
            port: DEFAULT_PORT,
            worker_count: default_worker_count(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            client_timeout: Duration::from_secs(60),
            max_enqueue_retries: 100,
        }
    }
}

/// Host CPU count, with a small fallback when it cannot be determined.
fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(4)
}

impl Config {
    /// Create a new config builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the cross-field constraints the components rely on.
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(CineError::Config(
                "worker_count must be positive".to_owned(),
            ));
        }
        if !self.queue_capacity.is_power_of_two() {
            return Err(CineError::Config(
                "queue_capacity must be a power of two".to_owned(),
            ));
        }
        if self.client_timeout.is_zero() {
            return Err(CineError::Config(
                "client_timeout must be non-zero".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.database_path = path.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn worker_count(mut self, count: usize) -> Self {
        self.config.worker_count = count;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    pub fn client_timeout(mut self, timeout: Duration) -> Self {
        self.config.client_timeout = timeout;
        self
    }

    pub fn max_enqueue_retries(mut self, retries: u32) -> Self {
        self.config.max_enqueue_retries = retries;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert!(config.worker_count > 0);
    }

    #[test]
    fn test_builder_overrides() {
        let config = Config::builder()
            .database_path("/tmp/test.db")
            .port(9000)
            .worker_count(2)
            .queue_capacity(64)
            .client_timeout(Duration::from_secs(5))
            .max_enqueue_retries(10)
            .build();
        assert_eq!(config.database_path.to_str().unwrap(), "/tmp/test.db");
        assert_eq!(config.port, 9000);
        assert_eq!(config.worker_count, 2);
        assert_eq!(config.queue_capacity, 64);
        assert_eq!(config.max_enqueue_retries, 10);
    }

    #[test]
    fn test_validation_rejects_bad_capacity() {
        let config = Config::builder().queue_capacity(100).build();
        assert!(config.validate().is_err());
    }
}
