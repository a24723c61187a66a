//! Configuration for conversion runs.
//!
//! All supervision timings and pipeline options live in [`ConverterConfig`],
//! built via its [`ConverterConfigBuilder`]. One struct shared by every task
//! keeps the cancellation latency contract in one place: a cancel request is
//! noticed within `poll_interval_ms`, and a backend that ignores SIGTERM is
//! killed `kill_grace_secs` later.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration shared by the supervisor, the pipeline, and the orchestrator.
///
/// Built via [`ConverterConfig::builder()`] or using
/// [`ConverterConfig::default()`].
///
/// # Example
/// ```rust
/// use deck2pdf::ConverterConfig;
///
/// let config = ConverterConfig::builder()
///     .command_timeout_secs(300)
///     .keep_temp_files(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.poll_interval_ms, 200);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// How often a running backend process is checked for exit, cancel, and
    /// timeout. Default: 200.
    ///
    /// This is the lower bound of cancellation latency.
    pub poll_interval_ms: u64,

    /// Grace period between SIGTERM and a forced kill. Default: 5.
    pub kill_grace_secs: u64,

    /// Maximum wall-clock time for one file's conversion. Default: 180.
    ///
    /// Office suites occasionally hang on a modal dialog (recovery prompt,
    /// missing font warning). Without a timeout the task would never finish.
    pub command_timeout_secs: u64,

    /// Delay before separate-mode outputs are deleted after a cancel.
    /// Default: 1000.
    ///
    /// A backend killed mid-write may still flush its last file; waiting a
    /// moment makes the cleanup see it. This is a heuristic, not a guarantee.
    pub cancel_cleanup_grace_ms: u64,

    /// Keep the merge-mode temp directory instead of deleting it. Default: false.
    pub keep_temp_files: bool,

    /// Open the result in the OS default handler after success. Default: false.
    pub open_after_conversion: bool,

    /// Longest file name shown in a task tab label before truncation. Default: 18.
    pub max_tab_label_len: usize,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 200,
            kill_grace_secs: 5,
            command_timeout_secs: 180,
            cancel_cleanup_grace_ms: 1000,
            keep_temp_files: false,
            open_after_conversion: false,
            max_tab_label_len: 18,
        }
    }
}

impl ConverterConfig {
    /// Create a new builder for `ConverterConfig`.
    pub fn builder() -> ConverterConfigBuilder {
        ConverterConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_secs(self.kill_grace_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn cancel_cleanup_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_cleanup_grace_ms)
    }
}

/// Builder for [`ConverterConfig`].
#[derive(Debug)]
pub struct ConverterConfigBuilder {
    config: ConverterConfig,
}

impl ConverterConfigBuilder {
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn kill_grace_secs(mut self, secs: u64) -> Self {
        self.config.kill_grace_secs = secs;
        self
    }

    pub fn command_timeout_secs(mut self, secs: u64) -> Self {
        self.config.command_timeout_secs = secs;
        self
    }

    pub fn cancel_cleanup_grace_ms(mut self, ms: u64) -> Self {
        self.config.cancel_cleanup_grace_ms = ms;
        self
    }

    pub fn keep_temp_files(mut self, v: bool) -> Self {
        self.config.keep_temp_files = v;
        self
    }

    pub fn open_after_conversion(mut self, v: bool) -> Self {
        self.config.open_after_conversion = v;
        self
    }

    pub fn max_tab_label_len(mut self, len: usize) -> Self {
        self.config.max_tab_label_len = len.max(1);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConverterConfig, ConvertError> {
        let c = &self.config;
        if c.poll_interval_ms < 10 {
            return Err(ConvertError::InvalidConfig(format!(
                "Poll interval must be ≥ 10ms, got {}",
                c.poll_interval_ms
            )));
        }
        if c.command_timeout_secs == 0 {
            return Err(ConvertError::InvalidConfig(
                "Command timeout must be ≥ 1s".into(),
            ));
        }
        Ok(self.config)
    }
}
