//! Kernel options and their TOML representation.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{KernelError, Result};
use crate::logging;

/// Tunables for a [`Kernel`](crate::Kernel).
///
/// Every field has a default, so a config file only names what it overrides:
///
/// ```toml
/// lock_wait_timeout_ms = 2500
/// log_filter = "sombra_kernel=debug"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KernelOptions {
    /// Upper bound on a single lock wait; `None` waits indefinitely.
    pub lock_wait_timeout_ms: Option<u64>,
    /// Initial capacity of each schema-state table.
    pub schema_state_capacity: usize,
    /// Filter directive used by [`KernelOptions::init_logging`].
    pub log_filter: String,
}

impl Default for KernelOptions {
    fn default() -> Self {
        Self {
            lock_wait_timeout_ms: Some(10_000),
            schema_state_capacity: 64,
            log_filter: "info".to_owned(),
        }
    }
}

impl KernelOptions {
    /// Parses options from TOML text.
    ///
    /// The log filter is checked here so a bad directive fails at load time.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let options: Self = toml::from_str(contents)
            .map_err(|err| KernelError::Config(format!("invalid kernel options: {err}")))?;
        logging::parse_filter(&options.log_filter)?;
        Ok(options)
    }

    /// Reads options from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| {
            KernelError::Config(format!("failed to read {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Renders the options as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|err| KernelError::Config(format!("failed to serialize options: {err}")))
    }

    /// Installs the global subscriber with `log_filter`.
    pub fn init_logging(&self) -> Result<()> {
        logging::init_logging(&self.log_filter)
    }

    pub fn lock_wait_timeout(&self) -> Option<Duration> {
        self.lock_wait_timeout_ms.map(Duration::from_millis)
    }
}
