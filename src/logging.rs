use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{KernelError, Result};

/// Parses a filter directive such as `sombra_kernel=debug,warn`.
pub(crate) fn parse_filter(filter: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(filter)
        .map_err(|e| KernelError::Config(format!("invalid log filter `{filter}`: {e}")))
}

/// Installs a global `fmt` subscriber filtered by `filter`.
///
/// [`KernelOptions::init_logging`](crate::KernelOptions::init_logging) calls this
/// with the configured `log_filter`. Fails when the filter does not parse or a
/// subscriber is already installed.
pub fn init_logging(filter: &str) -> Result<()> {
    fmt()
        .with_env_filter(parse_filter(filter)?)
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|_| KernelError::Config("logging already initialized".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KernelOptions;

    #[test]
    fn rejects_bad_filter() {
        let err = init_logging("sombra_kernel=loud").unwrap_err();
        assert!(matches!(err, KernelError::Config(msg) if msg.contains("sombra_kernel=loud")));
    }

    #[test]
    fn default_filter_parses() {
        parse_filter(&KernelOptions::default().log_filter).unwrap();
        parse_filter("sombra_kernel=trace,warn").unwrap();
    }
}
