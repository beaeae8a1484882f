//! Global `tracing` subscriber setup.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::{Error, Result};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(Error::InvalidInput(format!(
                "TRIBUTARY_LOG_FORMAT must be 'json' or 'pretty', got '{other}'"
            ))),
        }
    }
}

/// Reads `TRIBUTARY_LOG_FORMAT` (default `json`); the filter comes from
/// `RUST_LOG` (default `info`).
pub fn init_global_from_env() -> Result<()> {
    let format = match std::env::var("TRIBUTARY_LOG_FORMAT") {
        Ok(v) if !v.trim().is_empty() => LogFormat::parse_str(&v)?,
        _ => LogFormat::default(),
    };
    init_global(format)
}

/// Install the process-wide subscriber writing to stderr. Fails if one is
/// already installed.
pub fn init_global(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt)
        .try_init()
        .map_err(|e| Error::backend("tracing subscriber already initialized", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_log_formats() {
        assert_eq!(LogFormat::parse_str("JSON").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::parse_str(" pretty ").unwrap(), LogFormat::Pretty);
        assert!(LogFormat::parse_str("xml").is_err());
    }
}
