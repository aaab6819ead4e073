//! Tracing setup for hosts embedding the session controller.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Filter directive used when `RUST_LOG` is unset (e.g. "info", "safeq_core=debug")
    pub level: String,
    /// Emit JSON lines on stdout instead of human-readable text
    pub json: bool,
    /// Directory for daily-rotated log files; `None` disables file output
    pub log_dir: Option<PathBuf>,
    pub file_name_prefix: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            log_dir: None,
            file_name_prefix: "safeq-aware.log".to_string(),
        }
    }
}

/// Keeps the non-blocking file writer flushing; drop it at shutdown.
pub struct LoggingGuard {
    guards: Vec<WorkerGuard>,
}

impl LoggingGuard {
    pub fn writes_to_file(&self) -> bool {
        !self.guards.is_empty()
    }
}

/// Install the global subscriber.
///
/// Idempotent: if a subscriber is already installed this leaves it in place
/// and still returns a guard for the file writer it built.
pub fn init_logging(settings: &LogSettings) -> anyhow::Result<LoggingGuard> {
    let mut guards = Vec::new();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let text_layer = (!settings.json).then(|| fmt::layer().with_target(true));
    let json_layer = settings.json.then(|| fmt::layer().json());

    let file_layer = match &settings.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, &settings.file_name_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            guards.push(guard);
            Some(fmt::layer().with_writer(writer).with_ansi(false))
        }
        None => None,
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .with(file_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Logging initialized");
    } else {
        tracing::debug!("Global subscriber already installed, keeping it");
    }

    Ok(LoggingGuard { guards })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = LogSettings::default();
        assert_eq!(settings.level, "info");
        assert!(!settings.json);
        assert!(settings.log_dir.is_none());
    }

    #[test]
    fn test_init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let settings = LogSettings {
            log_dir: Some(dir.path().join("logs")),
            ..Default::default()
        };

        let first = init_logging(&settings).unwrap();
        assert!(first.writes_to_file());
        assert!(dir.path().join("logs").is_dir());

        let second = init_logging(&LogSettings::default()).unwrap();
        assert!(!second.writes_to_file());
    }
}
