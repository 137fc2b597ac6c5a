#![forbid(unsafe_code)]

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::TodoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// Plain commands log to stderr.
    Stderr,
    /// The terminal UI owns the screen, so everything goes to the log file.
    File,
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over
/// `log.level`. Calling it again is harmless.
pub fn init(cfg: &Config, target: LogTarget) -> anyhow::Result<()> {
    let from_env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(from_env.as_deref(), cfg.log.level.trim());

    match target {
        LogTarget::Stderr => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init();
        }
        LogTarget::File => {
            let path = cfg.log_file()?;
            let file = open_log_file(&path)?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
            tracing::info!(log_file = %path.display(), "logging initialized");
        }
    }
    Ok(())
}

/// `RUST_LOG` directives when set and valid, else the configured level.
fn build_filter(from_env: Option<&str>, level: &str) -> EnvFilter {
    from_env
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .or_else(|| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn open_log_file(path: &Path) -> Result<std::fs::File, TodoError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| TodoError::IoPath {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| TodoError::IoPath {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn configured_level_applies_unless_rust_log_is_set() {
        assert_eq!(
            build_filter(None, "debug").max_level_hint(),
            Some(LevelFilter::DEBUG)
        );
        assert_eq!(
            build_filter(Some("  "), "trace").max_level_hint(),
            Some(LevelFilter::TRACE)
        );
        assert_eq!(
            build_filter(Some("error"), "debug").max_level_hint(),
            Some(LevelFilter::ERROR)
        );
    }

    #[test]
    fn stderr_logging_honours_log_level() {
        if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
            return;
        }
        let mut cfg = Config::default();
        cfg.log.level = "debug".to_owned();
        init(&cfg, LogTarget::Stderr).unwrap();
        assert_eq!(LevelFilter::current(), LevelFilter::DEBUG);
    }

    #[test]
    fn opens_log_file_in_missing_directory() {
        let td = tempfile::tempdir().expect("tempdir");
        let path = td.path().join("logs").join("todui.log");
        open_log_file(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn reports_unwritable_log_path() {
        let td = tempfile::tempdir().expect("tempdir");
        let err = open_log_file(td.path()).unwrap_err();
        assert!(matches!(err, TodoError::IoPath { .. }));
    }
}
