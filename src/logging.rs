use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable read when no `--log-level` flag is given
pub const LOG_ENV: &str = "DOCKFRA_LOG";

/// Route tracing output to a daily-rolling file while the TUI owns the
/// terminal.
///
/// Returns `None` when the log directory cannot be created; logging is then
/// disabled. The guard must be held until exit so buffered lines get flushed.
pub fn init_file(flag: Option<&str>, configured: Option<&str>) -> Option<WorkerGuard> {
    let logs_dir = logs_directory()?;
    if std::fs::create_dir_all(&logs_dir).is_err() {
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(&logs_dir, "tui.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let subscriber = tracing_subscriber::registry()
        .with(build_env_filter(flag, configured))
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        );
    let _ = tracing::subscriber::set_global_default(subscriber);

    Some(guard)
}

/// One-shot commands log to stderr; stdout carries their output
pub fn init_stderr(flag: Option<&str>, configured: Option<&str>) {
    let _ = tracing_subscriber::registry()
        .with(build_env_filter(flag, configured))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

/// `~/.local/share/dockfra/logs/` on Linux
pub fn logs_directory() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("dockfra").join("logs"))
}

/// Precedence: CLI flag > `DOCKFRA_LOG` > config file > "warn"
fn build_env_filter(flag: Option<&str>, configured: Option<&str>) -> EnvFilter {
    let env = std::env::var(LOG_ENV).ok();
    let filter = [flag, env.as_deref(), configured]
        .into_iter()
        .flatten()
        .find_map(|level| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));
    filter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_wins_over_config() {
        let filter = build_env_filter(Some("debug"), Some("error"));
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn test_unparsable_flag_falls_through() {
        if std::env::var(LOG_ENV).is_ok() {
            return;
        }
        let filter = build_env_filter(Some("dockfra=loud"), Some("info"));
        assert_eq!(filter.to_string(), "info");
        assert_eq!(build_env_filter(None, None).to_string(), "warn");
    }
}
