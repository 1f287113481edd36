use std::fs;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::EngineConfig;

const LOG_FILE_PREFIX: &str = "bracket-engine.log";

fn env_filter(config: &EngineConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber. With `log_dir` set, output goes to a daily
/// rolling file and the returned guard must be held until shutdown so the
/// background writer flushes. Calling this twice is harmless.
pub fn init_tracing(config: &EngineConfig) -> Option<WorkerGuard> {
    if let Some(dir) = config.log_dir.as_ref() {
        if fs::create_dir_all(dir).is_ok() {
            let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let installed = tracing_subscriber::fmt()
                .with_env_filter(env_filter(config))
                .with_writer(non_blocking)
                .with_ansi(false)
                .try_init()
                .is_ok();
            if installed {
                tracing::info!(dir = %dir.display(), "file logging enabled");
            }
            return Some(guard);
        }
        eprintln!("could not create log dir {}; logging to stderr", dir.display());
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_writer(std::io::stderr)
        .try_init();
    None
}
