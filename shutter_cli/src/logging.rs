//! tracing-subscriber setup: a console layer on stderr plus an optional
//! JSON file sink from `[logging]`.

use std::path::Path;

use shutter_config::Logging;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::cli::FILE_GUARD;

fn appender(path: &Path, rotation: Option<&str>) -> tracing_appender::rolling::RollingFileAppender {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file = path
        .file_name()
        .map_or_else(|| "shutter.log".into(), |f| f.to_string_lossy().into_owned());
    match rotation {
        Some("daily") => tracing_appender::rolling::daily(dir, file),
        Some("hourly") => tracing_appender::rolling::hourly(dir, file),
        _ => tracing_appender::rolling::never(dir, file),
    }
}

/// `RUST_LOG` wins over `--log-level` on the console.
pub fn init_tracing(json: bool, level: &str, cfg: &Logging) {
    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let console: Box<dyn Layer<Registry> + Send + Sync> = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let file_layer = cfg.file.as_deref().map(|path| {
        let (writer, guard) =
            tracing_appender::non_blocking(appender(Path::new(path), cfg.rotation.as_deref()));
        let _ = FILE_GUARD.set(guard);
        let file_level = cfg.level.as_deref().unwrap_or(level);
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(writer)
            .with_filter(EnvFilter::new(file_level))
    });

    let _ = tracing_subscriber::registry()
        .with(console.with_filter(console_filter))
        .with(file_layer)
        .try_init();

    if let Some(r) = cfg.rotation.as_deref()
        && !matches!(r, "never" | "daily" | "hourly")
    {
        tracing::warn!(rotation = r, "unknown log rotation, not rotating");
    }
}
