//! Structured logging.
//!
//! JSON records in production, pretty output in development; `log_format`
//! overrides the mode default. `RUST_LOG` takes precedence over the
//! configured level. With file logging on, every record is also appended to
//! `<log_dir>/gateway.log`.

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{GatewayConfig, LogFormat};

pub const LOG_FILE_NAME: &str = "gateway.log";

/// Output format for this configuration.
pub fn effective_format(config: &GatewayConfig) -> LogFormat {
    config.observability.log_format.unwrap_or(if config.is_production() {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    })
}

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,food_gateway={level},tower_http=info"))
    })
}

fn open_log_file(dir: &str) -> std::io::Result<File> {
    fs::create_dir_all(dir)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(Path::new(dir).join(LOG_FILE_NAME))
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_logging(config: &GatewayConfig) {
    let obs = &config.observability;
    let format = effective_format(config);

    let console = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .boxed(),
    };

    let mut file_error = None;
    let file = if obs.file_logging {
        match open_log_file(&obs.log_dir) {
            Ok(file) => Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .boxed(),
            ),
            Err(e) => {
                file_error = Some(e);
                None
            }
        }
    } else {
        None
    };

    let installed = tracing_subscriber::registry()
        .with(build_filter(&obs.log_level))
        .with(console)
        .with(file)
        .try_init()
        .is_ok();

    if let Some(e) = file_error {
        tracing::warn!(log_dir = %obs.log_dir, error = %e, "File logging disabled");
    }
    if installed {
        tracing::debug!(format = ?format, file_logging = obs.file_logging, "Logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OperatingMode;

    #[test]
    fn test_format_follows_mode() {
        let mut config = GatewayConfig::default();
        config.mode = OperatingMode::Production;
        assert_eq!(effective_format(&config), LogFormat::Json);

        config.mode = OperatingMode::Development;
        assert_eq!(effective_format(&config), LogFormat::Pretty);

        config.observability.log_format = Some(LogFormat::Json);
        assert_eq!(effective_format(&config), LogFormat::Json);
    }

    #[test]
    fn test_log_file_is_created_in_missing_dir() {
        let dir = std::env::temp_dir().join(format!("food-gateway-logs-{}", uuid::Uuid::new_v4()));
        let dir_str = dir.to_string_lossy().to_string();

        open_log_file(&dir_str).unwrap();
        assert!(dir.join(LOG_FILE_NAME).exists());

        fs::remove_dir_all(dir).unwrap();
    }
}
