//! Logging system setup.
//!
//! Initializes `tracing-subscriber` with human-readable or JSON output.

use crate::config::LoggingSettings;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the logging system.
///
/// `RUST_LOG` wins over the configured level when set. `json_format` forces
/// JSON output regardless of the configuration file. When `file_path` is set,
/// plain log lines are appended to that file as well.
pub fn setup_logging(config: &LoggingSettings, json_format: bool) -> Result<(), Box<dyn std::error::Error>> {
    let log_level = config.level.as_str();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let file_layer = match &config.file_path {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);

    if json_format || config.json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?;
    }

    info!("🔧 Logging initialized with level: {}", log_level);
    Ok(())
}

/// Displays the startup banner through the logger.
pub fn display_banner() {
    let version = option_env!("CARGO_PKG_VERSION").unwrap_or("UNK");
    info!("╔══════════════════════════════════════════╗");
    info!("║            🌐 MODULE GATEWAY 🌐          ║");
    info!("║                 v{:<8}                ║", version);
    info!("║                                          ║");
    info!("║  🧭 Runtime Route Registration           ║");
    info!("║  ✅ Schema Validated Parameters          ║");
    info!("║  🔌 Namespaced Socket Events             ║");
    info!("║                                          ║");
    info!("╚══════════════════════════════════════════╝");
}
