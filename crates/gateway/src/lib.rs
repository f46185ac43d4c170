//! # Module Gateway - Main Entry Point
//!
//! Runs the gateway server that modules register their HTTP routes and socket
//! namespaces with at runtime. This entry point handles CLI parsing,
//! configuration loading, logging and application lifecycle management.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration
//! gateway
//!
//! # Specify custom configuration
//! gateway --config production.toml
//!
//! # Override specific settings
//! gateway --bind 0.0.0.0:3000 --socket-bind 0.0.0.0:3001 --log-level debug
//!
//! # JSON logging for production
//! gateway --json-logs
//! ```
//!
//! ## Configuration
//!
//! The gateway loads configuration from a TOML file (default: `config.toml`).
//! If the file doesn't exist, a default configuration will be created.
//! Modules listed under `[[modules.static_modules]]` are registered before
//! the listeners start; everything else registers through
//! `POST <admin_prefix>/modules` with `Authorization: Bearer <admin_token>`.
//!
//! ## Signal Handling
//!
//! The gateway shuts down gracefully on SIGINT (Ctrl+C) and SIGTERM. A second
//! signal exits immediately.

use tracing::error;

mod app;
mod cli;
mod config;
mod logging;
mod signals;

use app::Application;
use cli::CliArgs;
use config::AppConfig;

/// Runs the gateway binary.
///
/// # Exit Codes
///
/// * **0**: Successful execution and shutdown
/// * **1**: Error during startup, configuration, or runtime
///
/// Called from `main` inside the tokio runtime.
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Load configuration to get logging settings
    let config = AppConfig::load_from_file(&args.config_path)
        .await
        .unwrap_or_default();

    let mut logging_settings = config.logging;
    if let Some(level) = &args.log_level {
        logging_settings.level = level.clone();
    }
    if let Err(e) = logging::setup_logging(&logging_settings, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e:?}");
            std::process::exit(1);
        }
    }

    Ok(())
}

// Re-export main types for potential library usage
pub use config::{LoggingSettings, ModuleSettings, ServerSettings};
