use dotenv::dotenv;
use tracing::{error, info, instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use case_sheet_server::{
    config::settings::{Config, LoggingConfig},
    error::Result,
    server::startup::start_server,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Initialize structured logging
    init_tracing(&LoggingConfig::load());

    // Build configuration with validation
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Invalid configuration: {}", e);
            return Err(e);
        }
    };
    info!(
        "📋 Configuration loaded: workers={}, data_dir={}, allowed_domains={:?}",
        config.server.worker_threads,
        config.storage.data_dir.display(),
        config.auth.allowed_domains
    );

    match start_server(config).await {
        Ok(_) => {
            info!("✅ Server shutdown completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("❌ Server failed: {}", e);
            Err(e)
        }
    }
}

/// Initialize structured logging
#[instrument(skip(logging))]
fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry().with(filter);

    // JSON logging for production
    if logging.is_json() {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(false)
                    .with_line_number(false)
                    .compact(),
            )
            .init();
    }

    info!("✅ Structured logging initialized with level: {}", logging.level);
}
