use std::time::Duration;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use tokio::signal;
use tracing::{error, info, instrument};

use crate::{
    config::{constants::*, settings::Config},
    error::{AppError, Result},
    handlers,
    server::app_state::AppState,
};

/// Register every HTTP route on `cfg`
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health::health_check))
        .service(
            web::scope("/api/auth")
                .route("/register", web::post().to(handlers::auth_handler::register))
                .route("/verify", web::post().to(handlers::auth_handler::verify))
                .route("/login", web::post().to(handlers::auth_handler::login))
                .route("/pin", web::post().to(handlers::auth_handler::request_pin))
                .route("/pin/login", web::post().to(handlers::auth_handler::login_with_pin))
                .route("/password", web::post().to(handlers::auth_handler::change_password))
                .route("/session", web::get().to(handlers::auth_handler::session)),
        )
        .service(
            web::scope("/api/cases")
                // Fixed paths first so they are not captured by /{id}
                .route("/search", web::get().to(handlers::case_handler::search_cases))
                .route("/stats", web::get().to(handlers::case_handler::case_statistics))
                .route("/court-dates", web::get().to(handlers::case_handler::cases_by_court_date))
                .route("/status/{status}", web::get().to(handlers::case_handler::cases_by_status))
                .route("/export/csv", web::post().to(handlers::case_handler::export_all_csv))
                .route("/export/json", web::post().to(handlers::case_handler::export_all_json))
                .route("", web::get().to(handlers::case_handler::list_cases))
                .route("", web::post().to(handlers::case_handler::create_case))
                .route("/{id}", web::get().to(handlers::case_handler::get_case))
                .route("/{id}", web::put().to(handlers::case_handler::update_case))
                .route("/{id}", web::delete().to(handlers::case_handler::delete_case))
                .route("/{id}/summary", web::get().to(handlers::case_handler::case_summary))
                .route("/{id}/export", web::post().to(handlers::case_handler::export_case)),
        );
}

/// JSON body limit and error mapping shared by the server and tests
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(MAX_JSON_PAYLOAD_BYTES)
        .error_handler(|err, _req| AppError::InvalidRequest(err.to_string()).into())
}

/// Build state from configuration and serve until a shutdown signal arrives
#[instrument(skip(config))]
pub async fn start_server(config: Config) -> Result<()> {
    info!("🚀 Starting Case Sheet Server v{}", env!("CARGO_PKG_VERSION"));

    let app_state = AppState::from_config(config).await?;
    let report = app_state.auth.cleanup_expired().await?;
    info!(
        "Startup cleanup removed {} expired credential entries",
        report.total()
    );

    start_server_with_state(app_state).await
}

/// Serve prebuilt state (for dependency injection)
#[instrument(skip(app_state))]
pub async fn start_server_with_state(app_state: AppState) -> Result<()> {
    let config = app_state.config.clone();
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("🌐 Starting HTTP server on {}", addr);

    let state = web::Data::new(app_state);
    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(json_config())
            .wrap(middleware::Logger::default())
            .wrap(
                middleware::DefaultHeaders::new()
                    .add(("X-Version", env!("CARGO_PKG_VERSION")))
                    .add(("X-Server", "Case-Sheet")),
            )
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(DEFAULT_CORS_MAX_AGE_SECS),
            )
            .configure(configure_routes)
    })
    .workers(config.server.worker_threads)
    .keep_alive(Duration::from_secs(HTTP_KEEPALIVE_SECS))
    .shutdown_timeout(SHUTDOWN_TIMEOUT_SECS)
    .disable_signals()
    .bind(&addr)
    .map_err(|e| AppError::Config(format!("Failed to bind HTTP server on {}: {}", addr, e)))?
    .run();

    print_startup_banner(&config);

    let handle = server.handle();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            if let Err(e) = result {
                error!("❌ HTTP server error: {}", e);
                return Err(AppError::Internal(format!("HTTP server error: {}", e)));
            }
        },
        _ = setup_shutdown_signal() => {
            info!("🛑 Shutdown signal received");
            handle.stop(true).await;
            if let Err(e) = server.await {
                error!("❌ HTTP server error during shutdown: {}", e);
            }
        }
    }

    info!("✅ Server shutdown completed successfully");
    Ok(())
}

/// Setup graceful shutdown signal handling
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("🛑 Received TERM signal, initiating graceful shutdown...");
        },
    }
}

fn print_startup_banner(config: &Config) {
    println!(
        "
╭─────────────────────────────────────────────────────╮
│               Case Sheet Server v{}
├─────────────────────────────────────────────────────┤
│ 🌐 HTTP: {}:{}
│ 🧵 Workers: {} threads
│ 📁 Data: {}
│ ✉️  Mail: {}
╰─────────────────────────────────────────────────────╯
",
        env!("CARGO_PKG_VERSION"),
        config.server.host,
        config.server.port,
        config.server.worker_threads,
        config.storage.data_dir.display(),
        config.smtp.server.as_str(),
    );
}
