//! # HTTP Server for the Print Bridge
//!
//! Exposes bridge actions over HTTP so a web view (or anything else that
//! speaks JSON) can print through a desktop host.
//!
//! ## Usage
//!
//! ```bash
//! printbridge serve --listen 127.0.0.1:8080 --spool ./spool
//! ```
//!
//! ## Routes
//!
//! | Method | Path | Body | Result |
//! |--------|------|------|--------|
//! | `POST` | `/api/printer/:action` | argument array | action result |
//! | `GET`, `POST` | `/api/printer/types` | ignored | printable types |
//!
//! An unknown action answers `404`, a malformed argument list `400`.

mod handlers;
mod state;

pub use state::{AppState, ServerConfig};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::bridge::Bridge;
use crate::error::{PrintError, PrintResult};

/// Router serving the bridge actions.
pub fn router(bridge: Bridge) -> Router {
    let app_state = Arc::new(AppState::new(bridge));

    Router::new()
        .route(
            "/api/printer/types",
            get(handlers::printer::types).post(handlers::printer::types),
        )
        .route("/api/printer/:action", post(handlers::printer::execute))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Start the HTTP server.
///
/// ## Example
///
/// ```no_run
/// use std::sync::Arc;
/// use printbridge::{BridgeConfig, Bridge, Printer};
/// use printbridge::platform::spool::{SpoolPrintService, SpoolRendererFactory};
/// use printbridge::server::{serve, ServerConfig};
///
/// # async fn example() -> printbridge::PrintResult<()> {
/// let service = SpoolPrintService::new("./spool")?;
/// let printer = Printer::new(
///     &BridgeConfig::default(),
///     Arc::new(service),
///     Arc::new(SpoolRendererFactory::new()),
/// );
///
/// let config = ServerConfig {
///     listen_addr: "127.0.0.1:8080".to_string(),
/// };
/// serve(config, Bridge::new(printer)).await?;
/// # Ok(())
/// # }
/// ```
pub async fn serve(config: ServerConfig, bridge: Bridge) -> PrintResult<()> {
    let app = router(bridge);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| {
            PrintError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to bind to {}: {}", config.listen_addr, e),
            ))
        })?;

    info!(listen = %config.listen_addr, "Print bridge server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
