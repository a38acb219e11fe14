use axum::{
    Router,
    http::{HeaderValue, header},
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;

mod audit;
mod config;
mod credentials;
mod error;
mod middleware;
mod signer;
mod telemetry;
mod token;
mod window;

use credentials::ServerCredentials;
use signer::{JwtTokenSigner, TokenSigner};
use window::{Clock, SystemClock};

/// Headers browsers may send on cross-origin token requests.
const CORS_ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";

pub struct AppState {
    /// `None` when the credentials were missing at startup; every token
    /// request is then refused.
    credentials: Option<ServerCredentials>,
    signer: Arc<dyn TokenSigner>,
    clock: Arc<dyn Clock>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = config::load_config()?;
    let _telemetry = telemetry::init(&settings.telemetry)?;

    let credentials = match ServerCredentials::from_env() {
        Ok(credentials) => {
            tracing::info!(
                server_id = credentials.server_id(),
                "loaded server credentials"
            );
            Some(credentials)
        }
        Err(err) => {
            tracing::warn!(
                error = %err,
                "server credentials unavailable, token requests will be refused"
            );
            None
        }
    };

    let state = Arc::new(AppState {
        credentials,
        signer: Arc::new(JwtTokenSigner),
        clock: Arc::new(SystemClock),
    });

    let addr = SocketAddr::new(settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", addr);
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/token",
            post(token::token).options(token::preflight),
        )
        .route("/healthz", get(healthz))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::RequestTraceLayer)
                .layer(SetResponseHeaderLayer::overriding(
                    header::ACCESS_CONTROL_ALLOW_ORIGIN,
                    HeaderValue::from_static("*"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::ACCESS_CONTROL_ALLOW_HEADERS,
                    HeaderValue::from_static(CORS_ALLOW_HEADERS),
                )),
        )
}

async fn healthz() -> &'static str {
    "ok"
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
