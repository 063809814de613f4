#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
// easier to use when using the functions as callback of foreign functions
#![allow(clippy::needless_pass_by_value)]

use anyhow::Result;
use axum::Extension;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::http::Method;
use axum::http::header::AUTHORIZATION;
use axum::http::header::CONTENT_TYPE;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::prelude::*;

use crate::api::JwtKeys;
use crate::api::panic_response;
use crate::config::Config;
use crate::config::Environment;
use crate::config::StorageConfig;
use crate::identity::SharedIdentityProvider;
use crate::mailer::SharedMailer;
use crate::storage::Memory;
use crate::storage::Postgres;
use crate::storage::Storage;

mod api;
mod config;
mod graceful_shutdown;
mod identity;
mod mailer;
mod notes;
mod otp;
mod password;
mod root;
mod storage;
#[cfg(test)]
mod tests;
mod users;
mod utils;

const DEFAULT_RUST_LOG: &str = "notekeeper=debug,tower_http=debug";

/// Largest accepted request body
const BODY_LIMIT: usize = 10 * 1024 * 1024;

#[tokio::main]
async fn main() -> Result<()> {
    setup_environment();
    setup_tracing();

    let config = Config::from_env()?;
    let address = config.address;

    let app = setup_app(config).await?;

    let listener = TcpListener::bind(address).await?;
    tracing::info!("Listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(graceful_shutdown::handler())
        .await?;

    Ok(())
}

/// Everything the routes need, besides the storage
pub struct Services {
    /// Keys to sign and verify session tokens
    pub jwt_keys: JwtKeys,

    /// Delivery of one-time codes
    pub mailer: SharedMailer,

    /// Verification of Google ID tokens
    pub identity_provider: SharedIdentityProvider,

    /// Development or production
    pub environment: Environment,
}

/// Create and setup the app with its dependencies
///
/// # Errors
///
/// Will return `Err` if any of its dependencies fail to load:
/// - Database connection and migrations
/// - SMTP configuration
/// - Allowed origin
pub async fn setup_app(config: Config) -> Result<Router> {
    let Config {
        jwt_secret,
        storage,
        allowed_origin,
        google_client_id,
        environment,
        smtp,
        ..
    } = config;

    let services = Services {
        jwt_keys: JwtKeys::new(jwt_secret.as_bytes()),
        mailer: mailer::setup(smtp.as_ref())?,
        identity_provider: identity::setup(google_client_id.as_deref()),
        environment,
    };

    match storage {
        StorageConfig::Memory => create_router(Memory::new(), services, allowed_origin.as_deref()),
        StorageConfig::Postgres(database_url) => create_router(
            Postgres::new(&database_url).await?,
            services,
            allowed_origin.as_deref(),
        ),
    }
}

/// Create the router for Notekeeper
fn create_router<S: Storage>(
    storage: S,
    services: Services,
    allowed_origin: Option<&str>,
) -> Result<Router> {
    let router = Router::new()
        .route("/", get(root::root))
        .nest("/api", api::router::<S>())
        .fallback(root::not_found)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(Extension(storage))
        .layer(Extension(services.jwt_keys))
        .layer(Extension(services.mailer))
        .layer(Extension(services.identity_provider))
        .layer(Extension(services.environment))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http());

    Ok(match allowed_origin {
        Some(allowed_origin) => router.layer(setup_cors(allowed_origin)?),
        None => router,
    })
}

fn setup_environment() {
    dotenvy::dotenv().ok();
}

fn setup_tracing() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::registry;

    registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_RUST_LOG.into()),
        ))
        .with(fmt::layer())
        .init();
}

/// Only the frontend is allowed to call the API from a browser
fn setup_cors(allowed_origin: &str) -> Result<CorsLayer> {
    let allowed_origin = HeaderValue::from_str(allowed_origin)?;

    Ok(CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true))
}
