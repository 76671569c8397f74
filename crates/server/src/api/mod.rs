//! API module providing the HTTP surface.
//!
//! - `POST /api/v1/oauth/token` - token endpoint
//! - `POST /api/v1/register` - user registration
//! - `/healthz` - health check
//! - `/api-docs` - Redoc rendering of the OpenAPI document

pub mod extract;
pub mod health;
pub mod openapi;

pub use health::MISC_TAG;

use crate::AppResources;
use crate::oauth2::store::DbUserStore;
use crate::oauth2::{self, ErrorResponse, OAuth2State};
use crate::registration::{
    self, ConfigRegistrationGate, LoggingRegistrationHook, RegistrationService, RegistrationState,
};
use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::any::Any;
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

/// Assembles the full router from already-built states.
pub fn build_router(oauth2_state: OAuth2State, registration_state: RegistrationState) -> Router {
    let v1 = OpenApiRouter::new()
        .nest("/oauth", oauth2::router(oauth2_state))
        .merge(registration::router(registration_state));

    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .nest("/api/v1", v1)
        .routes(routes!(health::health))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .split_for_parts();

    router.merge(Redoc::with_url("/api-docs", api))
}

/// Wires the database-backed services into the router.
pub fn app(resources: &AppResources) -> Router {
    let config = &resources.config;

    let oauth2_state = OAuth2State::from_database(resources.db.clone(), config.token_lifetime());

    let registration = RegistrationService::new(
        Arc::new(ConfigRegistrationGate::new(&config.registration)),
        Arc::new(DbUserStore::new(resources.db.clone())),
    )
    .with_hook(Arc::new(LoggingRegistrationHook));
    let registration_state = RegistrationState::new(registration, config.base_url.clone());

    build_router(oauth2_state, registration_state)
}

/// Turns a panic anywhere below the router into the generic `server_error` body.
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    tracing::error!(panic = %detail, "Request handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::server_error()),
    )
        .into_response()
}

/// Starts the web server with all configured routes.
#[tracing::instrument(skip(app_resources))]
pub async fn start_webserver(app_resources: AppResources) -> color_eyre::Result<()> {
    let router = app(&app_resources);
    let addr = app_resources.config.bind_address.clone();

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Server running");
    axum::serve(listener, router)
        .await
        .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}
