//! payhere API - REST server for the point-of-sale backend
//!
//! Users sign up and sign in with a phone number and password, receive a
//! bearer token, and manage their items. Signed-out tokens are revoked
//! server-side until they expire.

pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod repository;
pub mod routes;
pub mod service;
pub mod state;

use axum::{routing::get, Json, Router};
use handlers::{health, item, user};
use state::AppState;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

/// OpenAPI document, served at `/api-docs/openapi.json`
#[derive(OpenApi)]
#[openapi(
    info(
        title = "payhere API",
        description = "Point-of-sale backend: accounts, bearer tokens and items"
    ),
    paths(
        health::health_check,
        user::sign_up_handler,
        user::sign_in_handler,
        user::sign_out_handler,
        user::me_handler,
        item::create_item,
        item::list_items,
        item::get_item,
        item::update_item,
        item::delete_item,
    ),
    components(schemas(
        error::ApiError,
        health::HealthResponse,
        user::CredentialsRequest,
        user::SignInResponse,
        user::UserResponse,
        item::CreateItemRequest,
        item::UpdateItemRequest,
        item::ItemResponse,
        item::ItemListResponse,
    )),
    modifiers(&BearerSecurity),
    tags(
        (name = "health", description = "Liveness"),
        (name = "users", description = "Sign-up, sign-in and sign-out"),
        (name = "items", description = "Items owned by the authenticated user"),
    )
)]
pub struct ApiDoc;

struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let request_timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    let layers = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(PropagateRequestIdLayer::x_request_id());

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api-docs/openapi.json", get(openapi_json))
        .nest("/v1", routes::api_routes(state.clone()))
        .layer(layers)
        .with_state(state)
}

/// Router over in-memory stores with cheap password hashing
#[cfg(any(test, feature = "test-utils"))]
pub fn create_router_for_testing() -> Router {
    create_router(Arc::new(AppState::default()))
}
