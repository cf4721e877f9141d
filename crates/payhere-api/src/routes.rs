//! API route definitions
//!
//! Author: hephaex@gmail.com

use crate::auth::auth_middleware;
use crate::handlers::{item, user};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Create the `/v1` routes
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes; sign-out checks its token itself
    let public_routes = Router::new()
        .route("/users/signUp", post(user::sign_up_handler))
        .route("/users/signIn", post(user::sign_in_handler))
        .route("/users/signOut", post(user::sign_out_handler));

    // Gated routes
    let protected_routes = Router::new()
        .route("/users/me", get(user::me_handler))
        .route("/items", post(item::create_item).get(item::list_items))
        .route(
            "/items/:item_id",
            get(item::get_item)
                .patch(item::update_item)
                .delete(item::delete_item),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new().merge(public_routes).merge(protected_routes)
}
