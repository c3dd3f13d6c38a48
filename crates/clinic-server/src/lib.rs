//! Clinic Server: HTTP JSON RPC surface over the tenancy and auth
//! services.

pub mod config;
pub mod error;
pub mod extract;
pub mod rpc;
pub mod state;

use axum::Router;
use axum::routing::{get, post};
use surrealdb::Connection;
use tower_http::trace::TraceLayer;

pub use config::ServerConfig;
pub use error::ApiError;
pub use state::AppState;

/// Build the application router.
pub fn router<C: Connection>(state: AppState<C>) -> Router {
    let rpc = Router::new()
        .route("/auth.login", post(rpc::login::<C>))
        .route("/auth.refresh", post(rpc::refresh::<C>))
        .route("/auth.logout", post(rpc::logout::<C>))
        .route("/auth.rateLimitStats", post(rpc::rate_limit_stats::<C>))
        .route("/tenants.list", post(rpc::list_tenants::<C>))
        .route("/tenants.getActive", post(rpc::get_active_tenant::<C>))
        .route("/tenants.setActive", post(rpc::set_active_tenant::<C>))
        .route("/patients.list", post(rpc::list_patients::<C>))
        .route("/patients.get", post(rpc::get_patient::<C>))
        .route("/patients.create", post(rpc::create_patient::<C>));

    Router::new()
        .route("/health", get(rpc::health))
        .nest("/rpc", rpc)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
