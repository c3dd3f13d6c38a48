//! Request extractors: client metadata, bearer identity and the
//! resolved tenant context.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::{AUTHORIZATION, USER_AGENT};
use axum::http::request::Parts;
use clinic_core::error::ClinicError;
use clinic_tenancy::RequestContext;
use surrealdb::Connection;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Peer address and user agent, both optional.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip_address = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        Ok(Self {
            ip_address,
            user_agent,
        })
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::unauthorized("missing bearer token"))
}

/// A caller holding a valid access token. No tenant is resolved yet, so
/// tenant selection works even while the active tenant is suspended.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: Uuid,
    /// Tenant the session was opened in.
    pub primary_tenant_id: Uuid,
    pub session_id: Uuid,
    pub client: ClientInfo,
}

impl<C: Connection> FromRequestParts<AppState<C>> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<C>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = state.auth.validate_access_token(token)?;
        let client = ClientInfo::from_request_parts(parts, state)
            .await
            .unwrap_or_default();

        Ok(Self {
            user_id: claims.user_id().map_err(ClinicError::from)?,
            primary_tenant_id: claims.primary_tenant_id().map_err(ClinicError::from)?,
            session_id: claims.session_id().map_err(ClinicError::from)?,
            client,
        })
    }
}

/// A caller bound to its active, operational tenant.
#[derive(Debug, Clone)]
pub struct Scoped(pub RequestContext);

impl<C: Connection> FromRequestParts<AppState<C>> for Scoped {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<C>,
    ) -> Result<Self, Self::Rejection> {
        let caller = Caller::from_request_parts(parts, state).await?;
        let ctx = state
            .tenants
            .resolve_context(
                caller.user_id,
                caller.client.ip_address,
                caller.client.user_agent,
            )
            .await?;
        Ok(Self(ctx))
    }
}
