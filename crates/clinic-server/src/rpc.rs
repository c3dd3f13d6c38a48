//! RPC procedure handlers, mounted under `POST /rpc/<procedure>`.

use axum::Json;
use axum::extract::State;
use clinic_auth::{LoginInput, LoginOutput, RateLimitStats, RefreshInput};
use clinic_core::models::patient::{CreatePatient, Patient};
use clinic_core::models::tenant::Tenant;
use clinic_core::repository::{PaginatedResult, Pagination};
use clinic_tenancy::AvailableTenant;
use serde::{Deserialize, Serialize};
use surrealdb::Connection;
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::{Caller, ClientInfo, Scoped};
use crate::state::AppState;

const MAX_PAGE_SIZE: u64 = 100;

type RpcResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Serialize)]
pub struct Ack {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// `GET /health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username_or_email: String,
    pub password: String,
}

/// `auth.login`
pub async fn login<C: Connection>(
    State(state): State<AppState<C>>,
    client: ClientInfo,
    Json(req): Json<LoginRequest>,
) -> RpcResult<LoginOutput> {
    let output = state
        .auth
        .login(LoginInput {
            username_or_email: req.username_or_email,
            password: req.password,
            ip_address: client.ip_address,
            user_agent: client.user_agent,
        })
        .await?;
    Ok(Json(output))
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub tenant_id: Uuid,
    pub refresh_token: String,
}

/// `auth.refresh`
pub async fn refresh<C: Connection>(
    State(state): State<AppState<C>>,
    client: ClientInfo,
    Json(req): Json<RefreshRequest>,
) -> RpcResult<LoginOutput> {
    let output = state
        .auth
        .refresh(RefreshInput {
            tenant_id: req.tenant_id,
            refresh_token: req.refresh_token,
            ip_address: client.ip_address,
            user_agent: client.user_agent,
        })
        .await?;
    Ok(Json(output))
}

/// `auth.logout`
pub async fn logout<C: Connection>(
    State(state): State<AppState<C>>,
    caller: Caller,
) -> RpcResult<Ack> {
    state
        .auth
        .logout(caller.primary_tenant_id, caller.session_id)
        .await?;
    Ok(Json(Ack { ok: true }))
}

/// `auth.rateLimitStats`
pub async fn rate_limit_stats<C: Connection>(
    State(state): State<AppState<C>>,
    _caller: Caller,
) -> Json<RateLimitStats> {
    Json(state.limiter.stats().await)
}

/// `tenants.list`
pub async fn list_tenants<C: Connection>(
    State(state): State<AppState<C>>,
    caller: Caller,
) -> RpcResult<Vec<AvailableTenant>> {
    Ok(Json(state.tenants.get_user_tenants(caller.user_id).await?))
}

/// `tenants.getActive`
pub async fn get_active_tenant<C: Connection>(
    State(state): State<AppState<C>>,
    caller: Caller,
) -> RpcResult<Tenant> {
    Ok(Json(state.tenants.get_active_tenant(caller.user_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub tenant_id: Uuid,
}

/// `tenants.setActive`
pub async fn set_active_tenant<C: Connection>(
    State(state): State<AppState<C>>,
    caller: Caller,
    Json(req): Json<SetActiveRequest>,
) -> RpcResult<Tenant> {
    let tenant = state
        .tenants
        .set_active_tenant(caller.user_id, req.tenant_id)
        .await?;
    Ok(Json(tenant))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PageRequest {
    pub offset: u64,
    pub limit: Option<u64>,
}

impl From<PageRequest> for Pagination {
    fn from(req: PageRequest) -> Self {
        let default = Pagination::default();
        Self {
            offset: req.offset,
            limit: req.limit.unwrap_or(default.limit).clamp(1, MAX_PAGE_SIZE),
        }
    }
}

/// `patients.list`
pub async fn list_patients<C: Connection>(
    State(state): State<AppState<C>>,
    Scoped(ctx): Scoped,
    Json(req): Json<PageRequest>,
) -> RpcResult<PaginatedResult<Patient>> {
    Ok(Json(state.patients.list(&ctx, req.into()).await?))
}

#[derive(Debug, Deserialize)]
pub struct PatientIdRequest {
    pub id: Uuid,
}

/// `patients.get`
pub async fn get_patient<C: Connection>(
    State(state): State<AppState<C>>,
    Scoped(ctx): Scoped,
    Json(req): Json<PatientIdRequest>,
) -> RpcResult<Patient> {
    Ok(Json(state.patients.get(&ctx, req.id).await?))
}

#[derive(Debug, Deserialize)]
pub struct CreatePatientRequest {
    /// Defaults to the active tenant.
    pub tenant_id: Option<Uuid>,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// `patients.create`
pub async fn create_patient<C: Connection>(
    State(state): State<AppState<C>>,
    Scoped(ctx): Scoped,
    Json(req): Json<CreatePatientRequest>,
) -> RpcResult<Patient> {
    let input = CreatePatient {
        tenant_id: req.tenant_id.unwrap_or(ctx.tenant_id()),
        full_name: req.full_name,
        email: req.email,
        phone: req.phone,
        metadata: req.metadata,
    };
    Ok(Json(state.patients.create(&ctx, input).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_and_ceiling() {
        let page: Pagination = PageRequest::default().into();
        assert_eq!(page.offset, 0);
        assert_eq!(page.limit, 50);

        let page: Pagination = PageRequest {
            offset: 20,
            limit: Some(10_000),
        }
        .into();
        assert_eq!(page.offset, 20);
        assert_eq!(page.limit, MAX_PAGE_SIZE);

        let page: Pagination = PageRequest {
            offset: 0,
            limit: Some(0),
        }
        .into();
        assert_eq!(page.limit, 1);
    }
}
