//! Best-effort audit trail for sensitive actions on patient data.

use clinic_core::models::audit::{
    AuditAction, AuditEntityType, AuditOutcome, CreateAuditLogEntry,
};
use clinic_core::repository::AuditLogRepository;
use tracing::error;
use uuid::Uuid;

use crate::context::RequestContext;

/// Appends audit entries on behalf of a request.
///
/// A failed append is logged and swallowed; auditing never fails the
/// operation it describes.
pub struct Auditor<A: AuditLogRepository> {
    repo: A,
}

impl<A: AuditLogRepository> Auditor<A> {
    pub fn new(repo: A) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &A {
        &self.repo
    }

    pub async fn record(
        &self,
        ctx: &RequestContext,
        action: AuditAction,
        entity_type: AuditEntityType,
        entity_id: Option<Uuid>,
        outcome: AuditOutcome,
        metadata: Option<serde_json::Value>,
    ) {
        let entry = CreateAuditLogEntry {
            tenant_id: ctx.tenant_id(),
            actor_id: Some(ctx.user_id),
            action,
            entity_type,
            entity_id,
            outcome,
            ip_address: ctx.ip_address.clone(),
            metadata,
        };

        if let Err(e) = self.repo.append(entry).await {
            error!(
                tenant_id = %ctx.tenant_id(),
                user_id = %ctx.user_id,
                action = ?action,
                error = %e,
                "Failed to write audit entry"
            );
        }
    }

    pub async fn success(
        &self,
        ctx: &RequestContext,
        action: AuditAction,
        entity_type: AuditEntityType,
        entity_id: Uuid,
    ) {
        self.record(
            ctx,
            action,
            entity_type,
            Some(entity_id),
            AuditOutcome::Success,
            None,
        )
        .await;
    }

    pub async fn denied(
        &self,
        ctx: &RequestContext,
        action: AuditAction,
        entity_type: AuditEntityType,
        entity_id: Uuid,
        reason: &str,
    ) {
        self.record(
            ctx,
            action,
            entity_type,
            Some(entity_id),
            AuditOutcome::Denied,
            Some(serde_json::json!({ "reason": reason })),
        )
        .await;
    }
}
