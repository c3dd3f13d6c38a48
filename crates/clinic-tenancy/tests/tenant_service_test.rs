//! Integration tests for tenant selection and context resolution using
//! in-memory SurrealDB.

use chrono::{Duration, Utc};
use clinic_core::error::ClinicError;
use clinic_core::models::tenant::{CreateTenant, TenantPlan, TenantStatus, UpdateTenant};
use clinic_core::models::tenant_link::CreateUserTenantLink;
use clinic_core::models::user::CreateUser;
use clinic_core::repository::{TenantRepository, UserRepository};
use clinic_db::repository::{
    SurrealTenantRepository, SurrealUserRepository, SurrealUserSettingsRepository,
    SurrealUserTenantLinkRepository,
};
use clinic_tenancy::TenantService;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

type Service = TenantService<
    SurrealTenantRepository<Db>,
    SurrealUserRepository<Db>,
    SurrealUserTenantLinkRepository<Db>,
    SurrealUserSettingsRepository<Db>,
>;

struct Fixture {
    db: Surreal<Db>,
    service: Service,
    primary: Uuid,
    linked: Uuid,
    foreign: Uuid,
    user_id: Uuid,
}

fn tenant(slug: &str) -> CreateTenant {
    CreateTenant {
        name: format!("Clinic {slug}"),
        slug: slug.into(),
        plan: TenantPlan::Professional,
        max_users: None,
        max_patients: None,
        metadata: None,
    }
}

/// Helper: three tenants; user "ana" lives in the first and is linked to
/// the second.
async fn setup() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    clinic_db::run_migrations(&db).await.unwrap();

    let service = TenantService::new(
        SurrealTenantRepository::new(db.clone()),
        SurrealUserRepository::new(db.clone()),
        SurrealUserTenantLinkRepository::new(db.clone()),
        SurrealUserSettingsRepository::new(db.clone()),
    );

    let primary = service.create_tenant(tenant("primary")).await.unwrap().id;
    let linked = service.create_tenant(tenant("linked")).await.unwrap().id;
    let foreign = service.create_tenant(tenant("foreign")).await.unwrap().id;

    let user_id = SurrealUserRepository::new(db.clone())
        .create(CreateUser {
            tenant_id: primary,
            username: "ana".into(),
            email: "ana@example.com".into(),
            password: "CorrectHorse9!".into(),
            metadata: None,
        })
        .await
        .unwrap()
        .id;

    service
        .grant_link(CreateUserTenantLink {
            user_id,
            tenant_id: linked,
            valid_from: None,
            valid_until: None,
        })
        .await
        .unwrap();

    Fixture {
        db,
        service,
        primary,
        linked,
        foreign,
        user_id,
    }
}

#[tokio::test]
async fn user_tenants_list_primary_first() {
    let f = setup().await;

    let tenants = f.service.get_user_tenants(f.user_id).await.unwrap();
    assert_eq!(tenants.len(), 2);
    assert_eq!(tenants[0].tenant.id, f.primary);
    assert!(tenants[0].is_primary);
    assert_eq!(tenants[1].tenant.id, f.linked);
    assert!(!tenants[1].is_primary);
}

#[tokio::test]
async fn duplicate_and_expired_links_are_ignored() {
    let f = setup().await;

    // Second active link to the same tenant.
    f.service
        .grant_link(CreateUserTenantLink {
            user_id: f.user_id,
            tenant_id: f.linked,
            valid_from: None,
            valid_until: None,
        })
        .await
        .unwrap();
    // Link that already expired.
    f.service
        .grant_link(CreateUserTenantLink {
            user_id: f.user_id,
            tenant_id: f.foreign,
            valid_from: Some(Utc::now() - Duration::days(10)),
            valid_until: Some(Utc::now() - Duration::days(1)),
        })
        .await
        .unwrap();
    // Link that starts in the future.
    f.service
        .grant_link(CreateUserTenantLink {
            user_id: f.user_id,
            tenant_id: f.foreign,
            valid_from: Some(Utc::now() + Duration::days(1)),
            valid_until: None,
        })
        .await
        .unwrap();

    let ids: Vec<Uuid> = f
        .service
        .get_user_tenants(f.user_id)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.tenant.id)
        .collect();
    assert_eq!(ids, vec![f.primary, f.linked]);
}

#[tokio::test]
async fn active_tenant_defaults_to_primary() {
    let f = setup().await;
    let active = f.service.get_active_tenant(f.user_id).await.unwrap();
    assert_eq!(active.id, f.primary);
}

#[tokio::test]
async fn set_active_tenant_is_idempotent_for_authorized_tenant() {
    let f = setup().await;

    let first = f.service.set_active_tenant(f.user_id, f.linked).await.unwrap();
    let second = f.service.set_active_tenant(f.user_id, f.linked).await.unwrap();
    assert_eq!(first.id, f.linked);
    assert_eq!(second.id, f.linked);

    let active = f.service.get_active_tenant(f.user_id).await.unwrap();
    assert_eq!(active.id, f.linked);
}

#[tokio::test]
async fn set_active_tenant_rejects_unauthorized_tenant() {
    let f = setup().await;

    let err = f
        .service
        .set_active_tenant(f.user_id, f.foreign)
        .await
        .unwrap_err();
    assert!(matches!(err, ClinicError::Forbidden { .. }));

    let err = f
        .service
        .set_active_tenant(f.user_id, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, ClinicError::Forbidden { .. }));

    // The previous selection is untouched.
    assert_eq!(
        f.service.get_active_tenant(f.user_id).await.unwrap().id,
        f.primary
    );
}

#[tokio::test]
async fn revoked_link_falls_back_to_primary() {
    let f = setup().await;

    f.service.set_active_tenant(f.user_id, f.linked).await.unwrap();
    f.service.revoke_link(f.user_id, f.linked).await.unwrap();

    let active = f.service.get_active_tenant(f.user_id).await.unwrap();
    assert_eq!(active.id, f.primary);

    let again = f.service.revoke_link(f.user_id, f.linked).await.unwrap_err();
    assert!(matches!(again, ClinicError::NotFound { .. }));

    let err = f
        .service
        .validate_tenant_access(f.user_id, f.linked)
        .await
        .unwrap_err();
    assert!(matches!(err, ClinicError::Forbidden { .. }));
}

#[tokio::test]
async fn context_resolution_refuses_suspended_tenant() {
    let f = setup().await;

    let ctx = f
        .service
        .resolve_context(f.user_id, Some("10.1.1.1".into()), None)
        .await
        .unwrap();
    assert_eq!(ctx.tenant_id(), f.primary);
    assert_eq!(ctx.user_id, f.user_id);
    assert_eq!(ctx.ip_address.as_deref(), Some("10.1.1.1"));

    SurrealTenantRepository::new(f.db.clone())
        .update(
            f.primary,
            UpdateTenant {
                status: Some(TenantStatus::Suspended),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = f
        .service
        .resolve_context(f.user_id, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ClinicError::Forbidden { .. }));
}

#[tokio::test]
async fn context_resolution_refuses_inactive_linked_tenant() {
    let f = setup().await;
    f.service.set_active_tenant(f.user_id, f.linked).await.unwrap();

    SurrealTenantRepository::new(f.db.clone())
        .update(
            f.linked,
            UpdateTenant {
                status: Some(TenantStatus::Inactive),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = f
        .service
        .resolve_context(f.user_id, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ClinicError::Forbidden { .. }));
}

#[tokio::test]
async fn grant_link_validates_input() {
    let f = setup().await;

    let same_tenant = f
        .service
        .grant_link(CreateUserTenantLink {
            user_id: f.user_id,
            tenant_id: f.primary,
            valid_from: None,
            valid_until: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(same_tenant, ClinicError::Validation { .. }));

    let missing_tenant = f
        .service
        .grant_link(CreateUserTenantLink {
            user_id: f.user_id,
            tenant_id: Uuid::new_v4(),
            valid_from: None,
            valid_until: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(missing_tenant, ClinicError::NotFound { .. }));

    let inverted = f
        .service
        .grant_link(CreateUserTenantLink {
            user_id: f.user_id,
            tenant_id: f.foreign,
            valid_from: Some(Utc::now()),
            valid_until: Some(Utc::now() - Duration::hours(1)),
        })
        .await
        .unwrap_err();
    assert!(matches!(inverted, ClinicError::Validation { .. }));
}

#[tokio::test]
async fn create_tenant_applies_default_limits() {
    let f = setup().await;
    let t = f
        .service
        .create_tenant(tenant("defaults"))
        .await
        .unwrap();
    assert_eq!(t.max_users, 5);
    assert_eq!(t.max_patients, 100);
    assert_eq!(t.status, TenantStatus::Active);

    let blank = f
        .service
        .create_tenant(CreateTenant {
            slug: " ".into(),
            ..tenant("x")
        })
        .await
        .unwrap_err();
    assert!(matches!(blank, ClinicError::Validation { .. }));
}
