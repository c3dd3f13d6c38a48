//! Patient and authorization queries never cross the tenant boundary.

use clinic_core::error::ClinicError;
use clinic_core::models::patient::{CreatePatient, UpdatePatient};
use clinic_core::models::patient_authorization::{
    AccessLevel, AuthorizationDecision, AuthorizationStatus, CreatePatientAuthorization,
};
use clinic_core::models::tenant::{CreateTenant, TenantPlan};
use clinic_core::repository::{
    Pagination, PatientAuthorizationRepository, PatientRepository, TenantRepository,
};
use clinic_db::repository::{
    SurrealPatientAuthorizationRepository, SurrealPatientRepository, SurrealTenantRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> (Surreal<Db>, Uuid, Uuid) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    clinic_db::run_migrations(&db).await.unwrap();

    let tenants = SurrealTenantRepository::new(db.clone());
    let mut ids = Vec::new();
    for slug in ["clinic-a", "clinic-b"] {
        let tenant = tenants
            .create(CreateTenant {
                name: slug.into(),
                slug: slug.into(),
                plan: TenantPlan::Basic,
                max_users: None,
                max_patients: None,
                metadata: None,
            })
            .await
            .unwrap();
        ids.push(tenant.id);
    }

    (db, ids[0], ids[1])
}

fn patient(tenant_id: Uuid, name: &str) -> CreatePatient {
    CreatePatient {
        tenant_id,
        full_name: name.into(),
        email: None,
        phone: Some("+55 11 5555-0000".into()),
        metadata: None,
    }
}

#[tokio::test]
async fn second_tenant_never_sees_first_tenant_patients() {
    let (db, t1, t2) = setup().await;
    let repo = SurrealPatientRepository::new(db);

    let p = repo.create(patient(t1, "Maria Souza")).await.unwrap();
    repo.create(patient(t1, "Joao Lima")).await.unwrap();
    repo.create(patient(t2, "Carla Dias")).await.unwrap();

    let listed = repo.list(t2, Pagination::default()).await.unwrap();
    assert_eq!(listed.total, 1);
    assert!(listed.items.iter().all(|p| p.tenant_id == t2));

    assert_eq!(repo.count(t1).await.unwrap(), 2);

    let cross_read = repo.get_by_id(t2, p.id).await;
    assert!(matches!(cross_read, Err(ClinicError::NotFound { .. })));

    let cross_update = repo
        .update(
            t2,
            p.id,
            UpdatePatient {
                full_name: Some("Hijacked".into()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(cross_update, Err(ClinicError::NotFound { .. })));

    let cross_delete = repo.delete(t2, p.id).await;
    assert!(matches!(cross_delete, Err(ClinicError::NotFound { .. })));

    let untouched = repo.get_by_id(t1, p.id).await.unwrap();
    assert_eq!(untouched.full_name, "Maria Souza");
}

#[tokio::test]
async fn patient_update_can_clear_optional_fields() {
    let (db, t1, _) = setup().await;
    let repo = SurrealPatientRepository::new(db);

    let p = repo.create(patient(t1, "Maria Souza")).await.unwrap();
    let updated = repo
        .update(
            t1,
            p.id,
            UpdatePatient {
                email: Some(Some("maria@example.com".into())),
                phone: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.email.as_deref(), Some("maria@example.com"));
    assert_eq!(updated.phone, None);
    assert!(updated.updated_at >= p.updated_at);
}

#[tokio::test]
async fn authorization_is_decided_only_by_source_tenant() {
    let (db, t1, t2) = setup().await;
    let patients = SurrealPatientRepository::new(db.clone());
    let repo = SurrealPatientAuthorizationRepository::new(db);

    let p = patients.create(patient(t1, "Maria Souza")).await.unwrap();
    let requester = Uuid::new_v4();

    let auth = repo
        .create(CreatePatientAuthorization {
            patient_id: p.id,
            source_tenant_id: t1,
            target_tenant_id: t2,
            access_level: AccessLevel::Read,
            reason: "Referral".into(),
            valid_from: None,
            valid_until: None,
            requested_by: requester,
        })
        .await
        .unwrap();
    assert_eq!(auth.status, AuthorizationStatus::Pending);
    assert!(!auth.consent_given);

    // Both parties can see it, a third tenant cannot.
    assert!(repo.get_by_id(t1, auth.id).await.is_ok());
    assert!(repo.get_by_id(t2, auth.id).await.is_ok());
    assert!(repo.get_by_id(Uuid::new_v4(), auth.id).await.is_err());

    let decision = AuthorizationDecision {
        status: AuthorizationStatus::Active,
        consent_given: true,
        decided_by: Uuid::new_v4(),
    };
    let by_target = repo.decide(t2, auth.id, decision.clone()).await;
    assert!(matches!(by_target, Err(ClinicError::NotFound { .. })));
    assert!(repo.list_active_for_patient(t2, p.id).await.unwrap().is_empty());

    let approved = repo.decide(t1, auth.id, decision).await.unwrap();
    assert_eq!(approved.status, AuthorizationStatus::Active);
    assert!(approved.decided_at.is_some());

    let active = repo.list_active_for_patient(t2, p.id).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(repo.list_for_tenant(t1).await.unwrap().len(), 1);
    assert_eq!(repo.list_for_tenant(t2).await.unwrap().len(), 1);
}
