//! Clinic Database: SurrealDB connection management, schema
//! migrations, and implementations of the `clinic-core` repository
//! traits.
//!
//! Every tenant-scoped query issued by this crate carries a
//! `tenant_id = $tenant_id` predicate.

mod connection;
mod error;
pub mod repository;
mod schema;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use repository::verify_password;
pub use schema::{run_migrations, schema_v1};
