//! Domain models for the clinic platform.
//!
//! Every tenant-scoped record carries exactly one `tenant_id`.

pub mod audit;
pub mod patient;
pub mod patient_authorization;
pub mod session;
pub mod tenant;
pub mod tenant_link;
pub mod user;
