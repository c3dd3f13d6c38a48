//! Clinic Core: domain models, error types, and repository trait
//! definitions shared by every other crate in the workspace.

pub mod error;
pub mod models;
pub mod repository;
