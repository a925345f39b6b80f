//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (ids, error taxonomy, retry policy)
//! - `conversation` - Intake decisions derived from the transcript
//! - `team` - Tenant configuration read model

pub mod conversation;
pub mod foundation;
pub mod team;
