//! Intake collaborator adapters.
//!
//! - `InMemoryIntakeServices` - Records tool side effects, supports failure injection
//! - `InMemoryTeamDirectory` - Team configuration, optionally seeded from YAML

mod in_memory_services;
mod in_memory_teams;

pub use in_memory_services::{InMemoryIntakeServices, CONTACT_FORM_FIELDS};
pub use in_memory_teams::{InMemoryTeamDirectory, TeamSeedError};
