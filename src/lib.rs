//! Legal Intake - conversation orchestrator for AI-driven legal intake.
//!
//! Given the full transcript of a session, the core works out what is still
//! missing, steers the model toward collecting it, validates and dispatches
//! the actions the model asks for, and streams an ordered set of events back
//! to the caller.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
