//! Team directory configuration

use serde::Deserialize;
use std::path::PathBuf;

use super::error::ValidationError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamsConfig {
    /// YAML file seeding the in-memory team directory
    pub seed_file: Option<PathBuf>,
}

impl TeamsConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.seed_file {
            Some(path) if !path.is_file() => Err(ValidationError::TeamFileNotFound(
                path.display().to_string(),
            )),
            _ => Ok(()),
        }
    }
}
