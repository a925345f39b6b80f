//! In-Memory Team Directory Adapter
//!
//! Holds team configuration in memory, optionally seeded from a YAML file:
//!
//! ```yaml
//! teams:
//!   - id: acme-law
//!     name: Acme Law Group
//!     jurisdiction: Ontario
//!     services: [Family Law, Employment Law]
//!     features:
//!       document_analysis: true
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::domain::foundation::TeamId;
use crate::domain::team::TeamConfig;
use crate::ports::{ServiceError, TeamDirectory};

#[derive(Debug, Error)]
pub enum TeamSeedError {
    #[error("failed to read team file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse team file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Deserialize)]
struct TeamSeed {
    #[serde(default)]
    teams: Vec<TeamConfig>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryTeamDirectory {
    teams: Arc<RwLock<HashMap<TeamId, TeamConfig>>>,
    failure: Arc<RwLock<Option<ServiceError>>>,
}

impl InMemoryTeamDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_teams(teams: impl IntoIterator<Item = TeamConfig>) -> Self {
        let map = teams.into_iter().map(|t| (t.id.clone(), t)).collect();
        Self {
            teams: Arc::new(RwLock::new(map)),
            failure: Arc::default(),
        }
    }

    /// Parses a YAML document with a top-level `teams` list.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        let seed: TeamSeed = serde_yaml::from_str(yaml)?;
        Ok(Self::with_teams(seed.teams))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, TeamSeedError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| TeamSeedError::Io {
            path: display.clone(),
            source,
        })?;
        Self::from_yaml_str(&raw).map_err(|source| TeamSeedError::Parse {
            path: display,
            source,
        })
    }

    pub async fn insert(&self, team: TeamConfig) {
        self.teams.write().await.insert(team.id.clone(), team);
    }

    /// Every lookup fails with `error` from now on.
    pub async fn fail_with(&self, error: ServiceError) {
        *self.failure.write().await = Some(error);
    }

    pub async fn team_count(&self) -> usize {
        self.teams.read().await.len()
    }
}

#[async_trait]
impl TeamDirectory for InMemoryTeamDirectory {
    async fn get_team(&self, team_id: &TeamId) -> Result<Option<TeamConfig>, ServiceError> {
        if let Some(err) = self.failure.read().await.clone() {
            return Err(err);
        }
        Ok(self.teams.read().await.get(team_id).cloned())
    }
}
