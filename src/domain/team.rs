//! Tenant (law firm) configuration as seen by the intake core.
//!
//! Storage of team configuration is external; this is the read model the
//! team directory hands back.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::TeamId;

/// Optional capabilities a team can switch on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamFeatures {
    pub document_analysis: bool,
    pub lawyer_review: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamConfig {
    pub id: TeamId,
    pub name: String,
    /// Practice areas the firm advertises.
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub jurisdiction: Option<String>,
    #[serde(default)]
    pub features: TeamFeatures,
}

impl TeamConfig {
    pub fn new(id: TeamId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            services: Vec::new(),
            jurisdiction: None,
            features: TeamFeatures::default(),
        }
    }

    pub fn with_services(mut self, services: Vec<String>) -> Self {
        self.services = services;
        self
    }

    pub fn with_jurisdiction(mut self, jurisdiction: impl Into<String>) -> Self {
        self.jurisdiction = Some(jurisdiction.into());
        self
    }

    pub fn with_features(mut self, features: TeamFeatures) -> Self {
        self.features = features;
        self
    }
}
