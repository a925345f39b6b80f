//! Team Directory Port - Read access to tenant configuration.
//!
//! A failing directory must never abort a turn; the orchestrator proceeds
//! without team configuration instead.

use async_trait::async_trait;

use super::intake_services::ServiceError;
use crate::domain::foundation::TeamId;
use crate::domain::team::TeamConfig;

#[async_trait]
pub trait TeamDirectory: Send + Sync {
    /// Returns the team's configuration, or `None` if the team is unknown.
    async fn get_team(&self, team_id: &TeamId) -> Result<Option<TeamConfig>, ServiceError>;
}
