//! Structured fact set derived from a transcript.
//!
//! A `ConversationContext` is rebuilt from scratch every turn and dropped
//! when the turn ends. Nothing here is persisted.

use serde::{Deserialize, Serialize};

use super::state::ConversationState;

/// Facts known about the prospective client's matter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    pub legal_issue_type: Option<String>,
    pub description: Option<String>,
    pub opposing_party: Option<String>,
    pub has_legal_issue: bool,
    pub has_contact_info: bool,
    pub is_sensitive_matter: bool,
    pub is_general_inquiry: bool,
    pub should_create_matter: bool,
    pub is_qualified_lead: bool,
    pub state: ConversationState,
}

impl ConversationContext {
    /// Context used when extraction could not run or its output was unusable.
    pub fn minimal() -> Self {
        Self {
            legal_issue_type: None,
            description: None,
            opposing_party: None,
            has_legal_issue: false,
            has_contact_info: false,
            is_sensitive_matter: false,
            is_general_inquiry: false,
            should_create_matter: false,
            is_qualified_lead: false,
            state: ConversationState::GatheringInformation,
        }
    }

    /// Context for a transcript that is only asking general questions.
    ///
    /// Never permits a side effect.
    pub fn general_inquiry(has_contact_info: bool) -> Self {
        Self {
            has_contact_info,
            is_general_inquiry: true,
            state: ConversationState::GeneralInquiry,
            ..Self::minimal()
        }
    }

    /// Issue type, trimmed, if non-blank.
    pub fn issue_type(&self) -> Option<&str> {
        non_blank(self.legal_issue_type.as_deref())
    }

    /// Description, trimmed, if non-blank.
    pub fn description_text(&self) -> Option<&str> {
        non_blank(self.description.as_deref())
    }

    pub fn opposing_party_name(&self) -> Option<&str> {
        non_blank(self.opposing_party.as_deref())
    }

    pub fn with_state(mut self, state: ConversationState) -> Self {
        self.state = state;
        self
    }
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self::minimal()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
