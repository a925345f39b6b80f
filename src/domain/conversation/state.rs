//! Intake conversation state machine.
//!
//! State is a pure function of the transcript and the extracted context.
//! There is no stored state and no transition table: every turn walks the
//! same fixed-priority decision list, cheapest checks first.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::context::ConversationContext;
use super::message::Transcript;
use super::signals;

/// Descriptions at or below this many characters are too thin to qualify on.
pub const QUALIFYING_DESCRIPTION_CHARS: usize = 20;

/// Where the intake conversation currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationState {
    /// Nothing has been said yet.
    #[default]
    Initial,
    /// Asking about the firm rather than presenting a matter.
    GeneralInquiry,
    CollectingLegalIssue,
    CollectingDetails,
    /// Asking clarifying questions about urgency and seriousness.
    QualifyingLead,
    ShowingContactForm,
    ReadyToCreateMatter,
    /// Set by the orchestrator after a successful `create_matter`.
    MatterCreated,
    /// Set by the orchestrator after a failed `create_matter`.
    MatterCreationFailed,
    GatheringInformation,
}

impl ConversationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "INITIAL",
            Self::GeneralInquiry => "GENERAL_INQUIRY",
            Self::CollectingLegalIssue => "COLLECTING_LEGAL_ISSUE",
            Self::CollectingDetails => "COLLECTING_DETAILS",
            Self::QualifyingLead => "QUALIFYING_LEAD",
            Self::ShowingContactForm => "SHOWING_CONTACT_FORM",
            Self::ReadyToCreateMatter => "READY_TO_CREATE_MATTER",
            Self::MatterCreated => "MATTER_CREATED",
            Self::MatterCreationFailed => "MATTER_CREATION_FAILED",
            Self::GatheringInformation => "GATHERING_INFORMATION",
        }
    }

    /// True for the two states only matter creation itself can produce.
    pub fn is_matter_outcome(&self) -> bool {
        matches!(self, Self::MatterCreated | Self::MatterCreationFailed)
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sensitive matters skip lead qualification.
///
/// Shared by the state machine and the prompt composer.
pub fn is_sensitive_matter(ctx: &ConversationContext) -> bool {
    let issue = ctx.issue_type().unwrap_or_default();
    let description = ctx.description_text().unwrap_or_default();
    signals::mentions_sensitive_topic(issue) || signals::mentions_sensitive_topic(description)
}

/// Whether the conversation has what it needs to create a matter.
///
/// Issue type and description are always required. Contact info is required
/// unless the matter is sensitive. Shared by the state machine and the
/// prompt composer so the two can never disagree.
pub fn should_create_matter(ctx: &ConversationContext) -> bool {
    ctx.issue_type().is_some()
        && ctx.description_text().is_some()
        && (ctx.has_contact_info || is_sensitive_matter(ctx))
}

/// Decisions that need no extracted context: empty and greeting transcripts.
///
/// Returns `None` when extraction is required to decide.
pub fn pre_extraction_state(transcript: &Transcript) -> Option<ConversationState> {
    if transcript.is_empty() {
        return Some(ConversationState::Initial);
    }
    if signals::starts_with_greeting(transcript) {
        return Some(ConversationState::GatheringInformation);
    }
    None
}

/// Full fixed-priority decision list.
pub fn decide_state(transcript: &Transcript, ctx: &ConversationContext) -> ConversationState {
    if let Some(state) = pre_extraction_state(transcript) {
        return state;
    }
    if ctx.is_general_inquiry {
        return ConversationState::GeneralInquiry;
    }
    if ctx.issue_type().is_none() {
        return ConversationState::CollectingLegalIssue;
    }
    let description = match ctx.description_text() {
        Some(d) => d,
        None => return ConversationState::CollectingDetails,
    };
    if should_create_matter(ctx) {
        return ConversationState::ReadyToCreateMatter;
    }
    if !ctx.is_qualified_lead && description.chars().count() > QUALIFYING_DESCRIPTION_CHARS {
        return ConversationState::QualifyingLead;
    }
    ConversationState::ShowingContactForm
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::message::ChatMessage;

    fn narrative() -> Transcript {
        Transcript::new(vec![ChatMessage::user(
            "My ex-husband stopped paying child support six months ago",
        )])
    }

    fn family_law(description_len: usize) -> ConversationContext {
        ConversationContext {
            legal_issue_type: Some("Family Law".to_string()),
            description: Some("d".repeat(description_len)),
            has_legal_issue: true,
            ..ConversationContext::minimal()
        }
    }

    mod pre_extraction {
        use super::*;

        #[test]
        fn empty_transcript_is_initial() {
            assert_eq!(
                pre_extraction_state(&Transcript::default()),
                Some(ConversationState::Initial)
            );
        }

        #[test]
        fn greeting_gathers_information() {
            let t = Transcript::new(vec![ChatMessage::user("hi")]);
            assert_eq!(
                pre_extraction_state(&t),
                Some(ConversationState::GatheringInformation)
            );
        }

        #[test]
        fn narrative_needs_extraction() {
            assert_eq!(pre_extraction_state(&narrative()), None);
        }
    }

    mod decision_list {
        use super::*;

        #[test]
        fn greeting_is_never_reclassified() {
            let t = Transcript::new(vec![
                ChatMessage::user("hello"),
                ChatMessage::user("I was arrested, my email is a@b.co"),
            ]);
            let mut ctx = family_law(80);
            ctx.has_contact_info = true;
            assert_eq!(decide_state(&t, &ctx), ConversationState::GatheringInformation);
        }

        #[test]
        fn general_inquiry_wins_over_missing_fields() {
            let ctx = ConversationContext::general_inquiry(false);
            assert_eq!(decide_state(&narrative(), &ctx), ConversationState::GeneralInquiry);
        }

        #[test]
        fn missing_issue_type_collects_issue() {
            assert_eq!(
                decide_state(&narrative(), &ConversationContext::minimal()),
                ConversationState::CollectingLegalIssue
            );
        }

        #[test]
        fn missing_description_collects_details() {
            let ctx = ConversationContext {
                description: None,
                ..family_law(0)
            };
            assert_eq!(decide_state(&narrative(), &ctx), ConversationState::CollectingDetails);
        }

        #[test]
        fn unqualified_lead_with_long_description_is_qualified() {
            assert_eq!(
                decide_state(&narrative(), &family_law(80)),
                ConversationState::QualifyingLead
            );
        }

        #[test]
        fn contact_info_makes_matter_ready_regardless_of_qualification() {
            let mut ctx = family_law(80);
            ctx.has_contact_info = true;
            assert_eq!(decide_state(&narrative(), &ctx), ConversationState::ReadyToCreateMatter);

            ctx.is_qualified_lead = true;
            assert_eq!(decide_state(&narrative(), &ctx), ConversationState::ReadyToCreateMatter);
        }

        #[test]
        fn qualified_lead_without_contact_shows_form() {
            let mut ctx = family_law(80);
            ctx.is_qualified_lead = true;
            assert_eq!(decide_state(&narrative(), &ctx), ConversationState::ShowingContactForm);
        }

        #[test]
        fn short_description_shows_form() {
            assert_eq!(
                decide_state(&narrative(), &family_law(20)),
                ConversationState::ShowingContactForm
            );
        }

        #[test]
        fn sensitive_matter_skips_qualification() {
            let ctx = ConversationContext {
                legal_issue_type: Some("Criminal Law".to_string()),
                description: Some("My brother was arrested for a DUI last night".to_string()),
                has_legal_issue: true,
                ..ConversationContext::minimal()
            };
            assert!(is_sensitive_matter(&ctx));
            assert!(should_create_matter(&ctx));
            assert_eq!(decide_state(&narrative(), &ctx), ConversationState::ReadyToCreateMatter);
        }
    }

    #[test]
    fn state_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&ConversationState::ReadyToCreateMatter).unwrap();
        assert_eq!(json, "\"READY_TO_CREATE_MATTER\"");
        assert_eq!(ConversationState::QualifyingLead.to_string(), "QUALIFYING_LEAD");
    }
}
