//! Context extraction: prompt, output parsing, and context assembly.
//!
//! The model call itself lives in the application layer. This module holds
//! the deterministic parts so they can be tested without a provider.

use serde::Deserialize;
use thiserror::Error;

use super::context::ConversationContext;
use super::message::{Role, Transcript};
use super::sanitizer::{ResponseSanitizer, SanitizationError};
use super::signals;
use super::state::{decide_state, is_sensitive_matter, should_create_matter};
use super::tools::canonical_matter_type;

/// Temperature used for the extraction call.
pub const EXTRACTION_TEMPERATURE: f32 = 0.1;

/// Errors that can occur while reading the extraction output.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Sanitization failed: {0}")]
    Sanitization(#[from] SanitizationError),

    #[error("No JSON object found in extraction output")]
    MissingJson,

    #[error("JSON parse error: {0}")]
    ParseError(String),
}

/// Raw facts the extraction call reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExtractedFacts {
    #[serde(default)]
    pub legal_issue_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub opposing_party: Option<String>,
    #[serde(default)]
    pub is_qualified_lead: bool,
}

/// System instructions for the extraction call.
pub fn extraction_instructions() -> String {
    let mut prompt = String::from(
        "You extract facts from a conversation between a prospective client and a law firm's intake assistant.\n\
         Respond with ONLY a JSON object, no prose, with exactly these keys:\n\
         {\"legal_issue_type\": string or null, \"description\": string or null, \
         \"opposing_party\": string or null, \"is_qualified_lead\": boolean}\n\n\
         Rules:\n\
         - legal_issue_type: one of the categories below, or null if the client has not described a legal problem.\n\
         - description: one or two sentences summarising the client's situation in their own terms, or null.\n\
         - opposing_party: the person or organisation on the other side, or null.\n\
         - is_qualified_lead: true only if the client has answered questions about urgency, timeline, or desired outcome.\n\
         - Never include email addresses or phone numbers.\n\nCategories:\n",
    );
    for matter_type in super::tools::MATTER_TYPES {
        prompt.push_str("- ");
        prompt.push_str(matter_type);
        prompt.push('\n');
    }
    prompt
}

/// Renders the transcript as the single user message of the extraction call.
pub fn extraction_input(transcript: &Transcript) -> String {
    let mut out = String::from("Conversation:\n");
    for message in transcript.messages() {
        let label = match message.role {
            Role::User => "Client",
            Role::Assistant => "Assistant",
            Role::System => continue,
        };
        out.push_str(label);
        out.push_str(": ");
        out.push_str(message.content.trim());
        out.push('\n');
    }
    out
}

/// Context decided without a model call, when the transcript is too short to
/// describe a matter.
pub fn heuristic_context(transcript: &Transcript) -> Option<ConversationContext> {
    if signals::is_short_text(&transcript.user_text()) {
        return Some(ConversationContext::general_inquiry(
            signals::transcript_has_contact_info(transcript),
        ));
    }
    None
}

/// Context used when the extraction call itself errors.
pub fn fallback_context(transcript: &Transcript) -> ConversationContext {
    ConversationContext::general_inquiry(signals::transcript_has_contact_info(transcript))
}

/// Parses the extraction output into facts.
pub fn parse_extraction(output: &str) -> Result<ExtractedFacts, ExtractionError> {
    let sanitized = ResponseSanitizer::new().sanitize(output)?;
    let json = find_json_object(&sanitized).ok_or(ExtractionError::MissingJson)?;
    serde_json::from_str(json).map_err(|e| ExtractionError::ParseError(e.to_string()))
}

/// Combines model-reported facts with the deterministic signals.
pub fn assemble_context(transcript: &Transcript, facts: ExtractedFacts) -> ConversationContext {
    let legal_issue_type = clean_fact(facts.legal_issue_type).map(|issue| {
        canonical_matter_type(&issue)
            .map(str::to_string)
            .unwrap_or(issue)
    });

    let mut ctx = ConversationContext {
        has_legal_issue: legal_issue_type.is_some(),
        legal_issue_type,
        description: clean_fact(facts.description),
        opposing_party: clean_fact(facts.opposing_party),
        has_contact_info: signals::transcript_has_contact_info(transcript),
        is_qualified_lead: facts.is_qualified_lead,
        ..ConversationContext::minimal()
    };

    // Inquiry phrasing only counts until a legal issue has been established.
    ctx.is_general_inquiry =
        !ctx.has_legal_issue && signals::matches_general_inquiry(&transcript.user_text());
    ctx.is_sensitive_matter = is_sensitive_matter(&ctx);
    ctx.should_create_matter = should_create_matter(&ctx);
    ctx.state = decide_state(transcript, &ctx);
    ctx
}

fn clean_fact(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    let placeholder = ["null", "none", "unknown", "n/a", "na", "not provided"]
        .iter()
        .any(|p| trimmed.eq_ignore_ascii_case(p));
    if trimmed.is_empty() || placeholder {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Finds the first JSON object in free text, preferring a fenced code block.
pub fn find_json_object(text: &str) -> Option<&str> {
    for fence in ["```json", "```"] {
        if let Some(start) = text.find(fence) {
            let body_start = start + fence.len();
            if let Some(len) = text[body_start..].find("```") {
                let body = &text[body_start..body_start + len];
                if let Some(open) = body.find('{') {
                    if let Some(json) = slice_balanced_json(body, open) {
                        return Some(json);
                    }
                }
            }
        }
    }
    let open = text.find('{')?;
    slice_balanced_json(text, open)
}

/// Slices the balanced `{...}` or `[...]` block starting at byte `start`.
///
/// Braces inside string literals are ignored. Returns `None` if the block
/// never closes.
pub fn slice_balanced_json(text: &str, start: usize) -> Option<&str> {
    let rest = text.get(start..)?;
    let open = rest.chars().next()?;
    let close = match open {
        '{' => '}',
        '[' => ']',
        _ => return None,
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in rest.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            _ if in_string => {}
            c if c == open => depth += 1,
            c if c == close => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&rest[..i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::message::ChatMessage;
    use crate::domain::conversation::state::ConversationState;

    fn transcript(texts: &[&str]) -> Transcript {
        Transcript::new(texts.iter().map(|t| ChatMessage::user(*t)).collect())
    }

    mod balanced_json {
        use super::*;

        #[test]
        fn stops_at_matching_brace() {
            let text = r#"{"a": {"b": 1}} trailing {"c": 2}"#;
            assert_eq!(slice_balanced_json(text, 0), Some(r#"{"a": {"b": 1}}"#));
        }

        #[test]
        fn ignores_braces_in_strings() {
            let text = r#"{"note": "use } and \" carefully"} rest"#;
            assert_eq!(
                slice_balanced_json(text, 0),
                Some(r#"{"note": "use } and \" carefully"}"#)
            );
        }

        #[test]
        fn handles_multibyte_text() {
            let text = "préface {\"nom\": \"Zoë\"} fin";
            let start = text.find('{').unwrap();
            assert_eq!(slice_balanced_json(text, start), Some("{\"nom\": \"Zoë\"}"));
        }

        #[test]
        fn unterminated_block_is_none() {
            assert_eq!(slice_balanced_json(r#"{"a": 1"#, 0), None);
        }

        #[test]
        fn prefers_code_fence() {
            let text = "Sure {not json}\n```json\n{\"x\": 1}\n```";
            assert_eq!(find_json_object(text), Some("{\"x\": 1}"));
        }
    }

    mod parsing {
        use super::*;

        #[test]
        fn reads_facts_from_prose_wrapped_json() {
            let output = r#"Here you go: {"legal_issue_type": "Family Law", "description": "custody dispute", "opposing_party": null, "is_qualified_lead": true} done"#;
            let facts = parse_extraction(output).unwrap();
            assert_eq!(facts.legal_issue_type.as_deref(), Some("Family Law"));
            assert!(facts.is_qualified_lead);
            assert!(facts.opposing_party.is_none());
        }

        #[test]
        fn missing_keys_default() {
            let facts = parse_extraction("{}").unwrap();
            assert_eq!(facts, ExtractedFacts::default());
        }

        #[test]
        fn prose_only_is_missing_json() {
            assert_eq!(parse_extraction("I cannot help"), Err(ExtractionError::MissingJson));
        }

        #[test]
        fn malformed_json_is_parse_error() {
            assert!(matches!(
                parse_extraction(r#"{"legal_issue_type": Family}"#),
                Err(ExtractionError::ParseError(_))
            ));
        }
    }

    mod assembly {
        use super::*;

        #[test]
        fn short_transcript_is_general_inquiry_without_model() {
            let ctx = heuristic_context(&transcript(&["need help"])).unwrap();
            assert!(ctx.is_general_inquiry);
            assert!(heuristic_context(&transcript(&["My landlord locked me out of my apartment"])).is_none());
        }

        #[test]
        fn placeholders_are_absent_and_issue_is_canonical() {
            let facts = ExtractedFacts {
                legal_issue_type: Some("family law".to_string()),
                description: Some("N/A".to_string()),
                opposing_party: Some("  ".to_string()),
                is_qualified_lead: false,
            };
            let ctx = assemble_context(&transcript(&["I am going through a hard divorce"]), facts);
            assert_eq!(ctx.legal_issue_type.as_deref(), Some("Family Law"));
            assert!(ctx.description.is_none());
            assert!(ctx.opposing_party.is_none());
            assert_eq!(ctx.state, ConversationState::CollectingDetails);
        }

        #[test]
        fn inquiry_phrasing_ignored_once_issue_known() {
            let t = transcript(&["How much do you charge? My employer fired me for reporting fraud"]);
            let with_issue = assemble_context(
                &t,
                ExtractedFacts {
                    legal_issue_type: Some("Employment Law".to_string()),
                    ..Default::default()
                },
            );
            assert!(!with_issue.is_general_inquiry);

            let without_issue = assemble_context(&t, ExtractedFacts::default());
            assert!(without_issue.is_general_inquiry);
            assert_eq!(without_issue.state, ConversationState::GeneralInquiry);
        }

        #[test]
        fn contact_info_comes_from_user_text() {
            let t = Transcript::new(vec![
                ChatMessage::user("My landlord refuses to return my deposit"),
                ChatMessage::assistant("Could you share your email?"),
                ChatMessage::user("sure, tenant@mail.com"),
            ]);
            let ctx = assemble_context(
                &t,
                ExtractedFacts {
                    legal_issue_type: Some("Landlord/Tenant".to_string()),
                    description: Some("Landlord kept a security deposit".to_string()),
                    ..Default::default()
                },
            );
            assert!(ctx.has_contact_info);
            assert!(ctx.should_create_matter);
            assert_eq!(ctx.state, ConversationState::ReadyToCreateMatter);
        }

        #[test]
        fn extraction_input_labels_roles() {
            let t = Transcript::new(vec![
                ChatMessage::system("hidden"),
                ChatMessage::user("hi"),
                ChatMessage::assistant("hello"),
            ]);
            assert_eq!(extraction_input(&t), "Conversation:\nClient: hi\nAssistant: hello\n");
        }
    }
}
