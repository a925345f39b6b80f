//! Deterministic text signals used by the intake heuristics.
//!
//! Everything here is a pure pattern match. None of it calls the model, so
//! results are reproducible for a given transcript.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::message::Transcript;

/// Trimmed text shorter than this is treated as a general inquiry.
pub const SHORT_TEXT_CHARS: usize = 20;

/// Marker the contact form writes into the user message it submits.
pub const CONTACT_FORM_MARKER: &str = "Contact Information:";

/// Marker left in the assistant reply after a matter was created.
pub const MATTER_REFERENCE_MARKER: &str = "Matter reference:";

static GREETING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(hi|hello|hey|hiya|howdy|greetings|good\s+morning|good\s+afternoon|good\s+evening|yo)\b",
    )
    .expect("greeting regex is valid")
});

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").expect("email regex is valid")
});

// Candidate phone runs; digit count is checked separately.
static PHONE_CANDIDATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+?\(?\d[\d\s().\-]{8,}\d").expect("phone regex is valid"));

static CONTACT_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)contact\s+information\s*:").expect("marker regex is valid"));

static SENSITIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(arrest\w*|jail\w*|criminal|charged|dui|dwi|police|domestic\s+violence|abus\w*|assault\w*|restraining\s+order|suicid\w*|self[\s\-]harm|overdos\w*|emergency|hospital\w*|medical|injur\w*|deport\w*)\b",
    )
    .expect("sensitivity regex is valid")
});

static GENERAL_INQUIRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(\bhow\s+much\b|\bpric(e|es|ing)\b|\bfees?\b|\bcosts?\b|\brates?\b|\bwhat\s+(services|kind\s+of\s+cases|areas)\b|\bdo\s+you\s+(handle|offer|do|take|practice)\b|\b(areas?\s+of\s+practice|practice\s+areas?)\b|\boffice\s+hours\b|\bhours\s+of\s+operation\b|\bwhere\s+are\s+you\s+located\b|\b(free\s+)?consultations?\s+(available|availability|fee)\b)",
    )
    .expect("general inquiry regex is valid")
});

const MIN_PHONE_DIGITS: usize = 10;
const MAX_PHONE_DIGITS: usize = 15;

fn is_phone_run(candidate: &str) -> bool {
    let digits = candidate.chars().filter(|c| c.is_ascii_digit()).count();
    (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits)
}

/// True when the first non-blank user message opens with a greeting word.
pub fn starts_with_greeting(transcript: &Transcript) -> bool {
    transcript
        .first_user_message()
        .map(|m| GREETING.is_match(&m.content))
        .unwrap_or(false)
}

/// True when `text` opens with a greeting word.
pub fn is_greeting(text: &str) -> bool {
    GREETING.is_match(text)
}

pub fn contains_email(text: &str) -> bool {
    EMAIL.is_match(text)
}

pub fn contains_phone(text: &str) -> bool {
    PHONE_CANDIDATE
        .find_iter(text)
        .any(|m| is_phone_run(m.as_str()))
}

/// Contact details or a contact-form submission inside one piece of text.
pub fn contains_contact_info(text: &str) -> bool {
    CONTACT_MARKER.is_match(text) || contains_email(text) || contains_phone(text)
}

/// Contact info in any user message of the transcript.
///
/// Evaluated message by message, so extending a transcript can never turn a
/// positive result negative.
pub fn transcript_has_contact_info(transcript: &Transcript) -> bool {
    transcript
        .user_messages()
        .any(|m| contains_contact_info(&m.content))
}

/// Crisis, medical, or criminal vocabulary.
pub fn mentions_sensitive_topic(text: &str) -> bool {
    SENSITIVE.is_match(text)
}

/// Pricing / services phrasing typical of a general inquiry.
pub fn matches_general_inquiry(text: &str) -> bool {
    GENERAL_INQUIRY.is_match(text)
}

pub fn is_short_text(text: &str) -> bool {
    text.trim().chars().count() < SHORT_TEXT_CHARS
}

/// True if an earlier assistant reply already confirmed a created matter.
pub fn has_completion_marker(transcript: &Transcript) -> bool {
    transcript
        .assistant_messages()
        .any(|m| m.content.contains(MATTER_REFERENCE_MARKER))
}

/// Replaces emails and phone numbers with placeholders.
pub fn redact_contact_details(text: &str) -> String {
    let no_email = EMAIL.replace_all(text, "[email]");
    PHONE_CANDIDATE
        .replace_all(&no_email, |caps: &Captures| {
            let run = &caps[0];
            if is_phone_run(run) {
                "[phone]".to_string()
            } else {
                run.to_string()
            }
        })
        .into_owned()
}
