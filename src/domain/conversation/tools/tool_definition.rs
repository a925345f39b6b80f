//! Tool definition - parameter schema and metadata for a tool.
//!
//! Schemas are typed rather than free-form JSON Schema: each parameter is
//! plain text, a regex-constrained value, or one of a closed list.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};
use thiserror::Error;

use super::tool_call::ToolName;

/// Matter categories the firm accepts.
pub const MATTER_TYPES: [&str; 12] = [
    "Family Law",
    "Employment Law",
    "Landlord/Tenant",
    "Personal Injury",
    "Business Law",
    "Criminal Law",
    "Civil Law",
    "Contract Review",
    "Property Law",
    "Immigration Law",
    "Estate Planning",
    "General Consultation",
];

pub const URGENCY_LEVELS: [&str; 4] = ["low", "medium", "high", "urgent"];

pub const ANALYSIS_TYPES: [&str; 5] = [
    "summary",
    "legal_issues",
    "key_facts",
    "deadlines",
    "risk_assessment",
];

static EMAIL_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("email regex is valid")
});

static PHONE_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[\d\s().\-]{10,24}$").expect("phone regex is valid"));

/// Canonical spelling of a matter type, matched case-insensitively.
pub fn canonical_matter_type(value: &str) -> Option<&'static str> {
    let value = value.trim();
    MATTER_TYPES
        .iter()
        .copied()
        .find(|t| t.eq_ignore_ascii_case(value))
}

/// A parameter that failed its schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parameter '{field}' {reason}")]
pub struct ParameterError {
    pub field: String,
    pub reason: String,
}

impl ParameterError {
    fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ParameterKind {
    Text,
    Email,
    Phone,
    OneOf(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
    pub kind: ParameterKind,
}

impl ParameterSpec {
    const fn required(name: &'static str, kind: ParameterKind, description: &'static str) -> Self {
        Self {
            name,
            description,
            required: true,
            kind,
        }
    }

    const fn optional(name: &'static str, kind: ParameterKind, description: &'static str) -> Self {
        Self {
            name,
            description,
            required: false,
            kind,
        }
    }

    /// Checks one present value and returns its normalized form.
    fn check(&self, value: &str) -> Result<String, ParameterError> {
        let value = value.trim();
        match self.kind {
            ParameterKind::Text => Ok(value.to_string()),
            ParameterKind::Email => {
                if EMAIL_FIELD.is_match(value) {
                    Ok(value.to_string())
                } else {
                    Err(ParameterError::new(self.name, "is not a valid email address"))
                }
            }
            ParameterKind::Phone => {
                let digits = value.chars().filter(|c| c.is_ascii_digit()).count();
                if PHONE_FIELD.is_match(value) && (10..=15).contains(&digits) {
                    Ok(value.to_string())
                } else {
                    Err(ParameterError::new(self.name, "is not a valid phone number"))
                }
            }
            ParameterKind::OneOf(options) => options
                .iter()
                .find(|o| o.eq_ignore_ascii_case(value))
                .map(|o| o.to_string())
                .ok_or_else(|| {
                    ParameterError::new(self.name, format!("must be one of: {}", options.join(", ")))
                }),
        }
    }

    fn schema(&self) -> Value {
        match self.kind {
            ParameterKind::Text => json!({"type": "string", "description": self.description}),
            ParameterKind::Email => {
                json!({"type": "string", "format": "email", "description": self.description})
            }
            ParameterKind::Phone => {
                json!({"type": "string", "format": "phone", "description": self.description})
            }
            ParameterKind::OneOf(options) => {
                json!({"type": "string", "enum": options, "description": self.description})
            }
        }
    }
}

/// Definition of a tool the model can invoke.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    name: ToolName,
    description: &'static str,
    parameters: Vec<ParameterSpec>,
}

impl ToolDefinition {
    pub fn new(name: ToolName, description: &'static str, parameters: Vec<ParameterSpec>) -> Self {
        Self {
            name,
            description,
            parameters,
        }
    }

    pub fn name(&self) -> ToolName {
        self.name
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    /// JSON Schema view of the parameters, used when teaching the model.
    pub fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for spec in &self.parameters {
            properties.insert(spec.name.to_string(), spec.schema());
            if spec.required {
                required.push(spec.name);
            }
        }
        json!({"type": "object", "required": required, "properties": properties})
    }

    /// Validates parameters and returns the normalized operational copy.
    ///
    /// Strings are trimmed and enum values take their canonical spelling.
    /// Optional parameters that are null or blank are dropped. Unknown keys
    /// are kept untouched.
    pub fn validate(&self, params: &Map<String, Value>) -> Result<Map<String, Value>, ParameterError> {
        let mut normalized = params.clone();
        for spec in &self.parameters {
            let present = match params.get(spec.name) {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) if s.trim().is_empty() => None,
                Some(Value::String(s)) => Some(s.as_str()),
                Some(_) => return Err(ParameterError::new(spec.name, "must be a string")),
            };
            match present {
                Some(value) => {
                    let checked = spec.check(value)?;
                    normalized.insert(spec.name.to_string(), Value::String(checked));
                }
                None if spec.required => {
                    return Err(ParameterError::new(spec.name, "is required"));
                }
                None => {
                    normalized.remove(spec.name);
                }
            }
        }
        Ok(normalized)
    }

    /// The four intake tools.
    pub fn standard_set() -> Vec<ToolDefinition> {
        use ParameterKind::*;
        vec![
            ToolDefinition::new(
                ToolName::ShowContactForm,
                "Display the contact form so the client can enter their name, email, phone and location.",
                vec![ParameterSpec::optional("reason", Text, "Why the form is being shown")],
            ),
            ToolDefinition::new(
                ToolName::CreateMatter,
                "Create a new legal matter once the issue, description and contact details are known.",
                vec![
                    ParameterSpec::required("name", Text, "Client full name"),
                    ParameterSpec::required("matter_type", OneOf(&MATTER_TYPES), "Matter category"),
                    ParameterSpec::required("description", Text, "Summary of the client's situation"),
                    ParameterSpec::optional("email", Email, "Client email address"),
                    ParameterSpec::optional("phone", Phone, "Client phone number"),
                    ParameterSpec::optional("location", Text, "Client city and state"),
                    ParameterSpec::optional("opposing_party", Text, "Other side of the dispute"),
                    ParameterSpec::optional("urgency", OneOf(&URGENCY_LEVELS), "How urgent the matter is"),
                ],
            ),
            ToolDefinition::new(
                ToolName::RequestLawyerReview,
                "Ask a lawyer to review the matter when it is urgent or complex.",
                vec![
                    ParameterSpec::required("urgency", OneOf(&URGENCY_LEVELS), "How urgent the review is"),
                    ParameterSpec::required("matter_type", OneOf(&MATTER_TYPES), "Matter category"),
                    ParameterSpec::optional("complexity", Text, "Why the matter is complex"),
                    ParameterSpec::optional("reason", Text, "Why review is needed"),
                ],
            ),
            ToolDefinition::new(
                ToolName::AnalyzeDocument,
                "Analyze a document the client uploaded in this conversation.",
                vec![
                    ParameterSpec::required("file_id", Text, "Id of the uploaded file"),
                    ParameterSpec::required("analysis_type", OneOf(&ANALYSIS_TYPES), "Kind of analysis"),
                    ParameterSpec::optional("specific_question", Text, "Question to answer about the document"),
                ],
            ),
        ]
    }
}
