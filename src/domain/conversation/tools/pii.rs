//! PII masking for tool parameters that end up in logs and events.
//!
//! The masked copy is never passed to a handler.

use serde_json::{Map, Value};

pub fn mask_email(email: &str) -> String {
    match email.trim().split_once('@') {
        Some((local, domain)) => {
            let first: String = local.chars().take(1).collect();
            format!("{}***@{}", first, domain)
        }
        None => "***".to_string(),
    }
}

pub fn mask_phone(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return "***-***-****".to_string();
    }
    let last4: String = digits[digits.len() - 4..].iter().collect();
    format!("***-***-{}", last4)
}

pub fn mask_name(name: &str) -> String {
    match name.trim().chars().next() {
        Some(initial) => format!("{}***", initial),
        None => "***".to_string(),
    }
}

pub const REDACTED: &str = "[redacted]";

/// Returns a copy of `params` with personal fields masked.
pub fn mask_parameters(params: &Map<String, Value>) -> Map<String, Value> {
    params
        .iter()
        .map(|(key, value)| {
            let masked = match (key.as_str(), value.as_str()) {
                ("email", Some(v)) => Value::String(mask_email(v)),
                ("phone", Some(v)) => Value::String(mask_phone(v)),
                ("name", Some(v)) => Value::String(mask_name(v)),
                ("location", Some(_)) => Value::String(REDACTED.to_string()),
                _ => value.clone(),
            };
            (key.clone(), masked)
        })
        .collect()
}
