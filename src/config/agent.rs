//! Turn loop configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::OrchestratorConfig;
use crate::domain::foundation::{Backoff, RetryPolicy};

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Model attempts per turn, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Bound on each model attempt
    #[serde(default = "default_model_timeout")]
    pub model_timeout_secs: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_extraction_max_tokens")]
    pub extraction_max_tokens: u32,

    /// Shorter model output is replaced by the fallback reply
    #[serde(default = "default_min_response_chars")]
    pub min_response_chars: usize,

    #[serde(default = "default_chunk_words")]
    pub chunk_words: usize,

    #[serde(default = "default_chunk_delay_ms")]
    pub chunk_delay_ms: u64,
}

impl AgentConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Backoff::Exponential {
                initial: Duration::from_millis(self.initial_backoff_ms),
                max: Duration::from_millis(self.max_backoff_ms),
            },
        )
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            retry: self.retry_policy(),
            model_timeout: Duration::from_secs(self.model_timeout_secs),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            extraction_max_tokens: self.extraction_max_tokens,
            min_response_chars: self.min_response_chars,
            chunk_words: self.chunk_words,
            chunk_delay: Duration::from_millis(self.chunk_delay_ms),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let invalid = |field, reason| Err(ValidationError::InvalidAgentSetting { field, reason });
        if self.max_attempts == 0 || self.max_attempts > 10 {
            return invalid("max_attempts", "must be between 1 and 10");
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return invalid("initial_backoff_ms", "must not exceed max_backoff_ms");
        }
        if self.model_timeout_secs == 0 {
            return invalid("model_timeout_secs", "must be positive");
        }
        if self.max_tokens == 0 || self.extraction_max_tokens == 0 {
            return invalid("max_tokens", "must be positive");
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return invalid("temperature", "must be between 0.0 and 1.0");
        }
        if self.chunk_words == 0 {
            return invalid("chunk_words", "must be positive");
        }
        Ok(())
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            model_timeout_secs: default_model_timeout(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            extraction_max_tokens: default_extraction_max_tokens(),
            min_response_chars: default_min_response_chars(),
            chunk_words: default_chunk_words(),
            chunk_delay_ms: default_chunk_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    250
}

fn default_max_backoff_ms() -> u64 {
    2_000
}

fn default_model_timeout() -> u64 {
    30
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

fn default_extraction_max_tokens() -> u32 {
    512
}

fn default_min_response_chars() -> usize {
    2
}

fn default_chunk_words() -> usize {
    3
}

fn default_chunk_delay_ms() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_orchestrator_defaults() {
        let config = AgentConfig::default();
        assert!(config.validate().is_ok());

        let built = config.orchestrator();
        let expected = OrchestratorConfig::default();
        assert_eq!(built.retry, expected.retry);
        assert_eq!(built.model_timeout, expected.model_timeout);
        assert_eq!(built.chunk_delay, expected.chunk_delay);
        assert_eq!(built.min_response_chars, expected.min_response_chars);
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let config = AgentConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidAgentSetting { field: "max_attempts", .. })
        ));
    }

    #[test]
    fn test_rejects_inverted_backoff() {
        let config = AgentConfig {
            initial_backoff_ms: 5_000,
            max_backoff_ms: 1_000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_temperature() {
        let config = AgentConfig {
            temperature: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
