//! Triage policy configuration.
//!
//! Every table the engine consults (department triggers, attrition phrases,
//! sentiment and priority cascades, zero-shot labels) lives here and is read
//! once at startup. A missing file means the built-in defaults.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::keywords::{self, DepartmentRule, GENERAL_DEPARTMENT};
use crate::models::KEYWORD_DELIMITER;
use crate::priority::{self, PriorityRule};
use crate::sentiment::{self, SentimentRule};

const HF_INFERENCE_BASE: &str = "https://api-inference.huggingface.co/models";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    pub keywords: KeywordConfig,
    pub sentiment: SentimentConfig,
    pub priority: PriorityConfig,
    pub zero_shot: ZeroShotConfig,
    pub models: ModelConfig,
    pub runner: RunnerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    pub fallback_department: String,
    /// Declaration order is the tie-break between departments.
    pub departments: Vec<DepartmentRule>,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            fallback_department: GENERAL_DEPARTMENT.to_string(),
            departments: keywords::default_departments(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
    pub attrition_keywords: Vec<String>,
    pub rules: Vec<SentimentRule>,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            attrition_keywords: sentiment::default_attrition_keywords(),
            rules: sentiment::default_rules(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityConfig {
    pub rules: Vec<PriorityRule>,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            rules: priority::default_rules(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZeroShotConfig {
    pub candidate_labels: Vec<String>,
}

impl Default for ZeroShotConfig {
    fn default() -> Self {
        Self {
            candidate_labels: [
                "card_declined",
                "atm_issue",
                "account_balance",
                "fraud_security",
                "app_technical",
                "branch_location",
                "fees_charges",
                "loan_mortgage",
                "general_inquiry",
            ]
            .iter()
            .map(|l| l.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub sentiment_url: String,
    pub zero_shot_url: String,
    /// Text is cut to this many characters before inference.
    pub max_input_chars: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            sentiment_url: format!(
                "{HF_INFERENCE_BASE}/distilbert-base-uncased-finetuned-sst-2-english"
            ),
            zero_shot_url: format!("{HF_INFERENCE_BASE}/facebook/bart-large-mnli"),
            max_input_chars: 512,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub inference_timeout_ms: u64,
    pub max_in_flight: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            inference_timeout_ms: 10_000,
            max_in_flight: 4,
        }
    }
}

impl RunnerConfig {
    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_timeout_ms)
    }
}

impl TriageConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path` if given, otherwise returns the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_toml_str(&raw)
            }
            None => Ok(Self::default()),
        }
    }

    /// Endpoint environment variables win over the file.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("SENTIMENT_MODEL_URL") {
            self.models.sentiment_url = url;
        }
        if let Ok(url) = std::env::var("ZERO_SHOT_MODEL_URL") {
            self.models.zero_shot_url = url;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keywords.departments.is_empty() {
            return Err(ConfigError::invalid(
                "keywords.departments",
                "at least one department is required",
            ));
        }

        let mut seen = HashSet::new();
        for department in &self.keywords.departments {
            if department.name.trim().is_empty() {
                return Err(ConfigError::invalid(
                    "keywords.departments",
                    "department names must not be empty",
                ));
            }
            if !seen.insert(department.name.as_str()) {
                return Err(ConfigError::invalid(
                    "keywords.departments",
                    format!("duplicate department {}", department.name),
                ));
            }
            if department.triggers.iter().any(|t| t.is_empty()) || department.triggers.is_empty() {
                return Err(ConfigError::invalid(
                    "keywords.departments",
                    format!("department {} needs non-empty triggers", department.name),
                ));
            }
        }

        if let Some(bad) = self
            .sentiment
            .attrition_keywords
            .iter()
            .find(|k| k.is_empty() || k.contains(KEYWORD_DELIMITER))
        {
            return Err(ConfigError::invalid(
                "sentiment.attrition_keywords",
                format!("{bad:?} is empty or contains '{KEYWORD_DELIMITER}'"),
            ));
        }

        if self.zero_shot.candidate_labels.is_empty() {
            return Err(ConfigError::invalid(
                "zero_shot.candidate_labels",
                "at least one label is required",
            ));
        }

        if self.runner.inference_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "runner.inference_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.runner.max_in_flight == 0 {
            return Err(ConfigError::invalid(
                "runner.max_in_flight",
                "must be at least 1",
            ));
        }
        if self.models.max_input_chars == 0 {
            return Err(ConfigError::invalid(
                "models.max_input_chars",
                "must be greater than zero",
            ));
        }

        Ok(())
    }
}
