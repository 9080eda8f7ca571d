use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const KEYWORD_DELIMITER: &str = "|";
pub const CLASSIFICATION_FAILED: &str = "classification_failed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub author: String,
    pub text: String,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    #[serde(alias = "POSITIVE")]
    Positive,
    #[serde(alias = "NEGATIVE")]
    Negative,
}

impl Polarity {
    /// Parses a model label case-insensitively; anything else is `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "positive" => Some(Self::Positive),
            "negative" => Some(Self::Negative),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentSignal {
    pub polarity: Polarity,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub category: String,
    pub confidence: f64,
}

impl ClassificationResult {
    pub fn keyword(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentClass {
    Positive,
    NeutralAtrisk,
    Negative,
}

impl SentimentClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::NeutralAtrisk => "neutral_atrisk",
            Self::Negative => "negative",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttritionRisk {
    Low,
    Medium,
    High,
}

impl AttritionRisk {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketStatus {
    Open,
    #[serde(rename = "classification_failed")]
    ClassificationFailed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::ClassificationFailed => CLASSIFICATION_FAILED,
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(SentimentClass, AttritionRisk, Priority, TicketStatus);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentimentVerdict {
    pub sentiment_class: SentimentClass,
    pub attrition_risk: AttritionRisk,
    pub matched_keywords: Vec<String>,
}

/// One persisted ticket. Field order is the on-disk column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_id: String,
    pub message_id: String,
    pub author: String,
    pub text: String,
    pub created_timestamp: String,
    pub department_or_category: String,
    pub sentiment_class: SentimentClass,
    pub sentiment_confidence: f64,
    pub attrition_risk: AttritionRisk,
    #[serde(
        serialize_with = "serialize_keywords",
        deserialize_with = "deserialize_keywords"
    )]
    pub matched_keywords: Vec<String>,
    pub priority: Priority,
    pub status: TicketStatus,
}

fn serialize_keywords<S>(keywords: &[String], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&keywords.join(KEYWORD_DELIMITER))
}

fn deserialize_keywords<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let joined = String::deserialize(deserializer)?;
    if joined.is_empty() {
        return Ok(Vec::new());
    }
    Ok(joined.split(KEYWORD_DELIMITER).map(str::to_string).collect())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub classification_failed: usize,
    pub skipped_missing_text: usize,
    pub rejected_malformed: usize,
}

impl BatchSummary {
    pub fn total_rows(&self) -> usize {
        self.processed + self.skipped_missing_text + self.rejected_malformed
    }
}

#[derive(Debug, Clone)]
pub struct BreakdownRow {
    pub label: String,
    pub count: usize,
    pub percent: f64,
}
