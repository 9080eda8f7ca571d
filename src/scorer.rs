//! Model capabilities consumed by the engine.
//!
//! The engine only sees [`TextScorer`] (binary sentiment) and
//! [`ZeroShotClassifier`] (ranked labels). [`HttpInferenceClient`] speaks the
//! Hugging Face inference JSON shapes; [`LexiconScorer`] is a deterministic
//! offline stand-in.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TriageError;
use crate::models::{Polarity, SentimentSignal};

#[async_trait]
pub trait TextScorer: Send + Sync {
    async fn score(&self, text: &str) -> Result<SentimentSignal, TriageError>;
    fn name(&self) -> &str;
}

/// Ranked output of a zero-shot model, best label first.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ZeroShotOutput {
    pub labels: Vec<String>,
    pub scores: Vec<f64>,
}

impl ZeroShotOutput {
    pub fn top(&self) -> Option<(&str, f64)> {
        let label = self.labels.first()?;
        let score = self.scores.first().copied().unwrap_or(0.0);
        Some((label.as_str(), score))
    }
}

#[async_trait]
pub trait ZeroShotClassifier: Send + Sync {
    async fn classify(
        &self,
        text: &str,
        candidate_labels: &[String],
    ) -> Result<ZeroShotOutput, TriageError>;
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SentimentResponse {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

impl SentimentResponse {
    fn best(self) -> Option<LabelScore> {
        let scores = match self {
            Self::Nested(mut batches) => {
                if batches.is_empty() {
                    return None;
                }
                batches.swap_remove(0)
            }
            Self::Flat(scores) => scores,
        };
        scores
            .into_iter()
            .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ZeroShotResponse {
    Ranked(ZeroShotOutput),
    Pairs(Vec<LabelScore>),
}

impl From<ZeroShotResponse> for ZeroShotOutput {
    fn from(response: ZeroShotResponse) -> Self {
        match response {
            ZeroShotResponse::Ranked(output) => output,
            ZeroShotResponse::Pairs(mut pairs) => {
                pairs.sort_by(|a, b| {
                    b.score
                        .partial_cmp(&a.score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                ZeroShotOutput {
                    labels: pairs.iter().map(|p| p.label.clone()).collect(),
                    scores: pairs.iter().map(|p| p.score).collect(),
                }
            }
        }
    }
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<ZeroShotParameters<'a>>,
}

#[derive(Serialize)]
struct ZeroShotParameters<'a> {
    candidate_labels: &'a [String],
}

/// One hosted model endpoint.
#[derive(Debug, Clone)]
pub struct HttpInferenceClient {
    client: reqwest::Client,
    url: String,
}

impl HttpInferenceClient {
    pub fn new(url: &str, api_token: Option<&str>) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = api_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}"))
                    .context("Invalid inference API token format")?,
            );
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<T: DeserializeOwned>(
        &self,
        request: &InferenceRequest<'_>,
    ) -> Result<T, TriageError> {
        debug!(url = %self.url, "inference request");
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| TriageError::unavailable(&self.url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TriageError::unavailable(
                &self.url,
                format!("HTTP {status}: {body}"),
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| TriageError::unavailable(&self.url, format!("unexpected response: {e}")))
    }
}

#[async_trait]
impl TextScorer for HttpInferenceClient {
    async fn score(&self, text: &str) -> Result<SentimentSignal, TriageError> {
        let response: SentimentResponse = self
            .post(&InferenceRequest {
                inputs: text,
                parameters: None,
            })
            .await?;

        let best = response
            .best()
            .ok_or_else(|| TriageError::unavailable(&self.url, "empty sentiment response"))?;
        let polarity = Polarity::from_label(&best.label).ok_or_else(|| {
            TriageError::unavailable(&self.url, format!("unknown label {}", best.label))
        })?;

        Ok(SentimentSignal {
            polarity,
            confidence: best.score,
        })
    }

    fn name(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ZeroShotClassifier for HttpInferenceClient {
    async fn classify(
        &self,
        text: &str,
        candidate_labels: &[String],
    ) -> Result<ZeroShotOutput, TriageError> {
        let response: ZeroShotResponse = self
            .post(&InferenceRequest {
                inputs: text,
                parameters: Some(ZeroShotParameters { candidate_labels }),
            })
            .await?;
        Ok(response.into())
    }

    fn name(&self) -> &str {
        &self.url
    }
}

const POSITIVE_CUES: &[&str] = &[
    "thank",
    "excellent",
    "amazing",
    "great",
    "love",
    "helpful",
    "awesome",
    "appreciate",
    "friendly",
];

const NEGATIVE_CUES: &[&str] = &[
    "declined",
    "error",
    "can't",
    "cannot",
    "suspicious",
    "fraud",
    "worst",
    "terrible",
    "awful",
    "embarrassing",
    "cancel",
    "never",
    "unacceptable",
    "disappointed",
    "broken",
    "problem",
];

/// Counts cue phrases; more positive than negative cues means POSITIVE.
/// Each cue of margin adds 0.15 confidence on top of 0.6, capped at 0.99.
#[derive(Debug, Clone, Default)]
pub struct LexiconScorer;

impl LexiconScorer {
    pub fn score_text(text: &str) -> SentimentSignal {
        let text_lower = text.to_lowercase();
        let count = |cues: &[&str]| cues.iter().filter(|c| text_lower.contains(*c)).count();
        let positive = count(POSITIVE_CUES);
        let negative = count(NEGATIVE_CUES);

        let (polarity, margin) = if positive > negative {
            (Polarity::Positive, positive - negative)
        } else if negative > positive {
            (Polarity::Negative, negative - positive)
        } else {
            (Polarity::Positive, 0)
        };

        SentimentSignal {
            polarity,
            confidence: (0.6 + 0.15 * margin as f64).min(0.99),
        }
    }
}

#[async_trait]
impl TextScorer for LexiconScorer {
    async fn score(&self, text: &str) -> Result<SentimentSignal, TriageError> {
        Ok(Self::score_text(text))
    }

    fn name(&self) -> &str {
        "lexicon"
    }
}
