//! Per-message triage: category, sentiment verdict, priority, ticket.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::TriageConfig;
use crate::error::TriageError;
use crate::keywords::KeywordMatcher;
use crate::models::{
    ClassificationResult, Message, SentimentSignal, SentimentVerdict, Ticket, TicketStatus,
    CLASSIFICATION_FAILED,
};
use crate::priority::PriorityResolver;
use crate::scorer::{TextScorer, ZeroShotClassifier};
use crate::sentiment::SentimentInterpreter;

pub const TICKET_PREFIX: &str = "TKT-";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Source of the ticket creation time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// How the department/category is chosen.
#[derive(Clone)]
pub enum Variant {
    Keyword,
    ZeroShot(Arc<dyn ZeroShotClassifier>),
}

impl Variant {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::ZeroShot(_) => "zero-shot",
        }
    }
}

pub fn ticket_id(message_id: &str) -> String {
    format!("{TICKET_PREFIX}{message_id}")
}

pub fn round_confidence(confidence: f64) -> f64 {
    (confidence * 1000.0).round() / 1000.0
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub struct TriageEngine {
    variant: Variant,
    matcher: KeywordMatcher,
    interpreter: SentimentInterpreter,
    resolver: PriorityResolver,
    candidate_labels: Vec<String>,
    scorer: Arc<dyn TextScorer>,
    clock: Arc<dyn Clock>,
    inference_timeout: Duration,
    max_input_chars: usize,
}

impl TriageEngine {
    pub fn new(
        config: &TriageConfig,
        variant: Variant,
        scorer: Arc<dyn TextScorer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            variant,
            matcher: KeywordMatcher::new(
                config.keywords.departments.clone(),
                config.keywords.fallback_department.clone(),
            ),
            interpreter: SentimentInterpreter::new(
                config.sentiment.attrition_keywords.clone(),
                config.sentiment.rules.clone(),
            ),
            resolver: PriorityResolver::new(config.priority.rules.clone()),
            candidate_labels: config.zero_shot.candidate_labels.clone(),
            scorer,
            clock,
            inference_timeout: config.runner.inference_timeout(),
            max_input_chars: config.models.max_input_chars,
        }
    }

    pub fn variant(&self) -> &Variant {
        &self.variant
    }

    /// Builds the ticket from already computed model outputs. Pure apart from
    /// the clock. The signal goes through the same confidence check as
    /// [`TriageEngine::score`].
    pub fn process(
        &self,
        message: &Message,
        signal: SentimentSignal,
        classification: &ClassificationResult,
    ) -> Ticket {
        let signal = self.check_confidence(message, self.scorer.name(), signal);
        self.build(message, Ok(classification.clone()), signal)
    }

    /// Runs the models for one message. Inference failures still yield a
    /// ticket, marked `classification_failed`.
    pub async fn triage(&self, message: &Message) -> Ticket {
        let classification = self.classify(message).await;
        let signal = self.score(message).await;
        self.build(message, classification, signal)
    }

    fn build(
        &self,
        message: &Message,
        classification: Result<ClassificationResult, TriageError>,
        signal: Result<SentimentSignal, TriageError>,
    ) -> Ticket {
        match (classification, signal) {
            (Ok(classification), Ok(signal)) => {
                debug!(
                    message_id = %message.id,
                    category = %classification.category,
                    category_confidence = classification.confidence,
                    "classified"
                );
                let verdict =
                    self.interpreter
                        .interpret(&message.text, signal.polarity, signal.confidence);
                self.assemble(
                    message,
                    &classification.category,
                    verdict,
                    signal.confidence,
                    TicketStatus::Open,
                )
            }
            (classification, signal) => {
                let category = match classification {
                    Ok(classification) => classification.category,
                    Err(err) => {
                        warn!(message_id = %message.id, error = %err, "category classification failed");
                        CLASSIFICATION_FAILED.to_string()
                    }
                };
                let (verdict, confidence) = match signal {
                    Ok(signal) => (
                        self.interpreter
                            .interpret(&message.text, signal.polarity, signal.confidence),
                        signal.confidence,
                    ),
                    Err(err) => {
                        warn!(message_id = %message.id, error = %err, "sentiment scoring failed");
                        (self.interpreter.fallback(&message.text), 0.0)
                    }
                };
                self.assemble(
                    message,
                    &category,
                    verdict,
                    confidence,
                    TicketStatus::ClassificationFailed,
                )
            }
        }
    }

    pub async fn classify(&self, message: &Message) -> Result<ClassificationResult, TriageError> {
        match &self.variant {
            Variant::Keyword => Ok(ClassificationResult::keyword(
                self.matcher.classify(&message.text),
            )),
            Variant::ZeroShot(classifier) => {
                let text = truncate_chars(&message.text, self.max_input_chars);
                let output = self
                    .bounded(
                        classifier.name(),
                        classifier.classify(text, &self.candidate_labels),
                    )
                    .await?;
                let (label, score) = output.top().ok_or_else(|| {
                    TriageError::unavailable(classifier.name(), "no labels returned")
                })?;
                debug!(message_id = %message.id, label, score, "zero-shot category");
                Ok(ClassificationResult {
                    category: label.to_string(),
                    confidence: score,
                })
            }
        }
    }

    /// Scores sentiment and checks the confidence range.
    pub async fn score(&self, message: &Message) -> Result<SentimentSignal, TriageError> {
        let text = truncate_chars(&message.text, self.max_input_chars);
        let signal = self
            .bounded(self.scorer.name(), self.scorer.score(text))
            .await?;
        self.check_confidence(message, self.scorer.name(), signal)
    }

    /// Non-finite confidences are a model failure; finite ones outside
    /// [0, 1] are clamped.
    fn check_confidence(
        &self,
        message: &Message,
        model: &str,
        mut signal: SentimentSignal,
    ) -> Result<SentimentSignal, TriageError> {
        if !signal.confidence.is_finite() {
            return Err(TriageError::unavailable(
                model,
                format!("non-finite confidence {}", signal.confidence),
            ));
        }
        if !(0.0..=1.0).contains(&signal.confidence) {
            warn!(
                message_id = %message.id,
                confidence = signal.confidence,
                "sentiment confidence out of range, clamping"
            );
            signal.confidence = signal.confidence.clamp(0.0, 1.0);
        }
        Ok(signal)
    }

    async fn bounded<T>(
        &self,
        model: &str,
        call: impl Future<Output = Result<T, TriageError>>,
    ) -> Result<T, TriageError> {
        tokio::time::timeout(self.inference_timeout, call)
            .await
            .map_err(|_| TriageError::Timeout {
                model: model.to_string(),
                after: self.inference_timeout,
            })?
    }

    fn assemble(
        &self,
        message: &Message,
        category: &str,
        verdict: SentimentVerdict,
        confidence: f64,
        status: TicketStatus,
    ) -> Ticket {
        let priority = self.resolver.resolve(category, verdict.attrition_risk);
        Ticket {
            ticket_id: ticket_id(&message.id),
            message_id: message.id.clone(),
            author: message.author.clone(),
            text: message.text.clone(),
            created_timestamp: self.clock.now().format(TIMESTAMP_FORMAT).to_string(),
            department_or_category: category.to_string(),
            sentiment_class: verdict.sentiment_class,
            sentiment_confidence: round_confidence(confidence),
            attrition_risk: verdict.attrition_risk,
            matched_keywords: verdict.matched_keywords,
            priority,
            status,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::TimeZone;

    use super::*;
    use crate::models::Polarity;
    use crate::scorer::ZeroShotOutput;

    pub struct FixedClock(pub DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    pub fn fixed_clock() -> Arc<dyn Clock> {
        let at = Utc
            .with_ymd_and_hms(2024, 1, 15, 10, 30, 0)
            .single()
            .expect("valid timestamp");
        Arc::new(FixedClock(at))
    }

    /// Returns the same signal for every text.
    pub struct StubScorer(pub SentimentSignal);

    #[async_trait]
    impl TextScorer for StubScorer {
        async fn score(&self, _text: &str) -> Result<SentimentSignal, TriageError> {
            Ok(self.0)
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    pub fn stub_scorer(polarity: Polarity, confidence: f64) -> Arc<dyn TextScorer> {
        Arc::new(StubScorer(SentimentSignal {
            polarity,
            confidence,
        }))
    }

    pub struct FailingScorer;

    #[async_trait]
    impl TextScorer for FailingScorer {
        async fn score(&self, _text: &str) -> Result<SentimentSignal, TriageError> {
            Err(TriageError::unavailable("failing", "connection refused"))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    pub struct SlowScorer(pub Duration);

    #[async_trait]
    impl TextScorer for SlowScorer {
        async fn score(&self, _text: &str) -> Result<SentimentSignal, TriageError> {
            tokio::time::sleep(self.0).await;
            Ok(SentimentSignal {
                polarity: Polarity::Positive,
                confidence: 0.99,
            })
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    /// Ranks the candidate named in the constructor first; counts calls.
    pub struct StubZeroShot {
        pub top: String,
        pub calls: AtomicUsize,
    }

    impl StubZeroShot {
        pub fn new(top: &str) -> Self {
            Self {
                top: top.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ZeroShotClassifier for StubZeroShot {
        async fn classify(
            &self,
            _text: &str,
            candidate_labels: &[String],
        ) -> Result<ZeroShotOutput, TriageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut labels = vec![self.top.clone()];
            labels.extend(candidate_labels.iter().filter(|l| **l != self.top).cloned());
            let scores = (0..labels.len()).map(|i| 0.9 / (i as f64 + 1.0)).collect();
            Ok(ZeroShotOutput { labels, scores })
        }

        fn name(&self) -> &str {
            "stub-zero-shot"
        }
    }

    pub struct FailingZeroShot;

    #[async_trait]
    impl ZeroShotClassifier for FailingZeroShot {
        async fn classify(
            &self,
            _text: &str,
            _candidate_labels: &[String],
        ) -> Result<ZeroShotOutput, TriageError> {
            Err(TriageError::unavailable("zero-shot", "HTTP 503"))
        }

        fn name(&self) -> &str {
            "failing-zero-shot"
        }
    }

    pub fn message(id: &str, text: &str) -> Message {
        Message {
            id: id.to_string(),
            author: "@customer".to_string(),
            text: text.to_string(),
            timestamp: Some("2024-01-15 10:30:00".to_string()),
        }
    }
}
