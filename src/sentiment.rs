//! Sentiment and attrition-risk interpretation.
//!
//! The external model only says positive/negative with a confidence. This
//! module combines that with a scan for attrition phrases ("cancel",
//! "switching", ...) and walks an ordered rule list; the first rule whose
//! condition holds decides the verdict.

use serde::{Deserialize, Serialize};

use crate::models::{AttritionRisk, Polarity, SentimentClass, SentimentVerdict};

pub const MAX_REPORTED_KEYWORDS: usize = 3;

pub fn default_attrition_keywords() -> Vec<String> {
    [
        "cancel",
        "closing account",
        "switching",
        "leaving",
        "done with",
        "terrible",
        "awful",
        "worst",
        "disgusted",
        "disappointed",
        "never again",
        "lost customer",
        "unacceptable",
    ]
    .iter()
    .map(|k| k.to_string())
    .collect()
}

/// Conjunction of optional checks. An empty condition always holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleCondition {
    pub polarity: Option<Polarity>,
    /// Confidence must be strictly greater than this.
    pub confidence_above: Option<f64>,
    pub attrition_hit: Option<bool>,
}

impl RuleCondition {
    fn holds(&self, polarity: Polarity, confidence: f64, attrition_hit: bool) -> bool {
        self.polarity.map_or(true, |p| p == polarity)
            && self.confidence_above.map_or(true, |t| confidence > t)
            && self.attrition_hit.map_or(true, |h| h == attrition_hit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentRule {
    #[serde(default)]
    pub when: RuleCondition,
    pub sentiment: SentimentClass,
    pub risk: AttritionRisk,
}

impl SentimentRule {
    fn new(when: RuleCondition, sentiment: SentimentClass, risk: AttritionRisk) -> Self {
        Self {
            when,
            sentiment,
            risk,
        }
    }
}

/// The stock cascade. Positive needs > 0.8, a confident negative > 0.7.
pub fn default_rules() -> Vec<SentimentRule> {
    use AttritionRisk::*;
    use SentimentClass::*;

    vec![
        SentimentRule::new(
            RuleCondition {
                polarity: Some(Polarity::Positive),
                confidence_above: Some(0.8),
                attrition_hit: None,
            },
            Positive,
            Low,
        ),
        SentimentRule::new(
            RuleCondition {
                polarity: Some(Polarity::Negative),
                confidence_above: Some(0.7),
                attrition_hit: Some(true),
            },
            Negative,
            High,
        ),
        SentimentRule::new(
            RuleCondition {
                polarity: Some(Polarity::Negative),
                confidence_above: Some(0.7),
                attrition_hit: None,
            },
            NeutralAtrisk,
            Medium,
        ),
        SentimentRule::new(
            RuleCondition {
                polarity: Some(Polarity::Negative),
                confidence_above: None,
                attrition_hit: Some(true),
            },
            Negative,
            High,
        ),
        SentimentRule::new(
            RuleCondition {
                attrition_hit: Some(true),
                ..RuleCondition::default()
            },
            NeutralAtrisk,
            Medium,
        ),
        SentimentRule::new(RuleCondition::default(), NeutralAtrisk, Low),
    ]
}

#[derive(Debug, Clone)]
pub struct SentimentInterpreter {
    attrition_keywords: Vec<String>,
    rules: Vec<SentimentRule>,
}

impl SentimentInterpreter {
    pub fn new(attrition_keywords: Vec<String>, rules: Vec<SentimentRule>) -> Self {
        Self {
            attrition_keywords: attrition_keywords.iter().map(|k| k.to_lowercase()).collect(),
            rules,
        }
    }

    /// All attrition phrases present in `text`, in keyword-list order.
    pub fn attrition_hits(&self, text: &str) -> Vec<String> {
        let text_lower = text.to_lowercase();
        self.attrition_keywords
            .iter()
            .filter(|k| text_lower.contains(k.as_str()))
            .cloned()
            .collect()
    }

    pub fn interpret(&self, text: &str, polarity: Polarity, confidence: f64) -> SentimentVerdict {
        let mut hits = self.attrition_hits(text);
        let attrition_hit = !hits.is_empty();

        let (sentiment_class, attrition_risk) = self
            .rules
            .iter()
            .find(|rule| rule.when.holds(polarity, confidence, attrition_hit))
            .map(|rule| (rule.sentiment, rule.risk))
            .unwrap_or((SentimentClass::NeutralAtrisk, AttritionRisk::Low));

        hits.truncate(MAX_REPORTED_KEYWORDS);
        SentimentVerdict {
            sentiment_class,
            attrition_risk,
            matched_keywords: hits,
        }
    }

    /// Verdict used when the sentiment model could not be consulted.
    pub fn fallback(&self, text: &str) -> SentimentVerdict {
        let mut hits = self.attrition_hits(text);
        hits.truncate(MAX_REPORTED_KEYWORDS);
        SentimentVerdict {
            sentiment_class: SentimentClass::NeutralAtrisk,
            attrition_risk: AttritionRisk::Medium,
            matched_keywords: hits,
        }
    }
}

impl Default for SentimentInterpreter {
    fn default() -> Self {
        Self::new(default_attrition_keywords(), default_rules())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn interpreter() -> SentimentInterpreter {
        SentimentInterpreter::default()
    }

    #[test]
    fn confident_praise_is_positive_low() {
        let verdict = interpreter().interpret(
            "Thank you for the excellent customer service",
            Polarity::Positive,
            0.95,
        );
        assert_eq!(verdict.sentiment_class, SentimentClass::Positive);
        assert_eq!(verdict.attrition_risk, AttritionRisk::Low);
        assert!(verdict.matched_keywords.is_empty());
    }

    #[test]
    fn confident_negative_without_attrition_is_at_risk_medium() {
        let verdict = interpreter().interpret(
            "suspicious charge... didn't make... immediately",
            Polarity::Negative,
            0.9,
        );
        assert_eq!(verdict.sentiment_class, SentimentClass::NeutralAtrisk);
        assert_eq!(verdict.attrition_risk, AttritionRisk::Medium);
    }

    #[test]
    fn confident_negative_with_attrition_is_negative_high() {
        let verdict = interpreter().interpret(
            "I'm cancelling my account, this is the worst bank",
            Polarity::Negative,
            0.85,
        );
        assert_eq!(verdict.sentiment_class, SentimentClass::Negative);
        assert_eq!(verdict.attrition_risk, AttritionRisk::High);
        assert_eq!(verdict.matched_keywords, vec!["cancel", "worst"]);
    }

    #[test]
    fn weak_negative_with_attrition_is_still_high() {
        let verdict = interpreter().interpret("switching banks", Polarity::Negative, 0.55);
        assert_eq!(verdict.sentiment_class, SentimentClass::Negative);
        assert_eq!(verdict.attrition_risk, AttritionRisk::High);
    }

    #[test]
    fn weak_positive_with_attrition_is_at_risk_medium() {
        let verdict = interpreter().interpret("thinking about leaving", Polarity::Positive, 0.6);
        assert_eq!(verdict.sentiment_class, SentimentClass::NeutralAtrisk);
        assert_eq!(verdict.attrition_risk, AttritionRisk::Medium);
    }

    #[test]
    fn thresholds_are_strict() {
        let at_positive = interpreter().interpret("ok", Polarity::Positive, 0.8);
        assert_eq!(at_positive.sentiment_class, SentimentClass::NeutralAtrisk);
        assert_eq!(at_positive.attrition_risk, AttritionRisk::Low);

        let at_negative = interpreter().interpret("meh", Polarity::Negative, 0.7);
        assert_eq!(at_negative.attrition_risk, AttritionRisk::Low);
    }

    #[test]
    fn empty_text_falls_through_to_ambiguous_branch() {
        let verdict = interpreter().interpret("", Polarity::Positive, 0.5);
        assert_eq!(verdict.sentiment_class, SentimentClass::NeutralAtrisk);
        assert_eq!(verdict.attrition_risk, AttritionRisk::Low);
    }

    #[test]
    fn reported_keywords_are_capped_in_list_order() {
        let verdict = interpreter().interpret(
            "Unacceptable. Worst service, terrible app, I will cancel and I'm switching",
            Polarity::Negative,
            0.99,
        );
        assert_eq!(verdict.matched_keywords, vec!["cancel", "switching", "terrible"]);
    }

    #[test]
    fn out_of_range_confidence_is_not_rejected() {
        let verdict = interpreter().interpret("great", Polarity::Positive, 1.7);
        assert_eq!(verdict.sentiment_class, SentimentClass::Positive);
        let verdict = interpreter().interpret("bad", Polarity::Negative, -0.2);
        assert_eq!(verdict.attrition_risk, AttritionRisk::Low);
    }

    #[test]
    fn custom_rules_replace_the_cascade() {
        let interpreter = SentimentInterpreter::new(
            vec!["refund".to_string()],
            vec![SentimentRule {
                when: RuleCondition {
                    attrition_hit: Some(true),
                    ..RuleCondition::default()
                },
                sentiment: SentimentClass::Negative,
                risk: AttritionRisk::High,
            }],
        );
        let hit = interpreter.interpret("I want a REFUND", Polarity::Positive, 0.99);
        assert_eq!(hit.attrition_risk, AttritionRisk::High);

        let miss = interpreter.interpret("all good", Polarity::Negative, 0.99);
        assert_eq!(miss.sentiment_class, SentimentClass::NeutralAtrisk);
        assert_eq!(miss.attrition_risk, AttritionRisk::Low);
    }

    #[test]
    fn fallback_is_at_risk_medium_with_keywords() {
        let verdict = interpreter().fallback("never again");
        assert_eq!(verdict.sentiment_class, SentimentClass::NeutralAtrisk);
        assert_eq!(verdict.attrition_risk, AttritionRisk::Medium);
        assert_eq!(verdict.matched_keywords, vec!["never again"]);
    }

    proptest! {
        #[test]
        fn interpretation_is_deterministic(
            text in ".{0,80}",
            negative in any::<bool>(),
            confidence in 0.0f64..=1.0,
        ) {
            let polarity = if negative { Polarity::Negative } else { Polarity::Positive };
            let interpreter = interpreter();
            let first = interpreter.interpret(&text, polarity, confidence);
            let second = interpreter.interpret(&text, polarity, confidence);
            prop_assert_eq!(first.clone(), second);
            prop_assert!(first.matched_keywords.len() <= MAX_REPORTED_KEYWORDS);
        }
    }
}
