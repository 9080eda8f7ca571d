use serde::{Deserialize, Serialize};

use crate::models::{AttritionRisk, Priority, CLASSIFICATION_FAILED};

/// Fires when the category is listed OR the risk is listed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityRule {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub risks: Vec<AttritionRisk>,
    pub priority: Priority,
}

impl PriorityRule {
    fn matches(&self, category: &str, risk: AttritionRisk) -> bool {
        self.categories.iter().any(|c| c == category) || self.risks.contains(&risk)
    }
}

/// Fraud (either variant's name) and high attrition first, then card/ATM
/// trouble, medium attrition and messages nobody could classify.
pub fn default_rules() -> Vec<PriorityRule> {
    vec![
        PriorityRule {
            categories: vec!["Fraud".to_string(), "fraud_security".to_string()],
            risks: vec![AttritionRisk::High],
            priority: Priority::High,
        },
        PriorityRule {
            categories: vec![
                "card_declined".to_string(),
                "atm_issue".to_string(),
                CLASSIFICATION_FAILED.to_string(),
            ],
            risks: vec![AttritionRisk::Medium],
            priority: Priority::Medium,
        },
    ]
}

#[derive(Debug, Clone)]
pub struct PriorityResolver {
    rules: Vec<PriorityRule>,
}

impl PriorityResolver {
    pub fn new(rules: Vec<PriorityRule>) -> Self {
        Self { rules }
    }

    pub fn resolve(&self, category: &str, risk: AttritionRisk) -> Priority {
        self.rules
            .iter()
            .find(|rule| rule.matches(category, risk))
            .map(|rule| rule.priority)
            .unwrap_or(Priority::Low)
    }
}

impl Default for PriorityResolver {
    fn default() -> Self {
        Self::new(default_rules())
    }
}
