use serde::{Deserialize, Serialize};

pub const GENERAL_DEPARTMENT: &str = "General";

/// A department and the substrings that route a message to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentRule {
    pub name: String,
    pub triggers: Vec<String>,
}

impl DepartmentRule {
    pub fn new(name: &str, triggers: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            triggers: triggers.iter().map(|t| t.to_string()).collect(),
        }
    }
}

pub fn default_departments() -> Vec<DepartmentRule> {
    vec![
        DepartmentRule::new(
            "Cards",
            &["credit card", "debit card", "card declined", "atm", "card ate"],
        ),
        DepartmentRule::new(
            "Accounts",
            &["checking", "savings", "account", "balance", "deposit"],
        ),
        DepartmentRule::new(
            "Loans",
            &["mortgage", "loan", "refinance", "home loan", "auto loan"],
        ),
        DepartmentRule::new(
            "Digital",
            &["app", "online", "mobile", "website", "login", "error"],
        ),
        DepartmentRule::new(
            "Fraud",
            &["suspicious", "fraud", "unauthorized", "didn't make", "scam"],
        ),
    ]
}

/// Routes text to the first department (in declaration order) with a trigger
/// contained in the lowercased text.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    departments: Vec<DepartmentRule>,
    fallback: String,
}

impl KeywordMatcher {
    pub fn new(departments: Vec<DepartmentRule>, fallback: impl Into<String>) -> Self {
        let departments = departments
            .into_iter()
            .map(|rule| DepartmentRule {
                name: rule.name,
                triggers: rule.triggers.iter().map(|t| t.to_lowercase()).collect(),
            })
            .collect();
        Self {
            departments,
            fallback: fallback.into(),
        }
    }

    pub fn classify(&self, text: &str) -> &str {
        let text_lower = text.to_lowercase();
        self.departments
            .iter()
            .find(|rule| rule.triggers.iter().any(|t| text_lower.contains(t.as_str())))
            .map(|rule| rule.name.as_str())
            .unwrap_or(self.fallback.as_str())
    }
}

impl Default for KeywordMatcher {
    fn default() -> Self {
        Self::new(default_departments(), GENERAL_DEPARTMENT)
    }
}
