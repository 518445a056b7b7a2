//! Customer email → category lookup
//!
//! Rules are evaluated in configured order; the first rule listing the
//! assignee's email wins, so overlapping emails resolve to the earliest rule.

use serde::{Deserialize, Serialize};

/// One select-attribute option and the customer emails that map to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    /// Select option id written to the document
    pub id: String,

    /// Human-readable option name (logging only)
    #[serde(default)]
    pub label: String,

    /// Customer emails classified under this option
    #[serde(default)]
    pub match_emails: Vec<String>,
}

impl CategoryRule {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        emails: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            match_emails: emails.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether this rule lists `email`
    pub fn matches(&self, email: &str, case_insensitive: bool) -> bool {
        let email = email.trim();
        self.match_emails.iter().any(|candidate| {
            let candidate = candidate.trim();
            if case_insensitive {
                candidate.eq_ignore_ascii_case(email)
            } else {
                candidate == email
            }
        })
    }
}

/// Ordered, read-only rule table
#[derive(Debug, Clone, Default)]
pub struct CategoryRules {
    rules: Vec<CategoryRule>,
    case_insensitive: bool,
}

impl CategoryRules {
    pub fn new(rules: Vec<CategoryRule>) -> Self {
        Self {
            rules,
            case_insensitive: false,
        }
    }

    pub fn case_insensitive(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }

    /// First rule, in configured order, that lists `email`
    pub fn find(&self, email: &str) -> Option<&CategoryRule> {
        self.rules
            .iter()
            .find(|rule| rule.matches(email, self.case_insensitive))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CategoryRule> {
        self.rules.iter()
    }
}
