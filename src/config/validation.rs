//! Configuration validation
//!
//! Validates autotag configuration for correctness:
//! - Endpoint is an http(s) URL
//! - Exactly one of workspace id / workspace slug is set
//! - A target attribute and at least one category rule are defined
//! - Rule ids are present and unique, emails unique within a rule
//! - Retry settings allow at least one attempt

use super::autotag_config::AutotagConfig;
use crate::AutotagError;
use std::collections::{HashMap, HashSet};

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Rule the error belongs to, if any
    pub rule: Option<String>,
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule: None,
            field: field.into(),
            message: message.into(),
        }
    }

    fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref rule) = self.rule {
            write!(f, "[{}] {}: {}", rule, self.field, self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

/// Validation result
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// Validate an autotag configuration
pub fn validate_config(config: &AutotagConfig) -> ValidationResult {
    let mut errors = Vec::new();

    if !config.endpoint.starts_with("http://") && !config.endpoint.starts_with("https://") {
        errors.push(ValidationError::new(
            "endpoint",
            format!("Invalid GraphQL endpoint URL: {}", config.endpoint),
        ));
    }

    if config.token_env.is_empty() {
        errors.push(ValidationError::new(
            "token_env",
            "Token environment variable name cannot be empty",
        ));
    } else if config.api_token().is_none() {
        tracing::warn!(
            env_var = %config.token_env,
            "API token not set (this may be intentional if set at runtime)"
        );
    }

    match (non_empty(&config.workspace_id), non_empty(&config.workspace_slug)) {
        (None, None) => errors.push(ValidationError::new(
            "workspace_id",
            "One of workspace_id or workspace_slug must be set",
        )),
        (Some(_), Some(_)) => errors.push(ValidationError::new(
            "workspace_slug",
            "Set either workspace_id or workspace_slug, not both",
        )),
        _ => {}
    }

    if config.attribute_definition_id.trim().is_empty() {
        errors.push(ValidationError::new(
            "attribute_definition_id",
            "Attribute definition id cannot be empty",
        ));
    }

    if config.doctype_name.trim().is_empty() {
        errors.push(ValidationError::new(
            "doctype_name",
            "Doctype name cannot be empty",
        ));
    }

    if config.retry.max_attempts == 0 {
        errors.push(ValidationError::new(
            "retry.max_attempts",
            "At least one attempt is required",
        ));
    }

    if config.rules.is_empty() {
        errors.push(ValidationError::new(
            "rules",
            "At least one category rule must be defined",
        ));
    }

    errors.append(&mut validate_rules(config));

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Validate the category rules
fn validate_rules(config: &AutotagConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen_ids = HashSet::new();
    // email -> first rule listing it
    let mut owners: HashMap<String, &str> = HashMap::new();

    for (index, rule) in config.rules.iter().enumerate() {
        let name = if rule.label.is_empty() {
            format!("rules[{}]", index)
        } else {
            rule.label.clone()
        };

        if rule.id.trim().is_empty() {
            errors.push(ValidationError::new("id", "Rule id cannot be empty").with_rule(&name));
        } else if !seen_ids.insert(rule.id.as_str()) {
            errors.push(
                ValidationError::new("id", format!("Duplicate rule id: {}", rule.id))
                    .with_rule(&name),
            );
        }

        if rule.match_emails.is_empty() {
            tracing::warn!(rule = %name, "Category rule has no emails and will never match");
        }

        let mut seen_emails = HashSet::new();
        for email in &rule.match_emails {
            let key = if config.case_insensitive_emails {
                email.trim().to_ascii_lowercase()
            } else {
                email.trim().to_string()
            };

            if key.is_empty() {
                errors.push(
                    ValidationError::new("match_emails", "Email cannot be empty").with_rule(&name),
                );
                continue;
            }

            if !seen_emails.insert(key.clone()) {
                errors.push(
                    ValidationError::new("match_emails", format!("Duplicate email: {}", email))
                        .with_rule(&name),
                );
                continue;
            }

            match owners.get(&key) {
                Some(owner) => tracing::warn!(
                    email = %email,
                    winner = %owner,
                    shadowed = %rule.id,
                    "Email listed in several rules; the earliest rule wins"
                ),
                None => {
                    owners.insert(key, rule.id.as_str());
                }
            }
        }
    }

    errors
}

/// Validate configuration and return a Result
pub fn validate_config_result(config: &AutotagConfig) -> crate::Result<()> {
    validate_config(config).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        AutotagError::Config(format!(
            "Configuration validation failed:\n  - {}",
            messages.join("\n  - ")
        ))
    })
}
