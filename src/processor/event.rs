//! Inbound webhook event and processing outcomes

use crate::AutotagError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Event type sent by Cycle when a doc is created
pub const DOC_CREATE_EVENT: &str = "doc.create";

/// Webhook payload for a single event
///
/// See <https://docs.cycle.app/the-graphql-api/webhooks#doc_created>
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    #[serde(rename = "type")]
    pub event_type: String,

    /// Doc id
    pub id: String,

    /// Workspace (product) id
    #[serde(rename = "productId")]
    pub product_id: String,

    #[serde(rename = "doctypeId", default, skip_serializing_if = "Option::is_none")]
    pub doctype_id: Option<String>,
}

impl InboundEvent {
    /// A `doc.create` event
    pub fn doc_created(id: impl Into<String>, product_id: impl Into<String>) -> Self {
        Self {
            event_type: DOC_CREATE_EVENT.to_string(),
            id: id.into(),
            product_id: product_id.into(),
            doctype_id: None,
        }
    }

    pub fn with_doctype_id(mut self, doctype_id: impl Into<String>) -> Self {
        self.doctype_id = Some(doctype_id.into());
        self
    }
}

/// Furthest point an event reached in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Received,
    Validated,
    Fetched,
    Matched,
    Mutated,
    Reported,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessState::Received => "received",
            ProcessState::Validated => "validated",
            ProcessState::Fetched => "fetched",
            ProcessState::Matched => "matched",
            ProcessState::Mutated => "mutated",
            ProcessState::Reported => "reported",
        };
        f.write_str(name)
    }
}

/// Why an event was deliberately left alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotDocCreation,
    WrongWorkspace,
    NotFeedback,
    NoCategoryRule,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::NotDocCreation => "not a doc creation event",
            SkipReason::WrongWorkspace => "wrong workspace",
            SkipReason::NotFeedback => "not a feedback document",
            SkipReason::NoCategoryRule => "no category rule matched",
        };
        f.write_str(reason)
    }
}

/// The attribute write that was performed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeUpdate {
    pub doc_id: String,
    pub rule_id: String,
    pub rule_label: String,
    pub attribute_id: Option<String>,
    pub new_value: Option<String>,
}

/// Successful end of processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Updated(AttributeUpdate),
    Skipped(SkipReason),
}

/// Processing stopped on an error
#[derive(Debug, Error)]
#[error("failed after reaching {state}: {error}")]
pub struct ProcessFailure {
    /// Last state reached before the error
    pub state: ProcessState,
    #[source]
    pub error: AutotagError,
}

impl ProcessFailure {
    pub fn new(state: ProcessState, error: impl Into<AutotagError>) -> Self {
        Self {
            state,
            error: error.into(),
        }
    }
}

/// Final status of a handled event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Updated,
    Skipped,
    Failed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Updated => "updated",
            ReportStatus::Skipped => "skipped",
            ReportStatus::Failed => "failed",
        }
    }
}

/// What the handler boundary returns for one event
#[derive(Debug, Clone, Serialize)]
pub struct EventReport {
    pub event_id: String,
    pub status: ReportStatus,
    pub state: ProcessState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<AttributeUpdate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    pub processed_at: DateTime<Utc>,
}

impl EventReport {
    pub fn from_result(
        event: &InboundEvent,
        result: &Result<ProcessOutcome, ProcessFailure>,
    ) -> Self {
        let mut report = Self {
            event_id: event.id.clone(),
            status: ReportStatus::Skipped,
            state: ProcessState::Received,
            reason: None,
            update: None,
            error: None,
            error_kind: None,
            processed_at: Utc::now(),
        };

        match result {
            Ok(ProcessOutcome::Updated(update)) => {
                report.status = ReportStatus::Updated;
                report.state = ProcessState::Reported;
                report.update = Some(update.clone());
            }
            Ok(ProcessOutcome::Skipped(reason)) => {
                report.reason = Some(reason.to_string());
            }
            Err(failure) => {
                report.status = ReportStatus::Failed;
                report.state = failure.state;
                report.error = Some(failure.error.to_string());
                report.error_kind = Some(failure.error.kind());
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let event: InboundEvent = serde_json::from_value(serde_json::json!({
            "type": "doc.create",
            "id": "D1",
            "productId": "W1",
            "doctypeId": "DT1"
        }))
        .unwrap();

        assert_eq!(event, InboundEvent::doc_created("D1", "W1").with_doctype_id("DT1"));
    }

    #[test]
    fn test_doctype_id_is_optional() {
        let event: InboundEvent = serde_json::from_str(
            r#"{"type":"doc.update","id":"D1","productId":"W1"}"#,
        )
        .unwrap();
        assert_eq!(event.event_type, "doc.update");
        assert_eq!(event.doctype_id, None);
    }

    #[test]
    fn test_skip_reason_messages() {
        assert_eq!(SkipReason::NotDocCreation.to_string(), "not a doc creation event");
        assert_eq!(SkipReason::WrongWorkspace.to_string(), "wrong workspace");
        assert_eq!(SkipReason::NotFeedback.to_string(), "not a feedback document");
        assert_eq!(SkipReason::NoCategoryRule.to_string(), "no category rule matched");
    }

    #[test]
    fn test_failure_report() {
        let event = InboundEvent::doc_created("D1", "W1");
        let result = Err(ProcessFailure::new(
            ProcessState::Validated,
            AutotagError::DocumentUnavailable("D1".to_string()),
        ));

        let report = EventReport::from_result(&event, &result);
        assert_eq!(report.status, ReportStatus::Failed);
        assert_eq!(report.state, ProcessState::Validated);
        assert_eq!(report.error_kind, Some("document_unavailable"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["state"], "validated");
        assert!(json.get("update").is_none());
    }
}
