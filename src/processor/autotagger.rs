//! Feedback autotagger
//!
//! Drives one event through validate → fetch → match → mutate:
//!
//! 1. Skip anything that is not a `doc.create` for the configured workspace
//! 2. Fetch the doc with its doctype and assignee
//! 3. Skip docs that are not feedback, or whose assignee matches no rule
//! 4. Write the matched rule's option id to the configured select attribute
//!
//! [`EventProcessor::process`] returns a typed result and does not log the
//! outcome. [`EventProcessor::handle`] is the handler boundary: it logs,
//! records metrics, and never fails.

use super::event::{
    AttributeUpdate, EventReport, InboundEvent, ProcessFailure, ProcessOutcome, ProcessState,
    SkipReason, DOC_CREATE_EVENT,
};
use super::rules::CategoryRules;
use crate::config::AutotagConfig;
use crate::integrations::cycle::CycleClient;
use crate::integrations::transport::GraphQLTransport;
use crate::{AutotagError, Result};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Processes webhook events for one workspace
pub struct EventProcessor<T: GraphQLTransport> {
    config: Arc<AutotagConfig>,
    client: CycleClient<T>,
    workspace_id: String,
    rules: CategoryRules,
}

impl<T: GraphQLTransport> EventProcessor<T> {
    /// Create a processor for an already known workspace id
    pub fn new(
        config: Arc<AutotagConfig>,
        client: CycleClient<T>,
        workspace_id: impl Into<String>,
    ) -> Self {
        let rules = config.category_rules();
        Self {
            config,
            client,
            workspace_id: workspace_id.into(),
            rules,
        }
    }

    /// Create a processor, resolving `workspace_slug` when no id is configured
    pub async fn from_config(config: Arc<AutotagConfig>, client: CycleClient<T>) -> Result<Self> {
        let workspace_id = resolve_workspace(&config, &client).await?;
        info!(
            workspace_id = %workspace_id,
            rules = config.rules.len(),
            "Event processor ready"
        );
        Ok(Self::new(config, client, workspace_id))
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    pub fn client(&self) -> &CycleClient<T> {
        &self.client
    }

    /// Run one event through the pipeline
    pub async fn process(
        &self,
        event: &InboundEvent,
    ) -> std::result::Result<ProcessOutcome, ProcessFailure> {
        debug!(event_id = %event.id, event_type = %event.event_type, "Processing event");

        // Received → Validated
        if event.event_type != DOC_CREATE_EVENT {
            return Ok(ProcessOutcome::Skipped(SkipReason::NotDocCreation));
        }

        if event.product_id != self.workspace_id {
            return Ok(ProcessOutcome::Skipped(SkipReason::WrongWorkspace));
        }

        if let (Some(expected), Some(actual)) =
            (&self.config.feedback_doctype_id, &event.doctype_id)
        {
            if expected != actual {
                return Ok(ProcessOutcome::Skipped(SkipReason::NotFeedback));
            }
        }

        let mut state = ProcessState::Validated;

        // Validated → Fetched
        let doc = self
            .client
            .fetch_document(&event.id)
            .await
            .map_err(|e| ProcessFailure::new(state, e))?
            .ok_or_else(|| {
                ProcessFailure::new(state, AutotagError::DocumentUnavailable(event.id.clone()))
            })?;
        state = ProcessState::Fetched;

        let doctype_name = doc.doctype_name().ok_or_else(|| {
            ProcessFailure::new(state, AutotagError::MissingField("doctype.name".to_string()))
        })?;

        if doctype_name != self.config.doctype_name {
            debug!(event_id = %event.id, doctype = %doctype_name, "Doc is not feedback");
            return Ok(ProcessOutcome::Skipped(SkipReason::NotFeedback));
        }

        // Fetched → Matched
        let Some(assignee) = &doc.assignee else {
            debug!(event_id = %event.id, "Doc has no assignee");
            return Ok(ProcessOutcome::Skipped(SkipReason::NoCategoryRule));
        };

        let email = assignee
            .email
            .as_deref()
            .filter(|email| !email.trim().is_empty())
            .ok_or_else(|| {
                ProcessFailure::new(state, AutotagError::MissingAssignee(event.id.clone()))
            })?;

        let Some(rule) = self.rules.find(email) else {
            debug!(event_id = %event.id, email = %email, "No category rule for assignee email");
            return Ok(ProcessOutcome::Skipped(SkipReason::NoCategoryRule));
        };
        state = ProcessState::Matched;

        // Matched → Mutated
        let result = self
            .client
            .mutate_select_attribute(&event.id, &self.config.attribute_definition_id, &rule.id)
            .await
            .map_err(|e| ProcessFailure::new(state, e))?
            .ok_or_else(|| {
                ProcessFailure::new(
                    state,
                    AutotagError::MissingField("changeDocAttributeValue".to_string()),
                )
            })?;

        // Mutated → Reported
        Ok(ProcessOutcome::Updated(AttributeUpdate {
            doc_id: event.id.clone(),
            rule_id: rule.id.clone(),
            rule_label: rule.label.clone(),
            attribute_id: result.attribute_id,
            new_value: result.new_value.and_then(|v| v.value.or(v.id)),
        }))
    }

    /// Process one event, log the outcome, and never fail
    pub async fn handle(&self, event: &InboundEvent) -> EventReport {
        let result = self.process(event).await;
        let report = EventReport::from_result(event, &result);

        match &result {
            Ok(ProcessOutcome::Updated(update)) => info!(
                event_id = %event.id,
                rule = %update.rule_label,
                attribute_id = update.attribute_id.as_deref().unwrap_or("-"),
                value = update.new_value.as_deref().unwrap_or("-"),
                "Doc property updated"
            ),
            Ok(ProcessOutcome::Skipped(reason)) => info!(
                event_id = %event.id,
                event_type = %event.event_type,
                reason = %reason,
                "Event skipped"
            ),
            Err(failure) => error!(
                event_id = %event.id,
                event_type = %event.event_type,
                product_id = %event.product_id,
                state = %failure.state,
                error_kind = failure.error.kind(),
                error = %failure.error,
                "Event processing failed"
            ),
        }

        crate::metrics::record_event(report.status.as_str());
        report
    }
}

/// Workspace id from config, or looked up by slug
pub async fn resolve_workspace<T: GraphQLTransport>(
    config: &AutotagConfig,
    client: &CycleClient<T>,
) -> Result<String> {
    if let Some(id) = config
        .workspace_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
    {
        return Ok(id.to_string());
    }

    let slug = config
        .workspace_slug
        .as_deref()
        .map(str::trim)
        .filter(|slug| !slug.is_empty())
        .ok_or_else(|| {
            AutotagError::Config("One of workspace_id or workspace_slug must be set".to_string())
        })?;

    client
        .resolve_workspace_id(slug)
        .await?
        .ok_or_else(|| AutotagError::Config(format!("No workspace found for slug: {}", slug)))
}
