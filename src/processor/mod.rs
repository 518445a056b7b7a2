//! Event processing
//!
//! Turns one `doc.create` webhook event into at most one select-attribute
//! write on the Cycle doc.
//!
//! # States
//!
//! `Received → Validated → Fetched → Matched → Mutated → Reported`, with an
//! early exit to *skipped* (expected no-op) or *failed* (error) along the way.
//! Failures carry the last state reached.

mod autotagger;
pub mod event;
pub mod rules;

pub use autotagger::{resolve_workspace, EventProcessor};
pub use event::{
    AttributeUpdate, EventReport, InboundEvent, ProcessFailure, ProcessOutcome, ProcessState,
    ReportStatus, SkipReason, DOC_CREATE_EVENT,
};
pub use rules::{CategoryRule, CategoryRules};
