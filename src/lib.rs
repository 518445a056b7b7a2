//! cycle-autotag - tag new Cycle feedback from the reporter's email
//!
//! When a doc is created in Cycle, the webhook handler fetches it, matches the
//! assignee's email against an ordered list of category rules, and writes the
//! first matching rule's option into a select attribute on the doc.
//!
//! # Architecture
//!
//! - **integrations**: GraphQL transport, fixed-delay retry, typed Cycle operations
//! - **processor**: event validation and the fetch → match → mutate pipeline
//! - **config**: YAML configuration and validation
//! - **server**: axum webhook receiver
//! - **metrics**: Prometheus counters
//! - **logging**: tracing subscriber setup

pub mod config;
pub mod error;
pub mod integrations;
pub mod logging;
pub mod metrics;
pub mod processor;
pub mod server;

// Re-exports
pub use error::{AutotagError, Result};
