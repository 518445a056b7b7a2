//! External Integrations
//!
//! Adapter for the Cycle GraphQL API.
//!
//! # Layers
//!
//! - **transport**: one POST per call, no retries
//! - **retry**: fixed-delay, bounded-attempt wrapper around the transport
//! - **cycle**: typed GraphQL operations built on the two layers above

pub mod cycle;
pub mod retry;
pub mod transport;

pub use cycle::{Assignee, CycleClient, Doctype, DocumentDetail, MutationResult, SelectValue};
pub use retry::{with_retry, RetryConfig, RetryError, Sleeper, TokioSleeper};
pub use transport::{GraphQLTransport, HttpTransport, MissingTokenAuth, TransportError};
