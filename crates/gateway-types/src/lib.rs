//! Core data model for the job execution gateway.
//!
//! This crate has no I/O of its own: it defines the value types that flow
//! between the trigger surfaces (gRPC, HTTP push, bus pull), the resolution
//! pipeline, and the completion reporter, plus the single error enum used
//! across the workspace.
//!
//! # Modules
//!
//! - [`job`] — `JobDefinition` and its three execution-type variants.
//! - [`refs`] — `GitRefs`, `Pull`, and their validation rules.
//! - [`request`] — `JobExecutionRequest`, `ExecutionType`, `PodSpecOptions`.
//! - [`resource`] — `JobResource`, its status state machine.
//! - [`client`] — `AllowedClient`, `JobFilter`, tenancy defaults.
//! - [`cache_key`] — `CacheKey`, the stable string key for the in-repo config cache.
//! - [`report`] — `ReportMessage`, the JSON payload published by the reporter.
//! - [`bus`] — the wire envelope shared by the push and pull trigger paths.
//! - [`error`] — `GatewayError`, the error taxonomy shared by every component.

pub mod bus;
pub mod cache_key;
pub mod client;
pub mod error;
pub mod job;
pub mod refs;
pub mod report;
pub mod request;
pub mod resource;

pub use bus::{BusEnvelope, BusMessage};
pub use cache_key::CacheKey;
pub use client::{AllowedClient, IssueContext, JobFilter};
pub use error::GatewayError;
pub use job::{JobDefinition, PeriodicDefinition, PostsubmitDefinition, PresubmitDefinition};
pub use refs::{GitRefs, Pull};
pub use report::ReportMessage;
pub use request::{ExecutionType, JobExecutionRequest, PodSpecOptions};
pub use resource::{JobResource, JobSpec, JobState};
