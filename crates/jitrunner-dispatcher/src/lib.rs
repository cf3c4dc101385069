//! Dispatch pipeline for jitrunner.
//!
//! Consumes queued webhook events, filters them, and for matching jobs asks
//! the credential broker for a job credential and then starts one ephemeral
//! build with it. The queue's redelivery is the only retry mechanism.

pub mod dedup;
pub mod dispatcher;
pub mod queue;
pub mod worker;

pub use dedup::InFlightGuard;
pub use dispatcher::{DispatchOutcome, DispatchSettings, Dispatcher, SkipReason};
pub use queue::MemoryQueue;
pub use worker::{Worker, WorkerOptions};
