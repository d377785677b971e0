//! Bounded-concurrency job dispatching.
//!
//! One [`Dispatcher`] instance is constructed per job kind (checks,
//! dictionary re-embedding) and injected where needed; there is no ambient
//! global queue state.

pub mod dispatcher;
pub mod job;

pub use dispatcher::{Dispatcher, DispatcherConfig, JobHandler, TIMED_OUT_REASON};
pub use job::{InvalidPayload, JobError, JobSnapshot, JobState, PoolStatus};
