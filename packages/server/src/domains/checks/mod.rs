//! Compliance checks: models, repository, filtering pipeline, and job worker.

pub mod extract;
pub mod models;
pub mod pipeline;
pub mod store;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use models::{Check, CheckInputType, CheckStatus, NewViolation, Violation};
pub use pipeline::FilterPipeline;
pub use store::{ActiveCheckCounts, CheckStore, PgCheckStore, StatusFields};
pub use worker::{CheckInput, CheckJobHandler, CheckPayload};
