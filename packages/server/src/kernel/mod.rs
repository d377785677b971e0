//! Kernel module - server infrastructure shared across domains.

pub mod dispatch;
pub mod inference;
pub mod progress;
pub mod stream_hub;
pub mod traits;

pub use dispatch::{
    Dispatcher, DispatcherConfig, InvalidPayload, JobError, JobHandler, JobSnapshot, JobState,
    PoolStatus,
};
pub use inference::{InferenceCompletionService, InferenceEmbeddingService};
pub use progress::{envelope, QueueSnapshot, SnapshotDiffGuard};
pub use stream_hub::{check_topic, StreamHub};
pub use traits::{BaseCompletionService, BaseEmbeddingService};
