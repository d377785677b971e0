//! Queue snapshots for the progress broadcaster.
//!
//! The SSE endpoint samples dispatcher and repository state on a fixed
//! interval; [`SnapshotDiffGuard`] suppresses pushes when nothing changed so
//! quiet ticks cost subscribers nothing but the transport heartbeat.

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use crate::domains::checks::store::ActiveCheckCounts;
use crate::kernel::dispatch::PoolStatus;

/// Whether the pool is doing anything right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Idle,
    Busy,
}

/// Whether the pool can admit new work without queueing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capacity {
    Available,
    Full,
}

/// Point-in-time view of the check queue, as pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueSnapshot {
    pub pending: usize,
    pub in_flight: usize,
    pub max_concurrent: usize,
    pub available_slots: usize,
    pub accepting: bool,
    pub activity: Activity,
    pub capacity: Capacity,
    pub checks_pending: i64,
    pub checks_processing: i64,
}

impl QueueSnapshot {
    /// Build a snapshot from pool counters and per-organization check counts.
    pub fn build(pool: PoolStatus, counts: ActiveCheckCounts) -> Self {
        let activity = if pool.in_flight == 0 {
            Activity::Idle
        } else {
            Activity::Busy
        };
        let capacity = if pool.accepting() {
            Capacity::Available
        } else {
            Capacity::Full
        };

        Self {
            pending: pool.pending,
            in_flight: pool.in_flight,
            max_concurrent: pool.max_concurrent,
            available_slots: pool.available_slots(),
            accepting: pool.accepting(),
            activity,
            capacity,
            checks_pending: counts.pending,
            checks_processing: counts.processing,
        }
    }
}

/// Wrap a payload in the push-message envelope.
///
/// Every pushed message carries `type` and `timestamp` alongside the
/// payload's own fields.
pub fn envelope(kind: &str, payload: Value) -> Value {
    let mut message = json!({
        "type": kind,
        "timestamp": Utc::now().to_rfc3339(),
    });
    if let (Some(target), Some(fields)) = (message.as_object_mut(), payload.as_object()) {
        for (key, value) in fields {
            target.insert(key.clone(), value.clone());
        }
    }
    message
}

/// Bandwidth guard: emits a snapshot only when it differs from the last one
/// sent on this connection.
pub struct SnapshotDiffGuard {
    last: Option<String>,
}

impl SnapshotDiffGuard {
    pub fn new() -> Self {
        Self { last: None }
    }

    /// Returns the snapshot as a JSON payload if it changed since the last
    /// call, `None` for a no-op tick.
    pub fn changed(&mut self, snapshot: &QueueSnapshot) -> Option<Value> {
        let serialized = serde_json::to_string(snapshot).ok()?;
        if self.last.as_deref() == Some(serialized.as_str()) {
            return None;
        }
        self.last = Some(serialized);
        serde_json::to_value(snapshot).ok()
    }
}

impl Default for SnapshotDiffGuard {
    fn default() -> Self {
        Self::new()
    }
}
