//! SSE progress endpoint.
//!
//! GET /api/streams/checks/:organization_id
//!
//! One push channel per subscriber. A per-connection task samples dispatcher
//! and repository state every `SAMPLE_INTERVAL` and emits a `queue_status`
//! event only when the serialized snapshot changed since the last send;
//! check state transitions arrive as `check_progress` events through the
//! StreamHub. Transport keep-alive comments go out every
//! `HEARTBEAT_INTERVAL` independent of state changes. Connections are closed
//! after `MAX_CONNECTION_LIFETIME`; reconnecting clients get a fresh
//! snapshot rather than a replay of missed deltas.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::kernel::progress::{envelope, QueueSnapshot, SnapshotDiffGuard};
use crate::kernel::stream_hub::check_topic;
use crate::server::app::AppState;

/// How often dispatcher/repository state is sampled.
const SAMPLE_INTERVAL: Duration = Duration::from_secs(5);
/// Keep-alive comment cadence, independent of state changes.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// Hard cap on a single connection's lifetime.
const MAX_CONNECTION_LIFETIME: Duration = Duration::from_secs(10 * 60);

/// SSE stream handler.
///
/// The sampler task ends on client disconnect (detected as a failed send),
/// on the lifetime cap, or on hub shutdown; all paths drop the hub
/// subscription and the channel exactly once, so cleanup is idempotent and
/// races with in-flight sends are swallowed rather than raised.
pub async fn stream_checks(
    State(state): State<AppState>,
    Path(organization_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Event>(16);
    let mut hub_rx = state
        .stream_hub
        .subscribe(&check_topic(organization_id))
        .await;
    let dispatcher = state.check_dispatcher.clone();
    let store = state.store.clone();

    tokio::spawn(async move {
        let mut guard = SnapshotDiffGuard::new();
        let mut ticker = tokio::time::interval(SAMPLE_INTERVAL);
        let deadline = tokio::time::sleep(MAX_CONNECTION_LIFETIME);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    debug!(%organization_id, "progress stream reached lifetime cap");
                    break;
                }
                _ = ticker.tick() => {
                    let pool = dispatcher.pool_status();
                    let counts = match store.count_active_checks(organization_id).await {
                        Ok(counts) => counts,
                        Err(error) => {
                            warn!(%organization_id, error = %error, "active check count failed, sampling with zero counts");
                            Default::default()
                        }
                    };
                    let snapshot = QueueSnapshot::build(pool, counts);
                    let Some(payload) = guard.changed(&snapshot) else {
                        // No-op tick: nothing but the transport heartbeat.
                        continue;
                    };
                    let message = envelope("queue_status", payload);
                    let Ok(event) = Event::default().event("queue_status").json_data(&message) else {
                        continue;
                    };
                    // A failed send means the client went away.
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                received = hub_rx.recv() => match received {
                    Ok(message) => {
                        let name = message
                            .get("type")
                            .and_then(|t| t.as_str())
                            .unwrap_or("message")
                            .to_string();
                        let Ok(event) = Event::default().event(name).json_data(&message) else {
                            continue;
                        };
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!(%organization_id, missed, "progress subscriber lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
        // Dropping hub_rx unsubscribes; dropping tx ends the SSE stream.
    });

    Sse::new(ReceiverStream::new(rx).map(Ok::<_, Infallible>))
        .keep_alive(KeepAlive::new().interval(HEARTBEAT_INTERVAL))
}
