use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::{
    dto::{sse::ServerEvent, status::PublishInfo},
    feed::PublishedSnapshot,
    state::SharedState,
};

/// Name of the event announcing a new snapshot.
pub const SNAPSHOT_EVENT: &str = "snapshot";

/// Subscribe to snapshot publications.
pub fn subscribe_snapshots(
    state: &SharedState,
) -> watch::Receiver<Option<Arc<PublishedSnapshot>>> {
    state.publisher().subscribe()
}

fn snapshot_event(snapshot: &PublishedSnapshot) -> Option<ServerEvent> {
    ServerEvent::json(SNAPSHOT_EVENT.to_string(), &PublishInfo::from(snapshot))
        .inspect_err(|err| warn!(error = %err, "failed to encode snapshot event"))
        .ok()
}

/// Convert a publication watcher into an SSE response.
///
/// The current snapshot, when there is one, is sent right away; afterwards one
/// event per publish. Intermediate publishes missed by a slow client are
/// coalesced into the latest one.
pub fn to_sse_stream(
    mut receiver: watch::Receiver<Option<Arc<PublishedSnapshot>>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        receiver.mark_changed();
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                changed = receiver.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let latest = receiver.borrow_and_update().clone();
                    let Some(payload) = latest.as_deref().and_then(snapshot_event) else {
                        continue;
                    };
                    let mut event = Event::default().data(payload.data);
                    if let Some(name) = payload.event {
                        event = event.event(name);
                    }
                    if tx.send(Ok(event)).await.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("SSE stream disconnected");
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
