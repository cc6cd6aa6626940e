use std::{path::Path, sync::Arc, time::Instant};

use tokio::task::JoinHandle;
use tracing::info;

use crate::{
    dto::status::{FeedStatusResponse, PublishInfo},
    error::ServiceError,
    feed::{PublishedSnapshot, ScoreboardClient, SnapshotView, supervisor},
    io::{LoadError, read_snapshot_file},
    state::SharedState,
};

/// Start the scoreboard feed in the background.
///
/// With `reconnect` the supervisor keeps rebuilding the client until shutdown;
/// otherwise a single client runs until its connection ends.
pub fn spawn_live_feed(state: &SharedState, reconnect: bool) -> JoinHandle<()> {
    let endpoint = state.config().endpoint();
    let publisher = Arc::clone(state.publisher());
    let status = state.connection_sender();
    let shutdown = state.shutdown().clone();
    info!(url = %endpoint.url(), reconnect, "starting scoreboard feed");

    if reconnect {
        tokio::spawn(supervisor::run(endpoint, publisher, status, shutdown))
    } else {
        let client = ScoreboardClient::new(endpoint, publisher)
            .with_state_sender(status)
            .with_shutdown(shutdown);
        tokio::spawn(async move {
            let outcome = client.spawn().await;
            info!(?outcome, "scoreboard feed finished");
        })
    }
}

/// Publish a saved scoreboard export as the server's snapshot.
pub fn publish_file(state: &SharedState, path: &Path) -> Result<(), LoadError> {
    let document = read_snapshot_file(path)?;
    let publisher = state.publisher();
    let generation = publisher.next_generation();
    let published = publisher.offer(&document, generation, 1, 1, Instant::now());
    info!(
        path = %path.display(),
        sequence = published.map(|snapshot| snapshot.sequence),
        "serving saved game"
    );
    Ok(())
}

/// Latest published snapshot, or [`ServiceError::NotReady`].
pub fn latest_snapshot(state: &SharedState) -> Result<Arc<PublishedSnapshot>, ServiceError> {
    match state.snapshot() {
        SnapshotView::Ready(snapshot) => Ok(snapshot),
        SnapshotView::NotReady => Err(ServiceError::NotReady),
    }
}

/// Connection and publish status.
pub fn feed_status(state: &SharedState) -> FeedStatusResponse {
    FeedStatusResponse {
        source: state.source().label(),
        connection: state.connection_state().into(),
        publish_interval_seconds: state.publisher().min_interval().as_secs(),
        last_publish: state
            .snapshot()
            .ready()
            .map(|snapshot| PublishInfo::from(snapshot.as_ref())),
    }
}
