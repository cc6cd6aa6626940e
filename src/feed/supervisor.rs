use std::{sync::Arc, time::Duration};

use tokio::{sync::watch, time::sleep};
use tracing::{info, warn};

use super::{
    client::{ConnectionState, Endpoint, ScoreboardClient, ShutdownHandle},
    publisher::SnapshotPublisher,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Keep a scoreboard connection alive, rebuilding the client after each drop.
///
/// Every attempt gets a fresh [`ScoreboardClient`] (and therefore a fresh
/// working document). The delay between attempts doubles up to
/// [`MAX_DELAY`] and resets once a connection reaches
/// [`ConnectionState::Connected`]. Returns when `shutdown` is closed.
pub async fn run(
    endpoint: Endpoint,
    publisher: Arc<SnapshotPublisher>,
    status: Arc<watch::Sender<ConnectionState>>,
    shutdown: ShutdownHandle,
) {
    let mut delay = INITIAL_DELAY;

    while !shutdown.is_closed() {
        let mut client = ScoreboardClient::new(endpoint.clone(), Arc::clone(&publisher))
            .with_state_sender(Arc::clone(&status))
            .with_shutdown(shutdown.clone());

        let outcome = match client.connect().await {
            ConnectionState::Connected => {
                delay = INITIAL_DELAY;
                client.run().await
            }
            other => other,
        };

        if shutdown.is_closed() {
            break;
        }
        match &outcome {
            ConnectionState::Failed(reason) => {
                warn!(%reason, retry_in = ?delay, "scoreboard feed failed; retrying")
            }
            _ => info!(retry_in = ?delay, "scoreboard feed disconnected; reconnecting"),
        }

        tokio::select! {
            _ = shutdown.closed() => break,
            _ = sleep(delay) => {}
        }
        delay = (delay * 2).min(MAX_DELAY);
    }

    info!("scoreboard feed supervisor stopped");
}

#[cfg(test)]
mod tests {
    use tokio::{net::TcpListener, time::timeout};

    use super::*;

    #[tokio::test]
    async fn retries_until_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let publisher = Arc::new(SnapshotPublisher::default());
        let (status, mut status_rx) = watch::channel(ConnectionState::Disconnected);
        let status = Arc::new(status);
        let shutdown = ShutdownHandle::default();

        let task = tokio::spawn(run(
            Endpoint::new("127.0.0.1", port, false),
            Arc::clone(&publisher),
            Arc::clone(&status),
            shutdown.clone(),
        ));

        timeout(
            Duration::from_secs(10),
            status_rx.wait_for(|state| matches!(state, ConnectionState::Failed(_))),
        )
        .await
        .expect("supervisor should report the failed attempt")
        .unwrap();

        shutdown.close();
        timeout(Duration::from_secs(5), task)
            .await
            .expect("supervisor should stop promptly")
            .unwrap();
        assert!(publisher.get_snapshot().is_not_ready());
    }
}
