use std::{path::PathBuf, sync::Arc};

use tokio::sync::{RwLock, watch};

use crate::{
    config::AppConfig,
    feed::{ConnectionState, ShutdownHandle, SnapshotPublisher, SnapshotView},
    game::{BuildError, DerbyGame},
};

pub type SharedState = Arc<AppState>;

/// Where the dashboard data comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    /// A scoreboard server's live feed.
    Live,
    /// A saved scoreboard export, published once at startup.
    File(PathBuf),
}

impl FeedSource {
    /// Value written to the `source` export header.
    pub fn label(&self) -> String {
        match self {
            FeedSource::Live => "live".to_string(),
            FeedSource::File(path) => path.display().to_string(),
        }
    }
}

/// Game built from one published snapshot.
#[derive(Debug, Clone)]
pub struct CachedGame {
    /// Publish sequence the game was built from.
    pub sequence: u64,
    /// Build outcome; failures are cached too so a bad snapshot is not rebuilt per request.
    pub game: Result<Arc<DerbyGame>, BuildError>,
}

/// Central application state shared by the feed task and the HTTP handlers.
pub struct AppState {
    config: AppConfig,
    source: FeedSource,
    publisher: Arc<SnapshotPublisher>,
    connection: Arc<watch::Sender<ConnectionState>>,
    shutdown: ShutdownHandle,
    game_cache: RwLock<Option<CachedGame>>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// Nothing is published yet, so consumers start in the not-ready state.
    pub fn new(config: AppConfig, source: FeedSource) -> SharedState {
        let (connection, _rx) = watch::channel(ConnectionState::Disconnected);
        let publisher = Arc::new(SnapshotPublisher::new(config.publish_interval));
        Arc::new(Self {
            config,
            source,
            publisher,
            connection: Arc::new(connection),
            shutdown: ShutdownHandle::default(),
            game_cache: RwLock::new(None),
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Data source of this server.
    pub fn source(&self) -> &FeedSource {
        &self.source
    }

    /// Publisher fed by the scoreboard client.
    pub fn publisher(&self) -> &Arc<SnapshotPublisher> {
        &self.publisher
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SnapshotView {
        self.publisher.get_snapshot()
    }

    /// Current scoreboard connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.borrow().clone()
    }

    /// Channel the feed task reports its connection state into.
    pub fn connection_sender(&self) -> Arc<watch::Sender<ConnectionState>> {
        Arc::clone(&self.connection)
    }

    /// Subscribe to connection state updates.
    pub fn connection_watcher(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    /// Handle closing the scoreboard connection on shutdown.
    pub fn shutdown(&self) -> &ShutdownHandle {
        &self.shutdown
    }

    /// Game built from publish `sequence`, when it was cached.
    pub async fn cached_game(&self, sequence: u64) -> Option<CachedGame> {
        let guard = self.game_cache.read().await;
        guard
            .as_ref()
            .filter(|cached| cached.sequence == sequence)
            .cloned()
    }

    /// Remember the game built from a snapshot, replacing older entries only.
    pub async fn store_game(&self, cached: CachedGame) {
        let mut guard = self.game_cache.write().await;
        if guard
            .as_ref()
            .is_none_or(|current| current.sequence < cached.sequence)
        {
            *guard = Some(cached);
        }
    }
}
