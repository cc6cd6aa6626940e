//! Throttled hand-off of immutable snapshots from the feed task to consumers.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant, SystemTime},
};

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info};

/// Default minimum spacing between two publishes.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(30);

/// Immutable copy of the game document taken at a publish instant.
#[derive(Debug)]
pub struct PublishedSnapshot {
    /// Deep copy of the merged document.
    pub document: Value,
    /// Wall-clock time of the publish.
    pub published_at: SystemTime,
    /// Publish counter, strictly increasing across the publisher's lifetime.
    pub sequence: u64,
    /// Messages merged by the producing client when the copy was taken.
    pub messages_merged: u64,
}

/// What consumers see when they ask for data.
#[derive(Debug, Clone)]
pub enum SnapshotView {
    /// Nothing has been published yet; absence of data is an expected state.
    NotReady,
    /// Latest published snapshot.
    Ready(Arc<PublishedSnapshot>),
}

impl SnapshotView {
    /// The snapshot, when one is available.
    pub fn ready(&self) -> Option<&Arc<PublishedSnapshot>> {
        match self {
            SnapshotView::Ready(snapshot) => Some(snapshot),
            SnapshotView::NotReady => None,
        }
    }

    /// True for the not-ready sentinel.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, SnapshotView::NotReady)
    }
}

/// Publish bookkeeping, touched only by producers.
#[derive(Debug)]
struct Throttle {
    last_instant: Option<Instant>,
    last_wall: Option<SystemTime>,
    last_revision: Option<(u64, u64)>,
    sequence: u64,
}

/// Hands out the latest published snapshot and enforces the publish cadence.
///
/// Producers (the feed task) call [`SnapshotPublisher::offer`]; consumers call
/// [`SnapshotPublisher::get_snapshot`], which only clones an `Arc` out of a
/// single-slot watch channel and never waits on the network.
#[derive(Debug)]
pub struct SnapshotPublisher {
    slot: watch::Sender<Option<Arc<PublishedSnapshot>>>,
    throttle: Mutex<Throttle>,
    min_interval: Duration,
    generations: AtomicU64,
}

impl SnapshotPublisher {
    /// Create a publisher in the not-ready state.
    pub fn new(min_interval: Duration) -> Self {
        let (slot, _rx) = watch::channel(None);
        Self {
            slot,
            throttle: Mutex::new(Throttle {
                last_instant: None,
                last_wall: None,
                last_revision: None,
                sequence: 0,
            }),
            min_interval,
            generations: AtomicU64::new(0),
        }
    }

    /// Allocate the generation number of a new producer (one per connection).
    pub fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Configured minimum spacing between publishes.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Latest published snapshot, or [`SnapshotView::NotReady`].
    pub fn get_snapshot(&self) -> SnapshotView {
        match self.slot.borrow().as_ref() {
            Some(snapshot) => SnapshotView::Ready(Arc::clone(snapshot)),
            None => SnapshotView::NotReady,
        }
    }

    /// Receiver woken on every publish.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<PublishedSnapshot>>> {
        self.slot.subscribe()
    }

    /// Offer the producer's working document for publication.
    ///
    /// `generation` identifies the producing client and `revision` its
    /// change counter; an offer whose `(generation, revision)` was already
    /// published is ignored without copying. Otherwise the document is
    /// deep-copied when nothing was published yet or `min_interval` elapsed
    /// since the previous publish. Revision 0 means nothing was merged yet
    /// and is never published.
    pub fn offer(
        &self,
        document: &Value,
        generation: u64,
        revision: u64,
        messages_merged: u64,
        now: Instant,
    ) -> Option<Arc<PublishedSnapshot>> {
        if revision == 0 {
            return None;
        }

        let mut throttle = self.throttle.lock().unwrap_or_else(|e| e.into_inner());
        if throttle.last_revision == Some((generation, revision)) {
            return None;
        }
        if let Some(last) = throttle.last_instant {
            if now.saturating_duration_since(last) < self.min_interval {
                return None;
            }
        }

        // Never let the wall clock run backwards across publishes.
        let wall = SystemTime::now();
        let published_at = match throttle.last_wall {
            Some(previous) if previous > wall => previous,
            _ => wall,
        };

        throttle.sequence += 1;
        let snapshot = Arc::new(PublishedSnapshot {
            document: document.clone(),
            published_at,
            sequence: throttle.sequence,
            messages_merged,
        });
        throttle.last_instant = Some(now);
        throttle.last_wall = Some(published_at);
        throttle.last_revision = Some((generation, revision));

        if snapshot.sequence == 1 {
            info!(messages_merged, "published first game snapshot");
        } else {
            debug!(sequence = snapshot.sequence, messages_merged, "published game snapshot");
        }
        self.slot.send_replace(Some(Arc::clone(&snapshot)));
        Some(snapshot)
    }

    /// Earliest instant at which the next publish may happen; `None` before
    /// the first publish.
    pub fn next_due(&self) -> Option<Instant> {
        let throttle = self.throttle.lock().unwrap_or_else(|e| e.into_inner());
        throttle
            .last_instant
            .map(|last| last.checked_add(self.min_interval).unwrap_or(last))
    }

    /// True when an offer made at `now` would pass the interval check.
    pub fn is_due(&self, now: Instant) -> bool {
        let throttle = self.throttle.lock().unwrap_or_else(|e| e.into_inner());
        throttle
            .last_instant
            .is_none_or(|last| now.saturating_duration_since(last) >= self.min_interval)
    }
}

impl Default for SnapshotPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use serde_json::json;

    use super::*;
    use crate::feed::{merger::SnapshotMerger, message::UpdateMessage};

    #[test]
    fn starts_not_ready() {
        let publisher = SnapshotPublisher::default();
        assert!(publisher.get_snapshot().is_not_ready());
    }

    #[test]
    fn first_offer_publishes_immediately() {
        let publisher = SnapshotPublisher::new(Duration::from_secs(30));
        let published = publisher.offer(&json!({"a": 1}), 1, 1, 1, Instant::now());
        assert!(published.is_some());

        let view = publisher.get_snapshot();
        let snapshot = view.ready().unwrap();
        assert_eq!(snapshot.document, json!({"a": 1}));
        assert_eq!(snapshot.sequence, 1);
    }

    #[test]
    fn flood_of_updates_respects_min_interval() {
        let publisher = SnapshotPublisher::new(Duration::from_secs(10));
        let start = Instant::now();
        let mut published = Vec::new();

        // 1000 updates per second for 25 simulated seconds.
        for ms in 0..25_000u64 {
            let now = start + Duration::from_millis(ms);
            if let Some(snapshot) = publisher.offer(&json!({"tick": ms}), 1, ms + 1, ms, now) {
                published.push((now, snapshot));
            }
        }

        assert_eq!(published.len(), 3);
        for pair in published.windows(2) {
            let (earlier_at, earlier) = &pair[0];
            let (later_at, later) = &pair[1];
            assert!(*later_at - *earlier_at >= Duration::from_secs(10));
            assert!(later.sequence > earlier.sequence);
            assert!(later.published_at >= earlier.published_at);
        }
    }

    #[test]
    fn next_due_follows_the_last_publish() {
        let publisher = SnapshotPublisher::new(Duration::from_secs(5));
        assert_eq!(publisher.next_due(), None);

        let start = Instant::now();
        publisher.offer(&json!({"a": 1}), 1, 1, 1, start);
        let due = publisher.next_due().unwrap();
        assert_eq!(due, start + Duration::from_secs(5));

        let early = due - Duration::from_millis(1);
        assert!(publisher.offer(&json!({"a": 2}), 1, 2, 2, early).is_none());
        assert!(publisher.offer(&json!({"a": 2}), 1, 2, 2, due).is_some());
    }

    #[test]
    fn unchanged_revision_is_not_republished() {
        let publisher = SnapshotPublisher::new(Duration::ZERO);
        let start = Instant::now();
        assert!(publisher.offer(&json!({}), 1, 3, 3, start).is_some());
        assert!(
            publisher
                .offer(&json!({}), 1, 3, 4, start + Duration::from_secs(60))
                .is_none()
        );
        // A new client generation with the same revision number is new data.
        assert!(
            publisher
                .offer(&json!({}), 2, 3, 1, start + Duration::from_secs(61))
                .is_some()
        );
    }

    #[test]
    fn consumers_never_see_partial_or_older_snapshots() {
        let publisher = Arc::new(SnapshotPublisher::new(Duration::ZERO));
        let writer_publisher = Arc::clone(&publisher);

        let writer = thread::spawn(move || {
            let mut merger = SnapshotMerger::default();
            for i in 0..2_000u64 {
                let text = format!(r#"{{"state": {{"jam.{}.score": {i}, "count": {i}}}}}"#, i % 50);
                merger.apply(UpdateMessage::from_json_str(&text).unwrap());
                writer_publisher.offer(
                    merger.document(),
                    1,
                    merger.revision(),
                    merger.messages_merged(),
                    Instant::now(),
                );
            }
        });

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let publisher = Arc::clone(&publisher);
                thread::spawn(move || {
                    let mut last_sequence = 0;
                    for _ in 0..5_000 {
                        if let SnapshotView::Ready(snapshot) = publisher.get_snapshot() {
                            assert!(snapshot.sequence >= last_sequence);
                            last_sequence = snapshot.sequence;
                            // Every published copy is a complete document: the
                            // count always matches the jam it was written with.
                            let count = snapshot.document["count"].as_u64().unwrap();
                            let jam = (count % 50).to_string();
                            assert_eq!(
                                snapshot.document["jam"][jam.as_str()]["score"],
                                json!(count)
                            );
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(
            publisher.get_snapshot().ready().unwrap().document["count"],
            json!(1999)
        );
    }
}
