use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    error::ServiceError,
    export::tsv,
    feed::PublishedSnapshot,
    game::{BuildError, DerbyGame, build_from_snapshot, stats},
    services::feed_service,
    state::{CachedGame, SharedState},
};

/// Latest snapshot together with the game built from it.
///
/// Each snapshot is built at most once; the result (success or failure) is
/// cached under the snapshot's publish sequence.
pub async fn current_game(
    state: &SharedState,
) -> Result<(Arc<PublishedSnapshot>, Arc<DerbyGame>), ServiceError> {
    let snapshot = feed_service::latest_snapshot(state)?;
    let cached = match state.cached_game(snapshot.sequence).await {
        Some(cached) => cached,
        None => {
            let cached = CachedGame {
                sequence: snapshot.sequence,
                game: build(state, &snapshot).map(Arc::new),
            };
            state.store_game(cached.clone()).await;
            cached
        }
    };
    let game = cached.game?;
    Ok((snapshot, game))
}

/// Jam table of the current game as TSV text.
pub async fn jams_tsv(state: &SharedState) -> Result<String, ServiceError> {
    let (_, game) = current_game(state).await?;
    Ok(tsv::jams_to_string(&game)?)
}

fn build(state: &SharedState, snapshot: &PublishedSnapshot) -> Result<DerbyGame, BuildError> {
    let mut game = build_from_snapshot(&snapshot.document).inspect_err(|err| {
        warn!(
            sequence = snapshot.sequence,
            error = %err,
            "snapshot does not contain a game yet"
        );
    })?;
    game.metadata.insert("source".to_string(), state.source().label());
    if state.config().anonymize {
        stats::anonymize(&mut game, &mut rand::rng());
    }
    debug!(sequence = snapshot.sequence, jams = game.jams.len(), "built game");
    Ok(game)
}
