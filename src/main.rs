//! jamstats binary entrypoint: live dashboard server and offline export tools.

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use jamstats::{
    build_router,
    cli::{Cli, Command, ServeArgs},
    config::AppConfig,
    export,
    game::{self, DerbyGame, stats},
    io::read_snapshot_file,
    services::feed_service,
    state::{AppState, FeedSource},
};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Export { input, output } => export_jams(&input, &output),
        Command::Summary { input, anonymize } => summary(&input, anonymize),
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = AppConfig::load();
    args.apply(&mut config);
    let addr = config.bind;

    let source = match &args.file {
        Some(path) => FeedSource::File(path.clone()),
        None => FeedSource::Live,
    };
    let app_state = AppState::new(config, source);

    let feed = match &args.file {
        Some(path) => {
            feed_service::publish_file(&app_state, path)
                .with_context(|| format!("loading {}", path.display()))?;
            None
        }
        None => Some(feed_service::spawn_live_feed(&app_state, !args.no_reconnect)),
    };

    let app = build_router(app_state.clone());

    info!(%addr, "starting server");
    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    let shutdown = app_state.shutdown().clone();
    axum::serve(listener, service)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.close();
        })
        .await
        .context("serving axum")?;

    if let Some(feed) = feed {
        app_state.shutdown().close();
        if let Err(err) = feed.await {
            warn!(error = %err, "scoreboard feed task ended abnormally");
        }
    }
    Ok(())
}

fn load_game(input: &Path) -> anyhow::Result<DerbyGame> {
    let document = read_snapshot_file(input)?;
    let mut game = game::build_from_snapshot(&document)
        .with_context(|| format!("building game from {}", input.display()))?;
    game.metadata
        .insert("source".to_string(), input.display().to_string());
    Ok(game)
}

fn export_jams(input: &Path, output: &Path) -> anyhow::Result<()> {
    let game = load_game(input)?;
    export::write_jams_file(&game, output)
        .with_context(|| format!("writing {}", output.display()))?;
    info!(jams = game.jams.len(), output = %output.display(), "wrote jam table");
    Ok(())
}

fn summary(input: &Path, anonymize: bool) -> anyhow::Result<()> {
    let mut game = load_game(input)?;
    if anonymize {
        stats::anonymize(&mut game, &mut rand::rng());
    }

    let [team_1, team_2] = &game.teams;
    let summary = stats::game_summary(&game);
    println!("{} vs. {}", team_1.name, team_2.name);
    println!(
        "periods: {}  jams: {}  minutes: {:.1}  score: {}-{}",
        summary.periods,
        summary.jams,
        summary.minutes,
        summary.final_score[0],
        summary.final_score[1]
    );

    println!();
    println!("team\tcalloffs\tinjuries\tpoints\tleads\tlost\tno_initial\tstar_passes\ttrips");
    for row in stats::teams_summary(&game) {
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            row.team,
            row.calloffs,
            row.injuries,
            row.jam_points,
            row.leads,
            row.lost,
            row.no_initials,
            row.star_passes,
            row.scoring_trips
        );
    }

    for team in &game.teams {
        println!();
        println!("{} jammers", team.name);
        println!("number\tname\tjams\tpoints\tleads\tlost\t%lead\tnet/jam");
        for line in stats::jammer_summary(&game, team.number) {
            println!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.1}",
                line.number,
                line.name,
                line.jams,
                line.points,
                line.lead_count,
                line.lost_count,
                line.percent_lead,
                line.mean_net_points
            );
        }

        println!();
        println!("{} penalties", team.name);
        for row in stats::skater_penalty_counts(&game, team.number) {
            println!("{}\t{}\t{}", row.number, row.name, row.count);
        }
    }
    Ok(())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "cannot install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
