//! pgnwatch - replay a recorded chess game and watch engine analysis.
//!
//! A game comes from a PGN file (`--pgn`) or from a chess.com player's most
//! recent monthly archive (`--user`). It is validated move by move, then a
//! UCI engine analyses the final position, or every position in turn with
//! `--step`. Results go to stdout; logs go to stderr.

use std::path::PathBuf;

use analysis::{AnalysisCoordinator, AnalysisOptions};
use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod archive;
mod config;
mod runner;

#[derive(Parser)]
#[command(name = "pgnwatch", about = "Replay a chess game with engine analysis")]
struct Cli {
    /// PGN file to load
    #[arg(long, conflicts_with = "user", required_unless_present = "user")]
    pgn: Option<PathBuf>,

    /// chess.com username whose latest games to fetch
    #[arg(long)]
    user: Option<String>,

    /// Which game of the fetched month to analyse [default: 0]
    #[arg(long, requires = "user")]
    game: Option<usize>,

    /// Search depth in plies [env: PGNWATCH_DEPTH]
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    depth: Option<u32>,

    /// UCI engine executable [env: PGNWATCH_ENGINE_PATH]
    #[arg(long)]
    engine: Option<PathBuf>,

    /// Analyse every position of the game, not only the last
    #[arg(long)]
    step: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let Some(pgn) = load_pgn(&cli).await? else {
        return Ok(());
    };

    let options = AnalysisOptions {
        depth: cli.depth.unwrap_or_else(config::get_depth),
        ..Default::default()
    };
    let coordinator = match config::engine_config(cli.engine.clone()) {
        Some(engine) => AnalysisCoordinator::connect(&engine, options),
        None => {
            tracing::warn!("No engine found, set PGNWATCH_ENGINE_PATH or pass --engine");
            AnalysisCoordinator::detached(options)
        }
    };

    let result = runner::watch_game(&coordinator, &pgn, cli.step, print_report).await;
    coordinator.shutdown().await;
    result.context("Failed to replay game")
}

/// The PGN text to analyse, or `None` when the player has no games.
async fn load_pgn(cli: &Cli) -> anyhow::Result<Option<String>> {
    if let Some(path) = &cli.pgn {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return Ok(Some(text));
    }

    let Some(user) = &cli.user else {
        anyhow::bail!("Either --pgn or --user is required");
    };

    let client = archive::ArchiveClient::new()?;
    let games = client
        .latest_games(user)
        .await
        .with_context(|| format!("Failed to fetch games for {}", user))?;
    if games.is_empty() {
        tracing::info!("No games found for {}", user);
        return Ok(None);
    }

    let index = cli.game.unwrap_or(0);
    let count = games.len();
    let record = games
        .into_iter()
        .nth(index)
        .with_context(|| format!("Game {} out of range, {} games available", index, count))?;
    tracing::info!("Analysing {}", record.url);
    Ok(Some(record.pgn))
}

fn print_report(report: &runner::PlyReport) {
    let san = report.san.as_deref().unwrap_or("start");
    match &report.analysis {
        Some(analysis) => println!("{:>3} {:<8} {}", report.ply, san, analysis),
        None => println!("{:>3} {:<8} {:?}", report.ply, san, report.state),
    }
    tracing::debug!("FEN {}", report.fen);
}
