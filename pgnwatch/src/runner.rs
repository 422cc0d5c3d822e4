//! Drives a game through the analysis coordinator and collects what the
//! engine said about each position.

use std::sync::Arc;

use analysis::{AnalysisCoordinator, AnalysisResult, EngineLink};
use chess::{Game, GameError, GameState};
use engine::Generation;
use tokio::sync::watch;

/// One analysed position.
#[derive(Debug, Clone)]
pub struct PlyReport {
    /// Half-moves played to reach the position
    pub ply: usize,
    /// The move that led here, if any
    pub san: Option<String>,
    pub fen: String,
    pub state: GameState,
    pub analysis: Option<AnalysisResult>,
}

/// Load `pgn` and wait for the engine's verdict on the final position, or on
/// every position in turn when `step` is set. The whole game is validated
/// before anything is sent to the engine.
pub async fn watch_game<L: EngineLink>(
    coordinator: &AnalysisCoordinator<L>,
    pgn: &str,
    step: bool,
    mut report: impl FnMut(&PlyReport),
) -> Result<(), GameError> {
    let mut rx = coordinator.subscribe();
    let mut game = Game::new();
    game.subscribe(Arc::new(coordinator.clone()));

    if !step {
        game.load_from_notation(pgn)?;
        let analysis = await_result(coordinator, &mut rx, &game).await;
        report(&snapshot(&game, analysis));
        return Ok(());
    }

    let mut replay = Game::new();
    replay.load_from_notation(pgn)?;
    for entry in replay.history() {
        game.make_move(entry.mv)?;
        let analysis = await_result(coordinator, &mut rx, &game).await;
        report(&snapshot(&game, analysis));
    }
    Ok(())
}

async fn await_result<L: EngineLink>(
    coordinator: &AnalysisCoordinator<L>,
    rx: &mut watch::Receiver<Option<AnalysisResult>>,
    game: &Game,
) -> Option<AnalysisResult> {
    // A finished game has no best move to wait for
    if !coordinator.has_engine() || game.state().is_terminal() {
        return None;
    }
    let generation = coordinator.generation();
    wait_for_generation(rx, generation).await
}

async fn wait_for_generation(
    rx: &mut watch::Receiver<Option<AnalysisResult>>,
    generation: Generation,
) -> Option<AnalysisResult> {
    match rx
        .wait_for(|r| r.as_ref().is_some_and(|r| r.generation == generation))
        .await
    {
        Ok(result) => (*result).clone(),
        Err(_) => {
            tracing::warn!("Analysis stopped before {} finished", generation);
            None
        }
    }
}

fn snapshot(game: &Game, analysis: Option<AnalysisResult>) -> PlyReport {
    PlyReport {
        ply: game.history().len(),
        san: game.history().last().map(|entry| entry.san.clone()),
        fen: game.serialize(),
        state: game.state(),
        analysis,
    }
}
