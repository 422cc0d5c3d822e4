use engine::{Generation, Score};

/// The engine's answer for one position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    pub generation: Generation,
    /// Long algebraic, e.g. `e2e4` or `e7e8q`
    pub best_move: String,
    pub ponder: Option<String>,
    /// Last score reported before the best move, from the side to move's view
    pub score: Option<Score>,
    pub depth: Option<u32>,
}

impl std::fmt::Display for AnalysisResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "best {}", self.best_move)?;
        if let Some(ponder) = &self.ponder {
            write!(f, " (ponder {})", ponder)?;
        }
        if let Some(score) = self.score {
            write!(f, " eval {}", score)?;
        }
        if let Some(depth) = self.depth {
            write!(f, " depth {}", depth)?;
        }
        Ok(())
    }
}
