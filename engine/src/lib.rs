pub mod session;
pub mod stockfish;
pub mod uci;

pub use session::{EngineError, EngineSession};
pub use stockfish::{find_stockfish_path, EngineConfig};
pub use uci::{parse_engine_line, UciError, UciMessage};

use cozy_chess::Move;

/// Identifies the round of analysis a command or event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Commands sent to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    NewGame,
    /// Long algebraic moves from the standard starting position
    SetPosition { moves: Vec<String> },
    Go { depth: u32 },
    Stop,
}

impl EngineCommand {
    /// The command as one line of the UCI protocol, without the newline.
    pub fn to_uci_line(&self) -> String {
        match self {
            Self::NewGame => "ucinewgame".to_string(),
            Self::SetPosition { moves } if moves.is_empty() => "position startpos".to_string(),
            Self::SetPosition { moves } => format!("position startpos moves {}", moves.join(" ")),
            Self::Go { depth } => format!("go depth {}", depth),
            Self::Stop => "stop".to_string(),
        }
    }
}

/// Events received from the engine
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// `uciok` or `readyok`
    Ready,
    Info(EngineInfo),
    BestMove { mv: Move, ponder: Option<Move> },
    /// Any line that is not one of the above, verbatim
    Unknown(String),
}

/// An engine event together with the generation of the search that produced it.
#[derive(Debug, Clone)]
pub struct TaggedEvent {
    pub generation: Generation,
    pub event: EngineEvent,
}

/// Engine analysis information
#[derive(Debug, Clone, Default)]
pub struct EngineInfo {
    pub depth: Option<u32>,
    pub seldepth: Option<u32>,
    pub time_ms: Option<u64>,
    pub nodes: Option<u64>,
    pub score: Option<Score>,
    pub pv: Vec<Move>, // Principal variation
    pub multipv: Option<u8>,
    pub nps: Option<u64>,
}

/// Engine evaluation from the side to move's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Centipawns(i32),
    Mate(i32), // Negative for being mated
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Centipawns(cp) => write!(f, "{:+.2}", *cp as f64 / 100.0),
            Self::Mate(m) if *m > 0 => write!(f, "+M{}", m),
            Self::Mate(m) => write!(f, "-M{}", m.abs()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_lines() {
        assert_eq!(EngineCommand::NewGame.to_uci_line(), "ucinewgame");
        assert_eq!(
            EngineCommand::SetPosition {
                moves: vec!["e2e4".into(), "e7e5".into(), "e7e8q".into()]
            }
            .to_uci_line(),
            "position startpos moves e2e4 e7e5 e7e8q"
        );
        assert_eq!(
            EngineCommand::SetPosition { moves: vec![] }.to_uci_line(),
            "position startpos"
        );
        assert_eq!(EngineCommand::Go { depth: 20 }.to_uci_line(), "go depth 20");
        assert_eq!(EngineCommand::Stop.to_uci_line(), "stop");
    }

    #[test]
    fn test_generation_ordering() {
        let g = Generation::default();
        assert!(g.next() > g);
        assert_eq!(g.next().next().value(), 2);
        assert_eq!(g.next().to_string(), "#1");
    }

    #[test]
    fn test_score_display() {
        assert_eq!(Score::Centipawns(35).to_string(), "+0.35");
        assert_eq!(Score::Centipawns(-120).to_string(), "-1.20");
        assert_eq!(Score::Mate(3).to_string(), "+M3");
        assert_eq!(Score::Mate(-2).to_string(), "-M2");
    }
}
