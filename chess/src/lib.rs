pub mod fen;
pub mod game;
pub mod pgn;
pub mod types;
pub mod uci;

pub use fen::{format_fen, STARTING_FEN};
pub use game::{
    ChangeKind, DrawReason, Game, GameError, GameState, HistoryEntry, PositionChange,
    PositionObserver,
};
pub use pgn::{parse, parse_pgn, MoveList, PgnError, PgnGame};
pub use types::{PieceColor, PieceKind};
pub use uci::{convert_cozy_castling_to_uci, convert_uci_castling_to_cozy, to_long_algebraic};
