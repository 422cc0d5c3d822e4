pub mod parser;
pub mod san;

pub use parser::{parse, parse_pgn, GameResult, MoveList, PgnError, PgnGame};
pub use san::{format_san, parse_san, SanError};
