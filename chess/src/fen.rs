use cozy_chess::Board;

/// Standard starting position.
pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Format a Board as a FEN string.
///
/// cozy-chess writes standard castling letters (`KQkq`) unless the alternate
/// flag is given, so equal positions always format identically.
pub fn format_fen(board: &Board) -> String {
    board.to_string()
}
