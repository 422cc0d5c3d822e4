//! Long algebraic (UCI) move text helpers.

use cozy_chess::{Move, Piece};

use crate::converters::{format_piece, format_square, parse_piece, parse_square, ConversionError};

/// Parse UCI move format (e2e4, e7e8q)
pub fn parse_uci_move(s: &str) -> Result<Move, ConversionError> {
    if !s.is_ascii() || !(4..=5).contains(&s.len()) {
        return Err(ConversionError::InvalidMove(s.to_string()));
    }

    let from = parse_square(&s[0..2])?;
    let to = parse_square(&s[2..4])?;

    let promotion = match s[4..].chars().next() {
        None => None,
        Some(c) => match parse_piece(c)? {
            p @ (Piece::Queen | Piece::Rook | Piece::Bishop | Piece::Knight) => Some(p),
            _ => return Err(ConversionError::InvalidMove(s.to_string())),
        },
    };

    Ok(Move {
        from,
        to,
        promotion,
    })
}

/// Format a move in UCI notation (e.g., "e2e4", "e7e8q").
///
/// The move is written as given; castling conversion from cozy-chess's
/// king-takes-rook form happens in the `chess` crate.
pub fn format_uci_move(mv: Move) -> String {
    let mut s = format!("{}{}", format_square(mv.from), format_square(mv.to));
    if let Some(promo) = mv.promotion {
        s.push(format_piece(promo));
    }
    s
}
