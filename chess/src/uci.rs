//! UCI (Universal Chess Interface) move conversions

use chess_common::format_uci_move;
use cozy_chess::{File, Move, Piece, Rank, Square};

/// Convert UCI castling notation to cozy_chess notation
///
/// UCI uses standard notation (king moves 2 squares): e1g1, e1c1, e8g8, e8c8
/// cozy_chess uses king-to-rook notation: e1h1, e1a1, e8h8, e8a8
///
/// The converted move is only returned when it is among `legal_moves`;
/// anything else comes back unchanged.
pub fn convert_uci_castling_to_cozy(mv: Move, legal_moves: &[Move]) -> Move {
    let is_rank_1_or_8 = matches!(mv.from.rank(), Rank::First | Rank::Eighth);
    let is_e_file = matches!(mv.from.file(), File::E);
    let is_g_or_c_file = matches!(mv.to.file(), File::G | File::C);

    let same_rank = mv.from.rank() == mv.to.rank();

    if is_rank_1_or_8 && is_e_file && is_g_or_c_file && same_rank && mv.promotion.is_none() {
        let rook_file = if mv.to.file() == File::G { File::H } else { File::A };
        let converted = Move {
            from: mv.from,
            to: Square::new(rook_file, mv.from.rank()),
            promotion: None,
        };

        if legal_moves.contains(&converted) {
            return converted;
        }
    }

    mv
}

/// Convert a cozy_chess castling move back to UCI's king-two-squares form.
///
/// `piece` is the piece that made the move; only a king landing on the h- or
/// a-file from the e-file is rewritten.
pub fn convert_cozy_castling_to_uci(mv: Move, piece: Piece) -> Move {
    if piece != Piece::King || mv.from.file() != File::E || mv.from.rank() != mv.to.rank() {
        return mv;
    }
    let king_file = match mv.to.file() {
        File::H => File::G,
        File::A => File::C,
        _ => return mv,
    };
    Move {
        from: mv.from,
        to: Square::new(king_file, mv.from.rank()),
        promotion: None,
    }
}

/// Long algebraic text for a move that `piece` made, as an engine expects it.
pub fn to_long_algebraic(mv: Move, piece: Piece) -> String {
    format_uci_move(convert_cozy_castling_to_uci(mv, piece))
}
