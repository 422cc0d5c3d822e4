use chess_common::{char_to_file, char_to_rank, file_to_char, format_square, rank_to_char};
use cozy_chess::{Board, File, Move, Piece, Rank, Square};

/// Parse Standard Algebraic Notation (SAN) move
///
/// The returned move is in cozy-chess form, so castling is encoded as the
/// king capturing its own rook.
pub fn parse_san(board: &Board, san: &str) -> Result<Move, SanError> {
    let text = san.trim_end_matches(['+', '#', '!', '?']);
    if text.is_empty() {
        return Err(SanError::InvalidFormat(san.to_string()));
    }

    if let Some(long) = castle_side(text) {
        return find_castle(board, long).ok_or_else(|| SanError::NoLegalMove(san.to_string()));
    }

    let mut chars: Vec<char> = text.chars().collect();

    let piece = match chars[0] {
        'K' => Piece::King,
        'Q' => Piece::Queen,
        'R' => Piece::Rook,
        'B' => Piece::Bishop,
        'N' => Piece::Knight,
        _ => Piece::Pawn,
    };
    if piece != Piece::Pawn {
        chars.remove(0);
    }

    // Promotion: "e8=Q" or "e8Q"
    let mut promotion = None;
    if let Some(&last) = chars.last() {
        if last.is_ascii_uppercase() {
            if piece != Piece::Pawn {
                return Err(SanError::InvalidPromotion(san.to_string()));
            }
            promotion = Some(match last {
                'Q' => Piece::Queen,
                'R' => Piece::Rook,
                'B' => Piece::Bishop,
                'N' => Piece::Knight,
                _ => return Err(SanError::InvalidPromotion(san.to_string())),
            });
            chars.pop();
            if chars.last() == Some(&'=') {
                chars.pop();
            }
        }
    }

    if chars.len() < 2 {
        return Err(SanError::InvalidFormat(san.to_string()));
    }
    let rank_char = chars[chars.len() - 1];
    let file_char = chars[chars.len() - 2];
    let to = match (char_to_file(file_char), char_to_rank(rank_char)) {
        (Some(file), Some(rank)) => Square::new(file, rank),
        _ => return Err(SanError::InvalidSquare(san.to_string())),
    };

    let mut from_file: Option<File> = None;
    let mut from_rank: Option<Rank> = None;
    for &c in &chars[..chars.len() - 2] {
        if c == 'x' {
            continue;
        }
        if let Some(file) = char_to_file(c) {
            from_file = Some(file);
        } else if let Some(rank) = char_to_rank(c) {
            from_rank = Some(rank);
        } else {
            return Err(SanError::InvalidFormat(san.to_string()));
        }
    }

    // A pawn without a capture stays on its file
    if piece == Piece::Pawn && from_file.is_none() {
        from_file = Some(to.file());
    }

    let mut candidates = Vec::new();
    board.generate_moves(|moves| {
        for mv in moves {
            if moves.piece != piece || mv.to != to || is_castle(board, mv) {
                continue;
            }
            if from_file.is_some_and(|f| mv.from.file() != f)
                || from_rank.is_some_and(|r| mv.from.rank() != r)
            {
                continue;
            }
            let wanted = match (promotion, mv.promotion) {
                // Unspecified promotion resolves to a queen
                (None, Some(p)) => p == Piece::Queen,
                (want, got) => want == got,
            };
            if wanted {
                candidates.push(mv);
            }
        }
        false
    });

    match candidates.as_slice() {
        [mv] => Ok(*mv),
        [] => Err(SanError::NoLegalMove(san.to_string())),
        _ => Err(SanError::AmbiguousMove(san.to_string())),
    }
}

/// Format a legal move as SAN
pub fn format_san(board: &Board, mv: Move) -> String {
    let Some(piece) = board.piece_on(mv.from) else {
        return format!("{}{}", format_square(mv.from), format_square(mv.to));
    };

    let mut san = String::new();
    if is_castle(board, mv) {
        san.push_str(if (mv.to.file() as usize) > (mv.from.file() as usize) {
            "O-O"
        } else {
            "O-O-O"
        });
    } else {
        let capture = board.colors(!board.side_to_move()).has(mv.to)
            || (piece == Piece::Pawn && mv.from.file() != mv.to.file());

        if piece == Piece::Pawn {
            if capture {
                san.push(file_to_char(mv.from.file()));
            }
        } else {
            san.push(piece_letter(piece));
            san.push_str(&disambiguation(board, mv, piece));
        }
        if capture {
            san.push('x');
        }
        san.push_str(&format_square(mv.to));
        if let Some(promo) = mv.promotion {
            san.push('=');
            san.push(piece_letter(promo));
        }
    }

    let mut after = board.clone();
    if after.try_play(mv).is_ok() && !after.checkers().is_empty() {
        let mut has_reply = false;
        after.generate_moves(|_| {
            has_reply = true;
            true
        });
        san.push(if has_reply { '+' } else { '#' });
    }

    san
}

fn castle_side(text: &str) -> Option<bool> {
    match text {
        "O-O" | "0-0" => Some(false),
        "O-O-O" | "0-0-0" => Some(true),
        _ => None,
    }
}

fn find_castle(board: &Board, long: bool) -> Option<Move> {
    let mut found = None;
    board.generate_moves(|moves| {
        if moves.piece != Piece::King {
            return false;
        }
        for mv in moves {
            let queenside = (mv.to.file() as usize) < (mv.from.file() as usize);
            if is_castle(board, mv) && queenside == long {
                found = Some(mv);
                return true;
            }
        }
        false
    });
    found
}

/// cozy-chess encodes castling as the king moving onto its own rook.
pub(crate) fn is_castle(board: &Board, mv: Move) -> bool {
    board.piece_on(mv.from) == Some(Piece::King)
        && board.colors(board.side_to_move()).has(mv.to)
}

fn disambiguation(board: &Board, mv: Move, piece: Piece) -> String {
    let mut rivals = Vec::new();
    board.generate_moves(|moves| {
        if moves.piece == piece {
            rivals.extend(moves.into_iter().filter(|m| m.to == mv.to && m.from != mv.from));
        }
        false
    });
    if rivals.is_empty() {
        return String::new();
    }
    let same_file = rivals.iter().any(|m| m.from.file() == mv.from.file());
    let same_rank = rivals.iter().any(|m| m.from.rank() == mv.from.rank());
    match (same_file, same_rank) {
        (false, _) => file_to_char(mv.from.file()).to_string(),
        (true, false) => rank_to_char(mv.from.rank()).to_string(),
        (true, true) => format_square(mv.from),
    }
}

fn piece_letter(piece: Piece) -> char {
    match piece {
        Piece::Pawn => 'P',
        Piece::Knight => 'N',
        Piece::Bishop => 'B',
        Piece::Rook => 'R',
        Piece::Queen => 'Q',
        Piece::King => 'K',
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SanError {
    #[error("No legal move found for: {0}")]
    NoLegalMove(String),
    #[error("Ambiguous move: {0}")]
    AmbiguousMove(String),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    #[error("Invalid square: {0}")]
    InvalidSquare(String),
    #[error("Invalid promotion: {0}")]
    InvalidPromotion(String),
}
