//! Square and piece conversions between cozy-chess types and text.

use cozy_chess::{File, Piece, Rank, Square};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    #[error("Invalid square: {0}")]
    InvalidSquare(String),
    #[error("Invalid piece: {0}")]
    InvalidPiece(char),
    #[error("Invalid move: {0}")]
    InvalidMove(String),
}

pub fn file_to_char(file: File) -> char {
    match file {
        File::A => 'a',
        File::B => 'b',
        File::C => 'c',
        File::D => 'd',
        File::E => 'e',
        File::F => 'f',
        File::G => 'g',
        File::H => 'h',
    }
}

pub fn rank_to_char(rank: Rank) -> char {
    match rank {
        Rank::First => '1',
        Rank::Second => '2',
        Rank::Third => '3',
        Rank::Fourth => '4',
        Rank::Fifth => '5',
        Rank::Sixth => '6',
        Rank::Seventh => '7',
        Rank::Eighth => '8',
    }
}

pub fn char_to_file(c: char) -> Option<File> {
    match c {
        'a' => Some(File::A),
        'b' => Some(File::B),
        'c' => Some(File::C),
        'd' => Some(File::D),
        'e' => Some(File::E),
        'f' => Some(File::F),
        'g' => Some(File::G),
        'h' => Some(File::H),
        _ => None,
    }
}

pub fn char_to_rank(c: char) -> Option<Rank> {
    match c {
        '1' => Some(Rank::First),
        '2' => Some(Rank::Second),
        '3' => Some(Rank::Third),
        '4' => Some(Rank::Fourth),
        '5' => Some(Rank::Fifth),
        '6' => Some(Rank::Sixth),
        '7' => Some(Rank::Seventh),
        '8' => Some(Rank::Eighth),
        _ => None,
    }
}

/// Format a square as "e4".
pub fn format_square(sq: Square) -> String {
    format!("{}{}", file_to_char(sq.file()), rank_to_char(sq.rank()))
}

/// Parse "e4" into a square.
pub fn parse_square(s: &str) -> Result<Square, ConversionError> {
    let mut chars = s.chars();
    let (Some(f), Some(r), None) = (chars.next(), chars.next(), chars.next()) else {
        return Err(ConversionError::InvalidSquare(s.to_string()));
    };
    match (char_to_file(f), char_to_rank(r)) {
        (Some(file), Some(rank)) => Ok(Square::new(file, rank)),
        _ => Err(ConversionError::InvalidSquare(s.to_string())),
    }
}

/// Lower-case piece letter, as used for UCI promotions.
pub fn format_piece(piece: Piece) -> char {
    match piece {
        Piece::Pawn => 'p',
        Piece::Knight => 'n',
        Piece::Bishop => 'b',
        Piece::Rook => 'r',
        Piece::Queen => 'q',
        Piece::King => 'k',
    }
}

/// Parse a piece letter in either case.
pub fn parse_piece(c: char) -> Result<Piece, ConversionError> {
    match c.to_ascii_lowercase() {
        'p' => Ok(Piece::Pawn),
        'n' => Ok(Piece::Knight),
        'b' => Ok(Piece::Bishop),
        'r' => Ok(Piece::Rook),
        'q' => Ok(Piece::Queen),
        'k' => Ok(Piece::King),
        _ => Err(ConversionError::InvalidPiece(c)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_round_trip_corners() {
        for name in ["a1", "h1", "a8", "h8", "e4"] {
            let sq = parse_square(name).unwrap();
            assert_eq!(format_square(sq), name);
        }
    }

    #[test]
    fn test_parse_square_rejects_garbage() {
        assert!(parse_square("i1").is_err());
        assert!(parse_square("a9").is_err());
        assert!(parse_square("e").is_err());
        assert!(parse_square("e44").is_err());
    }

    #[test]
    fn test_parse_piece_case_insensitive() {
        assert_eq!(parse_piece('Q').unwrap(), Piece::Queen);
        assert_eq!(parse_piece('n').unwrap(), Piece::Knight);
        assert_eq!(parse_piece('x'), Err(ConversionError::InvalidPiece('x')));
    }
}
