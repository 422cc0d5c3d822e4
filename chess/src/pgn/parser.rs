use std::collections::HashMap;

/// A parsed PGN game
#[derive(Debug, Clone)]
pub struct PgnGame {
    pub tags: HashMap<String, String>,
    pub moves: MoveList,
    pub result: GameResult,
}

/// Ordered SAN tokens, one per half-move.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveList(Vec<String>);

impl MoveList {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a MoveList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameResult {
    WhiteWins,
    BlackWins,
    Draw,
    #[default]
    Ongoing,
}

impl GameResult {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "1-0" => Some(Self::WhiteWins),
            "0-1" => Some(Self::BlackWins),
            "1/2-1/2" => Some(Self::Draw),
            "*" => Some(Self::Ongoing),
            _ => None,
        }
    }
}

/// Parse recorded notation into its move list.
pub fn parse(input: &str) -> Result<MoveList, PgnError> {
    parse_pgn(input).map(|game| game.moves)
}

/// Parse a PGN string into a game
pub fn parse_pgn(input: &str) -> Result<PgnGame, PgnError> {
    let (tags, movetext) = split_headers(input)?;
    if movetext.trim().is_empty() {
        return Err(PgnError::NoMovetext);
    }

    let stripped = strip_annotations(movetext)?;

    let mut moves = Vec::new();
    let mut result = GameResult::Ongoing;
    for raw in stripped.split_whitespace() {
        if let Some(r) = GameResult::from_token(raw) {
            result = r;
            continue;
        }
        if raw.starts_with('$') {
            continue;
        }
        let token = strip_move_number(raw).trim_end_matches(['!', '?']);
        if token.is_empty() || token.chars().all(|c| c == '.') {
            continue;
        }
        moves.push(token.to_string());
    }

    Ok(PgnGame {
        tags,
        moves: MoveList(moves),
        result,
    })
}

/// Split leading tag-pair lines from the movetext that follows them.
fn split_headers(input: &str) -> Result<(HashMap<String, String>, &str), PgnError> {
    let mut tags = HashMap::new();
    let mut rest = input;

    loop {
        let (line, remainder) = match rest.split_once('\n') {
            Some((line, remainder)) => (line, remainder),
            None => (rest, ""),
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if remainder.is_empty() {
                return Ok((tags, ""));
            }
            rest = remainder;
            continue;
        }
        if !trimmed.starts_with('[') {
            return Ok((tags, rest));
        }
        let (name, value) = parse_tag(trimmed)?;
        tags.insert(name, value);
        rest = remainder;
        if rest.is_empty() {
            return Ok((tags, ""));
        }
    }
}

fn parse_tag(line: &str) -> Result<(String, String), PgnError> {
    let inner = line
        .strip_prefix('[')
        .and_then(|l| l.strip_suffix(']'))
        .ok_or_else(|| PgnError::InvalidTag(line.to_string()))?;
    let (name, value) = inner
        .trim()
        .split_once(char::is_whitespace)
        .ok_or_else(|| PgnError::InvalidTag(line.to_string()))?;
    let value = value.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    Ok((name.to_string(), value.to_string()))
}

/// Replace every `{...}`, `[...]` and `(...)` span and every `;` comment with a
/// single space. Braces and brackets do not nest; variations do, and may
/// contain comments of their own.
fn strip_annotations(movetext: &str) -> Result<String, PgnError> {
    let mut out = String::with_capacity(movetext.len());
    // (opener, byte offset) of every open span
    let mut open: Vec<(char, usize)> = Vec::new();
    let mut line_comment = false;

    for (pos, c) in movetext.char_indices() {
        if line_comment {
            if c == '\n' {
                line_comment = false;
                out.push(' ');
            }
            continue;
        }

        match open.last() {
            Some(&('{', _)) => {
                if c == '}' {
                    open.pop();
                }
            }
            Some(&('[', _)) => {
                if c == ']' {
                    open.pop();
                }
            }
            Some(_) => match c {
                '(' | '{' | '[' => open.push((c, pos)),
                ')' => {
                    open.pop();
                }
                '}' | ']' => return Err(PgnError::UnbalancedAnnotation { delimiter: c, position: pos }),
                _ => {}
            },
            None => match c {
                '(' | '{' | '[' => {
                    open.push((c, pos));
                    out.push(' ');
                }
                ')' | '}' | ']' => {
                    return Err(PgnError::UnbalancedAnnotation { delimiter: c, position: pos })
                }
                ';' => line_comment = true,
                _ => out.push(c),
            },
        }
    }

    if let Some(&(delimiter, position)) = open.first() {
        return Err(PgnError::UnbalancedAnnotation { delimiter, position });
    }

    Ok(out)
}

/// Drop a leading "12." or "12..." marker. Tokens such as "0-0" are untouched.
fn strip_move_number(token: &str) -> &str {
    let digits = token.len() - token.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return token;
    }
    let after = &token[digits..];
    if after.starts_with('.') {
        after.trim_start_matches('.')
    } else {
        token
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PgnError {
    #[error("No movetext found")]
    NoMovetext,
    #[error("Invalid tag: {0}")]
    InvalidTag(String),
    #[error("Unbalanced annotation delimiter '{delimiter}' at byte {position}")]
    UnbalancedAnnotation { delimiter: char, position: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const CHESS_COM_GAME: &str = r#"[Event "Live Chess"]
[Site "Chess.com"]
[White "alice"]
[Black "bob"]
[Result "1-0"]

1. e4 {[%clk 0:04:59.7]} 1... e5 {[%clk 0:04:58.1]} 2. Nf3 {[%clk 0:04:57.3]} 2... Nc6 {[%clk 0:04:55]} 3. Bb5 {[%clk 0:04:50.2]} 1-0
"#;

    fn tokens(list: &MoveList) -> Vec<&str> {
        list.iter().collect()
    }

    #[test]
    fn test_parse_chess_com_game() {
        let game = parse_pgn(CHESS_COM_GAME).unwrap();
        assert_eq!(tokens(&game.moves), vec!["e4", "e5", "Nf3", "Nc6", "Bb5"]);
        assert_eq!(game.result, GameResult::WhiteWins);
        assert_eq!(game.tags.get("White").map(String::as_str), Some("alice"));
        assert_eq!(game.tags.get("Site").map(String::as_str), Some("Chess.com"));
    }

    #[test]
    fn test_headerless_movetext() {
        let moves = parse("1. e4 e5 2. Nf3 Nc6").unwrap();
        assert_eq!(tokens(&moves), vec!["e4", "e5", "Nf3", "Nc6"]);
    }

    #[test]
    fn test_multi_digit_and_glued_move_numbers() {
        let moves = parse("9.Nf3 Nc6 10.O-O 10...O-O-O 11. 0-0").unwrap();
        assert_eq!(tokens(&moves), vec!["Nf3", "Nc6", "O-O", "O-O-O", "0-0"]);
    }

    #[test]
    fn test_variations_comments_and_nags_removed() {
        let moves =
            parse("1. e4 $1 (1. d4 d5 (1... Nf6 {indian}) 2. c4) e5!? ; main line\n2. Nf3 *")
                .unwrap();
        assert_eq!(tokens(&moves), vec!["e4", "e5", "Nf3"]);
    }

    #[test]
    fn test_header_only_is_error() {
        let err = parse("[Event \"x\"]\n[Site \"y\"]\n\n").unwrap_err();
        assert_eq!(err, PgnError::NoMovetext);
        assert_eq!(parse("").unwrap_err(), PgnError::NoMovetext);
    }

    #[test]
    fn test_unbalanced_annotation_is_error() {
        assert!(matches!(
            parse("1. e4 {unclosed e5"),
            Err(PgnError::UnbalancedAnnotation { delimiter: '{', .. })
        ));
        assert!(matches!(
            parse("1. e4 e5) 2. Nf3"),
            Err(PgnError::UnbalancedAnnotation { delimiter: ')', .. })
        ));
        assert!(matches!(
            parse("1. e4 (1. d4 {x} 2. Nf3"),
            Err(PgnError::UnbalancedAnnotation { delimiter: '(', .. })
        ));
    }

    #[test]
    fn test_result_only_movetext_is_empty_list() {
        let game = parse_pgn("[Result \"*\"]\n\n*").unwrap();
        assert!(game.moves.is_empty());
    }

    #[test]
    fn test_invalid_tag() {
        assert!(matches!(
            parse("[Event \"x\"\n\n1. e4"),
            Err(PgnError::InvalidTag(_))
        ));
    }

    #[test]
    fn test_clock_annotation_equivalence() {
        let with = parse("1. e4 {[%clk 0:04:59.7]} e5").unwrap();
        let without = parse("1. e4  e5").unwrap();
        assert_eq!(with, without);
    }

    proptest! {
        #[test]
        fn prop_comment_contents_never_leak(comment in "[^{}]{0,40}") {
            let text = format!("1. e4 {{{}}} 1... e5 2. Nf3", comment);
            let moves = parse(&text).unwrap();
            prop_assert_eq!(tokens(&moves), vec!["e4", "e5", "Nf3"]);
        }

        #[test]
        fn prop_clock_annotations_are_transparent(
            h in 0u32..3, m in 0u32..60, s in 0u32..60, tenths in 0u32..10
        ) {
            let clk = format!("{{[%clk {}:{:02}:{:02}.{}]}}", h, m, s, tenths);
            let annotated = format!("1. d4 {clk} 1... d5 {clk} 2. c4 {clk}");
            let plain = "1. d4 1... d5 2. c4";
            prop_assert_eq!(parse(&annotated).unwrap(), parse(plain).unwrap());
        }
    }
}
