use cozy_chess::{Board, Color, Move, Piece, Rank, Square};
use std::collections::HashMap;
use std::sync::Arc;

use crate::pgn::{format_san, parse_pgn, parse_san, PgnError};
use crate::types::{PieceColor, PieceKind};
use crate::uci::{convert_uci_castling_to_cozy, to_long_algebraic};

/// Main game state wrapper around cozy-chess Board
///
/// The board and its history are only ever replaced together, and only after
/// a move or a whole game has been validated.
#[derive(Clone)]
pub struct Game {
    position: Board,
    history: Vec<HistoryEntry>,
    tags: HashMap<String, String>,
    state: GameState,
    observers: Vec<Arc<dyn PositionObserver>>,
}

/// A move that has been applied, with what is needed to display and replay it
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub mv: Move,
    pub from: Square,
    pub to: Square,
    pub piece: Piece,             // Piece that made the move
    pub piece_color: Color,       // Color of the piece that moved
    pub captured: Option<Piece>,  // Captured piece (en passant included)
    pub promotion: Option<Piece>, // Promotion piece if any
    pub san: String,              // Standard Algebraic Notation
    pub fen: String,              // FEN after this move
    pub hash: u64,                // Position hash after this move
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    /// No move applied yet
    Initial,
    InProgress,
    Checkmate { winner: PieceColor },
    Stalemate,
    DrawByRule(DrawReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawReason {
    FiftyMoveRule,
    ThreefoldRepetition,
    InsufficientMaterial,
}

impl GameState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Checkmate { .. } | Self::Stalemate | Self::DrawByRule(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    GameLoaded,
    MoveApplied,
    MoveUndone,
}

/// What observers see after the position has been replaced.
#[derive(Debug)]
pub struct PositionChange<'a> {
    pub kind: ChangeKind,
    pub fen: &'a str,
    pub history: &'a [HistoryEntry],
    pub state: GameState,
}

/// Receives a notification after every successful position change.
pub trait PositionObserver: Send + Sync {
    fn on_position_changed(&self, change: &PositionChange<'_>);
}

impl Game {
    /// Create a new game from the standard starting position
    pub fn new() -> Self {
        Self {
            position: Board::default(),
            history: Vec::new(),
            tags: HashMap::new(),
            state: GameState::Initial,
            observers: Vec::new(),
        }
    }

    /// Register an observer for position changes
    pub fn subscribe(&mut self, observer: Arc<dyn PositionObserver>) {
        self.observers.push(observer);
    }

    /// Get the current board position
    pub fn position(&self) -> &Board {
        &self.position
    }

    /// Get the move history
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Tag pairs of the loaded game
    pub fn tags(&self) -> &HashMap<String, String> {
        &self.tags
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    /// Get the side to move
    pub fn side_to_move(&self) -> PieceColor {
        self.position.side_to_move().into()
    }

    /// Get all legal moves for the current position
    pub fn legal_moves(&self) -> Vec<Move> {
        legal_moves(&self.position)
    }

    /// Canonical FEN of the current position
    pub fn serialize(&self) -> String {
        crate::fen::format_fen(&self.position)
    }

    /// History as long algebraic moves, castling written as the king's two-square move
    pub fn uci_moves(&self) -> Vec<String> {
        self.history
            .iter()
            .map(|entry| to_long_algebraic(entry.mv, entry.piece))
            .collect()
    }

    /// Replace the current game with one replayed from recorded notation.
    ///
    /// Every move is validated on a scratch board first; on any error the
    /// previously loaded game is left exactly as it was.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn load_from_notation(&mut self, text: &str) -> Result<(), GameError> {
        let pgn = parse_pgn(text)?;

        let mut board = Board::default();
        let mut history = Vec::with_capacity(pgn.moves.len());
        let mut state = GameState::Initial;

        for (index, san) in pgn.moves.iter().enumerate() {
            let illegal = || GameError::IllegalNotationMove {
                index,
                san: san.to_string(),
            };
            if state.is_terminal() {
                return Err(illegal());
            }
            let mv = parse_san(&board, san).map_err(|e| {
                tracing::debug!("Rejecting half-move {} ({}): {}", index, san, e);
                illegal()
            })?;
            let entry = play_validated(&mut board, mv).ok_or_else(illegal)?;
            history.push(entry);
            state = evaluate_state(&board, &history);
        }

        tracing::info!(
            "Loaded game with {} half-moves ({:?})",
            history.len(),
            state
        );
        self.position = board;
        self.history = history;
        self.tags = pgn.tags;
        self.state = state;
        self.notify(ChangeKind::GameLoaded);
        Ok(())
    }

    /// Apply a move given by its squares, as a board display reports it.
    ///
    /// Castling may be given as the king's two-square move or as king onto
    /// rook. A pawn reaching the last rank promotes to a queen unless told
    /// otherwise. Returns the new canonical FEN.
    pub fn apply_move(
        &mut self,
        from: Square,
        to: Square,
        promotion: Option<PieceKind>,
    ) -> Result<String, GameError> {
        if self.state.is_terminal() {
            return Err(GameError::GameOver(self.state));
        }

        let legal = self.legal_moves();
        let mut promotion = promotion.map(Piece::from);
        if promotion.is_none() && self.is_promotion_square(from, to) {
            promotion = Some(Piece::Queen);
        }
        let mv = convert_uci_castling_to_cozy(
            Move {
                from,
                to,
                promotion,
            },
            &legal,
        );
        if !legal.contains(&mv) {
            return Err(GameError::IllegalMove { from, to });
        }

        let entry = self.make_move(mv)?;
        Ok(entry.fen)
    }

    /// Make a move on the board
    pub fn make_move(&mut self, mv: Move) -> Result<HistoryEntry, GameError> {
        if self.state.is_terminal() {
            return Err(GameError::GameOver(self.state));
        }

        let mut new_position = self.position.clone();
        let entry = play_validated(&mut new_position, mv).ok_or(GameError::IllegalMove {
            from: mv.from,
            to: mv.to,
        })?;

        self.position = new_position;
        self.history.push(entry.clone());
        self.state = evaluate_state(&self.position, &self.history);
        tracing::debug!("Applied {} -> {}", entry.san, entry.fen);
        self.notify(ChangeKind::MoveApplied);

        Ok(entry)
    }

    /// Undo the last move
    pub fn undo(&mut self) -> Result<(), GameError> {
        if self.history.is_empty() {
            return Err(GameError::NothingToUndo);
        }

        let mut history = self.history.clone();
        history.pop();
        let mut board = Board::default();
        for entry in &history {
            board
                .try_play(entry.mv)
                .map_err(|_| GameError::IllegalMove {
                    from: entry.from,
                    to: entry.to,
                })?;
        }

        self.position = board;
        self.state = evaluate_state(&self.position, &history);
        self.history = history;
        self.notify(ChangeKind::MoveUndone);

        Ok(())
    }

    fn is_promotion_square(&self, from: Square, to: Square) -> bool {
        self.position.piece_on(from) == Some(Piece::Pawn)
            && matches!(to.rank(), Rank::First | Rank::Eighth)
    }

    fn notify(&self, kind: ChangeKind) {
        if self.observers.is_empty() {
            return;
        }
        let fen = self.serialize();
        let change = PositionChange {
            kind,
            fen: &fen,
            history: &self.history,
            state: self.state,
        };
        for observer in &self.observers {
            observer.on_position_changed(&change);
        }
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("fen", &self.serialize())
            .field("moves", &self.history.len())
            .field("state", &self.state)
            .field("observers", &self.observers.len())
            .finish()
    }
}

fn legal_moves(board: &Board) -> Vec<Move> {
    let mut moves = Vec::new();
    board.generate_moves(|mvs| {
        moves.extend(mvs);
        false
    });
    moves
}

/// Play `mv` on `board` if legal, returning its history entry. The board is
/// untouched when the move is illegal.
fn play_validated(board: &mut Board, mv: Move) -> Option<HistoryEntry> {
    if !board.is_legal(mv) {
        return None;
    }
    let piece = board.piece_on(mv.from)?;
    let piece_color = board.color_on(mv.from)?;
    let san = format_san(board, mv);
    let captured = if crate::pgn::san::is_castle(board, mv) {
        None
    } else if piece == Piece::Pawn
        && mv.from.file() != mv.to.file()
        && board.piece_on(mv.to).is_none()
    {
        // en passant
        Some(Piece::Pawn)
    } else {
        board.piece_on(mv.to)
    };

    board.try_play(mv).ok()?;

    Some(HistoryEntry {
        mv,
        from: mv.from,
        to: mv.to,
        piece,
        piece_color,
        captured,
        promotion: mv.promotion,
        san,
        fen: crate::fen::format_fen(board),
        hash: board.hash(),
    })
}

fn evaluate_state(board: &Board, history: &[HistoryEntry]) -> GameState {
    let mut has_moves = false;
    board.generate_moves(|_| {
        has_moves = true;
        true
    });

    if !has_moves {
        return if board.checkers().is_empty() {
            GameState::Stalemate
        } else {
            GameState::Checkmate {
                winner: (!board.side_to_move()).into(),
            }
        };
    }
    if board.halfmove_clock() >= 100 {
        return GameState::DrawByRule(DrawReason::FiftyMoveRule);
    }
    if repetitions(board, history) >= 3 {
        return GameState::DrawByRule(DrawReason::ThreefoldRepetition);
    }
    if is_insufficient_material(board) {
        return GameState::DrawByRule(DrawReason::InsufficientMaterial);
    }
    if history.is_empty() {
        GameState::Initial
    } else {
        GameState::InProgress
    }
}

/// Occurrences of the current position, counting the starting position.
fn repetitions(board: &Board, history: &[HistoryEntry]) -> usize {
    let current = board.hash();
    let start = usize::from(Board::default().hash() == current);
    start + history.iter().filter(|entry| entry.hash == current).count()
}

/// K v K, K + minor v K, and bishops-only endings with every bishop on one
/// square colour.
pub fn is_insufficient_material(board: &Board) -> bool {
    let heavy = board.pieces(Piece::Pawn) | board.pieces(Piece::Rook) | board.pieces(Piece::Queen);
    if !heavy.is_empty() {
        return false;
    }

    let knights = board.pieces(Piece::Knight);
    let bishops = board.pieces(Piece::Bishop);
    if knights.len() + bishops.len() <= 1 {
        return true;
    }
    if !knights.is_empty() {
        return false;
    }

    let mut shades = bishops
        .into_iter()
        .map(|sq| (sq.file() as usize + sq.rank() as usize) % 2);
    let first = shades.next();
    shades.all(|shade| Some(shade) == first)
}

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("Illegal move at half-move {index}: {san}")]
    IllegalNotationMove { index: usize, san: String },
    #[error("Illegal move: {from}{to}")]
    IllegalMove { from: Square, to: Square },
    #[error("Game is over: {0:?}")]
    GameOver(GameState),
    #[error("Nothing to undo")]
    NothingToUndo,
    #[error("PGN parse error: {0}")]
    Pgn(#[from] PgnError),
}
