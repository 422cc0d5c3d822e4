//! Routes position changes to the engine and engine answers back out.
//!
//! Every position change bumps the generation and clears the published
//! result while holding the state lock, and the commands for the new search
//! are queued before the lock is released. Engine events carry the generation
//! of the search that produced them; anything not matching the current
//! generation is dropped.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chess::{to_long_algebraic, PositionChange, PositionObserver};
use chess_common::format_uci_move;
use engine::{
    EngineCommand, EngineConfig, EngineError, EngineEvent, EngineSession, Generation, Score,
    TaggedEvent,
};
use tokio::sync::watch;

use crate::result::AnalysisResult;

const DEFAULT_DEPTH: u32 = 20;

/// Where the coordinator sends its commands.
pub trait EngineLink: Send + 'static {
    fn send(&self, generation: Generation, command: EngineCommand) -> Result<(), EngineError>;

    /// Release the engine. No events may be delivered once this resolves.
    fn close(self) -> impl Future<Output = ()> + Send;
}

impl EngineLink for EngineSession {
    fn send(&self, generation: Generation, command: EngineCommand) -> Result<(), EngineError> {
        EngineSession::send(self, generation, command)
    }

    async fn close(mut self) {
        self.stop().await;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

#[derive(Debug, Clone, Copy)]
pub struct AnalysisOptions {
    pub depth: u32,
    /// Send `stop` when a new position supersedes a running search
    pub stop_on_supersede: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            depth: DEFAULT_DEPTH,
            stop_on_supersede: true,
        }
    }
}

struct CoordinatorState<L> {
    generation: Generation,
    score: Option<Score>,
    depth: Option<u32>,
    searching: bool,
    link: Option<L>,
}

struct Inner<L> {
    state: Mutex<CoordinatorState<L>>,
    published: watch::Sender<Option<AnalysisResult>>,
    options: AnalysisOptions,
}

/// Cheap to clone; all clones share one analysis session.
pub struct AnalysisCoordinator<L = EngineSession> {
    inner: Arc<Inner<L>>,
}

impl<L> Clone for AnalysisCoordinator<L> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl AnalysisCoordinator<EngineSession> {
    /// Start an engine and analyse with it. If the engine cannot be started
    /// the coordinator runs without one.
    pub fn connect(config: &EngineConfig, options: AnalysisOptions) -> Self {
        match Self::try_connect(config, options) {
            Ok(coordinator) => coordinator,
            Err(e) => {
                tracing::warn!("Analysis disabled: {}", e);
                Self::detached(options)
            }
        }
    }

    pub fn try_connect(
        config: &EngineConfig,
        options: AnalysisOptions,
    ) -> Result<Self, AnalysisError> {
        let session = EngineSession::start(config)?;
        let inner = Arc::new_cyclic(|weak: &Weak<Inner<EngineSession>>| {
            let weak = weak.clone();
            session.subscribe(move |event| {
                if let Some(inner) = weak.upgrade() {
                    inner.handle_event(event);
                }
            });
            Inner::new(Some(session), options)
        });
        Ok(Self { inner })
    }
}

impl<L: EngineLink> AnalysisCoordinator<L> {
    /// Analyse through `link`. Its events must be fed to [`Self::handle_event`].
    pub fn with_link(link: L, options: AnalysisOptions) -> Self {
        Self {
            inner: Arc::new(Inner::new(Some(link), options)),
        }
    }

    /// A coordinator with no engine. Generations still advance; nothing is
    /// ever published.
    pub fn detached(options: AnalysisOptions) -> Self {
        Self {
            inner: Arc::new(Inner::new(None, options)),
        }
    }

    pub fn has_engine(&self) -> bool {
        lock(&self.inner.state).link.is_some()
    }

    pub fn generation(&self) -> Generation {
        lock(&self.inner.state).generation
    }

    /// The result for the current position, if the engine has answered yet.
    pub fn latest(&self) -> Option<AnalysisResult> {
        self.inner.published.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<AnalysisResult>> {
        self.inner.published.subscribe()
    }

    /// Start a search for the position reached by `moves` from the start.
    pub fn analyse(&self, moves: Vec<String>) -> Generation {
        self.inner.dispatch(moves)
    }

    pub fn handle_event(&self, event: &TaggedEvent) {
        self.inner.handle_event(event);
    }

    /// Stop the engine. Later position changes only advance the generation.
    pub async fn shutdown(&self) {
        let link = lock(&self.inner.state).link.take();
        if let Some(link) = link {
            tracing::info!("Shutting down analysis engine");
            link.close().await;
        }
    }
}

impl<L: EngineLink> PositionObserver for AnalysisCoordinator<L> {
    fn on_position_changed(&self, change: &PositionChange<'_>) {
        let moves = change
            .history
            .iter()
            .map(|entry| to_long_algebraic(entry.mv, entry.piece))
            .collect();
        let generation = self.inner.dispatch(moves);
        tracing::debug!(
            "{:?} at ply {} ({:?}), analysis {}",
            change.kind,
            change.history.len(),
            change.state,
            generation
        );
    }
}

impl<L: EngineLink> Inner<L> {
    fn new(link: Option<L>, options: AnalysisOptions) -> Self {
        let (published, _) = watch::channel(None);
        Self {
            state: Mutex::new(CoordinatorState {
                generation: Generation::default(),
                score: None,
                depth: None,
                searching: false,
                link,
            }),
            published,
            options,
        }
    }

    fn dispatch(&self, moves: Vec<String>) -> Generation {
        let mut guard = lock(&self.state);
        let state = &mut *guard;

        state.generation = state.generation.next();
        let generation = state.generation;
        state.score = None;
        state.depth = None;
        self.published.send_replace(None);

        let Some(link) = state.link.as_ref() else {
            tracing::debug!("No engine, skipping search {}", generation);
            return generation;
        };

        let mut commands = Vec::with_capacity(4);
        if state.searching && self.options.stop_on_supersede {
            commands.push(EngineCommand::Stop);
        }
        commands.push(EngineCommand::NewGame);
        commands.push(EngineCommand::SetPosition { moves });
        commands.push(EngineCommand::Go {
            depth: self.options.depth,
        });

        match commands
            .into_iter()
            .try_for_each(|command| link.send(generation, command))
        {
            Ok(()) => state.searching = true,
            Err(e) => {
                tracing::warn!("Failed to start search {}: {}", generation, e);
                state.searching = false;
            }
        }
        generation
    }

    fn handle_event(&self, tagged: &TaggedEvent) {
        let mut state = lock(&self.state);
        if tagged.generation != state.generation {
            tracing::trace!(
                "Discarding event from {} (current {})",
                tagged.generation,
                state.generation
            );
            return;
        }

        match &tagged.event {
            EngineEvent::Info(info) => {
                // Secondary lines of a multi-PV search do not describe the best move
                if info.score.is_some() && info.multipv.unwrap_or(1) == 1 {
                    state.score = info.score;
                    state.depth = info.depth.or(state.depth);
                }
            }
            EngineEvent::BestMove { mv, ponder } => {
                state.searching = false;
                let result = AnalysisResult {
                    generation: tagged.generation,
                    best_move: format_uci_move(*mv),
                    ponder: ponder.map(format_uci_move),
                    score: state.score,
                    depth: state.depth,
                };
                tracing::info!("Analysis {}: {}", tagged.generation, result);
                self.published.send_replace(Some(result));
            }
            EngineEvent::Unknown(line) if line.starts_with("bestmove") => {
                state.searching = false;
                tracing::debug!("Engine found no move for {}", tagged.generation);
            }
            EngineEvent::Ready | EngineEvent::Unknown(_) => {}
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
