//! One long-running engine worker and the channels around it.
//!
//! Three tasks run per session, as in a classic UCI bridge:
//! - a writer that drains queued command lines into the worker's stdin,
//! - a reader that parses stdout lines and tags them with a generation,
//! - a dispatcher that hands tagged events to subscribers.
//!
//! Every `go` pushes its generation onto a FIFO. `info` output belongs to the
//! oldest search still running and `bestmove` retires it, so a late result is
//! always attributed to the search that produced it.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::stockfish::EngineConfig;
use crate::uci::parse_engine_line;
use crate::{EngineCommand, Generation, TaggedEvent};

type EventHandler = Box<dyn Fn(&TaggedEvent) + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine unavailable at {path}: {source}")]
    Unavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Engine has no stdin")]
    NoStdin,
    #[error("Engine has no stdout")]
    NoStdout,
    #[error("Engine session is stopped")]
    Stopped,
}

/// Searches issued but not yet answered by a `bestmove`.
#[derive(Debug, Default)]
struct SearchLedger {
    pending: VecDeque<Generation>,
    last_sent: Generation,
}

impl SearchLedger {
    fn tag(&mut self, ends_search: bool) -> Generation {
        if ends_search {
            self.pending.pop_front().unwrap_or(self.last_sent)
        } else {
            self.pending.front().copied().unwrap_or(self.last_sent)
        }
    }
}

pub struct EngineSession {
    command_tx: Option<mpsc::UnboundedSender<String>>,
    ledger: Arc<Mutex<SearchLedger>>,
    handlers: Arc<Mutex<Vec<EventHandler>>>,
    subscribed: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    process: Option<Child>,
}

impl EngineSession {
    /// Spawn the worker and queue the UCI handshake.
    ///
    /// Only a failure to launch the process is reported; replies are never
    /// awaited. Must be called from within a Tokio runtime.
    #[tracing::instrument(level = "info", skip_all, fields(path = %config.path.display()))]
    pub fn start(config: &EngineConfig) -> Result<Self, EngineError> {
        tracing::info!("Starting engine");
        let mut process = tokio::process::Command::new(&config.path)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                tracing::error!("Failed to spawn engine: {}", source);
                EngineError::Unavailable {
                    path: config.path.display().to_string(),
                    source,
                }
            })?;

        let stdin = process.stdin.take().ok_or(EngineError::NoStdin)?;
        let stdout = process.stdout.take().ok_or(EngineError::NoStdout)?;

        let (command_tx, command_rx) = mpsc::unbounded_channel::<String>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<TaggedEvent>();
        let (subscribed, subscribed_rx) = watch::channel(false);
        let ledger = Arc::new(Mutex::new(SearchLedger::default()));
        let handlers: Arc<Mutex<Vec<EventHandler>>> = Arc::new(Mutex::new(Vec::new()));

        let tasks = vec![
            tokio::spawn(write_commands(stdin, command_rx)),
            tokio::spawn(read_events(stdout, ledger.clone(), event_tx)),
            tokio::spawn(dispatch_events(event_rx, handlers.clone(), subscribed_rx)),
        ];

        let handshake = std::iter::once("uci".to_string())
            .chain(config.option_lines())
            .chain(std::iter::once("isready".to_string()));
        for line in handshake {
            // The writer task was spawned above and holds the receiver
            let _ = command_tx.send(line);
        }

        tracing::info!("Engine spawned");
        Ok(Self {
            command_tx: Some(command_tx),
            ledger,
            handlers,
            subscribed,
            tasks,
            process: Some(process),
        })
    }

    /// Queue a command for the worker. Never waits for the worker; commands
    /// reach it in the order they were sent.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn send(&self, generation: Generation, command: EngineCommand) -> Result<(), EngineError> {
        let tx = self.command_tx.as_ref().ok_or(EngineError::Stopped)?;

        // Ledger and queue are updated under one lock so concurrent senders
        // cannot reorder a search relative to its generation.
        let mut ledger = lock(&self.ledger);
        ledger.last_sent = generation;
        if matches!(command, EngineCommand::Go { .. }) {
            ledger.pending.push_back(generation);
        }
        tx.send(command.to_uci_line())
            .map_err(|_| EngineError::Stopped)
    }

    /// Register a consumer called once per engine output line.
    ///
    /// Output produced before the first subscriber is held back, not dropped.
    /// Handlers run on the session's dispatch task and must not call back into
    /// `subscribe`.
    pub fn subscribe<F>(&self, handler: F)
    where
        F: Fn(&TaggedEvent) + Send + Sync + 'static,
    {
        lock(&self.handlers).push(Box::new(handler));
        self.subscribed.send_replace(true);
    }

    pub fn is_running(&self) -> bool {
        self.command_tx.is_some()
    }

    /// Terminate the worker. Queued commands are discarded, and once this
    /// returns no handler will be called again. Safe to call repeatedly.
    pub async fn stop(&mut self) {
        let Some(command_tx) = self.command_tx.take() else {
            tracing::debug!("Engine already stopped");
            return;
        };
        tracing::info!("Stopping engine");

        // The writer goes first so nothing still queued reaches the worker.
        // Its receiver is dropped with it, discarding the backlog.
        if !self.tasks.is_empty() {
            let writer = self.tasks.remove(0);
            writer.abort();
            let _ = writer.await;
        }
        drop(command_tx);

        for task in self.tasks.drain(..) {
            task.abort();
            // Waits for a handler that is mid-call to return
            let _ = task.await;
        }
        if let Some(mut process) = self.process.take() {
            if let Err(e) = process.kill().await {
                tracing::warn!("Failed to kill engine process: {}", e);
            }
        }
        lock(&self.handlers).clear();
        tracing::info!("Engine stopped");
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn write_commands(mut stdin: ChildStdin, mut command_rx: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = command_rx.recv().await {
        tracing::trace!("UCI >> {}", line);
        if let Err(e) = stdin.write_all(format!("{}\n", line).as_bytes()).await {
            tracing::error!("Failed to write to engine stdin: {}", e);
            break;
        }
        if let Err(e) = stdin.flush().await {
            tracing::error!("Failed to flush engine stdin: {}", e);
            break;
        }
    }
    tracing::debug!("Stdin writer task exiting");
}

async fn read_events(
    stdout: ChildStdout,
    ledger: Arc<Mutex<SearchLedger>>,
    event_tx: mpsc::UnboundedSender<TaggedEvent>,
) {
    let mut reader = BufReader::new(stdout);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                tracing::warn!("Engine stdout EOF - engine closed");
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                tracing::trace!("UCI << {}", trimmed);

                let ends_search = trimmed.split_whitespace().next() == Some("bestmove");
                let generation = lock(&ledger).tag(ends_search);
                let event = parse_engine_line(trimmed);
                if event_tx.send(TaggedEvent { generation, event }).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::error!("Error reading from engine stdout: {}", e);
                break;
            }
        }
    }
    tracing::debug!("Output reader task exiting");
}

async fn dispatch_events(
    mut event_rx: mpsc::UnboundedReceiver<TaggedEvent>,
    handlers: Arc<Mutex<Vec<EventHandler>>>,
    mut subscribed: watch::Receiver<bool>,
) {
    if subscribed.wait_for(|ready| *ready).await.is_err() {
        return;
    }
    while let Some(tagged) = event_rx.recv().await {
        for handler in lock(&handlers).iter() {
            handler(&tagged);
        }
    }
    tracing::debug!("Event dispatch task exiting");
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::EngineEvent;
    use chess_common::format_uci_move;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const FAKE_ENGINE: &str = r#"
while read -r line; do
  case "$line" in
    uci) echo "id name fake"; echo "uciok" ;;
    isready) echo "readyok" ;;
    go*) echo "info depth 1 score cp 17 pv e2e4"; echo "bestmove e2e4 ponder e7e5" ;;
  esac
done
"#;

    fn shell(script: &str) -> EngineConfig {
        EngineConfig {
            args: vec!["-c".to_string(), script.to_string()],
            ..EngineConfig::new("sh")
        }
    }

    fn collect(session: &EngineSession) -> mpsc::UnboundedReceiver<TaggedEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        session.subscribe(move |event| {
            let _ = tx.send(event.clone());
        });
        rx
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<TaggedEvent>) -> TaggedEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for engine output")
            .expect("engine channel closed")
    }

    #[tokio::test]
    async fn test_commands_reach_worker_in_order() {
        // `cat` echoes every line back, so the worker's view is observable
        let mut session = EngineSession::start(&EngineConfig::new("cat")).unwrap();
        let mut rx = collect(&session);

        let g = Generation::new(1);
        session.send(g, EngineCommand::NewGame).unwrap();
        session
            .send(
                g,
                EngineCommand::SetPosition {
                    moves: vec!["e2e4".into(), "e7e5".into()],
                },
            )
            .unwrap();
        session.send(g, EngineCommand::Go { depth: 20 }).unwrap();

        let mut seen = Vec::new();
        while seen.len() < 5 {
            match next(&mut rx).await.event {
                EngineEvent::Unknown(line) => seen.push(line),
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(
            seen,
            vec![
                "uci",
                "isready",
                "ucinewgame",
                "position startpos moves e2e4 e7e5",
                "go depth 20",
            ]
        );
        session.stop().await;
    }

    #[tokio::test]
    async fn test_results_are_tagged_with_their_search() {
        let mut session = EngineSession::start(&shell(FAKE_ENGINE)).unwrap();
        let mut rx = collect(&session);

        for generation in [Generation::new(1), Generation::new(2)] {
            session.send(generation, EngineCommand::NewGame).unwrap();
            session
                .send(generation, EngineCommand::SetPosition { moves: vec![] })
                .unwrap();
            session.send(generation, EngineCommand::Go { depth: 1 }).unwrap();
        }

        let mut best = Vec::new();
        let mut scored = Vec::new();
        while best.len() < 2 {
            let tagged = next(&mut rx).await;
            match tagged.event {
                EngineEvent::BestMove { mv, ponder } => {
                    assert_eq!(format_uci_move(mv), "e2e4");
                    assert!(ponder.is_some());
                    best.push(tagged.generation);
                }
                EngineEvent::Info(info) => {
                    assert_eq!(info.score, Some(crate::Score::Centipawns(17)));
                    scored.push(tagged.generation);
                }
                EngineEvent::Ready | EngineEvent::Unknown(_) => {}
            }
        }
        assert_eq!(best, vec![Generation::new(1), Generation::new(2)]);
        assert_eq!(scored, vec![Generation::new(1), Generation::new(2)]);
        session.stop().await;
    }

    #[tokio::test]
    async fn test_output_before_subscribe_is_not_lost() {
        let mut session = EngineSession::start(&shell(FAKE_ENGINE)).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let mut rx = collect(&session);
        let first = next(&mut rx).await;
        assert!(matches!(first.event, EngineEvent::Unknown(ref line) if line == "id name fake"));
        assert!(matches!(next(&mut rx).await.event, EngineEvent::Ready));
        session.stop().await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_silences_handlers() {
        let script = "while :; do echo 'info depth 1 score cp 1'; sleep 0.01; done";
        let mut session = EngineSession::start(&shell(script)).unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        session.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::timeout(Duration::from_secs(5), async {
            while count.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("engine never produced output");

        session.stop().await;
        session.stop().await;
        let after_stop = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_stop);

        assert!(!session.is_running());
        assert!(matches!(
            session.send(Generation::new(1), EngineCommand::NewGame),
            Err(EngineError::Stopped)
        ));
    }

    #[tokio::test]
    async fn test_stop_discards_queued_commands() {
        // The worker reads one line a second, so the backlog stays queued
        let dir = tempfile::tempdir().unwrap();
        let received = dir.path().join("received");
        let script = format!(
            "while read -r line; do echo \"$line\" >> '{}'; sleep 1; done",
            received.display()
        );
        let mut session = EngineSession::start(&shell(&script)).unwrap();
        // Far more than a pipe buffer holds, so the writer is left blocked
        let moves: Vec<String> = std::iter::repeat("g1f3".to_string()).take(4000).collect();
        for _ in 0..200 {
            session
                .send(
                    Generation::new(1),
                    EngineCommand::SetPosition {
                        moves: moves.clone(),
                    },
                )
                .unwrap();
        }
        session.send(Generation::new(1), EngineCommand::Go { depth: 1 }).unwrap();

        tokio::time::timeout(Duration::from_secs(5), session.stop())
            .await
            .expect("stop blocked on queued commands");
        tokio::time::sleep(Duration::from_millis(200)).await;

        let lines = std::fs::read_to_string(&received).unwrap_or_default();
        assert!(lines.lines().count() <= 1, "worker saw {lines:?}");
        assert!(!lines.contains("go depth"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let result = EngineSession::start(&EngineConfig::new("/nonexistent/pgnwatch-engine"));
        assert!(matches!(result, Err(EngineError::Unavailable { .. })));
    }

    #[test]
    fn test_ledger_attributes_late_results() {
        let mut ledger = SearchLedger::default();
        ledger.last_sent = Generation::new(1);
        ledger.pending.push_back(Generation::new(1));
        ledger.last_sent = Generation::new(2);
        ledger.pending.push_back(Generation::new(2));

        assert_eq!(ledger.tag(false), Generation::new(1));
        assert_eq!(ledger.tag(true), Generation::new(1));
        assert_eq!(ledger.tag(false), Generation::new(2));
        assert_eq!(ledger.tag(true), Generation::new(2));
        // Nothing outstanding: fall back to the last generation sent
        assert_eq!(ledger.tag(true), Generation::new(2));
    }
}
