use std::path::{Path, PathBuf};

/// How to launch and tune the analysis engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub path: PathBuf,
    pub args: Vec<String>,
    pub threads: Option<u32>,
    pub hash_mb: Option<u32>,
}

impl EngineConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
            threads: None,
            hash_mb: None,
        }
    }

    /// `setoption` lines sent right after the `uci` handshake.
    pub(crate) fn option_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(threads) = self.threads {
            let threads = threads.clamp(1, 16);
            lines.push(format!("setoption name Threads value {}", threads));
        }
        if let Some(hash_mb) = self.hash_mb {
            let hash_mb = hash_mb.clamp(1, 2048);
            lines.push(format!("setoption name Hash value {}", hash_mb));
        }
        lines
    }
}

/// Find Stockfish executable in common locations
pub fn find_stockfish_path() -> Option<PathBuf> {
    let paths = [
        "/usr/local/bin/stockfish",
        "/usr/bin/stockfish",
        "/opt/homebrew/bin/stockfish",
        "/usr/games/stockfish",
    ];

    if let Some(found) = paths.iter().map(Path::new).find(|p| p.is_file()) {
        return Some(found.to_path_buf());
    }

    // In PATH
    std::env::var_os("PATH").and_then(|path| {
        std::env::split_paths(&path)
            .map(|dir| dir.join("stockfish"))
            .find(|candidate| candidate.is_file())
    })
}
