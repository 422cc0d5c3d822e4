//! Runtime tunables for pgnwatch.
//!
//! Every value can be set through an environment variable; command-line
//! arguments take precedence over all of them.

use std::path::PathBuf;

use engine::EngineConfig;

/// Default search depth, in plies.
pub const DEFAULT_DEPTH: u32 = 20;

/// Get the engine executable.
///
/// Priority:
/// 1. `PGNWATCH_ENGINE_PATH` env variable if set
/// 2. The first Stockfish found in the usual install locations or on `PATH`
pub fn get_engine_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("PGNWATCH_ENGINE_PATH") {
        return Some(PathBuf::from(path));
    }

    engine::find_stockfish_path()
}

/// Get the search depth.
///
/// Priority:
/// 1. `PGNWATCH_DEPTH` env variable if set (falls back to the default if it
///    is not a positive integer)
/// 2. `20` as fallback
pub fn get_depth() -> u32 {
    parse_depth(std::env::var("PGNWATCH_DEPTH").ok().as_deref())
}

/// Engine `Threads` option, if configured via `PGNWATCH_THREADS`.
pub fn get_threads() -> Option<u32> {
    std::env::var("PGNWATCH_THREADS").ok()?.parse().ok()
}

/// Engine `Hash` size in MB, if configured via `PGNWATCH_HASH_MB`.
pub fn get_hash_mb() -> Option<u32> {
    std::env::var("PGNWATCH_HASH_MB").ok()?.parse().ok()
}

/// Build the engine configuration, letting `override_path` win over the
/// environment. Returns `None` when no engine can be found.
pub fn engine_config(override_path: Option<PathBuf>) -> Option<EngineConfig> {
    let path = override_path.or_else(get_engine_path)?;
    Some(EngineConfig {
        threads: get_threads(),
        hash_mb: get_hash_mb(),
        ..EngineConfig::new(path)
    })
}

fn parse_depth(value: Option<&str>) -> u32 {
    value
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|depth| *depth > 0)
        .unwrap_or(DEFAULT_DEPTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_depth() {
        let depth = get_depth();
        match std::env::var("PGNWATCH_DEPTH") {
            Ok(val) => assert_eq!(depth, parse_depth(Some(&val))),
            Err(_) => assert_eq!(depth, DEFAULT_DEPTH),
        }
    }

    #[test]
    fn test_parse_depth() {
        assert_eq!(parse_depth(None), DEFAULT_DEPTH);
        assert_eq!(parse_depth(Some("12")), 12);
        assert_eq!(parse_depth(Some(" 8 ")), 8);
        assert_eq!(parse_depth(Some("0")), DEFAULT_DEPTH);
        assert_eq!(parse_depth(Some("deep")), DEFAULT_DEPTH);
    }

    #[test]
    fn test_engine_config_prefers_override() {
        let config = engine_config(Some(PathBuf::from("/opt/engines/sf"))).unwrap();
        assert_eq!(config.path, PathBuf::from("/opt/engines/sf"));
        assert!(config.args.is_empty());
    }

    #[test]
    fn test_get_engine_path() {
        if let Ok(val) = std::env::var("PGNWATCH_ENGINE_PATH") {
            assert_eq!(get_engine_path(), Some(PathBuf::from(val)));
        }
    }
}
