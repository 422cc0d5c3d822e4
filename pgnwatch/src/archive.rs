//! Fetches a player's most recent games from the chess.com public API.

use reqwest::{Client, StatusCode};
use serde::Deserialize;

const API_BASE: &str = "https://api.chess.com/pub/player";

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Archive request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Archive request for {url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },
}

/// One finished game from a monthly archive.
#[derive(Debug, Clone, Deserialize)]
pub struct GameRecord {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub pgn: String,
}

#[derive(Debug, Default, Deserialize)]
struct ArchiveList {
    #[serde(default)]
    archives: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MonthlyGames {
    #[serde(default)]
    games: Vec<GameRecord>,
}

pub struct ArchiveClient {
    client: Client,
    base: String,
}

impl ArchiveClient {
    pub fn new() -> Result<Self, ArchiveError> {
        Self::with_base(API_BASE)
    }

    pub fn with_base(base: impl Into<String>) -> Result<Self, ArchiveError> {
        let client = Client::builder()
            .user_agent(concat!("pgnwatch/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base: base.into(),
        })
    }

    /// Games from the player's newest monthly archive. A player with no
    /// archives, or an empty archive, yields an empty list.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn latest_games(&self, username: &str) -> Result<Vec<GameRecord>, ArchiveError> {
        let url = archives_url(&self.base, username);
        let Some(list) = self.get_json::<ArchiveList>(&url).await? else {
            tracing::info!("No archives for {}", username);
            return Ok(Vec::new());
        };

        let Some(latest) = list.archives.last() else {
            tracing::info!("Archive list for {} is empty", username);
            return Ok(Vec::new());
        };
        tracing::debug!("Fetching {}", latest);

        let games = self
            .get_json::<MonthlyGames>(latest)
            .await?
            .map(|month| month.games)
            .unwrap_or_default();
        tracing::info!("Fetched {} games", games.len());
        Ok(games)
    }

    /// `Ok(None)` on 404.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
    ) -> Result<Option<T>, ArchiveError> {
        let resp = self.client.get(url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(ArchiveError::Status {
                url: url.to_string(),
                status: resp.status(),
            });
        }
        Ok(Some(resp.json().await?))
    }
}

fn archives_url(base: &str, username: &str) -> String {
    format!(
        "{}/{}/games/archives",
        base.trim_end_matches('/'),
        username.to_lowercase()
    )
}
