use anyhow::Context;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub version: u32,
    pub database: Database,
    pub plex: PlexConfig,
    pub youtube: YouTubeConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path}"))?;
        toml::from_str(&contents).with_context(|| "Failed to parse config TOML")
    }
}

#[derive(Debug, Deserialize)]
pub struct Database {
    pub in_memory: bool,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlexConfig {
    pub base_url: String,
    pub token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct YouTubeConfig {
    /// API key used for search
    pub api_key: String,
    /// Pre-acquired OAuth2 access token used for playlist mutations
    pub access_token: String,
    /// Candidate page size per search
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

fn default_search_limit() -> usize {
    10
}

#[derive(Debug, Deserialize, Default)]
pub struct SyncConfig {
    /// Source playlist titles to reconcile; empty means all audio playlists
    #[serde(default)]
    pub playlists: Vec<String>,
    /// Playlist titles that are never reconciled
    #[serde(default)]
    pub excluded: Vec<String>,
}
