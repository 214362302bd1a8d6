use thiserror::Error;

use crate::domain::{
    track::Track,
    video::{VideoCandidate, VideoId},
};

pub mod plex;
pub mod youtube;

/// A playlist on the source media server.
#[derive(Debug, Clone)]
pub struct SourcePlaylist {
    pub id: String,
    pub title: String,
}

/// Read side: the media server holding the curated playlists.
pub trait SourcePlaylists {
    fn list_playlists(&self) -> Result<Vec<SourcePlaylist>, PlatformError>;

    fn list_playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>, PlatformError>;
}

/// Write side: the video platform holding the mirrored playlists.
pub trait TargetPlaylists {
    /// Returns the id of the newly created playlist.
    fn create_playlist(&self, title: &str) -> Result<String, PlatformError>;

    fn add_item(&self, playlist_id: &str, video_id: &VideoId) -> Result<(), PlatformError>;

    fn remove_item(&self, playlist_id: &str, video_id: &VideoId) -> Result<(), PlatformError>;

    fn list_playlist_items(&self, playlist_id: &str) -> Result<Vec<VideoId>, PlatformError>;
}

/// Issues one bounded, relevance-ranked query per call. No caching here:
/// confirmed matches in the store are what keeps call volume down.
pub trait CandidateSearch {
    /// Empty result means "nothing found"; an unreachable backend is an
    /// error, the two are never conflated.
    fn search(&self, track: &Track) -> Result<Vec<VideoCandidate>, SearchError>;
}

/// Disambiguation capability for tracks the acceptance heuristic cannot
/// settle. Injected so the interactive prompt can be swapped for a
/// scripted double.
pub trait ChooseCandidate {
    fn choose(&self, track: &Track, candidates: &[VideoCandidate]) -> Option<VideoId>;
}

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("http error: {0}")]
    Http(String),

    #[error("unexpected response: {0}")]
    Parse(String),

    #[error("playlist mutation failed for {item_id}: {reason}")]
    RemoteMutation { item_id: String, reason: String },
}

impl From<reqwest::Error> for PlatformError {
    fn from(e: reqwest::Error) -> Self {
        PlatformError::Http(e.to_string())
    }
}

impl From<serde_json::Error> for PlatformError {
    fn from(e: serde_json::Error) -> Self {
        PlatformError::Parse(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search backend unreachable: {0}")]
    Unavailable(String),
}
