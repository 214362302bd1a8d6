//! Plex source-playlist collaborator.

use std::time::Duration;

use reqwest::{blocking::Client, header};
use serde::Deserialize;
use url::Url;

use crate::{
    config::PlexConfig,
    domain::track::{Track, TrackId},
    platform::{PlatformError, SourcePlaylist, SourcePlaylists},
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub struct PlexClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl PlexClient {
    pub fn new(cfg: &PlexConfig) -> Result<Self, PlatformError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .default_headers(headers)
            .build()?;

        let base_url = Url::parse(&cfg.base_url)
            .map_err(|e| PlatformError::Parse(format!("invalid plex base url: {e}")))?;

        Ok(Self {
            http,
            base_url,
            token: cfg.token.clone(),
        })
    }

    fn get_container(&self, path: &str) -> Result<MediaContainer, PlatformError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| PlatformError::Parse(format!("invalid plex path {path}: {e}")))?;

        let response = self
            .http
            .get(url)
            .header("X-Plex-Token", &self.token)
            .send()?
            .error_for_status()?;

        let body: PlexResponse = response.json()?;
        Ok(body.media_container)
    }
}

#[derive(Debug, Deserialize)]
struct PlexResponse {
    #[serde(rename = "MediaContainer")]
    media_container: MediaContainer,
}

#[derive(Debug, Deserialize, Default)]
struct MediaContainer {
    #[serde(rename = "Metadata", default)]
    metadata: Vec<Metadata>,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(rename = "ratingKey")]
    rating_key: String,
    title: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(rename = "playlistType")]
    playlist_type: Option<String>,
    /// the artist, for items of type "track"
    #[serde(rename = "grandparentTitle")]
    grandparent_title: Option<String>,
    /// the album
    #[serde(rename = "parentTitle")]
    parent_title: Option<String>,
    /// milliseconds
    duration: Option<u64>,
}

impl SourcePlaylists for PlexClient {
    fn list_playlists(&self) -> Result<Vec<SourcePlaylist>, PlatformError> {
        let container = self.get_container("/playlists")?;

        Ok(container
            .metadata
            .into_iter()
            .filter(|m| m.playlist_type.as_deref() == Some("audio"))
            .map(|m| SourcePlaylist {
                id: m.rating_key,
                title: m.title,
            })
            .collect())
    }

    fn list_playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>, PlatformError> {
        let container = self.get_container(&format!("/playlists/{playlist_id}/items"))?;

        Ok(container
            .metadata
            .into_iter()
            .filter(|m| m.kind.as_deref() == Some("track"))
            .map(|m| Track {
                id: TrackId::new(m.rating_key),
                title: m.title,
                artist: m.grandparent_title.unwrap_or_default(),
                album: m.parent_title,
                duration: m.duration.map(Duration::from_millis),
            })
            .collect())
    }
}
