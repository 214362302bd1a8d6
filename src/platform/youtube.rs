//! YouTube collaborator: candidate search and playlist mutations over the
//! Data API v3. Search uses the API key; mutations use the pre-acquired
//! OAuth2 access token.

use std::{collections::HashMap, time::Duration};

use reqwest::{blocking::Client, header};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::{
    config::YouTubeConfig,
    domain::{
        track::Track,
        video::{VideoCandidate, VideoId},
    },
    platform::{CandidateSearch, PlatformError, SearchError, TargetPlaylists},
};

const API_BASE: &str = "https://www.googleapis.com/youtube/v3/";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const ITEMS_PAGE_SIZE: &str = "50";

pub struct YouTubeClient {
    http: Client,
    base: Url,
    api_key: String,
    access_token: String,
    search_limit: usize,
}

impl YouTubeClient {
    pub fn new(cfg: &YouTubeConfig) -> Result<Self, PlatformError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .default_headers(headers)
            .build()?;

        let base = Url::parse(API_BASE)
            .map_err(|e| PlatformError::Parse(format!("invalid api base: {e}")))?;

        Ok(Self {
            http,
            base,
            api_key: cfg.api_key.clone(),
            access_token: cfg.access_token.clone(),
            search_limit: cfg.search_limit,
        })
    }

    fn endpoint(&self, path: &str) -> Url {
        self.base.join(path).unwrap()
    }

    /// Same query shape a user would type into the search box.
    fn search_query(track: &Track) -> String {
        match &track.album {
            Some(album) => format!("{} - {} - {}", track.artist, track.title, album),
            None => format!("{} - {}", track.artist, track.title),
        }
    }

    /// Durations come from a follow-up videos.list call; they are display
    /// metadata only, so a failure degrades to "unknown" instead of
    /// failing the search.
    fn video_durations(&self, ids: &[String]) -> HashMap<String, Duration> {
        if ids.is_empty() {
            return HashMap::new();
        }

        let mut url = self.endpoint("videos");
        url.query_pairs_mut()
            .append_pair("part", "contentDetails")
            .append_pair("id", &ids.join(","))
            .append_pair("key", &self.api_key);

        let result = self
            .http
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json::<VideoListResponse>());

        match result {
            Ok(body) => body
                .items
                .into_iter()
                .filter_map(|item| {
                    parse_iso8601_duration(&item.content_details.duration).map(|d| (item.id, d))
                })
                .collect(),
            Err(e) => {
                log::warn!("could not fetch video durations: {e}");
                HashMap::new()
            }
        }
    }

    /// Playlist items with their mutable item ids, across all pages.
    fn playlist_items(&self, playlist_id: &str) -> Result<Vec<(String, VideoId)>, PlatformError> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.endpoint("playlistItems");
            url.query_pairs_mut()
                .append_pair("part", "snippet")
                .append_pair("playlistId", playlist_id)
                .append_pair("maxResults", ITEMS_PAGE_SIZE);
            if let Some(token) = &page_token {
                url.query_pairs_mut().append_pair("pageToken", token);
            }

            let body: PlaylistItemsResponse = self
                .http
                .get(url)
                .bearer_auth(&self.access_token)
                .send()?
                .error_for_status()?
                .json()?;

            items.extend(body.items.into_iter().map(|item| {
                (item.id, VideoId::new(item.snippet.resource_id.video_id))
            }));

            match body.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(items)
    }

    fn mutation_error(video_id: &VideoId, reason: impl ToString) -> PlatformError {
        PlatformError::RemoteMutation {
            item_id: video_id.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: SearchSnippet,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchSnippet {
    title: String,
    #[serde(rename = "channelTitle")]
    channel_title: String,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    #[serde(rename = "contentDetails")]
    content_details: ContentDetails,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemsResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    id: String,
    snippet: PlaylistItemSnippet,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemSnippet {
    #[serde(rename = "resourceId")]
    resource_id: ResourceId,
}

#[derive(Debug, Deserialize)]
struct ResourceId {
    #[serde(rename = "videoId")]
    video_id: String,
}

#[derive(Debug, Deserialize)]
struct CreatedPlaylist {
    id: String,
}

impl CandidateSearch for YouTubeClient {
    fn search(&self, track: &Track) -> Result<Vec<VideoCandidate>, SearchError> {
        let query = Self::search_query(track);

        let mut url = self.endpoint("search");
        url.query_pairs_mut()
            .append_pair("part", "snippet")
            .append_pair("type", "video")
            .append_pair("maxResults", &self.search_limit.to_string())
            .append_pair("q", &query)
            .append_pair("key", &self.api_key);

        let body = self
            .http
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json::<SearchResponse>())
            .map_err(|e| SearchError::Unavailable(e.to_string()))?;

        let ids: Vec<String> = body
            .items
            .iter()
            .filter_map(|item| item.id.video_id.clone())
            .collect();
        let durations = self.video_durations(&ids);

        Ok(body
            .items
            .into_iter()
            .filter_map(|item| item.id.video_id.map(|id| (id, item.snippet)))
            .enumerate()
            .map(|(rank, (id, snippet))| VideoCandidate {
                duration: durations.get(&id).copied(),
                id: VideoId::new(id),
                title: snippet.title,
                channel: snippet.channel_title,
                rank,
            })
            .collect())
    }
}

impl TargetPlaylists for YouTubeClient {
    fn create_playlist(&self, title: &str) -> Result<String, PlatformError> {
        let mut url = self.endpoint("playlists");
        url.query_pairs_mut().append_pair("part", "snippet");

        let body = json!({
            "snippet": {
                "title": title,
                "description": format!("A playlist created based on the Plex playlist: {title}"),
            }
        });

        let created: CreatedPlaylist = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()?
            .error_for_status()?
            .json()?;

        Ok(created.id)
    }

    fn add_item(&self, playlist_id: &str, video_id: &VideoId) -> Result<(), PlatformError> {
        let mut url = self.endpoint("playlistItems");
        url.query_pairs_mut().append_pair("part", "snippet");

        let body = json!({
            "snippet": {
                "playlistId": playlist_id,
                "resourceId": {
                    "kind": "youtube#video",
                    "videoId": video_id.as_str(),
                }
            }
        });

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .map_err(|e| Self::mutation_error(video_id, e))?;

        if !response.status().is_success() {
            return Err(Self::mutation_error(
                video_id,
                format!("status {}", response.status()),
            ));
        }
        Ok(())
    }

    fn remove_item(&self, playlist_id: &str, video_id: &VideoId) -> Result<(), PlatformError> {
        let items = self
            .playlist_items(playlist_id)
            .map_err(|e| Self::mutation_error(video_id, e))?;

        let Some((item_id, _)) = items.iter().find(|(_, v)| v == video_id) else {
            // already gone, nothing to delete
            log::warn!("video {video_id} not present in playlist {playlist_id}");
            return Ok(());
        };

        let mut url = self.endpoint("playlistItems");
        url.query_pairs_mut().append_pair("id", item_id);

        let response = self
            .http
            .delete(url)
            .bearer_auth(&self.access_token)
            .send()
            .map_err(|e| Self::mutation_error(video_id, e))?;

        if !response.status().is_success() {
            return Err(Self::mutation_error(
                video_id,
                format!("status {}", response.status()),
            ));
        }
        Ok(())
    }

    fn list_playlist_items(&self, playlist_id: &str) -> Result<Vec<VideoId>, PlatformError> {
        Ok(self
            .playlist_items(playlist_id)?
            .into_iter()
            .map(|(_, video_id)| video_id)
            .collect())
    }
}

/// Parses the API's ISO-8601 durations ("PT3M12S"). Anything longer than
/// hours (or malformed) is treated as unknown.
fn parse_iso8601_duration(s: &str) -> Option<Duration> {
    let rest = s.strip_prefix("PT")?;

    let mut total = 0u64;
    let mut digits = String::new();
    for c in rest.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else {
            let value: u64 = digits.parse().ok()?;
            digits.clear();
            total += match c {
                'H' => value * 3600,
                'M' => value * 60,
                'S' => value,
                _ => return None,
            };
        }
    }

    if !digits.is_empty() {
        return None;
    }
    Some(Duration::from_secs(total))
}
