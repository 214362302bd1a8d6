use std::{fmt::Display, time::Duration};

/// Stable identifier of a video on the target platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoId(String);

impl VideoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One search result, ranked by relevance. Produced per query and thrown
/// away unless selected.
#[derive(Debug, Clone)]
pub struct VideoCandidate {
    pub id: VideoId,
    pub title: String,
    pub channel: String,
    pub duration: Option<Duration>,
    pub rank: usize,
}

impl VideoCandidate {
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.id)
    }
}
