//! Per-track match resolution: reuse a confirmed stored match, accept an
//! unambiguous search hit, or hand the decision to the user.

use crate::{
    domain::{
        track::Track,
        video::{VideoCandidate, VideoId},
    },
    platform::{CandidateSearch, ChooseCandidate, SearchError},
    storage::{
        error::StoreError,
        operations::{Match, MatchStore},
    },
};

/// Lowercases, replaces punctuation with spaces and collapses runs of
/// whitespace, so "Daft Punk - One More Time!" and "daft punk one more
/// time" compare equal.
pub fn normalize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// A candidate clears when its normalized title is the track's artist and
/// title (either order), or the bare title while the channel names the
/// artist.
pub fn accepts(track: &Track, candidate: &VideoCandidate) -> bool {
    let video_title = normalize(&candidate.title);
    let artist_title = normalize(&format!("{} {}", track.artist, track.title));
    let title_artist = normalize(&format!("{} {}", track.title, track.artist));

    if video_title == artist_title || video_title == title_artist {
        return true;
    }

    let artist = normalize(&track.artist);
    !artist.is_empty()
        && video_title == normalize(&track.title)
        && normalize(&candidate.channel).contains(&artist)
}

/// Why a track ended the run without a usable match.
#[derive(Debug)]
pub enum SkipReason {
    NoCandidates,
    Declined,
    UpdateOnly,
    SearchUnavailable(String),
}

/// Outcome of resolving one track.
#[derive(Debug)]
pub enum Resolution {
    /// Confirmed stored match reused, no search issued.
    Existing(Match),
    /// A single candidate cleared the acceptance heuristic.
    AutoAccepted(Match),
    /// The user picked from the ranked candidate list.
    UserSelected(Match),
    /// Nothing stored; the track is retried on the next run.
    Skipped(SkipReason),
}

impl Resolution {
    pub fn video_id(&self) -> Option<&VideoId> {
        match self {
            Resolution::Existing(m)
            | Resolution::AutoAccepted(m)
            | Resolution::UserSelected(m) => Some(&m.video_id),
            Resolution::Skipped(_) => None,
        }
    }
}

pub struct Resolver<'a> {
    store: &'a mut MatchStore,
    search: &'a dyn CandidateSearch,
    chooser: &'a dyn ChooseCandidate,
    update_only: bool,
}

impl<'a> Resolver<'a> {
    pub fn new(
        store: &'a mut MatchStore,
        search: &'a dyn CandidateSearch,
        chooser: &'a dyn ChooseCandidate,
        update_only: bool,
    ) -> Self {
        Self {
            store,
            search,
            chooser,
            update_only,
        }
    }

    /// One evaluation of the per-track state machine. Only store failures
    /// escape; search trouble degrades to a skip for this track.
    pub fn resolve(&mut self, track: &Track) -> Result<Resolution, StoreError> {
        if let Some(existing) = self.store.get(&track.id)? {
            if existing.confirmed {
                return Ok(Resolution::Existing(existing));
            }
        }

        if self.update_only {
            return Ok(Resolution::Skipped(SkipReason::UpdateOnly));
        }

        let mut candidates = match self.search.search(track) {
            Ok(candidates) => candidates,
            Err(SearchError::Unavailable(reason)) => {
                log::warn!(
                    "search unavailable for '{} - {}': {reason}",
                    track.artist,
                    track.title
                );
                return Ok(Resolution::Skipped(SkipReason::SearchUnavailable(reason)));
            }
        };

        if candidates.is_empty() {
            log::info!("no candidates for '{} - {}'", track.artist, track.title);
            return Ok(Resolution::Skipped(SkipReason::NoCandidates));
        }

        // rank order everywhere, never an arbitrary one
        candidates.sort_by_key(|c| c.rank);

        let clearing: Vec<&VideoCandidate> =
            candidates.iter().filter(|c| accepts(track, c)).collect();
        if let [only] = clearing.as_slice() {
            let stored = self.store.put(track, &only.id, true)?;
            return Ok(Resolution::AutoAccepted(stored));
        }

        match self.chooser.choose(track, &candidates) {
            Some(video_id) => {
                let stored = self.store.put(track, &video_id, true)?;
                Ok(Resolution::UserSelected(stored))
            }
            None => Ok(Resolution::Skipped(SkipReason::Declined)),
        }
    }
}
