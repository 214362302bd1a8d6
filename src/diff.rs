//! Computes the edit script that converges a target playlist onto the
//! current source playlist state.

use std::collections::HashSet;

use crate::{
    domain::{track::TrackId, video::VideoId},
    storage::operations::SnapshotItem,
};

/// Additions in source order, removals unordered. Minimal in the sense
/// that a video which merely migrated between source tracks is neither
/// removed nor re-added.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct EditScript {
    pub additions: Vec<VideoId>,
    pub removals: Vec<VideoId>,
}

impl EditScript {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }
}

/// `current` is the resolved source playlist in order; `None` marks tracks
/// that stayed unmatched this run. Those take no part in the script: they
/// stay absent from the target and are retried next run.
pub fn diff(current: &[(TrackId, Option<VideoId>)], snapshot: &[SnapshotItem]) -> EditScript {
    let mut desired = Vec::new();
    let mut desired_set = HashSet::new();
    for (_, video_id) in current {
        if let Some(video_id) = video_id {
            if desired_set.insert(video_id.clone()) {
                desired.push(video_id.clone());
            }
        }
    }

    let applied: HashSet<&VideoId> = snapshot.iter().map(|item| &item.video_id).collect();

    let additions = desired
        .iter()
        .filter(|video_id| !applied.contains(video_id))
        .cloned()
        .collect();

    let mut removals = Vec::new();
    let mut seen = HashSet::new();
    for item in snapshot {
        if !desired_set.contains(&item.video_id) && seen.insert(&item.video_id) {
            removals.push(item.video_id.clone());
        }
    }

    EditScript {
        additions,
        removals,
    }
}
