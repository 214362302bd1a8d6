//! End-to-end reconciliation of configured playlist pairs: resolve
//! matches, diff against the last applied snapshot, mutate the target
//! playlist, persist the new snapshot only on full success.

use std::collections::HashSet;

use crate::{
    config::SyncConfig,
    diff::{self, EditScript},
    domain::{track::TrackId, video::VideoId},
    platform::{
        CandidateSearch, ChooseCandidate, PlatformError, SourcePlaylist, SourcePlaylists,
        TargetPlaylists,
    },
    resolve::{Resolution, Resolver, SkipReason},
    storage::{
        error::StoreError,
        operations::{MatchStore, PlaylistLink, SnapshotItem},
    },
};

/// Per-playlist outcome of one run.
#[derive(Debug, Default)]
pub struct PlaylistReport {
    pub title: String,
    pub matched: usize,
    pub skipped: usize,
    pub failed: usize,
    pub added: usize,
    pub removed: usize,
    /// false when the edit script did not land in full; the snapshot is
    /// then left at its previous value and the next run recomputes.
    pub applied: bool,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub playlists: Vec<PlaylistReport>,
}

pub struct Orchestrator<'a> {
    store: &'a mut MatchStore,
    source: &'a dyn SourcePlaylists,
    target: &'a dyn TargetPlaylists,
    search: &'a dyn CandidateSearch,
    chooser: &'a dyn ChooseCandidate,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        store: &'a mut MatchStore,
        source: &'a dyn SourcePlaylists,
        target: &'a dyn TargetPlaylists,
        search: &'a dyn CandidateSearch,
        chooser: &'a dyn ChooseCandidate,
    ) -> Self {
        Self {
            store,
            source,
            target,
            search,
            chooser,
        }
    }

    /// Source playlists selected by the sync config. An empty `playlists`
    /// list means every audio playlist not explicitly excluded.
    fn configured_playlists(
        &self,
        cfg: &SyncConfig,
    ) -> Result<Vec<SourcePlaylist>, PlatformError> {
        let mut playlists = self.source.list_playlists()?;
        playlists.retain(|p| !cfg.excluded.contains(&p.title));
        if !cfg.playlists.is_empty() {
            playlists.retain(|p| cfg.playlists.contains(&p.title));
        }
        Ok(playlists)
    }

    /// The `match` command: resolve every configured track. Touches only
    /// the local store, never the target platform.
    pub fn match_all(
        &mut self,
        cfg: &SyncConfig,
        update_only: bool,
    ) -> Result<RunReport, StoreError> {
        let playlists = match self.configured_playlists(cfg) {
            Ok(playlists) => playlists,
            Err(e) => {
                log::error!("failed to list source playlists: {e}");
                return Ok(RunReport::default());
            }
        };

        let mut report = RunReport::default();
        for playlist in playlists {
            let mut pr = PlaylistReport {
                title: playlist.title.clone(),
                ..Default::default()
            };

            let tracks = match self.source.list_playlist_tracks(&playlist.id) {
                Ok(tracks) => tracks,
                Err(e) => {
                    log::warn!("skipping playlist '{}': {e}", playlist.title);
                    report.playlists.push(pr);
                    continue;
                }
            };

            let mut resolver =
                Resolver::new(&mut *self.store, self.search, self.chooser, update_only);
            for track in &tracks {
                match resolver.resolve(track)? {
                    Resolution::Skipped(SkipReason::SearchUnavailable(_)) => pr.failed += 1,
                    Resolution::Skipped(_) => pr.skipped += 1,
                    _ => pr.matched += 1,
                }
            }
            report.playlists.push(pr);
        }
        Ok(report)
    }

    /// The `sync` command. One playlist's failure never blocks the next;
    /// only store failures abort the run.
    pub fn sync_all(&mut self, cfg: &SyncConfig) -> Result<RunReport, StoreError> {
        let playlists = match self.configured_playlists(cfg) {
            Ok(playlists) => playlists,
            Err(e) => {
                log::error!("failed to list source playlists: {e}");
                return Ok(RunReport::default());
            }
        };

        let mut report = RunReport::default();
        for playlist in playlists {
            let pr = self.sync_playlist(&playlist)?;
            report.playlists.push(pr);
        }
        Ok(report)
    }

    fn sync_playlist(&mut self, playlist: &SourcePlaylist) -> Result<PlaylistReport, StoreError> {
        let mut pr = PlaylistReport {
            title: playlist.title.clone(),
            ..Default::default()
        };

        let tracks = match self.source.list_playlist_tracks(&playlist.id) {
            Ok(tracks) => tracks,
            Err(e) => {
                log::warn!("skipping playlist '{}': {e}", playlist.title);
                return Ok(pr);
            }
        };

        let mut current: Vec<(TrackId, Option<VideoId>)> = Vec::with_capacity(tracks.len());
        {
            let mut resolver = Resolver::new(&mut *self.store, self.search, self.chooser, false);
            for track in &tracks {
                let resolution = resolver.resolve(track)?;
                match &resolution {
                    Resolution::Skipped(SkipReason::SearchUnavailable(_)) => pr.failed += 1,
                    Resolution::Skipped(_) => pr.skipped += 1,
                    _ => pr.matched += 1,
                }
                current.push((track.id.clone(), resolution.video_id().cloned()));
            }
        }

        let link = match self.ensure_link(playlist)? {
            Some(link) => link,
            None => return Ok(pr),
        };

        let script = diff::diff(&current, &link.snapshot);
        pr.added = script.additions.len();
        pr.removed = script.removals.len();

        if let Err(e) = self.apply(&link.target_playlist_id, &script) {
            log::warn!(
                "sync of '{}' failed mid-apply, keeping previous snapshot: {e}",
                playlist.title
            );
            return Ok(pr);
        }

        let items: Vec<SnapshotItem> = current
            .iter()
            .filter_map(|(track_id, video_id)| {
                video_id.as_ref().map(|video_id| SnapshotItem {
                    track_id: track_id.clone(),
                    video_id: video_id.clone(),
                })
            })
            .collect();
        self.store.save_snapshot(&link.target_playlist_id, &items)?;

        pr.applied = true;
        Ok(pr)
    }

    /// Looks up the playlist pairing, creating the target playlist on the
    /// first sync of a source playlist.
    fn ensure_link(&mut self, playlist: &SourcePlaylist) -> Result<Option<PlaylistLink>, StoreError> {
        if let Some(link) = self.store.link(&playlist.id)? {
            return Ok(Some(link));
        }

        match self.target.create_playlist(&playlist.title) {
            Ok(target_playlist_id) => {
                let link =
                    self.store
                        .create_link(&playlist.id, &target_playlist_id, &playlist.title)?;
                log::info!(
                    "created target playlist {} for '{}'",
                    link.target_playlist_id,
                    playlist.title
                );
                Ok(Some(link))
            }
            Err(e) => {
                log::warn!(
                    "could not create target playlist for '{}': {e}",
                    playlist.title
                );
                Ok(None)
            }
        }
    }

    fn apply(&self, target_playlist_id: &str, script: &EditScript) -> Result<(), PlatformError> {
        for video_id in &script.additions {
            self.target.add_item(target_playlist_id, video_id)?;
        }
        for video_id in &script.removals {
            self.target.remove_item(target_playlist_id, video_id)?;
        }
        Ok(())
    }
}

/// Entry of the read-only audit: a stored match whose video no longer
/// appears in the live target playlist.
#[derive(Debug)]
pub struct AuditEntry {
    pub playlist_title: String,
    pub track_id: TrackId,
    pub track_title: String,
    pub artist: String,
    pub video_id: VideoId,
}

/// The `check-tracks` command. Mutates nothing.
pub fn check_tracks(
    store: &MatchStore,
    target: &dyn TargetPlaylists,
) -> Result<Vec<AuditEntry>, StoreError> {
    let mut entries = Vec::new();

    for link in store.links()? {
        let live: HashSet<VideoId> = match target.list_playlist_items(&link.target_playlist_id) {
            Ok(items) => items.into_iter().collect(),
            Err(e) => {
                log::warn!("cannot audit '{}': {e}", link.title);
                continue;
            }
        };

        for matched in store.list_for_playlist(&link.target_playlist_id)? {
            if !live.contains(&matched.video_id) {
                entries.push(AuditEntry {
                    playlist_title: link.title.clone(),
                    track_id: matched.track_id,
                    track_title: matched.title,
                    artist: matched.artist,
                    video_id: matched.video_id,
                });
            }
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use std::{
        cell::{Cell, RefCell},
        collections::{HashMap, HashSet},
    };

    use rusqlite::Connection;

    use super::*;
    use crate::{
        domain::{track::Track, video::VideoCandidate},
        platform::SearchError,
        storage::schema,
    };

    fn track(id: &str, artist: &str, title: &str) -> Track {
        Track {
            id: TrackId::new(id),
            title: title.to_string(),
            artist: artist.to_string(),
            album: None,
            duration: None,
        }
    }

    fn vid(s: &str) -> VideoId {
        VideoId::new(s)
    }

    fn setup_store() -> MatchStore {
        let conn = Connection::open_in_memory().unwrap();
        schema::init(&conn).unwrap();
        MatchStore::from_existing_conn(conn)
    }

    struct FakeSource {
        playlists: Vec<SourcePlaylist>,
        tracks: HashMap<String, Vec<Track>>,
        broken: HashSet<String>,
    }

    impl FakeSource {
        fn single(playlist_id: &str, title: &str, tracks: Vec<Track>) -> Self {
            Self {
                playlists: vec![SourcePlaylist {
                    id: playlist_id.to_string(),
                    title: title.to_string(),
                }],
                tracks: HashMap::from([(playlist_id.to_string(), tracks)]),
                broken: HashSet::new(),
            }
        }
    }

    impl SourcePlaylists for FakeSource {
        fn list_playlists(&self) -> Result<Vec<SourcePlaylist>, PlatformError> {
            Ok(self.playlists.clone())
        }

        fn list_playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>, PlatformError> {
            if self.broken.contains(playlist_id) {
                return Err(PlatformError::Http("connection reset".into()));
            }
            Ok(self.tracks.get(playlist_id).cloned().unwrap_or_default())
        }
    }

    #[derive(Default)]
    struct FakeTarget {
        items: RefCell<HashMap<String, Vec<VideoId>>>,
        created: RefCell<Vec<String>>,
        adds: Cell<usize>,
        removes: Cell<usize>,
        /// error out once this many adds have gone through
        fail_adds_after: Cell<Option<usize>>,
    }

    impl TargetPlaylists for FakeTarget {
        fn create_playlist(&self, title: &str) -> Result<String, PlatformError> {
            let id = format!("yt-{}", self.created.borrow().len() + 1);
            self.created.borrow_mut().push(title.to_string());
            self.items.borrow_mut().insert(id.clone(), Vec::new());
            Ok(id)
        }

        fn add_item(&self, playlist_id: &str, video_id: &VideoId) -> Result<(), PlatformError> {
            if let Some(limit) = self.fail_adds_after.get() {
                if self.adds.get() >= limit {
                    return Err(PlatformError::RemoteMutation {
                        item_id: video_id.to_string(),
                        reason: "quota exceeded".into(),
                    });
                }
            }
            self.adds.set(self.adds.get() + 1);
            self.items
                .borrow_mut()
                .entry(playlist_id.to_string())
                .or_default()
                .push(video_id.clone());
            Ok(())
        }

        fn remove_item(&self, playlist_id: &str, video_id: &VideoId) -> Result<(), PlatformError> {
            self.removes.set(self.removes.get() + 1);
            if let Some(items) = self.items.borrow_mut().get_mut(playlist_id) {
                items.retain(|v| v != video_id);
            }
            Ok(())
        }

        fn list_playlist_items(&self, playlist_id: &str) -> Result<Vec<VideoId>, PlatformError> {
            Ok(self
                .items
                .borrow()
                .get(playlist_id)
                .cloned()
                .unwrap_or_default())
        }
    }

    struct FakeSearch {
        results: Vec<VideoCandidate>,
        calls: Cell<usize>,
    }

    impl FakeSearch {
        fn empty() -> Self {
            Self {
                results: Vec::new(),
                calls: Cell::new(0),
            }
        }
    }

    impl CandidateSearch for FakeSearch {
        fn search(&self, _track: &Track) -> Result<Vec<VideoCandidate>, SearchError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.results.clone())
        }
    }

    struct DecliningChooser;

    impl ChooseCandidate for DecliningChooser {
        fn choose(&self, _track: &Track, _candidates: &[VideoCandidate]) -> Option<VideoId> {
            None
        }
    }

    #[test]
    fn test_first_sync_creates_link_and_applies_additions() {
        let mut store = setup_store();
        let t1 = track("t1", "A", "One");
        let t2 = track("t2", "B", "Two");
        store.put(&t1, &vid("v1"), true).unwrap();
        store.put(&t2, &vid("v2"), true).unwrap();

        let source = FakeSource::single("p1", "Road Trip", vec![t1, t2]);
        let target = FakeTarget::default();
        let search = FakeSearch::empty();
        let chooser = DecliningChooser;

        let report = {
            let mut orch = Orchestrator::new(&mut store, &source, &target, &search, &chooser);
            orch.sync_all(&SyncConfig::default()).unwrap()
        };

        assert_eq!(report.playlists.len(), 1);
        let pr = &report.playlists[0];
        assert_eq!(pr.matched, 2);
        assert_eq!(pr.added, 2);
        assert_eq!(pr.removed, 0);
        assert!(pr.applied);

        assert_eq!(*target.created.borrow(), vec!["Road Trip".to_string()]);
        assert_eq!(
            target.items.borrow().get("yt-1").unwrap(),
            &vec![vid("v1"), vid("v2")]
        );

        let link = store.link("p1").unwrap().unwrap();
        assert_eq!(link.target_playlist_id, "yt-1");
        assert_eq!(link.snapshot.len(), 2);

        // confirmed matches were reused; the search adapter stayed idle
        assert_eq!(search.calls.get(), 0);
    }

    #[test]
    fn test_sync_twice_second_run_is_a_noop() {
        let mut store = setup_store();
        let t1 = track("t1", "A", "One");
        store.put(&t1, &vid("v1"), true).unwrap();

        let source = FakeSource::single("p1", "Road Trip", vec![t1]);
        let target = FakeTarget::default();
        let search = FakeSearch::empty();
        let chooser = DecliningChooser;

        let second = {
            let mut orch = Orchestrator::new(&mut store, &source, &target, &search, &chooser);
            orch.sync_all(&SyncConfig::default()).unwrap();
            orch.sync_all(&SyncConfig::default()).unwrap()
        };

        let pr = &second.playlists[0];
        assert_eq!(pr.added, 0);
        assert_eq!(pr.removed, 0);
        assert!(pr.applied);

        assert_eq!(target.adds.get(), 1);
        assert_eq!(target.removes.get(), 0);
    }

    #[test]
    fn test_failed_apply_keeps_previous_snapshot() {
        let mut store = setup_store();
        let t1 = track("t1", "A", "One");
        let t2 = track("t2", "B", "Two");
        store.put(&t1, &vid("v1"), true).unwrap();
        store.put(&t2, &vid("v2"), true).unwrap();
        store.create_link("p1", "yt-0", "Road Trip").unwrap();

        let source = FakeSource::single("p1", "Road Trip", vec![t1, t2]);
        let target = FakeTarget::default();
        target.fail_adds_after.set(Some(1));
        let search = FakeSearch::empty();
        let chooser = DecliningChooser;

        let report = {
            let mut orch = Orchestrator::new(&mut store, &source, &target, &search, &chooser);
            orch.sync_all(&SyncConfig::default()).unwrap()
        };

        assert!(!report.playlists[0].applied);
        assert!(store.link("p1").unwrap().unwrap().snapshot.is_empty());

        // the next run recomputes the full script from the last-good
        // snapshot and lands it
        target.fail_adds_after.set(None);
        let report = {
            let mut orch = Orchestrator::new(&mut store, &source, &target, &search, &chooser);
            orch.sync_all(&SyncConfig::default()).unwrap()
        };

        assert!(report.playlists[0].applied);
        assert_eq!(report.playlists[0].added, 2);
        assert_eq!(store.link("p1").unwrap().unwrap().snapshot.len(), 2);
    }

    #[test]
    fn test_re_match_swaps_video_on_next_sync() {
        let mut store = setup_store();
        let t1 = track("t1", "A", "One");
        store.put(&t1, &vid("v1"), true).unwrap();

        let source = FakeSource::single("p1", "Road Trip", vec![t1.clone()]);
        let target = FakeTarget::default();
        let search = FakeSearch::empty();
        let chooser = DecliningChooser;

        {
            let mut orch = Orchestrator::new(&mut store, &source, &target, &search, &chooser);
            orch.sync_all(&SyncConfig::default()).unwrap();
        }

        store.re_match(&t1.id, &vid("v2")).unwrap();

        let report = {
            let mut orch = Orchestrator::new(&mut store, &source, &target, &search, &chooser);
            orch.sync_all(&SyncConfig::default()).unwrap()
        };

        let pr = &report.playlists[0];
        assert_eq!(pr.added, 1);
        assert_eq!(pr.removed, 1);
        assert_eq!(target.items.borrow().get("yt-1").unwrap(), &vec![vid("v2")]);

        let link = store.link("p1").unwrap().unwrap();
        assert_eq!(link.snapshot[0].video_id, vid("v2"));
    }

    #[test]
    fn test_one_playlist_failure_does_not_block_the_next() {
        let mut store = setup_store();
        let t1 = track("t1", "A", "One");
        store.put(&t1, &vid("v1"), true).unwrap();

        let mut source = FakeSource::single("p1", "Broken", vec![]);
        source.playlists.push(SourcePlaylist {
            id: "p2".to_string(),
            title: "Fine".to_string(),
        });
        source.tracks.insert("p2".to_string(), vec![t1]);
        source.broken.insert("p1".to_string());

        let target = FakeTarget::default();
        let search = FakeSearch::empty();
        let chooser = DecliningChooser;

        let report = {
            let mut orch = Orchestrator::new(&mut store, &source, &target, &search, &chooser);
            orch.sync_all(&SyncConfig::default()).unwrap()
        };

        assert_eq!(report.playlists.len(), 2);
        assert!(!report.playlists[0].applied);
        assert!(report.playlists[1].applied);
        assert_eq!(report.playlists[1].added, 1);
    }

    #[test]
    fn test_unmatched_tracks_stay_absent_from_target() {
        let mut store = setup_store();
        let t1 = track("t1", "A", "One");
        let t2 = track("t2", "B", "Two");
        store.put(&t1, &vid("v1"), true).unwrap();
        // t2 has no match and the search finds nothing

        let source = FakeSource::single("p1", "Road Trip", vec![t1, t2]);
        let target = FakeTarget::default();
        let search = FakeSearch::empty();
        let chooser = DecliningChooser;

        let report = {
            let mut orch = Orchestrator::new(&mut store, &source, &target, &search, &chooser);
            orch.sync_all(&SyncConfig::default()).unwrap()
        };

        let pr = &report.playlists[0];
        assert_eq!(pr.matched, 1);
        assert_eq!(pr.skipped, 1);
        assert_eq!(target.items.borrow().get("yt-1").unwrap(), &vec![vid("v1")]);
        assert_eq!(store.link("p1").unwrap().unwrap().snapshot.len(), 1);
    }

    #[test]
    fn test_config_selects_and_excludes_playlists() {
        let mut store = setup_store();
        let t1 = track("t1", "A", "One");
        store.put(&t1, &vid("v1"), true).unwrap();

        let mut source = FakeSource::single("p1", "Wanted", vec![t1.clone()]);
        source.playlists.push(SourcePlaylist {
            id: "p2".to_string(),
            title: "Unwanted".to_string(),
        });
        source.tracks.insert("p2".to_string(), vec![t1]);

        let target = FakeTarget::default();
        let search = FakeSearch::empty();
        let chooser = DecliningChooser;

        let cfg = SyncConfig {
            playlists: vec!["Wanted".to_string()],
            excluded: vec![],
        };

        let report = {
            let mut orch = Orchestrator::new(&mut store, &source, &target, &search, &chooser);
            orch.sync_all(&cfg).unwrap()
        };

        assert_eq!(report.playlists.len(), 1);
        assert_eq!(report.playlists[0].title, "Wanted");
        assert_eq!(target.created.borrow().len(), 1);
    }

    #[test]
    fn test_match_all_resolves_without_touching_target() {
        let mut store = setup_store();
        let t1 = track("t1", "Daft Punk", "One More Time");

        let source = FakeSource::single("p1", "Road Trip", vec![t1.clone()]);
        let target = FakeTarget::default();
        let search = FakeSearch {
            results: vec![VideoCandidate {
                id: vid("v1"),
                title: "Daft Punk - One More Time".to_string(),
                channel: "x".to_string(),
                duration: None,
                rank: 0,
            }],
            calls: Cell::new(0),
        };
        let chooser = DecliningChooser;

        let report = {
            let mut orch = Orchestrator::new(&mut store, &source, &target, &search, &chooser);
            orch.match_all(&SyncConfig::default(), false).unwrap()
        };

        assert_eq!(report.playlists[0].matched, 1);
        assert_eq!(store.get(&t1.id).unwrap().unwrap().video_id, vid("v1"));

        assert!(target.created.borrow().is_empty());
        assert_eq!(target.adds.get(), 0);
    }

    #[test]
    fn test_check_tracks_reports_vanished_videos() {
        let mut store = setup_store();
        let t1 = track("t1", "A", "One");
        let t2 = track("t2", "B", "Two");
        store.put(&t1, &vid("v1"), true).unwrap();
        store.put(&t2, &vid("v2"), true).unwrap();
        store.create_link("p1", "yt-1", "Road Trip").unwrap();
        store
            .save_snapshot(
                "yt-1",
                &[
                    SnapshotItem {
                        track_id: t1.id.clone(),
                        video_id: vid("v1"),
                    },
                    SnapshotItem {
                        track_id: t2.id.clone(),
                        video_id: vid("v2"),
                    },
                ],
            )
            .unwrap();

        // v2 was taken down externally
        let target = FakeTarget::default();
        target
            .items
            .borrow_mut()
            .insert("yt-1".to_string(), vec![vid("v1")]);

        let entries = check_tracks(&store, &target).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].video_id, vid("v2"));
        assert_eq!(entries[0].track_title, "Two");
        assert_eq!(entries[0].playlist_title, "Road Trip");
    }
}
