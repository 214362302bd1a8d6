use rusqlite::{OptionalExtension, params};

use crate::{
    config,
    domain::{
        track::{Track, TrackId},
        video::VideoId,
    },
    storage::{
        db::{self, SecondsSinceUnix, now_seconds},
        error::StoreError,
        schema::{columns, tables},
    },
};

use columns::*;
use tables::*;

/// Durable association between one source track and one target video.
/// At most one per track; re-matching overwrites, never appends.
#[derive(Debug, Clone)]
pub struct Match {
    pub track_id: TrackId,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub video_id: VideoId,
    pub confirmed: bool,
    pub created_at: SecondsSinceUnix,
    pub updated_at: SecondsSinceUnix,
}

/// Pairing of a source playlist with its target counterpart, plus the
/// membership snapshot from the last fully applied sync.
#[derive(Debug, Clone)]
pub struct PlaylistLink {
    pub source_playlist_id: String,
    pub target_playlist_id: String,
    pub title: String,
    pub snapshot: Vec<SnapshotItem>,
}

/// One applied entry of a target playlist. The video id is recorded at
/// apply time: the Match row only keeps the latest decision, so this is
/// the sole place the previously applied video survives a re-match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotItem {
    pub track_id: TrackId,
    pub video_id: VideoId,
}

/// Main structure that implements all match persistence logic
pub struct MatchStore {
    pub(crate) db: rusqlite::Connection,
}

impl MatchStore {
    /// when called, opens a data base connection
    pub fn new(db_config: &config::Database) -> Result<Self, StoreError> {
        let db = db::open(db_config)?;
        Ok(Self::from_existing_conn(db))
    }

    pub fn from_existing_conn(db: rusqlite::Connection) -> Self {
        Self { db }
    }

    pub fn get(&self, track_id: &TrackId) -> Result<Option<Match>, StoreError> {
        self.db
            .query_row(
                &format!(
                    "SELECT {TRACK_ID}, {TITLE}, {ARTIST}, {ALBUM}, {VIDEO_ID}, {CONFIRMED}, {CREATED_AT}, {UPDATED_AT}
                     FROM {MATCHES} WHERE {TRACK_ID} = ?1"
                ),
                params![track_id.as_str()],
                row_to_match,
            )
            .optional()
            .map_err(StoreError::Database)
    }

    /// Stores the association for a track, overwriting any prior one.
    ///
    /// A single upsert statement: a crash can only observe the old row or
    /// the new row, never a half-written mix.
    pub fn put(
        &mut self,
        track: &Track,
        video_id: &VideoId,
        confirmed: bool,
    ) -> Result<Match, StoreError> {
        let now = now_seconds().map_err(StoreError::Internal)?;

        self.db.execute(
            &format!(
                "INSERT INTO {MATCHES}
                     ({TRACK_ID}, {TITLE}, {ARTIST}, {ALBUM}, {VIDEO_ID}, {CONFIRMED}, {CREATED_AT}, {UPDATED_AT})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                 ON CONFLICT({TRACK_ID}) DO UPDATE SET
                     {TITLE} = excluded.{TITLE},
                     {ARTIST} = excluded.{ARTIST},
                     {ALBUM} = excluded.{ALBUM},
                     {VIDEO_ID} = excluded.{VIDEO_ID},
                     {CONFIRMED} = excluded.{CONFIRMED},
                     {UPDATED_AT} = excluded.{UPDATED_AT}"
            ),
            params![
                track.id.as_str(),
                track.title,
                track.artist,
                track.album,
                video_id.as_str(),
                confirmed,
                now
            ],
        )?;

        self.get(&track.id)?
            .ok_or_else(|| StoreError::TrackNotFound(track.id.clone()))
    }

    /// Explicit operator override: repoint an already known track at the
    /// given video, confirmed. Fails for tracks the store has never seen.
    pub fn re_match(
        &mut self,
        track_id: &TrackId,
        video_id: &VideoId,
    ) -> Result<Match, StoreError> {
        let now = now_seconds().map_err(StoreError::Internal)?;

        let updated = self.db.execute(
            &format!(
                "UPDATE {MATCHES} SET {VIDEO_ID} = ?2, {CONFIRMED} = 1, {UPDATED_AT} = ?3
                 WHERE {TRACK_ID} = ?1"
            ),
            params![track_id.as_str(), video_id.as_str(), now],
        )?;

        if updated == 0 {
            return Err(StoreError::TrackNotFound(track_id.clone()));
        }

        self.get(track_id)?
            .ok_or_else(|| StoreError::TrackNotFound(track_id.clone()))
    }

    pub fn link(&self, source_playlist_id: &str) -> Result<Option<PlaylistLink>, StoreError> {
        let link = self
            .db
            .query_row(
                &format!(
                    "SELECT {SOURCE_PLAYLIST_ID}, {TARGET_PLAYLIST_ID}, {TITLE}
                     FROM {PLAYLIST_LINKS} WHERE {SOURCE_PLAYLIST_ID} = ?1"
                ),
                params![source_playlist_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        match link {
            Some((source_playlist_id, target_playlist_id, title)) => {
                let snapshot = self.snapshot(&target_playlist_id)?;
                Ok(Some(PlaylistLink {
                    source_playlist_id,
                    target_playlist_id,
                    title,
                    snapshot,
                }))
            }
            None => Ok(None),
        }
    }

    pub fn create_link(
        &mut self,
        source_playlist_id: &str,
        target_playlist_id: &str,
        title: &str,
    ) -> Result<PlaylistLink, StoreError> {
        self.db.execute(
            &format!(
                "INSERT INTO {PLAYLIST_LINKS} ({SOURCE_PLAYLIST_ID}, {TARGET_PLAYLIST_ID}, {TITLE})
                 VALUES (?1, ?2, ?3)"
            ),
            params![source_playlist_id, target_playlist_id, title],
        )?;

        Ok(PlaylistLink {
            source_playlist_id: source_playlist_id.to_string(),
            target_playlist_id: target_playlist_id.to_string(),
            title: title.to_string(),
            snapshot: Vec::new(),
        })
    }

    pub fn links(&self) -> Result<Vec<PlaylistLink>, StoreError> {
        let mut stmt = self.db.prepare(&format!(
            "SELECT {SOURCE_PLAYLIST_ID}, {TARGET_PLAYLIST_ID}, {TITLE}
             FROM {PLAYLIST_LINKS} ORDER BY {TITLE}"
        ))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        rows.into_iter()
            .map(|(source_playlist_id, target_playlist_id, title)| {
                let snapshot = self.snapshot(&target_playlist_id)?;
                Ok(PlaylistLink {
                    source_playlist_id,
                    target_playlist_id,
                    title,
                    snapshot,
                })
            })
            .collect()
    }

    /// Replaces the membership snapshot of a target playlist in one
    /// transaction, so a crash leaves the previous snapshot intact.
    pub fn save_snapshot(
        &mut self,
        target_playlist_id: &str,
        items: &[SnapshotItem],
    ) -> Result<(), StoreError> {
        let tx = self.db.transaction()?;

        tx.execute(
            &format!("DELETE FROM {SNAPSHOT_ITEMS} WHERE {TARGET_PLAYLIST_ID} = ?1"),
            params![target_playlist_id],
        )?;

        for (position, item) in items.iter().enumerate() {
            tx.execute(
                &format!(
                    "INSERT INTO {SNAPSHOT_ITEMS} ({TARGET_PLAYLIST_ID}, {POSITION}, {TRACK_ID}, {VIDEO_ID})
                     VALUES (?1, ?2, ?3, ?4)"
                ),
                params![
                    target_playlist_id,
                    position as i64,
                    item.track_id.as_str(),
                    item.video_id.as_str()
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn snapshot(&self, target_playlist_id: &str) -> Result<Vec<SnapshotItem>, StoreError> {
        let mut stmt = self.db.prepare(&format!(
            "SELECT {TRACK_ID}, {VIDEO_ID} FROM {SNAPSHOT_ITEMS}
             WHERE {TARGET_PLAYLIST_ID} = ?1 ORDER BY {POSITION}"
        ))?;

        let items = stmt
            .query_map(params![target_playlist_id], |row| {
                Ok(SnapshotItem {
                    track_id: TrackId::new(row.get::<_, String>(0)?),
                    video_id: VideoId::new(row.get::<_, String>(1)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    /// Matches of a target playlist's snapshot, in applied order.
    pub fn list_for_playlist(&self, target_playlist_id: &str) -> Result<Vec<Match>, StoreError> {
        let mut stmt = self.db.prepare(&format!(
            "SELECT m.{TRACK_ID}, m.{TITLE}, m.{ARTIST}, m.{ALBUM}, m.{VIDEO_ID}, m.{CONFIRMED}, m.{CREATED_AT}, m.{UPDATED_AT}
             FROM {SNAPSHOT_ITEMS} s
             JOIN {MATCHES} m ON m.{TRACK_ID} = s.{TRACK_ID}
             WHERE s.{TARGET_PLAYLIST_ID} = ?1
             ORDER BY s.{POSITION}"
        ))?;

        let matches = stmt
            .query_map(params![target_playlist_id], row_to_match)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(matches)
    }

    pub fn list_matches(&self) -> Result<Vec<Match>, StoreError> {
        let mut stmt = self.db.prepare(&format!(
            "SELECT {TRACK_ID}, {TITLE}, {ARTIST}, {ALBUM}, {VIDEO_ID}, {CONFIRMED}, {CREATED_AT}, {UPDATED_AT}
             FROM {MATCHES} ORDER BY {ARTIST}, {TITLE}"
        ))?;

        let matches = stmt
            .query_map([], row_to_match)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(matches)
    }
}

fn row_to_match(row: &rusqlite::Row) -> rusqlite::Result<Match> {
    Ok(Match {
        track_id: TrackId::new(row.get::<_, String>(0)?),
        title: row.get(1)?,
        artist: row.get(2)?,
        album: row.get(3)?,
        video_id: VideoId::new(row.get::<_, String>(4)?),
        confirmed: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
