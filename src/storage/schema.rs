use rusqlite::Connection;

pub mod tables {
    pub const MATCHES: &str = "matches";
    pub const PLAYLIST_LINKS: &str = "playlist_links";
    pub const SNAPSHOT_ITEMS: &str = "snapshot_items";

    pub const ALL_TABLES: &[&str] = &[MATCHES, PLAYLIST_LINKS, SNAPSHOT_ITEMS];
}

pub mod columns {
    pub const TRACK_ID: &str = "track_id";
    pub const TITLE: &str = "title";
    pub const ARTIST: &str = "artist";
    pub const ALBUM: &str = "album";
    pub const VIDEO_ID: &str = "video_id";
    pub const CONFIRMED: &str = "confirmed";
    pub const CREATED_AT: &str = "created_at";
    pub const UPDATED_AT: &str = "updated_at";

    pub const SOURCE_PLAYLIST_ID: &str = "source_playlist_id";
    pub const TARGET_PLAYLIST_ID: &str = "target_playlist_id";
    pub const POSITION: &str = "position";
}

pub use columns::*;
pub use tables::*;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS matches (
    track_id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    artist TEXT NOT NULL,
    album TEXT,
    video_id TEXT NOT NULL,
    confirmed INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS playlist_links (
    source_playlist_id TEXT PRIMARY KEY,
    target_playlist_id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS snapshot_items (
    target_playlist_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    track_id TEXT NOT NULL,
    video_id TEXT NOT NULL,
    PRIMARY KEY (target_playlist_id, position)
);
"#;

pub fn init(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA)
}
