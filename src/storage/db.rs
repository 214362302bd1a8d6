use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Local};
use rusqlite::Connection;

use crate::{
    config::Database,
    storage::{error::StoreError, schema},
};

pub type SecondsSinceUnix = i64;

pub fn open(config: &Database) -> Result<Connection, StoreError> {
    let db = if config.in_memory {
        Connection::open_in_memory()?
    } else {
        let path = config
            .path
            .as_ref()
            .ok_or_else(|| anyhow!("database.path is required unless in_memory = true"))
            .map_err(StoreError::Internal)?;
        Connection::open(path)?
    };
    schema::init(&db)?;
    Ok(db)
}

/// converts time to number of seconds since unix_epoch
pub fn system_time_to_i64(time: SystemTime) -> anyhow::Result<SecondsSinceUnix> {
    i64::try_from(
        time.duration_since(UNIX_EPOCH)
            .with_context(|| "failed to get unix timestamp")?
            .as_secs(),
    )
    .with_context(|| "failed to get timestamp in seconds")
}

pub fn now_seconds() -> anyhow::Result<SecondsSinceUnix> {
    system_time_to_i64(SystemTime::now())
}

/// converts number of seconds since unix epoch local time to local date time
pub fn i64_seconds_to_local_time(since_unix: i64) -> anyhow::Result<DateTime<Local>> {
    let datetime = DateTime::from_timestamp_secs(since_unix).ok_or(anyhow!(
        "failed to convert {since_unix} s timestamp to datetime"
    ))?;

    Ok(DateTime::from(datetime))
}
