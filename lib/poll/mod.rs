//! The poller (§6, Component G): periodically asks the distribution
//! endpoint for the latest archive id, compares it against the cached
//! one, and on a change fetches + unzips the archive and feeds it to a
//! [`Snapshot`] rebuild.
//!
//! Grounded in `filter/mod.rs`'s download-then-import loop and
//! `schedule/mod.rs`'s scheduler, adapted from a list of static filter
//! URLs to a single upstream archive endpoint.

use std::{
    io::{Cursor, Read},
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::{config::Config, snapshot::Snapshot};

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("request error: {0}")]
    Request(Box<ureq::Error>),
    #[error("upstream returned {0}: {1}")]
    Upstream(u16, String),
    #[error("malformed archive metadata: {0}")]
    Metadata(String),
    #[error("malformed archive: {0}")]
    Archive(String),
    #[error("rebuild failed: {0}")]
    Rebuild(#[from] crate::merge::XmlError),
}

impl From<ureq::Error> for Error {
    fn from(value: ureq::Error) -> Self {
        Error::Request(Box::new(value))
    }
}

/// The cached `/current` metadata: the last fetched archive's id, CRC,
/// size, and the update times it carried.
#[cfg_attr(any(debug_assertions, test), derive(Debug))]
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchiveMeta {
    pub id: u64,
    pub crc: u32,
    pub size: u64,
    pub update_time: i64,
    pub update_time_urgently: String,
}

/// `GET {url}/last?ts=<unix>`, bearer-token authenticated.
#[instrument(level = "info", skip(key), err)]
pub fn get_last_dump_id(url: &str, key: &str, now: i64) -> Result<ArchiveMeta, Error> {
    let response = ureq::get(&format!("{url}/last?ts={now}"))
        .set("Authorization", &format!("Bearer {key}"))
        .call()?;

    if response.status() != 200 {
        let status = response.status();
        return Err(Error::Upstream(status, response.into_string().unwrap_or_default()));
    }

    response
        .into_json::<ArchiveMeta>()
        .map_err(|err| Error::Metadata(err.to_string()))
}

/// `GET {url}/get/<id>`, bearer-token authenticated. Returns the raw
/// `dump.zip` bytes.
#[instrument(level = "info", skip(key), err)]
pub fn fetch_dump(url: &str, key: &str, id: u64) -> Result<Vec<u8>, Error> {
    let response = ureq::get(&format!("{url}/get/{id}"))
        .set("Authorization", &format!("Bearer {key}"))
        .call()?;

    if response.status() != 200 {
        let status = response.status();
        return Err(Error::Upstream(status, response.into_string().unwrap_or_default()));
    }

    let mut buf = Vec::new();
    response.into_reader().read_to_end(&mut buf)?;
    Ok(buf)
}

/// Extract the single `dump.xml` member from a `dump.zip` archive.
pub fn dump_unzip(zip_bytes: &[u8]) -> Result<Vec<u8>, Error> {
    let mut archive = zip::ZipArchive::new(Cursor::new(zip_bytes))
        .map_err(|err| Error::Archive(err.to_string()))?;

    if archive.len() != 1 {
        return Err(Error::Archive(format!("expected exactly one archive member, found {}", archive.len())));
    }

    let mut member = archive.by_index(0).map_err(|err| Error::Archive(err.to_string()))?;
    let mut contents = Vec::with_capacity(member.size() as usize);
    member.read_to_end(&mut contents)?;
    Ok(contents)
}

pub fn read_current_dump_id(cache_dir: &Path) -> Option<ArchiveMeta> {
    let contents = std::fs::read_to_string(cache_dir.join("current")).ok()?;
    serde_json::from_str(&contents).ok()
}

pub fn write_current_dump_id(cache_dir: &Path, meta: &ArchiveMeta) -> std::io::Result<()> {
    std::fs::create_dir_all(cache_dir)?;
    std::fs::write(cache_dir.join("current"), serde_json::to_string(meta).unwrap_or_default())
}

pub struct Poller {
    snapshot: std::sync::Arc<Snapshot>,
    cache_dir: PathBuf,
    current: Option<ArchiveMeta>,
}

impl Poller {
    pub fn new(snapshot: std::sync::Arc<Snapshot>, cache_dir: PathBuf) -> Self {
        let current = read_current_dump_id(&cache_dir);
        Self { snapshot, cache_dir, current }
    }

    /// Run the periodic refresh loop until cancelled. Every failed poll
    /// cycle is logged and skipped; the previous snapshot and cached
    /// archive id are retained.
    pub async fn run(mut self) {
        loop {
            let (url, key, interval) = tokio::join!(
                Config::get(|c| c.upstream.url.clone()),
                Config::get(|c| c.upstream.key.clone()),
                Config::get(|c| c.poll_interval_secs),
            );

            if let Err(err) = self.poll_once(&url, &key).await {
                error!("poll cycle failed: {err}");
            }

            tokio::time::sleep(Duration::from_secs(interval)).await;
        }
    }

    #[instrument(level = "info", skip(self, url, key), err)]
    async fn poll_once(&mut self, url: &str, key: &str) -> Result<(), Error> {
        let url = url.to_string();
        let key = key.to_string();

        let last = {
            let url = url.clone();
            let key = key.clone();
            tokio::task::spawn_blocking(move || get_last_dump_id(&url, &key, unix_now()))
                .await
                .map_err(|err| Error::Metadata(err.to_string()))??
        };

        if self.current.as_ref().is_some_and(|cur| cur.id == last.id && cur.crc == last.crc) {
            return Ok(());
        }

        info!(id = last.id, crc = last.crc, "fetching changed archive");

        let archive = {
            let url = url.clone();
            let key = key.clone();
            let id = last.id;
            tokio::task::spawn_blocking(move || fetch_dump(&url, &key, id))
                .await
                .map_err(|err| Error::Metadata(err.to_string()))??
        };

        let dump_xml = {
            let archive = archive.clone();
            tokio::task::spawn_blocking(move || dump_unzip(&archive))
                .await
                .map_err(|err| Error::Metadata(err.to_string()))??
        };

        std::fs::create_dir_all(&self.cache_dir)?;
        std::fs::write(self.cache_dir.join("dump.zip"), &archive)?;
        std::fs::write(self.cache_dir.join("dump.xml"), &dump_xml)?;

        let summary = self.snapshot.apply_dump(Cursor::new(dump_xml))?;
        crate::metrics::observe_rebuild(&summary);

        info!(
            seen = summary.added + summary.updated,
            added = summary.added,
            updated = summary.updated,
            removed = summary.removed,
            record_count = summary.record_count,
            largest_index = summary.largest_index_name,
            largest_index_key = summary.largest_index_key.as_deref(),
            "rebuild complete"
        );

        write_current_dump_id(&self.cache_dir, &last)?;
        self.current = Some(last);

        Ok(())
    }
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
