//! Persistent dedup state, one JSON file per source.
//!
//! ```text
//! cache_dir/
//! ├── posts.json   { "lastCheck": "...", "seenIds": ["id_101", ...] }
//! └── news.json
//! ```
//!
//! The file is the only state that outlives a tick. It is re-read on every
//! operation, written atomically (temp file + rename), and every
//! read-modify-write runs under an async mutex, so two overlapping checks of
//! the same source cannot both deliver the same item.

use crate::models::{Item, SourceKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// What has been delivered for one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceState {
    pub last_check: Option<DateTime<Utc>>,
    #[serde(default)]
    pub seen_ids: BTreeSet<String>,
}

impl SourceState {
    /// Nothing has ever been recorded for this source.
    pub fn is_first_run(&self) -> bool {
        self.last_check.is_none() && self.seen_ids.is_empty()
    }
}

/// Result of [`DedupCache::diff`].
#[derive(Debug, Clone)]
pub struct Fresh {
    /// Unseen items in extractor order, capped on a first run.
    pub items: Vec<Item>,
    /// The source had no recorded state before this diff.
    pub first_run: bool,
}

#[derive(Debug)]
pub struct DedupCache {
    source: SourceKind,
    path: PathBuf,
    first_run_cap: usize,
    lock: Mutex<()>,
}

impl DedupCache {
    pub fn new(cache_dir: &Path, source: SourceKind, first_run_cap: usize) -> Self {
        Self {
            source,
            path: cache_dir.join(format!("{}.json", source.as_str())),
            first_run_cap,
            lock: Mutex::new(()),
        }
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current state. A missing, unreadable or corrupt file reads as the
    /// empty first-run state.
    pub async fn load(&self) -> SourceState {
        let _guard = self.lock.lock().await;
        self.read_state().await
    }

    #[cfg(test)]
    pub async fn save(&self, state: &SourceState) -> Result<(), CacheError> {
        let _guard = self.lock.lock().await;
        self.write_state(state).await
    }

    #[cfg(test)]
    pub async fn is_first_run(&self) -> bool {
        self.load().await.is_first_run()
    }

    /// Return the candidates not delivered before and record all of them.
    ///
    /// Every candidate identity is added to the seen set, including those
    /// held back by the first-run cap, so they are never delivered later.
    #[instrument(level = "info", skip_all, fields(source = %self.source, candidates = candidates.len()))]
    pub async fn diff(&self, candidates: Vec<Item>) -> Result<Fresh, CacheError> {
        let _guard = self.lock.lock().await;
        let mut state = self.read_state().await;
        let first_run = state.is_first_run();

        let mut batch = HashSet::new();
        let mut items: Vec<Item> = candidates
            .into_iter()
            .filter(|item| {
                let identity = item.identity();
                !state.seen_ids.contains(&identity) && batch.insert(identity)
            })
            .collect();
        state.seen_ids.extend(batch);

        if first_run && items.len() > self.first_run_cap {
            info!(
                found = items.len(),
                cap = self.first_run_cap,
                "First run; capping delivered items"
            );
            items.truncate(self.first_run_cap);
        }

        state.last_check = Some(Utc::now());
        self.write_state(&state).await?;
        debug!(new = items.len(), seen = state.seen_ids.len(), "Diff complete");
        Ok(Fresh { items, first_run })
    }

    /// Forget everything for this source. Returns whether a file existed.
    #[instrument(level = "info", skip_all, fields(source = %self.source))]
    pub async fn reset(&self) -> Result<bool, CacheError> {
        let _guard = self.lock.lock().await;
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(path = %self.path.display(), "Cache cleared");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No cache to clear");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn read_state(&self) -> SourceState {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return SourceState::default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Unreadable cache; treating as first run");
                return SourceState::default();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "Corrupt cache; treating as first run");
            SourceState::default()
        })
    }

    async fn write_state(&self, state: &SourceState) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
