// src/cache/store.rs

//! Storage backends for cache entries.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, Dependency, Fingerprint};

/// Relative path (from the project root) to the on-disk cache.
pub const CACHE_FILE_PATH: &str = ".assetflow/cache";

/// Format version written to the cache file; any other version discards it.
const CACHE_VERSION: u32 = 1;

type Key = (String, PathBuf);

/// Abstract storage for cache entries keyed by (task, source path).
pub trait CacheStore: Send {
    fn load(&self, task: &str, path: &Path) -> Option<CacheEntry>;
    fn save(&mut self, task: &str, path: &Path, entry: CacheEntry);
    fn remove(&mut self, task: &str, path: &Path);
    /// Source paths currently recorded for `task`.
    fn paths_for(&self, task: &str) -> Vec<PathBuf>;
    /// Drop every entry.
    fn clear_all(&mut self) -> Result<()>;
    /// Remove entries for tasks that are not in `active_tasks`.
    fn prune(&mut self, active_tasks: &[&str]);
    /// Persist pending changes, if the backend persists at all.
    fn flush(&mut self) -> Result<()>;
}

/// Stores entries in memory only.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    map: BTreeMap<Key, CacheEntry>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl CacheStore for MemoryCacheStore {
    fn load(&self, task: &str, path: &Path) -> Option<CacheEntry> {
        self.map.get(&(task.to_string(), path.to_path_buf())).cloned()
    }

    fn save(&mut self, task: &str, path: &Path, entry: CacheEntry) {
        self.map.insert((task.to_string(), path.to_path_buf()), entry);
    }

    fn remove(&mut self, task: &str, path: &Path) {
        self.map.remove(&(task.to_string(), path.to_path_buf()));
    }

    fn paths_for(&self, task: &str) -> Vec<PathBuf> {
        self.map
            .keys()
            .filter(|(t, _)| t == task)
            .map(|(_, p)| p.clone())
            .collect()
    }

    fn clear_all(&mut self) -> Result<()> {
        self.map.clear();
        Ok(())
    }

    fn prune(&mut self, active_tasks: &[&str]) {
        let initial_len = self.map.len();
        self.map.retain(|(t, _), _| active_tasks.contains(&t.as_str()));
        if self.map.len() < initial_len {
            info!(
                removed = initial_len - self.map.len(),
                "pruned cache entries of removed tasks"
            );
        }
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Stores entries in `<root>/.assetflow/cache`.
///
/// Entries are held in memory and written back on [`CacheStore::flush`]
/// (temp file + rename, so a crash never leaves a half-written cache).
#[derive(Debug)]
pub struct FileCacheStore {
    file: PathBuf,
    inner: MemoryCacheStore,
    dirty: bool,
}

impl FileCacheStore {
    /// Open the cache under `root`, loading existing entries.
    ///
    /// A missing file gives an empty cache; so does an unreadable or foreign
    /// one, after a warning.
    pub fn open(root: &Path) -> Self {
        let file = root.join(CACHE_FILE_PATH);
        let inner = match load_entries(&file) {
            Ok(inner) => inner,
            Err(e) => {
                warn!(file = ?file, error = %format!("{e:#}"), "unreadable cache file; starting with an empty cache");
                MemoryCacheStore::new()
            }
        };
        debug!(entries = inner.len(), file = ?file, "loaded cache");
        Self {
            file,
            inner,
            dirty: false,
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }
}

impl CacheStore for FileCacheStore {
    fn load(&self, task: &str, path: &Path) -> Option<CacheEntry> {
        self.inner.load(task, path)
    }

    fn save(&mut self, task: &str, path: &Path, entry: CacheEntry) {
        if self.inner.load(task, path).as_ref() != Some(&entry) {
            self.inner.save(task, path, entry);
            self.dirty = true;
        }
    }

    fn remove(&mut self, task: &str, path: &Path) {
        if self.inner.load(task, path).is_some() {
            self.inner.remove(task, path);
            self.dirty = true;
        }
    }

    fn paths_for(&self, task: &str) -> Vec<PathBuf> {
        self.inner.paths_for(task)
    }

    fn clear_all(&mut self) -> Result<()> {
        self.inner.clear_all()?;
        self.dirty = false;
        match fs::remove_file(&self.file) {
            Ok(()) => {
                info!(file = ?self.file, "removed cache file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing cache file {:?}", self.file)),
        }
    }

    fn prune(&mut self, active_tasks: &[&str]) {
        let before = self.inner.len();
        self.inner.prune(active_tasks);
        if self.inner.len() != before {
            self.dirty = true;
        }
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        save_entries(&self.file, &self.inner)?;
        self.dirty = false;
        Ok(())
    }
}

/// On-disk layout of `.assetflow/cache`.
#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    #[serde(default, rename = "entry")]
    entries: Vec<EntryRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryRecord {
    task: String,
    source: PathBuf,
    content: String,
    config: String,
    output: PathBuf,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    includes: Vec<IncludeRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IncludeRecord {
    path: PathBuf,
    hash: String,
}

impl EntryRecord {
    fn new(task: &str, source: &Path, entry: &CacheEntry) -> Self {
        Self {
            task: task.to_string(),
            source: source.to_path_buf(),
            content: entry.fingerprint.content.clone(),
            config: entry.fingerprint.config.clone(),
            output: entry.output.clone(),
            includes: entry
                .includes
                .iter()
                .map(|dep| IncludeRecord {
                    path: dep.path.clone(),
                    hash: dep.hash.clone(),
                })
                .collect(),
        }
    }

    fn into_entry(self) -> (String, PathBuf, CacheEntry) {
        let entry = CacheEntry {
            fingerprint: Fingerprint {
                content: self.content,
                config: self.config,
            },
            output: self.output,
            includes: self
                .includes
                .into_iter()
                .map(|inc| Dependency {
                    path: inc.path,
                    hash: inc.hash,
                })
                .collect(),
        };
        (self.task, self.source, entry)
    }
}

fn load_entries(file: &Path) -> Result<MemoryCacheStore> {
    let mut store = MemoryCacheStore::new();
    let text = match fs::read_to_string(file) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(store),
        Err(e) => return Err(e).with_context(|| format!("reading cache file at {:?}", file)),
    };

    let parsed: CacheFile =
        toml::from_str(&text).with_context(|| format!("parsing cache file at {:?}", file))?;
    if parsed.version != CACHE_VERSION {
        warn!(
            file = ?file,
            found = parsed.version,
            expected = CACHE_VERSION,
            "cache file version mismatch; starting with an empty cache"
        );
        return Ok(store);
    }

    for record in parsed.entries {
        let (task, source, entry) = record.into_entry();
        store.save(&task, &source, entry);
    }
    Ok(store)
}

fn save_entries(file: &Path, store: &MemoryCacheStore) -> Result<()> {
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating cache directory at {:?}", parent))?;
    }

    let contents = CacheFile {
        version: CACHE_VERSION,
        entries: store
            .map
            .iter()
            .map(|((task, source), entry)| EntryRecord::new(task, source, entry))
            .collect(),
    };
    let text = toml::to_string(&contents).context("serializing cache entries")?;

    let tmp = file.with_extension("tmp");
    fs::write(&tmp, text).with_context(|| format!("writing cache file at {:?}", tmp))?;
    fs::rename(&tmp, file).with_context(|| format!("replacing cache file {:?}", file))?;
    debug!(entries = store.len(), file = ?file, "persisted cache");
    Ok(())
}
