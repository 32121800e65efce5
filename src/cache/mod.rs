// src/cache/mod.rs

//! Content-fingerprint cache gating which inputs re-enter a pipeline.
//!
//! Entries are keyed by (task, source path). A fingerprint has two halves:
//! the content hash (file bytes mixed with the pipeline configuration) and
//! the configuration hash on its own. An input is skipped only when both
//! halves match what was recorded, so entries never leak across pipeline
//! configurations.
//!
//! An entry also remembers every file pulled in by `include` directives
//! together with its content hash; a changed partial invalidates the entry
//! even though the including file itself is untouched.
//!
//! The cache is an optimisation only. With it disabled every input is
//! processed and the produced artifacts are identical.

pub mod hash;
pub mod store;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use tracing::debug;

use crate::types::CacheMode;
use hash::{hash_bytes, hash_parts};
pub use store::{CacheStore, FileCacheStore, MemoryCacheStore, CACHE_FILE_PATH};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    /// Hash over the file bytes and the configuration hash.
    pub content: String,
    /// Pipeline configuration hash.
    pub config: String,
}

impl Fingerprint {
    pub fn compute(bytes: &[u8], config_hash: &str) -> Self {
        Self {
            content: hash_parts(&[hash_bytes(bytes).as_str(), config_hash]),
            config: config_hash.to_string(),
        }
    }
}

/// A file read while producing an artifact, besides the source itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub path: PathBuf,
    /// blake3 of the bytes that were read.
    pub hash: String,
}

impl Dependency {
    pub fn new(path: impl Into<PathBuf>, bytes: &[u8]) -> Self {
        Self {
            path: path.into(),
            hash: hash_bytes(bytes),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    /// Last artifact written from this source.
    pub output: PathBuf,
    /// Included files the artifact depends on.
    pub includes: Vec<Dependency>,
}

/// Thread-safe cache front end shared by concurrently running tasks.
pub struct Cache {
    enabled: bool,
    store: Mutex<Box<dyn CacheStore>>,
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl Cache {
    pub fn new(store: Box<dyn CacheStore>) -> Self {
        Self {
            enabled: true,
            store: Mutex::new(store),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryCacheStore::new()))
    }

    /// A cache that never skips anything and records nothing.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            store: Mutex::new(Box::new(MemoryCacheStore::new())),
        }
    }

    pub fn from_mode(mode: CacheMode, root: &Path) -> Self {
        match mode {
            CacheMode::File => Self::new(Box::new(FileCacheStore::open(root))),
            CacheMode::Memory => Self::in_memory(),
            CacheMode::Off => Self::disabled(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn CacheStore>> {
        // A panic while holding the lock cannot leave an entry half-written
        // (every operation is a single map call), so keep going.
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True unless a previous `record` stored exactly `fingerprint` for this
    /// (task, path).
    pub fn should_process(&self, task: &str, path: &Path, fingerprint: &Fingerprint) -> bool {
        self.lookup(task, path, fingerprint).is_none()
    }

    /// The recorded entry when `fingerprint` is a hit.
    ///
    /// The caller still has to confirm the output exists and the entry's
    /// includes are unchanged.
    pub fn lookup(&self, task: &str, path: &Path, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        if !self.enabled {
            return None;
        }
        match self.lock().load(task, path) {
            Some(entry) if entry.fingerprint == *fingerprint => Some(entry),
            Some(_) => {
                debug!(task = %task, file = ?path, "cache entry stale");
                None
            }
            None => None,
        }
    }

    pub fn record(&self, task: &str, path: &Path, fingerprint: Fingerprint, output: PathBuf) {
        self.record_entry(
            task,
            path,
            CacheEntry {
                fingerprint,
                output,
                includes: Vec::new(),
            },
        );
    }

    pub fn record_entry(&self, task: &str, path: &Path, entry: CacheEntry) {
        if !self.enabled {
            return;
        }
        self.lock().save(task, path, entry);
    }

    /// Forget entries of `task` whose source is no longer in `current`.
    pub fn forget_missing(&self, task: &str, current: &[PathBuf]) {
        if !self.enabled {
            return;
        }
        let mut store = self.lock();
        for path in store.paths_for(task) {
            if !current.contains(&path) {
                store.remove(task, &path);
            }
        }
    }

    /// Source paths with an entry for `task`, sorted.
    pub fn tracked_paths(&self, task: &str) -> Vec<PathBuf> {
        let mut paths = self.lock().paths_for(task);
        paths.sort();
        paths
    }

    /// Discard every entry, forcing full reprocessing on the next run.
    pub fn clear_all(&self) -> Result<()> {
        self.lock().clear_all()
    }

    pub fn prune(&self, active_tasks: &[&str]) {
        self.lock().prune(active_tasks);
    }

    pub fn flush(&self) -> Result<()> {
        self.lock().flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_requires_matching_content_and_config() {
        let cache = Cache::in_memory();
        let path = Path::new("/src/a.css");
        let fp = Fingerprint::compute(b"a{}", "cfg-1");

        assert!(cache.should_process("css", path, &fp));
        cache.record("css", path, fp.clone(), PathBuf::from("/dist/a.css"));
        assert!(!cache.should_process("css", path, &fp));

        let edited = Fingerprint::compute(b"a{ }", "cfg-1");
        assert!(cache.should_process("css", path, &edited));

        let reconfigured = Fingerprint::compute(b"a{}", "cfg-2");
        assert!(cache.should_process("css", path, &reconfigured));

        // Same path under another task is a separate entry.
        assert!(cache.should_process("other", path, &fp));
    }

    #[test]
    fn lookup_returns_recorded_includes() {
        let cache = Cache::in_memory();
        let fp = Fingerprint::compute(b"//= footer.html", "c");
        let footer = Dependency::new("/src/footer.html", b"<footer/>");
        cache.record_entry(
            "html",
            Path::new("/src/index.html"),
            CacheEntry {
                fingerprint: fp.clone(),
                output: PathBuf::from("/dist/index.html"),
                includes: vec![footer.clone()],
            },
        );

        let entry = cache.lookup("html", Path::new("/src/index.html"), &fp).unwrap();
        assert_eq!(entry.includes, vec![footer]);
        assert_ne!(entry.includes[0].hash, hash_bytes(b"<footer>v2</footer>"));
    }

    #[test]
    fn clear_all_forces_reprocessing() {
        let cache = Cache::in_memory();
        let fp = Fingerprint::compute(b"x", "c");
        cache.record("t", Path::new("/a"), fp.clone(), PathBuf::from("/o"));
        cache.clear_all().unwrap();
        assert!(cache.should_process("t", Path::new("/a"), &fp));
    }

    #[test]
    fn disabled_cache_always_processes() {
        let cache = Cache::disabled();
        let fp = Fingerprint::compute(b"x", "c");
        cache.record("t", Path::new("/a"), fp.clone(), PathBuf::from("/o"));
        assert!(cache.should_process("t", Path::new("/a"), &fp));
        assert!(cache.tracked_paths("t").is_empty());
    }

    #[test]
    fn forget_missing_drops_deleted_sources() {
        let cache = Cache::in_memory();
        let fp = Fingerprint::compute(b"x", "c");
        cache.record("t", Path::new("/a"), fp.clone(), PathBuf::from("/o"));
        cache.record("t", Path::new("/b"), fp, PathBuf::from("/o"));
        cache.forget_missing("t", &[PathBuf::from("/b")]);
        assert_eq!(cache.tracked_paths("t"), vec![PathBuf::from("/b")]);
    }
}
