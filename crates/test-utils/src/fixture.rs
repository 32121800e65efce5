use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use assetflow::config::DEFAULT_CONFIG_FILE;
use tempfile::TempDir;

/// A throwaway project directory on the real filesystem.
pub struct ProjectFixture {
    dir: TempDir,
}

impl ProjectFixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("creating temp dir"),
        }
    }

    /// Canonical project root.
    pub fn root(&self) -> PathBuf {
        self.dir.path().canonicalize().expect("canonicalizing temp dir")
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    pub fn write(&self, rel: &str, contents: impl AsRef<[u8]>) -> &Self {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("creating fixture directory");
        }
        fs::write(&path, contents).expect("writing fixture file");
        self
    }

    pub fn read(&self, rel: &str) -> Vec<u8> {
        fs::read(self.path(rel)).expect("reading fixture file")
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.path(rel).exists()
    }

    pub fn remove(&self, rel: &str) {
        fs::remove_file(self.path(rel)).expect("removing fixture file");
    }

    /// Write `Assetflow.toml` and return its path.
    pub fn config(&self, toml: &str) -> PathBuf {
        self.write(DEFAULT_CONFIG_FILE, toml);
        self.path(DEFAULT_CONFIG_FILE)
    }

    /// Every file under `rel`, keyed by path relative to it.
    pub fn snapshot(&self, rel: &str) -> BTreeMap<PathBuf, Vec<u8>> {
        let base = self.path(rel);
        let mut out = BTreeMap::new();
        collect(&base, &base, &mut out);
        out
    }
}

impl Default for ProjectFixture {
    fn default() -> Self {
        Self::new()
    }
}

fn collect(base: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Vec<u8>>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect(base, &path, out);
        } else if let Ok(bytes) = fs::read(&path) {
            let rel = path.strip_prefix(base).unwrap_or(&path).to_path_buf();
            out.insert(rel, bytes);
        }
    }
}
