// src/transform/cache.rs

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::fs::FileSystem;
use crate::types::HashStorageMode;

/// Relative path (from the project root) to the hashes file.
pub const HASH_FILE_PATH: &str = ".assetdag/hashes";

/// Abstract storage for step input hashes, keyed by `task#step`.
pub trait HashStore: Send + Sync + Debug {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&mut self, key: &str, hash: &str) -> Result<()>;
    /// Drop every stored hash. Used by `clean`, since outputs are gone.
    fn clear(&mut self) -> Result<()>;
}

/// Build the store selected by `[config] hash_storage`.
pub fn open_hash_store(
    mode: HashStorageMode,
    root: &Path,
    fs: Arc<dyn FileSystem>,
) -> Box<dyn HashStore> {
    match mode {
        HashStorageMode::File => Box::new(FileHashStore::new(root.to_path_buf(), fs)),
        HashStorageMode::Memory => Box::new(MemoryHashStore::new()),
    }
}

/// Stores hashes in `<root>/.assetdag/hashes`, one `key hash` pair per line.
#[derive(Debug)]
pub struct FileHashStore {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl FileHashStore {
    pub fn new(root: PathBuf, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            path: root.join(HASH_FILE_PATH),
            fs,
        }
    }

    fn load_all(&self) -> Result<BTreeMap<String, String>> {
        let mut map = BTreeMap::new();
        if !self.fs.is_file(&self.path) {
            return Ok(map);
        }

        for line in self.fs.read_to_string(&self.path)?.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some((key, hash)) = trimmed.split_once(char::is_whitespace) {
                map.insert(key.to_string(), hash.trim().to_string());
            }
        }
        Ok(map)
    }

    fn save_all(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let mut out = String::new();
        for (key, hash) in map {
            out.push_str(key);
            out.push(' ');
            out.push_str(hash);
            out.push('\n');
        }
        self.fs.write(&self.path, out.as_bytes())
    }
}

impl HashStore for FileHashStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load_all()?.get(key).cloned())
    }

    fn save(&mut self, key: &str, hash: &str) -> Result<()> {
        let mut map = self.load_all()?;
        map.insert(key.to_string(), hash.to_string());
        self.save_all(&map)?;
        debug!(key = %key, hash = %hash, "stored step hash (file)");
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        if self.fs.is_file(&self.path) {
            self.save_all(&BTreeMap::new())?;
            info!("cleared step hashes (file)");
        }
        Ok(())
    }
}

/// Stores hashes in memory only.
#[derive(Debug, Default)]
pub struct MemoryHashStore {
    map: BTreeMap<String, String>,
}

impl MemoryHashStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HashStore for MemoryHashStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.map.get(key).cloned())
    }

    fn save(&mut self, key: &str, hash: &str) -> Result<()> {
        self.map.insert(key.to_string(), hash.to_string());
        debug!(key = %key, hash = %hash, "stored step hash (memory)");
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.map.clear();
        Ok(())
    }
}
