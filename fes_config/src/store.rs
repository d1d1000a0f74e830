//! TOML-file backed parameter store.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use fes_traits::{BoxError, ParamStore};
use tracing::{debug, info};

/// Keeps the entries in memory and rewrites the whole file on every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, u16>,
}

impl FileStore {
    /// Opens `path`; a missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(text) => toml::from_str::<BTreeMap<String, u16>>(&text).map_err(|e| {
                eyre::eyre!("parameter store {} is not valid: {e}", path.display())
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "parameter store missing; starting empty");
                BTreeMap::new()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &BTreeMap<String, u16> {
        &self.entries
    }

    /// Sibling file the next snapshot is staged in before it replaces the store.
    pub fn staging_path(&self) -> PathBuf {
        self.path.with_extension("toml.partial")
    }

    /// Stage the whole map, fsync it, then rename over the store. A power cut
    /// leaves either the old or the new parameters, never a torn file.
    fn flush(&self) -> Result<(), BoxError> {
        let text = toml::to_string(&self.entries)?;
        let staging = self.staging_path();
        let mut file = fs::File::create(&staging)?;
        file.write_all(text.as_bytes())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&staging, &self.path)?;
        info!(path = %self.path.display(), keys = self.entries.len(), "parameter store written");
        Ok(())
    }
}

impl ParamStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<u16>, BoxError> {
        Ok(self.entries.get(key).copied())
    }

    fn put(&mut self, key: &str, value: u16) -> Result<(), BoxError> {
        self.entries.insert(key.to_string(), value);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), BoxError> {
        if self.entries.remove(key).is_none() {
            return Ok(());
        }
        self.flush()
    }

    fn clear(&mut self) -> Result<(), BoxError> {
        self.entries.clear();
        self.flush()
    }
}
