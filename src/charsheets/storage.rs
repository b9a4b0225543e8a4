//! Whole-document persistence for templates and sheets.
//!
//! A [`DocumentStore`] is a dumb key-value store of JSON text.  [`Storage`] sits on top of it,
//! (de)serializing documents and keeping one lock per document so read-modify-write spans on
//! the same template or sheet don't interleave.  Unrelated documents never wait on each other.

use super::error::{CharsheetError, StorageError};
use crate::log_error;
use serde::{de::DeserializeOwned, Serialize};
#[cfg(test)]
use std::collections::BTreeMap;
use std::{
    collections::HashMap,
    fmt,
    io::ErrorKind,
    ops::{Deref, DerefMut},
    path::PathBuf,
    sync::Arc,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocKind {
    Template,
    Sheet,
}

/// Address of a single document: its kind plus its lower-cased name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocKey {
    pub kind: DocKind,
    pub name: String,
}

impl DocKind {
    pub fn extension(self) -> &'static str {
        match self {
            DocKind::Template => "cstemplate",
            DocKind::Sheet => "cscharsheet",
        }
    }

    fn dir_name(self) -> &'static str {
        match self {
            DocKind::Template => "templates",
            DocKind::Sheet => "sheets",
        }
    }
}

impl DocKey {
    /// Names are case-insensitive and become file names, so they may not contain anything
    /// that would let them leave their directory.
    pub fn new(kind: DocKind, name: &str) -> Result<Self, CharsheetError> {
        let invalid = name.is_empty()
            || name
                .chars()
                .any(|c| matches!(c, '/' | '\\' | '.') || c.is_control());

        if invalid {
            return Err(CharsheetError::InvalidName(name.to_owned()));
        }

        Ok(Self {
            kind,
            name: name.to_lowercase(),
        })
    }

    pub fn template(name: &str) -> Result<Self, CharsheetError> {
        Self::new(DocKind::Template, name)
    }

    pub fn sheet(name: &str) -> Result<Self, CharsheetError> {
        Self::new(DocKind::Sheet, name)
    }
}

impl fmt::Display for DocKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.kind.extension())
    }
}

/// Raw document storage.  Implementations need not be atomic across calls; [`Storage`]
/// serializes access per key.
#[serenity::async_trait]
pub trait DocumentStore: Send + Sync {
    /// `None` if the document doesn't exist
    async fn get(&self, key: &DocKey) -> std::io::Result<Option<String>>;
    /// Create or overwrite
    async fn put(&self, key: &DocKey, contents: &str) -> std::io::Result<()>;
    /// `false` if the document didn't exist
    async fn delete(&self, key: &DocKey) -> std::io::Result<bool>;
    /// Names of every document of the given kind, sorted
    async fn list(&self, kind: DocKind) -> std::io::Result<Vec<String>>;

    /// Move a document to a new key.  Callers guarantee `from` exists and `to` doesn't.
    async fn rename(&self, from: &DocKey, to: &DocKey) -> std::io::Result<()> {
        let contents = self
            .get(from)
            .await?
            .ok_or_else(|| std::io::Error::from(ErrorKind::NotFound))?;
        self.put(to, &contents).await?;
        self.delete(from).await.map(|_| ())
    }
}

/// One file per document: `<base>/templates/<name>.cstemplate`, `<base>/sheets/<name>.cscharsheet`
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `base_dir`, creating its directories if needed.
    pub async fn open(base_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let store = Self {
            base_dir: base_dir.into(),
        };

        for kind in [DocKind::Template, DocKind::Sheet] {
            tokio::fs::create_dir_all(store.dir(kind)).await?;
        }

        Ok(store)
    }

    fn dir(&self, kind: DocKind) -> PathBuf {
        self.base_dir.join(kind.dir_name())
    }

    fn path(&self, key: &DocKey) -> PathBuf {
        self.dir(key.kind).join(key.to_string())
    }
}

#[serenity::async_trait]
impl DocumentStore for FileStore {
    async fn get(&self, key: &DocKey) -> std::io::Result<Option<String>> {
        match tokio::fs::read_to_string(self.path(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn put(&self, key: &DocKey, contents: &str) -> std::io::Result<()> {
        let path = self.path(key);
        tokio::fs::create_dir_all(self.dir(key.kind)).await?;

        // Write next to the target, then atomically rename over it.
        let tmp_path = path.with_extension(format!("{}.new", key.kind.extension()));
        tokio::fs::write(&tmp_path, contents).await?;
        tokio::fs::rename(&tmp_path, &path).await
    }

    async fn delete(&self, key: &DocKey) -> std::io::Result<bool> {
        match tokio::fs::remove_file(self.path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn list(&self, kind: DocKind) -> std::io::Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(self.dir(kind)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(kind.extension()) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_owned());
            }
        }

        names.sort();
        Ok(names)
    }

    async fn rename(&self, from: &DocKey, to: &DocKey) -> std::io::Result<()> {
        tokio::fs::rename(self.path(from), self.path(to)).await
    }
}

/// Documents held in memory.  Lost on exit.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    docs: tokio::sync::RwLock<BTreeMap<DocKey, String>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
#[serenity::async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, key: &DocKey) -> std::io::Result<Option<String>> {
        Ok(self.docs.read().await.get(key).cloned())
    }

    async fn put(&self, key: &DocKey, contents: &str) -> std::io::Result<()> {
        self.docs
            .write()
            .await
            .insert(key.clone(), contents.to_owned());
        Ok(())
    }

    async fn delete(&self, key: &DocKey) -> std::io::Result<bool> {
        Ok(self.docs.write().await.remove(key).is_some())
    }

    async fn list(&self, kind: DocKind) -> std::io::Result<Vec<String>> {
        Ok(self
            .docs
            .read()
            .await
            .keys()
            .filter(|key| key.kind == kind)
            .map(|key| key.name.clone())
            .collect())
    }
}

pub enum RenameOutcome {
    Renamed,
    SourceMissing,
    TargetExists,
}

/// Typed, per-document-locked access to a [`DocumentStore`].
pub struct Storage {
    backend: Box<dyn DocumentStore>,
    locks: Mutex<HashMap<DocKey, Arc<Mutex<()>>>>,
}

/// Read-write access to one document.  Holds the document's lock until dropped.  Changes are
/// only persisted by [`DocumentGuard::commit`]; dropping the guard discards them.
pub struct DocumentGuard<'a, T: Serialize> {
    storage: &'a Storage,
    key: DocKey,
    doc: T,
    _lock: OwnedMutexGuard<()>,
}

impl Storage {
    pub fn new(backend: impl DocumentStore + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock(&self, key: &DocKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Only the table itself refers to these: nobody holds or waits on them.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(key.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    fn decode<T: DeserializeOwned + Default>(
        key: &DocKey,
        contents: &str,
    ) -> Result<T, StorageError> {
        if contents.trim().is_empty() {
            return Ok(T::default());
        }

        serde_json::from_str(contents).map_err(|source| StorageError::Corrupt {
            key: key.clone(),
            source,
        })
    }

    fn encode<T: Serialize>(key: &DocKey, doc: &T) -> Result<String, StorageError> {
        serde_json::to_string_pretty(doc).map_err(|source| StorageError::Corrupt {
            key: key.clone(),
            source,
        })
    }

    pub async fn exists(&self, key: &DocKey) -> Result<bool, StorageError> {
        Ok(self.backend.get(key).await?.is_some())
    }

    /// Read-only snapshot of a document.  `None` if it doesn't exist; an empty document
    /// decodes as `T::default()`.
    pub async fn read<T: DeserializeOwned + Default>(
        &self,
        key: &DocKey,
    ) -> Result<Option<T>, StorageError> {
        match self.backend.get(key).await? {
            Some(contents) => Self::decode(key, &contents).map(Some),
            None => Ok(None),
        }
    }

    /// Lock and load a document for modification.  `None` if it doesn't exist.
    pub async fn write<T: Serialize + DeserializeOwned + Default>(
        &self,
        key: &DocKey,
    ) -> Result<Option<DocumentGuard<'_, T>>, StorageError> {
        let lock = self.lock(key).await;

        let Some(contents) = self.backend.get(key).await? else {
            return Ok(None);
        };

        Ok(Some(DocumentGuard {
            storage: self,
            key: key.clone(),
            doc: Self::decode(key, &contents)?,
            _lock: lock,
        }))
    }

    /// As [`Storage::read`], but a corrupt document is logged and treated as missing.  For scans
    /// over every document, where one bad file shouldn't stop the rest.
    pub async fn read_or_skip<T: DeserializeOwned + Default>(
        &self,
        key: &DocKey,
    ) -> Result<Option<T>, StorageError> {
        skip_corrupt(self.read(key).await)
    }

    /// As [`Storage::write`], skipping corrupt documents like [`Storage::read_or_skip`].
    pub async fn write_or_skip<T: Serialize + DeserializeOwned + Default>(
        &self,
        key: &DocKey,
    ) -> Result<Option<DocumentGuard<'_, T>>, StorageError> {
        skip_corrupt(self.write(key).await)
    }

    /// Store a new document.  `false` if one already exists under that key.
    pub async fn create<T: Serialize>(&self, key: &DocKey, doc: &T) -> Result<bool, StorageError> {
        let _lock = self.lock(key).await;

        if self.backend.get(key).await?.is_some() {
            return Ok(false);
        }

        self.backend.put(key, &Self::encode(key, doc)?).await?;
        Ok(true)
    }

    /// `false` if there was nothing to delete.
    pub async fn delete(&self, key: &DocKey) -> Result<bool, StorageError> {
        let _lock = self.lock(key).await;
        Ok(self.backend.delete(key).await?)
    }

    pub async fn rename(&self, from: &DocKey, to: &DocKey) -> Result<RenameOutcome, StorageError> {
        // Always take the two locks in key order so concurrent renames can't deadlock.
        let (_first, _second) = if from == to {
            (self.lock(from).await, None)
        } else if from < to {
            (self.lock(from).await, Some(self.lock(to).await))
        } else {
            let second = self.lock(to).await;
            (self.lock(from).await, Some(second))
        };

        if self.backend.get(from).await?.is_none() {
            return Ok(RenameOutcome::SourceMissing);
        }
        if self.backend.get(to).await?.is_some() {
            return Ok(RenameOutcome::TargetExists);
        }

        self.backend.rename(from, to).await?;
        Ok(RenameOutcome::Renamed)
    }

    pub async fn list(&self, kind: DocKind) -> Result<Vec<String>, StorageError> {
        Ok(self.backend.list(kind).await?)
    }
}

fn skip_corrupt<T>(result: Result<Option<T>, StorageError>) -> Result<Option<T>, StorageError> {
    match result {
        Err(err @ StorageError::Corrupt { .. }) => {
            log_error!("Skipping document: {}", err);
            Ok(None)
        }
        other => other,
    }
}

impl<T: Serialize> DocumentGuard<'_, T> {
    /// Persist the whole document, overwriting what was stored, and release the lock.
    pub async fn commit(self) -> Result<(), StorageError> {
        let contents = Storage::encode(&self.key, &self.doc)?;
        self.storage.backend.put(&self.key, &contents).await?;
        Ok(())
    }
}

impl<T: Serialize> Deref for DocumentGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.doc
    }
}

impl<T: Serialize> DerefMut for DocumentGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.doc
    }
}
