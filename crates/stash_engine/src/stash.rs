use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use stash_logging::{stash_debug, stash_info, stash_warn};
use walkdir::WalkDir;

use crate::persist::{ensure_output_dir, PersistError, TEMP_PREFIX};

/// Staging directory for fresh downloads, relative to the stash root.
pub const DOWNLOAD_DIR: &str = "download";

#[derive(Debug, thiserror::Error)]
pub enum StashError {
    #[error("stash root {0:?} is not a directory")]
    NotADirectory(PathBuf),
    #[error("failed to create download folder: {0}")]
    DownloadDir(#[from] PersistError),
}

/// Filenames already present somewhere in the stash.
///
/// A name is either stored (on disk) or claimed by a worker that is writing
/// it; both checks and transitions happen under one lock.
#[derive(Debug, Default)]
pub struct StashIndex {
    sets: Mutex<NameSets>,
}

#[derive(Debug, Default)]
struct NameSets {
    stored: HashSet<String>,
    in_flight: HashSet<String>,
}

/// Result of [`StashIndex::claim`].
#[derive(Debug)]
pub enum Claim<'a> {
    /// The caller may write the file; commit the claim once it is on disk.
    Acquired(StashClaim<'a>),
    Stored,
    InFlight,
}

/// Exclusive right to write one filename. Dropping it uncommitted releases the name.
#[derive(Debug)]
pub struct StashClaim<'a> {
    index: &'a StashIndex,
    filename: String,
    committed: bool,
}

impl StashClaim<'_> {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Marks the file as stored.
    pub fn commit(mut self) {
        let mut sets = self.index.lock();
        sets.in_flight.remove(&self.filename);
        sets.stored.insert(self.filename.clone());
        self.committed = true;
    }
}

impl Drop for StashClaim<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.index.lock().in_flight.remove(&self.filename);
        }
    }
}

impl StashIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let index = Self::new();
        index.lock().stored = names.into_iter().map(Into::into).collect();
        index
    }

    /// Recursively collects the filenames below `root`.
    pub fn scan(root: &Path) -> Self {
        let mut names = HashSet::new();
        for entry in WalkDir::new(root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    stash_warn!("Skipping unreadable stash entry: {}", err);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if name.starts_with(TEMP_PREFIX) {
                continue;
            }
            names.insert(name.into_owned());
        }
        stash_info!("Found {} files in stash {:?}", names.len(), root);
        Self::from_names(names)
    }

    /// Whether the file is stored. Claimed names are not yet stored.
    pub fn contains(&self, filename: &str) -> bool {
        self.lock().stored.contains(filename)
    }

    /// Records a stored file; returns `false` if it was already known.
    pub fn insert(&self, filename: impl Into<String>) -> bool {
        let filename = filename.into();
        let mut sets = self.lock();
        sets.in_flight.remove(&filename);
        sets.stored.insert(filename)
    }

    /// Atomically checks the name and, if unknown, reserves it for the caller.
    pub fn claim(&self, filename: &str) -> Claim<'_> {
        let mut sets = self.lock();
        if sets.stored.contains(filename) {
            return Claim::Stored;
        }
        if !sets.in_flight.insert(filename.to_string()) {
            return Claim::InFlight;
        }
        stash_debug!("Claimed {}", filename);
        Claim::Acquired(StashClaim {
            index: self,
            filename: filename.to_string(),
            committed: false,
        })
    }

    pub fn len(&self) -> usize {
        self.lock().stored.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted snapshot of the stored names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.lock().stored.iter().cloned().collect();
        names.sort();
        names
    }

    fn lock(&self) -> MutexGuard<'_, NameSets> {
        self.sets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A selected stash: its root, its download folder and the index of its contents.
#[derive(Debug, Clone)]
pub struct Stash {
    root: PathBuf,
    download_dir: PathBuf,
    index: Arc<StashIndex>,
}

impl Stash {
    /// Indexes `root` and makes sure `root/download/` exists.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StashError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(StashError::NotADirectory(root));
        }
        let index = Arc::new(StashIndex::scan(&root));
        let download_dir = root.join(DOWNLOAD_DIR);
        if !download_dir.is_dir() {
            ensure_output_dir(&download_dir)?;
            stash_info!("Download folder created: {:?}", download_dir);
        }
        Ok(Self {
            root,
            download_dir,
            index,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub fn index(&self) -> &Arc<StashIndex> {
        &self.index
    }
}
