use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

/// Prefix of in-progress files; the stash scan ignores them.
pub const TEMP_PREFIX: &str = ".artstash-";

/// Buffer size used when streaming binary assets to disk.
pub const ASSET_CHUNK_BYTES: usize = 4096;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure output directory exists; create if missing. A directory created
/// concurrently by another worker counts as success.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
        return Ok(());
    }
    match fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(err) => Err(PersistError::OutputDir(format!("{}: {err}", dir.display()))),
    }
}

/// Writes files into `dir` through a temp file that is renamed into place,
/// so readers never observe a partial file.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
        let mut staged = self.stage()?;
        staged.write_chunk(content.as_bytes())?;
        staged.persist(filename)
    }

    /// Opens a temp file for incremental writes; nothing appears under the
    /// final name until [`StagedFile::persist`].
    pub fn stage(&self) -> Result<StagedFile, PersistError> {
        ensure_output_dir(&self.dir)?;
        let tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.dir)?;
        Ok(StagedFile {
            dir: self.dir.clone(),
            writer: BufWriter::with_capacity(ASSET_CHUNK_BYTES, tmp),
            bytes_written: 0,
        })
    }
}

/// A file being written. Dropping it removes the temp file.
#[derive(Debug)]
pub struct StagedFile {
    dir: PathBuf,
    writer: BufWriter<NamedTempFile>,
    bytes_written: u64,
}

impl StagedFile {
    pub fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), PersistError> {
        self.writer.write_all(chunk)?;
        self.bytes_written += chunk.len() as u64;
        Ok(())
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Flushes, syncs and renames the temp file to `dir/filename`,
    /// replacing an existing file of that name.
    pub fn persist(self, filename: &str) -> Result<PathBuf, PersistError> {
        let target = self.dir.join(filename);
        let mut tmp = self.writer.into_inner().map_err(|e| e.into_error())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        if target.exists() {
            fs::remove_file(&target)?;
        }
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}
