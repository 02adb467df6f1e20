use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use stash_logging::{stash_error, stash_info, stash_warn};

use crate::persist::{ensure_output_dir, AtomicFileWriter, PersistError};
use crate::stash::StashIndex;

/// Bucket for files whose name carries no author.
pub const UNSORTED: &str = "unsorted";

/// Manifest written at the classification output root.
pub const MANIFEST_FILE: &str = "output.txt";

/// Extensions accepted when collecting batch input folders.
pub const VALID_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "swf", "mid", "wav", "mp3", "mpeg", "txt", "docx",
];

// `<digits>[.]<author>_<rest>`: the whole leading digit run is the id, the
// author is everything after it (and an optional dot) up to the first underscore.
static BATCH_AUTHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+(?:\.([^_]+)|([^\d_.][^_]*))_.*$").expect("batch author pattern")
});
static IMPORT_AUTHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{10}(?:\.([^_]+)|([^\d_.][^_]*))_.*$").expect("import author pattern")
});

/// How the author token is read from a filename.
///
/// Batch sorting accepts any leading id. Imports of site downloads require
/// the 10-digit id the site puts in front of every file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorPolicy {
    Batch,
    Import,
}

impl AuthorPolicy {
    pub fn author_of(self, filename: &str) -> Option<&str> {
        let pattern = match self {
            AuthorPolicy::Batch => &*BATCH_AUTHOR,
            AuthorPolicy::Import => &*IMPORT_AUTHOR,
        };
        let caps = pattern.captures(filename)?;
        let author = caps.get(1).or_else(|| caps.get(2))?.as_str();
        is_folder_name(author).then_some(author)
    }
}

/// An author becomes a folder below the output root; it must stay one level down.
fn is_folder_name(author: &str) -> bool {
    !author.is_empty()
        && author != "."
        && author != ".."
        && !author.contains(|c: char| matches!(c, '/' | '\\' | '\0'))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Copy,
    Move,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestMode {
    /// Regenerate the manifest from this run only.
    Rewrite,
    /// Add this run's entries to the end of the manifest.
    Append,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifyOptions {
    pub policy: AuthorPolicy,
    pub placement: Placement,
    pub manifest: ManifestMode,
}

impl ClassifyOptions {
    /// Sorting whole input folders: copy, fresh manifest.
    pub fn batch() -> Self {
        Self {
            policy: AuthorPolicy::Batch,
            placement: Placement::Copy,
            manifest: ManifestMode::Rewrite,
        }
    }

    /// Filing single downloaded or imported files: move, appended manifest.
    pub fn import() -> Self {
        Self {
            policy: AuthorPolicy::Import,
            placement: Placement::Move,
            manifest: ManifestMode::Append,
        }
    }
}

/// A file to classify: its bare name and where it currently lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub filename: String,
    pub path: PathBuf,
}

impl SourceFile {
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let filename = path.file_name()?.to_string_lossy().into_owned();
        Some(Self { filename, path })
    }
}

/// Files grouped by author, buckets in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Gallery {
    buckets: Vec<(String, Vec<SourceFile>)>,
    positions: HashMap<String, usize>,
}

impl Gallery {
    pub fn build(files: impl IntoIterator<Item = SourceFile>, policy: AuthorPolicy) -> Self {
        let mut gallery = Self::default();
        for file in files {
            let author = policy
                .author_of(&file.filename)
                .unwrap_or(UNSORTED)
                .to_string();
            gallery.push(author, file);
        }
        gallery
    }

    fn push(&mut self, author: String, file: SourceFile) {
        let index = match self.positions.get(&author) {
            Some(&index) => index,
            None => {
                self.positions.insert(author.clone(), self.buckets.len());
                self.buckets.push((author, Vec::new()));
                self.buckets.len() - 1
            }
        };
        self.buckets[index].1.push(file);
    }

    pub fn authors(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(|(author, _)| author.as_str())
    }

    pub fn files(&self, author: &str) -> Option<&[SourceFile]> {
        let index = *self.positions.get(author)?;
        Some(&self.buckets[index].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[SourceFile])> {
        self.buckets
            .iter()
            .map(|(author, files)| (author.as_str(), files.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.buckets.iter().map(|(_, files)| files.len()).sum()
    }

    /// `author:` followed by `\t<n>. <filename>` lines, a blank line after each author.
    pub fn manifest(&self) -> String {
        let mut out = String::new();
        for (author, files) in self.iter() {
            let _ = writeln!(out, "{author}:");
            for (number, file) in files.iter().enumerate() {
                let _ = writeln!(out, "\t{}. {}", number + 1, file.filename);
            }
            out.push('\n');
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementOutcome {
    Placed,
    AlreadyPresent,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifyReport {
    pub gallery: Gallery,
    pub placed: usize,
    pub already_present: usize,
    pub failed: usize,
    pub manifest_path: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("output folder unusable: {0}")]
    Output(#[from] PersistError),
}

/// Files artwork into per-author folders below an output root.
#[derive(Debug, Clone)]
pub struct ArtworkClassifier {
    output_root: PathBuf,
    stash: Option<Arc<StashIndex>>,
}

impl ArtworkClassifier {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            stash: None,
        }
    }

    /// Registers every placed file in `stash`.
    pub fn with_stash(mut self, stash: Arc<StashIndex>) -> Self {
        self.stash = Some(stash);
        self
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn classify(
        &self,
        files: Vec<SourceFile>,
        options: ClassifyOptions,
    ) -> Result<ClassifyReport, ClassifyError> {
        ensure_output_dir(&self.output_root)?;
        let gallery = Gallery::build(files, options.policy);
        let manifest_path = self.write_manifest(&gallery, options.manifest);

        let mut report = ClassifyReport {
            manifest_path,
            ..ClassifyReport::default()
        };
        for (author, files) in gallery.iter() {
            let author_dir = self.output_root.join(author);
            if let Err(err) = self.ensure_author_dir(&author_dir) {
                stash_error!("Cannot create folder {:?}: {}", author_dir, err);
                report.failed += files.len();
                continue;
            }
            for file in files {
                match self.place(file, &author_dir, options.placement) {
                    PlacementOutcome::Placed => report.placed += 1,
                    PlacementOutcome::AlreadyPresent => report.already_present += 1,
                    PlacementOutcome::Failed => report.failed += 1,
                }
            }
        }
        report.gallery = gallery;
        Ok(report)
    }

    /// Files loose artwork into the stash, skipping names it already holds.
    pub fn import(&self, paths: &[PathBuf]) -> Result<ClassifyReport, ClassifyError> {
        let mut skipped = 0;
        let mut files = Vec::new();
        for path in paths {
            let Some(file) = SourceFile::from_path(path) else {
                stash_warn!("Not a file name: {:?}", path);
                continue;
            };
            if self.stash.as_ref().is_some_and(|stash| stash.contains(&file.filename)) {
                stash_info!("Skipped: {} (already in stash)", file.filename);
                skipped += 1;
                continue;
            }
            files.push(file);
        }
        let mut report = self.classify(files, ClassifyOptions::import())?;
        report.already_present += skipped;
        Ok(report)
    }

    fn write_manifest(&self, gallery: &Gallery, mode: ManifestMode) -> Option<PathBuf> {
        if gallery.is_empty() {
            return None;
        }
        let content = gallery.manifest();
        let result = match mode {
            ManifestMode::Rewrite => {
                AtomicFileWriter::new(self.output_root.clone()).write(MANIFEST_FILE, &content)
            }
            ManifestMode::Append => append(&self.output_root.join(MANIFEST_FILE), &content),
        };
        match result {
            Ok(path) => Some(path),
            Err(err) => {
                stash_error!("Error writing {}: {}", MANIFEST_FILE, err);
                None
            }
        }
    }

    fn ensure_author_dir(&self, dir: &Path) -> Result<(), PersistError> {
        if dir.is_dir() {
            return Ok(());
        }
        ensure_output_dir(dir)?;
        stash_info!("Made new directory: {:?}", dir);
        Ok(())
    }

    fn place(&self, file: &SourceFile, author_dir: &Path, placement: Placement) -> PlacementOutcome {
        let target = author_dir.join(&file.filename);
        if target.exists() {
            stash_info!("Already present: {:?}", target);
            return PlacementOutcome::AlreadyPresent;
        }
        let result = match placement {
            Placement::Copy => fs::copy(&file.path, &target).map(|_| ()),
            Placement::Move => move_file(&file.path, &target),
        };
        match result {
            Ok(()) => {
                stash_info!(
                    "{}: {}",
                    if placement == Placement::Copy { "Copied" } else { "Moved" },
                    file.filename
                );
                if let Some(stash) = &self.stash {
                    stash.insert(file.filename.clone());
                }
                PlacementOutcome::Placed
            }
            Err(err) => {
                stash_error!("Error placing {:?} into {:?}: {}", file.path, author_dir, err);
                PlacementOutcome::Failed
            }
        }
    }
}

/// Direct children of each folder whose extension is one of [`VALID_EXTENSIONS`].
pub fn collect_inputs(folders: &[PathBuf]) -> Vec<SourceFile> {
    let mut files = Vec::new();
    for folder in folders {
        let entries = match fs::read_dir(folder) {
            Ok(entries) => entries,
            Err(err) => {
                stash_warn!("Cannot read input folder {:?}: {}", folder, err);
                continue;
            }
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|ft| ft.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect();
        paths.sort();

        for path in paths {
            if has_valid_extension(&path) {
                files.extend(SourceFile::from_path(path));
            } else {
                stash_warn!("Invalid file format for file {:?}", path);
            }
        }
    }
    files
}

fn has_valid_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| VALID_EXTENSIONS.iter().any(|v| v.eq_ignore_ascii_case(ext)))
}

fn append(path: &Path, content: &str) -> Result<PathBuf, PersistError> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(content.as_bytes())?;
    Ok(path.to_path_buf())
}

fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        // Rename cannot cross filesystems; fall back to copy and delete.
        Err(_) => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AuthorPolicy;

    #[test]
    fn batch_policy_accepts_any_id_length() {
        assert_eq!(AuthorPolicy::Batch.author_of("42.bob_sky.png"), Some("bob"));
        assert_eq!(
            AuthorPolicy::Batch.author_of("1234567890artistA_pic1.png"),
            Some("artistA")
        );
        assert_eq!(AuthorPolicy::Batch.author_of("weird.png"), None);
    }

    #[test]
    fn digit_run_is_never_split_into_an_author() {
        assert_eq!(AuthorPolicy::Batch.author_of("12345_x.png"), None);
        assert_eq!(AuthorPolicy::Batch.author_of("001_cover.png"), None);
        assert_eq!(AuthorPolicy::Batch.author_of("42._x.png"), None);
        assert_eq!(
            AuthorPolicy::Import.author_of("12345678901.bob_x.png"),
            None
        );
    }

    #[test]
    fn path_like_authors_are_rejected() {
        assert_eq!(AuthorPolicy::Import.author_of("1234567890..._x.png"), None);
        assert_eq!(AuthorPolicy::Import.author_of("1234567890.._x.png"), None);
        assert_eq!(AuthorPolicy::Batch.author_of("7.a\\b_x.png"), None);
        assert_eq!(AuthorPolicy::Batch.author_of("7...hidden_x.png"), Some("..hidden"));
    }

    #[test]
    fn import_policy_requires_ten_digit_id() {
        assert_eq!(
            AuthorPolicy::Import.author_of("1234567890.bob_sky.png"),
            Some("bob")
        );
        assert_eq!(AuthorPolicy::Import.author_of("42.bob_sky.png"), None);
    }
}
