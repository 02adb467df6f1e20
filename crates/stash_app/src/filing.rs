use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use stash_engine::{collect_inputs, ArtworkClassifier, ClassifyOptions, ClassifyReport, Stash};
use stash_logging::stash_info;

/// Copies every valid file of `inputs` into per-author folders below `output`.
pub fn sort_folders(inputs: &[PathBuf], output: &Path) -> anyhow::Result<ClassifyReport> {
    let files = collect_inputs(inputs);
    stash_info!("Sorting {} file(s) into {:?}", files.len(), output);
    ArtworkClassifier::new(output)
        .classify(files, ClassifyOptions::batch())
        .with_context(|| format!("cannot sort into {}", output.display()))
}

/// Moves loose files into the stash, skipping names it already holds.
pub fn import_files(stash: &Stash, files: &[PathBuf]) -> anyhow::Result<ClassifyReport> {
    ArtworkClassifier::new(stash.root())
        .with_stash(Arc::clone(stash.index()))
        .import(files)
        .with_context(|| format!("cannot import into {}", stash.root().display()))
}

pub fn summary(report: &ClassifyReport) -> String {
    let mut line = format!(
        "{} author folder(s): {} placed, {} already present, {} failed",
        report.gallery.len(),
        report.placed,
        report.already_present,
        report.failed
    );
    if let Some(manifest) = &report.manifest_path {
        line.push_str(&format!("; manifest {}", manifest.display()));
    }
    line
}
