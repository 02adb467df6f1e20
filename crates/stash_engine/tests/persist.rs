use std::fs;

use stash_engine::{ensure_output_dir, AtomicFileWriter};
use tempfile::TempDir;

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("artist").join("nested");
    assert!(!new_dir.exists());
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
    // Existing directories are fine, e.g. when another worker created it first.
    ensure_output_dir(&new_dir).unwrap();
}

#[test]
fn atomic_write_replaces_existing() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("story.txt", "hello").unwrap();
    assert_eq!(first.file_name().unwrap(), "story.txt");
    assert_eq!(fs::read_to_string(&first).unwrap(), "hello");

    let second = writer.write("story.txt", "world").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), "world");
}

#[test]
fn dropped_staged_file_leaves_nothing_behind() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let mut staged = writer.stage().unwrap();
    staged.write_chunk(b"partial").unwrap();
    assert_eq!(staged.bytes_written(), 7);
    drop(staged);

    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[test]
fn staged_file_appears_only_on_persist() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let mut staged = writer.stage().unwrap();
    staged.write_chunk(&[1, 2, 3]).unwrap();
    staged.write_chunk(&[4]).unwrap();
    assert!(!temp.path().join("pic.png").exists());

    let path = staged.persist("pic.png").unwrap();
    assert_eq!(fs::read(path).unwrap(), vec![1, 2, 3, 4]);
}

#[test]
fn no_partial_file_on_error() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    let result = writer.write("doc.txt", "data");
    assert!(result.is_err());
    assert!(!file_path.with_file_name("doc.txt").exists());
}
