//! Filesystem capability used by the bulk loader.
//!
//! The cache never touches the OS filesystem directly; the loader goes
//! through this trait so tests can substitute a double and so the walk stays
//! limited to the three operations the cache actually needs.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// The three filesystem operations the loader depends on.
///
/// Any failure aborts the bulk load that issued it; implementations should
/// not retry internally.
pub trait Filesystem: Send + Sync {
    /// List the immediate subdirectories of `path`.
    fn list_dirs(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// List the immediate regular files of `path`.
    fn list_files(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Read the full byte content of the file at `path`.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// [`Filesystem`] backed by [`std::fs`].
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFilesystem;

impl Filesystem for OsFilesystem {
    fn list_dirs(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push(entry.path());
            }
        }
        Ok(dirs)
    }

    fn list_files(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        Ok(files)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }
}
