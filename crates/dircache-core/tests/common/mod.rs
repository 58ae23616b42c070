//! Shared helpers for dircache integration tests.

#![allow(dead_code)] // not every test binary uses every helper

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

/// Materializes a real directory tree inside a tempdir for loader tests.
///
/// ```ignore
/// let tree = TreeBuilder::new()
///     .add_file("a.txt", b"alpha")
///     .add_file("sub/b.txt", b"beta")
///     .add_directory("empty")
///     .build();
/// cache.insert_path(tree.path())?;
/// ```
pub struct TreeBuilder {
    files: Vec<(PathBuf, Vec<u8>)>,
    dirs: Vec<PathBuf>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        TreeBuilder {
            files: Vec::new(),
            dirs: Vec::new(),
        }
    }

    pub fn add_file(mut self, relative: &str, contents: &[u8]) -> Self {
        self.files.push((PathBuf::from(relative), contents.to_vec()));
        self
    }

    pub fn add_directory(mut self, relative: &str) -> Self {
        self.dirs.push(PathBuf::from(relative));
        self
    }

    /// Create the tree on disk. The returned guard deletes it on drop.
    pub fn build(self) -> TempDir {
        let root = TempDir::new().expect("create tempdir");
        for dir in &self.dirs {
            fs::create_dir_all(root.path().join(dir)).expect("create directory");
        }
        for (relative, contents) in &self.files {
            let path = root.path().join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("create parent directory");
            }
            fs::write(&path, contents).expect("write file");
        }
        root
    }
}

/// Route crate logs into the test harness when `RUST_LOG` is set.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
