pub use extkit_test_utils::builders;
pub use extkit_test_utils::init_tracing;

use std::path::{Path, PathBuf};

/// Write a file under `root`, creating parent directories.
#[allow(dead_code)]
pub fn write_file(root: &Path, rel: &str, contents: &str) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dirs");
    }
    std::fs::write(&path, contents).expect("write file");
    path
}
