use std::fs;
use std::path::{Path, PathBuf};

pub fn setup_test_dir(test_dir: &str) -> PathBuf {
    let dir = PathBuf::from(test_dir);
    if dir.exists() {
        fs::remove_dir_all(&dir).unwrap();
    }
    dir
}

pub fn cleanup_test_dir(test_dir: &Path) {
    if test_dir.exists() {
        let _ = fs::remove_dir_all(test_dir);
    }
}
