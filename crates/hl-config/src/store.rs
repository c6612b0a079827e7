use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// JSON Lines event log (visits and bookmarks). Relative paths resolve
    /// against the directory of the config file.
    pub history: PathBuf,
}

impl StoreConfig {
    pub fn history_path(&self, base_dir: &Path) -> PathBuf {
        if self.history.is_relative() {
            base_dir.join(&self.history)
        } else {
            self.history.clone()
        }
    }
}
