use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use dialogue_core::{SceneTree, SceneTreeError};
use tracing::{info, warn};

/// Scene document on disk, reloaded whenever its modification time changes.
#[derive(Debug)]
pub(crate) struct FileSceneSource {
    path: PathBuf,
    tree: SceneTree,
    loaded_modified: Option<SystemTime>,
}

impl FileSceneSource {
    pub(crate) fn open(path: &Path) -> Result<Self, SceneTreeError> {
        let loaded_modified = modified_time(path);
        let tree = SceneTree::load(path)?;
        info!(
            path = %path.display(),
            nodes = tree.node_count(),
            "scene_loaded"
        );
        Ok(Self {
            path: path.to_path_buf(),
            tree,
            loaded_modified,
        })
    }

    pub(crate) fn tree(&self) -> &SceneTree {
        &self.tree
    }

    /// Reloads on a changed mtime. A bad document keeps the previous tree.
    pub(crate) fn refresh(&mut self) -> bool {
        let modified = modified_time(&self.path);
        if modified.is_none() || modified == self.loaded_modified {
            return false;
        }
        self.loaded_modified = modified;
        match SceneTree::load(&self.path) {
            Ok(tree) => {
                info!(
                    path = %self.path.display(),
                    nodes = tree.node_count(),
                    "scene_reloaded"
                );
                self.tree = tree;
                true
            }
            Err(error) => {
                warn!(path = %self.path.display(), error = %error, "scene_reload_failed");
                false
            }
        }
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}
