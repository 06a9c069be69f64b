//! Registry of model folder search paths.
//!
//! Nodes load weights and images by bare file name; the host resolves those
//! names against an ordered list of directories per folder (`checkpoints`,
//! `controlnet`, ...). The registry is populated from the host root and from
//! the optional extra-paths file, then handed to the backend.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

/// Folders registered relative to a host root.
pub const HOST_DEFAULT_FOLDERS: [(&str, &str); 5] = [
    ("checkpoints", "models/checkpoints"),
    ("controlnet", "models/controlnet"),
    ("vae", "models/vae"),
    ("input", "input"),
    ("output", "output"),
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ModelPaths {
    folders: BTreeMap<String, Vec<PathBuf>>,
}

impl ModelPaths {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `dir` for `folder`. Default paths are searched first.
    ///
    /// Re-adding a known directory as default moves it to the front. Returns
    /// `true` only when `dir` was not registered for `folder` before.
    pub fn add(&mut self, folder: &str, dir: impl Into<PathBuf>, is_default: bool) -> bool {
        let dir = dir.into();
        debug!(folder, dir = %dir.display(), is_default, "adding model folder path");
        let dirs = self.folders.entry(folder.to_string()).or_default();
        if let Some(pos) = dirs.iter().position(|known| *known == dir) {
            if is_default && pos != 0 {
                let existing = dirs.remove(pos);
                dirs.insert(0, existing);
            }
            return false;
        }
        if is_default {
            dirs.insert(0, dir);
        } else {
            dirs.push(dir);
        }
        true
    }

    /// Register the standard folder layout under a host root.
    pub fn add_host_defaults(&mut self, host_root: &Path) {
        for (folder, relative) in HOST_DEFAULT_FOLDERS {
            self.add(folder, host_root.join(relative), false);
        }
    }

    pub fn dirs(&self, folder: &str) -> &[PathBuf] {
        self.folders.get(folder).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn folders(&self) -> impl Iterator<Item = &str> {
        self.folders.keys().map(String::as_str)
    }

    /// First `dir/name` that exists as a file, in search order.
    pub fn resolve(&self, folder: &str, name: &str) -> Option<PathBuf> {
        self.dirs(folder)
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn default_paths_are_prepended_and_deduplicated() {
        let mut paths = ModelPaths::new();
        paths.add("checkpoints", "/b", false);
        paths.add("checkpoints", "/a", true);
        paths.add("checkpoints", "/b", false);
        assert_eq!(
            paths.dirs("checkpoints"),
            &[PathBuf::from("/a"), PathBuf::from("/b")]
        );
        assert!(paths.dirs("vae").is_empty());
    }

    #[test]
    fn re_adding_as_default_moves_to_front() {
        let mut paths = ModelPaths::new();
        assert!(paths.add("vae", "/a", false));
        assert!(paths.add("vae", "/b", false));
        assert!(!paths.add("vae", "/b", true));
        assert_eq!(paths.dirs("vae"), &[PathBuf::from("/b"), PathBuf::from("/a")]);

        assert!(!paths.add("vae", "/a", false));
        assert_eq!(paths.dirs("vae"), &[PathBuf::from("/b"), PathBuf::from("/a")]);
    }

    #[test]
    fn resolve_returns_first_existing_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let first = temp.path().join("first");
        let second = temp.path().join("second");
        fs::create_dir_all(&first).expect("mkdir");
        fs::create_dir_all(&second).expect("mkdir");
        fs::write(second.join("model.pth"), "").expect("write");

        let mut paths = ModelPaths::new();
        paths.add("controlnet", &first, false);
        paths.add("controlnet", &second, false);

        assert_eq!(
            paths.resolve("controlnet", "model.pth"),
            Some(second.join("model.pth"))
        );
        assert_eq!(paths.resolve("controlnet", "other.pth"), None);
    }

    #[test]
    fn host_defaults_cover_workflow_folders() {
        let mut paths = ModelPaths::new();
        paths.add_host_defaults(Path::new("/opt/ComfyUI"));
        assert_eq!(
            paths.dirs("vae"),
            &[PathBuf::from("/opt/ComfyUI/models/vae")]
        );
        let folders: Vec<&str> = paths.folders().collect();
        assert_eq!(
            folders,
            vec!["checkpoints", "controlnet", "input", "output", "vae"]
        );
    }
}
