//! Upward filesystem search used to anchor relative resource loading.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Search `start` and then each ancestor directory for an entry named `name`.
///
/// `start` defaults to the current working directory. Each step reads exactly
/// one directory listing. Returns `Ok(None)` once the filesystem root has been
/// searched without a match; listing errors (e.g. permission denied) propagate.
pub fn find_path(name: &str, start: Option<&Path>) -> io::Result<Option<PathBuf>> {
    let mut current = match start {
        Some(path) => path.to_path_buf(),
        None => env::current_dir()?,
    };

    loop {
        if dir_contains(&current, name)? {
            let found = current.join(name);
            debug!(name, path = %found.display(), "found path");
            return Ok(Some(found));
        }

        // `parent()` is `None` at the root (and for a bare relative component),
        // which is the point where the parent would equal the current directory.
        match current.parent() {
            Some(parent) if parent != current && !parent.as_os_str().is_empty() => {
                current = parent.to_path_buf();
            }
            _ => {
                debug!(name, "reached filesystem root without a match");
                return Ok(None);
            }
        }
    }
}

fn dir_contains(dir: &Path, name: &str) -> io::Result<bool> {
    for entry in fs::read_dir(dir)? {
        if entry?.file_name() == name {
            return Ok(true);
        }
    }
    Ok(false)
}
