//! One-time environment setup run before any node is constructed.
//!
//! Two ordered steps: locate the host framework root and add it to the
//! process search path, then locate and apply the optional extra model paths
//! file. Both searches walk upward from the start directory. Neither missing
//! entry is fatal here; a missing host root only surfaces later, when the
//! backend cannot resolve node implementations.
//!
//! Call [`bootstrap`] at most once per process. Running a step twice appends
//! duplicate search path entries.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::io::extra_paths::load_extra_path_config;
use crate::io::find_path::find_path;
use crate::io::model_paths::ModelPaths;

/// Names searched for during bootstrap.
#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    /// Directory the upward searches start from.
    pub start: PathBuf,
    pub host_root_name: String,
    pub extra_paths_file: String,
}

/// Search paths accumulated by bootstrap and handed to the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    /// Host root, if one was found.
    pub host_root: Option<PathBuf>,
    /// Process search path (host root appended when found).
    pub search_path: Vec<PathBuf>,
    pub model_paths: ModelPaths,
}

/// Bootstrap result plus human-readable notices for stdout.
#[derive(Debug, Clone, Default)]
pub struct Bootstrap {
    pub env: Environment,
    pub notices: Vec<String>,
}

/// Run both bootstrap steps in order.
pub fn bootstrap(options: &BootstrapOptions) -> Result<Bootstrap> {
    let mut boot = Bootstrap::default();
    add_host_root_to_search_path(&mut boot, &options.host_root_name, &options.start)?;
    add_extra_model_paths(&mut boot, &options.extra_paths_file, &options.start)?;
    info!(
        host_root = ?boot.env.host_root,
        folders = boot.env.model_paths.folders().count(),
        "bootstrap complete"
    );
    Ok(boot)
}

/// Find `name` upward from `start`; if it is a directory, append it to the
/// search path and register its default model folders.
pub fn add_host_root_to_search_path(
    boot: &mut Bootstrap,
    name: &str,
    start: &Path,
) -> Result<Option<PathBuf>> {
    let found =
        find_path(name, Some(start)).with_context(|| format!("search for {name}"))?;
    let Some(path) = found else {
        debug!(name, "host root not found");
        boot.notices.push(format!("Could not find {name}."));
        return Ok(None);
    };
    boot.notices.push(format!("{name} found: {}", path.display()));
    if !path.is_dir() {
        debug!(path = %path.display(), "host root is not a directory");
        return Ok(None);
    }

    boot.env.search_path.push(path.clone());
    boot.env.model_paths.add_host_defaults(&path);
    boot.env.host_root = Some(path.clone());
    boot.notices
        .push(format!("'{}' added to search path", path.display()));
    Ok(Some(path))
}

/// Find `name` upward from `start` and apply it with the host's loader.
pub fn add_extra_model_paths(
    boot: &mut Bootstrap,
    name: &str,
    start: &Path,
) -> Result<Option<PathBuf>> {
    let found =
        find_path(name, Some(start)).with_context(|| format!("search for {name}"))?;
    let Some(path) = found else {
        boot.notices
            .push("Could not find the extra_model_paths config file.".to_string());
        return Ok(None);
    };
    boot.notices.push(format!("{name} found: {}", path.display()));
    let registered = load_extra_path_config(&path, &mut boot.env.model_paths)?;
    debug!(path = %path.display(), registered, "extra model paths applied");
    Ok(Some(path))
}
