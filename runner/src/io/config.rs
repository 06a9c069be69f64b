//! Runner configuration stored in `workflow-runner.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::io::bridge::BRIDGE_SCRIPT;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "workflow-runner.toml";

/// Runner configuration (TOML).
///
/// Every field is optional in the file; missing fields take the defaults that
/// reproduce the built-in workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunnerConfig {
    /// Number of loop iterations (one decoded image each).
    pub iterations: u32,

    /// Base seed for the per-iteration seed generator. Unset draws from OS entropy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Directory name of the host framework root, searched upward from the
    /// working directory.
    pub host_root_name: String,

    /// File name of the optional extra model paths declaration.
    pub extra_paths_file: String,

    pub backend: BackendKind,

    pub bridge: BridgeConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Host bridge process speaking line-delimited JSON.
    #[default]
    Bridge,
    /// In-process simulated backend (no models loaded).
    Trace,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BridgeConfig {
    /// Interpreter that runs the bundled bridge script (the host's Python).
    pub python: String,
    /// Full command replacing the bundled script. Run from the host root when found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            command: None,
        }
    }
}

impl BridgeConfig {
    /// Command line that starts the bridge.
    pub fn command_line(&self) -> Vec<String> {
        match &self.command {
            Some(command) => command.clone(),
            None => vec![
                self.python.clone(),
                "-u".to_string(),
                "-c".to_string(),
                BRIDGE_SCRIPT.to_string(),
            ],
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            seed: None,
            host_root_name: "ComfyUI".to_string(),
            extra_paths_file: "extra_model_paths.yaml".to_string(),
            backend: BackendKind::default(),
            bridge: BridgeConfig::default(),
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(anyhow!("iterations must be > 0"));
        }
        if self.host_root_name.trim().is_empty() {
            return Err(anyhow!("host_root_name must be non-empty"));
        }
        if self.extra_paths_file.trim().is_empty() {
            return Err(anyhow!("extra_paths_file must be non-empty"));
        }
        if self.bridge.python.trim().is_empty() {
            return Err(anyhow!("bridge.python must be non-empty"));
        }
        if let Some(command) = &self.bridge.command {
            let program = command.first().map(|p| p.trim()).unwrap_or_default();
            if program.is_empty() {
                return Err(anyhow!("bridge.command must be a non-empty array"));
            }
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `RunnerConfig::default()`.
pub fn load_config(path: &Path) -> Result<RunnerConfig> {
    if !path.exists() {
        let cfg = RunnerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RunnerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Write config to disk as pretty TOML.
pub fn write_config(path: &Path, cfg: &RunnerConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    fs::write(path, buf).with_context(|| format!("write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, RunnerConfig::default());
        assert_eq!(cfg.iterations, 10);
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        let cfg = RunnerConfig {
            seed: Some(42),
            backend: BackendKind::Trace,
            ..RunnerConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "iterations = 3\n\n[bridge]\ncommand = [\"bridge\"]\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.iterations, 3);
        assert_eq!(cfg.bridge.command, Some(vec!["bridge".to_string()]));
        assert_eq!(cfg.bridge.command_line(), vec!["bridge"]);
        assert_eq!(cfg.host_root_name, "ComfyUI");
        assert_eq!(cfg.backend, BackendKind::Bridge);
    }

    #[test]
    fn default_bridge_runs_bundled_script() {
        let cfg = RunnerConfig::default();
        let command = cfg.bridge.command_line();
        assert_eq!(&command[..3], &["python3", "-u", "-c"]);
        assert_eq!(command[3], BRIDGE_SCRIPT);
        assert!(BRIDGE_SCRIPT.contains("NODE_CLASS_MAPPINGS"));
    }

    #[test]
    fn empty_bridge_command_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[bridge]\ncommand = []\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("bridge.command must be a non-empty array"));
    }

    #[test]
    fn zero_iterations_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "iterations = 0\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("iterations must be > 0"));
    }
}
