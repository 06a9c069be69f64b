//! Loader for the host's optional `extra_model_paths.yaml`.
//!
//! Each top-level section may set `base_path` and `is_default`; every other key
//! is a model folder whose value lists one directory per line.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde_yaml::Value;
use tracing::{debug, info};

use super::model_paths::ModelPaths;

const BASE_PATH_KEY: &str = "base_path";
const IS_DEFAULT_KEY: &str = "is_default";

/// Parse `yaml_path` and register every listed folder path in `paths`.
///
/// Returns the number of paths registered.
pub fn load_extra_path_config(yaml_path: &Path, paths: &mut ModelPaths) -> Result<usize> {
    let contents = fs::read_to_string(yaml_path)
        .with_context(|| format!("read {}", yaml_path.display()))?;
    let yaml_dir = absolute_parent(yaml_path)?;
    apply_extra_path_config(&contents, &yaml_dir, paths)
        .with_context(|| format!("parse {}", yaml_path.display()))
}

/// Apply config text as if it lived in `yaml_dir`.
pub fn apply_extra_path_config(
    contents: &str,
    yaml_dir: &Path,
    paths: &mut ModelPaths,
) -> Result<usize> {
    let sections: BTreeMap<String, Option<BTreeMap<String, Value>>> =
        serde_yaml::from_str(contents)?;
    let mut registered = 0usize;

    for (section, conf) in sections {
        let Some(mut conf) = conf else {
            debug!(section = %section, "skipping empty section");
            continue;
        };

        let base_path = match conf.remove(BASE_PATH_KEY) {
            Some(value) => {
                let raw = scalar_string(&value)
                    .ok_or_else(|| anyhow!("{section}.{BASE_PATH_KEY} must be a string"))?;
                let expanded = expand_home(&raw);
                Some(if expanded.is_absolute() {
                    expanded
                } else {
                    normalize(&yaml_dir.join(expanded))
                })
            }
            None => None,
        };
        let is_default = match conf.remove(IS_DEFAULT_KEY) {
            Some(Value::Bool(flag)) => flag,
            Some(Value::Null) | None => false,
            Some(other) => {
                return Err(anyhow!(
                    "{section}.{IS_DEFAULT_KEY} must be a boolean, got {other:?}"
                ));
            }
        };

        for (folder, value) in conf {
            let listing = scalar_string(&value)
                .ok_or_else(|| anyhow!("{section}.{folder} must be a string"))?;
            for line in listing.split('\n') {
                if line.is_empty() {
                    continue;
                }
                let full_path = match &base_path {
                    Some(base) => base.join(line),
                    None if Path::new(line).is_absolute() => PathBuf::from(line),
                    None => yaml_dir.join(line),
                };
                if paths.add(&folder, normalize(&full_path), is_default) {
                    registered += 1;
                }
            }
        }
        info!(section = %section, "applied extra model paths section");
    }

    Ok(registered)
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn absolute_parent(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().context("resolve current directory")?.join(path)
    };
    Ok(absolute
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/")))
}

fn expand_home(raw: &str) -> PathBuf {
    if raw == "~" || raw.starts_with("~/") {
        if let Some(home) = env::var_os("HOME") {
            return PathBuf::from(home).join(raw.trim_start_matches('~').trim_start_matches('/'));
        }
    }
    PathBuf::from(raw)
}

/// Lexically collapse `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
comfyui:
    base_path: ../shared/
    is_default: true
    checkpoints: models/checkpoints/
    controlnet: |
        models/controlnet/
        extra/controlnet/

a111:
    vae: /mnt/models/VAE

empty:
"#;

    #[test]
    fn applies_sections_relative_to_yaml_dir() {
        let mut paths = ModelPaths::new();
        paths.add("checkpoints", "/host/models/checkpoints", false);
        let registered =
            apply_extra_path_config(SAMPLE, Path::new("/work/config"), &mut paths).expect("apply");

        assert_eq!(registered, 4);
        assert_eq!(
            paths.dirs("checkpoints"),
            &[
                PathBuf::from("/work/shared/models/checkpoints"),
                PathBuf::from("/host/models/checkpoints"),
            ]
        );
        assert_eq!(
            paths.dirs("controlnet"),
            &[
                PathBuf::from("/work/shared/extra/controlnet"),
                PathBuf::from("/work/shared/models/controlnet"),
            ]
        );
        assert_eq!(paths.dirs("vae"), &[PathBuf::from("/mnt/models/VAE")]);
    }

    #[test]
    fn relative_entries_without_base_resolve_against_yaml_dir() {
        let mut paths = ModelPaths::new();
        apply_extra_path_config("local:\n  loras: ./loras\n", Path::new("/cfg"), &mut paths)
            .expect("apply");
        assert_eq!(paths.dirs("loras"), &[PathBuf::from("/cfg/loras")]);
    }

    #[test]
    fn rejects_non_boolean_is_default() {
        let mut paths = ModelPaths::new();
        let err = apply_extra_path_config(
            "x:\n  is_default: [1]\n  vae: /v\n",
            Path::new("/cfg"),
            &mut paths,
        )
        .unwrap_err();
        assert!(err.to_string().contains("is_default must be a boolean"));
    }

    #[test]
    fn duplicate_entries_are_not_counted() {
        let mut paths = ModelPaths::new();
        paths.add("vae", "/host/models/vae", false);
        let registered = apply_extra_path_config(
            "a:\n  vae: |\n    /host/models/vae\n    /extra/vae\n    /extra/vae\n",
            Path::new("/cfg"),
            &mut paths,
        )
        .expect("apply");
        assert_eq!(registered, 1);
        assert_eq!(
            paths.dirs("vae"),
            &[PathBuf::from("/host/models/vae"), PathBuf::from("/extra/vae")]
        );
    }

    #[test]
    fn load_reads_file_from_disk() {
        let temp = tempfile::tempdir().expect("tempdir");
        let yaml = temp.path().join("extra_model_paths.yaml");
        fs::write(&yaml, "site:\n  vae: vae_dir\n").expect("write");

        let mut paths = ModelPaths::new();
        let registered = load_extra_path_config(&yaml, &mut paths).expect("load");
        assert_eq!(registered, 1);
        assert_eq!(paths.dirs("vae"), &[temp.path().join("vae_dir")]);
    }
}
