//! Resolve every file a plan loads without invoking any node.

use std::path::PathBuf;

use crate::core::plan::PipelinePlan;
use crate::io::model_paths::ModelPaths;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceCheck {
    pub node_id: String,
    pub folder: String,
    pub name: String,
    /// Resolved location, or `None` if no registered directory holds the file.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreflightReport {
    pub checks: Vec<ResourceCheck>,
}

impl PreflightReport {
    pub fn missing(&self) -> impl Iterator<Item = &ResourceCheck> {
        self.checks.iter().filter(|check| check.path.is_none())
    }

    pub fn is_complete(&self) -> bool {
        self.missing().next().is_none()
    }
}

/// Check each node that declares a resource against `model_paths`.
///
/// Nodes whose resource input is not a string literal are skipped.
pub fn preflight(plan: &PipelinePlan, model_paths: &ModelPaths) -> PreflightReport {
    let checks = plan
        .nodes
        .iter()
        .filter_map(|node| {
            let resource = node.resource.as_ref()?;
            let name = node.resource_name()?;
            Some(ResourceCheck {
                node_id: node.id.clone(),
                folder: resource.folder.clone(),
                name: name.to_string(),
                path: model_paths.resolve(&resource.folder, name),
            })
        })
        .collect();
    PreflightReport { checks }
}
