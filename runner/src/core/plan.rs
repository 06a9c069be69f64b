//! Declarative pipeline plan consumed by the driver.
//!
//! A plan is an ordered table of node specs. Each spec names the node class and
//! method to invoke, the phase it belongs to, and its keyword inputs. Inputs are
//! literals, links to an earlier node's positional output, or the per-iteration
//! seed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// When a node runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Invoked once before the loop; its result is shared by every iteration.
    Setup,
    /// Invoked once per iteration; its result is dropped when the iteration ends.
    Loop,
}

/// A single keyword input of a node spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSpec {
    /// Fixed configuration value passed through unchanged.
    Literal(Value),
    /// Positional output `index` of the node with id `node`.
    Link { node: String, index: usize },
    /// The seed drawn for the current iteration.
    Seed,
}

/// A file a node loads by name from one of the host's model folders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Model folder to search (e.g. `checkpoints`).
    pub folder: String,
    /// Input whose literal value is the file name.
    pub input: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    pub class_type: String,
    pub method: String,
    pub phase: Phase,
    #[serde(default)]
    pub inputs: BTreeMap<String, InputSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceRef>,
}

impl NodeSpec {
    pub fn new(id: &str, class_type: &str, method: &str, phase: Phase) -> Self {
        Self {
            id: id.to_string(),
            class_type: class_type.to_string(),
            method: method.to_string(),
            phase,
            inputs: BTreeMap::new(),
            resource: None,
        }
    }

    pub fn literal(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.inputs
            .insert(name.to_string(), InputSpec::Literal(value.into()));
        self
    }

    pub fn link(mut self, name: &str, node: &str, index: usize) -> Self {
        self.inputs.insert(
            name.to_string(),
            InputSpec::Link {
                node: node.to_string(),
                index,
            },
        );
        self
    }

    pub fn seed(mut self, name: &str) -> Self {
        self.inputs.insert(name.to_string(), InputSpec::Seed);
        self
    }

    /// Mark the literal input `input` as a file name inside model folder `folder`.
    pub fn loads(mut self, folder: &str, input: &str) -> Self {
        self.resource = Some(ResourceRef {
            folder: folder.to_string(),
            input: input.to_string(),
        });
        self
    }

    /// Literal value of the resource input, when it is a string.
    pub fn resource_name(&self) -> Option<&str> {
        let resource = self.resource.as_ref()?;
        match self.inputs.get(&resource.input)? {
            InputSpec::Literal(Value::String(name)) => Some(name),
            _ => None,
        }
    }
}

/// Ordered node table plus the loop node whose first output is the final image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelinePlan {
    pub nodes: Vec<NodeSpec>,
    pub output: String,
}

impl PipelinePlan {
    pub fn node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn setup_nodes(&self) -> impl Iterator<Item = &NodeSpec> {
        self.nodes.iter().filter(|node| node.phase == Phase::Setup)
    }

    pub fn loop_nodes(&self) -> impl Iterator<Item = &NodeSpec> {
        self.nodes.iter().filter(|node| node.phase == Phase::Loop)
    }

    /// True if any loop node consumes the per-iteration seed.
    pub fn uses_seed(&self) -> bool {
        self.loop_nodes()
            .any(|node| node.inputs.values().any(|i| matches!(i, InputSpec::Seed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn input_specs_use_externally_tagged_json() {
        let spec = NodeSpec::new("s", "KSampler", "sample", Phase::Loop)
            .literal("steps", 20)
            .link("model", "ckpt", 0)
            .seed("seed");
        let value = serde_json::to_value(&spec).expect("serialize");
        assert_eq!(
            value,
            json!({
                "id": "s",
                "class_type": "KSampler",
                "method": "sample",
                "phase": "loop",
                "inputs": {
                    "model": {"link": {"node": "ckpt", "index": 0}},
                    "seed": "seed",
                    "steps": {"literal": 20}
                }
            })
        );
    }

    #[test]
    fn resource_name_reads_string_literal() {
        let spec = NodeSpec::new("vae", "VAELoader", "load_vae", Phase::Setup)
            .literal("vae_name", "vae.safetensors")
            .loads("vae", "vae_name");
        assert_eq!(spec.resource_name(), Some("vae.safetensors"));

        let linked = NodeSpec::new("x", "VAELoader", "load_vae", Phase::Setup)
            .link("vae_name", "other", 0)
            .loads("vae", "vae_name");
        assert_eq!(linked.resource_name(), None);
    }
}
