//! In-process backend that simulates node execution.
//!
//! Every invocation mints synthetic handle artifacts (one per declared output
//! of the node class) and is recorded in call order. No models are loaded, so
//! this backend validates wiring and loop behavior without a host install.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use serde_json::json;
use tracing::{debug, instrument};

use crate::core::output::{Artifact, NodeOutput};
use crate::io::backend::{NodeBackend, NodeCall};

/// Output arity of the node classes the built-in workflow uses.
const KNOWN_ARITY: [(&str, usize); 9] = [
    ("CheckpointLoaderSimple", 3),
    ("EmptyLatentImage", 1),
    ("CLIPTextEncode", 1),
    ("ControlNetLoader", 1),
    ("LoadImage", 2),
    ("VAELoader", 1),
    ("ControlNetApplyAdvanced", 2),
    ("KSampler", 1),
    ("VAEDecode", 1),
];

#[derive(Debug, Clone)]
pub struct TraceBackend {
    arity: BTreeMap<String, usize>,
    mapping_classes: BTreeSet<String>,
    calls: Vec<NodeCall>,
    inference_mode: bool,
    mode_changes: usize,
}

impl Default for TraceBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceBackend {
    pub fn new() -> Self {
        Self {
            arity: KNOWN_ARITY
                .iter()
                .map(|(class, n)| (class.to_string(), *n))
                .collect(),
            mapping_classes: BTreeSet::new(),
            calls: Vec::new(),
            inference_mode: false,
            mode_changes: 0,
        }
    }

    /// Override the number of outputs minted for `class_type` (default 1).
    pub fn with_arity(mut self, class_type: &str, outputs: usize) -> Self {
        self.arity.insert(class_type.to_string(), outputs);
        self
    }

    /// Return `{"ui": ..., "result": [...]}` instead of a plain sequence for `class_type`.
    pub fn with_mapping_output(mut self, class_type: &str) -> Self {
        self.mapping_classes.insert(class_type.to_string());
        self
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> &[NodeCall] {
        &self.calls
    }

    pub fn calls_for(&self, node_id: &str) -> impl Iterator<Item = &NodeCall> {
        self.calls.iter().filter(move |call| call.node_id == node_id)
    }

    pub fn inference_mode(&self) -> bool {
        self.inference_mode
    }

    /// Number of inference-mode transitions seen.
    pub fn mode_changes(&self) -> usize {
        self.mode_changes
    }
}

impl NodeBackend for TraceBackend {
    #[instrument(skip_all, fields(node = %call.node_id, class = %call.class_type))]
    fn invoke(&mut self, call: &NodeCall) -> Result<NodeOutput> {
        let seq = self.calls.len();
        let outputs = self.arity.get(&call.class_type).copied().unwrap_or(1);
        let artifacts: Vec<Artifact> = (0..outputs)
            .map(|slot| {
                Artifact::new(json!({
                    "node": call.node_id,
                    "class_type": call.class_type,
                    "call": seq,
                    "slot": slot,
                }))
            })
            .collect();
        debug!(seq, outputs, "traced invocation");
        self.calls.push(call.clone());

        if self.mapping_classes.contains(&call.class_type) {
            return Ok(NodeOutput::with_result_key(artifacts));
        }
        Ok(NodeOutput::Sequence(artifacts))
    }

    fn set_inference_mode(&mut self, enabled: bool) -> Result<()> {
        self.inference_mode = enabled;
        self.mode_changes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::output::get_value_at_index;

    fn call(node_id: &str, class_type: &str) -> NodeCall {
        NodeCall {
            node_id: node_id.to_string(),
            class_type: class_type.to_string(),
            method: "run".to_string(),
            inputs: BTreeMap::new(),
        }
    }

    #[test]
    fn mints_one_handle_per_declared_output() {
        let mut backend = TraceBackend::new();
        let out = backend
            .invoke(&call("ckpt", "CheckpointLoaderSimple"))
            .expect("invoke");
        let clip = get_value_at_index(&out, 1).expect("clip");
        assert_eq!(clip.as_value()["slot"], 1);
        assert!(get_value_at_index(&out, 3).is_err());
        assert_eq!(backend.calls().len(), 1);
    }

    #[test]
    fn mapping_output_is_reachable_through_result_key() {
        let mut backend = TraceBackend::new().with_mapping_output("VAEDecode");
        let out = backend.invoke(&call("decode", "VAEDecode")).expect("invoke");
        assert!(matches!(out, NodeOutput::Mapping(_)));
        let image = get_value_at_index(&out, 0).expect("image");
        assert_eq!(image.as_value()["node"], "decode");
    }

    #[test]
    fn unknown_classes_default_to_single_output() {
        let mut backend = TraceBackend::new().with_arity("Custom", 4);
        let custom = backend.invoke(&call("c", "Custom")).expect("invoke");
        let other = backend.invoke(&call("o", "Other")).expect("invoke");
        assert!(get_value_at_index(&custom, 3).is_ok());
        assert!(get_value_at_index(&other, 1).is_err());
        assert_eq!(backend.calls_for("c").count(), 1);
    }
}
