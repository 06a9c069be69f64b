//! Node backend abstraction.
//!
//! The [`NodeBackend`] trait decouples the pipeline driver from whatever
//! actually executes nodes (a host bridge process, or the in-process trace
//! backend). Tests use scripted or failing backends without spawning processes.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::output::{Artifact, NodeOutput};

/// A keyword input bound for one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeInput {
    Literal(Value),
    Artifact(Artifact),
}

/// One invocation of a node method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeCall {
    /// Plan id of the node (stable across iterations).
    pub node_id: String,
    pub class_type: String,
    pub method: String,
    pub inputs: BTreeMap<String, NodeInput>,
}

impl NodeCall {
    pub fn literal(&self, name: &str) -> Option<&Value> {
        match self.inputs.get(name)? {
            NodeInput::Literal(value) => Some(value),
            NodeInput::Artifact(_) => None,
        }
    }

    pub fn artifact(&self, name: &str) -> Option<&Artifact> {
        match self.inputs.get(name)? {
            NodeInput::Artifact(artifact) => Some(artifact),
            NodeInput::Literal(_) => None,
        }
    }
}

/// Abstraction over node execution backends.
pub trait NodeBackend {
    /// Invoke `call.method` on an instance of `call.class_type`.
    ///
    /// Instances are owned by the backend and may be reused across calls.
    fn invoke(&mut self, call: &NodeCall) -> Result<NodeOutput>;

    /// Enable or disable inference mode (no gradient/state tracking) for
    /// subsequent invocations.
    fn set_inference_mode(&mut self, _enabled: bool) -> Result<()> {
        Ok(())
    }
}

/// Holds a backend in inference mode until dropped.
///
/// Release happens on every exit path, including early returns through `?`.
/// A failure to leave inference mode is logged since `Drop` cannot return it.
pub struct InferenceScope<'a, B: NodeBackend + ?Sized> {
    backend: &'a mut B,
}

impl<'a, B: NodeBackend + ?Sized> InferenceScope<'a, B> {
    pub fn enter(backend: &'a mut B) -> Result<Self> {
        backend.set_inference_mode(true)?;
        debug!("entered inference mode");
        Ok(Self { backend })
    }
}

impl<B: NodeBackend + ?Sized> Deref for InferenceScope<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        &*self.backend
    }
}

impl<B: NodeBackend + ?Sized> DerefMut for InferenceScope<'_, B> {
    fn deref_mut(&mut self) -> &mut B {
        &mut *self.backend
    }
}

impl<B: NodeBackend + ?Sized> Drop for InferenceScope<'_, B> {
    fn drop(&mut self) {
        match self.backend.set_inference_mode(false) {
            Ok(()) => debug!("left inference mode"),
            Err(err) => warn!(err = %err, "failed to leave inference mode"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[derive(Default)]
    struct ModeRecorder {
        transitions: Vec<bool>,
        fail_invoke: bool,
    }

    impl NodeBackend for ModeRecorder {
        fn invoke(&mut self, _call: &NodeCall) -> Result<NodeOutput> {
            if self.fail_invoke {
                return Err(anyhow!("boom"));
            }
            Ok(NodeOutput::Sequence(Vec::new()))
        }

        fn set_inference_mode(&mut self, enabled: bool) -> Result<()> {
            self.transitions.push(enabled);
            Ok(())
        }
    }

    fn call() -> NodeCall {
        NodeCall {
            node_id: "n".to_string(),
            class_type: "C".to_string(),
            method: "m".to_string(),
            inputs: BTreeMap::new(),
        }
    }

    fn invoke_in_scope(backend: &mut ModeRecorder) -> Result<NodeOutput> {
        let mut scope = InferenceScope::enter(backend)?;
        let out = scope.invoke(&call())?;
        Ok(out)
    }

    #[test]
    fn scope_releases_on_success() {
        let mut backend = ModeRecorder::default();
        invoke_in_scope(&mut backend).expect("invoke");
        assert_eq!(backend.transitions, vec![true, false]);
    }

    #[test]
    fn scope_releases_on_error() {
        let mut backend = ModeRecorder {
            fail_invoke: true,
            ..ModeRecorder::default()
        };
        assert!(invoke_in_scope(&mut backend).is_err());
        assert_eq!(backend.transitions, vec![true, false]);
    }

    #[test]
    fn inputs_serialize_with_kind_tags() {
        let mut c = call();
        c.inputs
            .insert("steps".to_string(), NodeInput::Literal(Value::from(20)));
        c.inputs.insert(
            "model".to_string(),
            NodeInput::Artifact(Artifact::new("h1")),
        );
        let value = serde_json::to_value(&c).expect("serialize");
        assert_eq!(value["inputs"]["steps"], serde_json::json!({"literal": 20}));
        assert_eq!(value["inputs"]["model"], serde_json::json!({"artifact": "h1"}));
        assert_eq!(c.literal("steps"), Some(&Value::from(20)));
        assert_eq!(c.artifact("model"), Some(&Artifact::new("h1")));
    }
}
