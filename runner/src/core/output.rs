//! Node results and positional artifact extraction.
//!
//! A node returns either a plain sequence of artifacts or a mapping whose
//! `"result"` entry holds that sequence (the mapping form lets a node attach
//! extra payloads such as `"ui"` previews). Callers address outputs by
//! position and never need to know which form a node uses.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Key under which mapping-shaped results nest their output sequence.
pub const RESULT_KEY: &str = "result";

/// Opaque handle to something a node produced (model weights, latent,
/// embedding, image, control signal). Only the backend that minted it knows
/// what it refers to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Artifact(pub Value);

impl Artifact {
    pub fn new(value: impl Into<Value>) -> Self {
        Self(value.into())
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// Everything a single node invocation returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeOutput {
    Sequence(Vec<Artifact>),
    Mapping(Map<String, Value>),
}

impl NodeOutput {
    /// Build a mapping-shaped result holding `outputs` under `"result"`.
    pub fn with_result_key(outputs: Vec<Artifact>) -> Self {
        let mut map = Map::new();
        map.insert(
            RESULT_KEY.to_string(),
            Value::Array(outputs.into_iter().map(|a| a.0).collect()),
        );
        NodeOutput::Mapping(map)
    }
}

/// Failure to extract a positional output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("index {index} out of range for sequence of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("missing key '{0}'")]
    MissingKey(String),
    #[error("value under key '{0}' is not a sequence")]
    NotASequence(String),
}

/// Return the artifact at `index` in `output`.
///
/// Sequences are indexed directly; an out-of-range index is an error and never
/// consults `"result"`. Mappings are first looked up by the positional key
/// (spelled `"{index}"` on the wire) and otherwise fall back to
/// `output["result"][index]`.
pub fn get_value_at_index(output: &NodeOutput, index: usize) -> Result<Artifact, AccessError> {
    match output {
        NodeOutput::Sequence(items) => items
            .get(index)
            .cloned()
            .ok_or(AccessError::IndexOutOfRange {
                index,
                len: items.len(),
            }),
        NodeOutput::Mapping(map) => {
            if let Some(value) = map.get(&index.to_string()) {
                return Ok(Artifact(value.clone()));
            }
            let nested = map
                .get(RESULT_KEY)
                .ok_or_else(|| AccessError::MissingKey(RESULT_KEY.to_string()))?;
            let items = nested
                .as_array()
                .ok_or_else(|| AccessError::NotASequence(RESULT_KEY.to_string()))?;
            items
                .get(index)
                .cloned()
                .map(Artifact)
                .ok_or(AccessError::IndexOutOfRange {
                    index,
                    len: items.len(),
                })
        }
    }
}
