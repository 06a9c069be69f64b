//! Plan load/save helpers with schema + invariant validation.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use jsonschema::Draft;
use serde_json::Value;

use crate::core::invariants::validate_plan;
use crate::core::plan::PipelinePlan;

pub const PLAN_SCHEMA: &str = include_str!("../../schemas/pipeline_plan.schema.json");

/// Load and validate a plan from disk (schema + invariants).
pub fn load_plan(path: &Path) -> Result<PipelinePlan> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read plan {}", path.display()))?;
    parse_plan(&contents).with_context(|| format!("load plan {}", path.display()))
}

/// Parse plan JSON, checking it against [`PLAN_SCHEMA`] before deserializing.
pub fn parse_plan(contents: &str) -> Result<PipelinePlan> {
    let value: Value = serde_json::from_str(contents).context("parse plan json")?;
    validate_schema(&value)?;
    let plan: PipelinePlan = serde_json::from_value(value).context("deserialize plan")?;
    let errors = validate_plan(&plan);
    if !errors.is_empty() {
        return Err(anyhow!("plan invariants failed: {}", errors.join("; ")));
    }
    Ok(plan)
}

/// Serialize `plan` to pretty-printed JSON with trailing newline.
pub fn render_plan(plan: &PipelinePlan) -> Result<String> {
    let mut buf = serde_json::to_string_pretty(plan).context("serialize plan")?;
    buf.push('\n');
    Ok(buf)
}

fn validate_schema(instance: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(PLAN_SCHEMA).context("parse plan schema")?;
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .map_err(|err| anyhow!("invalid plan schema: {err}"))?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        return Err(anyhow!(
            "plan schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::workflow::default_plan;

    #[test]
    fn default_plan_survives_render_and_load() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("plan.json");
        let plan = default_plan();
        fs::write(&path, render_plan(&plan).expect("render")).expect("write");
        let loaded = load_plan(&path).expect("load");
        assert_eq!(loaded, plan);
    }

    #[test]
    fn schema_rejects_unknown_phase() {
        let err = parse_plan(
            r#"{"nodes":[{"id":"a","class_type":"A","method":"m","phase":"later"}],"output":"a"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("plan schema validation failed"));
    }

    #[test]
    fn invariants_checked_after_schema() {
        let err = parse_plan(
            r#"{"nodes":[{"id":"a","class_type":"A","method":"m","phase":"setup"}],"output":"a"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("must run in the loop phase"));
    }
}
