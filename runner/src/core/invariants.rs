//! Semantic plan invariants not expressible via JSON Schema.

use std::collections::HashMap;

use super::plan::{InputSpec, Phase, PipelinePlan};

/// Check plan invariants:
/// - At least one node, unique ids, non-empty class and method
/// - Links point at a node declared earlier in the table
/// - Setup nodes only link to setup nodes and never take the seed
/// - The output node exists and runs in the loop phase
pub fn validate_plan(plan: &PipelinePlan) -> Vec<String> {
    let mut errors = Vec::new();
    if plan.nodes.is_empty() {
        errors.push("plan has no nodes".to_string());
        return errors;
    }

    let mut declared: HashMap<&str, Phase> = HashMap::new();
    for node in &plan.nodes {
        if node.class_type.trim().is_empty() {
            errors.push(format!("{}: class_type must be non-empty", node.id));
        }
        if node.method.trim().is_empty() {
            errors.push(format!("{}: method must be non-empty", node.id));
        }

        for (name, input) in &node.inputs {
            match input {
                InputSpec::Literal(_) => {}
                InputSpec::Seed => {
                    if node.phase == Phase::Setup {
                        errors.push(format!(
                            "{}.{}: setup nodes cannot take the iteration seed",
                            node.id, name
                        ));
                    }
                }
                InputSpec::Link { node: target, .. } => match declared.get(target.as_str()) {
                    None if plan.node(target).is_some() => errors.push(format!(
                        "{}.{}: links to '{}' which is declared later",
                        node.id, name, target
                    )),
                    None => errors.push(format!(
                        "{}.{}: links to unknown node '{}'",
                        node.id, name, target
                    )),
                    Some(Phase::Loop) if node.phase == Phase::Setup => errors.push(format!(
                        "{}.{}: setup node links to loop node '{}'",
                        node.id, name, target
                    )),
                    Some(_) => {}
                },
            }
        }

        if declared.insert(node.id.as_str(), node.phase).is_some() {
            errors.push(format!("duplicate id '{}'", node.id));
        }
    }

    match declared.get(plan.output.as_str()) {
        None => errors.push(format!("output node '{}' not found", plan.output)),
        Some(Phase::Setup) => errors.push(format!(
            "output node '{}' must run in the loop phase",
            plan.output
        )),
        Some(Phase::Loop) => {}
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::plan::NodeSpec;

    fn plan(nodes: Vec<NodeSpec>, output: &str) -> PipelinePlan {
        PipelinePlan {
            nodes,
            output: output.to_string(),
        }
    }

    #[test]
    fn reports_empty_plan() {
        let errors = validate_plan(&plan(Vec::new(), "x"));
        assert_eq!(errors, vec!["plan has no nodes".to_string()]);
    }

    #[test]
    fn reports_duplicate_ids_and_forward_links() {
        let errors = validate_plan(&plan(
            vec![
                NodeSpec::new("a", "A", "run", Phase::Loop).link("x", "b", 0),
                NodeSpec::new("b", "B", "run", Phase::Loop),
                NodeSpec::new("b", "B", "run", Phase::Loop),
            ],
            "b",
        ));
        assert!(errors.iter().any(|e| e.contains("declared later")));
        assert!(errors.iter().any(|e| e.contains("duplicate id 'b'")));
    }

    #[test]
    fn reports_setup_depending_on_loop() {
        let errors = validate_plan(&plan(
            vec![
                NodeSpec::new("l", "L", "run", Phase::Loop),
                NodeSpec::new("s", "S", "run", Phase::Setup)
                    .link("x", "l", 0)
                    .seed("seed"),
            ],
            "l",
        ));
        assert!(errors.iter().any(|e| e.contains("setup node links to loop")));
        assert!(errors.iter().any(|e| e.contains("cannot take the iteration seed")));
    }

    #[test]
    fn reports_unknown_link_and_setup_output() {
        let errors = validate_plan(&plan(
            vec![NodeSpec::new("s", "S", "", Phase::Setup).link("x", "ghost", 0)],
            "s",
        ));
        assert!(errors.iter().any(|e| e.contains("unknown node 'ghost'")));
        assert!(errors.iter().any(|e| e.contains("method must be non-empty")));
        assert!(errors.iter().any(|e| e.contains("must run in the loop phase")));
    }
}
