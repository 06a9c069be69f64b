//! Setup-once, loop-N pipeline execution.
//!
//! The driver walks a [`PipelinePlan`] in table order. Setup nodes run once and
//! their results stay alive for the whole run; loop nodes run once per
//! iteration against a fresh seed and their results are dropped when the
//! iteration ends. Every error aborts the run, with no retries.

use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, info_span};

use crate::core::invariants::validate_plan;
use crate::core::output::{Artifact, NodeOutput, get_value_at_index};
use crate::core::plan::{InputSpec, NodeSpec, PipelinePlan};
use crate::io::backend::{InferenceScope, NodeBackend, NodeCall, NodeInput};
use crate::seed::SeedSource;

/// Results keyed by plan node id.
type Outputs = BTreeMap<String, NodeOutput>;

/// What one iteration produced, borrowed for the duration of the callback.
#[derive(Debug)]
pub struct IterationOutcome<'a> {
    /// Iteration number (1-indexed).
    pub iter: u32,
    /// Seed drawn for this iteration, if the plan consumes one.
    pub seed: Option<u64>,
    /// Everything the plan's output node returned this iteration.
    pub output: &'a NodeOutput,
}

impl IterationOutcome<'_> {
    /// First output of the output node, if it exposes one.
    ///
    /// Nodes that only report to the host (a `{"ui": ...}` mapping, or an
    /// empty sequence) have none.
    pub fn image(&self) -> Option<Artifact> {
        get_value_at_index(self.output, 0).ok()
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub setup_invocations: usize,
    pub loop_invocations: usize,
    pub iterations: u32,
    /// Seeds in iteration order.
    pub seeds: Vec<u64>,
}

/// Run the setup phase once and the loop phase `iterations` times.
///
/// `on_iteration` sees each iteration's output node result before that
/// iteration's results are released. The result is never indexed here.
pub fn run_pipeline<B, S, F>(
    plan: &PipelinePlan,
    backend: &mut B,
    seeds: &mut S,
    iterations: u32,
    mut on_iteration: F,
) -> Result<RunSummary>
where
    B: NodeBackend + ?Sized,
    S: SeedSource + ?Sized,
    F: FnMut(&IterationOutcome<'_>),
{
    let errors = validate_plan(plan);
    if !errors.is_empty() {
        return Err(anyhow!("plan invariants failed: {}", errors.join("; ")));
    }

    let mut backend = InferenceScope::enter(backend).context("enter inference mode")?;

    let setup = run_setup(plan, &mut *backend)?;
    let mut summary = RunSummary {
        setup_invocations: setup.len(),
        loop_invocations: 0,
        iterations: 0,
        seeds: Vec::new(),
    };
    info!(nodes = summary.setup_invocations, "setup phase complete");

    for iter in 1..=iterations {
        let _span = info_span!("iteration", iter).entered();
        let seed = plan.uses_seed().then(|| seeds.next_seed());
        debug!(?seed, "starting iteration");

        let mut current = Outputs::new();
        for node in plan.loop_nodes() {
            let call = bind_call(node, &setup, &current, seed)?;
            let output = invoke(&mut *backend, &call)?;
            current.insert(node.id.clone(), output);
            summary.loop_invocations += 1;
        }

        let produced = current
            .get(&plan.output)
            .ok_or_else(|| anyhow!("output node '{}' produced no result", plan.output))?;
        on_iteration(&IterationOutcome {
            iter,
            seed,
            output: produced,
        });

        summary.iterations = iter;
        summary.seeds.extend(seed);
        // `current` drops here: no loop result outlives its iteration.
    }

    info!(
        iterations = summary.iterations,
        loop_invocations = summary.loop_invocations,
        "loop phase complete"
    );
    Ok(summary)
}

fn run_setup<B: NodeBackend + ?Sized>(plan: &PipelinePlan, backend: &mut B) -> Result<Outputs> {
    let mut setup = Outputs::new();
    let empty = Outputs::new();
    for node in plan.setup_nodes() {
        let call = bind_call(node, &setup, &empty, None)?;
        let output = invoke(backend, &call)?;
        setup.insert(node.id.clone(), output);
    }
    Ok(setup)
}

fn invoke<B: NodeBackend + ?Sized>(backend: &mut B, call: &NodeCall) -> Result<NodeOutput> {
    debug!(node = %call.node_id, class = %call.class_type, method = %call.method, "invoking");
    backend.invoke(call).with_context(|| {
        format!(
            "invoke {}.{} ({})",
            call.class_type, call.method, call.node_id
        )
    })
}

/// Bind `node`'s keyword inputs against results produced so far.
///
/// Links resolve against the current iteration first, then the setup results.
/// Extraction errors are returned as-is so callers can downcast them.
fn bind_call(
    node: &NodeSpec,
    setup: &Outputs,
    current: &Outputs,
    seed: Option<u64>,
) -> Result<NodeCall> {
    let mut inputs = BTreeMap::new();
    for (name, spec) in &node.inputs {
        let input = match spec {
            InputSpec::Literal(value) => NodeInput::Literal(value.clone()),
            InputSpec::Seed => {
                let seed = seed.ok_or_else(|| anyhow!("{}.{}: no seed drawn", node.id, name))?;
                NodeInput::Literal(seed.into())
            }
            InputSpec::Link {
                node: source,
                index,
            } => {
                let output = current
                    .get(source)
                    .or_else(|| setup.get(source))
                    .ok_or_else(|| anyhow!("{}.{}: '{}' has not run", node.id, name, source))?;
                NodeInput::Artifact(get_value_at_index(output, *index)?)
            }
        };
        inputs.insert(name.clone(), input);
    }
    Ok(NodeCall {
        node_id: node.id.clone(),
        class_type: node.class_type.clone(),
        method: node.method.clone(),
        inputs,
    })
}
