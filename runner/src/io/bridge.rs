//! Backend that drives a host bridge process over line-delimited JSON.
//!
//! Each request is one JSON object on the bridge's stdin; the bridge answers
//! with exactly one JSON object on stdout:
//!
//! ```text
//! -> {"op":"configure","search_path":[...],"model_paths":{...}}
//! -> {"op":"inference_mode","enabled":true}
//! -> {"op":"invoke","node_id":"sampler","class_type":"KSampler","method":"sample","inputs":{...}}
//! <- {"ok":true,"output":[...]}
//! <- {"ok":false,"error":"..."}
//! ```
//!
//! Artifacts in `output` are handles owned by the bridge; they are sent back
//! verbatim as `{"artifact": ...}` inputs. [`BRIDGE_SCRIPT`] is the bundled
//! host side of the protocol for ComfyUI's node classes.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::output::NodeOutput;
use crate::io::backend::{NodeBackend, NodeCall};
use crate::io::model_paths::ModelPaths;

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum BridgeRequest<'a> {
    Configure {
        search_path: &'a [PathBuf],
        model_paths: &'a ModelPaths,
    },
    InferenceMode {
        enabled: bool,
    },
    Invoke(&'a NodeCall),
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    ok: bool,
    #[serde(default)]
    output: Option<NodeOutput>,
    #[serde(default)]
    error: Option<String>,
}

/// Host-side bridge script, run with the host's Python from the host root.
pub const BRIDGE_SCRIPT: &str = include_str!("../../bridge/comfy_bridge.py");

/// How long a bridge may take to exit after its pipes close before it is killed.
pub const BRIDGE_EXIT_GRACE: Duration = Duration::from_secs(5);

/// Bridge spoken over an arbitrary writer/reader pair.
pub struct BridgeBackend<W: Write, R: BufRead> {
    writer: Option<W>,
    reader: Option<R>,
    child: Option<Child>,
    exit_grace: Duration,
}

/// Bridge backed by a spawned child process.
pub type ProcessBridge = BridgeBackend<ChildStdin, BufReader<ChildStdout>>;

impl ProcessBridge {
    /// Spawn `command` in `workdir` with piped stdin/stdout; stderr is inherited.
    #[instrument(skip_all, fields(workdir = %workdir.display()))]
    pub fn spawn(command: &[String], workdir: &Path) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| anyhow!("bridge command is empty"))?;
        info!(program = %program, "starting bridge");
        let mut child = Command::new(program)
            .args(args)
            .current_dir(workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("spawn bridge {program}"))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("bridge stdin was not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("bridge stdout was not piped"))?;
        Ok(Self {
            writer: Some(stdin),
            reader: Some(BufReader::new(stdout)),
            child: Some(child),
            exit_grace: BRIDGE_EXIT_GRACE,
        })
    }
}

impl<W: Write, R: BufRead> BridgeBackend<W, R> {
    pub fn new(writer: W, reader: R) -> Self {
        Self {
            writer: Some(writer),
            reader: Some(reader),
            child: None,
            exit_grace: BRIDGE_EXIT_GRACE,
        }
    }

    /// Override how long shutdown waits for the bridge before killing it.
    pub fn with_exit_grace(mut self, grace: Duration) -> Self {
        self.exit_grace = grace;
        self
    }

    /// Register the process search path and model folders with the host.
    pub fn configure(&mut self, search_path: &[PathBuf], model_paths: &ModelPaths) -> Result<()> {
        self.request(&BridgeRequest::Configure {
            search_path,
            model_paths,
        })
        .context("configure bridge")?;
        Ok(())
    }

    fn request(&mut self, request: &BridgeRequest<'_>) -> Result<Option<NodeOutput>> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| anyhow!("bridge is closed"))?;
        let mut line = serde_json::to_string(request).context("serialize bridge request")?;
        line.push('\n');
        writer
            .write_all(line.as_bytes())
            .context("write bridge request")?;
        writer.flush().context("flush bridge request")?;

        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| anyhow!("bridge is closed"))?;
        let mut reply = String::new();
        let read = reader
            .read_line(&mut reply)
            .context("read bridge response")?;
        if read == 0 {
            return Err(anyhow!("bridge closed its output"));
        }
        let response: BridgeResponse = serde_json::from_str(reply.trim_end())
            .with_context(|| format!("parse bridge response {:?}", reply.trim_end()))?;
        if !response.ok {
            return Err(anyhow!(
                "bridge error: {}",
                response.error.as_deref().unwrap_or("unspecified failure")
            ));
        }
        Ok(response.output)
    }
}

impl<W: Write, R: BufRead> NodeBackend for BridgeBackend<W, R> {
    #[instrument(skip_all, fields(node = %call.node_id, class = %call.class_type, method = %call.method))]
    fn invoke(&mut self, call: &NodeCall) -> Result<NodeOutput> {
        debug!(inputs = call.inputs.len(), "sending invocation");
        self.request(&BridgeRequest::Invoke(call))?
            .ok_or_else(|| anyhow!("bridge response to invoke is missing 'output'"))
    }

    fn set_inference_mode(&mut self, enabled: bool) -> Result<()> {
        self.request(&BridgeRequest::InferenceMode { enabled })?;
        Ok(())
    }
}

impl<W: Write, R: BufRead> Drop for BridgeBackend<W, R> {
    fn drop(&mut self) {
        // Closing stdin tells the bridge to exit; closing stdout unblocks a
        // bridge stuck writing a reply nobody will read.
        drop(self.writer.take());
        drop(self.reader.take());
        if let Some(mut child) = self.child.take() {
            shutdown(&mut child, self.exit_grace);
        }
    }
}

fn shutdown(child: &mut Child, grace: Duration) {
    let status = match child.wait_timeout(grace) {
        Ok(Some(status)) => status,
        Ok(None) => {
            warn!(grace_ms = grace.as_millis() as u64, "bridge did not exit, killing");
            if let Err(err) = child.kill() {
                warn!(err = %err, "failed to kill bridge");
            }
            match child.wait() {
                Ok(status) => status,
                Err(err) => {
                    warn!(err = %err, "failed to wait for bridge after kill");
                    return;
                }
            }
        }
        Err(err) => {
            warn!(err = %err, "failed to wait for bridge");
            return;
        }
    };
    if status.success() {
        debug!("bridge exited");
    } else {
        warn!(code = ?status.code(), "bridge exited with failure");
    }
}
