//! Test-only helpers: scripted seeds, failing backends, and temp directory trees.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use tempfile::TempDir;

use crate::core::output::NodeOutput;
use crate::io::backend::{NodeBackend, NodeCall};
use crate::io::trace::TraceBackend;
use crate::seed::SeedSource;

/// Seed source that replays a fixed list, then counts upward from the last value.
pub struct FixedSeeds {
    queue: VecDeque<u64>,
    last: u64,
}

impl FixedSeeds {
    pub fn new(seeds: Vec<u64>) -> Self {
        Self {
            queue: seeds.into(),
            last: 0,
        }
    }
}

impl SeedSource for FixedSeeds {
    fn next_seed(&mut self) -> u64 {
        self.last = self.queue.pop_front().unwrap_or(self.last + 1);
        self.last
    }
}

/// Trace backend that fails every call to `node_id` after `succeed` successful ones.
pub struct FailingBackend {
    pub inner: TraceBackend,
    node_id: String,
    succeed: usize,
    seen: usize,
}

impl FailingBackend {
    pub fn new(node_id: &str, succeed: usize) -> Self {
        Self {
            inner: TraceBackend::new(),
            node_id: node_id.to_string(),
            succeed,
            seen: 0,
        }
    }
}

impl NodeBackend for FailingBackend {
    fn invoke(&mut self, call: &NodeCall) -> Result<NodeOutput> {
        if call.node_id == self.node_id {
            self.seen += 1;
            if self.seen > self.succeed {
                return Err(anyhow!("scripted failure in {}", call.node_id));
            }
        }
        self.inner.invoke(call)
    }

    fn set_inference_mode(&mut self, enabled: bool) -> Result<()> {
        self.inner.set_inference_mode(enabled)
    }
}

/// Temporary directory tree for filesystem-facing tests.
pub struct TempTree {
    dir: TempDir,
}

impl TempTree {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create `relative` (and parents) as a directory.
    pub fn dir(&self, relative: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(relative);
        fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Write `contents` to `relative`, creating parent directories.
    pub fn file(&self, relative: &str, contents: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }
}
