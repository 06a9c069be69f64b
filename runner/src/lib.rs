//! Setup-once, loop-N driver for node-based image generation pipelines.
//!
//! Nodes (checkpoint loaders, text encoders, samplers, decoders) are executed
//! by an external backend; this crate bootstraps the search paths the backend
//! resolves models against, then wires node outputs into later node inputs
//! according to a declarative plan. The architecture enforces a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic logic (plan model, invariants, result
//!   access). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (filesystem search, config, node
//!   backends). Isolated to enable scripted backends in tests.
//!
//! Orchestration modules ([`bootstrap`], [`driver`], [`preflight`]) coordinate
//! core logic with I/O to implement CLI commands.

pub mod bootstrap;
pub mod core;
pub mod driver;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod preflight;
pub mod seed;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
