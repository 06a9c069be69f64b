//! I/O helpers and node backends.

pub mod backend;
pub mod bridge;
pub mod config;
pub mod extra_paths;
pub mod find_path;
pub mod model_paths;
pub mod plan_store;
pub mod trace;
