//! Node pipeline runner.
//!
//! With no arguments: bootstrap the host search paths, run the built-in
//! workflow's setup phase once, then run its loop phase (default 10 times),
//! printing one line per decoded image.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use workflow_runner::bootstrap::{BootstrapOptions, Environment, bootstrap};
use workflow_runner::core::plan::PipelinePlan;
use workflow_runner::core::workflow::default_plan;
use workflow_runner::driver::run_pipeline;
use workflow_runner::exit_codes;
use workflow_runner::io::backend::NodeBackend;
use workflow_runner::io::bridge::ProcessBridge;
use workflow_runner::io::config::{BackendKind, CONFIG_FILE_NAME, RunnerConfig, load_config};
use workflow_runner::io::plan_store::{load_plan, render_plan};
use workflow_runner::io::trace::TraceBackend;
use workflow_runner::logging;
use workflow_runner::preflight::preflight;
use workflow_runner::seed::RandomSeeds;

#[derive(Parser)]
#[command(
    name = "workflow-runner",
    version,
    about = "Setup-once, loop-N driver for node-based image generation pipelines"
)]
struct Cli {
    /// Config file (default: ./workflow-runner.toml, if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Plan JSON file to run instead of the built-in workflow.
    #[arg(long, global = true)]
    plan: Option<PathBuf>,
    /// Override the number of loop iterations.
    #[arg(long, global = true)]
    iterations: Option<u32>,
    /// Base seed for a reproducible batch.
    #[arg(long, global = true)]
    seed: Option<u64>,
    /// Use the in-process trace backend instead of the host bridge.
    #[arg(long, global = true)]
    dry_run: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Run the pipeline (default).
    Run,
    /// Validate the plan and resolve every model/image file it loads.
    Check,
    /// Print the active plan as JSON.
    Plan,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::FAILED);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir().context("resolve current directory")?;
    let cfg = load_settings(&cli, &cwd)?;
    let plan = match &cli.plan {
        Some(path) => load_plan(path)?,
        None => default_plan(),
    };

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => cmd_run(&cfg, &plan, &cwd),
        Command::Check => cmd_check(&cfg, &plan, &cwd),
        Command::Plan => cmd_plan(&plan),
    }
}

/// Config file values, overridden by CLI flags.
fn load_settings(cli: &Cli, cwd: &Path) -> Result<RunnerConfig> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| cwd.join(CONFIG_FILE_NAME));
    let mut cfg = load_config(&path)?;
    if let Some(iterations) = cli.iterations {
        cfg.iterations = iterations;
    }
    if cli.seed.is_some() {
        cfg.seed = cli.seed;
    }
    if cli.dry_run {
        cfg.backend = BackendKind::Trace;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn bootstrap_env(cfg: &RunnerConfig, cwd: &Path) -> Result<Environment> {
    let boot = bootstrap(&BootstrapOptions {
        start: cwd.to_path_buf(),
        host_root_name: cfg.host_root_name.clone(),
        extra_paths_file: cfg.extra_paths_file.clone(),
    })?;
    for notice in &boot.notices {
        println!("{notice}");
    }
    Ok(boot.env)
}

fn cmd_run(cfg: &RunnerConfig, plan: &PipelinePlan, cwd: &Path) -> Result<i32> {
    let env = bootstrap_env(cfg, cwd)?;
    let mut backend: Box<dyn NodeBackend> = match cfg.backend {
        BackendKind::Trace => Box::new(TraceBackend::new()),
        BackendKind::Bridge => {
            let workdir = env.host_root.clone().unwrap_or_else(|| cwd.to_path_buf());
            let mut bridge = ProcessBridge::spawn(&cfg.bridge.command_line(), &workdir)?;
            bridge.configure(&env.search_path, &env.model_paths)?;
            Box::new(bridge)
        }
    };

    let mut seeds = RandomSeeds::from_config(cfg.seed);
    let total = cfg.iterations;
    let summary = run_pipeline(plan, backend.as_mut(), &mut seeds, total, |outcome| {
        match outcome.seed {
            Some(seed) => println!("image {}/{} seed={}", outcome.iter, total, seed),
            None => println!("image {}/{}", outcome.iter, total),
        }
    })?;
    println!(
        "done: iterations={} setup_invocations={} loop_invocations={}",
        summary.iterations, summary.setup_invocations, summary.loop_invocations
    );
    Ok(exit_codes::OK)
}

fn cmd_check(cfg: &RunnerConfig, plan: &PipelinePlan, cwd: &Path) -> Result<i32> {
    let env = bootstrap_env(cfg, cwd)?;
    let report = preflight(plan, &env.model_paths);
    for check in &report.checks {
        match &check.path {
            Some(path) => println!(
                "ok {}: {}/{} -> {}",
                check.node_id,
                check.folder,
                check.name,
                path.display()
            ),
            None => println!("missing {}: {}/{}", check.node_id, check.folder, check.name),
        }
    }
    if report.is_complete() {
        Ok(exit_codes::OK)
    } else {
        Ok(exit_codes::MISSING_RESOURCES)
    }
}

fn cmd_plan(plan: &PipelinePlan) -> Result<i32> {
    print!("{}", render_plan(plan)?);
    Ok(exit_codes::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_no_args_runs_by_default() {
        let cli = Cli::parse_from(["workflow-runner"]);
        assert!(cli.command.is_none());
        assert!(!cli.dry_run);
    }

    #[test]
    fn parse_flags_after_subcommand() {
        let cli = Cli::parse_from(["workflow-runner", "check", "--iterations", "3", "--dry-run"]);
        assert_eq!(cli.command, Some(Command::Check));
        assert_eq!(cli.iterations, Some(3));
        assert!(cli.dry_run);
    }

    #[test]
    fn cli_overrides_config_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::write(temp.path().join(CONFIG_FILE_NAME), "iterations = 7\nseed = 1\n")
            .expect("write config");
        let cli = Cli::parse_from(["workflow-runner", "--seed", "9", "--dry-run"]);
        let cfg = load_settings(&cli, temp.path()).expect("settings");
        assert_eq!(cfg.iterations, 7);
        assert_eq!(cfg.seed, Some(9));
        assert_eq!(cfg.backend, BackendKind::Trace);
    }
}
