// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod registry;
pub mod report;
pub mod state;
pub mod types;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, build_registry, load_and_validate};
use crate::dag::Scheduler;
use crate::engine::{CoreRuntime, RunRequest, Runtime, RuntimeEvent, RuntimeOptions};
use crate::exec::RealExecutorBackend;
use crate::registry::DagRegistry;
use crate::state::open_store;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and the DAG registry
/// - state store / scheduler / runtime
/// - executor
/// - Ctrl-C handling
///
/// Every selected DAG runs once at the logical date; the reports are printed
/// to stdout. Returns an error if any run did not succeed.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config.clone();
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;
    let registry = build_registry(&cfg)?;

    if args.dry_run {
        print_dry_run(&cfg, &registry);
        return Ok(());
    }

    let dag_ids: Vec<String> = match &args.dag {
        Some(id) => {
            registry.get(id)?;
            vec![id.clone()]
        }
        None => registry.ids().map(str::to_string).collect(),
    };

    let logical_date = args.effective_logical_date();
    let parallelism = args
        .parallelism
        .map(usize::from)
        .unwrap_or(cfg.config.parallelism);

    let store = open_store(cfg.config.state_store, &cfg.config.state_dir);
    let scheduler = Scheduler::new(Arc::new(registry), store, parallelism);

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    // Real executor backend spawning one Tokio task per attempt.
    let executor = RealExecutorBackend::new(rt_tx);

    // Ctrl-C → cancel the active run and drop queued ones.
    let cancel = CancellationToken::new();
    {
        let token = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            token.cancel();
        });
    }

    // Construct the pure core runtime (single source of truth for semantics)
    // and queue one run per selected DAG.
    let mut core = CoreRuntime::new(scheduler, RuntimeOptions::default());
    info!(dags = ?dag_ids, logical_date = %logical_date, parallelism, "requesting runs");
    for dag_id in &dag_ids {
        core.enqueue(RunRequest::new(dag_id.clone(), logical_date));
    }

    // Construct the async IO shell around the core.
    let reports = Runtime::new(core, rt_rx, executor)
        .with_cancellation(cancel)
        .run()
        .await?;

    for report in &reports {
        print!("{report}");
    }

    let failed: Vec<String> = reports
        .iter()
        .filter(|r| !r.is_successful())
        .map(|r| r.key.to_string())
        .collect();

    if reports.len() < dag_ids.len() {
        warn!(
            requested = dag_ids.len(),
            finished = reports.len(),
            "some runs never started"
        );
        bail!(
            "{} of {} requested run(s) never started",
            dag_ids.len() - reports.len(),
            dag_ids.len()
        );
    }
    if !failed.is_empty() {
        bail!("{} run(s) did not succeed: {}", failed.len(), failed.join(", "));
    }

    Ok(())
}

/// Simple dry-run output: print DAGs in topological order with their
/// effective task options.
fn print_dry_run(cfg: &ConfigFile, registry: &DagRegistry) {
    println!("dagflow dry-run");
    println!("  config.parallelism = {}", cfg.config.parallelism);
    println!("  config.state_store = {:?}", cfg.config.state_store);
    println!("  config.state_dir = {}", cfg.config.state_dir.display());

    for graph in registry.graphs() {
        let dag_cfg = cfg.dag.get(graph.id());
        println!();
        println!("dag {} ({} tasks):", graph.id(), graph.len());
        if let Some(description) = dag_cfg.and_then(|d| d.description.as_deref()) {
            println!("  description: {description}");
        }
        println!("  order: {}", graph.topological_order().join(" -> "));

        for node in graph.tasks() {
            println!("  - {}", node.id);
            match dag_cfg
                .and_then(|d| d.task.get(&node.id))
                .and_then(|t| t.cmd.as_deref())
            {
                Some(cmd) => println!("      cmd: {cmd}"),
                None => println!("      cmd: (none)"),
            }
            if !node.upstream.is_empty() {
                println!("      after: {:?}", node.upstream);
            }

            let opts = &node.options;
            println!("      trigger_rule: {}", opts.trigger_rule);
            if opts.retries > 0 {
                println!("      retries: {} (delay {:?})", opts.retries, opts.retry_delay);
            }
            if let Some(timeout) = opts.timeout {
                println!("      timeout: {timeout:?}");
            }
            for (key, value) in &opts.params {
                println!("      params.{key}: {value}");
            }
        }
    }

    debug!("dry-run complete (no execution)");
}
