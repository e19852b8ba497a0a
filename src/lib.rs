// src/lib.rs

pub mod cli;
pub mod clock;
pub mod config;
pub mod control;
pub mod disable;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod index;
pub mod logging;
pub mod logs;
pub mod model;
pub mod probe;
pub mod reconciler;
pub mod serve;
pub mod store;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::ConfigFile;
use crate::config::loader::load_and_validate;
use crate::engine::Runtime;
use crate::exec::{LocalExecer, ProcessEvent};
use crate::logs::TracingLogSink;
use crate::probe::RealProbeRunner;
use crate::reconciler::CmdController;
use crate::serve::ServeController;
use crate::store::Store;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the store, the `Cmd` and serve controllers and the runtime
/// - the local process supervisor and the readiness prober
/// - (optional) file watcher and stdin control channel
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config.clone();
    let mut cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(workers) = args.workers {
        anyhow::ensure!(workers > 0, "--workers must be at least 1");
        cfg.settings.workers = workers;
    }

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let clock = clock::system();
    let store = Store::new(cfg.initial_state(clock.now()));
    let changes = store.subscribe();

    let (events_tx, events_rx) = mpsc::unbounded_channel::<ProcessEvent>();
    let execer = Arc::new(LocalExecer::new(
        events_tx.clone(),
        cfg.settings.grace_period,
    ));
    let prober = Arc::new(RealProbeRunner::new().context("building HTTP probe client")?);
    let cmds = Arc::new(CmdController::new(
        store.clone(),
        execer,
        prober,
        Arc::new(TracingLogSink),
        clock.clone(),
        events_tx,
    ));
    let serve = ServeController::new(store.clone(), clock.clone());
    let runtime = Runtime::new(store.clone(), cmds, serve, cfg.settings.workers);

    let shutdown = CancellationToken::new();

    // Dropping the handle stops watching, so keep it until `run` returns.
    let _watcher_handle = if !args.no_watch && !cfg.file_watches.is_empty() {
        let profiles = watch::build_profiles(&cfg.file_watches)?;
        Some(watch::spawn_watcher(
            config_root_dir(&config_path),
            profiles,
            store.clone(),
            clock.clone(),
        )?)
    } else {
        None
    };

    if !args.no_control {
        tokio::spawn(control::run_control_loop(
            store.clone(),
            clock.clone(),
            shutdown.clone(),
        ));
    }

    // Ctrl-C → graceful shutdown.
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            shutdown.cancel();
        });
    }

    runtime.run(changes, events_rx, shutdown).await?;
    Ok(())
}

/// Directory file watch patterns are relative to.
///
/// - The config file's directory when it has one (e.g. "configs/Cmdctl.toml").
/// - The current working directory for a bare filename.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn print_dry_run(cfg: &ConfigFile) {
    println!("cmdctl dry-run");
    println!("  config.workers = {}", cfg.settings.workers);
    println!("  config.grace_period = {:?}", cfg.settings.grace_period);
    println!();

    println!("cmds ({}):", cfg.cmds.len());
    for cmd in &cfg.cmds {
        println!("  - {}", cmd.name);
        println!("      exec: {}", cmd.spec.exec.display());
        if cmd.spec.exec.dir != Path::new(".") {
            println!("      dir: {}", cmd.spec.exec.dir.display());
        }
        if !cmd.spec.exec.env.is_empty() {
            println!("      env: {:?}", cmd.spec.exec.env);
        }
        let sources = cmd.spec.trigger_sources();
        if !sources.is_empty() {
            let names: Vec<String> = sources.iter().map(ToString::to_string).collect();
            println!("      triggers: {}", names.join(", "));
        }
        if let Some(start_on) = &cmd.spec.start_on {
            println!("      start_on: {:?}", start_on.buttons);
        }
        if let Some(ds) = &cmd.spec.disable_source {
            println!("      disable_source: {}/{}", ds.config_map, ds.key);
        }
        if cmd.spec.exec.readiness_probe.is_some() {
            println!("      readiness_probe: yes");
        }
    }

    if !cfg.manifests.is_empty() {
        println!();
        println!("resources ({}):", cfg.manifests.len());
        for m in &cfg.manifests {
            let serve = m
                .serve
                .as_ref()
                .map(|s| s.exec.display())
                .unwrap_or_else(|| "-".to_string());
            println!("  - {} (serve: {serve})", m.name);
        }
    }

    for fw in &cfg.file_watches {
        println!("file_watch {}: {:?}", fw.name, fw.paths);
    }
    for b in &cfg.buttons {
        println!("button {} ({} inputs)", b.name, b.inputs.len());
    }
    for cm in &cfg.config_maps {
        println!("config_map {}: {:?}", cm.name, cm.data);
    }

    debug!("dry-run complete (no execution)");
    info!("dry-run finished");
}
