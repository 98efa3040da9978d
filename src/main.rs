use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Runtime;
use tokio::sync::watch;

use memreclaim::cli::{Args, Commands};
use memreclaim::config::{load_config_or_default, load_or_create_config, AppConfig, DisplayMetric};
use memreclaim::coordinator::ReclaimCoordinator;
use memreclaim::models::ReclaimOrigin;
use memreclaim::monitor::SystemMonitor;
use memreclaim::privileges;
use memreclaim::reclaim::platform_reclaimer;
use memreclaim::scheduler::AutoCleaner;

/// CPU usage needs two refreshes at least this far apart
const CPU_SAMPLE_GAP: Duration = Duration::from_millis(250);

fn main() -> Result<()> {
    let args = Args::parse();

    initialize_logging(args.verbose)?;

    match &args.command {
        Commands::InitConfig { path } => {
            info!("Creating default configuration file at {}", path.display());
            AppConfig::create_default_config_file(path)
        }
        Commands::Clean => run_clean(&args),
        Commands::Stats { watch } => run_stats(&args, *watch),
        Commands::Watch { force_auto } => run_watch(&args, *force_auto),
    }
}

/// Initialize logging with the specified verbosity level
fn initialize_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .context("Failed to initialize logger")?;
    Ok(())
}

fn load_config(args: &Args) -> Result<AppConfig> {
    load_or_create_config(Some(&args.config))
        .context(format!("Failed to load configuration from {}", args.config.display()))
}

fn build_coordinator(config: &AppConfig, monitor: Arc<SystemMonitor>) -> ReclaimCoordinator {
    let reclaimer = platform_reclaimer(monitor, config.timings.settle_delay());
    info!("Using {} reclaimer", reclaimer.name());
    ReclaimCoordinator::with_system_clock(reclaimer, config.timings.coordinator_timings())
}

fn warn_if_not_elevated() {
    if !privileges::is_elevated() {
        warn!("Running without elevated privileges - reclaim may be denied");
        warn!("{}", privileges::elevation_instructions());
    }
}

/// Single manual request, the equivalent of the "clean now" button
fn run_clean(args: &Args) -> Result<()> {
    let config = load_config(args)?;
    warn_if_not_elevated();

    let monitor = Arc::new(SystemMonitor::new());
    let coordinator = build_coordinator(&config, monitor);

    let decision = coordinator.request_reclaim(ReclaimOrigin::Manual);
    println!("{}", decision.user_message());
    Ok(())
}

fn run_stats(args: &Args, watch_secs: Option<u64>) -> Result<()> {
    let config = load_config_or_default(&args.config)
        .context(format!("Failed to read configuration from {}", args.config.display()))?;
    let monitor = SystemMonitor::new();
    thread::sleep(CPU_SAMPLE_GAP);

    loop {
        let stats = monitor.snapshot();
        let headline = match config.display_metric {
            DisplayMetric::Mem => format!("{:.0}%", stats.memory_percent),
            DisplayMetric::Cpu => format!("{:.0}%", stats.cpu_percent),
        };
        println!("{:>4}  {}", headline, stats.summary());

        match watch_secs {
            Some(secs) => thread::sleep(Duration::from_secs(secs.max(1))),
            None => return Ok(()),
        }
    }
}

fn run_watch(args: &Args, force_auto: bool) -> Result<()> {
    let config = load_config(args)?;
    warn_if_not_elevated();

    let monitor = Arc::new(SystemMonitor::new());
    let coordinator = Arc::new(build_coordinator(&config, monitor.clone()));

    let runtime = Runtime::new().context("Failed to create tokio runtime")?;
    let result = runtime.block_on(watch_loop(coordinator, monitor, config, force_auto));
    // The stdin reader sits on a blocking thread that never returns on its own
    runtime.shutdown_background();
    result
}

async fn watch_loop(
    coordinator: Arc<ReclaimCoordinator>,
    monitor: Arc<SystemMonitor>,
    config: AppConfig,
    force_auto: bool,
) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = if config.auto_clean.enabled || force_auto {
        let cleaner = AutoCleaner::from_config(coordinator.clone(), monitor, &config.auto_clean);
        Some(tokio::spawn(async move { cleaner.run(shutdown_rx).await }))
    } else {
        info!("Auto-clean is disabled, only manual requests will run");
        None
    };

    info!("Press Enter to clean now, Ctrl+C to quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(_)) => spawn_manual_request(coordinator.clone()),
                Ok(None) => {
                    info!("stdin closed, waiting for Ctrl+C");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    stdin_open = false;
                }
            },
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!("Failed to listen for Ctrl+C: {}", e);
                }
                info!("Shutting down");
                break;
            }
        }
    }

    let _ = shutdown_tx.send(true);
    if let Some(handle) = scheduler {
        handle.await.context("Auto-clean task failed")?;
    }
    Ok(())
}

/// Runs a manual request on a blocking thread, off the stdin reader
fn spawn_manual_request(coordinator: Arc<ReclaimCoordinator>) {
    tokio::spawn(async move {
        match tokio::task::spawn_blocking(move || coordinator.request_reclaim(ReclaimOrigin::Manual)).await {
            Ok(decision) => println!("{}", decision.user_message()),
            Err(e) => error!("Manual reclaim task failed: {}", e),
        }
    });
}
