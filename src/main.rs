mod cli;
mod ui;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ccmonitor::{HttpProjectClient, MonitorConfig, MonitorError, ProjectMonitor};
use cli::{Cli, Command, ControlAction};
use ui::StatusDisplay;

type HttpMonitor = ProjectMonitor<HttpProjectClient, HttpProjectClient>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = MonitorConfig::load_from(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    if let Some(server) = cli.server {
        config.server_url = server;
    }

    match cli.command {
        Command::Status { project, json } => status(&config, project, json).await,
        Command::Watch { project, interval } => watch(&config, project, interval).await,
        Command::Control {
            action,
            project,
            user,
        } => control(&config, action, project, user).await,
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build_monitor(config: &MonitorConfig, project: Option<String>) -> Result<HttpMonitor> {
    let project = config.project(project)?;
    let client = HttpProjectClient::from_config(config)
        .with_context(|| format!("cannot use server url {}", config.server_url))?;
    Ok(ProjectMonitor::new(project, client.clone(), client))
}

async fn status(config: &MonitorConfig, project: Option<String>, json: bool) -> Result<()> {
    let monitor = build_monitor(config, project)?;
    monitor.poll().await;

    let report = monitor.report();
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        StatusDisplay::new().print_report(&report);
    }

    if !report.connected {
        bail!("could not reach {} at {}", report.project, config.server_url);
    }
    Ok(())
}

async fn watch(
    config: &MonitorConfig,
    project: Option<String>,
    interval: Option<u64>,
) -> Result<()> {
    let monitor = build_monitor(config, project)?;
    let display = Arc::new(StatusDisplay::new());
    let secs = interval.unwrap_or(config.poll_interval_secs).max(1);

    let last_connected: Arc<Mutex<Option<bool>>> = Arc::new(Mutex::new(None));
    let d = display.clone();
    monitor.poll_completed().subscribe(move |m: &HttpMonitor, e| {
        let mut last = last_connected.lock().unwrap_or_else(PoisonError::into_inner);
        if *last != Some(e.connected) {
            d.connectivity(&e.project, e.connected);
            *last = Some(e.connected);
        }
        d.update(&m.report());
    });
    let d = display.clone();
    monitor
        .build_occurred()
        .subscribe(move |_, e| d.build_event(&e.project, e.transition));
    let d = display.clone();
    monitor
        .message_received()
        .subscribe(move |_, e| d.message(&e.project, &e.message));

    info!(project = %monitor.project_name(), interval_secs = secs, "watching");
    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "cannot listen for Ctrl-C, stopping");
        }
    };
    let polls = monitor.watch_until(Duration::from_secs(secs), shutdown).await;
    info!(polls, "watch stopped");

    display.finish();
    Ok(())
}

async fn control(
    config: &MonitorConfig,
    action: ControlAction,
    project: Option<String>,
    user: Option<String>,
) -> Result<()> {
    let monitor = build_monitor(config, project)?;

    let result = match action {
        ControlAction::Force => monitor.force_build().await,
        ControlAction::Abort => monitor.abort_build().await,
        ControlAction::Fix => {
            let user = user
                .or_else(|| config.user_name.clone())
                .ok_or(MonitorError::MissingUser)?;
            monitor.fix_build(&user).await
        }
        ControlAction::Stop => monitor.stop_project().await,
        ControlAction::Start => monitor.start_project().await,
        ControlAction::Cancel => monitor.cancel_pending().await,
    };
    result.with_context(|| format!("{action:?} failed for {}", monitor.project_name()))?;

    println!("{action:?} sent to {}", monitor.project_name());
    Ok(())
}
