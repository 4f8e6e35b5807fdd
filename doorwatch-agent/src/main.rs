//! Doorwatch Agent - presence-driven garage door checker
//!
//! Every `check_interval_secs` the agent:
//! - reads household presence (presence service, or direct pings as fallback)
//! - asks the scheduler whether a check is due (daytime departure / night hour)
//! - spends one unit of the daily classifier budget
//! - grabs a camera still, classifies it, archives it and pushes the verdict

mod agent;
mod camera;
mod classifier;
mod dataset;
mod notifier;
mod orchestrator;
mod presence_client;
mod transport;

use anyhow::{Context, Result};
use clap::Parser;
use doorwatch_core::ports::PresenceSource;
use doorwatch_core::probe::PingProbe;
use doorwatch_core::{
    load_config, ApiBudgetGuard, CheckScheduler, Clock, LocalPresence, PresencePoller, PresenceTracker, RetryPolicy,
    SystemClock, TokioSleeper, WatchConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::agent::Agent;
use crate::camera::HttpCamera;
use crate::classifier::GeminiClassifier;
use crate::dataset::DirectoryDataset;
use crate::notifier::NtfyNotifier;
use crate::orchestrator::{CheckOrchestrator, Collaborators};
use crate::presence_client::{FallbackPresence, HttpPresence, STATUS_TIMEOUT};

#[derive(Debug, Parser)]
#[command(name = "doorwatch-agent", version, about = "Checks the garage door when everybody leaves and at night")]
struct Args {
    /// Config file (default: $DOORWATCH_CONFIG, then ./doorwatch.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run a single tick and exit (the embedded tracker has no history yet, so not with --embedded-presence)
    #[arg(long, conflicts_with = "embedded_presence")]
    once: bool,

    /// Log decisions only: no camera, classifier, notification or budget use
    #[arg(long)]
    dry_run: bool,

    /// Poll phones in-process instead of asking the presence service
    #[arg(long)]
    embedded_presence: bool,
}

/// Presence source plus the poller task backing it, when embedded
fn presence_source(
    cfg: &WatchConfig,
    embedded: bool,
    clock: Arc<dyn Clock>,
) -> Result<(Arc<dyn PresenceSource>, Option<JoinHandle<()>>)> {
    if embedded {
        let tracker = PresenceTracker::new(&cfg.people, cfg.presence.debounce).shared();
        let poller = PresencePoller::new(tracker.clone(), Arc::new(PingProbe::new(cfg.probe_timeout())), clock);
        let task = poller.spawn(cfg.ping_interval());
        info!("embedded presence poller started");
        return Ok((Arc::new(LocalPresence::new(tracker)), Some(task)));
    }

    let client = HttpPresence::new(cfg.presence.status_url.clone(), STATUS_TIMEOUT)
        .context("Failed to build presence client")?;
    info!(url = %cfg.presence.status_url, "reading presence from status service");
    Ok((Arc::new(client), None))
}

fn build_agent(cfg: &WatchConfig, args: &Args) -> Result<(Agent, Option<JoinHandle<()>>)> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(cfg.timezone));

    let api_key = match std::env::var(&cfg.classifier.api_key_env) {
        Ok(key) => key,
        Err(_) if args.dry_run => String::new(),
        Err(_) => anyhow::bail!("{} is not set", cfg.classifier.api_key_env),
    };

    let orchestrator = CheckOrchestrator::new(
        Collaborators {
            camera: Arc::new(
                HttpCamera::new(cfg.camera.url.clone(), std::time::Duration::from_secs(cfg.camera.timeout_secs))
                    .context("Failed to build camera client")?,
            ),
            classifier: Arc::new(
                GeminiClassifier::new(&cfg.classifier, api_key).context("Failed to build classifier client")?,
            ),
            notifier: Arc::new(NtfyNotifier::new(&cfg.notify).context("Failed to build ntfy client")?),
            dataset: Arc::new(DirectoryDataset::new(cfg.dataset.dir.clone())),
            clock: clock.clone(),
            sleeper: Arc::new(TokioSleeper),
        },
        RetryPolicy::from(&cfg.retry),
        cfg.classifier.prompt.clone(),
        cfg.notify.when_shut,
    );

    let (primary, poll_task) = presence_source(cfg, args.embedded_presence, clock.clone())?;
    let presence = FallbackPresence::new(
        primary,
        Arc::new(PingProbe::new(cfg.probe_timeout())),
        cfg.people.clone(),
    );

    let agent = Agent::new(
        CheckScheduler::new(cfg.daytime, cfg.night_check_hours.iter().copied()),
        ApiBudgetGuard::new(cfg.max_api_calls_per_day, clock.now().date_naive()),
        presence,
        orchestrator,
        clock,
    )
    .dry_run(args.dry_run);

    Ok((agent, poll_task))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let cfg = load_config(args.config.as_deref()).await.context("Failed to load configuration")?;

    info!(
        timezone = %cfg.timezone,
        people = cfg.people.len(),
        daytime = %format!("{}-{}", cfg.daytime.start, cfg.daytime.end),
        night_check_hours = ?cfg.night_check_hours,
        max_api_calls_per_day = cfg.max_api_calls_per_day,
        "Doorwatch agent starting"
    );

    let (mut agent, poll_task) = build_agent(&cfg, &args)?;

    if args.once {
        let outcome = agent.tick().await;
        info!(?outcome, "single tick done");
    } else {
        agent
            .run(cfg.check_interval(), async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await;
    }

    if let Some(task) = poll_task {
        task.abort();
    }
    info!("Doorwatch agent stopped");
    Ok(())
}
