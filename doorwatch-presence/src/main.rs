/**
 * DOORWATCH PRESENCE - Service de présence du foyer
 *
 * RÔLE : Ping périodique du téléphone de chaque personne, debounce par
 * personne, et publication de l'état agrégé sur HTTP (/status).
 *
 * ARCHITECTURE : une tâche de polling (doorwatch-core::PresencePoller) +
 * un serveur axum qui lit le même tracker partagé.
 * UTILITÉ : Source de vérité "quelqu'un est-il à la maison ?" pour l'agent.
 */

mod health;
mod http;
mod logging;

use crate::health::HealthTracker;
use crate::http::AppState;

use anyhow::Context;
use clap::Parser;
use doorwatch_core::config::resolve_config_path;
use doorwatch_core::probe::PingProbe;
use doorwatch_core::{load_config, PresencePoller, PresenceTracker, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "doorwatch-presence", version, about = "Publishes debounced household presence over HTTP")]
struct Args {
    /// Config file (default: $DOORWATCH_CONFIG, then ./doorwatch.yaml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env optionnel
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let cfg = load_config(args.config.as_deref()).await.context("loading configuration")?;
    // log_file vient de la config : résumé tracé après init
    let _log_guard = logging::init(cfg.presence.log_file.as_deref());

    info!(
        config = %resolve_config_path(args.config.as_deref()).display(),
        timezone = %cfg.timezone,
        people = cfg.people.len(),
        debounce = cfg.presence.debounce,
        ping_interval_secs = cfg.presence.ping_interval_secs,
        "starting presence service"
    );

    // tracker partagé entre poller et HTTP
    let tracker = PresenceTracker::new(&cfg.people, cfg.presence.debounce).shared();

    let poller = PresencePoller::new(
        tracker.clone(),
        Arc::new(PingProbe::new(cfg.probe_timeout())),
        Arc::new(SystemClock::new(cfg.timezone)),
    );
    let health = HealthTracker::new(poller.stats());
    let poll_task = poller.spawn(cfg.ping_interval());

    let app = http::build_router(AppState { tracker, health });

    let listener = TcpListener::bind(&cfg.presence.bind)
        .await
        .with_context(|| format!("binding {}", cfg.presence.bind))?;
    info!("listening on http://{}", cfg.presence.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await
        .context("http server")?;

    poll_task.abort();
    info!("presence service stopped");
    Ok(())
}
