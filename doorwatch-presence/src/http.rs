/**
 * API STATUS PRÉSENCE - Serveur HTTP du service de présence
 *
 * RÔLE :
 * Expose l'état de présence débouncé à l'agent de surveillance (et à
 * n'importe quel outil du LAN) sous forme de document JSON.
 *
 * FONCTIONNEMENT :
 * - GET /status        : snapshot complet (someone_home, people_home, last_changed, per_person)
 * - GET /health        : liveness, toujours "ok"
 * - GET /system/health : compteurs du poller + uptime
 * - Toute autre route  : 404
 *
 * CONCURRENCE :
 * Le snapshot est calculé sous le lock du tracker ; le poller ne garde ce
 * lock que pendant l'application d'un tick (jamais pendant les pings).
 */

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use doorwatch_core::presence::{OverallPresenceSnapshot, SharedTracker};

use crate::health::{HealthTracker, PresenceHealth};

#[derive(Clone)]
pub struct AppState {
    pub tracker: SharedTracker,
    pub health: HealthTracker,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(get_status))
        .route("/system/health", get(get_system_health))
        .with_state(app_state)
}

// GET /status
async fn get_status(State(app): State<AppState>) -> Json<OverallPresenceSnapshot> {
    let snapshot = app.tracker.lock().snapshot();
    Json(snapshot)
}

// GET /system/health
async fn get_system_health(State(app): State<AppState>) -> Json<PresenceHealth> {
    Json(app.health.get_health(&app.tracker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use doorwatch_core::config::Entity;
    use doorwatch_core::poller::PollStats;
    use doorwatch_core::presence::PresenceTracker;
    use reqwest::StatusCode;
    use std::sync::Arc;

    struct TestServer {
        url: String,
        tracker: SharedTracker,
        handle: tokio::task::JoinHandle<()>,
    }

    async fn start_server() -> TestServer {
        let tracker = PresenceTracker::new(
            &[Entity::new("Tim", "192.168.0.157"), Entity::new("Koi", "192.168.0.110")],
            1,
        )
        .shared();
        let app = build_router(AppState {
            tracker: tracker.clone(),
            health: HealthTracker::new(Arc::new(PollStats::default())),
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        TestServer { url: format!("http://{addr}"), tracker, handle }
    }

    #[tokio::test]
    async fn test_status_document() {
        let server = start_server().await;
        let now = FixedOffset::west_opt(7 * 3600).unwrap().with_ymd_and_hms(2025, 8, 1, 9, 30, 0).unwrap();
        server.tracker.lock().apply_tick(&[("Tim".into(), false), ("Koi".into(), true)], now);

        let resp = reqwest::get(format!("{}/status", server.url)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let snap: OverallPresenceSnapshot = resp.json().await.unwrap();
        assert!(snap.someone_home);
        assert_eq!(snap.people_home, vec!["Koi"]);
        assert_eq!(snap.last_changed, Some(now));
        assert!(!snap.per_person["Tim"].is_home);
        assert_eq!(snap.per_person["Tim"].last_changed, Some(now));
        server.handle.abort();
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let server = start_server().await;
        let resp = reqwest::get(format!("{}/people", server.url)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        server.handle.abort();
    }

    #[tokio::test]
    async fn test_liveness_and_system_health() {
        let server = start_server().await;
        let resp = reqwest::get(format!("{}/health", server.url)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.text().await.unwrap(), "ok");

        let health: PresenceHealth = reqwest::get(format!("{}/system/health", server.url))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health.people_tracked, 2);
        server.handle.abort();
    }
}
