//! Scheduling loop
//!
//! Each tick reads presence, asks the scheduler, takes a unit of the daily
//! budget and runs one check cycle. Ticks never overlap and never end the
//! loop: a panicking tick is logged and the next one runs on schedule.

use doorwatch_core::{ApiBudgetGuard, CheckScheduler, Clock};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::orchestrator::{CheckOrchestrator, CycleOutcome};
use crate::presence_client::FallbackPresence;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Skipped(String),
    BudgetExhausted,
    DryRun,
    Checked(CycleOutcome),
}

pub struct Agent {
    scheduler: CheckScheduler,
    budget: ApiBudgetGuard,
    presence: FallbackPresence,
    orchestrator: CheckOrchestrator,
    clock: Arc<dyn Clock>,
    dry_run: bool,
}

impl Agent {
    pub fn new(
        scheduler: CheckScheduler,
        budget: ApiBudgetGuard,
        presence: FallbackPresence,
        orchestrator: CheckOrchestrator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { scheduler, budget, presence, orchestrator, clock, dry_run: false }
    }

    /// Decide as usual but never spend budget or call out.
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    pub fn budget(&self) -> &ApiBudgetGuard {
        &self.budget
    }

    pub async fn tick(&mut self) -> TickOutcome {
        let now_home = self.presence.is_anyone_home().await;
        let now = self.clock.now();
        let decision = self.scheduler.decide(now_home, now.time());
        info!(
            someone_home = now_home,
            should_check = decision.should_check,
            reason = %decision.reason,
            "scheduler decision"
        );

        if !decision.should_check {
            return TickOutcome::Skipped(decision.reason);
        }

        if self.dry_run {
            info!(reason = %decision.reason, "dry run: would check the door now");
            return TickOutcome::DryRun;
        }

        if !self.budget.try_acquire(now.date_naive()) {
            warn!(
                max_calls_per_day = self.budget.max_calls_per_day(),
                reason = %decision.reason,
                "daily API budget exhausted, check dropped"
            );
            return TickOutcome::BudgetExhausted;
        }
        info!(
            calls_today = self.budget.calls_made_today(),
            max_calls_per_day = self.budget.max_calls_per_day(),
            "running door check"
        );

        TickOutcome::Checked(self.orchestrator.run_cycle().await)
    }

    async fn guarded_tick(&mut self) {
        if let Err(panic) = AssertUnwindSafe(self.tick()).catch_unwind().await {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(panic = %msg, "tick failed, continuing");
        }
    }

    /// Runs until `shutdown` resolves. A tick in progress is finished first.
    pub async fn run(&mut self, every: Duration, shutdown: impl Future<Output = ()>) {
        info!(interval_secs = every.as_secs(), dry_run = self.dry_run, "agent loop started");
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.guarded_tick().await,
                _ = &mut shutdown => {
                    info!("shutdown requested, agent loop stopping");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration};
    use chrono_tz::Tz;
    use doorwatch_core::config::DaytimeWindow;
    use doorwatch_core::ports::ReachabilityProbe;
    use doorwatch_core::{Entity, RetryPolicy};
    use doorwatch_devkit::{local, ScriptedClassifier, StaticPresence, TestHarness};

    use crate::orchestrator::Collaborators;

    struct Fixture {
        harness: TestHarness,
        presence: StaticPresence,
    }

    impl Fixture {
        fn new(start: DateTime<Tz>) -> Self {
            Self {
                harness: TestHarness::new(start).with_classifier(ScriptedClassifier::always(true)),
                presence: StaticPresence::home(&["Tim"], &["Koi"]),
            }
        }

        fn agent(&self, max_calls_per_day: u32) -> Agent {
            self.agent_with(max_calls_per_day, Arc::new(self.harness.probe.clone()))
        }

        fn agent_with(&self, max_calls_per_day: u32, probe: Arc<dyn ReachabilityProbe>) -> Agent {
            let h = &self.harness;
            let orchestrator = CheckOrchestrator::new(
                Collaborators {
                    camera: Arc::new(h.camera.clone()),
                    classifier: Arc::new(h.classifier.clone()),
                    notifier: Arc::new(h.notifier.clone()),
                    dataset: Arc::new(h.dataset.clone()),
                    clock: Arc::new(h.clock.clone()),
                    sleeper: Arc::new(h.sleeper.clone()),
                },
                RetryPolicy { max_retries: 15, interval: Duration::from_secs(60) },
                "Is the door open or closed?",
                true,
            );
            let presence = FallbackPresence::new(
                Arc::new(self.presence.clone()),
                probe,
                vec![Entity::new("Tim", "192.168.0.157"), Entity::new("Koi", "192.168.0.110")],
            );
            Agent::new(
                CheckScheduler::new(DaytimeWindow::default(), [20, 22, 0, 4]),
                ApiBudgetGuard::new(max_calls_per_day, h.clock.now().date_naive()),
                presence,
                orchestrator,
                Arc::new(h.clock.clone()),
            )
        }
    }

    #[tokio::test]
    async fn test_departure_triggers_one_check() {
        let fx = Fixture::new(local(2025, 8, 1, 9, 0));
        let mut agent = fx.agent(20);

        assert!(matches!(agent.tick().await, TickOutcome::Skipped(_)));

        fx.presence.set(&[], &["Tim", "Koi"]);
        fx.harness.clock.advance(ChronoDuration::seconds(30));
        assert!(matches!(agent.tick().await, TickOutcome::Checked(CycleOutcome::Classified { .. })));
        fx.harness.assert_notified("Garage door is open!").unwrap();

        fx.harness.clock.advance(ChronoDuration::seconds(30));
        assert!(matches!(agent.tick().await, TickOutcome::Skipped(_)));
        assert_eq!(agent.budget().calls_made_today(), 1);
        assert_eq!(fx.harness.archived(), 1);
    }

    #[tokio::test]
    async fn test_budget_refusal_drops_the_fire() {
        let fx = Fixture::new(local(2025, 8, 1, 20, 30));
        let mut agent = fx.agent(1);

        assert!(matches!(agent.tick().await, TickOutcome::Checked(_)));

        fx.harness.clock.set(local(2025, 8, 1, 22, 0));
        assert_eq!(agent.tick().await, TickOutcome::BudgetExhausted);
        assert_eq!(fx.harness.camera.fetches(), 1);

        // the 22:00 slot is consumed, not retried later in the hour
        fx.harness.clock.set(local(2025, 8, 1, 22, 30));
        assert!(matches!(agent.tick().await, TickOutcome::Skipped(_)));

        // new calendar day resets the budget
        fx.harness.clock.set(local(2025, 8, 2, 0, 5));
        assert!(matches!(agent.tick().await, TickOutcome::Checked(_)));
        assert_eq!(agent.budget().calls_made_today(), 1);
    }

    #[tokio::test]
    async fn test_failed_cycle_still_consumes_budget() {
        let fx = Fixture::new(local(2025, 8, 1, 20, 15));
        fx.harness.camera.push(Err(doorwatch_core::CheckError::terminal("camera returned 404 Not Found")));
        let mut agent = fx.agent(20);

        assert!(matches!(agent.tick().await, TickOutcome::Checked(CycleOutcome::Failed(_))));
        assert_eq!(agent.budget().calls_made_today(), 1);
        fx.harness.assert_notified("Garage door check failed").unwrap();
    }

    #[tokio::test]
    async fn test_dry_run_spends_nothing() {
        let fx = Fixture::new(local(2025, 8, 1, 4, 10));
        let mut agent = fx.agent(20).dry_run(true);

        assert_eq!(agent.tick().await, TickOutcome::DryRun);
        assert_eq!(agent.budget().calls_made_today(), 0);
        assert_eq!(fx.harness.camera.fetches(), 0);
        assert!(fx.harness.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_status_outage_falls_back_to_probes() {
        let fx = Fixture::new(local(2025, 8, 1, 9, 0));
        fx.presence.go_down();
        fx.harness.probe.set("192.168.0.157", true);
        let mut agent = fx.agent(20);

        assert!(matches!(agent.tick().await, TickOutcome::Skipped(_)));
        assert_eq!(fx.harness.probe.calls().len(), 2);

        fx.harness.probe.set("192.168.0.157", false);
        assert!(matches!(agent.tick().await, TickOutcome::Checked(_)));
    }

    struct PanickingProbe;

    #[async_trait]
    impl ReachabilityProbe for PanickingProbe {
        async fn is_reachable(&self, _address: &str) -> bool {
            panic!("probe exploded")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_survives_panicking_tick_and_stops_on_shutdown() {
        let fx = Fixture::new(local(2025, 8, 1, 9, 0));
        fx.presence.go_down();
        let mut agent = fx.agent_with(20, Arc::new(PanickingProbe));

        agent
            .run(Duration::from_secs(30), tokio::time::sleep(Duration::from_secs(95)))
            .await;

        // ticks at 0, 30, 60, 90 all panicked and the loop kept going
        assert_eq!(fx.presence.reads(), 4);
    }
}
