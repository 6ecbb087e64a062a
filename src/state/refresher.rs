use crate::state::shutdown::Shutdown;
use crate::state::store::{GameStore, Phase};
use chrono::Utc;
use log::{info, warn};
use ncaabase_api::adapter::ScheduleAdapter;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval, timeout};

/// Periodic schedule refresh. Each success replaces the schedule layer
/// wholesale; a failure leaves the previous layer in place.
pub struct ScheduleRefresher<A> {
    adapter: A,
    store: Arc<GameStore>,
    every: Duration,
    call_timeout: Duration,
}

impl<A: ScheduleAdapter> ScheduleRefresher<A> {
    pub fn new(adapter: A, store: Arc<GameStore>, every: Duration, call_timeout: Duration) -> Self {
        Self { adapter, store, every, call_timeout }
    }

    /// Returns whether the schedule layer was replaced.
    pub async fn refresh_once(&self) -> bool {
        let source = self.adapter.source();
        let result = timeout(self.call_timeout, self.adapter.fetch_schedule()).await;
        let now = Utc::now();

        let games = match result {
            Ok(Ok(games)) => games,
            Ok(Err(e)) => {
                warn!("{source} schedule refresh failed, keeping previous schedule: {e}");
                self.store.update_health(source, |h| {
                    h.polls += 1;
                    h.errors += 1;
                    h.last_poll = Some(now);
                });
                return false;
            }
            Err(_) => {
                warn!("{source} schedule refresh timed out after {:?}", self.call_timeout);
                self.store.update_health(source, |h| {
                    h.polls += 1;
                    h.errors += 1;
                    h.last_poll = Some(now);
                });
                return false;
            }
        };

        info!("{source} schedule refreshed: {} games", games.len());
        let records = games.len();
        self.store.replace_schedule(games);
        self.store.update_health(source, |h| {
            h.polls += 1;
            h.last_poll = Some(now);
            h.last_success = Some(now);
            h.records = records;
            h.endpoints = 1;
            h.phase = Phase::Idle;
        });
        true
    }

    pub async fn run(self, mut shutdown: Shutdown) {
        let mut ticker = interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = async {
                    ticker.tick().await;
                    self.refresh_once().await;
                } => {}
            }
        }
        info!("{} schedule refresher stopped", self.adapter.source());
    }
}
