use crate::state::poller::LivePoller;
use crate::state::refresher::ScheduleRefresher;
use crate::state::shutdown::{self, Shutdown, ShutdownTrigger};
use crate::state::store::{GameStore, RebuildTrigger};
use futures_util::future::join_all;
use log::{info, warn};
use ncaabase_api::adapter::{LiveAdapter, ScheduleAdapter};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Owns the background tasks: one per adapter plus the rebuild trigger. All of
/// them stop on the same signal.
pub struct Supervisor {
    trigger: ShutdownTrigger,
    shutdown: Shutdown,
    tasks: Vec<(String, JoinHandle<()>)>,
}

impl Supervisor {
    /// Must be called inside a tokio runtime; the rebuild trigger starts right away.
    pub fn start(store: Arc<GameStore>) -> Self {
        let (trigger, shutdown) = shutdown::channel();
        let rebuilds = tokio::spawn(RebuildTrigger::new(store, shutdown.clone()).run());
        Self {
            trigger,
            shutdown,
            tasks: vec![("rebuild trigger".into(), rebuilds)],
        }
    }

    pub fn spawn_schedule<A: ScheduleAdapter>(&mut self, refresher: ScheduleRefresher<A>) {
        let name = "schedule refresher".to_owned();
        let task = tokio::spawn(refresher.run(self.shutdown.clone()));
        self.tasks.push((name, task));
    }

    pub fn spawn_live<A: LiveAdapter>(&mut self, name: impl Into<String>, poller: LivePoller<A>) {
        let task = tokio::spawn(poller.run(self.shutdown.clone()));
        self.tasks.push((name.into(), task));
    }

    /// Signal every task and wait for them, giving up on stragglers after `grace`.
    pub async fn shutdown(self, grace: Duration) {
        info!("shutting down {} tasks", self.tasks.len());
        self.trigger.trigger();

        let (names, handles): (Vec<String>, Vec<JoinHandle<()>>) = self.tasks.into_iter().unzip();
        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
        match tokio::time::timeout(grace, join_all(handles)).await {
            Ok(results) => {
                for (name, result) in names.iter().zip(results) {
                    if let Err(e) = result {
                        warn!("{name} ended abnormally: {e}");
                    }
                }
            }
            Err(_) => {
                warn!("tasks still running after {grace:?}, aborting");
                aborts.iter().for_each(|a| a.abort());
            }
        }
    }
}
