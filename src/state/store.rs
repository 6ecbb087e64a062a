use crate::state::merge;
use crate::state::shutdown::Shutdown;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use ncaabase_api::{Game, Source};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Notify, watch};

/// One fully built, ordered view. Readers only ever see complete snapshots.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub generation: u64,
    pub built_at: Option<DateTime<Utc>>,
    pub games: Vec<Game>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    #[default]
    Idle,
    Discovering,
    ActivePolling,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Discovering => "discovering",
            Phase::ActivePolling => "active-polling",
        }
    }
}

/// Per-provider counters. Failures end up here instead of reaching readers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceHealth {
    pub polls: u64,
    pub errors: u64,
    pub last_poll: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub phase: Phase,
    pub active: usize,
    pub cached_keys: usize,
    pub endpoints: usize,
    pub records: usize,
}

#[derive(Debug, Default)]
struct Layers {
    schedule: Vec<Game>,
    live: BTreeMap<Source, Vec<Game>>,
}

/// Holds the schedule and live layers and publishes merged snapshots.
///
/// Layer writers (refresher, pollers) mark the store dirty; the [`RebuildTrigger`]
/// task coalesces those marks into rebuilds, one at a time.
#[derive(Debug)]
pub struct GameStore {
    layers: Mutex<Layers>,
    rebuilding: Mutex<()>,
    dirty: Notify,
    snapshot: watch::Sender<Arc<Snapshot>>,
    health: Mutex<BTreeMap<Source, SourceHealth>>,
}

impl Default for GameStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GameStore {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Snapshot::default()));
        Self {
            layers: Mutex::new(Layers::default()),
            rebuilding: Mutex::new(()),
            dirty: Notify::new(),
            snapshot,
            health: Mutex::new(BTreeMap::new()),
        }
    }

    /// Swap in a new schedule layer. Repeated ids keep their first occurrence.
    pub fn replace_schedule(&self, games: Vec<Game>) {
        let mut seen = HashSet::new();
        let games: Vec<Game> = games
            .into_iter()
            .filter(|g| {
                let first = seen.insert(g.id.clone());
                if !first {
                    warn!("dropping repeated schedule id {} ({} vs {})", g.id, g.away.name, g.home.name);
                }
                first
            })
            .collect();
        debug!("schedule layer replaced: {} games", games.len());
        self.lock_layers().schedule = games;
        self.dirty.notify_one();
    }

    /// Swap in one live source's records.
    pub fn replace_live(&self, source: Source, games: Vec<Game>) {
        debug!("{source} live layer replaced: {} records", games.len());
        let mut layers = self.lock_layers();
        if games.is_empty() {
            layers.live.remove(&source);
        } else {
            layers.live.insert(source, games);
        }
        drop(layers);
        self.dirty.notify_one();
    }

    /// Merge the current layers and publish the result.
    pub fn rebuild(&self) -> Arc<Snapshot> {
        let _serial = self.rebuilding.lock().unwrap_or_else(PoisonError::into_inner);
        let (schedule, live) = {
            let layers = self.lock_layers();
            (layers.schedule.clone(), layers.live.clone())
        };
        let games = merge::rebuild(&schedule, &live);
        let snapshot = Arc::new(Snapshot {
            generation: self.snapshot.borrow().generation + 1,
            built_at: Some(Utc::now()),
            games,
        });
        self.snapshot.send_replace(snapshot.clone());
        snapshot
    }

    /// Latest complete snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshot.subscribe()
    }

    /// Wait until a layer has been replaced since the last wake-up. Marks made
    /// while nobody waits collapse into one.
    pub async fn changed(&self) {
        self.dirty.notified().await;
    }

    pub fn update_health(&self, source: Source, update: impl FnOnce(&mut SourceHealth)) {
        let mut health = self.health.lock().unwrap_or_else(PoisonError::into_inner);
        update(health.entry(source).or_default());
    }

    pub fn health(&self) -> BTreeMap<Source, SourceHealth> {
        self.health.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn lock_layers(&self) -> std::sync::MutexGuard<'_, Layers> {
        self.layers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Background task that turns layer changes into rebuilds.
pub struct RebuildTrigger {
    store: Arc<GameStore>,
    shutdown: Shutdown,
}

impl RebuildTrigger {
    pub fn new(store: Arc<GameStore>, shutdown: Shutdown) -> Self {
        Self { store, shutdown }
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.store.changed() => {
                    let snapshot = self.store.rebuild();
                    debug!("snapshot {} built: {} games", snapshot.generation, snapshot.games.len());
                }
                _ = self.shutdown.wait() => break,
            }
        }
        debug!("rebuild trigger stopped");
    }
}
