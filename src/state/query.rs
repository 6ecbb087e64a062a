use crate::state::store::{GameStore, SourceHealth};
use chrono::{DateTime, Utc};
use ncaabase_api::{Game, GameStatus, Source};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Read-only view over the latest complete snapshot.
#[derive(Debug, Clone)]
pub struct Scoreboard {
    store: Arc<GameStore>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub live: usize,
    #[serde(rename = "final")]
    pub finals: usize,
    pub scheduled: usize,
    pub cancelled: usize,
    /// Games each provider contributed to, as identity owner or overlay.
    pub per_source: BTreeMap<Source, usize>,
    pub last_refresh: BTreeMap<Source, Option<DateTime<Utc>>>,
    pub errors: BTreeMap<Source, u64>,
    pub sources: BTreeMap<Source, SourceHealth>,
    pub generation: u64,
    pub built_at: Option<DateTime<Utc>>,
}

impl Scoreboard {
    pub fn new(store: Arc<GameStore>) -> Self {
        Self { store }
    }

    /// Every game, ordered for viewing.
    pub fn games(&self) -> Vec<Game> {
        self.store.snapshot().games.clone()
    }

    pub fn live_games(&self) -> Vec<Game> {
        self.filtered(|g| g.status == GameStatus::Live)
    }

    /// Games where either side's conference equals `tag` or contains it (or the
    /// other way round), ignoring case.
    pub fn games_by_conference(&self, tag: &str) -> Vec<Game> {
        self.filtered(|g| g.has_conference(tag))
    }

    pub fn stats(&self) -> Stats {
        let snapshot = self.store.snapshot();
        let health = self.store.health();
        let mut stats = Stats {
            total: snapshot.games.len(),
            generation: snapshot.generation,
            built_at: snapshot.built_at,
            ..Default::default()
        };

        for game in &snapshot.games {
            match game.status {
                GameStatus::Live => stats.live += 1,
                GameStatus::Final => stats.finals += 1,
                GameStatus::Scheduled => stats.scheduled += 1,
                GameStatus::Cancelled => stats.cancelled += 1,
            }
            for source in game.contributors() {
                *stats.per_source.entry(source).or_default() += 1;
            }
        }
        for (source, h) in &health {
            stats.last_refresh.insert(*source, h.last_success);
            stats.errors.insert(*source, h.errors);
        }
        stats.sources = health;
        stats
    }

    fn filtered(&self, keep: impl Fn(&Game) -> bool) -> Vec<Game> {
        self.store
            .snapshot()
            .games
            .iter()
            .filter(|g| keep(g))
            .cloned()
            .collect()
    }
}
