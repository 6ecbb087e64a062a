use crate::state::discovery::{ActiveEntry, ActiveSet, KeyCache, run_strategies};
use crate::state::shutdown::Shutdown;
use crate::state::store::{GameStore, Phase, SourceHealth};
use chrono::Utc;
use futures_util::future::join_all;
use log::{debug, info};
use ncaabase_api::adapter::{Endpoint, LiveAdapter};
use ncaabase_api::client::{ApiError, ApiResult};
use ncaabase_api::{Game, GameStatus};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::time::{MissedTickBehavior, interval, sleep, timeout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub poll_interval: Duration,
    pub discovery_interval: Duration,
    pub batch_size: usize,
    pub batch_pause: Duration,
    /// Upper bound on any single provider call.
    pub call_timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15),
            discovery_interval: Duration::from_secs(180),
            batch_size: 10,
            batch_pause: Duration::from_millis(300),
            call_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Default)]
struct PollerState {
    phase: Phase,
    active: ActiveSet,
    keys: KeyCache,
    /// Non-scheduled records per endpoint id, as last reported.
    records: BTreeMap<String, Vec<Game>>,
}

enum PollApplied {
    Kept,
    Evicted,
    KeyGone,
    /// A discovery scan removed the endpoint while its poll was in flight.
    Stale,
    Failed(ApiError),
}

enum ScanOutcome {
    Polled { entry: ActiveEntry, games: Vec<Game> },
    NoKey,
    Failed { discovered: bool, error: ApiError },
}

/// Drives one live adapter: slow discovery scans over every endpoint, fast
/// polls over the endpoints that currently have a game in progress.
pub struct LivePoller<A> {
    adapter: A,
    store: Arc<GameStore>,
    config: PollerConfig,
    state: Mutex<PollerState>,
}

impl<A: LiveAdapter> LivePoller<A> {
    pub fn new(adapter: A, store: Arc<GameStore>, config: PollerConfig) -> Self {
        Self {
            adapter,
            store,
            config,
            state: Mutex::new(PollerState::default()),
        }
    }

    pub async fn run(self, shutdown: Shutdown) {
        info!("{} poller started", self.adapter.source());
        tokio::join!(self.discovery_loop(shutdown.clone()), self.active_loop(shutdown));
        self.lock().phase = Phase::Idle;
        self.report_health(|_| {});
        info!("{} poller stopped", self.adapter.source());
    }

    async fn discovery_loop(&self, mut shutdown: Shutdown) {
        let mut ticker = interval(self.config.discovery_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = async {
                    ticker.tick().await;
                    self.discovery_scan().await;
                } => {}
            }
        }
    }

    async fn active_loop(&self, mut shutdown: Shutdown) {
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = async {
                    ticker.tick().await;
                    self.poll_active().await;
                } => {}
            }
        }
    }

    /// Sweep the full endpoint universe in bounded batches, rebuilding the active set.
    pub async fn discovery_scan(&self) {
        let source = self.adapter.source();
        let started = Instant::now();
        let endpoints = self.adapter.endpoints();
        self.lock().phase = Phase::Discovering;
        self.report_health(|h| h.endpoints = endpoints.len());

        let batches: Vec<&[Endpoint]> = endpoints.chunks(self.config.batch_size.max(1)).collect();
        let mut failures = 0usize;
        for (i, batch) in batches.iter().enumerate() {
            let outcomes = join_all(batch.iter().map(|ep| self.scan_endpoint(ep))).await;
            {
                let mut state = self.lock();
                for (endpoint, outcome) in batch.iter().zip(outcomes) {
                    if matches!(outcome, ScanOutcome::Failed { .. }) {
                        failures += 1;
                    }
                    apply_scan(&mut state, endpoint, outcome);
                }
            }
            self.publish();
            if i + 1 < batches.len() && !self.config.batch_pause.is_zero() {
                sleep(self.config.batch_pause).await;
            }
        }

        let active = {
            let mut state = self.lock();
            state.phase = if state.active.is_empty() { Phase::Idle } else { Phase::ActivePolling };
            state.active.len()
        };
        self.report_health(|_| {});
        info!(
            "{source} discovery scan: {} endpoints, {active} active, {failures} failed in {:.1}s",
            endpoints.len(),
            started.elapsed().as_secs_f64()
        );
    }

    /// Poll every active endpoint at once. Endpoints with no live game leave the set.
    pub async fn poll_active(&self) {
        let targets = self.lock().active.entries();
        if targets.is_empty() {
            return;
        }

        let results = join_all(targets.iter().map(|(_, entry)| self.poll_key(&entry.key))).await;
        let source = self.adapter.source();
        let mut evicted = 0usize;
        {
            let mut state = self.lock();
            for ((endpoint_id, entry), result) in targets.iter().zip(results) {
                match apply_poll(&mut state, endpoint_id, entry, result) {
                    PollApplied::Kept => {}
                    PollApplied::Evicted => evicted += 1,
                    PollApplied::KeyGone => {
                        debug!("{source}: key {} for {endpoint_id} is gone, evicting", entry.key);
                        evicted += 1;
                    }
                    PollApplied::Stale => debug!("{source}: {endpoint_id} left the active set mid-poll, dropping result"),
                    PollApplied::Failed(e) => debug!("{source}: poll of {endpoint_id} failed, keeping it: {e}"),
                }
            }
            if state.active.is_empty() {
                state.phase = Phase::Idle;
            }
        }
        self.publish();
        debug!("{source} active poll: {} polled, {evicted} evicted", targets.len());
    }

    async fn scan_endpoint(&self, endpoint: &Endpoint) -> ScanOutcome {
        let (key, discovered) = match &endpoint.key {
            Some(key) => (key.clone(), false),
            None => {
                let cached = self.lock().keys.get(&endpoint.id).map(|c| c.key.clone());
                match cached {
                    Some(key) => (key, true),
                    None => match run_strategies(&self.adapter, endpoint, self.config.call_timeout).await {
                        Some(found) => {
                            info!(
                                "{}: found key {} for {} via {}",
                                self.adapter.source(),
                                found.key,
                                endpoint.id,
                                found.strategy
                            );
                            let key = found.key.clone();
                            self.lock().keys.insert(&endpoint.id, found);
                            (key, true)
                        }
                        None => return ScanOutcome::NoKey,
                    },
                }
            }
        };

        match self.poll_key(&key).await {
            Ok(games) => ScanOutcome::Polled { entry: ActiveEntry { key, discovered }, games },
            Err(error) => ScanOutcome::Failed { discovered, error },
        }
    }

    /// One timeout-bounded provider call, counted in the source's health.
    async fn poll_key(&self, key: &str) -> ApiResult<Vec<Game>> {
        let result = match timeout(self.config.call_timeout, self.adapter.poll(key)).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Other(format!("poll of {key} timed out"))),
        };
        let now = Utc::now();
        let ok = result.is_ok();
        self.store.update_health(self.adapter.source(), |h| {
            h.polls += 1;
            h.last_poll = Some(now);
            if ok {
                h.last_success = Some(now);
            } else {
                h.errors += 1;
            }
        });
        result
    }

    /// Push this source's records into the store's live layer.
    fn publish(&self) {
        let games = {
            let state = self.lock();
            let mut seen = HashSet::new();
            state
                .records
                .values()
                .flatten()
                .filter(|g| seen.insert(g.id.clone()))
                .cloned()
                .collect::<Vec<_>>()
        };
        let records = games.len();
        self.store.replace_live(self.adapter.source(), games);
        self.report_health(|h| h.records = records);
    }

    fn report_health(&self, extra: impl FnOnce(&mut SourceHealth)) {
        let (phase, active, cached) = {
            let state = self.lock();
            (state.phase, state.active.len(), state.keys.len())
        };
        self.store.update_health(self.adapter.source(), |h| {
            h.phase = phase;
            h.active = active;
            h.cached_keys = cached;
            extra(h);
        });
    }

    fn lock(&self) -> MutexGuard<'_, PollerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    fn active_ids(&self) -> Vec<String> {
        self.lock().active.entries().into_iter().map(|(id, _)| id).collect()
    }

    #[cfg(test)]
    fn cached_key(&self, endpoint_id: &str) -> Option<crate::state::discovery::CachedKey> {
        self.lock().keys.get(endpoint_id).cloned()
    }
}

fn apply_scan(state: &mut PollerState, endpoint: &Endpoint, outcome: ScanOutcome) {
    match outcome {
        ScanOutcome::Polled { entry, games } => {
            let games = reportable(games);
            if games.iter().any(Game::is_live) {
                state.active.insert(&endpoint.id, entry);
            } else {
                state.active.remove(&endpoint.id);
            }
            store_records(state, &endpoint.id, games);
        }
        ScanOutcome::NoKey => {
            state.active.remove(&endpoint.id);
            state.records.remove(&endpoint.id);
        }
        ScanOutcome::Failed { discovered, error } => {
            if discovered && error.is_not_found() {
                state.keys.evict(&endpoint.id);
            }
            state.active.remove(&endpoint.id);
            state.records.remove(&endpoint.id);
        }
    }
}

fn apply_poll(
    state: &mut PollerState,
    endpoint_id: &str,
    entry: &ActiveEntry,
    result: ApiResult<Vec<Game>>,
) -> PollApplied {
    if !state.active.contains(endpoint_id) {
        return PollApplied::Stale;
    }
    match result {
        Ok(games) => {
            let games = reportable(games);
            let live = games.iter().any(Game::is_live);
            if !live {
                state.active.remove(endpoint_id);
            }
            store_records(state, endpoint_id, games);
            if live {
                PollApplied::Kept
            } else {
                PollApplied::Evicted
            }
        }
        Err(e) if e.is_not_found() && entry.discovered => {
            state.keys.evict(endpoint_id);
            state.active.remove(endpoint_id);
            state.records.remove(endpoint_id);
            PollApplied::KeyGone
        }
        Err(e) => PollApplied::Failed(e),
    }
}

/// Only games with something to show go into the live layer.
fn reportable(games: Vec<Game>) -> Vec<Game> {
    games.into_iter().filter(|g| g.status != GameStatus::Scheduled).collect()
}

fn store_records(state: &mut PollerState, endpoint_id: &str, games: Vec<Game>) {
    if games.is_empty() {
        state.records.remove(endpoint_id);
    } else {
        state.records.insert(endpoint_id.to_owned(), games);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::shutdown;
    use ncaabase_api::{Source, TeamSide};
    use std::collections::HashMap;

    type Script = HashMap<String, ApiResult<Vec<Game>>>;

    /// Live adapter whose poll answers are scripted per key and can be changed between calls.
    struct FakeLive {
        endpoints: Vec<Endpoint>,
        polls: Mutex<Script>,
        discover_calls: Mutex<usize>,
        poll_calls: Mutex<Vec<String>>,
    }

    impl FakeLive {
        fn new(endpoints: Vec<Endpoint>) -> Self {
            Self {
                endpoints,
                polls: Mutex::new(HashMap::new()),
                discover_calls: Mutex::new(0),
                poll_calls: Mutex::new(Vec::new()),
            }
        }

        fn answer(&self, key: &str, result: ApiResult<Vec<Game>>) {
            self.polls.lock().unwrap().insert(key.to_owned(), result);
        }
    }

    impl LiveAdapter for FakeLive {
        fn source(&self) -> Source {
            Source::SidearmLive
        }

        fn endpoints(&self) -> Vec<Endpoint> {
            self.endpoints.clone()
        }

        fn discovery_strategies(&self) -> &'static [&'static str] {
            &["fake"]
        }

        async fn discover(&self, endpoint: &Endpoint, _strategy: &str) -> ApiResult<Option<String>> {
            *self.discover_calls.lock().unwrap() += 1;
            Ok(Some(format!("key-{}", endpoint.id)))
        }

        async fn poll(&self, key: &str) -> ApiResult<Vec<Game>> {
            self.poll_calls.lock().unwrap().push(key.to_owned());
            match self.polls.lock().unwrap().get(key) {
                Some(Ok(games)) => Ok(games.clone()),
                Some(Err(ApiError::NotFound(url))) => Err(ApiError::NotFound(url.clone())),
                Some(Err(_)) => Err(ApiError::Other("scripted failure".into())),
                None => Ok(Vec::new()),
            }
        }
    }

    fn game(id: &str, status: GameStatus) -> Game {
        let mut game = Game::new(id, Source::SidearmLive, TeamSide::named(format!("{id} home")), TeamSide::named(format!("{id} away")));
        game.status = status;
        game
    }

    fn config() -> PollerConfig {
        PollerConfig {
            batch_size: 2,
            batch_pause: Duration::ZERO,
            call_timeout: Duration::from_secs(1),
            ..Default::default()
        }
    }

    fn poller(adapter: FakeLive) -> (LivePoller<FakeLive>, Arc<GameStore>) {
        let store = Arc::new(GameStore::new());
        (LivePoller::new(adapter, store.clone(), config()), store)
    }

    #[tokio::test]
    async fn discovery_activates_only_endpoints_with_live_games() {
        let adapter = FakeLive::new(vec![
            Endpoint::fixed("a", "A"),
            Endpoint::fixed("b", "B"),
            Endpoint::fixed("c", "C"),
        ]);
        adapter.answer("a", Ok(vec![game("g-a", GameStatus::Live)]));
        adapter.answer("b", Ok(vec![game("g-b", GameStatus::Final)]));
        adapter.answer("c", Ok(vec![game("g-c", GameStatus::Scheduled)]));
        let (poller, store) = poller(adapter);

        poller.discovery_scan().await;
        assert_eq!(poller.active_ids(), vec!["a"]);

        let snap = store.rebuild();
        let ids: Vec<&str> = snap.games.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["g-a", "g-b"], "scheduled records stay out of the live layer");

        let health = &store.health()[&Source::SidearmLive];
        assert_eq!(health.polls, 3);
        assert_eq!(health.endpoints, 3);
        assert_eq!(health.active, 1);
        assert_eq!(health.phase, Phase::ActivePolling);
    }

    #[tokio::test]
    async fn active_poll_evicts_endpoint_without_live_game() {
        let adapter = FakeLive::new(vec![Endpoint::fixed("a", "A"), Endpoint::fixed("b", "B")]);
        adapter.answer("a", Ok(vec![game("g-a", GameStatus::Live)]));
        adapter.answer("b", Ok(vec![game("g-b", GameStatus::Live)]));
        let (poller, store) = poller(adapter);
        poller.discovery_scan().await;
        assert_eq!(poller.active_ids(), vec!["a", "b"]);

        poller.adapter.answer("a", Ok(vec![game("g-a", GameStatus::Final)]));
        poller.poll_active().await;
        assert_eq!(poller.active_ids(), vec!["b"]);

        let snap = store.rebuild();
        let finished = snap.games.iter().find(|g| g.id == "g-a").unwrap();
        assert_eq!(finished.status, GameStatus::Final, "final record outlives its active slot");
    }

    #[tokio::test]
    async fn transient_active_poll_failure_keeps_endpoint() {
        let adapter = FakeLive::new(vec![Endpoint::fixed("a", "A")]);
        adapter.answer("a", Ok(vec![game("g-a", GameStatus::Live)]));
        let (poller, store) = poller(adapter);
        poller.discovery_scan().await;

        poller.adapter.answer("a", Err(ApiError::Other("503".into())));
        poller.poll_active().await;
        assert_eq!(poller.active_ids(), vec!["a"]);
        assert_eq!(store.rebuild().games.len(), 1);
        assert_eq!(store.health()[&Source::SidearmLive].errors, 1);
    }

    #[tokio::test]
    async fn discovered_keys_are_cached_and_evicted_on_not_found() {
        let adapter = FakeLive::new(vec![Endpoint::discoverable("yale.com", "Yale")]);
        adapter.answer("key-yale.com", Ok(vec![game("g-y", GameStatus::Live)]));
        let (poller, _store) = poller(adapter);

        poller.discovery_scan().await;
        poller.discovery_scan().await;
        assert_eq!(*poller.adapter.discover_calls.lock().unwrap(), 1, "cached after first success");
        assert_eq!(poller.cached_key("yale.com").unwrap().strategy, "fake");

        poller.adapter.answer("key-yale.com", Err(ApiError::NotFound("gone".into())));
        poller.poll_active().await;
        assert!(poller.active_ids().is_empty());
        assert!(poller.cached_key("yale.com").is_none());
    }

    #[tokio::test]
    async fn discovery_failure_drops_endpoint_records() {
        let adapter = FakeLive::new(vec![Endpoint::fixed("a", "A")]);
        adapter.answer("a", Ok(vec![game("g-a", GameStatus::Live)]));
        let (poller, store) = poller(adapter);
        poller.discovery_scan().await;

        poller.adapter.answer("a", Err(ApiError::Other("down".into())));
        poller.discovery_scan().await;
        assert!(poller.active_ids().is_empty());
        assert!(store.rebuild().games.is_empty());
        assert_eq!(store.health()[&Source::SidearmLive].phase, Phase::Idle);
    }

    #[tokio::test]
    async fn duplicate_games_across_endpoints_are_published_once() {
        let adapter = FakeLive::new(vec![Endpoint::fixed("a", "A"), Endpoint::fixed("b", "B")]);
        adapter.answer("a", Ok(vec![game("sb-1", GameStatus::Live)]));
        adapter.answer("b", Ok(vec![game("sb-1", GameStatus::Live)]));
        let (poller, store) = poller(adapter);
        poller.discovery_scan().await;
        assert_eq!(store.rebuild().games.len(), 1);
    }

    #[test]
    fn poll_result_for_endpoint_removed_mid_poll_is_dropped() {
        let mut state = PollerState::default();
        let entry = ActiveEntry { key: "a".into(), discovered: false };

        let applied = apply_poll(&mut state, "a", &entry, Ok(vec![game("g-a", GameStatus::Live)]));
        assert!(matches!(applied, PollApplied::Stale));
        assert!(state.records.is_empty());
        assert!(!state.active.contains("a"));
    }

    #[test]
    fn poll_result_for_active_endpoint_is_stored() {
        let mut state = PollerState::default();
        let entry = ActiveEntry { key: "a".into(), discovered: false };
        state.active.insert("a", entry.clone());

        let applied = apply_poll(&mut state, "a", &entry, Ok(vec![game("g-a", GameStatus::Live)]));
        assert!(matches!(applied, PollApplied::Kept));
        assert_eq!(state.records["a"].len(), 1);
    }

    /// Counts concurrent polls and stamps when each one starts.
    struct SlowLive {
        endpoints: Vec<Endpoint>,
        in_flight: Mutex<usize>,
        peak: Mutex<usize>,
        starts: Mutex<Vec<tokio::time::Instant>>,
    }

    impl LiveAdapter for SlowLive {
        fn source(&self) -> Source {
            Source::StatBroadcast
        }

        fn endpoints(&self) -> Vec<Endpoint> {
            self.endpoints.clone()
        }

        async fn poll(&self, _key: &str) -> ApiResult<Vec<Game>> {
            {
                let mut in_flight = self.in_flight.lock().unwrap();
                *in_flight += 1;
                let mut peak = self.peak.lock().unwrap();
                *peak = (*peak).max(*in_flight);
                self.starts.lock().unwrap().push(tokio::time::Instant::now());
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
            *self.in_flight.lock().unwrap() -= 1;
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn discovery_scan_respects_batch_size_and_pause() {
        let adapter = SlowLive {
            endpoints: (0..5).map(|i| Endpoint::fixed(format!("e{i}"), format!("E{i}"))).collect(),
            in_flight: Mutex::new(0),
            peak: Mutex::new(0),
            starts: Mutex::new(Vec::new()),
        };
        let pause = Duration::from_millis(300);
        let config = PollerConfig { batch_pause: pause, ..config() };
        let poller = LivePoller::new(adapter, Arc::new(GameStore::new()), config);

        poller.discovery_scan().await;

        assert_eq!(*poller.adapter.peak.lock().unwrap(), 2);
        let starts = poller.adapter.starts.lock().unwrap().clone();
        assert_eq!(starts.len(), 5);
        assert_eq!(starts[0], starts[1], "one batch starts together");
        assert!(starts[2] - starts[1] >= pause, "pause between first and second batch");
        assert!(starts[4] - starts[3] >= pause, "pause between second and third batch");
    }

    #[tokio::test]
    async fn empty_active_set_makes_no_calls() {
        let (poller, _store) = poller(FakeLive::new(vec![Endpoint::fixed("a", "A")]));
        poller.poll_active().await;
        assert!(poller.adapter.poll_calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_shutdown() {
        let adapter = FakeLive::new(vec![Endpoint::fixed("a", "A")]);
        adapter.answer("a", Ok(vec![game("g-a", GameStatus::Live)]));
        let store = Arc::new(GameStore::new());
        let poller = LivePoller::new(adapter, store.clone(), config());
        let (trigger, shutdown) = shutdown::channel();

        let task = tokio::spawn(poller.run(shutdown));
        tokio::time::sleep(Duration::from_secs(40)).await;
        trigger.trigger();
        task.await.unwrap();

        let health = &store.health()[&Source::SidearmLive];
        assert!(health.polls >= 2, "initial scan plus active polls");
        assert_eq!(health.phase, Phase::Idle);
    }
}
