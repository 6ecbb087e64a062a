use log::debug;
use ncaabase_api::adapter::{Endpoint, LiveAdapter};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::time::timeout;

/// An endpoint believed to have a game in progress, and how to poll it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveEntry {
    pub key: String,
    /// The key came from a discovery strategy rather than the endpoint itself.
    pub discovered: bool,
}

/// Endpoints polled on the fast cadence, keyed by endpoint id.
#[derive(Debug, Default)]
pub struct ActiveSet {
    members: BTreeMap<String, ActiveEntry>,
}

impl ActiveSet {
    /// Returns true when the endpoint was not already active.
    pub fn insert(&mut self, endpoint_id: &str, entry: ActiveEntry) -> bool {
        self.members.insert(endpoint_id.to_owned(), entry).is_none()
    }

    pub fn remove(&mut self, endpoint_id: &str) -> bool {
        self.members.remove(endpoint_id).is_some()
    }

    pub fn contains(&self, endpoint_id: &str) -> bool {
        self.members.contains_key(endpoint_id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn entries(&self) -> Vec<(String, ActiveEntry)> {
        self.members.iter().map(|(id, e)| (id.clone(), e.clone())).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedKey {
    pub key: String,
    pub strategy: &'static str,
}

/// Discovered poll keys. An entry lives for the whole process unless evicted.
#[derive(Debug, Default)]
pub struct KeyCache {
    keys: HashMap<String, CachedKey>,
}

impl KeyCache {
    pub fn get(&self, endpoint_id: &str) -> Option<&CachedKey> {
        self.keys.get(endpoint_id)
    }

    pub fn insert(&mut self, endpoint_id: &str, key: CachedKey) {
        self.keys.insert(endpoint_id.to_owned(), key);
    }

    pub fn evict(&mut self, endpoint_id: &str) -> Option<CachedKey> {
        self.keys.remove(endpoint_id)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Try the adapter's strategies in order; the first one that yields a key wins.
/// Failures, timeouts and empty answers all fall through to the next strategy.
pub async fn run_strategies<A: LiveAdapter>(
    adapter: &A,
    endpoint: &Endpoint,
    call_timeout: Duration,
) -> Option<CachedKey> {
    for &strategy in adapter.discovery_strategies() {
        match timeout(call_timeout, adapter.discover(endpoint, strategy)).await {
            Ok(Ok(Some(key))) if !key.trim().is_empty() => {
                return Some(CachedKey { key, strategy });
            }
            Ok(Ok(_)) => debug!("{}: {strategy} found no key for {}", adapter.source(), endpoint.id),
            Ok(Err(e)) => debug!("{}: {strategy} failed for {}: {e}", adapter.source(), endpoint.id),
            Err(_) => debug!("{}: {strategy} timed out for {}", adapter.source(), endpoint.id),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use ncaabase_api::client::{ApiError, ApiResult};
    use ncaabase_api::{Game, Source};
    use std::sync::Mutex;

    struct Strategies {
        answers: Vec<(&'static str, ApiResult<Option<String>>)>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl LiveAdapter for Strategies {
        fn source(&self) -> Source {
            Source::SidearmLive
        }

        fn endpoints(&self) -> Vec<Endpoint> {
            Vec::new()
        }

        fn discovery_strategies(&self) -> &'static [&'static str] {
            &["first", "second", "third"]
        }

        async fn discover(&self, _endpoint: &Endpoint, strategy: &str) -> ApiResult<Option<String>> {
            let (name, answer) = self
                .answers
                .iter()
                .find(|(name, _)| *name == strategy)
                .expect("strategy is scripted");
            self.calls.lock().unwrap().push(*name);
            match answer {
                Ok(key) => Ok(key.clone()),
                Err(_) => Err(ApiError::Other("scripted failure".into())),
            }
        }

        async fn poll(&self, _key: &str) -> ApiResult<Vec<Game>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn first_successful_strategy_wins() {
        let adapter = Strategies {
            answers: vec![
                ("first", Err(ApiError::Other("boom".into()))),
                ("second", Ok(Some("yale".into()))),
                ("third", Ok(Some("never".into()))),
            ],
            calls: Mutex::new(Vec::new()),
        };
        let endpoint = Endpoint::discoverable("yalebulldogs.com", "Yale");
        let found = run_strategies(&adapter, &endpoint, Duration::from_secs(1)).await;
        assert_eq!(found, Some(CachedKey { key: "yale".into(), strategy: "second" }));
        assert_eq!(*adapter.calls.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn blank_and_missing_keys_fall_through() {
        let adapter = Strategies {
            answers: vec![("first", Ok(Some("  ".into()))), ("second", Ok(None)), ("third", Ok(None))],
            calls: Mutex::new(Vec::new()),
        };
        let endpoint = Endpoint::discoverable("x.com", "X");
        assert_eq!(run_strategies(&adapter, &endpoint, Duration::from_secs(1)).await, None);
        assert_eq!(adapter.calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn active_set_tracks_membership() {
        let mut active = ActiveSet::default();
        let entry = ActiveEntry { key: "k".into(), discovered: false };
        assert!(active.insert("a", entry.clone()));
        assert!(!active.insert("a", entry));
        assert!(active.contains("a"));
        assert_eq!(active.len(), 1);
        assert!(active.remove("a"));
        assert!(!active.remove("a"));
        assert!(active.is_empty());
    }

    #[test]
    fn key_cache_evicts() {
        let mut cache = KeyCache::default();
        cache.insert("yalebulldogs.com", CachedKey { key: "yale".into(), strategy: "second" });
        assert_eq!(cache.get("yalebulldogs.com").map(|k| k.key.as_str()), Some("yale"));
        assert!(cache.evict("yalebulldogs.com").is_some());
        assert!(cache.is_empty());
    }
}
