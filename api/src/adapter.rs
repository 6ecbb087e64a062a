//! Source adapters: the only surface the aggregation core sees of a provider.
//!
//! A schedule adapter yields the day's full game list. A live adapter exposes a
//! universe of endpoints (schools, scoreboards) that the poller scans and polls.
//! Both return canonical [`Game`] records or an [`ApiError`]; nothing
//! provider-shaped crosses this boundary.
use crate::client::{ApiError, ApiResult, BaseballApi};
use crate::sidearm::SidearmSchool;
use crate::statbroadcast::{self, StatBroadcastSchool};
use crate::{Game, Source};
use chrono::{Local, Utc};
use std::future::Future;

/// One addressable thing a live provider can be polled for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Stable across scans; used as the active-set and cache key.
    pub id: String,
    pub name: String,
    /// Poll key when the provider is statically addressed. `None` means the key
    /// has to be discovered.
    pub key: Option<String>,
}

impl Endpoint {
    pub fn fixed(id: impl Into<String>, name: impl Into<String>) -> Self {
        let id = id.into();
        Self { key: Some(id.clone()), id, name: name.into() }
    }

    pub fn discoverable(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into(), key: None }
    }
}

pub trait ScheduleAdapter: Send + Sync + 'static {
    fn source(&self) -> Source;

    fn fetch_schedule(&self) -> impl Future<Output = ApiResult<Vec<Game>>> + Send;
}

pub trait LiveAdapter: Send + Sync + 'static {
    fn source(&self) -> Source;

    fn endpoints(&self) -> Vec<Endpoint>;

    /// Ordered identifier-discovery strategies. Empty for statically addressed providers.
    fn discovery_strategies(&self) -> &'static [&'static str] {
        &[]
    }

    fn discover(
        &self,
        endpoint: &Endpoint,
        strategy: &str,
    ) -> impl Future<Output = ApiResult<Option<String>>> + Send {
        let result = match &endpoint.key {
            Some(key) => Ok(Some(key.clone())),
            None => Err(ApiError::Other(format!(
                "{}: no discovery strategy {strategy}",
                self.source()
            ))),
        };
        async move { result }
    }

    fn poll(&self, key: &str) -> impl Future<Output = ApiResult<Vec<Game>>> + Send;
}

// ---------------------------------------------------------------------------
// Schedule adapters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct PearSchedule {
    api: BaseballApi,
}

impl PearSchedule {
    pub fn new(api: BaseballApi) -> Self {
        Self { api }
    }
}

impl ScheduleAdapter for PearSchedule {
    fn source(&self) -> Source {
        Source::Pear
    }

    async fn fetch_schedule(&self) -> ApiResult<Vec<Game>> {
        self.api.fetch_pear_schedule(Local::now().date_naive()).await
    }
}

#[derive(Debug, Clone, Default)]
pub struct SidearmSchedule {
    api: BaseballApi,
}

impl SidearmSchedule {
    pub fn new(api: BaseballApi) -> Self {
        Self { api }
    }
}

impl ScheduleAdapter for SidearmSchedule {
    fn source(&self) -> Source {
        Source::Sidearm
    }

    async fn fetch_schedule(&self) -> ApiResult<Vec<Game>> {
        self.api.fetch_sidearm_schedule(Local::now().date_naive()).await
    }
}

// ---------------------------------------------------------------------------
// Live adapters
// ---------------------------------------------------------------------------

pub const HOST_LIVESTATS: &str = "host-livestats";
pub const SIDEARMSTATS_GUESS: &str = "sidearmstats-guess";

/// Per-school sidearmstats feeds. Schools without a known client code are
/// resolved through [`HOST_LIVESTATS`] first, then [`SIDEARMSTATS_GUESS`].
#[derive(Debug, Clone)]
pub struct SidearmLive {
    api: BaseballApi,
    schools: Vec<SidearmSchool>,
}

impl SidearmLive {
    pub fn new(api: BaseballApi, schools: Vec<SidearmSchool>) -> Self {
        Self { api, schools }
    }
}

impl LiveAdapter for SidearmLive {
    fn source(&self) -> Source {
        Source::SidearmLive
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        self.schools
            .iter()
            .map(|s| Endpoint {
                id: s.host.clone(),
                name: s.name.clone(),
                key: s.abbrev.clone(),
            })
            .collect()
    }

    fn discovery_strategies(&self) -> &'static [&'static str] {
        &[HOST_LIVESTATS, SIDEARMSTATS_GUESS]
    }

    async fn discover(&self, endpoint: &Endpoint, strategy: &str) -> ApiResult<Option<String>> {
        match strategy {
            HOST_LIVESTATS => self.api.fetch_sidearm_abbrev_from_host(&endpoint.id).await,
            SIDEARMSTATS_GUESS => self.api.fetch_sidearm_abbrev_guess(&endpoint.id).await,
            other => Err(ApiError::Other(format!("unknown sidearm strategy {other}"))),
        }
    }

    async fn poll(&self, key: &str) -> ApiResult<Vec<Game>> {
        self.api.fetch_sidearm_game(key).await
    }
}

/// StatBroadcast landing pages, addressed by school gid.
#[derive(Debug, Clone)]
pub struct StatBroadcastLive {
    api: BaseballApi,
    schools: Vec<StatBroadcastSchool>,
}

impl StatBroadcastLive {
    pub fn new(api: BaseballApi, schools: Vec<StatBroadcastSchool>) -> Self {
        Self { api, schools }
    }
}

impl LiveAdapter for StatBroadcastLive {
    fn source(&self) -> Source {
        Source::StatBroadcast
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        self.schools
            .iter()
            .map(|s| Endpoint::fixed(s.gid.clone(), s.name.clone()))
            .collect()
    }

    async fn poll(&self, key: &str) -> ApiResult<Vec<Game>> {
        let html = self.api.fetch_statbroadcast_page(key).await?;
        let school = self
            .schools
            .iter()
            .find(|s| s.gid == key)
            .cloned()
            .unwrap_or_else(|| StatBroadcastSchool {
                name: key.to_owned(),
                gid: key.to_owned(),
                conference: None,
            });
        Ok(statbroadcast::parse_games(&html, &school, Utc::now()))
    }
}

pub const ESPN_SCOREBOARD: &str = "espn-scoreboard";

/// ESPN's daily scoreboard: a single endpoint covering every Division I game it tracks.
#[derive(Debug, Clone, Default)]
pub struct EspnLive {
    api: BaseballApi,
}

impl EspnLive {
    pub fn new(api: BaseballApi) -> Self {
        Self { api }
    }
}

impl LiveAdapter for EspnLive {
    fn source(&self) -> Source {
        Source::Espn
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        vec![Endpoint::fixed(ESPN_SCOREBOARD, "ESPN college baseball scoreboard")]
    }

    async fn poll(&self, _key: &str) -> ApiResult<Vec<Game>> {
        self.api.fetch_espn_scoreboard(Local::now().date_naive()).await
    }
}
