use crate::espn::{EspnCompetitor, EspnEvent, EspnSituation, ScoreboardResponse};
use crate::pear::{PearGame, PearResponse};
use crate::sidearm::{AggregationGame, AggregationResponse, LivePlayer, LiveStatsResponse};
use crate::{
    Game, GameStatus, Half, Player, Runners, Situation, Source, TeamSide, WinProbability,
    non_empty, parse_inning_label, slug,
};
use chrono::{DateTime, Datelike, Days, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

pub type ApiResult<T> = Result<T, ApiError>;

const ESPN_SCOREBOARD: &str =
    "https://site.api.espn.com/apis/site/v2/sports/baseball/college-baseball/scoreboard";
const PEAR_SCHEDULE: &str = "https://pearatings.com/api/cbase/schedule/today";
const SIDEARM_AGGREGATION: &str =
    "https://aggregation-service.sidearmsports.com/services/games.ashx";
const SIDEARM_STATS: &str = "https://sidearmstats.com";
const STATBROADCAST_EVENTS: &str = "https://www.statbroadcast.com/events/statbroadcast.php";

/// Base URLs for every provider. Overridable so tests can point at a local mock server.
#[derive(Debug, Clone)]
pub struct ProviderUrls {
    pub espn_scoreboard: String,
    pub pear_schedule: String,
    pub sidearm_aggregation: String,
    pub sidearm_stats: String,
    pub statbroadcast_events: String,
    /// When set, school sites are reached as `{school_sites}/{host}` instead of `https://{host}`.
    pub school_sites: Option<String>,
}

impl Default for ProviderUrls {
    fn default() -> Self {
        Self {
            espn_scoreboard: ESPN_SCOREBOARD.into(),
            pear_schedule: PEAR_SCHEDULE.into(),
            sidearm_aggregation: SIDEARM_AGGREGATION.into(),
            sidearm_stats: SIDEARM_STATS.into(),
            statbroadcast_events: STATBROADCAST_EVENTS.into(),
            school_sites: None,
        }
    }
}

/// HTTP client shared by every provider adapter.
#[derive(Debug, Clone)]
pub struct BaseballApi {
    client: Client,
    timeout: Duration,
    urls: ProviderUrls,
}

impl Default for BaseballApi {
    fn default() -> Self {
        Self {
            client: Client::builder()
                .user_agent("ncaabase/0.2 (college baseball scoreboard aggregator)")
                .build()
                .unwrap_or_default(),
            timeout: Duration::from_secs(10),
            urls: ProviderUrls::default(),
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    Network(reqwest::Error, String),
    Api(reqwest::Error, String),
    Parsing(reqwest::Error, String),
    NotFound(String),
    Other(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Network(e, url) => write!(f, "Network error for {url}: {e}"),
            ApiError::Api(e, url) => write!(f, "API error for {url}: {e}"),
            ApiError::Parsing(e, url) => write!(f, "Parse error for {url}: {e}"),
            ApiError::NotFound(msg) => write!(f, "Not found: {msg}"),
            ApiError::Other(msg) => write!(f, "Error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Network(e, _) | ApiError::Api(e, _) | ApiError::Parsing(e, _) => Some(e),
            ApiError::NotFound(_) | ApiError::Other(_) => None,
        }
    }
}

impl BaseballApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_urls(mut self, urls: ProviderUrls) -> Self {
        self.urls = urls;
        self
    }

    /// ESPN college baseball scoreboard for one day. groups=50 is Division I.
    pub async fn fetch_espn_scoreboard(&self, date: NaiveDate) -> ApiResult<Vec<Game>> {
        let url = format!(
            "{}?dates={}&limit=200&groups=50",
            self.urls.espn_scoreboard,
            date.format("%Y%m%d")
        );
        let raw: ScoreboardResponse = self.get(&url).await?;
        let now = Utc::now();
        Ok(raw
            .events
            .unwrap_or_default()
            .iter()
            .filter_map(|e| map_espn_event(e, now))
            .collect())
    }

    /// PEAR's schedule for one day. The endpoint returns games around the
    /// requested date, so anything not dated exactly `date` is dropped.
    pub async fn fetch_pear_schedule(&self, date: NaiveDate) -> ApiResult<Vec<Game>> {
        let day = date.format("%Y-%m-%d").to_string();
        let url = format!(
            "{}?season={}&date={day}",
            self.urls.pear_schedule,
            date.year()
        );
        let raw: PearResponse = self.get(&url).await?;
        let now = Utc::now();
        let mut games: Vec<Game> = raw
            .games
            .iter()
            .filter(|g| g.date == day)
            .filter_map(|g| map_pear_game(g, now))
            .collect();
        number_repeat_matchups(&mut games);
        Ok(games)
    }

    /// Sidearm aggregation schedule. Sidearm's day runs 09:00 UTC to 08:59:59.999 UTC next day.
    pub async fn fetch_sidearm_schedule(&self, date: NaiveDate) -> ApiResult<Vec<Game>> {
        let next = date
            .checked_add_days(Days::new(1))
            .ok_or_else(|| ApiError::Other(format!("no day after {date}")))?;
        let url = format!(
            "{}?livestats=1&start_date={}T09:00:00.000Z&end_date={}T08:59:59.999Z",
            self.urls.sidearm_aggregation,
            date.format("%Y-%m-%d"),
            next.format("%Y-%m-%d")
        );
        let raw: AggregationResponse = self.get(&url).await?;
        if let Some(error) = raw.error.filter(|e| !e.is_empty()) {
            return Err(ApiError::Other(format!("sidearm aggregation: {error}")));
        }
        let now = Utc::now();
        Ok(raw
            .data
            .iter()
            .filter_map(|g| map_sidearm_schedule_game(g, now))
            .collect())
    }

    /// One school's current game from sidearmstats. Empty when the school has
    /// no game in progress or finished.
    pub async fn fetch_sidearm_game(&self, abbrev: &str) -> ApiResult<Vec<Game>> {
        let url = format!("{}/{abbrev}/baseball/game.json?detail=full", self.urls.sidearm_stats);
        let raw: LiveStatsResponse = self.get(&url).await?;
        Ok(map_sidearm_live(&raw, abbrev, Utc::now()).into_iter().collect())
    }

    /// Read the sidearmstats client code off a school's own live stats proxy.
    pub async fn fetch_sidearm_abbrev_from_host(&self, host: &str) -> ApiResult<Option<String>> {
        let url = match &self.urls.school_sites {
            Some(base) => format!("{base}/{host}/api/livestats/baseball"),
            None => format!("https://{host}/api/livestats/baseball"),
        };
        let raw: LiveStatsResponse = self.get(&url).await?;
        Ok(raw.game.and_then(|g| non_empty(g.client_abbrev.as_deref())))
    }

    /// Guess the client code from the host name and confirm it against sidearmstats.
    pub async fn fetch_sidearm_abbrev_guess(&self, host: &str) -> ApiResult<Option<String>> {
        let stem = host_stem(host);
        let url = format!("{}/{stem}/baseball/game.json", self.urls.sidearm_stats);
        let raw: LiveStatsResponse = self.get(&url).await?;
        Ok(raw.game.and_then(|g| non_empty(g.client_abbrev.as_deref())))
    }

    /// Raw StatBroadcast landing page for one school.
    pub async fn fetch_statbroadcast_page(&self, gid: &str) -> ApiResult<String> {
        let url = format!("{}?gid={gid}", self.urls.statbroadcast_events);
        self.get_text(&url).await
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: &str) -> ApiResult<T> {
        self.send(url)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ApiError::Parsing(e, url.to_owned()))
    }

    async fn get_text(&self, url: &str) -> ApiResult<String> {
        self.send(url)
            .await?
            .text()
            .await
            .map_err(|e| ApiError::Network(e, url.to_owned()))
    }

    async fn send(&self, url: &str) -> ApiResult<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ApiError::Network(e, url.to_owned()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(url.to_owned()));
        }
        response
            .error_for_status()
            .map_err(|e| ApiError::Api(e, url.to_owned()))
    }
}

fn host_stem(host: &str) -> &str {
    host.strip_suffix(".com")
        .or_else(|| host.strip_suffix(".edu"))
        .unwrap_or(host)
}

/// Provider timestamps come in several ISO-ish shapes; all are UTC.
fn parse_utc(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%MZ", "%Y-%m-%dT%H:%M:%S%.fZ", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

// ---------------------------------------------------------------------------
// Mapping: ESPN wire types → canonical games
// ---------------------------------------------------------------------------

fn map_espn_event(event: &EspnEvent, now: DateTime<Utc>) -> Option<Game> {
    let id = non_empty(event.id.as_deref())?;
    let comp = event.competitions.as_deref()?.first()?;
    let competitors = comp.competitors.as_deref()?;
    let home = competitors.iter().find(|c| c.home_away.as_deref() == Some("home"))?;
    let away = competitors.iter().find(|c| c.home_away.as_deref() != Some("home"))?;

    let status_type = comp.status.as_ref().and_then(|s| s.status_type.as_ref());
    let status = parse_espn_status(
        status_type.and_then(|t| t.state.as_deref()),
        status_type.and_then(|t| t.name.as_deref()),
    );

    let mut game = Game::new(format!("espn-{id}"), Source::Espn, map_espn_side(home)?, map_espn_side(away)?);
    game.status = status;
    game.start_time = event.date.as_deref().and_then(parse_utc);
    game.neutral = comp.neutral_site.unwrap_or(false);
    game.conference_game = comp.conference_competition.unwrap_or(false);
    game.venue = comp.venue.as_ref().and_then(|v| {
        non_empty(v.full_name.as_deref())
            .or_else(|| v.address.as_ref().and_then(|a| non_empty(a.city.as_deref())))
    });
    game.updated_at = Some(now);

    if status == GameStatus::Live {
        let (inning, half) = status_type
            .and_then(|t| t.detail.as_deref())
            .and_then(parse_inning_label)
            .or_else(|| comp.status.as_ref().and_then(|s| s.period).map(|p| (p, Half::Top)))
            .unwrap_or((1, Half::Top));
        game.situation = Some(map_espn_situation(comp.situation.as_ref(), inning, half));
    }
    Some(game)
}

fn parse_espn_status(state: Option<&str>, name: Option<&str>) -> GameStatus {
    match name.unwrap_or_default() {
        "STATUS_POSTPONED" | "STATUS_CANCELED" | "STATUS_CANCELLED" | "STATUS_SUSPENDED"
        | "STATUS_FORFEIT" => GameStatus::Cancelled,
        _ => match state {
            Some("in") => GameStatus::Live,
            Some("post") => GameStatus::Final,
            _ => GameStatus::Scheduled,
        },
    }
}

fn map_espn_side(c: &EspnCompetitor) -> Option<TeamSide> {
    let team = c.team.as_ref()?;
    let name = non_empty(team.display_name.as_deref())
        .or_else(|| non_empty(team.short_display_name.as_deref()))?;

    let stat = |key: &str| -> Option<u16> {
        c.statistics
            .iter()
            .flatten()
            .find(|s| s.name.as_deref() == Some(key))
            .and_then(|s| s.display_value.as_deref())
            .and_then(|v| v.trim().parse().ok())
    };

    Some(TeamSide {
        name,
        abbrev: non_empty(team.abbreviation.as_deref()),
        conference: None, // ESPN only exposes a numeric conference id
        rank: c.curated_rank.as_ref().and_then(|r| r.current).filter(|r| (1..=25).contains(r)),
        record: c
            .records
            .iter()
            .flatten()
            .find(|r| matches!(r.record_type.as_deref(), Some("total" | "overall")))
            .and_then(|r| non_empty(r.summary.as_deref())),
        score: c.score.as_deref().and_then(|s| s.trim().parse().ok()),
        hits: c.hits.or_else(|| stat("hits")),
        errors: c.errors.or_else(|| stat("errors")),
        line_score: c
            .linescores
            .iter()
            .flatten()
            .map(|l| l.value.map(|v| v.max(0.0) as u16))
            .collect(),
    })
}

fn map_espn_situation(sit: Option<&EspnSituation>, inning: u8, half: Half) -> Situation {
    let default = EspnSituation::default();
    let sit = sit.unwrap_or(&default);
    let player = |p: &crate::espn::EspnParticipant| {
        let name = p
            .athlete
            .as_ref()
            .and_then(|a| non_empty(a.display_name.as_deref()))
            .or_else(|| non_empty(p.display_name.as_deref()))?;
        Some(Player {
            name,
            number: p.athlete.as_ref().and_then(|a| non_empty(a.jersey.as_deref())),
        })
    };
    Situation {
        inning,
        half,
        outs: sit.outs.unwrap_or(0),
        balls: sit.balls.unwrap_or(0),
        strikes: sit.strikes.unwrap_or(0),
        runners: Runners {
            first: sit.on_first.unwrap_or(false),
            second: sit.on_second.unwrap_or(false),
            third: sit.on_third.unwrap_or(false),
        },
        pitcher: sit.pitcher.as_ref().and_then(player),
        batter: sit.batter.as_ref().and_then(player),
    }
}

// ---------------------------------------------------------------------------
// Mapping: PEAR wire types → canonical games
// ---------------------------------------------------------------------------

static PEAR_SCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)-(\d+)\s*$").expect("score pattern is valid"));

fn map_pear_game(g: &PearGame, now: DateTime<Utc>) -> Option<Game> {
    let home_name = non_empty(Some(g.home_team.as_str()))?;
    let away_name = non_empty(Some(g.away_team.as_str()))?;
    let (status, home_score, away_score) = parse_pear_score(g.score.as_deref(), &home_name, &away_name);

    let side = |name: String, conf: Option<&str>, net: Option<f64>, score: Option<u16>| TeamSide {
        name,
        conference: non_empty(conf),
        rank: net.filter(|n| *n >= 1.0).map(|n| n.round() as u16),
        score,
        ..Default::default()
    };

    let id = format!("pear-{}-{}-{}", g.date, slug(&away_name), slug(&home_name));
    let mut game = Game::new(
        id,
        Source::Pear,
        side(home_name, g.home_conference.as_deref(), g.home_net, home_score),
        side(away_name, g.away_conference.as_deref(), g.away_net, away_score),
    );
    game.status = status;
    game.start_label = non_empty(g.time.as_deref());
    game.start_time = game
        .start_label
        .as_deref()
        .and_then(|t| pear_start_time(&g.date, t));
    game.neutral = g.location.as_deref() == Some("Neutral");
    game.conference_game = g.is_conference_game.unwrap_or(false);
    game.win_prob = g
        .home_win_prob
        .filter(|p| (0.0..=1.0).contains(p))
        .map(|p| WinProbability::new((p * 100.0).round() as u8));
    game.updated_at = Some(now);
    Some(game)
}

/// Doubleheaders share a matchup id. The first game keeps it; later ones get `-g2`, `-g3`, ...
/// in listing order.
fn number_repeat_matchups(games: &mut [Game]) {
    let mut seen: HashMap<String, u32> = HashMap::new();
    for game in games.iter_mut() {
        let count = seen.entry(game.id.clone()).or_insert(0);
        *count += 1;
        if *count > 1 {
            game.id = format!("{}-g{count}", game.id);
        }
    }
}

/// PEAR publishes local wall-clock times ("6:30 PM").
fn pear_start_time(date: &str, time: &str) -> Option<DateTime<Utc>> {
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    let clock = NaiveTime::parse_from_str(time.trim(), "%I:%M %p").ok()?;
    Local
        .from_local_datetime(&day.and_time(clock))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// "SCH" is upcoming; "Winner 7-3" is final; "0-0" marks a cancelled game.
fn parse_pear_score(score: Option<&str>, home: &str, away: &str) -> (GameStatus, Option<u16>, Option<u16>) {
    let Some(score) = score.map(str::trim).filter(|s| !s.is_empty() && *s != "SCH") else {
        return (GameStatus::Scheduled, None, None);
    };
    let Some(caps) = PEAR_SCORE.captures(score) else {
        return (GameStatus::Scheduled, None, None);
    };
    let high = caps[1].parse::<u16>().ok();
    let low = caps[2].parse::<u16>().ok();
    let (Some(high), Some(low)) = (high, low) else {
        return (GameStatus::Scheduled, None, None);
    };
    if high == 0 && low == 0 {
        return (GameStatus::Cancelled, Some(0), Some(0));
    }

    let winner = score[..caps.get(0).map(|m| m.start()).unwrap_or(0)].trim().to_lowercase();
    let names_overlap = |name: &str| {
        let name = name.to_lowercase();
        !winner.is_empty() && (winner.contains(&name) || name.contains(&winner))
    };
    if !names_overlap(home) && names_overlap(away) {
        (GameStatus::Final, Some(low), Some(high))
    } else {
        (GameStatus::Final, Some(high), Some(low))
    }
}

// ---------------------------------------------------------------------------
// Mapping: Sidearm wire types → canonical games
// ---------------------------------------------------------------------------

fn map_sidearm_schedule_game(g: &AggregationGame, now: DateTime<Utc>) -> Option<Game> {
    let sport = g.sport.as_ref()?;
    let is_baseball = sport.abbrev.as_deref() == Some("BB")
        || sport.shortname.as_deref() == Some("baseball");
    if !is_baseball {
        return None;
    }
    let id = match g.id.as_ref()? {
        Value::String(s) if !s.is_empty() => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    let side = |team: Option<&crate::sidearm::AggregationTeam>| TeamSide {
        name: team
            .and_then(|t| non_empty(t.name.as_deref()))
            .unwrap_or_else(|| "TBD".into()),
        conference: team
            .and_then(|t| t.conference.as_ref())
            .and_then(|c| non_empty(c.name.as_deref())),
        ..Default::default()
    };

    let mut game = Game::new(
        format!("sidearm-{id}"),
        Source::Sidearm,
        side(g.home_team.as_ref()),
        side(g.away_team.as_ref()),
    );
    game.status = if g.sidearmstats_active {
        GameStatus::Live
    } else if g.status.as_deref() == Some("C") {
        GameStatus::Final
    } else {
        GameStatus::Scheduled
    };
    let date_info = g.date_info.as_ref();
    game.start_time = date_info.and_then(|d| d.datetime_utc.as_deref()).and_then(parse_utc);
    game.start_label = date_info.and_then(|d| non_empty(d.time.as_deref()));
    let location = g.location.as_ref();
    game.venue = location.and_then(|l| {
        non_empty(l.facility.as_deref()).or_else(|| non_empty(l.location.as_deref()))
    });
    game.neutral = location.and_then(|l| l.han.as_deref()) == Some("N");
    game.conference_game = g.conference_game;
    game.updated_at = Some(now);
    Some(game)
}

/// Map a sidearmstats game.json. Games that have not started are rejected, as
/// are payloads for any sport other than baseball.
fn map_sidearm_live(raw: &LiveStatsResponse, abbrev: &str, now: DateTime<Utc>) -> Option<Game> {
    let g = raw.game.as_ref()?;
    if g.game_type.as_deref() != Some("BaseballSoftballGame") {
        return None;
    }
    if g.global_sport_shortname.as_deref().is_some_and(|s| s != "baseball") {
        return None;
    }
    let status = if g.is_complete {
        GameStatus::Final
    } else if g.has_started {
        GameStatus::Live
    } else {
        return None;
    };

    let side = |team: Option<&crate::sidearm::LiveTeam>| -> Option<TeamSide> {
        let team = team?;
        Some(TeamSide {
            name: non_empty(team.name.as_deref())?,
            score: team.score,
            line_score: team
                .period_scores
                .iter()
                .map(|v| v.as_u64().and_then(|n| u16::try_from(n).ok()))
                .collect(),
            ..Default::default()
        })
    };

    let abbrev = non_empty(g.client_abbrev.as_deref()).unwrap_or_else(|| abbrev.to_owned());
    let mut game = Game::new(
        format!("sidearm-live-{abbrev}"),
        Source::SidearmLive,
        side(g.home_team.as_ref())?,
        side(g.visiting_team.as_ref())?,
    );
    game.status = status;
    game.venue = non_empty(g.location.as_deref());
    game.updated_at = Some(now);

    if status == GameStatus::Live {
        let sit = raw.situation.as_ref();
        let occupied = |v: Option<&Value>| v.is_some_and(|v| !v.is_null());
        let player = |p: &LivePlayer| {
            let name = format!(
                "{} {}",
                p.first_name.as_deref().unwrap_or_default(),
                p.last_name.as_deref().unwrap_or_default()
            );
            non_empty(Some(name.as_str())).map(|name| Player {
                name,
                number: non_empty(p.uniform_number.as_deref()),
            })
        };
        game.situation = Some(Situation {
            inning: sit
                .and_then(|s| s.inning)
                .map(|i| i.floor().max(1.0) as u8)
                .or(g.period)
                .unwrap_or(1),
            half: match sit.and_then(|s| s.batting_team.as_deref()) {
                Some("HomeTeam") => Half::Bottom,
                _ => Half::Top,
            },
            outs: sit.and_then(|s| s.outs).unwrap_or(0),
            balls: sit.and_then(|s| s.balls).unwrap_or(0),
            strikes: sit.and_then(|s| s.strikes).unwrap_or(0),
            runners: Runners {
                first: occupied(sit.and_then(|s| s.on_first.as_ref())),
                second: occupied(sit.and_then(|s| s.on_second.as_ref())),
                third: occupied(sit.and_then(|s| s.on_third.as_ref())),
            },
            pitcher: sit.and_then(|s| s.pitcher.as_ref()).and_then(player),
            batter: sit.and_then(|s| s.batter.as_ref()).and_then(player),
        });
    }
    Some(game)
}
