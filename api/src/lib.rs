pub mod adapter;
pub mod client;
pub mod espn;
pub mod pear;
pub mod sidearm;
pub mod statbroadcast;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

// ---------------------------------------------------------------------------
// Domain types: the canonical model, independent of any provider's wire format
// ---------------------------------------------------------------------------

/// One physical game as seen by the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub status: GameStatus,
    pub start_time: Option<DateTime<Utc>>,
    /// Provider's own display string for the start ("6:30 PM"), kept when it can't be parsed.
    pub start_label: Option<String>,
    pub venue: Option<String>,
    pub neutral: bool,
    pub conference_game: bool,
    pub home: TeamSide,
    pub away: TeamSide,
    /// Present only while the game is live.
    pub situation: Option<Situation>,
    pub win_prob: Option<WinProbability>,
    /// Provider that owns this record's identity (schedule provider once resolved).
    pub source: Source,
    /// Live providers whose data was applied on top, in application order.
    pub overlays: Vec<Source>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Game {
    pub fn new(id: impl Into<String>, source: Source, home: TeamSide, away: TeamSide) -> Self {
        Self {
            id: id.into(),
            status: GameStatus::Scheduled,
            start_time: None,
            start_label: None,
            venue: None,
            neutral: false,
            conference_game: false,
            home,
            away,
            situation: None,
            win_prob: None,
            source,
            overlays: Vec::new(),
            updated_at: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.status == GameStatus::Live
    }

    /// How far along a live game is, in half-inning quarters. Zero when unknown.
    pub fn inning_progress(&self) -> u16 {
        self.situation
            .as_ref()
            .map(|s| u16::from(s.inning) * 4 + s.half.order())
            .unwrap_or(0)
    }

    /// Every provider that contributed to this record.
    pub fn contributors(&self) -> impl Iterator<Item = Source> + '_ {
        std::iter::once(self.source).chain(self.overlays.iter().copied())
    }

    pub fn has_conference(&self, tag: &str) -> bool {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() {
            return false;
        }
        [&self.home, &self.away].into_iter().any(|side| {
            side.conference
                .as_deref()
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty())
                .is_some_and(|c| c == tag || c.contains(&tag) || tag.contains(&c))
        })
    }

    /// Score-and-inning model: bigger leads later in the game push the probability out.
    /// Scheduled and cancelled games fall back to the provider's pre-game value.
    pub fn win_probability(&self, pregame: Option<WinProbability>) -> WinProbability {
        let scores = self.home.score.zip(self.away.score);
        match (self.status, scores) {
            (GameStatus::Final, Some((home, away))) => {
                if home > away {
                    WinProbability::new(100)
                } else if away > home {
                    WinProbability::new(0)
                } else {
                    WinProbability::EVEN
                }
            }
            (GameStatus::Live, Some((home, away))) => {
                let diff = f64::from(home) - f64::from(away);
                let inning = self.situation.as_ref().map(|s| s.inning).unwrap_or(1);
                let inning_pct = (f64::from(inning) / 9.0).min(1.0);
                let leverage = diff * (0.5 + inning_pct * 0.5) * 12.0;
                let home_pct = (50.0 + leverage).clamp(1.0, 99.0).round() as u8;
                WinProbability::new(home_pct)
            }
            _ => pregame.unwrap_or(WinProbability::EVEN),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamSide {
    pub name: String,
    pub abbrev: Option<String>,
    pub conference: Option<String>,
    pub rank: Option<u16>,
    /// Season record, e.g. "12-3".
    pub record: Option<String>,
    pub score: Option<u16>,
    pub hits: Option<u16>,
    pub errors: Option<u16>,
    /// Runs per inning; `None` marks an inning not yet played or not reported.
    pub line_score: Vec<Option<u16>>,
}

impl TeamSide {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    #[default]
    Scheduled,
    Live,
    Final,
    Cancelled,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Scheduled => "scheduled",
            GameStatus::Live => "live",
            GameStatus::Final => "final",
            GameStatus::Cancelled => "cancelled",
        }
    }

    /// Ranking used by the merged view: live first, then upcoming, then finished.
    pub fn priority(&self) -> u8 {
        match self {
            GameStatus::Live => 0,
            GameStatus::Scheduled => 1,
            GameStatus::Final => 2,
            GameStatus::Cancelled => 3,
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Situation {
    pub inning: u8,
    pub half: Half,
    pub outs: u8,
    pub balls: u8,
    pub strikes: u8,
    pub runners: Runners,
    pub pitcher: Option<Player>,
    pub batter: Option<Player>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Half {
    #[default]
    Top,
    Mid,
    Bottom,
    End,
}

impl Half {
    fn order(&self) -> u16 {
        match self {
            Half::Top => 0,
            Half::Mid => 1,
            Half::Bottom => 2,
            Half::End => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Runners {
    pub first: bool,
    pub second: bool,
    pub third: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub number: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinProbability {
    pub home: u8,
    pub away: u8,
}

impl WinProbability {
    pub const EVEN: WinProbability = WinProbability { home: 50, away: 50 };

    pub fn new(home: u8) -> Self {
        let home = home.min(100);
        Self { home, away: 100 - home }
    }
}

/// Every provider the aggregator knows about. Declaration order is the live
/// overlay precedence: earlier live sources claim a game first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    Pear,
    Sidearm,
    SidearmLive,
    StatBroadcast,
    Espn,
}

impl Source {
    pub fn label(&self) -> &'static str {
        match self {
            Source::Pear => "pear",
            Source::Sidearm => "sidearm",
            Source::SidearmLive => "sidearm-live",
            Source::StatBroadcast => "statbroadcast",
            Source::Espn => "espn",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Shared text helpers used by several providers
// ---------------------------------------------------------------------------

static INNING_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(top|bot(?:tom)?|mid(?:dle)?|end|t|b|m|e)?\s*(\d{1,2})(?:st|nd|rd|th)?\b")
        .expect("inning label pattern is valid")
});

static FINAL_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*final\s*[(/]\s*(\d{1,2})").expect("final label pattern is valid")
});

/// Parse inning labels such as "Top 3rd", "B5th", "Mid 7th" or "End 8th".
/// A bare ordinal ("4th") is read as the top of that inning; an extra-inning
/// final ("Final/10", "FINAL (10)") as the end of the last inning played.
pub fn parse_inning_label(label: &str) -> Option<(u8, Half)> {
    if let Some(caps) = FINAL_LABEL.captures(label) {
        let inning = caps[1].parse::<u8>().ok().filter(|n| *n > 0)?;
        return Some((inning, Half::End));
    }
    let caps = INNING_LABEL.captures(label)?;
    let inning = caps.get(2)?.as_str().parse::<u8>().ok().filter(|n| *n > 0)?;
    let half = match caps.get(1).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(p) if p.starts_with("bot") || p == "b" => Half::Bottom,
        Some(p) if p.starts_with("mid") || p == "m" => Half::Mid,
        Some(p) if p == "end" || p == "e" => Half::End,
        _ => Half::Top,
    };
    Some((inning, half))
}

/// Lowercase, dash-separated token for building stable ids out of team names.
pub fn slug(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_dash = true;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    out.trim_end_matches('-').to_string()
}

/// Treat blank provider strings as missing.
pub(crate) fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned)
}
