/// ESPN raw wire types: serde shapes for the college baseball scoreboard.
/// These map to the canonical domain types in client.rs.
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Scoreboard  (site v2 API)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ScoreboardResponse {
    pub events: Option<Vec<EspnEvent>>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct EspnEvent {
    pub id: Option<String>,
    pub name: Option<String>,
    pub date: Option<String>, // ISO 8601, minute precision ("2026-03-14T18:00Z")
    pub competitions: Option<Vec<EspnCompetition>>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct EspnCompetition {
    pub status: Option<EspnStatus>,
    pub competitors: Option<Vec<EspnCompetitor>>,
    pub situation: Option<EspnSituation>,
    pub venue: Option<EspnVenue>,
    #[serde(rename = "neutralSite")]
    pub neutral_site: Option<bool>,
    #[serde(rename = "conferenceCompetition")]
    pub conference_competition: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EspnStatus {
    #[serde(rename = "type")]
    pub status_type: Option<EspnStatusType>,
    pub period: Option<u8>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EspnStatusType {
    pub name: Option<String>,   // "STATUS_SCHEDULED", "STATUS_IN_PROGRESS", "STATUS_FINAL"
    pub state: Option<String>,  // "pre" | "in" | "post"
    pub detail: Option<String>, // "Top 3rd", "Final/10"
    pub completed: Option<bool>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct EspnCompetitor {
    #[serde(rename = "homeAway")]
    pub home_away: Option<String>,
    pub team: Option<EspnTeam>,
    pub score: Option<String>, // ESPN sends scores as strings
    #[serde(rename = "curatedRank")]
    pub curated_rank: Option<EspnRank>,
    pub records: Option<Vec<EspnRecord>>,
    pub linescores: Option<Vec<EspnLinescore>>,
    pub hits: Option<u16>,
    pub errors: Option<u16>,
    pub statistics: Option<Vec<EspnStatistic>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EspnTeam {
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(rename = "shortDisplayName")]
    pub short_display_name: Option<String>,
    pub abbreviation: Option<String>,
    #[serde(rename = "conferenceId")]
    pub conference_id: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EspnRank {
    pub current: Option<u16>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EspnRecord {
    #[serde(rename = "type")]
    pub record_type: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EspnLinescore {
    pub value: Option<f64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EspnStatistic {
    pub name: Option<String>,
    #[serde(rename = "displayValue")]
    pub display_value: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct EspnSituation {
    pub balls: Option<u8>,
    pub strikes: Option<u8>,
    pub outs: Option<u8>,
    #[serde(rename = "onFirst")]
    pub on_first: Option<bool>,
    #[serde(rename = "onSecond")]
    pub on_second: Option<bool>,
    #[serde(rename = "onThird")]
    pub on_third: Option<bool>,
    pub pitcher: Option<EspnParticipant>,
    pub batter: Option<EspnParticipant>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EspnParticipant {
    pub athlete: Option<EspnAthlete>,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EspnAthlete {
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    pub jersey: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EspnVenue {
    #[serde(rename = "fullName")]
    pub full_name: Option<String>,
    pub address: Option<EspnAddress>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EspnAddress {
    pub city: Option<String>,
    pub state: Option<String>,
}
