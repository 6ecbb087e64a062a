/// Wire types for the two Sidearm Sports feeds.
///
/// - Aggregation service: every event across Sidearm schools for a UTC window.
///   https://aggregation-service.sidearmsports.com/services/games.ashx
/// - Live stats: one school's current game.
///   https://sidearmstats.com/{abbrev}/baseball/game.json?detail=full
use serde::Deserialize;
use serde_json::Value;

// ---------------------------------------------------------------------------
// Aggregation service (schedule)
// ---------------------------------------------------------------------------

#[derive(Deserialize, Default, Debug)]
pub struct AggregationResponse {
    #[serde(default)]
    pub data: Vec<AggregationGame>,
    pub error: Option<String>,
}

#[derive(Deserialize, Default, Debug, Clone)]
pub struct AggregationGame {
    pub id: Option<Value>, // numeric on most schools, string on a few
    pub sport: Option<AggregationSport>,
    pub home_team: Option<AggregationTeam>,
    pub away_team: Option<AggregationTeam>,
    pub status: Option<String>, // "C" = complete
    #[serde(default)]
    pub sidearmstats_active: bool,
    pub date_info: Option<AggregationDate>,
    pub location: Option<AggregationLocation>,
    #[serde(default)]
    pub conference_game: bool,
}

#[derive(Deserialize, Default, Debug, Clone)]
pub struct AggregationSport {
    pub abbrev: Option<String>,
    pub shortname: Option<String>,
}

#[derive(Deserialize, Default, Debug, Clone)]
pub struct AggregationTeam {
    pub name: Option<String>,
    pub conference: Option<AggregationConference>,
}

#[derive(Deserialize, Default, Debug, Clone)]
pub struct AggregationConference {
    pub name: Option<String>,
}

#[derive(Deserialize, Default, Debug, Clone)]
pub struct AggregationDate {
    pub time: Option<String>,
    pub datetime_utc: Option<String>,
}

#[derive(Deserialize, Default, Debug, Clone)]
pub struct AggregationLocation {
    pub facility: Option<String>,
    pub location: Option<String>,
    pub han: Option<String>, // "H" | "A" | "N"
}

// ---------------------------------------------------------------------------
// Live stats game.json
// ---------------------------------------------------------------------------

#[derive(Deserialize, Default, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct LiveStatsResponse {
    pub game: Option<LiveGame>,
    pub situation: Option<LiveSituation>,
}

#[derive(Deserialize, Default, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct LiveGame {
    #[serde(rename = "Type")]
    pub game_type: Option<String>, // "BaseballSoftballGame"
    pub global_sport_shortname: Option<String>,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default)]
    pub has_started: bool,
    pub home_team: Option<LiveTeam>,
    pub visiting_team: Option<LiveTeam>,
    pub period: Option<u8>,
    pub client_abbrev: Option<String>,
    pub location: Option<String>,
}

#[derive(Deserialize, Default, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct LiveTeam {
    pub name: Option<String>,
    pub score: Option<u16>,
    #[serde(default)]
    pub period_scores: Vec<Value>, // numbers, nulls, or "X" for an unplayed bottom ninth
}

#[derive(Deserialize, Default, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct LiveSituation {
    pub batting_team: Option<String>, // "HomeTeam" | "VisitingTeam"
    pub inning: Option<f64>,
    pub balls: Option<u8>,
    pub strikes: Option<u8>,
    pub outs: Option<u8>,
    pub on_first: Option<Value>, // a player object when occupied, null when empty
    pub on_second: Option<Value>,
    pub on_third: Option<Value>,
    pub pitcher: Option<LivePlayer>,
    pub batter: Option<LivePlayer>,
}

#[derive(Deserialize, Default, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct LivePlayer {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub uniform_number: Option<String>,
}

// ---------------------------------------------------------------------------
// School directory
// ---------------------------------------------------------------------------

/// A Sidearm-hosted athletics site. `abbrev` is the sidearmstats client code,
/// known up front for a handful of schools and discovered for the rest.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct SidearmSchool {
    pub name: String,
    pub host: String,
    #[serde(default)]
    pub abbrev: Option<String>,
}

const EMBEDDED_SCHOOLS_JSON: &str = include_str!("../data/sidearm_schools.json");

pub fn embedded_schools() -> Result<Vec<SidearmSchool>, serde_json::Error> {
    serde_json::from_str(EMBEDDED_SCHOOLS_JSON)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_school_list_parses() {
        let schools = embedded_schools().expect("embedded school list should parse");
        assert!(schools.len() > 90);
        let la_salle = schools.iter().find(|s| s.name == "La Salle").unwrap();
        assert_eq!(la_salle.abbrev.as_deref(), Some("lasalle"));
        assert!(schools.iter().all(|s| !s.host.is_empty()));
    }

    #[test]
    fn live_stats_occupied_bases_are_objects() {
        let json = r#"{
            "Game": {"Type": "BaseballSoftballGame", "HasStarted": true, "IsComplete": false},
            "Situation": {"OnFirst": {"FirstName": "Sam"}, "OnSecond": null, "Inning": 4.5}
        }"#;
        let raw: LiveStatsResponse = serde_json::from_str(json).unwrap();
        let sit = raw.situation.unwrap();
        assert!(sit.on_first.is_some_and(|v| !v.is_null()));
        assert!(sit.on_second.is_none_or(|v| v.is_null()));
        assert_eq!(sit.inning, Some(4.5));
    }
}
