/// Wire types for the PEAR ratings schedule API.
/// Endpoint: https://pearatings.com/api/cbase/schedule/today?season={year}
///
/// The schedule carries no live scores: upcoming games report `score: "SCH"`,
/// finished ones report the winner and the score ("Kansas St. 24-5").
use serde::Deserialize;

#[derive(Deserialize, Default, Debug)]
pub struct PearResponse {
    #[serde(default)]
    pub games: Vec<PearGame>,
}

#[derive(Deserialize, Default, Debug, Clone)]
pub struct PearGame {
    #[serde(rename = "Date", default)]
    pub date: String, // "2026-03-14"
    #[serde(rename = "Time")]
    pub time: Option<String>, // "6:30 PM"
    #[serde(default)]
    pub home_team: String,
    #[serde(default)]
    pub away_team: String,
    pub home_conference: Option<String>,
    pub away_conference: Option<String>,
    pub score: Option<String>,
    pub home_win_prob: Option<f64>,
    pub home_net: Option<f64>,
    pub away_net: Option<f64>,
    #[serde(rename = "Location")]
    pub location: Option<String>, // "Home" | "Neutral"
    pub is_conference_game: Option<bool>,
}
