/// StatBroadcast landing-page scraper.
///
/// Each school's page (statbroadcast.php?gid={gid}) is server rendered and lists
/// the week's events as text rows, e.g. "Kentucky 3, UNC Greensboro 0 - T3rd -- In Progress".
/// The visitor is listed first.
use crate::{Game, GameStatus, Situation, Source, TeamSide, parse_inning_label, slug};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

/// One school in the StatBroadcast universe.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct StatBroadcastSchool {
    pub name: String,
    pub gid: String,
    #[serde(default)]
    pub conference: Option<String>,
}

pub fn parse_schools(json: &str) -> Result<Vec<StatBroadcastSchool>, serde_json::Error> {
    serde_json::from_str(json)
}

static SCORE_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"([A-Za-z .&'()\-]+?)[ \t]+(\d+),[ \t]*([A-Za-z .&'()\-]+?)[ \t]+(\d+)[ \t]*-[ \t]*([A-Za-z0-9/() \t]+)(?:--[ \t]*(In Progress|Final))?",
    )
    .expect("score row pattern is valid")
});

static BASEBALL_CONTEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bbase(?:ball)?\b").expect("context pattern is valid"));

static EVENT_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"broadcast/\?id=(\d+)").expect("event link pattern is valid"));

const CONTEXT_BYTES: usize = 200;

/// Pull every baseball score row off a school's landing page. Rows for other
/// sports, and repeats of the same event, are skipped.
pub fn parse_games(html: &str, school: &StatBroadcastSchool, now: DateTime<Utc>) -> Vec<Game> {
    let mut games: Vec<Game> = Vec::new();

    for caps in SCORE_ROW.captures_iter(html) {
        let Some(row) = caps.get(0) else { continue };
        let before = &html[floor_boundary(html, row.start().saturating_sub(CONTEXT_BYTES))..row.start()];
        let after = &html[row.end()..floor_boundary(html, row.end() + CONTEXT_BYTES)];
        if !BASEBALL_CONTEXT.is_match(before) && !BASEBALL_CONTEXT.is_match(row.as_str()) && !BASEBALL_CONTEXT.is_match(after) {
            continue;
        }

        let away_name = caps[1].trim();
        let home_name = caps[3].trim();
        if away_name.is_empty() || home_name.is_empty() {
            continue;
        }
        let (Ok(away_score), Ok(home_score)) = (caps[2].parse::<u16>(), caps[4].parse::<u16>()) else {
            continue;
        };
        let status_text = caps[5].trim();
        let in_progress = caps.get(6).is_some_and(|m| m.as_str().eq_ignore_ascii_case("in progress"));

        let event_id = EVENT_LINK
            .captures(after)
            .or_else(|| EVENT_LINK.captures_iter(before).last())
            .map(|c| c[1].to_owned());
        let id = match &event_id {
            Some(eid) => format!("sb-{eid}"),
            None => format!("sb-{}-{}-{}", school.gid, slug(away_name), slug(home_name)),
        };
        if games.iter().any(|g| g.id == id) {
            continue;
        }

        let side = |name: &str, score: u16| TeamSide {
            name: name.to_owned(),
            conference: school
                .conference
                .clone()
                .filter(|_| names_overlap(name, &school.name)),
            score: Some(score),
            ..Default::default()
        };
        let mut game = Game::new(id, Source::StatBroadcast, side(home_name, home_score), side(away_name, away_score));
        game.updated_at = Some(now);
        game.status = row_status(status_text, in_progress);
        if game.status == GameStatus::Live {
            let (inning, half) = parse_inning_label(status_text).unwrap_or((1, Default::default()));
            game.situation = Some(Situation { inning, half, ..Default::default() });
        }
        games.push(game);
    }
    games
}

fn row_status(text: &str, in_progress: bool) -> GameStatus {
    let lower = text.to_ascii_lowercase();
    if lower.starts_with("final") {
        GameStatus::Final
    } else if lower.contains("ppd") || lower.contains("postponed") || lower.contains("cancel") {
        GameStatus::Cancelled
    } else if in_progress {
        GameStatus::Live
    } else if lower.is_empty() || lower.contains("pregame") || lower.contains("delayed") {
        GameStatus::Scheduled
    } else {
        GameStatus::Live
    }
}

fn names_overlap(a: &str, b: &str) -> bool {
    let (a, b) = (a.to_lowercase(), b.to_lowercase());
    !a.is_empty() && !b.is_empty() && (a.contains(&b) || b.contains(&a))
}

fn floor_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Half;
    use chrono::TimeZone;

    fn kentucky() -> StatBroadcastSchool {
        StatBroadcastSchool {
            name: "Kentucky".into(),
            gid: "uky".into(),
            conference: Some("SEC".into()),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 13, 20, 0, 0).unwrap()
    }

    const PAGE: &str = r#"
        <tr><td>Feb 13</td><td>UNC Greensboro 0, Kentucky 3 - T3rd -- In Progress</td>
            <td>BASE Baseball</td><td><a href="https://stats.statbroadcast.com/broadcast/?id=635984">LIVE</a></td></tr>
        <tr><td>Feb 12</td><td>Stanford 0, Kentucky 5 - FINAL</td>
            <td>BASE Baseball</td><td><a href="https://stats.statbroadcast.com/broadcast/?id=635900">STATS</a></td></tr>
    "#;

    #[test]
    fn parses_live_and_final_rows() {
        let games = parse_games(PAGE, &kentucky(), now());
        assert_eq!(games.len(), 2);

        let live = &games[0];
        assert_eq!(live.id, "sb-635984");
        assert_eq!(live.status, GameStatus::Live);
        assert_eq!(live.away.name, "UNC Greensboro");
        assert_eq!(live.home.name, "Kentucky");
        assert_eq!((live.home.score, live.away.score), (Some(3), Some(0)));
        assert_eq!(live.home.conference.as_deref(), Some("SEC"));
        assert_eq!(live.away.conference, None);
        let sit = live.situation.as_ref().unwrap();
        assert_eq!((sit.inning, sit.half), (3, Half::Top));

        assert_eq!(games[1].id, "sb-635900");
        assert_eq!(games[1].status, GameStatus::Final);
        assert!(games[1].situation.is_none());
    }

    #[test]
    fn rows_for_other_sports_are_ignored() {
        let page = "<div>Ohio State 71, Kentucky 64 - FINAL</div><div>MBB Men's Basketball</div>";
        assert!(parse_games(page, &kentucky(), now()).is_empty());
    }

    #[test]
    fn repeated_event_is_kept_once() {
        let row = "Xavier 2, Kentucky 1 - B6th | BASE Baseball | broadcast/?id=700001 ";
        let page = format!("{row}<br>{row}");
        let games = parse_games(&page, &kentucky(), now());
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].situation.as_ref().unwrap().half, Half::Bottom);
    }

    #[test]
    fn row_without_link_gets_synthetic_id() {
        let page = "Miami (OH) 4, Kentucky 4 - Mid 7th | BASE Baseball";
        let games = parse_games(page, &kentucky(), now());
        assert_eq!(games[0].id, "sb-uky-miami-oh-kentucky");
    }

    #[test]
    fn status_words() {
        assert_eq!(row_status("FINAL (10)", false), GameStatus::Final);
        assert_eq!(row_status("PPD", false), GameStatus::Cancelled);
        assert_eq!(row_status("Pregame", false), GameStatus::Scheduled);
        assert_eq!(row_status("T9th", false), GameStatus::Live);
    }

    #[test]
    fn school_list_parses_with_optional_conference() {
        let schools = parse_schools(r#"[{"name": "Kentucky", "gid": "uky", "conference": "SEC"},
                                        {"name": "Xavier", "gid": "xav"}]"#)
            .unwrap();
        assert_eq!(schools.len(), 2);
        assert_eq!(schools[1].conference, None);
    }
}
