use crate::state::resolver::{Orientation, resolve};
use ncaabase_api::{Game, GameStatus, Half, Source, TeamSide, WinProbability};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// How an overlay is written onto a record it resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// First overlay on a record: present live fields replace schedule values.
    Overwrite,
    /// Record already claimed by a higher-precedence overlay: only fill what is still empty.
    FillGaps,
}

/// Build the merged, ordered view from the two layers.
///
/// Pure: the same layers always give the same output. Live sources are applied
/// in `Source` order, records within a source in the order they were published.
pub fn rebuild(schedule: &[Game], live: &BTreeMap<Source, Vec<Game>>) -> Vec<Game> {
    let mut merged: Vec<Game> = schedule.to_vec();
    let mut claimed = vec![false; merged.len()];

    for (source, overlays) in live {
        for overlay in overlays {
            match resolve(&overlay.home.name, &overlay.away.name, &merged) {
                Some(hit) => {
                    let mode = if claimed[hit.index] { Mode::FillGaps } else { Mode::Overwrite };
                    apply_overlay(&mut merged[hit.index], overlay, *source, hit.orientation, mode);
                    claimed[hit.index] = true;
                }
                None => {
                    merged.push(overlay.clone());
                    claimed.push(true);
                }
            }
        }
    }

    for game in &mut merged {
        if game.status != GameStatus::Live {
            game.situation = None;
        }
        game.win_prob = Some(game.win_probability(game.win_prob));
    }
    merged.sort_by(compare_games);
    merged
}

/// Live first (furthest along on top), then upcoming by start time (unknown
/// start last), then finished and cancelled in arrival order.
pub fn compare_games(a: &Game, b: &Game) -> Ordering {
    a.status.priority().cmp(&b.status.priority()).then_with(|| match a.status {
        GameStatus::Live => b.inning_progress().cmp(&a.inning_progress()),
        GameStatus::Scheduled => match (a.start_time, b.start_time) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        GameStatus::Final | GameStatus::Cancelled => Ordering::Equal,
    })
}

fn apply_overlay(target: &mut Game, overlay: &Game, source: Source, orientation: Orientation, mode: Mode) {
    let (home, away) = match orientation {
        Orientation::Same => (&overlay.home, &overlay.away),
        Orientation::Swapped => (&overlay.away, &overlay.home),
    };
    apply_side(&mut target.home, home, mode);
    apply_side(&mut target.away, away, mode);

    let upgrades_status = match mode {
        Mode::Overwrite => true,
        Mode::FillGaps => target.status == GameStatus::Scheduled,
    };
    if upgrades_status {
        target.status = overlay.status;
    }

    let situation = overlay.situation.clone().map(|mut s| {
        if orientation == Orientation::Swapped {
            s.half = match s.half {
                Half::Top => Half::Bottom,
                Half::Bottom => Half::Top,
                other => other,
            };
        }
        s
    });
    set(&mut target.situation, situation, mode);
    set(&mut target.start_time, overlay.start_time, mode);
    set(&mut target.start_label, overlay.start_label.clone(), mode);
    set(&mut target.venue, overlay.venue.clone(), mode);
    let win_prob = overlay.win_prob.map(|p| match orientation {
        Orientation::Same => p,
        Orientation::Swapped => WinProbability { home: p.away, away: p.home },
    });
    set(&mut target.win_prob, win_prob, mode);
    target.neutral |= overlay.neutral;
    target.conference_game |= overlay.conference_game;

    if target.source != source && !target.overlays.contains(&source) {
        target.overlays.push(source);
    }
    target.updated_at = target.updated_at.max(overlay.updated_at);
}

fn apply_side(target: &mut TeamSide, overlay: &TeamSide, mode: Mode) {
    // Identity stays with the record that owns it.
    if target.name.trim().is_empty() && !overlay.name.trim().is_empty() {
        target.name = overlay.name.clone();
    }
    set(&mut target.abbrev, overlay.abbrev.clone(), Mode::FillGaps);
    set(&mut target.conference, overlay.conference.clone(), Mode::FillGaps);

    set(&mut target.rank, overlay.rank, mode);
    set(&mut target.record, overlay.record.clone(), mode);
    set(&mut target.score, overlay.score, mode);
    set(&mut target.hits, overlay.hits, mode);
    set(&mut target.errors, overlay.errors, mode);
    let fill_line = match mode {
        Mode::Overwrite => true,
        Mode::FillGaps => target.line_score.is_empty(),
    };
    if fill_line && !overlay.line_score.is_empty() {
        target.line_score = overlay.line_score.clone();
    }
}

/// Absent and blank values never replace anything.
fn set<T: Present>(target: &mut Option<T>, value: Option<T>, mode: Mode) {
    let Some(value) = value.filter(Present::is_present) else {
        return;
    };
    let writable = match mode {
        Mode::Overwrite => true,
        Mode::FillGaps => !target.as_ref().is_some_and(Present::is_present),
    };
    if writable {
        *target = Some(value);
    }
}

trait Present {
    fn is_present(&self) -> bool {
        true
    }
}

impl Present for String {
    fn is_present(&self) -> bool {
        !self.trim().is_empty()
    }
}

impl Present for u16 {}
impl Present for chrono::DateTime<chrono::Utc> {}
impl Present for ncaabase_api::Situation {}
impl Present for WinProbability {}
