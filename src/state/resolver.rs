use ncaabase_api::Game;

/// How an overlay's sides line up with the matched record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Same,
    /// Overlay home is the record's away team (neutral-site reporting).
    Swapped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    Exact,
    Contains,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub index: usize,
    pub orientation: Orientation,
    pub rule: MatchRule,
}

/// Find the record an overlay describes, by team names alone.
///
/// Every candidate is tried for an exact match (either orientation) before any
/// candidate is tried for containment. The first hit wins; ambiguity is not
/// detected. Blank names never match.
pub fn resolve(home: &str, away: &str, candidates: &[Game]) -> Option<Resolution> {
    let home = normalize(home);
    let away = normalize(away);
    if home.is_empty() || away.is_empty() {
        return None;
    }

    [MatchRule::Exact, MatchRule::Contains].into_iter().find_map(|rule| {
        candidates.iter().enumerate().find_map(|(index, candidate)| {
            let c_home = normalize(&candidate.home.name);
            let c_away = normalize(&candidate.away.name);
            let matches = |a: &str, b: &str| names_match(rule, a, b);
            let orientation = if matches(&home, &c_home) && matches(&away, &c_away) {
                Orientation::Same
            } else if matches(&home, &c_away) && matches(&away, &c_home) {
                Orientation::Swapped
            } else {
                return None;
            };
            Some(Resolution { index, orientation, rule })
        })
    })
}

fn names_match(rule: MatchRule, overlay: &str, candidate: &str) -> bool {
    if overlay.is_empty() || candidate.is_empty() {
        return false;
    }
    match rule {
        MatchRule::Exact => overlay == candidate,
        MatchRule::Contains => candidate.contains(overlay) || overlay.contains(candidate),
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ncaabase_api::{Source, TeamSide};

    fn game(home: &str, away: &str) -> Game {
        Game::new(format!("{away}@{home}"), Source::Pear, TeamSide::named(home), TeamSide::named(away))
    }

    #[test]
    fn exact_match_is_case_insensitive() {
        let schedule = vec![game("Texas", "Rice"), game("Arkansas", "LSU")];
        let hit = resolve("ARKANSAS", " lsu ", &schedule).unwrap();
        assert_eq!(hit, Resolution { index: 1, orientation: Orientation::Same, rule: MatchRule::Exact });
    }

    #[test]
    fn swapped_orientation_still_resolves() {
        let schedule = vec![game("Arkansas", "LSU")];
        let hit = resolve("LSU", "Arkansas", &schedule).unwrap();
        assert_eq!(hit.orientation, Orientation::Swapped);
        assert_eq!(hit.index, 0);
    }

    #[test]
    fn containment_matches_shortened_names_both_ways() {
        let schedule = vec![game("Arkansas Razorbacks", "LSU Tigers")];
        let hit = resolve("Arkansas", "LSU", &schedule).unwrap();
        assert_eq!(hit.rule, MatchRule::Contains);

        let schedule = vec![game("Arkansas", "LSU")];
        assert!(resolve("Arkansas Razorbacks", "LSU Tigers", &schedule).is_some());
    }

    #[test]
    fn exact_pass_runs_before_containment_across_all_candidates() {
        let schedule = vec![game("Miami (OH)", "Ohio"), game("Miami", "Ohio")];
        let hit = resolve("Miami", "Ohio", &schedule).unwrap();
        assert_eq!(hit.index, 1);
        assert_eq!(hit.rule, MatchRule::Exact);
    }

    #[test]
    fn both_sides_must_match() {
        let schedule = vec![game("Arkansas", "LSU")];
        assert!(resolve("Arkansas", "Ole Miss", &schedule).is_none());
    }

    #[test]
    fn blank_names_never_match() {
        let schedule = vec![game("Arkansas", "")];
        assert!(resolve("Arkansas", "", &schedule).is_none());
        assert!(resolve("Arkansas", "LSU", &schedule).is_none());
    }

    #[test]
    fn ambiguous_containment_takes_first_candidate() {
        let schedule = vec![game("Miami (OH)", "Ball State"), game("Miami (FL)", "Ball State")];
        assert_eq!(resolve("Miami", "Ball State", &schedule).unwrap().index, 0);
    }
}
