use crate::state::poller::PollerConfig;
use log::warn;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScheduleProvider {
    #[default]
    Pear,
    Sidearm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub poll: Duration,
    pub discovery: Duration,
}

/// Runtime settings, read once at start-up from `NCAABASE_*` variables.
/// Log level comes from `RUST_LOG`.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub schedule_provider: ScheduleProvider,
    pub schedule_interval: Duration,
    pub request_timeout: Duration,
    pub sidearm: Cadence,
    pub statbroadcast: Cadence,
    pub espn: Cadence,
    pub batch_size: usize,
    pub batch_pause: Duration,
    pub statbroadcast_json: Option<PathBuf>,
    pub sidearm_schools_json: Option<PathBuf>,
    pub stats_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schedule_provider: ScheduleProvider::Pear,
            schedule_interval: Duration::from_secs(300),
            request_timeout: Duration::from_secs(10),
            sidearm: Cadence { poll: Duration::from_secs(12), discovery: Duration::from_secs(180) },
            statbroadcast: Cadence { poll: Duration::from_secs(10), discovery: Duration::from_secs(300) },
            espn: Cadence { poll: Duration::from_secs(30), discovery: Duration::from_secs(120) },
            batch_size: 10,
            batch_pause: Duration::from_millis(300),
            statbroadcast_json: None,
            sidearm_schools_json: None,
            stats_interval: Duration::from_secs(60),
        }
    }
}

impl Settings {
    pub fn load() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Unparsable values are logged and replaced by their defaults.
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .filter(|(k, _)| k.starts_with("NCAABASE_"))
            .collect();
        let defaults = Self::default();
        let secs = |name: &str, default: Duration| {
            parsed::<u64>(&vars, name).map_or(default, |s| Duration::from_secs(s.max(1)))
        };
        let cadence = |prefix: &str, default: Cadence| Cadence {
            poll: secs(&format!("NCAABASE_{prefix}_POLL_SECS"), default.poll),
            discovery: secs(&format!("NCAABASE_{prefix}_DISCOVERY_SECS"), default.discovery),
        };

        Self {
            schedule_provider: match vars.get("NCAABASE_SCHEDULE_PROVIDER").map(|v| v.trim().to_ascii_lowercase()) {
                None => defaults.schedule_provider,
                Some(v) if v == "pear" => ScheduleProvider::Pear,
                Some(v) if v == "sidearm" => ScheduleProvider::Sidearm,
                Some(other) => {
                    warn!("unknown NCAABASE_SCHEDULE_PROVIDER {other:?}, using pear");
                    ScheduleProvider::Pear
                }
            },
            schedule_interval: secs("NCAABASE_SCHEDULE_INTERVAL_SECS", defaults.schedule_interval),
            request_timeout: secs("NCAABASE_REQUEST_TIMEOUT_SECS", defaults.request_timeout),
            sidearm: cadence("SIDEARM", defaults.sidearm),
            statbroadcast: cadence("STATBROADCAST", defaults.statbroadcast),
            espn: cadence("ESPN", defaults.espn),
            batch_size: parsed::<usize>(&vars, "NCAABASE_BATCH_SIZE").map_or(defaults.batch_size, |n| n.max(1)),
            batch_pause: parsed::<u64>(&vars, "NCAABASE_BATCH_PAUSE_MS")
                .map_or(defaults.batch_pause, Duration::from_millis),
            statbroadcast_json: path(&vars, "NCAABASE_STATBROADCAST_JSON"),
            sidearm_schools_json: path(&vars, "NCAABASE_SIDEARM_SCHOOLS_JSON"),
            stats_interval: secs("NCAABASE_STATS_INTERVAL_SECS", defaults.stats_interval),
        }
    }

    pub fn poller_config(&self, cadence: Cadence) -> PollerConfig {
        PollerConfig {
            poll_interval: cadence.poll,
            discovery_interval: cadence.discovery,
            batch_size: self.batch_size,
            batch_pause: self.batch_pause,
            call_timeout: self.call_timeout(),
        }
    }

    /// Outer bound on one provider call. Leaves room for the client's own
    /// request timeout to fire first.
    pub fn call_timeout(&self) -> Duration {
        self.request_timeout + Duration::from_secs(2)
    }
}

fn parsed<T: FromStr>(vars: &HashMap<String, String>, name: &str) -> Option<T> {
    let raw = vars.get(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("ignoring {name}={raw:?}: not a valid number");
            None
        }
    }
}

fn path(vars: &HashMap<String, String>, name: &str) -> Option<PathBuf> {
    vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty()).map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(Settings::from_vars(Vec::new()), Settings::default());
    }

    #[test]
    fn overrides_are_applied() {
        let settings = Settings::from_vars(vars(&[
            ("NCAABASE_SCHEDULE_PROVIDER", "Sidearm"),
            ("NCAABASE_ESPN_POLL_SECS", "45"),
            ("NCAABASE_SIDEARM_DISCOVERY_SECS", "600"),
            ("NCAABASE_BATCH_SIZE", "5"),
            ("NCAABASE_BATCH_PAUSE_MS", "0"),
            ("NCAABASE_STATBROADCAST_JSON", "/etc/ncaabase/sb.json"),
            ("PATH", "/usr/bin"),
        ]));
        assert_eq!(settings.schedule_provider, ScheduleProvider::Sidearm);
        assert_eq!(settings.espn.poll, Duration::from_secs(45));
        assert_eq!(settings.espn.discovery, Duration::from_secs(120));
        assert_eq!(settings.sidearm.discovery, Duration::from_secs(600));
        assert_eq!(settings.batch_size, 5);
        assert_eq!(settings.batch_pause, Duration::ZERO);
        assert_eq!(settings.statbroadcast_json, Some(PathBuf::from("/etc/ncaabase/sb.json")));
        assert_eq!(settings.sidearm_schools_json, None);
    }

    #[test]
    fn bad_and_zero_values_are_tamed() {
        let settings = Settings::from_vars(vars(&[
            ("NCAABASE_SCHEDULE_INTERVAL_SECS", "soon"),
            ("NCAABASE_STATBROADCAST_POLL_SECS", "0"),
            ("NCAABASE_BATCH_SIZE", "0"),
            ("NCAABASE_SCHEDULE_PROVIDER", "carrier-pigeon"),
        ]));
        assert_eq!(settings.schedule_interval, Duration::from_secs(300));
        assert_eq!(settings.statbroadcast.poll, Duration::from_secs(1));
        assert_eq!(settings.batch_size, 1);
        assert_eq!(settings.schedule_provider, ScheduleProvider::Pear);
    }

    #[test]
    fn poller_config_uses_cadence_and_batching() {
        let settings = Settings::default();
        let config = settings.poller_config(settings.sidearm);
        assert_eq!(config.poll_interval, Duration::from_secs(12));
        assert_eq!(config.discovery_interval, Duration::from_secs(180));
        assert_eq!(config.batch_size, 10);
        assert!(config.call_timeout > settings.request_timeout);
    }
}
