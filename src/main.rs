use anyhow::Context;
use log::{info, warn};
use ncaabase::api::adapter::{EspnLive, PearSchedule, SidearmLive, SidearmSchedule, StatBroadcastLive};
use ncaabase::api::client::BaseballApi;
use ncaabase::api::sidearm::{self, SidearmSchool};
use ncaabase::api::statbroadcast::{self, StatBroadcastSchool};
use ncaabase::state::poller::LivePoller;
use ncaabase::state::query::Scoreboard;
use ncaabase::state::refresher::ScheduleRefresher;
use ncaabase::state::settings::{ScheduleProvider, Settings};
use ncaabase::state::store::GameStore;
use ncaabase::state::supervisor::Supervisor;
use std::path::Path;
use std::sync::Arc;
use tokio::time::{Duration, MissedTickBehavior};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunMode {
    Serve,
    Once,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Some(mode) = handle_cli_args() else {
        return Ok(());
    };

    better_panic::install();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::load();
    let api = BaseballApi::new().with_timeout(settings.request_timeout);
    let sidearm_schools = load_sidearm_schools(settings.sidearm_schools_json.as_deref())?;
    let statbroadcast_schools = load_statbroadcast_schools(settings.statbroadcast_json.as_deref())?;
    info!(
        "{} Sidearm schools, {} StatBroadcast schools, schedule from {:?}",
        sidearm_schools.len(),
        statbroadcast_schools.len(),
        settings.schedule_provider
    );

    let store = Arc::new(GameStore::new());
    match mode {
        RunMode::Serve => serve(&settings, api, store, sidearm_schools, statbroadcast_schools).await,
        RunMode::Once => once(&settings, api, store, sidearm_schools, statbroadcast_schools).await,
    }
}

fn handle_cli_args() -> Option<RunMode> {
    let mut args = std::env::args().skip(1);
    let Some(arg) = args.next() else {
        return Some(RunMode::Serve);
    };

    match arg.as_str() {
        "-h" | "--help" => {
            println!("{}", usage_text());
            None
        }
        "-V" | "--version" => {
            println!("ncaabase {}", env!("CARGO_PKG_VERSION"));
            None
        }
        "--once" => Some(RunMode::Once),
        _ => {
            eprintln!("Unknown argument: {arg}\n\n{}", usage_text());
            std::process::exit(2);
        }
    }
}

fn usage_text() -> &'static str {
    "ncaabase - live college baseball scoreboard aggregator

Usage:
  ncaabase            poll until Ctrl-C, logging a summary periodically
  ncaabase --once     run one schedule fetch and one discovery pass, print JSON
  ncaabase --help
  ncaabase --version

Environment:
  NCAABASE_SCHEDULE_PROVIDER         pear (default) or sidearm
  NCAABASE_SCHEDULE_INTERVAL_SECS    schedule refresh period (default 300)
  NCAABASE_REQUEST_TIMEOUT_SECS      per-request HTTP timeout (default 10)
  NCAABASE_{SIDEARM,STATBROADCAST,ESPN}_POLL_SECS
                                     active poll period per provider
  NCAABASE_{SIDEARM,STATBROADCAST,ESPN}_DISCOVERY_SECS
                                     discovery scan period per provider
  NCAABASE_BATCH_SIZE                endpoints per discovery batch (default 10)
  NCAABASE_BATCH_PAUSE_MS            pause between discovery batches (default 300)
  NCAABASE_STATBROADCAST_JSON        StatBroadcast school list; provider is off when unset
  NCAABASE_SIDEARM_SCHOOLS_JSON      Sidearm school list (default: built-in)
  NCAABASE_STATS_INTERVAL_SECS       summary log period (default 60)
  RUST_LOG                           log filter (default info)"
}

fn load_sidearm_schools(path: Option<&Path>) -> anyhow::Result<Vec<SidearmSchool>> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading Sidearm school list {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing Sidearm school list {}", path.display()))
        }
        None => sidearm::embedded_schools().context("parsing built-in Sidearm school list"),
    }
}

fn load_statbroadcast_schools(path: Option<&Path>) -> anyhow::Result<Vec<StatBroadcastSchool>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading StatBroadcast school list {}", path.display()))?;
    statbroadcast::parse_schools(&raw).with_context(|| format!("parsing StatBroadcast school list {}", path.display()))
}

async fn serve(
    settings: &Settings,
    api: BaseballApi,
    store: Arc<GameStore>,
    sidearm_schools: Vec<SidearmSchool>,
    statbroadcast_schools: Vec<StatBroadcastSchool>,
) -> anyhow::Result<()> {
    let mut supervisor = Supervisor::start(store.clone());

    match settings.schedule_provider {
        ScheduleProvider::Pear => supervisor.spawn_schedule(ScheduleRefresher::new(
            PearSchedule::new(api.clone()),
            store.clone(),
            settings.schedule_interval,
            settings.call_timeout(),
        )),
        ScheduleProvider::Sidearm => supervisor.spawn_schedule(ScheduleRefresher::new(
            SidearmSchedule::new(api.clone()),
            store.clone(),
            settings.schedule_interval,
            settings.call_timeout(),
        )),
    }

    supervisor.spawn_live(
        "sidearm poller",
        LivePoller::new(
            SidearmLive::new(api.clone(), sidearm_schools),
            store.clone(),
            settings.poller_config(settings.sidearm),
        ),
    );
    if statbroadcast_schools.is_empty() {
        warn!("no StatBroadcast schools configured, skipping that provider");
    } else {
        supervisor.spawn_live(
            "statbroadcast poller",
            LivePoller::new(
                StatBroadcastLive::new(api.clone(), statbroadcast_schools),
                store.clone(),
                settings.poller_config(settings.statbroadcast),
            ),
        );
    }
    supervisor.spawn_live(
        "espn poller",
        LivePoller::new(EspnLive::new(api), store.clone(), settings.poller_config(settings.espn)),
    );

    let board = Scoreboard::new(store);
    let mut ticker = tokio::time::interval(settings.stats_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick fires immediately; nothing has been fetched yet.
    ticker.tick().await;

    let outcome = loop {
        tokio::select! {
            _ = ticker.tick() => log_summary(&board),
            signal = tokio::signal::ctrl_c() => break signal.context("listening for Ctrl-C"),
        }
    };

    info!("stopping");
    supervisor.shutdown(SHUTDOWN_GRACE).await;
    outcome
}

async fn once(
    settings: &Settings,
    api: BaseballApi,
    store: Arc<GameStore>,
    sidearm_schools: Vec<SidearmSchool>,
    statbroadcast_schools: Vec<StatBroadcastSchool>,
) -> anyhow::Result<()> {
    let schedule = async {
        match settings.schedule_provider {
            ScheduleProvider::Pear => {
                ScheduleRefresher::new(PearSchedule::new(api.clone()), store.clone(), settings.schedule_interval, settings.call_timeout())
                    .refresh_once()
                    .await
            }
            ScheduleProvider::Sidearm => {
                ScheduleRefresher::new(SidearmSchedule::new(api.clone()), store.clone(), settings.schedule_interval, settings.call_timeout())
                    .refresh_once()
                    .await
            }
        }
    };

    let sidearm = LivePoller::new(
        SidearmLive::new(api.clone(), sidearm_schools),
        store.clone(),
        settings.poller_config(settings.sidearm),
    );
    let statbroadcast = (!statbroadcast_schools.is_empty()).then(|| {
        LivePoller::new(
            StatBroadcastLive::new(api.clone(), statbroadcast_schools),
            store.clone(),
            settings.poller_config(settings.statbroadcast),
        )
    });
    let espn = LivePoller::new(EspnLive::new(api.clone()), store.clone(), settings.poller_config(settings.espn));

    let (schedule_ok, _, _, _) = tokio::join!(
        schedule,
        sidearm.discovery_scan(),
        async {
            if let Some(poller) = &statbroadcast {
                poller.discovery_scan().await;
            }
        },
        espn.discovery_scan(),
    );
    if !schedule_ok {
        warn!("schedule fetch failed, printing live records only");
    }

    store.rebuild();
    let board = Scoreboard::new(store);
    let report = serde_json::json!({
        "games": board.games(),
        "stats": board.stats(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn log_summary(board: &Scoreboard) {
    let stats = board.stats();
    let sources: Vec<String> = stats
        .sources
        .iter()
        .map(|(source, h)| format!("{source}[{} active={} errors={}]", h.phase.as_str(), h.active, h.errors))
        .collect();
    info!(
        "{} games: {} live, {} final, {} scheduled, {} cancelled | {}",
        stats.total,
        stats.live,
        stats.finals,
        stats.scheduled,
        stats.cancelled,
        sources.join(" ")
    );
}
