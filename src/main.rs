use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::Duration,
};
use tracing::{info, warn};

use pacer::{
    app_dirs::AppDirs,
    clock::SystemClock,
    config::{Activity, Config, ConfigStore, FileConfigStore},
    runtime::{
        refresh_sender, source_event_sender, AppEvent, ChannelEventSource, FixedTicker, Runner,
    },
    session::{SessionLog, SessionSummary},
    source::{PositionSource, ReplaySource, SimulatedSource},
    tracker::{ChannelObserver, SessionTracker},
    ui::{self, SessionView},
};

const TICK_RATE_MS: u64 = 250;

/// GPS session tracker for walking, running and cycling
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Tracks distance, speed and climb for a walking, running or cycling session, \
with accuracy-aware filtering of position fixes and a warm-up phase that keeps cold-start \
jumps out of the totals."
)]
pub struct Cli {
    /// activity preset controlling polling interval and staleness limit
    #[clap(short = 'a', long, value_enum)]
    activity: Option<Activity>,

    /// emit synthetic fixes instead of reading positioning hardware
    #[clap(long)]
    simulate: bool,

    /// replay a JSON recording of position fixes
    #[clap(long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// steady-state polling interval in milliseconds
    #[clap(short = 'i', long)]
    interval_ms: Option<u64>,

    /// fixes to discard after (re)starting before metrics accumulate
    #[clap(long)]
    warmup: Option<u32>,

    /// discard fixes with horizontal accuracy worse than this many meters
    #[clap(long)]
    min_accuracy_m: Option<f64>,
}

impl Cli {
    /// Persisted preferences overridden by anything given on the command line.
    fn resolve_config(&self, stored: Config) -> Config {
        let mut cfg = stored;
        if let Some(activity) = self.activity {
            cfg.activity = activity;
        }
        if self.interval_ms.is_some() {
            cfg.update_interval_ms = self.interval_ms;
        }
        if self.warmup.is_some() {
            cfg.warmup_count = self.warmup;
        }
        if self.min_accuracy_m.is_some() {
            cfg.min_horizontal_accuracy_m = self.min_accuracy_m;
        }
        cfg
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    Tracking,
    Summary,
}

pub struct App {
    pub tracker: SessionTracker<SystemClock>,
    pub state: AppState,
    pub activity: Activity,
    pub warmup_count: u32,
    pub session_log: Option<SessionLog>,
    pub last_summary: Option<SessionSummary>,
}

impl App {
    pub fn new(tracker: SessionTracker<SystemClock>, config: &Config) -> Self {
        let session_log = AppDirs::session_log_path().map(SessionLog::new);
        Self {
            tracker,
            state: AppState::Tracking,
            activity: config.activity,
            warmup_count: config.tracker_config().warmup_count,
            session_log,
            last_summary: None,
        }
    }

    fn toggle_tracking(&mut self) {
        let enable = self.tracker.phase() == pacer::tracker::TrackerPhase::Idle;
        self.tracker.enable(enable);
    }

    /// Stops the session, logs the summary and switches to the results view.
    fn finish_session(&mut self) {
        self.tracker.enable(false);
        let summary = SessionSummary::from_metrics(self.activity, &self.tracker.metrics());
        if let Some(log) = &self.session_log {
            if let Err(err) = log.append(&summary) {
                warn!(%err, "failed to append session summary");
            }
        }
        info!(
            distance_m = summary.distance_m,
            duration_ms = summary.duration_ms,
            "session finished"
        );
        self.last_summary = Some(summary);
        self.state = AppState::Summary;
    }

    fn view<'a>(&'a self, recent: &'a [SessionSummary]) -> SessionView<'a> {
        SessionView {
            activity: self.activity,
            phase: self.tracker.phase(),
            warmup_remaining: self.tracker.warmup_remaining(),
            warmup_count: self.warmup_count,
            disabled: self.tracker.is_disabled(),
            metrics: self.tracker.metrics(),
            accuracy_m: self.tracker.last_accuracy_m(),
            recent,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    if let Err(err) = pacer::logging::init() {
        eprintln!("warning: could not open log file: {err}");
    }

    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let store = FileConfigStore::new();
    let config = cli.resolve_config(store.load());
    let tracker_config = config.tracker_config();

    let (event_source, tx) = ChannelEventSource::new();
    let source_tx = source_event_sender(tx.clone());

    let clock = SystemClock::new();
    let mut tracker = match (&cli.replay, cli.simulate) {
        (Some(path), _) => {
            let source = ReplaySource::from_path(path, source_tx)
                .map_err(|err| format!("cannot replay {}: {err}", path.display()))?;
            SessionTracker::new(tracker_config, Box::new(source), clock)
        }
        (None, true) => {
            let source: Box<dyn PositionSource> = Box::new(SimulatedSource::new(source_tx));
            SessionTracker::new(tracker_config, source, clock)
        }
        (None, false) => SessionTracker::disabled(tracker_config, clock),
    };
    tracker.set_notifications(config.notifications);
    tracker.add_observer(Box::new(ChannelObserver::new(refresh_sender(tx))));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(tracker, &config);
    let result = run_tui(&mut terminal, &mut app, event_source);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    event_source: ChannelEventSource,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(event_source, FixedTicker::new(Duration::from_millis(TICK_RATE_MS)));

    loop {
        let recent = app
            .session_log
            .as_ref()
            .map(|log| log.recent(5))
            .unwrap_or_default();

        terminal.draw(|f| match app.state {
            AppState::Tracking => ui::draw_dashboard(f, &app.view(&recent)),
            AppState::Summary => {
                if let Some(summary) = &app.last_summary {
                    ui::draw_summary(f, summary);
                }
            }
        })?;

        match runner.step() {
            AppEvent::Source(ev) => app.tracker.handle_event(ev),
            AppEvent::Refresh | AppEvent::Tick | AppEvent::Resize => {}
            AppEvent::Key(key) => {
                if is_quit(&key) {
                    app.tracker.enable(false);
                    return Ok(());
                }
                match app.state {
                    AppState::Tracking => match key.code {
                        KeyCode::Char(' ') => app.toggle_tracking(),
                        KeyCode::Char('s') => app.finish_session(),
                        _ => {}
                    },
                    AppState::Summary => {
                        if key.code == KeyCode::Char('n') {
                            app.tracker.reset();
                            app.last_summary = None;
                            app.state = AppState::Tracking;
                        }
                    }
                }
            }
        }
    }
}

fn is_quit(key: &KeyEvent) -> bool {
    matches!(key.code, KeyCode::Esc | KeyCode::Char('q'))
        || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use crossterm::event::KeyEventKind;
    use pacer::clock::SystemClock;
    use pacer::config::TrackerConfig;
    use pacer::tracker::TrackerPhase;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: crossterm::event::KeyEventState::NONE,
        }
    }

    #[test]
    fn cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_overrides_stored_config() {
        let cli = Cli::parse_from([
            "pacer",
            "--activity",
            "cycling",
            "--interval-ms",
            "500",
            "--warmup",
            "2",
        ]);
        let cfg = cli.resolve_config(Config::default());
        assert_eq!(cfg.activity, Activity::Cycling);
        assert_eq!(cfg.update_interval_ms, Some(500));
        assert_eq!(cfg.warmup_count, Some(2));
    }

    #[test]
    fn cli_defaults_leave_stored_config_alone() {
        let cli = Cli::parse_from(["pacer"]);
        let stored = Config {
            activity: Activity::Running,
            update_interval_ms: Some(1_000),
            ..Config::default()
        };
        let cfg = cli.resolve_config(stored.clone());
        assert_eq!(cfg, stored);
    }

    #[test]
    fn quit_keys_are_recognized() {
        assert!(is_quit(&key(KeyCode::Esc)));
        assert!(is_quit(&key(KeyCode::Char('q'))));
        assert!(!is_quit(&key(KeyCode::Char(' '))));
        let ctrl_c = KeyEvent {
            code: KeyCode::Char('c'),
            modifiers: KeyModifiers::CONTROL,
            kind: KeyEventKind::Press,
            state: crossterm::event::KeyEventState::NONE,
        };
        assert!(is_quit(&ctrl_c));
    }

    #[test]
    fn finish_session_records_summary_and_switches_view() {
        let tracker =
            SessionTracker::disabled(TrackerConfig::default(), SystemClock::new());
        let config = Config::default();
        let mut app = App::new(tracker, &config);
        app.session_log = None;

        app.finish_session();

        assert_eq!(app.state, AppState::Summary);
        let summary = app.last_summary.as_ref().unwrap();
        assert_eq!(summary.distance_m, 0.0);
        assert_eq!(summary.activity, "Walking");
    }

    #[test]
    fn toggle_starts_and_pauses_tracking() {
        let tracker =
            SessionTracker::disabled(TrackerConfig::default(), SystemClock::new());
        let config = Config::default();
        let mut app = App::new(tracker, &config);

        // A disabled tracker never leaves Idle, but the toggle must not panic.
        app.toggle_tracking();
        assert_eq!(app.tracker.phase(), TrackerPhase::Idle);
    }
}
