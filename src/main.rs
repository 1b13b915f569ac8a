use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::Duration,
};

use chrono::Local;
use clap::{error::ErrorKind, ArgAction, CommandFactory, Parser};
use crossterm::{
    cursor::Show,
    event::DisableMouseCapture,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};

use nback::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore, FontSize, PhotoDiodePosition, ResponseMode},
    experiment::{Experiment, Outcome},
    logging,
    results::{export_csv, JsonFileSink, SessionSummary},
    runtime::{CrosstermEventSource, FixedTicker, Runner},
    session::SessionState,
    stats::HistoryDb,
    ui::TerminalSurface,
    util::format_ms,
};

const TICK_RATE_MS: u64 = 100;
const HISTORY_LIMIT: usize = 20;

/// n-back working memory task for the terminal
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Runs an n-back working memory task in the terminal: instructions, a repeatable practice round with feedback, the main task with optional breaks, and trial-level results written as JSON."
)]
pub struct Cli {
    /// participant name, stored with the results and substituted into the next step link
    #[clap(short = 'P', long, default_value = "anonymous")]
    participant: String,

    /// settings file to use instead of the default location
    #[clap(long)]
    config: Option<PathBuf>,

    /// how many positions back a digit has to match (1-4)
    #[clap(short = 'n', long = "n-level")]
    n_level: Option<u8>,

    /// number of main task trials
    #[clap(short = 't', long = "trials")]
    trials: Option<usize>,

    /// number of practice trials
    #[clap(short = 'p', long = "practice-trials")]
    practice_trials: Option<usize>,

    /// comma separated digits to use as the main sequence
    #[clap(long)]
    sequence: Option<String>,

    /// comma separated digits to use as the practice sequence
    #[clap(long)]
    practice_sequence: Option<String>,

    /// share of eligible trials that are targets, in percent
    #[clap(long)]
    target_percentage: Option<u32>,

    /// how long each digit stays visible, in milliseconds
    #[clap(long = "display-ms")]
    display_ms: Option<u64>,

    /// blank interval after each digit, in milliseconds
    #[clap(long = "isi-ms")]
    isi_ms: Option<u64>,

    /// which input counts as a response
    #[clap(short = 'r', long, value_enum)]
    response: Option<ResponseMode>,

    /// enable breaks every N main trials
    #[clap(long)]
    breaks_every: Option<usize>,

    /// break length in seconds
    #[clap(long)]
    break_secs: Option<u64>,

    /// show only the welcome screen before the task
    #[clap(long)]
    skip_instructions: bool,

    /// go straight to the main task
    #[clap(long)]
    skip_practice: bool,

    /// where to draw the photo-diode signal patch
    #[clap(long, value_enum)]
    photo_diode: Option<PhotoDiodePosition>,

    /// outline the photo-diode patch to check its placement
    #[clap(long)]
    test_photo_diode: bool,

    /// size of the stimulus digit
    #[clap(long, value_enum)]
    font_size: Option<FontSize>,

    /// link shown after the task; {participantName} is replaced
    #[clap(long)]
    next_link: Option<String>,

    /// results file (JSON); defaults to a fresh file in the state directory
    #[clap(long)]
    results: Option<PathBuf>,

    /// also write the raw trials as CSV
    #[clap(long)]
    csv: Option<PathBuf>,

    /// list recent sessions and exit
    #[clap(long)]
    history: bool,

    /// print the effective settings as JSON and exit
    #[clap(long)]
    print_config: bool,

    /// save the effective settings to the settings file
    #[clap(long)]
    save_config: bool,

    /// seed for reproducible sequences
    #[clap(long)]
    seed: Option<u64>,

    /// more detailed logs (-v info, -vv debug, -vvv trace)
    #[clap(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn config_store(&self) -> FileConfigStore {
        match &self.config {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        }
    }

    /// Layer command line overrides on top of the stored settings
    fn apply(&self, cfg: &mut Config) {
        let nb = &mut cfg.nback;
        if let Some(n) = self.n_level {
            nb.n_level = n;
        }
        if let Some(t) = self.trials {
            nb.number_of_trials = t;
        }
        if let Some(p) = self.practice_trials {
            nb.number_of_practice_trials = p;
        }
        if let Some(s) = &self.sequence {
            nb.custom_sequence = s.clone();
        }
        if let Some(s) = &self.practice_sequence {
            nb.custom_practice_sequence = s.clone();
        }
        if let Some(pct) = self.target_percentage {
            nb.target_percentage = pct;
        }
        if let Some(ms) = self.display_ms {
            nb.display_duration_ms = ms;
        }
        if let Some(ms) = self.isi_ms {
            nb.inter_stimulus_interval_ms = ms;
        }
        if let Some(mode) = self.response {
            nb.response_mode = mode;
        }

        if let Some(every) = self.breaks_every {
            cfg.breaks.enabled = true;
            cfg.breaks.frequency = every;
        }
        if let Some(secs) = self.break_secs {
            cfg.breaks.duration_secs = secs;
        }

        if self.skip_instructions {
            cfg.general_settings.skip_instructions = true;
        }
        if self.skip_practice {
            cfg.general_settings.skip_practice = true;
        }
        if let Some(pos) = self.photo_diode {
            cfg.photo_diode.position = pos;
        }
        if self.test_photo_diode {
            cfg.photo_diode.test_photo_diode = true;
        }
        if let Some(size) = self.font_size {
            cfg.general_settings.font_size = size;
        }
        if let Some(link) = &self.next_link {
            cfg.next_step.enabled = true;
            cfg.next_step.link = link.clone();
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let store = cli.config_store();
    let mut config = store.load();
    cli.apply(&mut config);
    if let Err(e) = config.validate() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::ValueValidation, e).exit();
    }

    if cli.save_config {
        store.save(&config)?;
        eprintln!("settings saved to {}", store.path().display());
    }
    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }
    if cli.history {
        print_history()?;
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    if let Some(log_path) = AppDirs::log_path() {
        logging::init(cli.verbose, &log_path)?;
    }

    let results_path = cli
        .results
        .clone()
        .unwrap_or_else(|| AppDirs::results_path(&cli.participant));
    let state = match cli.seed {
        Some(seed) => SessionState::with_seed(&config, seed),
        None => SessionState::new(&config),
    };

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let surface = TerminalSurface::new(
        terminal,
        config.photo_diode.clone(),
        config.general_settings.font_size,
    );
    let sink = JsonFileSink::new(&results_path, cli.participant.clone());
    let mut experiment = Experiment::new(config.clone(), cli.participant.clone(), state, runner, surface, sink);

    let outcome = experiment.run();
    restore_terminal()?;
    let outcome = outcome?;

    let records = experiment.records();
    let summary = SessionSummary::from_records(
        &cli.participant,
        config.nback.n_level(),
        records,
        outcome == Outcome::Completed,
    );

    if let Some(csv_path) = &cli.csv {
        export_csv(records, csv_path)?;
    }
    if let Some(db_path) = AppDirs::db_path() {
        if let Err(e) = HistoryDb::open(db_path).and_then(|db| db.record_session(&summary, Local::now())) {
            warn!(error = %e, "failed to record session history");
        }
    }
    info!(?outcome, accuracy = summary.accuracy, "session finished");

    println!("{}", summary_report(&summary));
    println!("results written to {}", results_path.display());
    Ok(())
}

fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen, Show)
}

fn summary_report(summary: &SessionSummary) -> String {
    let status = if summary.completed { "completed" } else { "aborted" };
    format!(
        "{participant} ({n}-back, {status})\n\
         accuracy: {acc:.1}% ({correct}/{total})\n\
         hits: {hits}/{targets}  false alarms: {fp}\n\
         reaction time: {rt} (sd {sd})",
        participant = summary.participant,
        n = summary.n_level,
        acc = summary.accuracy,
        correct = summary.correct_count,
        total = summary.total_trials,
        hits = summary.hits,
        targets = summary.targets,
        fp = summary.false_positives,
        rt = format_ms(summary.mean_rt_ms),
        sd = format_ms(summary.rt_std_dev_ms),
    )
}

fn print_history() -> Result<(), Box<dyn Error>> {
    let Some(db_path) = AppDirs::db_path() else {
        println!("no history location available");
        return Ok(());
    };
    let db = HistoryDb::open(db_path)?;
    let entries = db.recent_sessions(HISTORY_LIMIT)?;
    if entries.is_empty() {
        println!("no sessions recorded yet");
        return Ok(());
    }

    println!(
        "{:<20} {:<16} {:>3} {:>7} {:>9} {:>10}",
        "finished", "participant", "n", "trials", "accuracy", "mean rt"
    );
    for entry in entries {
        let s = &entry.summary;
        println!(
            "{:<20} {:<16} {:>3} {:>7} {:>8.1}% {:>10}{}",
            entry.finished_at.format("%Y-%m-%d %H:%M"),
            s.participant,
            s.n_level,
            s.total_trials,
            s.accuracy,
            format_ms(s.mean_rt_ms),
            if s.completed { "" } else { "  (aborted)" },
        );
    }
    Ok(())
}
