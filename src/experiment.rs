//! Session driver: walks the planned timeline against the input, display, and
//! result boundaries, one segment at a time.

use std::io;
use std::time::{Duration, Instant};

use crossterm::event::KeyCode;
use tracing::{info, warn};
use webbrowser::Browser;

use crate::config::Config;
use crate::error::Result;
use crate::results::{ResultSink, TrialRecord};
use crate::runtime::{EventSource, InputFilter, ListenerGuard, NbackEvent, Runner, Ticker};
use crate::session::{PracticeStats, SessionState};
use crate::timeline::{
    Block, BreakSegment, PracticeLoop, Progress, PromptChoice, ScreenSegment, Segment,
    StimulusSegment, TimelineBuilder,
};
use crate::trial::{TrialRunner, TrialTransition};

/// What the display should currently show.
#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Screen(ScreenSegment),
    /// `None` is the blank inter-stimulus screen
    Stimulus(Option<u8>),
    Feedback(PracticeStats),
    RepeatPrompt,
    Break {
        remaining_trials: usize,
        seconds_left: u64,
    },
}

/// Render and signal boundary.
pub trait Surface {
    fn render(&mut self, view: &View) -> io::Result<()>;
    /// Photo-diode style marker, on while a stimulus is visible
    fn set_signal(&mut self, on: bool) -> io::Result<()>;
    fn set_progress(&mut self, progress: Progress) -> io::Result<()>;

    /// Show or hide the digit, with the signal following it.
    /// Surfaces that draw frames should change both in one frame.
    fn show_stimulus(&mut self, digit: Option<u8>) -> io::Result<()> {
        self.set_signal(digit.is_some())?;
        self.render(&View::Stimulus(digit))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Next,
    Choice(PromptChoice),
    Abort,
}

pub struct Experiment<E: EventSource, T: Ticker, S: Surface, K: ResultSink> {
    config: Config,
    participant: String,
    state: SessionState,
    records: Vec<TrialRecord>,
    runner: Runner<E, T>,
    surface: S,
    sink: K,
}

impl<E: EventSource, T: Ticker, S: Surface, K: ResultSink> Experiment<E, T, S, K> {
    pub fn new(
        config: Config,
        participant: impl Into<String>,
        state: SessionState,
        runner: Runner<E, T>,
        surface: S,
        sink: K,
    ) -> Self {
        Self {
            config,
            participant: participant.into(),
            state,
            records: Vec::new(),
            runner,
            surface,
            sink,
        }
    }

    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Run every block in order. Returns once the timeline finishes or the
    /// session is cancelled; in both cases the sink holds every settled trial.
    pub fn run(&mut self) -> Result<Outcome> {
        let blocks = TimelineBuilder::new(&self.config).plan(&self.participant);
        info!(
            participant = %self.participant,
            n_level = self.config.nback.n_level,
            blocks = blocks.len(),
            "session started"
        );

        for block in &blocks {
            if let Some(progress) = block.start_milestone() {
                self.surface.set_progress(progress)?;
            }

            let step = match block {
                Block::Introduction(segments) => self.run_segments(segments)?,
                Block::Practice => self.run_practice()?,
                Block::MainTask => {
                    let segments = TimelineBuilder::new(&self.config).main_task(&mut self.state);
                    self.run_segments(&segments)?
                }
                Block::NextStep(screen) => self.run_next_step(screen)?,
            };

            if step == Step::Abort {
                info!(settled = self.records.len(), "session aborted");
                self.sink.update(&self.records, &self.config)?;
                return Ok(Outcome::Aborted);
            }
            if let Some(progress) = block.finish_milestone() {
                self.surface.set_progress(progress)?;
            }
        }

        self.sink.update(&self.records, &self.config)?;
        info!(trials = self.records.len(), "session completed");
        Ok(Outcome::Completed)
    }

    fn run_practice(&mut self) -> Result<Step> {
        loop {
            let segments = TimelineBuilder::new(&self.config).practice_pass(&mut self.state);
            let mut choice = PromptChoice::Proceed;
            for segment in &segments {
                match self.run_segment(segment)? {
                    Step::Abort => return Ok(Step::Abort),
                    Step::Choice(c) => choice = c,
                    Step::Next => {}
                }
            }

            if !PracticeLoop::should_repeat(choice) {
                return Ok(Step::Next);
            }
            info!("practice repeated");
        }
    }

    fn run_segments(&mut self, segments: &[Segment]) -> Result<Step> {
        for segment in segments {
            if self.run_segment(segment)? == Step::Abort {
                return Ok(Step::Abort);
            }
        }
        Ok(Step::Next)
    }

    fn run_segment(&mut self, segment: &Segment) -> Result<Step> {
        match segment {
            Segment::Screen(screen) => self.wait_on(View::Screen(screen.clone()), Self::continue_step),
            Segment::Break(b) => self.run_break(b),
            Segment::Stimulus(st) => self.run_stimulus(st),
            Segment::PracticeFeedback => {
                let stats = self.state.practice_stats().clone();
                self.wait_on(View::Feedback(stats), Self::continue_step)
            }
            Segment::RepeatPrompt => self.wait_on(View::RepeatPrompt, |ev, _| match ev {
                NbackEvent::Key(k) if matches!(k.code, KeyCode::Char('r') | KeyCode::Char('R')) => {
                    Some(Step::Choice(PromptChoice::Repeat))
                }
                NbackEvent::Key(k) if k.code == KeyCode::Char(' ') => {
                    Some(Step::Choice(PromptChoice::Proceed))
                }
                _ => None,
            }),
        }
    }

    /// Space or Enter, plus a click when pointer responses are in use.
    fn continue_step(ev: &NbackEvent, pointer: bool) -> Option<Step> {
        match ev {
            NbackEvent::Key(k) if matches!(k.code, KeyCode::Char(' ') | KeyCode::Enter) => Some(Step::Next),
            NbackEvent::Pointer if pointer => Some(Step::Next),
            _ => None,
        }
    }

    fn wait_on(&mut self, view: View, accept: impl Fn(&NbackEvent, bool) -> Option<Step>) -> Result<Step> {
        let pointer = self.config.nback.response_mode.allows_pointer();
        let filter = InputFilter {
            keys: &[],
            pointer,
        };
        let _listener = ListenerGuard::attach(self.runner.source(), filter)?;
        self.surface.render(&view)?;

        loop {
            let ev = self.runner.step();
            if ev.is_abort() {
                return Ok(Step::Abort);
            }
            if let Some(step) = accept(&ev, pointer) {
                return Ok(step);
            }
            if let NbackEvent::Resize = ev {
                self.surface.render(&view)?;
            }
        }
    }

    fn run_break(&mut self, segment: &BreakSegment) -> Result<Step> {
        info!(remaining = segment.remaining_trials, "break started");
        let end = Instant::now() + Duration::from_secs(segment.duration_secs);

        loop {
            let left = end.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return Ok(Step::Next);
            }
            let seconds_left = left.as_millis().div_ceil(1000) as u64;
            self.surface.render(&View::Break {
                remaining_trials: segment.remaining_trials,
                seconds_left,
            })?;

            // wake when the displayed second changes
            let next_change = end - Duration::from_secs(seconds_left - 1);
            match self.runner.next_before(next_change) {
                Some(ev) if ev.is_abort() => return Ok(Step::Abort),
                Some(ev) => {
                    if Self::continue_step(&ev, false).is_some() {
                        return Ok(Step::Next);
                    }
                }
                None => {}
            }
        }
    }

    fn run_stimulus(&mut self, segment: &StimulusSegment) -> Result<Step> {
        let filter = InputFilter::for_response_mode(segment.response_mode);
        let listener = ListenerGuard::attach(self.runner.source(), filter)?;

        let mut trial = TrialRunner::arm(segment.clone(), Instant::now());
        self.surface.show_stimulus(Some(segment.stimulus))?;

        while let Some(deadline) = trial.next_deadline() {
            match self.runner.next_before(deadline) {
                Some(ev) if ev.is_abort() => {
                    self.surface.set_signal(false)?;
                    return Ok(Step::Abort);
                }
                Some(NbackEvent::Resize) => {
                    let shown = trial.stimulus_visible().then_some(segment.stimulus);
                    self.surface.show_stimulus(shown)?;
                }
                Some(ev) => {
                    if let Some(input) = listener.classify(&ev) {
                        trial.on_input(input, Instant::now());
                    }
                }
                None => {
                    while let Some(transition) = trial.on_deadline(Instant::now()) {
                        if transition == TrialTransition::HideStimulus {
                            self.surface.show_stimulus(None)?;
                        }
                    }
                }
            }
        }
        drop(listener);

        let record = trial.settle(&mut self.state);
        self.records.push(record);
        if let Err(e) = self.sink.update(&self.records, &self.config) {
            warn!(error = %e, "failed to hand results to sink");
        }
        Ok(Step::Next)
    }

    fn run_next_step(&mut self, screen: &ScreenSegment) -> Result<Step> {
        let link = screen.link.clone().unwrap_or_default();
        // leaving the final screen, even with Esc, is not a cancellation
        self.wait_on(View::Screen(screen.clone()), |ev, _| match ev {
            NbackEvent::Key(k) if matches!(k.code, KeyCode::Char('o') | KeyCode::Char('O')) => {
                if Browser::is_available() {
                    if let Err(e) = webbrowser::open(&link) {
                        warn!(error = %e, link = %link, "failed to open next step link");
                    }
                }
                None
            }
            NbackEvent::Key(k)
                if matches!(k.code, KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Char('q')) =>
            {
                Some(Step::Next)
            }
            _ => None,
        })?;
        Ok(Step::Next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::MemorySink;
    use crate::runtime::{FixedTicker, TestEventSource};
    use assert_matches::assert_matches;
    use crossterm::event::{KeyEvent, KeyModifiers};
    use std::sync::mpsc::{self, Sender};

    /// Records what was shown and answers like a participant would.
    struct ScriptedSurface {
        tx: Sender<NbackEvent>,
        respond_to: Vec<u8>,
        repeats_left: usize,
        abort_on_stimulus: Option<usize>,
        stimuli_seen: usize,
        views: Vec<View>,
        signals: Vec<bool>,
        progress: Vec<&'static str>,
    }

    impl ScriptedSurface {
        fn new(tx: Sender<NbackEvent>) -> Self {
            Self {
                tx,
                respond_to: Vec::new(),
                repeats_left: 0,
                abort_on_stimulus: None,
                stimuli_seen: 0,
                views: Vec::new(),
                signals: Vec::new(),
                progress: Vec::new(),
            }
        }

        fn press(&self, code: KeyCode) {
            let _ = self.tx.send(NbackEvent::Key(KeyEvent::new(code, KeyModifiers::NONE)));
        }
    }

    impl Surface for ScriptedSurface {
        fn render(&mut self, view: &View) -> io::Result<()> {
            self.views.push(view.clone());
            match view {
                View::Screen(_) | View::Feedback(_) => self.press(KeyCode::Enter),
                View::RepeatPrompt => {
                    if self.repeats_left > 0 {
                        self.repeats_left -= 1;
                        self.press(KeyCode::Char('r'));
                    } else {
                        self.press(KeyCode::Char(' '));
                    }
                }
                View::Stimulus(Some(d)) => {
                    if self.abort_on_stimulus == Some(self.stimuli_seen) {
                        self.press(KeyCode::Esc);
                    } else if self.respond_to.contains(d) {
                        self.press(KeyCode::Char(' '));
                    }
                    self.stimuli_seen += 1;
                }
                View::Stimulus(None) | View::Break { .. } => {}
            }
            Ok(())
        }

        fn set_signal(&mut self, on: bool) -> io::Result<()> {
            self.signals.push(on);
            Ok(())
        }

        fn set_progress(&mut self, progress: Progress) -> io::Result<()> {
            self.progress.push(progress.label);
            Ok(())
        }
    }

    fn fast_config(trials: usize) -> Config {
        let mut cfg = Config::default();
        cfg.general_settings.skip_instructions = true;
        cfg.general_settings.skip_practice = true;
        cfg.nback.number_of_trials = trials;
        cfg.nback.number_of_practice_trials = 4;
        cfg.nback.display_duration_ms = 5;
        cfg.nback.inter_stimulus_interval_ms = 20;
        cfg
    }

    fn experiment(
        cfg: Config,
        configure: impl FnOnce(&mut ScriptedSurface),
    ) -> Experiment<TestEventSource, FixedTicker, ScriptedSurface, MemorySink> {
        let (tx, rx) = mpsc::channel();
        let mut surface = ScriptedSurface::new(tx);
        configure(&mut surface);
        let runner = Runner::new(TestEventSource::new(rx), FixedTicker::new(Duration::from_millis(5)));
        let state = SessionState::with_seed(&cfg, 1);
        Experiment::new(cfg, "p", state, runner, surface, MemorySink::default())
    }

    #[test]
    fn short_session_signals_and_progress() {
        let mut exp = experiment(fast_config(3), |_| {});

        assert_matches!(exp.run(), Ok(Outcome::Completed));
        assert_eq!(exp.records().len(), 3);
        assert!(exp.records().iter().all(|r| !r.response && !r.practice));
        assert_eq!(exp.surface().signals, vec![true, false, true, false, true, false]);
        assert_eq!(
            exp.surface().progress,
            vec!["Instructions Complete", "Main Task", "Task Complete"]
        );
        // one snapshot per trial plus the final flush
        assert_eq!(exp.sink().snapshots.len(), 4);
        assert_eq!(exp.sink().latest().len(), 3);
    }

    #[test]
    fn break_countdown_ends_on_its_own() {
        let mut cfg = fast_config(6);
        cfg.breaks.enabled = true;
        cfg.breaks.frequency = 3;
        cfg.breaks.duration_secs = 2;
        let mut exp = experiment(cfg, |_| {});

        let started = Instant::now();
        assert_matches!(exp.run(), Ok(Outcome::Completed));
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(exp.records().len(), 6);

        let mut countdown: Vec<u64> = exp
            .surface()
            .views
            .iter()
            .filter_map(|v| match v {
                View::Break { seconds_left, .. } => Some(*seconds_left),
                _ => None,
            })
            .collect();
        countdown.dedup();
        assert_eq!(countdown, vec![2, 1]);
    }

    #[test]
    fn responses_are_scored_against_labels() {
        let mut cfg = fast_config(4);
        cfg.nback.n_level = 1;
        cfg.nback.custom_sequence = "3,3,4,3".into();
        let mut exp = experiment(cfg, |s| s.respond_to = vec![3]);

        assert_matches!(exp.run(), Ok(Outcome::Completed));
        let records = exp.records();
        assert_eq!(
            records.iter().map(|r| (r.response, r.correct_response, r.correct)).collect::<Vec<_>>(),
            vec![(true, false, false), (true, true, true), (false, false, true), (true, false, false)]
        );
        assert!(records[1].rt.is_some());
        assert!(records[2].rt.is_none());
    }

    #[test]
    fn abort_mid_task_keeps_settled_trials() {
        let mut exp = experiment(fast_config(5), |s| s.abort_on_stimulus = Some(2));

        assert_matches!(exp.run(), Ok(Outcome::Aborted));
        assert_eq!(exp.records().len(), 2);
        assert_eq!(exp.sink().latest().len(), 2);
        assert_eq!(exp.surface().signals.last(), Some(&false));
        assert!(!exp.surface().progress.contains(&"Task Complete"));
    }

    #[test]
    fn practice_repeats_on_request() {
        let mut cfg = fast_config(2);
        cfg.general_settings.skip_practice = false;
        let mut exp = experiment(cfg, |s| s.repeats_left = 1);

        assert_matches!(exp.run(), Ok(Outcome::Completed));
        let practice: Vec<_> = exp.records().iter().filter(|r| r.practice).collect();
        assert_eq!(practice.len(), 8);
        assert_eq!(practice[4].trial_index, 0);
        let feedback = exp
            .surface()
            .views
            .iter()
            .filter(|v| matches!(v, View::Feedback(_)))
            .count();
        assert_eq!(feedback, 2);
        assert_eq!(exp.records().iter().filter(|r| !r.practice).count(), 2);
    }

    #[test]
    fn closed_source_aborts() {
        let cfg = fast_config(3);
        let (tx, rx) = mpsc::channel::<NbackEvent>();
        drop(tx);
        let (stx, _srx) = mpsc::channel();
        let runner = Runner::new(TestEventSource::new(rx), FixedTicker::new(Duration::from_millis(5)));
        let state = SessionState::with_seed(&cfg, 1);
        let mut exp = Experiment::new(cfg, "p", state, runner, ScriptedSurface::new(stx), MemorySink::default());

        assert_matches!(exp.run(), Ok(Outcome::Aborted));
        assert_eq!(exp.sink().snapshots.len(), 1);
    }
}
