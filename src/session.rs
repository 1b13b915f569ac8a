use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::debug;

use crate::config::{BreakSettings, Config, NBackSettings};
use crate::sequence::{self, Digit, SequenceOrigin};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Practice,
    Main,
}

/// Coarse lifecycle position of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    PracticeActive,
    MainActive,
    Complete,
}

/// Running practice feedback counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PracticeStats {
    responses: Vec<bool>,
    target_count: usize,
    hit_count: usize,
    false_positive_count: usize,
}

impl PracticeStats {
    pub fn total(&self) -> usize {
        self.responses.len()
    }

    pub fn correct_count(&self) -> usize {
        self.responses.iter().filter(|&&c| c).count()
    }

    /// Percentage correct; 0 before any trial was recorded.
    pub fn accuracy(&self) -> f64 {
        if self.responses.is_empty() {
            return 0.0;
        }
        self.correct_count() as f64 / self.total() as f64 * 100.0
    }

    pub fn target_count(&self) -> usize {
        self.target_count
    }

    pub fn hit_count(&self) -> usize {
        self.hit_count
    }

    pub fn false_positive_count(&self) -> usize {
        self.false_positive_count
    }
}

/// Sequence, trial cursor, mode, and practice statistics for one session.
///
/// Owned by the running experiment; every mutation goes through the
/// transition methods below from a single task.
#[derive(Debug, Clone)]
pub struct SessionState {
    nback: NBackSettings,
    breaks: BreakSettings,
    sequence: Vec<Digit>,
    origin: Option<SequenceOrigin>,
    cursor: usize,
    mode: Option<Mode>,
    practice: PracticeStats,
    rng: StdRng,
}

impl SessionState {
    pub fn new(config: &Config) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_seed(config: &Config, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &Config, rng: StdRng) -> Self {
        Self {
            nback: config.nback.clone(),
            breaks: config.breaks.clone(),
            sequence: Vec::new(),
            origin: None,
            cursor: 0,
            mode: None,
            practice: PracticeStats::default(),
            rng,
        }
    }

    /// (Re)build the practice sequence and clear the practice counters.
    pub fn initialize_practice_sequence(&mut self) {
        let (seq, origin) = sequence::select_sequence(
            &mut self.rng,
            &self.nback.custom_practice_sequence,
            self.nback.number_of_practice_trials,
            self.nback.n_level(),
            self.nback.target_percentage,
        );
        debug!(len = seq.len(), ?origin, "practice sequence ready");
        self.sequence = seq;
        self.origin = Some(origin);
        self.cursor = 0;
        self.mode = Some(Mode::Practice);
        self.practice = PracticeStats::default();
    }

    /// (Re)build the main sequence. Leaves the mode alone.
    pub fn initialize_main_sequence(&mut self) {
        let (seq, origin) = sequence::select_sequence(
            &mut self.rng,
            &self.nback.custom_sequence,
            self.nback.number_of_trials,
            self.nback.n_level(),
            self.nback.target_percentage,
        );
        debug!(len = seq.len(), ?origin, "main sequence ready");
        self.sequence = seq;
        self.origin = Some(origin);
        self.cursor = 0;
    }

    pub fn start_main_task(&mut self) {
        self.mode = Some(Mode::Main);
        self.cursor = 0;
    }

    pub fn increment_trial(&mut self) {
        self.cursor += 1;
    }

    /// Count a finished practice trial. Ignored outside practice mode.
    pub fn record_practice_response(&mut self, correct: bool, responded: bool, should_respond: bool) {
        if !self.is_practice_mode() {
            return;
        }

        self.practice.responses.push(correct);
        if should_respond {
            self.practice.target_count += 1;
            if responded {
                self.practice.hit_count += 1;
            }
        } else if responded {
            self.practice.false_positive_count += 1;
        }
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.sequence.len()
    }

    pub fn should_show_break(&self) -> bool {
        self.should_show_break_at(self.cursor)
    }

    /// Break rule evaluated for an arbitrary cursor position in the current mode.
    pub fn should_show_break_at(&self, cursor: usize) -> bool {
        if !self.breaks.enabled || self.mode != Some(Mode::Main) || self.breaks.frequency == 0 {
            return false;
        }
        cursor > 0 && cursor % self.breaks.frequency == 0 && cursor < self.sequence.len()
    }

    pub fn phase(&self) -> SessionPhase {
        match self.mode {
            None => SessionPhase::Uninitialized,
            Some(Mode::Practice) => SessionPhase::PracticeActive,
            Some(Mode::Main) if self.is_complete() => SessionPhase::Complete,
            Some(Mode::Main) => SessionPhase::MainActive,
        }
    }

    pub fn is_practice_mode(&self) -> bool {
        self.mode == Some(Mode::Practice)
    }

    pub fn sequence(&self) -> &[Digit] {
        &self.sequence
    }

    pub fn sequence_origin(&self) -> Option<SequenceOrigin> {
        self.origin
    }

    pub fn current_trial_index(&self) -> usize {
        self.cursor
    }

    pub fn current_stimulus(&self) -> Option<Digit> {
        self.sequence.get(self.cursor).copied()
    }

    pub fn is_current_trial_target(&self) -> bool {
        sequence::is_target_trial(&self.sequence, self.cursor, self.nback.n_level())
    }

    pub fn n_level(&self) -> usize {
        self.nback.n_level()
    }

    pub fn total_trials(&self) -> usize {
        self.sequence.len()
    }

    pub fn remaining_trials(&self) -> usize {
        self.sequence.len().saturating_sub(self.cursor)
    }

    pub fn break_duration_secs(&self) -> u64 {
        self.breaks.duration_secs
    }

    pub fn practice_stats(&self) -> &PracticeStats {
        &self.practice
    }
}
