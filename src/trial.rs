//! Timing state machine for a single stimulus presentation.
//!
//! A trial is armed when the stimulus is shown. The first qualifying input
//! fixes the reaction time; the stimulus is hidden after the display duration
//! and the trial closes after display + inter-stimulus interval regardless of
//! input. [`TrialRunner::settle`] consumes the runner, so a trial can produce
//! at most one record and advance the cursor at most once.

use std::time::{Duration, Instant};
use tracing::debug;

use crate::results::TrialRecord;
use crate::runtime::ResponseInput;
use crate::session::SessionState;
use crate::timeline::StimulusSegment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialPhase {
    Armed,
    Responded,
    TimedOut,
}

/// Timer driven transitions the caller has to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialTransition {
    /// Display duration elapsed: hide the digit and drop the signal.
    HideStimulus,
    /// Response window elapsed: the trial is ready to settle.
    WindowClosed,
}

#[derive(Debug)]
pub struct TrialRunner {
    segment: StimulusSegment,
    armed_at: Instant,
    hide_at: Instant,
    close_at: Instant,
    phase: TrialPhase,
    stimulus_visible: bool,
    window_open: bool,
    reaction_time: Option<Duration>,
}

impl TrialRunner {
    pub fn arm(segment: StimulusSegment, now: Instant) -> Self {
        let hide_at = now + segment.timing.display;
        let close_at = now + segment.timing.total();
        Self {
            segment,
            armed_at: now,
            hide_at,
            close_at,
            phase: TrialPhase::Armed,
            stimulus_visible: true,
            window_open: true,
            reaction_time: None,
        }
    }

    pub fn segment(&self) -> &StimulusSegment {
        &self.segment
    }

    pub fn phase(&self) -> TrialPhase {
        self.phase
    }

    pub fn stimulus_visible(&self) -> bool {
        self.stimulus_visible
    }

    pub fn reaction_time(&self) -> Option<Duration> {
        self.reaction_time
    }

    /// Register a qualifying input. Returns whether it counted.
    ///
    /// Only the first input inside the window counts; the stimulus being hidden
    /// does not close input capture.
    pub fn on_input(&mut self, _input: ResponseInput, now: Instant) -> bool {
        if self.phase != TrialPhase::Armed || !self.window_open || now >= self.close_at {
            return false;
        }
        self.reaction_time = Some(now.saturating_duration_since(self.armed_at));
        self.phase = TrialPhase::Responded;
        true
    }

    /// The next instant the caller has to wake up at, `None` once closed.
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.stimulus_visible {
            Some(self.hide_at)
        } else if self.window_open {
            Some(self.close_at)
        } else {
            None
        }
    }

    /// Advance timers. Call repeatedly until it yields `None`.
    pub fn on_deadline(&mut self, now: Instant) -> Option<TrialTransition> {
        if self.stimulus_visible && now >= self.hide_at {
            self.stimulus_visible = false;
            return Some(TrialTransition::HideStimulus);
        }
        if !self.stimulus_visible && self.window_open && now >= self.close_at {
            self.window_open = false;
            if self.phase == TrialPhase::Armed {
                self.phase = TrialPhase::TimedOut;
            }
            return Some(TrialTransition::WindowClosed);
        }
        None
    }

    pub fn is_closed(&self) -> bool {
        !self.window_open
    }

    /// Score the trial, update the session, and produce its record.
    pub fn settle(self, state: &mut SessionState) -> TrialRecord {
        debug_assert!(self.is_closed(), "trial settled before its window closed");

        let responded = self.phase == TrialPhase::Responded;
        let expected = self.segment.correct_response;
        let correct = responded == expected;

        if state.is_practice_mode() {
            state.record_practice_response(correct, responded, expected);
        }
        state.increment_trial();

        let record = TrialRecord {
            stimulus: self.segment.stimulus,
            response: responded,
            correct_response: expected,
            correct,
            rt: self.reaction_time.map(|d| d.as_nanos() as f64 / 1_000_000.0),
            trial_index: self.segment.trial_index,
            practice: state.is_practice_mode(),
        };
        debug!(
            trial = record.trial_index,
            practice = record.practice,
            responded,
            correct,
            "trial settled"
        );
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ResponseMode};
    use crate::timeline::TrialTiming;

    const DISPLAY: Duration = Duration::from_millis(500);
    const ISI: Duration = Duration::from_millis(2000);

    fn segment(correct_response: bool) -> StimulusSegment {
        StimulusSegment {
            stimulus: 7,
            trial_index: 3,
            correct_response,
            timing: TrialTiming {
                display: DISPLAY,
                inter_stimulus: ISI,
            },
            response_mode: ResponseMode::Space,
        }
    }

    fn practice_state() -> SessionState {
        let mut state = SessionState::with_seed(&Config::default(), 11);
        state.initialize_practice_sequence();
        state
    }

    fn run_to_close(trial: &mut TrialRunner, start: Instant) -> Vec<TrialTransition> {
        let mut seen = Vec::new();
        while let Some(deadline) = trial.next_deadline() {
            assert!(deadline >= start);
            while let Some(t) = trial.on_deadline(deadline) {
                seen.push(t);
            }
        }
        seen
    }

    #[test]
    fn deadlines_follow_display_then_isi() {
        let t0 = Instant::now();
        let mut trial = TrialRunner::arm(segment(false), t0);
        assert_eq!(trial.next_deadline(), Some(t0 + DISPLAY));
        assert_eq!(trial.on_deadline(t0 + DISPLAY - Duration::from_millis(1)), None);
        assert_eq!(trial.on_deadline(t0 + DISPLAY), Some(TrialTransition::HideStimulus));
        assert!(!trial.stimulus_visible());
        assert_eq!(trial.next_deadline(), Some(t0 + DISPLAY + ISI));
        assert_eq!(trial.on_deadline(t0 + DISPLAY + ISI), Some(TrialTransition::WindowClosed));
        assert_eq!(trial.next_deadline(), None);
        assert_eq!(trial.phase(), TrialPhase::TimedOut);
    }

    #[test]
    fn late_wakeup_fires_both_transitions_in_order() {
        let t0 = Instant::now();
        let mut trial = TrialRunner::arm(segment(false), t0);
        let late = t0 + Duration::from_secs(10);
        assert_eq!(trial.on_deadline(late), Some(TrialTransition::HideStimulus));
        assert_eq!(trial.on_deadline(late), Some(TrialTransition::WindowClosed));
        assert_eq!(trial.on_deadline(late), None);
    }

    #[test]
    fn first_response_wins() {
        let t0 = Instant::now();
        let mut trial = TrialRunner::arm(segment(true), t0);
        assert!(trial.on_input(ResponseInput::Key(' '), t0 + Duration::from_millis(420)));
        assert!(!trial.on_input(ResponseInput::Pointer, t0 + Duration::from_millis(600)));
        assert_eq!(trial.phase(), TrialPhase::Responded);
        assert_eq!(trial.reaction_time(), Some(Duration::from_millis(420)));
    }

    #[test]
    fn response_after_hide_still_counts() {
        let t0 = Instant::now();
        let mut trial = TrialRunner::arm(segment(true), t0);
        trial.on_deadline(t0 + DISPLAY);
        assert!(trial.on_input(ResponseInput::Key(' '), t0 + Duration::from_millis(1200)));
    }

    #[test]
    fn response_after_window_is_ignored() {
        let t0 = Instant::now();
        let mut trial = TrialRunner::arm(segment(true), t0);
        assert!(!trial.on_input(ResponseInput::Key(' '), t0 + DISPLAY + ISI));
        run_to_close(&mut trial, t0);
        assert!(!trial.on_input(ResponseInput::Key(' '), t0 + DISPLAY));
        assert_eq!(trial.phase(), TrialPhase::TimedOut);
    }

    #[test]
    fn settle_hit_in_practice() {
        let t0 = Instant::now();
        let mut state = practice_state();
        let mut trial = TrialRunner::arm(segment(true), t0);
        trial.on_input(ResponseInput::Key(' '), t0 + Duration::from_millis(350));
        assert_eq!(
            run_to_close(&mut trial, t0),
            vec![TrialTransition::HideStimulus, TrialTransition::WindowClosed]
        );

        let record = trial.settle(&mut state);
        assert_eq!(
            record,
            TrialRecord {
                stimulus: 7,
                response: true,
                correct_response: true,
                correct: true,
                rt: Some(350.0),
                trial_index: 3,
                practice: true,
            }
        );
        assert_eq!(state.current_trial_index(), 1);
        let stats = state.practice_stats();
        assert_eq!((stats.hit_count(), stats.target_count(), stats.total()), (1, 1, 1));
    }

    #[test]
    fn settle_miss_and_false_alarm() {
        let t0 = Instant::now();
        let mut state = practice_state();

        let mut miss = TrialRunner::arm(segment(true), t0);
        run_to_close(&mut miss, t0);
        let record = miss.settle(&mut state);
        assert!(!record.response && !record.correct);
        assert_eq!(record.rt, None);

        let mut false_alarm = TrialRunner::arm(segment(false), t0);
        false_alarm.on_input(ResponseInput::Pointer, t0 + Duration::from_millis(10));
        run_to_close(&mut false_alarm, t0);
        let record = false_alarm.settle(&mut state);
        assert!(record.response && !record.correct);

        let stats = state.practice_stats();
        assert_eq!(stats.false_positive_count(), 1);
        assert_eq!(stats.hit_count(), 0);
        assert_eq!(stats.correct_count(), 0);
        assert_eq!(state.current_trial_index(), 2);
    }

    #[test]
    fn main_mode_leaves_practice_stats_alone() {
        let t0 = Instant::now();
        let mut state = practice_state();
        state.start_main_task();
        state.initialize_main_sequence();

        let mut trial = TrialRunner::arm(segment(false), t0);
        run_to_close(&mut trial, t0);
        let record = trial.settle(&mut state);
        assert!(record.correct);
        assert!(!record.practice);
        assert_eq!(state.practice_stats().total(), 0);
        assert_eq!(state.current_trial_index(), 1);
    }
}
