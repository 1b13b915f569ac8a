//! Assembly of the ordered task timeline.
//!
//! The timeline is planned as coarse [`Block`]s. The practice and main blocks
//! expand into [`Segment`]s only when they start, because their content depends
//! on the sequence built at that moment.

use std::time::Duration;

use crate::config::{Config, ResponseMode};
use crate::sequence::{is_target_trial, Digit};
use crate::session::SessionState;
use crate::text;

pub const PARTICIPANT_PLACEHOLDER: &str = "{participantName}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialTiming {
    pub display: Duration,
    pub inter_stimulus: Duration,
}

impl TrialTiming {
    pub fn from_config(config: &Config) -> Self {
        Self {
            display: Duration::from_millis(config.nback.display_duration_ms),
            inter_stimulus: Duration::from_millis(config.nback.inter_stimulus_interval_ms),
        }
    }

    /// Length of the whole response window.
    pub fn total(&self) -> Duration {
        self.display + self.inter_stimulus
    }
}

/// One stimulus presentation with its pre-computed label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StimulusSegment {
    pub stimulus: Digit,
    pub trial_index: usize,
    pub correct_response: bool,
    pub timing: TrialTiming,
    pub response_mode: ResponseMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenKind {
    Welcome,
    Instructions,
    Ready,
    Complete,
    NextStep,
}

/// A static text screen the participant dismisses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenSegment {
    pub kind: ScreenKind,
    pub title: String,
    pub lines: Vec<String>,
    pub prompt: String,
    pub link: Option<String>,
}

impl ScreenSegment {
    fn new(kind: ScreenKind, title: &str, lines: Vec<String>, prompt: &str) -> Self {
        Self {
            kind,
            title: title.to_string(),
            lines,
            prompt: prompt.to_string(),
            link: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakSegment {
    pub duration_secs: u64,
    pub remaining_trials: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Screen(ScreenSegment),
    Break(BreakSegment),
    Stimulus(StimulusSegment),
    /// Rendered from the practice counters at the time it is shown
    PracticeFeedback,
    RepeatPrompt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Introduction(Vec<Segment>),
    Practice,
    MainTask,
    NextStep(ScreenSegment),
}

/// Progress bar milestone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub label: &'static str,
    pub fraction: f64,
}

impl Block {
    pub fn start_milestone(&self) -> Option<Progress> {
        match self {
            Block::MainTask => Some(Progress {
                label: "Main Task",
                fraction: 0.5,
            }),
            _ => None,
        }
    }

    pub fn finish_milestone(&self) -> Option<Progress> {
        match self {
            Block::Introduction(_) => Some(Progress {
                label: "Instructions Complete",
                fraction: 0.2,
            }),
            Block::Practice => Some(Progress {
                label: "Practice Complete",
                fraction: 0.4,
            }),
            Block::MainTask => Some(Progress {
                label: "Task Complete",
                fraction: 1.0,
            }),
            Block::NextStep(_) => None,
        }
    }
}

/// Answer captured on the practice repeat prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptChoice {
    Repeat,
    Proceed,
}

pub struct PracticeLoop;

impl PracticeLoop {
    /// Continuation predicate evaluated after each full practice pass.
    pub fn should_repeat(choice: PromptChoice) -> bool {
        choice == PromptChoice::Repeat
    }
}

/// Substitute every participant placeholder in a link template.
pub fn resolve_link(template: &str, participant: &str) -> String {
    template.replace(PARTICIPANT_PLACEHOLDER, participant)
}

pub struct TimelineBuilder<'a> {
    config: &'a Config,
}

impl<'a> TimelineBuilder<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Ordered blocks for a whole session.
    pub fn plan(&self, participant: &str) -> Vec<Block> {
        let mut blocks = vec![Block::Introduction(self.introduction())];
        if !self.config.general_settings.skip_practice {
            blocks.push(Block::Practice);
        }
        blocks.push(Block::MainTask);
        if let Some(screen) = self.next_step(participant) {
            blocks.push(Block::NextStep(screen));
        }
        blocks
    }

    pub fn introduction(&self) -> Vec<Segment> {
        let nb = &self.config.nback;
        let n = nb.n_level();

        let welcome = ScreenSegment::new(
            ScreenKind::Welcome,
            text::WELCOME_TITLE,
            vec![
                text::WELCOME_MESSAGE.to_string(),
                text::task_description(n),
                text::response_method(nb.response_mode),
            ],
            text::CONTINUE_PROMPT,
        );
        if self.config.general_settings.skip_instructions {
            return vec![Segment::Screen(welcome)];
        }

        let pages = [
            ScreenSegment::new(
                ScreenKind::Instructions,
                text::INSTRUCTIONS_TITLE,
                vec![
                    text::INSTRUCTIONS_OVERVIEW.to_string(),
                    text::INSTRUCTIONS_SEQUENCE.to_string(),
                ],
                text::CONTINUE_PROMPT,
            ),
            ScreenSegment::new(
                ScreenKind::Instructions,
                text::TASK_RULES_TITLE,
                vec![text::task_rules(n), text::example(n)],
                text::CONTINUE_PROMPT,
            ),
            ScreenSegment::new(
                ScreenKind::Instructions,
                text::RESPONSE_TITLE,
                vec![
                    text::RESPONSE_WHEN_MATCH.to_string(),
                    text::RESPONSE_WHEN_NO_MATCH.to_string(),
                    text::SPEED_ACCURACY.to_string(),
                ],
                text::CONTINUE_PROMPT,
            ),
            ScreenSegment::new(
                ScreenKind::Instructions,
                text::PRACTICE_TITLE,
                vec![
                    text::PRACTICE_MESSAGE.to_string(),
                    text::READY_MESSAGE.to_string(),
                ],
                text::CONTINUE_PROMPT,
            ),
        ];

        std::iter::once(welcome)
            .chain(pages)
            .map(Segment::Screen)
            .collect()
    }

    /// One practice pass: rebuilds the practice sequence, then stimuli,
    /// feedback, and the repeat prompt.
    pub fn practice_pass(&self, state: &mut SessionState) -> Vec<Segment> {
        state.initialize_practice_sequence();

        let mut segments: Vec<Segment> = self.stimuli(state).map(Segment::Stimulus).collect();
        segments.push(Segment::PracticeFeedback);
        segments.push(Segment::RepeatPrompt);
        segments
    }

    /// Switches the session to the main task and lays out its segments,
    /// with breaks ahead of the stimuli where the cadence asks for them.
    pub fn main_task(&self, state: &mut SessionState) -> Vec<Segment> {
        state.start_main_task();
        state.initialize_main_sequence();

        let mut segments = vec![Segment::Screen(ScreenSegment::new(
            ScreenKind::Ready,
            text::MAIN_READY_TITLE,
            vec![text::MAIN_READY_MESSAGE.to_string()],
            text::MAIN_PRESS_TO_BEGIN,
        ))];

        let total = state.total_trials();
        for stimulus in self.stimuli(state) {
            if state.should_show_break_at(stimulus.trial_index) {
                segments.push(Segment::Break(BreakSegment {
                    duration_secs: state.break_duration_secs(),
                    remaining_trials: total - stimulus.trial_index,
                }));
            }
            segments.push(Segment::Stimulus(stimulus));
        }

        segments.push(Segment::Screen(ScreenSegment::new(
            ScreenKind::Complete,
            text::COMPLETE_TITLE,
            vec![text::COMPLETE_MESSAGE.to_string()],
            text::CONTINUE_PROMPT,
        )));
        segments
    }

    pub fn next_step(&self, participant: &str) -> Option<ScreenSegment> {
        let ns = &self.config.next_step;
        if !ns.enabled {
            return None;
        }

        let mut lines = vec![ns.description.clone()];
        if !ns.link_text.is_empty() {
            lines.push(ns.link_text.clone());
        }
        Some(ScreenSegment {
            kind: ScreenKind::NextStep,
            title: ns.title.clone(),
            lines,
            prompt: "Press O to open the link, or ENTER to finish".to_string(),
            link: Some(resolve_link(&ns.link, participant)),
        })
    }

    fn stimuli<'s>(&self, state: &'s SessionState) -> impl Iterator<Item = StimulusSegment> + 's {
        let timing = TrialTiming::from_config(self.config);
        let response_mode = self.config.nback.response_mode;
        let n = state.n_level();
        let seq = state.sequence();

        seq.iter().enumerate().map(move |(i, &stimulus)| StimulusSegment {
            stimulus,
            trial_index: i,
            correct_response: is_target_trial(seq, i, n),
            timing,
            response_mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn stimuli(segments: &[Segment]) -> Vec<&StimulusSegment> {
        segments
            .iter()
            .filter_map(|s| match s {
                Segment::Stimulus(st) => Some(st),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn full_and_condensed_introduction() {
        let mut cfg = Config::default();
        assert_eq!(TimelineBuilder::new(&cfg).introduction().len(), 5);

        cfg.general_settings.skip_instructions = true;
        let intro = TimelineBuilder::new(&cfg).introduction();
        assert_eq!(intro.len(), 1);
        assert_matches!(&intro[0], Segment::Screen(s) if s.kind == ScreenKind::Welcome);
    }

    #[test]
    fn plan_respects_skip_practice_and_next_step() {
        let mut cfg = Config::default();
        let plan = TimelineBuilder::new(&cfg).plan("ann");
        assert_eq!(plan.len(), 3);
        assert_eq!(plan[1], Block::Practice);

        cfg.general_settings.skip_practice = true;
        cfg.next_step.enabled = true;
        cfg.next_step.link = "https://x.test/{participantName}/go?who={participantName}".into();
        let plan = TimelineBuilder::new(&cfg).plan("ann");
        assert_eq!(plan.len(), 3);
        assert_eq!(plan[1], Block::MainTask);
        assert_matches!(&plan[2], Block::NextStep(s) => {
            assert_eq!(s.link.as_deref(), Some("https://x.test/ann/go?who=ann"));
        });
    }

    #[test]
    fn practice_pass_layout() {
        let mut cfg = Config::default();
        cfg.nback.number_of_practice_trials = 8;
        let mut state = SessionState::with_seed(&cfg, 4);
        let segments = TimelineBuilder::new(&cfg).practice_pass(&mut state);

        assert_eq!(segments.len(), 10);
        assert_eq!(segments[8], Segment::PracticeFeedback);
        assert_eq!(segments[9], Segment::RepeatPrompt);
        assert!(state.is_practice_mode());

        for (i, st) in stimuli(&segments).into_iter().enumerate() {
            assert_eq!(st.trial_index, i);
            assert_eq!(st.stimulus, state.sequence()[i]);
            assert_eq!(st.correct_response, is_target_trial(state.sequence(), i, 2));
            assert_eq!(st.timing.total(), Duration::from_millis(2500));
        }
    }

    #[test]
    fn main_task_inserts_breaks_before_stimuli() {
        let mut cfg = Config::default();
        cfg.nback.number_of_trials = 12;
        cfg.breaks.enabled = true;
        cfg.breaks.frequency = 5;
        cfg.breaks.duration_secs = 7;
        let mut state = SessionState::with_seed(&cfg, 4);
        state.initialize_practice_sequence();
        let segments = TimelineBuilder::new(&cfg).main_task(&mut state);

        assert_matches!(&segments[0], Segment::Screen(s) if s.kind == ScreenKind::Ready);
        assert_matches!(segments.last(), Some(Segment::Screen(s)) if s.kind == ScreenKind::Complete);
        assert!(!state.is_practice_mode());
        assert_eq!(stimuli(&segments).len(), 12);

        let break_positions: Vec<usize> = segments
            .windows(2)
            .filter_map(|w| match (&w[0], &w[1]) {
                (Segment::Break(b), Segment::Stimulus(st)) => {
                    assert_eq!(b.duration_secs, 7);
                    assert_eq!(b.remaining_trials, 12 - st.trial_index);
                    Some(st.trial_index)
                }
                _ => None,
            })
            .collect();
        assert_eq!(break_positions, vec![5, 10]);
    }

    #[test]
    fn practice_loop_predicate() {
        assert!(PracticeLoop::should_repeat(PromptChoice::Repeat));
        assert!(!PracticeLoop::should_repeat(PromptChoice::Proceed));
    }

    #[test]
    fn milestones() {
        assert_eq!(Block::Practice.finish_milestone().unwrap().fraction, 0.4);
        assert_eq!(Block::MainTask.start_milestone().unwrap().label, "Main Task");
        assert!(Block::Practice.start_milestone().is_none());
    }
}
