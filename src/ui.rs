pub mod digits;
pub mod photo_diode;

use std::io;

use ratatui::{
    backend::Backend,
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Gauge, Paragraph, Widget, Wrap},
    Terminal,
};
use unicode_width::UnicodeWidthStr;

use crate::config::{FontSize, PhotoDiodeSettings};
use crate::experiment::{Surface, View};
use crate::session::PracticeStats;
use crate::text;
use crate::timeline::Progress;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

/// Everything needed to draw one frame.
#[derive(Debug, Clone)]
pub struct Scene {
    pub view: Option<View>,
    pub signal: bool,
    pub progress: Option<Progress>,
    pub photo_diode: PhotoDiodeSettings,
    pub font_size: FontSize,
}

impl Scene {
    pub fn new(photo_diode: PhotoDiodeSettings, font_size: FontSize) -> Self {
        Self {
            view: None,
            signal: false,
            progress: None,
            photo_diode,
            font_size,
        }
    }
}

pub fn feedback_lines(stats: &PracticeStats) -> Vec<String> {
    vec![
        format!(
            "Correct responses: {} of {} ({:.0}%)",
            stats.correct_count(),
            stats.total(),
            stats.accuracy()
        ),
        format!("Matches caught: {} of {}", stats.hit_count(), stats.target_count()),
        format!("False alarms: {}", stats.false_positive_count()),
    ]
}

fn break_lines(remaining_trials: usize, seconds_left: u64) -> Vec<String> {
    vec![
        text::BREAK_MESSAGE.to_string(),
        format!("Trials remaining: {remaining_trials}"),
        format!("The task resumes in {seconds_left} s"),
    ]
}

/// Rows a block of text needs once wrapped to `width`.
fn wrapped_height(lines: &[Line], width: u16) -> u16 {
    let width = width.max(1) as usize;
    lines
        .iter()
        .map(|line| {
            let w: usize = line.spans.iter().map(|s| s.content.width()).sum();
            w.div_ceil(width).max(1) as u16
        })
        .sum()
}

fn text_page(title: &str, body: &[String], prompt: &str) -> Vec<Line<'static>> {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let prompt_style = Style::default().add_modifier(Modifier::DIM | Modifier::ITALIC);

    let mut lines = vec![Line::from(Span::styled(title.to_string(), bold_style)), Line::default()];
    for line in body {
        lines.push(Line::from(line.clone()));
    }
    if !prompt.is_empty() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(prompt.to_string(), prompt_style)));
    }
    lines
}

/// Vertically centered, horizontally centered paragraph.
fn render_centered(lines: Vec<Line<'static>>, area: Rect, buf: &mut Buffer) {
    let height = wrapped_height(&lines, area.width).min(area.height);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length((area.height - height) / 2),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(area);

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(chunks[1], buf);
}

impl Widget for &Scene {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([Constraint::Length(1), Constraint::Min(1)])
            .split(area);

        if let Some(progress) = self.progress {
            Gauge::default()
                .gauge_style(Style::default().fg(Color::Cyan))
                .ratio(progress.fraction.clamp(0.0, 1.0))
                .label(progress.label)
                .render(chunks[0], buf);
        }

        let body = chunks[1];
        match &self.view {
            None | Some(View::Stimulus(None)) => {}
            Some(View::Stimulus(Some(digit))) => {
                let lines = digits::big_digit(*digit, self.font_size);
                let bold = Style::default().add_modifier(Modifier::BOLD);
                render_centered(
                    lines.into_iter().map(|l| l.style(bold)).collect(),
                    body,
                    buf,
                );
            }
            Some(View::Screen(screen)) => {
                let mut body_lines = screen.lines.clone();
                if let Some(link) = &screen.link {
                    body_lines.push(link.clone());
                }
                render_centered(text_page(&screen.title, &body_lines, &screen.prompt), body, buf);
            }
            Some(View::Feedback(stats)) => {
                let mut body_lines = vec![text::FEEDBACK_TEXT.to_string()];
                body_lines.extend(feedback_lines(stats));
                render_centered(
                    text_page(text::FEEDBACK_TITLE, &body_lines, text::CONTINUE_PROMPT),
                    body,
                    buf,
                );
            }
            Some(View::RepeatPrompt) => {
                render_centered(text_page(text::FEEDBACK_TITLE, &[], text::REPEAT_PROMPT), body, buf);
            }
            Some(View::Break {
                remaining_trials,
                seconds_left,
            }) => {
                render_centered(
                    text_page(
                        text::BREAK_TITLE,
                        &break_lines(*remaining_trials, *seconds_left),
                        text::CONTINUE_PROMPT,
                    ),
                    body,
                    buf,
                );
            }
        }

        // drawn last so nothing covers it
        if let Some(patch) = photo_diode::patch_area(&self.photo_diode, area) {
            photo_diode::Patch {
                on: self.signal,
                outline: self.photo_diode.test_photo_diode,
            }
            .render(patch, buf);
        }
    }
}

/// Terminal backed [`Surface`]: every change redraws the whole scene.
pub struct TerminalSurface<B: Backend> {
    terminal: Terminal<B>,
    scene: Scene,
}

impl<B: Backend> TerminalSurface<B> {
    pub fn new(terminal: Terminal<B>, photo_diode: PhotoDiodeSettings, font_size: FontSize) -> Self {
        Self {
            terminal,
            scene: Scene::new(photo_diode, font_size),
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn terminal(&self) -> &Terminal<B> {
        &self.terminal
    }

    fn redraw(&mut self) -> io::Result<()> {
        let scene = &self.scene;
        self.terminal.draw(|f| f.render_widget(scene, f.area()))?;
        Ok(())
    }
}

impl<B: Backend> Surface for TerminalSurface<B> {
    fn render(&mut self, view: &View) -> io::Result<()> {
        self.scene.view = Some(view.clone());
        self.redraw()
    }

    fn set_signal(&mut self, on: bool) -> io::Result<()> {
        if self.scene.signal == on {
            return Ok(());
        }
        self.scene.signal = on;
        self.redraw()
    }

    /// Digit and patch change in the same frame.
    fn show_stimulus(&mut self, digit: Option<u8>) -> io::Result<()> {
        self.scene.view = Some(View::Stimulus(digit));
        self.scene.signal = digit.is_some();
        self.redraw()
    }

    fn set_progress(&mut self, progress: Progress) -> io::Result<()> {
        self.scene.progress = Some(progress);
        self.redraw()
    }
}
