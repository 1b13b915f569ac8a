use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Clear, Widget},
};

use crate::config::{PhotoDiodePosition, PhotoDiodeSettings};

pub const DEFAULT_WIDTH: u16 = 6;
pub const DEFAULT_HEIGHT: u16 = 3;

/// Where the signal patch goes inside `area`, `None` when disabled.
pub fn patch_area(settings: &PhotoDiodeSettings, area: Rect) -> Option<Rect> {
    let width = settings.photo_diode_width.unwrap_or(DEFAULT_WIDTH);
    let height = settings.photo_diode_height.unwrap_or(DEFAULT_HEIGHT);

    let rect = match settings.position {
        PhotoDiodePosition::Off => return None,
        PhotoDiodePosition::TopLeft => Rect::new(area.x, area.y, width, height),
        PhotoDiodePosition::TopRight => Rect::new(
            area.right().saturating_sub(width).max(area.x),
            area.y,
            width,
            height,
        ),
        PhotoDiodePosition::Customize => Rect::new(
            area.x.saturating_add(settings.photo_diode_left.unwrap_or(0)),
            area.y.saturating_add(settings.photo_diode_top.unwrap_or(0)),
            width,
            height,
        ),
    };

    let clipped = rect.intersection(area);
    (!clipped.is_empty()).then_some(clipped)
}

/// White patch while the stimulus is up, black otherwise.
pub struct Patch {
    pub on: bool,
    /// Draw a visible border around the patch
    pub outline: bool,
}

impl Widget for Patch {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);
        let color = if self.on { Color::White } else { Color::Black };
        buf.set_style(area, Style::default().bg(color));
        if self.outline {
            Block::bordered()
                .border_style(Style::default().fg(Color::Red))
                .render(area, buf);
        }
    }
}
