//! Block glyphs for the stimulus digit.

use ratatui::text::Line;

use crate::config::FontSize;

const FONT_ROWS: usize = 5;
const FONT_COLS: usize = 3;

const FONT: [[&str; FONT_ROWS]; 10] = [
    ["###", "# #", "# #", "# #", "###"],
    [" # ", "## ", " # ", " # ", "###"],
    ["###", "  #", "###", "#  ", "###"],
    ["###", "  #", "###", "  #", "###"],
    ["# #", "# #", "###", "  #", "  #"],
    ["###", "#  ", "###", "  #", "###"],
    ["###", "#  ", "###", "# #", "###"],
    ["###", "  #", "  #", "  #", "  #"],
    ["###", "# #", "###", "# #", "###"],
    ["###", "# #", "###", "  #", "###"],
];

/// Width and height in cells of a glyph at `size`.
pub fn glyph_size(size: FontSize) -> (u16, u16) {
    let scale = size.scale();
    (FONT_COLS as u16 * scale, FONT_ROWS as u16 * scale.div_ceil(2))
}

pub fn big_digit(digit: u8, size: FontSize) -> Vec<Line<'static>> {
    let scale = size.scale() as usize;
    let row_repeat = scale.div_ceil(2);
    let on = "█".repeat(scale);
    let off = " ".repeat(scale);

    FONT[usize::from(digit % 10)]
        .iter()
        .flat_map(|row| {
            let wide: String = row
                .chars()
                .map(|c| if c == '#' { on.as_str() } else { off.as_str() })
                .collect();
            std::iter::repeat(Line::from(wide)).take(row_repeat)
        })
        .collect()
}
