//! Ten-cell level gauge rendering.
//!
//! Turns the meter's level scalar into the fixed row of filled and hollow
//! cells shown under the preview.

use ratatui::style::{Color, Style};
use ratatui::text::Span;

use crate::meter::ladder::{lit_cells, CELL_COUNT};

const LIT: &str = "●";
const UNLIT: &str = "○";

/// Renders the gauge as plain text, for logs and tests.
pub fn gauge_text(level: u8) -> String {
    let cells = lit_cells(level);
    let mut line = String::with_capacity(CELL_COUNT * 4);
    for (i, lit) in cells.iter().enumerate() {
        if i > 0 {
            line.push(' ');
        }
        line.push_str(if *lit { LIT } else { UNLIT });
    }
    line
}

/// Renders the gauge as styled spans. Lit cells shade from green through
/// yellow to red along the row; unlit cells stay dim.
pub fn gauge_spans(level: u8) -> Vec<Span<'static>> {
    let cells = lit_cells(level);
    let mut spans = Vec::with_capacity(CELL_COUNT * 2);
    for (i, lit) in cells.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" "));
        }
        let style = if *lit {
            Style::default().fg(cell_color(i))
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(if *lit { LIT } else { UNLIT }, style));
    }
    spans
}

fn cell_color(index: usize) -> Color {
    match index {
        0..=5 => Color::Green,
        6..=7 => Color::Yellow,
        _ => Color::Red,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_renders_all_hollow() {
        assert_eq!(gauge_text(0), "○ ○ ○ ○ ○ ○ ○ ○ ○ ○");
    }

    #[test]
    fn max_level_renders_all_filled() {
        assert_eq!(gauge_text(255), "● ● ● ● ● ● ● ● ● ●");
    }

    #[test]
    fn partial_level_fills_a_prefix() {
        // 75 reaches the fifth threshold exactly.
        assert_eq!(gauge_text(75), "● ● ● ● ● ○ ○ ○ ○ ○");
    }

    #[test]
    fn spans_cover_every_cell() {
        let spans = gauge_spans(120);
        // Ten cells with nine separators.
        assert_eq!(spans.len(), CELL_COUNT * 2 - 1);
    }
}
