//! Full-screen error display.
//!
//! When device acquisition fails the entire interactive surface is replaced
//! by a red screen with a centered human-readable message. Any key dismisses
//! it.

use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Paragraph, Wrap},
};
use std::io::{self, Stdout};

pub struct ErrorScreen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl ErrorScreen {
    /// Creates the error screen and enters alternate screen mode.
    ///
    /// # Errors
    /// - If the terminal cannot be initialized
    /// - If raw mode cannot be enabled
    pub fn new() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(ErrorScreen { terminal })
    }

    /// Shows the message on a full red screen with centered white text and
    /// blocks until any key is pressed.
    ///
    /// # Errors
    /// - If terminal rendering fails
    pub fn show_error(&mut self, error_message: &str) -> anyhow::Result<()> {
        loop {
            self.terminal.draw(|frame| {
                let area = frame.area();

                let background =
                    Block::default().style(Style::default().bg(Color::Rgb(255, 0, 0)));
                frame.render_widget(background, area);

                let padding_x = area.width / 10;
                let text_width = (area.width * 80) / 100;
                let centered_area = Rect {
                    x: area.x + padding_x,
                    y: area.y + area.height / 2,
                    width: text_width,
                    height: area.height / 2,
                };

                let paragraph = Paragraph::new(Line::from(Span::styled(
                    error_message,
                    Style::default()
                        .fg(Color::Rgb(255, 255, 255))
                        .bg(Color::Rgb(255, 0, 0)),
                )))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true });

                frame.render_widget(paragraph, centered_area);
            })?;

            if event::poll(std::time::Duration::from_millis(100))? {
                if let Event::Key(_) = event::read()? {
                    break;
                }
            }
        }

        Ok(())
    }

    /// Cleans up terminal state and exits alternate screen mode.
    ///
    /// # Errors
    /// - If terminal mode cannot be disabled
    pub fn cleanup(&mut self) -> anyhow::Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for ErrorScreen {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}
