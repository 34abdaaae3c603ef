//! Main interactive screen: preview panel, level gauge, timer, artifact line.

use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};
use std::io::{stdout, Stdout};

use crate::artifact::Artifact;
use crate::capture::PreviewInfo;
use crate::session::{format_elapsed, RecordingState};
use crate::ui::gauge::gauge_spans;

/// User input command on the main screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// No key pressed, or an unrecognized key
    Continue,
    /// Start or stop recording (Space or 'r')
    ToggleRecording,
    /// Play back the last recording ('p')
    Play,
    /// Save the last recording to disk ('s')
    Save,
    /// Exit ('q', Escape, or Ctrl+C)
    Quit,
}

/// Read-only snapshot of the session rendered each frame.
pub struct SessionView<'a> {
    pub state: RecordingState,
    pub level: u8,
    pub elapsed: u64,
    pub preview: &'a PreviewInfo,
    pub artifact: Option<&'a Artifact>,
    pub recorder_available: bool,
    /// One-line status message shown under the artifact line.
    pub status: Option<&'a str>,
}

/// Terminal UI for the capture-and-record session.
pub struct RecordingScreen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl RecordingScreen {
    /// Creates the screen and enters alternate screen mode.
    ///
    /// # Errors
    /// - If the terminal cannot be initialized
    /// - If raw mode cannot be enabled
    pub fn new() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self { terminal })
    }

    /// Renders one frame of the session.
    ///
    /// # Errors
    /// - If terminal rendering fails
    pub fn render(&mut self, view: &SessionView<'_>) -> anyhow::Result<()> {
        self.terminal.draw(|frame| {
            let area = frame.area();
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Min(5),    // preview
                    Constraint::Length(3), // gauge + timer
                    Constraint::Length(2), // artifact + status
                    Constraint::Length(1), // footer
                ])
                .split(area);

            render_preview(frame, chunks[0], view);
            render_meter_row(frame, chunks[1], view);
            render_artifact_row(frame, chunks[2], view);
            render_footer(frame, chunks[3], view);
        })?;
        Ok(())
    }

    /// Polls for user input, mapping keys to session commands.
    ///
    /// # Errors
    /// - If event polling fails
    pub fn handle_input(&mut self) -> anyhow::Result<SessionCommand> {
        if event::poll(std::time::Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                return Ok(match key.code {
                    KeyCode::Char(' ') | KeyCode::Char('r') => {
                        tracing::debug!("Toggle recording requested");
                        SessionCommand::ToggleRecording
                    }
                    KeyCode::Char('p') => SessionCommand::Play,
                    KeyCode::Char('s') => SessionCommand::Save,
                    KeyCode::Char('q') | KeyCode::Esc => {
                        tracing::debug!("Quit requested");
                        SessionCommand::Quit
                    }
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        tracing::debug!("Ctrl+C pressed: quitting");
                        SessionCommand::Quit
                    }
                    _ => SessionCommand::Continue,
                });
            }
        }
        Ok(SessionCommand::Continue)
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

impl Drop for RecordingScreen {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

fn render_preview(frame: &mut Frame<'_>, area: Rect, view: &SessionView<'_>) {
    let title = if view.preview.mirrored {
        " Preview (mirrored) "
    } else {
        " Preview "
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(match view.state {
            RecordingState::Recording => Style::default().fg(Color::Red),
            RecordingState::Idle => Style::default().fg(Color::DarkGray),
        });

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!(
                "📷 {} @ {}x{}",
                view.preview.video_label, view.preview.width, view.preview.height
            ),
            Style::default().fg(Color::White),
        )),
        Line::from(Span::styled(
            format!("🎤 {}", view.preview.audio_label),
            Style::default().fg(Color::White),
        )),
    ];

    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(block);
    frame.render_widget(paragraph, area);
}

fn render_meter_row(frame: &mut Frame<'_>, area: Rect, view: &SessionView<'_>) {
    let mut spans = gauge_spans(view.level);
    spans.push(Span::raw("   "));
    match view.state {
        RecordingState::Recording => {
            spans.push(Span::styled("● REC ", Style::default().fg(Color::Red)));
            spans.push(Span::raw(format_elapsed(view.elapsed)));
        }
        RecordingState::Idle => {
            spans.push(Span::styled("  idle", Style::default().fg(Color::DarkGray)));
        }
    }

    let paragraph = Paragraph::new(Line::from(spans))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::NONE));
    frame.render_widget(paragraph, area);
}

fn render_artifact_row(frame: &mut Frame<'_>, area: Rect, view: &SessionView<'_>) {
    let mut lines = Vec::with_capacity(2);
    if let Some(artifact) = view.artifact {
        lines.push(Line::from(Span::raw(format!(
            "Last recording: {} ({} bytes, {})",
            artifact.reference(),
            artifact.size(),
            artifact.mime()
        ))));
    } else if !view.recorder_available {
        lines.push(Line::from(Span::styled(
            "Recording unavailable: no supported format",
            Style::default().fg(Color::Yellow),
        )));
    } else {
        lines.push(Line::from(Span::styled(
            "No recording yet",
            Style::default().fg(Color::DarkGray),
        )));
    }
    if let Some(status) = view.status {
        lines.push(Line::from(Span::styled(
            status,
            Style::default().fg(Color::Cyan),
        )));
    }

    let paragraph = Paragraph::new(lines).alignment(Alignment::Center);
    frame.render_widget(paragraph, area);
}

fn render_footer(frame: &mut Frame<'_>, area: Rect, view: &SessionView<'_>) {
    let help = match view.state {
        RecordingState::Recording => "space stop · q quit",
        RecordingState::Idle if view.artifact.is_some() => {
            "space record · p play · s save · q quit"
        }
        RecordingState::Idle => "space record · q quit",
    };
    let footer = Paragraph::new(Line::from(Span::raw(help)))
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    frame.render_widget(footer, area);
}
