use std::{io::stdout, path::PathBuf, time::Duration};

use crate::gui::error::GuiError;

use crossterm::{
    event::{self, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{
        block::{Position, Title},
        *,
    },
    Terminal,
};

/// The keys the selector reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorInput {
    /// Move the cursor up.
    Up,
    /// Move the cursor down.
    Down,
    /// Pick the device under the cursor.
    Select,
    /// Leave without picking.
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SelectorState {
    Browsing(usize),
    Chosen(usize),
    Cancelled,
}

fn advance(cursor: usize, n_ports: usize, input: SelectorInput) -> SelectorState {
    match input {
        SelectorInput::Down => SelectorState::Browsing((cursor + 1) % n_ports),
        SelectorInput::Up => SelectorState::Browsing((cursor + n_ports - 1) % n_ports),
        SelectorInput::Select => SelectorState::Chosen(cursor),
        SelectorInput::Quit => SelectorState::Cancelled,
    }
}

fn read_input() -> Result<Option<SelectorInput>, GuiError> {
    if !event::poll(Duration::from_millis(16))? {
        return Ok(None);
    }
    let event::Event::Key(key) = event::read()? else {
        return Ok(None);
    };
    if key.kind != KeyEventKind::Press {
        return Ok(None);
    }
    Ok(match key.code {
        KeyCode::Down => Some(SelectorInput::Down),
        KeyCode::Up => Some(SelectorInput::Up),
        KeyCode::Enter => Some(SelectorInput::Select),
        KeyCode::Char('q') | KeyCode::Esc => Some(SelectorInput::Quit),
        _ => None,
    })
}

/// Let the operator pick the serial port the ramp controller is plugged
/// into. Returns `None` if they quit, or if there is nothing to pick from.
pub fn device_selector(mut available_ports: Vec<PathBuf>) -> Result<Option<PathBuf>, GuiError> {
    let n_ports = available_ports.len();
    if n_ports == 0 {
        return Ok(None);
    }

    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.clear()?;

    let mut list_state = ListState::default().with_selected(Some(0));
    let mut state = SelectorState::Browsing(0);
    while let SelectorState::Browsing(cursor) = state {
        let title = Title::from(" Ramp Controller Port ".magenta().bold());
        let instructions = Title::from(Line::from(vec![
            " Navigate ".into(),
            "<Up>/<Down>".magenta().bold(),
            " Select ".into(),
            "<Enter>".magenta().bold(),
            " Quit ".into(),
            "<Q> ".magenta().bold(),
        ]));
        let block = Block::default()
            .title(title.alignment(Alignment::Center))
            .title(
                instructions
                    .alignment(Alignment::Center)
                    .position(Position::Bottom),
            )
            .borders(Borders::ALL);
        let port_names = available_ports.iter().map(|p| p.to_string_lossy());
        let list = List::new(port_names)
            .style(Style::default().fg(Color::White))
            .highlight_symbol(">>")
            .highlight_style(Style::default().fg(Color::Magenta))
            .block(block);
        list_state.select(Some(cursor));
        terminal.draw(|frame| {
            let area = frame.size();
            frame.render_stateful_widget(list, area, &mut list_state);
        })?;

        if let Some(input) = read_input()? {
            state = advance(cursor, n_ports, input);
        }
    }

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(match state {
        SelectorState::Chosen(i) => Some(available_ports.swap_remove(i)),
        _ => None,
    })
}
