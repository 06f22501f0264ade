use anyhow::{Context, Result};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::io::{self, Stdout, Write};
use std::time::Duration;

use super::surface::{over, Surface};
use crate::player::controller::NowPlaying;

/// Player input decoded from the keyboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Toggle,
    Next,
    Quit,
}

pub fn command_for(code: KeyCode, modifiers: KeyModifiers) -> Option<Command> {
    match code {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Some(Command::Quit),
        KeyCode::Char(' ') | KeyCode::Char('p') | KeyCode::Enter => Some(Command::Toggle),
        KeyCode::Char('n') | KeyCode::Right => Some(Command::Next),
        KeyCode::Char('q') | KeyCode::Esc => Some(Command::Quit),
        _ => None,
    }
}

/// Pair surface rows into terminal cells: (upper pixel, lower pixel) per
/// column, drawn as an upper half block.
pub fn half_block_rows(surface: &Surface, background: [u8; 3]) -> Vec<Vec<([u8; 3], [u8; 3])>> {
    (0..surface.height().div_ceil(2))
        .map(|row| {
            let top_y = row * 2;
            (0..surface.width())
                .map(|x| {
                    let top = over(surface.pixel(x, top_y), background);
                    let bottom = if top_y + 1 < surface.height() {
                        over(surface.pixel(x, top_y + 1), background)
                    } else {
                        background
                    };
                    (top, bottom)
                })
                .collect()
        })
        .collect()
}

/// Filled progress bar of `width` cells.
pub fn progress_bar(percent: f32, width: usize) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * width as f32).round() as usize;
    let mut bar = "█".repeat(filled);
    bar.push_str(&"░".repeat(width - filled));
    bar
}

fn rgb(c: [u8; 3]) -> Color {
    Color::Rgb {
        r: c[0],
        g: c[1],
        b: c[2],
    }
}

/// Owns the terminal while the player runs: raw mode, alternate screen,
/// hidden cursor. Restored on drop.
pub struct TerminalPresenter {
    stdout: Stdout,
    background: [u8; 3],
}

impl TerminalPresenter {
    pub fn new(background: [u8; 3]) -> Result<Self> {
        enable_raw_mode().context("Failed to enable raw terminal mode")?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, Hide, terminal::Clear(terminal::ClearType::All))
            .context("Failed to enter alternate screen")?;
        Ok(Self { stdout, background })
    }

    /// Drain pending key presses without blocking.
    pub fn poll_commands(&mut self) -> Result<Vec<Command>> {
        let mut commands = Vec::new();
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if let Some(cmd) = command_for(key.code, key.modifiers) {
                    commands.push(cmd);
                }
            }
        }
        Ok(commands)
    }

    pub fn present(&mut self, surface: &Surface, now: &NowPlaying, notice: Option<&str>) -> Result<()> {
        let rows = half_block_rows(surface, self.background);
        for (y, row) in rows.iter().enumerate() {
            queue!(self.stdout, MoveTo(0, y as u16))?;
            for &(top, bottom) in row {
                queue!(
                    self.stdout,
                    SetForegroundColor(rgb(top)),
                    SetBackgroundColor(rgb(bottom)),
                    Print('▀')
                )?;
            }
            queue!(self.stdout, ResetColor)?;
        }

        let status_row = rows.len() as u16 + 1;
        let width = surface.width() as usize;
        queue!(
            self.stdout,
            MoveTo(0, status_row),
            terminal::Clear(terminal::ClearType::CurrentLine),
            Print(format!("{}  {}", now.icon.glyph(), now.title)),
            MoveTo(0, status_row + 1),
            terminal::Clear(terminal::ClearType::CurrentLine),
            Print(&now.artist),
            MoveTo(0, status_row + 2),
            Print(progress_bar(now.progress_percent, width)),
            MoveTo(0, status_row + 3),
            terminal::Clear(terminal::ClearType::CurrentLine),
            Print(notice.unwrap_or("space: play/pause   n: next   q: quit")),
        )?;
        self.stdout.flush()?;
        Ok(())
    }
}

impl Drop for TerminalPresenter {
    fn drop(&mut self) {
        let _ = execute!(self.stdout, ResetColor, Show, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_commands() {
        let none = KeyModifiers::NONE;
        assert_eq!(command_for(KeyCode::Char(' '), none), Some(Command::Toggle));
        assert_eq!(command_for(KeyCode::Char('n'), none), Some(Command::Next));
        assert_eq!(command_for(KeyCode::Right, none), Some(Command::Next));
        assert_eq!(command_for(KeyCode::Esc, none), Some(Command::Quit));
        assert_eq!(
            command_for(KeyCode::Char('c'), KeyModifiers::CONTROL),
            Some(Command::Quit)
        );
        assert_eq!(command_for(KeyCode::Char('x'), none), None);
    }

    #[test]
    fn transparent_pixels_show_background() {
        let surface = Surface::new(3, 3);
        let rows = half_block_rows(&surface, [10, 20, 30]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 3);
        assert_eq!(rows[1][0], ([10, 20, 30], [10, 20, 30]));
    }

    #[test]
    fn opaque_pixels_replace_background() {
        let mut surface = Surface::new(2, 2);
        surface.fill_rect(0.0, 1.0, 2.0, 1.0, [255, 0, 0, 255]);
        let rows = half_block_rows(&surface, [0, 0, 0]);
        assert_eq!(rows[0][1], ([0, 0, 0], [255, 0, 0]));
    }

    #[test]
    fn progress_bar_fills_proportionally() {
        assert_eq!(progress_bar(0.0, 4), "░░░░");
        assert_eq!(progress_bar(50.0, 4), "██░░");
        assert_eq!(progress_bar(250.0, 4), "████");
    }
}
