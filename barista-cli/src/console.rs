//! Terminal rendering of conversation updates.

use barista_realtime::{ChatMessage, ConversationUpdate, Sender};
use chrono::Local;
use std::io::{self, Write};

const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// One thing to show for an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Printed once and kept in the scrollback.
    Permanent(String),
    /// Rewritten in place until a permanent line replaces it.
    Provisional(String),
}

/// Map an update to what the terminal shows, if anything.
pub fn render(update: &ConversationUpdate) -> Option<Line> {
    match update {
        ConversationUpdate::Status(status) => Some(Line::Permanent(format!("-- {} --", status))),
        ConversationUpdate::MessageAdded(message) | ConversationUpdate::MessageUpdated(message) => {
            if message.sealed {
                Some(Line::Permanent(format_message(message)))
            } else {
                Some(Line::Provisional(format!("{}: {}", speaker(message.sender), message.text)))
            }
        }
        ConversationUpdate::Transcript(text) if text.is_empty() => {
            Some(Line::Provisional(String::new()))
        }
        ConversationUpdate::Transcript(text) => {
            Some(Line::Provisional(format!("{}: {}... (recording)", speaker(Sender::User), text)))
        }
        ConversationUpdate::Cleared => None,
        ConversationUpdate::Muted(true) => Some(Line::Permanent("Speaker muted".to_string())),
        ConversationUpdate::Muted(false) => Some(Line::Permanent("Speaker unmuted".to_string())),
    }
}

pub fn format_message(message: &ChatMessage) -> String {
    let time = message.created_at.with_timezone(&Local).format("%H:%M:%S");
    let mut line = format!("[{}] {}: {}", time, speaker(message.sender), message.text);
    if let Some(waveform) = message.waveform.as_deref().filter(|w| !w.is_empty()) {
        line.push_str("  ");
        line.push_str(&sparkline(waveform));
    }
    line
}

/// Draw a normalized amplitude summary as block characters.
pub fn sparkline(levels: &[f32]) -> String {
    levels
        .iter()
        .map(|level| {
            let index = (level.clamp(0.0, 1.0) * (BARS.len() - 1) as f32).round() as usize;
            BARS[index]
        })
        .collect()
}

fn speaker(sender: Sender) -> &'static str {
    match sender {
        Sender::User => "You",
        Sender::Ai => "Arum",
        Sender::System => "System",
    }
}

/// Writes lines to stdout, keeping at most one provisional line at the bottom.
#[derive(Debug, Default)]
pub struct Console {
    provisional: bool,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self, update: &ConversationUpdate) -> io::Result<()> {
        let Some(line) = render(update) else {
            return Ok(());
        };
        let mut out = io::stdout().lock();
        if self.provisional {
            write!(out, "\r\x1b[2K")?;
        }
        match line {
            Line::Permanent(text) => {
                writeln!(out, "{}", text)?;
                self.provisional = false;
            }
            Line::Provisional(text) => {
                write!(out, "{}", text)?;
                self.provisional = !text.is_empty();
            }
        }
        out.flush()
    }
}
