//! Line-mode terminal front end: the `Ui` and `Application` the binary uses.

use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::app::{Application, Ui};
use crate::auth;
use crate::config::Preferences;
use crate::rooms::{Message, MessageState, Room};

/// Redraws are deferred: `refresh` only marks the view dirty.
#[derive(Debug, Default)]
pub struct TerminalUi {
    dirty: AtomicBool,
}

impl TerminalUi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once per batch of refresh requests.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }
}

impl Ui for TerminalUi {
    fn refresh(&self) {
        self.dirty.store(true, Ordering::Release);
    }
}

#[derive(Debug, Default)]
pub struct AppControl {
    quit: AtomicBool,
}

impl AppControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn should_quit(&self) -> bool {
        self.quit.load(Ordering::Acquire)
    }
}

impl Application for AppControl {
    fn request_shutdown(&self) {
        tracing::info!("shutdown requested");
        self.quit.store(true, Ordering::Release);
    }

    fn end_session(&self) {
        if let Err(e) = auth::delete_token() {
            tracing::warn!(error = %e, "could not remove stored token");
        }
        self.request_shutdown();
    }
}

/// Prints timeline messages that are new or changed state since the last render.
#[derive(Debug, Default)]
pub struct Renderer {
    /// Room id to rendered message states, by local id
    seen: HashMap<String, HashMap<String, MessageState>>,
    last_rooms: Vec<String>,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_lines(&mut self, room: &Room, preferences: &Preferences) -> Vec<String> {
        let seen = self.seen.entry(room.id.clone()).or_default();
        let mut lines = Vec::new();
        for message in room.messages() {
            if seen.get(&message.local_id) == Some(&message.state) {
                continue;
            }
            lines.push(format_message(&message, preferences.bare_message_view));
            seen.insert(message.local_id.clone(), message.state);
        }
        lines
    }

    /// Room list summary, only when membership changed and the list is shown.
    /// Rooms no longer in the list are forgotten.
    pub fn room_list_line(&mut self, room_ids: Vec<String>, preferences: &Preferences) -> Option<String> {
        if room_ids == self.last_rooms {
            return None;
        }
        self.seen.retain(|room_id, _| room_ids.contains(room_id));
        self.last_rooms = room_ids;
        if preferences.hide_room_list {
            return None;
        }
        Some(format!("Rooms: {}", self.last_rooms.join(", ")))
    }
}

pub fn format_message(message: &Message, bare: bool) -> String {
    let body = if message.is_emote() {
        format!("* {} {}", message.sender, message.text)
    } else {
        format!("<{}> {}", message.sender, message.text)
    };
    let body = if bare {
        body
    } else {
        format!("[{}] {}", message.timestamp.format("%H:%M"), body)
    };

    match &message.state {
        MessageState::Sending => format!("{} (sending)", body),
        MessageState::Sent { .. } => body,
        MessageState::Failed { reason } => format!("{} (failed: {})", body, reason),
    }
}

pub fn print_colored_message(message: &str, color: Color) {
    let mut stdout = io::stdout();
    if let Err(e) = execute!(stdout, SetForegroundColor(color), Print(message), ResetColor) {
        tracing::warn!(error = %e, "failed to write to terminal");
    }
}
