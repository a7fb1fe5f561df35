//! Room model, local echoes and the room list.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Delivery state of a message shown in the timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageState {
    Sending,
    Sent { event_id: String },
    Failed { reason: String },
}

/// A timeline entry. Local echoes start out as `Sending`.
#[derive(Debug, Clone)]
pub struct Message {
    /// Client-side identifier, stable across reconciliation
    pub local_id: String,
    pub msgtype: String,
    pub sender: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub state: MessageState,
}

impl Message {
    pub fn is_emote(&self) -> bool {
        self.msgtype == "m.emote"
    }
}

/// A joined room and the messages this client knows about.
#[derive(Debug)]
pub struct Room {
    pub id: String,
    messages: Mutex<Vec<Message>>,
}

impl Room {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Mutex::new(Vec::new()),
        }
    }

    fn timeline(&self) -> MutexGuard<'_, Vec<Message>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an optimistic local echo and return a copy of it.
    pub fn new_temp_message(&self, msgtype: &str, sender: &str, text: &str) -> Message {
        let message = Message {
            local_id: Uuid::new_v4().to_string(),
            msgtype: msgtype.to_string(),
            sender: sender.to_string(),
            text: text.to_string(),
            timestamp: Utc::now(),
            state: MessageState::Sending,
        };
        self.timeline().push(message.clone());
        message
    }

    /// Returns false if no message has this local id.
    pub fn mark_sent(&self, local_id: &str, event_id: &str) -> bool {
        self.set_state(
            local_id,
            MessageState::Sent {
                event_id: event_id.to_string(),
            },
        )
    }

    pub fn mark_failed(&self, local_id: &str, reason: &str) -> bool {
        self.set_state(
            local_id,
            MessageState::Failed {
                reason: reason.to_string(),
            },
        )
    }

    fn set_state(&self, local_id: &str, state: MessageState) -> bool {
        let mut timeline = self.timeline();
        match timeline.iter_mut().find(|m| m.local_id == local_id) {
            Some(message) => {
                message.state = state;
                true
            }
            None => false,
        }
    }

    pub fn message(&self, local_id: &str) -> Option<Message> {
        self.timeline().iter().find(|m| m.local_id == local_id).cloned()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.timeline().clone()
    }
}

/// Rooms shown in the room list, ordered by most recent join.
#[derive(Debug, Default)]
pub struct RoomList {
    rooms: Mutex<Vec<Arc<Room>>>,
}

impl RoomList {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<Room>>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a room, or move an already known one to the end of the list.
    /// A known room keeps its existing entry and timeline.
    pub fn add_room(&self, room: Arc<Room>) {
        let mut rooms = self.lock();
        let room = match rooms.iter().position(|r| r.id == room.id) {
            Some(index) => rooms.remove(index),
            None => room,
        };
        rooms.push(room);
    }

    pub fn remove_room(&self, room_id: &str) -> bool {
        let mut rooms = self.lock();
        let before = rooms.len();
        rooms.retain(|r| r.id != room_id);
        rooms.len() != before
    }

    pub fn contains(&self, room_id: &str) -> bool {
        self.lock().iter().any(|r| r.id == room_id)
    }

    /// Most recently added room
    pub fn latest(&self) -> Option<Arc<Room>> {
        self.lock().last().cloned()
    }

    pub fn rooms(&self) -> Vec<Arc<Room>> {
        self.lock().clone()
    }
}
