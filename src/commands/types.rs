//! Command system types.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

use super::slash::ParsedCommand;
use crate::app::{Application, Ui};
use crate::client::ProtocolClient;
use crate::config::Config;
use crate::outbox::Outbox;
use crate::rooms::{Room, RoomList};

/// A status line posted back to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyLine {
    /// Room the command was issued in, if any
    pub room_id: Option<String>,
    pub text: String,
}

/// Long-lived collaborators shared by every command invocation.
#[derive(Clone)]
pub struct Session {
    pub app: Arc<dyn Application>,
    pub ui: Arc<dyn Ui>,
    pub rooms: Arc<RoomList>,
    pub client: Arc<dyn ProtocolClient>,
    pub config: Arc<Mutex<Config>>,
    pub outbox: Outbox,
    pub replies: mpsc::UnboundedSender<ReplyLine>,
}

impl Session {
    pub fn config(&self) -> MutexGuard<'_, Config> {
        self.config.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Everything a handler gets for one invocation. Built by the dispatcher
/// right before the call and dropped right after.
pub struct CommandContext<'a> {
    pub command: String,
    pub args: Vec<String>,
    /// Raw text after the command name, when the command came from a typed line
    raw: Option<String>,
    pub room: Option<Arc<Room>>,
    pub session: &'a Session,
}

impl<'a> CommandContext<'a> {
    pub fn new(parsed: ParsedCommand, room: Option<Arc<Room>>, session: &'a Session) -> Self {
        let ParsedCommand { name, args, raw } = parsed;
        Self {
            command: name,
            args,
            raw,
            room,
            session,
        }
    }

    /// Post a line into the current view.
    pub fn reply(&self, text: impl Into<String>) {
        let line = ReplyLine {
            room_id: self.room.as_ref().map(|r| r.id.clone()),
            text: text.into(),
        };
        let _ = self.session.replies.send(line);
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Argument text from position `index` to the end of the line.
    pub fn remainder(&self, index: usize) -> String {
        super::slash::remainder(self.raw.as_deref(), &self.args, index)
    }

    pub fn app(&self) -> &dyn Application {
        self.session.app.as_ref()
    }

    pub fn ui(&self) -> &dyn Ui {
        self.session.ui.as_ref()
    }

    pub fn client(&self) -> &dyn ProtocolClient {
        self.session.client.as_ref()
    }

    pub fn rooms(&self) -> &RoomList {
        &self.session.rooms
    }

    pub fn config(&self) -> MutexGuard<'_, Config> {
        self.session.config()
    }

    pub fn outbox(&self) -> &Outbox {
        &self.session.outbox
    }
}
