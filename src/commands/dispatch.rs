//! Routes a tokenized command to its handler.

use std::sync::Arc;

use super::registry::CommandRegistry;
use super::slash::ParsedCommand;
use super::types::{CommandContext, Session};
use crate::rooms::Room;

pub struct Dispatcher {
    registry: CommandRegistry,
    session: Session,
}

impl Dispatcher {
    pub fn new(registry: CommandRegistry, session: Session) -> Self {
        Self { registry, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run exactly one handler for `name`, falling back for unknown names.
    ///
    /// Returns once the handler's own work is done. Anything it queued on the
    /// outbox completes later.
    pub async fn dispatch(&self, name: &str, args: Vec<String>, room: Option<Arc<Room>>) {
        self.dispatch_parsed(ParsedCommand::new(name, args), room)
            .await;
    }

    pub async fn dispatch_parsed(&self, command: ParsedCommand, room: Option<Arc<Room>>) {
        let handler = self.registry.lookup(&command.name);
        tracing::debug!(
            command = %command.name,
            args = ?command.args,
            room_id = room.as_ref().map(|r| r.id.as_str()),
            "dispatching command"
        );

        let ctx = CommandContext::new(command, room, &self.session);
        handler(&ctx).await;
    }

    /// Parse and dispatch a typed line. Returns false if it is not a command.
    pub async fn dispatch_line(&self, line: &str, room: Option<Arc<Room>>) -> bool {
        match ParsedCommand::parse(line) {
            Some(command) => {
                self.dispatch_parsed(command, room).await;
                true
            }
            None => false,
        }
    }
}
