//! Built-in command handlers.
//!
//! Every handler checks its arguments before touching anything. Usage
//! errors, parse errors and server errors all end up as a reply; nothing
//! is returned to the dispatcher.

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::Value;

use super::registry::Handler;
use super::slash::SlashCommand;
use super::types::CommandContext;
use crate::config::UiToggle;

const HELP_PLACEHOLDER: &str = "Known command. Don't try \"/help\" for help.";

pub fn handler_for(command: SlashCommand) -> Handler {
    match command {
        SlashCommand::Me => cmd_me,
        SlashCommand::Quit => cmd_quit,
        SlashCommand::ClearCache => cmd_clear_cache,
        SlashCommand::Help => cmd_help,
        SlashCommand::Leave => cmd_leave,
        SlashCommand::Join => cmd_join,
        SlashCommand::Send => cmd_send_event,
        SlashCommand::SetState => cmd_set_state,
        SlashCommand::UiToggle => cmd_ui_toggle,
        SlashCommand::Logout => cmd_logout,
    }
}

/// Parse event content. Any JSON value is accepted, not only objects.
pub fn parse_content(raw: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(raw)
}

pub fn cmd_unknown<'a>(ctx: &'a CommandContext<'a>) -> BoxFuture<'a, ()> {
    async move {
        ctx.reply(format!(
            "Unknown command \"{}\". Try \"/help\" for help.",
            ctx.command
        ));
    }
    .boxed()
}

pub fn cmd_me<'a>(ctx: &'a CommandContext<'a>) -> BoxFuture<'a, ()> {
    async move {
        let Some(room) = ctx.room.as_ref() else {
            ctx.reply("You must be in a room to use /me.");
            return;
        };

        let text = ctx.args.join(" ");
        let sender = ctx.client().user_id().unwrap_or_default();
        ctx.outbox().send_message(room, "m.emote", &sender, &text);
        ctx.ui().refresh();
    }
    .boxed()
}

pub fn cmd_quit<'a>(ctx: &'a CommandContext<'a>) -> BoxFuture<'a, ()> {
    async move {
        ctx.app().request_shutdown();
    }
    .boxed()
}

pub fn cmd_clear_cache<'a>(ctx: &'a CommandContext<'a>) -> BoxFuture<'a, ()> {
    async move {
        ctx.config().clear();
        ctx.app().request_shutdown();
    }
    .boxed()
}

pub fn cmd_help<'a>(ctx: &'a CommandContext<'a>) -> BoxFuture<'a, ()> {
    async move {
        ctx.reply(HELP_PLACEHOLDER);
    }
    .boxed()
}

pub fn cmd_leave<'a>(ctx: &'a CommandContext<'a>) -> BoxFuture<'a, ()> {
    async move {
        let Some(room) = ctx.room.as_ref() else {
            ctx.reply(SlashCommand::Leave.usage());
            return;
        };

        match ctx.client().leave_room(&room.id).await {
            Ok(()) => {
                ctx.rooms().remove_room(&room.id);
            }
            Err(e) => {
                tracing::warn!(room_id = %room.id, error = %e, "leave room failed");
                ctx.reply(format!("Failed to leave room: {}", e));
            }
        }
    }
    .boxed()
}

pub fn cmd_join<'a>(ctx: &'a CommandContext<'a>) -> BoxFuture<'a, ()> {
    async move {
        let Some(identifier) = ctx.arg(0) else {
            ctx.reply(SlashCommand::Join.usage());
            return;
        };
        let server = ctx.arg(1);

        match ctx.client().join_room(identifier, server).await {
            Ok(room) => ctx.rooms().add_room(room),
            Err(e) => {
                tracing::warn!(identifier, error = %e, "join room failed");
                ctx.reply(format!("Failed to join room: {}", e));
            }
        }
    }
    .boxed()
}

pub fn cmd_send_event<'a>(ctx: &'a CommandContext<'a>) -> BoxFuture<'a, ()> {
    async move {
        let [room_id, event_type, _, ..] = ctx.args.as_slice() else {
            ctx.reply(SlashCommand::Send.usage());
            return;
        };

        let raw_content = ctx.remainder(2);
        let content = match parse_content(&raw_content) {
            Ok(content) => content,
            Err(e) => {
                ctx.reply(format!("Failed to parse content: {}", e));
                return;
            }
        };

        tracing::debug!(%room_id, %event_type, %content, "sending event");
        match ctx.client().send_message_event(room_id, event_type, &content).await {
            Ok(event_id) => ctx.reply(format!("Event sent, ID: {}", event_id)),
            Err(e) => ctx.reply(format!("Error from server: {}", e)),
        }
    }
    .boxed()
}

pub fn cmd_set_state<'a>(ctx: &'a CommandContext<'a>) -> BoxFuture<'a, ()> {
    async move {
        let [room_id, event_type, state_key, _, ..] = ctx.args.as_slice() else {
            ctx.reply(SlashCommand::SetState.usage());
            return;
        };
        // `-` selects the default (empty) state key
        let state_key = if state_key == "-" { "" } else { state_key.as_str() };

        let raw_content = ctx.remainder(3);
        let content = match parse_content(&raw_content) {
            Ok(content) => content,
            Err(e) => {
                ctx.reply(format!("Failed to parse content: {}", e));
                return;
            }
        };

        tracing::debug!(%room_id, %event_type, state_key, %content, "sending state event");
        match ctx
            .client()
            .send_state_event(room_id, event_type, state_key, &content)
            .await
        {
            Ok(event_id) => ctx.reply(format!("State event sent, ID: {}", event_id)),
            Err(e) => ctx.reply(format!("Error from server: {}", e)),
        }
    }
    .boxed()
}

pub fn cmd_ui_toggle<'a>(ctx: &'a CommandContext<'a>) -> BoxFuture<'a, ()> {
    async move {
        let target = match ctx.args.as_slice() {
            [arg] => arg.parse::<UiToggle>().ok(),
            _ => None,
        };
        let Some(target) = target else {
            ctx.reply(SlashCommand::UiToggle.usage());
            return;
        };

        let preferences = {
            let mut config = ctx.config();
            config.preferences.toggle(target);
            config.preferences
        };
        ctx.ui().refresh();

        if !ctx.outbox().sync_preferences(preferences) {
            tracing::warn!("outbox closed, preferences not synced");
        }
    }
    .boxed()
}

pub fn cmd_logout<'a>(ctx: &'a CommandContext<'a>) -> BoxFuture<'a, ()> {
    async move {
        match ctx.client().logout().await {
            Ok(()) => {
                ctx.config().clear_session();
                ctx.reply("Logged out.");
                ctx.app().end_session();
            }
            Err(e) => {
                tracing::warn!(error = %e, "logout failed");
                ctx.reply(format!("Logout failed: {}", e));
            }
        }
    }
    .boxed()
}
