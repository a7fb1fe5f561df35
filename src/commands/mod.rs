//! Slash command interpreter.
//!
//! Turns a typed `/command arg1 arg2 ...` line into an action against the
//! session: room membership, event submission, display toggles, shutdown.
//!
//! # Architecture
//!
//! - `types`: Per-invocation context, reply lines and the shared session
//! - `slash`: Built-in command names and line parsing
//! - `registry`: Name to handler lookup with a fallback
//! - `handlers`: The built-in handlers
//! - `dispatch`: Builds a context and runs one handler

mod dispatch;
mod handlers;
mod registry;
mod slash;
mod types;

pub use dispatch::Dispatcher;
pub use handlers::parse_content;
pub use registry::{CommandRegistry, Handler};
pub use slash::{ParsedCommand, SlashCommand};
pub use types::{CommandContext, ReplyLine, Session};
