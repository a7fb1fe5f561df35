//! Command registry: name to handler lookup with a fallback.

use futures_util::future::BoxFuture;
use std::collections::HashMap;

use super::handlers;
use super::slash::SlashCommand;
use super::types::CommandContext;

/// A command handler. Failures are reported to the user through
/// [`CommandContext::reply`], never returned.
pub type Handler = for<'a> fn(&'a CommandContext<'a>) -> BoxFuture<'a, ()>;

/// Central registry for all commands.
pub struct CommandRegistry {
    handlers: HashMap<&'static str, Handler>,
    fallback: Handler,
}

impl CommandRegistry {
    /// A registry with no commands. Every lookup hits the fallback.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: handlers::cmd_unknown,
        }
    }

    /// All built-in commands.
    pub fn builtin() -> Self {
        SlashCommand::builtins()
            .into_iter()
            .fold(Self::empty(), |registry, command| {
                registry.register(command.name(), handlers::handler_for(command))
            })
    }

    /// Add or replace the handler for `name`.
    pub fn register(mut self, name: &'static str, handler: Handler) -> Self {
        self.handlers.insert(name, handler);
        self
    }

    pub fn with_fallback(mut self, fallback: Handler) -> Self {
        self.fallback = fallback;
        self
    }

    /// Exact, case-sensitive match, otherwise the fallback.
    pub fn lookup(&self, name: &str) -> Handler {
        self.handlers.get(name).copied().unwrap_or(self.fallback)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
