pub mod app;
pub mod auth;
pub mod client;
pub mod commands;
pub mod config;
pub mod outbox;
pub mod rooms;
pub mod terminal;

#[cfg(test)]
pub mod test_helpers;
