//! Background submission of work the command loop does not wait for.
//!
//! Handlers hand tasks to the [`Outbox`]; a single worker submits them in
//! order and reports the outcome back into the room timeline (for messages)
//! or the log (for preference sync).

use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::app::Ui;
use crate::client::ProtocolClient;
use crate::config::Preferences;
use crate::rooms::{Message, Room};

#[derive(Debug)]
pub enum OutboxTask {
    /// Submit the event behind a local echo.
    Message {
        room: Arc<Room>,
        local_id: String,
        event_type: String,
        content: Value,
    },
    /// Mirror display preferences to the account data store.
    Preferences(Preferences),
}

#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<OutboxTask>,
}

impl Outbox {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboxTask>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns false if the worker has stopped.
    pub fn submit(&self, task: OutboxTask) -> bool {
        self.tx.send(task).is_ok()
    }

    /// Show a local echo in `room` now and queue the actual send.
    pub fn send_message(&self, room: &Arc<Room>, msgtype: &str, sender: &str, text: &str) -> Message {
        let echo = room.new_temp_message(msgtype, sender, text);
        let task = OutboxTask::Message {
            room: Arc::clone(room),
            local_id: echo.local_id.clone(),
            event_type: "m.room.message".to_string(),
            content: json!({ "msgtype": msgtype, "body": text }),
        };

        if !self.submit(task) {
            tracing::warn!(room_id = %room.id, "outbox closed, message not sent");
            room.mark_failed(&echo.local_id, "outbox closed");
        }
        echo
    }

    pub fn sync_preferences(&self, preferences: Preferences) -> bool {
        self.submit(OutboxTask::Preferences(preferences))
    }
}

/// Process tasks until every [`Outbox`] handle is dropped.
pub async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<OutboxTask>,
    client: Arc<dyn ProtocolClient>,
    ui: Arc<dyn Ui>,
) {
    while let Some(task) = rx.recv().await {
        match task {
            OutboxTask::Message {
                room,
                local_id,
                event_type,
                content,
            } => {
                match client.send_message_event(&room.id, &event_type, &content).await {
                    Ok(event_id) => {
                        tracing::debug!(room_id = %room.id, %event_id, "message sent");
                        room.mark_sent(&local_id, &event_id);
                    }
                    Err(e) => {
                        tracing::warn!(room_id = %room.id, error = %e, "failed to send message");
                        room.mark_failed(&local_id, &e.to_string());
                    }
                }
                ui.refresh();
            }
            OutboxTask::Preferences(preferences) => {
                if let Err(e) = client.send_preferences(&preferences).await {
                    tracing::warn!(error = %e, "failed to sync preferences");
                }
            }
        }
    }
    tracing::debug!("outbox worker stopped");
}

pub fn spawn_worker(
    rx: mpsc::UnboundedReceiver<OutboxTask>,
    client: Arc<dyn ProtocolClient>,
    ui: Arc<dyn Ui>,
) -> JoinHandle<()> {
    tokio::spawn(run_worker(rx, client, ui))
}
