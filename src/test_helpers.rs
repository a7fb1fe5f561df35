use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use wiremock::matchers::{header, method, path, path_regex, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::app::{Application, Ui};
use crate::client::{ClientError, HomeserverClient, ProtocolClient};
use crate::commands::{CommandRegistry, Dispatcher, ReplyLine, Session};
use crate::config::{Config, Preferences};
use crate::outbox::{Outbox, OutboxTask};
use crate::rooms::{Room, RoomList};

pub const TEST_USER: &str = "@me:hs";
const TEST_TOKEN: &str = "token";

/// A homeserver that answers only the requests a test mounts.
pub struct MockHomeserver {
    pub server: MockServer,
}

impl MockHomeserver {
    pub async fn new() -> Self {
        let server = MockServer::start().await;
        Self { server }
    }

    /// A client already logged in as [`TEST_USER`].
    pub fn client(&self) -> HomeserverClient {
        let client = HomeserverClient::new(&self.server.uri()).unwrap();
        client.set_session(TEST_TOKEN, TEST_USER);
        client
    }

    pub async fn expect_path_regex(
        &self,
        http_method: &str,
        pattern: &str,
        status: u16,
        response_body: Value,
    ) {
        Mock::given(method(http_method))
            .and(path_regex(pattern))
            .respond_with(ResponseTemplate::new(status).set_body_json(&response_body))
            .mount(&self.server)
            .await;
    }

    pub async fn expect_query(
        &self,
        http_method: &str,
        exact_path: &str,
        (key, value): (&str, &str),
        response_body: Value,
    ) {
        Mock::given(method(http_method))
            .and(path(exact_path))
            .and(query_param(key, value))
            .and(header("authorization", format!("Bearer {}", TEST_TOKEN).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .mount(&self.server)
            .await;
    }

    /// Like `expect_query`, but the request must not carry `key` at all.
    pub async fn expect_without_query(
        &self,
        http_method: &str,
        exact_path: &str,
        key: &str,
        response_body: Value,
    ) {
        Mock::given(method(http_method))
            .and(path(exact_path))
            .and(query_param_is_missing(key))
            .and(header("authorization", format!("Bearer {}", TEST_TOKEN).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .expect(1)
            .mount(&self.server)
            .await;
    }
}

/// A protocol client call recorded by [`FakeClient`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Join {
        identifier: String,
        server_hint: Option<String>,
    },
    Leave(String),
    Message {
        room_id: String,
        event_type: String,
        content: Value,
    },
    State {
        room_id: String,
        event_type: String,
        state_key: String,
        content: Value,
    },
    Logout,
    Preferences(Preferences),
}

/// In-memory protocol client. Every call succeeds unless `fail_with` was used.
pub struct FakeClient {
    event_id: Mutex<String>,
    failure: Mutex<Option<ClientError>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self {
            event_id: Mutex::new("$event".to_string()),
            failure: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_event_id(&self, event_id: &str) {
        *self.event_id.lock().unwrap() = event_id.to_string();
    }

    pub fn fail_with(&self, error: ClientError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| !matches!(c, Call::Preferences(_)))
            .cloned()
            .collect()
    }

    pub fn sent_messages(&self) -> Vec<(String, String, Value)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                Call::Message {
                    room_id,
                    event_type,
                    content,
                } => Some((room_id.clone(), event_type.clone(), content.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn preference_syncs(&self) -> Vec<Preferences> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                Call::Preferences(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    fn record<T>(&self, call: Call, ok: T) -> Result<T, ClientError> {
        self.calls.lock().unwrap().push(call);
        match self.failure.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(ok),
        }
    }

    fn event_id(&self) -> String {
        self.event_id.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProtocolClient for FakeClient {
    fn user_id(&self) -> Option<String> {
        Some(TEST_USER.to_string())
    }

    async fn join_room(
        &self,
        identifier: &str,
        server_hint: Option<&str>,
    ) -> Result<Arc<Room>, ClientError> {
        let call = Call::Join {
            identifier: identifier.to_string(),
            server_hint: server_hint.map(str::to_string),
        };
        self.record(call, Arc::new(Room::new(identifier)))
    }

    async fn leave_room(&self, room_id: &str) -> Result<(), ClientError> {
        self.record(Call::Leave(room_id.to_string()), ())
    }

    async fn send_message_event(
        &self,
        room_id: &str,
        event_type: &str,
        content: &Value,
    ) -> Result<String, ClientError> {
        let call = Call::Message {
            room_id: room_id.to_string(),
            event_type: event_type.to_string(),
            content: content.clone(),
        };
        self.record(call, self.event_id())
    }

    async fn send_state_event(
        &self,
        room_id: &str,
        event_type: &str,
        state_key: &str,
        content: &Value,
    ) -> Result<String, ClientError> {
        let call = Call::State {
            room_id: room_id.to_string(),
            event_type: event_type.to_string(),
            state_key: state_key.to_string(),
            content: content.clone(),
        };
        self.record(call, self.event_id())
    }

    async fn logout(&self) -> Result<(), ClientError> {
        self.record(Call::Logout, ())
    }

    async fn send_preferences(&self, preferences: &Preferences) -> Result<(), ClientError> {
        self.record(Call::Preferences(*preferences), ())
    }
}

#[derive(Default)]
pub struct FakeUi {
    refreshes: AtomicUsize,
}

impl FakeUi {
    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

impl Ui for FakeUi {
    fn refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeApp {
    shutdowns: AtomicUsize,
    sessions_ended: AtomicUsize,
}

impl FakeApp {
    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub fn sessions_ended(&self) -> usize {
        self.sessions_ended.load(Ordering::SeqCst)
    }
}

impl Application for FakeApp {
    fn request_shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }

    fn end_session(&self) {
        self.sessions_ended.fetch_add(1, Ordering::SeqCst);
        self.request_shutdown();
    }
}

/// A dispatcher wired to fakes, with the reply and outbox queues left
/// undrained so tests can inspect them.
pub struct Fixture {
    pub client: Arc<FakeClient>,
    pub ui: Arc<FakeUi>,
    pub app: Arc<FakeApp>,
    pub rooms: Arc<RoomList>,
    pub config: Arc<Mutex<Config>>,
    pub dispatcher: Dispatcher,
    replies: mpsc::UnboundedReceiver<ReplyLine>,
    outbox: mpsc::UnboundedReceiver<OutboxTask>,
    _cache: tempfile::TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_registry(CommandRegistry::builtin())
    }

    pub fn with_registry(registry: CommandRegistry) -> Self {
        let cache = tempfile::tempdir().unwrap();
        let mut config = Config::new("https://hs");
        config.cache_dir = cache.path().join("parley");

        let client = Arc::new(FakeClient::new());
        let ui = Arc::new(FakeUi::default());
        let app = Arc::new(FakeApp::default());
        let rooms = Arc::new(RoomList::new());
        let config = Arc::new(Mutex::new(config));
        let (outbox, outbox_rx) = Outbox::new();
        let (replies_tx, replies_rx) = mpsc::unbounded_channel();

        let session = Session {
            app: app.clone(),
            ui: ui.clone(),
            rooms: rooms.clone(),
            client: client.clone(),
            config: config.clone(),
            outbox,
            replies: replies_tx,
        };

        Self {
            client,
            ui,
            app,
            rooms,
            config,
            dispatcher: Dispatcher::new(registry, session),
            replies: replies_rx,
            outbox: outbox_rx,
            _cache: cache,
        }
    }

    /// Create a room and put it in the room list.
    pub fn room(&self, room_id: &str) -> Arc<Room> {
        let room = Arc::new(Room::new(room_id));
        self.rooms.add_room(room.clone());
        room
    }

    pub fn reply_lines(&mut self) -> Vec<ReplyLine> {
        let mut lines = Vec::new();
        while let Ok(line) = self.replies.try_recv() {
            lines.push(line);
        }
        lines
    }

    pub fn replies(&mut self) -> Vec<String> {
        self.reply_lines().into_iter().map(|l| l.text).collect()
    }

    pub fn outbox_tasks(&mut self) -> Vec<OutboxTask> {
        let mut tasks = Vec::new();
        while let Ok(task) = self.outbox.try_recv() {
            tasks.push(task);
        }
        tasks
    }
}
