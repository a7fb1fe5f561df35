//! Protocol client: the homeserver operations the command layer relies on.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::Preferences;
use crate::rooms::Room;

/// Account data type the display preferences are stored under.
pub const PREFERENCES_EVENT_TYPE: &str = "io.parley.preferences";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    NotLoggedIn,
    InvalidUrl(String),
    Network(String),
    Server {
        status: u16,
        errcode: String,
        message: String,
    },
    InvalidResponse(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::NotLoggedIn => write!(f, "Not logged in"),
            ClientError::InvalidUrl(url) => write!(f, "Invalid homeserver URL: {}", url),
            ClientError::Network(msg) => write!(f, "Network error: {}", msg),
            ClientError::Server {
                status,
                errcode,
                message,
            } => write!(f, "{} (HTTP {}): {}", errcode, status, message),
            ClientError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {}

/// Homeserver operations used by the command handlers and the outbox.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    /// Logged-in user, used as the sender of local echoes.
    fn user_id(&self) -> Option<String>;

    async fn join_room(
        &self,
        identifier: &str,
        server_hint: Option<&str>,
    ) -> Result<Arc<Room>, ClientError>;

    async fn leave_room(&self, room_id: &str) -> Result<(), ClientError>;

    /// Returns the event id assigned by the server.
    async fn send_message_event(
        &self,
        room_id: &str,
        event_type: &str,
        content: &Value,
    ) -> Result<String, ClientError>;

    /// Returns the event id assigned by the server.
    async fn send_state_event(
        &self,
        room_id: &str,
        event_type: &str,
        state_key: &str,
        content: &Value,
    ) -> Result<String, ClientError>;

    async fn logout(&self) -> Result<(), ClientError>;

    async fn send_preferences(&self, preferences: &Preferences) -> Result<(), ClientError>;
}

#[derive(Debug, Clone)]
struct Credentials {
    access_token: String,
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    errcode: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JoinResponse {
    room_id: String,
}

#[derive(Debug, Deserialize)]
struct EventResponse {
    event_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user_id: String,
    #[serde(default)]
    pub device_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    identifier: Value,
    password: &'a str,
    initial_device_display_name: &'static str,
}

/// Client-server API (r0) over HTTP.
pub struct HomeserverClient {
    http: Client,
    base_url: Url,
    credentials: RwLock<Option<Credentials>>,
    txn_counter: AtomicU64,
}

impl HomeserverClient {
    pub fn new(homeserver: &str) -> Result<Self, ClientError> {
        let base_url =
            Url::parse(homeserver).map_err(|_| ClientError::InvalidUrl(homeserver.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(homeserver.to_string()));
        }

        Ok(Self {
            http: Client::new(),
            base_url,
            credentials: RwLock::new(None),
            txn_counter: AtomicU64::new(0),
        })
    }

    pub fn set_session(&self, access_token: &str, user_id: &str) {
        *self.credentials.write().unwrap_or_else(PoisonError::into_inner) = Some(Credentials {
            access_token: access_token.to_string(),
            user_id: user_id.to_string(),
        });
    }

    pub fn is_logged_in(&self) -> bool {
        self.credentials().is_some()
    }

    fn credentials(&self) -> Option<Credentials> {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn clear_session(&self) {
        *self.credentials.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Password login. The returned token is kept for subsequent requests.
    pub async fn login(&self, user: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let url = self.endpoint(&["login"])?;
        let body = LoginRequest {
            kind: "m.login.password",
            identifier: json!({ "type": "m.id.user", "user": user }),
            password,
            initial_device_display_name: "parley",
        };

        let response: LoginResponse = self.execute(self.http.post(url).json(&body)).await?;
        self.set_session(&response.access_token, &response.user_id);
        tracing::info!(user_id = %response.user_id, "logged in");
        Ok(response)
    }

    /// Build `<base>/_matrix/client/r0/<segments...>`, encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["_matrix", "client", "r0"])
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, method: Method, url: Url) -> Result<RequestBuilder, ClientError> {
        let credentials = self.credentials().ok_or(ClientError::NotLoggedIn)?;
        Ok(self
            .http
            .request(method, url)
            .bearer_auth(credentials.access_token))
    }

    fn next_txn_id(&self) -> String {
        let n = self.txn_counter.fetch_add(1, Ordering::Relaxed);
        format!("parley{}.{}", Utc::now().timestamp_millis(), n)
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(Self::map_server_error(status.as_u16(), &text));
        }

        serde_json::from_str(&text)
            .map_err(|e| ClientError::InvalidResponse(format!("{} - Response: {}", e, text)))
    }

    fn map_server_error(status: u16, body: &str) -> ClientError {
        let parsed: Option<ErrorResponse> = serde_json::from_str(body).ok();
        let (errcode, message) = match parsed {
            Some(err) => (
                err.errcode.unwrap_or_else(|| "M_UNKNOWN".to_string()),
                err.error.unwrap_or_default(),
            ),
            None => ("M_UNKNOWN".to_string(), body.to_string()),
        };
        ClientError::Server {
            status,
            errcode,
            message,
        }
    }
}

#[async_trait]
impl ProtocolClient for HomeserverClient {
    fn user_id(&self) -> Option<String> {
        self.credentials().map(|c| c.user_id)
    }

    async fn join_room(
        &self,
        identifier: &str,
        server_hint: Option<&str>,
    ) -> Result<Arc<Room>, ClientError> {
        let mut url = self.endpoint(&["join", identifier])?;
        if let Some(server) = server_hint.filter(|s| !s.is_empty()) {
            url.query_pairs_mut().append_pair("server_name", server);
        }

        let response: JoinResponse = self
            .execute(self.authorized(Method::POST, url)?.json(&json!({})))
            .await?;
        tracing::debug!(room_id = %response.room_id, identifier, "joined room");
        Ok(Arc::new(Room::new(response.room_id)))
    }

    async fn leave_room(&self, room_id: &str) -> Result<(), ClientError> {
        let url = self.endpoint(&["rooms", room_id, "leave"])?;
        let _: Value = self
            .execute(self.authorized(Method::POST, url)?.json(&json!({})))
            .await?;
        Ok(())
    }

    async fn send_message_event(
        &self,
        room_id: &str,
        event_type: &str,
        content: &Value,
    ) -> Result<String, ClientError> {
        let txn_id = self.next_txn_id();
        let url = self.endpoint(&["rooms", room_id, "send", event_type, &txn_id])?;
        let response: EventResponse = self
            .execute(self.authorized(Method::PUT, url)?.json(content))
            .await?;
        Ok(response.event_id)
    }

    async fn send_state_event(
        &self,
        room_id: &str,
        event_type: &str,
        state_key: &str,
        content: &Value,
    ) -> Result<String, ClientError> {
        let url = self.endpoint(&["rooms", room_id, "state", event_type, state_key])?;
        let response: EventResponse = self
            .execute(self.authorized(Method::PUT, url)?.json(content))
            .await?;
        Ok(response.event_id)
    }

    async fn logout(&self) -> Result<(), ClientError> {
        let url = self.endpoint(&["logout"])?;
        let _: Value = self
            .execute(self.authorized(Method::POST, url)?.json(&json!({})))
            .await?;
        self.clear_session();
        Ok(())
    }

    async fn send_preferences(&self, preferences: &Preferences) -> Result<(), ClientError> {
        let user_id = self.user_id().ok_or(ClientError::NotLoggedIn)?;
        let url = self.endpoint(&["user", &user_id, "account_data", PREFERENCES_EVENT_TYPE])?;
        let _: Value = self
            .execute(self.authorized(Method::PUT, url)?.json(preferences))
            .await?;
        Ok(())
    }
}
