//! Scripted in-memory [`Communication`] for tests
//!
//! Replies are registered per `(method, path)`. Each request pops the next
//! queued reply; the last reply for a route is sticky so a route answered once
//! keeps answering the same way. Unscripted routes fail with
//! `ContentNotFound`, like a server that has never heard of the path.
//!
//! Every request is recorded together with the authentication mode that was
//! active when it was issued, so tests can assert on request counts and mode
//! transitions.
//!
//! ```rust,ignore
//! use couchctl_core::testing::{MockCommunication, MockReply};
//! use couchctl_core::Connection;
//! use reqwest::Method;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let mock = Arc::new(MockCommunication::new());
//! mock.reply(Method::GET, "/_all_dbs", MockReply::Json(json!(["_users", "reports"])));
//!
//! let conn = Connection::with_communication(mock.clone());
//! assert_eq!(conn.list_db_names().await?, vec!["reports"]);
//! assert_eq!(mock.request_count(), 1);
//! ```

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::auth::AuthMode;
use crate::communication::Communication;
use crate::error::{CouchError, Result};
use crate::user::User;

/// A canned answer for one request
#[derive(Debug, Clone)]
pub enum MockReply {
    /// 2xx (or non-fatal 4xx) with a JSON body
    Json(Value),
    /// 2xx with no body
    Empty,
    /// 404
    NotFound,
    /// 401
    Unauthorized(String),
    /// 5xx
    ServerError(u16, String),
}

/// One request seen by the mock
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub auth_mode: AuthMode,
}

#[derive(Debug)]
struct MockState {
    server_url: String,
    user: User,
    auth_mode: AuthMode,
    timeout: Option<Duration>,
    routes: HashMap<(Method, String), VecDeque<MockReply>>,
    requests: Vec<RecordedRequest>,
}

#[derive(Debug)]
pub struct MockCommunication {
    state: Mutex<MockState>,
}

impl Default for MockCommunication {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCommunication {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                server_url: "http://localhost:5984".to_string(),
                user: User::default(),
                auth_mode: AuthMode::None,
                timeout: None,
                routes: HashMap::new(),
                requests: Vec::new(),
            }),
        }
    }

    /// A mock with credentials and an initial mode
    pub fn with_auth(user: User, mode: AuthMode) -> Self {
        let mock = Self::new();
        {
            let mut state = mock.state();
            state.user = user;
            state.auth_mode = mode;
        }
        mock
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a reply for `method path`
    pub fn reply(&self, method: Method, path: &str, reply: MockReply) {
        self.state()
            .routes
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state().requests.len()
    }

    /// `(method, path)` of every request, in order
    pub fn request_lines(&self) -> Vec<(Method, String)> {
        self.state()
            .requests
            .iter()
            .map(|r| (r.method.clone(), r.path.clone()))
            .collect()
    }
}

#[async_trait]
impl Communication for MockCommunication {
    async fn issue(
        &self,
        path: &str,
        method: Method,
        body: Option<Value>,
        tolerate_empty: bool,
    ) -> Result<Value> {
        let reply = {
            let mut state = self.state();
            let auth_mode = state.auth_mode;
            state.requests.push(RecordedRequest {
                method: method.clone(),
                path: path.to_string(),
                body,
                auth_mode,
            });

            match state.routes.get_mut(&(method, path.to_string())) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match reply {
            Some(MockReply::Json(value)) => Ok(value),
            Some(MockReply::Empty) if tolerate_empty => Ok(Value::Null),
            Some(MockReply::Empty) => Err(CouchError::BadResponse(format!(
                "empty response body from {}",
                path
            ))),
            Some(MockReply::Unauthorized(reason)) => Err(CouchError::Unauthorized { reason }),
            Some(MockReply::ServerError(status, reason)) => {
                Err(CouchError::Server { status, reason })
            }
            Some(MockReply::NotFound) | None => Err(CouchError::ContentNotFound {
                path: path.to_string(),
            }),
        }
    }

    fn auth_mode(&self) -> AuthMode {
        self.state().auth_mode
    }

    fn set_auth_mode(&self, mode: AuthMode) {
        self.state().auth_mode = mode;
    }

    fn user(&self) -> User {
        self.state().user.clone()
    }

    fn set_user(&self, user: User) {
        self.state().user = user;
    }

    fn server_url(&self) -> String {
        self.state().server_url.clone()
    }

    fn set_server_url(&self, url: &str) -> Result<()> {
        self.state().server_url = url.trim_end_matches('/').to_string();
        Ok(())
    }

    fn timeout(&self) -> Option<Duration> {
        self.state().timeout
    }

    fn set_timeout(&self, timeout: Option<Duration>) {
        self.state().timeout = timeout;
    }
}
