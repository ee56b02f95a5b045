//! reqwest-backed [`Communication`]

use async_trait::async_trait;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

use crate::auth::AuthMode;
use crate::communication::Communication;
use crate::error::{CouchError, Result};
use crate::user::User;

/// User agent string for couchctl HTTP requests
pub const COUCHCTL_USER_AGENT: &str = concat!("couchctl/", env!("CARGO_PKG_VERSION"));

/// Name of the session cookie issued by `POST /_session`
const SESSION_COOKIE: &str = "AuthSession";

#[derive(Debug)]
struct SessionState {
    server_url: Url,
    user: User,
    auth_mode: AuthMode,
    session_cookie: Option<String>,
    timeout: Option<Duration>,
}

/// HTTP transport talking to a CouchDB server.
///
/// All mutable state sits behind a single mutex that is never held across
/// an await point.
#[derive(Debug)]
pub struct HttpCommunication {
    client: reqwest::Client,
    state: Mutex<SessionState>,
}

/// Builder for [`HttpCommunication`]
#[derive(Debug, Default)]
pub struct HttpCommunicationBuilder {
    base_url: Option<String>,
    user: User,
    auth_mode: AuthMode,
    timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl HttpCommunicationBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn user(mut self, user: User) -> Self {
        self.user = user;
        self
    }

    pub fn auth_mode(mut self, mode: AuthMode) -> Self {
        self.auth_mode = mode;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn build(self) -> Result<HttpCommunication> {
        let raw = self
            .base_url
            .unwrap_or_else(|| "http://localhost:5984".to_string());
        let server_url = parse_server_url(&raw)?;

        let client = reqwest::Client::builder()
            .user_agent(
                self.user_agent
                    .unwrap_or_else(|| COUCHCTL_USER_AGENT.to_string()),
            )
            .build()?;

        debug!("HTTP transport created for {}", server_url);
        Ok(HttpCommunication {
            client,
            state: Mutex::new(SessionState {
                server_url,
                user: self.user,
                auth_mode: self.auth_mode,
                session_cookie: None,
                timeout: self.timeout,
            }),
        })
    }
}

fn parse_server_url(raw: &str) -> Result<Url> {
    Url::parse(raw.trim_end_matches('/')).map_err(|source| CouchError::InvalidUrl {
        url: raw.to_string(),
        source,
    })
}

/// Pull `AuthSession=<value>` out of a `Set-Cookie` header value
fn session_cookie_value(header: &str) -> Option<&str> {
    let pair = header.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    (name.trim() == SESSION_COOKIE).then_some(value.trim())
}

/// Best-effort extraction of CouchDB's `reason` (or `error`) from an error body
fn error_reason(bytes: &[u8], status: StatusCode) -> String {
    serde_json::from_slice::<Value>(bytes)
        .ok()
        .and_then(|body| {
            body.get("reason")
                .or_else(|| body.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        })
}

impl HttpCommunication {
    pub fn builder() -> HttpCommunicationBuilder {
        HttpCommunicationBuilder::default()
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True while a session cookie is held
    pub fn has_session_cookie(&self) -> bool {
        self.state().session_cookie.is_some()
    }

    fn request(&self, path: &str, method: Method, body: Option<&Value>) -> reqwest::RequestBuilder {
        let state = self.state();
        let url = format!("{}{}", state.server_url.as_str().trim_end_matches('/'), path);

        debug!("{} {} (auth: {})", method, path, state.auth_mode);
        let mut builder = self.client.request(method, url);

        match state.auth_mode {
            AuthMode::None => {}
            AuthMode::Basic => {
                builder = builder.basic_auth(state.user.username(), Some(state.user.password()));
            }
            AuthMode::Cookie => {
                if let Some(cookie) = &state.session_cookie {
                    builder = builder.header(COOKIE, format!("{}={}", SESSION_COOKIE, cookie));
                } else {
                    trace!("Cookie auth requested but no session cookie is held");
                }
            }
        }

        if let Some(timeout) = state.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        builder
    }

    fn capture_session_cookie(&self, response: &reqwest::Response) {
        for header in response.headers().get_all(SET_COOKIE) {
            let Ok(header) = header.to_str() else {
                continue;
            };
            if let Some(value) = session_cookie_value(header) {
                let mut state = self.state();
                if value.is_empty() {
                    trace!("Server cleared the session cookie");
                    state.session_cookie = None;
                } else {
                    trace!("Captured session cookie");
                    state.session_cookie = Some(value.to_string());
                }
            }
        }
    }
}

#[async_trait]
impl Communication for HttpCommunication {
    async fn issue(
        &self,
        path: &str,
        method: Method,
        body: Option<Value>,
        tolerate_empty: bool,
    ) -> Result<Value> {
        let response = self.request(path, method, body.as_ref()).send().await?;
        self.capture_session_cookie(&response);

        let status = response.status();
        let bytes = response.bytes().await?;
        trace!("{} -> {} ({} bytes)", path, status, bytes.len());

        match status {
            StatusCode::NOT_FOUND => {
                return Err(CouchError::ContentNotFound {
                    path: path.to_string(),
                });
            }
            StatusCode::UNAUTHORIZED => {
                return Err(CouchError::Unauthorized {
                    reason: error_reason(&bytes, status),
                });
            }
            StatusCode::FORBIDDEN => {
                return Err(CouchError::Forbidden {
                    reason: error_reason(&bytes, status),
                });
            }
            s if s.is_server_error() => {
                return Err(CouchError::Server {
                    status: s.as_u16(),
                    reason: error_reason(&bytes, status),
                });
            }
            _ => {}
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return if tolerate_empty {
                Ok(Value::Null)
            } else {
                Err(CouchError::BadResponse(format!(
                    "empty response body from {}",
                    path
                )))
            };
        }

        Ok(serde_json::from_slice(&bytes)?)
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
        self.state().server_url.as_str().trim_end_matches('/').to_string()
    }

    fn set_server_url(&self, url: &str) -> Result<()> {
        let parsed = parse_server_url(url)?;
        let mut state = self.state();
        state.server_url = parsed;
        // A cookie from one server means nothing to another
        state.session_cookie = None;
        Ok(())
    }

    fn timeout(&self) -> Option<Duration> {
        self.state().timeout
    }

    fn set_timeout(&self, timeout: Option<Duration>) {
        self.state().timeout = timeout;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_value() {
        assert_eq!(
            session_cookie_value("AuthSession=YWRtaW46NUI; Version=1; Path=/; HttpOnly"),
            Some("YWRtaW46NUI")
        );
        assert_eq!(
            session_cookie_value("AuthSession=; Version=1; Path=/; HttpOnly"),
            Some("")
        );
        assert_eq!(session_cookie_value("other=1; Path=/"), None);
        assert_eq!(session_cookie_value("garbage"), None);
    }

    #[test]
    fn test_error_reason_prefers_reason_field() {
        let body = br#"{"error":"unauthorized","reason":"Name or password is incorrect."}"#;
        assert_eq!(
            error_reason(body, StatusCode::UNAUTHORIZED),
            "Name or password is incorrect."
        );
        assert_eq!(
            error_reason(br#"{"error":"forbidden"}"#, StatusCode::FORBIDDEN),
            "forbidden"
        );
        assert_eq!(
            error_reason(b"", StatusCode::INTERNAL_SERVER_ERROR),
            "Internal Server Error"
        );
    }

    #[test]
    fn test_builder_rejects_bad_url() {
        let err = HttpCommunication::builder()
            .base_url("not a url")
            .build()
            .unwrap_err();
        assert!(matches!(err, CouchError::InvalidUrl { .. }));
    }

    #[test]
    fn test_server_url_is_normalised() {
        let comm = HttpCommunication::builder()
            .base_url("http://localhost:5984/")
            .build()
            .unwrap();
        assert_eq!(comm.server_url(), "http://localhost:5984");

        comm.set_server_url("http://couch.example.com:6984/").unwrap();
        assert_eq!(comm.server_url(), "http://couch.example.com:6984");
    }

    #[test]
    fn test_state_accessors() {
        let comm = HttpCommunication::builder()
            .user(User::new("admin", "secret"))
            .auth_mode(AuthMode::Basic)
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        assert_eq!(comm.auth_mode(), AuthMode::Basic);
        assert_eq!(comm.user().username(), "admin");
        assert_eq!(comm.timeout(), Some(Duration::from_secs(5)));

        comm.set_auth_mode(AuthMode::Cookie);
        comm.set_timeout(None);
        assert_eq!(comm.auth_mode(), AuthMode::Cookie);
        assert_eq!(comm.timeout(), None);
        assert!(!comm.has_session_cookie());
    }
}
