//! Session resolution.
//!
//! Sign-in itself lives in the external auth layer; the core only resolves
//! the `session_id` cookie to a user id and knows which cookie attributes
//! the auth layer should issue with.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

use super::error::ApiError;
use super::AppState;
use crate::config::SessionConfig;

const SESSION_COOKIE: &str = "session_id";

/// In-memory session-id to user-id mapping, populated by the auth layer.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session_id: &str, user_id: &str) {
        self.inner
            .lock()
            .unwrap()
            .insert(session_id.to_string(), user_id.to_string());
    }

    pub fn resolve(&self, session_id: &str) -> Option<String> {
        self.inner.lock().unwrap().get(session_id).cloned()
    }

    pub fn revoke(&self, session_id: &str) {
        self.inner.lock().unwrap().remove(session_id);
    }
}

/// Render the Set-Cookie value for a session with the configured attributes.
pub fn session_cookie(config: &SessionConfig, session_id: &str) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={session_id}; Path={}; SameSite={}",
        config.path, config.same_site
    );
    if config.http_only {
        cookie.push_str("; HttpOnly");
    }
    cookie
}

/// The authenticated user, extracted from the session cookie.
#[derive(Debug, Clone)]
pub struct UserId(pub String);

#[async_trait]
impl FromRequestParts<AppState> for UserId {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let cookies = parts
            .headers
            .get(header::COOKIE)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing session cookie"))?;

        let session_id = cookies
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == SESSION_COOKIE)
            .map(|(_, value)| value)
            .ok_or_else(|| ApiError::unauthorized("Missing session cookie"))?;

        state
            .sessions
            .resolve(session_id)
            .map(UserId)
            .ok_or_else(|| ApiError::unauthorized("Unknown or expired session"))
    }
}
