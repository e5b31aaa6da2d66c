//! Loosely-typed sessions and the session store seam.
//!
//! [`CookieSessionStore`] keeps the whole session in a signed cookie:
//! `base64url(json payload) "." base64url(mac)`, where the MAC is a blake3
//! keyed hash over the session name and the encoded payload, keyed by a
//! key derived from the configured secret.

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Secret;
use crate::error::SessionStoreError;

/// Browsers reject cookies much larger than this.
pub const MAX_COOKIE_LEN: usize = 4096;

const MAC_CONTEXT: &str = "scopeweb 2026-01-01 session cookie mac";

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A named bag of loosely-typed values plus a one-shot flash list.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    name: String,
    values: BTreeMap<String, Value>,
    flashes: Vec<String>,
    is_new: bool,
}

impl Session {
    /// A fresh, empty session.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeMap::new(),
            flashes: Vec::new(),
            is_new: true,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` if no valid stored session was found.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    #[must_use]
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Returns and clears the stored flash messages.
    pub fn take_flashes(&mut self) -> Vec<String> {
        std::mem::take(&mut self.flashes)
    }

    pub fn add_flash(&mut self, message: impl Into<String>) {
        self.flashes.push(message.into());
    }

    /// Replaces the stored flash messages.
    pub fn set_flashes(&mut self, flashes: Vec<String>) {
        self.flashes = flashes;
    }

    #[must_use]
    pub fn flashes(&self) -> &[String] {
        &self.flashes
    }
}

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

/// Durable session transport, keyed by the session cookie.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads the session named `name` from the request's cookie value.
    ///
    /// A missing or invalid cookie yields a new, empty session.
    async fn load(&self, name: &str, cookie: Option<&str>) -> Result<Session, SessionStoreError>;

    /// Persists `session` and returns the cookie value to send back.
    async fn save(&self, session: &Session) -> Result<String, SessionStoreError>;
}

#[derive(Serialize, Deserialize)]
struct Payload {
    #[serde(default)]
    values: BTreeMap<String, Value>,
    #[serde(default)]
    flashes: Vec<String>,
    issued_at: u64,
}

/// Stores the entire session in a signed cookie.
pub struct CookieSessionStore {
    key: [u8; 32],
    max_age: Option<Duration>,
}

impl CookieSessionStore {
    #[must_use]
    pub fn new(secret: &Secret, max_age: Option<Duration>) -> Self {
        if secret.expose().is_empty() {
            warn!("session secret is empty; cookies can be forged");
        }
        Self {
            key: blake3::derive_key(MAC_CONTEXT, secret.expose().as_bytes()),
            max_age,
        }
    }

    fn mac(&self, name: &str, payload: &str) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        hasher.update(name.as_bytes());
        hasher.update(b"|");
        hasher.update(payload.as_bytes());
        hasher.finalize()
    }

    fn encode_at(&self, session: &Session, issued_at: u64) -> Result<String, SessionStoreError> {
        let payload = Payload {
            values: session.values.clone(),
            flashes: session.flashes.clone(),
            issued_at,
        };
        let json = serde_json::to_vec(&payload).map_err(|source| SessionStoreError::Encode {
            name: session.name.clone(),
            source,
        })?;
        let encoded = URL_SAFE_NO_PAD.encode(json);
        let mac = self.mac(&session.name, &encoded);
        let value = format!("{encoded}.{}", URL_SAFE_NO_PAD.encode(mac.as_bytes()));

        let len = session.name.len() + 1 + value.len();
        if len > MAX_COOKIE_LEN {
            return Err(SessionStoreError::TooLarge {
                name: session.name.clone(),
                len,
                limit: MAX_COOKIE_LEN,
            });
        }
        Ok(value)
    }

    fn decode(&self, name: &str, cookie: &str, now: u64) -> Result<Payload, &'static str> {
        let (encoded, mac) = cookie.split_once('.').ok_or("missing signature")?;
        let mac: [u8; 32] = URL_SAFE_NO_PAD
            .decode(mac)
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or("malformed signature")?;
        // `blake3::Hash` equality is constant-time.
        if blake3::Hash::from(mac) != self.mac(name, encoded) {
            return Err("signature mismatch");
        }
        let json = URL_SAFE_NO_PAD.decode(encoded).map_err(|_| "malformed payload")?;
        let payload: Payload = serde_json::from_slice(&json).map_err(|_| "undecodable payload")?;
        if let Some(max_age) = self.max_age {
            if now.saturating_sub(payload.issued_at) > max_age.as_secs() {
                return Err("expired");
            }
        }
        Ok(payload)
    }
}

impl std::fmt::Debug for CookieSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieSessionStore")
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

#[async_trait]
impl SessionStore for CookieSessionStore {
    async fn load(&self, name: &str, cookie: Option<&str>) -> Result<Session, SessionStoreError> {
        let Some(cookie) = cookie else {
            debug!(session = name, "no session cookie, starting new session");
            return Ok(Session::new(name));
        };
        match self.decode(name, cookie, unix_now()) {
            Ok(payload) => Ok(Session {
                name: name.to_string(),
                values: payload.values,
                flashes: payload.flashes,
                is_new: false,
            }),
            Err(reason) => {
                warn!(session = name, reason, "discarding invalid session cookie");
                Ok(Session::new(name))
            }
        }
    }

    async fn save(&self, session: &Session) -> Result<String, SessionStoreError> {
        self.encode_at(session, unix_now())
    }
}
