//! Server-side credential jar scoped to one in-flight request.
//!
//! The jar is seeded from the incoming `Cookie` header. Writes and removals
//! are visible to later reads on the same jar and are recorded so that
//! [`RequestJarStore::finish`] can turn them into `Set-Cookie` header values
//! for the outgoing response. `finish` consumes the jar, which ends its life
//! together with the request.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{CredentialStore, Secret, SetOptions, StoreError};

/// A cookie as seen by the current request.
#[derive(Debug, Clone)]
struct JarCookie {
    value: Secret,
    /// `None` for cookies that arrived with the request; the client already
    /// enforced their expiry.
    expires_at: Option<DateTime<Utc>>,
}

impl JarCookie {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|exp| exp > now)
    }
}

/// A pending change to emit on the response.
#[derive(Debug, Clone)]
enum CookieChange {
    Set { value: Secret, max_age: i64 },
    Remove,
}

#[derive(Debug, Default)]
struct JarState {
    cookies: BTreeMap<String, JarCookie>,
    changes: BTreeMap<String, CookieChange>,
}

/// Request/response-scoped cookie jar.
#[derive(Debug)]
pub struct RequestJarStore {
    state: Mutex<JarState>,
    path: String,
    secure: bool,
}

impl RequestJarStore {
    /// Create an empty jar for a request that carried no cookies.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(JarState::default()),
            path: "/".to_string(),
            secure: false,
        }
    }

    /// Seed a jar from the raw value of an incoming `Cookie` header.
    ///
    /// Malformed pairs (no `=`, empty name) are skipped.
    pub fn from_cookie_header(header: Option<&str>) -> Self {
        let jar = Self::new();
        if let Some(header) = header {
            let mut state = jar.state.lock();
            for pair in header.split(';') {
                let Some((name, value)) = pair.trim().split_once('=') else {
                    continue;
                };
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                state.cookies.insert(
                    name.to_string(),
                    JarCookie {
                        value: Secret::new(value.trim().trim_matches('"')),
                        expires_at: None,
                    },
                );
            }
        }
        jar
    }

    /// Set the `Path` attribute of emitted cookies (default `/`).
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Mark emitted cookies `Secure`.
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Consume the jar and produce `Set-Cookie` header values for every key
    /// written or removed during the request, in key order.
    pub fn finish(self) -> Vec<String> {
        let state = self.state.into_inner();
        state
            .changes
            .into_iter()
            .map(|(name, change)| {
                let (value, max_age) = match &change {
                    CookieChange::Set { value, max_age } => (value.expose(), *max_age),
                    CookieChange::Remove => ("", 0),
                };
                let mut header = format!(
                    "{}={}; Path={}; Max-Age={}; SameSite=Lax",
                    name, value, self.path, max_age
                );
                if self.secure {
                    header.push_str("; Secure");
                }
                header
            })
            .collect()
    }
}

impl Default for RequestJarStore {
    fn default() -> Self {
        Self::new()
    }
}

/// RFC 6265 `cookie-octet`.
fn is_cookie_octet(c: char) -> bool {
    c.is_ascii_graphic() && !matches!(c, '"' | ',' | ';' | '\\')
}

/// RFC 7230 `token`, the grammar of a cookie name.
fn is_cookie_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| {
            c.is_ascii_graphic()
                && !matches!(
                    c,
                    '(' | ')' | '<' | '>' | '@' | ',' | ';' | ':' | '\\' | '"' | '/' | '[' | ']'
                        | '?' | '=' | '{' | '}'
                )
        })
}

#[async_trait]
impl CredentialStore for RequestJarStore {
    async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError> {
        let state = self.state.lock();
        Ok(state
            .cookies
            .get(key)
            .filter(|cookie| cookie.is_live(Utc::now()))
            .map(|cookie| cookie.value.clone()))
    }

    async fn set(&self, key: &str, value: &Secret, options: &SetOptions) -> Result<(), StoreError> {
        if !is_cookie_name(key) || !value.expose().chars().all(is_cookie_octet) {
            return Err(StoreError::InvalidValue {
                key: key.to_string(),
            });
        }

        let mut state = self.state.lock();
        state.cookies.insert(
            key.to_string(),
            JarCookie {
                value: value.clone(),
                expires_at: Some(options.expires_at()),
            },
        );
        state.changes.insert(
            key.to_string(),
            CookieChange::Set {
                value: value.clone(),
                max_age: options.ttl.num_seconds().max(0),
            },
        );
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        if !is_cookie_name(key) {
            return Err(StoreError::InvalidValue {
                key: key.to_string(),
            });
        }

        let mut state = self.state.lock();
        state.cookies.remove(key);
        state.changes.insert(key.to_string(), CookieChange::Remove);
        Ok(())
    }
}
