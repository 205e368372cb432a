//! Signed cookie session.
//!
//! The whole session lives client-side in one cookie. Its value is
//! `base64url(json) "." hex(hmac_sha256(base64url(json)))`, so the server
//! never trusts a payload it did not sign. Handlers load a `SessionCookie`,
//! mutate it as a plain value and hand it back to [`SessionStore::commit`]
//! to produce the `Set-Cookie` header.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use std::collections::BTreeMap;

use crate::config::SessionConfig;

type HmacSha256 = Hmac<Sha256>;

/// Email staged by signup, consumed by onboarding
pub const PENDING_EMAIL_KEY: &str = "onboardingEmail";
/// One-shot error message from a failed auth step
pub const AUTH_ERROR_KEY: &str = "auth:error";
/// Id of the authenticated login session
pub const SESSION_ID_KEY: &str = "sessionId";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to serialize session: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid session signing key")]
    Signing,
    #[error("invalid cookie expiration: {0}")]
    Expiry(DateTime<Utc>),
}

/// Mutable snapshot of the session for a single request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionCookie {
    data: BTreeMap<String, Value>,
    modified: bool,
}

impl SessionCookie {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// String value under `key`, ignoring non-string values
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
        self.modified = true;
    }

    pub fn unset(&mut self, key: &str) {
        if self.data.remove(key).is_some() {
            self.modified = true;
        }
    }

    /// Remove and return a value, for flash-style keys read once.
    pub fn take(&mut self, key: &str) -> Option<Value> {
        let value = self.data.remove(key);
        if value.is_some() {
            self.modified = true;
        }
        value
    }

    /// Remove a flashed message. Stored either as a bare string or as
    /// `{ "message": ... }`.
    pub fn take_message(&mut self, key: &str) -> Option<String> {
        match self.take(key)? {
            Value::String(message) => Some(message),
            Value::Object(mut fields) => match fields.remove("message") {
                Some(Value::String(message)) => Some(message),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether anything changed since load
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// The staged signup email, if it is a non-empty string
    pub fn pending_email(&self) -> Option<&str> {
        self.get_str(PENDING_EMAIL_KEY).filter(|email| !email.is_empty())
    }

    pub fn session_id(&self) -> Option<&str> {
        self.get_str(SESSION_ID_KEY).filter(|id| !id.is_empty())
    }

    /// Same data, as if freshly loaded from a request
    #[cfg(test)]
    pub(crate) fn clone_unmodified(&self) -> Self {
        Self {
            data: self.data.clone(),
            modified: false,
        }
    }
}

/// Session state to sign and send back with the response.
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    pub cookie: SessionCookie,
    /// `None` keeps the cookie scoped to the browser session
    pub expires: Option<DateTime<Utc>>,
}

impl Commit {
    pub fn session_scoped(cookie: SessionCookie) -> Self {
        Self {
            cookie,
            expires: None,
        }
    }
}

/// Reads and writes `SessionCookie`s as signed cookies.
#[derive(Clone)]
pub struct SessionStore {
    cookie_name: String,
    secret: Vec<u8>,
    secure: bool,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            cookie_name: config.cookie_name.clone(),
            secret: config.secret.as_bytes().to_vec(),
            secure: config.secure,
        }
    }

    fn mac(&self) -> Option<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret).ok()
    }

    /// Load the session from the request cookies.
    ///
    /// A missing, tampered or undecodable cookie yields an empty session.
    pub fn load(&self, jar: &CookieJar) -> SessionCookie {
        let Some(cookie) = jar.get(&self.cookie_name) else {
            return SessionCookie::new();
        };
        match self.decode(cookie.value()) {
            Some(data) => SessionCookie {
                data,
                modified: false,
            },
            None => {
                tracing::warn!(cookie = %self.cookie_name, "Discarding invalid session cookie");
                SessionCookie::new()
            }
        }
    }

    fn decode(&self, value: &str) -> Option<BTreeMap<String, Value>> {
        let (payload, signature) = value.rsplit_once('.')?;
        let expected = hex::decode(signature).ok()?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        // Constant-time comparison
        mac.verify_slice(&expected).ok()?;

        let json = BASE64.decode(payload).ok()?;
        serde_json::from_slice(&json).ok()
    }

    fn encode(&self, session: &SessionCookie) -> Result<String, SessionError> {
        let json = serde_json::to_vec(&session.data)?;
        let payload = BASE64.encode(json);

        let mut mac = self.mac().ok_or(SessionError::Signing)?;
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", payload, signature))
    }

    /// Serialize and sign `session` into a cookie ready for `Set-Cookie`.
    ///
    /// Without `expires` the cookie lives for the browser session only.
    pub fn commit(
        &self,
        session: &SessionCookie,
        expires: Option<DateTime<Utc>>,
    ) -> Result<Cookie<'static>, SessionError> {
        let mut builder = Cookie::build((self.cookie_name.clone(), self.encode(session)?))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax);

        if let Some(at) = expires {
            let at_offset = time::OffsetDateTime::from_unix_timestamp(at.timestamp())
                .map_err(|_| SessionError::Expiry(at))?;
            builder = builder.expires(at_offset);
        }

        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn store() -> SessionStore {
        SessionStore::new(&SessionConfig {
            secret: "test-secret-test-secret".to_string(),
            ..SessionConfig::default()
        })
    }

    fn jar_with(cookie: Cookie<'static>) -> CookieJar {
        CookieJar::new().add(cookie)
    }

    #[test]
    fn test_missing_cookie_is_empty_session() {
        let session = store().load(&CookieJar::new());
        assert!(session.is_empty());
        assert!(!session.is_modified());
    }

    #[test]
    fn test_commit_then_load() {
        let store = store();
        let mut session = SessionCookie::new();
        session.set(PENDING_EMAIL_KEY, "m@example.com");
        assert!(session.is_modified());

        let cookie = store.commit(&session, None).unwrap();
        assert_eq!(cookie.name(), "kraatz_session");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert!(cookie.expires().is_none());

        let loaded = store.load(&jar_with(cookie));
        assert_eq!(loaded.pending_email(), Some("m@example.com"));
        assert!(!loaded.is_modified());
    }

    #[test]
    fn test_tampered_cookie_is_discarded() {
        let store = store();
        let mut session = SessionCookie::new();
        session.set(SESSION_ID_KEY, "abc");
        let cookie = store.commit(&session, None).unwrap();

        let forged_payload = BASE64.encode(br#"{"sessionId":"someone-else"}"#);
        let (_, signature) = cookie.value().rsplit_once('.').unwrap();
        let forged = Cookie::new("kraatz_session", format!("{}.{}", forged_payload, signature));

        assert!(store.load(&jar_with(forged)).is_empty());
        assert!(store
            .load(&jar_with(Cookie::new("kraatz_session", "garbage")))
            .is_empty());
    }

    #[test]
    fn test_cookie_signed_with_other_secret_is_discarded() {
        let other = SessionStore::new(&SessionConfig {
            secret: "another-secret".to_string(),
            ..SessionConfig::default()
        });
        let mut session = SessionCookie::new();
        session.set(PENDING_EMAIL_KEY, "m@example.com");
        let cookie = other.commit(&session, None).unwrap();

        assert!(store().load(&jar_with(cookie)).is_empty());
    }

    #[test]
    fn test_commit_with_expiration() {
        let at = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap();
        let cookie = store().commit(&SessionCookie::new(), Some(at)).unwrap();
        let expires = cookie.expires_datetime().unwrap();
        assert_eq!(expires.unix_timestamp(), at.timestamp());
    }

    #[test]
    fn test_take_clears_flash() {
        let mut session = SessionCookie::new();
        assert!(session.take(AUTH_ERROR_KEY).is_none());
        assert!(!session.is_modified());

        session.set(AUTH_ERROR_KEY, "Invalid username or password");
        let value = session.take(AUTH_ERROR_KEY).unwrap();
        assert_eq!(value.as_str(), Some("Invalid username or password"));
        assert!(!session.contains(AUTH_ERROR_KEY));
    }

    #[test]
    fn test_take_message_shapes() {
        let mut session = SessionCookie::new();
        session.set(AUTH_ERROR_KEY, "oops");
        assert_eq!(session.take_message(AUTH_ERROR_KEY).as_deref(), Some("oops"));

        session.set(AUTH_ERROR_KEY, serde_json::json!({ "message": "expired" }));
        assert_eq!(session.take_message(AUTH_ERROR_KEY).as_deref(), Some("expired"));

        session.set(AUTH_ERROR_KEY, 3);
        assert_eq!(session.take_message(AUTH_ERROR_KEY), None);
        assert!(!session.contains(AUTH_ERROR_KEY));
    }

    #[test]
    fn test_pending_email_rejects_empty_and_non_strings() {
        let mut session = SessionCookie::new();
        session.set(PENDING_EMAIL_KEY, "");
        assert_eq!(session.pending_email(), None);
        session.set(PENDING_EMAIL_KEY, 42);
        assert_eq!(session.pending_email(), None);
        session.set(PENDING_EMAIL_KEY, "m@example.com");
        assert_eq!(session.pending_email(), Some("m@example.com"));
    }

    #[test]
    fn test_unset_missing_key_is_not_a_modification() {
        let mut session = SessionCookie::new();
        session.unset(SESSION_ID_KEY);
        assert!(!session.is_modified());
    }
}
