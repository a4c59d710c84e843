//! Cookie session storage
//!
//! Bridges the signed cookie on the wire and a [`Session`] in memory. Nothing
//! is kept on the server: `get_session` rebuilds the session from the request's
//! `Cookie` header and `commit_session` renders the `Set-Cookie` value that
//! carries it to the next request.

use salvo_core::http::cookie::{time::Duration, Cookie, CookieBuilder, SameSite as CookieSameSite};
use salvo_core::http::header::{HeaderMap, COOKIE};
use salvo_core::http::Request;
use serde::Serialize;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::HashMap;

use crate::config::{SameSite, SessionConfig, SessionOptions};
use crate::error::SessionError;
use crate::session::{Session, SessionPayload};
use crate::token::{JwtSigner, TokenSigner};

/// Anything that can expose the raw `Cookie` request header
pub trait CookieHeader {
    /// The raw header value, `None` if the request carries no cookies
    fn cookie_header(&self) -> Option<Cow<'_, str>>;
}

impl CookieHeader for str {
    fn cookie_header(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self))
    }
}

impl CookieHeader for String {
    fn cookie_header(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self.as_str()))
    }
}

impl CookieHeader for Option<&str> {
    fn cookie_header(&self) -> Option<Cow<'_, str>> {
        self.map(Cow::Borrowed)
    }
}

/// HTTP/2 clients may send one `Cookie` header per cookie; they are joined with `"; "`.
impl CookieHeader for HeaderMap {
    fn cookie_header(&self) -> Option<Cow<'_, str>> {
        let mut values = self.get_all(COOKIE).iter().filter_map(|v| v.to_str().ok());
        let first = values.next()?;
        match values.next() {
            None => Some(Cow::Borrowed(first)),
            Some(second) => {
                let mut joined = format!("{}; {}", first, second);
                for value in values {
                    joined.push_str("; ");
                    joined.push_str(value);
                }
                Some(Cow::Owned(joined))
            }
        }
    }
}

impl CookieHeader for Request {
    fn cookie_header(&self) -> Option<Cow<'_, str>> {
        self.headers().cookie_header()
    }
}

/// Split a `Cookie` header into `name -> value` pairs.
///
/// Pairs are separated by `"; "` and split on their first `=`, so values may
/// contain `=`. Pairs without `=` are skipped, a repeated name keeps its last
/// value, and percent-encoded values are decoded when they decode to UTF-8.
pub fn parse_cookie_header(raw: &str) -> HashMap<&str, Cow<'_, str>> {
    let mut cookies = HashMap::new();
    for pair in raw.split("; ") {
        if let Some((name, value)) = pair.split_once('=') {
            let value = urlencoding::decode(value).unwrap_or(Cow::Borrowed(value));
            cookies.insert(name, value);
        }
    }
    cookies
}

/// Merge `overlay` into `base`. Objects present on both sides merge recursively,
/// any other value from `overlay` replaces the one in `base`.
fn merge_into(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (key, value) in overlay {
        match value {
            Value::Object(incoming) => match base.get_mut(&key) {
                Some(Value::Object(existing)) => merge_into(existing, incoming),
                _ => {
                    base.insert(key, Value::Object(incoming));
                }
            },
            value => {
                base.insert(key, value);
            }
        }
    }
}

/// Signed cookie session storage
///
/// ```rust,ignore
/// let storage = CookieSessionStorage::new(SessionConfig::new("s"))
///     .with_default_data(&serde_json::json!({ "count": 0 }))?;
///
/// let mut session = storage.get_session(req);
/// session.update("count", |v: Option<i64>| v.unwrap_or(0) + 1)?;
/// res.add_header(SET_COOKIE, storage.commit_session(&session)?, true)?;
/// ```
pub struct CookieSessionStorage<S: TokenSigner = JwtSigner> {
    config: SessionConfig,
    signer: S,
}

impl CookieSessionStorage<JwtSigner> {
    /// Create a storage that signs sessions as HS256 JWTs.
    /// A configured `max_age` also becomes the token lifetime.
    pub fn new(config: SessionConfig) -> Self {
        let signer = JwtSigner::new().with_ttl(config.cookie.max_age);
        Self::with_signer(config, signer)
    }

    /// Create a storage from partial options merged over the defaults
    pub fn from_options(options: SessionOptions) -> Self {
        Self::new(SessionConfig::from_options(options))
    }
}

impl<S: TokenSigner> CookieSessionStorage<S> {
    /// Create a storage with a custom signing service
    pub fn with_signer(config: SessionConfig, signer: S) -> Self {
        if config.has_insecure_secret() {
            tracing::warn!(
                cookie = %config.cookie.name,
                "No session secret configured, cookies are signed with an insecure key. Set a secret before running in production."
            );
        }
        Self { config, signer }
    }

    /// Seed every session with `data`, which must serialize to a JSON object
    pub fn with_default_data<T: Serialize>(mut self, data: &T) -> Result<Self, SessionError> {
        match serde_json::to_value(data)? {
            Value::Object(map) => {
                self.config.default_data = map;
                Ok(self)
            }
            other => Err(SessionError::SerializationError(format!(
                "default session data must be a JSON object, got {}",
                other
            ))),
        }
    }

    /// The effective configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// A session with the default data underneath `data`
    fn fresh_session(&self, data: Map<String, Value>, flash: Map<String, Value>) -> Session {
        let mut merged = self.config.default_data.clone();
        merge_into(&mut merged, data);
        Session::new(merged, flash)
    }

    fn load(&self, token: &str) -> Result<SessionPayload, SessionError> {
        let claims = self.signer.verify(token, &self.config.cookie.secret)?;
        Ok(serde_json::from_value(claims)?)
    }

    /// Build the session for a request.
    ///
    /// A missing header, a missing or empty session cookie, or a token that
    /// fails verification all yield a fresh session with the default data.
    pub fn get_session<R: CookieHeader + ?Sized>(&self, request: &R) -> Session {
        let Some(raw) = request.cookie_header() else {
            return self.fresh_session(Map::new(), Map::new());
        };

        let cookies = parse_cookie_header(&raw);
        let token = match cookies.get(self.config.cookie.name.as_str()) {
            Some(token) if !token.is_empty() => token,
            _ => return self.fresh_session(Map::new(), Map::new()),
        };

        match self.load(token) {
            Ok(payload) => self.fresh_session(payload.data, payload.flash),
            Err(e) => {
                tracing::debug!(cookie = %self.config.cookie.name, "Rejected session cookie: {}", e);
                self.fresh_session(Map::new(), Map::new())
            }
        }
    }

    /// Sign the session and render the `Set-Cookie` header value
    pub fn commit_session(&self, session: &Session) -> Result<String, SessionError> {
        let claims = serde_json::to_value(session.to_json())?;
        let token = self.signer.sign(&claims, &self.config.cookie.secret)?;
        Ok(self.cookie_builder(token).build().to_string())
    }

    /// A `Set-Cookie` header value that makes the client drop the session cookie
    pub fn destroy_session(&self) -> String {
        self.cookie_builder(String::new())
            .max_age(Duration::ZERO)
            .build()
            .to_string()
    }

    fn cookie_builder(&self, value: String) -> CookieBuilder<'static> {
        let options = &self.config.cookie;

        let mut builder = Cookie::build((options.name.clone(), value)).path(options.path.clone());

        if let Some(domain) = options.domain.clone() {
            builder = builder.domain(domain);
        }
        if options.http_only {
            builder = builder.http_only(true);
        }
        if options.secure {
            builder = builder.secure(true);
        }
        if let Some(max_age) = options.max_age {
            builder = builder.max_age(Duration::seconds(i64::try_from(max_age).unwrap_or(i64::MAX)));
        }
        if let Some(same_site) = options.same_site {
            builder = builder.same_site(match same_site {
                SameSite::Strict => CookieSameSite::Strict,
                SameSite::Lax => CookieSameSite::Lax,
                SameSite::None => CookieSameSite::None,
            });
        }

        builder
    }
}

impl<S: TokenSigner + Clone> Clone for CookieSessionStorage<S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            signer: self.signer.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use salvo_core::http::header::HeaderValue;
    use serde_json::json;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    fn storage() -> CookieSessionStorage {
        CookieSessionStorage::new(SessionConfig::new("s"))
            .with_default_data(&json!({ "count": 0 }))
            .unwrap()
    }

    /// The `Cookie` header a browser would send back for a `Set-Cookie` value
    fn request_cookie(set_cookie: &str) -> &str {
        set_cookie.split("; ").next().unwrap()
    }

    #[test]
    fn test_counter_scenario() {
        let storage = storage();

        let mut session = storage.get_session(&HeaderMap::new());
        assert_eq!(session.data(), json!({ "count": 0 }).as_object().unwrap());

        session
            .update("count", |v: Option<i64>| v.unwrap_or(0) + 1)
            .unwrap();
        assert_eq!(session.get::<i64>("count"), Some(1));

        let set_cookie = storage.commit_session(&session).unwrap();
        assert!(set_cookie.starts_with("session_id="));
        assert!(set_cookie.ends_with("; Path=/"));

        let session = storage.get_session(request_cookie(&set_cookie));
        assert_eq!(session.get::<i64>("count"), Some(1));
    }

    #[test]
    fn test_round_trip_with_flash() {
        let storage = storage();
        let mut session = storage.get_session(&HeaderMap::new());
        session
            .set("user", json!({ "name": "alice", "roles": ["admin"] }))
            .set_flash("success", "let's go!");

        let set_cookie = storage.commit_session(&session).unwrap();
        let header = format!("theme=dark; {}; other=1", request_cookie(&set_cookie));
        let mut restored = storage.get_session(header.as_str());

        assert_eq!(restored.get_value("count"), Some(&json!(0)));
        assert_eq!(restored.get_value("user"), session.get_value("user"));
        assert_eq!(restored.flash("success"), Some(json!("let's go!")));
        assert_eq!(restored.flash("success"), None);
    }

    #[test]
    fn test_decoded_data_wins_over_defaults() {
        let storage = CookieSessionStorage::new(SessionConfig::new("s"))
            .with_default_data(&json!({ "count": 0, "theme": "light" }))
            .unwrap();
        let mut session = Session::default();
        session.set("count", 5);

        let set_cookie = storage.commit_session(&session).unwrap();
        let restored = storage.get_session(request_cookie(&set_cookie));

        assert_eq!(restored.get::<i64>("count"), Some(5));
        assert_eq!(restored.get::<String>("theme"), Some("light".to_string()));
    }

    #[test]
    fn test_nested_defaults_merge_with_decoded_data() {
        let storage = CookieSessionStorage::new(SessionConfig::new("s"))
            .with_default_data(&json!({
                "prefs": { "theme": "light", "lang": "en" },
                "tags": ["default"]
            }))
            .unwrap();
        let mut session = Session::default();
        session
            .set("prefs", json!({ "theme": "dark" }))
            .set("tags", json!(["mine"]));

        let set_cookie = storage.commit_session(&session).unwrap();
        let restored = storage.get_session(request_cookie(&set_cookie));

        assert_eq!(
            restored.get_value("prefs"),
            Some(&json!({ "theme": "dark", "lang": "en" }))
        );
        assert_eq!(restored.get_value("tags"), Some(&json!(["mine"])));
    }

    #[test]
    fn test_decoded_scalar_replaces_default_object() {
        let storage = CookieSessionStorage::new(SessionConfig::new("s"))
            .with_default_data(&json!({ "prefs": { "theme": "light" } }))
            .unwrap();
        let mut session = Session::default();
        session.set("prefs", Value::Null);

        let set_cookie = storage.commit_session(&session).unwrap();
        let restored = storage.get_session(request_cookie(&set_cookie));

        assert_eq!(restored.get_value("prefs"), Some(&Value::Null));
    }

    #[test]
    fn test_absent_cookie_yields_defaults() {
        let storage = storage();
        for header in [None, Some(""), Some("other=1"), Some("session_id="), Some("session_id")] {
            let session = storage.get_session(&header);
            assert_eq!(session.get::<i64>("count"), Some(0), "header {:?}", header);
            assert!(session.flashed_data().is_empty());
        }
    }

    #[test]
    fn test_tampered_token_yields_fresh_session() {
        let storage = storage();
        let mut session = storage.get_session(&HeaderMap::new());
        session.set("count", 42).set_flash("notice", "hi");
        let set_cookie = storage.commit_session(&session).unwrap();
        let token = request_cookie(&set_cookie)
            .strip_prefix("session_id=")
            .unwrap()
            .to_string();

        for i in 0..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();

            let restored = storage.get_session(format!("session_id={}", tampered).as_str());
            assert_eq!(restored.get::<i64>("count"), Some(0), "byte {} tampered", i);
            assert!(restored.flashed_data().is_empty());
        }
    }

    #[test]
    fn test_other_secret_is_rejected() {
        let set_cookie = storage().commit_session(&Session::default()).unwrap();
        let other = CookieSessionStorage::new(SessionConfig::new("other"));

        let session = other.get_session(request_cookie(&set_cookie));
        assert!(session.is_empty());
    }

    #[test]
    fn test_non_session_claims_are_rejected() {
        let storage = storage();
        let token = JwtSigner::new()
            .sign(&json!({ "data": [1, 2, 3] }), "s")
            .unwrap();

        let session = storage.get_session(format!("session_id={}", token).as_str());
        assert_eq!(session.data(), json!({ "count": 0 }).as_object().unwrap());
    }

    #[test]
    fn test_split_cookie_headers_are_joined() {
        let storage = storage();
        let mut session = Session::default();
        session.set("count", 7);
        let set_cookie = storage.commit_session(&session).unwrap();

        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(COOKIE, HeaderValue::from_str(request_cookie(&set_cookie)).unwrap());
        headers.append(COOKIE, HeaderValue::from_static("other=1"));

        assert_eq!(
            headers.cookie_header().as_deref(),
            Some(format!("theme=dark; {}; other=1", request_cookie(&set_cookie)).as_str())
        );
        assert_eq!(storage.get_session(&headers).get::<i64>("count"), Some(7));
    }

    #[test]
    fn test_parse_cookie_header() {
        let cookies = parse_cookie_header("a=1; b=x=y; c; a=2; d=hello%20world; e=%E0%A4%A");

        assert_eq!(cookies["a"], "2");
        assert_eq!(cookies["b"], "x=y");
        assert!(!cookies.contains_key("c"));
        assert_eq!(cookies["d"], "hello world");
        assert_eq!(cookies["e"], "%E0%A4%A");
    }

    #[test]
    fn test_custom_name_and_path() {
        let storage = CookieSessionStorage::from_options(
            serde_json::from_value(json!({
                "cookie": { "name": "__session_id", "path": "/app", "secret": "s" }
            }))
            .unwrap(),
        );
        let mut session = storage.get_session(&HeaderMap::new());
        session.set("a", 1);

        let set_cookie = storage.commit_session(&session).unwrap();
        assert!(set_cookie.starts_with("__session_id="));
        assert!(set_cookie.ends_with("; Path=/app"));

        let restored = storage.get_session(request_cookie(&set_cookie));
        assert_eq!(restored.get::<i32>("a"), Some(1));
        assert!(storage.get_session(format!("session_id={}", &set_cookie[13..]).as_str()).is_empty());
    }

    #[test]
    fn test_hardening_attributes() {
        let storage = CookieSessionStorage::new(
            SessionConfig::new("s")
                .with_http_only(true)
                .with_secure(true)
                .with_same_site(SameSite::Lax)
                .with_max_age(60),
        );
        let set_cookie = storage.commit_session(&Session::default()).unwrap();

        for attribute in ["HttpOnly", "Secure", "SameSite=Lax", "Path=/", "Max-Age=60"] {
            assert!(set_cookie.contains(attribute), "{} missing in {}", attribute, set_cookie);
        }

        let token = request_cookie(&set_cookie).strip_prefix("session_id=").unwrap();
        let claims = JwtSigner::new().verify(token, "s").unwrap();
        assert!(claims["exp"].is_i64());
    }

    #[test]
    fn test_commit_twice_is_data_equivalent() {
        let storage = storage();
        let mut session = storage.get_session(&HeaderMap::new());
        session.set("count", 3);

        let first = storage.commit_session(&session).unwrap();
        let second = storage.commit_session(&session).unwrap();

        assert_eq!(
            storage.get_session(request_cookie(&first)),
            storage.get_session(request_cookie(&second))
        );
    }

    #[test]
    fn test_commit_with_empty_secret_fails() {
        let storage = CookieSessionStorage::new(SessionConfig::new(""));
        let mut session = storage.get_session(&HeaderMap::new());
        session.set("a", 1);

        assert!(matches!(
            storage.commit_session(&session),
            Err(SessionError::InvalidSecret)
        ));
    }

    #[test]
    fn test_oversized_max_age_is_an_error_not_a_panic() {
        for max_age in [i64::MAX as u64, u64::MAX] {
            let storage = CookieSessionStorage::new(SessionConfig::new("s").with_max_age(max_age));

            assert!(matches!(
                storage.commit_session(&Session::default()),
                Err(SessionError::InvalidTtl(_))
            ));
            assert_eq!(storage.destroy_session(), "session_id=; Path=/; Max-Age=0");
        }
    }

    #[test]
    fn test_destroy_session() {
        let storage = storage();
        assert_eq!(storage.destroy_session(), "session_id=; Path=/; Max-Age=0");
    }

    #[test]
    fn test_with_default_data_requires_object() {
        let result = CookieSessionStorage::new(SessionConfig::new("s")).with_default_data(&42);
        assert!(matches!(result, Err(SessionError::SerializationError(_))));
    }

    #[test]
    fn test_typed_default_data() {
        #[derive(Serialize)]
        struct Defaults {
            user: Option<String>,
            count: u32,
        }

        let storage = CookieSessionStorage::new(SessionConfig::new("s"))
            .with_default_data(&Defaults { user: None, count: 0 })
            .unwrap();
        let session = storage.get_session(&HeaderMap::new());

        assert!(session.has("user"));
        assert_eq!(session.get_value("user"), Some(&Value::Null));
        assert_eq!(session.get::<u32>("count"), Some(0));
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture_warnings<F: FnOnce()>(f: F) -> String {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        logs.contents()
    }

    #[test]
    fn test_missing_secret_warns_once_and_still_works() {
        let logs = capture_warnings(|| {
            let storage = CookieSessionStorage::from_options(SessionOptions::default());
            let mut session = storage.get_session(&HeaderMap::new());
            session.set("count", 1);

            let set_cookie = storage.commit_session(&session).unwrap();
            let restored = storage.get_session(request_cookie(&set_cookie));
            assert_eq!(restored.get::<i64>("count"), Some(1));
            assert_eq!(storage.get_session("session_id=garbage"), Session::default());
        });

        assert_eq!(logs.matches("WARN").count(), 1, "logs: {}", logs);
        assert!(logs.contains("No session secret configured"));
    }

    #[test]
    fn test_configured_secret_does_not_warn() {
        let logs = capture_warnings(|| {
            let storage = storage();
            let _ = storage.get_session("session_id=garbage");
        });

        assert!(logs.is_empty(), "logs: {}", logs);
    }
}
