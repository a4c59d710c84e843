//! Session configuration

use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

/// Cookie name used when none is configured
pub const DEFAULT_COOKIE_NAME: &str = "session_id";

/// Cookie path used when none is configured
pub const DEFAULT_COOKIE_PATH: &str = "/";

/// Placeholder secret used when none is configured. Only safe for development.
pub const DEFAULT_SECRET: &str = "not-secret";

/// SameSite cookie attribute
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum SameSite {
    /// Strict - cookie only sent for same-site requests
    Strict,
    /// Lax - cookie sent for same-site requests and top-level navigations
    Lax,
    /// None - cookie sent for all requests (requires Secure)
    None,
}

/// Effective cookie settings
#[derive(Clone, Debug, PartialEq)]
pub struct CookieOptions {
    /// Name of the session cookie (default: "session_id")
    pub name: String,

    /// Cookie path (default: "/")
    pub path: String,

    /// Secret used to sign and verify the session token (default: "not-secret")
    pub secret: String,

    /// Cookie domain (default: None - current domain only)
    pub domain: Option<String>,

    /// HttpOnly flag (default: false)
    pub http_only: bool,

    /// Secure flag (default: false)
    pub secure: bool,

    /// SameSite attribute (default: None - attribute omitted)
    pub same_site: Option<SameSite>,

    /// Max age in seconds (default: None = browser session cookie).
    /// Also bounds the token lifetime through its `exp` claim.
    pub max_age: Option<u64>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.to_string(),
            path: DEFAULT_COOKIE_PATH.to_string(),
            secret: DEFAULT_SECRET.to_string(),
            domain: None,
            http_only: false,
            secure: false,
            same_site: None,
            max_age: None,
        }
    }
}

impl CookieOptions {
    /// Overlay every field set in `partial` onto these options
    pub fn merge(mut self, partial: PartialCookieOptions) -> Self {
        if let Some(name) = partial.name {
            self.name = name;
        }
        if let Some(path) = partial.path {
            self.path = path;
        }
        if let Some(secret) = partial.secret {
            self.secret = secret;
        }
        if partial.domain.is_some() {
            self.domain = partial.domain;
        }
        if let Some(http_only) = partial.http_only {
            self.http_only = http_only;
        }
        if let Some(secure) = partial.secure {
            self.secure = secure;
        }
        if partial.same_site.is_some() {
            self.same_site = partial.same_site;
        }
        if partial.max_age.is_some() {
            self.max_age = partial.max_age;
        }
        self
    }
}

/// Cookie settings where every field is optional, e.g. as loaded from a config file
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PartialCookieOptions {
    /// Cookie name, falls back to "session_id"
    pub name: Option<String>,

    /// Cookie path, falls back to "/"
    pub path: Option<String>,

    /// Signing secret. Leaving it unset keeps the insecure placeholder and logs a warning.
    pub secret: Option<String>,

    /// Cookie domain
    pub domain: Option<String>,

    /// HttpOnly flag
    pub http_only: Option<bool>,

    /// Secure flag
    pub secure: Option<bool>,

    /// SameSite attribute
    pub same_site: Option<SameSite>,

    /// Max age in seconds, also used as the token lifetime
    pub max_age: Option<u64>,
}

/// Partial storage options: `{ "cookie": { ... }, "default_data": { ... } }`
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Cookie settings merged over [`CookieOptions::default`]
    pub cookie: PartialCookieOptions,

    /// Seed merged under the data of every session (also accepted as `default_session`)
    #[serde(alias = "default_session")]
    pub default_data: Option<Map<String, Value>>,
}

/// Configuration for the cookie session storage
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionConfig {
    /// Cookie settings
    pub cookie: CookieOptions,

    /// Seed merged under the data of every session
    pub default_data: Map<String, Value>,
}

impl SessionConfig {
    /// Create a new session configuration with the given secret
    pub fn new<S: Into<String>>(secret: S) -> Self {
        Self::default().with_secret(secret)
    }

    /// Merge partial options over the built-in defaults
    pub fn from_options(options: SessionOptions) -> Self {
        Self {
            cookie: CookieOptions::default().merge(options.cookie),
            default_data: options.default_data.unwrap_or_default(),
        }
    }

    /// Set the signing secret
    pub fn with_secret<S: Into<String>>(mut self, secret: S) -> Self {
        self.cookie.secret = secret.into();
        self
    }

    /// Set the cookie name (default: "session_id")
    pub fn with_cookie_name<S: Into<String>>(mut self, name: S) -> Self {
        self.cookie.name = name.into();
        self
    }

    /// Set the cookie path (default: "/")
    pub fn with_cookie_path<S: Into<String>>(mut self, path: S) -> Self {
        self.cookie.path = path.into();
        self
    }

    /// Set the cookie domain
    pub fn with_cookie_domain<S: Into<String>>(mut self, domain: S) -> Self {
        self.cookie.domain = Some(domain.into());
        self
    }

    /// Set the HttpOnly flag (default: false)
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.cookie.http_only = http_only;
        self
    }

    /// Set the Secure flag (default: false)
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.cookie.secure = secure;
        self
    }

    /// Set the SameSite attribute
    pub fn with_same_site(mut self, same_site: impl Into<Option<SameSite>>) -> Self {
        self.cookie.same_site = same_site.into();
        self
    }

    /// Set max age in seconds
    /// Pass None for session cookie (expires when browser closes)
    pub fn with_max_age(mut self, max_age: impl Into<Option<u64>>) -> Self {
        self.cookie.max_age = max_age.into();
        self
    }

    /// Set max age from Duration
    pub fn with_max_age_duration(mut self, duration: impl Into<Option<Duration>>) -> Self {
        self.cookie.max_age = duration.into().map(|d| d.as_secs());
        self
    }

    /// Replace the default data map
    pub fn with_default_data(mut self, data: Map<String, Value>) -> Self {
        self.default_data = data;
        self
    }

    /// Whether the secret is missing, empty or the built-in placeholder
    pub fn has_insecure_secret(&self) -> bool {
        self.cookie.secret.is_empty() || self.cookie.secret == DEFAULT_SECRET
    }
}
