//! Session data and flash data container

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SessionError;

/// Plain snapshot of a session, the structure that gets signed into the cookie
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPayload {
    /// Persistent session data
    #[serde(default)]
    pub data: Map<String, Value>,

    /// Data meant to be read exactly once
    #[serde(default)]
    pub flash: Map<String, Value>,
}

/// Value handed to [`Session::set`]: either a literal or a function of the current value
pub enum SessionValue {
    /// Stored as-is
    Literal(Value),
    /// Called with the current value (`None` if the key was never set); its result is stored
    Updater(Box<dyn FnOnce(Option<Value>) -> Value + Send>),
}

impl SessionValue {
    /// Wrap an updater closure
    pub fn updater<F>(f: F) -> Self
    where
        F: FnOnce(Option<Value>) -> Value + Send + 'static,
    {
        SessionValue::Updater(Box::new(f))
    }
}

impl std::fmt::Debug for SessionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionValue::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            SessionValue::Updater(_) => f.write_str("Updater(..)"),
        }
    }
}

impl From<Value> for SessionValue {
    fn from(value: Value) -> Self {
        SessionValue::Literal(value)
    }
}

macro_rules! literal_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for SessionValue {
                fn from(value: $ty) -> Self {
                    SessionValue::Literal(Value::from(value))
                }
            }
        )*
    };
}

literal_from!(
    bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, String, &str,
    Map<String, Value>
);

impl<T: Into<Value>> From<Option<T>> for SessionValue {
    fn from(value: Option<T>) -> Self {
        SessionValue::Literal(value.map_or(Value::Null, Into::into))
    }
}

impl<T: Into<Value>> From<Vec<T>> for SessionValue {
    fn from(values: Vec<T>) -> Self {
        SessionValue::Literal(Value::Array(values.into_iter().map(Into::into).collect()))
    }
}

/// A request-scoped session.
///
/// Holds the persistent `data` map and the one-shot `flash` map. A session is
/// owned by the handler that obtained it and is only persisted through the
/// cookie produced by [`CookieSessionStorage::commit_session`](crate::CookieSessionStorage::commit_session).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    data: Map<String, Value>,
    flash: Map<String, Value>,
}

impl Session {
    /// Create a session from existing data and flash maps
    pub fn new(data: Map<String, Value>, flash: Map<String, Value>) -> Self {
        Self { data, flash }
    }

    /// Get a value from the session, deserialized into `T`
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Get the raw stored value
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Set a value, or replace it with the result of an updater
    ///
    /// ```
    /// use salvo_cookie_session::{Session, SessionValue};
    /// use serde_json::json;
    ///
    /// let mut session = Session::default();
    /// session
    ///     .set("user", "alice")
    ///     .set("visits", SessionValue::updater(|v| json!(v.is_some())));
    /// assert_eq!(session.get_value("visits"), Some(&json!(false)));
    /// ```
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<SessionValue>) -> &mut Self {
        let key = key.into();
        let value = match value.into() {
            SessionValue::Literal(v) => v,
            SessionValue::Updater(f) => f(self.data.get(&key).cloned()),
        };
        self.data.insert(key, value);
        self
    }

    /// Typed updater. `current` is `None` when the key is missing or holds a
    /// value that does not deserialize into `T`.
    pub fn update<T, F>(&mut self, key: impl Into<String>, f: F) -> Result<&mut Self, SessionError>
    where
        T: DeserializeOwned + Serialize,
        F: FnOnce(Option<T>) -> T,
    {
        let key = key.into();
        let next = serde_json::to_value(f(self.get(&key)))?;
        self.data.insert(key, next);
        Ok(self)
    }

    /// Remove a value from the session
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Whether `key` is stored. Falsy values (`0`, `""`, `false`, `null`) count as present.
    pub fn has(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Clear all session data in place. Flash data is kept.
    pub fn clear(&mut self) -> &mut Self {
        self.data.clear();
        self
    }

    /// Read a flash value and remove it
    pub fn flash(&mut self, key: &str) -> Option<Value> {
        self.flash.remove(key)
    }

    /// Read a flash value into `T` and remove it, even if it fails to deserialize
    pub fn flash_as<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        self.flash
            .remove(key)
            .and_then(|v| serde_json::from_value(v).ok())
    }

    /// Store a flash value for the next read
    pub fn set_flash(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.flash.insert(key.into(), value.into());
        self
    }

    /// Current session data
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Flash data that has not been read yet
    pub fn flashed_data(&self) -> &Map<String, Value> {
        &self.flash
    }

    /// Deserialize the whole data map into a typed view
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, SessionError> {
        Ok(serde_json::from_value(Value::Object(self.data.clone()))?)
    }

    /// Check if both data and flash are empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.flash.is_empty()
    }

    /// Snapshot of the current state
    pub fn to_json(&self) -> SessionPayload {
        SessionPayload {
            data: self.data.clone(),
            flash: self.flash.clone(),
        }
    }
}

impl From<SessionPayload> for Session {
    fn from(payload: SessionPayload) -> Self {
        Self::new(payload.data, payload.flash)
    }
}
