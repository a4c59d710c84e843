//! # salvo-cookie-session
//!
//! Signed, stateless cookie sessions with flash data for the Salvo web framework.
//!
//! The whole session (a `data` map plus a read-once `flash` map) travels in a
//! single HS256 JSON Web Token stored in a cookie. Nothing is kept on the
//! server; a cookie that fails verification simply yields a fresh session.
//!
//! ## Features
//!
//! - **jsonwebtoken compatible tokens**: sessions are signed the way `jwt.sign(payload, secret)` does it
//! - **Flash data**: values that disappear after being read once
//! - **Default data**: seed every session from a map or any `Serialize` struct
//! - **Framework agnostic core**: `get_session`/`commit_session` work on raw header values,
//!   with a Salvo middleware on top
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use salvo::prelude::*;
//! use salvo_cookie_session::{CookieSessionHandler, CookieSessionStorage, SessionConfig, SessionDepotExt};
//!
//! #[tokio::main]
//! async fn main() {
//!     let storage = CookieSessionStorage::new(SessionConfig::new("your-secret-key"))
//!         .with_default_data(&serde_json::json!({ "count": 0 }))
//!         .unwrap();
//!
//!     let router = Router::new()
//!         .hoop(CookieSessionHandler::new(storage))
//!         .get(index);
//!
//!     let acceptor = TcpListener::new("127.0.0.1:5800").bind().await;
//!     Server::new(acceptor).serve(router).await;
//! }
//!
//! #[handler]
//! async fn index(depot: &mut Depot) -> String {
//!     let session = depot.session_mut().unwrap();
//!     session.update("count", |v: Option<i64>| v.unwrap_or(0) + 1).unwrap();
//!     format!("Count: {}", session.get::<i64>("count").unwrap_or_default())
//! }
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod session;
pub mod storage;
pub mod token;

pub use config::{SameSite, SessionConfig, SessionOptions};
pub use error::SessionError;
pub use handler::CookieSessionHandler;
pub use session::{Session, SessionPayload, SessionValue};
pub use storage::{CookieHeader, CookieSessionStorage};
pub use token::{JwtSigner, TokenSigner};

/// Extension trait for Depot to easily access session
pub mod depot_ext;
pub use depot_ext::SessionDepotExt;
