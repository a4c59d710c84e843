//! Cookie session middleware for Salvo

use async_trait::async_trait;
use salvo_core::http::header::SET_COOKIE;
use salvo_core::http::{Request, Response, StatusError};
use salvo_core::{Depot, FlowCtrl, Handler};
use std::sync::Arc;

use crate::session::Session;
use crate::storage::CookieSessionStorage;
use crate::token::{JwtSigner, TokenSigner};

pub(crate) const SESSION_KEY: &str = "salvo.cookie.session";

/// Cookie session middleware for Salvo
///
/// Loads the session from the request cookie into the `Depot` before the rest
/// of the chain runs, then commits whatever is left in the `Depot` back into a
/// `Set-Cookie` header. If the route removed the session through
/// [`SessionDepotExt::destroy_session`](crate::SessionDepotExt::destroy_session),
/// the cookie is expired instead.
pub struct CookieSessionHandler<S: TokenSigner = JwtSigner> {
    storage: Arc<CookieSessionStorage<S>>,
}

impl<S: TokenSigner> CookieSessionHandler<S> {
    /// Create a new session handler
    pub fn new(storage: CookieSessionStorage<S>) -> Self {
        Self {
            storage: Arc::new(storage),
        }
    }

    /// The storage backing this handler
    pub fn storage(&self) -> &CookieSessionStorage<S> {
        &self.storage
    }
}

impl<S: TokenSigner> Clone for CookieSessionHandler<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

#[async_trait]
impl<S: TokenSigner> Handler for CookieSessionHandler<S> {
    async fn handle(&self, req: &mut Request, depot: &mut Depot, res: &mut Response, ctrl: &mut FlowCtrl) {
        let session = self.storage.get_session(&*req);
        depot.insert(SESSION_KEY, session);

        ctrl.call_next(req, depot, res).await;

        let set_cookie = match depot.remove::<Session>(SESSION_KEY) {
            Ok(session) => match self.storage.commit_session(&session) {
                Ok(cookie) => cookie,
                Err(e) => {
                    tracing::error!("Failed to commit session: {}", e);
                    res.render(StatusError::internal_server_error());
                    return;
                }
            },
            Err(_) => self.storage.destroy_session(),
        };

        if let Err(e) = res.add_header(SET_COOKIE, set_cookie, false) {
            tracing::error!("Failed to set session cookie: {}", e);
        }
    }
}
