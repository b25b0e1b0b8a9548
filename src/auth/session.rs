//! Client-side sessions stored in an encrypted, authenticated cookie.
//!
//! Nothing is kept on the server: the cookie carries the logged-in flag, the
//! CSRF token and an expiry, sealed with a key derived from the panel's
//! `session_key`.

use crate::auth::csrf::generate_token;
use crate::error::{PanelError, Result};
use crate::settings::MIN_SESSION_KEY_LEN;
use actix_web::body::{EitherBody, MessageBody};
use actix_web::cookie::{Cookie, CookieJar, Key, SameSite, time::Duration as CookieDuration};
use actix_web::dev::{Payload, ServiceRequest, ServiceResponse};
use actix_web::middleware::Next;
use actix_web::{Error, FromRequest, HttpRequest, ResponseError, web};
use chrono::Utc;
use log::trace;
use serde::{Deserialize, Serialize};
use std::future::{Ready, ready};

/// Cookie name for the session
pub const SESSION_COOKIE: &str = "realm_session";
/// Idle window: every saved session is valid for this long after the save.
pub const SESSION_TTL_SECS: i64 = 2 * 60 * 60;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    user: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    csrf_token: Option<String>,
    #[serde(default)]
    expires_at: i64,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.user
    }

    pub fn login(&mut self) {
        self.user = true;
    }

    pub fn csrf_token(&self) -> Option<&str> {
        self.csrf_token.as_deref()
    }

    /// Replace the CSRF token with a fresh one and return it.
    pub fn issue_csrf_token(&mut self) -> String {
        let token = generate_token();
        self.csrf_token = Some(token.clone());
        token
    }

    /// Current token, issuing one first if the session has none.
    pub fn csrf_token_or_issue(&mut self) -> String {
        match &self.csrf_token {
            Some(token) => token.clone(),
            None => self.issue_csrf_token(),
        }
    }
}

/// Seals and opens session cookies.
pub struct SessionStore {
    key: Key,
    secure: bool,
}

impl SessionStore {
    pub fn new(secret: &[u8], secure: bool) -> Result<Self> {
        if secret.len() < MIN_SESSION_KEY_LEN {
            return Err(PanelError::Settings(format!("session_key must be at least {} characters", MIN_SESSION_KEY_LEN)));
        }
        Ok(Self { key: Key::derive_from(secret), secure })
    }

    /// Read the session from the request. A missing, tampered or expired
    /// cookie yields an empty session.
    pub fn load(&self, req: &HttpRequest) -> Session {
        let Some(cookie) = req.cookie(SESSION_COOKIE) else {
            return Session::default();
        };
        let mut jar = CookieJar::new();
        jar.add_original(cookie);
        let Some(plain) = jar.private(&self.key).get(SESSION_COOKIE) else {
            trace!("Discarding session cookie that failed to decrypt");
            return Session::default();
        };
        match serde_json::from_str::<Session>(plain.value()) {
            Ok(session) if session.expires_at > Utc::now().timestamp() => session,
            Ok(_) => {
                trace!("Discarding expired session");
                Session::default()
            }
            Err(_) => Session::default(),
        }
    }

    /// Seal `session` into a cookie, restarting its idle window.
    pub fn save(&self, session: &Session) -> Result<Cookie<'static>> {
        let mut session = session.clone();
        session.expires_at = Utc::now().timestamp() + SESSION_TTL_SECS;
        let value = serde_json::to_string(&session).map_err(PanelError::internal)?;

        let mut jar = CookieJar::new();
        jar.private_mut(&self.key).add(Cookie::new(SESSION_COOKIE, value));
        let mut cookie = jar.get(SESSION_COOKIE).cloned().ok_or_else(|| PanelError::internal("failed to seal session cookie"))?;
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_secure(self.secure);
        cookie.set_same_site(SameSite::Lax);
        cookie.set_max_age(CookieDuration::seconds(SESSION_TTL_SECS));
        Ok(cookie)
    }

    /// A cookie that makes the browser drop the session.
    pub fn clear(&self) -> Cookie<'static> {
        let mut cookie = Cookie::new(SESSION_COOKIE, "");
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_secure(self.secure);
        cookie.make_removal();
        cookie
    }
}

impl FromRequest for Session {
    type Error = Error;
    type Future = Ready<std::result::Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = match req.app_data::<web::Data<SessionStore>>() {
            Some(store) => Ok(store.load(req)),
            None => Err(PanelError::internal("session store is not configured").into()),
        };
        ready(result)
    }
}

/// Turn `err` into the response for `req` without running the inner service.
pub(crate) fn reject<B>(req: ServiceRequest, err: PanelError) -> ServiceResponse<EitherBody<B>> {
    req.into_response(err.error_response()).map_into_right_body()
}

/// Gate for the privileged routes: anonymous requests are sent to `/login`.
pub async fn require_login<B: MessageBody>(req: ServiceRequest, next: Next<B>) -> std::result::Result<ServiceResponse<EitherBody<B>>, Error> {
    let authenticated = match req.app_data::<web::Data<SessionStore>>() {
        Some(store) => store.load(req.request()).is_authenticated(),
        None => return Ok(reject(req, PanelError::internal("session store is not configured"))),
    };
    if !authenticated {
        trace!("Redirecting anonymous request for {} to /login", req.path());
        return Ok(reject(req, PanelError::Unauthenticated));
    }
    next.call(req).await.map(ServiceResponse::map_into_left_body)
}
