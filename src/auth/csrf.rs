//! Per-session CSRF tokens.
//!
//! Every POST and DELETE must echo the session's token in the
//! `X-CSRF-Token` header. The token lives as long as the session; it is not
//! consumed by use.

use crate::auth::session::{SessionStore, reject};
use crate::error::PanelError;
use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::Method;
use actix_web::middleware::Next;
use actix_web::{Error, web};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use log::warn;
use subtle::ConstantTimeEq;

pub const CSRF_HEADER: &str = "X-CSRF-Token";

pub fn generate_token() -> String {
    let bytes: [u8; 16] = rand::random();
    STANDARD.encode(bytes)
}

/// Constant-time comparison; an absent or empty side never matches.
pub fn tokens_match(expected: Option<&str>, provided: Option<&str>) -> bool {
    match (expected, provided) {
        (Some(expected), Some(provided)) if !expected.is_empty() && !provided.is_empty() => {
            expected.as_bytes().ct_eq(provided.as_bytes()).into()
        }
        _ => false,
    }
}

fn is_state_changing(method: &Method) -> bool {
    *method == Method::POST || *method == Method::DELETE
}

pub async fn csrf_guard<B: MessageBody>(req: ServiceRequest, next: Next<B>) -> Result<ServiceResponse<EitherBody<B>>, Error> {
    if is_state_changing(req.method()) {
        let accepted = match req.app_data::<web::Data<SessionStore>>() {
            Some(store) => {
                let session = store.load(req.request());
                let provided = req.headers().get(CSRF_HEADER).and_then(|v| v.to_str().ok());
                tokens_match(session.csrf_token(), provided)
            }
            None => return Ok(reject(req, PanelError::internal("session store is not configured"))),
        };
        if !accepted {
            warn!("Rejected {} {} with a missing or stale CSRF token", req.method(), req.path());
            return Ok(reject(req, PanelError::CsrfRejected));
        }
    }
    next.call(req).await.map(ServiceResponse::map_into_left_body)
}
