// HTTP gateway
//
// - routes: page and JSON API handlers
// - redirect: HTTPS redirect middleware and the plaintext redirect listener
// - server: app assembly, TLS and the two listeners

pub mod redirect;
pub mod routes;
pub mod server;

use crate::auth::PasswordVerifier;
use crate::rules::RuleService;
use crate::service::ServiceControl;
use std::path::PathBuf;

/// State shared by every handler
pub struct AppState {
    pub rules: RuleService,
    pub service: ServiceControl,
    /// Configured operator password, hashed once at startup
    pub verifier: PasswordVerifier,
    /// Directory holding `index.html` and `login.html`
    pub templates_dir: PathBuf,
    /// Directory served under `/static`
    pub static_dir: PathBuf,
    pub https_enabled: bool,
    pub https_port: u16,
}

pub use server::{build_app, run};
