//! Operator authentication.
//!
//! Provides:
//! - Password verification against the configured panel password
//! - Encrypted cookie sessions and the login gate
//! - CSRF tokens for state-changing requests

pub mod csrf;
pub mod password;
pub mod session;

pub use csrf::{CSRF_HEADER, csrf_guard};
pub use password::{MIN_PASSWORD_LEN, PasswordVerifier};
pub use session::{SESSION_COOKIE, Session, SessionStore, require_login};
