//! HTTPS control panel for the realm traffic forwarder.
//!
//! Lists, adds and removes forwarding rules in the daemon's TOML config and
//! starts, stops and queries the daemon through the OS service manager.

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod rules;
pub mod service;
pub mod settings;
pub mod utils;
