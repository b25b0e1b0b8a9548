//! Common validation utilities shared across modules

use std::net::{Ipv4Addr, SocketAddrV4};

/// Validate that a port number is in valid range (1-65535)
pub fn validate_port_range(port: u16) -> Result<(), String> {
    if port == 0 {
        return Err("Port must be between 1 and 65535".to_string());
    }
    Ok(())
}

/// Check if a string is empty or only whitespace
pub fn is_empty_or_whitespace(s: &str) -> bool {
    s.trim().is_empty()
}

/// Validate an `address:port` endpoint as written in the daemon config.
///
/// Exactly one `:` is allowed, so bracketed IPv6 and host names are rejected.
/// No DNS lookups happen here.
pub fn validate_endpoint(input: &str) -> Result<SocketAddrV4, String> {
    let mut parts = input.split(':');
    let (Some(ip), Some(port), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("Expected address:port, got '{}'", input));
    };
    let ip = ip.parse::<Ipv4Addr>().map_err(|_| format!("Invalid IP address: '{}'", ip))?;
    let port = port.parse::<u16>().map_err(|_| "Port must be between 1 and 65535".to_string())?;
    validate_port_range(port)?;
    Ok(SocketAddrV4::new(ip, port))
}
