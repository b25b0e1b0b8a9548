use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Mirror of the realm daemon's configuration file.
///
/// Only `network` and `endpoints` are managed by the panel. Any other
/// top-level sections the daemon understands (`log`, `dns`, ...) are carried
/// in `other` and written back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub network: NetworkFlags,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<ForwardingRule>,
    #[serde(flatten)]
    pub(crate) other: toml::Table,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkFlags {
    #[serde(default)]
    pub no_tcp: bool,
    #[serde(default)]
    pub use_udp: bool,
    #[serde(flatten)]
    pub(crate) extra: toml::Table,
}

/// One `[[endpoints]]` entry: traffic arriving on `listen` is relayed to `remote`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardingRule {
    pub listen: String,
    pub remote: String,
    #[serde(flatten)]
    pub(crate) extra: toml::Table,
}

/// Body of an add request. Kept apart from [`ForwardingRule`] so clients
/// cannot smuggle extra keys into the daemon's file.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRule {
    pub listen: String,
    pub remote: String,
}

impl ForwardingRule {
    pub fn new(listen: impl Into<String>, remote: impl Into<String>) -> Self {
        Self { listen: listen.into(), remote: remote.into(), extra: toml::Table::new() }
    }
}

impl From<NewRule> for ForwardingRule {
    fn from(rule: NewRule) -> Self {
        Self::new(rule.listen, rule.remote)
    }
}

impl DaemonConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize in the shape the daemon reads: `[network]` first, then one
    /// `[[endpoints]]` table per rule in insertion order.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    pub fn find_rule(&self, listen: &str) -> Option<&ForwardingRule> {
        self.endpoints.iter().find(|rule| rule.listen == listen)
    }
}

impl Display for ForwardingRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.listen, self.remote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[log]
level = "warn"

[network]
no_tcp = false
use_udp = true
tcp_timeout = 5

[[endpoints]]
listen = "0.0.0.0:5000"
remote = "10.0.0.2:443"

[[endpoints]]
listen = "0.0.0.0:5001"
remote = "10.0.0.3:22"
through = "192.168.1.1"
"#;

    #[test]
    fn test_parse_sample() {
        let config = DaemonConfig::from_toml_str(SAMPLE).unwrap();
        assert!(!config.network.no_tcp);
        assert!(config.network.use_udp);
        assert_eq!(config.endpoints.len(), 2);
        assert_eq!(config.endpoints[0].listen, "0.0.0.0:5000");
        assert_eq!(config.endpoints[1].remote, "10.0.0.3:22");
        assert!(config.other.contains_key("log"));
    }

    #[test]
    fn test_missing_sections_default() {
        let config = DaemonConfig::from_toml_str("").unwrap();
        assert_eq!(config.network, NetworkFlags::default());
        assert!(config.endpoints.is_empty());
    }

    #[test]
    fn test_serialized_shape() {
        let mut config = DaemonConfig::default();
        config.network.use_udp = true;
        config.endpoints.push(ForwardingRule::new("0.0.0.0:80", "1.1.1.1:80"));
        let out = config.to_toml_string().unwrap();
        assert!(out.contains("[network]"));
        assert!(out.contains("no_tcp = false"));
        assert!(out.contains("use_udp = true"));
        assert!(out.contains("[[endpoints]]"));
        assert!(out.contains("listen = \"0.0.0.0:80\""));
        assert!(out.find("[network]").unwrap() < out.find("[[endpoints]]").unwrap());
    }

    #[test]
    fn test_empty_endpoints_are_omitted() {
        let out = DaemonConfig::default().to_toml_string().unwrap();
        assert!(!out.contains("endpoints"));
    }

    #[test]
    fn test_unmanaged_keys_survive_rewrite() {
        let config = DaemonConfig::from_toml_str(SAMPLE).unwrap();
        let reparsed = DaemonConfig::from_toml_str(&config.to_toml_string().unwrap()).unwrap();
        assert_eq!(config, reparsed);
        assert_eq!(reparsed.network.extra.get("tcp_timeout").and_then(|v| v.as_integer()), Some(5));
        assert_eq!(reparsed.endpoints[1].extra.get("through").and_then(|v| v.as_str()), Some("192.168.1.1"));
    }

    #[test]
    fn test_find_rule() {
        let config = DaemonConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.find_rule("0.0.0.0:5001").unwrap().remote, "10.0.0.3:22");
        assert!(config.find_rule("0.0.0.0:9999").is_none());
    }
}
