//! The panel's own settings file (`./config.toml` by default).

use crate::config::store::write_private;
use crate::error::{PanelError, Result};
use crate::utils::validation::is_empty_or_whitespace;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_PORT: u16 = 8081;
pub const DEFAULT_REDIRECT_PORT: u16 = 8082;
/// Random bytes in a freshly generated session key, before base64.
const SESSION_KEY_BYTES: usize = 32;
/// The cookie key is derived from the raw `session_key` string, which must be at least this long.
pub const MIN_SESSION_KEY_LEN: usize = 32;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PanelSettings {
    #[serde(skip)]
    path: PathBuf,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub session_key: String,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub https: HttpsSettings,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AuthSettings {
    /// Plaintext password, or an argon2 PHC string.
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default)]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_port: Option<u16>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpsSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub cert_file: String,
    #[serde(default)]
    pub key_file: String,
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings").field("password", &"<redacted>").finish()
    }
}

impl PanelSettings {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading panel settings from: {}", path.display());
        let content =
            tokio::fs::read_to_string(path).await.map_err(|source| PanelError::ConfigRead { path: path.to_owned(), source })?;
        let mut settings: Self =
            toml::from_str(&content).map_err(|source| PanelError::ConfigParse { path: path.to_owned(), source })?;
        settings.path = path.to_owned();
        Ok(settings)
    }

    /// Generate and persist a session key if the file has none.
    ///
    /// Returns `true` when a key was generated. An existing key is never
    /// replaced: rotating it would log every operator out.
    pub async fn ensure_session_key(&mut self) -> Result<bool> {
        if !is_empty_or_whitespace(&self.session_key) {
            return Ok(false);
        }
        let key: [u8; SESSION_KEY_BYTES] = rand::random();
        self.session_key = STANDARD.encode(key);
        self.save().await?;
        info!("Generated a new session key and saved it to {}", self.path.display());
        Ok(true)
    }

    pub async fn save(&self) -> Result<()> {
        debug!("Saving panel settings to: {}", self.path.display());
        let content = toml::to_string(self)?;
        write_private(&self.path, content.as_bytes())
            .await
            .map_err(|source| PanelError::ConfigWrite { path: self.path.clone(), source })
    }

    /// Checks every setting the server needs before it binds anything.
    pub fn validate(&self) -> Result<()> {
        if is_empty_or_whitespace(&self.auth.password) {
            return Err(PanelError::Settings("auth.password must be set".to_string()));
        }
        if self.session_key.len() < MIN_SESSION_KEY_LEN {
            return Err(PanelError::Settings(format!("session_key must be at least {} characters", MIN_SESSION_KEY_LEN)));
        }
        self.tls_files()?;
        Ok(())
    }

    /// HTTPS is mandatory: the panel refuses to run over plaintext.
    pub fn tls_files(&self) -> Result<(&Path, &Path)> {
        if !self.https.enabled {
            return Err(PanelError::Settings("HTTPS must be enabled (https.enabled = true)".to_string()));
        }
        if is_empty_or_whitespace(&self.https.cert_file) || is_empty_or_whitespace(&self.https.key_file) {
            return Err(PanelError::Settings("https.cert_file and https.key_file must both be set".to_string()));
        }
        Ok((Path::new(&self.https.cert_file), Path::new(&self.https.key_file)))
    }

    pub fn port(&self) -> u16 {
        if self.server.port == 0 { DEFAULT_PORT } else { self.server.port }
    }

    pub fn redirect_port(&self) -> u16 {
        match self.server.redirect_port {
            Some(port) if port != 0 => port,
            _ => DEFAULT_REDIRECT_PORT,
        }
    }

    pub fn session_key_bytes(&self) -> &[u8] {
        self.session_key.as_bytes()
    }
}
