use crate::config::types::DaemonConfig;
use crate::error::{PanelError, Result};
use log::{debug, info, trace};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Owns the in-memory mirror of the daemon config file and the lock that
/// serializes every read and mutation of it.
pub struct ConfigStore {
    path: PathBuf,
    state: Mutex<DaemonConfig>,
}

impl ConfigStore {
    /// Load the daemon config. A missing or malformed file is an error; the
    /// panel never starts from a partial or default config.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let config = read_config(&path).await?;
        info!("Loaded {} forwarding rules from {}", config.endpoints.len(), path.display());
        trace!("Loaded config: {:#?}", config);
        Ok(Self { path, state: Mutex::new(config) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    pub(crate) async fn snapshot(&self) -> DaemonConfig {
        self.state.lock().await.clone()
    }

    pub async fn read<R>(&self, f: impl FnOnce(&DaemonConfig) -> R) -> R {
        let guard = self.state.lock().await;
        f(&guard)
    }

    /// Apply `f` and persist the result while holding the lock.
    ///
    /// `f` works on a copy. The copy replaces the in-memory state only after
    /// the file write succeeded, so memory never runs ahead of disk. If `f`
    /// returns an error nothing is written.
    pub async fn update<R>(&self, f: impl FnOnce(&mut DaemonConfig) -> Result<R>) -> Result<R> {
        let mut guard = self.state.lock().await;
        let mut next = guard.clone();
        let out = f(&mut next)?;
        write_config(&self.path, &next).await?;
        *guard = next;
        Ok(out)
    }

    /// Re-read the file, e.g. after the operator edited it by hand.
    pub async fn reload(&self) -> Result<()> {
        let mut guard = self.state.lock().await;
        let config = read_config(&self.path).await?;
        info!("Reloaded {} forwarding rules from {}", config.endpoints.len(), self.path.display());
        *guard = config;
        Ok(())
    }
}

pub async fn read_config(path: &Path) -> Result<DaemonConfig> {
    debug!("Loading daemon config from: {}", path.display());
    let content =
        tokio::fs::read_to_string(path).await.map_err(|source| PanelError::ConfigRead { path: path.to_owned(), source })?;
    DaemonConfig::from_toml_str(&content).map_err(|source| PanelError::ConfigParse { path: path.to_owned(), source })
}

pub async fn write_config(path: &Path, config: &DaemonConfig) -> Result<()> {
    debug!("Saving daemon config to: {}", path.display());
    let content = config.to_toml_string()?;
    write_private(path, content.as_bytes()).await.map_err(|source| PanelError::ConfigWrite { path: path.to_owned(), source })
}

/// Overwrite `path` with `contents`, readable and writable by the owner only.
pub(crate) async fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(contents).await?;
    file.flush().await?;

    // mode() only applies when the file is created
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::ForwardingRule;
    use std::sync::Arc;

    const SAMPLE: &str = "[network]\nno_tcp = false\nuse_udp = true\n\n[[endpoints]]\nlisten = \"0.0.0.0:5000\"\nremote = \"10.0.0.2:443\"\n";

    async fn sample_store(dir: &tempfile::TempDir) -> ConfigStore {
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, SAMPLE).await.unwrap();
        ConfigStore::load(&path).await.unwrap()
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = ConfigStore::load(dir.path().join("missing.toml")).await;
        assert!(matches!(result, Err(PanelError::ConfigRead { .. })));
    }

    #[tokio::test]
    async fn test_load_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, "[[endpoints]\nlisten = ").await.unwrap();
        let result = ConfigStore::load(&path).await;
        assert!(matches!(result, Err(PanelError::ConfigParse { .. })));
    }

    #[tokio::test]
    async fn test_update_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(&dir).await;
        store
            .update(|config| {
                config.endpoints.push(ForwardingRule::new("0.0.0.0:5001", "10.0.0.3:22"));
                Ok(())
            })
            .await
            .unwrap();

        let on_disk = read_config(store.path()).await.unwrap();
        assert_eq!(on_disk.endpoints.len(), 2);
        assert!(on_disk.network.use_udp);
        assert_eq!(store.snapshot().await, on_disk);
    }

    #[tokio::test]
    async fn test_failed_closure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(&dir).await;
        let result: Result<()> = store
            .update(|config| {
                config.endpoints.clear();
                Err(PanelError::validation("nope"))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(store.read(|c| c.endpoints.len()).await, 1);
        assert_eq!(tokio::fs::read_to_string(store.path()).await.unwrap(), SAMPLE);
    }

    #[tokio::test]
    async fn test_failed_write_keeps_memory_in_sync() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("realm");
        tokio::fs::create_dir(&nested).await.unwrap();
        let path = nested.join("config.toml");
        tokio::fs::write(&path, SAMPLE).await.unwrap();
        let store = ConfigStore::load(&path).await.unwrap();

        tokio::fs::remove_dir_all(&nested).await.unwrap();
        let result = store
            .update(|config| {
                config.endpoints.push(ForwardingRule::new("0.0.0.0:5001", "10.0.0.3:22"));
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(PanelError::ConfigWrite { .. })));
        assert_eq!(store.read(|c| c.endpoints.len()).await, 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_written_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(&dir).await;
        store.update(|_| Ok(())).await.unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(sample_store(&dir).await);
        let mut handles = Vec::new();
        for i in 0..20u16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update(move |config| {
                        config.endpoints.push(ForwardingRule::new(format!("0.0.0.0:{}", 6000 + i), "10.0.0.9:80"));
                        Ok(())
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        let on_disk = read_config(store.path()).await.unwrap();
        assert_eq!(on_disk.endpoints.len(), 21);
    }

    #[tokio::test]
    async fn test_reload_picks_up_external_edit() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(&dir).await;
        tokio::fs::write(store.path(), "[network]\nno_tcp = true\n").await.unwrap();
        store.reload().await.unwrap();
        let config = store.snapshot().await;
        assert!(config.network.no_tcp);
        assert!(config.endpoints.is_empty());
    }

    #[tokio::test]
    async fn test_reload_failure_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(&dir).await;
        tokio::fs::write(store.path(), "not = [valid").await.unwrap();
        assert!(store.reload().await.is_err());
        assert_eq!(store.read(|c| c.endpoints.len()).await, 1);
    }
}
