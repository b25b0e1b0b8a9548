use crate::config::store::ConfigStore;
use crate::error::{PanelError, Result};
use log::{debug, trace, warn};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::sync::Arc;
use tokio::sync::mpsc;

impl ConfigStore {
    /// Reload the in-memory mirror whenever the daemon config file changes on disk.
    ///
    /// The parent directory is watched rather than the file itself, since
    /// editors usually replace the file instead of writing it in place.
    pub fn watch_config_file(self: Arc<Self>) -> Result<()> {
        let path = self.path().to_path_buf();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => std::path::PathBuf::from("."),
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            NotifyConfig::default(),
        )
        .map_err(PanelError::internal)?;
        watcher.watch(&dir, RecursiveMode::NonRecursive).map_err(PanelError::internal)?;
        debug!("Watching {} for changes", path.display());

        tokio::spawn(async move {
            // the watcher stops when dropped
            let _watcher = watcher;
            let file_name = path.file_name().map(|n| n.to_os_string());
            while let Some(res) = rx.recv().await {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        warn!("Failed to receive config file event: {}", e);
                        continue;
                    }
                };
                let touches_config = event.paths.iter().any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                if !touches_config || !(event.kind.is_modify() || event.kind.is_create()) {
                    trace!("Ignoring file event: {:?}", event);
                    continue;
                }
                debug!("Daemon config changed on disk, reloading");
                if let Err(e) = self.reload().await {
                    warn!("Failed to reload daemon config, keeping previous rules: {}", e);
                }
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;

    const INITIAL: &str = "[network]\nno_tcp = false\nuse_udp = true\n\n[[endpoints]]\nlisten = \"0.0.0.0:5000\"\nremote = \"10.0.0.1:6000\"\n";

    /// Swap the file in by rename, the way editors save, so the watcher never
    /// observes a half-written file.
    fn replace_file(path: &Path, content: &str) {
        let staged = path.with_extension("toml.new");
        std::fs::write(&staged, content).unwrap();
        std::fs::rename(&staged, path).unwrap();
    }

    async fn wait_for_rules(store: &ConfigStore, expected: usize) -> bool {
        tokio::time::timeout(Duration::from_secs(10), async {
            while store.read(|config| config.endpoints.len()).await != expected {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await
        .is_ok()
    }

    #[tokio::test]
    async fn test_external_edit_is_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, INITIAL).unwrap();
        let store = Arc::new(ConfigStore::load(&path).await.unwrap());
        store.clone().watch_config_file().unwrap();

        let edited = format!("{INITIAL}\n[[endpoints]]\nlisten = \"0.0.0.0:5001\"\nremote = \"10.0.0.2:6001\"\n");
        replace_file(&path, &edited);

        assert!(wait_for_rules(&store, 2).await, "edit was not picked up");
        assert_eq!(store.read(|config| config.endpoints[1].remote.clone()).await, "10.0.0.2:6001");
    }

    #[tokio::test]
    async fn test_malformed_edit_keeps_previous_rules() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, INITIAL).unwrap();
        let store = Arc::new(ConfigStore::load(&path).await.unwrap());
        store.clone().watch_config_file().unwrap();

        replace_file(&path, "endpoints = [broken");
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(store.read(|config| config.endpoints.len()).await, 1);

        replace_file(&path, "[network]\nno_tcp = false\nuse_udp = true\n");
        assert!(wait_for_rules(&store, 0).await, "valid edit after a broken one was not picked up");
    }
}
