// Known-bridge cache
//
// A small JSON file of previously connected bridges. Connection setup
// reads it to skip discovery; the device layer refreshes an entry after
// every successful authentication. Consumers treat it as read-only.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;

/// One previously connected bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnownBridge {
    pub unique_id: String,
    /// LAN address at last connection. May be empty when the bridge was
    /// seen but never reached directly — discovery runs again then.
    #[serde(default)]
    pub ip_address: String,
    pub last_connected: DateTime<Utc>,
    /// Whitelisted application key, if registration succeeded before.
    #[serde(default, with = "opt_secret")]
    pub app_key: Option<SecretString>,
}

/// Read-mostly access to the persisted bridge cache.
#[derive(Debug, Clone)]
pub struct BridgeDirectory {
    path: PathBuf,
}

impl BridgeDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All cached bridges. A missing cache file is an empty cache.
    pub fn list(&self) -> Result<Vec<KnownBridge>, Error> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::Cache(format!("read {}: {e}", self.path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::Cache(format!("parse {}: {e}", self.path.display())))
    }

    /// The most recently connected bridge, or `None` when the cache is
    /// empty.
    pub fn last_connected(&self) -> Result<Option<KnownBridge>, Error> {
        let bridges = self.list()?;
        debug!(count = bridges.len(), "known bridge(s) in cache");
        Ok(bridges.into_iter().max_by_key(|b| b.last_connected))
    }

    /// Look up a cached bridge by unique id.
    pub fn find(&self, unique_id: &str) -> Result<Option<KnownBridge>, Error> {
        Ok(self
            .list()?
            .into_iter()
            .find(|b| b.unique_id == unique_id))
    }

    /// Record a successful connection: upsert the entry and refresh its
    /// address, application key, and `last_connected` timestamp.
    pub fn record_connected(
        &self,
        unique_id: &str,
        ip_address: &str,
        app_key: &SecretString,
    ) -> Result<(), Error> {
        let mut bridges = self.list()?;

        let entry = KnownBridge {
            unique_id: unique_id.to_owned(),
            ip_address: ip_address.to_owned(),
            last_connected: Utc::now(),
            app_key: Some(app_key.clone()),
        };

        match bridges.iter_mut().find(|b| b.unique_id == unique_id) {
            Some(existing) => *existing = entry,
            None => bridges.push(entry),
        }

        let raw = serde_json::to_string_pretty(&bridges)
            .map_err(|e| Error::Cache(format!("serialize bridge cache: {e}")))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::Cache(format!("create {}: {e}", parent.display())))?;
            }
        }
        std::fs::write(&self.path, raw)
            .map_err(|e| Error::Cache(format!("write {}: {e}", self.path.display())))?;

        debug!(bridge = unique_id, "bridge cache updated");
        Ok(())
    }
}

/// Serde adapter for `Option<SecretString>` — `secrecy` deliberately
/// refuses to serialize secrets without an explicit opt-in.
mod opt_secret {
    use super::{ExposeSecret, SecretString};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<SecretString>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(secret) => serializer.serialize_some(secret.expose_secret()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<SecretString>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.map(SecretString::from))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::TimeZone;

    use super::*;

    fn bridge(id: &str, ip: &str, ts: i64) -> KnownBridge {
        KnownBridge {
            unique_id: id.to_owned(),
            ip_address: ip.to_owned(),
            last_connected: Utc.timestamp_opt(ts, 0).unwrap(),
            app_key: None,
        }
    }

    fn write_cache(dir: &tempfile::TempDir, bridges: &[KnownBridge]) -> BridgeDirectory {
        let path = dir.path().join("bridges.json");
        std::fs::write(&path, serde_json::to_string(bridges).unwrap()).unwrap();
        BridgeDirectory::new(path)
    }

    #[test]
    fn missing_file_is_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let directory = BridgeDirectory::new(dir.path().join("absent.json"));

        assert!(directory.list().unwrap().is_empty());
        assert!(directory.last_connected().unwrap().is_none());
    }

    #[test]
    fn last_connected_picks_maximum_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let directory = write_cache(
            &dir,
            &[
                bridge("B1", "10.0.0.5", 100),
                bridge("B2", "10.0.0.6", 300),
                bridge("B3", "10.0.0.7", 200),
            ],
        );

        let latest = directory.last_connected().unwrap().unwrap();
        assert_eq!(latest.unique_id, "B2");
    }

    #[test]
    fn record_connected_upserts_and_refreshes() {
        let dir = tempfile::tempdir().unwrap();
        let directory = write_cache(&dir, &[bridge("B1", "10.0.0.5", 100)]);

        let key = SecretString::from("app-key-1");
        directory.record_connected("B1", "10.0.0.99", &key).unwrap();
        directory
            .record_connected("B2", "10.0.0.6", &key)
            .unwrap();

        let bridges = directory.list().unwrap();
        assert_eq!(bridges.len(), 2);

        let b1 = directory.find("B1").unwrap().unwrap();
        assert_eq!(b1.ip_address, "10.0.0.99");
        assert_eq!(
            b1.app_key.unwrap().expose_secret(),
            "app-key-1"
        );

        // The entry recorded last is now the most recently connected one.
        let latest = directory.last_connected().unwrap().unwrap();
        assert_eq!(latest.unique_id, "B2");
        assert!(latest.last_connected > Utc.timestamp_opt(100, 0).unwrap());
    }
}
