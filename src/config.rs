use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::storage::{JournalMode, StoreConfig};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ReclinkConfig {
    pub database: Option<String>,
    /// Tenant used when the command line does not name one
    pub tenant: Option<String>,
    pub busy_timeout_ms: Option<u64>,
    pub journal_mode: Option<JournalMode>,
}

impl ReclinkConfig {
    /// Connection settings for `db_path`, with this config's overrides
    pub fn store_config(&self, db_path: &Path) -> StoreConfig {
        let mut store = StoreConfig::at(db_path);
        if let Some(ms) = self.busy_timeout_ms {
            store.busy_timeout = Duration::from_millis(ms);
        }
        if let Some(mode) = self.journal_mode {
            store.journal_mode = mode;
        }
        store
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("reclink.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".reclink").join("reclink.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<ReclinkConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: ReclinkConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &ReclinkConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reclink.toml");
        let config = ReclinkConfig {
            database: Some("links.db".into()),
            tenant: Some("acme".into()),
            busy_timeout_ms: Some(250),
            journal_mode: Some(JournalMode::Delete),
        };

        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded, config);

        let store = loaded.store_config(Path::new("links.db"));
        assert_eq!(store.busy_timeout, Duration::from_millis(250));
        assert_eq!(store.journal_mode, JournalMode::Delete);
    }

    #[test]
    fn test_missing_config_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("absent.toml"))).unwrap().is_none());
    }

    #[test]
    fn test_ensure_db_dir() {
        let dir = tempfile::tempdir().unwrap();
        let db = default_database_path_in(dir.path());
        ensure_db_dir(&db).unwrap();
        assert!(db.parent().unwrap().is_dir());
    }
}
