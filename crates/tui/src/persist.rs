use std::{collections::BTreeMap, fs, io::Write, path::PathBuf};

use anyhow::{Context, Result};
use directories::BaseDirs;
use gemchat_core::KeyStore;

/// Key-value entries kept in a small JSON object on disk.
pub struct FileKeyStore {
    path: PathBuf,
}

impl FileKeyStore {
    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn default_location() -> Option<Self> {
        store_path().map(Self::at)
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let data = fs::read(&self.path)
            .with_context(|| format!("read store file: {}", self.path.display()))?;
        let map = serde_json::from_slice(&data).with_context(|| "parse store json")?;
        Ok(map)
    }

    fn save(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create dir: {}", parent.display()))?;
        }
        let data = serde_json::to_vec_pretty(map)?;
        let mut tmp = self.path.clone();
        tmp.set_extension("json.tmp");
        {
            let mut f =
                fs::File::create(&tmp).with_context(|| format!("create tmp: {}", tmp.display()))?;
            f.write_all(&data)?;
            f.flush()?;
        }
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("persist store to {}", self.path.display()))?;
        Ok(())
    }
}

impl KeyStore for FileKeyStore {
    fn get(&self, name: &str) -> Option<String> {
        match self.load() {
            Ok(map) => map.get(name).cloned(),
            Err(e) => {
                tracing::warn!(target: "tui", "key store unreadable: {:#}", e);
                None
            }
        }
    }

    fn set(&self, name: &str, value: &str) -> Result<(), String> {
        let mut map = self.load().unwrap_or_default();
        map.insert(name.to_string(), value.to_string());
        self.save(&map).map_err(|e| format!("{:#}", e))
    }

    fn remove(&self, name: &str) -> Result<(), String> {
        let mut map = self.load().map_err(|e| format!("{:#}", e))?;
        if map.remove(name).is_none() {
            return Ok(());
        }
        self.save(&map).map_err(|e| format!("{:#}", e))
    }
}

pub fn store_path() -> Option<PathBuf> {
    let base = BaseDirs::new()?;
    Some(base.config_dir().join("gemchat").join("store.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemchat_core::session::API_KEY_ENTRY;

    #[test]
    fn set_get_remove_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::at(dir.path().join("nested").join("store.json"));
        assert_eq!(store.get(API_KEY_ENTRY), None);

        store.set(API_KEY_ENTRY, "abc").unwrap();
        let reopened = FileKeyStore::at(dir.path().join("nested").join("store.json"));
        assert_eq!(reopened.get(API_KEY_ENTRY).as_deref(), Some("abc"));

        reopened.remove(API_KEY_ENTRY).unwrap();
        assert_eq!(store.get(API_KEY_ENTRY), None);
    }

    #[test]
    fn other_entries_survive_updates() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::at(dir.path().join("store.json"));
        store.set("other", "1").unwrap();
        store.set(API_KEY_ENTRY, "k").unwrap();
        store.remove(API_KEY_ENTRY).unwrap();
        assert_eq!(store.get("other").as_deref(), Some("1"));
    }

    #[test]
    fn corrupt_file_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, b"{not json").unwrap();
        let store = FileKeyStore::at(path);
        assert_eq!(store.get(API_KEY_ENTRY), None);
        assert!(store.remove(API_KEY_ENTRY).is_err());
    }
}
