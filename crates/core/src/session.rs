use std::collections::HashMap;
use std::sync::Mutex;

use tracing::warn;

use crate::catalog::ModelId;

pub const API_KEY_ENTRY: &str = "gemini_api_key";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";

/// Named string entries that outlive the process.
pub trait KeyStore {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&self, name: &str, value: &str) -> Result<(), String>;
    fn remove(&self, name: &str) -> Result<(), String>;
}

#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(name: &str, value: &str) -> Self {
        let s = Self::default();
        if let Ok(mut map) = s.entries.lock() {
            map.insert(name.to_string(), value.to_string());
        }
        s
    }
}

impl KeyStore for MemoryKeyStore {
    fn get(&self, name: &str) -> Option<String> {
        self.entries.lock().ok()?.get(name).cloned()
    }

    fn set(&self, name: &str, value: &str) -> Result<(), String> {
        let mut map = self.entries.lock().map_err(|e| e.to_string())?;
        map.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), String> {
        let mut map = self.entries.lock().map_err(|e| e.to_string())?;
        map.remove(name);
        Ok(())
    }
}

impl<T: KeyStore + ?Sized> KeyStore for Box<T> {
    fn get(&self, name: &str) -> Option<String> {
        (**self).get(name)
    }
    fn set(&self, name: &str, value: &str) -> Result<(), String> {
        (**self).set(name, value)
    }
    fn remove(&self, name: &str) -> Result<(), String> {
        (**self).remove(name)
    }
}

/// Credential, model selection and the busy flag for one conversation.
pub struct Session<S: KeyStore> {
    api_key: String,
    model: String,
    busy: bool,
    store: S,
}

impl<S: KeyStore> Session<S> {
    pub fn hydrate(store: S) -> Self {
        let api_key = store
            .get(API_KEY_ENTRY)
            .map(|k| k.trim().to_string())
            .unwrap_or_default();
        Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            busy: false,
            store,
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.set_model(model);
        self
    }

    /// Trims and persists the key, returning whether `draft` could be sent now.
    pub fn set_api_key(&mut self, raw: &str, draft: &str) -> bool {
        self.api_key = raw.trim().to_string();
        let res = if self.api_key.is_empty() {
            self.store.remove(API_KEY_ENTRY)
        } else {
            self.store.set(API_KEY_ENTRY, &self.api_key)
        };
        if let Err(e) = res {
            warn!(target: "core::session", "persist api key failed: {}", e);
        }
        self.can_send(draft)
    }

    /// Stores the model in canonical form, without the `models/` prefix.
    pub fn set_model(&mut self, id: &str) {
        self.model = ModelId::normalize(id).as_str().to_string();
    }

    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn has_key(&self) -> bool {
        !self.api_key.is_empty()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn can_send(&self, draft: &str) -> bool {
        !self.busy && self.has_key() && !draft.trim().is_empty()
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hydrate_without_entry_starts_empty() {
        let s = Session::hydrate(MemoryKeyStore::new());
        assert_eq!(s.api_key(), "");
        assert_eq!(s.model(), DEFAULT_MODEL);
        assert!(!s.is_busy());
        assert!(!s.can_send("hello"));
    }

    #[test]
    fn hydrate_reads_persisted_key() {
        let s = Session::hydrate(MemoryKeyStore::with_entry(API_KEY_ENTRY, "abc"));
        assert_eq!(s.api_key(), "abc");
        assert!(s.can_send("hello"));
    }

    #[test]
    fn set_api_key_trims_and_persists() {
        let mut s = Session::hydrate(MemoryKeyStore::new());
        assert!(s.set_api_key("  k-1  ", "hi"));
        assert_eq!(s.api_key(), "k-1");
        assert_eq!(s.store().get(API_KEY_ENTRY).as_deref(), Some("k-1"));
    }

    #[test]
    fn clearing_key_removes_entry() {
        let mut s = Session::hydrate(MemoryKeyStore::with_entry(API_KEY_ENTRY, "abc"));
        assert!(!s.set_api_key("   ", "hi"));
        assert_eq!(s.store().get(API_KEY_ENTRY), None);
    }

    #[test]
    fn model_is_stored_without_provider_prefix() {
        let mut s = Session::hydrate(MemoryKeyStore::new()).with_model(" models/gemini-pro ");
        assert_eq!(s.model(), "gemini-pro");
        s.set_model("models/gemini-flash");
        assert_eq!(s.model(), "gemini-flash");
    }

    #[test]
    fn send_gate() {
        let mut s = Session::hydrate(MemoryKeyStore::with_entry(API_KEY_ENTRY, "abc"));
        assert!(!s.can_send("   \n "));
        s.set_busy(true);
        assert!(!s.can_send("hello"));
        s.set_busy(false);
        assert!(s.can_send("hello"));
    }
}
