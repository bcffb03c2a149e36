use std::fmt;
use std::time::{Duration, Instant};

pub const PROVIDER_PREFIX: &str = "models/";
pub const UPDATED_LABEL_TTL: Duration = Duration::from_secs(2);

/// Model identifier without the provider namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelId(String);

impl ModelId {
    pub fn normalize(raw: &str) -> Self {
        let raw = raw.trim();
        ModelId(raw.strip_prefix(PROVIDER_PREFIX).unwrap_or(raw).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    /// Previous selection is still offered.
    Kept(ModelId),
    /// Previous selection vanished; the first entry took its place.
    Switched(ModelId),
    /// Empty catalog and nothing to fall back to.
    Unchanged,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModelCatalog {
    models: Vec<ModelId>,
}

impl ModelCatalog {
    pub fn models(&self) -> &[ModelId] {
        &self.models
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Replaces the catalog with `raw` and works out what should be selected.
    pub fn reconcile(&mut self, raw: &[String], current: &str) -> Selection {
        self.models = raw.iter().map(|m| ModelId::normalize(m)).collect();
        let current = ModelId::normalize(current);
        if self.models.contains(&current) {
            Selection::Kept(current)
        } else if let Some(first) = self.models.first() {
            Selection::Switched(first.clone())
        } else {
            Selection::Unchanged
        }
    }

    /// Case-insensitive substring filter, used by the picker.
    pub fn filter(&self, query: &str) -> Vec<ModelId> {
        let q = query.trim().to_lowercase();
        self.models
            .iter()
            .filter(|m| q.is_empty() || m.as_str().to_lowercase().contains(&q))
            .cloned()
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshLabel {
    Idle,
    Loading,
    Updated { since: Instant },
}

impl RefreshLabel {
    pub fn text(&self) -> &'static str {
        match self {
            RefreshLabel::Idle => "Refresh Models",
            RefreshLabel::Loading => "Loading...",
            RefreshLabel::Updated { .. } => "Updated",
        }
    }

    /// Reverts `Updated` once it has been shown long enough. Returns true on change.
    pub fn tick(&mut self, now: Instant) -> bool {
        if let RefreshLabel::Updated { since } = *self {
            if now.saturating_duration_since(since) >= UPDATED_LABEL_TTL {
                *self = RefreshLabel::Idle;
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn normalize_strips_leading_prefix_only() {
        assert_eq!(ModelId::normalize("models/gemini-pro").as_str(), "gemini-pro");
        assert_eq!(ModelId::normalize("gemini-pro").as_str(), "gemini-pro");
        assert_eq!(
            ModelId::normalize("tuned/models/x").as_str(),
            "tuned/models/x"
        );
    }

    #[test]
    fn keeps_previous_selection_when_present() {
        let mut c = ModelCatalog::default();
        let sel = c.reconcile(
            &names(&["models/gemini-pro", "models/gemini-flash"]),
            "gemini-flash",
        );
        assert_eq!(sel, Selection::Kept(ModelId::normalize("gemini-flash")));
        let got: Vec<&str> = c.models().iter().map(|m| m.as_str()).collect();
        assert_eq!(got, vec!["gemini-pro", "gemini-flash"]);
    }

    #[test]
    fn switches_to_first_when_selection_missing() {
        let mut c = ModelCatalog::default();
        let sel = c.reconcile(&names(&["models/a", "models/b"]), "gone");
        assert_eq!(sel, Selection::Switched(ModelId::normalize("a")));
    }

    #[test]
    fn empty_list_leaves_selection_alone() {
        let mut c = ModelCatalog::default();
        c.reconcile(&names(&["models/a"]), "a");
        assert_eq!(c.reconcile(&[], "a"), Selection::Unchanged);
        assert!(c.is_empty());
    }

    #[test]
    fn filter_is_case_insensitive() {
        let mut c = ModelCatalog::default();
        c.reconcile(&names(&["models/Gemini-Pro", "models/flash"]), "");
        assert_eq!(c.filter("gem"), vec![ModelId::normalize("Gemini-Pro")]);
        assert_eq!(c.filter("").len(), 2);
    }

    #[test]
    fn updated_label_reverts_after_ttl() {
        let start = Instant::now();
        let mut l = RefreshLabel::Updated { since: start };
        assert!(!l.tick(start + Duration::from_millis(500)));
        assert_eq!(l.text(), "Updated");
        assert!(l.tick(start + UPDATED_LABEL_TTL));
        assert_eq!(l, RefreshLabel::Idle);
        assert!(!l.tick(start + Duration::from_secs(10)));
    }
}
