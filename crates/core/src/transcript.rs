use crate::markdown::Markup;

pub const PENDING_LABEL: &str = "Thinking...";
pub const WELCOME: &str =
    "Hello! Enter your API key (F2), pick a model (F4) and start chatting. Press ? for help.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

impl EntryId {
    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    User,
    Bot,
    Error,
    Pending,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryBody {
    Plain(String),
    Markup(Markup),
}

impl EntryBody {
    pub fn plain_text(&self) -> String {
        match self {
            EntryBody::Plain(s) => s.clone(),
            EntryBody::Markup(m) => m.plain_text(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub id: EntryId,
    pub kind: EntryKind,
    pub body: EntryBody,
}

/// Append-only log of rendered entries. Only pending placeholders are ever removed.
#[derive(Debug)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    next_id: u64,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }

    pub fn with_welcome() -> Self {
        let mut t = Self::new();
        t.push_bot(crate::markdown::render(WELCOME));
        t
    }

    fn push(&mut self, kind: EntryKind, body: EntryBody) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        self.entries.push(TranscriptEntry { id, kind, body });
        id
    }

    pub fn push_user(&mut self, text: impl Into<String>) -> EntryId {
        self.push(EntryKind::User, EntryBody::Plain(text.into()))
    }

    pub fn push_bot(&mut self, markup: Markup) -> EntryId {
        self.push(EntryKind::Bot, EntryBody::Markup(markup))
    }

    pub fn push_error(&mut self, text: impl Into<String>) -> EntryId {
        self.push(EntryKind::Error, EntryBody::Plain(text.into()))
    }

    pub fn push_pending(&mut self) -> EntryId {
        self.push(EntryKind::Pending, EntryBody::Plain(PENDING_LABEL.to_string()))
    }

    /// Removes the pending entry carrying `id`. Returns false if no such pending entry exists.
    pub fn remove_pending(&mut self, id: EntryId) -> bool {
        match self
            .entries
            .iter()
            .position(|e| e.id == id && e.kind == EntryKind::Pending)
        {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn get(&self, id: EntryId) -> Option<&TranscriptEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    pub fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.kind == EntryKind::Pending)
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
