use std::time::Instant;

use tracing::{debug, info, warn};

use crate::api::{ChatBackend, ChatRequest, ClientError};
use crate::catalog::{ModelCatalog, ModelId, RefreshLabel, Selection};
use crate::markdown;
use crate::session::{KeyStore, Session};
use crate::transcript::{EntryId, EntryKind, Transcript};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    SetApiKey(String),
    SetModel(String),
    EditDraft(String),
    Send(String),
    RefreshCatalog,
    Tick(Instant),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    SendEnabled(bool),
    BusyChanged(bool),
    EntryAppended(EntryId),
    EntryRemoved(EntryId),
    DraftCleared,
    ModelChanged(ModelId),
    CatalogReplaced(usize),
    RefreshLabelChanged(RefreshLabel),
    Alert(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    AwaitingKey,
    Idle,
    /// Busy before the placeholder is pushed. `begin_send` sets both in one call, so this
    /// is never observed between commands.
    Sending,
    Thinking,
    Error,
}

/// A chat request that has been admitted and is waiting for its reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendTicket {
    pub pending: EntryId,
    pub request: ChatRequest,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshTicket {
    pub api_key: String,
}

/// I/O the caller has to perform after a dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    Chat(SendTicket),
    Catalog(RefreshTicket),
}

pub struct Controller<S: KeyStore> {
    session: Session<S>,
    catalog: ModelCatalog,
    transcript: Transcript,
    draft: String,
    refresh_label: RefreshLabel,
    refreshes_in_flight: usize,
    send_enabled: bool,
    events: Vec<Event>,
}

impl<S: KeyStore> Controller<S> {
    pub fn new(session: Session<S>, transcript: Transcript) -> Self {
        Self {
            session,
            catalog: ModelCatalog::default(),
            transcript,
            draft: String::new(),
            refresh_label: RefreshLabel::Idle,
            refreshes_in_flight: 0,
            send_enabled: false,
            events: Vec::new(),
        }
    }

    pub fn session(&self) -> &Session<S> {
        &self.session
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn refresh_label(&self) -> RefreshLabel {
        self.refresh_label
    }

    pub fn send_enabled(&self) -> bool {
        self.send_enabled
    }

    pub fn phase(&self) -> Phase {
        if self.session.is_busy() {
            if self.transcript.pending_count() > 0 {
                Phase::Thinking
            } else {
                Phase::Sending
            }
        } else if !self.session.has_key() {
            Phase::AwaitingKey
        } else if matches!(self.transcript.last(), Some(e) if e.kind == EntryKind::Error) {
            Phase::Error
        } else {
            Phase::Idle
        }
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Applies a command. Returns the request to run when the command needs the network.
    pub fn dispatch(&mut self, cmd: Command) -> Option<Request> {
        match cmd {
            Command::SetApiKey(raw) => {
                self.session.set_api_key(&raw, &self.draft);
                debug!(target: "core::controller", "api key set, present={}", self.session.has_key());
                self.sync_send_enabled();
                None
            }
            Command::SetModel(id) => {
                let id = ModelId::normalize(&id);
                self.session.set_model(id.as_str());
                self.events.push(Event::ModelChanged(id));
                None
            }
            Command::EditDraft(text) => {
                self.draft = text;
                self.sync_send_enabled();
                None
            }
            Command::Send(raw) => self.begin_send(&raw).map(Request::Chat),
            Command::RefreshCatalog => self.begin_refresh().ok().map(Request::Catalog),
            Command::Tick(now) => {
                if self.refresh_label.tick(now) {
                    self.events
                        .push(Event::RefreshLabelChanged(self.refresh_label));
                }
                None
            }
        }
    }

    pub fn begin_send(&mut self, raw: &str) -> Option<SendTicket> {
        let message = raw.trim();
        if self.session.is_busy() || !self.session.has_key() || message.is_empty() {
            debug!(
                target: "core::controller",
                "send rejected busy={} key={} empty={}",
                self.session.is_busy(),
                self.session.has_key(),
                message.is_empty()
            );
            return None;
        }
        let message = message.to_string();
        let user = self.transcript.push_user(message.clone());
        self.events.push(Event::EntryAppended(user));
        self.draft.clear();
        self.events.push(Event::DraftCleared);
        self.session.set_busy(true);
        self.events.push(Event::BusyChanged(true));
        self.sync_send_enabled();

        let pending = self.transcript.push_pending();
        self.events.push(Event::EntryAppended(pending));
        info!(
            target: "core::controller",
            "send: model={} len={} pending={}",
            self.session.model(),
            message.len(),
            pending.get()
        );
        Some(SendTicket {
            pending,
            request: ChatRequest {
                message,
                api_key: self.session.api_key().to_string(),
                model: self.session.model().to_string(),
            },
        })
    }

    pub fn finish_send(&mut self, ticket: SendTicket, result: Result<String, ClientError>) {
        if self.transcript.remove_pending(ticket.pending) {
            self.events.push(Event::EntryRemoved(ticket.pending));
        } else {
            warn!(target: "core::controller", "pending entry {} already gone", ticket.pending.get());
        }
        let id = match result {
            Ok(reply) => self.transcript.push_bot(markdown::render(&reply)),
            Err(e) => {
                warn!(target: "core::controller", "chat failed: {}", e);
                self.transcript.push_error(format!("Error: {}", e))
            }
        };
        self.events.push(Event::EntryAppended(id));
        self.session.set_busy(false);
        self.events.push(Event::BusyChanged(false));
        self.sync_send_enabled();
    }

    pub fn begin_refresh(&mut self) -> Result<RefreshTicket, ClientError> {
        if !self.session.has_key() {
            let e = ClientError::MissingCredential;
            self.events.push(Event::Alert(e.to_string()));
            return Err(e);
        }
        self.refreshes_in_flight += 1;
        self.set_refresh_label(RefreshLabel::Loading);
        info!(target: "core::controller", "refresh catalog in_flight={}", self.refreshes_in_flight);
        Ok(RefreshTicket {
            api_key: self.session.api_key().to_string(),
        })
    }

    /// Applies a catalog response. Concurrent refreshes are not ordered; the last one applied wins.
    pub fn finish_refresh(
        &mut self,
        _ticket: RefreshTicket,
        result: Result<Vec<String>, ClientError>,
    ) -> Result<Selection, ClientError> {
        self.refreshes_in_flight = self.refreshes_in_flight.saturating_sub(1);
        match result {
            Ok(raw) => {
                let sel = self.catalog.reconcile(&raw, self.session.model());
                self.events.push(Event::CatalogReplaced(self.catalog.len()));
                if let Selection::Switched(id) = &sel {
                    self.session.set_model(id.as_str());
                    self.events.push(Event::ModelChanged(id.clone()));
                }
                info!(
                    target: "core::controller",
                    "catalog replaced models={} selection={}",
                    self.catalog.len(),
                    self.session.model()
                );
                self.set_refresh_label(RefreshLabel::Updated {
                    since: Instant::now(),
                });
                Ok(sel)
            }
            Err(e) => {
                let e = match e {
                    ClientError::Transport(m) | ClientError::ChatRequest(m) => {
                        ClientError::CatalogFetch(m)
                    }
                    other => other,
                };
                warn!(target: "core::controller", "catalog refresh failed: {}", e);
                self.events
                    .push(Event::Alert(format!("Error fetching models: {}", e)));
                if self.refreshes_in_flight == 0 {
                    self.set_refresh_label(RefreshLabel::Idle);
                }
                Err(e)
            }
        }
    }

    /// Runs a full send cycle against `backend`. Returns false when the send was rejected.
    pub async fn send<B: ChatBackend>(&mut self, backend: &B, raw: &str) -> bool {
        let Some(ticket) = self.begin_send(raw) else {
            return false;
        };
        let res = backend.chat(&ticket.request).await;
        self.finish_send(ticket, res);
        true
    }

    pub async fn refresh<B: ChatBackend>(&mut self, backend: &B) -> Result<Selection, ClientError> {
        let ticket = self.begin_refresh()?;
        let res = backend.list_models(&ticket.api_key).await;
        self.finish_refresh(ticket, res)
    }

    fn set_refresh_label(&mut self, label: RefreshLabel) {
        if self.refresh_label != label {
            self.refresh_label = label;
            self.events.push(Event::RefreshLabelChanged(label));
        }
    }

    fn sync_send_enabled(&mut self) {
        let now = self.session.can_send(&self.draft);
        if now != self.send_enabled {
            self.send_enabled = now;
            self.events.push(Event::SendEnabled(now));
        }
    }
}
