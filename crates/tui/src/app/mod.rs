use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use gemchat_core::catalog::ModelId;
use gemchat_core::{Command, Controller, Event, KeyStore};
use ratatui::layout::Rect;
use tracing::{debug, info};

use crate::worker::{Outcome, Worker};

pub mod chat;
pub mod input;

use chat::WrappedEntry;
use input::LineEditor;

pub type Store = Box<dyn KeyStore>;

pub struct KeyEditorState {
    pub editor: LineEditor,
}

#[derive(Clone)]
pub struct ModelPickerState {
    pub filter: LineEditor,
    pub filtered: Vec<ModelId>,
    pub selected: usize,
}

pub enum Overlay {
    KeyEditor(KeyEditorState),
    ModelPicker(ModelPickerState),
    Alert(String),
    Help,
}

pub struct App {
    pub controller: Controller<Store>,
    worker: Worker,
    pub server_label: String,
    pub input: LineEditor,
    pub overlay: Option<Overlay>,
    pub reveal_key: bool,
    pub should_quit: bool,
    pub dirty: bool,
    pub tick: u64,
    pub chat_scroll: u16,
    pub stick_to_bottom: bool,
    pub chat_area: Option<Rect>,
    pub chat_viewport: u16,
    pub chat_wrap_width: u16,
    pub chat_cache: Vec<WrappedEntry>,
    pub chat_total_lines: usize,
    chat_rev: u64,
    chat_cache_rev: u64,
    pub input_visible_lines: u16,
    pub input_max_lines: u16,
}

impl App {
    pub fn new(controller: Controller<Store>, worker: Worker, server_label: String) -> Self {
        Self {
            controller,
            worker,
            server_label,
            input: LineEditor::default(),
            overlay: None,
            reveal_key: false,
            should_quit: false,
            dirty: true,
            tick: 0,
            chat_scroll: 0,
            stick_to_bottom: true,
            chat_area: None,
            chat_viewport: 0,
            chat_wrap_width: 0,
            chat_cache: Vec::new(),
            chat_total_lines: 0,
            chat_rev: 1,
            chat_cache_rev: 0,
            input_visible_lines: 1,
            input_max_lines: 6,
        }
    }

    /// Loads the model list right away when a key was restored from the store.
    pub fn start(&mut self) {
        if self.controller.session().has_key() {
            self.run(Command::RefreshCatalog);
        } else {
            self.open_key_editor();
        }
    }

    fn run(&mut self, cmd: Command) {
        if let Some(req) = self.controller.dispatch(cmd) {
            self.worker.submit(req);
        }
        self.pump_events();
    }

    fn pump_events(&mut self) {
        for ev in self.controller.drain_events() {
            match ev {
                Event::EntryAppended(_) | Event::EntryRemoved(_) => {
                    self.chat_rev = self.chat_rev.wrapping_add(1);
                    self.stick_to_bottom = true;
                }
                Event::DraftCleared => self.input.clear(),
                Event::Alert(msg) => {
                    info!(target: "tui", "alert: {}", msg);
                    self.overlay = Some(Overlay::Alert(msg));
                }
                Event::ModelChanged(id) => {
                    info!(target: "tui", "model: {}", id);
                }
                Event::CatalogReplaced(n) => {
                    debug!(target: "tui", "catalog replaced: {} models", n);
                    if let Some(Overlay::ModelPicker(st)) = &mut self.overlay {
                        let catalog = self.controller.catalog();
                        let current = self.controller.session().model();
                        refilter(st, catalog.filter(st.filter.text()), current);
                    }
                }
                Event::SendEnabled(_) | Event::BusyChanged(_) | Event::RefreshLabelChanged(_) => {}
            }
            self.dirty = true;
        }
    }

    fn sync_draft(&mut self) {
        let text = self.input.text().to_string();
        self.run(Command::EditDraft(text));
    }

    pub fn insert_text(&mut self, s: &str) {
        match &mut self.overlay {
            Some(Overlay::KeyEditor(st)) => st.editor.insert_text(s.trim()),
            Some(_) => {}
            None => {
                self.input.insert_text(s);
                self.sync_draft();
            }
        }
        self.dirty = true;
    }

    // Returns true if a slash command was handled.
    fn try_handle_slash_command(&mut self, text: &str) -> bool {
        let s = text.trim();
        let Some(rest) = s.strip_prefix('/') else {
            return false;
        };
        let mut parts = rest.splitn(2, char::is_whitespace);
        let cmd = parts.next().unwrap_or("").to_lowercase();
        let arg = parts.next().unwrap_or("").trim();
        match cmd.as_str() {
            "model" if arg.is_empty() => self.open_model_picker(),
            "model" => self.run(Command::SetModel(arg.to_string())),
            "refresh" => self.run(Command::RefreshCatalog),
            "key" => self.open_key_editor(),
            // Anything else is an ordinary message.
            _ => return false,
        }
        true
    }

    pub fn submit(&mut self) {
        let text = self.input.text().to_string();
        if text.trim().is_empty() {
            return;
        }
        if self.try_handle_slash_command(&text) {
            self.input.clear();
            self.sync_draft();
            return;
        }
        if !self.controller.send_enabled() {
            debug!(target: "tui", "submit ignored: send disabled");
            return;
        }
        info!(target: "tui", "submit: model={} len={}", self.controller.session().model(), text.len());
        self.run(Command::Send(text));
        self.chat_scroll = 0;
    }

    pub fn open_key_editor(&mut self) {
        let key = self.controller.session().api_key();
        self.overlay = Some(Overlay::KeyEditor(KeyEditorState {
            editor: LineEditor::with_text(key),
        }));
        self.dirty = true;
    }

    pub fn open_model_picker(&mut self) {
        let mut st = ModelPickerState {
            filter: LineEditor::default(),
            filtered: Vec::new(),
            selected: 0,
        };
        let catalog = self.controller.catalog();
        refilter(&mut st, catalog.filter(""), self.controller.session().model());
        self.overlay = Some(Overlay::ModelPicker(st));
        self.dirty = true;
    }

    pub fn refresh_models(&mut self) {
        self.run(Command::RefreshCatalog);
    }

    pub fn scroll_up(&mut self, n: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(n);
        self.stick_to_bottom = false;
        self.dirty = true;
    }

    pub fn scroll_down(&mut self, n: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(n);
        if self.chat_scroll == 0 {
            self.stick_to_bottom = true;
        }
        self.dirty = true;
    }

    pub fn on_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        self.dirty = true;
        match self.overlay.take() {
            Some(overlay) => self.on_overlay_key(overlay, key),
            None => self.on_main_key(key),
        }
    }

    // The overlay is put back unless the key closed it.
    fn on_overlay_key(&mut self, overlay: Overlay, key: KeyEvent) {
        match overlay {
            Overlay::Help => match key.code {
                KeyCode::Esc | KeyCode::F(1) | KeyCode::Char('?') | KeyCode::Enter => {}
                _ => self.overlay = Some(Overlay::Help),
            },
            Overlay::Alert(msg) => match key.code {
                KeyCode::Esc | KeyCode::Enter => {}
                _ => self.overlay = Some(Overlay::Alert(msg)),
            },
            Overlay::KeyEditor(mut st) => match key.code {
                KeyCode::Esc => {}
                KeyCode::Enter => {
                    let raw = st.editor.text().to_string();
                    self.run(Command::SetApiKey(raw));
                    info!(target: "tui", "api key saved, present={}", self.controller.session().has_key());
                    if self.controller.session().has_key() {
                        self.run(Command::RefreshCatalog);
                    }
                }
                KeyCode::F(3) => {
                    self.reveal_key = !self.reveal_key;
                    self.overlay = Some(Overlay::KeyEditor(st));
                }
                _ => {
                    st.editor.handle_key(&key);
                    self.overlay = Some(Overlay::KeyEditor(st));
                }
            },
            Overlay::ModelPicker(mut st) => match key.code {
                KeyCode::Esc => {}
                KeyCode::Enter => match st.filtered.get(st.selected) {
                    Some(id) => {
                        let id = id.as_str().to_string();
                        self.run(Command::SetModel(id));
                    }
                    None => self.overlay = Some(Overlay::ModelPicker(st)),
                },
                KeyCode::Up => {
                    st.selected = st.selected.saturating_sub(1);
                    self.overlay = Some(Overlay::ModelPicker(st));
                }
                KeyCode::Down => {
                    if st.selected + 1 < st.filtered.len() {
                        st.selected += 1;
                    }
                    self.overlay = Some(Overlay::ModelPicker(st));
                }
                KeyCode::F(5) => {
                    self.overlay = Some(Overlay::ModelPicker(st));
                    self.refresh_models();
                }
                _ => {
                    if st.filter.handle_key(&key) {
                        let found = self.controller.catalog().filter(st.filter.text());
                        refilter(&mut st, found, self.controller.session().model());
                    }
                    self.overlay = Some(Overlay::ModelPicker(st));
                }
            },
        }
    }

    fn on_main_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => self.should_quit = true,
            KeyCode::Esc => self.should_quit = true,
            KeyCode::F(1) => self.overlay = Some(Overlay::Help),
            KeyCode::Char('?') if self.input.is_empty() => self.overlay = Some(Overlay::Help),
            KeyCode::F(2) => self.open_key_editor(),
            KeyCode::F(3) => self.reveal_key = !self.reveal_key,
            KeyCode::F(4) => self.open_model_picker(),
            KeyCode::F(5) => self.refresh_models(),
            KeyCode::Char('r') if ctrl => self.refresh_models(),
            KeyCode::Enter if key.modifiers.contains(KeyModifiers::SHIFT) => {
                self.input.insert_char('\n');
                self.sync_draft();
            }
            KeyCode::Enter => self.submit(),
            KeyCode::PageUp => self.scroll_up(self.chat_viewport.max(1)),
            KeyCode::PageDown => self.scroll_down(self.chat_viewport.max(1)),
            KeyCode::Up if ctrl => self.scroll_up(1),
            KeyCode::Down if ctrl => self.scroll_down(1),
            KeyCode::Home if ctrl => self.scroll_up(u16::MAX),
            KeyCode::End if ctrl => self.scroll_down(u16::MAX),
            _ => {
                if self.input.handle_key(&key) {
                    self.sync_draft();
                }
            }
        }
    }

    fn apply_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Chat(ticket, res) => self.controller.finish_send(ticket, res),
            Outcome::Catalog(ticket, res) => {
                // Failures already arrive as an alert event.
                if let Err(e) = self.controller.finish_refresh(ticket, res) {
                    debug_assert!(e.is_blocking());
                    debug!(target: "tui", "refresh failed: {}", e);
                }
            }
        }
        self.pump_events();
    }

    pub fn on_tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
        while let Some(outcome) = self.worker.try_recv() {
            self.apply_outcome(outcome);
        }
        self.run(Command::Tick(Instant::now()));
        if self.controller.session().is_busy() {
            // Keep the spinner moving.
            self.dirty = true;
        }
    }
}

fn refilter(st: &mut ModelPickerState, found: Vec<ModelId>, current: &str) {
    st.filtered = found;
    st.selected = st
        .filtered
        .iter()
        .position(|m| m.as_str() == current)
        .unwrap_or_else(|| st.selected.min(st.filtered.len().saturating_sub(1)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemchat_core::controller::Request;
    use gemchat_core::session::API_KEY_ENTRY;
    use gemchat_core::transcript::EntryKind;
    use gemchat_core::{ClientError, MemoryKeyStore, Session, Transcript};

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(app: &mut App, s: &str) {
        for ch in s.chars() {
            app.on_key(press(KeyCode::Char(ch)));
        }
    }

    fn app_with(key: Option<&str>, worker: Worker) -> App {
        let store: Store = match key {
            Some(k) => Box::new(MemoryKeyStore::with_entry(API_KEY_ENTRY, k)),
            None => Box::new(MemoryKeyStore::new()),
        };
        let controller = Controller::new(Session::hydrate(store), Transcript::new());
        App::new(controller, worker, "test".into())
    }

    fn echo_worker() -> Worker {
        Worker::from_fn(|req| match req {
            Request::Chat(t) => {
                let reply = format!("**echo** {}", t.request.message);
                Outcome::Chat(t, Ok(reply))
            }
            Request::Catalog(t) => Outcome::Catalog(
                t,
                Ok(vec!["models/gemini-pro".into(), "models/gemini-2.0-flash-exp".into()]),
            ),
        })
    }

    fn kinds(app: &App) -> Vec<EntryKind> {
        app.controller.transcript().entries().iter().map(|e| e.kind).collect()
    }

    #[test]
    fn start_without_key_opens_key_editor() {
        let mut app = app_with(None, echo_worker());
        app.start();
        assert!(matches!(app.overlay, Some(Overlay::KeyEditor(_))));
        assert!(app.controller.catalog().is_empty());
    }

    #[test]
    fn start_with_key_loads_catalog_on_tick() {
        let mut app = app_with(Some("k"), echo_worker());
        app.start();
        app.on_tick();
        assert_eq!(app.controller.catalog().len(), 2);
        assert!(app.overlay.is_none());
    }

    #[test]
    fn enter_sends_and_reply_arrives_on_tick() {
        let mut app = app_with(Some("k"), echo_worker());
        type_text(&mut app, "hi");
        assert!(app.controller.send_enabled());
        app.on_key(press(KeyCode::Enter));
        assert!(app.input.is_empty());
        assert_eq!(kinds(&app), vec![EntryKind::User, EntryKind::Pending]);
        app.on_tick();
        assert_eq!(kinds(&app), vec![EntryKind::User, EntryKind::Bot]);
        let last = app.controller.transcript().last().expect("entry");
        assert_eq!(last.body.plain_text(), "echo hi");
        assert!(!app.controller.session().is_busy());
    }

    #[test]
    fn shift_enter_inserts_newline_instead_of_sending() {
        let mut app = app_with(Some("k"), echo_worker());
        type_text(&mut app, "a");
        app.on_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::SHIFT));
        type_text(&mut app, "b");
        assert_eq!(app.input.text(), "a\nb");
        assert!(app.controller.transcript().is_empty());
    }

    #[test]
    fn typing_without_key_keeps_send_disabled() {
        let mut app = app_with(None, echo_worker());
        type_text(&mut app, "hello");
        assert!(!app.controller.send_enabled());
        app.on_key(press(KeyCode::Enter));
        assert!(app.controller.transcript().is_empty());
        assert_eq!(app.input.text(), "hello");
    }

    #[test]
    fn key_editor_saves_key_and_refreshes() {
        let mut app = app_with(None, echo_worker());
        app.on_key(press(KeyCode::F(2)));
        type_text(&mut app, " secret ");
        app.on_key(press(KeyCode::Enter));
        assert!(app.overlay.is_none());
        assert_eq!(app.controller.session().api_key(), "secret");
        assert_eq!(
            app.controller.session().store().get(API_KEY_ENTRY).as_deref(),
            Some("secret")
        );
        app.on_tick();
        assert_eq!(app.controller.catalog().len(), 2);
    }

    #[test]
    fn key_editor_escape_discards_changes() {
        let mut app = app_with(Some("old"), echo_worker());
        app.on_key(press(KeyCode::F(2)));
        type_text(&mut app, "new");
        app.on_key(press(KeyCode::Esc));
        assert!(app.overlay.is_none());
        assert_eq!(app.controller.session().api_key(), "old");
        assert!(!app.should_quit);
    }

    #[test]
    fn refresh_without_key_shows_alert() {
        let mut app = app_with(None, echo_worker());
        app.on_key(press(KeyCode::F(5)));
        match &app.overlay {
            Some(Overlay::Alert(msg)) => assert_eq!(msg, "Please enter an API Key first"),
            _ => panic!("expected alert"),
        }
        app.on_key(press(KeyCode::Enter));
        assert!(app.overlay.is_none());
    }

    #[test]
    fn catalog_failure_surfaces_alert() {
        let worker = Worker::from_fn(|req| match req {
            Request::Catalog(t) => {
                Outcome::Catalog(t, Err(ClientError::CatalogFetch("bad key".into())))
            }
            Request::Chat(t) => Outcome::Chat(t, Ok(String::new())),
        });
        let mut app = app_with(Some("k"), worker);
        app.refresh_models();
        app.on_tick();
        match &app.overlay {
            Some(Overlay::Alert(msg)) => assert_eq!(msg, "Error fetching models: bad key"),
            _ => panic!("expected alert"),
        }
    }

    #[test]
    fn model_picker_filters_and_selects() {
        let mut app = app_with(Some("k"), echo_worker());
        app.refresh_models();
        app.on_tick();
        app.on_key(press(KeyCode::F(4)));
        type_text(&mut app, "pro");
        match &app.overlay {
            Some(Overlay::ModelPicker(st)) => {
                let names: Vec<&str> = st.filtered.iter().map(|m| m.as_str()).collect();
                assert_eq!(names, vec!["gemini-pro"]);
            }
            _ => panic!("expected picker"),
        }
        app.on_key(press(KeyCode::Enter));
        assert!(app.overlay.is_none());
        assert_eq!(app.controller.session().model(), "gemini-pro");
    }

    #[test]
    fn slash_commands_are_not_sent() {
        let mut app = app_with(Some("k"), echo_worker());
        type_text(&mut app, "/model custom-model");
        app.on_key(press(KeyCode::Enter));
        assert_eq!(app.controller.session().model(), "custom-model");
        assert!(app.input.is_empty());
        assert!(app.controller.transcript().is_empty());

        type_text(&mut app, "/unknown thing");
        app.on_key(press(KeyCode::Enter));
        assert_eq!(kinds(&app), vec![EntryKind::User, EntryKind::Pending]);
    }

    #[test]
    fn scrolling_releases_and_restores_bottom_stick() {
        let mut app = app_with(Some("k"), echo_worker());
        app.chat_viewport = 5;
        app.on_key(press(KeyCode::PageUp));
        assert!(!app.stick_to_bottom);
        assert_eq!(app.chat_scroll, 5);
        app.on_key(press(KeyCode::PageDown));
        assert!(app.stick_to_bottom);
    }

    #[test]
    fn question_mark_is_text_once_typing() {
        let mut app = app_with(Some("k"), echo_worker());
        type_text(&mut app, "why?");
        assert_eq!(app.input.text(), "why?");
        assert!(app.overlay.is_none());
        app.input.clear();
        app.on_key(press(KeyCode::Char('?')));
        assert!(matches!(app.overlay, Some(Overlay::Help)));
    }
}
