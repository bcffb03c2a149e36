use ratatui::{
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
    Frame,
};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::app::{App, KeyEditorState, ModelPickerState, Overlay};
use crate::strings::{
    build_status_line, build_stick_label, help_lines_ascii, key_status, mask_key, phase_label,
    spinner, ALERT_HINT, INPUT_HINT, INPUT_HINT_NO_KEY, KEY_EDITOR_HINT, PICKER_EMPTY, TITLE_ALERT,
    TITLE_API_KEY, TITLE_CHAT, TITLE_HELP, TITLE_INPUT, TITLE_MODELS,
};
use crate::theme::THEME;

pub fn draw(f: &mut Frame, app: &mut App) {
    let area = f.area();
    let inner_width = area.width.saturating_sub(2);
    let input_total_lines = measure_total_lines(app.input.text(), inner_width).max(1) as u16;
    let target_lines = input_total_lines.min(app.input_max_lines);
    // Grow or shrink the input box one line per frame.
    let current = app.input_visible_lines.max(1);
    app.input_visible_lines = if current < target_lines {
        current + 1
    } else if current > target_lines {
        current - 1
    } else {
        current
    };
    let input_height = app.input_visible_lines + 2;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(5),
            Constraint::Length(1),
            Constraint::Length(input_height),
        ])
        .split(area);

    app.chat_area = Some(chunks[1]);
    draw_header(f, chunks[0], app);
    draw_chat(f, chunks[1], app);
    draw_status(f, chunks[2], app);
    draw_input(f, chunks[3], app, inner_width);

    match &app.overlay {
        Some(Overlay::KeyEditor(st)) => draw_key_editor(f, area, st, app.reveal_key),
        Some(Overlay::ModelPicker(st)) => {
            draw_model_picker(f, area, st, app.controller.session().model())
        }
        Some(Overlay::Alert(msg)) => draw_alert(f, area, msg),
        Some(Overlay::Help) => draw_help(f, area),
        None => {}
    }
}

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
    let session = app.controller.session();
    let dim = Style::default().fg(Color::DarkGray);
    let key_style = if session.has_key() {
        dim
    } else {
        Style::default().fg(THEME.key_missing).add_modifier(Modifier::BOLD)
    };
    let key = if app.reveal_key && session.has_key() {
        format!("Key: {}", mask_key(session.api_key(), true))
    } else {
        key_status(session.api_key())
    };
    let line = Line::from(vec![
        Span::styled(" gemchat ", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
        Span::styled(format!(" {} ", app.server_label), dim),
        Span::raw(" model: "),
        Span::styled(session.model().to_string(), Style::default().fg(THEME.border_focus)),
        Span::raw("  "),
        Span::styled(key, key_style),
        Span::raw("  "),
        Span::styled(format!("[{}]", app.controller.refresh_label().text()), dim),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

fn draw_chat(f: &mut Frame, area: Rect, app: &mut App) {
    let block = Block::default()
        .title(TITLE_CHAT)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(THEME.chat_border));

    let inner_width = area.width.saturating_sub(2);
    let inner_height = area.height.saturating_sub(2);
    app.ensure_chat_wrapped(inner_width);
    let (viewport, _max_scroll, start) = app.compute_chat_layout(inner_height);
    app.chat_viewport = viewport as u16;

    let lines = app.visible_chat_lines(start, viewport);
    f.render_widget(Paragraph::new(lines).block(block), area);

    let inner = Rect {
        x: area.x.saturating_add(1),
        y: area.y.saturating_add(1),
        width: inner_width,
        height: inner_height,
    };
    if app.chat_total_lines > viewport {
        let mut sb_state = ScrollbarState::new(app.chat_total_lines.saturating_sub(viewport))
            .position(start);
        let sb = Scrollbar::default().orientation(ScrollbarOrientation::VerticalRight);
        f.render_stateful_widget(sb, inner, &mut sb_state);
    }
}

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
    let phase = app.controller.phase();
    let phase_text = if app.controller.session().is_busy() {
        format!("{} {}", spinner(app.tick), phase_label(phase))
    } else {
        phase_label(phase).to_string()
    };
    let stick = build_stick_label(app.chat_scroll);
    let tips = build_status_line(
        &phase_text,
        &stick,
        app.controller.session().model(),
        app.controller.refresh_label().text(),
        app.controller.send_enabled(),
        area.width,
    );
    let para = Paragraph::new(Line::from(Span::styled(
        tips,
        Style::default().fg(Color::DarkGray),
    )));
    f.render_widget(para, area);
}

fn draw_input(f: &mut Frame, area: Rect, app: &App, inner_width: u16) {
    let focused = app.overlay.is_none();
    let border_style = if focused && app.controller.send_enabled() {
        Style::default().fg(THEME.border_focus)
    } else {
        Style::default().fg(THEME.border_inactive)
    };
    let block = Block::default()
        .title(TITLE_INPUT)
        .borders(Borders::ALL)
        .border_style(border_style);

    let graphemes: Vec<&str> = app.input.text().graphemes(true).collect();
    let upto = app.input.cursor().min(graphemes.len());
    let (line_idx, col) = measure_prefix_line_col(&graphemes, upto, inner_width);
    let offset_y = line_idx.saturating_sub(app.input_visible_lines.saturating_sub(1));

    let para = if app.input.is_empty() {
        let hint = if app.controller.session().has_key() {
            INPUT_HINT
        } else {
            INPUT_HINT_NO_KEY
        };
        Paragraph::new(Line::from(Span::styled(
            hint,
            Style::default().fg(Color::DarkGray),
        )))
        .block(block)
    } else {
        let lines: Vec<Line> = char_wrap(app.input.text(), inner_width)
            .into_iter()
            .map(Line::from)
            .collect();
        Paragraph::new(lines).block(block).scroll((offset_y, 0))
    };
    f.render_widget(para, area);

    if focused {
        let x = area.x + 1 + col;
        let y = area.y + 1 + line_idx.saturating_sub(offset_y);
        f.set_cursor_position(Position::new(x, y));
    }
}

fn popup_block(title: &'static str) -> Block<'static> {
    Block::default()
        .title(Span::styled(
            title,
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
}

fn draw_help(f: &mut Frame, area: Rect) {
    let popup_area = centered_rect(70, 70, area);
    let lines = help_lines_ascii()
        .iter()
        .map(|s| Line::from(*s))
        .collect::<Vec<Line>>();
    let para = Paragraph::new(lines)
        .block(popup_block(TITLE_HELP))
        .wrap(Wrap { trim: false });
    f.render_widget(Clear, popup_area);
    f.render_widget(para, popup_area);
}

fn draw_key_editor(f: &mut Frame, area: Rect, state: &KeyEditorState, reveal: bool) {
    let popup_area = centered_rect(60, 20, area);
    let shown = mask_key(state.editor.text(), reveal);
    let lines = vec![
        Line::from(format!(">> {}", shown)),
        Line::from(Span::styled(
            KEY_EDITOR_HINT,
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let para = Paragraph::new(lines).block(popup_block(TITLE_API_KEY));
    f.render_widget(Clear, popup_area);
    f.render_widget(para, popup_area);

    // Masking keeps one char per key char, so the cursor maps one to one.
    let upto = state.editor.before_cursor().chars().count();
    let prefix: String = shown.chars().take(upto).collect();
    let cursor_x = popup_area.x + 1 + 3 + UnicodeWidthStr::width(prefix.as_str()) as u16;
    f.set_cursor_position(Position::new(cursor_x, popup_area.y + 1));
}

fn draw_model_picker(f: &mut Frame, area: Rect, state: &ModelPickerState, current: &str) {
    let popup_area = centered_rect(60, 60, area);
    let mut lines: Vec<Line> = Vec::new();
    lines.push(Line::from(format!(">> {}", state.filter.text())));
    if state.filtered.is_empty() {
        lines.push(Line::from(Span::styled(
            PICKER_EMPTY,
            Style::default().fg(Color::DarkGray),
        )));
    }
    let max_list = popup_area.height.saturating_sub(3) as usize;
    let skip = (state.selected + 1).saturating_sub(max_list.max(1));
    for (i, m) in state.filtered.iter().enumerate().skip(skip).take(max_list) {
        let sel = i == state.selected;
        let style = if sel {
            Style::default()
                .fg(THEME.selected_fg)
                .bg(THEME.selected_bg)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        let mark = if m.as_str() == current { "*" } else { " " };
        lines.push(Line::from(Span::styled(
            format!("{}{} {}", if sel { ">" } else { " " }, mark, m),
            style,
        )));
    }
    let para = Paragraph::new(lines).block(popup_block(TITLE_MODELS));
    f.render_widget(Clear, popup_area);
    f.render_widget(para, popup_area);

    let before = state.filter.before_cursor();
    let cursor_x = popup_area.x + 1 + 3 + UnicodeWidthStr::width(before.as_str()) as u16;
    f.set_cursor_position(Position::new(cursor_x, popup_area.y + 1));
}

fn draw_alert(f: &mut Frame, area: Rect, msg: &str) {
    let popup_area = centered_rect(50, 25, area);
    let lines = vec![
        Line::from(Span::styled(
            msg.to_string(),
            Style::default().fg(THEME.error),
        )),
        Line::from(""),
        Line::from(Span::styled(ALERT_HINT, Style::default().fg(Color::DarkGray))),
    ];
    let para = Paragraph::new(lines)
        .block(popup_block(TITLE_ALERT))
        .wrap(Wrap { trim: false });
    f.render_widget(Clear, popup_area);
    f.render_widget(para, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vert[1]);
    horiz[1]
}

// Character wrap matching the cursor math below.
fn char_wrap(s: &str, width: u16) -> Vec<String> {
    let mut out = vec![String::new()];
    let mut col = 0usize;
    for g in s.graphemes(true) {
        if g == "\n" {
            out.push(String::new());
            col = 0;
            continue;
        }
        let w = UnicodeWidthStr::width(g);
        if width > 0 && col + w > width as usize {
            out.push(String::new());
            col = 0;
        }
        if let Some(line) = out.last_mut() {
            line.push_str(g);
        }
        col += w;
    }
    out
}

fn measure_total_lines(s: &str, width: u16) -> usize {
    if width == 0 {
        return 1;
    }
    char_wrap(s, width).len()
}

fn measure_prefix_line_col(graphemes: &[&str], upto: usize, width: u16) -> (u16, u16) {
    if width == 0 {
        return (0, 0);
    }
    let mut line = 0usize;
    let mut col = 0usize;
    for g in graphemes.iter().take(upto) {
        if *g == "\n" {
            line += 1;
            col = 0;
            continue;
        }
        let w = UnicodeWidthStr::width(*g);
        if col + w > width as usize {
            line += 1;
            col = 0;
        }
        col += w;
    }
    (line as u16, col as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Store;
    use crate::worker::{Outcome, Worker};
    use gemchat_core::controller::Request;
    use gemchat_core::session::API_KEY_ENTRY;
    use gemchat_core::{Controller, MemoryKeyStore, Session, Transcript};
    use ratatui::{backend::TestBackend, Terminal};

    #[test]
    fn wrap_basic_ascii() {
        let s = "abcdef";
        let g: Vec<&str> = s.graphemes(true).collect();
        assert_eq!(measure_total_lines(s, 5), 2);
        assert_eq!(measure_prefix_line_col(&g, 5, 5), (0, 5));
        assert_eq!(measure_prefix_line_col(&g, 6, 5), (1, 1));
        assert_eq!(char_wrap(s, 5), vec!["abcde", "f"]);
    }

    #[test]
    fn wrap_with_newline() {
        let s = "ab\ncdef";
        let g: Vec<&str> = s.graphemes(true).collect();
        assert_eq!(measure_total_lines(s, 80), 2);
        assert_eq!(measure_prefix_line_col(&g, 2, 80), (0, 2));
        assert_eq!(measure_prefix_line_col(&g, 5, 80), (1, 2));
    }

    #[test]
    fn wrap_fullwidth_chars() {
        let s = "你好吗";
        let g: Vec<&str> = s.graphemes(true).collect();
        assert_eq!(measure_total_lines(s, 4), 2);
        assert_eq!(measure_prefix_line_col(&g, 2, 4), (0, 4));
        assert_eq!(measure_prefix_line_col(&g, 3, 4), (1, 2));
    }

    fn screen(term: &Terminal<TestBackend>) -> String {
        term.backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    fn test_app(key: Option<&str>) -> App {
        let store: Store = match key {
            Some(k) => Box::new(MemoryKeyStore::with_entry(API_KEY_ENTRY, k)),
            None => Box::new(MemoryKeyStore::new()),
        };
        let worker = Worker::from_fn(|req| match req {
            Request::Chat(t) => Outcome::Chat(t, Ok("fine".into())),
            Request::Catalog(t) => Outcome::Catalog(t, Ok(vec!["models/gemini-pro".into()])),
        });
        let controller = Controller::new(Session::hydrate(store), Transcript::with_welcome());
        App::new(controller, worker, "127.0.0.1:8000".into())
    }

    #[test]
    fn draws_header_chat_and_hint() {
        let mut app = test_app(None);
        let mut term = Terminal::new(TestBackend::new(100, 24)).expect("terminal");
        term.draw(|f| draw(f, &mut app)).expect("draw");
        let s = screen(&term);
        assert!(s.contains("Key: missing"));
        assert!(s.contains("Chat"));
        assert!(s.contains(INPUT_HINT_NO_KEY));
        assert!(s.contains("Awaiting key"));
    }

    #[test]
    fn key_editor_masks_the_key() {
        let mut app = test_app(Some("AIzaSyABCDEF12"));
        app.open_key_editor();
        let mut term = Terminal::new(TestBackend::new(100, 24)).expect("terminal");
        term.draw(|f| draw(f, &mut app)).expect("draw");
        let s = screen(&term);
        assert!(s.contains("AIza********12"));
        assert!(!s.contains("AIzaSyABCDEF12"));
    }

    #[test]
    fn picker_lists_models_after_refresh() {
        let mut app = test_app(Some("k"));
        app.refresh_models();
        app.on_tick();
        app.open_model_picker();
        let mut term = Terminal::new(TestBackend::new(100, 30)).expect("terminal");
        term.draw(|f| draw(f, &mut app)).expect("draw");
        let s = screen(&term);
        assert!(s.contains("Select Model"));
        assert!(s.contains(">* gemini-pro"));
    }
}
