use gemchat_core::markdown::Fragment;
use gemchat_core::transcript::{EntryBody, EntryId, EntryKind, TranscriptEntry};
use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span},
};
use textwrap::core::Fragment as WrapFragment;
use textwrap::wrap_algorithms::wrap_first_fit;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::strings::{PREFIX_BOT, PREFIX_ERROR, PREFIX_PENDING, PREFIX_USER};
use crate::theme::THEME;

use super::App;

type Run = (String, Style);

#[derive(Clone)]
pub struct WrappedEntry {
    pub id: EntryId,
    pub kind: EntryKind,
    pub lines: Vec<Line<'static>>,
}

// A wrap unit: styled pieces plus the spaces that followed it.
#[derive(Clone, Debug, Default)]
struct Word {
    pieces: Vec<Run>,
    width: usize,
    trailing: usize,
    trailing_style: Style,
}

impl Word {
    fn push(&mut self, g: &str, style: Style) {
        match self.pieces.last_mut() {
            Some((t, s)) if *s == style => t.push_str(g),
            _ => self.pieces.push((g.to_string(), style)),
        }
        self.width += UnicodeWidthStr::width(g);
    }

    fn is_blank(&self) -> bool {
        self.pieces.is_empty() && self.trailing == 0
    }
}

impl WrapFragment for Word {
    fn width(&self) -> f64 {
        self.width as f64
    }

    fn whitespace_width(&self) -> f64 {
        self.trailing as f64
    }

    fn penalty_width(&self) -> f64 {
        0.0
    }
}

fn prefix_for(kind: EntryKind) -> (&'static str, Style) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    match kind {
        EntryKind::User => (PREFIX_USER, bold.fg(THEME.user)),
        EntryKind::Bot => (PREFIX_BOT, bold.fg(THEME.bot)),
        EntryKind::Error => (PREFIX_ERROR, bold.fg(THEME.error)),
        EntryKind::Pending => (PREFIX_PENDING, bold.fg(THEME.pending)),
    }
}

fn push_run(out: &mut Vec<Vec<Run>>, text: &str, style: Style) {
    for (i, part) in text.split('\n').enumerate() {
        if i > 0 {
            out.push(Vec::new());
        }
        if part.is_empty() {
            continue;
        }
        if let Some(line) = out.last_mut() {
            line.push((part.replace('\t', "    "), style));
        }
    }
}

/// Splits an entry into logical lines of styled runs.
fn entry_runs(entry: &TranscriptEntry) -> Vec<Vec<Run>> {
    let base = match entry.kind {
        EntryKind::User | EntryKind::Bot => Style::default(),
        EntryKind::Error => Style::default().fg(THEME.error),
        EntryKind::Pending => Style::default()
            .fg(THEME.pending)
            .add_modifier(Modifier::ITALIC),
    };
    let code = Style::default().fg(THEME.code);
    let mut out = vec![Vec::new()];
    match &entry.body {
        EntryBody::Plain(s) => push_run(&mut out, s, base),
        EntryBody::Markup(m) => push_fragments(&mut out, m.fragments(), base, code),
    }
    out
}

// Emphasis styles stack onto everything nested inside it, code spans included.
fn push_fragments(out: &mut Vec<Vec<Run>>, frags: &[Fragment], base: Style, code: Style) {
    for frag in frags {
        match frag {
            Fragment::Text(t) => push_run(out, t, base),
            Fragment::LineBreak => out.push(Vec::new()),
            Fragment::Code(t) => push_run(out, t, code),
            Fragment::CodeBlock(t) => push_run(out, t, code.add_modifier(Modifier::DIM)),
            Fragment::Strong(inner) => push_fragments(
                out,
                inner,
                base.add_modifier(Modifier::BOLD),
                code.add_modifier(Modifier::BOLD),
            ),
            Fragment::Emphasis(inner) => push_fragments(
                out,
                inner,
                base.add_modifier(Modifier::ITALIC),
                code.add_modifier(Modifier::ITALIC),
            ),
        }
    }
}

fn split_words(runs: &[Run], width: usize) -> Vec<Word> {
    let mut words = Vec::new();
    let mut cur = Word::default();
    let mut at_line_start = true;
    for (text, style) in runs {
        for g in text.graphemes(true) {
            if g == " " {
                if at_line_start {
                    cur.push(g, *style);
                } else {
                    cur.trailing += 1;
                    cur.trailing_style = *style;
                }
                continue;
            }
            at_line_start = false;
            if cur.trailing > 0 {
                words.push(std::mem::take(&mut cur));
            }
            let gw = UnicodeWidthStr::width(g);
            if cur.width > 0 && cur.width + gw > width {
                words.push(std::mem::take(&mut cur));
            }
            cur.push(g, *style);
        }
    }
    if !cur.is_blank() {
        words.push(cur);
    }
    words
}

fn wrap_runs(runs: &[Run], width: usize) -> Vec<Vec<Run>> {
    let words = split_words(runs, width);
    if words.is_empty() {
        return vec![Vec::new()];
    }
    wrap_first_fit(&words, &[width as f64])
        .into_iter()
        .map(|line| {
            let mut out: Vec<Run> = Vec::new();
            for (i, w) in line.iter().enumerate() {
                out.extend(w.pieces.iter().cloned());
                if i + 1 < line.len() && w.trailing > 0 {
                    out.push((" ".repeat(w.trailing), w.trailing_style));
                }
            }
            out
        })
        .collect()
}

pub fn wrap_entry(entry: &TranscriptEntry, width: u16) -> WrappedEntry {
    let (prefix, prefix_style) = prefix_for(entry.kind);
    let indent_width = UnicodeWidthStr::width(prefix);
    let body_width = (width as usize).saturating_sub(indent_width).max(1);
    let mut lines: Vec<Line<'static>> = Vec::new();
    for logical in entry_runs(entry) {
        for runs in wrap_runs(&logical, body_width) {
            let lead = if lines.is_empty() {
                Span::styled(prefix.to_string(), prefix_style)
            } else {
                Span::raw(" ".repeat(indent_width))
            };
            let mut spans = vec![lead];
            spans.extend(runs.into_iter().map(|(t, s)| Span::styled(t, s)));
            lines.push(Line::from(spans));
        }
    }
    WrappedEntry {
        id: entry.id,
        kind: entry.kind,
        lines,
    }
}

impl App {
    pub fn ensure_chat_wrapped(&mut self, width: u16) {
        let width = width.max(1);
        if self.chat_wrap_width == width && self.chat_cache_rev == self.chat_rev {
            return;
        }
        self.chat_cache = self
            .controller
            .transcript()
            .entries()
            .iter()
            .map(|e| wrap_entry(e, width))
            .collect();
        self.chat_total_lines = self.chat_cache.iter().map(|w| w.lines.len()).sum();
        self.chat_wrap_width = width;
        self.chat_cache_rev = self.chat_rev;
    }

    /// Returns (viewport, max_scroll, first visible line). `chat_scroll` counts lines up from the bottom.
    pub fn compute_chat_layout(&mut self, inner_height: u16) -> (usize, usize, usize) {
        let viewport = inner_height as usize;
        let max_scroll = self.chat_total_lines.saturating_sub(viewport);
        if self.stick_to_bottom {
            self.chat_scroll = 0;
        }
        let scroll = (self.chat_scroll as usize).min(max_scroll);
        self.chat_scroll = scroll as u16;
        (viewport, max_scroll, max_scroll - scroll)
    }

    pub fn visible_chat_lines(&self, start: usize, viewport: usize) -> Vec<Line<'static>> {
        self.chat_cache
            .iter()
            .flat_map(|w| w.lines.iter())
            .skip(start)
            .take(viewport)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemchat_core::markdown::render;
    use gemchat_core::transcript::Transcript;

    fn line_text(l: &Line) -> String {
        l.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn first(t: &Transcript) -> &TranscriptEntry {
        &t.entries()[0]
    }

    #[test]
    fn user_text_wraps_with_indent() {
        let mut t = Transcript::new();
        t.push_user("alpha beta gamma");
        let w = wrap_entry(first(&t), 12);
        let got: Vec<String> = w.lines.iter().map(line_text).collect();
        assert_eq!(got, vec!["| alpha beta", "  gamma"]);
    }

    #[test]
    fn bot_markup_keeps_styles_across_wrap() {
        let mut t = Transcript::new();
        t.push_bot(render("say **very bold words** now"));
        let w = wrap_entry(first(&t), 14);
        let got: Vec<String> = w.lines.iter().map(line_text).collect();
        assert_eq!(got, vec!["> say very", "  bold words", "  now"]);
        let bold_span = w.lines[1]
            .spans
            .iter()
            .find(|s| s.content.as_ref() == "bold")
            .expect("bold span");
        assert!(bold_span.style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn code_inside_bold_keeps_code_colour_and_gains_bold() {
        let mut t = Transcript::new();
        t.push_bot(render("**run `ls` now**"));
        let w = wrap_entry(first(&t), 40);
        let got: Vec<String> = w.lines.iter().map(line_text).collect();
        assert_eq!(got, vec!["> run ls now"]);
        let code_span = w.lines[0]
            .spans
            .iter()
            .find(|s| s.content.contains("ls"))
            .expect("code span");
        assert_eq!(code_span.style.fg, Some(THEME.code));
        assert!(code_span.style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn line_breaks_and_code_blocks_start_new_lines() {
        let mut t = Transcript::new();
        t.push_bot(render("a\n```\n  x = 1\n```"));
        let w = wrap_entry(first(&t), 40);
        let got: Vec<String> = w.lines.iter().map(line_text).collect();
        assert_eq!(got, vec!["> a", "  ", "    x = 1", "  "]);
    }

    #[test]
    fn long_words_are_split() {
        let mut t = Transcript::new();
        t.push_error("Error: aaaaaaaaaa");
        let w = wrap_entry(first(&t), 8);
        let got: Vec<String> = w.lines.iter().map(line_text).collect();
        assert_eq!(got, vec!["! Error:", "  aaaaaa", "  aaaa"]);
    }

    #[test]
    fn empty_body_still_occupies_a_line() {
        let mut t = Transcript::new();
        t.push_bot(render(""));
        assert_eq!(wrap_entry(first(&t), 10).lines.len(), 1);
    }
}
