//! Lightweight reply formatting.
//!
//! Only four constructs are recognised: fenced code blocks, inline code, bold and italic.
//! Code is cut out first and kept as opaque atoms, so a `**` inside backticks never turns
//! into bold, while emphasis around a code span or a bold span still applies. Bold runs
//! before italic. Anything unbalanced stays literal.

use once_cell::sync::Lazy;
use regex::Regex;

static FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```(.*?)```").expect("fence pattern"));
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").expect("code pattern"));
static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("bold pattern"));
static ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*]+)\*").expect("italic pattern"));

// Stands in for an already-formatted fragment while emphasis is matched.
const ATOM: char = '\u{FFFC}';

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fragment {
    Text(String),
    LineBreak,
    Code(String),
    CodeBlock(String),
    Strong(Vec<Fragment>),
    Emphasis(Vec<Fragment>),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Markup(Vec<Fragment>);

impl Markup {
    pub fn fragments(&self) -> &[Fragment] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// HTML form of the markup. Literal content is escaped before tags are inserted.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_html(&self.0, &mut out);
        out
    }

    /// The text with all structure removed; line breaks become `\n`.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        write_plain(&self.0, &mut out);
        out
    }
}

fn write_html(frags: &[Fragment], out: &mut String) {
    for frag in frags {
        match frag {
            Fragment::Text(t) => out.push_str(&escape(t)),
            Fragment::LineBreak => out.push_str("<br>"),
            Fragment::Code(t) => {
                out.push_str("<code>");
                out.push_str(&html_body(t));
                out.push_str("</code>");
            }
            Fragment::CodeBlock(t) => {
                out.push_str("<pre><code>");
                out.push_str(&html_body(t));
                out.push_str("</code></pre>");
            }
            Fragment::Strong(inner) => {
                out.push_str("<strong>");
                write_html(inner, out);
                out.push_str("</strong>");
            }
            Fragment::Emphasis(inner) => {
                out.push_str("<em>");
                write_html(inner, out);
                out.push_str("</em>");
            }
        }
    }
}

fn write_plain(frags: &[Fragment], out: &mut String) {
    for frag in frags {
        match frag {
            Fragment::LineBreak => out.push('\n'),
            Fragment::Text(t) | Fragment::Code(t) | Fragment::CodeBlock(t) => out.push_str(t),
            Fragment::Strong(inner) | Fragment::Emphasis(inner) => write_plain(inner, out),
        }
    }
}

pub fn render(text: &str) -> Markup {
    let mut pieces = Vec::new();
    for seg in segments(text, &FENCE) {
        match seg {
            Segment::Matched(body) => {
                pieces.push(Piece::Atom(Fragment::CodeBlock(body.to_string())))
            }
            Segment::Literal(rest) => {
                for seg in segments(rest, &INLINE_CODE) {
                    pieces.push(match seg {
                        Segment::Matched(body) => Piece::Atom(Fragment::Code(body.to_string())),
                        Segment::Literal(lit) => Piece::Text(lit.to_string()),
                    });
                }
            }
        }
    }
    let pieces = wrap_matches(pieces, &BOLD, Fragment::Strong);
    let pieces = wrap_matches(pieces, &ITALIC, Fragment::Emphasis);
    Markup(flatten(pieces))
}

enum Piece {
    Text(String),
    Atom(Fragment),
}

// Matches `re` over the literal text with every atom masked out, then turns each match
// into a single new atom built from the pieces it covers.
fn wrap_matches(
    pieces: Vec<Piece>,
    re: &Regex,
    wrap: fn(Vec<Fragment>) -> Fragment,
) -> Vec<Piece> {
    let mut masked = String::new();
    let mut starts = Vec::with_capacity(pieces.len());
    for p in &pieces {
        starts.push(masked.len());
        match p {
            Piece::Text(t) => masked.push_str(t),
            Piece::Atom(_) => masked.push(ATOM),
        }
    }

    let mut out = Vec::new();
    let mut last = 0usize;
    for caps in re.captures_iter(&masked) {
        let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        copy_range(&pieces, &starts, masked.len(), last, whole.start(), &mut out);
        let mut inner = Vec::new();
        copy_range(&pieces, &starts, masked.len(), body.start(), body.end(), &mut inner);
        out.push(Piece::Atom(wrap(flatten(inner))));
        last = whole.end();
    }
    copy_range(&pieces, &starts, masked.len(), last, masked.len(), &mut out);
    out
}

// Copies the part of `pieces` that falls inside the masked byte range `from..to`.
// Match edges are always `*`, so an atom is either fully inside or fully outside.
fn copy_range(
    pieces: &[Piece],
    starts: &[usize],
    total: usize,
    from: usize,
    to: usize,
    out: &mut Vec<Piece>,
) {
    for (i, p) in pieces.iter().enumerate() {
        let start = starts[i];
        let end = starts.get(i + 1).copied().unwrap_or(total);
        let lo = from.max(start);
        let hi = to.min(end);
        if lo >= hi {
            continue;
        }
        match p {
            Piece::Text(t) => out.push(Piece::Text(t[lo - start..hi - start].to_string())),
            Piece::Atom(f) => out.push(Piece::Atom(f.clone())),
        }
    }
}

fn flatten(pieces: Vec<Piece>) -> Vec<Fragment> {
    let mut out = Vec::new();
    let mut pending = String::new();
    for p in pieces {
        match p {
            Piece::Text(t) => pending.push_str(&t),
            Piece::Atom(f) => {
                push_text(&std::mem::take(&mut pending), &mut out);
                out.push(f);
            }
        }
    }
    push_text(&pending, &mut out);
    out
}

fn push_text(text: &str, out: &mut Vec<Fragment>) {
    if text.is_empty() {
        return;
    }
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push(Fragment::LineBreak);
        }
        if !line.is_empty() {
            out.push(Fragment::Text(line.to_string()));
        }
    }
}

enum Segment<'a> {
    Literal(&'a str),
    Matched(&'a str),
}

// Splits `text` into unmatched runs and the first capture group of every match.
fn segments<'a>(text: &'a str, re: &Regex) -> Vec<Segment<'a>> {
    let mut out = Vec::new();
    let mut last = 0usize;
    for caps in re.captures_iter(text) {
        let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            out.push(Segment::Literal(&text[last..whole.start()]));
        }
        out.push(Segment::Matched(body.as_str()));
        last = whole.end();
    }
    if last < text.len() {
        out.push(Segment::Literal(&text[last..]));
    }
    out
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

fn html_body(s: &str) -> String {
    escape(s).replace('\n', "<br>")
}
