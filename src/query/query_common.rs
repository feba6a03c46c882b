//! Clause scanning shared by the InfluxQL parsers.
//!
//! Everything here works on byte offsets into the normalized query text so the
//! patcher can splice a replacement into the query text without touching
//! anything else. Parentheses and quoted spans (single-quoted strings,
//! double-quoted identifiers) are skipped when looking for keywords and commas.

use std::ops::Range;

/// Drop carriage returns and turn newlines into single spaces.
pub fn normalize_newlines(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\r' => {}
            '\n' => out.push(' '),
            _ => out.push(ch),
        }
    }
    out
}

/// A bare word found outside parentheses and quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub upper: String,
    pub start: usize,
    pub end: usize,
}

fn is_word_start(c: char) -> bool { c.is_ascii_alphabetic() || c == '_' }
fn is_word_part(c: char) -> bool { c.is_ascii_alphanumeric() || c == '_' }

/// Walks `s` and reports, for every char, whether it sits at depth 0 outside
/// any quoted span. Quote characters themselves are reported as quoted.
fn top_level_mask(s: &str) -> Vec<(usize, char, bool)> {
    let mut out = Vec::with_capacity(s.len());
    let mut depth: i32 = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            out.push((i, c, false));
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                out.push((i, c, false));
            }
            '(' => {
                out.push((i, c, depth == 0));
                depth += 1;
            }
            ')' => {
                depth -= 1;
                out.push((i, c, depth == 0));
            }
            _ => out.push((i, c, depth == 0)),
        }
    }
    out
}

pub fn top_level_words(s: &str) -> Vec<Word> {
    let mut words = Vec::new();
    let mut cur: Option<usize> = None;
    let mut prev_part = false;
    for (i, c, top) in top_level_mask(s) {
        match cur {
            Some(start) => {
                if !(top && is_word_part(c)) {
                    words.push(Word { upper: s[start..i].to_ascii_uppercase(), start, end: i });
                    cur = None;
                }
            }
            None => {
                // A word cannot start in the middle of a number or identifier
                if top && is_word_start(c) && !prev_part {
                    cur = Some(i);
                }
            }
        }
        prev_part = is_word_part(c) || c == '.';
    }
    if let Some(start) = cur {
        words.push(Word { upper: s[start..].to_ascii_uppercase(), start, end: s.len() });
    }
    words
}

/// Byte ranges of the pieces of `s` separated by top-level `sep`.
pub fn split_top_level(s: &str, sep: char) -> Vec<Range<usize>> {
    let mut parts = Vec::new();
    let mut start = 0usize;
    for (i, c, top) in top_level_mask(s) {
        if top && c == sep {
            parts.push(start..i);
            start = i + c.len_utf8();
        }
    }
    parts.push(start..s.len());
    parts
}

/// Index of the `)` closing the `(` at `open`, skipping quoted spans.
pub fn matching_paren(s: &str, open: usize) -> Option<usize> {
    let mut depth: i32 = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in s[open..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Range of the text inside the first parenthesized group of `s[range]`,
/// which must start (after whitespace) with `(`.
pub fn paren_group(s: &str, range: Range<usize>) -> Option<Range<usize>> {
    let body = &s[range.clone()];
    let lead = body.len() - body.trim_start().len();
    let open = range.start + lead;
    if !s[open..].starts_with('(') {
        return None;
    }
    let close = matching_paren(s, open)?;
    if close > range.end {
        return None;
    }
    Some(open + 1..close)
}

/// Strip surrounding double or single quotes and unescape the quote char.
pub fn unquote(s: &str) -> String {
    let t = s.trim();
    for q in ['"', '\''] {
        if t.len() >= 2 && t.starts_with(q) && t.ends_with(q) {
            let inner = &t[1..t.len() - 1];
            return inner.replace(&format!("\\{}", q), &q.to_string());
        }
    }
    t.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClauseKind {
    Select,
    Into,
    From,
    Where,
    GroupBy,
    Fill,
    OrderBy,
    Limit,
    Offset,
    SLimit,
    SOffset,
    Tz,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub kind: ClauseKind,
    /// Span of the keyword itself, e.g. `GROUP  BY`.
    pub keyword: Range<usize>,
    /// Span from the end of the keyword to the start of the next clause.
    pub body: Range<usize>,
}

/// Top-level clauses of a single statement in the order they appear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Clauses {
    pub items: Vec<Clause>,
}

impl Clauses {
    pub fn get(&self, kind: ClauseKind) -> Option<&Clause> {
        self.items.iter().find(|c| c.kind == kind)
    }

    pub fn body<'a>(&self, s: &'a str, kind: ClauseKind) -> Option<&'a str> {
        self.get(kind).map(|c| &s[c.body.clone()])
    }
}

fn followed_by_paren(s: &str, end: usize) -> bool {
    s[end..].trim_start().starts_with('(')
}

pub fn scan_clauses(s: &str) -> Clauses {
    let words = top_level_words(s);
    let mut found: Vec<(ClauseKind, Range<usize>)> = Vec::new();
    let mut i = 0usize;
    while i < words.len() {
        let w = &words[i];
        let next_is_by = words.get(i + 1).map(|n| n.upper == "BY").unwrap_or(false);
        let hit = match w.upper.as_str() {
            "SELECT" => Some((ClauseKind::Select, w.end)),
            "INTO" => Some((ClauseKind::Into, w.end)),
            "FROM" => Some((ClauseKind::From, w.end)),
            "WHERE" => Some((ClauseKind::Where, w.end)),
            "GROUP" if next_is_by => Some((ClauseKind::GroupBy, words[i + 1].end)),
            "ORDER" if next_is_by => Some((ClauseKind::OrderBy, words[i + 1].end)),
            "FILL" if followed_by_paren(s, w.end) => Some((ClauseKind::Fill, w.end)),
            "TZ" if followed_by_paren(s, w.end) => Some((ClauseKind::Tz, w.end)),
            "LIMIT" => Some((ClauseKind::Limit, w.end)),
            "OFFSET" => Some((ClauseKind::Offset, w.end)),
            "SLIMIT" => Some((ClauseKind::SLimit, w.end)),
            "SOFFSET" => Some((ClauseKind::SOffset, w.end)),
            _ => None,
        };
        match hit {
            Some((kind, kw_end)) => {
                if !found.iter().any(|(k, _)| *k == kind) {
                    found.push((kind, w.start..kw_end));
                }
                i += if matches!(kind, ClauseKind::GroupBy | ClauseKind::OrderBy) { 2 } else { 1 };
            }
            None => i += 1,
        }
    }
    let mut items = Vec::with_capacity(found.len());
    for (idx, (kind, kw)) in found.iter().enumerate() {
        let end = found
            .iter()
            .skip(idx + 1)
            .map(|(_, r)| r.start)
            .filter(|start| *start > kw.end)
            .min()
            .unwrap_or(s.len());
        items.push(Clause { kind: *kind, keyword: kw.clone(), body: kw.end..end });
    }
    Clauses { items }
}
