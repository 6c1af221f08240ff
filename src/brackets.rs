//! Pairing bracket-tag openers with their closers
//!
//! Openers and closers of one tag name nest like parentheses: the closer of
//! an opener is the first one that brings the count of open tags back to
//! zero. A scan started at one opener settles every opener it passes on the
//! way, and [`CloserMemo`] answers later lookups for those from memory. A run
//! of unterminated tags is therefore scanned once instead of once per tag.
//!
//! Positions are `(line, column)` pairs so the same memo serves the
//! line-oriented block pass and the single-string inline pass (line 0).

use std::collections::HashMap;

/// A byte position in multi-line text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pos {
    pub line: usize,
    pub col: usize,
}

impl Pos {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

/// Byte range of a closing tag on one line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Closer {
    pub line: usize,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Open(usize),
    Close(usize, usize),
}

fn matches_at(text: &str, at: usize, needle: &str) -> bool {
    text.get(at..at + needle.len())
        .is_some_and(|found| found.eq_ignore_ascii_case(needle))
}

/// Whether an opener for `name` starts at byte `at` of `text`
///
/// The name must be followed by `]`, `=` or a blank, the same characters
/// that may follow the name of a well-formed opening tag.
pub fn is_opener_at(text: &str, at: usize, name: &str) -> bool {
    text.as_bytes().get(at) == Some(&b'[')
        && matches_at(text, at + 1, name)
        && matches!(
            text.as_bytes().get(at + 1 + name.len()),
            Some(b']' | b'=' | b' ' | b'\t')
        )
}

/// Next opener or closer of `name` at or after byte `from`
fn next_mark(text: &str, from: usize, name: &str, close: &str) -> Option<Mark> {
    let mut i = from;
    while let Some(offset) = text.get(i..)?.find('[') {
        let at = i + offset;
        if matches_at(text, at, close) {
            return Some(Mark::Close(at, at + close.len()));
        }
        if is_opener_at(text, at, name) {
            return Some(Mark::Open(at));
        }
        i = at + 1;
    }
    None
}

/// Settled openers, per tag name
#[derive(Debug, Default)]
pub struct CloserMemo {
    settled: HashMap<String, HashMap<(usize, u32, usize), Option<Closer>>>,
    /// Bumped when a line is rewritten, retiring what was settled on it
    epochs: HashMap<usize, u32>,
    visited: usize,
}

impl CloserMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of openers and closers looked at so far
    pub fn visited(&self) -> usize {
        self.visited
    }

    /// Forget everything settled for openers on `line`
    ///
    /// Called when the line's text is replaced.
    pub fn forget_line(&mut self, line: usize) {
        *self.epochs.entry(line).or_default() += 1;
    }

    /// Closer of the `name` opener at `open` in `lines`
    ///
    /// `open` must point at the `[` of a tag accepted by [`is_opener_at`].
    /// The search starts right after that `[`, so no other opener may
    /// start inside the tag itself.
    ///
    /// # Examples
    ///
    /// ```
    /// use cooked_markup::brackets::{CloserMemo, Pos};
    ///
    /// let mut memo = CloserMemo::new();
    /// let lines = ["[b]a [B]b[/b] c[/B] d"];
    /// let closer = memo.find(&lines, "b", Pos::new(0, 0)).unwrap();
    /// assert_eq!((closer.start, closer.end), (15, 19));
    ///
    /// let inner = memo.find(&lines, "b", Pos::new(0, 5)).unwrap();
    /// assert_eq!((inner.start, inner.end), (9, 13));
    /// ```
    pub fn find<L: AsRef<str>>(&mut self, lines: &[L], name: &str, open: Pos) -> Option<Closer> {
        let Self {
            settled,
            epochs,
            visited,
        } = self;
        let epoch = |line: usize| epochs.get(&line).copied().unwrap_or_default();
        let key = |pos: Pos| (pos.line, epoch(pos.line), pos.col);

        if let Some(known) = settled.get(name).and_then(|memo| memo.get(&key(open))) {
            return *known;
        }
        let memo = settled.entry(name.to_string()).or_default();
        let close = format!("[/{name}]");

        let mut stack = vec![open];
        let mut line = open.line;
        let mut col = open.col + 1;
        while line < lines.len() {
            let text = lines[line].as_ref();
            let Some(mark) = next_mark(text, col, name, &close) else {
                line += 1;
                col = 0;
                continue;
            };
            *visited += 1;
            match mark {
                Mark::Close(start, end) => {
                    col = end;
                    let Some(opener) = stack.pop() else {
                        continue;
                    };
                    let closer = Closer { line, start, end };
                    memo.insert(key(opener), Some(closer));
                    if stack.is_empty() {
                        return Some(closer);
                    }
                }
                Mark::Open(at) => {
                    let pos = Pos::new(line, at);
                    match memo.get(&key(pos)).copied() {
                        Some(Some(closer)) => {
                            line = closer.line;
                            col = closer.end;
                        }
                        Some(None) => break,
                        None => {
                            stack.push(pos);
                            col = at + 1;
                        }
                    }
                }
            }
        }
        for opener in stack {
            memo.insert(key(opener), None);
        }
        None
    }
}
