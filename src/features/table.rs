//! GFM pipe tables
//!
//! A header row followed by a delimiter row (`| --- | :-: |`) opens a
//! table; body rows continue until a blank line or another block starts.
//! Tables render inside a `div.md-table` wrapper.

use super::FeatureSpec;
use crate::block::{BlockRule, BlockState, indent_of, is_blank};
use crate::token::Nesting;

pub fn feature() -> FeatureSpec {
    FeatureSpec::new("table")
        .with_block_rule(BlockRule {
            name: "table",
            order: 100,
            run: table,
            terminates_paragraph: true,
        })
        .with_allow_list([
            "div.md-table",
            "table",
            "thead",
            "tbody",
            "tr",
            "th",
            "td",
            "th[style=text-align: left]",
            "th[style=text-align: right]",
            "th[style=text-align: center]",
            "td[style=text-align: left]",
            "td[style=text-align: right]",
            "td[style=text-align: center]",
        ])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    None,
    Left,
    Right,
    Center,
}

impl Align {
    fn style(self) -> Option<&'static str> {
        match self {
            Align::None => None,
            Align::Left => Some("text-align: left"),
            Align::Right => Some("text-align: right"),
            Align::Center => Some("text-align: center"),
        }
    }
}

/// Split a row on unescaped pipes, dropping the outer pipes
fn split_row(line: &str) -> Vec<String> {
    let mut trimmed = line.trim();
    trimmed = trimmed.strip_prefix('|').unwrap_or(trimmed);
    if trimmed.ends_with('|') && !trimmed.ends_with("\\|") {
        trimmed = &trimmed[..trimmed.len() - 1];
    }

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in trimmed.chars() {
        if c == '|' && !escaped {
            cells.push(current.trim().to_string());
            current.clear();
            continue;
        }
        escaped = c == '\\' && !escaped;
        current.push(c);
    }
    cells.push(current.trim().to_string());
    cells
}

fn parse_alignments(line: &str) -> Option<Vec<Align>> {
    if !line.contains('-') || !line.contains(['|', ':']) && !line.trim().starts_with('-') {
        return None;
    }
    let mut aligns = Vec::new();
    for cell in split_row(line) {
        let left = cell.starts_with(':');
        let right = cell.ends_with(':');
        let dashes = cell.trim_matches(':');
        if dashes.is_empty() || !dashes.chars().all(|c| c == '-') {
            return None;
        }
        aligns.push(match (left, right) {
            (true, true) => Align::Center,
            (true, false) => Align::Left,
            (false, true) => Align::Right,
            (false, false) => Align::None,
        });
    }
    Some(aligns)
}

/// Header cells and alignments if a table starts at `line`
fn table_head(state: &BlockState<'_>, line: usize) -> Option<(Vec<String>, Vec<Align>)> {
    let header = state.lines.get(line)?;
    let delimiter = state.lines.get(line + 1)?;
    if indent_of(header) >= 4 || indent_of(delimiter) >= 4 || !header.contains('|') {
        return None;
    }
    let aligns = parse_alignments(delimiter)?;
    let cells = split_row(header);
    if cells.len() != aligns.len() {
        return None;
    }
    Some((cells, aligns))
}

fn push_row(state: &mut BlockState<'_>, cells: Vec<String>, aligns: &[Align], header: bool) {
    let (open, close, tag) = if header {
        ("th_open", "th_close", "th")
    } else {
        ("td_open", "td_close", "td")
    };
    state.push("tr_open", "tr", Nesting::Open);
    let mut cells = cells.into_iter();
    for align in aligns {
        let cell_open = state.push(open, tag, Nesting::Open);
        if let Some(style) = align.style() {
            cell_open.set_attr("style", style);
        }
        state.push_inline(cells.next().unwrap_or_default());
        state.push(close, tag, Nesting::Close);
    }
    state.push("tr_close", "tr", Nesting::Close);
}

fn table(state: &mut BlockState<'_>, silent: bool) -> bool {
    let Some((head, aligns)) = table_head(state, state.line) else {
        return false;
    };
    if silent {
        return true;
    }

    let mut rows = Vec::new();
    let mut idx = state.line + 2;
    while idx < state.lines.len() {
        let line = &state.lines[idx];
        if is_blank(line) || state.interrupts_paragraph(idx) {
            break;
        }
        rows.push(split_row(&state.lines[idx]));
        idx += 1;
    }

    state.push("table_wrap_open", "div", Nesting::Open).set_attr("class", "md-table");
    state.push("table_open", "table", Nesting::Open);
    state.push("thead_open", "thead", Nesting::Open);
    push_row(state, head, &aligns, true);
    state.push("thead_close", "thead", Nesting::Close);
    if !rows.is_empty() {
        state.push("tbody_open", "tbody", Nesting::Open);
        for row in rows {
            push_row(state, row, &aligns, false);
        }
        state.push("tbody_close", "tbody", Nesting::Close);
    }
    state.push("table_close", "table", Nesting::Close);
    state.push("table_wrap_close", "div", Nesting::Close);
    state.line = idx;
    true
}
