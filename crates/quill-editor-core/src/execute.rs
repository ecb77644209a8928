//! Action execution for editor documents.
//!
//! Formatting transforms are planned first as a [`TextEdit`] computed from the
//! document without touching it, then applied with [`apply_edit`]. This keeps
//! each transform a pure function of `(text, selection)` and lets hosts apply
//! the same edit to their own view of the text.
//! `execute_action` is the central dispatch from `EditorAction` to plan+apply.

use std::ops::Range as CharRange;

use crate::actions::{EditorAction, Range};
use crate::document::EditorDocument;
use crate::text_helpers::selected_line_range;
use crate::types::Selection;

const COMMENT_OPEN: &str = "<!-- ";
const COMMENT_CLOSE: &str = " -->";

/// A single replacement plus the selection that should follow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    /// Char range of the existing text being replaced.
    pub range: CharRange<usize>,
    /// Replacement text.
    pub text: String,
    /// Selection after the edit, in post-edit offsets.
    pub selection: Selection,
}

/// Apply a planned edit to the document.
pub fn apply_edit<D: EditorDocument>(doc: &mut D, edit: &TextEdit) {
    doc.replace(edit.range.clone(), &edit.text);
    doc.set_selection(edit.selection);
}

/// Surround the selection with `prefix` and `suffix`.
///
/// The inner text stays selected, so `[a, b)` becomes
/// `[a + |prefix|, b + |prefix|)`. A collapsed selection just gets the pair
/// with the cursor between them.
pub fn plan_wrap_selection<D: EditorDocument>(doc: &D, prefix: &str, suffix: &str) -> TextEdit {
    let range = doc.selection_range();
    let inner = doc.selected_text();
    let prefix_len = prefix.chars().count();

    let mut text = String::with_capacity(prefix.len() + inner.len() + suffix.len());
    text.push_str(prefix);
    text.push_str(&inner);
    text.push_str(suffix);

    TextEdit {
        selection: Selection::new(range.start + prefix_len, range.end + prefix_len),
        range,
        text,
    }
}

/// Replace the selection with `text` as a block on its own line.
///
/// A newline is prepended when the insertion point is mid-line, and appended
/// when the selection is followed by text that does not already start a new
/// line. The cursor lands after everything inserted.
pub fn plan_insert_at_cursor<D: EditorDocument>(doc: &D, text: &str) -> TextEdit {
    let range = doc.selection_range();

    let needs_leading = range.start > 0 && doc.char_at(range.start - 1) != Some('\n');
    let needs_trailing = range.end < doc.len_chars() && doc.char_at(range.end) != Some('\n');

    let mut block = String::with_capacity(text.len() + 2);
    if needs_leading {
        block.push('\n');
    }
    block.push_str(text);
    if needs_trailing {
        block.push('\n');
    }

    let cursor = range.start + block.chars().count();
    TextEdit {
        range,
        text: block,
        selection: Selection::collapsed(cursor),
    }
}

/// Comment or uncomment every line the selection touches.
///
/// If all of the lines are already `<!-- ... -->` comments they are all
/// unwrapped, otherwise every line gets wrapped. The rewritten block is left
/// selected so a second toggle sees the same lines.
pub fn plan_toggle_block_comment<D: EditorDocument>(doc: &D) -> TextEdit {
    let selection = doc.selection_range();
    let block = selected_line_range(doc, selection.start, selection.end);
    let original = doc.slice(block.clone()).unwrap_or_default();

    let lines: Vec<&str> = original.split('\n').collect();
    let uncomment = lines.iter().all(|line| is_commented(line));

    let rewritten = lines
        .iter()
        .map(|line| {
            if uncomment {
                uncomment_line(line).to_owned()
            } else {
                format!("{COMMENT_OPEN}{line}{COMMENT_CLOSE}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    let new_end = block.start + rewritten.chars().count();
    TextEdit {
        selection: Selection::new(block.start, new_end),
        range: block,
        text: rewritten,
    }
}

fn is_commented(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= COMMENT_OPEN.len() + COMMENT_CLOSE.len()
        && trimmed.starts_with(COMMENT_OPEN)
        && trimmed.ends_with(COMMENT_CLOSE)
}

fn uncomment_line(line: &str) -> &str {
    let inner = line.trim_start();
    let inner = inner.strip_prefix(COMMENT_OPEN).unwrap_or(inner);
    let inner = inner.trim_end();
    inner.strip_suffix(COMMENT_CLOSE).unwrap_or(inner)
}

/// Turn a paste over a selection into a Markdown link.
///
/// Only applies when something is selected and `pasted` is an absolute URL.
/// Returns `None` when the paste should go through unchanged.
pub fn plan_paste_to_link<D: EditorDocument>(doc: &D, pasted: &str) -> Option<TextEdit> {
    let range = doc.selection_range();
    if range.is_empty() || url::Url::parse(pasted).is_err() {
        return None;
    }

    let link = format!("[{}]({})", doc.selected_text(), pasted);
    let cursor = range.start + link.chars().count();
    Some(TextEdit {
        range,
        text: link,
        selection: Selection::collapsed(cursor),
    })
}

/// Execute an editor action on a document.
///
/// Returns true if the document or its selection changed.
pub fn execute_action<D: EditorDocument>(doc: &mut D, action: &EditorAction) -> bool {
    match action {
        EditorAction::Insert { text, range } => execute_insert(doc, text, *range),
        EditorAction::InsertBlock { text } => {
            let edit = plan_insert_at_cursor(doc, text);
            apply_edit(doc, &edit);
            true
        }
        EditorAction::DeleteBackward { range } => execute_delete_backward(doc, *range),
        EditorAction::Wrap { prefix, suffix } => {
            let edit = plan_wrap_selection(doc, prefix, suffix);
            apply_edit(doc, &edit);
            true
        }
        EditorAction::ToggleBold => execute_action(doc, &EditorAction::wrap("**", "**")),
        EditorAction::ToggleItalic => execute_action(doc, &EditorAction::wrap("*", "*")),
        EditorAction::ToggleBlockComment => {
            let edit = plan_toggle_block_comment(doc);
            apply_edit(doc, &edit);
            true
        }
        EditorAction::PasteText { text } => execute_paste_text(doc, text),
        EditorAction::SelectAll => {
            let len = doc.len_chars();
            doc.set_selection(Selection::new(0, len));
            true
        }
        EditorAction::MoveCursor { offset } => {
            doc.set_cursor_offset(*offset);
            true
        }
        EditorAction::ExtendSelection { offset } => {
            let anchor = doc.selection().anchor;
            doc.set_selection(Selection::new(anchor, *offset));
            true
        }
    }
}

fn execute_insert<D: EditorDocument>(doc: &mut D, text: &str, range: Range) -> bool {
    let range = range.normalize();
    if range.is_caret() {
        doc.insert(range.start, text);
    } else {
        doc.replace(range.into(), text);
    }
    true
}

fn execute_delete_backward<D: EditorDocument>(doc: &mut D, range: Range) -> bool {
    let range = range.normalize();

    if !range.is_caret() {
        doc.delete(range.into());
        return true;
    }

    if range.start == 0 {
        return false;
    }

    doc.delete(range.start - 1..range.start);
    true
}

fn execute_paste_text<D: EditorDocument>(doc: &mut D, text: &str) -> bool {
    match plan_paste_to_link(doc, text) {
        Some(edit) => apply_edit(doc, &edit),
        None => {
            let range = doc.selection_range();
            doc.replace(range, text);
        }
    }
    true
}
