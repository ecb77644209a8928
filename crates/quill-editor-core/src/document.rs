//! Core editor document trait and implementations.
//!
//! Defines the `EditorDocument` trait for abstracting editor state, so the
//! transforms in `execute` work the same against the plain rope-backed
//! `Document` and any host-specific storage.

use std::ops::Range;

use smol_str::SmolStr;

use crate::text::{EditorRope, TextBuffer};
use crate::types::{EditInfo, Selection};

/// Core trait for editor documents.
///
/// Implementations keep a text buffer and a selection. The selection must
/// always lie within `[0, len_chars()]`; `set_selection` is responsible for
/// clamping.
pub trait EditorDocument {
    /// The buffer type used for text storage.
    type Buffer: TextBuffer;

    // === Required: Buffer access ===

    /// Get a reference to the underlying buffer.
    fn buffer(&self) -> &Self::Buffer;

    /// Get a mutable reference to the underlying buffer.
    fn buffer_mut(&mut self) -> &mut Self::Buffer;

    // === Required: Selection state ===

    /// Current selection. Collapsed when there is only a cursor.
    fn selection(&self) -> Selection;

    /// Replace the selection, clamped to the document.
    fn set_selection(&mut self, selection: Selection);

    // === Required: Edit tracking ===

    /// The most recent text change, if it has not been cleared since.
    fn last_edit(&self) -> Option<EditInfo>;

    fn set_last_edit(&mut self, edit: Option<EditInfo>);

    // === Provided: Convenience accessors ===

    /// Cursor position (selection head).
    fn cursor_offset(&self) -> usize {
        self.selection().head
    }

    /// Collapse the selection to `offset`.
    fn set_cursor_offset(&mut self, offset: usize) {
        self.set_selection(Selection::collapsed(offset));
    }

    /// Ordered selection bounds, clamped to the current length.
    fn selection_range(&self) -> Range<usize> {
        self.selection().clamp(self.len_chars()).to_range()
    }

    /// Get the full content as a String.
    fn content_string(&self) -> String {
        self.buffer().to_string()
    }

    /// Get length in characters.
    fn len_chars(&self) -> usize {
        self.buffer().len_chars()
    }

    /// Check if document is empty.
    fn is_empty(&self) -> bool {
        self.buffer().len_chars() == 0
    }

    /// Get a slice of the content.
    fn slice(&self, range: Range<usize>) -> Option<SmolStr> {
        self.buffer().slice(range)
    }

    /// Get character at offset.
    fn char_at(&self, offset: usize) -> Option<char> {
        self.buffer().char_at(offset)
    }

    /// Selected text, or an empty string for a collapsed selection.
    fn selected_text(&self) -> SmolStr {
        self.slice(self.selection_range()).unwrap_or_default()
    }

    // === Provided: Text operations ===

    /// Insert text at char offset, leaving the cursor after it.
    fn insert(&mut self, offset: usize, text: &str) -> EditInfo {
        let offset = offset.min(self.len_chars());
        self.buffer_mut().insert(offset, text);

        let edit = EditInfo {
            edit_char_pos: offset,
            deleted_len: 0,
            inserted_len: text.chars().count(),
        };
        self.set_last_edit(Some(edit));
        self.set_cursor_offset(offset + edit.inserted_len);
        edit
    }

    /// Delete char range, leaving the cursor at its start.
    fn delete(&mut self, range: Range<usize>) -> EditInfo {
        let range = clamp_range(range, self.len_chars());
        self.buffer_mut().delete(range.clone());

        let edit = EditInfo {
            edit_char_pos: range.start,
            deleted_len: range.len(),
            inserted_len: 0,
        };
        self.set_last_edit(Some(edit));
        self.set_cursor_offset(range.start);
        edit
    }

    /// Replace char range with text, leaving the cursor after the new text.
    fn replace(&mut self, range: Range<usize>, text: &str) -> EditInfo {
        let range = clamp_range(range, self.len_chars());
        self.buffer_mut().replace(range.clone(), text);

        let edit = EditInfo {
            edit_char_pos: range.start,
            deleted_len: range.len(),
            inserted_len: text.chars().count(),
        };
        self.set_last_edit(Some(edit));
        self.set_cursor_offset(range.start + edit.inserted_len);
        edit
    }
}

fn clamp_range(range: Range<usize>, len: usize) -> Range<usize> {
    let end = range.end.min(len);
    range.start.min(end)..end
}

/// Simple field-based implementation of EditorDocument.
#[derive(Clone, Default)]
pub struct PlainEditor<T: TextBuffer> {
    buffer: T,
    selection: Selection,
    last_edit: Option<EditInfo>,
}

/// The post body as edited in a session.
pub type Document = PlainEditor<EditorRope>;

impl<T: TextBuffer> PlainEditor<T> {
    /// Create a new editor with the given buffer, cursor at the start.
    pub fn new(buffer: T) -> Self {
        Self {
            buffer,
            selection: Selection::default(),
            last_edit: None,
        }
    }
}

impl PlainEditor<EditorRope> {
    /// Open a document on existing text, cursor at the end.
    pub fn from_text(text: &str) -> Self {
        let mut doc = Self::new(EditorRope::from_str(text));
        let len = doc.len_chars();
        doc.set_cursor_offset(len);
        doc
    }
}

impl<T: TextBuffer> EditorDocument for PlainEditor<T> {
    type Buffer = T;

    fn buffer(&self) -> &Self::Buffer {
        &self.buffer
    }

    fn buffer_mut(&mut self) -> &mut Self::Buffer {
        &mut self.buffer
    }

    fn selection(&self) -> Selection {
        self.selection
    }

    fn set_selection(&mut self, selection: Selection) {
        self.selection = selection.clamp(self.buffer.len_chars());
    }

    fn last_edit(&self) -> Option<EditInfo> {
        self.last_edit
    }

    fn set_last_edit(&mut self, edit: Option<EditInfo>) {
        self.last_edit = edit;
    }
}
