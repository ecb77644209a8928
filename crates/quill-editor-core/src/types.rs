//! Core editor types: selection, edit records and document snapshots.

use std::ops::Range;

/// Text selection with anchor and head positions.
///
/// The anchor is where the selection started, the head is where the cursor is now.
/// They may be in any order - use `start()` and `end()` for ordered bounds.
/// A collapsed selection is a plain cursor.
#[derive(Clone, Debug, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    /// Where selection started
    pub anchor: usize,
    /// Where cursor is now
    pub head: usize,
}

impl Selection {
    /// Create a new selection.
    pub fn new(anchor: usize, head: usize) -> Self {
        Self { anchor, head }
    }

    /// Create a collapsed selection (cursor position).
    pub fn collapsed(offset: usize) -> Self {
        Self {
            anchor: offset,
            head: offset,
        }
    }

    /// Get the start (lower bound) of the selection.
    pub fn start(&self) -> usize {
        self.anchor.min(self.head)
    }

    /// Get the end (upper bound) of the selection.
    pub fn end(&self) -> usize {
        self.anchor.max(self.head)
    }

    /// Check if the selection is collapsed (empty, cursor only).
    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.head
    }

    /// Get the selection length.
    pub fn len(&self) -> usize {
        self.end() - self.start()
    }

    /// Check if empty (same as is_collapsed).
    pub fn is_empty(&self) -> bool {
        self.is_collapsed()
    }

    /// Convert to a Range<usize> (ordered).
    pub fn to_range(&self) -> Range<usize> {
        self.start()..self.end()
    }

    /// Check if the selection is backwards (head before anchor).
    pub fn is_backwards(&self) -> bool {
        self.head < self.anchor
    }

    /// Pull both ends into `[0, len]`.
    pub fn clamp(self, len: usize) -> Self {
        Self {
            anchor: self.anchor.min(len),
            head: self.head.min(len),
        }
    }
}

impl From<Range<usize>> for Selection {
    fn from(r: Range<usize>) -> Self {
        Self::new(r.start, r.end)
    }
}

/// Where the last text change happened, in pre-edit char offsets.
#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub struct EditInfo {
    /// Character offset where the edit occurred
    pub edit_char_pos: usize,
    /// Number of characters deleted
    pub deleted_len: usize,
    /// Number of characters inserted
    pub inserted_len: usize,
}

impl EditInfo {
    /// The range of the old text that was replaced.
    pub fn replaced_range(&self) -> Range<usize> {
        self.edit_char_pos..self.edit_char_pos + self.deleted_len
    }
}

/// The persisted identity of a post: what autosave compares against.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Snapshot {
    pub title: String,
    pub body: String,
    pub slug: String,
}

impl Snapshot {
    pub fn new(title: impl Into<String>, body: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            slug: slug.into(),
        }
    }
}
