//! Text buffer abstraction for editor storage.
//!
//! The `TextBuffer` trait is the storage interface the editor works against;
//! `EditorRope` is the ropey-backed implementation used for post bodies.

use smol_str::{SmolStr, ToSmolStr};
use std::ops::Range;

/// A text buffer that supports efficient editing and offset conversion.
///
/// All offsets are in Unicode scalar values (chars), not bytes or UTF-16.
pub trait TextBuffer {
    /// Total length in bytes (UTF-8).
    fn len_bytes(&self) -> usize;

    /// Total length in chars (Unicode scalar values).
    fn len_chars(&self) -> usize;

    /// Check if empty.
    fn is_empty(&self) -> bool {
        self.len_chars() == 0
    }

    /// Insert text at char offset.
    fn insert(&mut self, char_offset: usize, text: &str);

    /// Delete char range.
    fn delete(&mut self, char_range: Range<usize>);

    /// Replace char range with text.
    fn replace(&mut self, char_range: Range<usize>, text: &str) {
        self.delete(char_range.clone());
        self.insert(char_range.start, text);
    }

    /// Get a slice as SmolStr. Returns None if range is invalid.
    fn slice(&self, char_range: Range<usize>) -> Option<SmolStr>;

    /// Get character at offset. Returns None if out of bounds.
    fn char_at(&self, char_offset: usize) -> Option<char>;

    /// Convert entire buffer to String.
    fn to_string(&self) -> String;
}

/// Ropey-backed text buffer.
///
/// Clones share structure, so snapshotting the body for a save request is cheap.
#[derive(Clone, Default)]
pub struct EditorRope {
    rope: ropey::Rope,
}

impl EditorRope {
    /// Create a new empty rope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from string.
    pub fn from_str(s: &str) -> Self {
        Self {
            rope: ropey::Rope::from_str(s),
        }
    }

    /// Get a reference to the underlying rope.
    pub fn rope(&self) -> &ropey::Rope {
        &self.rope
    }
}

impl TextBuffer for EditorRope {
    fn len_bytes(&self) -> usize {
        self.rope.len_bytes()
    }

    fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    fn insert(&mut self, char_offset: usize, text: &str) {
        self.rope.insert(char_offset, text);
    }

    fn delete(&mut self, char_range: Range<usize>) {
        self.rope.remove(char_range);
    }

    fn slice(&self, char_range: Range<usize>) -> Option<SmolStr> {
        if char_range.start > char_range.end || char_range.end > self.len_chars() {
            return None;
        }
        Some(self.rope.slice(char_range).to_smolstr())
    }

    fn char_at(&self, char_offset: usize) -> Option<char> {
        if char_offset >= self.len_chars() {
            return None;
        }
        Some(self.rope.char(char_offset))
    }

    fn to_string(&self) -> String {
        self.rope.to_string()
    }
}

impl From<&str> for EditorRope {
    fn from(s: &str) -> Self {
        Self::from_str(s)
    }
}

impl From<String> for EditorRope {
    fn from(s: String) -> Self {
        Self::from_str(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_operations() {
        let mut rope = EditorRope::from_str("hello world");
        assert_eq!(rope.len_chars(), 11);

        rope.insert(5, " beautiful");
        assert_eq!(rope.to_string(), "hello beautiful world");

        rope.delete(5..15);
        assert_eq!(rope.to_string(), "hello world");

        rope.replace(6..11, "rust");
        assert_eq!(rope.to_string(), "hello rust");
    }

    #[test]
    fn test_slice_bounds() {
        let rope = EditorRope::from_str("hello world");
        assert_eq!(rope.slice(6..11).as_deref(), Some("world"));
        assert_eq!(rope.slice(0..100), None);
        assert_eq!(rope.char_at(11), None);
    }

    #[test]
    fn test_char_offsets_not_bytes() {
        // 'é' is two bytes but one char.
        let rope = EditorRope::from_str("café\nbar");
        assert_eq!(rope.len_chars(), 8);
        assert_eq!(rope.len_bytes(), 9);
        assert_eq!(rope.char_at(3), Some('é'));
        assert_eq!(rope.slice(5..8).as_deref(), Some("bar"));
    }
}
