//! Line navigation helpers.
//!
//! These functions work with the `EditorDocument` trait to find line
//! boundaries around offsets and selections.

use std::ops::Range;

use crate::document::EditorDocument;

/// Find start of line containing offset.
pub fn find_line_start<D: EditorDocument>(doc: &D, offset: usize) -> usize {
    let mut pos = offset.min(doc.len_chars());
    while pos > 0 {
        if let Some('\n') = doc.char_at(pos - 1) {
            return pos;
        }
        pos -= 1;
    }
    0
}

/// Find end of line containing offset (position of newline or end of doc).
pub fn find_line_end<D: EditorDocument>(doc: &D, offset: usize) -> usize {
    let len = doc.len_chars();
    let mut pos = offset;
    while pos < len {
        if let Some('\n') = doc.char_at(pos) {
            return pos;
        }
        pos += 1;
    }
    len
}

/// Char range covering every whole line the selection `[start, end)` touches,
/// without the final newline.
///
/// The line holding `end` only counts when the selection reaches into it
/// (`end` past that line's start). A selection that stops exactly at the
/// start of a line leaves that line out, unless the selection is collapsed.
pub fn selected_line_range<D: EditorDocument>(doc: &D, start: usize, end: usize) -> Range<usize> {
    let block_start = find_line_start(doc, start);
    let mut last = end.max(start);
    if last > start && last == find_line_start(doc, last) {
        // `last` sits right after a newline; step back onto the previous line.
        last -= 1;
    }
    block_start..find_line_end(doc, last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    #[test]
    fn test_find_line_start() {
        let doc = Document::from_text("hello\nworld\ntest");

        assert_eq!(find_line_start(&doc, 0), 0);
        assert_eq!(find_line_start(&doc, 3), 0);
        assert_eq!(find_line_start(&doc, 5), 0); // at newline
        assert_eq!(find_line_start(&doc, 6), 6); // start of "world"
        assert_eq!(find_line_start(&doc, 8), 6);
        assert_eq!(find_line_start(&doc, 12), 12); // start of "test"
    }

    #[test]
    fn test_find_line_end() {
        let doc = Document::from_text("hello\nworld\ntest");

        assert_eq!(find_line_end(&doc, 0), 5);
        assert_eq!(find_line_end(&doc, 3), 5);
        assert_eq!(find_line_end(&doc, 6), 11);
        assert_eq!(find_line_end(&doc, 12), 16);
    }

    #[test]
    fn test_selected_line_range() {
        let doc = Document::from_text("one\ntwo\nthree");

        // Cursor inside "two".
        assert_eq!(selected_line_range(&doc, 5, 5), 4..7);
        // Selection spanning "ne\ntw".
        assert_eq!(selected_line_range(&doc, 1, 6), 0..7);
        // Ends exactly at the start of "three": that line is not included.
        assert_eq!(selected_line_range(&doc, 4, 8), 4..7);
        // Collapsed at the start of "three": that line is the target.
        assert_eq!(selected_line_range(&doc, 8, 8), 8..13);
        // Select-all.
        assert_eq!(selected_line_range(&doc, 0, 13), 0..13);
    }

    #[test]
    fn test_selected_line_range_on_empty_lines() {
        let doc = Document::from_text("a\n\nb");
        assert_eq!(selected_line_range(&doc, 2, 2), 2..2);
        assert_eq!(selected_line_range(&doc, 0, 3), 0..2);
    }
}
