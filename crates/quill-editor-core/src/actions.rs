//! Editor actions and keybindings.
//!
//! `EditorAction` is the set of semantic operations on a document, decoupled
//! from how they are triggered. `Keymap` maps key combinations from the host
//! onto those actions (and onto session-level commands like save).

use std::collections::HashMap;

use smol_str::SmolStr;

/// A range in the document, measured in character offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: usize,
    pub end: usize,
}

impl Range {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn caret(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    pub fn is_caret(&self) -> bool {
        self.start == self.end
    }

    /// Normalize range so start <= end.
    pub fn normalize(self) -> Self {
        if self.start <= self.end {
            self
        } else {
            Self {
                start: self.end,
                end: self.start,
            }
        }
    }
}

impl From<std::ops::Range<usize>> for Range {
    fn from(r: std::ops::Range<usize>) -> Self {
        Self::new(r.start, r.end)
    }
}

impl From<Range> for std::ops::Range<usize> {
    fn from(r: Range) -> Self {
        r.start..r.end
    }
}

/// All editor actions.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorAction {
    // === Text Insertion ===
    /// Insert text at the given range (replacing any selected content).
    Insert { text: String, range: Range },

    /// Insert text on a line of its own at the selection.
    InsertBlock { text: String },

    // === Deletion ===
    /// Delete content backward (Backspace).
    DeleteBackward { range: Range },

    // === Formatting ===
    /// Surround the selection with `prefix`/`suffix`, keeping the inner text selected.
    Wrap { prefix: SmolStr, suffix: SmolStr },

    /// Wrap selection in `**`.
    ToggleBold,

    /// Wrap selection in `*`.
    ToggleItalic,

    /// Comment or uncomment the selected lines with `<!-- -->`.
    ToggleBlockComment,

    // === Clipboard ===
    /// Paste plain text over the selection. Becomes a Markdown link when the
    /// text is a URL and something is selected.
    PasteText { text: String },

    // === Selection ===
    /// Select all content.
    SelectAll,

    // === Navigation ===
    /// Move cursor to position.
    MoveCursor { offset: usize },

    /// Extend selection to position.
    ExtendSelection { offset: usize },
}

impl EditorAction {
    pub fn wrap(prefix: impl Into<SmolStr>, suffix: impl Into<SmolStr>) -> Self {
        Self::Wrap {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// Whether the action can change the text (as opposed to only the selection).
    pub fn modifies_text(&self) -> bool {
        !matches!(
            self,
            EditorAction::SelectAll
                | EditorAction::MoveCursor { .. }
                | EditorAction::ExtendSelection { .. }
        )
    }
}

/// Key values for keyboard input.
///
/// Platform-specific code converts from native key events to this enum.
/// Only keys the editor binds are named; everything else is `Unidentified`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A character key.
    Character(SmolStr),
    Backspace,
    Delete,
    Enter,
    Tab,
    Escape,
    Unidentified,
}

impl Key {
    /// Create a character key. Letters are lowercased so Shift and Caps Lock
    /// do not change which binding matches.
    pub fn character(s: impl AsRef<str>) -> Self {
        Self::Character(SmolStr::new(s.as_ref().to_lowercase()))
    }
}

/// Modifier key state for a key combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        ctrl: false,
        alt: false,
        shift: false,
        meta: false,
    };

    pub const CTRL: Self = Self {
        ctrl: true,
        alt: false,
        shift: false,
        meta: false,
    };

    pub const META: Self = Self {
        ctrl: false,
        alt: false,
        shift: false,
        meta: true,
    };

    /// Get the primary modifier for the platform (Cmd on Mac, Ctrl elsewhere).
    pub fn primary(is_mac: bool) -> Self {
        if is_mac { Self::META } else { Self::CTRL }
    }
}

/// A key combination for triggering an action.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyCombo {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyCombo {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn with_modifiers(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    pub fn ctrl(key: Key) -> Self {
        Self::with_modifiers(key, Modifiers::CTRL)
    }

    pub fn meta(key: Key) -> Self {
        Self::with_modifiers(key, Modifiers::META)
    }

    pub fn primary(key: Key, is_mac: bool) -> Self {
        Self::with_modifiers(key, Modifiers::primary(is_mac))
    }
}

/// What a key binding does.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyAction {
    /// Apply an action to the document.
    Edit(EditorAction),
    /// Explicit save, bypassing the autosave debounce.
    Save,
}

/// Result of handling a keydown event.
#[derive(Debug, Clone, PartialEq)]
pub enum KeydownResult {
    /// Event was handled, prevent default.
    Handled,
    /// Event was not a keybinding, let platform handle it.
    NotHandled,
}

/// Key combination → action table.
#[derive(Debug, Clone)]
pub struct Keymap {
    bindings: HashMap<KeyCombo, KeyAction>,
}

impl Default for Keymap {
    /// Bold, italic, block comment and save on both Ctrl and Cmd, so the same
    /// table works whatever platform the host reports.
    fn default() -> Self {
        let mut keymap = Self::empty();
        for modifiers in [Modifiers::CTRL, Modifiers::META] {
            keymap.bind(
                KeyCombo::with_modifiers(Key::character("b"), modifiers),
                KeyAction::Edit(EditorAction::ToggleBold),
            );
            keymap.bind(
                KeyCombo::with_modifiers(Key::character("i"), modifiers),
                KeyAction::Edit(EditorAction::ToggleItalic),
            );
            keymap.bind(
                KeyCombo::with_modifiers(Key::character("/"), modifiers),
                KeyAction::Edit(EditorAction::ToggleBlockComment),
            );
            keymap.bind(
                KeyCombo::with_modifiers(Key::character("s"), modifiers),
                KeyAction::Save,
            );
        }
        keymap
    }
}

impl Keymap {
    pub fn empty() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }

    /// Add or replace a binding.
    pub fn bind(&mut self, combo: KeyCombo, action: KeyAction) {
        self.bindings.insert(combo, action);
    }

    /// Look up a combo. Shift is ignored for character keys, matching how the
    /// browser reports `e.key` for shortcuts.
    pub fn lookup(&self, combo: &KeyCombo) -> Option<&KeyAction> {
        if let Some(action) = self.bindings.get(combo) {
            return Some(action);
        }
        if combo.modifiers.shift && matches!(combo.key, Key::Character(_)) {
            let unshifted = KeyCombo {
                key: combo.key.clone(),
                modifiers: Modifiers {
                    shift: false,
                    ..combo.modifiers
                },
            };
            return self.bindings.get(&unshifted);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_keymap_accepts_ctrl_and_cmd() {
        let keymap = Keymap::default();
        assert_eq!(
            keymap.lookup(&KeyCombo::ctrl(Key::character("b"))),
            Some(&KeyAction::Edit(EditorAction::ToggleBold))
        );
        assert_eq!(
            keymap.lookup(&KeyCombo::meta(Key::character("/"))),
            Some(&KeyAction::Edit(EditorAction::ToggleBlockComment))
        );
        assert_eq!(
            keymap.lookup(&KeyCombo::primary(Key::character("s"), true)),
            Some(&KeyAction::Save)
        );
    }

    #[test]
    fn test_keymap_is_case_insensitive() {
        let keymap = Keymap::default();
        let combo = KeyCombo::with_modifiers(
            Key::character("I"),
            Modifiers {
                ctrl: true,
                shift: true,
                ..Modifiers::NONE
            },
        );
        assert_eq!(
            keymap.lookup(&combo),
            Some(&KeyAction::Edit(EditorAction::ToggleItalic))
        );
    }

    #[test]
    fn test_unbound_keys() {
        let keymap = Keymap::default();
        assert_eq!(keymap.lookup(&KeyCombo::new(Key::character("b"))), None);
        assert_eq!(keymap.lookup(&KeyCombo::ctrl(Key::Enter)), None);
    }

    #[test]
    fn test_range_normalize() {
        assert_eq!(Range::new(5, 2).normalize(), Range::new(2, 5));
        assert!(Range::caret(3).is_caret());
    }
}
