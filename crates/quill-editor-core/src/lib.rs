//! quill-editor-core: the Markdown editor behind the quill post editor.
//!
//! This crate provides:
//! - `TextBuffer` trait for text storage abstraction, `EditorRope` over ropey
//! - `EditorDocument` - buffer plus selection, with `Document` as the concrete type
//! - Selection-aware transforms (wrap, block insert, comment toggle, paste-to-link)
//! - `AutosaveMachine` - the debounced Idle/Dirty/Saving state machine
//! - Paste/drop image uploads with ordered insertion that follows concurrent edits
//! - `EditorSession` tying it together over a `BlogApi`

pub mod actions;
pub mod autosave;
pub mod document;
pub mod execute;
pub mod session;
pub mod text;
pub mod text_helpers;
pub mod types;
pub mod upload;

pub use actions::{
    EditorAction, Key, KeyAction, KeyCombo, KeydownResult, Keymap, Modifiers, Range,
};
pub use autosave::{AutosaveMachine, AutosaveState, DEFAULT_DEBOUNCE, SaveTicket};
pub use document::{Document, EditorDocument, PlainEditor};
pub use execute::{
    TextEdit, apply_edit, execute_action, plan_insert_at_cursor, plan_paste_to_link,
    plan_toggle_block_comment, plan_wrap_selection,
};
pub use session::{
    EditorSession, PasteData, PasteOutcome, PendingAutosave, PostDraft, SessionError,
    SessionStatus,
};
pub use smol_str::SmolStr;
pub use text::{EditorRope, TextBuffer};
pub use types::{EditInfo, Selection, Snapshot};
pub use upload::{
    BatchId, BatchReport, InsertionAnchor, PendingUpload, UploadBatch, UploadCompletion,
    UploadFailure, UploadJob, UploadQueue, UploadSource, UploadStatus, run_upload_batch,
};
pub use web_time::Instant;
