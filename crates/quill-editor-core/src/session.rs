//! An open editing session for one post.
//!
//! `EditorSession` glues the document, the autosave machine and the upload
//! pipeline to a `BlogApi`. The host forwards input events and clock ticks;
//! the session decides when to talk to the server and what to send.
//!
//! Neither autosaves nor image uploads hold the session while the network is
//! busy. Autosave is split into `begin_autosave`/`finish_autosave`; a paste or
//! drop hands back an [`UploadJob`] whose completions are fed to
//! `finish_upload`, and edits made in the meantime move the batch's insertion
//! point along with the text.

use quill_common::{
    ApiError, BlogApi, BlueskyPostRef, ImageFile, Intent, SaveRequest, SaveResponse,
};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};
use web_time::Instant;

use crate::actions::{EditorAction, KeyAction, KeyCombo, KeydownResult, Keymap};
use crate::autosave::{AutosaveMachine, SaveTicket};
use crate::document::{Document, EditorDocument};
use crate::execute::execute_action;
use crate::types::{EditInfo, Snapshot};
use crate::upload::{
    BatchId, BatchReport, UploadBatch, UploadCompletion, UploadJob, UploadQueue, UploadStatus,
};

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Title, slug, and content are required to publish")]
    MissingRequiredFields,
}

/// A stored post as loaded into the editor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostDraft {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub slug: String,
    pub published: bool,
    pub bluesky: Option<BlueskyPostRef>,
}

/// Clipboard contents of a paste event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasteData {
    pub text: Option<String>,
    pub files: Vec<ImageFile>,
}

impl PasteData {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            files: Vec::new(),
        }
    }

    pub fn files(files: Vec<ImageFile>) -> Self {
        Self { text: None, files }
    }
}

/// How a paste was handled.
#[derive(Debug)]
pub enum PasteOutcome {
    /// Image files were found. The job uploads them.
    Images(UploadJob),
    /// Text was inserted (as a link, or verbatim).
    Text,
    /// Nothing usable on the clipboard.
    Ignored,
}

/// What the "last saved" indicator should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Uploading,
    Saving,
    Published,
    LastSaved(Instant),
    Idle,
}

/// An autosave that has been started but whose response has not been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAutosave {
    pub ticket: SaveTicket,
    pub request: SaveRequest,
}

pub struct EditorSession<E: BlogApi> {
    api: E,
    post_id: i64,
    doc: Document,
    title: String,
    slug: String,
    published: bool,
    bluesky: Option<BlueskyPostRef>,
    keymap: Keymap,
    autosave: AutosaveMachine,
    uploads: Arc<watch::Sender<UploadStatus>>,
    batches: Vec<(BatchId, UploadQueue)>,
    next_batch: u64,
}

impl<E: BlogApi> EditorSession<E> {
    /// Open a session on a stored post. Its contents count as already saved.
    pub fn open(api: E, draft: PostDraft) -> Self {
        let saved = Snapshot::new(&draft.title, &draft.body, &draft.slug);
        let (uploads, _) = watch::channel(UploadStatus::default());
        Self {
            api,
            post_id: draft.id,
            doc: Document::from_text(&draft.body),
            title: draft.title,
            slug: draft.slug,
            published: draft.published,
            bluesky: draft.bluesky,
            keymap: Keymap::default(),
            autosave: AutosaveMachine::new(saved),
            uploads: Arc::new(uploads),
            batches: Vec::new(),
            next_batch: 0,
        }
    }

    pub fn with_keymap(mut self, keymap: Keymap) -> Self {
        self.keymap = keymap;
        self
    }

    pub fn with_autosave(mut self, autosave: AutosaveMachine) -> Self {
        self.autosave = autosave;
        self
    }

    pub fn post_id(&self) -> i64 {
        self.post_id
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn is_published(&self) -> bool {
        self.published
    }

    pub fn bluesky_link(&self) -> Option<&BlueskyPostRef> {
        self.bluesky.as_ref()
    }

    pub fn autosave(&self) -> &AutosaveMachine {
        &self.autosave
    }

    /// Watch the number of uploads still in flight.
    pub fn upload_status(&self) -> watch::Receiver<UploadStatus> {
        self.uploads.subscribe()
    }

    /// Batches that still have files waiting to be inserted.
    pub fn open_batches(&self) -> usize {
        self.batches.len()
    }

    /// Current `(title, body, slug)`.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(&self.title, self.doc.content_string(), &self.slug)
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.snapshot() != *self.autosave.saved_snapshot()
    }

    pub fn status(&self) -> SessionStatus {
        if self.uploads.borrow().is_uploading() {
            SessionStatus::Uploading
        } else if self.autosave.is_saving() {
            SessionStatus::Saving
        } else if self.published {
            SessionStatus::Published
        } else if let Some(at) = self.autosave.last_saved_at() {
            SessionStatus::LastSaved(at)
        } else {
            SessionStatus::Idle
        }
    }

    // === Editing ===

    /// Apply an action to the body. Returns whether anything changed.
    pub fn apply_action(&mut self, action: &EditorAction, now: Instant) -> bool {
        self.doc.set_last_edit(None);
        let changed = execute_action(&mut self.doc, action);
        if let Some(edit) = self.doc.last_edit() {
            self.track_edit(&edit, None);
        }
        if changed && action.modifies_text() {
            self.autosave.on_edit(now);
        }
        changed
    }

    /// Move the insertion point of every open batch except `except` past `edit`.
    fn track_edit(&mut self, edit: &EditInfo, except: Option<BatchId>) {
        for (id, queue) in &mut self.batches {
            if Some(*id) != except {
                queue.track_edit(edit);
            }
        }
    }

    pub fn set_title(&mut self, title: impl Into<String>, now: Instant) {
        let title = title.into();
        if title != self.title {
            self.title = title;
            self.autosave.on_edit(now);
        }
    }

    pub fn set_slug(&mut self, slug: impl Into<String>, now: Instant) {
        let slug = slug.into();
        if slug != self.slug {
            self.slug = slug;
            self.autosave.on_edit(now);
        }
    }

    /// Set or clear the Bluesky thread link. Sent with the next explicit save.
    pub fn set_bluesky_link(&mut self, link: Option<BlueskyPostRef>) {
        self.bluesky = link;
    }

    /// Resolve a pasted `bsky.app` URL and use it as the thread link.
    /// A blank URL clears the link.
    pub async fn resolve_bluesky_url(
        &mut self,
        url: &str,
    ) -> Result<Option<&BlueskyPostRef>, SessionError> {
        let url = url.trim();
        if url.is_empty() {
            self.bluesky = None;
            return Ok(None);
        }
        let post = self.api.resolve_bluesky_post(url).await?;
        debug!(did = %post.did, cid = %post.cid, "resolved bluesky post");
        self.bluesky = Some(post);
        Ok(self.bluesky.as_ref())
    }

    // === Input events ===

    /// Run the binding for a key combination, if there is one.
    pub async fn handle_key(
        &mut self,
        combo: &KeyCombo,
        now: Instant,
    ) -> Result<KeydownResult, SessionError> {
        let Some(action) = self.keymap.lookup(combo).cloned() else {
            return Ok(KeydownResult::NotHandled);
        };
        match action {
            KeyAction::Edit(action) => {
                self.apply_action(&action, now);
            }
            KeyAction::Save => {
                self.save(now).await?;
            }
        }
        Ok(KeydownResult::Handled)
    }

    /// Handle a paste. Images take priority over text; text over a selection
    /// becomes a link when it is a URL.
    pub fn handle_paste(&mut self, data: PasteData, now: Instant) -> PasteOutcome {
        let batch = UploadBatch::from_paste(data.files, self.doc.selection_range().start);
        if !batch.is_empty() {
            if !batch.uploads.is_empty() && !self.doc.selection().is_collapsed() {
                let range = self.doc.selection_range();
                let edit = self.doc.delete(range);
                self.track_edit(&edit, None);
                self.autosave.on_edit(now);
            }
            return PasteOutcome::Images(self.open_batch(batch));
        }

        match data.text {
            Some(text) => {
                self.apply_action(&EditorAction::PasteText { text }, now);
                PasteOutcome::Text
            }
            None => PasteOutcome::Ignored,
        }
    }

    /// Handle files dropped at `offset`. Returns `None` when none were images.
    pub fn handle_drop(&mut self, files: Vec<ImageFile>, offset: usize) -> Option<UploadJob> {
        let batch = UploadBatch::from_drop(files, offset.min(self.doc.len_chars()));
        if batch.is_empty() {
            return None;
        }
        Some(self.open_batch(batch))
    }

    fn open_batch(&mut self, batch: UploadBatch) -> UploadJob {
        let id = BatchId(self.next_batch);
        self.next_batch += 1;

        for failure in &batch.rejected {
            warn!(%failure, "image not uploaded");
        }
        if !batch.uploads.is_empty() {
            debug!(
                batch = id.0,
                count = batch.uploads.len(),
                insert_at = batch.insert_at,
                "opened upload batch"
            );
            self.batches
                .push((id, UploadQueue::new(batch.insert_at, &batch.uploads)));
        }
        UploadJob::new(id, batch.uploads, batch.rejected, Arc::clone(&self.uploads))
    }

    /// Apply one finished upload. References go in batch order, so this may
    /// insert nothing yet, or several at once.
    ///
    /// Returns the batch's report once every file in it is accounted for.
    /// Files refused before upload are not in it; they are on the job.
    pub fn finish_upload(&mut self, done: UploadCompletion, now: Instant) -> Option<BatchReport> {
        let Some(pos) = self.batches.iter().position(|(id, _)| *id == done.batch) else {
            debug!(batch = done.batch.0, "upload for a closed batch");
            return None;
        };

        let edits = self.batches[pos]
            .1
            .complete(done.index, done.result, &mut self.doc);
        for edit in &edits {
            self.track_edit(edit, Some(done.batch));
        }
        if !edits.is_empty() {
            self.autosave.on_edit(now);
        }

        if !self.batches[pos].1.is_finished() {
            return None;
        }
        let (_, queue) = self.batches.remove(pos);
        Some(self.close_batch(queue))
    }

    /// Stop waiting for a batch whose uploads will not finish. Files not yet
    /// inserted are reported as failures.
    pub fn abandon_upload(&mut self, batch: BatchId) -> Option<BatchReport> {
        let pos = self.batches.iter().position(|(id, _)| *id == batch)?;
        let (_, queue) = self.batches.remove(pos);
        Some(self.close_batch(queue))
    }

    fn close_batch(&self, queue: UploadQueue) -> BatchReport {
        let report = queue.into_report();
        for failure in &report.failures {
            warn!(post_id = self.post_id, %failure, "image not inserted");
        }
        report
    }

    // === Autosave ===

    /// When the pending autosave is due, if any.
    pub fn next_autosave_deadline(&self) -> Option<Instant> {
        self.autosave.deadline()
    }

    /// Start an autosave if one is due.
    ///
    /// The body is always sent; title and slug only when they differ from
    /// the last acknowledged version. Edits may keep coming in until
    /// [`finish_autosave`](Self::finish_autosave) is called with the response.
    pub fn begin_autosave(&mut self, now: Instant) -> Option<PendingAutosave> {
        let current = self.snapshot();
        let ticket = self.autosave.poll(now, &current, self.published)?;

        let saved = self.autosave.saved_snapshot();
        let mut request = SaveRequest::new(Intent::Autosave).with_body(&current.body);
        if current.title != saved.title {
            request = request.with_title(&current.title);
        }
        if current.slug != saved.slug {
            request = request.with_slug(&current.slug);
        }
        Some(PendingAutosave { ticket, request })
    }

    /// Apply the server's answer to an autosave. Failures are only logged;
    /// the indicator simply keeps showing the previous save time.
    pub fn finish_autosave(
        &mut self,
        pending: PendingAutosave,
        result: Result<SaveResponse, ApiError>,
        now: Instant,
    ) -> bool {
        let ok = match result.and_then(SaveResponse::into_result) {
            Ok(_) => true,
            Err(error) => {
                warn!(post_id = self.post_id, %error, "autosave failed");
                false
            }
        };
        self.autosave.complete(pending.ticket, ok, now);
        ok
    }

    /// Autosave now if due, waiting for the response. Returns whether a
    /// request was made and succeeded.
    pub async fn autosave_if_due(&mut self, now: Instant) -> bool {
        let Some(pending) = self.begin_autosave(now) else {
            return false;
        };
        let result = self.api.save(self.post_id, pending.request.clone()).await;
        self.finish_autosave(pending, result, now)
    }

    // === Explicit commands ===

    /// Save all fields now, bypassing the debounce.
    pub async fn save(&mut self, now: Instant) -> Result<Option<String>, SessionError> {
        let snapshot = self.snapshot();
        let request = SaveRequest::new(Intent::Save)
            .with_title(&snapshot.title)
            .with_body(&snapshot.body)
            .with_slug(&snapshot.slug)
            .with_bluesky(self.bluesky.as_ref());

        let message = self.send(request).await?;
        self.autosave.record_explicit_save(snapshot, now);
        info!(post_id = self.post_id, "post saved");
        Ok(message)
    }

    /// Publish the post, saving pending changes first.
    pub async fn publish(&mut self, now: Instant) -> Result<Option<String>, SessionError> {
        let snapshot = self.snapshot();
        if [&snapshot.title, &snapshot.slug, &snapshot.body]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(SessionError::MissingRequiredFields);
        }

        if self.has_unsaved_changes() {
            self.save(now).await?;
        }
        let message = self.send(SaveRequest::new(Intent::Publish)).await?;
        self.published = true;
        info!(post_id = self.post_id, "post published");
        Ok(message)
    }

    pub async fn unpublish(&mut self) -> Result<Option<String>, SessionError> {
        let message = self.send(SaveRequest::new(Intent::Unpublish)).await?;
        self.published = false;
        info!(post_id = self.post_id, "post unpublished");
        Ok(message)
    }

    async fn send(&self, request: SaveRequest) -> Result<Option<String>, SessionError> {
        let intent = request.intent;
        let response = self.api.save(self.post_id, request).await;
        response.and_then(SaveResponse::into_result).map_err(|error| {
            warn!(post_id = self.post_id, %intent, %error, "save request failed");
            SessionError::from(error)
        })
    }
}
