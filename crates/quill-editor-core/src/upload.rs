//! Paste and drop image uploads.
//!
//! Files come in from the host as [`ImageFile`]s. Non-images are dropped from
//! the batch, the rest are checked against the upload rules before anything
//! touches the network. Accepted files upload concurrently, and each finished
//! upload becomes a `![alt](url)` line in the document.
//!
//! References are inserted in the order the files were given, not the order
//! the uploads finish: an [`UploadQueue`] holds early results until the files
//! before them are done. Each insertion goes at an [`InsertionAnchor`] that
//! starts at the offset of the paste or drop, moves past every reference
//! inserted so far, and follows edits made while the batch is open, so no
//! upload ever lands at an offset computed against an older version of the
//! text.

use std::ops::Deref;
use std::sync::Arc;

use futures_util::stream::{FuturesUnordered, Stream, StreamExt};
use quill_common::{
    ApiError, BlogApi, ImageFile, UploadRejection, UploadResponse, validate_image,
};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::document::EditorDocument;
use crate::execute::{apply_edit, plan_insert_at_cursor};
use crate::types::{EditInfo, Selection};

/// Alt text for images pasted with no filename.
pub const PASTED_IMAGE_ALT: &str = "pasted-image";

/// How the files reached the editor. Decides the alt text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadSource {
    Paste,
    Drop,
}

impl UploadSource {
    /// Paste keeps the name as given; drop strips the last extension.
    pub fn alt_text(&self, file_name: &str) -> String {
        match self {
            UploadSource::Paste if file_name.is_empty() => PASTED_IMAGE_ALT.to_string(),
            UploadSource::Paste => file_name.to_string(),
            UploadSource::Drop => strip_extension(file_name).to_string(),
        }
    }
}

fn strip_extension(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() && !ext.contains('/') => stem,
        _ => file_name,
    }
}

/// An accepted file waiting to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    pub image: ImageFile,
    pub alt: String,
}

/// User-facing notice for a file that did not make it into the document.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to upload {file_name}: {reason}")]
pub struct UploadFailure {
    pub file_name: String,
    pub reason: String,
}

impl UploadFailure {
    fn rejected(file_name: &str, rejection: &UploadRejection) -> Self {
        Self {
            file_name: file_name.to_string(),
            reason: rejection.to_string(),
        }
    }

    fn errored(file_name: &str, error: &ApiError) -> Self {
        Self {
            file_name: file_name.to_string(),
            reason: error.to_string(),
        }
    }
}

/// Files from one paste or drop, after intake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadBatch {
    pub source: UploadSource,
    /// Where the first reference goes.
    pub insert_at: usize,
    pub uploads: Vec<PendingUpload>,
    /// Files refused before upload, with notices.
    pub rejected: Vec<UploadFailure>,
}

impl UploadBatch {
    pub fn from_paste(files: impl IntoIterator<Item = ImageFile>, insert_at: usize) -> Self {
        Self::collect(UploadSource::Paste, files, insert_at)
    }

    pub fn from_drop(files: impl IntoIterator<Item = ImageFile>, insert_at: usize) -> Self {
        Self::collect(UploadSource::Drop, files, insert_at)
    }

    fn collect(
        source: UploadSource,
        files: impl IntoIterator<Item = ImageFile>,
        insert_at: usize,
    ) -> Self {
        let mut uploads = Vec::new();
        let mut rejected = Vec::new();

        for image in files.into_iter().filter(ImageFile::is_image) {
            if let Err(rejection) = validate_image(&image.mime_type, image.len()) {
                debug!(file = %image.file_name, %rejection, "image refused before upload");
                rejected.push(UploadFailure::rejected(&image.file_name, &rejection));
                continue;
            }
            let alt = source.alt_text(&image.file_name);
            uploads.push(PendingUpload { image, alt });
        }

        Self {
            source,
            insert_at,
            uploads,
            rejected,
        }
    }

    /// No image files at all: the paste or drop should be handled normally.
    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty() && self.rejected.is_empty()
    }
}

/// Progress indicator for in-flight uploads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadStatus {
    pub outstanding: usize,
}

impl UploadStatus {
    pub fn is_uploading(&self) -> bool {
        self.outstanding > 0
    }
}

/// Counts one upload as outstanding for as long as it is alive.
///
/// Released on drop, so an upload future that is abandoned before it
/// finishes still clears the indicator.
struct InFlight<S: Deref<Target = watch::Sender<UploadStatus>>> {
    status: S,
}

impl<S: Deref<Target = watch::Sender<UploadStatus>>> InFlight<S> {
    fn new(status: S) -> Self {
        status.send_modify(|s| s.outstanding += 1);
        Self { status }
    }
}

impl<S: Deref<Target = watch::Sender<UploadStatus>>> Drop for InFlight<S> {
    fn drop(&mut self) {
        self.status
            .send_modify(|s| s.outstanding = s.outstanding.saturating_sub(1));
    }
}

/// Offset where the next reference of a batch will be inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertionAnchor {
    offset: usize,
}

impl InsertionAnchor {
    pub fn new(offset: usize) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Follow an edit that replaced `range` with `inserted_len` chars.
    ///
    /// Edits entirely before the anchor shift it, edits after it leave it
    /// alone, and an edit spanning it pulls the anchor to the end of the
    /// replacement.
    pub fn track_edit(&mut self, range: std::ops::Range<usize>, inserted_len: usize) {
        if range.start > self.offset {
            return;
        }
        if range.end <= self.offset {
            self.offset = self.offset - (range.end - range.start) + inserted_len;
        } else {
            self.offset = range.start + inserted_len;
        }
    }

    /// Insert `![alt](url)` on its own line at the anchor and move past it.
    pub fn insert_reference<D: EditorDocument>(
        &mut self,
        doc: &mut D,
        alt: &str,
        url: &str,
    ) -> EditInfo {
        doc.set_selection(Selection::collapsed(self.offset));
        let edit = plan_insert_at_cursor(doc, &format!("![{alt}]({url})"));
        apply_edit(doc, &edit);
        self.offset = edit.selection.head;
        EditInfo {
            edit_char_pos: edit.range.start,
            deleted_len: edit.range.len(),
            inserted_len: edit.text.chars().count(),
        }
    }
}

/// What happened to a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// URLs of the inserted references, in document order.
    pub inserted: Vec<String>,
    /// Notices for files that failed, in batch order. `run_upload_batch`
    /// also lists the files refused at intake, ahead of the rest.
    pub failures: Vec<UploadFailure>,
}

/// Puts the results of one batch into the document in batch order.
///
/// Results may arrive in any order. Each is held until every earlier file of
/// the batch has been dealt with, then inserted at the anchor.
#[derive(Debug)]
pub struct UploadQueue {
    anchor: InsertionAnchor,
    entries: Vec<QueuedUpload>,
    next: usize,
    report: BatchReport,
}

#[derive(Debug)]
struct QueuedUpload {
    file_name: String,
    alt: String,
    result: Option<Result<UploadResponse, ApiError>>,
}

impl UploadQueue {
    pub fn new(insert_at: usize, uploads: &[PendingUpload]) -> Self {
        Self {
            anchor: InsertionAnchor::new(insert_at),
            entries: uploads
                .iter()
                .map(|pending| QueuedUpload {
                    file_name: pending.image.file_name.clone(),
                    alt: pending.alt.clone(),
                    result: None,
                })
                .collect(),
            next: 0,
            report: BatchReport {
                inserted: Vec::with_capacity(uploads.len()),
                failures: Vec::new(),
            },
        }
    }

    pub fn anchor(&self) -> InsertionAnchor {
        self.anchor
    }

    /// Every file has been inserted or reported.
    pub fn is_finished(&self) -> bool {
        self.next == self.entries.len()
    }

    /// Follow an edit made to the document while the batch is open.
    pub fn track_edit(&mut self, edit: &EditInfo) {
        self.anchor.track_edit(edit.replaced_range(), edit.inserted_len);
    }

    /// Record the result for file `index` and insert everything that is now
    /// in order. Returns the edits made to `doc`.
    pub fn complete<D: EditorDocument>(
        &mut self,
        index: usize,
        result: Result<UploadResponse, ApiError>,
        doc: &mut D,
    ) -> Vec<EditInfo> {
        match self.entries.get_mut(index) {
            Some(entry) if entry.result.is_none() && index >= self.next => {
                entry.result = Some(result);
            }
            _ => {
                debug!(index, "ignoring unexpected upload result");
                return Vec::new();
            }
        }

        let mut edits = Vec::new();
        while let Some(entry) = self.entries.get_mut(self.next) {
            let Some(result) = entry.result.take() else {
                break;
            };
            match result {
                Ok(uploaded) => {
                    edits.push(self.anchor.insert_reference(doc, &entry.alt, &uploaded.url));
                    self.report.inserted.push(uploaded.url);
                }
                Err(error) => {
                    warn!(file = %entry.file_name, %error, "image upload failed");
                    self.report
                        .failures
                        .push(UploadFailure::errored(&entry.file_name, &error));
                }
            }
            self.next += 1;
        }
        edits
    }

    /// Files that never got a result are reported as not uploaded.
    pub fn into_report(mut self) -> BatchReport {
        for entry in &self.entries[self.next..] {
            self.report.failures.push(UploadFailure {
                file_name: entry.file_name.clone(),
                reason: "upload abandoned".to_string(),
            });
        }
        self.report
    }
}

/// Start every upload at once. Each yields its index in `uploads` with the
/// result, in completion order.
fn start_uploads<'a, A, S>(
    api: &'a A,
    uploads: Vec<PendingUpload>,
    status: S,
) -> FuturesUnordered<impl Future<Output = (usize, Result<UploadResponse, ApiError>)> + 'a>
where
    A: BlogApi,
    S: Deref<Target = watch::Sender<UploadStatus>> + Clone + 'a,
{
    uploads
        .into_iter()
        .enumerate()
        .map(move |(index, pending)| {
            let in_flight = InFlight::new(status.clone());
            async move {
                let result = api.upload_image(pending.image).await;
                drop(in_flight);
                (index, result)
            }
        })
        .collect()
}

/// Identifies a batch opened on an editor session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchId(pub(crate) u64);

/// One finished upload, to be handed back to the session that started it.
#[derive(Debug)]
pub struct UploadCompletion {
    pub batch: BatchId,
    pub index: usize,
    pub result: Result<UploadResponse, ApiError>,
}

/// The uploads of a batch opened on a session, for the host to run.
///
/// Running the job needs no access to the session, so editing continues
/// while uploads are in flight. Each [`UploadCompletion`] goes back through
/// `EditorSession::finish_upload`.
#[derive(Debug)]
pub struct UploadJob {
    pub batch: BatchId,
    pub uploads: Vec<PendingUpload>,
    /// Files refused before upload, with notices.
    pub rejected: Vec<UploadFailure>,
    status: Arc<watch::Sender<UploadStatus>>,
}

impl UploadJob {
    pub(crate) fn new(
        batch: BatchId,
        uploads: Vec<PendingUpload>,
        rejected: Vec<UploadFailure>,
        status: Arc<watch::Sender<UploadStatus>>,
    ) -> Self {
        Self {
            batch,
            uploads,
            rejected,
            status,
        }
    }

    /// Start all uploads. Completions come out in the order they finish.
    pub fn run<A: BlogApi>(self, api: &A) -> impl Stream<Item = UploadCompletion> + Unpin + '_ {
        let batch = self.batch;
        start_uploads(api, self.uploads, self.status)
            .map(move |(index, result)| UploadCompletion { batch, index, result })
    }
}

/// Upload every accepted file in `batch` and insert the references into `doc`.
///
/// All uploads are in flight at once; insertion follows batch order. `status`
/// counts uploads that have not finished yet.
pub async fn run_upload_batch<E, D>(
    api: &E,
    doc: &mut D,
    batch: UploadBatch,
    status: &watch::Sender<UploadStatus>,
) -> BatchReport
where
    E: BlogApi,
    D: EditorDocument,
{
    if batch.uploads.is_empty() {
        return BatchReport {
            inserted: Vec::new(),
            failures: batch.rejected,
        };
    }

    debug!(count = batch.uploads.len(), insert_at = batch.insert_at, "starting upload batch");
    let mut queue = UploadQueue::new(batch.insert_at.min(doc.len_chars()), &batch.uploads);
    let mut in_flight = start_uploads(api, batch.uploads, status);
    while let Some((index, result)) = in_flight.next().await {
        queue.complete(index, result, doc);
    }

    let mut report = queue.into_report();
    report.failures.splice(0..0, batch.rejected);
    report
}
