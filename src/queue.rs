//! Image processing queue with per-entry status tracking and cancellable batch runs.
//!
//! Each entry moves through `Pending -> Processing -> Success | Failed`. Entries
//! are only ever mutated by the queue itself; callers observe them through
//! read-only accessors and a [`QueueObserver`].
//!
//! All pixel work is sequential: at most one entry is processed at a time.
//! Cancellation is cooperative. It is checked before each entry of a batch and
//! never interrupts an entry already in flight, so an entry may still finish
//! after the batch state reads [`BatchState::Cancelled`].

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::{ImageFormat, RgbaImage};
use tracing::{debug, info, warn};

use crate::engine::WatermarkRemover;
use crate::error::Result;
use crate::geometry::WatermarkInfo;
use crate::output;

/// Processing status of a single queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// Waiting to be processed.
    Pending,
    /// Removal in progress.
    Processing,
    /// Watermark removed; a result is attached.
    Success,
    /// Removal failed; no result is attached. Eligible for retry.
    Failed,
}

impl EntryStatus {
    /// Whether an entry in this status may be (re)processed.
    #[must_use]
    pub const fn is_eligible(self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }
}

/// State of the batch runner, independent of individual entry statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchState {
    /// No batch has run since creation or the last reset.
    #[default]
    Idle,
    /// A batch is iterating over eligible entries.
    Processing,
    /// The last batch visited every eligible entry.
    Complete,
    /// The last batch was cancelled.
    Cancelled,
}

/// Aggregate counters derived from the entry list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchProgress {
    /// Number of entries in the queue.
    pub total: usize,
    /// `success + failed`.
    pub processed: usize,
    /// Entries in [`EntryStatus::Success`].
    pub success: usize,
    /// Entries in [`EntryStatus::Failed`].
    pub failed: usize,
    /// Entries in [`EntryStatus::Pending`].
    pub pending: usize,
    /// `round(processed / total * 100)`, or 0 for an empty queue.
    pub percentage: u32,
}

impl BatchProgress {
    /// Recompute progress from the full entry list.
    #[must_use]
    pub fn from_entries(entries: &[QueueEntry]) -> Self {
        let count = |status: EntryStatus| entries.iter().filter(|e| e.status == status).count();

        let total = entries.len();
        let success = count(EntryStatus::Success);
        let failed = count(EntryStatus::Failed);
        let pending = count(EntryStatus::Pending);
        let processed = success + failed;

        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let percentage = if total == 0 {
            0
        } else {
            (processed as f64 / total as f64 * 100.0).round() as u32
        };

        Self {
            total,
            processed,
            success,
            failed,
            pending,
            percentage,
        }
    }
}

/// Raw image file data offered to the queue.
#[derive(Debug, Clone)]
pub struct ImageSource {
    /// Original file name.
    pub name: String,
    /// MIME type, e.g. `image/png`.
    pub mime_type: String,
    /// Encoded file contents.
    pub bytes: Vec<u8>,
}

impl ImageSource {
    /// Create a source from in-memory data.
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read a file, guessing its MIME type from the extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |f| f.to_string_lossy().to_string());
        let mime = output::mime_for_path(path).unwrap_or("application/octet-stream");
        Ok(Self::new(name, mime, bytes))
    }

    /// Whether the declared MIME type is an image type.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// Heuristic deciding whether a source is an unprocessed original.
///
/// The answer is stored on the entry for display only and never affects removal.
pub trait OriginalCheck {
    /// Return `true` if the source looks like an original photo.
    fn is_original(&self, source: &ImageSource) -> bool;
}

impl<F> OriginalCheck for F
where
    F: Fn(&ImageSource) -> bool,
{
    fn is_original(&self, source: &ImageSource) -> bool {
        self(source)
    }
}

/// Treats every source as original.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeOriginal;

impl OriginalCheck for AssumeOriginal {
    fn is_original(&self, _source: &ImageSource) -> bool {
        true
    }
}

/// Receives queue notifications. All methods default to no-ops.
pub trait QueueObserver {
    /// Called after every entry status transition, with freshly recomputed progress.
    fn entry_changed(&self, _index: usize, _entry: &QueueEntry, _progress: &BatchProgress) {}

    /// Called whenever the batch state is set.
    fn batch_state_changed(&self, _state: BatchState) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl QueueObserver for NoOpObserver {}

/// Cooperative cancellation flag shared with a running batch.
///
/// Cancelling requests that no further entries be started; it never aborts the
/// entry currently being processed. The handle only sets the flag: the batch
/// state moves to [`BatchState::Cancelled`] when [`ProcessingQueue::run_batch`]
/// next checks it, so observers see the in-flight entry finish first.
/// [`ProcessingQueue::cancel_batch`] flips the state immediately instead.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Options controlling queue behavior.
#[derive(Debug, Clone)]
pub struct QueueOptions {
    /// Process new entries immediately when they are enqueued.
    pub auto_process: bool,
    /// Format of the encoded result kept on each successful entry.
    pub preview_format: ImageFormat,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            auto_process: true,
            preview_format: ImageFormat::Png,
        }
    }
}

/// One image in the queue.
#[derive(Debug)]
pub struct QueueEntry {
    id: u64,
    name: String,
    mime_type: String,
    source: RgbaImage,
    status: EntryStatus,
    result: Option<RgbaImage>,
    result_blob: Option<Vec<u8>>,
    error: Option<String>,
    is_likely_original: bool,
    watermark_info: Option<WatermarkInfo>,
}

impl QueueEntry {
    /// Unique identifier within the queue's lifetime.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Original file name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// MIME type of the original file.
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Decoded source pixels.
    #[must_use]
    pub fn source(&self) -> &RgbaImage {
        &self.source
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> EntryStatus {
        self.status
    }

    /// Reconstructed pixels, present only on success.
    #[must_use]
    pub fn result(&self) -> Option<&RgbaImage> {
        self.result.as_ref()
    }

    /// Encoded result in the queue's preview format, present only on success.
    #[must_use]
    pub fn result_blob(&self) -> Option<&[u8]> {
        self.result_blob.as_deref()
    }

    /// Message of the last failure, present only while the entry is failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Display-only originality flag.
    #[must_use]
    pub fn is_likely_original(&self) -> bool {
        self.is_likely_original
    }

    /// Resolved watermark geometry, or `None` if the image is too small for it.
    #[must_use]
    pub fn watermark_info(&self) -> Option<&WatermarkInfo> {
        self.watermark_info.as_ref()
    }

    /// File name for the processed output, `<base>_no_watermark.<ext>`.
    #[must_use]
    pub fn output_file_name(&self) -> String {
        output::output_file_name(&self.name, &self.mime_type)
    }
}

/// A queue of images driven through a [`WatermarkRemover`] one at a time.
pub struct ProcessingQueue<R> {
    remover: R,
    options: QueueOptions,
    entries: Vec<QueueEntry>,
    batch_state: BatchState,
    cancel: CancelHandle,
    observer: Box<dyn QueueObserver>,
    original_check: Box<dyn OriginalCheck>,
    next_id: u64,
}

impl<R: WatermarkRemover> ProcessingQueue<R> {
    /// Create an empty queue with default options.
    pub fn new(remover: R) -> Self {
        Self {
            remover,
            options: QueueOptions::default(),
            entries: Vec::new(),
            batch_state: BatchState::Idle,
            cancel: CancelHandle::default(),
            observer: Box::new(NoOpObserver),
            original_check: Box::new(AssumeOriginal),
            next_id: 0,
        }
    }

    /// Replace the queue options.
    #[must_use]
    pub fn with_options(mut self, options: QueueOptions) -> Self {
        self.options = options;
        self
    }

    /// Install an observer.
    #[must_use]
    pub fn with_observer(mut self, observer: impl QueueObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Install the originality heuristic applied to new sources.
    #[must_use]
    pub fn with_original_check(mut self, check: impl OriginalCheck + 'static) -> Self {
        self.original_check = Box::new(check);
        self
    }

    /// The remover driving this queue.
    #[must_use]
    pub fn remover(&self) -> &R {
        &self.remover
    }

    /// All entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    /// Entry at `index`.
    #[must_use]
    pub fn entry(&self, index: usize) -> Option<&QueueEntry> {
        self.entries.get(index)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current batch state.
    #[must_use]
    pub fn batch_state(&self) -> BatchState {
        self.batch_state
    }

    /// Progress recomputed from the current entries.
    #[must_use]
    pub fn progress(&self) -> BatchProgress {
        BatchProgress::from_entries(&self.entries)
    }

    /// Handle that can cancel a running batch from an observer or another thread.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Add sources to the queue, returning how many were accepted.
    ///
    /// Non-image MIME types and undecodable data are skipped with a warning and
    /// never queued. Accepted entries start as pending and, with
    /// [`QueueOptions::auto_process`], are processed before this returns.
    pub fn enqueue(&mut self, sources: impl IntoIterator<Item = ImageSource>) -> usize {
        let (sources, rejected): (Vec<_>, Vec<_>) =
            sources.into_iter().partition(ImageSource::is_image);
        for source in &rejected {
            warn!(name = %source.name, mime = %source.mime_type, "skipping non-image input");
        }

        let decoded = decode_all(&sources);
        let start = self.entries.len();

        for (source, image) in sources.into_iter().zip(decoded) {
            let image = match image {
                Ok(image) => image,
                Err(e) => {
                    warn!(name = %source.name, "skipping undecodable image: {e}");
                    continue;
                }
            };

            let is_likely_original = self.original_check.is_original(&source);
            let watermark_info = match self.remover.watermark_info(image.width(), image.height()) {
                Ok(info) => Some(info),
                Err(e) => {
                    debug!(name = %source.name, "no watermark geometry: {e}");
                    None
                }
            };

            self.next_id += 1;
            self.entries.push(QueueEntry {
                id: self.next_id,
                name: source.name,
                mime_type: source.mime_type,
                source: image,
                status: EntryStatus::Pending,
                result: None,
                result_blob: None,
                error: None,
                is_likely_original,
                watermark_info,
            });
            self.notify_entry(self.entries.len() - 1);
        }

        let accepted = self.entries.len() - start;
        info!(accepted, total = self.entries.len(), "images enqueued");

        if self.options.auto_process {
            for index in start..self.entries.len() {
                self.process_one(index);
            }
        }

        accepted
    }

    /// Process the entry at `index` if it is pending or failed.
    ///
    /// Returns the entry's status afterwards, or `None` if `index` is out of range.
    /// Removal errors mark the entry failed and are never propagated.
    pub fn process_one(&mut self, index: usize) -> Option<EntryStatus> {
        let Some(entry) = self.entries.get(index) else {
            warn!(index, len = self.entries.len(), "no queue entry at index");
            return None;
        };
        if !entry.status.is_eligible() {
            debug!(index, status = ?entry.status, "entry not eligible, skipping");
            return Some(entry.status);
        }

        self.set_status(index, EntryStatus::Processing);

        let format = self.options.preview_format;
        let outcome = self
            .remover
            .remove_watermark(&self.entries[index].source)
            .and_then(|image| {
                let blob = output::encode_image(&image, format)?;
                Ok((image, blob))
            });

        let entry = &mut self.entries[index];
        let status = match outcome {
            Ok((image, blob)) => {
                debug!(index, name = %entry.name, "watermark removed");
                entry.result = Some(image);
                entry.result_blob = Some(blob);
                entry.error = None;
                EntryStatus::Success
            }
            Err(e) => {
                warn!(index, name = %entry.name, "watermark removal failed: {e}");
                entry.result = None;
                entry.result_blob = None;
                entry.error = Some(e.to_string());
                EntryStatus::Failed
            }
        };
        entry.status = status;
        self.notify_entry(index);
        Some(status)
    }

    /// Process every pending or failed entry in insertion order.
    ///
    /// The cancellation flag is cleared at the start and checked before each
    /// entry. Returns the final batch state; a no-op if a batch is already running.
    pub fn run_batch(&mut self) -> BatchState {
        if self.batch_state == BatchState::Processing {
            debug!("batch already running");
            return self.batch_state;
        }

        self.cancel.clear();
        self.set_batch_state(BatchState::Processing);

        let eligible: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.status.is_eligible())
            .map(|(i, _)| i)
            .collect();
        info!(eligible = eligible.len(), "batch started");

        for index in eligible {
            if self.cancel.is_cancelled() {
                debug!(index, "batch cancelled before entry");
                break;
            }
            self.process_one(index);
        }

        let state = if self.cancel.is_cancelled() {
            BatchState::Cancelled
        } else {
            BatchState::Complete
        };
        let progress = self.progress();
        info!(
            ?state,
            processed = progress.processed,
            success = progress.success,
            failed = progress.failed,
            pending = progress.pending,
            "batch finished"
        );
        self.set_batch_state(state);
        state
    }

    /// Request cancellation and mark the batch cancelled immediately.
    pub fn cancel_batch(&mut self) {
        self.cancel.cancel();
        self.set_batch_state(BatchState::Cancelled);
    }

    /// Stop any batch, drop all entries and their buffers, and return to idle.
    pub fn reset(&mut self) {
        self.cancel.cancel();
        let released = self.entries.len();
        self.entries.clear();
        info!(released, "queue reset");
        self.set_batch_state(BatchState::Idle);
    }

    /// Save the result of a successful entry into `dir`.
    ///
    /// Returns the written path, or `None` if the entry has no result.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    pub fn write_result(&self, index: usize, dir: &Path) -> Result<Option<PathBuf>> {
        let Some(entry) = self.entries.get(index) else {
            return Ok(None);
        };
        let Some(result) = entry.result.as_ref() else {
            return Ok(None);
        };
        let path = dir.join(entry.output_file_name());
        output::save_image(result, &path)?;
        Ok(Some(path))
    }

    /// Save every successful result into `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns the first encoding or I/O error encountered.
    pub fn write_results(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::new();
        for index in 0..self.entries.len() {
            if let Some(path) = self.write_result(index, dir)? {
                written.push(path);
            }
        }
        Ok(written)
    }

    fn set_status(&mut self, index: usize, status: EntryStatus) {
        self.entries[index].status = status;
        self.notify_entry(index);
    }

    fn notify_entry(&self, index: usize) {
        let progress = self.progress();
        self.observer
            .entry_changed(index, &self.entries[index], &progress);
    }

    fn set_batch_state(&mut self, state: BatchState) {
        self.batch_state = state;
        self.observer.batch_state_changed(state);
    }
}

fn decode(source: &ImageSource) -> image::ImageResult<RgbaImage> {
    image::load_from_memory(&source.bytes).map(|img| img.to_rgba8())
}

/// Decode sources, in parallel when the `parallel` feature is enabled.
///
/// Output order always matches input order.
fn decode_all(sources: &[ImageSource]) -> Vec<image::ImageResult<RgbaImage>> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        sources.par_iter().map(decode).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        sources.iter().map(decode).collect()
    }
}
