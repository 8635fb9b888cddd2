//! # Spool Backend
//!
//! A headless print platform that writes every job into a directory. It is
//! what the CLI and HTTP server run against on a desktop host, and what the
//! integration tests drive.
//!
//! ## Output
//!
//! | Job | File |
//! |-----|------|
//! | document | `<job-name>-<id>.prn`, the bytes the adapter wrote |
//! | bitmap | `<job-name>-<id>.png` |
//!
//! Documents are driven through the full adapter lifecycle on a blocking
//! worker: `on_start`, `on_layout`, `on_write` of all pages, then
//! `on_finish` after the terminal state is published. A worker that panics
//! publishes `Failed`.
//!
//! ## Bitmap Pages
//!
//! Bitmaps go onto an ISO 216 page (210:297) turned to the requested
//! orientation, or to the image's own when none is given.
//!
//! | Scale mode | Page |
//! |------------|------|
//! | `Fit` | whole image centered on a white page |
//! | `Fill` | image cropped around its center to the page shape |
//!
//! ## Job History
//!
//! The service remembers in-flight jobs plus the most recent finished ones,
//! up to [`DEFAULT_JOB_HISTORY`] by default.
//!
//! ## Rendering
//!
//! [`SpoolRendererFactory`] stands in for a web engine: it keeps the loaded
//! markup and reports the page finished immediately. Its adapter writes the
//! markup itself as the document body.

use std::fs::{self, File};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{DynamicImage, GrayImage, ImageFormat, Luma, LumaA, Rgba, RgbaImage};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{Capabilities, JobId, JobState, PrintJob, PrintService, PrintServiceInfo, PrinterId};
use crate::adapter::{
    CancellationSignal, DocumentAdapter, DocumentInfo, DocumentKind, LayoutResult, PageRange,
    WriteDestination, WriteResult,
};
use crate::content::copy;
use crate::error::PrintResult;
use crate::options::{
    BitmapSettings, ColorMode, Orientation, PrintAttributes, RenderSettings, ScaleMode,
};
use crate::render::{RenderEvent, RenderEvents, RendererFactory, WebRenderer};

/// Identifier of the spool print backend.
pub const SPOOL_SERVICE_ID: &str = "spool";

/// Finished jobs kept for [`SpoolPrintService::jobs`] unless overridden.
pub const DEFAULT_JOB_HISTORY: usize = 64;

/// Maximum length of the job-name part of a spool file name.
const MAX_STEM_LEN: usize = 64;

/// Page short side to long side (ISO 216).
const PAGE_ASPECT: (u64, u64) = (210, 297);

// ============================================================================
// JOBS
// ============================================================================

/// A job written to the spool directory.
#[derive(Debug)]
pub struct SpoolJob {
    id: JobId,
    name: String,
    state: watch::Sender<JobState>,
    cancel: CancellationSignal,
    attributes: Option<PrintAttributes>,
    output: Mutex<Option<PathBuf>>,
}

impl SpoolJob {
    fn new(name: &str, attributes: Option<PrintAttributes>) -> Self {
        let (state, _) = watch::channel(JobState::Created);
        Self {
            id: JobId(Uuid::new_v4().to_string()),
            name: name.to_string(),
            state,
            cancel: CancellationSignal::new(),
            attributes,
            output: Mutex::new(None),
        }
    }

    fn set_state(&self, state: JobState) {
        debug!(job = %self.id, ?state, "Job state");
        self.state.send_replace(state);
    }

    fn set_output(&self, path: PathBuf) {
        if let Ok(mut output) = self.output.lock() {
            *output = Some(path);
        }
    }

    /// File the job was written to, once it completed.
    pub fn output(&self) -> Option<PathBuf> {
        self.output.lock().ok().and_then(|output| output.clone())
    }

    /// Attributes a document job was submitted with; `None` for bitmaps.
    pub fn attributes(&self) -> Option<&PrintAttributes> {
        self.attributes.as_ref()
    }

    /// Cancel the job; takes effect at the next layout or write.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl PrintJob for SpoolJob {
    fn id(&self) -> &JobId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> JobState {
        *self.state.borrow()
    }

    fn subscribe(&self) -> Option<watch::Receiver<JobState>> {
        Some(self.state.subscribe())
    }
}

// ============================================================================
// PRINT SERVICE
// ============================================================================

/// Print service spooling jobs into a directory.
#[derive(Debug)]
pub struct SpoolPrintService {
    dir: PathBuf,
    capabilities: Capabilities,
    history: usize,
    jobs: Mutex<Vec<Arc<SpoolJob>>>,
}

impl SpoolPrintService {
    /// Spool into `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        Ok(Self {
            dir,
            capabilities: Capabilities {
                print: true,
                duplex: false,
            },
            history: DEFAULT_JOB_HISTORY,
            jobs: Mutex::new(Vec::new()),
        })
    }

    /// Declare duplex support.
    pub fn with_duplex(mut self, duplex: bool) -> Self {
        self.capabilities.duplex = duplex;
        self
    }

    /// Number of jobs remembered once they finish.
    pub fn with_history(mut self, history: usize) -> Self {
        self.history = history;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Recently submitted jobs, oldest first.
    ///
    /// In-flight jobs are always listed; finished ones only until the
    /// history limit pushes them out.
    pub fn jobs(&self) -> Vec<Arc<SpoolJob>> {
        self.jobs.lock().map(|jobs| jobs.clone()).unwrap_or_default()
    }

    fn register(&self, job_name: &str, attributes: Option<PrintAttributes>) -> Arc<SpoolJob> {
        let job = Arc::new(SpoolJob::new(job_name, attributes));
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.push(job.clone());
            prune_history(&mut jobs, self.history);
        }
        job
    }

    fn output_path(&self, job: &SpoolJob, extension: &str) -> PathBuf {
        let short_id: String = job.id.0.chars().take(8).collect();
        self.dir
            .join(format!("{}-{}.{}", file_stem(&job.name), short_id, extension))
    }
}

#[async_trait]
impl PrintService for SpoolPrintService {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    #[instrument(skip(self, adapter, attributes), fields(dir = %self.dir.display()))]
    async fn print_document(
        &self,
        job_name: &str,
        adapter: Box<dyn DocumentAdapter>,
        attributes: PrintAttributes,
    ) -> PrintResult<Arc<dyn PrintJob>> {
        let job = self.register(job_name, Some(attributes.clone()));
        let path = self.output_path(&job, "prn");

        info!(job = %job.id, path = %path.display(), "Spooling document");

        let worker = job.clone();
        tokio::task::spawn_blocking(move || {
            run_guarded(&worker, || spool_document(&worker, adapter, &attributes, path))
        });

        Ok(job)
    }

    #[instrument(skip(self, bitmap), fields(dir = %self.dir.display()))]
    async fn print_bitmap(
        &self,
        job_name: &str,
        bitmap: DynamicImage,
        settings: BitmapSettings,
    ) -> PrintResult<Arc<dyn PrintJob>> {
        let job = self.register(job_name, None);
        let path = self.output_path(&job, "png");

        info!(job = %job.id, path = %path.display(), "Spooling bitmap");

        let worker = job.clone();
        tokio::task::spawn_blocking(move || {
            run_guarded(&worker, || spool_bitmap(&worker, bitmap, settings, path))
        });

        Ok(job)
    }

    fn installed_services(&self) -> Vec<PrintServiceInfo> {
        vec![PrintServiceInfo {
            id: SPOOL_SERVICE_ID.to_string(),
            label: format!("Spool ({})", self.dir.display()),
            package_name: env!("CARGO_PKG_NAME").to_string(),
            enabled: true,
        }]
    }

    async fn pick_printer(&self) -> Option<PrinterId> {
        // No picker UI: the spool directory is the only printer
        Some(PrinterId {
            service_id: SPOOL_SERVICE_ID.to_string(),
            local_id: self.dir.display().to_string(),
        })
    }
}

/// Drop the oldest finished jobs beyond `history`.
fn prune_history(jobs: &mut Vec<Arc<SpoolJob>>, history: usize) {
    let finished = jobs.iter().filter(|job| job.state().is_terminal()).count();
    let mut excess = finished.saturating_sub(history);

    jobs.retain(|job| {
        if excess > 0 && job.state().is_terminal() {
            excess -= 1;
            false
        } else {
            true
        }
    });
}

/// Run a job worker; a panic fails the job.
fn run_guarded(job: &SpoolJob, work: impl FnOnce()) {
    if panic::catch_unwind(AssertUnwindSafe(work)).is_err() {
        warn!(job = %job.id, "Print worker panicked");
        if !job.state().is_terminal() {
            job.set_state(JobState::Failed);
        }
    }
}

fn spool_document(
    job: &SpoolJob,
    mut adapter: Box<dyn DocumentAdapter>,
    attributes: &PrintAttributes,
    path: PathBuf,
) {
    adapter.on_start();
    job.set_state(JobState::Queued);

    let state = match adapter.on_layout(None, attributes, &job.cancel) {
        LayoutResult::Finished { info, .. } => {
            debug!(job = %job.id, pages = ?info.page_count, "Layout finished");
            job.set_state(JobState::Started);
            write_document(job, adapter.as_mut(), &path)
        }
        LayoutResult::Failed(message) => {
            warn!(job = %job.id, %message, "Layout failed");
            JobState::Failed
        }
        LayoutResult::Cancelled => JobState::Cancelled,
    };

    job.set_state(state);
    adapter.on_finish();
}

fn write_document(job: &SpoolJob, adapter: &mut dyn DocumentAdapter, path: &Path) -> JobState {
    let file = match File::create(path) {
        Ok(file) => file,
        Err(e) => {
            warn!(job = %job.id, error = %e, "Cannot create spool file");
            return JobState::Failed;
        }
    };

    match adapter.on_write(&[PageRange::ALL_PAGES], Box::new(file), &job.cancel) {
        WriteResult::Finished(_) => {
            job.set_output(path.to_path_buf());
            JobState::Completed
        }
        WriteResult::Failed(message) => {
            warn!(job = %job.id, %message, "Write failed");
            let _ = fs::remove_file(path);
            JobState::Failed
        }
        WriteResult::Cancelled => {
            let _ = fs::remove_file(path);
            JobState::Cancelled
        }
    }
}

fn spool_bitmap(job: &SpoolJob, bitmap: DynamicImage, settings: BitmapSettings, path: PathBuf) {
    job.set_state(JobState::Queued);

    if job.cancel.is_cancelled() {
        job.set_state(JobState::Cancelled);
        return;
    }

    job.set_state(JobState::Started);
    let page = prepare_bitmap(bitmap, &settings);

    match page.save_with_format(&path, ImageFormat::Png) {
        Ok(()) => {
            job.set_output(path);
            job.set_state(JobState::Completed);
        }
        Err(e) => {
            warn!(job = %job.id, error = %e, "Bitmap save failed");
            job.set_state(JobState::Failed);
        }
    }
}

/// Apply color mode, orientation and scale mode to a bitmap page.
///
/// An image whose aspect does not match the requested orientation is
/// rotated a quarter turn before it is fitted or cropped to the page.
fn prepare_bitmap(bitmap: DynamicImage, settings: &BitmapSettings) -> DynamicImage {
    let bitmap = match settings.color_mode {
        Some(ColorMode::Monochrome) => bitmap.grayscale(),
        _ => bitmap,
    };

    let landscape = bitmap.width() > bitmap.height();
    let bitmap = match settings.orientation {
        Some(Orientation::Landscape) if !landscape => bitmap.rotate90(),
        Some(Orientation::Portrait) if landscape => bitmap.rotate90(),
        _ => bitmap,
    };

    match settings.scale_mode {
        ScaleMode::Fit => fit_to_page(bitmap),
        ScaleMode::Fill => fill_page(bitmap),
    }
}

/// Page width and height in aspect units for an image of this shape.
fn page_shape(bitmap: &DynamicImage) -> (u64, u64) {
    let (short, long) = PAGE_ASPECT;
    if bitmap.width() > bitmap.height() {
        (long, short)
    } else {
        (short, long)
    }
}

/// Smallest page-shaped white canvas holding the whole image, centered.
fn fit_to_page(bitmap: DynamicImage) -> DynamicImage {
    let (pw, ph) = page_shape(&bitmap);
    let (w, h) = (u64::from(bitmap.width()), u64::from(bitmap.height()));

    let (cw, ch) = if w * ph >= h * pw {
        (w, (w * ph).div_ceil(pw))
    } else {
        ((h * pw).div_ceil(ph), h)
    };
    if (cw, ch) == (w, h) {
        return bitmap;
    }

    let (cw, ch) = (cw as u32, ch as u32);
    let mut canvas = match &bitmap {
        DynamicImage::ImageLuma8(_) => {
            DynamicImage::ImageLuma8(GrayImage::from_pixel(cw, ch, Luma([255])))
        }
        DynamicImage::ImageLumaA8(_) => DynamicImage::ImageLumaA8(
            image::ImageBuffer::from_pixel(cw, ch, LumaA([255, 255])),
        ),
        _ => DynamicImage::ImageRgba8(RgbaImage::from_pixel(cw, ch, Rgba([255, 255, 255, 255]))),
    };

    let x = i64::from((cw - bitmap.width()) / 2);
    let y = i64::from((ch - bitmap.height()) / 2);
    image::imageops::overlay(&mut canvas, &bitmap, x, y);
    canvas
}

/// Largest page-shaped region of the image, around its center.
fn fill_page(bitmap: DynamicImage) -> DynamicImage {
    let (pw, ph) = page_shape(&bitmap);
    let (w, h) = (u64::from(bitmap.width()), u64::from(bitmap.height()));

    let (cw, ch) = if w * ph >= h * pw {
        ((h * pw / ph).max(1), h)
    } else {
        (w, (w * ph / pw).max(1))
    };
    if (cw, ch) == (w, h) {
        return bitmap;
    }

    let (cw, ch) = (cw as u32, ch as u32);
    let x = (bitmap.width() - cw) / 2;
    let y = (bitmap.height() - ch) / 2;
    bitmap.crop_imm(x, y, cw, ch)
}

/// Job name reduced to a safe file-name stem.
fn file_stem(job_name: &str) -> String {
    let stem: String = job_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STEM_LEN)
        .collect();

    if stem.is_empty() {
        "job".to_string()
    } else {
        stem
    }
}

// ============================================================================
// RENDERER
// ============================================================================

/// Renderer factory for the spool backend.
#[derive(Debug, Clone, Default)]
pub struct SpoolRendererFactory {
    host_view: Option<String>,
}

impl SpoolRendererFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Markup of the host view, printed when no content is given.
    pub fn with_host_view(mut self, markup: impl Into<String>) -> Self {
        self.host_view = Some(markup.into());
        self
    }
}

impl RendererFactory for SpoolRendererFactory {
    fn create(&self, settings: &RenderSettings, events: RenderEvents) -> Box<dyn WebRenderer> {
        debug!(?settings, "Creating spool renderer");
        Box::new(SpoolRenderer {
            events,
            content: String::new(),
        })
    }

    fn host_view_adapter(&self, job_name: &str) -> Option<Box<dyn DocumentAdapter>> {
        self.host_view
            .as_ref()
            .map(|markup| Box::new(MarkupAdapter::new(job_name, markup)) as Box<dyn DocumentAdapter>)
    }
}

/// Keeps the loaded markup and reports it finished immediately.
struct SpoolRenderer {
    events: RenderEvents,
    content: String,
}

impl WebRenderer for SpoolRenderer {
    fn load_data(&mut self, base_url: &str, content: &str, _mime: &str) {
        self.content = content.to_string();

        let url = base_url.to_string();
        let _ = self.events.send(RenderEvent::PageStarted { url: url.clone() });
        let _ = self.events.send(RenderEvent::PageFinished { url });
    }

    fn create_print_adapter(&mut self, job_name: &str) -> Box<dyn DocumentAdapter> {
        Box::new(MarkupAdapter::new(job_name, &self.content))
    }
}

/// Writes rendered markup as the document body.
struct MarkupAdapter {
    job_name: String,
    body: Vec<u8>,
}

impl MarkupAdapter {
    fn new(job_name: &str, markup: &str) -> Self {
        Self {
            job_name: job_name.to_string(),
            body: markup.as_bytes().to_vec(),
        }
    }
}

impl DocumentAdapter for MarkupAdapter {
    fn on_layout(
        &mut self,
        old: Option<&PrintAttributes>,
        new: &PrintAttributes,
        cancel: &CancellationSignal,
    ) -> LayoutResult {
        if cancel.is_cancelled() {
            return LayoutResult::Cancelled;
        }

        LayoutResult::Finished {
            info: DocumentInfo {
                name: self.job_name.clone(),
                kind: DocumentKind::Document,
                page_count: None,
            },
            changed: old != Some(new),
        }
    }

    fn on_write(
        &mut self,
        _pages: &[PageRange],
        dest: WriteDestination,
        cancel: &CancellationSignal,
    ) -> WriteResult {
        if cancel.is_cancelled() {
            return WriteResult::Cancelled;
        }

        match copy(self.body.as_slice(), dest) {
            Ok(_) => WriteResult::Finished(vec![PageRange::ALL_PAGES]),
            Err(e) => WriteResult::Failed(e.to_string()),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
