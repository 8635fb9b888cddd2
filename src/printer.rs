//! # Printer
//!
//! The print dispatch facade. One [`Printer`] wires the content layer, the
//! render bridge, the platform print service and the completion relay
//! together.
//!
//! ## Dispatch
//!
//! | Content | Path |
//! |---------|------|
//! | `Image` | decode → `print_bitmap` |
//! | `Pdf` | open → [`StreamAdapter`] → `print_document` |
//! | `Html` / `Plain` | [`RenderBridge`] → `print_document` |
//! | `SelfView` | host view adapter → `print_document` |
//! | `Unsupported` | rejected, nothing submitted |
//!
//! Content that cannot be opened or decoded is rejected before anything
//! reaches the print service.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::adapter::{DocumentAdapter, FinishProxy, StreamAdapter};
use crate::config::BridgeConfig;
use crate::content::{ContentSource, ContentType, PRINTABLE_TYPES, classify};
use crate::error::{PrintError, PrintResult};
use crate::options::PrintOptions;
use crate::platform::{PrintJob, PrintService, PrintServiceInfo, PrinterId};
use crate::relay::{Completion, CompletionRelay, JobOutcome};
use crate::render::{RenderBridge, RendererFactory};

/// A submitted job and the finish signal of its adapter, if any.
type Submission = (Arc<dyn PrintJob>, Option<tokio::sync::oneshot::Receiver<()>>);

/// Print dispatch facade.
#[derive(Clone)]
pub struct Printer {
    service: Arc<dyn PrintService>,
    source: ContentSource,
    render: RenderBridge,
    relay: CompletionRelay,
    require_connectivity: bool,
}

impl Printer {
    pub fn new(
        config: &BridgeConfig,
        service: Arc<dyn PrintService>,
        renderers: Arc<dyn RendererFactory>,
    ) -> Self {
        Self {
            service,
            source: config.content_source(),
            render: RenderBridge::new(renderers, config.base_url.clone()),
            relay: config.relay(),
            require_connectivity: config.require_connectivity,
        }
    }

    /// Replace the content source built from the configuration.
    pub fn with_content_source(mut self, source: ContentSource) -> Self {
        self.source = source;
        self
    }

    pub fn service(&self) -> &Arc<dyn PrintService> {
        &self.service
    }

    /// Whether printing is possible on this device.
    pub async fn is_available(&self) -> bool {
        if !self.service.capabilities().print {
            return false;
        }

        if !self.require_connectivity {
            return true;
        }

        self.service.is_online().await || self.service.has_companion_app()
    }

    /// Whether `reference` can be printed, or printing at all when `None`.
    pub async fn check(&self, reference: Option<&str>) -> bool {
        match reference {
            None => self.is_available().await,
            Some(reference) => classify(Some(reference)) != ContentType::Unsupported,
        }
    }

    pub fn printable_types(&self) -> &'static [&'static str] {
        PRINTABLE_TYPES
    }

    /// Print `content` and wait for the job's terminal outcome.
    #[instrument(skip_all, fields(kind = tracing::field::Empty))]
    pub async fn print(&self, content: Option<&str>, options: &PrintOptions) -> PrintResult<JobOutcome> {
        let kind = classify(content);
        tracing::Span::current().record("kind", tracing::field::debug(kind));

        // Resolved once: a generated name changes on every call
        let job_name = options.job_name();
        let reference = content.unwrap_or_default();

        let (job, finished) = match kind {
            ContentType::Image => self.submit_image(reference, &job_name, options).await?,
            ContentType::Pdf => self.submit_pdf(reference, &job_name, options).await?,
            ContentType::Html | ContentType::Plain => {
                self.submit_markup(reference, kind, &job_name, options).await?
            }
            ContentType::SelfView => self.submit_host_view(&job_name, options).await?,
            ContentType::Unsupported => {
                warn!(reference = %truncated(reference), "Unsupported content");
                return Err(PrintError::Unsupported(truncated(reference)));
            }
        };

        info!(job = %job.id(), name = %job_name, "Print job submitted");
        Ok(self.relay.await_completion(job, finished).await)
    }

    /// Present the printer picker.
    pub async fn pick_printer(&self) -> Option<PrinterId> {
        self.service.pick_printer().await
    }

    /// Installed print backends, or only the enabled ones.
    pub fn print_services(&self, enabled_only: bool) -> Vec<PrintServiceInfo> {
        if enabled_only {
            self.service.enabled_services()
        } else {
            self.service.installed_services()
        }
    }

    async fn submit_image(
        &self,
        reference: &str,
        job_name: &str,
        options: &PrintOptions,
    ) -> PrintResult<Submission> {
        let source = self.source.clone();
        let owned = reference.to_string();
        let bitmap = tokio::task::spawn_blocking(move || source.decode(&owned))
            .await?
            .ok_or_else(|| PrintError::NotFound(truncated(reference)))?;

        debug!(width = bitmap.width(), height = bitmap.height(), "Bitmap decoded");

        let job = self
            .service
            .print_bitmap(job_name, bitmap, options.bitmap_settings())
            .await?;
        Ok((job, None))
    }

    async fn submit_pdf(
        &self,
        reference: &str,
        job_name: &str,
        options: &PrintOptions,
    ) -> PrintResult<Submission> {
        let source = self.source.clone();
        let owned = reference.to_string();
        let input = tokio::task::spawn_blocking(move || source.open(&owned))
            .await?
            .ok_or_else(|| PrintError::NotFound(truncated(reference)))?;

        let (finish, finished) = Completion::new();
        let adapter = StreamAdapter::new(job_name, options.page_count(), input)
            .with_finish_callback(Box::new(move || {
                finish.report(());
            }));

        let attributes = options.to_attributes(&self.service.capabilities());
        let job = self
            .service
            .print_document(job_name, Box::new(adapter), attributes)
            .await?;
        Ok((job, Some(finished)))
    }

    async fn submit_markup(
        &self,
        content: &str,
        kind: ContentType,
        job_name: &str,
        options: &PrintOptions,
    ) -> PrintResult<Submission> {
        let mime = kind.render_mime().unwrap_or("text/plain");
        let adapter = self
            .render
            .render_and_adapt(content, mime, job_name, &options.render_settings())
            .await?;

        self.submit_adapter(adapter, job_name, options).await
    }

    async fn submit_host_view(&self, job_name: &str, options: &PrintOptions) -> PrintResult<Submission> {
        let adapter = self
            .render
            .factory()
            .host_view_adapter(job_name)
            .ok_or_else(|| PrintError::Render("No host view to print".to_string()))?;

        self.submit_adapter(adapter, job_name, options).await
    }

    async fn submit_adapter(
        &self,
        adapter: Box<dyn DocumentAdapter>,
        job_name: &str,
        options: &PrintOptions,
    ) -> PrintResult<Submission> {
        let (finish, finished) = Completion::new();
        let proxy = FinishProxy::new(
            adapter,
            Box::new(move || {
                finish.report(());
            }),
        );

        let attributes = options.to_attributes(&self.service.capabilities());
        let job = self
            .service
            .print_document(job_name, Box::new(proxy), attributes)
            .await?;
        Ok((job, Some(finished)))
    }
}

/// Reference shortened for logs and errors; inline payloads can be huge.
fn truncated(reference: &str) -> String {
    const MAX: usize = 64;

    match reference.char_indices().nth(MAX) {
        Some((end, _)) => format!("{}...", &reference[..end]),
        None => reference.to_string(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{CancellationSignal, LayoutResult, PageRange, WriteResult};
    use crate::content::{AssetStore, ContentStream, ResourceBundle, ResourceId};
    use crate::options::{BitmapSettings, PrintAttributes};
    use crate::platform::{Capabilities, JobId, JobState};
    use crate::render::{RenderEvent, RenderEvents, WebRenderer};
    use async_trait::async_trait;
    use image::DynamicImage;
    use serde_json::json;
    use std::io;
    use std::sync::Mutex;

    struct NoAssets;

    impl AssetStore for NoAssets {
        fn open(&self, path: &str) -> io::Result<ContentStream> {
            Err(io::Error::new(io::ErrorKind::NotFound, path.to_string()))
        }
    }

    impl ResourceBundle for NoAssets {
        fn lookup(&self, _name: &str, _category: &str) -> Option<ResourceId> {
            None
        }

        fn open_raw(&self, id: &ResourceId) -> io::Result<ContentStream> {
            Err(io::Error::new(io::ErrorKind::NotFound, id.name.clone()))
        }
    }

    struct DoneJob {
        id: JobId,
        name: String,
    }

    impl PrintJob for DoneJob {
        fn id(&self) -> &JobId {
            &self.id
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn state(&self) -> JobState {
            JobState::Completed
        }
    }

    /// Records submissions and completes every job immediately.
    #[derive(Default)]
    struct RecordingService {
        caps: Option<Capabilities>,
        online: bool,
        companion: bool,
        documents: Mutex<Vec<(String, PrintAttributes)>>,
        bitmaps: Mutex<Vec<(String, BitmapSettings)>>,
    }

    impl RecordingService {
        fn submissions(&self) -> usize {
            self.documents.lock().unwrap().len() + self.bitmaps.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PrintService for RecordingService {
        fn capabilities(&self) -> Capabilities {
            self.caps.unwrap_or(Capabilities {
                print: true,
                duplex: false,
            })
        }

        async fn print_document(
            &self,
            job_name: &str,
            mut adapter: Box<dyn DocumentAdapter>,
            attributes: PrintAttributes,
        ) -> PrintResult<Arc<dyn PrintJob>> {
            self.documents
                .lock()
                .unwrap()
                .push((job_name.to_string(), attributes));
            adapter.on_finish();
            Ok(Arc::new(DoneJob {
                id: JobId("doc".to_string()),
                name: job_name.to_string(),
            }))
        }

        async fn print_bitmap(
            &self,
            job_name: &str,
            _bitmap: DynamicImage,
            settings: BitmapSettings,
        ) -> PrintResult<Arc<dyn PrintJob>> {
            self.bitmaps
                .lock()
                .unwrap()
                .push((job_name.to_string(), settings));
            Ok(Arc::new(DoneJob {
                id: JobId("bmp".to_string()),
                name: job_name.to_string(),
            }))
        }

        fn installed_services(&self) -> Vec<PrintServiceInfo> {
            vec![
                PrintServiceInfo {
                    id: "a".to_string(),
                    label: "A".to_string(),
                    package_name: "pkg.a".to_string(),
                    enabled: true,
                },
                PrintServiceInfo {
                    id: "b".to_string(),
                    label: "B".to_string(),
                    package_name: "pkg.b".to_string(),
                    enabled: false,
                },
            ]
        }

        async fn pick_printer(&self) -> Option<PrinterId> {
            None
        }

        async fn is_online(&self) -> bool {
            self.online
        }

        fn has_companion_app(&self) -> bool {
            self.companion
        }
    }

    struct InstantRenderer(RenderEvents);

    impl WebRenderer for InstantRenderer {
        fn load_data(&mut self, base_url: &str, _content: &str, _mime: &str) {
            let _ = self.0.send(RenderEvent::PageFinished {
                url: base_url.to_string(),
            });
        }

        fn create_print_adapter(&mut self, _job_name: &str) -> Box<dyn DocumentAdapter> {
            Box::new(EmptyAdapter)
        }
    }

    struct EmptyAdapter;

    impl DocumentAdapter for EmptyAdapter {
        fn on_layout(
            &mut self,
            _old: Option<&PrintAttributes>,
            _new: &PrintAttributes,
            _cancel: &CancellationSignal,
        ) -> LayoutResult {
            LayoutResult::Cancelled
        }

        fn on_write(
            &mut self,
            _pages: &[PageRange],
            _dest: crate::adapter::WriteDestination,
            _cancel: &CancellationSignal,
        ) -> WriteResult {
            WriteResult::Cancelled
        }
    }

    struct InstantFactory {
        host_view: bool,
    }

    impl RendererFactory for InstantFactory {
        fn create(
            &self,
            _settings: &crate::options::RenderSettings,
            events: RenderEvents,
        ) -> Box<dyn WebRenderer> {
            Box::new(InstantRenderer(events))
        }

        fn host_view_adapter(&self, _job_name: &str) -> Option<Box<dyn DocumentAdapter>> {
            self.host_view
                .then(|| Box::new(EmptyAdapter) as Box<dyn DocumentAdapter>)
        }
    }

    fn printer(service: Arc<RecordingService>, host_view: bool) -> Printer {
        let config = BridgeConfig {
            require_connectivity: true,
            ..Default::default()
        };
        Printer::new(&config, service, Arc::new(InstantFactory { host_view }))
            .with_content_source(ContentSource::new(Arc::new(NoAssets), Arc::new(NoAssets)))
    }

    #[tokio::test]
    async fn test_markup_is_rendered_and_submitted() {
        let service = Arc::new(RecordingService::default());
        let printer = printer(service.clone(), false);

        let options = PrintOptions::from_value(json!({ "name": "Menu" }));
        let outcome = printer.print(Some("<h1>Menu</h1>"), &options).await.unwrap();

        assert_eq!(outcome, JobOutcome::Succeeded);
        assert_eq!(service.documents.lock().unwrap()[0].0, "Menu");
    }

    #[tokio::test]
    async fn test_plain_text_is_rendered() {
        let service = Arc::new(RecordingService::default());
        let printer = printer(service.clone(), false);

        let outcome = printer.print(Some("hello"), &PrintOptions::default()).await.unwrap();
        assert_eq!(outcome, JobOutcome::Succeeded);
        assert_eq!(service.submissions(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_submits_nothing() {
        let service = Arc::new(RecordingService::default());
        let printer = printer(service.clone(), false);

        let err = printer
            .print(Some("https://example.com/archive.zip"), &PrintOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PrintError::Unsupported(_)));
        assert_eq!(service.submissions(), 0);
    }

    #[tokio::test]
    async fn test_missing_pdf_submits_nothing() {
        let service = Arc::new(RecordingService::default());
        let printer = printer(service.clone(), false);

        let err = printer
            .print(Some("file:///nonexistent/doc.pdf"), &PrintOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PrintError::NotFound(_)));
        assert_eq!(service.submissions(), 0);
    }

    #[tokio::test]
    async fn test_undecodable_image_submits_nothing() {
        let service = Arc::new(RecordingService::default());
        let printer = printer(service.clone(), false);

        let err = printer
            .print(Some("res://drawable/missing.png"), &PrintOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PrintError::NotFound(_)));
        assert_eq!(service.submissions(), 0);
    }

    #[tokio::test]
    async fn test_host_view_requires_factory_support() {
        let service = Arc::new(RecordingService::default());

        let err = printer(service.clone(), false)
            .print(None, &PrintOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PrintError::Render(_)));

        let outcome = printer(service.clone(), true)
            .print(Some(""), &PrintOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome, JobOutcome::Succeeded);
        assert_eq!(service.submissions(), 1);
    }

    #[tokio::test]
    async fn test_availability_requires_connectivity_when_configured() {
        let offline = Arc::new(RecordingService::default());
        assert!(!printer(offline, false).is_available().await);

        let online = Arc::new(RecordingService {
            online: true,
            ..Default::default()
        });
        assert!(printer(online, false).is_available().await);

        let companion = Arc::new(RecordingService {
            companion: true,
            ..Default::default()
        });
        assert!(printer(companion, false).is_available().await);

        let no_print = Arc::new(RecordingService {
            caps: Some(Capabilities {
                print: false,
                duplex: false,
            }),
            online: true,
            ..Default::default()
        });
        assert!(!printer(no_print, false).is_available().await);
    }

    #[tokio::test]
    async fn test_check() {
        let printer = printer(
            Arc::new(RecordingService {
                online: true,
                ..Default::default()
            }),
            false,
        );

        assert!(printer.check(None).await);
        assert!(printer.check(Some("<p/>")).await);
        assert!(printer.check(Some("file://docs/a.pdf")).await);
        assert!(!printer.check(Some("file://docs/a.docx")).await);
    }

    #[test]
    fn test_print_services_filters_enabled() {
        let printer = printer(Arc::new(RecordingService::default()), false);
        assert_eq!(printer.print_services(false).len(), 2);
        assert_eq!(printer.print_services(true).len(), 1);
        assert_eq!(printer.printable_types(), PRINTABLE_TYPES);
    }

    #[test]
    fn test_truncated() {
        assert_eq!(truncated("short"), "short");
        let long = "x".repeat(100);
        assert_eq!(truncated(&long).len(), 67);
    }
}
