//! # Render Bridge
//!
//! Prints markup by loading it into an embedded web renderer and asking the
//! renderer for a document adapter once the page has loaded.
//!
//! ## States
//!
//! ```text
//! Idle ─▶ Loading ─▶ Ready ─▶ AdapterAcquired ─▶ Closed
//! ```
//!
//! - `Loading → Ready` happens on the first `PageFinished` for the URL that
//!   was loaded. Events for other URLs (redirects, sub-frames) are ignored.
//! - The renderer is dropped as soon as its adapter has been taken. Every
//!   request gets a renderer of its own.
//!
//! There is no timeout on the load: a page that never finishes keeps the
//! request waiting, exactly as long as the platform renderer does.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, instrument};

use crate::adapter::DocumentAdapter;
use crate::error::{PrintError, PrintResult};
use crate::options::RenderSettings;

/// Base URL markup is loaded under, so relative links resolve to the app's
/// bundled web assets.
pub const DEFAULT_BASE_URL: &str = "file:///android_asset/www/";

/// Events a renderer emits while loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    PageStarted { url: String },
    PageFinished { url: String },
}

/// Sender half handed to each renderer.
pub type RenderEvents = mpsc::UnboundedSender<RenderEvent>;

/// An embedded web renderer instance.
pub trait WebRenderer: Send {
    /// Load `content` of type `mime` with relative URLs resolved against
    /// `base_url`.
    fn load_data(&mut self, base_url: &str, content: &str, mime: &str);

    /// A print adapter bound to the currently rendered page.
    fn create_print_adapter(&mut self, job_name: &str) -> Box<dyn DocumentAdapter>;
}

/// Creates renderers and exposes the host view.
pub trait RendererFactory: Send + Sync {
    /// A fresh renderer configured per `settings`, reporting to `events`.
    fn create(&self, settings: &RenderSettings, events: RenderEvents) -> Box<dyn WebRenderer>;

    /// An adapter printing the host application's own view, if there is one.
    fn host_view_adapter(&self, job_name: &str) -> Option<Box<dyn DocumentAdapter>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Idle,
    Loading,
    Ready,
    AdapterAcquired,
    Closed,
}

/// Turns markup into document adapters.
#[derive(Clone)]
pub struct RenderBridge {
    factory: Arc<dyn RendererFactory>,
    base_url: String,
}

impl RenderBridge {
    pub fn new(factory: Arc<dyn RendererFactory>, base_url: impl Into<String>) -> Self {
        Self {
            factory,
            base_url: base_url.into(),
        }
    }

    pub fn factory(&self) -> &Arc<dyn RendererFactory> {
        &self.factory
    }

    /// Render `content` and return an adapter for it.
    #[instrument(skip(self, content, settings), fields(len = content.len()))]
    pub async fn render_and_adapt(
        &self,
        content: &str,
        mime: &str,
        job_name: &str,
        settings: &RenderSettings,
    ) -> PrintResult<Box<dyn DocumentAdapter>> {
        let mut session = RenderSession::new(self.factory.as_ref(), settings);
        session.load(&self.base_url, content, mime);
        session.wait_ready().await?;
        session.into_adapter(job_name)
    }
}

/// One renderer instance walking through the render states.
struct RenderSession {
    renderer: Option<Box<dyn WebRenderer>>,
    events: mpsc::UnboundedReceiver<RenderEvent>,
    expected_url: String,
    state: RenderState,
}

impl RenderSession {
    fn new(factory: &dyn RendererFactory, settings: &RenderSettings) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            renderer: Some(factory.create(settings, tx)),
            events: rx,
            expected_url: String::new(),
            state: RenderState::Idle,
        }
    }

    fn load(&mut self, base_url: &str, content: &str, mime: &str) {
        debug_assert_eq!(self.state, RenderState::Idle);

        self.expected_url = base_url.to_string();
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.load_data(base_url, content, mime);
        }
        self.state = RenderState::Loading;
    }

    async fn wait_ready(&mut self) -> PrintResult<()> {
        while self.state == RenderState::Loading {
            match self.events.recv().await {
                Some(RenderEvent::PageFinished { url }) if url == self.expected_url => {
                    debug!(%url, "Page ready");
                    self.state = RenderState::Ready;
                }
                Some(event) => debug!(?event, "Ignoring render event"),
                None => {
                    self.close();
                    return Err(PrintError::Render(
                        "Renderer closed before the page finished loading".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    fn into_adapter(mut self, job_name: &str) -> PrintResult<Box<dyn DocumentAdapter>> {
        let mut renderer = match (self.state, self.renderer.take()) {
            (RenderState::Ready, Some(renderer)) => renderer,
            (state, _) => {
                return Err(PrintError::Render(format!(
                    "No rendered page to print (state {:?})",
                    state
                )));
            }
        };

        let adapter = renderer.create_print_adapter(job_name);
        self.state = RenderState::AdapterAcquired;

        drop(renderer);
        self.close();
        Ok(adapter)
    }

    fn close(&mut self) {
        self.renderer = None;
        self.events.close();
        self.state = RenderState::Closed;
    }
}

// ============================================================================
// TESTS
// ============================================================================
