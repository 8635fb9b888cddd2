//! # Platform Print Service
//!
//! The operating system's print framework, seen through one trait. An
//! implementation submits jobs and hands back a [`PrintJob`] handle; the
//! actual printing is asynchronous and owned by the platform.
//!
//! ## Capability Detection
//!
//! Features that only exist on some OS versions (duplex) are reported once
//! through [`Capabilities`], determined when the service is constructed.
//! Call sites branch on the flags instead of probing the platform per call.
//!
//! ## Modules
//!
//! - [`job`]: job handles and states
//! - [`spool`]: headless backend writing jobs to a directory

pub mod job;
pub mod spool;

pub use job::{JobId, JobState, PrintJob};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;
use serde::Serialize;

use crate::adapter::DocumentAdapter;
use crate::error::PrintResult;
use crate::options::{BitmapSettings, PrintAttributes};

/// What the print service on this device supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// Native printing exists at all
    pub print: bool,
    /// Duplex attributes are honored
    pub duplex: bool,
}

/// An installed print backend (a "print service" plugin on the device).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintServiceInfo {
    pub id: String,
    pub label: String,
    pub package_name: String,
    pub enabled: bool,
}

/// A printer chosen by the user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterId {
    /// Service the printer belongs to
    pub service_id: String,
    /// Printer id local to that service
    pub local_id: String,
}

impl fmt::Display for PrinterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service_id, self.local_id)
    }
}

/// The native print service.
#[async_trait]
pub trait PrintService: Send + Sync {
    /// Capabilities detected when the service was created.
    fn capabilities(&self) -> Capabilities;

    /// Submit a paginated document job.
    async fn print_document(
        &self,
        job_name: &str,
        adapter: Box<dyn DocumentAdapter>,
        attributes: PrintAttributes,
    ) -> PrintResult<Arc<dyn PrintJob>>;

    /// Submit a single bitmap as a one-page job.
    async fn print_bitmap(
        &self,
        job_name: &str,
        bitmap: DynamicImage,
        settings: BitmapSettings,
    ) -> PrintResult<Arc<dyn PrintJob>>;

    /// Every print backend installed on the device.
    fn installed_services(&self) -> Vec<PrintServiceInfo>;

    /// Installed print backends the user has enabled.
    fn enabled_services(&self) -> Vec<PrintServiceInfo> {
        self.installed_services()
            .into_iter()
            .filter(|service| service.enabled)
            .collect()
    }

    /// Present the printer picker. `None` when dismissed.
    async fn pick_printer(&self) -> Option<PrinterId>;

    /// Whether the device has network connectivity.
    async fn is_online(&self) -> bool {
        false
    }

    /// Whether a companion print-helper application is installed.
    fn has_companion_app(&self) -> bool {
        false
    }
}
