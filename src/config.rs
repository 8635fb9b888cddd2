//! # Bridge Configuration
//!
//! Host-level settings for a [`Printer`](crate::printer::Printer). The
//! binary fills these from command-line flags; embedders construct them
//! directly.
//!
//! ## Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `asset_root` | `.` |
//! | `resource_root` | `res` |
//! | `asset_base` | `www` |
//! | `base_url` | `file:///android_asset/www/` |
//! | `relay` | `listen` |
//! | `poll_interval` | 250 ms |
//! | `require_connectivity` | `false` |

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::content::{ContentSource, DirAssets, DirResources};
use crate::relay::{CompletionRelay, DEFAULT_POLL_INTERVAL, RelayStrategy};
use crate::render::DEFAULT_BASE_URL;

/// Host configuration of the print bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Directory `file://` asset references resolve under
    pub asset_root: PathBuf,
    /// Directory holding `<category>/<name>.<ext>` resources
    pub resource_root: PathBuf,
    /// Asset directory substituted for `file:/` in asset references
    pub asset_base: String,
    /// Base URL markup is rendered under
    pub base_url: String,
    /// How job completion is observed
    pub relay: RelayStrategy,
    /// Interval between job state reads when polling
    pub poll_interval: Duration,
    /// Only report printing as available when the device is online or a
    /// companion print app is installed
    pub require_connectivity: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("."),
            resource_root: PathBuf::from("res"),
            asset_base: "www".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            relay: RelayStrategy::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            require_connectivity: false,
        }
    }
}

impl BridgeConfig {
    /// Content source over the configured asset and resource directories.
    pub fn content_source(&self) -> ContentSource {
        ContentSource::new(
            Arc::new(DirAssets::new(&self.asset_root)),
            Arc::new(DirResources::new(&self.resource_root)),
        )
        .with_asset_base(self.asset_base.clone())
    }

    pub fn relay(&self) -> CompletionRelay {
        CompletionRelay::new(self.relay, self.poll_interval)
    }
}
