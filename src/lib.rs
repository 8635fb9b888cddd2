//! # printbridge - Native Document Printing for Hybrid Apps
//!
//! printbridge lets a web-view application print HTML, plain text, PDF and
//! images through the platform's print service. It provides:
//!
//! - **Content handling**: classify content references, open files, assets,
//!   resources and inline base64 payloads, decode images
//! - **Rendering**: load markup into a web renderer and print the result
//! - **Dispatch**: map print options onto print attributes and submit jobs
//! - **Completion**: report one terminal outcome per job
//! - **Bridge**: action name plus JSON arguments in, JSON result out
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use printbridge::{Bridge, BridgeConfig, Printer};
//! use printbridge::platform::spool::{SpoolPrintService, SpoolRendererFactory};
//! use serde_json::json;
//!
//! # async fn example() -> printbridge::PrintResult<()> {
//! // Headless backend: jobs land in ./spool
//! let service = SpoolPrintService::new("./spool")?;
//! let printer = Printer::new(
//!     &BridgeConfig::default(),
//!     Arc::new(service),
//!     Arc::new(SpoolRendererFactory::new()),
//! );
//! let bridge = Bridge::new(printer);
//!
//! let done = bridge
//!     .execute("print", json!(["<h1>Hello</h1>", { "name": "Greeting" }]))
//!     .await?;
//! assert_eq!(done, json!(true));
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`content`] | Content references: classify, open, decode |
//! | [`options`] | Print options and the attributes derived from them |
//! | [`adapter`] | Document adapters driven by the print service |
//! | [`render`] | Markup to document adapter via a web renderer |
//! | [`platform`] | Print service seam and the spool backend |
//! | [`relay`] | Job completion relay |
//! | [`printer`] | Print dispatch facade |
//! | [`bridge`] | Request bridge |
//! | [`server`] | HTTP endpoint for bridge actions |
//! | [`config`] | Host configuration |
//! | [`error`] | Error types |

pub mod adapter;
pub mod bridge;
pub mod config;
pub mod content;
pub mod error;
pub mod options;
pub mod platform;
pub mod printer;
pub mod relay;
pub mod render;
pub mod server;

// Re-exports for convenience
pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use content::{ContentType, classify};
pub use error::{PrintError, PrintResult};
pub use options::PrintOptions;
pub use printer::Printer;
pub use relay::JobOutcome;
