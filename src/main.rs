//! # printbridge CLI
//!
//! Command-line front end for the print bridge, running against the spool
//! backend.
//!
//! ## Usage
//!
//! ```bash
//! # How would this reference be printed?
//! printbridge classify file://docs/manual.pdf
//!
//! # Print markup into ./spool
//! printbridge --spool ./spool print '<h1>Hello</h1>' --options '{"name": "Hello"}'
//!
//! # Print an absolute PDF on a duplex-capable spool
//! printbridge --duplex print file:///tmp/report.pdf --options '{"duplex": "long"}'
//!
//! # Serve bridge actions over HTTP
//! printbridge serve --listen 127.0.0.1:8080
//! ```
//!
//! Set `RUST_LOG` to adjust logging (default `printbridge=info`).

use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use printbridge::{
    Bridge, BridgeConfig, PrintError, PrintOptions, Printer, classify,
    content::mime_type,
    platform::spool::{SpoolPrintService, SpoolRendererFactory},
    relay::RelayStrategy,
    server::{self, ServerConfig},
};

/// printbridge - print HTML, text, PDF and images through a print service
#[derive(Parser, Debug)]
#[command(name = "printbridge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory `file://` asset references resolve under
    #[arg(long, global = true, default_value = ".")]
    assets: PathBuf,

    /// Directory holding `<category>/<name>.<ext>` resources
    #[arg(long, global = true, default_value = "res")]
    resources: PathBuf,

    /// Directory print jobs are spooled into
    #[arg(long, global = true, default_value = "spool")]
    spool: PathBuf,

    /// Declare duplex support on the spool printer
    #[arg(long, global = true)]
    duplex: bool,

    /// How job completion is observed
    #[arg(long, global = true, value_enum, default_value_t = RelayStrategy::Listen)]
    relay: RelayStrategy,

    /// Job state poll interval in milliseconds
    #[arg(long, global = true, default_value = "250")]
    poll_ms: u64,

    /// Markup file printed when no content is given
    #[arg(long, global = true, value_name = "FILE")]
    host_view: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show how a content reference would be printed
    Classify {
        /// Content reference
        reference: String,
    },

    /// Check whether a reference is printable (or printing at all)
    Check {
        /// Content reference (omit to check availability)
        reference: Option<String>,
    },

    /// List printable document and image types
    Types,

    /// List print services
    Services {
        /// Only enabled services
        #[arg(long)]
        enabled: bool,
    },

    /// Print content and wait for the job to finish
    Print {
        /// Content reference (omit to print the host view)
        content: Option<String>,

        /// Print options as JSON (object or job name string)
        #[arg(long, value_name = "JSON")]
        options: Option<String>,
    },

    /// Serve bridge actions over HTTP
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8080")]
        listen: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "printbridge=info,tower_http=info".into()),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), PrintError> {
    let cli = Cli::parse();

    if let Commands::Classify { reference } = &cli.command {
        let kind = classify(Some(reference));
        print_json(&json!({ "type": kind, "mime": mime_type(reference) }))?;
        return Ok(());
    }

    let bridge = build_bridge(&cli)?;

    match cli.command {
        Commands::Classify { .. } => Ok(()),
        Commands::Check { reference } => {
            let args = reference.map_or_else(|| json!([]), |r| json!([r]));
            print_json(&bridge.execute("check", args).await?)
        }
        Commands::Types => print_json(&bridge.execute("types", Value::Null).await?),
        Commands::Services { enabled } => {
            print_json(&bridge.execute("services", json!([enabled])).await?)
        }
        Commands::Print { content, options } => {
            let options = match options {
                Some(raw) => serde_json::from_str(&raw)?,
                None => Value::Null,
            };
            print_content(&bridge, content.as_deref(), options).await
        }
        Commands::Serve { listen } => {
            let config = ServerConfig {
                listen_addr: listen,
            };
            server::serve(config, bridge).await
        }
    }
}

fn build_bridge(cli: &Cli) -> Result<Bridge, PrintError> {
    let config = BridgeConfig {
        asset_root: cli.assets.clone(),
        resource_root: cli.resources.clone(),
        relay: cli.relay,
        poll_interval: Duration::from_millis(cli.poll_ms),
        ..Default::default()
    };

    let service = SpoolPrintService::new(&cli.spool)?.with_duplex(cli.duplex);

    let mut renderers = SpoolRendererFactory::new();
    if let Some(path) = &cli.host_view {
        renderers = renderers.with_host_view(std::fs::read_to_string(path)?);
    }

    let printer = Printer::new(&config, Arc::new(service), Arc::new(renderers));
    Ok(Bridge::new(printer))
}

async fn print_content(bridge: &Bridge, content: Option<&str>, options: Value) -> Result<(), PrintError> {
    let options = PrintOptions::from_value(options);
    let outcome = bridge.printer().print(content, &options).await?;

    print_json(&json!({ "outcome": outcome, "completed": outcome.completed() }))?;

    if outcome.completed() {
        Ok(())
    } else {
        Err(PrintError::Submit(format!("Print job {:?}", outcome)))
    }
}

fn print_json(value: &Value) -> Result<(), PrintError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
