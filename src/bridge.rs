//! # Request Bridge
//!
//! Turns `(action, JSON arguments)` pairs from the web view into calls on a
//! [`Printer`] and JSON results back.
//!
//! ## Actions
//!
//! | Action | Arguments | Result |
//! |--------|-----------|--------|
//! | `isAvailable` | none | bool |
//! | `check`, `canPrintItem` | `[reference?]` | bool |
//! | `types`, `getPrintableTypes`, `getPrintableUTIs` | none | string array |
//! | `print` | `[content?, options?]` | bool |
//! | `pick` | none | printer id or `null` |
//! | `services` | `[enabledOnly?]` | service descriptors |
//!
//! Action names match case-insensitively. `print` never fails at this
//! boundary: every error is logged and reported as `false`.

use std::str::FromStr;

use serde_json::{Value, json};
use tracing::{instrument, warn};

use crate::error::{PrintError, PrintResult};
use crate::options::PrintOptions;
use crate::printer::Printer;

/// A bridge action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    IsAvailable,
    Check,
    Types,
    Print,
    Pick,
    Services,
}

impl FromStr for Action {
    type Err = PrintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "isavailable" => Ok(Action::IsAvailable),
            "check" | "canprintitem" => Ok(Action::Check),
            "types" | "getprintabletypes" | "getprintableutis" => Ok(Action::Types),
            "print" => Ok(Action::Print),
            "pick" => Ok(Action::Pick),
            "services" => Ok(Action::Services),
            _ => Err(PrintError::UnknownAction(s.to_string())),
        }
    }
}

/// Dispatches bridge requests to a [`Printer`].
#[derive(Clone)]
pub struct Bridge {
    printer: Printer,
}

impl Bridge {
    pub fn new(printer: Printer) -> Self {
        Self { printer }
    }

    pub fn printer(&self) -> &Printer {
        &self.printer
    }

    /// Run `action` with positional `args` (a JSON array, or null).
    #[instrument(skip(self, args))]
    pub async fn execute(&self, action: &str, args: Value) -> PrintResult<Value> {
        let action: Action = action.parse()?;
        let args = positional(args)?;

        match action {
            Action::IsAvailable => Ok(json!(self.printer.is_available().await)),
            Action::Check => {
                let reference = args.first().and_then(Value::as_str);
                Ok(json!(self.printer.check(reference).await))
            }
            Action::Types => Ok(json!(self.printer.printable_types())),
            Action::Print => Ok(json!(self.print(&args).await)),
            Action::Pick => Ok(serde_json::to_value(self.printer.pick_printer().await)?),
            Action::Services => {
                let enabled_only = args.first().and_then(Value::as_bool).unwrap_or(false);
                Ok(serde_json::to_value(self.printer.print_services(enabled_only))?)
            }
        }
    }

    async fn print(&self, args: &[Value]) -> bool {
        let content = args.first().and_then(Value::as_str);
        let options = PrintOptions::from_value(args.get(1).cloned().unwrap_or(Value::Null));

        match self.printer.print(content, &options).await {
            Ok(outcome) => outcome.completed(),
            Err(e) => {
                warn!(error = %e, "Print failed");
                false
            }
        }
    }
}

fn positional(args: Value) -> PrintResult<Vec<Value>> {
    match args {
        Value::Array(args) => Ok(args),
        Value::Null => Ok(Vec::new()),
        other => Err(PrintError::InvalidArgument(format!(
            "Expected an argument array, got {}",
            other
        ))),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::content::PRINTABLE_TYPES;
    use crate::platform::spool::{SpoolPrintService, SpoolRendererFactory};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn bridge() -> (tempfile::TempDir, Bridge) {
        let dir = tempfile::tempdir().unwrap();
        let service = SpoolPrintService::new(dir.path().join("spool")).unwrap();
        let config = BridgeConfig {
            asset_root: dir.path().to_path_buf(),
            resource_root: dir.path().join("res"),
            ..Default::default()
        };
        let printer = Printer::new(&config, Arc::new(service), Arc::new(SpoolRendererFactory::new()));
        (dir, Bridge::new(printer))
    }

    #[test]
    fn test_action_names() {
        assert_eq!("isAvailable".parse::<Action>().unwrap(), Action::IsAvailable);
        assert_eq!("ISAVAILABLE".parse::<Action>().unwrap(), Action::IsAvailable);
        assert_eq!("canPrintItem".parse::<Action>().unwrap(), Action::Check);
        assert_eq!("getPrintableUTIs".parse::<Action>().unwrap(), Action::Types);
        assert_eq!("getPrintableTypes".parse::<Action>().unwrap(), Action::Types);
        assert!(matches!(
            "fax".parse::<Action>(),
            Err(PrintError::UnknownAction(name)) if name == "fax"
        ));
    }

    #[tokio::test]
    async fn test_is_available() {
        let (_dir, bridge) = bridge();
        assert_eq!(bridge.execute("isAvailable", Value::Null).await.unwrap(), json!(true));
    }

    #[tokio::test]
    async fn test_check() {
        let (_dir, bridge) = bridge();
        assert_eq!(bridge.execute("check", json!([])).await.unwrap(), json!(true));
        assert_eq!(
            bridge.execute("check", json!(["file://a.pdf"])).await.unwrap(),
            json!(true)
        );
        assert_eq!(
            bridge.execute("canPrintItem", json!(["file://a.xyz123"])).await.unwrap(),
            json!(false)
        );
    }

    #[tokio::test]
    async fn test_types() {
        let (_dir, bridge) = bridge();
        assert_eq!(
            bridge.execute("types", json!([])).await.unwrap(),
            json!(PRINTABLE_TYPES)
        );
    }

    #[tokio::test]
    async fn test_print_markup_completes() {
        let (_dir, bridge) = bridge();
        let result = bridge
            .execute("print", json!(["<h1>Hello</h1>", { "name": "Greeting" }]))
            .await
            .unwrap();
        assert_eq!(result, json!(true));
    }

    #[tokio::test]
    async fn test_print_failures_collapse_to_false() {
        let (_dir, bridge) = bridge();

        let unsupported = bridge
            .execute("print", json!(["file://a.xyz123"]))
            .await
            .unwrap();
        assert_eq!(unsupported, json!(false));

        let missing = bridge
            .execute("print", json!(["file:///no/such/file.pdf", "Missing"]))
            .await
            .unwrap();
        assert_eq!(missing, json!(false));

        // No host view configured
        let self_view = bridge.execute("print", json!([])).await.unwrap();
        assert_eq!(self_view, json!(false));
    }

    #[tokio::test]
    async fn test_pick_and_services() {
        let (_dir, bridge) = bridge();

        let picked = bridge.execute("pick", json!([])).await.unwrap();
        assert_eq!(picked["serviceId"], json!("spool"));

        let services = bridge.execute("services", json!([true])).await.unwrap();
        assert_eq!(services.as_array().unwrap().len(), 1);
        assert_eq!(services[0]["enabled"], json!(true));
    }

    #[tokio::test]
    async fn test_unknown_action_and_bad_arguments() {
        let (_dir, bridge) = bridge();

        let err = bridge.execute("fax", json!([])).await.unwrap_err();
        assert!(matches!(err, PrintError::UnknownAction(_)));

        let err = bridge.execute("check", json!({ "ref": "x" })).await.unwrap_err();
        assert!(matches!(err, PrintError::InvalidArgument(_)));
    }
}
