//! # Print Options
//!
//! The options object a caller passes alongside the content. Every key is
//! optional, and a value of the wrong type is ignored rather than rejected,
//! so a sloppy caller still gets a print job.
//!
//! ## Recognized Keys
//!
//! | Key | Type | Default |
//! |-----|------|---------|
//! | `name` | string | `Print job #<millis>` |
//! | `orientation` | `"portrait"` / `"landscape"` | platform choice |
//! | `monochrome` | bool | color |
//! | `margin` | bool (`false` = no margins) | device default |
//! | `duplex` | `"long"` / `"short"` / `"none"` (or bool) | none |
//! | `pageCount` | int | unknown |
//! | `autoFit` | bool | `true` |
//! | `javascript` | bool | `false` |
//! | `font.size` | int | device default |

use std::sync::atomic::{AtomicI64, Ordering};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::platform::Capabilities;

/// Prefix of generated job names.
pub const JOB_NAME_PREFIX: &str = "Print job #";

/// Paper orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// Color mode of the printed output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    Monochrome,
    Color,
}

/// Two-sided printing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Duplex {
    /// Flip on the long edge
    Long,
    /// Flip on the short edge
    Short,
    /// Single-sided
    None,
}

/// How a bitmap is scaled onto the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleMode {
    /// Whole image visible, letterboxed
    Fit,
    /// Page filled, image cropped
    Fill,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FontOptions {
    #[serde(default, deserialize_with = "lenient")]
    pub size: Option<u32>,
}

/// Options for one print request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintOptions {
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub orientation: Option<Orientation>,
    #[serde(default, deserialize_with = "lenient")]
    pub monochrome: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub margin: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub duplex: Option<Duplex>,
    #[serde(default, deserialize_with = "lenient")]
    pub page_count: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub auto_fit: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub javascript: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub font: Option<FontOptions>,
}

/// Attributes handed to the print service with a document job.
///
/// A `None` field leaves the choice to the service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrintAttributes {
    pub orientation: Option<Orientation>,
    pub color_mode: Option<ColorMode>,
    pub no_margins: bool,
    pub duplex: Option<Duplex>,
}

/// Settings for the single-page bitmap print path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BitmapSettings {
    pub orientation: Option<Orientation>,
    pub color_mode: Option<ColorMode>,
    pub scale_mode: ScaleMode,
}

/// How the web renderer is configured for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSettings {
    pub javascript: bool,
    pub wide_viewport: bool,
    pub fixed_font_size: Option<u32>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            javascript: false,
            wide_viewport: true,
            fixed_font_size: None,
        }
    }
}

impl PrintOptions {
    /// Build options from the raw bridge argument.
    ///
    /// Accepts an object, a bare string (taken as the job name) or
    /// null. Also maps the older argument shapes: boolean `duplex`,
    /// `landscape: true`, `graystyle: true` and `style` for `font`.
    pub fn from_value(value: Value) -> Self {
        let mut map = match value {
            Value::Object(map) => map,
            Value::String(name) => {
                let mut map = Map::new();
                map.insert("name".to_string(), Value::String(name));
                map
            }
            _ => Map::new(),
        };

        normalize_legacy_keys(&mut map);

        // Field-level leniency means only a non-object can fail here
        serde_json::from_value(Value::Object(map)).unwrap_or_default()
    }

    /// The job name for this request.
    ///
    /// Call once per request: without a configured name every call
    /// generates a new one.
    pub fn job_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => generated_job_name(),
        }
    }

    /// Maximum page count, or `None` when unknown.
    pub fn page_count(&self) -> Option<u32> {
        self.page_count
            .filter(|&count| count > 0)
            .and_then(|count| u32::try_from(count).ok())
    }

    fn color_mode(&self) -> Option<ColorMode> {
        self.monochrome.map(|mono| {
            if mono {
                ColorMode::Monochrome
            } else {
                ColorMode::Color
            }
        })
    }

    /// Print attributes for a document job on a service with `caps`.
    ///
    /// Duplex is dropped when the service does not declare support for it.
    pub fn to_attributes(&self, caps: &Capabilities) -> PrintAttributes {
        PrintAttributes {
            orientation: self.orientation,
            color_mode: self.color_mode(),
            no_margins: self.margin == Some(false),
            duplex: self.duplex.filter(|_| caps.duplex),
        }
    }

    /// Settings for the bitmap print path.
    pub fn bitmap_settings(&self) -> BitmapSettings {
        BitmapSettings {
            orientation: self.orientation,
            color_mode: self.color_mode(),
            scale_mode: if self.auto_fit.unwrap_or(true) {
                ScaleMode::Fit
            } else {
                ScaleMode::Fill
            },
        }
    }

    /// Settings for the web renderer.
    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            javascript: self.javascript.unwrap_or(false),
            fixed_font_size: self.font.as_ref().and_then(|font| font.size),
            ..RenderSettings::default()
        }
    }
}

/// Deserialize a field, turning a type mismatch into `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

fn normalize_legacy_keys(map: &mut Map<String, Value>) {
    if let Some(Value::Bool(duplex)) = map.get("duplex") {
        let mode = if *duplex { "long" } else { "none" };
        map.insert("duplex".to_string(), Value::from(mode));
    }

    if !map.contains_key("orientation")
        && let Some(Value::Bool(true)) = map.get("landscape")
    {
        map.insert("orientation".to_string(), Value::from("landscape"));
    }

    if !map.contains_key("monochrome")
        && let Some(Value::Bool(gray)) = map.get("graystyle")
    {
        let gray = *gray;
        map.insert("monochrome".to_string(), Value::Bool(gray));
    }

    // `font` wins when both are sent
    if let Some(style) = map.remove("style")
        && !map.contains_key("font")
    {
        map.insert("font".to_string(), style);
    }
}

/// Milliseconds of the last generated job name.
static LAST_JOB_STAMP: AtomicI64 = AtomicI64::new(0);

/// `Print job #<millis>`, strictly increasing within the process.
///
/// Two requests in the same millisecond get consecutive stamps.
fn generated_job_name() -> String {
    let now = chrono::Utc::now().timestamp_millis();
    let previous = LAST_JOB_STAMP
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or(now);

    format!("{}{}", JOB_NAME_PREFIX, now.max(previous + 1))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashSet;

    const DUPLEX: Capabilities = Capabilities {
        print: true,
        duplex: true,
    };
    const SIMPLEX: Capabilities = Capabilities {
        print: true,
        duplex: false,
    };

    #[test]
    fn test_full_options() {
        let options = PrintOptions::from_value(json!({
            "name": "Invoice",
            "orientation": "landscape",
            "monochrome": true,
            "margin": false,
            "duplex": "short",
            "pageCount": 3,
            "autoFit": false,
            "javascript": true,
            "font": { "size": 12 }
        }));

        assert_eq!(options.job_name(), "Invoice");
        assert_eq!(options.page_count(), Some(3));
        assert_eq!(
            options.to_attributes(&DUPLEX),
            PrintAttributes {
                orientation: Some(Orientation::Landscape),
                color_mode: Some(ColorMode::Monochrome),
                no_margins: true,
                duplex: Some(Duplex::Short),
            }
        );
        assert_eq!(
            options.bitmap_settings(),
            BitmapSettings {
                orientation: Some(Orientation::Landscape),
                color_mode: Some(ColorMode::Monochrome),
                scale_mode: ScaleMode::Fill,
            }
        );
        assert_eq!(
            options.render_settings(),
            RenderSettings {
                javascript: true,
                wide_viewport: true,
                fixed_font_size: Some(12),
            }
        );
    }

    #[test]
    fn test_defaults() {
        let options = PrintOptions::from_value(Value::Null);

        assert!(options.job_name().starts_with(JOB_NAME_PREFIX));
        assert_eq!(options.page_count(), None);
        assert_eq!(options.to_attributes(&DUPLEX), PrintAttributes::default());
        assert_eq!(options.bitmap_settings().scale_mode, ScaleMode::Fit);
        assert_eq!(options.render_settings(), RenderSettings::default());
    }

    #[test]
    fn test_duplex_only_when_supported() {
        let options = PrintOptions::from_value(json!({ "duplex": "long" }));
        assert_eq!(options.to_attributes(&DUPLEX).duplex, Some(Duplex::Long));
        assert_eq!(options.to_attributes(&SIMPLEX).duplex, None);
    }

    #[test]
    fn test_wrong_types_are_dropped() {
        let options = PrintOptions::from_value(json!({
            "name": 42,
            "orientation": "diagonal",
            "margin": { "top": 10 },
            "duplex": "sideways",
            "pageCount": "many",
            "monochrome": "yes"
        }));

        assert_eq!(options.name, None);
        assert_eq!(options.orientation, None);
        assert_eq!(options.margin, None);
        assert_eq!(options.duplex, None);
        assert_eq!(options.page_count, None);
        assert_eq!(options.monochrome, None);
    }

    #[test]
    fn test_margin_true_keeps_device_default() {
        let options = PrintOptions::from_value(json!({ "margin": true }));
        assert!(!options.to_attributes(&SIMPLEX).no_margins);
    }

    #[test]
    fn test_monochrome_false_is_explicit_color() {
        let options = PrintOptions::from_value(json!({ "monochrome": false }));
        assert_eq!(options.to_attributes(&SIMPLEX).color_mode, Some(ColorMode::Color));
    }

    #[test]
    fn test_non_positive_page_count_is_unknown() {
        assert_eq!(PrintOptions::from_value(json!({ "pageCount": 0 })).page_count(), None);
        assert_eq!(PrintOptions::from_value(json!({ "pageCount": -4 })).page_count(), None);
    }

    #[test]
    fn test_string_argument_is_job_name() {
        let options = PrintOptions::from_value(json!("Boarding pass"));
        assert_eq!(options.job_name(), "Boarding pass");
    }

    #[test]
    fn test_blank_name_generates_one() {
        let options = PrintOptions::from_value(json!({ "name": "   " }));
        assert!(options.job_name().starts_with(JOB_NAME_PREFIX));
    }

    #[test]
    fn test_legacy_keys() {
        let options = PrintOptions::from_value(json!({
            "duplex": true,
            "landscape": true,
            "graystyle": true
        }));
        assert_eq!(options.duplex, Some(Duplex::Long));
        assert_eq!(options.orientation, Some(Orientation::Landscape));
        assert_eq!(options.monochrome, Some(true));

        let options = PrintOptions::from_value(json!({
            "duplex": false,
            "landscape": true,
            "orientation": "portrait"
        }));
        assert_eq!(options.duplex, Some(Duplex::None));
        assert_eq!(options.orientation, Some(Orientation::Portrait));
    }

    #[test]
    fn test_style_size_alias() {
        let options = PrintOptions::from_value(json!({ "style": { "size": 18 } }));
        assert_eq!(options.render_settings().fixed_font_size, Some(18));
    }

    #[test]
    fn test_font_and_style_together_keep_other_options() {
        let options = PrintOptions::from_value(json!({
            "name": "Invoice",
            "orientation": "landscape",
            "duplex": "long",
            "font": { "size": 12 },
            "style": { "size": 18 }
        }));
        assert_eq!(options.job_name(), "Invoice");
        assert_eq!(options.orientation, Some(Orientation::Landscape));
        assert_eq!(options.duplex, Some(Duplex::Long));
        assert_eq!(options.render_settings().fixed_font_size, Some(12));
    }

    #[test]
    fn test_generated_names_are_distinct() {
        let options = PrintOptions::default();
        let names: HashSet<String> = (0..200).map(|_| options.job_name()).collect();
        assert_eq!(names.len(), 200);
    }
}
