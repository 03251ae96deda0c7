use crate::error::{Result, ViewError};
use serde::Deserialize;
use smartstring::alias::String as SmartString;
use tandem_model::Side;

/// Editor view configuration.
///
/// Every field has a default, so a partial JSON object is enough:
///
/// ```text
/// { "editable": false, "log_level": "debug" }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Whether node views are created as editable
    pub editable: bool,
    /// Fallback filter when `RUST_LOG` is unset; `"off"` disables logging
    pub log_level: String,
    /// Side for widgets that do not declare one
    pub default_widget_side: Side,
    /// Render a cursor wrapper during composition so marks apply to
    /// the composed text
    pub cursor_wrapper: bool,
    /// Class toggled on a node's DOM when it is node-selected
    pub selected_node_class: SmartString,
    /// Slot element hosting inline custom views
    pub inline_slot_tag: SmartString,
    /// Slot element hosting block custom views
    pub block_slot_tag: SmartString,
    /// Verify the descriptor tree against the document after every commit
    pub check_invariants: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            editable: true,
            log_level: "info".to_string(),
            default_widget_side: Side::After,
            cursor_wrapper: true,
            selected_node_class: "node-selected".into(),
            inline_slot_tag: "span".into(),
            block_slot_tag: "div".into(),
            check_invariants: false,
        }
    }
}

impl ViewConfig {
    pub fn from_json(source: &str) -> Result<Self> {
        let config: ViewConfig =
            serde_json::from_str(source).map_err(|e| ViewError::Config(e.to_string()))?;
        match config.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" | "off" => Ok(config),
            other => Err(ViewError::Config(format!(
                "log_level must be one of: trace, debug, info, warn, error, off (got '{other}')"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = ViewConfig::from_json(r#"{ "editable": false }"#).unwrap();
        assert!(!config.editable);
        assert_eq!(config.selected_node_class.as_str(), "node-selected");
        assert_eq!(config.default_widget_side, Side::After);
    }

    #[test]
    fn test_widget_side_parses() {
        let config = ViewConfig::from_json(r#"{ "default_widget_side": "before" }"#).unwrap();
        assert_eq!(config.default_widget_side, Side::Before);
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let err = ViewConfig::from_json(r#"{ "log_level": "loud" }"#).unwrap_err();
        assert!(matches!(err, ViewError::Config(_)));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(ViewConfig::from_json("{").is_err());
    }
}
