use crate::config::ViewConfig;
use tracing_subscriber::EnvFilter;

/// Filter for the configured level, or `None` when logging is `"off"`
fn configured_filter(config: &ViewConfig) -> Option<EnvFilter> {
    if config.log_level == "off" {
        return None;
    }
    Some(EnvFilter::new(&config.log_level))
}

/// Install a global fmt subscriber. `RUST_LOG` wins over the configured
/// level. Returns whether a subscriber was installed, which is not the
/// case when the level is `"off"` or one is already in place.
///
/// ```
/// use tandem_view::{logging::init_tracing, ViewConfig};
///
/// let config = ViewConfig::from_json(r#"{ "log_level": "off" }"#).unwrap();
/// assert!(!init_tracing(&config));
/// ```
pub fn init_tracing(config: &ViewConfig) -> bool {
    let Some(configured) = configured_filter(config) else {
        return false;
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or(configured);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .is_ok()
}
