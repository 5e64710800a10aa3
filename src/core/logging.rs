//! Logging initialization and entity diagnostics

/// Initialize the logging system
///
/// Uses env_logger with default filter level of `info`.
/// Override with RUST_LOG environment variable.
///
/// # Example
/// ```
/// rkvol::core::logging::init();
/// log::info!("Device created");
/// ```
pub fn init() {
    // A second init (tests, embedding applications) keeps the first logger.
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    )
    .format_timestamp_millis()
    .try_init();
}

/// Format an entity diagnostic the way every managed object reports problems:
/// `"  <object>  <kind>: <message>."`
pub fn entity_message(object: &str, kind: &str, message: &str) -> String {
    format!("  {}  {}: {}.", object, kind, message)
}

/// Log an error diagnostic for `object`.
pub fn emit_error(object: &str, message: &str) {
    log::error!("{}", entity_message(object, "ERROR", message));
}

/// Log a warning for `object` when `condition` holds. Returns `condition`.
pub fn warn_on_condition(object: &str, condition: bool, message: &str) -> bool {
    if condition {
        log::warn!("{}", entity_message(object, "WARNING", message));
    }
    condition
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_message_shape() {
        assert_eq!(
            entity_message("rkvol::Volume", "ERROR", "invalid volume dimensions"),
            "  rkvol::Volume  ERROR: invalid volume dimensions."
        );
    }

    #[test]
    fn test_warn_on_condition_passthrough() {
        assert!(warn_on_condition("x", true, "msg"));
        assert!(!warn_on_condition("x", false, "msg"));
    }
}
