//! Input validation for identifiers that cross the wire
//!
//! Node ids and sensor keys end up in URL path segments and in report
//! filenames, so both are checked at the client boundary before any request
//! or artifact name is built from them.

use crate::error::{Result, SensorViewError};
use once_cell::sync::Lazy;
use regex::Regex;

static NODE_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$").unwrap());

static SENSOR_KEY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]{0,63}$").unwrap());

/// Validate a node identifier (e.g. `node-001`)
pub fn validate_node_id(id: &str) -> Result<()> {
    if NODE_ID_PATTERN.is_match(id) {
        Ok(())
    } else {
        Err(SensorViewError::invalid_input(format!(
            "invalid node id '{id}': expected alphanumerics, '-' or '_', max 64 chars"
        )))
    }
}

/// Validate a sensor key (e.g. `temperature`, `pH`, `flowRate`)
pub fn validate_sensor_key(key: &str) -> Result<()> {
    if SENSOR_KEY_PATTERN.is_match(key) {
        Ok(())
    } else {
        Err(SensorViewError::invalid_input(format!(
            "invalid sensor key '{key}': expected a letter followed by alphanumerics or '_'"
        )))
    }
}
