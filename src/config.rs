//! Loading of the platform configuration from TOML
//!
//! Every section and every field is optional; anything left out keeps its
//! default.

use std::fs::read_to_string;
use std::path::Path;

use thiserror::Error;

use crate::types::PlatformConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read the configuration file: {0}")]
    Read(#[from] std::io::Error),

    #[error("cannot parse the configuration file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Load a configuration file
pub fn load<P: AsRef<Path>>(path: P) -> Result<PlatformConfig, ConfigError> {
    let contents = read_to_string(path)?;
    from_toml_str(&contents)
}

/// Parse a configuration from TOML text
///
/// # Example
/// ```
/// let config = inertial_mapper::config::from_toml_str(
///     r#"
///     [motion]
///     variance_threshold = 250.0
///
///     [reporter]
///     host = "192.168.2.33"
///     "#,
/// )
/// .unwrap();
///
/// assert_eq!(config.motion.variance_threshold, 250.0);
/// assert_eq!(config.motion.window, 8);
/// assert_eq!(config.reporter.host, "192.168.2.33");
/// ```
pub fn from_toml_str(contents: &str) -> Result<PlatformConfig, ConfigError> {
    Ok(toml::from_str(contents)?)
}
