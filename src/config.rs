//! Runtime configuration supplied by the host
//!
//! The host may call `PassportNative_Configure` with a JSON document before
//! touching either bridge. Every field is optional:
//!
//! ```json
//! {
//!   "log_level": "debug",
//!   "sign_in": { "minimum_os_version": "13.0" },
//!   "web_view": { "queue_scripts_until_loaded": true, "max_pending_scripts": 64 }
//! }
//! ```

use log::LevelFilter;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Errors raised while parsing configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The document is not valid JSON or does not match the schema
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// An OS version string could not be parsed
    #[error("invalid OS version '{0}', expected MAJOR[.MINOR[.PATCH]]")]
    InvalidVersion(String),
}

/// Top-level plugin configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Maximum level forwarded to the host log callback
    pub log_level: LevelFilter,
    /// Apple Sign-In settings
    pub sign_in: SignInConfig,
    /// Embedded browser settings
    pub web_view: WebViewConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_level: LevelFilter::Info,
            sign_in: SignInConfig::default(),
            web_view: WebViewConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Parse a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Apple Sign-In settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignInConfig {
    /// Lowest OS version reported as available
    pub minimum_os_version: OsVersion,
}

impl Default for SignInConfig {
    fn default() -> Self {
        Self {
            minimum_os_version: OsVersion::new(13, 0, 0),
        }
    }
}

/// Embedded browser settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WebViewConfig {
    /// Hold scripts sent while a page is loading and run them once it finishes
    pub queue_scripts_until_loaded: bool,
    /// Upper bound on held scripts per surface; the oldest is dropped on overflow
    pub max_pending_scripts: usize,
}

impl Default for WebViewConfig {
    fn default() -> Self {
        Self {
            queue_scripts_until_loaded: true,
            max_pending_scripts: 64,
        }
    }
}

/// Dotted OS version, compared component-wise
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "String")]
pub struct OsVersion {
    /// Major component
    pub major: u32,
    /// Minor component
    pub minor: u32,
    /// Patch component
    pub patch: u32,
}

impl OsVersion {
    /// Creates a version from its components
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for OsVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidVersion(s.to_string());
        let mut parts = s.trim().split('.');
        let mut next = |required: bool| -> Result<u32, ConfigError> {
            match parts.next() {
                Some(part) => part.parse().map_err(|_| invalid()),
                None if required => Err(invalid()),
                None => Ok(0),
            }
        };

        let version = OsVersion::new(next(true)?, next(false)?, next(false)?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(version)
    }
}

impl TryFrom<String> for OsVersion {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for OsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
