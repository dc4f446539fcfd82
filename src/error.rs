//! Error types shared by both bridges

use crate::Handle;

/// Errors raised while servicing a bridge call
///
/// None of these cross the C boundary. The FFI layer logs them and returns the
/// ABI's "no result" value instead.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The handle does not name a live surface (never issued, or destroyed)
    #[error("invalid or destroyed web view handle {0}")]
    InvalidHandle(Handle),

    /// A required string argument was null
    #[error("{0} must not be null")]
    NullArgument(&'static str),

    /// A string argument was not valid UTF-8
    #[error("{0} is not valid UTF-8")]
    InvalidUtf8(&'static str),

    /// A string argument was empty where content is required
    #[error("{0} must not be empty")]
    EmptyArgument(&'static str),

    /// The URL could not be parsed
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        /// URL as passed by the host
        url: String,
        /// Parser failure
        #[source]
        source: url::ParseError,
    },

    /// The custom scheme is not a valid URL scheme
    #[error("invalid URL scheme '{0}'")]
    InvalidScheme(String),

    /// The frame has a non-finite component or a negative size
    #[error("invalid frame ({x}, {y}, {width}, {height})")]
    InvalidFrame {
        /// Origin x
        x: f32,
        /// Origin y
        y: f32,
        /// Width
        width: f32,
        /// Height
        height: f32,
    },

    /// The browser engine could not create a surface
    #[error("failed to create web view for '{owner}': {reason}")]
    SurfaceCreation {
        /// Host-side owner name
        owner: String,
        /// Engine-provided reason
        reason: String,
    },

    /// The handle arena is full
    #[error("web view limit reached")]
    ArenaFull,
}

/// Result alias used throughout the crate
pub type Result<T, E = BridgeError> = std::result::Result<T, E>;
