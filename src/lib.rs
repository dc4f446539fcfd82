//! Native Apple Sign-In and embedded WebView bridges for the Passport Unity plugin
//!
//! This crate is linked into the Unity iOS player and exposes the C interface
//! declared in `AppleSignIn.h` and `PassportWebView.h`. Unity scripts call in
//! through `[DllImport("__Internal")]`; results come back through function
//! pointers the scripts register.
//!
//! # Architecture
//!
//! - **SignInBridge**: flow bookkeeping for Sign in with Apple; exactly one
//!   terminal callback per start
//! - **WebViewBridge**: browser surfaces addressed by generation-checked
//!   handles, with script queueing and custom-scheme messaging
//! - **EventQueue**: ordered, single-consumer delivery of native events
//! - **platform**: iOS shim backend, an unsupported-target backend, and mocks
//! - **ffi**: the exported C symbols

#![warn(missing_docs)]

mod callback;
mod dispatch;
mod error;
mod handle;
mod message;
mod sign_in;
mod text;
mod web_view;

pub mod config;
pub mod ffi;
pub mod logger;
pub mod platform;

pub use callback::CallbackSlot;
pub use config::{BridgeConfig, ConfigError, OsVersion, SignInConfig, WebViewConfig};
pub use dispatch::EventQueue;
pub use error::BridgeError;
pub use handle::{Handle, HandleArena};
pub use message::{RAW_MESSAGE_METHOD, ScriptMessage};
pub use sign_in::*;
pub use text::{copy_in, copy_in_non_empty, copy_in_or_empty, to_c_string};
pub use web_view::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        BridgeConfig, BridgeError, BrowserEngine, BrowserSurface, Frame, Handle,
        NavigationState, ScriptMessage, SignInBridge, SignInCompletion, SignInCredential,
        SignInOutcome, SignInProvider, SurfaceEvent, SurfaceEvents, WebViewBridge,
    };
}
