//! Backends for targets without native sign-in or web view support
//!
//! The exported C interface still links and behaves consistently: sign-in
//! reports itself unavailable and surface creation fails with a null handle.

use url::Url;

use crate::error::{BridgeError, Result};
use crate::sign_in::{ERROR_UNAVAILABLE, SignInCompletion, SignInProvider};
use crate::web_view::{BrowserEngine, BrowserSurface, Frame, SurfaceEvents};

/// Identity provider that is never available
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedSignInProvider;

impl SignInProvider for UnsupportedSignInProvider {
    fn is_available(&self) -> bool {
        false
    }

    fn start(&self, completion: SignInCompletion) {
        completion.fail(
            ERROR_UNAVAILABLE,
            "Sign in with Apple is only supported on iOS",
        );
    }
}

/// Browser engine that cannot create surfaces
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedEngine;

/// Surface type of [`UnsupportedEngine`]; it has no values
pub enum UnsupportedSurface {}

impl BrowserEngine for UnsupportedEngine {
    type Surface = UnsupportedSurface;

    fn create_surface(&self, owner: &str, _events: SurfaceEvents) -> Result<UnsupportedSurface> {
        Err(BridgeError::SurfaceCreation {
            owner: owner.to_string(),
            reason: "embedded web views are only supported on iOS".to_string(),
        })
    }
}

impl BrowserSurface for UnsupportedSurface {
    fn load_url(&mut self, _url: &Url) {
        match *self {}
    }

    fn set_visible(&mut self, _visible: bool) {
        match *self {}
    }

    fn set_frame(&mut self, _frame: Frame) {
        match *self {}
    }

    fn set_intercepted_scheme(&mut self, _scheme: &str) {
        match *self {}
    }

    fn evaluate_script(&mut self, _script: &str) {
        match *self {}
    }

    fn close(self) {
        match self {}
    }
}
