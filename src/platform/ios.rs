//! iOS backends
//!
//! The presentation work is done by a small Objective-C/Swift shim compiled
//! into the Unity Xcode project. It implements the `passport_shim_*`
//! functions below and reports back through the `*_Native*` entry points
//! exported from this module. The shim is responsible for hopping to the main
//! thread before touching UIKit or WebKit.
//!
//! # Host contract
//!
//! Every `passport_shim_*` function may be called from any thread and must
//! return without calling back into Rust; the shim dispatches the UIKit work
//! to the main queue and reports results later. Callbacks into the `*_Native*`
//! entry points should be made on the main thread, which is where the Unity
//! callbacks then run.
//!
//! Sign-in:
//!
//! - `passport_shim_sign_in_start()` presents `ASAuthorizationController` for
//!   an Apple ID request with full name and email scopes.
//! - It answers exactly once, with `AppleSignIn_NativeDidSucceed` (any field
//!   may be null) or `AppleSignIn_NativeDidFail` carrying the
//!   `ASAuthorizationError` code and localized description.
//!
//! Web views:
//!
//! - `passport_shim_web_view_create(owner, handle)` builds a hidden
//!   `WKWebView` in the key window and returns an owning pointer to it, or
//!   null if no window is available. `handle` is the token to pass back in
//!   every `PassportWebView_Native*` call for that view.
//! - `passport_shim_web_view_destroy(view)` removes the view and releases it;
//!   no `Native*` call may use its handle afterwards.
//! - From the navigation delegate: `didStartProvisionalNavigation` ->
//!   `PassportWebView_NativeDidStartLoad`, `didFinishNavigation` ->
//!   `PassportWebView_NativeDidFinishLoad`, `didFailProvisionalNavigation`
//!   and `didFailNavigation` -> `PassportWebView_NativeDidFailLoad`, URL
//!   key-value changes -> `PassportWebView_NativeDidChangeURL`.
//! - `decidePolicyForNavigationAction` asks
//!   `PassportWebView_NativeShouldNavigate` and cancels when it returns false.
//!   Schemes set through `passport_shim_web_view_set_scheme` must reach that
//!   policy check rather than being rejected by WebKit.
//! - Bodies posted to the `"passport"` script message handler go to
//!   `PassportWebView_NativeDidReceiveMessage` as strings (JSON-encode
//!   non-string bodies).

#![allow(unsafe_code)]
#![allow(non_snake_case)]

use objc2::rc::autoreleasepool;
use objc2_foundation::{NSOperatingSystemVersion, NSProcessInfo};
use std::ffi::{CString, c_char, c_void};
use std::ptr::NonNull;
use std::sync::{Mutex, PoisonError};
use url::Url;

use crate::config::OsVersion;
use crate::error::{BridgeError, Result};
use crate::ffi::{guard, web_view_bridge};
use crate::sign_in::{SignInCompletion, SignInCredential, SignInOutcome, SignInProvider};
use crate::text::{copy_in, copy_in_or_empty, to_c_string};
use crate::web_view::{BrowserEngine, BrowserSurface, Frame, SurfaceEvent, SurfaceEvents};
use crate::Handle;

unsafe extern "C" {
    fn passport_shim_sign_in_start();

    fn passport_shim_web_view_create(owner: *const c_char, handle: *mut c_void) -> *mut c_void;
    fn passport_shim_web_view_destroy(view: *mut c_void);
    fn passport_shim_web_view_load_url(view: *mut c_void, url: *const c_char);
    fn passport_shim_web_view_set_visible(view: *mut c_void, visible: bool);
    fn passport_shim_web_view_set_frame(view: *mut c_void, x: f32, y: f32, width: f32, height: f32);
    fn passport_shim_web_view_set_scheme(view: *mut c_void, scheme: *const c_char);
    fn passport_shim_web_view_evaluate(view: *mut c_void, script: *const c_char);
}

/// The flow currently presented by the shim
static PENDING_SIGN_IN: Mutex<Option<SignInCompletion>> = Mutex::new(None);

fn take_pending_sign_in() -> Option<SignInCompletion> {
    PENDING_SIGN_IN
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take()
}

/// `ASAuthorizationAppleIDProvider` through the host shim
#[derive(Debug, Clone, Copy)]
pub struct IosSignInProvider {
    minimum_os_version: OsVersion,
}

impl IosSignInProvider {
    /// Provider reporting availability from `minimum_os_version` onwards
    pub fn new(minimum_os_version: OsVersion) -> Self {
        Self { minimum_os_version }
    }
}

impl SignInProvider for IosSignInProvider {
    fn init(&self) {
        log::debug!(
            "Apple Sign-In requires iOS {} or later",
            self.minimum_os_version
        );
    }

    fn is_available(&self) -> bool {
        let version = NSOperatingSystemVersion {
            majorVersion: self.minimum_os_version.major as _,
            minorVersion: self.minimum_os_version.minor as _,
            patchVersion: self.minimum_os_version.patch as _,
        };
        autoreleasepool(|_| {
            #[allow(unused_unsafe)]
            unsafe {
                NSProcessInfo::processInfo().isOperatingSystemAtLeastVersion(version)
            }
        })
    }

    fn start(&self, completion: SignInCompletion) {
        let previous = PENDING_SIGN_IN
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(completion);
        if let Some(previous) = previous {
            log::warn!("Sign-in flow {} replaced before it resolved", previous.flow());
        }
        unsafe { passport_shim_sign_in_start() };
    }
}

/// `WKWebView` surfaces through the host shim
#[derive(Debug, Default, Clone, Copy)]
pub struct IosWebEngine;

/// A `WKWebView` owned by the shim
pub struct IosSurface {
    view: NonNull<c_void>,
}

// SAFETY: the pointer is an opaque token; the shim dispatches every call to
// the main thread before dereferencing it.
unsafe impl Send for IosSurface {}

impl BrowserEngine for IosWebEngine {
    type Surface = IosSurface;

    fn create_surface(&self, owner: &str, events: SurfaceEvents) -> Result<IosSurface> {
        let owner_c = CString::new(owner).map_err(|_| BridgeError::SurfaceCreation {
            owner: owner.to_string(),
            reason: "owner name contains a NUL byte".to_string(),
        })?;

        let view = unsafe {
            passport_shim_web_view_create(owner_c.as_ptr(), events.handle().as_ptr())
        };

        NonNull::new(view)
            .map(|view| IosSurface { view })
            .ok_or_else(|| BridgeError::SurfaceCreation {
                owner: owner.to_string(),
                reason: "no key window to attach to".to_string(),
            })
    }
}

impl BrowserSurface for IosSurface {
    fn load_url(&mut self, url: &Url) {
        let url = to_c_string(url.as_str());
        unsafe { passport_shim_web_view_load_url(self.view.as_ptr(), url.as_ptr()) };
    }

    fn set_visible(&mut self, visible: bool) {
        unsafe { passport_shim_web_view_set_visible(self.view.as_ptr(), visible) };
    }

    fn set_frame(&mut self, frame: Frame) {
        unsafe {
            passport_shim_web_view_set_frame(
                self.view.as_ptr(),
                frame.x,
                frame.y,
                frame.width,
                frame.height,
            )
        };
    }

    fn set_intercepted_scheme(&mut self, scheme: &str) {
        let scheme = to_c_string(scheme);
        unsafe { passport_shim_web_view_set_scheme(self.view.as_ptr(), scheme.as_ptr()) };
    }

    fn evaluate_script(&mut self, script: &str) {
        let script = to_c_string(script);
        unsafe { passport_shim_web_view_evaluate(self.view.as_ptr(), script.as_ptr()) };
    }

    fn close(self) {
        unsafe { passport_shim_web_view_destroy(self.view.as_ptr()) };
    }
}

/// Sign-in succeeded
///
/// # Safety
///
/// Every pointer must be null or a NUL-terminated string valid for the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn AppleSignIn_NativeDidSucceed(
    identity_token: *const c_char,
    authorization_code: *const c_char,
    user_id: *const c_char,
    email: *const c_char,
    full_name: *const c_char,
) {
    guard("AppleSignIn_NativeDidSucceed", (), || {
        let Some(completion) = take_pending_sign_in() else {
            log::error!("Sign-in success reported with no flow in progress");
            return;
        };

        let credential = unsafe {
            SignInCredential {
                identity_token: copy_in_or_empty(identity_token, "identity token"),
                authorization_code: copy_in_or_empty(authorization_code, "authorization code"),
                user_id: copy_in_or_empty(user_id, "user id"),
                email: copy_in_or_empty(email, "email"),
                full_name: copy_in_or_empty(full_name, "full name"),
            }
        };
        completion.resolve(SignInOutcome::from_native_credential(credential));
    })
}

/// Sign-in failed with an `ASAuthorizationError` code
///
/// # Safety
///
/// `message` must be null or a NUL-terminated string valid for the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn AppleSignIn_NativeDidFail(code: i64, message: *const c_char) {
    guard("AppleSignIn_NativeDidFail", (), || {
        let Some(completion) = take_pending_sign_in() else {
            log::error!("Sign-in failure {code} reported with no flow in progress");
            return;
        };
        let message = unsafe { copy_in_or_empty(message, "error message") };
        completion.resolve(SignInOutcome::from_native_error(code, &message));
    })
}

unsafe fn notify_web_view(
    entry: &'static str,
    handle: *mut c_void,
    url: *const c_char,
    event: impl FnOnce(String) -> SurfaceEvent,
) {
    guard(entry, (), || {
        let Some(handle) = Handle::from_ptr(handle) else {
            log::error!("{entry}: null web view handle");
            return;
        };
        match unsafe { copy_in(url, "event payload") } {
            Ok(payload) => web_view_bridge().notify(handle, event(payload)),
            Err(err) => log::error!("{entry}: dropping web view {handle} event: {err}"),
        }
    })
}

/// A navigation began
///
/// # Safety
///
/// `url` must be null or a NUL-terminated string valid for the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PassportWebView_NativeDidStartLoad(handle: *mut c_void, url: *const c_char) {
    unsafe {
        notify_web_view("PassportWebView_NativeDidStartLoad", handle, url, |url| {
            SurfaceEvent::LoadStarted { url }
        })
    };
}

/// A navigation finished
///
/// # Safety
///
/// `url` must be null or a NUL-terminated string valid for the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PassportWebView_NativeDidFinishLoad(handle: *mut c_void, url: *const c_char) {
    unsafe {
        notify_web_view("PassportWebView_NativeDidFinishLoad", handle, url, |url| {
            SurfaceEvent::LoadFinished { url }
        })
    };
}

/// A navigation failed before its page loaded
///
/// # Safety
///
/// `url` and `reason` must be null or NUL-terminated strings valid for the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PassportWebView_NativeDidFailLoad(
    handle: *mut c_void,
    url: *const c_char,
    reason: *const c_char,
) {
    let reason = unsafe { copy_in_or_empty(reason, "failure reason") };
    unsafe {
        notify_web_view("PassportWebView_NativeDidFailLoad", handle, url, |url| {
            SurfaceEvent::LoadFailed { url, reason }
        })
    };
}

/// The committed URL changed
///
/// # Safety
///
/// `url` must be null or a NUL-terminated string valid for the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PassportWebView_NativeDidChangeURL(handle: *mut c_void, url: *const c_char) {
    unsafe {
        notify_web_view("PassportWebView_NativeDidChangeURL", handle, url, |url| {
            SurfaceEvent::UrlChanged { url }
        })
    };
}

/// Page script posted a message through the script message handler
///
/// # Safety
///
/// `body` must be null or a NUL-terminated string valid for the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PassportWebView_NativeDidReceiveMessage(
    handle: *mut c_void,
    body: *const c_char,
) {
    unsafe {
        notify_web_view("PassportWebView_NativeDidReceiveMessage", handle, body, |body| {
            SurfaceEvent::MessagePosted { body }
        })
    };
}

/// Navigation policy query from `decidePolicyForNavigationAction`
///
/// Returns false when the navigation was intercepted and must be cancelled.
///
/// # Safety
///
/// `url` must be null or a NUL-terminated string valid for the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PassportWebView_NativeShouldNavigate(
    handle: *mut c_void,
    url: *const c_char,
) -> bool {
    guard("PassportWebView_NativeShouldNavigate", true, || {
        let Some(handle) = Handle::from_ptr(handle) else {
            return true;
        };
        match unsafe { copy_in(url, "url") } {
            Ok(url) => web_view_bridge().should_navigate(handle, &url),
            Err(_) => true,
        }
    })
}
