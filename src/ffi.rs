//! C interface consumed by the Unity scripts through `[DllImport("__Internal")]`
//!
//! Symbol names and signatures match `AppleSignIn.h` and `PassportWebView.h`.
//! Each bridge is a process-wide instance created on first use from the
//! configuration passed to [`PassportNative_Configure`] (or the defaults).
//!
//! Strings passed in are copied before the call returns. Strings passed to
//! callbacks are valid only for the duration of the callback. No panic
//! crosses the boundary; failures are logged and the call returns its "no
//! result" value.

#![allow(non_snake_case)]

use std::ffi::{c_char, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::config::BridgeConfig;
use crate::error::Result;
use crate::logger::{self, host_logger, level_code};
use crate::platform::{self, PlatformSignInProvider, PlatformWebEngine};
use crate::text::{copy_in, copy_in_non_empty, to_c_string};
use crate::{Handle, SignInBridge, WebViewBridge};

/// `AppleSignIn_OnSuccess(identityToken, authorizationCode, userID, email, fullName)`
pub type AppleSignInOnSuccess = extern "C" fn(
    *const c_char,
    *const c_char,
    *const c_char,
    *const c_char,
    *const c_char,
);
/// `AppleSignIn_OnError(errorCode, errorMessage)`
pub type AppleSignInOnError = extern "C" fn(*const c_char, *const c_char);
/// `AppleSignIn_OnCancel()`
pub type AppleSignInOnCancel = extern "C" fn();

/// `PassportWebView_OnLoadFinished(url)`
pub type PassportWebViewOnLoadFinished = extern "C" fn(*const c_char);
/// `PassportWebView_OnJavaScriptMessage(method, data)`
pub type PassportWebViewOnJavaScriptMessage = extern "C" fn(*const c_char, *const c_char);
/// `PassportWebView_OnURLChanged(url)`
pub type PassportWebViewOnURLChanged = extern "C" fn(*const c_char);

/// Log sink: `(level, message)` with 1 = error through 5 = trace
pub type PassportNativeLogCallback = extern "C" fn(i32, *const c_char);

static CONFIG: Mutex<Option<BridgeConfig>> = Mutex::new(None);
static SIGN_IN: OnceLock<SignInBridge<PlatformSignInProvider>> = OnceLock::new();
static WEB_VIEW: OnceLock<WebViewBridge<PlatformWebEngine>> = OnceLock::new();

fn current_config() -> BridgeConfig {
    CONFIG
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .unwrap_or_default()
}

/// The process-wide sign-in bridge
pub(crate) fn sign_in_bridge() -> &'static SignInBridge<PlatformSignInProvider> {
    SIGN_IN.get_or_init(|| {
        let config = current_config();
        logger::init(config.log_level);
        SignInBridge::new(platform::sign_in_provider(&config))
    })
}

/// The process-wide web view bridge
pub(crate) fn web_view_bridge() -> &'static WebViewBridge<PlatformWebEngine> {
    WEB_VIEW.get_or_init(|| {
        let config = current_config();
        logger::init(config.log_level);
        WebViewBridge::with_config(platform::web_engine(), config.web_view)
    })
}

/// Run an entry point body, turning a panic into a logged error
pub(crate) fn guard<R>(entry: &'static str, fallback: R, body: impl FnOnce() -> R) -> R {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(value) => value,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("unknown panic");
            log::error!("{entry} panicked: {reason}");
            fallback
        }
    }
}

fn report(entry: &'static str, result: Result<()>) {
    if let Err(err) = result {
        log::error!("{entry}: {err}");
    }
}

// ============================================================================
// Configuration and logging
// ============================================================================

/// Apply a JSON configuration document
///
/// Returns false if the document is invalid; the previous configuration stays
/// in effect. The sign-in settings only apply if the sign-in bridge has not
/// been used yet.
///
/// # Safety
///
/// `json` must be null or a NUL-terminated string valid for the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PassportNative_Configure(json: *const c_char) -> bool {
    guard("PassportNative_Configure", false, || {
        let parsed = unsafe { copy_in(json, "configuration") }
            .map_err(|err| err.to_string())
            .and_then(|json| BridgeConfig::from_json(&json).map_err(|err| err.to_string()));

        let config = match parsed {
            Ok(config) => config,
            Err(err) => {
                log::error!("PassportNative_Configure: {err}");
                return false;
            }
        };

        logger::init(config.log_level);
        if let Some(bridge) = WEB_VIEW.get() {
            bridge.set_config(config.web_view.clone());
        }
        if SIGN_IN.get().is_some() {
            log::warn!("Sign-in bridge already created, sign-in settings take effect on next launch");
        }
        log::debug!("Applied configuration {config:?}");
        *CONFIG.lock().unwrap_or_else(PoisonError::into_inner) = Some(config);
        true
    })
}

/// Forward log records to the host; null stops forwarding
#[unsafe(no_mangle)]
pub extern "C" fn PassportNative_SetLogCallback(callback: Option<PassportNativeLogCallback>) {
    guard("PassportNative_SetLogCallback", (), || {
        logger::init(current_config().log_level);
        host_logger().set_sink(callback.map(|callback| {
            Arc::new(move |level: log::Level, message: &str| {
                let message = to_c_string(message);
                callback(level_code(level), message.as_ptr());
            }) as Arc<logger::LogCallback>
        }));
    })
}

// ============================================================================
// Apple Sign-In
// ============================================================================

/// Initialize Apple Sign-In; repeated calls are no-ops
#[unsafe(no_mangle)]
pub extern "C" fn AppleSignIn_Init() {
    guard("AppleSignIn_Init", (), || sign_in_bridge().init())
}

/// Whether Apple Sign-In is available on this device and OS
#[unsafe(no_mangle)]
pub extern "C" fn AppleSignIn_IsAvailable() -> bool {
    guard("AppleSignIn_IsAvailable", false, || {
        sign_in_bridge().is_available()
    })
}

/// Start the Apple Sign-In flow
///
/// Exactly one of the success, error or cancel callbacks fires for each call.
#[unsafe(no_mangle)]
pub extern "C" fn AppleSignIn_Start() {
    guard("AppleSignIn_Start", (), || sign_in_bridge().start())
}

/// Replace the success callback; null clears it
#[unsafe(no_mangle)]
pub extern "C" fn AppleSignIn_SetOnSuccessCallback(callback: Option<AppleSignInOnSuccess>) {
    guard("AppleSignIn_SetOnSuccessCallback", (), || {
        sign_in_bridge().set_on_success(callback.map(|callback| {
            Arc::new(move |credential: &crate::SignInCredential| {
                let identity_token = to_c_string(&credential.identity_token);
                let authorization_code = to_c_string(&credential.authorization_code);
                let user_id = to_c_string(&credential.user_id);
                let email = to_c_string(&credential.email);
                let full_name = to_c_string(&credential.full_name);
                callback(
                    identity_token.as_ptr(),
                    authorization_code.as_ptr(),
                    user_id.as_ptr(),
                    email.as_ptr(),
                    full_name.as_ptr(),
                );
            }) as Arc<crate::sign_in::SuccessCallback>
        }));
    })
}

/// Replace the error callback; null clears it
#[unsafe(no_mangle)]
pub extern "C" fn AppleSignIn_SetOnErrorCallback(callback: Option<AppleSignInOnError>) {
    guard("AppleSignIn_SetOnErrorCallback", (), || {
        sign_in_bridge().set_on_error(callback.map(|callback| {
            Arc::new(move |code: &str, message: &str| {
                let code = to_c_string(code);
                let message = to_c_string(message);
                callback(code.as_ptr(), message.as_ptr());
            }) as Arc<crate::sign_in::ErrorCallback>
        }));
    })
}

/// Replace the cancel callback; null clears it
#[unsafe(no_mangle)]
pub extern "C" fn AppleSignIn_SetOnCancelCallback(callback: Option<AppleSignInOnCancel>) {
    guard("AppleSignIn_SetOnCancelCallback", (), || {
        sign_in_bridge().set_on_cancel(
            callback.map(|callback| Arc::new(move || callback()) as Arc<crate::sign_in::CancelCallback>),
        );
    })
}

// ============================================================================
// Embedded web view
// ============================================================================

fn with_handle(entry: &'static str, web_view: *mut c_void, op: impl FnOnce(Handle) -> Result<()>) {
    guard(entry, (), || {
        let Some(handle) = Handle::from_ptr(web_view) else {
            log::error!("{entry}: null web view handle");
            return;
        };
        report(entry, op(handle));
    })
}

/// Create a web view owned by the Unity object `game_object_name`
///
/// Returns null on failure.
///
/// # Safety
///
/// `game_object_name` must be null or a NUL-terminated string valid for the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PassportWebView_Create(game_object_name: *const c_char) -> *mut c_void {
    guard("PassportWebView_Create", std::ptr::null_mut(), || {
        let created = unsafe { copy_in_non_empty(game_object_name, "game object name") }
            .and_then(|owner| web_view_bridge().create(&owner));
        match created {
            Ok(handle) => handle.as_ptr(),
            Err(err) => {
                log::error!("PassportWebView_Create: {err}");
                std::ptr::null_mut()
            }
        }
    })
}

/// Destroy a web view
///
/// The handle must not be used again; doing so is logged and ignored.
#[unsafe(no_mangle)]
pub extern "C" fn PassportWebView_Destroy(web_view: *mut c_void) {
    with_handle("PassportWebView_Destroy", web_view, |handle| {
        web_view_bridge().destroy(handle)
    })
}

/// Begin loading a URL
///
/// # Safety
///
/// `url` must be null or a NUL-terminated string valid for the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PassportWebView_LoadURL(web_view: *mut c_void, url: *const c_char) {
    with_handle("PassportWebView_LoadURL", web_view, |handle| {
        let url = unsafe { copy_in(url, "url") }?;
        web_view_bridge().load_url(handle, &url)
    })
}

/// Show a web view
#[unsafe(no_mangle)]
pub extern "C" fn PassportWebView_Show(web_view: *mut c_void) {
    with_handle("PassportWebView_Show", web_view, |handle| {
        web_view_bridge().show(handle)
    })
}

/// Hide a web view
#[unsafe(no_mangle)]
pub extern "C" fn PassportWebView_Hide(web_view: *mut c_void) {
    with_handle("PassportWebView_Hide", web_view, |handle| {
        web_view_bridge().hide(handle)
    })
}

/// Position and size a web view in screen points
#[unsafe(no_mangle)]
pub extern "C" fn PassportWebView_SetFrame(
    web_view: *mut c_void,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
) {
    with_handle("PassportWebView_SetFrame", web_view, |handle| {
        web_view_bridge().set_frame(handle, x, y, width, height)
    })
}

/// Intercept navigations to `url_scheme` and report them as script messages
///
/// # Safety
///
/// `url_scheme` must be null or a NUL-terminated string valid for the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PassportWebView_SetCustomURLScheme(
    web_view: *mut c_void,
    url_scheme: *const c_char,
) {
    with_handle("PassportWebView_SetCustomURLScheme", web_view, |handle| {
        let scheme = unsafe { copy_in_non_empty(url_scheme, "url scheme") }?;
        web_view_bridge().set_custom_url_scheme(handle, &scheme)
    })
}

/// Run JavaScript in the page; results and script errors are not reported
///
/// # Safety
///
/// `script` must be null or a NUL-terminated string valid for the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PassportWebView_ExecuteJavaScript(
    web_view: *mut c_void,
    script: *const c_char,
) {
    with_handle("PassportWebView_ExecuteJavaScript", web_view, |handle| {
        let script = unsafe { copy_in(script, "script") }?;
        web_view_bridge().execute_javascript(handle, &script)
    })
}

/// Replace the load-finished callback; null clears it
#[unsafe(no_mangle)]
pub extern "C" fn PassportWebView_SetOnLoadFinishedCallback(
    callback: Option<PassportWebViewOnLoadFinished>,
) {
    guard("PassportWebView_SetOnLoadFinishedCallback", (), || {
        web_view_bridge().set_on_load_finished(callback.map(|callback| {
            Arc::new(move |url: &str| {
                let url = to_c_string(url);
                callback(url.as_ptr());
            }) as Arc<crate::web_view::LoadFinishedCallback>
        }));
    })
}

/// Replace the script-message callback; null clears it
#[unsafe(no_mangle)]
pub extern "C" fn PassportWebView_SetOnJavaScriptMessageCallback(
    callback: Option<PassportWebViewOnJavaScriptMessage>,
) {
    guard("PassportWebView_SetOnJavaScriptMessageCallback", (), || {
        web_view_bridge().set_on_message(callback.map(|callback| {
            Arc::new(move |method: &str, data: &str| {
                let method = to_c_string(method);
                let data = to_c_string(data);
                callback(method.as_ptr(), data.as_ptr());
            }) as Arc<crate::web_view::MessageCallback>
        }));
    })
}

/// Replace the url-changed callback; null clears it
#[unsafe(no_mangle)]
pub extern "C" fn PassportWebView_SetOnURLChangedCallback(
    callback: Option<PassportWebViewOnURLChanged>,
) {
    guard("PassportWebView_SetOnURLChangedCallback", (), || {
        web_view_bridge().set_on_url_changed(callback.map(|callback| {
            Arc::new(move |url: &str| {
                let url = to_c_string(url);
                callback(url.as_ptr());
            }) as Arc<crate::web_view::UrlChangedCallback>
        }));
    })
}
