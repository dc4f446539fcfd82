//! Apple Sign-In bridge
//!
//! [`SignInBridge`] owns the flow bookkeeping and the host callbacks; a
//! [`SignInProvider`] does the platform work. Each call to
//! [`SignInBridge::start`] hands the provider a one-shot [`SignInCompletion`].
//! Consuming it (or dropping it) resolves the flow, so every start produces
//! exactly one of the success, error or cancel callbacks.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Once, OnceLock, PoisonError, Weak};

use crate::{CallbackSlot, EventQueue};

/// `Start` was called before `Init`
pub const ERROR_NOT_INITIALIZED: &str = "not_initialized";
/// The OS does not support Sign in with Apple
pub const ERROR_UNAVAILABLE: &str = "unavailable";
/// Another flow has not resolved yet
pub const ERROR_IN_PROGRESS: &str = "in_progress";
/// The provider dropped the flow without resolving it
pub const ERROR_ABANDONED: &str = "abandoned";
/// The OS reported success but returned no identity token
pub const ERROR_MISSING_IDENTITY_TOKEN: &str = "missing_identity_token";

/// Credential returned by a successful sign-in
///
/// Apple only returns `email` and `full_name` the first time a user signs in
/// to an app; afterwards they are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignInCredential {
    /// JWT identity token
    pub identity_token: String,
    /// Single-use authorization code
    pub authorization_code: String,
    /// Stable user identifier
    pub user_id: String,
    /// Email address, possibly empty
    pub email: String,
    /// Display name, possibly empty
    pub full_name: String,
}

/// Terminal state of one sign-in flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    /// The user signed in
    Success(SignInCredential),
    /// The flow failed
    Error {
        /// Machine-readable error code
        code: String,
        /// Human-readable description
        message: String,
    },
    /// The user dismissed the flow
    Cancelled,
}

impl SignInOutcome {
    /// Shorthand for [`SignInOutcome::Error`]
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        SignInOutcome::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Validate a credential reported by the OS
    ///
    /// A credential without an identity token cannot be exchanged with the
    /// backend and is reported as [`ERROR_MISSING_IDENTITY_TOKEN`].
    pub fn from_native_credential(credential: SignInCredential) -> Self {
        if credential.identity_token.is_empty() {
            return SignInOutcome::error(
                ERROR_MISSING_IDENTITY_TOKEN,
                "Apple did not return an identity token",
            );
        }
        SignInOutcome::Success(credential)
    }

    /// Map an `ASAuthorizationError` code reported by the OS
    ///
    /// A user cancellation becomes [`SignInOutcome::Cancelled`]; everything
    /// else is an error carrying a stable string code.
    pub fn from_native_error(code: i64, message: &str) -> Self {
        match AuthorizationError::from_code(code) {
            Some(AuthorizationError::Canceled) => SignInOutcome::Cancelled,
            Some(known) => SignInOutcome::error(known.as_str(), message),
            None => SignInOutcome::error(format!("error_{code}"), message),
        }
    }
}

/// `ASAuthorizationError.Code` values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum AuthorizationError {
    /// Unknown failure
    Unknown = 1000,
    /// User cancelled
    Canceled = 1001,
    /// Malformed response
    InvalidResponse = 1002,
    /// Request not handled
    NotHandled = 1003,
    /// Authorization failed
    Failed = 1004,
    /// UI required but not allowed
    NotInteractive = 1005,
    /// Credential matched an excluded one
    MatchedExcludedCredential = 1006,
}

impl AuthorizationError {
    /// Look up a native code
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1000 => Some(Self::Unknown),
            1001 => Some(Self::Canceled),
            1002 => Some(Self::InvalidResponse),
            1003 => Some(Self::NotHandled),
            1004 => Some(Self::Failed),
            1005 => Some(Self::NotInteractive),
            1006 => Some(Self::MatchedExcludedCredential),
            _ => None,
        }
    }

    /// Code string reported to the host
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Canceled => "canceled",
            Self::InvalidResponse => "invalid_response",
            Self::NotHandled => "not_handled",
            Self::Failed => "failed",
            Self::NotInteractive => "not_interactive",
            Self::MatchedExcludedCredential => "matched_excluded_credential",
        }
    }
}

/// Platform side of the sign-in flow
pub trait SignInProvider: Send + Sync {
    /// One-time setup; called at most once per bridge
    fn init(&self) {}

    /// Whether the OS supports the flow
    ///
    /// The bridge caches the first answer.
    fn is_available(&self) -> bool;

    /// Present the authentication UI
    ///
    /// The provider must eventually consume `completion`, from any thread.
    fn start(&self, completion: SignInCompletion);
}

/// Success listener: receives the credential
pub type SuccessCallback = dyn Fn(&SignInCredential) + Send + Sync;
/// Error listener: receives `(code, message)`
pub type ErrorCallback = dyn Fn(&str, &str) + Send + Sync;
/// Cancel listener
pub type CancelCallback = dyn Fn() + Send + Sync;

struct Resolution {
    flow: u64,
    outcome: SignInOutcome,
}

struct SignInShared {
    queue: EventQueue<Resolution>,
    on_success: CallbackSlot<SuccessCallback>,
    on_error: CallbackSlot<ErrorCallback>,
    on_cancel: CallbackSlot<CancelCallback>,
    active_flow: Mutex<Option<u64>>,
}

impl SignInShared {
    fn dispatch(&self) -> usize {
        self.queue.drain(|resolution| self.deliver(resolution))
    }

    fn deliver(&self, Resolution { flow, outcome }: Resolution) {
        {
            let mut active = self
                .active_flow
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if *active == Some(flow) {
                *active = None;
            }
        }

        match outcome {
            SignInOutcome::Success(credential) => {
                log::info!("Sign-in flow {flow} succeeded for user {}", credential.user_id);
                match self.on_success.get() {
                    Some(callback) => callback(&credential),
                    None => log::warn!("No success callback registered, dropping result"),
                }
            }
            SignInOutcome::Error { code, message } => {
                log::error!("Sign-in flow {flow} failed: {code} - {message}");
                match self.on_error.get() {
                    Some(callback) => callback(&code, &message),
                    None => log::warn!("No error callback registered, dropping result"),
                }
            }
            SignInOutcome::Cancelled => {
                log::info!("Sign-in flow {flow} cancelled");
                match self.on_cancel.get() {
                    Some(callback) => callback(),
                    None => log::warn!("No cancel callback registered, dropping result"),
                }
            }
        }
    }
}

/// One-shot resolver for a sign-in flow
///
/// Dropping it unresolved reports an [`ERROR_ABANDONED`] error.
pub struct SignInCompletion {
    flow: u64,
    shared: Option<Weak<SignInShared>>,
}

impl SignInCompletion {
    fn new(flow: u64, shared: &Arc<SignInShared>) -> Self {
        Self {
            flow,
            shared: Some(Arc::downgrade(shared)),
        }
    }

    /// Identifier of the flow this completion resolves
    pub fn flow(&self) -> u64 {
        self.flow
    }

    /// Resolve the flow and deliver the outcome
    pub fn resolve(mut self, outcome: SignInOutcome) {
        self.finish(outcome);
    }

    /// Resolve with a credential
    pub fn succeed(self, credential: SignInCredential) {
        self.resolve(SignInOutcome::Success(credential));
    }

    /// Resolve with an error
    pub fn fail(self, code: impl Into<String>, message: impl Into<String>) {
        self.resolve(SignInOutcome::error(code, message));
    }

    /// Resolve as cancelled by the user
    pub fn cancel(self) {
        self.resolve(SignInOutcome::Cancelled);
    }

    fn finish(&mut self, outcome: SignInOutcome) {
        let Some(shared) = self.shared.take().and_then(|shared| shared.upgrade()) else {
            return;
        };
        shared.queue.post(Resolution {
            flow: self.flow,
            outcome,
        });
        shared.dispatch();
    }
}

impl Drop for SignInCompletion {
    fn drop(&mut self) {
        if self.shared.is_some() {
            log::warn!("Sign-in flow {} dropped without a result", self.flow);
            self.finish(SignInOutcome::error(
                ERROR_ABANDONED,
                "The sign-in flow ended without a result",
            ));
        }
    }
}

impl fmt::Debug for SignInCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignInCompletion")
            .field("flow", &self.flow)
            .field("resolved", &self.shared.is_none())
            .finish()
    }
}

/// Host-facing Apple Sign-In bridge
pub struct SignInBridge<P: SignInProvider> {
    provider: P,
    shared: Arc<SignInShared>,
    init: Once,
    init_requested: AtomicBool,
    available: OnceLock<bool>,
    next_flow: AtomicU64,
}

impl<P: SignInProvider> SignInBridge<P> {
    /// Creates a bridge over `provider`
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            shared: Arc::new(SignInShared {
                queue: EventQueue::new(),
                on_success: CallbackSlot::new(),
                on_error: CallbackSlot::new(),
                on_cancel: CallbackSlot::new(),
                active_flow: Mutex::new(None),
            }),
            init: Once::new(),
            init_requested: AtomicBool::new(false),
            available: OnceLock::new(),
            next_flow: AtomicU64::new(1),
        }
    }

    /// The platform provider
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Set up the provider; repeated calls are no-ops
    pub fn init(&self) {
        if self.init_requested.swap(true, Ordering::AcqRel) {
            log::warn!("Sign-in bridge already initialized");
        }
        self.init.call_once(|| {
            log::info!("Initializing sign-in provider");
            self.provider.init();
        });
    }

    /// Whether [`init`](Self::init) has completed
    pub fn is_initialized(&self) -> bool {
        self.init.is_completed()
    }

    /// Whether the platform supports the flow; stable for the process lifetime
    pub fn is_available(&self) -> bool {
        *self.available.get_or_init(|| {
            let available = self.provider.is_available();
            log::info!("Sign in with Apple available: {available}");
            available
        })
    }

    /// Whether a flow is waiting for its outcome
    pub fn is_in_progress(&self) -> bool {
        self.shared
            .active_flow
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Start a flow
    ///
    /// Exactly one callback fires for this call. Calls made before `init`, on
    /// an unsupported platform, or while another flow is outstanding resolve
    /// immediately with an error.
    pub fn start(&self) {
        let flow = self.next_flow.fetch_add(1, Ordering::Relaxed);
        let completion = SignInCompletion::new(flow, &self.shared);

        if !self.is_initialized() {
            completion.fail(
                ERROR_NOT_INITIALIZED,
                "AppleSignIn_Init must be called before AppleSignIn_Start",
            );
            return;
        }

        if !self.is_available() {
            completion.fail(
                ERROR_UNAVAILABLE,
                "Sign in with Apple is not available on this device",
            );
            return;
        }

        {
            let mut active = self
                .shared
                .active_flow
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(active_flow) = *active {
                drop(active);
                completion.fail(
                    ERROR_IN_PROGRESS,
                    format!("Sign-in flow {active_flow} has not finished yet"),
                );
                return;
            }
            *active = Some(flow);
        }

        log::info!("Starting sign-in flow {flow}");
        self.provider.start(completion);
        self.shared.dispatch();
    }

    /// Replace the success listener
    pub fn set_on_success(&self, callback: Option<Arc<SuccessCallback>>) {
        self.shared.on_success.set(callback);
    }

    /// Replace the error listener
    pub fn set_on_error(&self, callback: Option<Arc<ErrorCallback>>) {
        self.shared.on_error.set(callback);
    }

    /// Replace the cancel listener
    pub fn set_on_cancel(&self, callback: Option<Arc<CancelCallback>>) {
        self.shared.on_cancel.set(callback);
    }

    /// Deliver outcomes that were posted while another delivery was running
    pub fn dispatch_pending(&self) -> usize {
        self.shared.dispatch()
    }
}
