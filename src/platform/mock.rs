//! Mock backends for testing
//!
//! Deterministic stand-ins for the identity provider and browser engine. Both
//! are cheap to clone; clones share state, so a test can keep one copy while
//! the bridge owns another.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;

use crate::error::{BridgeError, Result};
use crate::sign_in::{SignInCompletion, SignInCredential, SignInOutcome, SignInProvider};
use crate::web_view::{BrowserEngine, BrowserSurface, Frame, SurfaceEvents};
use crate::Handle;

/// What [`MockSignInProvider`] does when a flow starts
#[derive(Debug, Clone)]
pub enum MockSignInBehaviour {
    /// Resolve immediately with this outcome
    Resolve(SignInOutcome),
    /// Keep the completion until the test resolves it
    Hold,
    /// Drop the completion without resolving it
    Abandon,
}

struct SignInState {
    available: bool,
    behaviour: Mutex<MockSignInBehaviour>,
    held: Mutex<Vec<SignInCompletion>>,
    init_calls: AtomicUsize,
    availability_queries: AtomicUsize,
    start_calls: AtomicUsize,
}

/// Scriptable identity provider
#[derive(Clone)]
pub struct MockSignInProvider {
    state: Arc<SignInState>,
}

impl MockSignInProvider {
    /// A provider that reports `available` and holds every flow
    pub fn new(available: bool) -> Self {
        Self {
            state: Arc::new(SignInState {
                available,
                behaviour: Mutex::new(MockSignInBehaviour::Hold),
                held: Mutex::new(Vec::new()),
                init_calls: AtomicUsize::new(0),
                availability_queries: AtomicUsize::new(0),
                start_calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Change what later flows do
    pub fn set_behaviour(&self, behaviour: MockSignInBehaviour) {
        *self
            .state
            .behaviour
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = behaviour;
    }

    /// Resolve the oldest held flow; returns false if none is held
    pub fn resolve_held(&self, outcome: SignInOutcome) -> bool {
        let completion = {
            let mut held = self.state.held.lock().unwrap_or_else(PoisonError::into_inner);
            if held.is_empty() {
                return false;
            }
            held.remove(0)
        };
        completion.resolve(outcome);
        true
    }

    /// Number of flows waiting to be resolved
    pub fn held(&self) -> usize {
        self.state
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// How often `init` ran
    pub fn init_calls(&self) -> usize {
        self.state.init_calls.load(Ordering::SeqCst)
    }

    /// How often availability was queried
    pub fn availability_queries(&self) -> usize {
        self.state.availability_queries.load(Ordering::SeqCst)
    }

    /// How often a flow reached the provider
    pub fn start_calls(&self) -> usize {
        self.state.start_calls.load(Ordering::SeqCst)
    }
}

/// A credential with recognisable values
pub fn sample_credential() -> SignInCredential {
    SignInCredential {
        identity_token: "eyJhbGciOiJSUzI1NiJ9.test.sig".to_string(),
        authorization_code: "c0de".to_string(),
        user_id: "001234.abcd.5678".to_string(),
        email: "player@example.com".to_string(),
        full_name: "Test Player".to_string(),
    }
}

impl SignInProvider for MockSignInProvider {
    fn init(&self) {
        self.state.init_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn is_available(&self) -> bool {
        self.state.availability_queries.fetch_add(1, Ordering::SeqCst);
        self.state.available
    }

    fn start(&self, completion: SignInCompletion) {
        self.state.start_calls.fetch_add(1, Ordering::SeqCst);
        let behaviour = self
            .state
            .behaviour
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match behaviour {
            MockSignInBehaviour::Resolve(outcome) => completion.resolve(outcome),
            MockSignInBehaviour::Hold => self
                .state
                .held
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(completion),
            MockSignInBehaviour::Abandon => drop(completion),
        }
    }
}

/// Call recorded by [`MockWebEngine`]
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    /// Surface created for an owner
    Create(String),
    /// Navigation requested
    LoadUrl(String),
    /// Visibility changed
    SetVisible(bool),
    /// Frame changed
    SetFrame(Frame),
    /// Scheme registered
    SetScheme(String),
    /// Script evaluated
    Evaluate(String),
    /// Surface closed
    Close,
}

#[derive(Default)]
struct EngineState {
    calls: Mutex<Vec<(Handle, MockCall)>>,
    events: Mutex<HashMap<Handle, SurfaceEvents>>,
    fail_creates: AtomicBool,
    auto_load: AtomicBool,
}

impl EngineState {
    fn record(&self, handle: Handle, call: MockCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((handle, call));
    }
}

/// Recording browser engine
#[derive(Clone, Default)]
pub struct MockWebEngine {
    state: Arc<EngineState>,
}

impl MockWebEngine {
    /// An engine whose loads stay in flight until the test finishes them
    pub fn new() -> Self {
        Self::default()
    }

    /// Make later `create_surface` calls fail
    pub fn fail_creates(&self, fail: bool) {
        self.state.fail_creates.store(fail, Ordering::SeqCst);
    }

    /// Finish every load synchronously, as if each page were instant
    pub fn auto_load(&self, enabled: bool) {
        self.state.auto_load.store(enabled, Ordering::SeqCst);
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<(Handle, MockCall)> {
        self.state
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Calls made on one surface
    pub fn calls_for(&self, handle: Handle) -> Vec<MockCall> {
        self.calls()
            .into_iter()
            .filter(|(h, _)| *h == handle)
            .map(|(_, call)| call)
            .collect()
    }

    /// Scripts evaluated on one surface
    pub fn scripts_for(&self, handle: Handle) -> Vec<String> {
        self.calls_for(handle)
            .into_iter()
            .filter_map(|call| match call {
                MockCall::Evaluate(script) => Some(script),
                _ => None,
            })
            .collect()
    }

    /// The event sender given to a surface, if it was created
    pub fn events(&self, handle: Handle) -> Option<SurfaceEvents> {
        self.state
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&handle)
            .cloned()
    }
}

impl BrowserEngine for MockWebEngine {
    type Surface = MockSurface;

    fn create_surface(&self, owner: &str, events: SurfaceEvents) -> Result<MockSurface> {
        if self.state.fail_creates.load(Ordering::SeqCst) {
            return Err(BridgeError::SurfaceCreation {
                owner: owner.to_string(),
                reason: "mock engine configured to fail".to_string(),
            });
        }

        let handle = events.handle();
        self.state.record(handle, MockCall::Create(owner.to_string()));
        self.state
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle, events.clone());

        Ok(MockSurface {
            handle,
            events,
            state: self.state.clone(),
        })
    }
}

/// Surface produced by [`MockWebEngine`]
pub struct MockSurface {
    handle: Handle,
    events: SurfaceEvents,
    state: Arc<EngineState>,
}

impl BrowserSurface for MockSurface {
    fn load_url(&mut self, url: &Url) {
        self.state.record(self.handle, MockCall::LoadUrl(url.to_string()));
        if self.state.auto_load.load(Ordering::SeqCst) {
            self.events.load_started(url.as_str());
            self.events.url_changed(url.as_str());
            self.events.load_finished(url.as_str());
        }
    }

    fn set_visible(&mut self, visible: bool) {
        self.state.record(self.handle, MockCall::SetVisible(visible));
    }

    fn set_frame(&mut self, frame: Frame) {
        self.state.record(self.handle, MockCall::SetFrame(frame));
    }

    fn set_intercepted_scheme(&mut self, scheme: &str) {
        self.state
            .record(self.handle, MockCall::SetScheme(scheme.to_string()));
    }

    fn evaluate_script(&mut self, script: &str) {
        self.state
            .record(self.handle, MockCall::Evaluate(script.to_string()));
    }

    fn close(self) {
        self.state.record(self.handle, MockCall::Close);
        self.state
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.handle);
    }
}
