//! Integration tests for SignInBridge against the mock provider

use std::sync::{Arc, Mutex};

use passport_native::platform::mock::{MockSignInBehaviour, MockSignInProvider, sample_credential};
use passport_native::{
    ERROR_ABANDONED, ERROR_IN_PROGRESS, ERROR_NOT_INITIALIZED, ERROR_UNAVAILABLE, SignInBridge,
    SignInCredential, SignInOutcome,
};

#[derive(Debug, Clone, PartialEq)]
enum Fired {
    Success(String),
    Error(String, String),
    Cancel,
}

fn bridge_with_recorder(
    provider: MockSignInProvider,
) -> (SignInBridge<MockSignInProvider>, Arc<Mutex<Vec<Fired>>>) {
    let bridge = SignInBridge::new(provider);
    let fired = Arc::new(Mutex::new(Vec::new()));

    let sink = fired.clone();
    bridge.set_on_success(Some(Arc::new(move |credential: &SignInCredential| {
        sink.lock()
            .unwrap()
            .push(Fired::Success(credential.user_id.clone()));
    })));
    let sink = fired.clone();
    bridge.set_on_error(Some(Arc::new(move |code: &str, message: &str| {
        sink.lock()
            .unwrap()
            .push(Fired::Error(code.to_string(), message.to_string()));
    })));
    let sink = fired.clone();
    bridge.set_on_cancel(Some(Arc::new(move || {
        sink.lock().unwrap().push(Fired::Cancel);
    })));

    (bridge, fired)
}

fn codes(fired: &Mutex<Vec<Fired>>) -> Vec<String> {
    fired
        .lock()
        .unwrap()
        .iter()
        .map(|f| match f {
            Fired::Success(user) => format!("success:{user}"),
            Fired::Error(code, _) => format!("error:{code}"),
            Fired::Cancel => "cancel".to_string(),
        })
        .collect()
}

#[test]
fn test_init_is_idempotent() {
    let provider = MockSignInProvider::new(true);
    let (bridge, _) = bridge_with_recorder(provider.clone());

    assert!(!bridge.is_initialized());
    bridge.init();
    bridge.init();
    bridge.init();

    assert!(bridge.is_initialized());
    assert_eq!(provider.init_calls(), 1, "provider setup should run once");
}

#[test]
fn test_is_available_before_init_and_cached() {
    let provider = MockSignInProvider::new(true);
    let (bridge, _) = bridge_with_recorder(provider.clone());

    assert!(bridge.is_available());
    assert!(bridge.is_available());
    assert_eq!(provider.availability_queries(), 1);
    assert_eq!(provider.init_calls(), 0, "querying availability must not init");
}

#[test]
fn test_successful_flow_fires_success_once() {
    let provider = MockSignInProvider::new(true);
    let (bridge, fired) = bridge_with_recorder(provider.clone());
    bridge.init();

    bridge.start();
    assert!(bridge.is_in_progress());
    assert!(codes(&fired).is_empty(), "nothing fires until the OS answers");

    assert!(provider.resolve_held(SignInOutcome::Success(sample_credential())));
    assert_eq!(codes(&fired), vec!["success:001234.abcd.5678"]);
    assert!(!bridge.is_in_progress());
}

#[test]
fn test_immediate_cancel_and_error() {
    let provider = MockSignInProvider::new(true);
    let (bridge, fired) = bridge_with_recorder(provider.clone());
    bridge.init();

    provider.set_behaviour(MockSignInBehaviour::Resolve(SignInOutcome::Cancelled));
    bridge.start();
    provider.set_behaviour(MockSignInBehaviour::Resolve(SignInOutcome::from_native_error(
        1004,
        "Authorization failed",
    )));
    bridge.start();

    assert_eq!(codes(&fired), vec!["cancel", "error:failed"]);
    assert!(!bridge.is_in_progress());
}

#[test]
fn test_start_before_init_reports_error() {
    let provider = MockSignInProvider::new(true);
    let (bridge, fired) = bridge_with_recorder(provider.clone());

    bridge.start();

    assert_eq!(codes(&fired), vec![format!("error:{ERROR_NOT_INITIALIZED}")]);
    assert_eq!(provider.start_calls(), 0);
}

#[test]
fn test_start_when_unavailable_reports_error() {
    let provider = MockSignInProvider::new(false);
    let (bridge, fired) = bridge_with_recorder(provider.clone());
    bridge.init();

    bridge.start();

    assert_eq!(codes(&fired), vec![format!("error:{ERROR_UNAVAILABLE}")]);
    assert_eq!(provider.start_calls(), 0);
}

#[test]
fn test_overlapping_start_is_rejected_without_disturbing_active_flow() {
    let provider = MockSignInProvider::new(true);
    let (bridge, fired) = bridge_with_recorder(provider.clone());
    bridge.init();

    bridge.start();
    bridge.start();

    assert_eq!(codes(&fired), vec![format!("error:{ERROR_IN_PROGRESS}")]);
    assert!(bridge.is_in_progress(), "first flow must still be active");
    assert_eq!(provider.start_calls(), 1);

    provider.resolve_held(SignInOutcome::Cancelled);
    assert_eq!(
        codes(&fired),
        vec![format!("error:{ERROR_IN_PROGRESS}"), "cancel".to_string()]
    );

    bridge.start();
    assert_eq!(provider.start_calls(), 2, "a new flow may start after resolution");
}

#[test]
fn test_abandoned_completion_reports_error() {
    let provider = MockSignInProvider::new(true);
    let (bridge, fired) = bridge_with_recorder(provider.clone());
    bridge.init();
    provider.set_behaviour(MockSignInBehaviour::Abandon);

    bridge.start();

    assert_eq!(codes(&fired), vec![format!("error:{ERROR_ABANDONED}")]);
    assert!(!bridge.is_in_progress());
}

#[test]
fn test_replaced_callback_is_never_invoked() {
    let provider = MockSignInProvider::new(true);
    let (bridge, fired) = bridge_with_recorder(provider.clone());
    bridge.init();

    let replacement = Arc::new(Mutex::new(0));
    let counter = replacement.clone();
    bridge.set_on_cancel(Some(Arc::new(move || {
        *counter.lock().unwrap() += 1;
    })));

    provider.set_behaviour(MockSignInBehaviour::Resolve(SignInOutcome::Cancelled));
    bridge.start();

    assert_eq!(*replacement.lock().unwrap(), 1);
    assert!(codes(&fired).is_empty(), "original cancel callback was replaced");
}

#[test]
fn test_callback_may_restart_flow() {
    let provider = MockSignInProvider::new(true);
    let bridge = Arc::new(SignInBridge::new(provider.clone()));
    bridge.init();

    let restarts = Arc::new(Mutex::new(0));
    let counter = restarts.clone();
    let weak = Arc::downgrade(&bridge);
    bridge.set_on_cancel(Some(Arc::new(move || {
        let mut count = counter.lock().unwrap();
        *count += 1;
        if *count == 1 {
            if let Some(bridge) = weak.upgrade() {
                bridge.start();
            }
        }
    })));

    bridge.start();
    provider.resolve_held(SignInOutcome::Cancelled);

    assert_eq!(*restarts.lock().unwrap(), 1);
    assert_eq!(provider.start_calls(), 2);
    assert_eq!(provider.held(), 1);
    assert!(bridge.is_in_progress());
}
