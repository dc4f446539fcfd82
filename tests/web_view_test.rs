//! Integration tests for WebViewBridge against the mock engine

use std::sync::{Arc, Mutex};

use passport_native::platform::mock::{MockCall, MockWebEngine};
use passport_native::{
    BridgeError, Frame, Handle, NavigationState, WebViewBridge, WebViewConfig,
};

#[derive(Debug, Clone, PartialEq)]
enum Fired {
    LoadFinished(String),
    Message(String, String),
    UrlChanged(String),
}

struct Harness {
    engine: MockWebEngine,
    bridge: Arc<WebViewBridge<MockWebEngine>>,
    fired: Arc<Mutex<Vec<Fired>>>,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(WebViewConfig::default())
    }

    fn with_config(config: WebViewConfig) -> Self {
        let engine = MockWebEngine::new();
        let bridge = Arc::new(WebViewBridge::with_config(engine.clone(), config));
        let fired = Arc::new(Mutex::new(Vec::new()));

        let sink = fired.clone();
        bridge.set_on_load_finished(Some(Arc::new(move |url: &str| {
            sink.lock().unwrap().push(Fired::LoadFinished(url.to_string()));
        })));
        let sink = fired.clone();
        bridge.set_on_message(Some(Arc::new(move |method: &str, data: &str| {
            sink.lock()
                .unwrap()
                .push(Fired::Message(method.to_string(), data.to_string()));
        })));
        let sink = fired.clone();
        bridge.set_on_url_changed(Some(Arc::new(move |url: &str| {
            sink.lock().unwrap().push(Fired::UrlChanged(url.to_string()));
        })));

        Self {
            engine,
            bridge,
            fired,
        }
    }

    fn fired(&self) -> Vec<Fired> {
        self.fired.lock().unwrap().clone()
    }

    fn finish_load(&self, handle: Handle, url: &str) {
        self.engine.events(handle).unwrap().load_finished(url);
        self.bridge.dispatch_pending();
    }
}

#[test]
fn test_create_returns_distinct_valid_handles() {
    let h = Harness::new();
    let first = h.bridge.create("PassportWebView").unwrap();
    let second = h.bridge.create("PassportWebView").unwrap();

    assert_ne!(first, second);
    assert!(!first.as_ptr().is_null());
    assert_eq!(h.bridge.len(), 2);

    let info = h.bridge.surface_info(first).unwrap();
    assert_eq!(info.owner, "PassportWebView");
    assert_eq!(info.navigation, NavigationState::Created);
    assert!(!info.visible);
    assert_eq!(
        h.engine.calls_for(first),
        vec![MockCall::Create("PassportWebView".to_string())]
    );
}

#[test]
fn test_create_failure_and_empty_owner() {
    let h = Harness::new();

    assert!(matches!(
        h.bridge.create(""),
        Err(BridgeError::EmptyArgument(_))
    ));

    h.engine.fail_creates(true);
    assert!(matches!(
        h.bridge.create("PassportWebView"),
        Err(BridgeError::SurfaceCreation { .. })
    ));
    assert!(h.bridge.is_empty());

    h.engine.fail_creates(false);
    assert!(h.bridge.create("PassportWebView").is_ok());
}

#[test]
fn test_destroyed_handle_is_rejected_everywhere() {
    let h = Harness::new();
    let handle = h.bridge.create("PassportWebView").unwrap();
    h.bridge.destroy(handle).unwrap();

    assert!(!h.bridge.contains(handle));
    assert!(matches!(
        h.bridge.destroy(handle),
        Err(BridgeError::InvalidHandle(_))
    ));
    assert!(h.bridge.load_url(handle, "https://example.com").is_err());
    assert!(h.bridge.show(handle).is_err());
    assert!(h.bridge.execute_javascript(handle, "1").is_err());

    // slot reuse must not revive the old handle
    let reused = h.bridge.create("Other").unwrap();
    assert_ne!(reused, handle);
    assert!(h.bridge.hide(handle).is_err());
    assert_eq!(
        h.engine.calls_for(handle).last(),
        Some(&MockCall::Close),
        "surface is closed exactly once"
    );
}

#[test]
fn test_load_reports_final_url_after_redirect() {
    let h = Harness::new();
    let handle = h.bridge.create("PassportWebView").unwrap();

    h.bridge
        .load_url(handle, "https://auth.example.com/login")
        .unwrap();
    assert_eq!(
        h.bridge.surface_info(handle).unwrap().navigation,
        NavigationState::Loading
    );

    let events = h.engine.events(handle).unwrap();
    events.url_changed("https://auth.example.com/sso");
    events.load_finished("https://auth.example.com/sso");
    h.bridge.dispatch_pending();

    assert_eq!(
        h.fired(),
        vec![
            Fired::UrlChanged("https://auth.example.com/sso".to_string()),
            Fired::LoadFinished("https://auth.example.com/sso".to_string()),
        ]
    );
    let info = h.bridge.surface_info(handle).unwrap();
    assert_eq!(info.navigation, NavigationState::Loaded);
    assert_eq!(
        info.current_url.as_deref(),
        Some("https://auth.example.com/sso")
    );
}

#[test]
fn test_invalid_urls_are_rejected() {
    let h = Harness::new();
    let handle = h.bridge.create("PassportWebView").unwrap();

    assert!(matches!(
        h.bridge.load_url(handle, ""),
        Err(BridgeError::EmptyArgument(_))
    ));
    assert!(matches!(
        h.bridge.load_url(handle, "not a url"),
        Err(BridgeError::InvalidUrl { .. })
    ));
    assert_eq!(
        h.bridge.surface_info(handle).unwrap().navigation,
        NavigationState::Created
    );
}

#[test]
fn test_scripts_before_load_are_queued_then_flushed_in_order() {
    let h = Harness::new();
    let handle = h.bridge.create("PassportWebView").unwrap();

    h.bridge.load_url(handle, "https://example.com").unwrap();
    h.bridge.execute_javascript(handle, "first()").unwrap();
    h.bridge.execute_javascript(handle, "second()").unwrap();

    assert!(h.engine.scripts_for(handle).is_empty());
    assert_eq!(h.bridge.surface_info(handle).unwrap().pending_scripts, 2);

    h.finish_load(handle, "https://example.com/");
    h.bridge.execute_javascript(handle, "third()").unwrap();

    assert_eq!(
        h.engine.scripts_for(handle),
        vec!["first()", "second()", "third()"]
    );
    assert_eq!(h.bridge.surface_info(handle).unwrap().pending_scripts, 0);
}

#[test]
fn test_scripts_run_immediately_when_queueing_disabled() {
    let h = Harness::with_config(WebViewConfig {
        queue_scripts_until_loaded: false,
        ..WebViewConfig::default()
    });
    let handle = h.bridge.create("PassportWebView").unwrap();

    h.bridge.execute_javascript(handle, "blank()").unwrap();
    assert_eq!(h.engine.scripts_for(handle), vec!["blank()"]);
}

#[test]
fn test_script_queue_drops_oldest_on_overflow() {
    let h = Harness::with_config(WebViewConfig {
        max_pending_scripts: 2,
        ..WebViewConfig::default()
    });
    let handle = h.bridge.create("PassportWebView").unwrap();

    for script in ["a()", "b()", "c()"] {
        h.bridge.execute_javascript(handle, script).unwrap();
    }
    h.bridge.load_url(handle, "https://example.com").unwrap();
    h.finish_load(handle, "https://example.com/");

    assert_eq!(h.engine.scripts_for(handle), vec!["b()", "c()"]);
}

#[test]
fn test_synchronous_engine_events_are_delivered_after_call() {
    let h = Harness::new();
    h.engine.auto_load(true);
    let handle = h.bridge.create("PassportWebView").unwrap();

    h.bridge.execute_javascript(handle, "queued()").unwrap();
    h.bridge.load_url(handle, "https://example.com/").unwrap();

    assert_eq!(
        h.fired(),
        vec![
            Fired::UrlChanged("https://example.com/".to_string()),
            Fired::LoadFinished("https://example.com/".to_string()),
        ]
    );
    assert_eq!(h.engine.scripts_for(handle), vec!["queued()"]);
}

#[test]
fn test_custom_scheme_navigation_becomes_message() {
    let h = Harness::new();
    let handle = h.bridge.create("PassportWebView").unwrap();
    h.bridge.set_custom_url_scheme(handle, "ImxPassport").unwrap();

    assert!(h.bridge.should_navigate(handle, "https://example.com/page"));
    assert!(!h.bridge.should_navigate(
        handle,
        "imxpassport://loginCallback?data=%7B%22code%22%3A%22abc%22%7D"
    ));

    assert_eq!(
        h.fired(),
        vec![Fired::Message(
            "loginCallback".to_string(),
            r#"{"code":"abc"}"#.to_string()
        )]
    );
    assert_eq!(
        h.bridge.surface_info(handle).unwrap().custom_scheme.as_deref(),
        Some("imxpassport")
    );
    assert!(
        h.engine
            .calls_for(handle)
            .contains(&MockCall::SetScheme("imxpassport".to_string()))
    );
}

#[test]
fn test_scheme_only_intercepted_on_its_surface() {
    let h = Harness::new();
    let with_scheme = h.bridge.create("A").unwrap();
    let without = h.bridge.create("B").unwrap();
    h.bridge.set_custom_url_scheme(with_scheme, "imx").unwrap();

    assert!(h.bridge.should_navigate(without, "imx://callback"));
    assert!(h.fired().is_empty());
}

#[test]
fn test_invalid_scheme_is_rejected() {
    let h = Harness::new();
    let handle = h.bridge.create("PassportWebView").unwrap();
    assert!(matches!(
        h.bridge.set_custom_url_scheme(handle, "bad scheme"),
        Err(BridgeError::InvalidScheme(_))
    ));
}

#[test]
fn test_posted_json_message() {
    let h = Harness::new();
    let handle = h.bridge.create("PassportWebView").unwrap();

    h.engine
        .events(handle)
        .unwrap()
        .message_posted(r#"{"method":"callback","data":{"responseFor":"init","success":true}}"#);
    h.bridge.dispatch_pending();

    assert_eq!(
        h.fired(),
        vec![Fired::Message(
            "callback".to_string(),
            r#"{"responseFor":"init","success":true}"#.to_string()
        )]
    );
}

#[test]
fn test_visibility_and_frame_are_orthogonal_to_navigation() {
    let h = Harness::new();
    let handle = h.bridge.create("PassportWebView").unwrap();

    h.bridge.set_frame(handle, 0.0, 20.0, 375.0, 600.0).unwrap();
    h.bridge.show(handle).unwrap();
    h.bridge.load_url(handle, "https://example.com").unwrap();
    h.bridge.hide(handle).unwrap();

    let info = h.bridge.surface_info(handle).unwrap();
    assert!(!info.visible);
    assert_eq!(info.navigation, NavigationState::Loading);
    assert_eq!(info.frame, Some(Frame::new(0.0, 20.0, 375.0, 600.0).unwrap()));

    assert!(matches!(
        h.bridge.set_frame(handle, 0.0, 0.0, f32::NAN, 10.0),
        Err(BridgeError::InvalidFrame { .. })
    ));
}

#[test]
fn test_events_for_destroyed_surface_are_dropped() {
    let h = Harness::new();
    let handle = h.bridge.create("PassportWebView").unwrap();
    let events = h.engine.events(handle).unwrap();

    h.bridge.destroy(handle).unwrap();
    events.load_finished("https://example.com/");
    h.bridge.dispatch_pending();

    assert!(h.fired().is_empty());
}

#[test]
fn test_callback_may_call_back_into_bridge() {
    let h = Harness::new();
    let handle = h.bridge.create("PassportWebView").unwrap();

    let bridge = Arc::downgrade(&h.bridge);
    h.bridge.set_on_load_finished(Some(Arc::new(move |_url: &str| {
        if let Some(bridge) = bridge.upgrade() {
            bridge
                .execute_javascript(handle, "window.ready = true")
                .unwrap();
        }
    })));

    h.bridge.load_url(handle, "https://example.com").unwrap();
    h.finish_load(handle, "https://example.com/");

    assert_eq!(h.engine.scripts_for(handle), vec!["window.ready = true"]);
}

#[test]
fn test_events_keep_engine_order_per_surface() {
    let h = Harness::new();
    let handle = h.bridge.create("PassportWebView").unwrap();
    let events = h.engine.events(handle).unwrap();

    events.url_changed("https://a.example/");
    events.message_posted(r#"{"method":"one"}"#);
    events.url_changed("https://b.example/");
    events.message_posted(r#"{"method":"two"}"#);
    h.bridge.dispatch_pending();

    assert_eq!(
        h.fired(),
        vec![
            Fired::UrlChanged("https://a.example/".to_string()),
            Fired::Message("one".to_string(), String::new()),
            Fired::UrlChanged("https://b.example/".to_string()),
            Fired::Message("two".to_string(), String::new()),
        ]
    );
}

#[test]
fn test_failed_first_load_discards_queued_scripts() {
    let h = Harness::new();
    let handle = h.bridge.create("PassportWebView").unwrap();

    h.bridge.load_url(handle, "https://offline.example").unwrap();
    h.bridge.execute_javascript(handle, "stale()").unwrap();
    h.engine
        .events(handle)
        .unwrap()
        .load_failed("https://offline.example/", "The Internet connection appears to be offline.");
    h.bridge.dispatch_pending();

    let info = h.bridge.surface_info(handle).unwrap();
    assert_eq!(info.navigation, NavigationState::Created);
    assert_eq!(info.pending_scripts, 0);
    assert!(h.engine.scripts_for(handle).is_empty());
    assert!(h.fired().is_empty(), "a failed load is not a finished load");

    // the next successful load runs only scripts sent after the failure
    h.bridge.execute_javascript(handle, "fresh()").unwrap();
    h.bridge.load_url(handle, "https://example.com").unwrap();
    h.finish_load(handle, "https://example.com/");
    assert_eq!(h.engine.scripts_for(handle), vec!["fresh()"]);
}

#[test]
fn test_failed_navigation_keeps_previous_page_scriptable() {
    let h = Harness::new();
    let handle = h.bridge.create("PassportWebView").unwrap();

    h.bridge.load_url(handle, "https://example.com").unwrap();
    h.finish_load(handle, "https://example.com/");
    h.bridge.load_url(handle, "https://expired.badssl.example").unwrap();
    h.engine
        .events(handle)
        .unwrap()
        .load_failed("https://expired.badssl.example/", "certificate expired");
    h.bridge.dispatch_pending();

    assert_eq!(
        h.bridge.surface_info(handle).unwrap().navigation,
        NavigationState::Loaded
    );
    h.bridge.execute_javascript(handle, "afterFailure()").unwrap();
    assert_eq!(h.engine.scripts_for(handle), vec!["afterFailure()"]);
}

#[test]
fn test_concurrent_notifications_are_delivered_serially() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use passport_native::SurfaceEvent;

    const THREADS: usize = 4;
    const PER_THREAD: usize = 200;

    let engine = MockWebEngine::new();
    let bridge = Arc::new(WebViewBridge::new(engine));
    let handle = bridge.create("PassportWebView").unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let active = Arc::new(AtomicUsize::new(0));
    let max_active = Arc::new(AtomicUsize::new(0));
    {
        let seen = seen.clone();
        let active = active.clone();
        let max_active = max_active.clone();
        bridge.set_on_url_changed(Some(Arc::new(move |url: &str| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            max_active.fetch_max(now, Ordering::SeqCst);
            seen.lock().unwrap().push(url.to_string());
            active.fetch_sub(1, Ordering::SeqCst);
        })));
    }

    let workers: Vec<_> = (0..THREADS)
        .map(|thread| {
            let bridge = bridge.clone();
            std::thread::spawn(move || {
                for seq in 0..PER_THREAD {
                    bridge.notify(
                        handle,
                        SurfaceEvent::UrlChanged {
                            url: format!("https://example.com/{thread}/{seq}"),
                        },
                    );
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    bridge.dispatch_pending();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), THREADS * PER_THREAD);
    for thread in 0..THREADS {
        let prefix = format!("https://example.com/{thread}/");
        let order: Vec<usize> = seen
            .iter()
            .filter_map(|url| url.strip_prefix(&prefix))
            .map(|seq| seq.parse().unwrap())
            .collect();
        assert_eq!(order, (0..PER_THREAD).collect::<Vec<_>>());
    }
    assert_eq!(max_active.load(Ordering::SeqCst), 1);
}
