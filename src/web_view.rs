//! Embedded browser bridge
//!
//! [`WebViewBridge`] owns every surface record, keyed by a generation-checked
//! [`Handle`], and the three host callbacks. A [`BrowserEngine`] creates the
//! native surfaces and reports what they do through a [`SurfaceEvents`]
//! sender.
//!
//! # Lifecycle
//!
//! ```text
//! Create -> Created -> LoadURL -> Loading <-> Loaded -> Destroy
//! ```
//!
//! Visibility is tracked separately from navigation. After `Destroy` the
//! handle no longer resolves and every call with it fails with
//! [`BridgeError::InvalidHandle`].
//!
//! # Events
//!
//! Engine events are queued and delivered after the bridge has released its
//! lock, so host callbacks may call straight back into the bridge.

use crossbeam_channel::Sender;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use url::Url;

use crate::config::WebViewConfig;
use crate::error::{BridgeError, Result};
use crate::message::ScriptMessage;
use crate::{CallbackSlot, EventQueue, Handle, HandleArena};

/// Surface position and size in host coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
}

impl Frame {
    /// Validate host-supplied coordinates
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Result<Self> {
        let finite = [x, y, width, height].iter().all(|v| v.is_finite());
        if !finite || width < 0.0 || height < 0.0 {
            return Err(BridgeError::InvalidFrame {
                x,
                y,
                width,
                height,
            });
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }
}

/// Navigation state of a live surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationState {
    /// Nothing loaded yet
    Created,
    /// A navigation is in flight
    Loading,
    /// The last navigation finished
    Loaded,
}

/// Something a native surface did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// A navigation began (including redirects and page-initiated loads)
    LoadStarted {
        /// URL being loaded
        url: String,
    },
    /// A navigation completed
    LoadFinished {
        /// Final URL after redirects
        url: String,
    },
    /// A navigation failed before the page loaded
    LoadFailed {
        /// URL that failed
        url: String,
        /// Engine-provided description
        reason: String,
    },
    /// The committed URL changed
    UrlChanged {
        /// New URL
        url: String,
    },
    /// Page script posted a message body
    MessagePosted {
        /// Raw body
        body: String,
    },
    /// A navigation to the custom scheme was intercepted
    SchemeIntercepted {
        /// Full intercepted URL
        url: String,
    },
}

/// Sender handed to the engine for one surface
///
/// Posting only queues; delivery happens when the bridge next dispatches.
#[derive(Clone)]
pub struct SurfaceEvents {
    handle: Handle,
    sender: Sender<(Handle, SurfaceEvent)>,
}

impl SurfaceEvents {
    /// The surface these events belong to
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Queue an event
    pub fn post(&self, event: SurfaceEvent) {
        let _ = self.sender.send((self.handle, event));
    }

    /// Queue [`SurfaceEvent::LoadStarted`]
    pub fn load_started(&self, url: impl Into<String>) {
        self.post(SurfaceEvent::LoadStarted { url: url.into() });
    }

    /// Queue [`SurfaceEvent::LoadFinished`]
    pub fn load_finished(&self, url: impl Into<String>) {
        self.post(SurfaceEvent::LoadFinished { url: url.into() });
    }

    /// Queue [`SurfaceEvent::LoadFailed`]
    pub fn load_failed(&self, url: impl Into<String>, reason: impl Into<String>) {
        self.post(SurfaceEvent::LoadFailed {
            url: url.into(),
            reason: reason.into(),
        });
    }

    /// Queue [`SurfaceEvent::UrlChanged`]
    pub fn url_changed(&self, url: impl Into<String>) {
        self.post(SurfaceEvent::UrlChanged { url: url.into() });
    }

    /// Queue [`SurfaceEvent::MessagePosted`]
    pub fn message_posted(&self, body: impl Into<String>) {
        self.post(SurfaceEvent::MessagePosted { body: body.into() });
    }
}

/// Factory for native browser surfaces
pub trait BrowserEngine: Send + Sync {
    /// Native surface type
    type Surface: BrowserSurface;

    /// Create a hidden surface owned by the host object `owner`
    fn create_surface(&self, owner: &str, events: SurfaceEvents) -> Result<Self::Surface>;
}

/// One native browser surface
///
/// Calls are made with the bridge lock held and must not call back into the
/// bridge; report progress through [`SurfaceEvents`] instead.
pub trait BrowserSurface: Send {
    /// Begin navigating to `url`
    fn load_url(&mut self, url: &Url);

    /// Show or hide the surface
    fn set_visible(&mut self, visible: bool);

    /// Move and resize the surface
    fn set_frame(&mut self, frame: Frame);

    /// Register the scheme the engine must route to the bridge instead of loading
    fn set_intercepted_scheme(&mut self, scheme: &str);

    /// Run script in the current page; results are discarded
    fn evaluate_script(&mut self, script: &str);

    /// Release native resources
    fn close(self);
}

/// Load-finished listener: receives the final URL
pub type LoadFinishedCallback = dyn Fn(&str) + Send + Sync;
/// Script-message listener: receives `(method, data)`
pub type MessageCallback = dyn Fn(&str, &str) + Send + Sync;
/// URL-changed listener: receives the new URL
pub type UrlChangedCallback = dyn Fn(&str) + Send + Sync;

/// Point-in-time view of a surface record
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceInfo {
    /// Host object name given at creation
    pub owner: String,
    /// Navigation state
    pub navigation: NavigationState,
    /// Visibility flag
    pub visible: bool,
    /// Last frame set
    pub frame: Option<Frame>,
    /// Intercepted scheme
    pub custom_scheme: Option<String>,
    /// Last URL reported by the engine
    pub current_url: Option<String>,
    /// Scripts waiting for the current load to finish
    pub pending_scripts: usize,
}

struct SurfaceEntry<S> {
    owner: String,
    surface: S,
    navigation: NavigationState,
    visible: bool,
    frame: Option<Frame>,
    custom_scheme: Option<String>,
    current_url: Option<String>,
    has_document: bool,
    pending_scripts: VecDeque<String>,
}

impl<S: BrowserSurface> SurfaceEntry<S> {
    fn info(&self) -> SurfaceInfo {
        SurfaceInfo {
            owner: self.owner.clone(),
            navigation: self.navigation,
            visible: self.visible,
            frame: self.frame,
            custom_scheme: self.custom_scheme.clone(),
            current_url: self.current_url.clone(),
            pending_scripts: self.pending_scripts.len(),
        }
    }

    fn flush_scripts(&mut self) -> usize {
        let count = self.pending_scripts.len();
        for script in self.pending_scripts.drain(..) {
            self.surface.evaluate_script(&script);
        }
        count
    }

    fn intercepts(&self, url: &Url) -> bool {
        self.custom_scheme.as_deref() == Some(url.scheme())
    }
}

struct Surfaces<S> {
    arena: HandleArena<SurfaceEntry<S>>,
    config: WebViewConfig,
}

enum HostEvent {
    LoadFinished(String),
    Message(ScriptMessage),
    UrlChanged(String),
}

/// What `execute_javascript` did with a script
enum ScriptDisposition {
    Ran,
    Queued { dropped_oldest: bool },
    Dropped,
}

/// Host-facing embedded browser bridge
pub struct WebViewBridge<E: BrowserEngine> {
    engine: E,
    surfaces: Mutex<Surfaces<E::Surface>>,
    queue: EventQueue<(Handle, SurfaceEvent)>,
    on_load_finished: CallbackSlot<LoadFinishedCallback>,
    on_message: CallbackSlot<MessageCallback>,
    on_url_changed: CallbackSlot<UrlChangedCallback>,
}

impl<E: BrowserEngine> WebViewBridge<E> {
    /// Creates a bridge with default settings
    pub fn new(engine: E) -> Self {
        Self::with_config(engine, WebViewConfig::default())
    }

    /// Creates a bridge with explicit settings
    pub fn with_config(engine: E, config: WebViewConfig) -> Self {
        Self {
            engine,
            surfaces: Mutex::new(Surfaces {
                arena: HandleArena::new(),
                config,
            }),
            queue: EventQueue::new(),
            on_load_finished: CallbackSlot::new(),
            on_message: CallbackSlot::new(),
            on_url_changed: CallbackSlot::new(),
        }
    }

    /// The browser engine
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Replace the settings; applies to later calls on every surface
    pub fn set_config(&self, config: WebViewConfig) {
        self.lock().config = config;
    }

    fn lock(&self) -> MutexGuard<'_, Surfaces<E::Surface>> {
        self.surfaces.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `op` against a live surface, then deliver whatever it produced
    fn with_surface<T>(
        &self,
        handle: Handle,
        op: impl FnOnce(&mut SurfaceEntry<E::Surface>, &WebViewConfig) -> Result<T>,
    ) -> Result<T> {
        let result = {
            let mut surfaces = self.lock();
            let Surfaces { arena, config } = &mut *surfaces;
            match arena.get_mut(handle) {
                Some(entry) => op(entry, config),
                None => Err(BridgeError::InvalidHandle(handle)),
            }
        };
        self.dispatch_pending();
        result
    }

    /// Create a surface for the host object `owner`
    pub fn create(&self, owner: &str) -> Result<Handle> {
        if owner.is_empty() {
            return Err(BridgeError::EmptyArgument("owner name"));
        }

        let sender = self.queue.sender();
        let handle = self.lock().arena.try_insert_with(|handle| {
            let events = SurfaceEvents {
                handle,
                sender: sender.clone(),
            };
            let surface = self.engine.create_surface(owner, events)?;
            Ok(SurfaceEntry {
                owner: owner.to_string(),
                surface,
                navigation: NavigationState::Created,
                visible: false,
                frame: None,
                custom_scheme: None,
                current_url: None,
                has_document: false,
                pending_scripts: VecDeque::new(),
            })
        })?;

        log::info!("Created web view {handle} for '{owner}'");
        self.dispatch_pending();
        Ok(handle)
    }

    /// Destroy a surface; the handle is invalid afterwards
    pub fn destroy(&self, handle: Handle) -> Result<()> {
        let entry = self
            .lock()
            .arena
            .remove(handle)
            .ok_or(BridgeError::InvalidHandle(handle))?;

        if !entry.pending_scripts.is_empty() {
            log::debug!(
                "Discarding {} queued scripts for web view {handle}",
                entry.pending_scripts.len()
            );
        }
        entry.surface.close();
        log::info!("Destroyed web view {handle} ('{}')", entry.owner);
        self.dispatch_pending();
        Ok(())
    }

    /// Begin loading `url`; completion is reported through the load-finished callback
    pub fn load_url(&self, handle: Handle, url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(BridgeError::EmptyArgument("url"));
        }
        let parsed = Url::parse(url).map_err(|source| BridgeError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        self.with_surface(handle, |entry, _| {
            entry.navigation = NavigationState::Loading;
            entry.surface.load_url(&parsed);
            Ok(())
        })?;
        log::info!("Web view {handle} loading {parsed}");
        Ok(())
    }

    /// Make the surface visible
    pub fn show(&self, handle: Handle) -> Result<()> {
        self.set_visible(handle, true)
    }

    /// Hide the surface
    pub fn hide(&self, handle: Handle) -> Result<()> {
        self.set_visible(handle, false)
    }

    fn set_visible(&self, handle: Handle, visible: bool) -> Result<()> {
        self.with_surface(handle, |entry, _| {
            entry.visible = visible;
            entry.surface.set_visible(visible);
            Ok(())
        })
    }

    /// Move and resize the surface
    pub fn set_frame(&self, handle: Handle, x: f32, y: f32, width: f32, height: f32) -> Result<()> {
        let frame = Frame::new(x, y, width, height)?;
        self.with_surface(handle, |entry, _| {
            entry.frame = Some(frame);
            entry.surface.set_frame(frame);
            Ok(())
        })
    }

    /// Route navigations to `scheme` to the script-message callback
    ///
    /// Must be set before the page that uses it navigates.
    pub fn set_custom_url_scheme(&self, handle: Handle, scheme: &str) -> Result<()> {
        let scheme = normalize_scheme(scheme)?;
        self.with_surface(handle, |entry, _| {
            entry.surface.set_intercepted_scheme(&scheme);
            entry.custom_scheme = Some(scheme.clone());
            Ok(())
        })?;
        log::info!("Web view {handle} intercepting '{scheme}://'");
        Ok(())
    }

    /// Run script in the surface's page
    ///
    /// While a load is in flight (or before the first one) scripts are held
    /// and run in order once the page finishes loading, unless
    /// [`WebViewConfig::queue_scripts_until_loaded`] is off.
    pub fn execute_javascript(&self, handle: Handle, script: &str) -> Result<()> {
        if script.is_empty() {
            log::warn!("Ignoring empty script for web view {handle}");
            return self.with_surface(handle, |_, _| Ok(()));
        }

        let disposition = self.with_surface(handle, |entry, config| {
            let ready = entry.navigation == NavigationState::Loaded;
            if ready || !config.queue_scripts_until_loaded {
                entry.surface.evaluate_script(script);
                return Ok(ScriptDisposition::Ran);
            }

            if config.max_pending_scripts == 0 {
                return Ok(ScriptDisposition::Dropped);
            }
            let dropped_oldest = entry.pending_scripts.len() >= config.max_pending_scripts;
            if dropped_oldest {
                entry.pending_scripts.pop_front();
            }
            entry.pending_scripts.push_back(script.to_string());
            Ok(ScriptDisposition::Queued { dropped_oldest })
        })?;

        match disposition {
            ScriptDisposition::Ran => {}
            ScriptDisposition::Queued { dropped_oldest } => {
                if dropped_oldest {
                    log::warn!("Script queue full for web view {handle}, dropped oldest script");
                }
                log::debug!("Web view {handle} not loaded yet, queued script");
            }
            ScriptDisposition::Dropped => {
                log::warn!("Script queue disabled, dropped script for web view {handle}")
            }
        }
        Ok(())
    }

    /// Decide whether the engine may follow a navigation
    ///
    /// Navigations to the surface's custom scheme are refused and turned into
    /// a script message.
    pub fn should_navigate(&self, handle: Handle, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return true;
        };

        let intercepted = self
            .lock()
            .arena
            .get(handle)
            .is_some_and(|entry| entry.intercepts(&parsed));

        if intercepted {
            log::debug!("Web view {handle} intercepted {url}");
            self.queue.post((
                handle,
                SurfaceEvent::SchemeIntercepted {
                    url: url.to_string(),
                },
            ));
            self.dispatch_pending();
        }
        !intercepted
    }

    /// Post an event from outside the engine (e.g. a native delegate) and deliver it
    pub fn notify(&self, handle: Handle, event: SurfaceEvent) {
        self.queue.post((handle, event));
        self.dispatch_pending();
    }

    /// Deliver queued engine events to the host callbacks
    pub fn dispatch_pending(&self) -> usize {
        self.queue.drain(|(handle, event)| {
            match self.apply(handle, &event) {
                Some(scripts) => self.report(handle, event, scripts),
                None => log::debug!("Dropping {event:?} for destroyed web view {handle}"),
            }
        })
    }

    /// Update the surface record for `event`
    ///
    /// Returns `None` for a destroyed surface, otherwise the number of queued
    /// scripts the event ran or discarded. Nothing here may log: the host log
    /// sink is a callback and the lock is held.
    fn apply(&self, handle: Handle, event: &SurfaceEvent) -> Option<usize> {
        let mut surfaces = self.lock();
        let entry = surfaces.arena.get_mut(handle)?;

        let scripts = match event {
            SurfaceEvent::LoadStarted { .. } => {
                entry.navigation = NavigationState::Loading;
                0
            }
            SurfaceEvent::LoadFinished { url } => {
                entry.navigation = NavigationState::Loaded;
                entry.has_document = true;
                entry.current_url = Some(url.clone());
                entry.flush_scripts()
            }
            SurfaceEvent::LoadFailed { .. } => {
                // the previous document, if any, is still displayed
                entry.navigation = if entry.has_document {
                    NavigationState::Loaded
                } else {
                    NavigationState::Created
                };
                let discarded = entry.pending_scripts.len();
                entry.pending_scripts.clear();
                discarded
            }
            SurfaceEvent::UrlChanged { url } => {
                entry.current_url = Some(url.clone());
                0
            }
            SurfaceEvent::MessagePosted { .. } | SurfaceEvent::SchemeIntercepted { .. } => 0,
        };
        Some(scripts)
    }

    /// Log an applied event and forward it to the host
    fn report(&self, handle: Handle, event: SurfaceEvent, scripts: usize) {
        match event {
            SurfaceEvent::LoadStarted { url } => {
                log::debug!("Web view {handle} started loading {url}");
            }
            SurfaceEvent::LoadFinished { url } => {
                log::info!("Web view {handle} finished loading {url}");
                if scripts > 0 {
                    log::debug!("Web view {handle} ran {scripts} queued scripts");
                }
                self.emit(HostEvent::LoadFinished(url));
            }
            SurfaceEvent::LoadFailed { url, reason } => {
                log::warn!("Web view {handle} failed to load {url}: {reason}");
                if scripts > 0 {
                    log::warn!("Web view {handle} discarded {scripts} queued scripts");
                }
            }
            SurfaceEvent::UrlChanged { url } => self.emit(HostEvent::UrlChanged(url)),
            SurfaceEvent::MessagePosted { body } => {
                self.emit(HostEvent::Message(ScriptMessage::from_posted_body(&body)));
            }
            SurfaceEvent::SchemeIntercepted { url } => match Url::parse(&url) {
                Ok(parsed) => self.emit(HostEvent::Message(ScriptMessage::from_intercepted_url(
                    &parsed,
                ))),
                Err(err) => {
                    log::warn!("Web view {handle} intercepted unparseable URL {url}: {err}");
                }
            },
        }
    }

    fn emit(&self, event: HostEvent) {
        match event {
            HostEvent::LoadFinished(url) => match self.on_load_finished.get() {
                Some(callback) => callback(&url),
                None => log::debug!("No load-finished callback registered"),
            },
            HostEvent::Message(message) => match self.on_message.get() {
                Some(callback) => callback(&message.method, &message.data),
                None => log::warn!(
                    "No script-message callback registered, dropping '{}'",
                    message.method
                ),
            },
            HostEvent::UrlChanged(url) => match self.on_url_changed.get() {
                Some(callback) => callback(&url),
                None => log::debug!("No url-changed callback registered"),
            },
        }
    }

    /// Replace the load-finished listener
    pub fn set_on_load_finished(&self, callback: Option<Arc<LoadFinishedCallback>>) {
        self.on_load_finished.set(callback);
    }

    /// Replace the script-message listener
    pub fn set_on_message(&self, callback: Option<Arc<MessageCallback>>) {
        self.on_message.set(callback);
    }

    /// Replace the url-changed listener
    pub fn set_on_url_changed(&self, callback: Option<Arc<UrlChangedCallback>>) {
        self.on_url_changed.set(callback);
    }

    /// Snapshot of a live surface
    pub fn surface_info(&self, handle: Handle) -> Option<SurfaceInfo> {
        self.lock().arena.get(handle).map(SurfaceEntry::info)
    }

    /// Whether `handle` names a live surface
    pub fn contains(&self, handle: Handle) -> bool {
        self.lock().arena.contains(handle)
    }

    /// Number of live surfaces
    pub fn len(&self) -> usize {
        self.lock().arena.len()
    }

    /// Whether no surfaces are live
    pub fn is_empty(&self) -> bool {
        self.lock().arena.is_empty()
    }
}

/// Validate a URL scheme and fold it to lowercase
pub fn normalize_scheme(scheme: &str) -> Result<String> {
    let scheme = scheme.trim().trim_end_matches("://").trim_end_matches(':');
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !valid {
        return Err(BridgeError::InvalidScheme(scheme.to_string()));
    }
    Ok(scheme.to_ascii_lowercase())
}
