//! `log` backend that forwards records to the host
//!
//! The host registers a callback with `PassportNative_SetLogCallback` and
//! receives every enabled record as `(level, message)`. Without a callback,
//! records are discarded.

use log::{Level, LevelFilter, Log, Metadata, Record};
use std::sync::{Arc, Once};

use crate::CallbackSlot;

/// Host-side log sink
pub type LogCallback = dyn Fn(Level, &str) + Send + Sync;

/// Logger forwarding to a host callback
pub struct HostLogger {
    sink: CallbackSlot<LogCallback>,
}

impl HostLogger {
    /// Creates a logger with no sink attached
    pub const fn new() -> Self {
        Self {
            sink: CallbackSlot::new(),
        }
    }

    /// Replace the sink; `None` discards records
    pub fn set_sink(&self, sink: Option<Arc<LogCallback>>) {
        self.sink.set(sink);
    }

    fn format(record: &Record<'_>) -> String {
        format!("[{}] {}", record.target(), record.args())
    }
}

impl Default for HostLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Log for HostLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(sink) = self.sink.get() {
            sink(record.level(), &Self::format(record));
        }
    }

    fn flush(&self) {}
}

static LOGGER: HostLogger = HostLogger::new();
static INSTALL: Once = Once::new();

/// The process-wide logger
pub fn host_logger() -> &'static HostLogger {
    &LOGGER
}

/// Install the host logger as the `log` backend
///
/// Only the first call installs; later calls just adjust the level. If some
/// other backend was installed first it is left in place.
pub fn init(level: LevelFilter) {
    INSTALL.call_once(|| {
        // fails only when the embedding application installed its own logger
        let _ = log::set_logger(&LOGGER);
    });
    log::set_max_level(level);
}

/// Map a `log` level to the integer passed across the C boundary
///
/// 1 = error, 2 = warn, 3 = info, 4 = debug, 5 = trace
pub fn level_code(level: Level) -> i32 {
    level as usize as i32
}
