//! Process-wide logger hook shared with the driver.
//!
//! The driver reports diagnostics through a single global logger that may be called
//! from any of its threads. [`set_logger`] installs a caller capability in that slot;
//! the previous logger is released when it is replaced. Until one is installed, driver
//! messages are forwarded to `tracing` under the `libfreenect2` target.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use freenect2_sys as sys;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Driver log levels, ordered from quietest to most verbose.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    None = 0,
    Error = 1,
    Warning = 2,
    Info = 3,
    Debug = 4,
}

impl LogLevel {
    pub fn as_tracing(self) -> Option<tracing::Level> {
        match self {
            LogLevel::None => None,
            LogLevel::Error => Some(tracing::Level::ERROR),
            LogLevel::Warning => Some(tracing::Level::WARN),
            LogLevel::Info => Some(tracing::Level::INFO),
            LogLevel::Debug => Some(tracing::Level::DEBUG),
        }
    }

    /// Whether a message at `self` passes a logger configured at `threshold`.
    pub fn enabled_at(self, threshold: LogLevel) -> bool {
        self != LogLevel::None && self <= threshold
    }
}

impl TryFrom<sys::Fn2LogLevel> for LogLevel {
    type Error = Error;

    fn try_from(raw: sys::Fn2LogLevel) -> Result<Self> {
        match raw {
            sys::Fn2LogLevel_None => Ok(LogLevel::None),
            sys::Fn2LogLevel_Error => Ok(LogLevel::Error),
            sys::Fn2LogLevel_Warning => Ok(LogLevel::Warning),
            sys::Fn2LogLevel_Info => Ok(LogLevel::Info),
            sys::Fn2LogLevel_Debug => Ok(LogLevel::Debug),
            other => Err(Error::UnknownLogLevel(other)),
        }
    }
}

impl From<LogLevel> for sys::Fn2LogLevel {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::None => sys::Fn2LogLevel_None,
            LogLevel::Error => sys::Fn2LogLevel_Error,
            LogLevel::Warning => sys::Fn2LogLevel_Warning,
            LogLevel::Info => sys::Fn2LogLevel_Info,
            LogLevel::Debug => sys::Fn2LogLevel_Debug,
        }
    }
}

/// A logging capability the driver can reach from any thread.
pub trait Logger: Send + Sync + 'static {
    /// The most verbose level this logger wants to receive.
    fn level(&self) -> LogLevel;
    fn log(&self, level: LogLevel, message: &str);
}

/// Forwards driver messages to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger {
    level: Option<LogLevel>,
}

impl TracingLogger {
    /// A logger with a fixed threshold, ignoring [`BridgeConfig::log_level`](crate::BridgeConfig).
    pub fn with_level(level: LogLevel) -> Self {
        Self { level: Some(level) }
    }
}

impl Logger for TracingLogger {
    fn level(&self) -> LogLevel {
        self.level.unwrap_or_else(default_level)
    }

    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Error => tracing::error!(target: "libfreenect2", "{message}"),
            LogLevel::Warning => tracing::warn!(target: "libfreenect2", "{message}"),
            LogLevel::Info => tracing::info!(target: "libfreenect2", "{message}"),
            LogLevel::Debug | LogLevel::None => tracing::debug!(target: "libfreenect2", "{message}"),
        }
    }
}

static GLOBAL: RwLock<Option<Arc<dyn Logger>>> = RwLock::new(None);
static DEFAULT_LEVEL: AtomicU32 = AtomicU32::new(LogLevel::Info as u32);

fn default_level() -> LogLevel {
    LogLevel::try_from(DEFAULT_LEVEL.load(Ordering::Relaxed)).unwrap_or(LogLevel::Info)
}

pub(crate) fn set_default_level(level: LogLevel) {
    DEFAULT_LEVEL.store(level as u32, Ordering::Relaxed);
}

/// Install `logger` as the process-wide driver logger, releasing the previous one.
pub fn set_logger<L: Logger>(logger: L) {
    set_shared_logger(Arc::new(logger));
}

/// Like [`set_logger`] for a logger the caller keeps a handle to.
pub fn set_shared_logger(logger: Arc<dyn Logger>) {
    let previous = {
        let mut slot = GLOBAL.write().unwrap_or_else(|e| e.into_inner());
        slot.replace(logger)
    };
    // Released outside the lock; a message in flight may still hold its own clone.
    drop(previous);
    install_native_hook();
}

/// Remove the installed logger and go back to the tracing default.
pub fn reset_logger() {
    let previous = GLOBAL.write().unwrap_or_else(|e| e.into_inner()).take();
    drop(previous);
}

fn current() -> Arc<dyn Logger> {
    let slot = GLOBAL.read().unwrap_or_else(|e| e.into_inner());
    match slot.as_ref() {
        Some(logger) => Arc::clone(logger),
        None => Arc::new(TracingLogger::default()),
    }
}

/// The level the installed logger asks for.
pub fn level() -> LogLevel {
    current().level()
}

/// Deliver a driver message, filtered the way libfreenect2 filters before calling its logger.
pub fn driver_log(level: LogLevel, message: &str) {
    let logger = current();
    if level.enabled_at(logger.level()) {
        logger.log(level, message);
    }
}

/// Point libfreenect2's global logger at this module. Idempotent.
#[cfg(feature = "native")]
pub(crate) fn install_native_hook() {
    use std::sync::Once;

    static HOOK: Once = Once::new();
    HOOK.call_once(|| unsafe {
        sys::fn2_shim_set_global_logger(
            sys::Fn2LoggerVTable {
                level: Some(native::level),
                log: Some(native::log),
                drop: Some(native::drop),
            },
            std::ptr::null_mut(),
        );
    });
}

#[cfg(not(feature = "native"))]
pub(crate) fn install_native_hook() {}

#[cfg(feature = "native")]
mod native {
    use std::os::raw::c_void;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use freenect2_sys as sys;

    use super::LogLevel;

    pub(super) unsafe extern "C" fn level(_this: *const c_void) -> sys::Fn2LogLevel {
        catch_unwind(super::level)
            .unwrap_or(LogLevel::Info)
            .into()
    }

    pub(super) unsafe extern "C" fn log(_this: *mut c_void, level: sys::Fn2LogLevel, message: sys::Fn2BorrowedString) {
        let bytes = if message.data.is_null() {
            &[][..]
        } else {
            unsafe { std::slice::from_raw_parts(message.data, message.len) }
        };
        let message = String::from_utf8_lossy(bytes);
        let level = LogLevel::try_from(level).unwrap_or(LogLevel::Debug);
        // The driver already filtered against `level()`.
        let _ = catch_unwind(AssertUnwindSafe(|| super::current().log(level, &message)));
    }

    // Loggers live in the Rust registry; the shim holds no state of its own.
    pub(super) unsafe extern "C" fn drop(_this: *mut c_void) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_map_one_to_one() {
        for level in [
            LogLevel::None,
            LogLevel::Error,
            LogLevel::Warning,
            LogLevel::Info,
            LogLevel::Debug,
        ] {
            let raw = sys::Fn2LogLevel::from(level);
            assert_eq!(LogLevel::try_from(raw).unwrap(), level);
        }
        assert_eq!(LogLevel::try_from(5).unwrap_err(), Error::UnknownLogLevel(5));
    }

    #[test]
    fn none_is_never_enabled() {
        assert!(!LogLevel::None.enabled_at(LogLevel::Debug));
        assert!(LogLevel::Error.enabled_at(LogLevel::Error));
        assert!(!LogLevel::Debug.enabled_at(LogLevel::Info));
    }
}
