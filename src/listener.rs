//! Bridge from the driver's "new frame" notification to the caller's callback.
//!
//! The driver registers one [`ListenerBridge`] for all streams and calls
//! [`ListenerBridge::on_new_frame`] from its capture threads. The bridge copies the
//! frame out of driver memory, tags it with its stream, and hands it to whichever
//! handler is installed at that moment. Handlers are swapped in place, so a running
//! stream keeps delivering without re-registering anything with the driver.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use freenect2_sys as sys;
use tracing::{debug, warn};

use crate::config::FloatFormatTagging;
use crate::frame::{Frame, FrameType, RawFrame};

/// Receives every frame a device delivers, on the driver's capture thread.
///
/// Dropping the handler is its release; the bridge drops it exactly once, when it is
/// replaced or when the session goes away.
pub trait FrameHandler: Send + 'static {
    fn on_frame(&mut self, frame: Frame, ty: FrameType);
}

impl<F> FrameHandler for F
where
    F: FnMut(Frame, FrameType) + Send + 'static,
{
    fn on_frame(&mut self, frame: Frame, ty: FrameType) {
        self(frame, ty)
    }
}

pub struct ListenerBridge {
    handler: Mutex<Option<Box<dyn FrameHandler>>>,
    tagging: FloatFormatTagging,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl std::fmt::Debug for ListenerBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerBridge")
            .field("installed", &self.is_installed())
            .field("tagging", &self.tagging)
            .field("delivered", &self.delivered_frames())
            .field("dropped", &self.dropped_frames())
            .finish()
    }
}

impl ListenerBridge {
    pub fn new(tagging: FloatFormatTagging) -> Self {
        Self {
            handler: Mutex::new(None),
            tagging,
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Install `handler`, returning whether one was replaced.
    ///
    /// Waits for a notification in flight. The previous handler is dropped after the
    /// swap, outside the lock. Must not be called from inside a handler.
    pub fn replace(&self, handler: Box<dyn FrameHandler>) -> bool {
        let previous = {
            let mut slot = self.handler.lock().unwrap_or_else(|e| e.into_inner());
            slot.replace(handler)
        };
        let replaced = previous.is_some();
        drop(previous);
        replaced
    }

    /// Drop the installed handler, if any. Later notifications are discarded.
    pub fn clear(&self) {
        let previous = self.handler.lock().unwrap_or_else(|e| e.into_inner()).take();
        drop(previous);
    }

    pub fn is_installed(&self) -> bool {
        self.handler.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    pub fn delivered_frames(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// The driver's notification entry point.
    ///
    /// Copies `frame` before returning and always reports it as not retained, so the
    /// driver may recycle its buffer immediately.
    pub fn on_new_frame(&self, ty: sys::Fn2FrameType, frame: &RawFrame<'_>) -> bool {
        let ty = match FrameType::try_from(ty) {
            Ok(ty) => ty,
            Err(err) => {
                warn!(error = %err, "dropping frame");
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        };
        let mut slot = self.handler.lock().unwrap_or_else(|e| e.into_inner());
        let Some(handler) = slot.as_mut() else {
            debug!(?ty, sequence = frame.as_sys().sequence, "no frame handler installed");
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        };
        let owned = match Frame::copy_from(frame, self.tagging) {
            Ok(owned) => owned,
            Err(err) => {
                warn!(error = %err, ?ty, "dropping frame");
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        };
        match catch_unwind(AssertUnwindSafe(|| handler.on_frame(owned, ty))) {
            Ok(()) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                warn!(?ty, "frame handler panicked");
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use super::*;

    struct Counted(Arc<AtomicUsize>);

    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn gray_frame(data: &[u8]) -> RawFrame<'_> {
        RawFrame::new(data.len(), 1, 1, sys::Fn2FrameFormat_Gray, data).unwrap()
    }

    #[test]
    fn notification_is_never_retained() {
        let bridge = ListenerBridge::new(FloatFormatTagging::Distinct);
        bridge.replace(Box::new(|_: Frame, _: FrameType| {}));
        assert!(!bridge.on_new_frame(sys::Fn2FrameType_Color, &gray_frame(&[1, 2, 3])));
        assert_eq!(bridge.delivered_frames(), 1);
    }

    #[test]
    fn frames_without_handler_are_dropped() {
        let bridge = ListenerBridge::new(FloatFormatTagging::Distinct);
        assert!(!bridge.on_new_frame(sys::Fn2FrameType_Ir, &gray_frame(&[0])));
        assert_eq!(bridge.dropped_frames(), 1);
    }

    #[test]
    fn frames_without_handler_are_not_copied() {
        let bridge = ListenerBridge::new(FloatFormatTagging::Distinct);
        // Claims a payload it does not carry; a copy would be rejected with a warning.
        let unbacked = sys::Fn2RawFrame {
            width: 4,
            height: 4,
            bytes_per_pixel: 4,
            data: std::ptr::null(),
            timestamp: 0,
            sequence: 9,
            exposure: 0.0,
            gain: 0.0,
            gamma: 0.0,
            status: 0,
            format: sys::Fn2FrameFormat_Float,
        };
        let raw = unsafe { RawFrame::from_sys(&unbacked) };
        assert!(!bridge.on_new_frame(sys::Fn2FrameType_Depth, &raw));
        assert_eq!(bridge.dropped_frames(), 1);

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        bridge.replace(Box::new(move |_: Frame, _: FrameType| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(!bridge.on_new_frame(sys::Fn2FrameType_Depth, &raw));
        assert_eq!(bridge.dropped_frames(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_handler_does_not_escape() {
        let bridge = ListenerBridge::new(FloatFormatTagging::Distinct);
        bridge.replace(Box::new(|_: Frame, _: FrameType| panic!("handler failure")));
        assert!(!bridge.on_new_frame(sys::Fn2FrameType_Depth, &gray_frame(&[0])));
        assert_eq!(bridge.dropped_frames(), 1);
        assert!(bridge.is_installed());
    }

    #[test]
    fn clear_releases_once() {
        let releases = Arc::new(AtomicUsize::new(0));
        let guard = Counted(Arc::clone(&releases));
        let bridge = ListenerBridge::new(FloatFormatTagging::Distinct);
        bridge.replace(Box::new(move |_: Frame, _: FrameType| {
            let _ = &guard;
        }));
        bridge.clear();
        bridge.clear();
        drop(bridge);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }
}
