//! C ABI for callers outside Rust.
//!
//! Handles are opaque heap objects released with their `*_free` function. Strings are
//! lent to a callback for the duration of the call. Frames cross as [`Fn2Frame`]
//! values owning a heap buffer the receiver must pass to [`fn2_frame_free`] once.
//! Caller state given to a listener or logger is released through its release
//! function exactly once, when it is replaced, when its owner is freed, or right
//! away if the call that would have installed it fails.
//!
//! Null handles are tolerated everywhere and make the call a no-op that reports failure.

use std::os::raw::c_void;
use std::panic::{AssertUnwindSafe, catch_unwind};

pub use freenect2_sys::{Fn2BorrowedString, Fn2StringCallback};
use tracing::error;

use crate::config::BridgeConfig;
use crate::context::Context;
use crate::device::Device;
use crate::frame::{Frame, FrameFormat, FrameType};
use crate::listener::FrameHandler;
use crate::logger::{self, LogLevel, Logger};
use crate::params::{ColorCameraParams, DeviceConfig, IrCameraParams};

pub struct Fn2Context {
    context: Context,
}

impl Fn2Context {
    /// Hand a context built in Rust, for instance over a custom driver, to C.
    pub fn into_raw(context: Context) -> *mut Fn2Context {
        Box::into_raw(Box::new(Fn2Context { context }))
    }
}

pub struct Fn2Device {
    device: Device,
}

/// A frame owned by the receiver. `data` holds `data_len` bytes.
#[repr(C)]
#[derive(Debug)]
pub struct Fn2Frame {
    pub width: usize,
    pub height: usize,
    pub bytes_per_pixel: usize,
    pub data: *mut u8,
    pub data_len: usize,
    pub timestamp: u32,
    pub sequence: u32,
    pub exposure: f32,
    pub gain: f32,
    pub gamma: f32,
    pub status: u32,
    pub format: FrameFormat,
}

impl From<Frame> for Fn2Frame {
    fn from(frame: Frame) -> Self {
        let mut out = Fn2Frame {
            width: frame.width(),
            height: frame.height(),
            bytes_per_pixel: frame.bytes_per_pixel(),
            data: std::ptr::null_mut(),
            data_len: 0,
            timestamp: frame.timestamp(),
            sequence: frame.sequence(),
            exposure: frame.exposure(),
            gain: frame.gain(),
            gamma: frame.gamma(),
            status: frame.status(),
            format: frame.format(),
        };
        let data = frame.into_data();
        out.data_len = data.len();
        out.data = Box::into_raw(data) as *mut u8;
        out
    }
}

pub type Fn2FrameCallback = Option<unsafe extern "C" fn(user_data: *mut c_void, ty: FrameType, frame: Fn2Frame)>;

pub type Fn2ReleaseFn = Option<unsafe extern "C" fn(user_data: *mut c_void)>;

/// A caller-supplied logger. `level` returns a driver log level value (0 to 4).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Fn2LoggerVTable {
    pub level: Option<unsafe extern "C" fn(user_data: *mut c_void) -> u32>,
    pub log: Option<unsafe extern "C" fn(user_data: *mut c_void, level: LogLevel, message: Fn2BorrowedString)>,
    pub release: Fn2ReleaseFn,
}

struct ForeignHandler {
    callback: Fn2FrameCallback,
    user_data: *mut c_void,
    release: Fn2ReleaseFn,
}

// The caller promises its callback and user data may be used from the driver's threads.
unsafe impl Send for ForeignHandler {}

impl FrameHandler for ForeignHandler {
    fn on_frame(&mut self, frame: Frame, ty: FrameType) {
        if let Some(callback) = self.callback {
            unsafe { callback(self.user_data, ty, frame.into()) }
        }
    }
}

impl Drop for ForeignHandler {
    fn drop(&mut self) {
        if let Some(release) = self.release {
            unsafe { release(self.user_data) }
        }
    }
}

struct ForeignLogger {
    vtable: Fn2LoggerVTable,
    user_data: *mut c_void,
}

unsafe impl Send for ForeignLogger {}
unsafe impl Sync for ForeignLogger {}

impl Logger for ForeignLogger {
    fn level(&self) -> LogLevel {
        match self.vtable.level {
            Some(level) => LogLevel::try_from(unsafe { level(self.user_data) }).unwrap_or(LogLevel::Info),
            None => LogLevel::Info,
        }
    }

    fn log(&self, level: LogLevel, message: &str) {
        if let Some(log) = self.vtable.log {
            unsafe { log(self.user_data, level, borrowed(message.as_bytes())) }
        }
    }
}

impl Drop for ForeignLogger {
    fn drop(&mut self) {
        if let Some(release) = self.vtable.release {
            unsafe { release(self.user_data) }
        }
    }
}

fn borrowed(bytes: &[u8]) -> Fn2BorrowedString {
    Fn2BorrowedString {
        data: bytes.as_ptr(),
        len: bytes.len(),
    }
}

fn lend(callback: Fn2StringCallback, user_data: *mut c_void, bytes: &[u8]) {
    if let Some(callback) = callback {
        unsafe { callback(user_data, borrowed(bytes)) }
    }
}

/// # Safety
///
/// `s.data` must be null or point at `s.len` readable bytes.
unsafe fn borrowed_str<'a>(s: Fn2BorrowedString) -> Option<&'a str> {
    if s.data.is_null() {
        return None;
    }
    let bytes = unsafe { std::slice::from_raw_parts(s.data, s.len) };
    std::str::from_utf8(bytes).ok()
}

/// Run `f`, turning a panic into `fallback`.
fn guard<T>(fallback: T, f: impl FnOnce() -> T) -> T {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            error!("panic caught at the C boundary");
            fallback
        }
    }
}

fn index_arg(index: i32) -> Option<usize> {
    usize::try_from(index).ok()
}

fn open(result: crate::Result<Device>) -> *mut Fn2Device {
    match result {
        Ok(device) => Box::into_raw(Box::new(Fn2Device { device })),
        Err(_) => std::ptr::null_mut(),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn fn2_context_new() -> *mut Fn2Context {
    guard(std::ptr::null_mut(), || Fn2Context::into_raw(Context::new()))
}

/// Create a context from a JSON [`BridgeConfig`]. Returns null if the JSON is invalid.
///
/// # Safety
///
/// `config` must point at `len` readable bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fn2_context_new_with_config(config: Fn2BorrowedString) -> *mut Fn2Context {
    guard(std::ptr::null_mut(), || {
        let Some(json) = (unsafe { borrowed_str(config) }) else {
            error!("context configuration is not UTF-8");
            return std::ptr::null_mut();
        };
        match BridgeConfig::from_json(json) {
            Ok(config) => Fn2Context::into_raw(Context::with_config(config)),
            Err(err) => {
                error!(error = %err, "rejected context configuration");
                std::ptr::null_mut()
            }
        }
    })
}

/// # Safety
///
/// `ctx` must be null or a live context.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fn2_context_enumerate_devices(ctx: *const Fn2Context) -> i32 {
    let Some(ctx) = (unsafe { ctx.as_ref() }) else {
        return 0;
    };
    guard(0, || i32::try_from(ctx.context.enumerate_devices()).unwrap_or(i32::MAX))
}

/// # Safety
///
/// `ctx` must be null or a live context.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fn2_context_get_device_serial_number(
    ctx: *const Fn2Context,
    index: i32,
    callback: Fn2StringCallback,
    user_data: *mut c_void,
) -> bool {
    let (Some(ctx), Some(index)) = (unsafe { ctx.as_ref() }, index_arg(index)) else {
        return false;
    };
    guard(false, || {
        ctx.context
            .with_device_serial_number(index, |serial| lend(callback, user_data, serial));
        true
    })
}

/// # Safety
///
/// `ctx` must be null or a live context.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fn2_context_get_default_device_serial_number(
    ctx: *const Fn2Context,
    callback: Fn2StringCallback,
    user_data: *mut c_void,
) -> bool {
    let Some(ctx) = (unsafe { ctx.as_ref() }) else {
        return false;
    };
    guard(false, || {
        ctx.context
            .with_default_device_serial_number(|serial| lend(callback, user_data, serial));
        true
    })
}

/// Returns null if no device has that index.
///
/// # Safety
///
/// `ctx` must be null or a live context.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fn2_context_open_device(ctx: *const Fn2Context, index: i32) -> *mut Fn2Device {
    let (Some(ctx), Some(index)) = (unsafe { ctx.as_ref() }, index_arg(index)) else {
        return std::ptr::null_mut();
    };
    guard(std::ptr::null_mut(), || open(ctx.context.open_device(index)))
}

/// Returns null if no device has that serial number.
///
/// # Safety
///
/// `ctx` must be null or a live context, and `serial` must point at `len` readable bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fn2_context_open_device_by_serial(
    ctx: *const Fn2Context,
    serial: Fn2BorrowedString,
) -> *mut Fn2Device {
    let (Some(ctx), Some(serial)) = (unsafe { ctx.as_ref() }, unsafe { borrowed_str(serial) }) else {
        return std::ptr::null_mut();
    };
    guard(std::ptr::null_mut(), || open(ctx.context.open_device_by_serial(serial)))
}

/// # Safety
///
/// `ctx` must be null or a live context.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fn2_context_open_default_device(ctx: *const Fn2Context) -> *mut Fn2Device {
    let Some(ctx) = (unsafe { ctx.as_ref() }) else {
        return std::ptr::null_mut();
    };
    guard(std::ptr::null_mut(), || open(ctx.context.open_default_device()))
}

/// Free a context. Devices opened through it must be freed first.
///
/// # Safety
///
/// `ctx` must be null or a context not yet freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fn2_context_free(ctx: *mut Fn2Context) {
    if !ctx.is_null() {
        drop(unsafe { Box::from_raw(ctx) });
    }
}

/// # Safety
///
/// `dev` must be null or a live device.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fn2_device_get_serial_number(
    dev: *const Fn2Device,
    callback: Fn2StringCallback,
    user_data: *mut c_void,
) -> bool {
    let Some(dev) = (unsafe { dev.as_ref() }) else {
        return false;
    };
    guard(false, || {
        dev.device
            .with_serial_number(|serial| lend(callback, user_data, serial))
            .is_ok()
    })
}

/// # Safety
///
/// `dev` must be null or a live device.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fn2_device_get_firmware_version(
    dev: *const Fn2Device,
    callback: Fn2StringCallback,
    user_data: *mut c_void,
) -> bool {
    let Some(dev) = (unsafe { dev.as_ref() }) else {
        return false;
    };
    guard(false, || {
        dev.device
            .with_firmware_version(|version| lend(callback, user_data, version))
            .is_ok()
    })
}

/// # Safety
///
/// `dev` must be null or a live device, and `out` must be null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fn2_device_get_color_camera_params(
    dev: *const Fn2Device,
    out: *mut ColorCameraParams,
) -> bool {
    let (Some(dev), Some(out)) = (unsafe { dev.as_ref() }, unsafe { out.as_mut() }) else {
        return false;
    };
    guard(false, || match dev.device.color_camera_params() {
        Ok(params) => {
            *out = params;
            true
        }
        Err(_) => false,
    })
}

/// # Safety
///
/// `dev` must be null or a live device, and `out` must be null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fn2_device_get_ir_camera_params(dev: *const Fn2Device, out: *mut IrCameraParams) -> bool {
    let (Some(dev), Some(out)) = (unsafe { dev.as_ref() }, unsafe { out.as_mut() }) else {
        return false;
    };
    guard(false, || match dev.device.ir_camera_params() {
        Ok(params) => {
            *out = params;
            true
        }
        Err(_) => false,
    })
}

/// # Safety
///
/// `dev` must be null or a live device.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fn2_device_set_color_camera_params(dev: *mut Fn2Device, params: ColorCameraParams) -> bool {
    let Some(dev) = (unsafe { dev.as_mut() }) else {
        return false;
    };
    guard(false, || dev.device.set_color_camera_params(params).is_ok())
}

/// # Safety
///
/// `dev` must be null or a live device.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fn2_device_set_ir_camera_params(dev: *mut Fn2Device, params: IrCameraParams) -> bool {
    let Some(dev) = (unsafe { dev.as_mut() }) else {
        return false;
    };
    guard(false, || dev.device.set_ir_camera_params(params).is_ok())
}

/// # Safety
///
/// `dev` must be null or a live device.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fn2_device_set_config(dev: *mut Fn2Device, config: DeviceConfig) -> bool {
    let Some(dev) = (unsafe { dev.as_mut() }) else {
        return false;
    };
    guard(false, || dev.device.set_config(config).is_ok())
}

/// Install `callback` for every stream. `release` runs on `user_data` exactly once:
/// when the listener is replaced, when the device is freed, or before this function
/// returns false.
///
/// `callback` runs on a driver thread and must not call back into this device.
///
/// # Safety
///
/// `dev` must be null or a live device. `callback`, `release`, and `user_data` must be
/// usable from any thread.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fn2_device_set_frame_listener(
    dev: *mut Fn2Device,
    callback: Fn2FrameCallback,
    user_data: *mut c_void,
    release: Fn2ReleaseFn,
) -> bool {
    let handler = Box::new(ForeignHandler {
        callback,
        user_data,
        release,
    });
    let Some(dev) = (unsafe { dev.as_mut() }) else {
        return false;
    };
    guard(false, || dev.device.set_frame_handler(handler).is_ok())
}

/// # Safety
///
/// `dev` must be null or a live device.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fn2_device_start(dev: *mut Fn2Device) -> bool {
    let Some(dev) = (unsafe { dev.as_mut() }) else {
        return false;
    };
    guard(false, || dev.device.start().is_ok())
}

/// # Safety
///
/// `dev` must be null or a live device.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fn2_device_start_streams(dev: *mut Fn2Device, rgb: bool, depth: bool) -> bool {
    let Some(dev) = (unsafe { dev.as_mut() }) else {
        return false;
    };
    guard(false, || dev.device.start_streams(rgb, depth).is_ok())
}

/// # Safety
///
/// `dev` must be null or a live device.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fn2_device_stop(dev: *mut Fn2Device) -> bool {
    let Some(dev) = (unsafe { dev.as_mut() }) else {
        return false;
    };
    guard(false, || dev.device.stop().is_ok())
}

/// # Safety
///
/// `dev` must be null or a live device.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fn2_device_close(dev: *mut Fn2Device) -> bool {
    let Some(dev) = (unsafe { dev.as_mut() }) else {
        return false;
    };
    guard(false, || dev.device.close().is_ok())
}

/// Free a device in any state, releasing its listener's user data first.
///
/// # Safety
///
/// `dev` must be null or a device not yet freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fn2_device_free(dev: *mut Fn2Device) {
    if !dev.is_null() {
        let dev = unsafe { Box::from_raw(dev) };
        guard((), move || drop(dev));
    }
}

/// Free a frame's buffer and null it out, so a second call is harmless.
///
/// # Safety
///
/// `frame` must be null or point at a frame received from a listener callback.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fn2_frame_free(frame: *mut Fn2Frame) {
    let Some(frame) = (unsafe { frame.as_mut() }) else {
        return;
    };
    if frame.data.is_null() {
        return;
    }
    let data = std::ptr::slice_from_raw_parts_mut(frame.data, frame.data_len);
    drop(unsafe { Box::from_raw(data) });
    frame.data = std::ptr::null_mut();
    frame.data_len = 0;
}

/// Install a process-wide logger for driver messages, releasing the previous one.
///
/// A vtable without `log` restores the default logger and releases `user_data` at once.
///
/// # Safety
///
/// The vtable functions and `user_data` must be usable from any thread until `release` runs.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fn2_set_logger(vtable: Fn2LoggerVTable, user_data: *mut c_void) {
    let foreign = ForeignLogger { vtable, user_data };
    guard((), move || {
        if vtable.log.is_none() {
            drop(foreign);
            logger::reset_logger();
        } else {
            logger::set_logger(foreign);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_buffers_round_trip_through_free() {
        let payload = [1u8, 2, 3, 4];
        let raw = crate::frame::RawFrame::new(1, 1, 4, freenect2_sys::Fn2FrameFormat_RGBX, &payload).unwrap();
        let frame = Frame::copy_from(&raw, Default::default()).unwrap();
        let mut out = Fn2Frame::from(frame);
        assert_eq!(out.data_len, 4);
        assert_eq!(out.format, FrameFormat::Rgbx);
        assert_eq!(unsafe { std::slice::from_raw_parts(out.data, out.data_len) }, &payload);
        unsafe { fn2_frame_free(&mut out) };
        assert!(out.data.is_null());
        unsafe { fn2_frame_free(&mut out) };
        unsafe { fn2_frame_free(std::ptr::null_mut()) };
    }

    #[test]
    fn null_handles_are_tolerated() {
        unsafe {
            assert_eq!(fn2_context_enumerate_devices(std::ptr::null()), 0);
            assert!(fn2_context_open_default_device(std::ptr::null()).is_null());
            assert!(!fn2_device_start(std::ptr::null_mut()));
            assert!(!fn2_device_stop(std::ptr::null_mut()));
            assert!(!fn2_device_close(std::ptr::null_mut()));
            fn2_device_free(std::ptr::null_mut());
            fn2_context_free(std::ptr::null_mut());
        }
    }

    #[test]
    fn bad_config_json_yields_null() {
        let json = b"{\"float_format_tagging\":\"sideways\"}";
        let ctx = unsafe { fn2_context_new_with_config(borrowed(json)) };
        assert!(ctx.is_null());
    }
}
