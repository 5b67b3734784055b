//! # freenect2-sys
//!
//! Driver-native data types and the C ABI of the libfreenect2 shim in `wrapper/`.
//!
//! The plain-data types are always available so the safe crate can convert to and
//! from them without linking anything. The `extern` block is only declared with the
//! `native` feature, which also compiles the shim and links libfreenect2.

#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(non_upper_case_globals)]

use std::marker::{PhantomData, PhantomPinned};
use std::os::raw::c_void;

/// Bytes owned by the shim, valid only for the duration of the callback that received them.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Fn2BorrowedString {
    pub data: *const u8,
    pub len: usize,
}

pub type Fn2StringCallback = Option<unsafe extern "C" fn(user_data: *mut c_void, value: Fn2BorrowedString)>;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Fn2ColorCameraParams {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    pub shift_d: f32,
    pub shift_m: f32,
    pub mx_x3y0: f32,
    pub mx_x0y3: f32,
    pub mx_x2y1: f32,
    pub mx_x1y2: f32,
    pub mx_x2y0: f32,
    pub mx_x0y2: f32,
    pub mx_x1y1: f32,
    pub mx_x1y0: f32,
    pub mx_x0y1: f32,
    pub mx_x0y0: f32,
    pub my_x3y0: f32,
    pub my_x0y3: f32,
    pub my_x2y1: f32,
    pub my_x1y2: f32,
    pub my_x2y0: f32,
    pub my_x0y2: f32,
    pub my_x1y1: f32,
    pub my_x1y0: f32,
    pub my_x0y1: f32,
    pub my_x0y0: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Fn2IrCameraParams {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    pub k1: f32,
    pub k2: f32,
    pub k3: f32,
    pub p1: f32,
    pub p2: f32,
}

/// Mirrors `libfreenect2::Freenect2Device::Config`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Fn2DeviceConfig {
    pub MinDepth: f32,
    pub MaxDepth: f32,
    pub EnableBilateralFilter: bool,
    pub EnableEdgeAwareFilter: bool,
}

// `libfreenect2::Frame::Type`, passed through with the library's own values.
pub type Fn2FrameType = u32;
pub const Fn2FrameType_Color: Fn2FrameType = 1;
pub const Fn2FrameType_Ir: Fn2FrameType = 2;
pub const Fn2FrameType_Depth: Fn2FrameType = 4;

// `libfreenect2::Frame::Format`.
pub type Fn2FrameFormat = u32;
pub const Fn2FrameFormat_Invalid: Fn2FrameFormat = 0;
pub const Fn2FrameFormat_Raw: Fn2FrameFormat = 1;
pub const Fn2FrameFormat_Float: Fn2FrameFormat = 2;
pub const Fn2FrameFormat_BGRX: Fn2FrameFormat = 4;
pub const Fn2FrameFormat_RGBX: Fn2FrameFormat = 5;
pub const Fn2FrameFormat_Gray: Fn2FrameFormat = 6;

// `libfreenect2::Logger::Level`.
pub type Fn2LogLevel = u32;
pub const Fn2LogLevel_None: Fn2LogLevel = 0;
pub const Fn2LogLevel_Error: Fn2LogLevel = 1;
pub const Fn2LogLevel_Warning: Fn2LogLevel = 2;
pub const Fn2LogLevel_Info: Fn2LogLevel = 3;
pub const Fn2LogLevel_Debug: Fn2LogLevel = 4;

/// A view of a `libfreenect2::Frame` that is only valid while the notification runs.
///
/// `data` points at `bytes_per_pixel` bytes for `Raw` frames and at
/// `width * height * bytes_per_pixel` bytes otherwise.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Fn2RawFrame {
    pub width: usize,
    pub height: usize,
    pub bytes_per_pixel: usize,
    pub data: *const u8,
    pub timestamp: u32,
    pub sequence: u32,
    pub exposure: f32,
    pub gain: f32,
    pub gamma: f32,
    pub status: u32,
    pub format: Fn2FrameFormat,
}

/// Called from a libfreenect2 capture thread. The return value tells the driver
/// whether the frame was retained.
pub type Fn2FrameNotify =
    Option<unsafe extern "C" fn(ctx: *mut c_void, ty: Fn2FrameType, frame: *const Fn2RawFrame) -> bool>;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Fn2LoggerVTable {
    pub level: Option<unsafe extern "C" fn(this_: *const c_void) -> Fn2LogLevel>,
    pub log: Option<unsafe extern "C" fn(this_: *mut c_void, level: Fn2LogLevel, message: Fn2BorrowedString)>,
    pub drop: Option<unsafe extern "C" fn(this_: *mut c_void)>,
}

/// Opaque `libfreenect2::Freenect2` wrapper.
#[repr(C)]
pub struct Fn2ShimManager {
    _private: [u8; 0],
    _marker: PhantomData<(*mut u8, PhantomPinned)>,
}

/// Opaque `libfreenect2::Freenect2Device` wrapper.
#[repr(C)]
pub struct Fn2ShimDevice {
    _private: [u8; 0],
    _marker: PhantomData<(*mut u8, PhantomPinned)>,
}

#[cfg(feature = "native")]
unsafe extern "C" {
    pub fn fn2_shim_manager_new() -> *mut Fn2ShimManager;
    pub fn fn2_shim_manager_free(this_: *mut Fn2ShimManager);
    pub fn fn2_shim_manager_enumerate_devices(this_: *mut Fn2ShimManager) -> i32;
    pub fn fn2_shim_manager_device_serial_number(
        this_: *mut Fn2ShimManager,
        idx: i32,
        callback: Fn2StringCallback,
        user_data: *mut c_void,
    );
    pub fn fn2_shim_manager_default_device_serial_number(
        this_: *mut Fn2ShimManager,
        callback: Fn2StringCallback,
        user_data: *mut c_void,
    );
    pub fn fn2_shim_manager_open_device(this_: *mut Fn2ShimManager, idx: i32) -> *mut Fn2ShimDevice;
    pub fn fn2_shim_manager_open_device_by_serial(
        this_: *mut Fn2ShimManager,
        serial: Fn2BorrowedString,
    ) -> *mut Fn2ShimDevice;
    pub fn fn2_shim_manager_open_default_device(this_: *mut Fn2ShimManager) -> *mut Fn2ShimDevice;

    pub fn fn2_shim_device_serial_number(
        this_: *const Fn2ShimDevice,
        callback: Fn2StringCallback,
        user_data: *mut c_void,
    );
    pub fn fn2_shim_device_firmware_version(
        this_: *const Fn2ShimDevice,
        callback: Fn2StringCallback,
        user_data: *mut c_void,
    );
    pub fn fn2_shim_device_color_camera_params(this_: *const Fn2ShimDevice) -> Fn2ColorCameraParams;
    pub fn fn2_shim_device_ir_camera_params(this_: *const Fn2ShimDevice) -> Fn2IrCameraParams;
    pub fn fn2_shim_device_set_color_camera_params(this_: *mut Fn2ShimDevice, params: Fn2ColorCameraParams);
    pub fn fn2_shim_device_set_ir_camera_params(this_: *mut Fn2ShimDevice, params: Fn2IrCameraParams);
    pub fn fn2_shim_device_set_config(this_: *mut Fn2ShimDevice, config: Fn2DeviceConfig);
    /// Registers one listener for the color and the IR/depth streams. Only the first call has an effect.
    pub fn fn2_shim_device_attach_listener(this_: *mut Fn2ShimDevice, notify: Fn2FrameNotify, ctx: *mut c_void);
    pub fn fn2_shim_device_start(this_: *mut Fn2ShimDevice) -> bool;
    pub fn fn2_shim_device_start_streams(this_: *mut Fn2ShimDevice, rgb: bool, depth: bool) -> bool;
    pub fn fn2_shim_device_stop(this_: *mut Fn2ShimDevice) -> bool;
    pub fn fn2_shim_device_close(this_: *mut Fn2ShimDevice) -> bool;
    /// Destroys the driver device first, then the shim listener. No notification runs after this returns.
    pub fn fn2_shim_device_free(this_: *mut Fn2ShimDevice);

    /// Replaces libfreenect2's global logger; the previous one is deleted by the library.
    pub fn fn2_shim_set_global_logger(vtable: Fn2LoggerVTable, user_data: *mut c_void);
}
