//! libfreenect2 through the `freenect2-sys` shim.

use std::os::raw::c_void;
use std::ptr::NonNull;
use std::sync::Arc;

use freenect2_sys as sys;

use crate::frame::RawFrame;
use crate::listener::ListenerBridge;
use crate::logger;

use super::{Driver, DriverDevice};

unsafe extern "C" fn string_sink(user_data: *mut c_void, value: sys::Fn2BorrowedString) {
    let sink = unsafe { &mut *(user_data as *mut &mut dyn FnMut(&[u8])) };
    if value.data.is_null() {
        sink(&[]);
    } else {
        sink(unsafe { std::slice::from_raw_parts(value.data, value.len) });
    }
}

/// Pointer to pass as `user_data` alongside [`string_sink`].
fn sink_ptr(sink: &mut &mut dyn FnMut(&[u8])) -> *mut c_void {
    sink as *mut &mut dyn FnMut(&[u8]) as *mut c_void
}

unsafe extern "C" fn notify(ctx: *mut c_void, ty: sys::Fn2FrameType, frame: *const sys::Fn2RawFrame) -> bool {
    if ctx.is_null() || frame.is_null() {
        return false;
    }
    // `ctx` is the bridge the device keeps alive until after `fn2_shim_device_free`.
    let bridge = unsafe { &*(ctx as *const ListenerBridge) };
    let frame = unsafe { RawFrame::from_sys(&*frame) };
    bridge.on_new_frame(ty, &frame)
}

fn index_arg(index: usize) -> Option<i32> {
    i32::try_from(index).ok()
}

/// The libfreenect2 context.
pub struct NativeDriver {
    raw: NonNull<sys::Fn2ShimManager>,
}

// libfreenect2 confines its manager to the thread that uses it; the Context serializes access.
unsafe impl Send for NativeDriver {}

impl NativeDriver {
    pub fn new() -> Self {
        logger::install_native_hook();
        let raw = unsafe { sys::fn2_shim_manager_new() };
        match NonNull::new(raw) {
            Some(raw) => Self { raw },
            None => std::alloc::handle_alloc_error(std::alloc::Layout::new::<usize>()),
        }
    }

    fn wrap(raw: *mut sys::Fn2ShimDevice) -> Option<Box<dyn DriverDevice>> {
        NonNull::new(raw).map(|raw| Box::new(NativeDevice { raw, bridge: None }) as Box<dyn DriverDevice>)
    }
}

impl Default for NativeDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for NativeDriver {
    fn drop(&mut self) {
        unsafe { sys::fn2_shim_manager_free(self.raw.as_ptr()) }
    }
}

impl Driver for NativeDriver {
    fn enumerate_devices(&mut self) -> usize {
        let count = unsafe { sys::fn2_shim_manager_enumerate_devices(self.raw.as_ptr()) };
        usize::try_from(count).unwrap_or(0)
    }

    fn device_serial_number(&mut self, index: usize, mut sink: &mut dyn FnMut(&[u8])) {
        let Some(index) = index_arg(index) else {
            return sink(&[]);
        };
        unsafe {
            sys::fn2_shim_manager_device_serial_number(
                self.raw.as_ptr(),
                index,
                Some(string_sink),
                sink_ptr(&mut sink),
            )
        }
    }

    fn default_device_serial_number(&mut self, mut sink: &mut dyn FnMut(&[u8])) {
        unsafe {
            sys::fn2_shim_manager_default_device_serial_number(self.raw.as_ptr(), Some(string_sink), sink_ptr(&mut sink))
        }
    }

    fn open_device(&mut self, index: usize) -> Option<Box<dyn DriverDevice>> {
        let index = index_arg(index)?;
        Self::wrap(unsafe { sys::fn2_shim_manager_open_device(self.raw.as_ptr(), index) })
    }

    fn open_device_by_serial(&mut self, serial: &str) -> Option<Box<dyn DriverDevice>> {
        let serial = sys::Fn2BorrowedString {
            data: serial.as_ptr(),
            len: serial.len(),
        };
        Self::wrap(unsafe { sys::fn2_shim_manager_open_device_by_serial(self.raw.as_ptr(), serial) })
    }

    fn open_default_device(&mut self) -> Option<Box<dyn DriverDevice>> {
        Self::wrap(unsafe { sys::fn2_shim_manager_open_default_device(self.raw.as_ptr()) })
    }
}

struct NativeDevice {
    raw: NonNull<sys::Fn2ShimDevice>,
    // Outlives `raw`: the shim's listener points at it until the device is freed.
    bridge: Option<Arc<ListenerBridge>>,
}

unsafe impl Send for NativeDevice {}

impl DriverDevice for NativeDevice {
    fn serial_number(&self, mut sink: &mut dyn FnMut(&[u8])) {
        unsafe { sys::fn2_shim_device_serial_number(self.raw.as_ptr(), Some(string_sink), sink_ptr(&mut sink)) }
    }

    fn firmware_version(&self, mut sink: &mut dyn FnMut(&[u8])) {
        unsafe { sys::fn2_shim_device_firmware_version(self.raw.as_ptr(), Some(string_sink), sink_ptr(&mut sink)) }
    }

    fn color_camera_params(&self) -> sys::Fn2ColorCameraParams {
        unsafe { sys::fn2_shim_device_color_camera_params(self.raw.as_ptr()) }
    }

    fn set_color_camera_params(&mut self, params: sys::Fn2ColorCameraParams) {
        unsafe { sys::fn2_shim_device_set_color_camera_params(self.raw.as_ptr(), params) }
    }

    fn ir_camera_params(&self) -> sys::Fn2IrCameraParams {
        unsafe { sys::fn2_shim_device_ir_camera_params(self.raw.as_ptr()) }
    }

    fn set_ir_camera_params(&mut self, params: sys::Fn2IrCameraParams) {
        unsafe { sys::fn2_shim_device_set_ir_camera_params(self.raw.as_ptr(), params) }
    }

    fn set_configuration(&mut self, config: sys::Fn2DeviceConfig) {
        unsafe { sys::fn2_shim_device_set_config(self.raw.as_ptr(), config) }
    }

    fn attach_listener(&mut self, bridge: Arc<ListenerBridge>) {
        if self.bridge.is_some() {
            return;
        }
        let ctx = Arc::as_ptr(&bridge) as *mut c_void;
        self.bridge = Some(bridge);
        unsafe { sys::fn2_shim_device_attach_listener(self.raw.as_ptr(), Some(notify), ctx) }
    }

    fn start(&mut self) -> bool {
        unsafe { sys::fn2_shim_device_start(self.raw.as_ptr()) }
    }

    fn start_streams(&mut self, rgb: bool, depth: bool) -> bool {
        unsafe { sys::fn2_shim_device_start_streams(self.raw.as_ptr(), rgb, depth) }
    }

    fn stop(&mut self) -> bool {
        unsafe { sys::fn2_shim_device_stop(self.raw.as_ptr()) }
    }

    fn close(&mut self) -> bool {
        unsafe { sys::fn2_shim_device_close(self.raw.as_ptr()) }
    }
}

impl Drop for NativeDevice {
    fn drop(&mut self) {
        unsafe { sys::fn2_shim_device_free(self.raw.as_ptr()) }
        // `bridge` is released after this returns, once no notification can reach it.
    }
}
