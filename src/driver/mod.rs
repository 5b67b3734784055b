//! The seam between the boundary layer and the driver that actually talks to hardware.
//!
//! [`Driver`] is the process-wide manager (libfreenect2's `Freenect2`), [`DriverDevice`]
//! one opened handle (`Freenect2Device`). Both speak the driver-native types from
//! `freenect2-sys`; conversion to the caller's types happens in [`crate::params`] and
//! [`crate::frame`].

use std::sync::Arc;

use freenect2_sys as sys;

use crate::listener::ListenerBridge;

#[cfg(feature = "native")]
pub mod native;
pub mod virtual_device;

/// Device discovery and opening.
pub trait Driver: Send + 'static {
    /// Re-scan the bus and return how many devices are attached.
    fn enumerate_devices(&mut self) -> usize;

    /// Hand the serial number of device `index` to `sink`. An unknown index yields empty bytes.
    fn device_serial_number(&mut self, index: usize, sink: &mut dyn FnMut(&[u8]));

    /// Hand the serial number of the default device to `sink`, empty when none is attached.
    fn default_device_serial_number(&mut self, sink: &mut dyn FnMut(&[u8]));

    fn open_device(&mut self, index: usize) -> Option<Box<dyn DriverDevice>>;

    fn open_device_by_serial(&mut self, serial: &str) -> Option<Box<dyn DriverDevice>>;

    fn open_default_device(&mut self) -> Option<Box<dyn DriverDevice>>;
}

/// One opened device. Dropping it must stop any capture thread before returning.
pub trait DriverDevice: Send {
    fn serial_number(&self, sink: &mut dyn FnMut(&[u8]));

    fn firmware_version(&self, sink: &mut dyn FnMut(&[u8]));

    fn color_camera_params(&self) -> sys::Fn2ColorCameraParams;

    fn set_color_camera_params(&mut self, params: sys::Fn2ColorCameraParams);

    fn ir_camera_params(&self) -> sys::Fn2IrCameraParams;

    fn set_ir_camera_params(&mut self, params: sys::Fn2IrCameraParams);

    fn set_configuration(&mut self, config: sys::Fn2DeviceConfig);

    /// Register `bridge` for the color and the IR/depth streams. Called at most once per device.
    fn attach_listener(&mut self, bridge: Arc<ListenerBridge>);

    fn start(&mut self) -> bool;

    fn start_streams(&mut self, rgb: bool, depth: bool) -> bool;

    fn stop(&mut self) -> bool;

    fn close(&mut self) -> bool;
}

/// Run `consume` on bytes the driver lends to a sink for the duration of `fetch`.
///
/// If the driver never calls the sink, `consume` sees an empty slice.
pub(crate) fn read_borrowed<R>(
    fetch: impl FnOnce(&mut dyn FnMut(&[u8])),
    consume: impl FnOnce(&[u8]) -> R,
) -> R {
    let mut consume = Some(consume);
    let mut out = None;
    fetch(&mut |bytes: &[u8]| {
        if let Some(consume) = consume.take() {
            out = Some(consume(bytes));
        }
    });
    match (out, consume) {
        (Some(value), _) => value,
        (None, Some(consume)) => consume(&[]),
        (None, None) => unreachable!("borrowed string consumer ran without producing a value"),
    }
}
