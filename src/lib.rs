//! # freenect2
//!
//! Session and streaming layer for Kinect v2 devices driven by libfreenect2.
//!
//! A [`Context`] discovers and opens devices. Each [`Device`] owns its driver handle
//! and a listener bridge that copies every frame out of driver memory and hands it
//! to the caller's handler on the driver's capture thread. The [`ffi`] module exposes
//! the same surface as a C ABI.
//!
//! Without the `native` feature only the in-process [`VirtualDriver`] is available.

pub mod config;
pub mod context;
pub mod device;
pub mod driver;
pub mod error;
pub mod ffi;
pub mod frame;
pub mod listener;
pub mod logger;
pub mod params;

pub use freenect2_sys as bindings;

pub use crate::config::{BridgeConfig, FloatFormatTagging};
pub use crate::context::Context;
pub use crate::device::{Device, SessionState};
pub use crate::driver::virtual_device::{VirtualDeviceHandle, VirtualDeviceSpec, VirtualDriver};
pub use crate::driver::{Driver, DriverDevice};
pub use crate::error::{Error, Result};
pub use crate::frame::{Frame, FrameFormat, FrameType, RawFrame};
pub use crate::listener::{FrameHandler, ListenerBridge};
pub use crate::logger::{LogLevel, Logger, TracingLogger, reset_logger, set_logger, set_shared_logger};
pub use crate::params::{ColorCameraParams, DeviceConfig, IrCameraParams};

#[cfg(feature = "native")]
pub use crate::driver::native::NativeDriver;
