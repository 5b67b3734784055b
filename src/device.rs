use std::sync::Arc;

use tracing::debug;

use crate::config::BridgeConfig;
use crate::context::Manager;
use crate::driver::{DriverDevice, read_borrowed};
use crate::error::{Error, Result};
use crate::frame::{Frame, FrameType};
use crate::listener::{FrameHandler, ListenerBridge};
use crate::params::{ColorCameraParams, DeviceConfig, IrCameraParams};

/// Where a [`Device`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Opened,
    ListenerSet,
    Started,
    Stopped,
    /// Terminal. Only dropping the session is valid.
    Closed,
}

/// One opened Kinect v2.
///
/// The session exclusively owns the driver handle and, once a listener is set, the
/// listener bridge. Dropping it releases the installed frame handler first and the
/// driver handle second, whatever the stream state.
pub struct Device {
    handle: Option<Box<dyn DriverDevice>>,
    bridge: Option<Arc<ListenerBridge>>,
    state: SessionState,
    config: BridgeConfig,
    label: String,
    _manager: Arc<Manager>,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("device", &self.label)
            .field("state", &self.state)
            .field("bridge", &self.bridge)
            .finish()
    }
}

impl Device {
    pub(crate) fn new(handle: Box<dyn DriverDevice>, manager: Arc<Manager>, config: BridgeConfig) -> Self {
        let label = read_borrowed(|sink| handle.serial_number(sink), |s| String::from_utf8_lossy(s).into_owned());
        debug!(device = %label, "opened device session");
        Self {
            handle: Some(handle),
            bridge: None,
            state: SessionState::Opened,
            config,
            label,
            _manager: manager,
        }
    }

    fn handle(&self) -> Result<&dyn DriverDevice> {
        match (&self.handle, self.state) {
            (Some(handle), state) if state != SessionState::Closed => Ok(&**handle),
            _ => Err(Error::SessionClosed),
        }
    }

    fn handle_mut(&mut self) -> Result<&mut (dyn DriverDevice + 'static)> {
        if self.state == SessionState::Closed {
            return Err(Error::SessionClosed);
        }
        self.handle.as_deref_mut().ok_or(Error::SessionClosed)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_started(&self) -> bool {
        self.state == SessionState::Started
    }

    pub fn has_listener(&self) -> bool {
        self.bridge.as_ref().is_some_and(|bridge| bridge.is_installed())
    }

    /// Lend the serial number to `f` for the duration of the call.
    pub fn with_serial_number<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        let handle = self.handle()?;
        Ok(read_borrowed(|sink| handle.serial_number(sink), f))
    }

    pub fn serial_number(&self) -> Result<String> {
        self.with_serial_number(|s| String::from_utf8_lossy(s).into_owned())
    }

    /// Lend the firmware version to `f` for the duration of the call.
    pub fn with_firmware_version<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        let handle = self.handle()?;
        Ok(read_borrowed(|sink| handle.firmware_version(sink), f))
    }

    pub fn firmware_version(&self) -> Result<String> {
        self.with_firmware_version(|s| String::from_utf8_lossy(s).into_owned())
    }

    pub fn color_camera_params(&self) -> Result<ColorCameraParams> {
        Ok(self.handle()?.color_camera_params().into())
    }

    /// Replace the color calibration used by the driver's registration step.
    pub fn set_color_camera_params(&mut self, params: ColorCameraParams) -> Result<()> {
        self.handle_mut()?.set_color_camera_params(params.into());
        Ok(())
    }

    pub fn ir_camera_params(&self) -> Result<IrCameraParams> {
        Ok(self.handle()?.ir_camera_params().into())
    }

    pub fn set_ir_camera_params(&mut self, params: IrCameraParams) -> Result<()> {
        self.handle_mut()?.set_ir_camera_params(params.into());
        Ok(())
    }

    /// Replace the depth range and filter toggles at once.
    pub fn set_config(&mut self, config: DeviceConfig) -> Result<()> {
        self.handle_mut()?.set_configuration(config.into());
        Ok(())
    }

    /// Deliver every color, IR, and depth frame to `listener`.
    ///
    /// See [`Device::set_frame_handler`].
    pub fn set_frame_listener<F>(&mut self, listener: F) -> Result<()>
    where
        F: FnMut(Frame, FrameType) + Send + 'static,
    {
        self.set_frame_handler(Box::new(listener))
    }

    /// Install `handler` for all streams, replacing the previous one.
    ///
    /// Valid in every state but [`SessionState::Closed`], including while streaming.
    /// The first call registers the listener bridge with the driver; later calls swap
    /// the handler in place and drop the previous one. Must not be called from
    /// inside a handler.
    pub fn set_frame_handler(&mut self, handler: Box<dyn FrameHandler>) -> Result<()> {
        if self.state == SessionState::Closed {
            return Err(Error::SessionClosed);
        }
        match self.bridge.clone() {
            Some(bridge) => {
                bridge.replace(handler);
                debug!(device = %self.label, "replaced frame handler");
            }
            None => {
                let bridge = Arc::new(ListenerBridge::new(self.config.float_format_tagging));
                bridge.replace(handler);
                self.handle_mut()?.attach_listener(Arc::clone(&bridge));
                self.bridge = Some(bridge);
                debug!(device = %self.label, "attached listener bridge");
            }
        }
        if self.state == SessionState::Opened {
            self.state = SessionState::ListenerSet;
        }
        Ok(())
    }

    /// Start the color and depth streams.
    pub fn start(&mut self) -> Result<()> {
        self.start_with(|handle| handle.start())
    }

    /// Start only the selected streams.
    pub fn start_streams(&mut self, rgb: bool, depth: bool) -> Result<()> {
        self.start_with(|handle| handle.start_streams(rgb, depth))
    }

    fn start_with(&mut self, start: impl FnOnce(&mut dyn DriverDevice) -> bool) -> Result<()> {
        if self.state == SessionState::Started {
            return Err(Error::StreamsRunning);
        }
        if !start(self.handle_mut()?) {
            return Err(Error::DriverRefused("start streams"));
        }
        self.state = SessionState::Started;
        debug!(device = %self.label, "streams started");
        Ok(())
    }

    /// Halt streaming. The listener and the handle stay in place.
    ///
    /// A no-op when streams are not running.
    pub fn stop(&mut self) -> Result<()> {
        match self.state {
            SessionState::Closed => Err(Error::SessionClosed),
            SessionState::Started => {
                if !self.handle_mut()?.stop() {
                    return Err(Error::DriverRefused("stop streams"));
                }
                self.state = SessionState::Stopped;
                debug!(device = %self.label, "streams stopped");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Release device-level resources. Streams are stopped by the driver if running.
    pub fn close(&mut self) -> Result<()> {
        if !self.handle_mut()?.close() {
            return Err(Error::DriverRefused("close device"));
        }
        self.state = SessionState::Closed;
        debug!(device = %self.label, "device closed");
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Some(bridge) = &self.bridge {
            bridge.clear();
        }
        drop(self.handle.take());
        debug!(device = %self.label, "device session released");
    }
}
