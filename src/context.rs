use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::config::BridgeConfig;
use crate::device::Device;
use crate::driver::{Driver, DriverDevice, read_borrowed};
use crate::error::{Error, Result};
use crate::logger;

/// The driver's manager, shared by the context and every session opened through it.
pub(crate) struct Manager {
    driver: Mutex<Box<dyn Driver>>,
}

impl Manager {
    fn driver(&self) -> MutexGuard<'_, Box<dyn Driver>> {
        self.driver.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Entry point: discovers and opens Kinect v2 devices.
///
/// Sessions keep the underlying driver manager alive, so a `Context` may be dropped
/// while devices opened through it are still in use.
pub struct Context {
    manager: Arc<Manager>,
    config: BridgeConfig,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// A context over the default driver with default settings.
    ///
    /// With the `native` feature the default driver is libfreenect2; without it, an
    /// empty [`VirtualDriver`](crate::VirtualDriver).
    pub fn new() -> Self {
        Self::with_config(BridgeConfig::default())
    }

    pub fn with_config(config: BridgeConfig) -> Self {
        #[cfg(feature = "native")]
        let driver = crate::driver::native::NativeDriver::new();
        #[cfg(not(feature = "native"))]
        let driver = crate::driver::virtual_device::VirtualDriver::new();
        Self::with_driver(driver, config)
    }

    /// A context over `driver`.
    ///
    /// Applies `config.log_level` to the process-wide default logger.
    pub fn with_driver<D: Driver>(driver: D, config: BridgeConfig) -> Self {
        logger::set_default_level(config.log_level);
        debug!(?config, "created context");
        Self {
            manager: Arc::new(Manager {
                driver: Mutex::new(Box::new(driver)),
            }),
            config,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Number of attached devices. Queries the bus every time.
    pub fn enumerate_devices(&self) -> usize {
        self.manager.driver().enumerate_devices()
    }

    /// Lend the serial number of device `index` to `f`.
    ///
    /// Call [`Context::enumerate_devices`] first. An unknown index yields empty bytes.
    pub fn with_device_serial_number<R>(&self, index: usize, f: impl FnOnce(&[u8]) -> R) -> R {
        let mut driver = self.manager.driver();
        read_borrowed(|sink| driver.device_serial_number(index, sink), f)
    }

    pub fn device_serial_number(&self, index: usize) -> Option<String> {
        self.with_device_serial_number(index, owned_serial)
    }

    pub fn with_default_device_serial_number<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let mut driver = self.manager.driver();
        read_borrowed(|sink| driver.default_device_serial_number(sink), f)
    }

    pub fn default_device_serial_number(&self) -> Option<String> {
        self.with_default_device_serial_number(owned_serial)
    }

    pub fn open_device(&self, index: usize) -> Result<Device> {
        let handle = self.manager.driver().open_device(index);
        self.session(handle, || format!("index {index}"))
    }

    pub fn open_device_by_serial(&self, serial: &str) -> Result<Device> {
        let handle = self.manager.driver().open_device_by_serial(serial);
        self.session(handle, || format!("serial {serial}"))
    }

    pub fn open_default_device(&self) -> Result<Device> {
        let handle = self.manager.driver().open_default_device();
        self.session(handle, || "the default device".to_string())
    }

    fn session(&self, handle: Option<Box<dyn DriverDevice>>, selector: impl FnOnce() -> String) -> Result<Device> {
        match handle {
            Some(handle) => Ok(Device::new(handle, Arc::clone(&self.manager), self.config)),
            None => Err(Error::DeviceNotFound(selector())),
        }
    }
}

fn owned_serial(bytes: &[u8]) -> Option<String> {
    (!bytes.is_empty()).then(|| String::from_utf8_lossy(bytes).into_owned())
}
