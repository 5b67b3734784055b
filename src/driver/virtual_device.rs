//! In-process software driver with virtual Kinect v2 devices.
//!
//! Devices are attached to and detached from a [`VirtualDriver`] at runtime and show
//! up in the next enumeration. Frames reach an opened device's listener either through
//! [`VirtualDeviceHandle::emit`], which runs the notification synchronously on the
//! calling thread exactly like a driver capture thread would, or from an optional
//! synthetic capture thread that produces color, IR, and depth frames at a fixed interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use freenect2_sys as sys;

use crate::frame::{FrameType, RawFrame};
use crate::listener::ListenerBridge;
use crate::logger::{LogLevel, driver_log};
use crate::params::{ColorCameraParams, DeviceConfig, IrCameraParams};

use super::{Driver, DriverDevice};

pub const COLOR_SIZE: (usize, usize) = (1920, 1080);
pub const DEPTH_SIZE: (usize, usize) = (512, 424);

/// Description of a virtual device before it is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualDeviceSpec {
    pub serial: String,
    pub firmware_version: String,
    pub color_params: ColorCameraParams,
    pub ir_params: IrCameraParams,
    /// When set, every `start` is refused.
    pub refuse_start: bool,
    /// When set, `start` spawns a capture thread producing frames at this interval.
    pub capture_interval: Option<Duration>,
    pub color_size: (usize, usize),
    pub depth_size: (usize, usize),
}

impl VirtualDeviceSpec {
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            firmware_version: "4.0.3911.0".to_string(),
            color_params: ColorCameraParams {
                fx: 1081.372,
                fy: 1081.372,
                cx: 959.5,
                cy: 539.5,
                shift_d: 863.0,
                shift_m: 52.0,
                ..Default::default()
            },
            ir_params: IrCameraParams {
                fx: 365.456,
                fy: 365.456,
                cx: 254.878,
                cy: 205.395,
                k1: 0.0905474,
                k2: -0.26819,
                k3: 0.0950862,
                p1: 0.0,
                p2: 0.0,
            },
            refuse_start: false,
            capture_interval: None,
            color_size: COLOR_SIZE,
            depth_size: DEPTH_SIZE,
        }
    }

    pub fn with_firmware_version(mut self, version: impl Into<String>) -> Self {
        self.firmware_version = version.into();
        self
    }

    pub fn with_color_params(mut self, params: ColorCameraParams) -> Self {
        self.color_params = params;
        self
    }

    pub fn with_ir_params(mut self, params: IrCameraParams) -> Self {
        self.ir_params = params;
        self
    }

    pub fn refusing_start(mut self) -> Self {
        self.refuse_start = true;
        self
    }

    pub fn with_capture(mut self, interval: Duration) -> Self {
        self.capture_interval = Some(interval);
        self
    }

    pub fn with_frame_sizes(mut self, color: (usize, usize), depth: (usize, usize)) -> Self {
        self.color_size = color;
        self.depth_size = depth;
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct Streams {
    rgb: bool,
    depth: bool,
}

impl Streams {
    fn carries(self, ty: FrameType) -> bool {
        match ty {
            FrameType::Color => self.rgb,
            FrameType::Ir | FrameType::Depth => self.depth,
        }
    }
}

/// Mutable device state, as the device's firmware would hold it.
struct Registers {
    color: sys::Fn2ColorCameraParams,
    ir: sys::Fn2IrCameraParams,
    config: sys::Fn2DeviceConfig,
    listener: Option<Arc<ListenerBridge>>,
    streams: Option<Streams>,
}

struct VirtualDeviceState {
    spec: VirtualDeviceSpec,
    open: AtomicBool,
    registers: Mutex<Registers>,
}

impl VirtualDeviceState {
    fn new(spec: VirtualDeviceSpec) -> Self {
        let registers = Registers {
            color: spec.color_params.into(),
            ir: spec.ir_params.into(),
            config: DeviceConfig::default().into(),
            listener: None,
            streams: None,
        };
        Self {
            spec,
            open: AtomicBool::new(false),
            registers: Mutex::new(registers),
        }
    }

    fn registers(&self) -> MutexGuard<'_, Registers> {
        self.registers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Notify the listener of `frame` if the stream carrying `ty` is running.
    fn notify(&self, ty: FrameType, frame: &RawFrame<'_>) -> bool {
        let listener = {
            let registers = self.registers();
            match (registers.streams, &registers.listener) {
                (Some(streams), Some(listener)) if streams.carries(ty) => Arc::clone(listener),
                _ => return false,
            }
        };
        listener.on_new_frame(ty.into(), frame);
        true
    }
}

/// A cloneable handle to an attached virtual device, for driving it from outside.
#[derive(Clone)]
pub struct VirtualDeviceHandle {
    state: Arc<VirtualDeviceState>,
}

impl std::fmt::Debug for VirtualDeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualDeviceHandle")
            .field("serial", &self.state.spec.serial)
            .field("open", &self.is_open())
            .field("streaming", &self.is_streaming())
            .finish()
    }
}

impl VirtualDeviceHandle {
    pub fn serial(&self) -> &str {
        &self.state.spec.serial
    }

    pub fn is_open(&self) -> bool {
        self.state.open.load(Ordering::Acquire)
    }

    pub fn is_streaming(&self) -> bool {
        self.state.registers().streams.is_some()
    }

    pub fn has_listener(&self) -> bool {
        self.state.registers().listener.is_some()
    }

    /// The depth configuration as last written by the host.
    pub fn config(&self) -> DeviceConfig {
        self.state.registers().config.into()
    }

    pub fn color_params(&self) -> ColorCameraParams {
        self.state.registers().color.into()
    }

    pub fn ir_params(&self) -> IrCameraParams {
        self.state.registers().ir.into()
    }

    /// Deliver `frame` on the `ty` stream, synchronously on this thread.
    ///
    /// Returns false when the stream is not running or no listener is attached, in
    /// which case the frame goes nowhere.
    pub fn emit(&self, ty: FrameType, frame: &RawFrame<'_>) -> bool {
        self.state.notify(ty, frame)
    }

    /// Deliver a frame with a raw driver type value, including values the bridge does not know.
    pub fn emit_raw_type(&self, ty: sys::Fn2FrameType, frame: &RawFrame<'_>) -> bool {
        let listener = {
            let registers = self.state.registers();
            match (registers.streams, &registers.listener) {
                (Some(_), Some(listener)) => Arc::clone(listener),
                _ => return false,
            }
        };
        listener.on_new_frame(ty, frame);
        true
    }
}

/// A software driver whose devices live in this process.
#[derive(Clone, Default)]
pub struct VirtualDriver {
    bus: Arc<Mutex<Vec<Arc<VirtualDeviceState>>>>,
}

impl std::fmt::Debug for VirtualDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualDriver").field("devices", &self.bus().len()).finish()
    }
}

impl VirtualDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn bus(&self) -> MutexGuard<'_, Vec<Arc<VirtualDeviceState>>> {
        self.bus.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Plug a device in. It is listed by the next enumeration.
    pub fn attach(&self, spec: VirtualDeviceSpec) -> VirtualDeviceHandle {
        let state = Arc::new(VirtualDeviceState::new(spec));
        self.bus().push(Arc::clone(&state));
        VirtualDeviceHandle { state }
    }

    /// Unplug the device with `serial`. An opened session on it keeps its state.
    pub fn detach(&self, serial: &str) -> bool {
        let mut bus = self.bus();
        let before = bus.len();
        bus.retain(|state| state.spec.serial != serial);
        bus.len() != before
    }

    fn open(&self, state: Option<Arc<VirtualDeviceState>>) -> Option<Box<dyn DriverDevice>> {
        let state = state?;
        if state.open.swap(true, Ordering::AcqRel) {
            driver_log(
                LogLevel::Error,
                &format!("[Freenect2Impl] device {} is already open", state.spec.serial),
            );
            return None;
        }
        driver_log(
            LogLevel::Info,
            &format!("[Freenect2DeviceImpl] opened device {}", state.spec.serial),
        );
        Some(Box::new(VirtualDevice { state, capture: None }))
    }
}

impl Driver for VirtualDriver {
    fn enumerate_devices(&mut self) -> usize {
        let count = self.bus().len();
        driver_log(LogLevel::Info, &format!("[Freenect2Impl] found {count} devices"));
        count
    }

    fn device_serial_number(&mut self, index: usize, sink: &mut dyn FnMut(&[u8])) {
        let serial = self.bus().get(index).map(|s| s.spec.serial.clone()).unwrap_or_default();
        sink(serial.as_bytes());
    }

    fn default_device_serial_number(&mut self, sink: &mut dyn FnMut(&[u8])) {
        self.device_serial_number(0, sink)
    }

    fn open_device(&mut self, index: usize) -> Option<Box<dyn DriverDevice>> {
        let state = self.bus().get(index).cloned();
        if state.is_none() {
            driver_log(LogLevel::Error, &format!("[Freenect2Impl] requested device {index} is not connected"));
        }
        self.open(state)
    }

    fn open_device_by_serial(&mut self, serial: &str) -> Option<Box<dyn DriverDevice>> {
        let state = self.bus().iter().find(|s| s.spec.serial == serial).cloned();
        if state.is_none() {
            driver_log(LogLevel::Error, &format!("[Freenect2Impl] device {serial} not found"));
        }
        self.open(state)
    }

    fn open_default_device(&mut self) -> Option<Box<dyn DriverDevice>> {
        self.open_device(0)
    }
}

struct Capture {
    running: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// An opened virtual device.
struct VirtualDevice {
    state: Arc<VirtualDeviceState>,
    capture: Option<Capture>,
}

impl VirtualDevice {
    fn halt_capture(&mut self) {
        if let Some(capture) = self.capture.take() {
            capture.running.store(false, Ordering::Release);
            if capture.thread.join().is_err() {
                driver_log(LogLevel::Error, "[VirtualDevice] capture thread panicked");
            }
        }
    }

    fn spawn_capture(&self, interval: Duration) -> std::io::Result<Capture> {
        let running = Arc::new(AtomicBool::new(true));
        let state = Arc::clone(&self.state);
        let flag = Arc::clone(&running);
        let thread = thread::Builder::new()
            .name(format!("virtual-kinect-{}", self.state.spec.serial))
            .spawn(move || capture_loop(&state, &flag, interval))?;
        Ok(Capture { running, thread })
    }
}

impl DriverDevice for VirtualDevice {
    fn serial_number(&self, sink: &mut dyn FnMut(&[u8])) {
        sink(self.state.spec.serial.as_bytes())
    }

    fn firmware_version(&self, sink: &mut dyn FnMut(&[u8])) {
        sink(self.state.spec.firmware_version.as_bytes())
    }

    fn color_camera_params(&self) -> sys::Fn2ColorCameraParams {
        self.state.registers().color
    }

    fn set_color_camera_params(&mut self, params: sys::Fn2ColorCameraParams) {
        self.state.registers().color = params;
    }

    fn ir_camera_params(&self) -> sys::Fn2IrCameraParams {
        self.state.registers().ir
    }

    fn set_ir_camera_params(&mut self, params: sys::Fn2IrCameraParams) {
        self.state.registers().ir = params;
    }

    fn set_configuration(&mut self, config: sys::Fn2DeviceConfig) {
        self.state.registers().config = config;
    }

    fn attach_listener(&mut self, bridge: Arc<ListenerBridge>) {
        let mut registers = self.state.registers();
        if registers.listener.is_none() {
            registers.listener = Some(bridge);
        }
    }

    fn start(&mut self) -> bool {
        self.start_streams(true, true)
    }

    fn start_streams(&mut self, rgb: bool, depth: bool) -> bool {
        let serial = &self.state.spec.serial;
        if self.state.spec.refuse_start {
            driver_log(LogLevel::Error, &format!("[Freenect2DeviceImpl] failed to start {serial}"));
            return false;
        }
        {
            let mut registers = self.state.registers();
            if registers.streams.is_some() {
                driver_log(LogLevel::Warning, &format!("[Freenect2DeviceImpl] {serial} is already running"));
                return false;
            }
            registers.streams = Some(Streams { rgb, depth });
        }
        if let Some(interval) = self.state.spec.capture_interval {
            match self.spawn_capture(interval) {
                Ok(capture) => self.capture = Some(capture),
                Err(err) => {
                    driver_log(LogLevel::Error, &format!("[VirtualDevice] capture thread: {err}"));
                    self.state.registers().streams = None;
                    return false;
                }
            }
        }
        driver_log(
            LogLevel::Info,
            &format!("[Freenect2DeviceImpl] started {serial} (rgb={rgb}, depth={depth})"),
        );
        true
    }

    fn stop(&mut self) -> bool {
        self.halt_capture();
        if self.state.registers().streams.take().is_none() {
            driver_log(LogLevel::Info, "[Freenect2DeviceImpl] requested to stop, but device is not running");
            return true;
        }
        driver_log(LogLevel::Info, &format!("[Freenect2DeviceImpl] stopped {}", self.state.spec.serial));
        true
    }

    /// The device stays claimed until the handle is dropped.
    fn close(&mut self) -> bool {
        self.halt_capture();
        let mut registers = self.state.registers();
        registers.streams = None;
        registers.listener = None;
        drop(registers);
        driver_log(LogLevel::Info, &format!("[Freenect2DeviceImpl] closed {}", self.state.spec.serial));
        true
    }
}

impl Drop for VirtualDevice {
    fn drop(&mut self) {
        self.halt_capture();
        // The claim on `open` is held by this handle, so the registers are still ours.
        let mut registers = self.state.registers();
        registers.streams = None;
        registers.listener = None;
        drop(registers);
        self.state.open.store(false, Ordering::Release);
    }
}

fn capture_loop(state: &VirtualDeviceState, running: &AtomicBool, interval: Duration) {
    let started = Instant::now();
    let (color_w, color_h) = state.spec.color_size;
    let (depth_w, depth_h) = state.spec.depth_size;
    let mut sequence = 0u32;

    while running.load(Ordering::Acquire) {
        // 100 microsecond ticks, wrapping like the device clock.
        let timestamp = (started.elapsed().as_micros() / 100) as u32;

        let color = synthetic_color(color_w, color_h, sequence);
        if let Ok(frame) = RawFrame::new(color_w, color_h, 4, sys::Fn2FrameFormat_BGRX, &color) {
            state.notify(FrameType::Color, &frame.with_sequence(sequence).with_timestamp(timestamp));
        }

        let ir = synthetic_float(depth_w, depth_h, |x, y| ((x + y + sequence as usize) % 65536) as f32);
        if let Ok(frame) = RawFrame::new(depth_w, depth_h, 4, sys::Fn2FrameFormat_Float, &ir) {
            state.notify(FrameType::Ir, &frame.with_sequence(sequence).with_timestamp(timestamp));
        }

        let depth = synthetic_float(depth_w, depth_h, |x, _| 500.0 + x as f32 * 7.8);
        if let Ok(frame) = RawFrame::new(depth_w, depth_h, 4, sys::Fn2FrameFormat_Float, &depth) {
            state.notify(FrameType::Depth, &frame.with_sequence(sequence).with_timestamp(timestamp));
        }

        sequence = sequence.wrapping_add(1);
        thread::sleep(interval);
    }
}

fn synthetic_color(width: usize, height: usize, sequence: u32) -> Vec<u8> {
    let shift = (sequence % 256) as usize;
    let mut data = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        for x in 0..width {
            data.extend_from_slice(&[((x + shift) % 256) as u8, (y % 256) as u8, ((x ^ y) % 256) as u8, 0]);
        }
    }
    data
}

fn synthetic_float(width: usize, height: usize, value: impl Fn(usize, usize) -> f32) -> Vec<u8> {
    let mut data = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        for x in 0..width {
            data.extend_from_slice(&value(x, y).to_ne_bytes());
        }
    }
    data
}
