//! Frames delivered by a device, and the transfer of a driver-owned frame view into
//! an independently owned [`Frame`].

use std::marker::PhantomData;

use freenect2_sys as sys;
use image::RgbaImage;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::config::FloatFormatTagging;
use crate::error::{Error, Result};

/// The stream a frame was captured on.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameType {
    /// From the color camera. 1920 by 1080, Bgrx or Rgbx.
    Color = 0,
    /// From the IR camera. 512 by 424, Float.
    Ir = 1,
    /// From the depth camera. 512 by 424, Float, in millimeters.
    /// Non-positive, NaN, and infinite values mark missing data.
    Depth = 2,
}

impl TryFrom<sys::Fn2FrameType> for FrameType {
    type Error = Error;

    fn try_from(raw: sys::Fn2FrameType) -> Result<Self> {
        match raw {
            sys::Fn2FrameType_Color => Ok(Self::Color),
            sys::Fn2FrameType_Ir => Ok(Self::Ir),
            sys::Fn2FrameType_Depth => Ok(Self::Depth),
            other => Err(Error::UnknownFrameType(other)),
        }
    }
}

impl From<FrameType> for sys::Fn2FrameType {
    fn from(ty: FrameType) -> Self {
        match ty {
            FrameType::Color => sys::Fn2FrameType_Color,
            FrameType::Ir => sys::Fn2FrameType_Ir,
            FrameType::Depth => sys::Fn2FrameType_Depth,
        }
    }
}

/// The layout of a frame's data.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameFormat {
    Invalid = 0,
    /// Opaque payload of `bytes_per_pixel` bytes.
    Raw = 1,
    /// One `f32` per pixel.
    Float = 2,
    /// 4 bytes of B, G, R, and unused per pixel.
    Bgrx = 3,
    /// 4 bytes of R, G, B, and unused per pixel.
    Rgbx = 4,
    /// One gray byte per pixel.
    Gray = 5,
}

impl FrameFormat {
    /// Map a driver format value onto the delivered tag.
    pub fn from_driver(raw: sys::Fn2FrameFormat, tagging: FloatFormatTagging) -> Result<Self> {
        Ok(match raw {
            sys::Fn2FrameFormat_Invalid => Self::Invalid,
            sys::Fn2FrameFormat_Raw => Self::Raw,
            sys::Fn2FrameFormat_Float => match tagging {
                FloatFormatTagging::Distinct => Self::Float,
                FloatFormatTagging::Compat => Self::Bgrx,
            },
            sys::Fn2FrameFormat_BGRX => Self::Bgrx,
            sys::Fn2FrameFormat_RGBX => Self::Rgbx,
            sys::Fn2FrameFormat_Gray => Self::Gray,
            other => return Err(Error::UnknownFormat(other)),
        })
    }
}

impl From<FrameFormat> for sys::Fn2FrameFormat {
    fn from(format: FrameFormat) -> Self {
        match format {
            FrameFormat::Invalid => sys::Fn2FrameFormat_Invalid,
            FrameFormat::Raw => sys::Fn2FrameFormat_Raw,
            FrameFormat::Float => sys::Fn2FrameFormat_Float,
            FrameFormat::Bgrx => sys::Fn2FrameFormat_BGRX,
            FrameFormat::Rgbx => sys::Fn2FrameFormat_RGBX,
            FrameFormat::Gray => sys::Fn2FrameFormat_Gray,
        }
    }
}

/// Number of data bytes a frame of this shape carries.
fn payload_len(width: usize, height: usize, bytes_per_pixel: usize, raw_format: bool) -> Option<usize> {
    if raw_format {
        Some(bytes_per_pixel)
    } else {
        width.checked_mul(height)?.checked_mul(bytes_per_pixel)
    }
}

/// A driver-owned frame, valid only while the driver's notification runs.
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    raw: sys::Fn2RawFrame,
    _data: PhantomData<&'a [u8]>,
}

impl<'a> RawFrame<'a> {
    /// Build a view over `data` using the driver's own format value.
    ///
    /// Fails if `data` is shorter than the shape requires.
    pub fn new(
        width: usize,
        height: usize,
        bytes_per_pixel: usize,
        format: sys::Fn2FrameFormat,
        data: &'a [u8],
    ) -> Result<Self> {
        let required = payload_len(width, height, bytes_per_pixel, format == sys::Fn2FrameFormat_Raw)
            .ok_or_else(|| Error::InvalidFrame(format!("{width}x{height}x{bytes_per_pixel} overflows")))?;
        if data.len() < required {
            return Err(Error::InvalidFrame(format!(
                "{width}x{height}x{bytes_per_pixel} needs {required} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            raw: sys::Fn2RawFrame {
                width,
                height,
                bytes_per_pixel,
                data: data.as_ptr(),
                timestamp: 0,
                sequence: 0,
                exposure: 0.0,
                gain: 0.0,
                gamma: 0.0,
                status: 0,
                format,
            },
            _data: PhantomData,
        })
    }

    /// Wrap a frame handed over by the native shim.
    ///
    /// # Safety
    ///
    /// `raw.data` must point at the number of bytes its shape and format require and stay
    /// valid and unmodified for `'a`.
    pub unsafe fn from_sys(raw: &'a sys::Fn2RawFrame) -> Self {
        Self {
            raw: *raw,
            _data: PhantomData,
        }
    }

    pub fn with_timestamp(mut self, timestamp: u32) -> Self {
        self.raw.timestamp = timestamp;
        self
    }

    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.raw.sequence = sequence;
        self
    }

    pub fn with_exposure(mut self, exposure: f32, gain: f32, gamma: f32) -> Self {
        self.raw.exposure = exposure;
        self.raw.gain = gain;
        self.raw.gamma = gamma;
        self
    }

    pub fn with_status(mut self, status: u32) -> Self {
        self.raw.status = status;
        self
    }

    pub fn as_sys(&self) -> &sys::Fn2RawFrame {
        &self.raw
    }

    /// Length of the payload, per the raw/non-raw size rule. `None` if the shape overflows.
    pub fn payload_len(&self) -> Option<usize> {
        let raw = &self.raw;
        payload_len(raw.width, raw.height, raw.bytes_per_pixel, raw.format == sys::Fn2FrameFormat_Raw)
    }

    fn bytes(&self) -> Result<&'a [u8]> {
        let raw = &self.raw;
        let shape = || format!("{}x{}x{}", raw.width, raw.height, raw.bytes_per_pixel);
        let len = self
            .payload_len()
            .ok_or_else(|| Error::InvalidFrame(format!("{} overflows", shape())))?;
        if len == 0 {
            return Ok(&[]);
        }
        if raw.data.is_null() {
            return Err(Error::InvalidFrame(format!("{} has no data", shape())));
        }
        // Length was validated in `new`, or guaranteed by the caller of `from_sys`.
        Ok(unsafe { std::slice::from_raw_parts(raw.data, len) })
    }
}

/// A frame owned by the caller.
///
/// Its buffer is a private copy; nothing the driver does afterwards is visible through it.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: usize,
    height: usize,
    bytes_per_pixel: usize,
    data: Box<[u8]>,
    timestamp: u32,
    sequence: u32,
    exposure: f32,
    gain: f32,
    gamma: f32,
    status: u32,
    format: FrameFormat,
}

impl Frame {
    /// Copy a transient driver frame into an owned one.
    ///
    /// Must run before the driver's notification returns.
    pub fn copy_from(raw: &RawFrame<'_>, tagging: FloatFormatTagging) -> Result<Self> {
        let sys = raw.as_sys();
        let format = FrameFormat::from_driver(sys.format, tagging)?;
        Ok(Self {
            width: sys.width,
            height: sys.height,
            bytes_per_pixel: sys.bytes_per_pixel,
            data: Box::from(raw.bytes()?),
            timestamp: sys.timestamp,
            sequence: sys.sequence,
            exposure: sys.exposure,
            gain: sys.gain,
            gamma: sys.gamma,
            status: sys.status,
            format,
        })
    }

    /// The width of the frame, in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// The height of the frame, in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// The number of data bytes per pixel.
    ///
    /// If `format` is `Raw`, this is simply the length of `data`.
    pub fn bytes_per_pixel(&self) -> usize {
        self.bytes_per_pixel
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consume the frame and return the owned data.
    pub fn into_data(self) -> Box<[u8]> {
        self.data
    }

    /// In units of 100 microseconds.
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// The monotonically increasing sequence number.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// From 0.5 (very bright) to about 60.0 (fully dark).
    pub fn exposure(&self) -> f32 {
        self.exposure
    }

    /// From 1.0 (bright) to 1.5 (dark).
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// From 1.0 (bright) to 6.4 (dark).
    pub fn gamma(&self) -> f32 {
        self.gamma
    }

    pub fn status(&self) -> u32 {
        self.status
    }

    /// Whether the driver flagged errors while producing this frame.
    pub fn errors_occurred(&self) -> bool {
        self.status > 0
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    /// Decode the data as native-endian `f32` values, for `Float` frames only.
    pub fn to_f32_vec(&self) -> Option<Vec<f32>> {
        if self.format != FrameFormat::Float || self.bytes_per_pixel != 4 {
            return None;
        }
        Some(
            self.data
                .chunks_exact(4)
                .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
        )
    }

    /// Depth or IR values as a `height x width` array, for `Float` frames only.
    pub fn to_depth_array(&self) -> Option<Array2<f32>> {
        let values = self.to_f32_vec()?;
        Array2::from_shape_vec((self.height, self.width), values).ok()
    }

    /// Convert a color or gray frame to an RGBA image.
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        let width = u32::try_from(self.width).ok()?;
        let height = u32::try_from(self.height).ok()?;
        let pixels = match (self.format, self.bytes_per_pixel) {
            (FrameFormat::Bgrx, 4) => self
                .data
                .chunks_exact(4)
                .flat_map(|p| [p[2], p[1], p[0], 255])
                .collect(),
            (FrameFormat::Rgbx, 4) => self
                .data
                .chunks_exact(4)
                .flat_map(|p| [p[0], p[1], p[2], 255])
                .collect(),
            (FrameFormat::Gray, 1) => self.data.iter().flat_map(|&g| [g, g, g, 255]).collect(),
            _ => return None,
        };
        RgbaImage::from_raw(width, height, pixels)
    }

    pub fn describe(&self) -> String {
        format!(
            "{}x{} {:?} seq={} ts={}",
            self.width, self.height, self.format, self.sequence, self.timestamp
        )
    }
}
