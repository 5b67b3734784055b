//! Calibration and depth-processing parameters, and their lossless mapping to and
//! from the driver-native structs in `freenect2-sys`.

use freenect2_sys as sys;
use serde::{Deserialize, Serialize};

/// Generates `From` in both directions for structs whose fields share names.
macro_rules! field_for_field {
    ($ours:ty, $theirs:ty, [$($field:ident),+ $(,)?]) => {
        impl From<$theirs> for $ours {
            fn from(raw: $theirs) -> Self {
                Self { $($field: raw.$field),+ }
            }
        }

        impl From<$ours> for $theirs {
            fn from(ours: $ours) -> Self {
                Self { $($field: ours.$field),+ }
            }
        }
    };
}

/// Color camera calibration parameters.
///
/// Used by the driver's registration step; the depth-to-color mapping is a
/// third-order polynomial in x and y for each output coordinate.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorCameraParams {
    /// Focal length x (pixel)
    pub fx: f32,
    /// Focal length y (pixel)
    pub fy: f32,
    /// Principal point x (pixel)
    pub cx: f32,
    /// Principal point y (pixel)
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

field_for_field!(
    ColorCameraParams,
    sys::Fn2ColorCameraParams,
    [
        fx, fy, cx, cy, shift_d, shift_m, mx_x3y0, mx_x0y3, mx_x2y1, mx_x1y2, mx_x2y0, mx_x0y2, mx_x1y1,
        mx_x1y0, mx_x0y1, mx_x0y0, my_x3y0, my_x0y3, my_x2y1, my_x1y2, my_x2y0, my_x0y2, my_x1y1, my_x1y0,
        my_x0y1, my_x0y0,
    ]
);

/// IR camera intrinsic calibration parameters.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IrCameraParams {
    /// Focal length x (pixel)
    pub fx: f32,
    /// Focal length y (pixel)
    pub fy: f32,
    /// Principal point x (pixel)
    pub cx: f32,
    /// Principal point y (pixel)
    pub cy: f32,
    /// Radial distortion coefficient, first order
    pub k1: f32,
    /// Radial distortion coefficient, second order
    pub k2: f32,
    /// Radial distortion coefficient, third order
    pub k3: f32,
    /// Tangential distortion coefficient
    pub p1: f32,
    /// Tangential distortion coefficient
    pub p2: f32,
}

field_for_field!(IrCameraParams, sys::Fn2IrCameraParams, [fx, fy, cx, cy, k1, k2, k3, p1, p2]);

/// Depth processing configuration, replaced as a whole by
/// [`Device::set_config`](crate::Device::set_config).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Clip at this minimum depth, in meters.
    pub min_depth: f32,
    /// Clip at this maximum depth, in meters.
    pub max_depth: f32,
    /// Remove some "flying pixels".
    pub enable_bilateral_filter: bool,
    /// Remove pixels on edges because ToF cameras produce noisy edges.
    pub enable_edge_aware_filter: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            min_depth: 0.5,
            max_depth: 4.5,
            enable_bilateral_filter: true,
            enable_edge_aware_filter: true,
        }
    }
}

impl From<sys::Fn2DeviceConfig> for DeviceConfig {
    fn from(raw: sys::Fn2DeviceConfig) -> Self {
        Self {
            min_depth: raw.MinDepth,
            max_depth: raw.MaxDepth,
            enable_bilateral_filter: raw.EnableBilateralFilter,
            enable_edge_aware_filter: raw.EnableEdgeAwareFilter,
        }
    }
}

impl From<DeviceConfig> for sys::Fn2DeviceConfig {
    fn from(ours: DeviceConfig) -> Self {
        Self {
            MinDepth: ours.min_depth,
            MaxDepth: ours.max_depth,
            EnableBilateralFilter: ours.enable_bilateral_filter,
            EnableEdgeAwareFilter: ours.enable_edge_aware_filter,
        }
    }
}
