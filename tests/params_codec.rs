/// Lossless conversion of calibration and depth parameters across the driver boundary.
#[cfg(test)]
mod params_codec_tests {
    use freenect2::bindings as sys;
    use freenect2::{
        BridgeConfig, ColorCameraParams, Context, DeviceConfig, IrCameraParams, VirtualDeviceSpec, VirtualDriver,
    };
    use proptest::prelude::*;

    fn color_from(v: &[f32]) -> ColorCameraParams {
        ColorCameraParams {
            fx: v[0],
            fy: v[1],
            cx: v[2],
            cy: v[3],
            shift_d: v[4],
            shift_m: v[5],
            mx_x3y0: v[6],
            mx_x0y3: v[7],
            mx_x2y1: v[8],
            mx_x1y2: v[9],
            mx_x2y0: v[10],
            mx_x0y2: v[11],
            mx_x1y1: v[12],
            mx_x1y0: v[13],
            mx_x0y1: v[14],
            mx_x0y0: v[15],
            my_x3y0: v[16],
            my_x0y3: v[17],
            my_x2y1: v[18],
            my_x1y2: v[19],
            my_x2y0: v[20],
            my_x0y2: v[21],
            my_x1y1: v[22],
            my_x1y0: v[23],
            my_x0y1: v[24],
            my_x0y0: v[25],
        }
    }

    fn color_bits(p: &ColorCameraParams) -> Vec<u32> {
        [
            p.fx, p.fy, p.cx, p.cy, p.shift_d, p.shift_m, p.mx_x3y0, p.mx_x0y3, p.mx_x2y1, p.mx_x1y2, p.mx_x2y0,
            p.mx_x0y2, p.mx_x1y1, p.mx_x1y0, p.mx_x0y1, p.mx_x0y0, p.my_x3y0, p.my_x0y3, p.my_x2y1, p.my_x1y2,
            p.my_x2y0, p.my_x0y2, p.my_x1y1, p.my_x1y0, p.my_x0y1, p.my_x0y0,
        ]
        .iter()
        .map(|v| v.to_bits())
        .collect()
    }

    fn ir_from(v: &[f32]) -> IrCameraParams {
        IrCameraParams {
            fx: v[0],
            fy: v[1],
            cx: v[2],
            cy: v[3],
            k1: v[4],
            k2: v[5],
            k3: v[6],
            p1: v[7],
            p2: v[8],
        }
    }

    fn ir_bits(p: &IrCameraParams) -> Vec<u32> {
        [p.fx, p.fy, p.cx, p.cy, p.k1, p.k2, p.k3, p.p1, p.p2]
            .iter()
            .map(|v| v.to_bits())
            .collect()
    }

    proptest! {
        #[test]
        fn test_color_params_survive_the_driver_struct(values in prop::collection::vec(any::<f32>(), 26)) {
            let ours = color_from(&values);
            let back = ColorCameraParams::from(sys::Fn2ColorCameraParams::from(ours));
            prop_assert_eq!(color_bits(&back), color_bits(&ours));
        }

        #[test]
        fn test_ir_params_survive_the_driver_struct(values in prop::collection::vec(any::<f32>(), 9)) {
            let ours = ir_from(&values);
            let back = IrCameraParams::from(sys::Fn2IrCameraParams::from(ours));
            prop_assert_eq!(ir_bits(&back), ir_bits(&ours));
        }

        #[test]
        fn test_device_config_survives_the_driver_struct(
            min_depth in any::<f32>(),
            max_depth in any::<f32>(),
            bilateral in any::<bool>(),
            edge_aware in any::<bool>(),
        ) {
            let ours = DeviceConfig {
                min_depth,
                max_depth,
                enable_bilateral_filter: bilateral,
                enable_edge_aware_filter: edge_aware,
            };
            let back = DeviceConfig::from(sys::Fn2DeviceConfig::from(ours));
            prop_assert_eq!(back.min_depth.to_bits(), min_depth.to_bits());
            prop_assert_eq!(back.max_depth.to_bits(), max_depth.to_bits());
            prop_assert_eq!(back.enable_bilateral_filter, bilateral);
            prop_assert_eq!(back.enable_edge_aware_filter, edge_aware);
        }

        #[test]
        fn test_set_then_get_through_a_session(values in prop::collection::vec(-1.0e6f32..1.0e6, 35)) {
            let driver = VirtualDriver::new();
            driver.attach(VirtualDeviceSpec::new("codec"));
            let context = Context::with_driver(driver, BridgeConfig::default());
            let mut device = context.open_default_device().unwrap();

            let color = color_from(&values[..26]);
            let ir = ir_from(&values[26..]);
            device.set_color_camera_params(color).unwrap();
            device.set_ir_camera_params(ir).unwrap();
            prop_assert_eq!(device.color_camera_params().unwrap(), color);
            prop_assert_eq!(device.ir_camera_params().unwrap(), ir);
        }
    }

    #[test]
    fn test_color_scenario_values_are_exact() {
        let values: Vec<f32> = (1..=26).map(|i| i as f32).collect();
        let color = color_from(&values);
        let raw = sys::Fn2ColorCameraParams::from(color);
        assert_eq!(raw.fx, 1.0);
        assert_eq!(raw.mx_x3y0, 7.0);
        assert_eq!(raw.my_x0y0, 26.0);
        assert_eq!(ColorCameraParams::from(raw), color);
    }

    #[test]
    fn test_set_config_reaches_the_driver() {
        let driver = VirtualDriver::new();
        let handle = driver.attach(VirtualDeviceSpec::new("cfg"));
        let context = Context::with_driver(driver, BridgeConfig::default());
        let mut device = context.open_default_device().unwrap();
        assert_eq!(handle.config(), DeviceConfig::default());

        let config = DeviceConfig {
            min_depth: 0.5,
            max_depth: 4.5,
            enable_bilateral_filter: false,
            enable_edge_aware_filter: true,
        };
        device.set_config(config).unwrap();
        assert_eq!(handle.config(), config);
    }
}
