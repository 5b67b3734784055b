#![cfg(all(feature = "hit", feature = "native"))]

/// Hardware integration tests against a real Kinect v2 through libfreenect2.
///
/// Only compiled with the `hit` and `native` features. They need a device on a USB 3
/// port and take a few seconds each.
#[cfg(test)]
mod hardware_integration_tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use freenect2::{Context, DeviceConfig, Error, Frame, FrameFormat, FrameType, SessionState};

    fn open() -> (Context, freenect2::Device) {
        let context = Context::new();
        assert!(
            context.enumerate_devices() > 0,
            "No device found - ensure a Kinect v2 is connected"
        );
        let device = context
            .open_default_device()
            .expect("Failed to open the default device");
        (context, device)
    }

    #[test]
    fn test_identity_with_hardware() {
        let (context, device) = open();
        let serial = device.serial_number().expect("serial number");
        assert!(!serial.is_empty());
        assert_eq!(context.default_device_serial_number().as_deref(), Some(serial.as_str()));
        assert!(!device.firmware_version().expect("firmware version").is_empty());
    }

    #[test]
    fn test_streams_with_hardware() {
        let (_context, mut device) = open();
        device
            .set_config(DeviceConfig::default())
            .expect("Failed to set depth config");

        let (tx, rx) = mpsc::channel();
        device
            .set_frame_listener(move |frame: Frame, ty: FrameType| {
                let _ = tx.send((ty, frame.width(), frame.height(), frame.format(), frame.data().len()));
            })
            .expect("Failed to set listener");
        device.start().expect("Failed to start streams");
        assert_eq!(device.start(), Err(Error::StreamsRunning));

        let mut seen = Vec::new();
        while seen.len() < 3 {
            let (ty, width, height, format, len) = rx
                .recv_timeout(Duration::from_secs(10))
                .expect("No frame within 10 seconds");
            if seen.contains(&ty) {
                continue;
            }
            match ty {
                FrameType::Color => {
                    assert_eq!((width, height), (1920, 1080));
                    assert!(matches!(format, FrameFormat::Bgrx | FrameFormat::Rgbx));
                    assert_eq!(len, 1920 * 1080 * 4);
                }
                FrameType::Ir | FrameType::Depth => {
                    assert_eq!((width, height), (512, 424));
                    assert_eq!(format, FrameFormat::Float);
                    assert_eq!(len, 512 * 424 * 4);
                }
            }
            seen.push(ty);
        }

        device.stop().expect("Failed to stop");
        device.close().expect("Failed to close");
        assert_eq!(device.state(), SessionState::Closed);
    }
}
