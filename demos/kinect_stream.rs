use std::sync::mpsc;
use std::time::Duration;

use freenect2::{Context, DeviceConfig, Frame, FrameType, Result};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let context = Context::new();
    if context.enumerate_devices() == 0 {
        println!("No Kinect v2 connected");
        return Ok(());
    }
    let mut device = context.open_default_device()?;
    println!("Opened {}", device.serial_number()?);

    device.set_config(DeviceConfig {
        max_depth: 6.0,
        ..Default::default()
    })?;
    println!("IR intrinsics: {:?}", device.ir_camera_params()?);

    let (tx, rx) = mpsc::channel();
    device.set_frame_listener(move |frame: Frame, ty: FrameType| {
        let _ = tx.send((ty, frame));
    })?;
    device.start()?;

    for _ in 0..90 {
        match rx.recv_timeout(Duration::from_secs(1)) {
            Ok((FrameType::Color, frame)) => {
                if let Some(image) = frame.to_rgba_image() {
                    println!("Color {} -> {}x{} RGBA", frame.describe(), image.width(), image.height());
                }
            }
            Ok((ty, frame)) => println!("{ty:?} {}", frame.describe()),
            Err(_) => println!("No frame yet"),
        }
    }

    device.stop()?;
    device.close()?;
    Ok(())
}
