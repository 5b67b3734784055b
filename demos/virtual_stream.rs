use std::sync::mpsc;
use std::time::Duration;

use freenect2::{
    BridgeConfig, Context, Frame, FrameFormat, FrameType, LogLevel, Result, VirtualDeviceSpec, VirtualDriver,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    let driver = VirtualDriver::new();
    driver.attach(
        VirtualDeviceSpec::new("000000000000")
            .with_capture(Duration::from_millis(33))
            .with_frame_sizes((640, 360), (512, 424)),
    );
    let context = Context::with_driver(driver, BridgeConfig::default().with_log_level(LogLevel::Debug));

    println!("Found {} device(s)", context.enumerate_devices());
    let mut device = context.open_default_device()?;
    println!(
        "Opened {} (firmware {})",
        device.serial_number()?,
        device.firmware_version()?
    );

    let (tx, rx) = mpsc::channel();
    device.set_frame_listener(move |frame: Frame, ty: FrameType| {
        let _ = tx.send((ty, frame));
    })?;
    device.start()?;

    for _ in 0..30 {
        match rx.recv_timeout(Duration::from_millis(200)) {
            Ok((FrameType::Depth, frame)) if frame.format() == FrameFormat::Float => {
                let depth = frame.to_depth_array();
                let center = depth.map(|d| d[[frame.height() / 2, frame.width() / 2]]);
                println!("Depth {} center={:?}", frame.describe(), center);
            }
            Ok((ty, frame)) => println!("{ty:?} {} ({} bytes)", frame.describe(), frame.data().len()),
            Err(_) => println!("No frame yet"),
        }
    }

    device.stop()?;
    device.close()?;
    Ok(())
}
