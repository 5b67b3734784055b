/// Handler installation, replacement, and release through a device session.
#[cfg(test)]
mod listener_bridge_tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    use freenect2::bindings as sys;
    use freenect2::{
        BridgeConfig, Context, Device, Frame, FrameHandler, FrameType, RawFrame, VirtualDeviceHandle,
        VirtualDeviceSpec, VirtualDriver,
    };

    /// A handler that counts its frames and its release.
    struct Recorder {
        frames: Arc<AtomicUsize>,
        releases: Arc<AtomicUsize>,
    }

    impl FrameHandler for Recorder {
        fn on_frame(&mut self, _frame: Frame, _ty: FrameType) {
            self.frames.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Drop for Recorder {
        fn drop(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default, Clone)]
    struct Counters {
        frames: Arc<AtomicUsize>,
        releases: Arc<AtomicUsize>,
    }

    impl Counters {
        fn recorder(&self) -> Box<Recorder> {
            Box::new(Recorder {
                frames: Arc::clone(&self.frames),
                releases: Arc::clone(&self.releases),
            })
        }

        fn frames(&self) -> usize {
            self.frames.load(Ordering::SeqCst)
        }

        fn releases(&self) -> usize {
            self.releases.load(Ordering::SeqCst)
        }
    }

    /// A handler that notices frames arriving after it was swapped out.
    struct Retirable {
        retired: Arc<AtomicBool>,
        late: Arc<AtomicUsize>,
        counters: Counters,
    }

    impl FrameHandler for Retirable {
        fn on_frame(&mut self, _frame: Frame, _ty: FrameType) {
            if self.retired.load(Ordering::SeqCst) {
                self.late.fetch_add(1, Ordering::SeqCst);
            }
            self.counters.frames.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Drop for Retirable {
        fn drop(&mut self) {
            self.counters.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn open() -> (Context, Device, VirtualDeviceHandle) {
        let driver = VirtualDriver::new();
        let handle = driver.attach(VirtualDeviceSpec::new("listener"));
        let context = Context::with_driver(driver, BridgeConfig::default());
        let device = context.open_default_device().unwrap();
        (context, device, handle)
    }

    fn emit(handle: &VirtualDeviceHandle, ty: FrameType) -> bool {
        let payload = [0u8; 4];
        let raw = RawFrame::new(1, 1, 4, sys::Fn2FrameFormat_Float, &payload).unwrap();
        handle.emit(ty, &raw)
    }

    #[test]
    fn test_replacement_releases_previous_exactly_once() {
        let (_context, mut device, handle) = open();
        let first = Counters::default();
        let second = Counters::default();

        device.set_frame_handler(first.recorder()).unwrap();
        device.start().unwrap();
        assert!(emit(&handle, FrameType::Depth));
        assert_eq!(first.frames(), 1);

        device.set_frame_handler(second.recorder()).unwrap();
        assert_eq!(first.releases(), 1);
        assert_eq!(second.releases(), 0);

        assert!(emit(&handle, FrameType::Ir));
        assert!(emit(&handle, FrameType::Depth));
        assert_eq!(first.frames(), 1);
        assert_eq!(second.frames(), 2);

        drop(device);
        assert_eq!(first.releases(), 1);
        assert_eq!(second.releases(), 1);
    }

    #[test]
    fn test_drop_releases_while_streaming() {
        let (_context, mut device, handle) = open();
        let counters = Counters::default();
        device.set_frame_handler(counters.recorder()).unwrap();
        device.start().unwrap();
        drop(device);
        assert_eq!(counters.releases(), 1);
        assert!(!handle.is_open());
        assert!(!handle.has_listener());
        assert!(!emit(&handle, FrameType::Color));
    }

    #[test]
    fn test_drop_after_close_releases_once() {
        let (_context, mut device, _handle) = open();
        let counters = Counters::default();
        device.set_frame_handler(counters.recorder()).unwrap();
        device.close().unwrap();
        assert_eq!(counters.releases(), 0);
        drop(device);
        assert_eq!(counters.releases(), 1);
    }

    #[test]
    fn test_handler_rejected_after_close_is_released() {
        let (_context, mut device, _handle) = open();
        device.close().unwrap();
        let counters = Counters::default();
        assert!(device.set_frame_handler(counters.recorder()).is_err());
        assert_eq!(counters.releases(), 1);
    }

    #[test]
    fn test_bridge_is_attached_once() {
        let (_context, mut device, handle) = open();
        assert!(!handle.has_listener());
        device.set_frame_listener(|_: Frame, _: FrameType| {}).unwrap();
        assert!(handle.has_listener());
        assert!(device.has_listener());
        device.set_frame_listener(|_: Frame, _: FrameType| {}).unwrap();
        assert!(handle.has_listener());
    }

    #[test]
    fn test_unknown_stream_type_is_dropped() {
        let (_context, mut device, handle) = open();
        let counters = Counters::default();
        device.set_frame_handler(counters.recorder()).unwrap();
        device.start().unwrap();
        let payload = [0u8; 4];
        let raw = RawFrame::new(1, 1, 4, sys::Fn2FrameFormat_Float, &payload).unwrap();
        assert!(handle.emit_raw_type(8, &raw));
        assert_eq!(counters.frames(), 0);
        assert!(emit(&handle, FrameType::Color));
        assert_eq!(counters.frames(), 1);
    }

    #[test]
    fn test_panicking_handler_keeps_the_stream_alive() {
        let (_context, mut device, handle) = open();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        device
            .set_frame_listener(move |_: Frame, _: FrameType| {
                if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("first frame");
                }
            })
            .unwrap();
        device.start().unwrap();
        assert!(emit(&handle, FrameType::Color));
        assert!(emit(&handle, FrameType::Color));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_replacement_races_the_capture_thread() {
        let driver = VirtualDriver::new();
        driver.attach(
            VirtualDeviceSpec::new("racing")
                .with_capture(Duration::from_millis(1))
                .with_frame_sizes((8, 4), (4, 2)),
        );
        let context = Context::with_driver(driver, BridgeConfig::default());
        let mut device = context.open_default_device().unwrap();
        let late = Arc::new(AtomicUsize::new(0));

        let install = |device: &mut Device| {
            let retired = Arc::new(AtomicBool::new(false));
            let counters = Counters::default();
            let handler = Box::new(Retirable {
                retired: Arc::clone(&retired),
                late: Arc::clone(&late),
                counters: counters.clone(),
            });
            device.set_frame_handler(handler).unwrap();
            (retired, counters)
        };

        let mut installed = vec![install(&mut device)];
        device.start().unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while installed[0].1.frames() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(installed[0].1.frames() > 0);

        for _ in 0..50 {
            let next = install(&mut device);
            let (retired, counters) = installed.last().unwrap();
            retired.store(true, Ordering::SeqCst);
            assert_eq!(counters.releases(), 1);
            installed.push(next);
            thread::sleep(Duration::from_micros(500));
        }
        device.stop().unwrap();
        drop(device);

        assert_eq!(late.load(Ordering::SeqCst), 0);
        for (_, counters) in &installed {
            assert_eq!(counters.releases(), 1);
        }
        assert!(installed.iter().map(|(_, counters)| counters.frames()).sum::<usize>() > 0);
    }
}
