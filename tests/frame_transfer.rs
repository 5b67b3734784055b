/// Copying driver frames into caller-owned frames.
#[cfg(test)]
mod frame_transfer_tests {
    use freenect2::bindings as sys;
    use freenect2::{FloatFormatTagging, Frame, FrameFormat, RawFrame};
    use proptest::prelude::*;

    const DRIVER_FORMATS: [sys::Fn2FrameFormat; 6] = [
        sys::Fn2FrameFormat_Invalid,
        sys::Fn2FrameFormat_Raw,
        sys::Fn2FrameFormat_Float,
        sys::Fn2FrameFormat_BGRX,
        sys::Fn2FrameFormat_RGBX,
        sys::Fn2FrameFormat_Gray,
    ];

    proptest! {
        #[test]
        fn test_buffer_length_follows_the_size_rule(
            width in 0usize..48,
            height in 0usize..48,
            bytes_per_pixel in 1usize..5,
            format in prop::sample::select(DRIVER_FORMATS.to_vec()),
        ) {
            let expected = if format == sys::Fn2FrameFormat_Raw {
                bytes_per_pixel
            } else {
                width * height * bytes_per_pixel
            };
            let payload: Vec<u8> = (0..expected).map(|i| (i % 251) as u8).collect();
            let raw = RawFrame::new(width, height, bytes_per_pixel, format, &payload).unwrap();
            let frame = Frame::copy_from(&raw, FloatFormatTagging::Distinct).unwrap();
            prop_assert_eq!(frame.data().len(), expected);
            prop_assert_eq!(frame.data(), &payload[..]);
        }
    }

    #[test]
    fn test_copy_is_independent_of_the_driver_buffer() {
        let mut driver_buffer = vec![0xFFu8; 512 * 424 * 4];
        let frame = {
            let raw = RawFrame::new(512, 424, 4, sys::Fn2FrameFormat_BGRX, &driver_buffer)
                .unwrap()
                .with_timestamp(1234)
                .with_sequence(42)
                .with_exposure(12.5, 1.25, 3.0)
                .with_status(0);
            Frame::copy_from(&raw, FloatFormatTagging::Distinct).unwrap()
        };
        driver_buffer.fill(0);

        assert_eq!(frame.data().len(), 868_352);
        assert!(frame.data().iter().all(|&b| b == 0xFF));
        assert_eq!(frame.width(), 512);
        assert_eq!(frame.height(), 424);
        assert_eq!(frame.bytes_per_pixel(), 4);
        assert_eq!(frame.timestamp(), 1234);
        assert_eq!(frame.sequence(), 42);
        assert_eq!(frame.exposure(), 12.5);
        assert_eq!(frame.gain(), 1.25);
        assert_eq!(frame.gamma(), 3.0);
        assert!(!frame.errors_occurred());
        assert_eq!(frame.format(), FrameFormat::Bgrx);
    }

    #[test]
    fn test_float_frames_are_tagged_float_by_default() {
        let payload = vec![0u8; 512 * 424 * 4];
        let raw = RawFrame::new(512, 424, 4, sys::Fn2FrameFormat_Float, &payload).unwrap();
        let frame = Frame::copy_from(&raw, FloatFormatTagging::Distinct).unwrap();
        assert_eq!(frame.format(), FrameFormat::Float);
        assert_eq!(frame.to_depth_array().unwrap().dim(), (424, 512));
    }

    #[test]
    fn test_compat_tagging_collapses_float_to_bgrx() {
        let payload = vec![0u8; 16];
        let raw = RawFrame::new(2, 2, 4, sys::Fn2FrameFormat_Float, &payload).unwrap();
        let frame = Frame::copy_from(&raw, FloatFormatTagging::Compat).unwrap();
        assert_eq!(frame.format(), FrameFormat::Bgrx);
        assert!(frame.to_f32_vec().is_none());

        // Only float frames are affected.
        let raw = RawFrame::new(2, 2, 4, sys::Fn2FrameFormat_RGBX, &payload).unwrap();
        let frame = Frame::copy_from(&raw, FloatFormatTagging::Compat).unwrap();
        assert_eq!(frame.format(), FrameFormat::Rgbx);
    }

    #[test]
    fn test_gray_frames_expand_to_rgba() {
        let payload = [0u8, 64, 128, 255];
        let raw = RawFrame::new(2, 2, 1, sys::Fn2FrameFormat_Gray, &payload).unwrap();
        let frame = Frame::copy_from(&raw, FloatFormatTagging::Distinct).unwrap();
        let image = frame.to_rgba_image().unwrap();
        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(image.get_pixel(1, 1).0, [255, 255, 255, 255]);
        assert_eq!(image.get_pixel(1, 0).0, [64, 64, 64, 255]);
    }

    #[test]
    fn test_into_data_hands_over_the_buffer() {
        let payload = [9u8; 6];
        let raw = RawFrame::new(3, 2, 1, sys::Fn2FrameFormat_Gray, &payload).unwrap();
        let mut frame = Frame::copy_from(&raw, FloatFormatTagging::Distinct).unwrap();
        frame.data_mut()[0] = 1;
        let data = frame.into_data();
        assert_eq!(&data[..], &[1, 9, 9, 9, 9, 9]);
    }
}
