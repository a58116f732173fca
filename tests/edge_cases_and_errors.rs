//! Edge case and error handling tests for imageops-matting
//!
//! Covers degenerate sizes, malformed inputs and every fatal error the
//! public API can report.

use std::sync::Arc;

use image::{DynamicImage, Luma, Rgb, RgbImage, Rgba};
use imageops_matting::{
    build_affinities, build_trimap, image_from_raw, matte, normalize_mask, prepare_image, solve,
    Image, MattingConfig, MattingError, MattingPipeline, PrecomputedMask, SolverParams, Trimap,
    TrimapLabel,
};

mod dimension_errors {
    use super::*;

    #[test]
    fn matte_with_mismatched_mask_fails() {
        let image = RgbImage::new(5, 5);
        let mask = Image::from_pixel(5, 4, Luma([0.5f32]));

        let result = matte(&image, &mask, &MattingConfig::default());

        assert!(matches!(
            result,
            Err(MattingError::InvalidMaskShape {
                expected: (5, 5),
                actual: (5, 4)
            })
        ));
    }

    #[test]
    fn model_returning_wrong_size_fails() {
        let model = Arc::new(PrecomputedMask::new(Image::from_pixel(3, 3, Luma([1.0f32]))));
        let pipeline = MattingPipeline::new(model, MattingConfig::default()).unwrap();
        let image = DynamicImage::ImageRgb8(RgbImage::new(4, 4));

        assert!(matches!(
            pipeline.process(&image),
            Err(MattingError::InvalidMaskShape { .. })
        ));
    }

    #[test]
    fn solver_rejects_prior_of_wrong_size() {
        let trimap = Trimap::from_luma(&Image::from_pixel(3, 3, Luma([128u8])));
        let graph = build_affinities(&RgbImage::new(3, 3), &trimap, 1, 1e-4).unwrap();
        let prior = Image::from_pixel(2, 3, Luma([0.5f32]));

        assert!(matches!(
            solve(&trimap, &graph, &prior, &SolverParams::default()),
            Err(MattingError::InvalidMaskShape { .. })
        ));
    }
}

mod layout_errors {
    use super::*;

    #[test]
    fn grayscale_layouts_are_rejected() {
        let gray = DynamicImage::ImageLuma8(Image::new(2, 2));
        let gray_alpha = DynamicImage::ImageLumaA8(Image::new(2, 2));

        assert!(matches!(
            prepare_image(&gray),
            Err(MattingError::UnsupportedChannelLayout { channels: 1, .. })
        ));
        assert!(matches!(
            prepare_image(&gray_alpha),
            Err(MattingError::UnsupportedChannelLayout { channels: 2, .. })
        ));
    }

    #[test]
    fn raw_buffers_need_three_or_four_channels() {
        for channels in [0u8, 1, 2, 5] {
            let data = vec![0; 4 * usize::from(channels)];
            assert!(matches!(
                image_from_raw(2, 2, channels, data),
                Err(MattingError::UnsupportedChannelLayout { color_type: None, .. })
            ));
        }
    }

    #[test]
    fn raw_buffer_length_is_checked() {
        let result = image_from_raw(2, 2, 3, vec![0; 11]);

        assert!(matches!(
            result,
            Err(MattingError::InvalidBufferLength {
                expected: 12,
                actual: 11
            })
        ));
    }

    #[test]
    fn error_messages_name_the_layout() {
        let error = prepare_image(&DynamicImage::ImageLuma16(Image::new(1, 1))).unwrap_err();
        let message = error.to_string();

        assert!(message.contains("1 channel"), "{message}");
        assert!(message.contains("L16"), "{message}");
    }
}

mod degenerate_inputs {
    use super::*;

    #[test]
    fn single_pixel_image() {
        let image = Image::from_pixel(1, 1, Rgb([10u8, 20, 30]));
        let mask = Image::from_pixel(1, 1, Luma([0.5f32]));

        let outcome = matte(&image, &mask, &MattingConfig::default()).unwrap();

        // No known anchors: only the prior pulls on the pixel
        assert_eq!(outcome.trimap.label(0, 0), TrimapLabel::Unknown);
        assert!((outcome.alpha.get_pixel(0, 0)[0] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn single_row_image() {
        let image: RgbImage = Image::from_fn(12, 1, |x, _| Rgb([(x * 20) as u8, 0, 0]));
        let mask = Image::from_fn(12, 1, |x, _| Luma([if x < 6 { 1.0f32 } else { 0.0 }]));
        let config = MattingConfig::builder().erosion_radius(2).build().unwrap();

        let outcome = matte(&image, &mask, &config).unwrap();

        assert_eq!(outcome.alpha.get_pixel(0, 0)[0], 1.0);
        assert_eq!(outcome.alpha.get_pixel(11, 0)[0], 0.0);
        assert_eq!(outcome.trimap.count(TrimapLabel::Unknown), 4);
    }

    #[test]
    fn all_unknown_mask_is_solved_from_prior() {
        let image = Image::from_pixel(6, 6, Rgb([50u8, 60, 70]));
        let mask = Image::from_pixel(6, 6, Luma([0.5f32]));

        let outcome = matte(&image, &mask, &MattingConfig::default()).unwrap();

        assert!(outcome.degradations.is_empty());
        assert!(outcome
            .alpha
            .pixels()
            .all(|Luma([alpha])| (alpha - 0.5).abs() < 1e-3));
    }

    #[test]
    fn non_finite_mask_values_become_unknown() {
        let image = Image::from_pixel(3, 1, Rgb([0u8, 0, 0]));
        let mask: Image<Luma<f32>> =
            Image::from_raw(3, 1, vec![f32::NAN, f32::INFINITY, f32::NEG_INFINITY]).unwrap();
        let trimap = build_trimap(&mask, 0.94, 0.04, 0);

        assert_eq!(trimap.label(0, 0), TrimapLabel::Unknown);
        assert_eq!(trimap.label(1, 0), TrimapLabel::Foreground);
        assert_eq!(trimap.label(2, 0), TrimapLabel::Background);

        let outcome = matte(&image, &mask, &MattingConfig::default()).unwrap();
        assert!(outcome
            .alpha
            .pixels()
            .all(|Luma([alpha])| (0.0..=1.0).contains(alpha)));
    }

    #[test]
    fn erosion_radius_beyond_image_size() {
        let image = RgbImage::new(4, 4);
        let mask = Image::from_fn(4, 4, |x, _| Luma([if x < 2 { 1.0f32 } else { 0.0 }]));
        let config = MattingConfig::builder().erosion_radius(u8::MAX).build().unwrap();

        let outcome = matte(&image, &mask, &config).unwrap();

        assert_eq!(outcome.trimap.count(TrimapLabel::Unknown), 16);
    }

    #[test]
    fn sixteen_bit_mask_is_normalized() {
        let mask: Image<Luma<u16>> = Image::from_raw(3, 1, vec![0, 32768, u16::MAX]).unwrap();
        let normalized = normalize_mask(&mask);

        assert_eq!(normalized.get_pixel(0, 0)[0], 0.0);
        assert!((normalized.get_pixel(1, 0)[0] - 0.5).abs() < 1e-4);
        assert_eq!(normalized.get_pixel(2, 0)[0], 1.0);
    }

    #[test]
    fn rgba_input_alpha_is_replaced_not_multiplied() {
        let rgba: Image<Rgba<u8>> = Image::from_pixel(4, 4, Rgba([9, 8, 7, 0]));
        let model = Arc::new(PrecomputedMask::new(Image::from_pixel(4, 4, Luma([1.0f32]))));
        let pipeline = MattingPipeline::new(model, MattingConfig::default()).unwrap();

        let outcome = pipeline.process(&DynamicImage::ImageRgba8(rgba)).unwrap();

        assert!(outcome
            .image
            .pixels()
            .all(|pixel| *pixel == Rgba([9, 8, 7, 255])));
    }
}

mod config_errors {
    use super::*;

    #[test]
    fn malformed_json_is_a_format_error() {
        assert!(matches!(
            MattingConfig::from_json_str("{ erosion_radius: 3 }"),
            Err(MattingError::ConfigFormat(_))
        ));
    }

    #[test]
    fn out_of_range_json_is_an_invalid_config() {
        assert!(matches!(
            MattingConfig::from_json_str(r#"{ "fg_threshold": 0.01 }"#),
            Err(MattingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn oversized_window_radius_is_rejected_before_matting() {
        let config = MattingConfig {
            window_radius: u32::MAX,
            ..MattingConfig::default()
        };
        let image = RgbImage::new(4, 4);
        let mask = Image::from_fn(4, 4, |x, _| Luma([if x < 2 { 1.0f32 } else { 0.0 }]));

        assert!(matches!(
            matte(&image, &mask, &config),
            Err(MattingError::InvalidConfig(_))
        ));
        assert!(matches!(
            MattingConfig::from_json_str(r#"{ "window_radius": 4294967295 }"#),
            Err(MattingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn matte_validates_hand_built_config() {
        let config = MattingConfig {
            variance_floor: f64::NAN,
            ..MattingConfig::default()
        };
        let image = RgbImage::new(2, 2);
        let mask = Image::from_pixel(2, 2, Luma([0.5f32]));

        assert!(matches!(
            matte(&image, &mask, &config),
            Err(MattingError::InvalidConfig(_))
        ));
    }
}
