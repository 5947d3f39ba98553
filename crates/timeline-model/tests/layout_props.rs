use proptest::prelude::*;

use tristack_timeline_model::{FrameSize, LayoutConfig};

proptest! {
    #[test]
    fn stacked_bands_increase_and_never_overlap(
        width in 2u32..4096,
        height in 8u32..8192,
        bands in 1usize..8,
    ) {
        prop_assume!(height as usize >= bands);
        let layout = LayoutConfig::stacked(FrameSize::new(width, height), bands);
        prop_assert!(layout.validate(bands).is_ok());
        prop_assert!(!layout.bands_overlap(bands));

        for i in 1..bands {
            let prev = layout.band_transform(i - 1).translation_offset().1;
            let next = layout.band_transform(i).translation_offset().1;
            prop_assert!(next > prev);
        }

        let last = layout.band_rect(bands - 1);
        prop_assert!(last.bottom() <= height as f64 + 1e-6);
    }

    #[test]
    fn translation_is_independent_of_scale(
        band_w in 1u32..4000,
        band_h in 1u32..4000,
        stride in 1u32..2000,
        index in 0usize..16,
    ) {
        let mut layout = LayoutConfig::legacy();
        layout.band_size = FrameSize::new(band_w, band_h);
        layout.band_stride = stride;

        let (tx, ty) = layout.band_transform(index).translation_offset();
        prop_assert_eq!(tx, 0.0);
        prop_assert!((ty - index as f64 * stride as f64).abs() < 1e-9);
    }
}
