//! Algebraic laws of the grade and the LUT blend.

use lumagrade_color::{grade, preset, ColorSettings, LutStack, LutStage, LutTable, Rgb};
use proptest::prelude::*;

fn unit_pixel() -> impl Strategy<Value = Rgb> {
    (0.0f32..=1.0, 0.0f32..=1.0, 0.0f32..=1.0).prop_map(|(r, g, b)| Rgb::new(r, g, b))
}

fn any_table() -> impl Strategy<Value = LutTable> {
    (2usize..=5)
        .prop_flat_map(|n| {
            proptest::collection::vec(unit_pixel(), n * n * n).prop_map(move |cells| (n, cells))
        })
        .prop_map(|(n, cells)| LutTable::from_cells(n, cells).unwrap())
}

fn any_settings() -> impl Strategy<Value = ColorSettings> {
    (
        -2.0f32..=2.0,
        proptest::array::uniform7(-100.0f32..=100.0),
    )
        .prop_map(|(exposure, p)| ColorSettings {
            exposure,
            contrast: p[0],
            saturation: p[1],
            vibrance: p[2],
            temperature: p[3],
            tint: p[4],
            highlights: p[5],
            shadows: p[6],
        })
}

proptest! {
    #[test]
    fn default_grade_is_identity(px in unit_pixel()) {
        prop_assert_eq!(grade(px, &ColorSettings::default()), px);
    }

    #[test]
    fn grade_output_stays_in_unit_cube(px in unit_pixel(), settings in any_settings()) {
        let out = grade(px, &settings);
        for v in [out.r, out.g, out.b] {
            prop_assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn zero_intensity_returns_input(table in any_table(), px in unit_pixel()) {
        prop_assert_eq!(table.apply(0.0, px), px);
    }

    #[test]
    fn full_intensity_returns_sample(table in any_table(), px in unit_pixel()) {
        prop_assert_eq!(table.apply(100.0, px), table.sample(px));
    }

    #[test]
    fn identity_table_is_transparent(n in 2usize..=33, px in unit_pixel()) {
        let table = LutTable::identity(n);
        prop_assert!(table.sample(px).max_abs_diff(px) < 1e-5);
    }

    #[test]
    fn sample_stays_in_unit_cube(table in any_table(), px in unit_pixel()) {
        let out = table.sample(px);
        for v in [out.r, out.g, out.b] {
            prop_assert!((0.0..=1.0).contains(&v));
        }
    }
}

#[test]
fn stack_with_presets_matches_manual_composition() {
    let technical = preset("log-to-709").unwrap().table.clone();
    let creative = preset("cinematic").unwrap().table.clone();
    let settings = ColorSettings {
        exposure: 0.5,
        saturation: 20.0,
        ..Default::default()
    };
    let stack = LutStack::new(
        LutStage::new(technical.clone(), 100.0),
        LutStage::new(creative.clone(), 60.0),
    );

    let px = Rgb::new(0.4, 0.45, 0.5);
    let manual = creative.apply(60.0, grade(technical.apply(100.0, px), &settings));
    assert_eq!(stack.apply_pixel(px, &settings), manual);
}
