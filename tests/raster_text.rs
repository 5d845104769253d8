use std::path::Path;

use image::{Rgba, RgbaImage};
use text_overlay_rust::{
    BorderStyle, BoxRegistry, Compositor, Flip, FontBook, ImageTransformSpec, TextBoxRecord,
};

const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

fn font_book() -> Option<FontBook> {
    let path = FONT_CANDIDATES
        .iter()
        .map(Path::new)
        .find(|path| path.exists())?;
    FontBook::load(&[], &[], Some(path)).ok()
}

#[test]
fn mirrored_export_keeps_glyphs_and_shadow_readable() {
    let Some(fonts) = font_book() else {
        eprintln!("no font file found; skipping glyph rasterization test");
        return;
    };
    let compositor = Compositor::new(&fonts);
    let mut registry = BoxRegistry::new();
    registry.add(TextBoxRecord {
        text: "HH".to_string(),
        x: 10.0,
        y: 10.0,
        width: 80.0,
        height: 60.0,
        font_size: 30.0,
        color: "#ffffff".to_string(),
        border_style: BorderStyle::Solid,
        border_color: "#000000".to_string(),
        ..TextBoxRecord::default()
    });
    let transform = ImageTransformSpec {
        scale_x: Flip::Mirrored,
        ..ImageTransformSpec::default()
    };
    let background = RgbaImage::from_pixel(200, 100, RED);
    let out = compositor
        .export(&background, &transform, &registry)
        .expect("export");

    let left = out
        .enumerate_pixels()
        .filter(|(x, _, _)| *x < 100)
        .map(|(_, _, pixel)| *pixel)
        .collect::<Vec<_>>();
    assert!(
        left.iter().any(|pixel| pixel[1] > 200),
        "white glyph pixels stay on the left"
    );
    assert!(
        left.iter().any(|pixel| pixel[0] < 200 && pixel[1] < 100),
        "dark shadow pixels around the glyphs"
    );
    assert!(
        out.enumerate_pixels()
            .filter(|(x, _, _)| *x >= 100)
            .all(|(_, _, pixel)| *pixel == RED),
        "nothing drawn on the mirrored side"
    );
}
