use anyhow::Result;

use crate::error::OverlayError;

/// Parses any CSS color string into straight (non-premultiplied) RGBA.
pub fn parse_rgba(value: &str) -> Result<[u8; 4]> {
    let trimmed = value.trim();
    let color = csscolorparser::parse(trimmed)
        .map_err(|err| OverlayError::InvalidColor(format!("'{}' ({})", trimmed, err)))?;
    Ok(color.to_rgba8())
}

/// SVG paint for a CSS color: `#rrggbb` plus its opacity.
pub(crate) struct SvgPaint {
    pub(crate) hex: String,
    pub(crate) opacity: f32,
}

pub(crate) fn svg_paint(value: &str) -> Result<SvgPaint> {
    let [r, g, b, a] = parse_rgba(value)?;
    Ok(SvgPaint {
        hex: format!("#{:02x}{:02x}{:02x}", r, g, b),
        opacity: a as f32 / 255.0,
    })
}

pub(crate) fn is_valid(value: &str) -> bool {
    !value.trim().is_empty() && parse_rgba(value).is_ok()
}
