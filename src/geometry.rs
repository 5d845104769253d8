//! Display space ↔ image space conversions.
//!
//! Display space is the on-screen preview container, image space is the
//! native pixel grid of the background. Positions and sizes share the same
//! [`Axis`] type and never cross spaces without an explicit [`Scale`].

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

use crate::text_box::TextBoxRecord;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Axis {
    pub x: f32,
    pub y: f32,
}

impl Axis {
    pub const ZERO: Axis = Axis { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn from_dimensions(width: u32, height: u32) -> Self {
        Self::new(width as f32, height as f32)
    }

    /// Both components are finite and strictly positive.
    pub fn is_positive(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.x > 0.0 && self.y > 0.0
    }

    pub fn max(self, other: Axis) -> Axis {
        Axis::new(self.x.max(other.x), self.y.max(other.y))
    }

    pub fn min(self, other: Axis) -> Axis {
        Axis::new(self.x.min(other.x), self.y.min(other.y))
    }
}

impl Add for Axis {
    type Output = Axis;

    fn add(self, rhs: Axis) -> Axis {
        Axis::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Axis {
    type Output = Axis;

    fn sub(self, rhs: Axis) -> Axis {
        Axis::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Per-axis factor from image space to display space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Scale {
    pub x: f32,
    pub y: f32,
}

impl Default for Scale {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Scale {
    pub const IDENTITY: Scale = Scale { x: 1.0, y: 1.0 };

    /// `display / native` per axis. Falls back to 1 for any axis whose sizes
    /// are unknown, zero or non-finite.
    pub fn between(display: Axis, native: Axis) -> Scale {
        Scale {
            x: axis_factor(display.x, native.x),
            y: axis_factor(display.y, native.y),
        }
    }

    pub fn uniform(factor: f32) -> Scale {
        let factor = if factor.is_finite() && factor > 0.0 {
            factor
        } else {
            1.0
        };
        Scale {
            x: factor,
            y: factor,
        }
    }

    pub fn is_identity(&self) -> bool {
        (self.x - 1.0).abs() < f32::EPSILON && (self.y - 1.0).abs() < f32::EPSILON
    }
}

fn axis_factor(display: f32, native: f32) -> f32 {
    if display.is_finite() && native.is_finite() && display > 0.0 && native > 0.0 {
        display / native
    } else {
        1.0
    }
}

fn safe_factor(factor: f32) -> f32 {
    if factor.is_finite() && factor != 0.0 {
        factor
    } else {
        1.0
    }
}

pub fn to_display(image_point: Axis, scale: Scale) -> Axis {
    Axis::new(image_point.x * scale.x, image_point.y * scale.y)
}

pub fn to_image(display_point: Axis, scale: Scale) -> Axis {
    Axis::new(
        display_point.x / safe_factor(scale.x),
        display_point.y / safe_factor(scale.y),
    )
}

/// Lengths tied to text (font size, stride, shadow) follow the X factor so
/// glyphs never stretch.
pub fn scale_text_length(value: f32, scale: Scale) -> f32 {
    value * scale.x
}

/// Box geometry in the space it is about to be drawn in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxGeometry {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub font_size: f32,
    /// Distance between consecutive baselines in px.
    pub line_stride: f32,
}

/// Scales a record into render geometry, snapping to whole pixels.
pub fn scale_box(record: &TextBoxRecord, scale: Scale) -> BoxGeometry {
    BoxGeometry {
        x: (record.x * scale.x).round(),
        y: (record.y * scale.y).round(),
        width: (record.width * scale.x).floor(),
        height: (record.height * scale.y).round(),
        font_size: scale_text_length(record.font_size, scale).round(),
        line_stride: scale_text_length(record.line_height * record.font_size, scale).round(),
    }
}

/// Maps a whole record from one space to another without snapping.
pub fn convert_record(record: &TextBoxRecord, scale: Scale) -> TextBoxRecord {
    let position = to_display(record.position(), scale);
    let size = to_display(record.size(), scale);
    TextBoxRecord {
        x: position.x,
        y: position.y,
        width: size.x,
        height: size.y,
        font_size: scale_text_length(record.font_size, scale),
        ..record.clone()
    }
}

/// Inverse of [`convert_record`].
pub fn convert_record_back(record: &TextBoxRecord, scale: Scale) -> TextBoxRecord {
    let inverse = Scale {
        x: 1.0 / safe_factor(scale.x),
        y: 1.0 / safe_factor(scale.y),
    };
    convert_record(record, inverse)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Axis, b: Axis) -> bool {
        (a.x - b.x).abs() < 1e-4 && (a.y - b.y).abs() < 1e-4
    }

    #[test]
    fn round_trip_for_common_factors() {
        let points = [
            Axis::new(0.0, 0.0),
            Axis::new(13.0, 7.5),
            Axis::new(1920.0, 1080.0),
        ];
        for factor in [1.0, 0.5, 2.0] {
            let scale = Scale::uniform(factor);
            for p in points {
                assert!(close(to_image(to_display(p, scale), scale), p));
            }
        }
        let uneven = Scale { x: 0.25, y: 2.0 };
        assert!(close(
            to_image(to_display(Axis::new(40.0, 3.0), uneven), uneven),
            Axis::new(40.0, 3.0)
        ));
    }

    #[test]
    fn identity_when_sizes_match() {
        let scale = Scale::between(Axis::new(480.0, 320.0), Axis::new(480.0, 320.0));
        assert!(scale.is_identity());
    }

    #[test]
    fn independent_axes() {
        let scale = Scale::between(Axis::new(480.0, 240.0), Axis::new(960.0, 960.0));
        assert_eq!(scale, Scale { x: 0.5, y: 0.25 });
    }

    #[test]
    fn unknown_native_size_never_divides_by_zero() {
        let scale = Scale::between(Axis::new(480.0, 320.0), Axis::ZERO);
        assert!(scale.is_identity());
        let scale = Scale::between(Axis::ZERO, Axis::new(10.0, 10.0));
        assert!(scale.is_identity());
        let p = to_image(Axis::new(3.0, 4.0), Scale { x: 0.0, y: 0.0 });
        assert_eq!(p, Axis::new(3.0, 4.0));
    }

    #[test]
    fn scale_box_uses_x_factor_for_text() {
        let record = TextBoxRecord {
            x: 10.0,
            y: 10.0,
            width: 100.0,
            height: 50.0,
            font_size: 20.0,
            line_height: 1.5,
            ..TextBoxRecord::default()
        };
        let geometry = scale_box(&record, Scale { x: 2.0, y: 3.0 });
        assert_eq!(geometry.x, 20.0);
        assert_eq!(geometry.y, 30.0);
        assert_eq!(geometry.width, 200.0);
        assert_eq!(geometry.height, 150.0);
        assert_eq!(geometry.font_size, 40.0);
        assert_eq!(geometry.line_stride, 60.0);
    }

    #[test]
    fn scale_box_floors_width() {
        let record = TextBoxRecord {
            width: 33.0,
            ..TextBoxRecord::default()
        };
        let geometry = scale_box(&record, Scale::uniform(0.5));
        assert_eq!(geometry.width, 16.0);
    }

    #[test]
    fn convert_record_round_trips() {
        let record = TextBoxRecord::default();
        let scale = Scale { x: 0.5, y: 0.25 };
        let back = convert_record_back(&convert_record(&record, scale), scale);
        assert!((back.x - record.x).abs() < 1e-4);
        assert!((back.height - record.height).abs() < 1e-4);
        assert!((back.font_size - record.font_size).abs() < 1e-4);
    }
}
