use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderStyle {
    #[default]
    None,
    Solid,
}

impl BorderStyle {
    pub fn toggled(self) -> Self {
        match self {
            BorderStyle::None => BorderStyle::Solid,
            BorderStyle::Solid => BorderStyle::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// One text overlay.
///
/// Geometry and `font_size` live in whatever space the owner stores boxes in;
/// inside an editing session that is image space. `line_height` is a unitless
/// multiplier of `font_size`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBoxRecord {
    pub text: String,
    pub font_size: f32,
    pub line_height: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub color: String,
    pub font_family: String,
    pub border_style: BorderStyle,
    pub border_color: String,
    pub text_align: TextAlign,
}

impl Default for TextBoxRecord {
    fn default() -> Self {
        Self {
            text: "Enter text here".to_string(),
            font_size: 24.0,
            line_height: 1.2,
            x: 25.0,
            y: 25.0,
            width: 250.0,
            height: 75.0,
            color: "#ffffff".to_string(),
            font_family: "Arial".to_string(),
            border_style: BorderStyle::None,
            border_color: "#000000".to_string(),
            text_align: TextAlign::Left,
        }
    }
}

impl TextBoxRecord {
    pub fn position(&self) -> crate::geometry::Axis {
        crate::geometry::Axis::new(self.x, self.y)
    }

    pub fn size(&self) -> crate::geometry::Axis {
        crate::geometry::Axis::new(self.width, self.height)
    }

    pub fn with_position(&self, position: crate::geometry::Axis) -> Self {
        Self {
            x: position.x,
            y: position.y,
            ..self.clone()
        }
    }

    pub fn with_size(&self, size: crate::geometry::Axis) -> Self {
        Self {
            width: size.x,
            height: size.y,
            ..self.clone()
        }
    }

    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..self.clone()
        }
    }
}
