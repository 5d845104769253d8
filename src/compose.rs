use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use resvg::render;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::io::Cursor;
use tiny_skia::Pixmap;
use tracing::debug;
use usvg::{Options, Tree};

use crate::color::{parse_rgba, svg_paint};
use crate::error::OverlayError;
use crate::font::{FontBook, TextMeasure};
use crate::geometry::{Axis, Scale, scale_box, scale_text_length};
use crate::layout::layout_box;
use crate::registry::BoxRegistry;
use crate::text_box::{BorderStyle, TextBoxRecord};

pub const PNG_MIME: &str = "image/png";

const HIGHLIGHT_FILL: &str = "#000000";
const HIGHLIGHT_FILL_OPACITY: f32 = 0.5;
const HIGHLIGHT_STROKE: &str = "#3b82f6";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flip {
    #[default]
    Normal,
    Mirrored,
}

impl Flip {
    pub fn toggled(self) -> Self {
        match self {
            Flip::Normal => Flip::Mirrored,
            Flip::Mirrored => Flip::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaddingStyle {
    #[default]
    None,
    Top,
    Bottom,
    Both,
}

/// Solid band added above and/or below the image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Padding {
    pub style: PaddingStyle,
    pub size_percent: f32,
    pub color: String,
}

impl Default for Padding {
    fn default() -> Self {
        Self {
            style: PaddingStyle::None,
            size_percent: 0.2,
            color: "#ffffff".to_string(),
        }
    }
}

impl Padding {
    pub fn new(style: PaddingStyle, size_percent: f32, color: impl Into<String>) -> Self {
        let size_percent = if size_percent.is_finite() {
            size_percent.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            style,
            size_percent,
            color: color.into(),
        }
    }

    /// Total rows added to an image of `image_height` rows.
    pub fn extra_height(&self, image_height: u32) -> u32 {
        let bands = match self.style {
            PaddingStyle::None => return 0,
            PaddingStyle::Top | PaddingStyle::Bottom => 1.0,
            PaddingStyle::Both => 2.0,
        };
        let percent = self.size_percent.clamp(0.0, 1.0);
        (percent * image_height as f32 * bands).round() as u32
    }

    /// Row where the image starts once `extra` rows of padding are added.
    pub fn image_offset(&self, extra: u32) -> u32 {
        match self.style {
            PaddingStyle::None | PaddingStyle::Bottom => 0,
            PaddingStyle::Top => extra,
            PaddingStyle::Both => extra / 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageTransformSpec {
    pub scale_x: Flip,
    pub scale_y: Flip,
    pub padding: Padding,
}

/// Drop shadow drawn under glyphs of boxes with a solid border.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShadowStyle {
    pub blur: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Default for ShadowStyle {
    fn default() -> Self {
        Self {
            blur: 4.0,
            offset_x: 0.0,
            offset_y: 1.0,
        }
    }
}

/// Renders the preview and the export through one code path.
pub struct Compositor<'a> {
    fonts: &'a FontBook,
    measure: &'a dyn TextMeasure,
    shadow: ShadowStyle,
}

impl<'a> Compositor<'a> {
    pub fn new(fonts: &'a FontBook) -> Self {
        Self {
            fonts,
            measure: fonts,
            shadow: ShadowStyle::default(),
        }
    }

    /// Measures with `measure` instead of the font book's own metrics.
    pub fn with_measure(mut self, measure: &'a dyn TextMeasure) -> Self {
        self.measure = measure;
        self
    }

    pub fn with_shadow(mut self, shadow: ShadowStyle) -> Self {
        self.shadow = shadow;
        self
    }

    /// Full-resolution output. Boxes are in image space.
    pub fn export(
        &self,
        background: &RgbaImage,
        transform: &ImageTransformSpec,
        registry: &BoxRegistry,
    ) -> Result<RgbaImage> {
        let native = Axis::from_dimensions(background.width(), background.height());
        self.export_from(background, transform, registry.boxes(), native)
    }

    /// Full-resolution output for boxes recorded against a surface of size
    /// `captured_at` (e.g. a preview container).
    pub fn export_from(
        &self,
        background: &RgbaImage,
        transform: &ImageTransformSpec,
        boxes: &[TextBoxRecord],
        captured_at: Axis,
    ) -> Result<RgbaImage> {
        if boxes.is_empty() {
            return Err(OverlayError::NoRenderTarget("no text box found".to_string()).into());
        }
        let native = Axis::from_dimensions(background.width(), background.height());
        let scale = Scale::between(native, captured_at);
        debug!(
            "exporting {}x{} with {} boxes (scale {:?})",
            background.width(),
            background.height(),
            boxes.len(),
            scale
        );
        self.compose(background, transform, boxes, scale, None)
    }

    /// Scaled-down rendering at the container size, with the focused box
    /// highlighted.
    pub fn render_preview(
        &self,
        background: &RgbaImage,
        transform: &ImageTransformSpec,
        registry: &BoxRegistry,
        display: Axis,
    ) -> Result<RgbaImage> {
        if !display.is_positive() {
            return Err(OverlayError::NoRenderTarget(format!(
                "preview container has no area ({}x{})",
                display.x, display.y
            ))
            .into());
        }
        let width = display.x.round().max(1.0) as u32;
        let height = display.y.round().max(1.0) as u32;
        let resized = if (width, height) == background.dimensions() {
            background.clone()
        } else {
            imageops::resize(background, width, height, FilterType::Triangle)
        };
        let native = Axis::from_dimensions(background.width(), background.height());
        let scale = Scale::between(Axis::from_dimensions(width, height), native);
        self.compose(&resized, transform, registry.boxes(), scale, registry.focus())
    }

    fn compose(
        &self,
        background: &RgbaImage,
        transform: &ImageTransformSpec,
        boxes: &[TextBoxRecord],
        scale: Scale,
        highlight: Option<usize>,
    ) -> Result<RgbaImage> {
        let (width, height) = background.dimensions();
        let extra = transform.padding.extra_height(height);
        let canvas_height = height + extra;
        if width == 0 || canvas_height == 0 {
            return Err(OverlayError::NoRenderTarget(format!(
                "canvas has no area ({}x{})",
                width, canvas_height
            ))
            .into());
        }

        let mut canvas = RgbaImage::new(width, canvas_height);
        let offset = transform.padding.image_offset(extra);
        if extra > 0 {
            let color = Rgba(parse_rgba(&transform.padding.color)?);
            fill_rows(&mut canvas, 0, offset, color);
            fill_rows(&mut canvas, offset + height, canvas_height, color);
        }

        let oriented = orient(background, transform);
        imageops::replace(&mut canvas, &oriented, 0, offset as i64);

        let svg = self.overlay_svg(
            Axis::from_dimensions(width, canvas_height),
            offset as f32,
            boxes,
            scale,
            highlight,
        )?;
        let overlay = self.rasterize(&svg, width, canvas_height)?;
        imageops::overlay(&mut canvas, &overlay, 0, 0);
        Ok(canvas)
    }

    /// SVG document holding every box's text (and the preview highlight).
    ///
    /// `scale` maps box coordinates into canvas pixels; `offset_y` is where
    /// the image starts inside the canvas.
    pub fn overlay_svg(
        &self,
        canvas: Axis,
        offset_y: f32,
        boxes: &[TextBoxRecord],
        scale: Scale,
        highlight: Option<usize>,
    ) -> Result<String> {
        let mut svg = String::new();
        write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = canvas.x,
            h = canvas.y
        )?;

        for (idx, record) in boxes.iter().enumerate() {
            let mut geometry = scale_box(record, scale);
            geometry.y += offset_y;

            if highlight == Some(idx) {
                write!(
                    svg,
                    r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="{fill}" fill-opacity="{opacity}" stroke="{stroke}" stroke-width="1"/>"#,
                    x = geometry.x,
                    y = geometry.y,
                    w = geometry.width,
                    h = geometry.height,
                    fill = HIGHLIGHT_FILL,
                    opacity = HIGHLIGHT_FILL_OPACITY,
                    stroke = HIGHLIGHT_STROKE
                )?;
            }

            let lines = layout_box(record, &geometry, self.measure);
            if lines.is_empty() {
                continue;
            }

            let fill = svg_paint(&record.color)?;
            let mut group_attrs = format!(
                r#"font-family="{family}" font-size="{size}" fill="{fill}""#,
                family = escape_xml(&self.fonts.render_family(&record.font_family)),
                size = geometry.font_size,
                fill = fill.hex
            );
            if fill.opacity < 1.0 {
                write!(group_attrs, r#" fill-opacity="{}""#, fill.opacity)?;
            }
            match record.border_style {
                BorderStyle::None => {}
                BorderStyle::Solid => {
                    let shadow = svg_paint(&record.border_color)?;
                    let filter_id = format!("shadow-{}", idx);
                    write!(
                        svg,
                        r#"<filter id="{id}" x="-50%" y="-50%" width="200%" height="200%"><feDropShadow dx="{dx}" dy="{dy}" stdDeviation="{sigma}" flood-color="{color}" flood-opacity="{opacity}"/></filter>"#,
                        id = filter_id,
                        dx = scale_text_length(self.shadow.offset_x, scale),
                        dy = scale_text_length(self.shadow.offset_y, scale),
                        sigma = scale_text_length(self.shadow.blur, scale) / 2.0,
                        color = shadow.hex,
                        opacity = shadow.opacity
                    )?;
                    write!(group_attrs, r#" filter="url(#{})""#, filter_id)?;
                }
            }

            write!(svg, "<g {}>", group_attrs)?;
            for line in &lines {
                write!(
                    svg,
                    r#"<text x="{x}" y="{y}">{text}</text>"#,
                    x = line.x,
                    y = line.baseline,
                    text = escape_xml(&line.text)
                )?;
            }
            svg.push_str("</g>");
        }

        svg.push_str("</svg>");
        Ok(svg)
    }

    fn rasterize(&self, svg: &str, width: u32, height: u32) -> Result<RgbaImage> {
        let options = Options {
            fontdb: self.fonts.database(),
            ..Options::default()
        };
        let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse overlay SVG")?;
        let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
            OverlayError::NoRenderTarget(format!("cannot allocate {}x{} pixmap", width, height))
        })?;
        render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());
        pixmap_to_image(&pixmap)
    }
}

fn fill_rows(canvas: &mut RgbaImage, from: u32, to: u32, color: Rgba<u8>) {
    let to = to.min(canvas.height());
    if from >= to {
        return;
    }
    let band = RgbaImage::from_pixel(canvas.width(), to - from, color);
    imageops::replace(canvas, &band, 0, from as i64);
}

fn orient(background: &RgbaImage, transform: &ImageTransformSpec) -> RgbaImage {
    let mut oriented = match transform.scale_x {
        Flip::Normal => background.clone(),
        Flip::Mirrored => imageops::flip_horizontal(background),
    };
    if transform.scale_y == Flip::Mirrored {
        imageops::flip_vertical_in_place(&mut oriented);
    }
    oriented
}

fn pixmap_to_image(pixmap: &Pixmap) -> Result<RgbaImage> {
    let mut raw = Vec::with_capacity(pixmap.data().len());
    for pixel in pixmap.pixels() {
        let color = pixel.demultiply();
        raw.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
    }
    RgbaImage::from_raw(pixmap.width(), pixmap.height(), raw)
        .ok_or_else(|| anyhow!("failed to build image buffer from overlay"))
}

pub fn encode_image(image: &RgbaImage, mime: &str) -> Result<Vec<u8>> {
    let format = image_format_from_mime(mime)
        .ok_or_else(|| anyhow!("unsupported output image mime '{}'", mime))?;
    let dynamic = image::DynamicImage::ImageRgba8(image.clone());
    let dynamic = match format {
        image::ImageFormat::Jpeg => image::DynamicImage::ImageRgb8(dynamic.to_rgb8()),
        _ => dynamic,
    };
    let mut bytes = Vec::new();
    dynamic
        .write_to(&mut Cursor::new(&mut bytes), format)
        .with_context(|| format!("failed to encode image as {}", mime))?;
    Ok(bytes)
}

/// `data:` URI for showing a rendered frame on a preview surface.
pub fn to_data_uri(image: &RgbaImage, mime: &str) -> Result<String> {
    let bytes = encode_image(image, mime)?;
    Ok(format!("data:{};base64,{}", mime, BASE64.encode(bytes)))
}

pub fn image_format_from_mime(mime: &str) -> Option<image::ImageFormat> {
    match mime {
        "image/png" => Some(image::ImageFormat::Png),
        "image/jpeg" => Some(image::ImageFormat::Jpeg),
        "image/jpg" => Some(image::ImageFormat::Jpeg),
        "image/webp" => Some(image::ImageFormat::WebP),
        "image/bmp" => Some(image::ImageFormat::Bmp),
        "image/tiff" => Some(image::ImageFormat::Tiff),
        _ => None,
    }
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
