use anyhow::{Context, Result, anyhow};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use ttf_parser::Face;
use ttf_parser::name_id;
use usvg::fontdb;

/// Measures the advance width of a run of text.
///
/// Preview and export must measure through the same implementation so that
/// both wrap the same words onto the same lines.
pub trait TextMeasure {
    fn measure(&self, text: &str, font_family: &str, font_size: f32) -> f32;
}

impl<T: TextMeasure + ?Sized> TextMeasure for &T {
    fn measure(&self, text: &str, font_family: &str, font_size: f32) -> f32 {
        (**self).measure(text, font_family, font_size)
    }
}

#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    units_per_em: u16,
    space_advance: u16,
    family: Option<String>,
    face_index: u32,
}

impl FontMetrics {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    pub fn text_width(&self, text: &str, font_size: f32) -> f32 {
        let Ok(face) = Face::parse(&self.data, self.face_index) else {
            return EstimatedMetrics.text_width(text, font_size);
        };
        let mut advance = 0u32;
        for ch in text.chars() {
            if ch == '\n' {
                continue;
            }
            if ch == ' ' {
                advance = advance.saturating_add(self.space_advance as u32);
                continue;
            }
            let glyph_advance = face
                .glyph_index(ch)
                .and_then(|glyph| face.glyph_hor_advance(glyph))
                .unwrap_or(self.space_advance);
            advance = advance.saturating_add(glyph_advance as u32);
        }
        let units = self.units_per_em.max(1) as f32;
        advance as f32 * (font_size / units)
    }
}

impl TextMeasure for FontMetrics {
    fn measure(&self, text: &str, _font_family: &str, font_size: f32) -> f32 {
        self.text_width(text, font_size)
    }
}

/// Width heuristic used when no font file is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimatedMetrics;

impl EstimatedMetrics {
    pub fn text_width(&self, text: &str, font_size: f32) -> f32 {
        text.chars().map(estimate_char_units).sum::<f32>() * font_size
    }
}

impl TextMeasure for EstimatedMetrics {
    fn measure(&self, text: &str, _font_family: &str, font_size: f32) -> f32 {
        self.text_width(text, font_size)
    }
}

fn estimate_char_units(ch: char) -> f32 {
    if ch == '\n' {
        0.0
    } else if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else if matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF
    ) {
        1.0
    } else {
        0.9
    }
}

pub fn load_font_metrics(path: &Path) -> Result<FontMetrics> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    load_font_metrics_from_data(&data, None)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

/// Fonts shared by layout and rasterization.
///
/// Every family a box asks for is resolved once against the font database;
/// measurement and the SVG overlay then use that same face.
pub struct FontBook {
    db: Arc<fontdb::Database>,
    faces: HashMap<String, FontMetrics>,
    fallback: Option<FontMetrics>,
}

impl Default for FontBook {
    fn default() -> Self {
        Self::empty()
    }
}

impl FontBook {
    /// No fonts at all: measurement uses [`EstimatedMetrics`] and text renders
    /// nothing. Deterministic, which is what tests want.
    pub fn empty() -> Self {
        Self {
            db: Arc::new(fontdb::Database::new()),
            faces: HashMap::new(),
            fallback: None,
        }
    }

    /// Loads system fonts plus an optional font file and resolves the given
    /// families. Families that cannot be found fall back to the first
    /// resolvable entry of `fallback`.
    pub fn load(families: &[&str], fallback: &[&str], font_path: Option<&Path>) -> Result<Self> {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        let mut book_fallback = None;
        if let Some(path) = font_path {
            let metrics = load_font_metrics(path)?;
            db.load_font_data(metrics.data().to_vec());
            book_fallback = Some(metrics);
        }

        let mut faces = HashMap::new();
        for family in families {
            let key = family_key(family);
            if faces.contains_key(&key) {
                continue;
            }
            match load_font_metrics_from_family(&db, family) {
                Ok(metrics) => {
                    faces.insert(key, metrics);
                }
                Err(err) => debug!("font family '{}' unavailable: {}", family, err),
            }
        }
        if book_fallback.is_none() {
            book_fallback = fallback
                .iter()
                .find_map(|family| load_font_metrics_from_family(&db, family).ok());
        }

        Ok(Self {
            db: Arc::new(db),
            faces,
            fallback: book_fallback,
        })
    }

    pub fn database(&self) -> Arc<fontdb::Database> {
        Arc::clone(&self.db)
    }

    pub fn metrics(&self, family: &str) -> Option<&FontMetrics> {
        self.faces
            .get(&family_key(family))
            .or(self.fallback.as_ref())
    }

    /// Family name to hand to the rasterizer for a requested family.
    pub fn render_family(&self, family: &str) -> String {
        self.metrics(family)
            .and_then(|metrics| metrics.family())
            .map(|name| name.to_string())
            .unwrap_or_else(|| family.to_string())
    }
}

impl TextMeasure for FontBook {
    fn measure(&self, text: &str, font_family: &str, font_size: f32) -> f32 {
        match self.metrics(font_family) {
            Some(metrics) => metrics.text_width(text, font_size),
            None => EstimatedMetrics.text_width(text, font_size),
        }
    }
}

fn family_key(family: &str) -> String {
    family.trim().to_ascii_lowercase()
}

fn load_font_metrics_from_data(data: &[u8], preferred_family: Option<&str>) -> Result<FontMetrics> {
    let mut fallback = None;
    let count = ttf_parser::fonts_in_collection(data).unwrap_or(1);
    for index in 0..count {
        if let Ok(face) = Face::parse(data, index) {
            let family = extract_family_name(&face);
            let units_per_em = face.units_per_em().max(1);
            let space_advance = face
                .glyph_index(' ')
                .and_then(|id| face.glyph_hor_advance(id))
                .unwrap_or(units_per_em / 2);
            let metrics = FontMetrics {
                data: Arc::new(data.to_vec()),
                units_per_em,
                space_advance,
                family: family.clone(),
                face_index: index,
            };
            if let (Some(preferred), Some(found)) = (preferred_family, &family) {
                if found.eq_ignore_ascii_case(preferred) {
                    return Ok(metrics);
                }
            }
            if fallback.is_none() {
                fallback = Some(metrics);
            }
        }
    }
    fallback.ok_or_else(|| anyhow!("failed to parse font data"))
}

fn load_font_metrics_from_family(db: &fontdb::Database, family: &str) -> Result<FontMetrics> {
    let families = match family.trim().to_ascii_lowercase().as_str() {
        "sans-serif" => vec![fontdb::Family::SansSerif],
        "serif" => vec![fontdb::Family::Serif],
        "monospace" => vec![fontdb::Family::Monospace],
        _ => vec![fontdb::Family::Name(family)],
    };
    let query = fontdb::Query {
        families: &families,
        ..Default::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| anyhow!("font not found: {}", family))?;
    let data = db
        .with_face_data(id, |data, _index| data.to_vec())
        .ok_or_else(|| anyhow!("failed to load font data: {}", family))?;
    load_font_metrics_from_data(&data, Some(family))
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}
