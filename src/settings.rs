use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::color;
use crate::compose::ShadowStyle;
use crate::controller::{DEFAULT_HANDLE_SIZE, DEFAULT_MIN_SIZE};
use crate::text_box::{BorderStyle, TextAlign, TextBoxRecord};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub preview_width: f32,
    pub min_box_size: f32,
    pub handle_size: f32,
    /// New boxes, in display px.
    pub text_box: TextBoxRecord,
    pub shadow: ShadowStyle,
    pub padding_percent: f32,
    pub padding_color: String,
    pub font_path: Option<String>,
    pub font_fallback: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            preview_width: 480.0,
            min_box_size: DEFAULT_MIN_SIZE,
            handle_size: DEFAULT_HANDLE_SIZE,
            text_box: TextBoxRecord::default(),
            shadow: ShadowStyle::default(),
            padding_percent: 0.2,
            padding_color: "#ffffff".to_string(),
            font_path: None,
            font_fallback: vec!["sans-serif".to_string()],
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    editor: Option<EditorSettings>,
    text_box: Option<TextBoxSettings>,
    shadow: Option<ShadowSettings>,
    padding: Option<PaddingSettings>,
    fonts: Option<FontSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct EditorSettings {
    preview_width: Option<f32>,
    min_box_size: Option<f32>,
    handle_size: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct TextBoxSettings {
    text: Option<String>,
    font_size: Option<f32>,
    line_height: Option<f32>,
    x: Option<f32>,
    y: Option<f32>,
    width: Option<f32>,
    height: Option<f32>,
    color: Option<String>,
    font_family: Option<String>,
    border_style: Option<BorderStyle>,
    border_color: Option<String>,
    text_align: Option<TextAlign>,
}

#[derive(Debug, Default, Deserialize)]
struct ShadowSettings {
    blur: Option<f32>,
    offset_x: Option<f32>,
    offset_y: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct PaddingSettings {
    size_percent: Option<f32>,
    color: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FontSettings {
    path: Option<String>,
    fallback: Option<Vec<String>>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    settings.merge(parse_settings(DEFAULT_SETTINGS_TOML, Path::new("<built-in>"))?);
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings.merge(parse_settings(&content, &path)?);
        }
    }

    Ok(settings)
}

fn parse_settings(content: &str, path: &Path) -> Result<SettingsFile> {
    toml::from_str(content).with_context(|| format!("failed to parse settings: {}", path.display()))
}

fn positive(value: Option<f32>) -> Option<f32> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

fn non_negative(value: Option<f32>) -> Option<f32> {
    value.filter(|v| v.is_finite() && *v >= 0.0)
}

fn valid_color(value: Option<String>) -> Option<String> {
    value.filter(|color| color::is_valid(color))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(editor) = incoming.editor {
            if let Some(width) = positive(editor.preview_width) {
                self.preview_width = width;
            }
            if let Some(size) = positive(editor.min_box_size) {
                self.min_box_size = size;
            }
            if let Some(size) = non_negative(editor.handle_size) {
                self.handle_size = size;
            }
        }
        if let Some(text_box) = incoming.text_box {
            let target = &mut self.text_box;
            if let Some(text) = text_box.text {
                target.text = text;
            }
            if let Some(size) = positive(text_box.font_size) {
                target.font_size = size;
            }
            if let Some(line_height) = positive(text_box.line_height) {
                target.line_height = line_height;
            }
            if let Some(x) = non_negative(text_box.x) {
                target.x = x;
            }
            if let Some(y) = non_negative(text_box.y) {
                target.y = y;
            }
            if let Some(width) = positive(text_box.width) {
                target.width = width;
            }
            if let Some(height) = positive(text_box.height) {
                target.height = height;
            }
            if let Some(color) = valid_color(text_box.color) {
                target.color = color;
            }
            if let Some(family) = non_empty(text_box.font_family) {
                target.font_family = family;
            }
            if let Some(style) = text_box.border_style {
                target.border_style = style;
            }
            if let Some(color) = valid_color(text_box.border_color) {
                target.border_color = color;
            }
            if let Some(align) = text_box.text_align {
                target.text_align = align;
            }
        }
        if let Some(shadow) = incoming.shadow {
            if let Some(blur) = non_negative(shadow.blur) {
                self.shadow.blur = blur;
            }
            if let Some(offset) = shadow.offset_x.filter(|v| v.is_finite()) {
                self.shadow.offset_x = offset;
            }
            if let Some(offset) = shadow.offset_y.filter(|v| v.is_finite()) {
                self.shadow.offset_y = offset;
            }
        }
        if let Some(padding) = incoming.padding {
            if let Some(percent) = non_negative(padding.size_percent) {
                self.padding_percent = percent.min(1.0);
            }
            if let Some(color) = valid_color(padding.color) {
                self.padding_color = color;
            }
        }
        if let Some(fonts) = incoming.fonts {
            if let Some(path) = non_empty(fonts.path) {
                self.font_path = Some(path);
            }
            if let Some(fallback) = fonts.fallback {
                let fallback: Vec<String> = fallback
                    .into_iter()
                    .filter(|family| !family.trim().is_empty())
                    .collect();
                if !fallback.is_empty() {
                    self.font_fallback = fallback;
                }
            }
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".text-overlay-rust"))
        }
    })
}
