use anyhow::{Context, Result, anyhow};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::info;

pub mod color;
pub mod compose;
pub mod controller;
pub mod error;
pub mod font;
pub mod geometry;
pub mod layout;
pub mod loader;
pub mod logging;
pub mod registry;
pub mod session;
pub mod settings;
pub mod sink;
mod test_util;
pub mod text_box;

pub use compose::{Compositor, Flip, ImageTransformSpec, Padding, PaddingStyle, ShadowStyle};
pub use controller::{DragResizeController, GestureEvent, PointerHost, PointerSource};
pub use error::OverlayError;
pub use font::{FontBook, TextMeasure};
pub use geometry::{Axis, Scale};
pub use loader::{ImageSource, LoadedImage, PendingImage};
pub use registry::BoxRegistry;
pub use session::{EditorSession, SessionOptions};
pub use sink::{ExportSink, FileSink};
pub use text_box::{BorderStyle, TextAlign, TextBoxRecord};

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub image: String,
    pub output: String,
    pub texts: Vec<String>,
    pub flip_x: bool,
    pub flip_y: bool,
    pub padding: Option<String>,
    pub padding_percent: Option<f32>,
    pub padding_color: Option<String>,
    pub preview_width: Option<f32>,
    pub preview_output: Option<String>,
    pub font: Option<String>,
    pub settings_path: Option<String>,
}

pub async fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;

    let padding = match config.padding.as_deref() {
        Some(value) => Some(parse_padding_style(value)?),
        None => None,
    };
    if let Some(color) = config.padding_color.as_deref() {
        color::parse_rgba(color)?;
    }

    let image = loader::load(ImageSource::Path(PathBuf::from(&config.image))).await?;
    let native = image.size();

    let mut session = EditorSession::with_image(
        image,
        SessionOptions::from_settings(&settings),
        Rc::new(controller::DetachedHost),
    );
    let preview_width = config.preview_width.unwrap_or(settings.preview_width);
    let container = session::container_for_width(preview_width, native);
    session.resize_container(Some(container));

    place_boxes(&mut session, &config.texts);

    if config.flip_x {
        session.flip_x();
    }
    if config.flip_y {
        session.flip_y();
    }
    if let Some(style) = padding {
        session.set_padding(Padding::new(
            style,
            config.padding_percent.unwrap_or(settings.padding_percent),
            config
                .padding_color
                .clone()
                .unwrap_or_else(|| settings.padding_color.clone()),
        ));
    }

    let families = session
        .registry()
        .iter()
        .map(|record| record.font_family.clone())
        .collect::<BTreeSet<_>>();
    let families = families.iter().map(String::as_str).collect::<Vec<_>>();
    let fallback = settings
        .font_fallback
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>();
    let font_path = config.font.as_deref().or(settings.font_path.as_deref()).map(Path::new);
    let fonts = FontBook::load(&families, &fallback, font_path)?;
    let compositor = Compositor::new(&fonts).with_shadow(settings.shadow);

    if let Some(preview_output) = config.preview_output.as_deref() {
        let (mut sink, file_name) = sink_for(preview_output)?;
        let preview = session.render_preview(&compositor)?;
        let bytes = compose::encode_image(&preview, compose::PNG_MIME)?;
        sink.save(&file_name, &bytes)?;
        info!("preview written to {}", preview_output);
    }

    let (mut sink, file_name) = sink_for(&config.output)?;
    let (width, height) = session.save(&compositor, &mut sink, &file_name)?;
    Ok(format!(
        "{}\t{}x{}\t{} boxes",
        config.output,
        width,
        height,
        session.registry().len()
    ))
}

/// One box per text, stacked downward from the default position. Without
/// any text the session starts with a single default box, like a fresh
/// editor does.
fn place_boxes(session: &mut EditorSession, texts: &[String]) {
    let Some(container) = session.container() else {
        return;
    };
    if texts.is_empty() {
        session.add_box();
        return;
    }
    for (idx, text) in texts.iter().enumerate() {
        let Some(index) = session.add_box() else {
            continue;
        };
        let Some(record) = session.display_record(index) else {
            continue;
        };
        let stacked = geometry::Axis::new(record.x, record.y + idx as f32 * record.height);
        let position = controller::clamp_position(stacked, record.size(), container);
        session.update_box_display(index, &record.with_text(text.as_str()).with_position(position));
    }
}

fn sink_for(output: &str) -> Result<(FileSink, String)> {
    let path = Path::new(output);
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("output path has no file name: {}", output))?
        .to_string();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((FileSink::new(dir), file_name))
}

pub fn parse_padding_style(value: &str) -> Result<PaddingStyle> {
    match value.trim().to_ascii_lowercase().as_str() {
        "none" => Ok(PaddingStyle::None),
        "top" => Ok(PaddingStyle::Top),
        "bottom" => Ok(PaddingStyle::Bottom),
        "both" => Ok(PaddingStyle::Both),
        other => Err(anyhow!(
            "invalid padding '{}' (expected none, top, bottom or both)",
            other
        )),
    }
}
