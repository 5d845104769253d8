//! One editing session over a single background image.
//!
//! Boxes live in image space inside the registry. The preview container is
//! the only display space; pointer gestures are resolved there and converted
//! back before they touch a record.

use anyhow::{Context, Result};
use image::RgbaImage;
use std::rc::Rc;
use tracing::{debug, info};

use crate::compose::{
    Compositor, ImageTransformSpec, PNG_MIME, Padding, PaddingStyle, encode_image, to_data_uri,
};
use crate::controller::{
    BoxFrame, ControllerState, DragResizeController, GestureEvent, PointerHost, PointerSource,
    clamp_position,
};
use crate::error::OverlayError;
use crate::geometry::{Axis, Scale, convert_record, convert_record_back, to_display, to_image};
use crate::loader::{LoadState, LoadedImage, PendingImage};
use crate::registry::BoxRegistry;
use crate::settings::Settings;
use crate::sink::ExportSink;
use crate::text_box::TextBoxRecord;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Template for new boxes, in display px.
    pub box_defaults: TextBoxRecord,
    pub min_box_size: f32,
    pub handle_size: f32,
    pub padding_percent: f32,
    pub padding_color: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl SessionOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            box_defaults: settings.text_box.clone(),
            min_box_size: settings.min_box_size,
            handle_size: settings.handle_size,
            padding_percent: settings.padding_percent,
            padding_color: settings.padding_color.clone(),
        }
    }
}

enum ImageState {
    Loading(PendingImage),
    Ready(LoadedImage),
}

pub struct EditorSession {
    image: ImageState,
    registry: BoxRegistry,
    transform: ImageTransformSpec,
    container: Option<Axis>,
    controller: DragResizeController,
    options: SessionOptions,
}

/// Container size for a preview `width` px wide that keeps the image's
/// aspect ratio.
pub fn container_for_width(width: f32, native: Axis) -> Axis {
    if !native.is_positive() || !(width.is_finite() && width > 0.0) {
        return Axis::ZERO;
    }
    Axis::new(width, (width * native.y / native.x).round())
}

impl EditorSession {
    pub fn new(pending: PendingImage, options: SessionOptions, host: Rc<dyn PointerHost>) -> Self {
        let controller =
            DragResizeController::with_limits(host, options.min_box_size, options.handle_size);
        let transform = ImageTransformSpec {
            padding: Padding::new(PaddingStyle::None, options.padding_percent, options.padding_color.clone()),
            ..ImageTransformSpec::default()
        };
        Self {
            image: ImageState::Loading(pending),
            registry: BoxRegistry::new(),
            transform,
            container: None,
            controller,
            options,
        }
    }

    pub fn with_image(image: LoadedImage, options: SessionOptions, host: Rc<dyn PointerHost>) -> Self {
        let mut session = Self::new(PendingImage::ready(image), options, host);
        session.poll_image();
        session
    }

    /// Moves a finished decode into the session. Returns `true` once the
    /// background is available.
    pub fn poll_image(&mut self) -> bool {
        let loaded = match &mut self.image {
            ImageState::Ready(_) => return true,
            ImageState::Loading(pending) => match pending.poll() {
                LoadState::Ready(image) => image,
                LoadState::Loading => return false,
            },
        };
        info!("background ready ({}x{})", loaded.width(), loaded.height());
        self.image = ImageState::Ready(loaded);
        true
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.image, ImageState::Ready(_))
    }

    pub fn image(&self) -> Option<&LoadedImage> {
        match &self.image {
            ImageState::Ready(image) => Some(image),
            ImageState::Loading(_) => None,
        }
    }

    pub fn registry(&self) -> &BoxRegistry {
        &self.registry
    }

    pub fn transform(&self) -> &ImageTransformSpec {
        &self.transform
    }

    pub fn container(&self) -> Option<Axis> {
        self.container
    }

    pub fn gesture_state(&self) -> ControllerState {
        self.controller.state()
    }

    /// Image space to display space. Identity until both the image and the
    /// container are known.
    pub fn scale(&self) -> Scale {
        match (self.image(), self.container) {
            (Some(image), Some(container)) => Scale::between(container, image.size()),
            _ => Scale::IDENTITY,
        }
    }

    /// The scale is only known once the background is decoded and a
    /// container with area is mounted.
    pub fn is_interactive(&mut self) -> bool {
        self.poll_image() && self.container.is_some_and(|container| container.is_positive())
    }

    /// Adds a box from the configured defaults at their display position.
    /// Deferred (returns `None`) until the session is interactive.
    pub fn add_box(&mut self) -> Option<usize> {
        if !self.is_interactive() {
            debug!("add_box ignored before the image and container are known");
            return None;
        }
        let record = convert_record_back(&self.options.box_defaults, self.scale());
        let index = self.registry.add(record);
        debug!("added box {}", index);
        Some(index)
    }

    pub fn remove_box(&mut self, index: usize) -> Option<TextBoxRecord> {
        if self.controller.is_active() {
            self.controller.abort();
        }
        let removed = self.registry.remove_at(index);
        if removed.is_some() {
            debug!("removed box {}", index);
        }
        removed
    }

    /// Full replace with an image-space record.
    pub fn update_box(&mut self, index: usize, record: TextBoxRecord) -> Option<TextBoxRecord> {
        self.registry.update_at(index, record)
    }

    /// The record at `index` as the side editor shows it, in display px.
    pub fn display_record(&self, index: usize) -> Option<TextBoxRecord> {
        let scale = self.scale();
        self.registry
            .get(index)
            .map(|record| convert_record(record, scale))
    }

    /// Full replace with a record edited in display px.
    pub fn update_box_display(
        &mut self,
        index: usize,
        record: &TextBoxRecord,
    ) -> Option<TextBoxRecord> {
        let record = convert_record_back(record, self.scale());
        self.registry.update_at(index, record)
    }

    /// Switches the glyph shadow of box `index` on or off.
    pub fn toggle_border(&mut self, index: usize) -> Option<TextBoxRecord> {
        let record = self.registry.get(index)?;
        let toggled = TextBoxRecord {
            border_style: record.border_style.toggled(),
            ..record.clone()
        };
        self.registry.update_at(index, toggled)
    }

    pub fn select_box(&mut self, index: usize) -> bool {
        self.registry.set_focus(Some(index)) && self.registry.set_last_focus(Some(index))
    }

    /// Hides the side editor.
    pub fn close_editor(&mut self) {
        self.registry.set_last_focus(None);
    }

    /// On-screen rectangles of every box, in registry order.
    pub fn box_frames(&self) -> Vec<BoxFrame> {
        let scale = self.scale();
        self.registry
            .iter()
            .map(|record| BoxFrame {
                position: to_display(record.position(), scale),
                size: to_display(record.size(), scale),
            })
            .collect()
    }

    pub fn pointer_down(&mut self, source: PointerSource, pointer: Axis) -> GestureEvent {
        if !self.is_interactive() {
            return GestureEvent::Ignored;
        }
        let frames = self.box_frames();
        let event = self
            .controller
            .pointer_down(source, pointer, &frames, self.registry.focus());
        match event {
            GestureEvent::Started { index, .. } => {
                self.registry.set_focus(Some(index));
                self.registry.set_last_focus(Some(index));
            }
            GestureEvent::FocusCleared => {
                self.registry.set_focus(None);
            }
            _ => {}
        }
        event
    }

    pub fn pointer_move(&mut self, source: PointerSource, pointer: Axis) -> GestureEvent {
        if !self.poll_image() {
            return GestureEvent::Ignored;
        }
        let event = self.controller.pointer_move(source, pointer, self.container);
        let scale = self.scale();
        let updated = match event {
            GestureEvent::Moved { index, position } => self
                .registry
                .get(index)
                .map(|record| (index, record.with_position(to_image(position, scale)))),
            GestureEvent::Resized { index, size } => self
                .registry
                .get(index)
                .map(|record| (index, record.with_size(to_image(size, scale)))),
            _ => None,
        };
        if let Some((index, record)) = updated {
            self.registry.update_at(index, record);
        }
        event
    }

    pub fn pointer_up(&mut self, source: PointerSource) -> GestureEvent {
        self.controller.pointer_up(source)
    }

    pub fn pointer_cancel(&mut self, source: PointerSource) -> GestureEvent {
        self.controller.pointer_cancel(source)
    }

    /// Releases any active gesture, e.g. when the editor goes away.
    pub fn teardown(&mut self) {
        if let GestureEvent::Ended { index } = self.controller.abort() {
            debug!("gesture on box {} aborted by teardown", index);
        }
    }

    /// Applies a new container size. Boxes keep their display-space size and
    /// font, clamped into the new bounds, and are stored back in image space
    /// under the new scale.
    pub fn resize_container(&mut self, container: Option<Axis>) {
        let old_scale = self.scale();
        let had_area = self.container.is_some_and(|container| container.is_positive());
        self.container = container;
        let Some(container) = container else {
            return;
        };
        if !had_area || !container.is_positive() || !self.is_ready() {
            return;
        }
        let new_scale = self.scale();
        let min_size = self.controller.min_size();
        for index in 0..self.registry.len() {
            let Some(record) = self.registry.get(index) else {
                continue;
            };
            let display = convert_record(record, old_scale);
            let size = display
                .size()
                .min(container)
                .max(Axis::new(min_size, min_size));
            let position = clamp_position(display.position(), size, container);
            let reflowed = convert_record_back(
                &display.with_position(position).with_size(size),
                new_scale,
            );
            self.registry.update_at(index, reflowed);
        }
        debug!(
            "container resized to {}x{}, reflowed {} boxes",
            container.x,
            container.y,
            self.registry.len()
        );
    }

    pub fn flip_x(&mut self) {
        self.transform.scale_x = self.transform.scale_x.toggled();
    }

    pub fn flip_y(&mut self) {
        self.transform.scale_y = self.transform.scale_y.toggled();
    }

    pub fn set_padding(&mut self, padding: Padding) {
        self.transform.padding = padding;
    }

    /// Toolbar toggle: no padding ↔ a top band of the configured size.
    pub fn toggle_padding(&mut self) {
        let style = match self.transform.padding.style {
            PaddingStyle::None => PaddingStyle::Top,
            _ => PaddingStyle::None,
        };
        self.transform.padding = Padding::new(
            style,
            self.options.padding_percent,
            self.options.padding_color.clone(),
        );
    }

    fn background(&self) -> Result<&RgbaImage> {
        self.image().map(LoadedImage::pixels).ok_or_else(|| {
            OverlayError::NoRenderTarget("background image is still loading".to_string()).into()
        })
    }

    pub fn render_preview(&mut self, compositor: &Compositor<'_>) -> Result<RgbaImage> {
        self.poll_image();
        let container = self.container.ok_or_else(|| {
            OverlayError::NoRenderTarget("preview container is not mounted".to_string())
        })?;
        compositor.render_preview(self.background()?, &self.transform, &self.registry, container)
    }

    /// The preview as a PNG `data:` URI for a display surface.
    pub fn preview_data_uri(&mut self, compositor: &Compositor<'_>) -> Result<String> {
        let preview = self.render_preview(compositor)?;
        to_data_uri(&preview, PNG_MIME)
    }

    pub fn export(&mut self, compositor: &Compositor<'_>) -> Result<RgbaImage> {
        self.poll_image();
        compositor.export(self.background()?, &self.transform, &self.registry)
    }

    /// Exports as PNG into `sink` and returns the exported dimensions.
    pub fn save(
        &mut self,
        compositor: &Compositor<'_>,
        sink: &mut dyn ExportSink,
        file_name: &str,
    ) -> Result<(u32, u32)> {
        let image = self.export(compositor)?;
        let bytes = encode_image(&image, PNG_MIME)?;
        sink.save(file_name, &bytes)
            .with_context(|| format!("failed to save export as {}", file_name))?;
        info!("exported {} ({}x{})", file_name, image.width(), image.height());
        Ok(image.dimensions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::Flip;
    use crate::controller::{DetachedHost, GestureKind};
    use crate::font::FontBook;
    use crate::loader::{ImageSource, spawn_load};
    use crate::sink::MemorySink;
    use crate::test_util::FixedAdvance;
    use crate::text_box::BorderStyle;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    fn ready_session() -> EditorSession {
        let image = LoadedImage::from_rgba(RgbaImage::from_pixel(960, 640, image::Rgba([9, 9, 9, 255])));
        let mut session =
            EditorSession::with_image(image, SessionOptions::default(), Rc::new(DetachedHost));
        session.resize_container(Some(Axis::new(480.0, 320.0)));
        session
    }

    #[test]
    fn new_boxes_are_stored_in_image_space() {
        let mut session = ready_session();
        assert_eq!(session.scale(), Scale::uniform(0.5));
        let index = session.add_box().expect("ready");
        let record = session.registry().get(index).unwrap();
        assert_eq!((record.x, record.y, record.width, record.height), (50.0, 50.0, 500.0, 150.0));
        assert_eq!(record.font_size, 48.0);
        assert_eq!(
            session.box_frames(),
            vec![BoxFrame {
                position: Axis::new(25.0, 25.0),
                size: Axis::new(250.0, 75.0)
            }]
        );
        assert_eq!(session.registry().focus(), Some(0));
        assert_eq!(session.registry().last_focus(), Some(0));
    }

    #[test]
    fn boxes_wait_for_a_mounted_container() {
        let image = LoadedImage::from_rgba(RgbaImage::new(960, 640));
        let mut session =
            EditorSession::with_image(image, SessionOptions::default(), Rc::new(DetachedHost));
        assert_eq!(session.add_box(), None);
        assert_eq!(
            session.pointer_down(PointerSource::Mouse, Axis::new(30.0, 30.0)),
            GestureEvent::Ignored
        );
        session.resize_container(Some(Axis::ZERO));
        assert_eq!(session.add_box(), None);

        session.resize_container(Some(Axis::new(480.0, 320.0)));
        session.add_box().expect("interactive");
        assert_eq!(session.box_frames()[0].size, Axis::new(250.0, 75.0));
        assert_eq!(session.display_record(0).unwrap().font_size, 24.0);
    }

    #[test]
    fn drag_updates_image_space_position() {
        let mut session = ready_session();
        session.add_box();
        session.pointer_down(PointerSource::Mouse, Axis::new(30.0, 30.0));
        assert_eq!(session.gesture_state(), ControllerState::Dragging(0));
        session.pointer_move(PointerSource::Mouse, Axis::new(40.0, 50.0));
        let record = session.registry().get(0).unwrap();
        assert_eq!((record.x, record.y), (70.0, 90.0));
        assert_eq!(session.pointer_up(PointerSource::Mouse), GestureEvent::Ended { index: 0 });
        assert_eq!(session.gesture_state(), ControllerState::Idle);
    }

    #[test]
    fn resize_keeps_origin() {
        let mut session = ready_session();
        session.add_box();
        let started = session.pointer_down(PointerSource::Touch, Axis::new(275.0, 100.0));
        assert_eq!(
            started,
            GestureEvent::Started {
                index: 0,
                kind: GestureKind::Resize
            }
        );
        session.pointer_move(PointerSource::Touch, Axis::new(0.0, 0.0));
        let record = session.registry().get(0).unwrap();
        assert_eq!((record.x, record.y), (50.0, 50.0));
        assert_eq!((record.width, record.height), (50.0, 50.0));
    }

    #[test]
    fn pointer_down_outside_keeps_side_editor_open() {
        let mut session = ready_session();
        session.add_box();
        let event = session.pointer_down(PointerSource::Mouse, Axis::new(470.0, 310.0));
        assert_eq!(event, GestureEvent::FocusCleared);
        assert_eq!(session.registry().focus(), None);
        assert_eq!(session.registry().last_focus(), Some(0));
        session.close_editor();
        assert_eq!(session.registry().last_focus(), None);
    }

    #[test]
    fn container_resize_clamps_instead_of_rescaling() {
        let mut session = ready_session();
        session.add_box();
        session.resize_container(Some(Axis::new(200.0, 100.0)));
        let frame = session.box_frames()[0];
        assert!(approx(frame.position.x, 0.0));
        assert!(approx(frame.position.y, 25.0));
        assert!(approx(frame.size.x, 200.0));
        assert!(approx(frame.size.y, 75.0));
        let display = session.display_record(0).unwrap();
        assert!(approx(display.font_size, 24.0));
    }

    #[test]
    fn collapsed_container_leaves_boxes_alone() {
        let mut session = ready_session();
        session.add_box();
        let before = session.registry().get(0).cloned();
        session.resize_container(Some(Axis::ZERO));
        session.resize_container(Some(Axis::new(480.0, 320.0)));
        assert_eq!(session.registry().get(0).cloned(), before);
    }

    #[test]
    fn removing_box_mid_gesture_aborts_it() {
        let mut session = ready_session();
        session.add_box();
        session.pointer_down(PointerSource::Mouse, Axis::new(30.0, 30.0));
        session.remove_box(0);
        assert_eq!(session.gesture_state(), ControllerState::Idle);
        assert_eq!(
            session.pointer_move(PointerSource::Mouse, Axis::new(60.0, 60.0)),
            GestureEvent::Ignored
        );
        assert!(session.registry().is_empty());
    }

    #[test]
    fn toggles_update_transform() {
        let mut session = ready_session();
        session.flip_x();
        session.flip_y();
        session.flip_y();
        assert_eq!(session.transform().scale_x, Flip::Mirrored);
        assert_eq!(session.transform().scale_y, Flip::Normal);
        session.toggle_padding();
        assert_eq!(session.transform().padding.style, PaddingStyle::Top);
        assert_eq!(session.transform().padding.size_percent, 0.2);
        session.toggle_padding();
        assert_eq!(session.transform().padding.style, PaddingStyle::None);
    }

    #[test]
    fn border_toggle_replaces_the_record() {
        let mut session = ready_session();
        session.add_box();
        let previous = session.toggle_border(0).expect("box");
        assert_eq!(previous.border_style, BorderStyle::None);
        assert_eq!(session.registry().get(0).unwrap().border_style, BorderStyle::Solid);
        session.toggle_border(0);
        assert_eq!(session.registry().get(0).unwrap().border_style, BorderStyle::None);
        assert!(session.toggle_border(3).is_none());
    }

    #[test]
    fn preview_and_save_share_the_composition() {
        let mut session = ready_session();
        session.add_box();
        let fonts = FontBook::empty();
        let measure = FixedAdvance(0.5);
        let compositor = Compositor::new(&fonts).with_measure(&measure);
        let preview = session.render_preview(&compositor).expect("preview");
        assert_eq!(preview.dimensions(), (480, 320));
        let uri = session.preview_data_uri(&compositor).expect("data uri");
        assert!(uri.starts_with("data:image/png;base64,"));

        let mut sink = MemorySink::default();
        session.save(&compositor, &mut sink, "out.png").expect("save");
        let (name, bytes) = &sink.saved[0];
        assert_eq!(name, "out.png");
        let decoded = image::load_from_memory(bytes).expect("png").to_rgba8();
        assert_eq!(decoded.dimensions(), (960, 640));
    }

    #[tokio::test]
    async fn loading_session_defers_everything() {
        let pending = spawn_load(ImageSource::Bytes(b"not an image".to_vec()));
        let mut session = EditorSession::new(pending, SessionOptions::default(), Rc::new(DetachedHost));
        session.resize_container(Some(Axis::new(480.0, 320.0)));
        assert_eq!(session.scale(), Scale::IDENTITY);
        assert_eq!(session.add_box(), None);
        assert_eq!(
            session.pointer_down(PointerSource::Mouse, Axis::new(1.0, 1.0)),
            GestureEvent::Ignored
        );
        let fonts = FontBook::empty();
        let err = session.export(&Compositor::new(&fonts)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OverlayError>(),
            Some(OverlayError::NoRenderTarget(_))
        ));
    }

    #[test]
    fn container_follows_image_aspect() {
        assert_eq!(container_for_width(480.0, Axis::new(960.0, 640.0)), Axis::new(480.0, 320.0));
        assert_eq!(container_for_width(480.0, Axis::ZERO), Axis::ZERO);
    }
}
