//! Pointer-driven drag and resize of text boxes.
//!
//! Everything here is in display space; the session converts results back to
//! image space. A gesture owns a [`PointerCapture`] for its whole lifetime so
//! the global listeners and body styling are released on every exit path,
//! including dropping the controller mid-gesture.

use std::rc::Rc;
use tracing::debug;

use crate::geometry::Axis;

pub const DEFAULT_MIN_SIZE: f32 = 25.0;
pub const DEFAULT_HANDLE_SIZE: f32 = 24.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerSource {
    Mouse,
    Touch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    Drag,
    Resize,
}

/// Host side of a gesture: global move/up listeners plus cursor and
/// text-selection styling.
pub trait PointerHost {
    fn acquire(&self, source: PointerSource, kind: GestureKind);
    fn release(&self, source: PointerSource);
}

/// Host that has nothing to install, e.g. headless rendering.
#[derive(Debug, Default)]
pub struct DetachedHost;

impl PointerHost for DetachedHost {
    fn acquire(&self, _source: PointerSource, _kind: GestureKind) {}
    fn release(&self, _source: PointerSource) {}
}

/// Held while a gesture is active; releasing happens in `Drop`.
pub struct PointerCapture {
    host: Rc<dyn PointerHost>,
    source: PointerSource,
}

impl PointerCapture {
    fn acquire(host: Rc<dyn PointerHost>, source: PointerSource, kind: GestureKind) -> Self {
        host.acquire(source, kind);
        Self { host, source }
    }
}

impl Drop for PointerCapture {
    fn drop(&mut self) {
        self.host.release(self.source);
    }
}

/// On-screen rectangle of a box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxFrame {
    pub position: Axis,
    pub size: Axis,
}

impl BoxFrame {
    pub fn contains(&self, point: Axis) -> bool {
        point.x >= self.position.x
            && point.y >= self.position.y
            && point.x < self.position.x + self.size.x
            && point.y < self.position.y + self.size.y
    }

    fn handle_contains(&self, point: Axis, handle_size: f32) -> bool {
        let half = handle_size / 2.0;
        let corner = self.position + self.size;
        (point.x - corner.x).abs() <= half && (point.y - corner.y).abs() <= half
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    Body(usize),
    ResizeHandle(usize),
    Outside,
}

/// Finds what a pointer-down lands on. Only the focused box shows a resize
/// handle; bodies are tested top-most first.
pub fn hit_test(
    frames: &[BoxFrame],
    focused: Option<usize>,
    pointer: Axis,
    handle_size: f32,
) -> HitTarget {
    if let Some(index) = focused {
        if frames
            .get(index)
            .is_some_and(|frame| frame.handle_contains(pointer, handle_size))
        {
            return HitTarget::ResizeHandle(index);
        }
    }
    frames
        .iter()
        .enumerate()
        .rev()
        .find(|(_, frame)| frame.contains(pointer))
        .map(|(index, _)| HitTarget::Body(index))
        .unwrap_or(HitTarget::Outside)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Dragging(usize),
    Resizing(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    /// A gesture began on `index`; the box becomes focus and last focus.
    Started { index: usize, kind: GestureKind },
    Moved { index: usize, position: Axis },
    Resized { index: usize, size: Axis },
    Ended { index: usize },
    /// Pointer-down outside every box.
    FocusCleared,
    Ignored,
}

struct ActiveGesture {
    index: usize,
    kind: GestureKind,
    source: PointerSource,
    start_pointer: Axis,
    start_position: Axis,
    start_size: Axis,
    _capture: PointerCapture,
}

pub struct DragResizeController {
    host: Rc<dyn PointerHost>,
    min_size: f32,
    handle_size: f32,
    active: Option<ActiveGesture>,
}

impl DragResizeController {
    pub fn new(host: Rc<dyn PointerHost>) -> Self {
        Self::with_limits(host, DEFAULT_MIN_SIZE, DEFAULT_HANDLE_SIZE)
    }

    pub fn with_limits(host: Rc<dyn PointerHost>, min_size: f32, handle_size: f32) -> Self {
        let min_size = if min_size.is_finite() && min_size > 0.0 {
            min_size
        } else {
            DEFAULT_MIN_SIZE
        };
        Self {
            host,
            min_size,
            handle_size: handle_size.max(0.0),
            active: None,
        }
    }

    pub fn min_size(&self) -> f32 {
        self.min_size
    }

    pub fn state(&self) -> ControllerState {
        match &self.active {
            None => ControllerState::Idle,
            Some(active) => match active.kind {
                GestureKind::Drag => ControllerState::Dragging(active.index),
                GestureKind::Resize => ControllerState::Resizing(active.index),
            },
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn pointer_down(
        &mut self,
        source: PointerSource,
        pointer: Axis,
        frames: &[BoxFrame],
        focused: Option<usize>,
    ) -> GestureEvent {
        if self.active.is_some() {
            return GestureEvent::Ignored;
        }
        let (index, kind) = match hit_test(frames, focused, pointer, self.handle_size) {
            HitTarget::Outside => return GestureEvent::FocusCleared,
            HitTarget::Body(index) => (index, GestureKind::Drag),
            HitTarget::ResizeHandle(index) => (index, GestureKind::Resize),
        };
        let frame = frames[index];
        debug!("gesture {:?} started on box {}", kind, index);
        self.active = Some(ActiveGesture {
            index,
            kind,
            source,
            start_pointer: pointer,
            start_position: frame.position,
            start_size: frame.size,
            _capture: PointerCapture::acquire(Rc::clone(&self.host), source, kind),
        });
        GestureEvent::Started { index, kind }
    }

    /// `container` is the current display size of the preview; `None` means it
    /// is not mounted and the move is dropped.
    pub fn pointer_move(
        &mut self,
        source: PointerSource,
        pointer: Axis,
        container: Option<Axis>,
    ) -> GestureEvent {
        let Some(active) = self.active.as_ref() else {
            return GestureEvent::Ignored;
        };
        if active.source != source {
            return GestureEvent::Ignored;
        }
        let Some(container) = container else {
            return GestureEvent::Ignored;
        };
        let delta = pointer - active.start_pointer;
        match active.kind {
            GestureKind::Drag => GestureEvent::Moved {
                index: active.index,
                position: clamp_position(active.start_position + delta, active.start_size, container),
            },
            GestureKind::Resize => GestureEvent::Resized {
                index: active.index,
                size: clamp_size(
                    active.start_size + delta,
                    active.start_position,
                    container,
                    self.min_size,
                ),
            },
        }
    }

    pub fn pointer_up(&mut self, source: PointerSource) -> GestureEvent {
        self.finish(source)
    }

    pub fn pointer_cancel(&mut self, source: PointerSource) -> GestureEvent {
        self.finish(source)
    }

    /// Drops any gesture regardless of source, e.g. on teardown.
    pub fn abort(&mut self) -> GestureEvent {
        match self.active.take() {
            Some(active) => GestureEvent::Ended {
                index: active.index,
            },
            None => GestureEvent::Ignored,
        }
    }

    fn finish(&mut self, source: PointerSource) -> GestureEvent {
        let owns_gesture = self
            .active
            .as_ref()
            .is_some_and(|active| active.source == source);
        if owns_gesture {
            self.abort()
        } else {
            GestureEvent::Ignored
        }
    }
}

/// Keeps a box of `size` inside `[0, container]`; the origin wins when the
/// box is larger than the container.
pub fn clamp_position(position: Axis, size: Axis, container: Axis) -> Axis {
    Axis::new(
        position.x.min(container.x - size.x).max(0.0),
        position.y.min(container.y - size.y).max(0.0),
    )
}

/// Grows or shrinks toward the far edge without passing the container, and
/// never below `min_size`.
pub fn clamp_size(size: Axis, position: Axis, container: Axis, min_size: f32) -> Axis {
    Axis::new(
        size.x.min(container.x - position.x).max(min_size),
        size.y.min(container.y - position.y).max(min_size),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingHost {
        log: RefCell<Vec<String>>,
    }

    impl RecordingHost {
        fn entries(&self) -> Vec<String> {
            self.log.borrow().clone()
        }
    }

    impl PointerHost for RecordingHost {
        fn acquire(&self, source: PointerSource, kind: GestureKind) {
            self.log
                .borrow_mut()
                .push(format!("acquire {:?} {:?}", source, kind));
        }

        fn release(&self, source: PointerSource) {
            self.log.borrow_mut().push(format!("release {:?}", source));
        }
    }

    fn frame(x: f32, y: f32, w: f32, h: f32) -> BoxFrame {
        BoxFrame {
            position: Axis::new(x, y),
            size: Axis::new(w, h),
        }
    }

    const CONTAINER: Axis = Axis::new(480.0, 320.0);

    fn controller() -> (Rc<RecordingHost>, DragResizeController) {
        let host = Rc::new(RecordingHost::default());
        let controller = DragResizeController::new(host.clone());
        (host, controller)
    }

    #[test]
    fn drag_follows_pointer_delta() {
        let (_, mut controller) = controller();
        let frames = [frame(10.0, 10.0, 100.0, 50.0)];
        let started = controller.pointer_down(PointerSource::Mouse, Axis::new(20.0, 20.0), &frames, None);
        assert_eq!(
            started,
            GestureEvent::Started {
                index: 0,
                kind: GestureKind::Drag
            }
        );
        let moved = controller.pointer_move(PointerSource::Mouse, Axis::new(50.0, 45.0), Some(CONTAINER));
        assert_eq!(
            moved,
            GestureEvent::Moved {
                index: 0,
                position: Axis::new(40.0, 35.0)
            }
        );
    }

    #[test]
    fn drag_is_clamped_into_container() {
        let (_, mut controller) = controller();
        let frames = [frame(10.0, 10.0, 100.0, 50.0)];
        controller.pointer_down(PointerSource::Touch, Axis::new(20.0, 20.0), &frames, None);
        for pointer in [
            Axis::new(-500.0, -500.0),
            Axis::new(9000.0, 9000.0),
            Axis::new(400.0, -3.0),
            Axis::new(100.0, 100.0),
        ] {
            let GestureEvent::Moved { position, .. } =
                controller.pointer_move(PointerSource::Touch, pointer, Some(CONTAINER))
            else {
                panic!("expected move");
            };
            assert!(position.x >= 0.0 && position.x <= CONTAINER.x - 100.0);
            assert!(position.y >= 0.0 && position.y <= CONTAINER.y - 50.0);
        }
    }

    #[test]
    fn resize_respects_min_and_far_edge() {
        let host = Rc::new(RecordingHost::default());
        let mut controller = DragResizeController::with_limits(host, 50.0, 24.0);
        let frames = [frame(400.0, 10.0, 60.0, 60.0)];
        let started =
            controller.pointer_down(PointerSource::Mouse, Axis::new(460.0, 70.0), &frames, Some(0));
        assert_eq!(
            started,
            GestureEvent::Started {
                index: 0,
                kind: GestureKind::Resize
            }
        );
        let grown = controller.pointer_move(PointerSource::Mouse, Axis::new(600.0, 100.0), Some(CONTAINER));
        assert_eq!(
            grown,
            GestureEvent::Resized {
                index: 0,
                size: Axis::new(80.0, 90.0)
            }
        );
        let shrunk = controller.pointer_move(PointerSource::Mouse, Axis::new(0.0, 0.0), Some(CONTAINER));
        assert_eq!(
            shrunk,
            GestureEvent::Resized {
                index: 0,
                size: Axis::new(50.0, 50.0)
            }
        );
    }

    #[test]
    fn degenerate_container_clamps_instead_of_failing() {
        let (_, mut controller) = controller();
        let frames = [frame(0.0, 0.0, 100.0, 100.0)];
        controller.pointer_down(PointerSource::Mouse, Axis::new(100.0, 100.0), &frames, Some(0));
        let event = controller.pointer_move(PointerSource::Mouse, Axis::new(120.0, 120.0), Some(Axis::ZERO));
        assert_eq!(
            event,
            GestureEvent::Resized {
                index: 0,
                size: Axis::new(DEFAULT_MIN_SIZE, DEFAULT_MIN_SIZE)
            }
        );
    }

    #[test]
    fn missing_container_is_a_no_op() {
        let (_, mut controller) = controller();
        let frames = [frame(0.0, 0.0, 100.0, 100.0)];
        controller.pointer_down(PointerSource::Mouse, Axis::new(5.0, 5.0), &frames, None);
        let event = controller.pointer_move(PointerSource::Mouse, Axis::new(50.0, 50.0), None);
        assert_eq!(event, GestureEvent::Ignored);
        assert_eq!(controller.state(), ControllerState::Dragging(0));
    }

    #[test]
    fn second_pointer_is_ignored() {
        let (host, mut controller) = controller();
        let frames = [frame(0.0, 0.0, 100.0, 100.0), frame(200.0, 0.0, 100.0, 100.0)];
        controller.pointer_down(PointerSource::Mouse, Axis::new(5.0, 5.0), &frames, None);
        let second = controller.pointer_down(PointerSource::Touch, Axis::new(205.0, 5.0), &frames, None);
        assert_eq!(second, GestureEvent::Ignored);
        assert_eq!(
            controller.pointer_move(PointerSource::Touch, Axis::new(250.0, 50.0), Some(CONTAINER)),
            GestureEvent::Ignored
        );
        assert_eq!(controller.pointer_up(PointerSource::Touch), GestureEvent::Ignored);
        assert_eq!(controller.state(), ControllerState::Dragging(0));
        assert_eq!(host.entries(), vec!["acquire Mouse Drag"]);
    }

    #[test]
    fn capture_released_on_up_cancel_and_drop() {
        let (host, mut controller) = controller();
        let frames = [frame(0.0, 0.0, 100.0, 100.0)];

        controller.pointer_down(PointerSource::Mouse, Axis::new(5.0, 5.0), &frames, None);
        assert_eq!(controller.pointer_up(PointerSource::Mouse), GestureEvent::Ended { index: 0 });

        controller.pointer_down(PointerSource::Touch, Axis::new(5.0, 5.0), &frames, None);
        assert_eq!(
            controller.pointer_cancel(PointerSource::Touch),
            GestureEvent::Ended { index: 0 }
        );

        controller.pointer_down(PointerSource::Mouse, Axis::new(5.0, 5.0), &frames, None);
        drop(controller);

        assert_eq!(
            host.entries(),
            vec![
                "acquire Mouse Drag",
                "release Mouse",
                "acquire Touch Drag",
                "release Touch",
                "acquire Mouse Drag",
                "release Mouse",
            ]
        );
    }

    #[test]
    fn pointer_down_outside_clears_focus() {
        let (host, mut controller) = controller();
        let frames = [frame(0.0, 0.0, 100.0, 100.0)];
        let event = controller.pointer_down(PointerSource::Mouse, Axis::new(300.0, 300.0), &frames, Some(0));
        assert_eq!(event, GestureEvent::FocusCleared);
        assert_eq!(controller.state(), ControllerState::Idle);
        assert!(host.entries().is_empty());
    }

    #[test]
    fn hit_test_prefers_topmost_and_focused_handle() {
        let frames = [frame(0.0, 0.0, 100.0, 100.0), frame(50.0, 50.0, 100.0, 100.0)];
        assert_eq!(hit_test(&frames, None, Axis::new(60.0, 60.0), 24.0), HitTarget::Body(1));
        assert_eq!(hit_test(&frames, None, Axis::new(10.0, 10.0), 24.0), HitTarget::Body(0));
        assert_eq!(
            hit_test(&frames, Some(0), Axis::new(100.0, 100.0), 24.0),
            HitTarget::ResizeHandle(0)
        );
        assert_eq!(hit_test(&frames, None, Axis::new(100.0, 100.0), 24.0), HitTarget::Body(1));
        assert_eq!(
            hit_test(&frames, Some(1), Axis::new(160.0, 160.0), 24.0),
            HitTarget::ResizeHandle(1)
        );
        assert_eq!(hit_test(&frames, None, Axis::new(160.0, 160.0), 24.0), HitTarget::Outside);
    }
}
