use std::fmt;

/// Failure kinds surfaced by the overlay engine.
///
/// These travel inside `anyhow::Error`; callers that need to branch on the
/// kind use `err.downcast_ref::<OverlayError>()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayError {
    /// The background image could not be decoded.
    ImageLoadFailure(String),
    /// Nothing to render into: no boxes yet, no image yet, or no canvas.
    NoRenderTarget(String),
    /// A box or container collapsed to zero size.
    DegenerateGeometry(String),
    /// A color string could not be parsed.
    InvalidColor(String),
}

impl OverlayError {
    pub fn kind(&self) -> &'static str {
        match self {
            OverlayError::ImageLoadFailure(_) => "image-load-failure",
            OverlayError::NoRenderTarget(_) => "no-render-target",
            OverlayError::DegenerateGeometry(_) => "degenerate-geometry",
            OverlayError::InvalidColor(_) => "invalid-color",
        }
    }
}

impl fmt::Display for OverlayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlayError::ImageLoadFailure(msg) => write!(f, "failed to load image: {}", msg),
            OverlayError::NoRenderTarget(msg) => write!(f, "no render target: {}", msg),
            OverlayError::DegenerateGeometry(msg) => write!(f, "degenerate geometry: {}", msg),
            OverlayError::InvalidColor(msg) => write!(f, "invalid color: {}", msg),
        }
    }
}

impl std::error::Error for OverlayError {}
