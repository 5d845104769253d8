use crate::font::TextMeasure;
use crate::geometry::BoxGeometry;
use crate::text_box::{TextAlign, TextBoxRecord};

/// One wrapped line, positioned in render space.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutLine {
    pub text: String,
    pub width: f32,
    /// Left edge of the line.
    pub x: f32,
    pub baseline: f32,
}

/// Greedy word wrap. Lines break only at spaces; a word that does not fit on
/// an empty line still gets a line of its own. `'\n'` forces a break.
pub fn wrap_text<M: TextMeasure + ?Sized>(
    text: &str,
    font_family: &str,
    font_size: f32,
    max_width: f32,
    measure: &M,
) -> Vec<String> {
    let mut result = Vec::new();
    for paragraph in text.split('\n') {
        wrap_paragraph(paragraph, font_family, font_size, max_width, measure, &mut result);
    }
    result
}

fn wrap_paragraph<M: TextMeasure + ?Sized>(
    paragraph: &str,
    font_family: &str,
    font_size: f32,
    max_width: f32,
    measure: &M,
    out: &mut Vec<String>,
) {
    let mut current = String::new();
    for word in paragraph.split(' ').filter(|word| !word.is_empty()) {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{} {}", current, word);
        if measure.measure(&candidate, font_family, font_size) > max_width {
            out.push(std::mem::take(&mut current));
            current.push_str(word);
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
}

/// Wraps and places the lines of one box inside `geometry`.
pub fn layout_box<M: TextMeasure + ?Sized>(
    record: &TextBoxRecord,
    geometry: &BoxGeometry,
    measure: &M,
) -> Vec<LayoutLine> {
    let family = record.font_family.as_str();
    let lines = wrap_text(
        &record.text,
        family,
        geometry.font_size,
        geometry.width,
        measure,
    );
    let first_baseline = geometry.y + geometry.font_size;

    lines
        .into_iter()
        .enumerate()
        .map(|(index, text)| {
            let width = measure.measure(&text, family, geometry.font_size);
            let x = match record.text_align {
                TextAlign::Left => geometry.x,
                TextAlign::Center => geometry.x + (geometry.width - width) / 2.0,
                TextAlign::Right => geometry.x + geometry.width - width,
            };
            LayoutLine {
                text,
                width,
                x,
                baseline: first_baseline + index as f32 * geometry.line_stride,
            }
        })
        .collect()
}
