use serde::Serialize;

use crate::error::PipelineError;
use crate::ocr::Word;

/// Pixel rectangle with inclusive corners, as drawn by a rectangle fill that
/// covers both `(left, top)` and `(right, bottom)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn expand(self, by: i32) -> Self {
        Self {
            left: self.left.saturating_sub(by),
            top: self.top.saturating_sub(by),
            right: self.right.saturating_add(by),
            bottom: self.bottom.saturating_add(by),
        }
    }

    pub fn width(&self) -> i32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> i32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }
}

/// Tight box around every word of a line, grown by `padding` on each side.
pub fn line_bounds(words: &[Word], padding: i32) -> Result<Rect, PipelineError> {
    let Some(first) = words.first() else {
        return Err(PipelineError::GeometryEmpty);
    };
    let mut rect = Rect::new(first.left, first.top, first.right(), first.bottom());
    for word in &words[1..] {
        rect.left = rect.left.min(word.left);
        rect.top = rect.top.min(word.top);
        rect.right = rect.right.max(word.right());
        rect.bottom = rect.bottom.max(word.bottom());
    }
    Ok(rect.expand(padding))
}
