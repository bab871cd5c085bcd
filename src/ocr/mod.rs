mod parse;
mod space;

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

use crate::error::PipelineError;

pub use parse::parse_response;
pub use space::OcrSpace;

/// One recognized token with its pixel box, origin top-left.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl Word {
    pub fn new(text: impl Into<String>, left: i32, top: i32, width: i32, height: i32) -> Self {
        Self {
            text: text.into(),
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.left.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.top.saturating_add(self.height)
    }
}

/// A recognized line. Lines surfaced by a [`TextLocator`] always carry at
/// least one word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    pub words: Vec<Word>,
}

impl TextLine {
    pub fn new(text: impl Into<String>, words: Vec<Word>) -> Self {
        Self {
            text: text.into(),
            words,
        }
    }

    pub fn first_word(&self) -> Option<&Word> {
        self.words.first()
    }
}

pub type LocateFuture = Pin<Box<dyn Future<Output = Result<Vec<TextLine>, PipelineError>> + Send>>;

/// Finds text lines on a PNG-encoded bitmap, in the order the recognizer
/// reports them.
pub trait TextLocator: Send + Sync {
    fn locate(&self, png: Vec<u8>) -> LocateFuture;
}
