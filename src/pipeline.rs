use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::lookup::store;
use crate::ocr::TextLocator;
use crate::overlay::{ActiveGeneration, Annotation, AnnotationOverlayEngine};
use crate::settings::Settings;

/// Result of one tree submission.
#[derive(Debug)]
pub struct RenderCycle {
    pub annotation: Annotation,
    pub annotated_path: PathBuf,
    /// Set when OCR failed and the tree is shown without hot zones.
    pub degraded: Option<PipelineError>,
}

/// Runs the bitmap -> OCR -> overlay steps for each submitted tree, one
/// submission at a time.
pub struct TreeOverlayPipeline<L> {
    locator: L,
    engine: AnnotationOverlayEngine,
    annotated_path: PathBuf,
    tree_size: Option<(u32, u32)>,
}

impl<L: TextLocator> TreeOverlayPipeline<L> {
    pub fn new(
        locator: L,
        engine: AnnotationOverlayEngine,
        annotated_path: impl Into<PathBuf>,
        tree_size: Option<(u32, u32)>,
    ) -> Self {
        Self {
            locator,
            engine,
            annotated_path: annotated_path.into(),
            tree_size,
        }
    }

    pub fn from_settings(locator: L, settings: &Settings) -> Self {
        Self::new(
            locator,
            AnnotationOverlayEngine::from_settings(settings),
            settings.paths.annotated.clone(),
            settings.tree_size(),
        )
    }

    pub fn active(&self) -> ActiveGeneration {
        self.engine.active()
    }

    pub fn engine(&self) -> &AnnotationOverlayEngine {
        &self.engine
    }

    pub async fn submit_path(&mut self, path: &Path) -> Result<RenderCycle> {
        let bitmap = image::open(path)
            .with_context(|| format!("failed to open tree image: {}", path.display()))?;
        self.submit(bitmap).await
    }

    pub async fn submit(&mut self, bitmap: DynamicImage) -> Result<RenderCycle> {
        self.engine.tear_down();

        let bitmap = match self.tree_size {
            Some((width, height)) if bitmap.width() != width || bitmap.height() != height => {
                bitmap.resize_exact(width, height, FilterType::Lanczos3)
            }
            _ => bitmap,
        };
        let rgba = bitmap.to_rgba8();
        let mut png = Cursor::new(Vec::new());
        rgba.write_to(&mut png, ImageFormat::Png)
            .with_context(|| "failed to encode tree image for OCR")?;

        let (lines, degraded) = match self.locator.locate(png.into_inner()).await {
            Ok(lines) => {
                if lines.is_empty() {
                    info!("ocr found no text; showing tree without hot zones");
                }
                (lines, None)
            }
            Err(err) => {
                if err.is_infrastructure() {
                    warn!("ocr failed, tree shown without hot zones: {}", err);
                } else {
                    info!("ocr returned no usable result: {}", err);
                }
                (Vec::new(), Some(err))
            }
        };

        let annotation = self.engine.annotate(&rgba, &lines);
        let saved = annotation
            .image
            .to_png()
            .with_context(|| "failed to encode annotated image")
            .and_then(|bytes| store::write_atomic(&self.annotated_path, &bytes));
        if let Err(err) = saved {
            // Nobody receives these hot zones, so they must not stay live.
            self.engine.tear_down();
            return Err(err);
        }

        Ok(RenderCycle {
            annotation,
            annotated_path: self.annotated_path.clone(),
            degraded,
        })
    }
}
