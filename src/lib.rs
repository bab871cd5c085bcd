use anyhow::{Context, Result, anyhow};
use std::path::PathBuf;
use std::sync::Arc;

pub mod controller;
pub mod error;
pub mod logging;
pub mod lookup;
mod net;
pub mod ocr;
pub mod overlay;
mod paths;
pub mod pipeline;
pub mod settings;

pub use controller::{DispatchOutcome, DisplaySlot, InteractionController};
pub use error::PipelineError;
pub use lookup::{ImageResolutionService, LookupResult, LookupStatus, Strategy};
pub use ocr::{OcrSpace, TextLine, TextLocator, Word};
pub use overlay::{AnnotationOverlayEngine, Generation, HotZone, OverlayState};
pub use pipeline::{RenderCycle, TreeOverlayPipeline};

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub image: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub click: Option<String>,
    pub lookup: Option<String>,
    pub json: bool,
    pub settings_path: Option<PathBuf>,
}

pub async fn run(config: Config) -> Result<String> {
    let mut settings = settings::load_settings(config.settings_path.as_deref())?;
    if let Some(output) = config.output.clone() {
        settings.paths.annotated = output;
    }
    let placeholder = lookup::ensure_placeholder(
        &settings.paths.placeholder,
        settings.download.width,
        settings.download.height,
    )?;

    if let Some(name) = config.lookup.as_deref() {
        let service = ImageResolutionService::from_settings(&settings)?;
        let result = service.resolve(name).await;
        return serde_json::to_string_pretty(&result).with_context(|| "failed to encode result");
    }

    let Some(image) = config.image.as_deref() else {
        return Err(anyhow!("nothing to do: pass --image or --lookup"));
    };

    let locator = OcrSpace::from_settings(&settings)?;
    let mut pipeline = TreeOverlayPipeline::from_settings(locator, &settings);
    let cycle = pipeline.submit_path(image).await?;

    let mut output = Vec::new();
    output.push(format!("annotated: {}", cycle.annotated_path.display()));
    if let Some(err) = cycle.degraded.as_ref() {
        output.push(format!("ocr: {}", err));
    }
    if config.json {
        output.push(
            serde_json::to_string_pretty(&cycle.annotation.hot_zones)
                .with_context(|| "failed to encode hot zones")?,
        );
    } else {
        for zone in &cycle.annotation.hot_zones {
            output.push(format!(
                "[{}] {} @ {},{} {}x{}",
                zone.id, zone.label, zone.x, zone.y, zone.width, zone.height
            ));
        }
    }

    if let Some(label) = config.click.as_deref() {
        let Some(zone) = cycle.annotation.find_label(label) else {
            output.push(format!("no hot zone labelled {:?}", label));
            return Ok(output.join("\n"));
        };
        let resolver = Arc::new(ImageResolutionService::from_settings(&settings)?);
        let controller = InteractionController::new(
            resolver,
            pipeline.active(),
            DisplaySlot::new(placeholder.clone()),
            placeholder,
        );
        let outcome = controller
            .dispatch(zone)
            .await
            .with_context(|| "lookup task panicked")?;
        output.push(match outcome {
            DispatchOutcome::Shown { path } => format!("display: {}", path.display()),
            DispatchOutcome::Placeholder { status, path } => {
                format!("display: {} ({:?})", path.display(), status)
            }
            DispatchOutcome::Discarded { generation } => {
                format!("discarded stale lookup from generation {}", generation)
            }
        });
    }

    Ok(output.join("\n"))
}
