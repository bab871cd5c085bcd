mod generation;
mod geom;
mod mask;

use image::{ImageFormat, Rgba, RgbaImage};
use serde::Serialize;
use std::io::Cursor;
use tracing::{debug, info};

use crate::ocr::{TextLine, Word};
use crate::settings::Settings;

pub use generation::{ActiveGeneration, Generation, OverlayState};
pub use geom::{Rect, line_bounds};

/// Click targets have a fixed size and do not follow the width of the label
/// they cover. Long names get a target narrower than the masked text.
pub const FIXED_HOTZONE_WIDTH: u32 = 175;
pub const FIXED_HOTZONE_HEIGHT: u32 = 20;
pub const HOTZONE_OFFSET_X: i32 = 2;
pub const HOTZONE_OFFSET_Y: i32 = 3;
pub const MASK_PADDING: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotZoneLayout {
    pub width: u32,
    pub height: u32,
    pub offset_x: i32,
    pub offset_y: i32,
    pub padding: i32,
}

impl Default for HotZoneLayout {
    fn default() -> Self {
        Self {
            width: FIXED_HOTZONE_WIDTH,
            height: FIXED_HOTZONE_HEIGHT,
            offset_x: HOTZONE_OFFSET_X,
            offset_y: HOTZONE_OFFSET_Y,
            padding: MASK_PADDING,
        }
    }
}

impl HotZoneLayout {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            width: settings.overlay.hotzone_width,
            height: settings.overlay.hotzone_height,
            offset_x: settings.overlay.offset_x,
            offset_y: settings.overlay.offset_y,
            padding: settings.overlay.padding,
        }
    }
}

/// Interactive region for one recognized line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HotZone {
    pub id: usize,
    pub label: String,
    pub generation: Generation,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub words: Vec<Word>,
}

impl HotZone {
    pub fn rect(&self) -> Rect {
        let width = i32::try_from(self.width).unwrap_or(i32::MAX);
        let height = i32::try_from(self.height).unwrap_or(i32::MAX);
        Rect::new(
            self.x,
            self.y,
            self.x.saturating_add(width),
            self.y.saturating_add(height),
        )
    }

    pub fn tooltip(&self) -> String {
        let words = self
            .words
            .iter()
            .map(|word| {
                format!(
                    "{}({},{} {}x{})",
                    word.text, word.left, word.top, word.width, word.height
                )
            })
            .collect::<Vec<_>>();
        format!("Coordinates: {}", words.join(", "))
    }
}

/// Tree bitmap with recognized text erased. Produced once per generation and
/// never modified afterwards.
#[derive(Debug, Clone)]
pub struct AnnotatedImage {
    generation: Generation,
    image: RgbaImage,
}

impl AnnotatedImage {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn to_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut bytes = Cursor::new(Vec::new());
        self.image.write_to(&mut bytes, ImageFormat::Png)?;
        Ok(bytes.into_inner())
    }
}

/// Output of one [`AnnotationOverlayEngine::annotate`] call.
#[derive(Debug, Clone)]
pub struct Annotation {
    pub image: AnnotatedImage,
    pub hot_zones: Vec<HotZone>,
}

impl Annotation {
    pub fn generation(&self) -> Generation {
        self.image.generation
    }

    pub fn hit_test(&self, x: i32, y: i32) -> Option<&HotZone> {
        self.hot_zones.iter().find(|zone| zone.rect().contains(x, y))
    }

    pub fn find_label(&self, label: &str) -> Option<&HotZone> {
        let wanted = label.trim();
        self.hot_zones
            .iter()
            .find(|zone| zone.label.trim().eq_ignore_ascii_case(wanted))
    }
}

/// Owns the overlay generations: erases recognized text and hands out a fresh
/// set of hot zones per render cycle.
#[derive(Debug)]
pub struct AnnotationOverlayEngine {
    layout: HotZoneLayout,
    background: Rgba<u8>,
    next_generation: u64,
    active: ActiveGeneration,
}

impl Default for AnnotationOverlayEngine {
    fn default() -> Self {
        Self::new(HotZoneLayout::default(), Rgba([255, 255, 255, 255]))
    }
}

impl AnnotationOverlayEngine {
    pub fn new(layout: HotZoneLayout, background: Rgba<u8>) -> Self {
        Self {
            layout,
            background,
            next_generation: 1,
            active: ActiveGeneration::default(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            HotZoneLayout::from_settings(settings),
            settings.overlay.background,
        )
    }

    pub fn layout(&self) -> HotZoneLayout {
        self.layout
    }

    pub fn active(&self) -> ActiveGeneration {
        self.active.clone()
    }

    pub fn state(&self) -> OverlayState {
        self.active.state()
    }

    /// Invalidates the live generation. Hot zones already handed out keep
    /// their data but no longer match the active generation.
    pub fn tear_down(&mut self) {
        self.active.tear_down();
    }

    pub fn annotate(&mut self, image: &RgbaImage, lines: &[TextLine]) -> Annotation {
        self.tear_down();
        let generation = Generation(self.next_generation);
        self.next_generation += 1;

        let mut canvas = image.clone();
        let mut hot_zones = Vec::new();
        for line in lines {
            let rect = match line_bounds(&line.words, self.layout.padding) {
                Ok(rect) => rect,
                Err(err) => {
                    debug!("skipping line {:?}: {}", line.text, err);
                    continue;
                }
            };
            mask::fill_rect(&mut canvas, &rect, self.background);

            let Some(first) = line.first_word() else {
                continue;
            };
            hot_zones.push(HotZone {
                id: hot_zones.len(),
                label: line.text.clone(),
                generation,
                x: first.left.saturating_add(self.layout.offset_x),
                y: first.top.saturating_add(self.layout.offset_y),
                width: self.layout.width,
                height: self.layout.height,
                words: line.words.clone(),
            });
        }

        self.active.publish(generation);
        info!(
            "overlay generation {} has {} hot zones",
            generation,
            hot_zones.len()
        );
        Annotation {
            image: AnnotatedImage {
                generation,
                image: canvas,
            },
            hot_zones,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_json_snapshot;

    const INK: Rgba<u8> = Rgba([0, 0, 0, 255]);
    const PAPER: Rgba<u8> = Rgba([255, 255, 255, 255]);

    fn panthera() -> TextLine {
        TextLine::new(
            "Panthera leo",
            vec![
                Word::new("Panthera", 10, 5, 20, 8),
                Word::new("leo", 35, 6, 15, 8),
            ],
        )
    }

    fn felis() -> TextLine {
        TextLine::new(
            "Felis catus",
            vec![
                Word::new("Felis", 10, 40, 18, 8),
                Word::new("catus", 31, 40, 20, 8),
            ],
        )
    }

    #[test]
    fn one_hot_zone_per_non_empty_line_in_input_order() {
        let mut engine = AnnotationOverlayEngine::default();
        let image = RgbaImage::from_pixel(100, 60, INK);
        let lines = vec![
            felis(),
            TextLine::new("", Vec::new()),
            panthera(),
            TextLine::new("ghost", Vec::new()),
        ];
        let annotation = engine.annotate(&image, &lines);
        let labels = annotation
            .hot_zones
            .iter()
            .map(|zone| zone.label.as_str())
            .collect::<Vec<_>>();
        assert_eq!(labels, vec!["Felis catus", "Panthera leo"]);
        assert_eq!(
            annotation.hot_zones.iter().map(|zone| zone.id).collect::<Vec<_>>(),
            vec![0, 1]
        );
    }

    #[test]
    fn hot_zone_has_fixed_size_at_first_word_plus_offset() {
        let mut engine = AnnotationOverlayEngine::default();
        let image = RgbaImage::from_pixel(100, 60, INK);
        let annotation = engine.annotate(&image, &[panthera()]);
        let zone = &annotation.hot_zones[0];
        assert_eq!((zone.x, zone.y), (12, 8));
        assert_eq!((zone.width, zone.height), (175, 20));
        // Wider than the masked text (8..=52).
        assert!(zone.rect().width() > line_bounds(&zone.words, 2).expect("bounds").width());
    }

    #[test]
    fn recognized_text_is_erased_with_background() {
        let mut engine = AnnotationOverlayEngine::default();
        let image = RgbaImage::from_pixel(100, 60, INK);
        let annotation = engine.annotate(&image, &[panthera()]);
        let painted = annotation.image.image();
        assert_eq!(*painted.get_pixel(8, 3), PAPER);
        assert_eq!(*painted.get_pixel(52, 16), PAPER);
        assert_eq!(*painted.get_pixel(53, 16), INK);
        assert_eq!(*painted.get_pixel(8, 17), INK);
        // The input bitmap is untouched.
        assert_eq!(*image.get_pixel(8, 3), INK);
    }

    #[test]
    fn each_call_starts_a_new_generation() {
        let mut engine = AnnotationOverlayEngine::default();
        assert_eq!(engine.state(), OverlayState::Empty);
        let image = RgbaImage::from_pixel(100, 60, INK);

        let first = engine.annotate(&image, &[panthera()]);
        assert_eq!(engine.state(), OverlayState::Populated(first.generation()));

        engine.tear_down();
        assert_eq!(engine.state(), OverlayState::TornDown(first.generation()));

        let second = engine.annotate(&image, &[panthera(), felis()]);
        assert!(second.generation() > first.generation());
        assert!(second.hot_zones.iter().all(|zone| zone.generation == second.generation()));
        assert!(!engine.active().is_current(first.hot_zones[0].generation));
        // Old zones are invalidated, not rewritten.
        assert_eq!(first.hot_zones[0].generation, first.generation());
    }

    #[test]
    fn empty_input_still_publishes_a_generation() {
        let mut engine = AnnotationOverlayEngine::default();
        let image = RgbaImage::from_pixel(10, 10, INK);
        let annotation = engine.annotate(&image, &[]);
        assert!(annotation.hot_zones.is_empty());
        assert!(engine.active().is_current(annotation.generation()));
        assert_eq!(annotation.image.image(), &image);
    }

    #[test]
    fn lookup_helpers() {
        let mut engine = AnnotationOverlayEngine::default();
        let image = RgbaImage::from_pixel(300, 80, INK);
        let annotation = engine.annotate(&image, &[panthera(), felis()]);
        assert_eq!(
            annotation.hit_test(20, 10).map(|zone| zone.label.as_str()),
            Some("Panthera leo")
        );
        assert_eq!(
            annotation.hit_test(150, 50).map(|zone| zone.label.as_str()),
            Some("Felis catus")
        );
        assert!(annotation.hit_test(299, 79).is_none());
        assert_eq!(
            annotation.find_label("felis CATUS").map(|zone| zone.id),
            Some(1)
        );
        assert_eq!(
            annotation.hot_zones[0].tooltip(),
            "Coordinates: Panthera(10,5 20x8), leo(35,6 15x8)"
        );
    }

    #[test]
    fn out_of_range_coordinates_do_not_abort_annotation() {
        let body = r#"{"ParsedResults": [{"TextOverlay": {"Lines": [
            {"LineText": "Vulpes vulpes", "Words": [
                {"WordText": "Vulpes", "Left": 2147483600, "Top": 2147483646, "Width": 100, "Height": 20}
            ]}
        ]}}]}"#;
        let lines = crate::ocr::parse_response(body).expect("parses");
        let mut engine = AnnotationOverlayEngine::default();
        let image = RgbaImage::from_pixel(20, 20, INK);
        let annotation = engine.annotate(&image, &lines);

        let zone = &annotation.hot_zones[0];
        assert_eq!((zone.x, zone.y), (i32::MAX - 45, i32::MAX));
        assert_eq!(zone.rect().right, i32::MAX);
        assert_eq!(zone.rect().bottom, i32::MAX);
        // Nothing on the canvas is covered.
        assert_eq!(annotation.image.image(), &image);
    }

    #[test]
    fn oversized_zone_dimensions_are_clamped() {
        let zone = HotZone {
            id: 0,
            label: "Bos taurus".to_string(),
            generation: Generation(1),
            x: 10,
            y: 10,
            width: u32::MAX,
            height: u32::MAX,
            words: Vec::new(),
        };
        assert_eq!(zone.rect(), Rect::new(10, 10, i32::MAX, i32::MAX));
        assert!(zone.rect().contains(1_000_000, 1_000_000));
        assert!(!zone.rect().contains(9, 10));
    }

    #[test]
    fn hot_zone_serialization() {
        let mut engine = AnnotationOverlayEngine::default();
        let image = RgbaImage::from_pixel(100, 60, INK);
        let annotation = engine.annotate(&image, &[panthera()]);
        assert_json_snapshot!(annotation.hot_zones[0], @r#"
        {
          "id": 0,
          "label": "Panthera leo",
          "generation": 1,
          "x": 12,
          "y": 8,
          "width": 175,
          "height": 20,
          "words": [
            {
              "text": "Panthera",
              "left": 10,
              "top": 5,
              "width": 20,
              "height": 8
            },
            {
              "text": "leo",
              "left": 35,
              "top": 6,
              "width": 15,
              "height": 8
            }
          ]
        }
        "#);
    }
}
