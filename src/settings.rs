use anyhow::{Context, Result, anyhow};
use image::Rgba;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub ocr: OcrSettings,
    pub search: SearchSettings,
    pub download: DownloadSettings,
    pub overlay: OverlaySettings,
    pub tree: TreeSettings,
    pub paths: PathSettings,
}

#[derive(Debug, Clone)]
pub struct OcrSettings {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub language: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub engine_id: Option<String>,
    pub timeout: Duration,
    pub exclusions: Vec<String>,
    pub fallback_term: String,
}

#[derive(Debug, Clone)]
pub struct DownloadSettings {
    pub user_agent: String,
    pub timeout: Duration,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct OverlaySettings {
    pub hotzone_width: u32,
    pub hotzone_height: u32,
    pub offset_x: i32,
    pub offset_y: i32,
    pub padding: i32,
    pub background: Rgba<u8>,
}

#[derive(Debug, Clone)]
pub struct TreeSettings {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct PathSettings {
    pub placeholder: PathBuf,
    pub annotated: PathBuf,
    pub images_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ocr: OcrSettings {
                endpoint: "https://api.ocr.space/parse/image".to_string(),
                api_key: None,
                language: "eng".to_string(),
                timeout: Duration::from_secs(30),
            },
            search: SearchSettings {
                endpoint: "https://www.googleapis.com/customsearch/v1".to_string(),
                api_key: None,
                engine_id: None,
                timeout: Duration::from_secs(15),
                exclusions: vec![
                    "-instagram".to_string(),
                    "-reddit".to_string(),
                    "-upress".to_string(),
                ],
                fallback_term: "wikipedia".to_string(),
            },
            download: DownloadSettings {
                user_agent: concat!("phylotree-rust/", env!("CARGO_PKG_VERSION")).to_string(),
                timeout: Duration::from_secs(30),
                width: 400,
                height: 400,
            },
            overlay: OverlaySettings {
                hotzone_width: 175,
                hotzone_height: 20,
                offset_x: 2,
                offset_y: 3,
                padding: 2,
                background: Rgba([255, 255, 255, 255]),
            },
            tree: TreeSettings {
                width: 775,
                height: 690,
            },
            paths: PathSettings {
                placeholder: paths::placeholder_path(),
                annotated: paths::annotated_path(),
                images_dir: paths::images_dir(),
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    ocr: Option<OcrFile>,
    search: Option<SearchFile>,
    download: Option<DownloadFile>,
    overlay: Option<OverlayFile>,
    tree: Option<TreeFile>,
    paths: Option<PathsFile>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrFile {
    endpoint: Option<String>,
    api_key: Option<String>,
    language: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchFile {
    endpoint: Option<String>,
    api_key: Option<String>,
    engine_id: Option<String>,
    timeout_secs: Option<u64>,
    exclusions: Option<Vec<String>>,
    fallback_term: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DownloadFile {
    user_agent: Option<String>,
    timeout_secs: Option<u64>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct OverlayFile {
    hotzone_width: Option<u32>,
    hotzone_height: Option<u32>,
    offset_x: Option<i32>,
    offset_y: Option<i32>,
    padding: Option<i32>,
    background: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TreeFile {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct PathsFile {
    placeholder: Option<String>,
    annotated: Option<String>,
    images_dir: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    let embedded: SettingsFile = toml::from_str(DEFAULT_SETTINGS_TOML)
        .with_context(|| "failed to parse embedded default settings")?;
    settings.merge(embedded)?;

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(dir) = paths::settings_dir() {
        ordered_paths.push(dir.join("settings.toml"));
        ordered_paths.push(dir.join("settings.local.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings
                .merge(parsed)
                .with_context(|| format!("invalid settings: {}", path.display()))?;
        }
    }

    settings.apply_env();
    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) -> Result<()> {
        if let Some(ocr) = incoming.ocr {
            if let Some(endpoint) = non_empty(ocr.endpoint) {
                self.ocr.endpoint = endpoint;
            }
            if let Some(key) = non_empty(ocr.api_key) {
                self.ocr.api_key = Some(key);
            }
            if let Some(language) = non_empty(ocr.language) {
                self.ocr.language = language;
            }
            if let Some(secs) = ocr.timeout_secs.filter(|secs| *secs > 0) {
                self.ocr.timeout = Duration::from_secs(secs);
            }
        }
        if let Some(search) = incoming.search {
            if let Some(endpoint) = non_empty(search.endpoint) {
                self.search.endpoint = endpoint;
            }
            if let Some(key) = non_empty(search.api_key) {
                self.search.api_key = Some(key);
            }
            if let Some(id) = non_empty(search.engine_id) {
                self.search.engine_id = Some(id);
            }
            if let Some(secs) = search.timeout_secs.filter(|secs| *secs > 0) {
                self.search.timeout = Duration::from_secs(secs);
            }
            if let Some(exclusions) = search.exclusions {
                self.search.exclusions = exclusions
                    .into_iter()
                    .map(|term| term.trim().to_string())
                    .filter(|term| !term.is_empty())
                    .collect();
            }
            if let Some(term) = non_empty(search.fallback_term) {
                self.search.fallback_term = term;
            }
        }
        if let Some(download) = incoming.download {
            if let Some(agent) = non_empty(download.user_agent) {
                self.download.user_agent = agent;
            }
            if let Some(secs) = download.timeout_secs.filter(|secs| *secs > 0) {
                self.download.timeout = Duration::from_secs(secs);
            }
            if let Some(width) = download.width.filter(|value| *value > 0) {
                self.download.width = width;
            }
            if let Some(height) = download.height.filter(|value| *value > 0) {
                self.download.height = height;
            }
        }
        if let Some(overlay) = incoming.overlay {
            if let Some(width) = overlay.hotzone_width.filter(|value| *value > 0) {
                self.overlay.hotzone_width = width;
            }
            if let Some(height) = overlay.hotzone_height.filter(|value| *value > 0) {
                self.overlay.hotzone_height = height;
            }
            if let Some(x) = overlay.offset_x {
                self.overlay.offset_x = x;
            }
            if let Some(y) = overlay.offset_y {
                self.overlay.offset_y = y;
            }
            if let Some(padding) = overlay.padding {
                if padding < 0 {
                    return Err(anyhow!("overlay.padding must not be negative"));
                }
                self.overlay.padding = padding;
            }
            if let Some(color) = non_empty(overlay.background) {
                self.overlay.background = parse_hex_color(&color)?;
            }
        }
        if let Some(tree) = incoming.tree {
            if let Some(width) = tree.width {
                self.tree.width = width;
            }
            if let Some(height) = tree.height {
                self.tree.height = height;
            }
        }
        if let Some(files) = incoming.paths {
            if let Some(path) = non_empty(files.placeholder) {
                self.paths.placeholder = paths::expand_tilde(&path);
            }
            if let Some(path) = non_empty(files.annotated) {
                self.paths.annotated = paths::expand_tilde(&path);
            }
            if let Some(path) = non_empty(files.images_dir) {
                self.paths.images_dir = paths::expand_tilde(&path);
            }
        }
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Some(key) = get_env("OCR_SPACE_API_KEY") {
            self.ocr.api_key = Some(key);
        }
        if let Some(key) = get_env("GOOGLE_API_KEY") {
            self.search.api_key = Some(key);
        }
        if let Some(id) = get_env("GOOGLE_CSE_ID") {
            self.search.engine_id = Some(id);
        }
    }

    /// `None` when the tree bitmap should be used at its rendered size.
    pub fn tree_size(&self) -> Option<(u32, u32)> {
        if self.tree.width == 0 || self.tree.height == 0 {
            None
        } else {
            Some((self.tree.width, self.tree.height))
        }
    }
}

/// Parses `#rgb`, `#rrggbb` or `#rrggbbaa`.
pub fn parse_hex_color(value: &str) -> Result<Rgba<u8>> {
    let hex = value.trim().trim_start_matches('#');
    let expanded = match hex.len() {
        3 => hex.chars().flat_map(|ch| [ch, ch]).collect::<String>(),
        6 | 8 => hex.to_string(),
        _ => return Err(anyhow!("invalid color '{}'", value)),
    };
    let channel = |idx: usize| {
        u8::from_str_radix(&expanded[idx..idx + 2], 16)
            .map_err(|_| anyhow!("invalid color '{}'", value))
    };
    let alpha = if expanded.len() == 8 { channel(6)? } else { 255 };
    Ok(Rgba([channel(0)?, channel(2)?, channel(4)?, alpha]))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn get_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
