mod download;
mod google;
pub(crate) mod store;

use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::paths;
use crate::settings::Settings;

pub use download::HttpDownloader;
pub use google::GoogleImageSearch;
pub use store::ensure_placeholder;

pub type SearchFuture = Pin<Box<dyn Future<Output = Result<Option<String>, PipelineError>> + Send>>;
pub type DownloadFuture = Pin<Box<dyn Future<Output = Result<u64, PipelineError>> + Send>>;

/// Free-text image search. Only the first candidate URL matters.
pub trait ImageSearch: Send + Sync {
    fn first_image_url(&self, query: &str) -> SearchFuture;
}

/// Fetches `url` into the already created file at `dest`, returning the
/// number of bytes written.
pub trait Downloader: Send + Sync {
    fn download(&self, url: &str, dest: PathBuf) -> DownloadFuture;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// The organism name with exclusions for hosts that refuse downloads.
    Primary,
    /// The organism name qualified with the fallback term.
    Wikipedia,
}

impl Strategy {
    /// Order in which strategies run. Primary always goes first.
    pub const ORDER: [Strategy; 2] = [Strategy::Primary, Strategy::Wikipedia];

    pub fn query(&self, name: &str, config: &ResolveConfig) -> String {
        let name = name.trim();
        match self {
            Strategy::Primary if config.exclusions.is_empty() => name.to_string(),
            Strategy::Primary => format!("{} {}", name, config.exclusions.join(" ")),
            Strategy::Wikipedia => format!("{} {}", name, config.fallback_term),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupStatus {
    Found,
    NotFound,
    DownloadFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupResult {
    pub name: String,
    pub path: Option<PathBuf>,
    pub status: LookupStatus,
    pub strategy: Option<Strategy>,
}

impl LookupResult {
    pub fn is_found(&self) -> bool {
        self.status == LookupStatus::Found
    }
}

#[derive(Debug, Clone)]
pub struct ResolveConfig {
    pub images_dir: PathBuf,
    pub width: u32,
    pub height: u32,
    pub exclusions: Vec<String>,
    pub fallback_term: String,
}

impl ResolveConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            images_dir: settings.paths.images_dir.clone(),
            width: settings.download.width,
            height: settings.download.height,
            exclusions: settings.search.exclusions.clone(),
            fallback_term: settings.search.fallback_term.clone(),
        }
    }

    pub fn image_path(&self, name: &str) -> PathBuf {
        self.images_dir
            .join(format!("{}.png", paths::file_stem_for(name)))
    }
}

/// Resolves organism names to a local, resized image by walking
/// [`Strategy::ORDER`] until one strategy yields a downloadable image.
pub struct ImageResolutionService<S, D> {
    search: S,
    downloader: D,
    config: ResolveConfig,
}

impl ImageResolutionService<GoogleImageSearch, HttpDownloader> {
    pub fn from_settings(settings: &Settings) -> Result<Self, PipelineError> {
        Ok(Self::new(
            GoogleImageSearch::from_settings(settings)?,
            HttpDownloader::from_settings(settings)?,
            ResolveConfig::from_settings(settings),
        ))
    }
}

impl<S: ImageSearch, D: Downloader> ImageResolutionService<S, D> {
    pub fn new(search: S, downloader: D, config: ResolveConfig) -> Self {
        Self {
            search,
            downloader,
            config,
        }
    }

    pub fn config(&self) -> &ResolveConfig {
        &self.config
    }

    pub async fn resolve(&self, name: &str) -> LookupResult {
        let mut url_found = false;
        for strategy in Strategy::ORDER {
            let query = strategy.query(name, &self.config);
            let url = match self.search.first_image_url(&query).await {
                Ok(Some(url)) => url,
                Ok(None) => {
                    debug!(
                        "{:?}: {}",
                        strategy,
                        PipelineError::NoResultFound { query }
                    );
                    continue;
                }
                Err(err) => {
                    report(strategy, &err);
                    continue;
                }
            };
            url_found = true;
            match self.fetch(name, &url).await {
                Ok(path) => {
                    info!("resolved {:?} via {:?}: {}", name, strategy, path.display());
                    return LookupResult {
                        name: name.to_string(),
                        path: Some(path),
                        status: LookupStatus::Found,
                        strategy: Some(strategy),
                    };
                }
                Err(err) => report(strategy, &err),
            }
        }

        let status = if url_found {
            LookupStatus::DownloadFailed
        } else {
            LookupStatus::NotFound
        };
        info!("no image for {:?} ({:?})", name, status);
        LookupResult {
            name: name.to_string(),
            path: None,
            status,
            strategy: None,
        }
    }

    async fn fetch(&self, name: &str, url: &str) -> Result<PathBuf, PipelineError> {
        let raw = store::reserve(&self.config.images_dir, url)?;
        self.downloader
            .download(url, raw.path().to_path_buf())
            .await?;

        let dest = self.config.image_path(name);
        let (width, height) = (self.config.width, self.config.height);
        let url = url.to_string();
        let task_url = url.clone();
        tokio::task::spawn_blocking(move || store::finalize(raw, &dest, width, height, &task_url))
            .await
            .map_err(|err| PipelineError::download(&url, err))?
    }
}

fn report(strategy: Strategy, err: &PipelineError) {
    if err.is_infrastructure() {
        warn!("{:?} strategy failed: {}", strategy, err);
    } else {
        info!("{:?} strategy failed: {}", strategy, err);
    }
}

/// Path to show for `result`: the resolved image or the placeholder.
pub fn display_path<'a>(result: &'a LookupResult, placeholder: &'a Path) -> &'a Path {
    match (&result.status, result.path.as_deref()) {
        (LookupStatus::Found, Some(path)) => path,
        _ => placeholder,
    }
}
