use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::USER_AGENT;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use super::{DownloadFuture, Downloader};
use crate::error::PipelineError;
use crate::net;
use crate::settings::Settings;

const SERVICE: &str = "image download";

/// Streams an image straight to disk. Success means a 2xx status and a fully
/// written body.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: Client,
    user_agent: String,
}

impl HttpDownloader {
    pub fn new(timeout: Duration, user_agent: impl Into<String>) -> Result<Self, PipelineError> {
        let user_agent = user_agent.into();
        Ok(Self {
            client: net::build_client(timeout, &user_agent)?,
            user_agent,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, PipelineError> {
        Self::new(settings.download.timeout, settings.download.user_agent.clone())
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, dest: PathBuf) -> DownloadFuture {
        let this = self.clone();
        let url = url.to_string();
        Box::pin(async move {
            let response = net::send_with_retry(SERVICE, || {
                this.client
                    .get(&url)
                    .header(USER_AGENT, this.user_agent.as_str())
            })
            .await?;
            let status = response.status();
            debug!("download {} answered {}", url, status);
            if !status.is_success() {
                return Err(PipelineError::download(&url, format!("status {}", status)));
            }

            let mut file = File::create(&dest).map_err(|err| {
                PipelineError::download(&url, format!("cannot open {}: {}", dest.display(), err))
            })?;
            let mut written = 0u64;
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|err| PipelineError::download(&url, err))?;
                file.write_all(&chunk)
                    .map_err(|err| PipelineError::download(&url, err))?;
                written += chunk.len() as u64;
            }
            file.flush()
                .map_err(|err| PipelineError::download(&url, err))?;
            Ok(written)
        })
    }
}
