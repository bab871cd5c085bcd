use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{ImageSearch, SearchFuture};
use crate::error::PipelineError;
use crate::net;
use crate::settings::Settings;

const SERVICE: &str = "image search";

/// Google Custom Search JSON API restricted to image results.
#[derive(Debug, Clone)]
pub struct GoogleImageSearch {
    client: Client,
    endpoint: String,
    key: Option<String>,
    engine_id: Option<String>,
}

impl GoogleImageSearch {
    pub fn new(
        endpoint: impl Into<String>,
        key: Option<String>,
        engine_id: Option<String>,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            client: net::build_client(timeout, user_agent)?,
            endpoint: endpoint.into(),
            key,
            engine_id,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, PipelineError> {
        Self::new(
            settings.search.endpoint.clone(),
            settings.search.api_key.clone(),
            settings.search.engine_id.clone(),
            settings.search.timeout,
            &settings.download.user_agent,
        )
    }
}

impl ImageSearch for GoogleImageSearch {
    fn first_image_url(&self, query: &str) -> SearchFuture {
        let this = self.clone();
        let query = query.to_string();
        Box::pin(async move {
            let (Some(key), Some(engine_id)) = (this.key.as_deref(), this.engine_id.as_deref())
            else {
                return Err(PipelineError::unavailable(
                    SERVICE,
                    "api key or engine id is not configured",
                ));
            };
            debug!("searching images for {:?}", query);
            let params = [
                ("key", key),
                ("cx", engine_id),
                ("searchType", "image"),
                ("q", query.as_str()),
            ];
            let response = net::send_with_retry(SERVICE, || {
                this.client.get(&this.endpoint).query(&params)
            })
            .await?;
            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|err| PipelineError::unavailable(SERVICE, err))?;
            if !status.is_success() {
                return Err(PipelineError::unavailable(
                    SERVICE,
                    format!("status {}", status),
                ));
            }
            first_link(&body)
        })
    }
}

/// First non-empty `items[].link`, or `None` when the search had no hits.
pub(crate) fn first_link(body: &str) -> Result<Option<String>, PipelineError> {
    #[derive(Deserialize)]
    struct SearchResponse {
        items: Option<Vec<SearchItem>>,
    }

    #[derive(Deserialize)]
    struct SearchItem {
        link: Option<String>,
    }

    let parsed: SearchResponse =
        serde_json::from_str(body).map_err(|err| PipelineError::malformed(SERVICE, err))?;
    Ok(parsed
        .items
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|item| item.link)
        .map(|link| link.trim().to_string())
        .filter(|link| !link.is_empty()))
}
