use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use super::{LocateFuture, TextLocator, parse_response};
use crate::error::PipelineError;
use crate::net;
use crate::settings::Settings;

const SERVICE: &str = "ocr";

/// Client for the OCR.space `parse/image` endpoint.
#[derive(Debug, Clone)]
pub struct OcrSpace {
    client: Client,
    endpoint: String,
    key: String,
    language: String,
}

impl OcrSpace {
    pub fn new(
        endpoint: impl Into<String>,
        key: impl Into<String>,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            client: net::build_client(timeout, user_agent)?,
            endpoint: endpoint.into(),
            key: key.into(),
            language: "eng".to_string(),
        })
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        let language = language.into();
        if !language.trim().is_empty() {
            self.language = language;
        }
        self
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, PipelineError> {
        Ok(Self::new(
            settings.ocr.endpoint.clone(),
            settings.ocr.api_key.clone().unwrap_or_default(),
            settings.ocr.timeout,
            &settings.download.user_agent,
        )?
        .with_language(settings.ocr.language.clone()))
    }

    fn form(&self, png: &[u8]) -> Vec<(&'static str, String)> {
        vec![
            ("apikey", self.key.clone()),
            ("language", self.language.clone()),
            ("isOverlayRequired", "true".to_string()),
            ("filetype", "PNG".to_string()),
            (
                "base64Image",
                format!("data:image/png;base64,{}", BASE64.encode(png)),
            ),
        ]
    }
}

impl TextLocator for OcrSpace {
    fn locate(&self, png: Vec<u8>) -> LocateFuture {
        let this = self.clone();
        Box::pin(async move {
            info!("sending {} bytes to ocr service", png.len());
            let form = this.form(&png);
            let response = net::send_with_retry(SERVICE, || {
                this.client.post(&this.endpoint).form(&form)
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
            let lines = parse_response(&body)?;
            debug!("ocr service returned {} lines", lines.len());
            Ok(lines)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::OcrSpace;
    use std::time::Duration;

    #[test]
    fn form_carries_overlay_and_filetype_flags() {
        let ocr = OcrSpace::new(
            "https://api.ocr.space/parse/image",
            "key-123",
            Duration::from_secs(5),
            "phylotree-test",
        )
        .expect("client");
        let form = ocr.form(&[0x89, b'P', b'N', b'G']);
        let get = |name: &str| {
            form.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.as_str())
        };
        assert_eq!(get("isOverlayRequired"), Some("true"));
        assert_eq!(get("filetype"), Some("PNG"));
        assert_eq!(get("apikey"), Some("key-123"));
        assert_eq!(get("language"), Some("eng"));
        assert!(
            get("base64Image")
                .unwrap_or_default()
                .starts_with("data:image/png;base64,")
        );
    }

    #[test]
    fn blank_language_keeps_default() {
        let ocr = OcrSpace::new("http://localhost", "", Duration::from_secs(1), "t")
            .expect("client")
            .with_language("  ");
        assert_eq!(ocr.language, "eng");
    }
}
