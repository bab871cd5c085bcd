use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::error::PipelineError;

pub(crate) const TRANSIENT_MAX_RETRIES: usize = 1;
pub(crate) const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
pub(crate) const RETRY_MAX_DELAY: Duration = Duration::from_secs(5);

pub(crate) fn build_client(timeout: Duration, user_agent: &str) -> Result<Client, PipelineError> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .user_agent(user_agent.to_string())
        .build()
        .map_err(|err| PipelineError::unavailable("http client", err))
}

pub(crate) fn is_transient_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

pub(crate) fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get("retry-after")?.to_str().ok()?.trim();
    if value.is_empty() {
        return None;
    }
    value.parse::<u64>().ok().map(Duration::from_secs)
}

/// Sends the request built by `build`, retrying once when the transport fails
/// in a way that is likely to succeed on a second attempt.
pub(crate) async fn send_with_retry<F>(
    service: &'static str,
    build: F,
) -> Result<Response, PipelineError>
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        match build().send().await {
            Ok(response) => {
                let status = response.status();
                if is_transient_status(status) && attempt <= TRANSIENT_MAX_RETRIES {
                    let wait = retry_delay(retry_after(response.headers()));
                    warn!(
                        "{} returned {}; retrying in {:.1}s",
                        service,
                        status,
                        wait.as_secs_f32()
                    );
                    sleep(wait).await;
                    continue;
                }
                return Ok(response);
            }
            Err(err) if is_transient_error(&err) && attempt <= TRANSIENT_MAX_RETRIES => {
                let wait = retry_delay(None);
                warn!(
                    "{} request failed ({}); retrying in {:.1}s",
                    service,
                    err,
                    wait.as_secs_f32()
                );
                sleep(wait).await;
            }
            Err(err) => return Err(PipelineError::unavailable(service, err)),
        }
    }
}

pub(crate) fn retry_delay(retry_after: Option<Duration>) -> Duration {
    let wait = match retry_after {
        Some(value) if value > RETRY_BASE_DELAY => value,
        _ => RETRY_BASE_DELAY,
    };
    wait.min(RETRY_MAX_DELAY)
}
