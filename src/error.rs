use thiserror::Error;

/// Failure kinds shared by the OCR, overlay and lookup stages.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("{service} unavailable: {message}")]
    ServiceUnavailable {
        service: &'static str,
        message: String,
    },

    #[error("malformed {service} response: {message}")]
    MalformedResponse {
        service: &'static str,
        message: String,
    },

    #[error("no result found for '{query}'")]
    NoResultFound { query: String },

    #[error("download failed ({url}): {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("text line has no words")]
    GeometryEmpty,
}

impl PipelineError {
    pub fn unavailable(service: &'static str, message: impl ToString) -> Self {
        PipelineError::ServiceUnavailable {
            service,
            message: message.to_string(),
        }
    }

    pub fn malformed(service: &'static str, message: impl ToString) -> Self {
        PipelineError::MalformedResponse {
            service,
            message: message.to_string(),
        }
    }

    pub fn download(url: &str, reason: impl ToString) -> Self {
        PipelineError::DownloadFailed {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Only infrastructure problems are reported to the user; everything else
    /// degrades silently to an empty overlay or a placeholder.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, PipelineError::ServiceUnavailable { .. })
    }
}
