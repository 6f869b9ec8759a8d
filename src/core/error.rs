//! Error taxonomy for CPI acquisition and its user facing projection.

use crate::core::month::MonthKey;
use serde::Serialize;
use thiserror::Error;

/// Failures on the CPI acquisition path.
///
/// Network and upstream failures are "external service" problems and always
/// allow falling back to the backup source or the cached snapshot.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("network unreachable: {0}")]
    Unreachable(String),

    #[error("upstream responded with HTTP {status}")]
    HttpStatus { status: u16, reason: Option<String> },

    #[error("request failed: {0}")]
    Request(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("cached CPI data is unreadable: {0}")]
    CacheCorrupt(String),

    #[error("cached CPI data could not be written: {0}")]
    CacheWrite(String),

    #[error("primary source has not published {required} yet")]
    PrimaryStale {
        required: MonthKey,
        filled_by_backup: bool,
    },

    #[error("no CPI data available: {0}")]
    NoData(Box<FetchError>),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(err.to_string())
        } else if err.is_connect() {
            FetchError::Unreachable(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::HttpStatus {
                status: status.as_u16(),
                reason: status.canonical_reason().map(str::to_string),
            }
        } else if err.is_decode() || err.is_body() {
            FetchError::InvalidResponse(err.to_string())
        } else {
            FetchError::Request(err.to_string())
        }
    }
}

impl FetchError {
    pub fn code(&self) -> &'static str {
        match self {
            FetchError::Timeout(_) => "timeout",
            FetchError::Unreachable(_) => "connection_error",
            FetchError::HttpStatus { .. } => "http_error",
            FetchError::Request(_) => "request_error",
            FetchError::InvalidResponse(_) => "invalid_response",
            FetchError::CacheCorrupt(_) | FetchError::CacheWrite(_) => "cache_error",
            FetchError::PrimaryStale { .. } => "primary_stale",
            FetchError::NoData(_) => "no_data",
        }
    }

    pub fn origin(&self) -> ErrorOrigin {
        match self {
            FetchError::CacheCorrupt(_) | FetchError::CacheWrite(_) => ErrorOrigin::Internal,
            FetchError::NoData(cause) => cause.origin(),
            _ => ErrorOrigin::ExternalService,
        }
    }

    /// Whether this failure leaves nothing to serve.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::NoData(_))
    }

    fn user_message(&self) -> String {
        match self {
            FetchError::Timeout(_) => {
                "The statistics server took too long to respond. Try again later.".to_string()
            }
            FetchError::Unreachable(_) => {
                "Could not connect to the statistics server. Check your connection and try again."
                    .to_string()
            }
            FetchError::HttpStatus { .. } => {
                "The statistics server responded with an error. Try again later.".to_string()
            }
            FetchError::Request(_) => {
                "Could not retrieve CPI data from the statistics server. Try again later."
                    .to_string()
            }
            FetchError::InvalidResponse(_) => {
                "The data received from the statistics server could not be interpreted."
                    .to_string()
            }
            FetchError::CacheCorrupt(_) | FetchError::CacheWrite(_) => {
                "The stored CPI data could not be used. Delete the cache and try again."
                    .to_string()
            }
            FetchError::PrimaryStale {
                required,
                filled_by_backup: true,
            } => format!(
                "The statistics office has not published {required} yet; an unofficial estimate is used."
            ),
            FetchError::PrimaryStale { required, .. } => {
                format!("The statistics office has not published {required} yet.")
            }
            FetchError::NoData(cause) => format!(
                "No CPI data is available right now. {}",
                cause.user_message()
            ),
        }
    }

    fn detail(&self) -> Option<String> {
        match self {
            FetchError::Timeout(d)
            | FetchError::Unreachable(d)
            | FetchError::Request(d)
            | FetchError::InvalidResponse(d)
            | FetchError::CacheCorrupt(d)
            | FetchError::CacheWrite(d) => Some(d.clone()).filter(|d| !d.is_empty()),
            FetchError::HttpStatus { status, reason } => Some(match reason {
                Some(reason) => format!("{status} {reason}"),
                None => status.to_string(),
            }),
            FetchError::PrimaryStale { .. } => None,
            FetchError::NoData(cause) => Some(cause.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorOrigin {
    ExternalService,
    Internal,
}

impl ErrorOrigin {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorOrigin::ExternalService => "External service",
            ErrorOrigin::Internal => "Application",
        }
    }
}

/// User-safe error description with a stable machine code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub code: String,
    pub origin: ErrorOrigin,
    pub origin_label: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorInfo {
    pub fn new(code: &str, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            origin,
            origin_label: origin.label().to_string(),
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: Option<String>) -> Self {
        self.detail = detail;
        self
    }
}

impl From<&FetchError> for ErrorInfo {
    fn from(err: &FetchError) -> Self {
        ErrorInfo::new(err.code(), err.origin(), err.user_message()).with_detail(err.detail())
    }
}
