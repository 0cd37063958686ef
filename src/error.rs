use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum SafetyError {
    #[error("Failed to parse URL: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("URL scheme not allowed: {0}")]
    InvalidScheme(String),

    #[error("Access to internal/private networks is not allowed: {0}")]
    HostBlocked(String),

    #[error("Access to port {0} is not allowed")]
    PortBlocked(u16),

    #[error("Domain not in allow list: {0}")]
    DomainNotAllowed(String),

    #[error("Failed to fetch content: {0}")]
    FetchError(String),

    #[error("Request timeout: {0}")]
    TimeoutError(String),

    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Concurrency limit reached")]
    ConcurrencyLimit,
}

impl SafetyError {
    pub fn log(&self) {
        match self {
            SafetyError::UrlParse(e) => {
                warn!(error = %e, "URL parsing failed");
            }
            SafetyError::InvalidScheme(s) => {
                warn!(scheme = %s, "Rejected URL scheme");
            }
            SafetyError::HostBlocked(h) => {
                warn!(host = %h, "Blocked internal/private host");
            }
            SafetyError::PortBlocked(p) => {
                warn!(port = %p, "Blocked non-HTTP service port");
            }
            SafetyError::DomainNotAllowed(d) => {
                warn!(domain = %d, "Domain not in allow list");
            }
            SafetyError::FetchError(e) => {
                error!(error = %e, "Content fetch failed");
            }
            SafetyError::TimeoutError(e) => {
                warn!(error = %e, "Request timed out");
            }
            SafetyError::RateLimited { retry_after_secs } => {
                warn!(retry_after_secs, "Rate limit exceeded");
            }
            SafetyError::ConcurrencyLimit => {
                warn!("Concurrent request limit reached");
            }
        }
    }
}
