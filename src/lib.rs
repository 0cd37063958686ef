//! URL trust & safety pipeline: decides whether untrusted, user-submitted
//! URLs are safe to display and safe to fetch metadata from, without the
//! fetch step ever becoming a network probe against internal
//! infrastructure.
//!
//! The pipeline is consumed through [`SafetyService`]: synchronous
//! heuristic classification at submission time, an asynchronous
//! multi-source security scan after acceptance, an SSRF-hardened preview
//! fetcher, and the signed-token / rate-limit primitives gating
//! privileged operations.

use serde::{Deserialize, Serialize};

mod classifier;
mod config;
mod error;
mod extractor;
mod fetcher;
mod guard;
mod logging;
mod rate_limit;
mod reputation;
mod sanitize;
mod scanner;
mod service;
mod token;

pub use classifier::{FilterLists, HeuristicClassifier};
pub use config::{CheckState, SafetyConfig};
pub use error::SafetyError;
pub use extractor::MetadataExtractor;
pub use fetcher::{SafeFetcher, DEFAULT_FETCH_TIMEOUT, DEFAULT_USER_AGENT};
pub use guard::{GuardPolicy, HostnameGuard};
pub use logging::{setup_logging, LogConfig};
pub use rate_limit::{RateLimiter, RateLimiterConfig, RateQuota, RateScope};
pub use reputation::{AiCheck, BlocklistCheck, BotCheck, ReputationGateway};
pub use sanitize::{sanitize_text, sanitize_url};
pub use scanner::{
    reconcile, ReputationScanner, ScanResult, ScanStatus, SecurityScanner, SourceReport,
    SourceStatus, UrlscanScanner, VirusTotalScanner,
};
pub use service::SafetyService;
pub use token::TokenAuthority;

/// Which stage of the pipeline produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerdictSource {
    #[serde(rename = "heuristic")]
    Heuristic,
    #[serde(rename = "blocklist")]
    Blocklist,
    #[serde(rename = "ai-classifier")]
    AiClassifier,
}

/// Immutable classification result, produced fresh per call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub safe: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub source: VerdictSource,
}

impl Verdict {
    pub fn accepted(source: VerdictSource) -> Self {
        Self {
            safe: true,
            reason: None,
            source,
        }
    }

    pub fn rejected(reason: impl Into<String>, source: VerdictSource) -> Self {
        Self {
            safe: false,
            reason: Some(reason.into()),
            source,
        }
    }
}

/// Link preview metadata. Failures surface as the
/// [`PreviewMetadata::unavailable`] sentinel, never as an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewMetadata {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub description: String,
}

impl PreviewMetadata {
    pub fn unavailable() -> Self {
        Self {
            title: "Link Preview Unavailable".to_string(),
            image: None,
            description: "Unable to fetch preview. Click to view the link.".to_string(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        *self == Self::unavailable()
    }
}
