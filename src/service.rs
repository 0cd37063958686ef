use crate::classifier::HeuristicClassifier;
use crate::config::SafetyConfig;
use crate::fetcher::SafeFetcher;
use crate::guard::HostnameGuard;
use crate::rate_limit::{RateLimiter, RateQuota, RateScope};
use crate::reputation::ReputationGateway;
use crate::sanitize;
use crate::scanner::{ScanResult, SecurityScanner};
use crate::token::TokenAuthority;
use crate::{PreviewMetadata, SafetyError, Verdict, VerdictSource};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, instrument};

const MESSAGE_MAX_LEN: usize = 500;
const GATEWAY_TIMEOUT: Duration = Duration::from_secs(15);

/// The narrow contract through which the host application consumes the
/// trust & safety pipeline: synchronous classification at submission
/// time, out-of-band security scanning, guarded preview fetching, and the
/// admin-token / rate-limit primitives gating privileged operations.
#[derive(Clone)]
pub struct SafetyService {
    classifier: Arc<HeuristicClassifier>,
    gateway: Arc<ReputationGateway>,
    scanner: Arc<SecurityScanner>,
    fetcher: SafeFetcher,
    tokens: TokenAuthority,
    submission_limiter: RateLimiter,
    reporting_limiter: RateLimiter,
    admin_limiter: RateLimiter,
    fetch_semaphore: Arc<Semaphore>,
}

impl Default for SafetyService {
    fn default() -> Self {
        Self::new(SafetyConfig::default())
    }
}

impl SafetyService {
    pub fn new(config: SafetyConfig) -> Self {
        let guard = Arc::new(HostnameGuard::new(config.guard_policy.clone()));
        let fetcher = SafeFetcher::with_config(
            Arc::clone(&guard),
            config.fetch_timeout,
            &config.user_agent,
        );

        let gateway_client = Client::builder()
            .timeout(GATEWAY_TIMEOUT)
            .user_agent(config.user_agent.clone())
            .build()
            .expect("Failed to initialize gateway HTTP client");

        let gateway = ReputationGateway::new(
            gateway_client.clone(),
            config.blocklist_check.clone(),
            config.ai_check.clone(),
            config.bot_check.clone(),
            config.min_bot_score,
        );

        let scanner = SecurityScanner::new(
            gateway_client,
            config.virustotal.clone(),
            config.urlscan.clone(),
        );

        debug!("Safety service initialized");

        Self {
            classifier: Arc::new(HeuristicClassifier::new(config.filters.clone())),
            gateway: Arc::new(gateway),
            scanner: Arc::new(scanner),
            fetcher,
            tokens: TokenAuthority::new(config.admin_secret),
            submission_limiter: RateLimiter::for_scope(RateScope::Submission),
            reporting_limiter: RateLimiter::for_scope(RateScope::Reporting),
            admin_limiter: RateLimiter::for_scope(RateScope::Admin),
            fetch_semaphore: Arc::new(Semaphore::new(config.max_concurrent_fetches)),
        }
    }

    /// Classifies a submitted URL + message. Called synchronously at
    /// submission time; an unsafe verdict must block persistence. Runs
    /// the local heuristics first, then the optional external second
    /// opinions (blocklist, then AI classifier), each of which fails
    /// open when unavailable.
    #[instrument(level = "debug", skip(self, message))]
    pub async fn classify(&self, url: &str, message: &str) -> Verdict {
        let Some(clean_url) = sanitize::sanitize_url(url) else {
            return Verdict::rejected("Invalid URL format", VerdictSource::Heuristic);
        };
        let clean_message = sanitize::sanitize_text(message, MESSAGE_MAX_LEN);

        let verdict = self.classifier.classify(&clean_url, &clean_message);
        if !verdict.safe {
            return verdict;
        }

        let blocklist = self.gateway.check_blocklist(&clean_url).await;
        if !blocklist.safe {
            let threat = blocklist.threat.unwrap_or_else(|| "UNKNOWN".to_string());
            return Verdict::rejected(
                format!("Blocked by Safe Browsing: {threat}"),
                VerdictSource::Blocklist,
            );
        }

        let ai = self.gateway.check_with_ai(&clean_url).await;
        if !ai.safe {
            return Verdict::rejected(ai.reason, VerdictSource::AiClassifier);
        }

        verdict
    }

    /// Runs the asynchronous multi-source security scan. Invoked after a
    /// link is persisted; the caller writes the resulting status back
    /// onto the link record and hides the link when
    /// [`crate::ScanStatus::requires_review`] holds.
    pub async fn scan_security(&self, url: &str) -> ScanResult {
        self.scanner.scan(url).await
    }

    /// Fetches guarded preview metadata. Never fails; saturated
    /// concurrency also degrades to the sentinel rather than queueing
    /// indefinitely or erroring.
    pub async fn fetch_preview_metadata(&self, url: &str) -> PreviewMetadata {
        let Ok(_permit) = self.fetch_semaphore.acquire().await else {
            SafetyError::ConcurrencyLimit.log();
            return PreviewMetadata::unavailable();
        };
        self.fetcher.fetch_metadata(url).await
    }

    /// Exchanges the admin shared secret for a signed session token.
    pub fn issue_admin_token(&self, password: &str) -> Option<String> {
        self.tokens.authenticate(password)
    }

    pub fn verify_admin_token(&self, token: &str) -> bool {
        self.tokens.verify(token)
    }

    /// Counts one request from `identity` against the scope's window.
    pub fn rate_limit(
        &self,
        identity: &str,
        limit: u32,
        scope: RateScope,
    ) -> Result<RateQuota, SafetyError> {
        let limiter = match scope {
            RateScope::Submission => &self.submission_limiter,
            RateScope::Reporting => &self.reporting_limiter,
            RateScope::Admin => &self.admin_limiter,
        };
        limiter.check(identity, limit)
    }

    pub fn gateway(&self) -> &ReputationGateway {
        &self.gateway
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn classify_rejects_malformed_urls_as_input_errors() {
        let service = SafetyService::default();

        let verdict = service.classify("not-a-url", "hello").await;
        assert!(!verdict.safe);
        assert_eq!(verdict.reason.as_deref(), Some("Invalid URL format"));

        let verdict = service.classify("javascript:alert(1)", "").await;
        assert!(!verdict.safe);
    }

    #[tokio::test]
    async fn classify_accepts_clean_submission() {
        let service = SafetyService::default();

        let verdict = service
            .classify("https://github.com/user/repo", "check this out")
            .await;
        assert!(verdict.safe);
        assert_eq!(verdict.source, VerdictSource::Heuristic);
    }

    #[tokio::test]
    async fn classify_applies_heuristics_to_sanitized_message() {
        let service = SafetyService::default();

        // Markup does not hide a keyword from the classifier
        let verdict = service
            .classify("https://example.com", "<b>nsfw</b> content")
            .await;
        assert_eq!(verdict.reason.as_deref(), Some("Adult content (nsfw)"));
    }

    #[tokio::test]
    async fn admin_token_round_trip() {
        let service = SafetyService::default();

        let token = service.issue_admin_token("local-dev-password").unwrap();
        assert!(service.verify_admin_token(&token));
        assert!(service.issue_admin_token("wrong").is_none());
        assert!(!service.verify_admin_token("garbage"));
    }

    #[tokio::test]
    async fn rate_limit_scopes_are_independent() {
        let service = SafetyService::default();

        for _ in 0..2 {
            service
                .rate_limit("9.9.9.9", 2, RateScope::Submission)
                .expect("within limit");
        }
        assert!(service
            .rate_limit("9.9.9.9", 2, RateScope::Submission)
            .is_err());
        // Same identity, different scope: fresh counter
        assert!(service.rate_limit("9.9.9.9", 2, RateScope::Admin).is_ok());
    }
}
