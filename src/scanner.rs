use crate::config::CheckState;
use async_trait::async_trait;
use base64::prelude::*;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// Reconciled verdict over all scan sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Safe,
    Suspicious,
    Malicious,
    Pending,
    Error,
}

impl ScanStatus {
    /// Whether the storage collaborator should pull the link out of
    /// public visibility pending human review.
    pub fn requires_review(&self) -> bool {
        matches!(self, ScanStatus::Malicious | ScanStatus::Suspicious)
    }
}

/// Completion state of a single scan source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Completed,
    Pending,
    Skipped,
    RateLimited,
    Error,
}

/// Normalized sub-result from one reputation scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceReport {
    pub status: SourceStatus,
    /// Corroborating malicious detections (engine count).
    #[serde(default)]
    pub malicious: u32,
    #[serde(default)]
    pub suspicious: u32,
    #[serde(default)]
    pub harmless: u32,
    #[serde(default)]
    pub undetected: u32,
    /// Explicit malicious verdict flag from verdict-style scanners.
    #[serde(default)]
    pub malicious_verdict: bool,
    /// Numeric risk score on a 0-100 scale.
    #[serde(default)]
    pub score: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SourceReport {
    fn with_status(status: SourceStatus, detail: Option<String>) -> Self {
        Self {
            status,
            malicious: 0,
            suspicious: 0,
            harmless: 0,
            undetected: 0,
            malicious_verdict: false,
            score: 0,
            detail,
        }
    }

    pub fn skipped(detail: &str) -> Self {
        Self::with_status(SourceStatus::Skipped, Some(detail.to_string()))
    }

    pub fn pending(detail: &str) -> Self {
        Self::with_status(SourceStatus::Pending, Some(detail.to_string()))
    }

    pub fn rate_limited() -> Self {
        Self::with_status(SourceStatus::RateLimited, Some("Rate limit exceeded".into()))
    }

    pub fn error(detail: &str) -> Self {
        Self::with_status(SourceStatus::Error, Some(detail.to_string()))
    }
}

/// One scan invocation's outcome; owned by the caller, which persists it
/// and applies [`ScanStatus::requires_review`] to the link record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub status: ScanStatus,
    pub sources: HashMap<String, SourceReport>,
    pub scanned_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// A third-party reputation scan source. Implementations never error:
/// upstream failure is reported as an inconclusive [`SourceStatus`], not
/// propagated, so one broken vendor cannot abort the other scan.
#[async_trait]
pub trait ReputationScanner: Send + Sync {
    fn name(&self) -> &'static str;
    async fn scan(&self, url: &str) -> SourceReport;
}

/// VirusTotal v3 URL lookups: fetch an existing report by URL identifier,
/// or submit the URL for analysis when none exists yet.
pub struct VirusTotalScanner {
    client: Client,
    key: CheckState,
}

impl VirusTotalScanner {
    pub fn new(client: Client, key: CheckState) -> Self {
        Self { client, key }
    }

    /// VirusTotal URL identifier: base64url without padding.
    fn url_id(url: &str) -> String {
        BASE64_URL_SAFE_NO_PAD.encode(url.as_bytes())
    }
}

#[async_trait]
impl ReputationScanner for VirusTotalScanner {
    fn name(&self) -> &'static str {
        "virustotal"
    }

    #[instrument(level = "debug", skip(self))]
    async fn scan(&self, url: &str) -> SourceReport {
        let Some(api_key) = self.key.credential() else {
            return SourceReport::skipped("API key not configured");
        };

        let report_url = format!(
            "https://www.virustotal.com/api/v3/urls/{}",
            Self::url_id(url)
        );

        let response = match self
            .client
            .get(&report_url)
            .header("x-apikey", api_key)
            .header("Accept", "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "VirusTotal report request failed");
                return SourceReport::error(&e.to_string());
            }
        };

        match response.status().as_u16() {
            200 => {
                let data: Value = match response.json().await {
                    Ok(data) => data,
                    Err(e) => return SourceReport::error(&e.to_string()),
                };
                let stats = &data["data"]["attributes"]["last_analysis_stats"];
                let count = |field: &str| stats[field].as_u64().unwrap_or(0) as u32;

                SourceReport {
                    status: SourceStatus::Completed,
                    malicious: count("malicious"),
                    suspicious: count("suspicious"),
                    harmless: count("harmless"),
                    undetected: count("undetected"),
                    malicious_verdict: false,
                    score: 0,
                    detail: None,
                }
            }
            // No existing report; submit the URL for analysis
            404 => {
                debug!(%url, "No VirusTotal report, submitting for analysis");
                match self
                    .client
                    .post("https://www.virustotal.com/api/v3/urls")
                    .header("x-apikey", api_key)
                    .form(&[("url", url)])
                    .send()
                    .await
                {
                    Ok(submit) if submit.status().is_success() => {
                        let data: Value = submit.json().await.unwrap_or(Value::Null);
                        let analysis_id = data["data"]["id"].as_str().unwrap_or("unknown");
                        SourceReport::pending(&format!("submitted for scanning: {analysis_id}"))
                    }
                    Ok(submit) => {
                        SourceReport::error(&format!("submission failed: {}", submit.status()))
                    }
                    Err(e) => SourceReport::error(&e.to_string()),
                }
            }
            429 => SourceReport::rate_limited(),
            status => SourceReport::error(&format!("unexpected status {status}")),
        }
    }
}

/// urlscan.io submissions. Scanning is scan-then-poll: a successful
/// submission reports `Pending`; [`UrlscanScanner::fetch_result`] polls
/// the verdict by UUID later.
pub struct UrlscanScanner {
    client: Client,
    key: CheckState,
}

impl UrlscanScanner {
    pub fn new(client: Client, key: CheckState) -> Self {
        Self { client, key }
    }

    /// Polls a previously submitted scan. 404 means the scan has not
    /// finished yet; 410 means the result expired.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_result(&self, uuid: &str) -> SourceReport {
        let result_url = format!("https://urlscan.io/api/v1/result/{uuid}/");

        let response = match self.client.get(&result_url).send().await {
            Ok(response) => response,
            Err(e) => return SourceReport::error(&e.to_string()),
        };

        match response.status().as_u16() {
            200 => {
                let data: Value = match response.json().await {
                    Ok(data) => data,
                    Err(e) => return SourceReport::error(&e.to_string()),
                };
                let verdict = &data["verdicts"]["overall"];
                SourceReport {
                    status: SourceStatus::Completed,
                    malicious: 0,
                    suspicious: 0,
                    harmless: 0,
                    undetected: 0,
                    malicious_verdict: verdict["malicious"] == Value::Bool(true),
                    score: verdict["score"].as_u64().unwrap_or(0).min(100) as u32,
                    detail: data["task"]["screenshotURL"].as_str().map(String::from),
                }
            }
            404 => SourceReport::pending("Scan still in progress"),
            410 => SourceReport::error("Scan result no longer available"),
            status => SourceReport::error(&format!("unexpected status {status}")),
        }
    }
}

#[async_trait]
impl ReputationScanner for UrlscanScanner {
    fn name(&self) -> &'static str {
        "urlscan"
    }

    #[instrument(level = "debug", skip(self))]
    async fn scan(&self, url: &str) -> SourceReport {
        let Some(api_key) = self.key.credential() else {
            return SourceReport::skipped("API key not configured");
        };

        let body = json!({
            "url": url,
            "visibility": "unlisted",
            "tags": ["linkshield", "auto-scan"]
        });

        let response = match self
            .client
            .post("https://urlscan.io/api/v1/scan/")
            .header("API-Key", api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "urlscan submission failed");
                return SourceReport::error(&e.to_string());
            }
        };

        match response.status().as_u16() {
            200 => {
                let data: Value = response.json().await.unwrap_or(Value::Null);
                let uuid = data["uuid"].as_str().unwrap_or("unknown");
                SourceReport::pending(&format!("submitted: {uuid}"))
            }
            429 => SourceReport::rate_limited(),
            status => SourceReport::error(&format!("unexpected status {status}")),
        }
    }
}

/// Most-severe-wins reconciliation over the two sub-results. Skipped
/// sources (no credential configured) contribute nothing; errored or
/// rate-limited sources are inconclusive and floor the verdict at
/// `Pending` so a human reviewer sees them, never `Safe`.
pub fn reconcile(reports: &[&SourceReport]) -> ScanStatus {
    if reports
        .iter()
        .any(|r| r.malicious >= 3 || r.malicious_verdict)
    {
        return ScanStatus::Malicious;
    }

    if reports
        .iter()
        .any(|r| r.malicious >= 1 || r.suspicious >= 2 || r.score >= 50)
    {
        return ScanStatus::Suspicious;
    }

    if reports.iter().any(|r| {
        matches!(
            r.status,
            SourceStatus::Pending | SourceStatus::Error | SourceStatus::RateLimited
        )
    }) {
        return ScanStatus::Pending;
    }

    ScanStatus::Safe
}

/// Runs the two reputation scanners concurrently and reconciles their
/// verdicts. Invoked out-of-band after a link is already persisted, so
/// scan latency never blocks the submission path; total latency is
/// bounded by the slower scanner, not the sum.
pub struct SecurityScanner {
    primary: Box<dyn ReputationScanner>,
    secondary: Box<dyn ReputationScanner>,
}

impl SecurityScanner {
    pub fn new(client: Client, virustotal: CheckState, urlscan: CheckState) -> Self {
        Self {
            primary: Box::new(VirusTotalScanner::new(client.clone(), virustotal)),
            secondary: Box::new(UrlscanScanner::new(client, urlscan)),
        }
    }

    /// Swaps in arbitrary scan sources; used by tests and by deployments
    /// with different vendors.
    pub fn with_scanners(
        primary: Box<dyn ReputationScanner>,
        secondary: Box<dyn ReputationScanner>,
    ) -> Self {
        Self { primary, secondary }
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn scan(&self, url: &str) -> ScanResult {
        let started = Instant::now();

        let (primary_report, secondary_report) =
            futures::future::join(self.primary.scan(url), self.secondary.scan(url)).await;

        let status = reconcile(&[&primary_report, &secondary_report]);
        let duration_ms = started.elapsed().as_millis() as u64;

        debug!(%url, ?status, duration_ms, "Security scan finished");

        let mut sources = HashMap::new();
        sources.insert(self.primary.name().to_string(), primary_report);
        sources.insert(self.secondary.name().to_string(), secondary_report);

        ScanResult {
            status,
            sources,
            scanned_at: Utc::now(),
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubScanner {
        name: &'static str,
        report: SourceReport,
    }

    #[async_trait]
    impl ReputationScanner for StubScanner {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn scan(&self, _url: &str) -> SourceReport {
            self.report.clone()
        }
    }

    fn completed(malicious: u32, suspicious: u32) -> SourceReport {
        SourceReport {
            status: SourceStatus::Completed,
            malicious,
            suspicious,
            harmless: 50,
            undetected: 10,
            malicious_verdict: false,
            score: 0,
            detail: None,
        }
    }

    fn verdict(malicious_verdict: bool, score: u32) -> SourceReport {
        SourceReport {
            status: SourceStatus::Completed,
            malicious: 0,
            suspicious: 0,
            harmless: 0,
            undetected: 0,
            malicious_verdict,
            score,
            detail: None,
        }
    }

    fn scanner_with(a: SourceReport, b: SourceReport) -> SecurityScanner {
        SecurityScanner::with_scanners(
            Box::new(StubScanner {
                name: "virustotal",
                report: a,
            }),
            Box::new(StubScanner {
                name: "urlscan",
                report: b,
            }),
        )
    }

    #[test]
    fn test_reconcile_malicious_detections_win() {
        assert_eq!(
            reconcile(&[&completed(3, 0), &verdict(false, 0)]),
            ScanStatus::Malicious
        );
        assert_eq!(
            reconcile(&[&completed(0, 0), &verdict(true, 0)]),
            ScanStatus::Malicious
        );
    }

    #[test]
    fn test_reconcile_suspicious_signals() {
        assert_eq!(
            reconcile(&[&completed(1, 0), &verdict(false, 0)]),
            ScanStatus::Suspicious
        );
        assert_eq!(
            reconcile(&[&completed(0, 2), &verdict(false, 0)]),
            ScanStatus::Suspicious
        );
        assert_eq!(
            reconcile(&[&completed(0, 0), &verdict(false, 50)]),
            ScanStatus::Suspicious
        );
        assert_eq!(
            reconcile(&[&completed(0, 0), &verdict(false, 49)]),
            ScanStatus::Safe
        );
    }

    #[test]
    fn test_reconcile_errors_are_inconclusive_never_safe() {
        assert_eq!(
            reconcile(&[&SourceReport::error("down"), &SourceReport::error("down")]),
            ScanStatus::Pending
        );
        assert_eq!(
            reconcile(&[&completed(0, 0), &SourceReport::rate_limited()]),
            ScanStatus::Pending
        );
        assert_eq!(
            reconcile(&[&SourceReport::pending("submitted"), &completed(0, 0)]),
            ScanStatus::Pending
        );
    }

    #[test]
    fn test_reconcile_skipped_sources_contribute_nothing() {
        assert_eq!(
            reconcile(&[
                &SourceReport::skipped("no key"),
                &SourceReport::skipped("no key")
            ]),
            ScanStatus::Safe
        );
    }

    #[test]
    fn test_virustotal_url_id_is_base64url_no_pad() {
        let id = VirusTotalScanner::url_id("https://example.com/path?a=1");
        assert!(!id.contains('='));
        assert!(!id.contains('+'));
        assert!(!id.contains('/'));
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[tokio::test]
    async fn scan_reconciles_most_severe_verdict() {
        let scanner = scanner_with(completed(3, 0), verdict(false, 0));
        let result = scanner.scan("https://example.com").await;

        assert_eq!(result.status, ScanStatus::Malicious);
        assert!(result.status.requires_review());
        assert_eq!(result.sources.len(), 2);
        assert!(result.sources.contains_key("virustotal"));
        assert!(result.sources.contains_key("urlscan"));
    }

    #[tokio::test]
    async fn scan_with_both_sources_failing_is_pending() {
        let scanner = scanner_with(SourceReport::error("down"), SourceReport::error("down"));
        let result = scanner.scan("https://example.com").await;

        assert_eq!(result.status, ScanStatus::Pending);
        assert!(!result.status.requires_review());
    }

    #[tokio::test]
    async fn scan_with_clean_sources_is_safe() {
        let scanner = scanner_with(completed(0, 0), verdict(false, 10));
        let result = scanner.scan("https://example.com").await;

        assert_eq!(result.status, ScanStatus::Safe);
    }
}
