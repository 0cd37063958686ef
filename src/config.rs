use crate::classifier::FilterLists;
use crate::fetcher::{DEFAULT_FETCH_TIMEOUT, DEFAULT_USER_AGENT};
use crate::guard::GuardPolicy;
use std::time::Duration;
use tracing::info;

/// Whether an optional external check runs at all. Resolved once at
/// startup: a missing credential maps to `Disabled`, it is never treated
/// as an error and never re-checked per request.
#[derive(Clone)]
pub enum CheckState {
    Disabled,
    Enabled(String),
}

impl std::fmt::Debug for CheckState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Credentials stay out of logs
        match self {
            CheckState::Disabled => write!(f, "Disabled"),
            CheckState::Enabled(_) => write!(f, "Enabled(***)"),
        }
    }
}

impl CheckState {
    pub fn from_env(var: &str) -> Self {
        match std::env::var(var) {
            Ok(value) if !value.trim().is_empty() => CheckState::Enabled(value),
            _ => CheckState::Disabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, CheckState::Enabled(_))
    }

    pub fn credential(&self) -> Option<&str> {
        match self {
            CheckState::Enabled(credential) => Some(credential),
            CheckState::Disabled => None,
        }
    }
}

/// Process-wide configuration for the trust & safety pipeline, built once
/// and handed to [`crate::SafetyService`].
#[derive(Clone)]
pub struct SafetyConfig {
    pub guard_policy: GuardPolicy,
    pub filters: FilterLists,
    /// External blocklist lookup (Safe Browsing shaped).
    pub blocklist_check: CheckState,
    /// Generative classifier second opinion.
    pub ai_check: CheckState,
    /// Primary reputation scanner (VirusTotal shaped).
    pub virustotal: CheckState,
    /// Secondary reputation scanner (urlscan.io shaped).
    pub urlscan: CheckState,
    /// Bot-detection token verification.
    pub bot_check: CheckState,
    /// Minimum acceptable bot-detection score, 0.0-1.0.
    pub min_bot_score: f64,
    /// Shared secret for admin token signing and password checks.
    pub admin_secret: String,
    pub fetch_timeout: Duration,
    pub user_agent: String,
    pub max_concurrent_fetches: usize,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            guard_policy: GuardPolicy::DenyInternal,
            filters: FilterLists::default(),
            blocklist_check: CheckState::Disabled,
            ai_check: CheckState::Disabled,
            virustotal: CheckState::Disabled,
            urlscan: CheckState::Disabled,
            bot_check: CheckState::Disabled,
            min_bot_score: 0.5,
            admin_secret: "local-dev-password".to_string(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_concurrent_fetches: 500,
        }
    }
}

impl SafetyConfig {
    /// Reads the recognized environment options. Credential presence
    /// toggles each optional check; absence is not an error.
    pub fn from_env() -> Self {
        let mut config = Self {
            blocklist_check: CheckState::from_env("SAFE_BROWSING_API_KEY"),
            ai_check: CheckState::from_env("GEMINI_API_KEY"),
            virustotal: CheckState::from_env("VIRUSTOTAL_API_KEY"),
            urlscan: CheckState::from_env("URLSCAN_API_KEY"),
            bot_check: CheckState::from_env("RECAPTCHA_SECRET_KEY"),
            ..Self::default()
        };

        if let Ok(secret) = std::env::var("ADMIN_PASSWORD") {
            if !secret.trim().is_empty() {
                config.admin_secret = secret;
            }
        }

        if let Ok(score) = std::env::var("RECAPTCHA_MIN_SCORE") {
            if let Ok(score) = score.parse::<f64>() {
                config.min_bot_score = score.clamp(0.0, 1.0);
            }
        }

        config.filters.whitelist_mode = std::env::var("FILTER_WHITELIST_MODE")
            .map(|v| v == "true")
            .unwrap_or(false);

        if let Ok(hosts) = std::env::var("FETCH_ALLOWED_HOSTS") {
            if !hosts.trim().is_empty() {
                config.guard_policy = GuardPolicy::allow_list(hosts.split(','));
            }
        }

        info!(
            blocklist = config.blocklist_check.is_enabled(),
            ai = config.ai_check.is_enabled(),
            virustotal = config.virustotal.is_enabled(),
            urlscan = config.urlscan.is_enabled(),
            bot = config.bot_check.is_enabled(),
            whitelist_mode = config.filters.whitelist_mode,
            "Safety configuration loaded"
        );

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_state_reflects_credential_presence() {
        let enabled = CheckState::Enabled("key".to_string());
        assert!(enabled.is_enabled());
        assert_eq!(enabled.credential(), Some("key"));

        let disabled = CheckState::Disabled;
        assert!(!disabled.is_enabled());
        assert_eq!(disabled.credential(), None);
    }

    #[test]
    fn default_config_disables_optional_checks() {
        let config = SafetyConfig::default();
        assert!(!config.blocklist_check.is_enabled());
        assert!(!config.virustotal.is_enabled());
        assert!(!config.filters.whitelist_mode);
        assert_eq!(config.min_bot_score, 0.5);
    }
}
