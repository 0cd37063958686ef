use base64::prelude::*;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt::Write;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Token lifetime: 24 hours.
const TOKEN_TTL_MS: u128 = 24 * 60 * 60 * 1000;

/// Issues and verifies short-lived signed admin session tokens. Tokens
/// are self-verifying: base64 of `timestamp ":" hex(HMAC-SHA256(secret,
/// timestamp))`, no server-side session store. There is no revocation
/// list; compromise mitigation is the 24h expiry plus secret rotation.
#[derive(Clone)]
pub struct TokenAuthority {
    secret: String,
}

impl TokenAuthority {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn issue(&self) -> String {
        self.issue_at(now_ms())
    }

    pub fn verify(&self, token: &str) -> bool {
        self.verify_at(token, now_ms())
    }

    /// Issues a token for the supplied password: the password must match
    /// the shared secret. The comparison is constant-time and the result
    /// never reveals how close a wrong password was.
    pub fn authenticate(&self, password: &str) -> Option<String> {
        let matches: bool = password
            .as_bytes()
            .ct_eq(self.secret.as_bytes())
            .into();
        if matches {
            debug!("Admin authentication succeeded, issuing token");
            Some(self.issue())
        } else {
            debug!("Admin authentication failed");
            None
        }
    }

    pub(crate) fn issue_at(&self, now_ms: u128) -> String {
        let timestamp = now_ms.to_string();
        let signature = self.sign(&timestamp);
        BASE64_STANDARD.encode(format!("{timestamp}:{signature}"))
    }

    pub(crate) fn verify_at(&self, token: &str, now_ms: u128) -> bool {
        let Ok(decoded) = BASE64_STANDARD.decode(token) else {
            return false;
        };
        let Ok(decoded) = String::from_utf8(decoded) else {
            return false;
        };

        let Some((timestamp, signature)) = decoded.split_once(':') else {
            return false;
        };
        if timestamp.is_empty() || signature.is_empty() {
            return false;
        }

        let Ok(issued_at) = timestamp.parse::<u128>() else {
            return false;
        };
        if now_ms.saturating_sub(issued_at) > TOKEN_TTL_MS {
            return false;
        }

        let expected = self.sign(timestamp);
        // Constant-time comparison; naive equality would leak timing
        // usable to forge signatures byte-by-byte.
        signature.as_bytes().ct_eq(expected.as_bytes()).into()
    }

    fn sign(&self, timestamp: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(timestamp.as_bytes());
        let digest = mac.finalize().into_bytes();

        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            let _ = write!(hex, "{byte:02x}");
        }
        hex
    }
}

fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}
