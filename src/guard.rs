use crate::error::SafetyError;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Hostname literals that always refer to the local machine.
const BLOCKED_HOSTNAMES: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "local",
    "127.0.0.1",
    "0.0.0.0",
    "::1",
    "[::]",
    "[::1]",
];

/// Domain suffixes reserved for internal networks.
const BLOCKED_SUFFIXES: &[&str] = &[
    ".local",
    ".localhost",
    ".localdomain",
    ".internal",
    ".intranet",
    ".corp",
    ".home",
    ".lan",
    ".private",
];

/// Cloud metadata endpoints (AWS, GCP, Azure, ECS).
const METADATA_ENDPOINTS: &[&str] = &[
    "169.254.169.254",
    "metadata.google.internal",
    "metadata.goog",
    "169.254.170.2",
];

/// Non-HTTP service ports commonly exposed on internal hosts.
const BLOCKED_PORTS: &[u16] = &[22, 23, 25, 3306, 5432, 6379, 27017, 9200, 11211];

/// Deployment-time guard mode. The two policies are mutually exclusive:
/// either all public hosts are reachable with internal ranges denied, or
/// only an enumerated set of hosts is reachable and everything else is
/// denied.
#[derive(Debug, Clone)]
pub enum GuardPolicy {
    /// Allow the public internet, deny loopback/private/link-local ranges,
    /// internal hostnames and cloud metadata endpoints.
    DenyInternal,
    /// Allow only the listed hostnames and domain suffixes.
    AllowListOnly {
        hostnames: HashSet<String>,
        suffixes: HashSet<String>,
    },
}

impl Default for GuardPolicy {
    fn default() -> Self {
        GuardPolicy::DenyInternal
    }
}

impl GuardPolicy {
    /// Builds an allow-list policy from entries like `example.com` or
    /// `.example.com` (leading dot marks a suffix entry).
    pub fn allow_list<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut hostnames = HashSet::new();
        let mut suffixes = HashSet::new();
        for entry in entries {
            let entry = entry.as_ref().trim().to_ascii_lowercase();
            if entry.is_empty() {
                continue;
            }
            if let Some(stripped) = entry.strip_prefix('.') {
                suffixes.insert(format!(".{stripped}"));
            } else {
                hostnames.insert(entry);
            }
        }
        GuardPolicy::AllowListOnly {
            hostnames,
            suffixes,
        }
    }
}

/// Classifies hostname/port pairs as internal-network-reachable or not.
/// Consulted by [`crate::SafeFetcher`] before every outbound request.
#[derive(Debug, Clone, Default)]
pub struct HostnameGuard {
    policy: GuardPolicy,
}

impl HostnameGuard {
    pub fn new(policy: GuardPolicy) -> Self {
        Self { policy }
    }

    /// Returns `Ok(())` when the target may be fetched, or the specific
    /// rejection otherwise. Guard rejections are hard failures, never
    /// fail-open.
    pub fn check(&self, hostname: &str, port: Option<u16>) -> Result<(), SafetyError> {
        if let Some(port) = port {
            if BLOCKED_PORTS.contains(&port) {
                return Err(SafetyError::PortBlocked(port));
            }
        }

        let host = hostname.to_ascii_lowercase();

        match &self.policy {
            GuardPolicy::AllowListOnly {
                hostnames,
                suffixes,
            } => {
                let allowed = hostnames.contains(&host)
                    || suffixes.iter().any(|suffix| host.ends_with(suffix));
                if allowed {
                    Ok(())
                } else {
                    Err(SafetyError::DomainNotAllowed(host))
                }
            }
            GuardPolicy::DenyInternal => {
                if self.is_internal(&host) {
                    Err(SafetyError::HostBlocked(host))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Convenience predicate over [`HostnameGuard::check`].
    pub fn is_blocked(&self, hostname: &str, port: Option<u16>) -> bool {
        self.check(hostname, port).is_err()
    }

    fn is_internal(&self, host: &str) -> bool {
        if BLOCKED_HOSTNAMES.contains(&host) || METADATA_ENDPOINTS.contains(&host) {
            return true;
        }

        if BLOCKED_SUFFIXES
            .iter()
            .any(|suffix| host.ends_with(suffix))
        {
            return true;
        }

        // Bracketed or colon-containing hosts are IPv6 literals. A literal
        // that does not parse cannot be vetted, so it is rejected outright.
        if host.starts_with('[') || host.contains(':') {
            let literal = host.trim_start_matches('[').trim_end_matches(']');
            return match literal.parse::<Ipv6Addr>() {
                Ok(ip) => self.is_private_ipv6(&ip),
                Err(_) => true,
            };
        }

        if let Ok(ip) = host.parse::<IpAddr>() {
            return match ip {
                IpAddr::V4(ipv4) => self.is_private_ipv4(&ipv4),
                IpAddr::V6(ipv6) => self.is_private_ipv6(&ipv6),
            };
        }

        false
    }

    fn is_private_ipv4(&self, ip: &Ipv4Addr) -> bool {
        let octets = ip.octets();

        ip.is_loopback()
            || ip.is_private()
            || ip.is_link_local()
            || ip.is_unspecified()
            || ip.is_broadcast()
            // 0.0.0.0/8
            || octets[0] == 0
            // 100.64.0.0/10 (Carrier-grade NAT)
            || (octets[0] == 100 && (octets[1] & 0b1100_0000) == 0b0100_0000)
    }

    fn is_private_ipv6(&self, ip: &Ipv6Addr) -> bool {
        // An IPv4-mapped (or deprecated IPv4-compatible) literal reaches
        // the embedded IPv4 target, so it is vetted under the IPv4 rules
        if let Some(embedded) = ip.to_ipv4_mapped().or_else(|| ip.to_ipv4()) {
            return self.is_private_ipv4(&embedded);
        }

        let segments = ip.segments();

        ip.is_loopback()
            || ip.is_unspecified()
            // fe80::/10 link-local
            || (segments[0] & 0xffc0) == 0xfe80
            // fc00::/7 unique local
            || (segments[0] & 0xfe00) == 0xfc00
    }
}
