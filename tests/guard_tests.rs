use linkshield::{GuardPolicy, HostnameGuard, SafetyError};

#[test]
fn test_private_and_loopback_ranges_are_blocked() {
    let guard = HostnameGuard::default();

    let blocked = [
        "127.0.0.1",
        "127.255.255.254",
        "10.0.0.1",
        "10.255.255.255",
        "172.16.0.1",
        "172.20.10.5",
        "172.31.255.255",
        "192.168.0.1",
        "192.168.255.255",
        "169.254.0.1",
        "100.64.0.1",
        "100.127.255.255",
        "0.0.0.0",
        "255.255.255.255",
    ];
    for host in blocked {
        assert!(guard.is_blocked(host, None), "{host} should be blocked");
    }
}

#[test]
fn test_public_hosts_are_allowed() {
    let guard = HostnameGuard::default();

    let allowed = [
        "example.com",
        "news.ycombinator.com",
        "8.8.8.8",
        "1.1.1.1",
        "172.15.0.1",
        "172.32.0.1",
        "100.63.0.1",
        "100.128.0.1",
        "192.167.0.1",
        "11.0.0.1",
    ];
    for host in allowed {
        assert!(!guard.is_blocked(host, None), "{host} should be allowed");
    }
}

#[test]
fn test_ipv6_literals_are_matched_bracketed_or_bare() {
    let guard = HostnameGuard::default();

    for host in ["::1", "[::1]", "[::]", "[fe80::1]", "[febf::1]", "[fc00::1]", "[fdff::1]"] {
        assert!(guard.is_blocked(host, None), "{host} should be blocked");
    }

    // Public IPv6 is fine
    assert!(!guard.is_blocked("[2606:4700:4700::1111]", None));
}

#[test]
fn test_ipv4_mapped_literals_get_ipv4_treatment() {
    let guard = HostnameGuard::default();

    // A mapped literal reaches the embedded IPv4 host, so loopback and
    // private ranges stay unreachable through the IPv6 spelling
    for host in [
        "[::ffff:127.0.0.1]",
        "[::ffff:10.0.0.1]",
        "[::ffff:172.16.0.1]",
        "[::ffff:192.168.0.1]",
        "[::ffff:169.254.170.2]",
        "[::ffff:100.64.0.1]",
        "::ffff:127.0.0.1",
    ] {
        assert!(guard.is_blocked(host, None), "{host} should be blocked");
    }

    assert!(!guard.is_blocked("[::ffff:1.1.1.1]", None));
}

#[test]
fn test_internal_hostnames_and_suffixes() {
    let guard = HostnameGuard::default();

    for host in [
        "localhost",
        "localhost.localdomain",
        "intranet.corp",
        "nas.home",
        "fileserver.private",
        "router.lan",
        "ci.internal",
        "build.intranet",
        "host.localdomain",
    ] {
        assert!(guard.is_blocked(host, None), "{host} should be blocked");
    }

    // Suffix matching does not over-match lookalike public domains
    assert!(!guard.is_blocked("mylocal.com", None));
    assert!(!guard.is_blocked("internal-tools.example.com", None));
}

#[test]
fn test_cloud_metadata_endpoints_are_blocked() {
    let guard = HostnameGuard::default();

    for host in [
        "169.254.169.254",
        "metadata.google.internal",
        "metadata.goog",
        "169.254.170.2",
    ] {
        assert!(guard.is_blocked(host, None), "{host} should be blocked");
    }
}

#[test]
fn test_check_reports_specific_rejections() {
    let guard = HostnameGuard::default();

    assert!(matches!(
        guard.check("10.0.0.1", None),
        Err(SafetyError::HostBlocked(_))
    ));
    assert!(matches!(
        guard.check("example.com", Some(5432)),
        Err(SafetyError::PortBlocked(5432))
    ));
    assert!(guard.check("example.com", Some(443)).is_ok());
}

#[test]
fn test_allow_list_mode_is_exclusive() {
    let guard = HostnameGuard::new(GuardPolicy::allow_list([
        "docs.example.com",
        ".wiki.example.org",
    ]));

    assert!(guard.check("docs.example.com", None).is_ok());
    assert!(guard.check("a.wiki.example.org", None).is_ok());

    // Even perfectly ordinary public hosts are denied in allow-list mode
    assert!(matches!(
        guard.check("github.com", None),
        Err(SafetyError::DomainNotAllowed(_))
    ));
    assert!(matches!(
        guard.check("8.8.8.8", None),
        Err(SafetyError::DomainNotAllowed(_))
    ));
}
