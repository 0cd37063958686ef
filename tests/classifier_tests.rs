use linkshield::{FilterLists, HeuristicClassifier};

#[test]
fn test_gambling_path_is_rejected() {
    let classifier = HeuristicClassifier::default();

    let verdict = classifier.classify("http://example.com/slot88", "");
    assert!(!verdict.safe);
    assert!(verdict.reason.unwrap().contains("Gambling"));
}

#[test]
fn test_ordinary_link_is_accepted() {
    let classifier = HeuristicClassifier::default();

    let verdict = classifier.classify("https://github.com/user/repo", "check this out");
    assert!(verdict.safe);
    assert!(verdict.reason.is_none());
}

#[test]
fn test_spam_score_threshold() {
    let classifier = HeuristicClassifier::default();

    // Two spam shapes together: rejected by the spam-pattern rule
    let verdict = classifier.classify("https://blog.example.org", "GACOR88 link alternatif");
    assert_eq!(verdict.reason.as_deref(), Some("Spam pattern detected"));

    // Either shape alone scores 1 and is not rejected by the spam rule
    let verdict = classifier.classify("https://blog.example.org", "link alternatif");
    assert_ne!(verdict.reason.as_deref(), Some("Spam pattern detected"));

    let verdict = classifier.classify("https://blog.example.org", "GACOR88");
    assert_ne!(verdict.reason.as_deref(), Some("Spam pattern detected"));
    // ...though the keyword cascade still catches it further down
    assert_eq!(verdict.reason.as_deref(), Some("Gambling (gacor)"));
}

#[test]
fn test_rule_precedence_is_stable() {
    let classifier = HeuristicClassifier::default();

    // A URL hitting both the TLD rule and the keyword rules is rejected
    // by the TLD rule, which runs first
    let verdict = classifier.classify("https://lucky.casino", "");
    assert_eq!(verdict.reason.as_deref(), Some("Gambling TLD (.casino)"));

    // Domain-shape rule beats the keyword rules
    let verdict = classifier.classify("https://slot999.example.com", "");
    assert_eq!(verdict.reason.as_deref(), Some("Gambling domain pattern"));

    // Adult keywords are checked before gambling keywords
    let verdict = classifier.classify("https://example.com", "nsfw casino");
    assert_eq!(verdict.reason.as_deref(), Some("Adult content (nsfw)"));
}

#[test]
fn test_is_pure_and_deterministic() {
    let classifier = HeuristicClassifier::default();

    let inputs = [
        ("http://example.com/slot88", ""),
        ("https://github.com/user/repo", "check this out"),
        ("https://lucky.casino", "promo"),
    ];

    for (url, message) in inputs {
        let first = classifier.classify(url, message);
        for _ in 0..3 {
            let again = classifier.classify(url, message);
            assert_eq!(first.safe, again.safe);
            assert_eq!(first.reason, again.reason);
            assert_eq!(first.source, again.source);
        }
    }
}

#[test]
fn test_whitelist_mode() {
    let mut lists = FilterLists::default();
    lists.whitelist_mode = true;
    let classifier = HeuristicClassifier::new(lists);

    assert!(classifier
        .classify("https://www.youtube.com/watch?v=abc", "")
        .safe);
    assert_eq!(
        classifier
            .classify("https://unknown-site.example", "")
            .reason
            .as_deref(),
        Some("Not in whitelist")
    );

    // A whitelisted domain mentioned in the message also passes the gate
    let verdict = classifier.classify("https://unknown-site.example", "mirror of github.com");
    assert_ne!(verdict.reason.as_deref(), Some("Not in whitelist"));
}

#[test]
fn test_custom_lists_replace_defaults() {
    let mut lists = FilterLists::default();
    lists.scam_keywords.push("rug-pull".to_string());
    let classifier = HeuristicClassifier::new(lists);

    let verdict = classifier.classify("https://example.com/rug-pull", "");
    assert_eq!(verdict.reason.as_deref(), Some("Scam (rug-pull)"));
}
