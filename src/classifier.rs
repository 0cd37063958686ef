use crate::{Verdict, VerdictSource};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Spam shapes scored cumulatively against the combined url+message text.
/// Two or more matches reject the submission.
static SPAM_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // 4+ CAPS followed by digits (MANTAP77, GACOR88)
        Regex::new(r"\b[A-Z]{4,}\d{2,}").expect("caps spam pattern"),
        Regex::new(
            r"(?i)\b(gacor|zeus|slot|maxwin|casino|poker|judi|bonus|deposit|daftar|link)\s*\d{2,}",
        )
        .expect("term spam pattern"),
        Regex::new(
            r"(?i)(judi\s+online|link\s+alternatif|bonus\s+deposit|daftar\s+sekarang|terpercaya)",
        )
        .expect("phrase spam pattern"),
    ]
});

/// Gambling-brand-plus-digits domain shapes (slot88.com, gacor77.net).
static DOMAIN_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)slot\d{2,}\.").expect("slot domain pattern"),
        Regex::new(r"(?i)gacor\d{2,}\.").expect("gacor domain pattern"),
        Regex::new(r"(?i)maxwin\d{2,}\.").expect("maxwin domain pattern"),
        Regex::new(r"(?i)(judi|taruhan|togel)\d{2,}\.").expect("judi domain pattern"),
    ]
});

/// Keyword and pattern lists used by the classifier. These are tuned
/// configuration data, replaceable per deployment; the scoring mechanism
/// itself is fixed.
#[derive(Debug, Clone)]
pub struct FilterLists {
    /// When true, only submissions mentioning a whitelisted domain pass.
    pub whitelist_mode: bool,
    pub whitelist: Vec<String>,
    pub adult_keywords: Vec<String>,
    pub gambling_keywords: Vec<String>,
    pub scam_keywords: Vec<String>,
    pub gambling_tlds: Vec<String>,
    pub spam_score_threshold: usize,
}

impl Default for FilterLists {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();

        Self {
            whitelist_mode: false,
            whitelist: owned(&[
                "youtube.com",
                "youtu.be",
                "google.com",
                "drive.google.com",
                "github.com",
                "stackoverflow.com",
                "wikipedia.org",
                "medium.com",
                "dev.to",
                "reddit.com",
                "twitter.com",
                "linkedin.com",
                "facebook.com",
                "instagram.com",
            ]),
            adult_keywords: owned(&[
                "porn",
                "xxx",
                "sex",
                "adult",
                "nsfw",
                "hentai",
                "18+",
                "erotic",
                "nude",
                "pornhub",
                "xvideos",
                "xnxx",
                "redtube",
                "youporn",
                "tube8",
                "spankbang",
                "xhamster",
                "beeg",
                "txxx",
                "tnaflix",
                "jav",
                "javhd",
                "javmost",
                "javdoe",
                "dmm",
                "fc2",
                "chaturbate",
                "cam4",
                "stripchat",
                "bongacams",
                "myfreecams",
                "onlyfans",
                "fansly",
                "rule34",
                "e621",
                "gelbooru",
            ]),
            gambling_keywords: owned(&[
                "casino",
                "poker",
                "betting",
                "slot",
                "jackpot",
                "gamble",
                "lottery",
                "bingo",
                "roulette",
                "blackjack",
                "judi",
                "taruhan",
                "togel",
                "gacor",
                "maxwin",
                "jp",
                "slot88",
                "slotgacor",
                "pragmaticplay",
                "rtpslot",
                "rtp",
                "bocoran",
                "pola",
                "olympus",
                "gates",
                "zeus",
                "starlight",
                "bonanza",
                "aztec",
                "bet365",
                "1xbet",
                "betway",
                "unibet",
                "bwin",
                "888casino",
                "sbobet",
                "sbotop",
                "sbo",
                "maxbet",
                "ibcbet",
                "cmd368",
                "w88",
                "m88",
                "fun88",
                "12bet",
                "dafabet",
                "96ace",
                "jduol",
                "judol",
                "judikartu",
                "bandarceme",
                "pkv",
                "dominoqq",
                "bandarq",
                "pokerv",
                "aduq",
                "capsa",
                "ceme",
                "sakong",
                "stake",
                "roobet",
                "rollbit",
                "duelbits",
                "pragmatic",
                "pgsoft",
                "joker123",
                "habanero",
                "spadegaming",
                "pokerstars",
                "partypoker",
                "ggpoker",
                "888poker",
            ]),
            scam_keywords: owned(&[
                "get-rich",
                "make-money-fast",
                "free-money",
                "win-prize",
                "claim-reward",
                "phishing",
                "fake",
                "scam",
                "fraud",
                "ponzi",
            ]),
            gambling_tlds: owned(&[".bet", ".casino", ".poker", ".xxx", ".adult", ".sex"]),
            spam_score_threshold: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeywordCategory {
    Adult,
    Gambling,
    Scam,
}

impl KeywordCategory {
    fn label(self) -> &'static str {
        match self {
            KeywordCategory::Adult => "Adult content",
            KeywordCategory::Gambling => "Gambling",
            KeywordCategory::Scam => "Scam",
        }
    }
}

/// One typed predicate in the cascade. Rules are evaluated in a fixed
/// order, first match wins; the order is part of the observable contract,
/// both for reason-string stability and so cheap signals fire before
/// broader ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Whitelist,
    SpamScore,
    GamblingTld,
    DomainPattern,
    Keywords(KeywordCategory),
}

struct RuleInput<'a> {
    url: &'a str,
    combined: &'a str,
}

impl Rule {
    /// Returns the rejection reason when the rule fires.
    fn evaluate(self, lists: &FilterLists, input: &RuleInput<'_>) -> Option<String> {
        match self {
            Rule::Whitelist => {
                if !lists.whitelist_mode {
                    return None;
                }
                let whitelisted = lists
                    .whitelist
                    .iter()
                    .any(|domain| input.combined.contains(domain.as_str()));
                if whitelisted {
                    None
                } else {
                    Some("Not in whitelist".to_string())
                }
            }
            Rule::SpamScore => {
                let score: usize = SPAM_PATTERNS
                    .iter()
                    .map(|pattern| pattern.find_iter(input.combined).count())
                    .sum();
                if score >= lists.spam_score_threshold {
                    debug!(score, "Spam pattern threshold reached");
                    Some("Spam pattern detected".to_string())
                } else {
                    None
                }
            }
            Rule::GamblingTld => lists
                .gambling_tlds
                .iter()
                .find(|tld| input.url.contains(tld.as_str()))
                .map(|tld| format!("Gambling TLD ({tld})")),
            Rule::DomainPattern => {
                if DOMAIN_PATTERNS
                    .iter()
                    .any(|pattern| pattern.is_match(input.url))
                {
                    Some("Gambling domain pattern".to_string())
                } else {
                    None
                }
            }
            Rule::Keywords(category) => {
                let keywords = match category {
                    KeywordCategory::Adult => &lists.adult_keywords,
                    KeywordCategory::Gambling => &lists.gambling_keywords,
                    KeywordCategory::Scam => &lists.scam_keywords,
                };
                keywords
                    .iter()
                    .find(|keyword| input.combined.contains(keyword.as_str()))
                    .map(|keyword| format!("{} ({keyword})", category.label()))
            }
        }
    }
}

/// Synchronous, local, stateless scorer for submitted URLs. No network
/// access; always terminates in bounded time.
#[derive(Debug, Clone)]
pub struct HeuristicClassifier {
    lists: FilterLists,
    rules: Vec<Rule>,
}

impl Default for HeuristicClassifier {
    fn default() -> Self {
        Self::new(FilterLists::default())
    }
}

impl HeuristicClassifier {
    pub fn new(lists: FilterLists) -> Self {
        let rules = vec![
            Rule::Whitelist,
            Rule::SpamScore,
            Rule::GamblingTld,
            Rule::DomainPattern,
            Rule::Keywords(KeywordCategory::Adult),
            Rule::Keywords(KeywordCategory::Gambling),
            Rule::Keywords(KeywordCategory::Scam),
        ];
        Self { lists, rules }
    }

    pub fn classify(&self, url: &str, message: &str) -> Verdict {
        let url_lower = url.to_lowercase();
        let message_lower = message.to_lowercase();
        let combined = format!("{url_lower} {message_lower}");

        let input = RuleInput {
            url: &url_lower,
            combined: &combined,
        };

        for rule in &self.rules {
            if let Some(reason) = rule.evaluate(&self.lists, &input) {
                debug!(%url, %reason, "Submission rejected by heuristic rule");
                return Verdict::rejected(reason, VerdictSource::Heuristic);
            }
        }

        Verdict::accepted(VerdictSource::Heuristic)
    }
}
