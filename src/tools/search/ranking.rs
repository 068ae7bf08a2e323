//! Candidate filtering and ranking.
//!
//! A candidate is acceptable when it is an absolute http(s) URL whose host is
//! neither a search engine nor on [`DISALLOWED_DOMAINS`]. Acceptable
//! candidates are scored against the frame-friendly allowlist and the query;
//! unacceptable ones get [`REJECTED_SCORE`] so a single sort handles both.

use std::collections::HashSet;
use std::sync::OnceLock;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder};
use percent_encoding::percent_decode_str;

use crate::types::{Candidate, ScoredCandidate};

pub const REJECTED_SCORE: i32 = -10_000;
/// Anything above this is a usable result.
pub const ACCEPT_THRESHOLD: i32 = -1_000;

const FRAME_FRIENDLY_BONUS: i32 = 120;
const CHORD_KEYWORD_BONUS: i32 = 35;
const QUERY_TOKEN_BONUS: i32 = 4;

/// Hosts (and their subdomains) that are never a usable result.
pub const DISALLOWED_DOMAINS: &[&str] = &[
    // search engines and their asset hosts
    "google.com",
    "bing.com",
    "duckduckgo.com",
    "gstatic.com",
    "googleusercontent.com",
    "jina.ai",
    // video / social
    "youtube.com",
    "youtu.be",
    "facebook.com",
    "instagram.com",
    "tiktok.com",
    "twitter.com",
    "x.com",
    "pinterest.com",
    // refuse framing / link back into the player
    "spotify.com",
    "music.apple.com",
    "songsterr.com",
];

/// Search engine brands matched by label, so country TLDs (`google.co.il`) are caught too.
const SEARCH_ENGINE_LABELS: &[&str] = &["google", "bing", "duckduckgo"];

/// Chord and tab sites known to render fine inside an embedded frame.
pub const FRAME_FRIENDLY_HOSTS: &[&str] = &[
    "tab4u.com",
    "nagnu.co.il",
    "e-chords.com",
    "azchords.com",
    "chordu.com",
    "guitartabsexplorer.com",
    "cifraclub.com.br",
    "cifras.com.br",
    "acordes.lacuerda.net",
    "chordsworld.com",
    "guitaretab.com",
];

const CHORD_KEYWORDS: &[&str] = &["chord", "tab", "guitar", "ukulele", "cifra", "acord"];

static CHORD_MATCHER: OnceLock<AhoCorasick> = OnceLock::new();

fn chord_matcher() -> &'static AhoCorasick {
    CHORD_MATCHER.get_or_init(|| {
        AhoCorasickBuilder::new()
            .ascii_case_insensitive(true)
            .build(CHORD_KEYWORDS)
            .expect("valid chord keyword patterns")
    })
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn parse_http_host(url: &str) -> Option<(url::Url, String)> {
    let parsed = url::Url::parse(url.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let host = parsed.host_str()?.trim_end_matches('.').to_ascii_lowercase();
    if host.is_empty() {
        return None;
    }
    Some((parsed, host))
}

/// `true` when the host belongs to a web search engine.
pub fn is_search_engine_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    host.split('.')
        .any(|label| SEARCH_ENGINE_LABELS.contains(&label))
}

pub fn is_search_engine_url(url: &str) -> bool {
    parse_http_host(url).is_some_and(|(_, host)| is_search_engine_host(&host))
}

/// Decide whether a decoded URL may become a result.
pub fn is_acceptable(url: &str) -> bool {
    let Some((_, host)) = parse_http_host(url) else {
        return false;
    };
    if is_search_engine_host(&host) {
        return false;
    }
    !DISALLOWED_DOMAINS.iter().any(|d| host_matches(&host, d))
}

pub fn is_frame_friendly(url: &str) -> bool {
    parse_http_host(url)
        .is_some_and(|(_, host)| FRAME_FRIENDLY_HOSTS.iter().any(|d| host_matches(&host, d)))
}

/// Lower-cased alphanumeric tokens of at least three characters.
pub fn query_tokens(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 3)
        .map(|t| t.to_lowercase())
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Score a URL against the query tokens. Unacceptable URLs score [`REJECTED_SCORE`].
pub fn score(url: &str, query_tokens: &[String]) -> i32 {
    if !is_acceptable(url) {
        return REJECTED_SCORE;
    }
    let Some((parsed, host)) = parse_http_host(url) else {
        return REJECTED_SCORE;
    };

    let mut total = 0;
    if is_frame_friendly(url) {
        total += FRAME_FRIENDLY_BONUS;
    }

    let host_and_path = format!("{}{}", host, parsed.path());
    if chord_matcher().is_match(&host_and_path) {
        total += CHORD_KEYWORD_BONUS;
    }

    // Non-ASCII titles arrive percent-encoded; compare against the decoded form.
    let haystack = percent_decode_str(url).decode_utf8_lossy().to_lowercase();
    for token in query_tokens {
        if haystack.contains(token.as_str()) {
            total += QUERY_TOKEN_BONUS;
        }
    }
    total
}

/// Dedup key: the URL without fragment and without common tracking parameters.
pub fn normalize_url_key(url: &str) -> String {
    let trimmed = url.trim();
    let Ok(mut parsed) = url::Url::parse(trimmed) else {
        return trimmed.to_string();
    };

    parsed.set_fragment(None);

    if parsed.query().is_some() {
        let kept: Vec<(String, String)> = parsed
            .query_pairs()
            .filter(|(k, _)| {
                let k = k.to_ascii_lowercase();
                !(k.starts_with("utm_")
                    || matches!(k.as_str(), "gclid" | "fbclid" | "yclid" | "ref" | "ref_src"))
            })
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        parsed.set_query(None);
        if !kept.is_empty() {
            let mut qp = parsed.query_pairs_mut();
            for (k, v) in kept {
                qp.append_pair(&k, &v);
            }
        }
    }

    parsed.to_string()
}

/// Dedup, score and sort candidates: score descending, discovery order ascending.
pub fn rank(candidates: Vec<Candidate>, query_tokens: &[String]) -> Vec<ScoredCandidate> {
    let mut seen = HashSet::new();
    let mut out: Vec<ScoredCandidate> = candidates
        .into_iter()
        .filter(|c| seen.insert(normalize_url_key(&c.url)))
        .enumerate()
        .map(|(index, candidate)| ScoredCandidate {
            score: score(&candidate.url, query_tokens),
            candidate,
            index,
        })
        .collect();

    out.sort_by(|a, b| b.score.cmp(&a.score).then(a.index.cmp(&b.index)));
    out
}

/// The top entry of a [`rank`]ed list, if it is acceptable.
pub fn select_best(ranked: &[ScoredCandidate]) -> Option<&ScoredCandidate> {
    ranked.first().filter(|c| c.score > ACCEPT_THRESHOLD)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(q: &str) -> Vec<String> {
        query_tokens(q)
    }

    #[test]
    fn rejects_every_disallowed_domain() {
        for d in DISALLOWED_DOMAINS {
            assert!(!is_acceptable(&format!("https://{}/watch?v=1", d)), "{d}");
            assert!(!is_acceptable(&format!("https://www.{}/x", d)), "www.{d}");
        }
    }

    #[test]
    fn rejects_search_engine_country_domains() {
        assert!(!is_acceptable("https://www.google.co.il/search?q=x"));
        assert!(!is_acceptable("https://html.duckduckgo.com/html/"));
        assert!(is_search_engine_url("https://www.bing.com/ck/a?u=x"));
    }

    #[test]
    fn accepts_frame_friendly_host() {
        assert!(is_acceptable("https://www.tab4u.com/tabs/songs/1.html"));
        assert!(is_frame_friendly("https://www.tab4u.com/tabs/songs/1.html"));
    }

    #[test]
    fn rejects_non_http_and_garbage() {
        assert!(!is_acceptable("ftp://tab4u.com/x"));
        assert!(!is_acceptable("javascript:alert(1)"));
        assert!(!is_acceptable("/relative/path"));
        assert!(!is_acceptable(""));
    }

    #[test]
    fn suffix_match_respects_label_boundary() {
        // "notyoutube.com" is not youtube.com
        assert!(is_acceptable("https://notyoutube.com/chords"));
        assert!(!is_acceptable("https://m.youtube.com/watch"));
    }

    #[test]
    fn unacceptable_scores_rejected() {
        assert_eq!(score("https://youtube.com/watch?v=1", &tokens("adele hello")), REJECTED_SCORE);
    }

    #[test]
    fn bonuses_add_up() {
        let t = tokens("adele hello");
        assert_eq!(score("https://example.com/page", &t), 0);
        assert_eq!(score("https://example.com/chords/page", &t), 35);
        assert_eq!(score("https://example.com/adele-hello-chords", &t), 35 + 8);
        // allowlisted host also contains the "tab" keyword
        assert_eq!(score("https://www.tab4u.com/x", &t), 120 + 35);
    }

    #[test]
    fn score_monotone_in_matching_tokens() {
        let url = "https://example.com/adele/hello-chords";
        let without = score(url, &tokens("adele"));
        let with = score(url, &tokens("adele hello"));
        assert!(with >= without);
        // a token that doesn't match never lowers the score
        let extra = score(url, &tokens("adele hello zzzqqq"));
        assert_eq!(extra, with);
    }

    #[test]
    fn tokens_skip_short_words_and_dedupe() {
        assert_eq!(tokens("A-ha Take On Me on ME"), vec!["take".to_string()]);
        assert_eq!(tokens("Adele, Hello!"), vec!["adele".to_string(), "hello".to_string()]);
    }

    #[test]
    fn percent_encoded_tokens_match() {
        let t = tokens("עומר אדם");
        let url = "https://example.com/%D7%A2%D7%95%D7%9E%D7%A8";
        assert_eq!(score(url, &t), 4);
    }

    #[test]
    fn rank_dedups_by_fragment_and_keeps_discovery_order_on_ties() {
        let ranked = rank(
            vec![
                Candidate::new("https://a.example/song#top", "google", 0),
                Candidate::new("https://b.example/song", "google", 1),
                Candidate::new("https://a.example/song", "google", 2),
            ],
            &[],
        );
        let urls: Vec<_> = ranked.iter().map(|c| c.candidate.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.example/song#top", "https://b.example/song"]);
        assert_eq!(ranked[0].index, 0);
    }

    #[test]
    fn select_best_prefers_higher_score() {
        let ranked = rank(
            vec![
                Candidate::new("https://example.com/news", "bing", 0),
                Candidate::new("https://example.com/hello-chords", "bing", 1),
            ],
            &tokens("hello"),
        );
        let best = select_best(&ranked).unwrap();
        assert_eq!(best.candidate.url, "https://example.com/hello-chords");
    }

    #[test]
    fn select_best_none_when_all_rejected() {
        let ranked = rank(
            vec![
                Candidate::new("https://www.youtube.com/watch?v=1", "google", 0),
                Candidate::new("https://www.facebook.com/adele", "google", 1),
            ],
            &tokens("adele"),
        );
        assert!(select_best(&ranked).is_none());
        assert!(select_best(&[]).is_none());
    }

    #[test]
    fn normalize_strips_tracking_params() {
        assert_eq!(
            normalize_url_key("https://a.example/x?utm_source=g&id=3#frag"),
            "https://a.example/x?id=3"
        );
        assert_eq!(normalize_url_key("https://a.example/x?utm_source=g"), "https://a.example/x");
    }
}
