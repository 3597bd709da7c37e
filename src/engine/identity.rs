// src/engine/identity.rs
// =============================================================================
// Browser identities used for the HTTP stage.
//
// Each attempt draws one profile uniformly at random from a static table.
// A profile is a complete header set captured from a real browser, so a
// request never carries a Firefox User-Agent next to Chrome client hints.
//
// Bump PROFILE_TABLE_VERSION whenever the table is refreshed.
// =============================================================================

use rand::Rng;

pub const PROFILE_TABLE_VERSION: u32 = 1;

/// One real-browser header set
#[derive(Debug, PartialEq, Eq)]
pub struct BrowserProfile {
    /// Short label, e.g. "chrome-windows"
    pub name: &'static str,
    pub user_agent: &'static str,
    /// Every header except User-Agent, in the order the browser sends them
    pub headers: &'static [(&'static str, &'static str)],
}

const CHROME_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";
const FIREFOX_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const SAFARI_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

static PROFILES: [BrowserProfile; 7] = [
    BrowserProfile {
        name: "chrome-windows",
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        headers: &[
            ("sec-ch-ua", "\"Chromium\";v=\"124\", \"Google Chrome\";v=\"124\", \"Not-A.Brand\";v=\"99\""),
            ("sec-ch-ua-mobile", "?0"),
            ("sec-ch-ua-platform", "\"Windows\""),
            ("upgrade-insecure-requests", "1"),
            ("accept", CHROME_ACCEPT),
            ("sec-fetch-site", "none"),
            ("sec-fetch-mode", "navigate"),
            ("sec-fetch-user", "?1"),
            ("sec-fetch-dest", "document"),
            ("accept-language", "en-US,en;q=0.9"),
            ("dnt", "1"),
        ],
    },
    BrowserProfile {
        name: "chrome-macos",
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        headers: &[
            ("sec-ch-ua", "\"Chromium\";v=\"124\", \"Google Chrome\";v=\"124\", \"Not-A.Brand\";v=\"99\""),
            ("sec-ch-ua-mobile", "?0"),
            ("sec-ch-ua-platform", "\"macOS\""),
            ("upgrade-insecure-requests", "1"),
            ("accept", CHROME_ACCEPT),
            ("sec-fetch-site", "none"),
            ("sec-fetch-mode", "navigate"),
            ("sec-fetch-user", "?1"),
            ("sec-fetch-dest", "document"),
            ("accept-language", "en-US,en;q=0.9"),
            ("dnt", "1"),
        ],
    },
    BrowserProfile {
        name: "chrome-linux",
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        headers: &[
            ("sec-ch-ua", "\"Chromium\";v=\"124\", \"Google Chrome\";v=\"124\", \"Not-A.Brand\";v=\"99\""),
            ("sec-ch-ua-mobile", "?0"),
            ("sec-ch-ua-platform", "\"Linux\""),
            ("upgrade-insecure-requests", "1"),
            ("accept", CHROME_ACCEPT),
            ("sec-fetch-site", "none"),
            ("sec-fetch-mode", "navigate"),
            ("sec-fetch-user", "?1"),
            ("sec-fetch-dest", "document"),
            ("accept-language", "en-US,en;q=0.9"),
            ("dnt", "1"),
        ],
    },
    BrowserProfile {
        name: "firefox-linux",
        user_agent: "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
        headers: &[
            ("accept", FIREFOX_ACCEPT),
            ("accept-language", "en-US,en;q=0.5"),
            ("dnt", "1"),
            ("upgrade-insecure-requests", "1"),
            ("sec-fetch-dest", "document"),
            ("sec-fetch-mode", "navigate"),
            ("sec-fetch-site", "none"),
            ("sec-fetch-user", "?1"),
        ],
    },
    BrowserProfile {
        name: "safari-macos",
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
        headers: &[
            ("accept", SAFARI_ACCEPT),
            ("sec-fetch-site", "none"),
            ("sec-fetch-dest", "document"),
            ("accept-language", "en-US,en;q=0.9"),
            ("sec-fetch-mode", "navigate"),
            ("dnt", "1"),
        ],
    },
    BrowserProfile {
        name: "safari-ios",
        user_agent: "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1",
        headers: &[
            ("accept", SAFARI_ACCEPT),
            ("sec-fetch-site", "none"),
            ("sec-fetch-dest", "document"),
            ("accept-language", "en-US,en;q=0.9"),
            ("sec-fetch-mode", "navigate"),
            ("dnt", "1"),
        ],
    },
    BrowserProfile {
        name: "edge-windows",
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
        headers: &[
            ("sec-ch-ua", "\"Chromium\";v=\"124\", \"Microsoft Edge\";v=\"124\", \"Not-A.Brand\";v=\"99\""),
            ("sec-ch-ua-mobile", "?0"),
            ("sec-ch-ua-platform", "\"Windows\""),
            ("upgrade-insecure-requests", "1"),
            ("accept", CHROME_ACCEPT),
            ("sec-fetch-site", "none"),
            ("sec-fetch-mode", "navigate"),
            ("sec-fetch-user", "?1"),
            ("sec-fetch-dest", "document"),
            ("accept-language", "en-US,en;q=0.9"),
            ("dnt", "1"),
        ],
    },
];

/// Hands out a random browser profile per attempt
///
/// Stateless: there is no "current identity", every call is an independent
/// draw with replacement.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityRotator;

impl IdentityRotator {
    pub fn next(&self) -> &'static BrowserProfile {
        let i = rand::rng().random_range(0..PROFILES.len());
        &PROFILES[i]
    }

    pub fn profiles(&self) -> &'static [BrowserProfile] {
        &PROFILES
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_pool_covers_required_browsers() {
        let names: HashSet<_> = IdentityRotator.profiles().iter().map(|p| p.name).collect();
        for required in [
            "chrome-windows",
            "chrome-macos",
            "chrome-linux",
            "firefox-linux",
            "safari-macos",
            "safari-ios",
            "edge-windows",
        ] {
            assert!(names.contains(required), "missing {}", required);
        }
    }

    #[test]
    fn test_every_profile_has_core_headers() {
        for profile in IdentityRotator.profiles() {
            let keys: HashSet<_> = profile.headers.iter().map(|(k, _)| *k).collect();
            for key in ["accept", "accept-language", "dnt", "sec-fetch-mode", "sec-fetch-dest"] {
                assert!(keys.contains(key), "{} lacks {}", profile.name, key);
            }
            assert!(!keys.contains("user-agent"), "{} duplicates user-agent", profile.name);
        }
    }

    #[test]
    fn test_client_hints_only_on_chromium() {
        for profile in IdentityRotator.profiles() {
            let has_hints = profile.headers.iter().any(|(k, _)| k.starts_with("sec-ch-ua"));
            let chromium = profile.user_agent.contains("Chrome/");
            assert_eq!(has_hints, chromium, "{}", profile.name);
        }
    }

    #[test]
    fn test_next_draws_from_pool() {
        let rotator = IdentityRotator;
        let mut seen = HashSet::new();
        for _ in 0..500 {
            let profile = rotator.next();
            assert!(rotator.profiles().contains(profile));
            seen.insert(profile.name);
        }
        // 500 uniform draws over 7 profiles miss one with negligible probability
        assert_eq!(seen.len(), PROFILES.len());
    }
}
