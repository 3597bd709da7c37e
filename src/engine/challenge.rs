// src/engine/challenge.rs
// =============================================================================
// Bot-challenge detection.
//
// CDNs and WAFs often answer automated traffic with an interstitial instead
// of the real page: Cloudflare's "Just a moment..." screen, a reCAPTCHA or
// hCaptcha widget, DataDome or PerimeterX blocks. Those pages frequently come
// back with 200, so the status code alone says nothing.
//
// Detection is a pure look at status, headers and body. It never retries and
// never changes the response; a hit is reported next to the HTTP status.
//
// Markers are specific on purpose: "cloudflare" alone appears on every site
// behind Cloudflare, and "captcha" alone matches ordinary login forms.
// =============================================================================

use reqwest::header::HeaderMap;
use std::fmt;

/// The parts of an HTTP response the detector needs
#[derive(Debug, Clone, Default)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub headers: HeaderMap,
    /// Bounded prefix of the decoded body
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeKind {
    Cloudflare,
    ReCaptcha,
    HCaptcha,
    DataDome,
    PerimeterX,
}

impl fmt::Display for ChallengeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChallengeKind::Cloudflare => "cloudflare",
            ChallengeKind::ReCaptcha => "recaptcha",
            ChallengeKind::HCaptcha => "hcaptcha",
            ChallengeKind::DataDome => "datadome",
            ChallengeKind::PerimeterX => "perimeterx",
        };
        f.write_str(name)
    }
}

const CLOUDFLARE_BODY: &[&str] = &[
    "/cdn-cgi/challenge-platform",
    "cf-chl-",
    "cf_chl_opt",
    "challenges.cloudflare.com",
    "<title>just a moment...</title>",
    "attention required! | cloudflare",
];
const RECAPTCHA_BODY: &[&str] = &["google.com/recaptcha", "class=\"g-recaptcha\"", "grecaptcha."];
const HCAPTCHA_BODY: &[&str] = &["hcaptcha.com/1/api.js", "class=\"h-captcha\"", "js.hcaptcha.com"];
const DATADOME_BODY: &[&str] = &["captcha-delivery.com", "geo.captcha-delivery"];
const PERIMETERX_BODY: &[&str] = &["px-captcha", "_pxcaptcha"];

fn header_is(headers: &HeaderMap, name: &str, expected: &str) -> bool {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case(expected))
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Identifies the challenge vendor, if the response is a challenge at all
pub fn classify(response: &ResponseSnapshot) -> Option<ChallengeKind> {
    let headers = &response.headers;

    // Cloudflare marks managed challenges explicitly
    if header_is(headers, "cf-mitigated", "challenge") {
        return Some(ChallengeKind::Cloudflare);
    }

    let body = response.body.to_ascii_lowercase();

    if contains_any(&body, CLOUDFLARE_BODY) {
        return Some(ChallengeKind::Cloudflare);
    }
    // Older interstitials: cloudflare server, 403/503 and the JS check page
    if header_is(headers, "server", "cloudflare")
        && matches!(response.status, 403 | 503)
        && body.contains("checking your browser")
    {
        return Some(ChallengeKind::Cloudflare);
    }
    if contains_any(&body, HCAPTCHA_BODY) {
        return Some(ChallengeKind::HCaptcha);
    }
    if contains_any(&body, RECAPTCHA_BODY) {
        return Some(ChallengeKind::ReCaptcha);
    }
    if (headers.contains_key("x-datadome") && response.status == 403)
        || contains_any(&body, DATADOME_BODY)
    {
        return Some(ChallengeKind::DataDome);
    }
    if contains_any(&body, PERIMETERX_BODY) {
        return Some(ChallengeKind::PerimeterX);
    }
    None
}

pub fn detect(response: &ResponseSnapshot) -> bool {
    classify(response).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn snapshot(status: u16, headers: &[(&'static str, &'static str)], body: &str) -> ResponseSnapshot {
        let mut map = HeaderMap::new();
        for (k, v) in headers {
            map.insert(*k, HeaderValue::from_static(*v));
        }
        ResponseSnapshot {
            status,
            headers: map,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_plain_page_is_not_a_challenge() {
        let response = snapshot(200, &[("server", "nginx")], "<html><title>Welcome</title></html>");
        assert!(!detect(&response));
    }

    #[test]
    fn test_site_behind_cloudflare_is_not_a_challenge() {
        let response = snapshot(
            200,
            &[("server", "cloudflare"), ("cf-ray", "8a1b2c3d4e5f-IAD")],
            "<html><title>Docs</title>powered by cloudflare</html>",
        );
        assert!(!detect(&response));
    }

    #[test]
    fn test_cloudflare_interstitial() {
        let response = snapshot(
            403,
            &[("server", "cloudflare")],
            "<!DOCTYPE html><html><head><title>Just a moment...</title></head>\
             <script src=\"/cdn-cgi/challenge-platform/h/g/orchestrate/chl_page/v1\"></script></html>",
        );
        assert_eq!(classify(&response), Some(ChallengeKind::Cloudflare));
    }

    #[test]
    fn test_cloudflare_mitigated_header() {
        let response = snapshot(200, &[("cf-mitigated", "challenge")], "");
        assert_eq!(classify(&response), Some(ChallengeKind::Cloudflare));
    }

    #[test]
    fn test_recaptcha_markup() {
        let response = snapshot(
            200,
            &[],
            "<script src=\"https://www.google.com/recaptcha/api.js\"></script><div class=\"g-recaptcha\"></div>",
        );
        assert_eq!(classify(&response), Some(ChallengeKind::ReCaptcha));
    }

    #[test]
    fn test_hcaptcha_markup() {
        let response = snapshot(200, &[], "<div class=\"h-captcha\" data-sitekey=\"x\"></div>");
        assert_eq!(classify(&response), Some(ChallengeKind::HCaptcha));
    }

    #[test]
    fn test_login_form_mentioning_captcha_is_not_flagged() {
        let response = snapshot(200, &[], "<label>Enter the captcha code from your email</label>");
        assert!(!detect(&response));
    }

    #[test]
    fn test_datadome_block() {
        let response = snapshot(403, &[("x-datadome", "protected")], "");
        assert_eq!(classify(&response), Some(ChallengeKind::DataDome));
    }
}
