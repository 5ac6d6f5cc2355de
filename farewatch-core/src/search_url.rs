//! Canonicalization of the `tfs` search token carried by flight search URLs.
//!
//! The token is a base64 rendering of a binary search descriptor. Runs of `_`
//! in it are the filler the search page is picky about: it only behaves when
//! a run is 11 or 12 characters long.

use std::fmt;
use std::ops::Range;
use std::sync::OnceLock;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use regex::Regex;
use url::Url;

use crate::{CoreError, CoreResult};

pub const TOKEN_PARAM: &str = "tfs";
pub const FILLER: char = '_';

const SEARCH_HOST: &str = "www.google.com";
const SEARCH_PATH: &str = "/travel/flights";

/// URL-safe alphabet, no padding on encode, forgiving on decode
const TOKEN_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|[?&])tfs=([^&#]*)").expect("static token pattern"))
}

fn filler_run_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"_+").expect("static filler pattern"))
}

fn currency_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[?&]curr=").expect("static currency pattern"))
}

/// Byte range of the token value inside the URL
fn token_span(url: &str) -> Option<Range<usize>> {
    token_regex()
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.range())
}

fn splice(url: &str, span: Range<usize>, token: &str) -> String {
    let mut out = String::with_capacity(url.len() - span.len() + token.len());
    out.push_str(&url[..span.start]);
    out.push_str(token);
    out.push_str(&url[span.end..]);
    out
}

/// Check that the URL points at the flight search page and carries a token.
pub fn validate(raw: &str) -> CoreResult<Url> {
    let parsed = Url::parse(raw)
        .map_err(|e| CoreError::InvalidQueryFormat(format!("{}: {}", raw, e)))?;

    if parsed.host_str() != Some(SEARCH_HOST) {
        return Err(CoreError::InvalidQueryFormat(format!(
            "unexpected host {:?}",
            parsed.host_str()
        )));
    }
    if !parsed.path().contains(SEARCH_PATH) {
        return Err(CoreError::InvalidQueryFormat(format!(
            "unexpected path {}",
            parsed.path()
        )));
    }

    let has_token = parsed
        .query_pairs()
        .any(|(key, value)| key == TOKEN_PARAM && !value.is_empty());
    if !has_token {
        return Err(CoreError::InvalidQueryFormat(format!(
            "missing `{}` parameter",
            TOKEN_PARAM
        )));
    }

    Ok(parsed)
}

/// A search URL that passed [`validate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchUrl(String);

impl SearchUrl {
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let raw = raw.trim();
        validate(raw)?;
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn filler_count(&self) -> usize {
        filler_count(&self.0)
    }
}

impl fmt::Display for SearchUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rewrite every filler run in the token to exactly `filler_count` characters.
///
/// Only the token is touched; the rest of the URL is copied byte for byte.
/// URLs without a token come back unchanged.
pub fn normalize(url: &str, filler_count: usize) -> String {
    let Some(span) = token_span(url) else {
        return url.to_string();
    };

    let filler = FILLER.to_string().repeat(filler_count);
    let token = filler_run_regex().replace_all(&url[span.clone()], regex::NoExpand(&filler));
    splice(url, span, &token)
}

/// Length of the longest filler run in the token, 0 without a token.
pub fn filler_count(url: &str) -> usize {
    token_span(url)
        .and_then(|span| {
            filler_run_regex()
                .find_iter(&url[span])
                .map(|m| m.len())
                .max()
        })
        .unwrap_or(0)
}

fn decode_token(token: &str) -> Option<Vec<u8>> {
    let mut canonical: String = token
        .chars()
        .filter(|c| *c != '=')
        .map(|c| match c {
            '+' => '-',
            '/' => FILLER,
            other => other,
        })
        .collect();

    // A lone trailing sextet cannot carry a byte
    if canonical.len() % 4 == 1 {
        canonical.pop();
    }

    TOKEN_ENGINE.decode(canonical.as_bytes()).ok()
}

fn encode_token(bytes: &[u8]) -> String {
    TOKEN_ENGINE.encode(bytes)
}

/// Hyphens in the searched date are optional in the descriptor
fn date_pattern(date: &str) -> Option<regex::bytes::Regex> {
    let pattern = date
        .split('-')
        .filter(|part| !part.is_empty())
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("-?");

    if pattern.is_empty() {
        return None;
    }
    regex::bytes::Regex::new(&pattern).ok()
}

/// Replace the first occurrence of `old_date` inside the decoded token with
/// `new_date` and re-encode it.
///
/// Returns the URL unchanged when there is no token, it does not decode, or
/// the date is not found. Callers must read "unchanged" as "date not located".
pub fn substitute_date(url: &str, old_date: &str, new_date: &str) -> String {
    let Some(span) = token_span(url) else {
        return url.to_string();
    };
    let Some(mut descriptor) = decode_token(&url[span.clone()]) else {
        tracing::warn!("Search token is not decodable, leaving URL untouched");
        return url.to_string();
    };
    let Some(pattern) = date_pattern(old_date) else {
        return url.to_string();
    };

    let found = match pattern.find(&descriptor) {
        Some(m) => m.range(),
        None => return url.to_string(),
    };
    descriptor.splice(found, new_date.bytes());

    splice(url, span, &encode_token(&descriptor))
}

/// Pin the currency prices are quoted in, unless the URL already does.
pub fn ensure_currency(url: &str, currency: &str) -> String {
    if currency_regex().is_match(url) {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}curr={}", url, separator, currency)
}
