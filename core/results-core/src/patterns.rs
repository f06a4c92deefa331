//! Compiled regex patterns for user-agent parsing and archive file names.
//!
//! These patterns are compiled once on first use.

use once_cell::sync::Lazy;
use regex::Regex;

// ═══════════════════════════════════════════════════════════════════════════════
// Archive File Names
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-API bundle: two-letter browser abbreviation, one to three version digits.
pub static RE_ARCHIVE_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]{2}\d{1,3}\.json$").unwrap());

/// Per-token bundle copy written by the comparison renderer: `{token}-{abbrev}{version}.json`.
pub static RE_COMPARISON_COPY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+)-[A-Za-z]{2}\d+\.json$").unwrap());

// ═══════════════════════════════════════════════════════════════════════════════
// User-Agent Parsing Regexes
// ═══════════════════════════════════════════════════════════════════════════════

pub static RE_UA_EDGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:Edge|Edg|EdgA|EdgiOS)/(\d+)").unwrap());
pub static RE_UA_OPERA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:OPR|Opera)/(\d+)").unwrap());
pub static RE_UA_SAMSUNG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bSamsungBrowser/(\d+)").unwrap());
pub static RE_UA_FIREFOX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:Firefox|FxiOS)/(\d+)").unwrap());
pub static RE_UA_CHROMIUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bChromium/(\d+)").unwrap());
pub static RE_UA_CHROME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:Chrome|CriOS)/(\d+)").unwrap());
pub static RE_UA_SAFARI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bVersion/(\d+)[^ ]*(?: Mobile/\S+)? Safari/").unwrap());
pub static RE_UA_IE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:MSIE |Trident/.*\brv:)(\d+)").unwrap());
pub static RE_UA_WEBKIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bAppleWebKit/(\d+)").unwrap());
