//! Browser identification from user-agent strings.
//!
//! Only the browser name and major version are needed: together they name a
//! session's bundle file (`CR120.json`, `FF115.json`, ...).

use regex::Regex;

use crate::patterns::{
    RE_UA_CHROME, RE_UA_CHROMIUM, RE_UA_EDGE, RE_UA_FIREFOX, RE_UA_IE, RE_UA_OPERA,
    RE_UA_SAFARI, RE_UA_SAMSUNG, RE_UA_WEBKIT,
};

pub const UNKNOWN_BROWSER: &str = "Unknown";
const UNKNOWN_VERSION: &str = "0";
const MAX_VERSION_DIGITS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Browser {
    pub name: String,
    pub version: String,
}

// Checked in order; Chromium-based browsers also advertise Chrome and Safari.
fn matchers() -> [(&'static str, &'static Regex); 9] {
    [
        ("Edge", &*RE_UA_EDGE),
        ("Opera", &*RE_UA_OPERA),
        ("Samsung Internet", &*RE_UA_SAMSUNG),
        ("Firefox", &*RE_UA_FIREFOX),
        ("Chromium", &*RE_UA_CHROMIUM),
        ("Chrome", &*RE_UA_CHROME),
        ("Safari", &*RE_UA_SAFARI),
        ("IE", &*RE_UA_IE),
        ("WebKit", &*RE_UA_WEBKIT),
    ]
}

/// Parses the browser name and major version.
///
/// Unrecognized agents yield `Unknown` with version `0`.
pub fn parse(user_agent: &str) -> Browser {
    for (name, pattern) in matchers() {
        if let Some(version) = pattern.captures(user_agent).and_then(|c| c.get(1)) {
            return Browser {
                name: name.to_string(),
                version: version.as_str().to_string(),
            };
        }
    }
    Browser {
        name: UNKNOWN_BROWSER.to_string(),
        version: UNKNOWN_VERSION.to_string(),
    }
}

/// Two-letter abbreviation used in bundle file names.
pub fn abbreviate_browser_name(name: &str) -> &'static str {
    match name {
        "Chrome" => "CR",
        "Chromium" => "CM",
        "Edge" => "ED",
        "Firefox" => "FF",
        "IE" => "IE",
        "Opera" => "OP",
        "Safari" => "SF",
        "Samsung Internet" => "SI",
        "WebKit" => "WK",
        _ => "UN",
    }
}

/// Bundle file name for a session's user agent: `{abbrev}{version}.json`.
///
/// The version keeps at most its first three digits so the name stays
/// loadable as an archive.
pub fn result_file_name(user_agent: &str) -> String {
    let browser = parse(user_agent);
    let digits: String = browser
        .version
        .chars()
        .filter(char::is_ascii_digit)
        .take(MAX_VERSION_DIGITS)
        .collect();
    let version = if digits.is_empty() {
        UNKNOWN_VERSION
    } else {
        digits.as_str()
    };
    format!("{}{}.json", abbreviate_browser_name(&browser.name), version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::RE_ARCHIVE_FILE;

    const CHROME: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.6099.109 Safari/537.36";
    const EDGE: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.2210.91";
    const FIREFOX: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:115.0) Gecko/20100101 Firefox/115.0";
    const SAFARI: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15";
    const TV: &str = "Mozilla/5.0 (Linux; Tizen 2.3) AppleWebKit/538.1 (KHTML, like Gecko) SmartTV";

    #[test]
    fn test_parse_common_browsers() {
        assert_eq!(parse(CHROME), Browser { name: "Chrome".into(), version: "120".into() });
        assert_eq!(parse(EDGE).name, "Edge");
        assert_eq!(parse(FIREFOX).version, "115");
        assert_eq!(parse(SAFARI), Browser { name: "Safari".into(), version: "17".into() });
        assert_eq!(parse(TV).name, "WebKit");
    }

    #[test]
    fn test_unknown_agent() {
        let browser = parse("curl/8.0");
        assert_eq!(browser.name, UNKNOWN_BROWSER);
        assert_eq!(result_file_name("curl/8.0"), "UN0.json");
    }

    #[test]
    fn test_file_names_match_archive_pattern() {
        for ua in [CHROME, EDGE, FIREFOX, SAFARI, TV] {
            let name = result_file_name(ua);
            assert!(RE_ARCHIVE_FILE.is_match(&name), "{} should match", name);
        }
        assert_eq!(result_file_name(CHROME), "CR120.json");
    }

    #[test]
    fn test_long_versions_are_clamped() {
        let ua = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/1024.0.0.0 Safari/537.36";
        assert_eq!(parse(ua).version, "1024");
        let name = result_file_name(ua);
        assert_eq!(name, "CR102.json");
        assert!(RE_ARCHIVE_FILE.is_match(&name));
    }
}
