//! Canonical program names.
//!
//! Installers report display names such as `7-Zip 9.20 (x64 edition)` or
//! `Python 2.7.3`. The canonical name drops version numbers, edition and
//! architecture notes so the same program lines up across snapshots and
//! registry keys.

use regex::Regex;
use std::sync::OnceLock;

/// Logitech SetPoint registers itself under this display name.
const SETPOINT_ALIAS: (&str, &str) = ("eReg", "Logitech SetPoint");

fn parenthetical_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(.*\)").expect("parenthetical regex must compile"))
}

fn version_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[vV]ersion").expect("version word regex must compile"))
}

fn version_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[vV]\.").expect("version prefix regex must compile"))
}

fn name_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^(?:[^0-9]|7).+").expect("name token regex must compile"))
}

fn version_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9][0-9.]+").expect("version number regex must compile"))
}

fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:19|20)[0-9]{2}").expect("year regex must compile"))
}

fn trailing_version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9.]+$").expect("trailing version regex must compile"))
}

fn braced_guid_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\{[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}\}",
        )
        .expect("braced GUID regex must compile")
    })
}

fn packed_guid_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9A-Fa-f]{32}$").expect("packed GUID regex must compile"))
}

/// Underscores to spaces, then drop `(...)` and the word "version".
fn strip_decorations(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let without_parens = parenthetical_re().replace_all(&spaced, "");
    version_word_re().replace_all(&without_parens, "").into_owned()
}

/// Derive the canonical name for a raw display name.
///
/// Tokens that look like version numbers are dropped, while tokens starting
/// with a 19xx/20xx year contribute the year. If the surviving tokens no
/// longer appear verbatim in the input, the input is returned unchanged.
pub fn canonicalize(raw: &str) -> String {
    let name = if raw == SETPOINT_ALIAS.0 {
        SETPOINT_ALIAS.1
    } else {
        raw
    };

    let stripped = strip_decorations(name);
    let mut kept: Vec<&str> = Vec::new();
    for token in stripped.split_whitespace() {
        if name_token_re().is_match(token)
            && !version_number_re().is_match(token)
            && !token.eq_ignore_ascii_case("v.")
        {
            kept.push(token);
        }
        if let Some(year) = year_re().find(token) {
            kept.push(year.as_str());
        }
    }

    let joined = kept.join(" ");
    if !joined.is_empty() && name.contains(&joined) {
        joined
    } else {
        name.to_string()
    }
}

/// Pull a version number out of a display name, e.g. `2.7.3` from
/// `Python 2.7.3`. Years are never treated as versions.
///
/// The scan stops at the first token ending in digits or dots that is not a
/// year; if that run holds no digit (`Inc.`) the version is unknown.
pub fn version_from(name: &str) -> Option<String> {
    let stripped = strip_decorations(name);
    let stripped = version_prefix_re().replace_all(&stripped, "");

    let run = stripped.split_whitespace().find_map(|token| {
        trailing_version_re()
            .find(token)
            .map(|run| run.as_str())
            .filter(|run| !year_re().is_match(run))
    })?;

    run.bytes()
        .any(|b| b.is_ascii_digit())
        .then(|| run.to_string())
}

/// Normalized GUID for a GUID-shaped registry key name.
///
/// Accepts a braced `{8-4-4-4-12}` GUID anywhere in the key name, or a bare
/// 32-digit packed GUID as used under the installer product keys.
pub fn guid_from(registry_name: &str) -> Option<String> {
    if braced_guid_re().is_match(registry_name) || packed_guid_re().is_match(registry_name) {
        Some(
            registry_name
                .chars()
                .filter(|c| !matches!(c, '{' | '}' | '-'))
                .collect(),
        )
    } else {
        None
    }
}

/// Drop every non-ASCII character.
pub fn strip_non_ascii(value: &str) -> String {
    value.chars().filter(char::is_ascii).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setpoint_alias() {
        assert_eq!(canonicalize("eReg"), "Logitech SetPoint");
    }

    #[test]
    fn test_drops_versions_and_editions() {
        assert_eq!(canonicalize("7-Zip 9.20 (x64 edition)"), "7-Zip");
        assert_eq!(canonicalize("Mozilla Firefox 45.0.1 (x86 en-US)"), "Mozilla Firefox");
        assert_eq!(canonicalize("Python 2.7.3"), "Python");
        assert_eq!(canonicalize("Notepad++ v. 6.5"), "Notepad++");
        assert_eq!(canonicalize("VLC media player 2.0.5"), "VLC media player");
    }

    #[test]
    fn test_keeps_years() {
        assert_eq!(canonicalize("Microsoft Office 2010"), "Microsoft Office 2010");
        assert_eq!(canonicalize("Visual Studio 2008 Shell"), "Visual Studio 2008 Shell");
    }

    #[test]
    fn test_falls_back_to_input() {
        // "Adobe Reader" is not a substring of the underscored name
        assert_eq!(canonicalize("Adobe_Reader_X"), "Adobe_Reader_X");
        assert_eq!(canonicalize("1.0"), "1.0");
        assert_eq!(canonicalize("X"), "X");
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        let names = [
            "eReg",
            "7-Zip 9.20 (x64 edition)",
            "Microsoft Office 2010",
            "Java Version 8 Update 45",
            "Adobe_Reader_X",
            "Notepad++ v. 6.5",
            "Microsoft Visual C++ 2008 Redistributable - x86 9.0.30729",
            "",
        ];
        for name in names {
            let once = canonicalize(name);
            assert_eq!(canonicalize(&once), once, "not idempotent for {name:?}");
        }
    }

    #[test]
    fn test_version_from() {
        assert_eq!(version_from("Python 2.7.3").as_deref(), Some("2.7.3"));
        assert_eq!(version_from("WinRAR 5.01 (64-bit)").as_deref(), Some("5.01"));
        assert_eq!(version_from("Foo v.1.5").as_deref(), Some("1.5"));
        assert_eq!(version_from("Microsoft Office 2010"), None);
        assert_eq!(version_from("Foo Inc."), None);
        assert_eq!(version_from("Office 2010 14.0").as_deref(), Some("14.0"));
        // A dotted word ends the scan before the number after it
        assert_eq!(version_from("Foo Inc. 1.5"), None);
        assert_eq!(version_from("Skype"), None);
    }

    #[test]
    fn test_guid_from() {
        assert_eq!(
            guid_from("{90140000-0011-0000-0000-0000000FF1CE}").as_deref(),
            Some("901400000011000000000000000FF1CE")
        );
        assert_eq!(
            guid_from("00004109110000000000000000F01FEC").as_deref(),
            Some("00004109110000000000000000F01FEC")
        );
        assert_eq!(guid_from("Mozilla Firefox 45.0.1 (x86 en-US)"), None);
        assert_eq!(guid_from("not-a-guid"), None);
    }

    #[test]
    fn test_strip_non_ascii() {
        assert_eq!(strip_non_ascii("Café™ Suite"), "Caf Suite");
    }
}
