//! Text normalization for labels, headers and folios
//!
//! Every comparison the mapper makes between spreadsheet text and a known
//! label goes through [`normalize`], so "Responsable de Ejecución:",
//! "RESPONSABLE_DE_EJECUCION" and "responsable de ejecucion" all compare equal.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Needles shorter than this only match whole tokens (see [`contains_term`]).
const SHORT_TERM_LEN: usize = 3;

static FOLIO_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(\d+)\s*-\s*(\d+)").ok());

static FOLIO_PREFIX: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:orden\s+de\s+trabajo|nro|numero|n[°º]|no|ot|n)(?:[\s:.°º#\-]+|$)").ok()
});

static FOLIO_JUNK: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9\-]+").ok());

/// Canonicalize arbitrary cell text into a comparable key.
///
/// Strips accents (NFKD + combining marks removed), lowercases, turns every
/// run of non-alphanumeric characters into a single space and trims.
/// Lowercasing comes after decomposition ("ℌ" → "H" → "h") and its output
/// is decomposed again ("İ" → "i̇" → "i").
/// Idempotent: `normalize(&normalize(s)) == normalize(s)`.
pub fn normalize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_space = false;

    let folded = s.nfkd().flat_map(char::to_lowercase).nfkd();
    for c in folded.filter(|c| !is_combining_mark(*c)) {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }

    out
}

/// Test whether normalized `haystack` contains normalized `needle`.
///
/// Needles of fewer than three characters ("n", "ot", "no") only match as
/// whole space-delimited tokens; longer needles match as plain substrings.
/// An empty needle never matches.
pub fn contains_term(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() || haystack.is_empty() {
        return false;
    }
    if needle.chars().count() < SHORT_TERM_LEN {
        return format!(" {} ", haystack).contains(&format!(" {} ", needle));
    }
    haystack.contains(needle)
}

/// Bidirectional containment used for fuzzy header and folio matching.
pub fn matches_either_way(a: &str, b: &str) -> bool {
    (!a.is_empty() && a == b) || contains_term(a, b) || contains_term(b, a)
}

/// Reduce raw folio text ("N°: 001 - 25", "OT 17") to a comparable key.
///
/// A `<digits>-<digits>` pattern wins outright ("001-25"). Otherwise a
/// leading label token ("N°", "Nº", "No", "OT", ...) is stripped and every
/// character outside `[A-Za-z0-9-]` collapses to a single space.
pub fn normalize_folio(s: &str) -> String {
    let s = s.trim();
    if s.is_empty() {
        return String::new();
    }

    if let Some(caps) = FOLIO_PATTERN.as_ref().and_then(|re| re.captures(s)) {
        return format!("{}-{}", &caps[1], &caps[2]);
    }

    let stripped = match FOLIO_PREFIX.as_ref() {
        Some(re) => re.replace(s, "").into_owned(),
        None => s.to_string(),
    };
    let cleaned = match FOLIO_JUNK.as_ref() {
        Some(re) => re.replace_all(&stripped, " ").into_owned(),
        None => stripped,
    };

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}
