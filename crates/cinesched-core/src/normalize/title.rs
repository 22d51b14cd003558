//! Film title cleanup.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::error::NormalizeError;
use crate::model::Format;

/// UK/US certificate codes seen in title boilerplate.
const CERTIFICATES: &str = r"U|PG|12A?|15|18|R18|TBC|PG-13|NC-17";

/// Format tags cinemas append to titles.
const FORMAT_TAGS: &str = r"IMAX(?:\s+3D)?|3D|2D|Dolby\s+Cinema|4DX|ScreenX";

/// `(12A) Title`, `[15] Title`, `PG - Title`, `12A: Title`.
#[allow(clippy::expect_used)]
static CERT_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^(?:[(\[](?:{CERTIFICATES})\*?[)\]]\s*(?:[-:|]\s*)?|(?:{CERTIFICATES})\s*[-:|]\s+)"
    ))
    .expect("failed to compile certificate prefix regex")
});

/// `Title (12A)`, `Title [15*]`.
#[allow(clippy::expect_used)]
static CERT_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\s*[(\[](?:{CERTIFICATES})\*?[)\]]$"))
        .expect("failed to compile certificate suffix regex")
});

/// `Title (IMAX)`, `Title [3D]`, `Title - Dolby Cinema`.
#[allow(clippy::expect_used)]
static FORMAT_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\s*(?:[(\[]\s*({FORMAT_TAGS})\s*[)\]]|\s-\s*({FORMAT_TAGS}))$"
    ))
    .expect("failed to compile format suffix regex")
});

/// Cleaned title plus a format recovered from a title tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct CleanTitle {
    /// Normalized title.
    pub title: String,
    /// Format stripped from the end of the title, if any.
    pub format_hint: Option<Format>,
}

/// Normalizes a scraped title.
///
/// Applies NFKC, maps typographic punctuation to ASCII, collapses
/// whitespace, strips certificate boilerplate and a trailing format tag.
/// Case is preserved.
pub(super) fn normalize_title(raw: &str) -> Result<CleanTitle, NormalizeError> {
    let folded: String = raw.nfkc().map(fold_punctuation).collect();
    let mut title = folded.split_whitespace().collect::<Vec<_>>().join(" ");

    title = CERT_PREFIX_RE.replace(&title, "").into_owned();

    let mut format_hint = None;
    // Tags stack in either order: "Dune (IMAX) (12A)" or "Dune (12A) (IMAX)".
    loop {
        let before = title.len();
        title = CERT_SUFFIX_RE.replace(&title, "").into_owned();
        if let Some(caps) = FORMAT_SUFFIX_RE.captures(&title) {
            let tag = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str());
            if format_hint.is_none() {
                format_hint = tag.map(Format::from_label);
            }
            title = FORMAT_SUFFIX_RE.replace(&title, "").into_owned();
        }
        if title.len() == before {
            break;
        }
    }

    let title = title
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | ':' | '|'))
        .to_owned();

    if !title.chars().any(char::is_alphanumeric) {
        return Err(NormalizeError::UnparsableTitle {
            raw: String::from(raw),
        });
    }

    Ok(CleanTitle { title, format_hint })
}

fn fold_punctuation(c: char) -> char {
    match c {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' | '`' => '\'',
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' => '"',
        '\u{2010}'..='\u{2015}' | '\u{2212}' => '-',
        c if c.is_control() => ' ',
        c => c,
    }
}
