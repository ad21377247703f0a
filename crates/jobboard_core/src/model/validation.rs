//! Field validation shared by all domain records.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("valid email regex")
});
static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("valid url regex"));
static MONTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-(0[1-9]|1[0-2])$").expect("valid month regex"));
static SLUG_SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug regex"));

pub const MAX_SHORT_TEXT: usize = 200;
pub const MAX_LONG_TEXT: usize = 20_000;

/// Reasons a record is rejected before it reaches SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required field is empty after trim.
    BlankField(&'static str),
    TooLong { field: &'static str, max: usize },
    InvalidEmail,
    InvalidUrl(&'static str),
    /// Calendar month is not `YYYY-MM`.
    InvalidMonth(&'static str),
    /// `end` sorts before `start`.
    InvertedRange {
        start: &'static str,
        end: &'static str,
    },
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
    },
    /// Well-formed value that this operation does not accept.
    Disallowed(&'static str),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "`{field}` must not be blank"),
            Self::TooLong { field, max } => {
                write!(f, "`{field}` must be at most {max} characters")
            }
            Self::InvalidEmail => write!(f, "email address is malformed"),
            Self::InvalidUrl(field) => write!(f, "`{field}` must be an http(s) url"),
            Self::InvalidMonth(field) => write!(f, "`{field}` must use YYYY-MM format"),
            Self::InvertedRange { start, end } => {
                write!(f, "`{end}` must not be earlier than `{start}`")
            }
            Self::OutOfRange { field, min, max } => {
                write!(f, "`{field}` must be between {min} and {max}")
            }
            Self::Disallowed(field) => write!(f, "`{field}` value is not allowed here"),
        }
    }
}

impl Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

/// Required text: non-blank and at most `max` characters.
pub fn require_text(field: &'static str, value: &str, max: usize) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::BlankField(field));
    }
    check_len(field, value, max)
}

/// Optional text: when present it must satisfy [`require_text`].
pub fn optional_text(field: &'static str, value: Option<&str>, max: usize) -> ValidationResult {
    match value {
        Some(value) => require_text(field, value, max),
        None => Ok(()),
    }
}

fn check_len(field: &'static str, value: &str, max: usize) -> ValidationResult {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(())
}

pub fn validate_email(email: &str) -> ValidationResult {
    if email.len() > 254 || !EMAIL_RE.is_match(email) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(())
}

pub fn validate_url(field: &'static str, url: &str) -> ValidationResult {
    if !URL_RE.is_match(url) {
        return Err(ValidationError::InvalidUrl(field));
    }
    check_len(field, url, 2048)
}

pub fn optional_url(field: &'static str, url: Option<&str>) -> ValidationResult {
    url.map_or(Ok(()), |url| validate_url(field, url))
}

pub fn validate_month(field: &'static str, month: &str) -> ValidationResult {
    if !MONTH_RE.is_match(month) {
        return Err(ValidationError::InvalidMonth(field));
    }
    Ok(())
}

/// Validates a `start..end` month pair where `end` is optional (ongoing).
pub fn validate_month_range(
    start_field: &'static str,
    start: &str,
    end_field: &'static str,
    end: Option<&str>,
) -> ValidationResult {
    validate_month(start_field, start)?;
    if let Some(end) = end {
        validate_month(end_field, end)?;
        // YYYY-MM sorts lexicographically in calendar order.
        if end < start {
            return Err(ValidationError::InvertedRange {
                start: start_field,
                end: end_field,
            });
        }
    }
    Ok(())
}

pub fn check_range(field: &'static str, value: i64, min: i64, max: i64) -> ValidationResult {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange { field, min, max });
    }
    Ok(())
}

/// Lowercases and trims an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Derives a url slug: lowercase ascii alphanumerics joined by `-`.
///
/// Returns `None` when nothing sluggable remains.
pub fn slugify(text: &str) -> Option<String> {
    let lowered = text.trim().to_lowercase();
    let slug = SLUG_SEPARATOR_RE.replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        None
    } else {
        Some(slug.chars().take(80).collect::<String>().trim_end_matches('-').to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation_accepts_common_shapes() {
        assert!(validate_email("jane.doe+jobs@example.co.uk").is_ok());
        assert_eq!(validate_email("jane@"), Err(ValidationError::InvalidEmail));
        assert_eq!(validate_email("no-at-sign"), Err(ValidationError::InvalidEmail));
    }

    #[test]
    fn month_range_rejects_inverted_and_malformed_values() {
        assert!(validate_month_range("start", "2020-01", "end", Some("2021-12")).is_ok());
        assert!(validate_month_range("start", "2020-01", "end", None).is_ok());
        assert_eq!(
            validate_month_range("start", "2022-05", "end", Some("2021-05")),
            Err(ValidationError::InvertedRange {
                start: "start",
                end: "end"
            })
        );
        assert_eq!(
            validate_month("start", "2022-13"),
            Err(ValidationError::InvalidMonth("start"))
        );
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("  Acme & Sons, Inc. ").as_deref(), Some("acme-sons-inc"));
        assert_eq!(slugify("Ünïcode Café").as_deref(), Some("n-code-caf"));
        assert_eq!(slugify("!!!"), None);
    }

    #[test]
    fn require_text_checks_blank_and_length() {
        assert_eq!(
            require_text("title", "   ", 10),
            Err(ValidationError::BlankField("title"))
        );
        assert_eq!(
            require_text("title", "abcdefghijk", 10),
            Err(ValidationError::TooLong {
                field: "title",
                max: 10
            })
        );
    }
}
