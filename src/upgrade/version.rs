//! Lenient version parsing and ordering for release tags.
//!
//! Release tags look like `v1.2.3`, `V1.2.3`, `1.2` or `1.2.3-rc.1`. Only the
//! numeric `major.minor.patch` triple takes part in ordering; pre-release and
//! build suffixes are ignored so that a tagged pre-release never triggers an
//! upgrade loop against the stable build of the same number.

use semver::Version;

/// Parses the numeric core of a version string.
///
/// A leading `v`/`V` and anything after the first `-` or `+` are dropped.
/// Missing or non-numeric minor and patch segments default to 0. Returns `None`
/// when the major segment does not start with a digit, which callers treat as
/// "not comparable".
///
/// # Examples
///
/// ```rust
/// use tnr_cli::upgrade::version::parse_version;
///
/// assert_eq!(parse_version("v1.2.3"), parse_version("1.2.3"));
/// assert_eq!(parse_version("V1.2.3-rc.1").unwrap().to_string(), "1.2.3");
/// assert_eq!(parse_version("2").unwrap().to_string(), "2.0.0");
/// assert!(parse_version("latest").is_none());
/// ```
pub fn parse_version(input: &str) -> Option<Version> {
    let trimmed = input.trim();
    let trimmed = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);
    let core = trimmed.split(['-', '+']).next().unwrap_or_default();

    let mut segments = core.split('.');
    let major = leading_number(segments.next()?)?;
    let minor = segments.next().and_then(leading_number).unwrap_or(0);
    let patch = segments.next().and_then(leading_number).unwrap_or(0);

    Some(Version::new(major, minor, patch))
}

/// Reports whether `current` is strictly older than `latest`.
///
/// Fails soft: if either side cannot be parsed the answer is `false`, so a
/// malformed tag never causes a spurious upgrade.
///
/// # Examples
///
/// ```rust
/// use tnr_cli::upgrade::version::is_outdated;
///
/// assert!(is_outdated("1.0.0", "v1.2.3"));
/// assert!(!is_outdated("v1.2.3", "1.2.3"));
/// assert!(!is_outdated("1.0.0", "garbage"));
/// ```
pub fn is_outdated(current: &str, latest: &str) -> bool {
    match (parse_version(current), parse_version(latest)) {
        (Some(current), Some(latest)) => current < latest,
        _ => false,
    }
}

fn leading_number(segment: &str) -> Option<u64> {
    let digits: String = segment.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}
