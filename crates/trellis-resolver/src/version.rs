//! Maven-style version ordering, bracket ranges, and version selectors.
//!
//! Versions are split into segments on `.`, `-` and digit/letter
//! boundaries. Numeric segments compare as numbers; well-known qualifiers
//! are ordered `alpha < beta < milestone < rc < snapshot < release < sp`;
//! any other text sorts below a release and above nothing.

use std::cmp::Ordering;
use std::fmt;

/// A parsed version. Equality follows the ordering, so `1.0 == 1.0.0`.
#[derive(Debug, Clone)]
pub struct Version {
    original: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Number(u64),
    Qualifier(Qualifier),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Qualifier {
    Alpha,
    Beta,
    Milestone,
    Rc,
    Snapshot,
    Release,
    Sp,
}

impl Version {
    pub fn parse(version: &str) -> Self {
        let version = version.trim();
        Self {
            original: version.to_string(),
            segments: tokenize(version).into_iter().map(classify).collect(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }

    pub fn is_snapshot(&self) -> bool {
        self.segments
            .iter()
            .any(|s| *s == Segment::Qualifier(Qualifier::Snapshot))
    }
}

fn tokenize(version: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut prev_digit: Option<bool> = None;
    for (i, ch) in version.char_indices() {
        if ch == '.' || ch == '-' || ch == '_' {
            if start < i {
                tokens.push(&version[start..i]);
            }
            start = i + ch.len_utf8();
            prev_digit = None;
            continue;
        }
        let digit = ch.is_ascii_digit();
        if prev_digit.is_some_and(|p| p != digit) && start < i {
            tokens.push(&version[start..i]);
            start = i;
        }
        prev_digit = Some(digit);
    }
    if start < version.len() {
        tokens.push(&version[start..]);
    }
    tokens
}

fn classify(token: &str) -> Segment {
    if let Ok(n) = token.parse::<u64>() {
        return Segment::Number(n);
    }
    let qualifier = match token.to_ascii_lowercase().as_str() {
        "alpha" | "a" => Qualifier::Alpha,
        "beta" | "b" => Qualifier::Beta,
        "milestone" | "m" => Qualifier::Milestone,
        "rc" | "cr" => Qualifier::Rc,
        "snapshot" => Qualifier::Snapshot,
        "ga" | "final" | "release" => Qualifier::Release,
        "sp" => Qualifier::Sp,
        _ => return Segment::Text(token.to_ascii_lowercase()),
    };
    Segment::Qualifier(qualifier)
}

/// Rank of a segment against a missing one (`1.0` vs `1.0.x`).
fn against_padding(segment: &Segment) -> Ordering {
    match segment {
        Segment::Number(n) => n.cmp(&0),
        Segment::Qualifier(q) => q.cmp(&Qualifier::Release),
        Segment::Text(_) => Ordering::Less,
    }
}

fn compare(a: &Segment, b: &Segment) -> Ordering {
    match (a, b) {
        (Segment::Number(x), Segment::Number(y)) => x.cmp(y),
        (Segment::Qualifier(x), Segment::Qualifier(y)) => x.cmp(y),
        (Segment::Text(x), Segment::Text(y)) => x.cmp(y),
        (Segment::Number(_), _) => Ordering::Greater,
        (_, Segment::Number(_)) => Ordering::Less,
        (Segment::Qualifier(q), Segment::Text(_)) => release_side(*q),
        (Segment::Text(_), Segment::Qualifier(q)) => release_side(*q).reverse(),
    }
}

/// Known qualifiers from `release` up outrank free text; earlier ones do not.
fn release_side(q: Qualifier) -> Ordering {
    if q >= Qualifier::Release {
        Ordering::Greater
    } else {
        Ordering::Less
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        (0..len)
            .map(|i| match (self.segments.get(i), other.segments.get(i)) {
                (Some(a), Some(b)) => compare(a, b),
                (Some(a), None) => against_padding(a),
                (None, Some(b)) => against_padding(b).reverse(),
                (None, None) => Ordering::Equal,
            })
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

/// One end of a [`VersionRange`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    pub version: Version,
    pub inclusive: bool,
}

/// A bracket range: `[1.0,2.0)`, `[1.0,)`, `(,2.0]`, or `[1.5]` for exactly 1.5.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    pub lower: Option<Bound>,
    pub upper: Option<Bound>,
}

impl VersionRange {
    /// Parse a bracket range. Returns `None` for anything that is not a
    /// well-formed range, including bare versions.
    pub fn parse(spec: &str) -> Option<Self> {
        let s = spec.trim();
        let lower_inclusive = match s.chars().next()? {
            '[' => true,
            '(' => false,
            _ => return None,
        };
        let upper_inclusive = match s.chars().last()? {
            ']' => true,
            ')' => false,
            _ => return None,
        };
        if s.len() < 2 {
            return None;
        }
        let inner = &s[1..s.len() - 1];

        let bound = |text: &str, inclusive: bool| {
            let text = text.trim();
            (!text.is_empty()).then(|| Bound {
                version: Version::parse(text),
                inclusive,
            })
        };

        match inner.split_once(',') {
            Some((lo, hi)) if !hi.contains(',') => Some(Self {
                lower: bound(lo, lower_inclusive),
                upper: bound(hi, upper_inclusive),
            }),
            Some(_) => None,
            None => {
                if !(lower_inclusive && upper_inclusive) || inner.trim().is_empty() {
                    return None;
                }
                let exact = bound(inner, true);
                Some(Self {
                    lower: exact.clone(),
                    upper: exact,
                })
            }
        }
    }

    pub fn contains(&self, version: &Version) -> bool {
        let above = self.lower.as_ref().map_or(true, |b| match version.cmp(&b.version) {
            Ordering::Greater => true,
            Ordering::Equal => b.inclusive,
            Ordering::Less => false,
        });
        let below = self.upper.as_ref().map_or(true, |b| match version.cmp(&b.version) {
            Ordering::Less => true,
            Ordering::Equal => b.inclusive,
            Ordering::Greater => false,
        });
        above && below
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(lo), Some(hi)) = (&self.lower, &self.upper) {
            if lo.inclusive && hi.inclusive && lo.version == hi.version {
                return write!(f, "[{}]", lo.version);
            }
        }
        let (open, lo) = match &self.lower {
            Some(b) => (if b.inclusive { '[' } else { '(' }, b.version.to_string()),
            None => ('(', String::new()),
        };
        let (close, hi) = match &self.upper {
            Some(b) => (if b.inclusive { ']' } else { ')' }, b.version.to_string()),
            None => (')', String::new()),
        };
        write!(f, "{open}{lo},{hi}{close}")
    }
}

/// What a version string in a constraint selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
    /// A single version.
    Exact(Version),
    /// A bracket range.
    Range(VersionRange),
    /// `1.+`: any version starting with `1.`.
    Prefix(String),
    /// `+` or `latest.release`: any version.
    Latest,
}

impl VersionSpec {
    /// Parse a version selector. Malformed ranges yield `None`.
    pub fn parse(spec: &str) -> Option<Self> {
        let s = spec.trim();
        if s.is_empty() {
            return None;
        }
        if s == "+" || s.eq_ignore_ascii_case("latest.release") || s.eq_ignore_ascii_case("latest.integration") {
            return Some(VersionSpec::Latest);
        }
        if let Some(prefix) = s.strip_suffix('+') {
            return Some(VersionSpec::Prefix(prefix.to_string()));
        }
        if s.starts_with('[') || s.starts_with('(') {
            return VersionRange::parse(s).map(VersionSpec::Range);
        }
        Some(VersionSpec::Exact(Version::parse(s)))
    }

    /// Selectors other than a single version need the list of published
    /// versions.
    pub fn is_dynamic(&self) -> bool {
        !matches!(self, VersionSpec::Exact(_))
    }

    pub fn accepts(&self, version: &Version) -> bool {
        match self {
            VersionSpec::Exact(v) => v == version,
            VersionSpec::Range(r) => r.contains(version),
            VersionSpec::Prefix(p) => version.as_str().starts_with(p.as_str()),
            VersionSpec::Latest => true,
        }
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpec::Exact(v) => write!(f, "{v}"),
            VersionSpec::Range(r) => write!(f, "{r}"),
            VersionSpec::Prefix(p) => write!(f, "{p}+"),
            VersionSpec::Latest => f.write_str("+"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s)
    }

    #[test]
    fn numeric_segments_compare_as_numbers() {
        assert!(v("1.9") < v("1.10"));
        assert!(v("1.0.1") < v("1.1"));
        assert!(v("2") > v("1.99.99"));
    }

    #[test]
    fn qualifier_order() {
        let ordered = ["1.0-alpha", "1.0-beta", "1.0-milestone", "1.0-rc", "1.0-SNAPSHOT", "1.0", "1.0-sp"];
        for pair in ordered.windows(2) {
            assert!(v(pair[0]) < v(pair[1]), "{} < {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn digit_letter_boundaries_split() {
        assert_eq!(v("1.0alpha1"), v("1.0-alpha-1"));
        assert!(v("1.0-rc1") < v("1.0-rc2"));
    }

    #[test]
    fn trailing_zeros_and_release_qualifiers_are_equal() {
        assert_eq!(v("1.0"), v("1.0.0"));
        assert_eq!(v("1.0"), v("1.0.final"));
    }

    #[test]
    fn unknown_text_sorts_below_release() {
        assert!(v("31.0-jre") < v("31.0"));
        assert!(v("31.0-jre") < v("32.0-jre"));
        assert!(v("1.0-jre") > v("1.0-rc"));
    }

    #[test]
    fn range_bounds() {
        let r = VersionRange::parse("[1.0,2.0)").unwrap();
        assert!(r.contains(&v("1.0")));
        assert!(r.contains(&v("1.9.9")));
        assert!(!r.contains(&v("2.0")));
        assert!(!r.contains(&v("0.9")));

        let open = VersionRange::parse("(1.0,]").unwrap();
        assert!(!open.contains(&v("1.0")));
        assert!(open.contains(&v("99")));
    }

    #[test]
    fn exact_range() {
        let r = VersionRange::parse("[1.5]").unwrap();
        assert!(r.contains(&v("1.5.0")));
        assert!(!r.contains(&v("1.5.1")));
        assert_eq!(r.to_string(), "[1.5]");
    }

    #[test]
    fn malformed_ranges_are_rejected() {
        for bad in ["[", "[1.0", "1.0]", "(1.5)", "[1,2,3]", "[]"] {
            assert!(VersionRange::parse(bad).is_none(), "{bad}");
        }
    }

    #[test]
    fn range_display_round_trips() {
        for s in ["[1.0,2.0)", "(,2.0]", "[1.0,)"] {
            assert_eq!(VersionRange::parse(s).unwrap().to_string(), s);
        }
    }

    #[test]
    fn spec_kinds() {
        assert_eq!(VersionSpec::parse("1.2"), Some(VersionSpec::Exact(v("1.2"))));
        assert!(VersionSpec::parse("[1.0,2.0)").unwrap().is_dynamic());
        assert!(VersionSpec::parse("[1.0,2.0").is_none());

        let prefix = VersionSpec::parse("1.+").unwrap();
        assert!(prefix.accepts(&v("1.4")));
        assert!(!prefix.accepts(&v("10.0")));
        assert!(VersionSpec::parse("latest.release").unwrap().accepts(&v("0.1")));
    }
}
