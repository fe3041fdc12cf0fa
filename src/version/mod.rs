//! Maven version ordering
//!
//! Versions are split into a tree of numeric, qualifier and sub-list items
//! on `.`, `-` and digit/letter transitions, then compared item by item.
//! Well-known qualifiers order as
//! `alpha < beta < milestone < rc = cr < snapshot < "" = ga = final = release < sp`,
//! and unknown qualifiers sort after `sp`, lexically among themselves.

use std::cmp::Ordering;
use std::fmt;

const QUALIFIERS: [&str; 7] = ["alpha", "beta", "milestone", "rc", "snapshot", "", "sp"];
const RELEASE_INDEX: &str = "5";

#[derive(Debug, Clone)]
enum Item {
    /// Digits with leading zeros stripped, compared by length then lexically.
    Int(String),
    Str(String),
    List(Vec<Item>),
}

impl Item {
    fn int(digits: &str) -> Self {
        let trimmed = digits.trim_start_matches('0');
        Item::Int(trimmed.to_string())
    }

    fn string(value: &str, followed_by_digit: bool) -> Self {
        let value = if followed_by_digit && value.len() == 1 {
            match value {
                "a" => "alpha",
                "b" => "beta",
                "m" => "milestone",
                other => other,
            }
        } else {
            value
        };
        let value = match value {
            "ga" | "final" | "release" => "",
            "cr" => "rc",
            other => other,
        };
        Item::Str(value.to_string())
    }

    fn parse(is_digit: bool, token: &str) -> Self {
        if is_digit {
            Item::int(token)
        } else {
            Item::string(token, false)
        }
    }

    fn is_null(&self) -> bool {
        match self {
            Item::Int(digits) => digits.is_empty(),
            Item::Str(value) => value.is_empty(),
            Item::List(items) => items.is_empty(),
        }
    }

    fn compare(&self, other: Option<&Item>) -> Ordering {
        match (self, other) {
            (Item::Int(digits), None) => {
                if digits.is_empty() {
                    Ordering::Equal
                } else {
                    Ordering::Greater
                }
            }
            (Item::Str(value), None) => comparable_qualifier(value).cmp(&RELEASE_INDEX.to_string()),
            (Item::List(items), None) => match items.first() {
                Some(first) => first.compare(None),
                None => Ordering::Equal,
            },

            (Item::Int(a), Some(Item::Int(b))) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Item::Int(_), Some(_)) => Ordering::Greater,

            (Item::Str(_), Some(Item::Int(_))) => Ordering::Less,
            (Item::Str(a), Some(Item::Str(b))) => comparable_qualifier(a).cmp(&comparable_qualifier(b)),
            (Item::Str(_), Some(Item::List(_))) => Ordering::Less,

            (Item::List(_), Some(Item::Int(_))) => Ordering::Less,
            (Item::List(_), Some(Item::Str(_))) => Ordering::Greater,
            (Item::List(left), Some(Item::List(right))) => compare_lists(left, right),
        }
    }
}

fn compare_lists(left: &[Item], right: &[Item]) -> Ordering {
    let len = left.len().max(right.len());
    for i in 0..len {
        let result = match (left.get(i), right.get(i)) {
            (Some(l), r) => l.compare(r),
            (None, Some(r)) => r.compare(None).reverse(),
            (None, None) => Ordering::Equal,
        };
        if result != Ordering::Equal {
            return result;
        }
    }
    Ordering::Equal
}

fn comparable_qualifier(value: &str) -> String {
    match QUALIFIERS.iter().position(|q| *q == value) {
        Some(index) => index.to_string(),
        None => format!("{}-{}", QUALIFIERS.len(), value),
    }
}

/// Drops null items from the tail, looking past non-null sub-lists:
/// `1.0-alpha` normalizes to the same tree as `1-alpha`.
fn normalize(items: &mut Vec<Item>) {
    let mut i = items.len();
    while i > 0 {
        i -= 1;
        if items[i].is_null() {
            items.remove(i);
        } else if !matches!(items[i], Item::List(_)) {
            break;
        }
    }
}

/// Builds the item tree. Each `-` or digit/letter transition opens a nested
/// list that continues to the end of the version string.
fn parse_items(version: &str) -> Vec<Item> {
    let lower = version.to_lowercase();

    let mut current: Vec<Item> = Vec::new();
    let mut parents: Vec<Vec<Item>> = Vec::new();
    let mut is_digit = false;
    let mut start = 0usize;

    for (i, c) in lower.char_indices() {
        if c == '.' || c == '-' {
            if i == start {
                current.push(Item::Int(String::new()));
            } else {
                current.push(Item::parse(is_digit, &lower[start..i]));
            }
            start = i + 1;
            if c == '-' {
                parents.push(std::mem::take(&mut current));
            }
        } else if c.is_ascii_digit() {
            if !is_digit && i > start {
                current.push(Item::string(&lower[start..i], true));
                start = i;
                parents.push(std::mem::take(&mut current));
            }
            is_digit = true;
        } else {
            if is_digit && i > start {
                current.push(Item::parse(true, &lower[start..i]));
                start = i;
                parents.push(std::mem::take(&mut current));
            }
            is_digit = false;
        }
    }

    if lower.len() > start {
        current.push(Item::parse(is_digit, &lower[start..]));
    }

    // Close nested lists innermost first, normalizing each on the way out.
    while let Some(mut parent) = parents.pop() {
        normalize(&mut current);
        parent.push(Item::List(current));
        current = parent;
    }
    normalize(&mut current);
    current
}

/// A version string with Maven comparison semantics.
#[derive(Debug, Clone)]
pub struct MavenVersion {
    raw: String,
    items: Vec<Item>,
}

impl MavenVersion {
    pub fn parse(version: &str) -> Self {
        Self {
            raw: version.to_string(),
            items: parse_items(version),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_snapshot(&self) -> bool {
        self.raw.ends_with("-SNAPSHOT") || self.raw.ends_with("-snapshot")
    }
}

impl fmt::Display for MavenVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for MavenVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MavenVersion {}

impl PartialOrd for MavenVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MavenVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_lists(&self.items, &other.items)
    }
}

/// Compare two version strings with Maven semantics.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    MavenVersion::parse(a).cmp(&MavenVersion::parse(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_order(lower: &str, higher: &str) {
        assert_eq!(
            compare_versions(lower, higher),
            Ordering::Less,
            "{lower} should sort before {higher}"
        );
        assert_eq!(compare_versions(higher, lower), Ordering::Greater);
    }

    #[test]
    fn test_numeric_not_lexical() {
        assert_order("1.9", "1.10");
        assert_order("1.0", "1.0.1");
        assert_order("2", "10");
    }

    #[test]
    fn test_trailing_zeros_are_equal() {
        assert_eq!(compare_versions("1", "1.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.0.0", "1"), Ordering::Equal);
        assert_eq!(compare_versions("1.0-ga", "1.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.0-final", "1.0.RELEASE"), Ordering::Equal);
    }

    #[test]
    fn test_qualifier_order() {
        assert_order("1.0-alpha-1", "1.0-beta-1");
        assert_order("1.0-beta-2", "1.0-milestone-1");
        assert_order("1.0-m1", "1.0-rc1");
        assert_order("1.0-rc1", "1.0-SNAPSHOT");
        assert_order("1.0-SNAPSHOT", "1.0");
        assert_order("1.0", "1.0-sp1");
        assert_order("1.0-sp1", "1.0-whatever");
        assert_eq!(compare_versions("1.0-cr1", "1.0-rc1"), Ordering::Equal);
    }

    #[test]
    fn test_snapshot_of_next_release_is_newer() {
        assert_order("1.0", "2.0-SNAPSHOT");
        assert_order("1.0.1-SNAPSHOT", "1.0.1");
        assert!(MavenVersion::parse("2.0-SNAPSHOT").is_snapshot());
    }

    #[test]
    fn test_sorting_descending() {
        let mut versions = vec!["1.0", "2.0-SNAPSHOT", "1.10", "1.2-beta", "1.2"];
        versions.sort_by(|a, b| compare_versions(b, a));
        assert_eq!(versions, vec!["2.0-SNAPSHOT", "1.10", "1.2", "1.2-beta", "1.0"]);
    }
}
