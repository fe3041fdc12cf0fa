//! Typed search terms

use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

use crate::error::IndexError;

/// How a search term matches an indexed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKind {
    /// Whole value only; never matches a superstring
    Exact,
    /// Values starting with the term
    Partial,
    /// Prefix match where exact hits rank first
    Scored,
}

/// A value paired with its match strategy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchExpression {
    pub value: String,
    pub kind: MatchKind,
}

impl SearchExpression {
    pub fn exact(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            kind: MatchKind::Exact,
        }
    }

    pub fn partial(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            kind: MatchKind::Partial,
        }
    }

    pub fn scored(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            kind: MatchKind::Scored,
        }
    }
}

/// Canned query shapes for free-text searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchType {
    Group,
    Artifact,
    Parent,
    Plugin,
    Archetype,
    Packaging,
    Sha1,
    ClassName,
}

impl SearchType {
    pub const ALL: [SearchType; 8] = [
        SearchType::Group,
        SearchType::Artifact,
        SearchType::Parent,
        SearchType::Plugin,
        SearchType::Archetype,
        SearchType::Packaging,
        SearchType::Sha1,
        SearchType::ClassName,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SearchType::Group => "group",
            SearchType::Artifact => "artifact",
            SearchType::Parent => "parent",
            SearchType::Plugin => "plugin",
            SearchType::Archetype => "archetype",
            SearchType::Packaging => "packaging",
            SearchType::Sha1 => "sha1",
            SearchType::ClassName => "classname",
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchType {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        SearchType::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| IndexError::Config(format!("unknown search type `{s}`")))
    }
}

/// Which secondary artifact kinds a search may return. Unset kinds are
/// excluded by classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ClassifierMask(u8);

impl ClassifierMask {
    pub const NONE: ClassifierMask = ClassifierMask(0);
    pub const JAVADOCS: ClassifierMask = ClassifierMask(0b001);
    pub const SOURCES: ClassifierMask = ClassifierMask(0b010);
    pub const TESTS: ClassifierMask = ClassifierMask(0b100);
    pub const ALL: ClassifierMask = ClassifierMask(0b111);

    pub fn contains(self, other: ClassifierMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// Classifiers to exclude from results.
    pub fn excluded_classifiers(self) -> Vec<&'static str> {
        [
            (ClassifierMask::JAVADOCS, "javadoc"),
            (ClassifierMask::SOURCES, "sources"),
            (ClassifierMask::TESTS, "tests"),
        ]
        .into_iter()
        .filter(|(kind, _)| !self.contains(*kind))
        .map(|(_, classifier)| classifier)
        .collect()
    }
}

impl BitOr for ClassifierMask {
    type Output = ClassifierMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        ClassifierMask(self.0 | rhs.0)
    }
}

impl FromStr for ClassifierMask {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .try_fold(ClassifierMask::NONE, |mask, part| {
                let kind = match part {
                    "javadoc" | "javadocs" => ClassifierMask::JAVADOCS,
                    "sources" => ClassifierMask::SOURCES,
                    "tests" => ClassifierMask::TESTS,
                    "all" => ClassifierMask::ALL,
                    other => return Err(IndexError::Config(format!("unknown artifact kind `{other}`"))),
                };
                Ok(mask | kind)
            })
    }
}
