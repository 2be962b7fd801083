use std::{fmt, ops::Deref};

use crate::range_set::RangeSet;

pub mod desugar;
pub mod follow;
pub mod syntax;

pub use desugar::desugar;
pub use follow::Labeled;
pub use syntax::{ParseError, Parser, parse};

/// The bytes of a [`Regex::Class`], never empty
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassSet(RangeSet);

impl ClassSet {
    #[must_use]
    pub fn new(set: RangeSet) -> Option<Self> { (!set.is_empty()).then_some(Self(set)) }

    #[must_use]
    #[inline]
    pub fn into_inner(self) -> RangeSet { self.0 }
}

impl Deref for ClassSet {
    type Target = RangeSet;

    #[inline]
    fn deref(&self) -> &RangeSet { &self.0 }
}

/// A regular expression over bytes
///
/// `Match` marks the root of one complete pattern, and `AltMatch` joins
/// several such patterns into a single lexer.  The left operand of an
/// `AltMatch` always receives the lower match ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Regex {
    Char(u8),
    /// An inclusive byte range with `lo <= hi`
    Range(u8, u8),
    /// A character class of two or more disjoint ranges, removed by
    /// [`desugar`]
    Class(ClassSet),
    Cat(Vec<Regex>),
    Alt(Box<Regex>, Box<Regex>),
    Star(Box<Regex>),
    Plus(Box<Regex>),
    Maybe(Box<Regex>),
    Match(Box<Regex>),
    AltMatch(Box<Regex>, Box<Regex>),
    /// End-of-sequence marker terminating a pattern
    Eos,
}

impl Regex {
    /// The `.` wildcard
    pub const ANY: Regex = Regex::Range(0, u8::MAX);

    #[must_use]
    pub fn range(lo: u8, hi: u8) -> Self {
        match lo.cmp(&hi) {
            std::cmp::Ordering::Less => Self::Range(lo, hi),
            std::cmp::Ordering::Equal => Self::Char(lo),
            std::cmp::Ordering::Greater => Self::Range(hi, lo),
        }
    }

    /// Build the smallest node matching exactly the bytes in `set`, or `None`
    /// if the set is empty
    #[must_use]
    pub fn class(set: RangeSet) -> Option<Self> {
        if set.is_empty() {
            None
        } else if let Some((lo, hi)) = set.single() {
            Some(Self::range(lo, hi))
        } else {
            Some(Self::Class(ClassSet(set)))
        }
    }

    /// Concatenation of literal bytes
    #[must_use]
    pub fn lit(bytes: &[u8]) -> Self {
        match bytes {
            [b] => Self::Char(*b),
            b => Self::Cat(b.iter().copied().map(Self::Char).collect()),
        }
    }

    #[must_use]
    #[inline]
    pub fn alt(a: Self, b: Self) -> Self { Self::Alt(a.into(), b.into()) }

    #[must_use]
    #[inline]
    pub fn alt_match(a: Self, b: Self) -> Self { Self::AltMatch(a.into(), b.into()) }

    #[must_use]
    #[inline]
    pub fn star(self) -> Self { Self::Star(self.into()) }

    #[must_use]
    #[inline]
    pub fn plus(self) -> Self { Self::Plus(self.into()) }

    #[must_use]
    #[inline]
    pub fn maybe(self) -> Self { Self::Maybe(self.into()) }

    /// Wrap a pattern body as a complete pattern terminated by [`Regex::Eos`]
    ///
    /// Complete patterns, such as the output of [`parse`], are returned as-is.
    #[must_use]
    pub fn pattern(self) -> Self {
        match self {
            Self::Match(_) => self,
            r => Self::Match(Self::Cat(vec![r, Self::Eos]).into()),
        }
    }

    /// Join complete patterns right-to-left into one `AltMatch` tree, so that
    /// the first pattern receives match ID 0
    pub fn alt_matches<I: IntoIterator<Item = Self>>(patterns: I) -> Option<Self>
    where I::IntoIter: DoubleEndedIterator {
        patterns
            .into_iter()
            .rev()
            .reduce(|rhs, lhs| Self::alt_match(lhs, rhs))
    }

    /// Whether this expression derives the empty string
    #[must_use]
    pub fn nullable(&self) -> bool {
        match self {
            Self::Char(_) | Self::Range(..) | Self::Class(_) => false,
            Self::Star(_) | Self::Maybe(_) | Self::Eos => true,
            Self::Plus(r) | Self::Match(r) => r.nullable(),
            Self::Cat(v) => v.iter().all(Self::nullable),
            Self::Alt(a, b) | Self::AltMatch(a, b) => a.nullable() || b.nullable(),
        }
    }
}

impl fmt::Display for Regex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, name: &str, items: &[&Regex]) -> fmt::Result {
            write!(f, "({name}")?;
            for item in items {
                write!(f, " {item}")?;
            }
            f.write_str(")")
        }

        match self {
            Self::Char(c) => write!(f, "(Char {})", c.escape_ascii()),
            Self::Range(lo, hi) => write!(f, "(Range {lo} {hi})"),
            Self::Class(set) => {
                f.write_str("(Class")?;
                for (lo, hi) in set.ranges() {
                    write!(f, " {lo}-{hi}")?;
                }
                f.write_str(")")
            },
            Self::Cat(v) => list(f, "Cat", &v.iter().collect::<Vec<_>>()),
            Self::Alt(a, b) => list(f, "Alt", &[&**a, &**b]),
            Self::Star(r) => list(f, "Star", &[&**r]),
            Self::Plus(r) => list(f, "Plus", &[&**r]),
            Self::Maybe(r) => list(f, "Maybe", &[&**r]),
            Self::Match(r) => list(f, "Match", &[&**r]),
            Self::AltMatch(a, b) => list(f, "AltMatch", &[&**a, &**b]),
            Self::Eos => f.write_str("(Eos)"),
        }
    }
}

#[cfg(any(test, feature = "proptest"))]
pub mod prop {
    use std::ops::RangeInclusive;

    use proptest::prelude::*;

    use super::Regex;

    /// Single-byte leaves over a small alphabet
    pub fn leaf(alphabet: RangeInclusive<u8>) -> impl Strategy<Value = Regex> {
        let (lo, hi) = alphabet.clone().into_inner();
        prop_oneof![
            3 => alphabet.clone().prop_map(Regex::Char),
            1 => (lo..=hi, lo..=hi).prop_map(|(a, b)| Regex::range(a, b)),
        ]
    }

    pub fn re(
        depth: u32,
        tree_size: u32,
        branch_size: u32,
        alphabet: RangeInclusive<u8>,
    ) -> impl Strategy<Value = Regex> {
        leaf(alphabet).prop_recursive(depth, tree_size, branch_size, move |s| {
            let size = 1..=(branch_size.try_into().unwrap());
            prop_oneof![
                prop::collection::vec(s.clone(), size).prop_map(Regex::Cat),
                (s.clone(), s.clone()).prop_map(|(a, b)| Regex::alt(a, b)),
                s.clone().prop_map(Regex::star),
                s.clone().prop_map(Regex::plus),
                s.prop_map(Regex::maybe),
            ]
        })
    }

    /// A list of complete patterns, each wrapped with [`Regex::pattern`]
    pub fn patterns(
        count: RangeInclusive<usize>,
        alphabet: RangeInclusive<u8>,
    ) -> impl Strategy<Value = Vec<Regex>> {
        prop::collection::vec(re(4, 16, 3, alphabet).prop_map(Regex::pattern), count)
    }

    /// Input text drawn from the pattern alphabet plus one byte outside it
    pub fn input(alphabet: RangeInclusive<u8>) -> impl Strategy<Value = Vec<u8>> {
        let (lo, hi) = alphabet.into_inner();
        prop::collection::vec(lo..=hi.saturating_add(1), 0..24)
    }
}
