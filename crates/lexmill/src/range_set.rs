//! Sorted, coalesced sets of inclusive byte ranges

use std::fmt;

/// A set of bytes stored as a sorted list of disjoint, non-adjacent inclusive
/// ranges
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct RangeSet(Vec<(u8, u8)>);

impl fmt::Debug for RangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0
            .iter()
            .fold(&mut f.debug_set(), |d, &(lo, hi)| {
                if lo == hi {
                    d.entry(&format_args!("{}", lo.escape_ascii()))
                } else {
                    d.entry(&format_args!("{}-{}", lo.escape_ascii(), hi.escape_ascii()))
                }
            })
            .finish()
    }
}

fn normalize(ranges: &mut Vec<(u8, u8)>) {
    for r in &mut *ranges {
        if r.1 < r.0 {
            *r = (r.1, r.0);
        }
    }

    ranges.sort_unstable();

    let mut out: Vec<(u8, u8)> = Vec::with_capacity(ranges.len());
    for &(lo, hi) in &*ranges {
        if let Some(last) = out.last_mut()
            && u16::from(last.1) + 1 >= u16::from(lo)
        {
            last.1 = last.1.max(hi);
        } else {
            out.push((lo, hi));
        }
    }

    *ranges = out;
}

impl RangeSet {
    pub const EMPTY: Self = Self(Vec::new());

    #[must_use]
    #[inline]
    pub fn full() -> Self { Self(vec![(0, u8::MAX)]) }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    #[must_use]
    #[inline]
    pub fn is_full(&self) -> bool { self.0 == [(0, u8::MAX)] }

    /// The number of disjoint ranges in this set
    #[must_use]
    #[inline]
    pub fn range_count(&self) -> usize { self.0.len() }

    /// Returns the only range of this set, if it has exactly one
    #[must_use]
    pub fn single(&self) -> Option<(u8, u8)> {
        match *self.0 {
            [r] => Some(r),
            _ => None,
        }
    }

    #[inline]
    pub fn ranges(&self) -> impl DoubleEndedIterator<Item = (u8, u8)> + '_ {
        self.0.iter().copied()
    }

    #[must_use]
    pub fn contains(&self, byte: u8) -> bool {
        self.0
            .binary_search_by(|&(lo, hi)| {
                if hi < byte {
                    std::cmp::Ordering::Less
                } else if lo > byte {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    /// Add an inclusive range, swapping the bounds if they are reversed
    pub fn insert(&mut self, lo: u8, hi: u8) {
        self.0.push((lo, hi));
        normalize(&mut self.0);
    }

    pub fn union(&mut self, other: &Self) {
        self.0.extend_from_slice(&other.0);
        normalize(&mut self.0);
    }

    #[must_use]
    #[inline]
    pub fn unioned(mut self, other: &Self) -> Self {
        self.union(other);
        self
    }

    /// Replace this set with its complement over `0..=255`
    pub fn invert(&mut self) {
        let mut out = Vec::with_capacity(self.0.len() + 1);
        let mut next = Some(0_u8);

        for &(lo, hi) in &self.0 {
            if let Some(n) = next
                && n < lo
            {
                out.push((n, lo - 1));
            }

            next = hi.checked_add(1);
        }

        if let Some(n) = next {
            out.push((n, u8::MAX));
        }

        self.0 = out;
    }

    #[must_use]
    #[inline]
    pub fn inverted(mut self) -> Self {
        self.invert();
        self
    }
}

impl Extend<(u8, u8)> for RangeSet {
    fn extend<I: IntoIterator<Item = (u8, u8)>>(&mut self, it: I) {
        self.0.extend(it);
        normalize(&mut self.0);
    }
}

impl FromIterator<(u8, u8)> for RangeSet {
    fn from_iter<I: IntoIterator<Item = (u8, u8)>>(it: I) -> Self {
        let mut ranges = it.into_iter().collect();
        normalize(&mut ranges);
        Self(ranges)
    }
}
