use std::fmt;

use crate::{re::Regex, scan::Engine};

pub mod builder;
pub mod minimize;
pub mod scanner;
pub mod stream;

pub use builder::build;
pub use minimize::minimize;
pub use scanner::DfaScanner;
pub use stream::StreamEngine;

/// The trap state every DFA reserves as state 0
pub const ERROR: usize = 0;

/// One row of a DFA transition table
pub type Row = [usize; 256];

/// A deterministic automaton over bytes with a dense transition table
///
/// State [`ERROR`] is always present, has an all-[`ERROR`] row and is never
/// accepting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dfa {
    start: usize,
    trans: Vec<Row>,
    accepting: Vec<Option<usize>>,
    matches: Vec<Vec<usize>>,
    minimal: bool,
}

impl Dfa {
    pub(crate) fn new(start: usize, trans: Vec<Row>, accepting: Vec<Option<usize>>, minimal: bool) -> Self {
        debug_assert_eq!(trans.len(), accepting.len());
        debug_assert!(trans[ERROR].iter().all(|&s| s == ERROR));
        debug_assert!(accepting[ERROR].is_none());

        let mut matches = vec![];
        for (state, id) in accepting.iter().enumerate() {
            if let &Some(id) = id {
                if matches.len() <= id {
                    matches.resize_with(id + 1, Vec::new);
                }
                matches[id].push(state);
            }
        }

        Self {
            start,
            trans,
            accepting,
            matches,
            minimal,
        }
    }

    /// Build an unminimized DFA from a pattern or set of patterns
    #[must_use]
    pub fn compile(re: Regex) -> Self { build(&crate::re::Labeled::new(re)) }

    #[must_use]
    #[inline]
    pub fn start(&self) -> usize { self.start }

    /// The number of states, including [`ERROR`]
    #[must_use]
    #[inline]
    pub fn state_count(&self) -> usize { self.trans.len() }

    #[must_use]
    #[inline]
    pub fn next(&self, state: usize, byte: u8) -> usize { self.trans[state][usize::from(byte)] }

    #[must_use]
    #[inline]
    pub fn row(&self, state: usize) -> &Row { &self.trans[state] }

    /// The match ID bound to a state, if it is accepting
    #[must_use]
    #[inline]
    pub fn accepting(&self, state: usize) -> Option<usize> { self.accepting[state] }

    /// All accepting states, grouped by match ID
    #[must_use]
    #[inline]
    pub fn matches(&self) -> &[Vec<usize>] { &self.matches }

    #[must_use]
    #[inline]
    pub fn is_minimal(&self) -> bool { self.minimal }

    /// Whether the start state accepts, i.e. some pattern matches the empty
    /// string
    #[must_use]
    #[inline]
    pub fn matches_empty(&self) -> bool { self.accepting(self.start).is_some() }

    #[must_use]
    #[inline]
    pub fn minimize(self) -> Self { minimize(self) }

    /// The outgoing edges of a state as maximal runs of bytes sharing a
    /// target, skipping edges into [`ERROR`]
    pub fn edges(&self, state: usize) -> impl Iterator<Item = (u8, u8, usize)> + '_ {
        let row = &self.trans[state];
        let mut byte = 0_usize;

        std::iter::from_fn(move || {
            while byte < row.len() {
                let lo = byte;
                let target = row[lo];
                while byte < row.len() && row[byte] == target {
                    byte += 1;
                }

                if target != ERROR {
                    let lo = u8::try_from(lo).unwrap_or_else(|_| unreachable!());
                    let hi = u8::try_from(byte - 1).unwrap_or_else(|_| unreachable!());
                    return Some((lo, hi, target));
                }
            }

            None
        })
    }

    /// Render the state graph for Graphviz
    #[must_use]
    #[inline]
    pub fn dot(&self) -> crate::dot::Graph<'static> { crate::dot::dfa(self) }

    /// Bind this DFA to an input for scanning
    #[must_use]
    #[inline]
    pub fn scanner<'a, 't>(&'a self, text: &'t [u8]) -> DfaScanner<'a, 't> {
        DfaScanner::new(self, text)
    }

    /// Find the longest match at the start of `text`, returning its match ID
    /// and length
    #[must_use]
    pub fn longest_prefix(&self, text: &[u8]) -> Option<(usize, usize)> {
        self.scanner(text).step(0)?.ok().map(|m| (m.id, m.bytes.len()))
    }
}

/// Formats an inclusive byte range as `'a'` or `'a'-'z'`
#[derive(Debug, Clone, Copy)]
pub(crate) struct Span(pub u8, pub u8);

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self(lo, hi) = *self;
        if lo == hi {
            write!(f, "'{}'", lo.escape_ascii())
        } else {
            write!(f, "'{}'-'{}'", lo.escape_ascii(), hi.escape_ascii())
        }
    }
}

impl fmt::Display for Dfa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "start: {}", self.start)?;

        writeln!(f, "accepting:")?;
        for (state, id) in self.accepting.iter().enumerate() {
            if let Some(id) = id {
                writeln!(f, "    {state} -> {id}")?;
            }
        }

        writeln!(f, "transitions:")?;
        for state in 1..self.trans.len() {
            write!(f, "    {state}:")?;
            for (i, (lo, hi, target)) in self.edges(state).enumerate() {
                f.write_str(if i == 0 { " " } else { ", " })?;
                write!(f, "{} -> {target}", Span(lo, hi))?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{Dfa, ERROR};
    use crate::re::parse;

    #[test]
    fn edges_group_runs() {
        let dfa = Dfa::compile(parse(b"[a-cx]y").unwrap());

        let edges: Vec<_> = dfa.edges(dfa.start()).collect();
        assert_eq!(edges.len(), 2);
        assert_eq!((edges[0].0, edges[0].1), (b'a', b'c'));
        assert_eq!((edges[1].0, edges[1].1), (b'x', b'x'));
        assert_ne!(edges[0].2, ERROR);
        assert_eq!(dfa.edges(ERROR).count(), 0);
    }

    #[test]
    fn display() {
        let dfa = Dfa::compile(parse(b"ab").unwrap());

        assert_eq!(
            dfa.to_string(),
            "start: 1\naccepting:\n    3 -> 0\ntransitions:\n    1: 'a' -> 2\n    2: 'b' -> 3\n    \
             3:\n"
        );
    }

    #[test]
    fn longest_prefix() {
        let dfa = Dfa::compile(parse(b"a+").unwrap()).minimize();

        assert_eq!(dfa.longest_prefix(b"aaab"), Some((0, 3)));
        assert_eq!(dfa.longest_prefix(b"baa"), None);
        assert!(!dfa.matches_empty());
        assert!(Dfa::compile(parse(b"a*").unwrap()).matches_empty());
    }
}
