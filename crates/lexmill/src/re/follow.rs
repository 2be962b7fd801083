//! Position labeling and the follow relation of the Berry-Sethi construction
//!
//! Every `Char`, `Range` and `Eos` leaf of a desugared expression is assigned
//! a position in left-to-right order.  The follow relation records which
//! positions may immediately succeed each other in a matched string, which is
//! all [`dfa::builder`](crate::dfa::builder) needs to build a DFA without an
//! NFA in between.

use std::{collections::BTreeSet, ops::Range};

use super::{Regex, desugar};

/// A set of positions
pub type PosSet = BTreeSet<usize>;

/// A node of a labeled expression, with its children stored separately
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    Char(u8),
    Range(u8, u8),
    Eos,
    Cat,
    Alt,
    Star,
    Plus,
    Maybe,
    Match,
    AltMatch,
}

/// The leaf occupying a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Leaf {
    Char(u8),
    Range(u8, u8),
    Eos,
}

impl Leaf {
    /// The inclusive byte span consumed by this leaf, or `None` for the
    /// end-of-sequence marker
    #[must_use]
    pub fn span(self) -> Option<(u8, u8)> {
        match self {
            Self::Char(c) => Some((c, c)),
            Self::Range(lo, hi) => Some((lo, hi)),
            Self::Eos => None,
        }
    }
}

/// An expression with numbered nodes and positions, plus the `nullable`,
/// `first` and `last` properties of every subtree
///
/// Nodes are numbered in postorder, so the root is always the last node and
/// every subtree occupies a contiguous run of node numbers and positions.
#[derive(Debug, Clone)]
pub struct Labeled {
    order: Vec<Node>,
    kids: Vec<Vec<usize>>,
    pos_spans: Vec<Range<usize>>,
    positions: Vec<usize>,
    leaves: Vec<Leaf>,
    eos_match: Vec<Option<usize>>,
    matches: Vec<usize>,
    nullable: Vec<bool>,
    first: Vec<PosSet>,
    last: Vec<PosSet>,
}

/// Make sure every pattern is wrapped in `Match` and ends with `Eos`
pub(crate) fn anchor(re: Regex) -> Regex {
    fn terminate(inner: Regex) -> Regex {
        match inner {
            Regex::Eos => Regex::Eos,
            Regex::Cat(v) if v.last() == Some(&Regex::Eos) => Regex::Cat(v),
            r => Regex::Cat(vec![r, Regex::Eos]),
        }
    }

    match re {
        Regex::AltMatch(a, b) => Regex::alt_match(anchor(*a), anchor(*b)),
        Regex::Match(r) => Regex::Match(terminate(*r).into()),
        r => Regex::Match(terminate(r).into()),
    }
}

impl Labeled {
    /// Label an expression, desugaring it and adding any missing `Match` or
    /// `Eos` nodes first
    #[must_use]
    pub fn new(re: Regex) -> Self {
        let mut me = Self {
            order: vec![],
            kids: vec![],
            pos_spans: vec![],
            positions: vec![],
            leaves: vec![],
            eos_match: vec![],
            matches: vec![],
            nullable: vec![],
            first: vec![],
            last: vec![],
        };

        let root = me.visit(anchor(desugar(re)), None);
        debug_assert_eq!(root + 1, me.order.len());
        debug_assert!(me.matches.iter().all(|&p| p < me.leaves.len()));

        me
    }

    fn leaf(&mut self, leaf: Leaf, owner: Option<usize>) -> (Node, Vec<usize>) {
        let pos = self.leaves.len();
        self.leaves.push(leaf);
        self.positions.push(self.order.len());
        self.eos_match.push(owner.filter(|_| leaf == Leaf::Eos));

        if leaf == Leaf::Eos
            && let Some(id) = owner
        {
            self.matches[id] = pos;
        }

        let node = match leaf {
            Leaf::Char(c) => Node::Char(c),
            Leaf::Range(lo, hi) => Node::Range(lo, hi),
            Leaf::Eos => Node::Eos,
        };

        (node, vec![])
    }

    fn visit(&mut self, re: Regex, owner: Option<usize>) -> usize {
        let pos_start = self.leaves.len();

        let (node, kids) = match re {
            Regex::Char(c) => self.leaf(Leaf::Char(c), owner),
            Regex::Range(lo, hi) => self.leaf(Leaf::Range(lo, hi), owner),
            Regex::Eos => self.leaf(Leaf::Eos, owner),
            Regex::Class(_) => unreachable!("Character classes must be desugared before labeling"),
            Regex::Cat(v) => (
                Node::Cat,
                v.into_iter().map(|r| self.visit(r, owner)).collect(),
            ),
            Regex::Alt(a, b) => (Node::Alt, vec![self.visit(*a, owner), self.visit(*b, owner)]),
            Regex::AltMatch(a, b) => (Node::AltMatch, vec![
                self.visit(*a, owner),
                self.visit(*b, owner),
            ]),
            Regex::Star(r) => (Node::Star, vec![self.visit(*r, owner)]),
            Regex::Plus(r) => (Node::Plus, vec![self.visit(*r, owner)]),
            Regex::Maybe(r) => (Node::Maybe, vec![self.visit(*r, owner)]),
            Regex::Match(r) => {
                let id = self.matches.len();
                self.matches.push(usize::MAX);
                (Node::Match, vec![self.visit(*r, Some(id))])
            },
        };

        let (nullable, first, last) = match node {
            Node::Char(_) | Node::Range(..) | Node::Eos => {
                let set = PosSet::from([pos_start]);
                (node == Node::Eos, set.clone(), set)
            },
            Node::Cat => {
                let mut first = PosSet::new();
                for &k in &kids {
                    first.extend(&self.first[k]);
                    if !self.nullable[k] {
                        break;
                    }
                }

                let mut last = PosSet::new();
                for &k in kids.iter().rev() {
                    last.extend(&self.last[k]);
                    if !self.nullable[k] {
                        break;
                    }
                }

                (kids.iter().all(|&k| self.nullable[k]), first, last)
            },
            Node::Alt | Node::AltMatch => (
                kids.iter().any(|&k| self.nullable[k]),
                kids.iter().flat_map(|&k| &self.first[k]).copied().collect(),
                kids.iter().flat_map(|&k| &self.last[k]).copied().collect(),
            ),
            Node::Star | Node::Maybe | Node::Plus | Node::Match => {
                let k = kids[0];
                (
                    matches!(node, Node::Star | Node::Maybe) || self.nullable[k],
                    self.first[k].clone(),
                    self.last[k].clone(),
                )
            },
        };

        let idx = self.order.len();
        self.order.push(node);
        self.kids.push(kids);
        self.pos_spans.push(pos_start..self.leaves.len());
        self.nullable.push(nullable);
        self.first.push(first);
        self.last.push(last);

        idx
    }

    /// The root node, always the last in postorder
    #[must_use]
    #[inline]
    pub fn root(&self) -> usize { self.order.len() - 1 }

    #[must_use]
    #[inline]
    pub fn node(&self, idx: usize) -> Node { self.order[idx] }

    #[must_use]
    #[inline]
    pub fn node_count(&self) -> usize { self.order.len() }

    #[must_use]
    #[inline]
    pub fn children(&self, idx: usize) -> &[usize] { &self.kids[idx] }

    #[must_use]
    #[inline]
    pub fn position_count(&self) -> usize { self.leaves.len() }

    /// The leaf at a position
    #[must_use]
    #[inline]
    pub fn leaf_at(&self, pos: usize) -> Leaf { self.leaves[pos] }

    /// The node number of a position
    #[must_use]
    #[inline]
    pub fn position_node(&self, pos: usize) -> usize { self.positions[pos] }

    /// The match ID terminated by a position, if it is an `Eos` leaf
    #[must_use]
    #[inline]
    pub fn match_id(&self, pos: usize) -> Option<usize> { self.eos_match[pos] }

    /// The terminal `Eos` position of each pattern, indexed by match ID
    #[must_use]
    #[inline]
    pub fn matches(&self) -> &[usize] { &self.matches }

    #[must_use]
    #[inline]
    pub fn nullable(&self, idx: usize) -> bool { self.nullable[idx] }

    #[must_use]
    #[inline]
    pub fn first(&self, idx: usize) -> &PosSet { &self.first[idx] }

    #[must_use]
    #[inline]
    pub fn last(&self, idx: usize) -> &PosSet { &self.last[idx] }

    /// `first` of the root node
    #[must_use]
    #[inline]
    pub fn start(&self) -> &PosSet { &self.first[self.root()] }

    /// Compute the follow set of every position
    #[must_use]
    pub fn follow(&self) -> Vec<PosSet> {
        let mut follow = vec![PosSet::new(); self.leaves.len()];

        for (idx, node) in self.order.iter().enumerate() {
            match node {
                Node::Cat => {
                    let kids = &self.kids[idx];
                    for (i, &a) in kids.iter().enumerate() {
                        for &b in &kids[i + 1..] {
                            for &p in &self.last[a] {
                                follow[p].extend(&self.first[b]);
                            }

                            if !self.nullable[b] {
                                break;
                            }
                        }
                    }
                },
                Node::Star | Node::Plus => {
                    for &p in &self.last[idx] {
                        follow[p].extend(&self.first[idx]);
                    }
                },
                _ => (),
            }
        }

        // Skipping an optional subtree must lead to wherever leaving it would
        for (idx, node) in self.order.iter().enumerate() {
            if *node != Node::Maybe {
                continue;
            }

            let inside = &self.pos_spans[idx];
            let exit: PosSet = self.last[idx]
                .iter()
                .flat_map(|&p| &follow[p])
                .copied()
                .filter(|q| !inside.contains(q))
                .collect();

            if exit.is_empty() {
                continue;
            }

            for (q, set) in follow.iter_mut().enumerate() {
                if !inside.contains(&q) && !set.is_disjoint(&self.first[idx]) {
                    set.extend(&exit);
                }
            }
        }

        follow
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::{Labeled, Leaf};
    use crate::re::{self, Regex, parse};

    fn label(s: &str) -> Labeled { Labeled::new(parse(s.as_bytes()).unwrap()) }

    fn assert_follow(s: &str, expected: &[&[usize]]) {
        let labeled = label(s);
        let follow = labeled.follow();

        assert_eq!(
            follow
                .iter()
                .map(|f| f.iter().copied().collect::<Vec<_>>())
                .collect::<Vec<_>>(),
            expected
                .iter()
                .map(|f| f.to_vec())
                .collect::<Vec<_>>(),
            "follow sets of {s:?}"
        );
        assert_eq!(labeled.leaf_at(follow.len() - 1), Leaf::Eos);
    }

    #[test]
    fn positions_in_order() {
        let labeled = label("(a|b)*xyz");

        assert_eq!(
            (0..labeled.position_count())
                .map(|p| labeled.leaf_at(p))
                .collect::<Vec<_>>(),
            [b'a', b'b', b'x', b'y', b'z']
                .into_iter()
                .map(Leaf::Char)
                .chain([Leaf::Eos])
                .collect::<Vec<_>>()
        );
        assert_eq!(labeled.matches(), [5]);
        assert_eq!(labeled.match_id(5), Some(0));
        assert_eq!(labeled.match_id(0), None);
    }

    #[test]
    fn first_last_nullable() {
        let labeled = label("a?*+");
        let root = labeled.root();

        assert!(labeled.nullable(root));
        assert_eq!(labeled.first(root).iter().copied().collect::<Vec<_>>(), [0, 1]);
        assert_eq!(labeled.last(root).iter().copied().collect::<Vec<_>>(), [0, 1]);

        let labeled = label("ab?c");
        let root = labeled.root();
        assert!(!labeled.nullable(root));
        assert_eq!(labeled.start().iter().copied().collect::<Vec<_>>(), [0]);
        assert_eq!(labeled.last(root).iter().copied().collect::<Vec<_>>(), [2, 3]);
    }

    #[test]
    fn follow_fixtures() {
        assert_follow("a*", &[&[0, 1], &[]]);
        assert_follow("(a|b)*xyz", &[&[0, 1, 2], &[0, 1, 2], &[3], &[4], &[5], &[]]);
        assert_follow("a*b", &[&[0, 1], &[2], &[]]);
        assert_follow("ab*c", &[&[1, 2], &[1, 2], &[3], &[]]);
        assert_follow("a+b", &[&[0, 1], &[2], &[]]);
        assert_follow("ab?c", &[&[1, 2], &[2], &[3], &[]]);
        assert_follow("(a+b)*(c|d)*", &[&[0, 1], &[0, 2, 3, 4], &[2, 3, 4], &[2, 3, 4], &[]]);
    }

    #[test]
    fn follow_nested_maybe() {
        assert_follow("ab?c?(d|e|f)?g?h", &[
            &[1, 2, 3, 4, 5, 6, 7],
            &[2, 3, 4, 5, 6, 7],
            &[3, 4, 5, 6, 7],
            &[6, 7],
            &[6, 7],
            &[6, 7],
            &[7],
            &[8],
            &[],
        ]);
        assert_follow("(ab?c?)*d", &[&[0, 1, 2, 3], &[0, 2, 3], &[0, 3], &[4], &[]]);
        assert_follow("a(b?c)?d", &[&[1, 2, 3], &[2], &[3], &[4], &[]]);
        assert_follow("a(bc?)?d", &[&[1, 3], &[2, 3], &[3], &[4], &[]]);
        assert_follow("q((bc?|x|y)?)*z", &[
            &[1, 3, 4, 5],
            &[1, 2, 3, 4, 5],
            &[1, 3, 4, 5],
            &[1, 3, 4, 5],
            &[1, 3, 4, 5],
            &[6],
            &[],
        ]);
        assert_follow("a(((bc?)?d?)?(ef?))?g", &[
            &[1, 3, 4, 6],
            &[2, 3, 4],
            &[3, 4],
            &[4],
            &[5, 6],
            &[6],
            &[7],
            &[],
        ]);
    }

    #[test]
    fn classes_are_desugared() {
        let labeled = label("[ac]x");

        assert_eq!(labeled.position_count(), 4);
        assert_eq!(labeled.leaf_at(0), Leaf::Char(b'a'));
        assert_eq!(labeled.leaf_at(1), Leaf::Char(b'c'));
        assert_follow("[ac]x", &[&[2], &[2], &[3], &[]]);
    }

    #[test]
    fn multiple_patterns() {
        let re = Regex::alt_matches([
            parse(b"ab").unwrap(),
            parse(b"a").unwrap(),
            Regex::lit(b"b"),
        ])
        .unwrap();
        let labeled = Labeled::new(re);

        assert_eq!(labeled.matches(), [2, 4, 6]);
        assert_eq!(labeled.start().iter().copied().collect::<Vec<_>>(), [0, 3, 5]);
        assert_eq!(labeled.match_id(4), Some(1));
        assert_eq!(labeled.match_id(6), Some(2));
    }

    proptest! {
        #[test]
        fn nullable_agrees(r in re::prop::re(6, 32, 4, b'a'..=b'c')) {
            let labeled = Labeled::new(r.clone());
            prop_assert_eq!(labeled.nullable(labeled.root()), r.nullable());
        }

        #[test]
        fn eos_follows_nothing(r in re::prop::re(6, 32, 4, b'a'..=b'c')) {
            let labeled = Labeled::new(r);
            let follow = labeled.follow();

            for &eos in labeled.matches() {
                prop_assert!(follow[eos].is_empty());
            }

            for (p, set) in follow.iter().enumerate() {
                if labeled.leaf_at(p) != Leaf::Eos {
                    prop_assert!(!set.is_empty());
                }
            }
        }
    }
}
