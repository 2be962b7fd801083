use hashbrown::{HashMap, HashSet};

use super::{Dfa, ERROR, Row};

/// Merge behaviorally equivalent states by Moore-style partition refinement
///
/// The initial partition separates the error state, the non-accepting states
/// and the accepting states of each match ID, so states bound to different
/// patterns are never merged.  Blocks are then split by the blocks of their
/// successors until nothing changes.  A DFA which is already minimal is
/// returned as-is and marked so that later calls are free.
#[must_use]
pub fn minimize(dfa: Dfa) -> Dfa {
    if dfa.minimal {
        return dfa;
    }

    let n = dfa.trans.len();
    let mut block: Vec<usize> = (0..n)
        .map(|s| {
            if s == ERROR {
                0
            } else {
                dfa.accepting[s].map_or(1, |id| id + 2)
            }
        })
        .collect();
    let mut count = block.iter().collect::<HashSet<_>>().len();

    for round in 0.. {
        let mut sigs = HashMap::<(usize, Vec<usize>), usize>::new();
        let next: Vec<usize> = (0..n)
            .map(|s| {
                let sig = (block[s], dfa.trans[s].iter().map(|&t| block[t]).collect());
                let fresh = sigs.len();
                *sigs.entry(sig).or_insert(fresh)
            })
            .collect();

        tracing::trace!(round, blocks = sigs.len(), "Refined DFA partition");

        block = next;
        if sigs.len() == count {
            break;
        }
        count = sigs.len();
    }

    if count == n {
        tracing::debug!(states = n, "DFA is already minimal");
        return Dfa {
            minimal: true,
            ..dfa
        };
    }

    // Blocks are numbered by their first member, so the error state keeps ID 0
    debug_assert_eq!(block[ERROR], ERROR);

    let mut trans: Vec<Row> = vec![[ERROR; 256]; count];
    let mut accepting = vec![None; count];
    let mut seen = vec![false; count];
    for s in 0..n {
        let b = block[s];
        if std::mem::replace(&mut seen[b], true) {
            continue;
        }

        for (to, &from) in trans[b].iter_mut().zip(&dfa.trans[s]) {
            *to = block[from];
        }
        accepting[b] = dfa.accepting[s];
    }

    tracing::debug!(before = n, after = count, "Minimized DFA");

    Dfa::new(block[dfa.start], trans, accepting, true)
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use crate::{
        dfa::{Dfa, ERROR},
        re::{self, Regex, parse},
    };

    fn compile(patterns: &[&str]) -> Dfa {
        Dfa::compile(
            Regex::alt_matches(
                patterns
                    .iter()
                    .map(|p| parse(p.as_bytes()).unwrap())
                    .collect::<Vec<_>>(),
            )
            .unwrap(),
        )
    }

    fn accepts(dfa: &Dfa, text: &[u8]) -> Option<usize> {
        let mut state = dfa.start();
        for &b in text {
            state = dfa.next(state, b);
        }
        dfa.accepting(state)
    }

    #[test]
    fn merges_equivalent_states() {
        let dfa = compile(&["ab|cb"]);
        let min = dfa.clone().minimize();

        assert!(min.is_minimal());
        assert!(!dfa.is_minimal());
        assert_eq!(dfa.state_count(), 5);
        assert_eq!(min.state_count(), 4);
        assert_eq!(accepts(&min, b"cb"), Some(0));
        assert_eq!(accepts(&min, b"ab"), Some(0));
        assert_eq!(accepts(&min, b"ac"), None);
    }

    #[test]
    fn already_minimal() {
        let dfa = compile(&["(a|b)*abb"]);
        let min = dfa.clone().minimize();

        assert!(min.is_minimal());
        assert_eq!(min.state_count(), dfa.state_count());
        assert_eq!(accepts(&min, b"babb"), Some(0));
        assert_eq!(accepts(&min, b"abab"), None);
    }

    #[test]
    fn keeps_match_ids_apart() {
        let dfa = compile(&["ab", "cb"]).minimize();

        assert_eq!(accepts(&dfa, b"ab"), Some(0));
        assert_eq!(accepts(&dfa, b"cb"), Some(1));
        assert_eq!(dfa.matches().len(), 2);
    }

    #[test]
    fn idempotent() {
        let min = compile(&["x(y|z)*", "q"]).minimize();
        let again = min.clone().minimize();

        assert_eq!(min, again);
        assert!(min.row(ERROR).iter().all(|&s| s == ERROR));
    }

    proptest! {
        #[test]
        fn preserves_language(
            pats in re::prop::patterns(1..=3, b'a'..=b'c'),
            inputs in prop::collection::vec(re::prop::input(b'a'..=b'c'), 1..8),
        ) {
            let dfa = Dfa::compile(Regex::alt_matches(pats).unwrap());
            let min = dfa.clone().minimize();

            prop_assert!(min.state_count() <= dfa.state_count());
            for input in inputs {
                for end in 0..=input.len() {
                    prop_assert_eq!(accepts(&min, &input[..end]), accepts(&dfa, &input[..end]));
                }
            }
        }
    }
}
