use hashbrown::HashMap;
use indexmap::IndexSet;

use super::{Dfa, ERROR, Row};
use crate::re::{Labeled, follow::PosSet};

/// Subset construction directly over the follow relation of a labeled
/// expression
///
/// Each DFA state is a set of positions.  A state's successor under a byte is
/// the union of the follow sets of every position in it whose leaf accepts
/// that byte.  A state containing an `Eos` position accepts, and when several
/// patterns end in the same state the lowest match ID wins.
#[must_use]
pub fn build(labeled: &Labeled) -> Dfa {
    let follow = labeled.follow();

    let mut states = IndexSet::<PosSet>::new();
    let mut rows: Vec<Row> = vec![[ERROR; 256]];
    let mut accepting = vec![None];
    let mut stack = vec![];

    let (start, _) = states.insert_full(labeled.start().clone());
    stack.push(start);

    while let Some(idx) = stack.pop() {
        let set = &states[idx];

        let mut movers: Vec<Vec<usize>> = vec![vec![]; 256];
        let mut accept = None::<usize>;
        for &pos in set {
            if let Some((lo, hi)) = labeled.leaf_at(pos).span() {
                for byte in lo..=hi {
                    movers[usize::from(byte)].push(pos);
                }
            } else if let Some(id) = labeled.match_id(pos) {
                accept = Some(accept.map_or(id, |a| a.min(id)));
            }
        }

        tracing::trace!(state = idx + 1, positions = ?set, accept, "Building DFA state");

        let mut row = [ERROR; 256];
        let mut succ_cache = HashMap::<&[usize], usize>::new();
        for (byte, movers) in movers.iter().enumerate() {
            if movers.is_empty() {
                continue;
            }

            if let Some(&succ) = succ_cache.get(movers.as_slice()) {
                row[byte] = succ;
                continue;
            }

            let next: PosSet = movers.iter().flat_map(|&p| &follow[p]).copied().collect();
            if next.is_empty() {
                continue;
            }

            let (next, new) = states.insert_full(next);
            if new {
                stack.push(next);
            }

            row[byte] = next + 1;
            succ_cache.insert(movers.as_slice(), next + 1);
        }

        let id = idx + 1;
        if rows.len() <= id {
            rows.resize(id + 1, [ERROR; 256]);
            accepting.resize(id + 1, None);
        }
        rows[id] = row;
        accepting[id] = accept;
    }

    rows.resize(states.len() + 1, [ERROR; 256]);
    accepting.resize(states.len() + 1, None);

    tracing::debug!(states = states.len(), "Built DFA from follow sets");

    Dfa::new(start + 1, rows, accepting, false)
}
