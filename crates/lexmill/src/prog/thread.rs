//! Thread bookkeeping for simulating bytecode programs

use super::{Inst, Program};

/// An insertion-ordered set of program counters with constant-time
/// membership tests and clearing
#[derive(Debug, Clone)]
pub struct ThreadList {
    dense: Vec<usize>,
    sparse: Vec<usize>,
}

impl ThreadList {
    /// An empty list for a program of `size` instructions
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            dense: Vec::with_capacity(size),
            sparse: vec![0; size],
        }
    }

    #[must_use]
    pub fn contains(&self, pc: usize) -> bool {
        self.sparse
            .get(pc)
            .is_some_and(|&i| self.dense.get(i) == Some(&pc))
    }

    /// Add a program counter, returning false if it was already present
    pub fn insert(&mut self, pc: usize) -> bool {
        if self.contains(pc) {
            return false;
        }

        self.sparse[pc] = self.dense.len();
        self.dense.push(pc);
        true
    }

    #[inline]
    pub fn clear(&mut self) { self.dense.clear(); }

    #[must_use]
    #[inline]
    pub fn len(&self) -> usize { self.dense.len() }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool { self.dense.is_empty() }

    /// The `i`th program counter in insertion order
    #[must_use]
    #[inline]
    pub fn get(&self, i: usize) -> Option<usize> { self.dense.get(i).copied() }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ { self.dense.iter().copied() }
}

/// Worklist for following `JMP` and `SPLIT` edges without consuming input
#[derive(Debug, Default)]
pub struct Closure(Vec<usize>);

impl Closure {
    /// Add `pc` and everything reachable from it by epsilon edges to `list`
    ///
    /// Instructions already in `list` are not revisited, so cycles of empty
    /// loops terminate.  In a deterministic program `MATCH` is followed into
    /// the rest of its block.
    pub fn add(&mut self, prog: &Program, list: &mut ThreadList, pc: usize) {
        debug_assert!(self.0.is_empty());
        self.0.push(pc);

        while let Some(pc) = self.0.pop() {
            if !list.insert(pc) {
                continue;
            }

            match prog[pc] {
                Inst::Jmp(x) => self.0.push(x),
                Inst::Split(x, y) => self.0.extend([y, x]),
                Inst::Match(_) if prog.is_deterministic() => self.0.push(pc + 1),
                Inst::Char(..) | Inst::Match(_) | Inst::CharJmp(..) | Inst::Fail => (),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Closure, ThreadList};
    use crate::{prog::Program, re::parse};

    #[test]
    fn list_dedups_and_clears() {
        let mut list = ThreadList::new(8);

        assert!(list.insert(3));
        assert!(list.insert(0));
        assert!(!list.insert(3));
        assert_eq!(list.iter().collect::<Vec<_>>(), [3, 0]);
        assert!(!list.contains(7));

        list.clear();
        assert!(list.is_empty());
        assert!(!list.contains(3));
        assert!(list.insert(3));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn closure_follows_epsilon_edges() {
        // 0 SPLIT 1 3, 1 CHAR a, 2 JMP 0, 3 MATCH 0
        let prog = Program::compile(parse(b"a*").unwrap()).unwrap();
        let mut list = ThreadList::new(prog.len());
        Closure::default().add(&prog, &mut list, 0);

        assert_eq!(list.iter().collect::<Vec<_>>(), [0, 1, 3]);

        let mut list = ThreadList::new(prog.len());
        Closure::default().add(&prog, &mut list, 2);
        assert_eq!(list.iter().collect::<Vec<_>>(), [2, 0, 1, 3]);
    }

    #[test]
    fn closure_continues_past_dfa_match() {
        // 0 MATCH 0, 1 CHJMP a a, 2 JMP 0, 3 FAIL
        let prog = Program::compile(parse(b"a*").unwrap()).unwrap().to_dfa();
        let mut list = ThreadList::new(prog.len());
        Closure::default().add(&prog, &mut list, 0);

        assert_eq!(list.iter().collect::<Vec<_>>(), [0, 1]);
    }

    #[test]
    fn closure_survives_empty_loops() {
        let prog = Program::compile(parse(b"(a*)*b").unwrap()).unwrap();
        let mut list = ThreadList::new(prog.len());
        Closure::default().add(&prog, &mut list, 0);

        assert!(list.len() <= prog.len());
        assert!(list.iter().any(|pc| matches!(prog[pc], crate::prog::Inst::Char(b'b', b'b'))));
    }
}
