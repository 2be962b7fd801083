use std::collections::VecDeque;

use indexmap::IndexSet;

use super::{
    Inst, Program,
    thread::{Closure, ThreadList},
};

/// The consuming and accepting instructions of an epsilon closure, sorted
type Kernel = Vec<usize>;

#[derive(Debug)]
struct State {
    accept: Option<usize>,
    /// Disjoint, ascending byte ranges and the state each leads to
    edges: Vec<(u8, u8, usize)>,
}

#[derive(Debug)]
struct DfaBuilder<'a> {
    prog: &'a Program,
    list: ThreadList,
    closure: Closure,
    kernels: IndexSet<Kernel>,
}

impl<'a> DfaBuilder<'a> {
    fn new(prog: &'a Program) -> Self {
        Self {
            prog,
            list: ThreadList::new(prog.len()),
            closure: Closure::default(),
            kernels: IndexSet::new(),
        }
    }

    fn solve_closure<I: IntoIterator<Item = usize>>(&mut self, pcs: I) -> Kernel {
        self.list.clear();
        for pc in pcs {
            self.closure.add(self.prog, &mut self.list, pc);
        }

        let mut kernel: Kernel = self
            .list
            .iter()
            .filter(|&pc| matches!(self.prog[pc], Inst::Char(..) | Inst::Match(_)))
            .collect();
        kernel.sort_unstable();
        kernel
    }

    fn intern(&mut self, kernel: Kernel, q: &mut VecDeque<usize>) -> usize {
        let (idx, new) = self.kernels.insert_full(kernel);
        if new {
            q.push_back(idx);
        }
        idx
    }

    fn build_state(&mut self, idx: usize, q: &mut VecDeque<usize>) -> State {
        let kernel = self.kernels[idx].clone();
        let mut accept = None::<usize>;
        let mut chars = vec![];
        for &pc in &kernel {
            match self.prog[pc] {
                Inst::Match(id) => accept = Some(accept.map_or(id, |a| a.min(id))),
                Inst::Char(lo, hi) => chars.push((pc, lo, hi)),
                _ => unreachable!(),
            }
        }

        // Cut the byte domain wherever some range starts or ends
        let mut bounds: Vec<usize> = chars
            .iter()
            .flat_map(|&(_, lo, hi)| [usize::from(lo), usize::from(hi) + 1])
            .collect();
        bounds.sort_unstable();
        bounds.dedup();

        let mut edges: Vec<(u8, u8, usize)> = vec![];
        for win in bounds.windows(2) {
            let (lo, hi) = (win[0], win[1] - 1);
            let movers: Vec<_> = chars
                .iter()
                .filter(|&&(_, l, h)| usize::from(l) <= lo && hi <= usize::from(h))
                .map(|&(pc, ..)| pc + 1)
                .collect();
            if movers.is_empty() {
                continue;
            }

            let kernel = self.solve_closure(movers);
            let target = self.intern(kernel, q);
            let lo = u8::try_from(lo).unwrap_or_else(|_| unreachable!());
            let hi = u8::try_from(hi).unwrap_or_else(|_| unreachable!());

            match edges.last_mut() {
                Some((_, prev_hi, prev)) if *prev == target && usize::from(*prev_hi) + 1 == usize::from(lo) => {
                    *prev_hi = hi;
                },
                _ => edges.push((lo, hi, target)),
            }
        }

        State { accept, edges }
    }

    fn build(mut self) -> Program {
        if self.prog.is_deterministic() {
            return self.prog.clone();
        }

        let mut q = VecDeque::new();
        let start = self.solve_closure([0]);
        self.intern(start, &mut q);

        let mut states = vec![];
        while let Some(idx) = q.pop_front() {
            debug_assert_eq!(idx, states.len());
            let state = self.build_state(idx, &mut q);
            tracing::trace!(state = idx, kernel = ?self.kernels[idx], edges = state.edges.len(), "Built program DFA state");
            states.push(state);
        }

        let mut offsets = Vec::with_capacity(states.len());
        let mut len = 0;
        for state in &states {
            offsets.push(len);
            len += usize::from(state.accept.is_some()) + 2 * state.edges.len() + 1;
        }

        let mut insts = Vec::with_capacity(len);
        for state in states {
            if let Some(id) = state.accept {
                insts.push(Inst::Match(id));
            }

            for (lo, hi, target) in state.edges {
                insts.push(Inst::CharJmp(lo, hi));
                insts.push(Inst::Jmp(offsets[target]));
            }

            insts.push(Inst::Fail);
        }

        tracing::debug!(
            states = offsets.len(),
            insts = insts.len(),
            "Converted NFA program to DFA program"
        );

        Program::new(insts)
    }
}

/// Subset construction from an NFA program to an equivalent deterministic
/// program
///
/// Each state becomes one block of instructions, and the start state's block
/// is placed first.  Deterministic programs are returned unchanged.
#[must_use]
pub fn to_dfa(prog: &Program) -> Program { DfaBuilder::new(prog).build() }
