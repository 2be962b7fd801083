use super::{Inst, Program};
use crate::re::{Regex, desugar, follow::anchor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GeneratorError {
    #[error("Generated program has {0} unconnected instruction(s)")]
    Unconnected(usize),
}

/// A jump operand waiting for its target
#[derive(Debug, Clone, Copy)]
enum Hole {
    /// The first operand of the `SPLIT` or `JMP` at this offset
    Out1(usize),
    /// The second operand of the `SPLIT` at this offset
    Out2(usize),
}

#[derive(Debug, Default)]
struct Generator {
    insts: Vec<Inst>,
    next_id: usize,
}

impl Generator {
    #[inline]
    fn here(&self) -> usize { self.insts.len() }

    #[inline]
    fn emit(&mut self, inst: Inst) -> usize {
        let pc = self.insts.len();
        self.insts.push(inst);
        pc
    }

    /// Point every hole at `target`
    fn fill(&mut self, holes: Vec<Hole>, target: usize) {
        for hole in holes {
            match (hole, &mut self.insts[hole.pc()]) {
                (Hole::Out1(_), Inst::Split(x, _) | Inst::Jmp(x)) | (Hole::Out2(_), Inst::Split(_, x)) => {
                    *x = target;
                },
                (h, i) => unreachable!("{h:?} does not refer to a jump operand of {i:?}"),
            }
        }
    }

    /// Emit code for one node, returning the operands that must point to
    /// whatever comes after it
    ///
    /// Code for a node also falls through to the next instruction unless it
    /// ends in `MATCH`.
    fn node(&mut self, re: &Regex) -> Vec<Hole> {
        match re {
            &Regex::Char(c) => {
                self.emit(Inst::Char(c, c));
                vec![]
            },
            &Regex::Range(lo, hi) => {
                self.emit(Inst::Char(lo, hi));
                vec![]
            },
            Regex::Class(_) => self.node(&desugar(re.clone())),
            Regex::Eos => vec![],
            Regex::Cat(items) => {
                let mut holes = vec![];
                for item in items {
                    self.fill(holes, self.here());
                    holes = self.node(item);
                }
                holes
            },
            Regex::Alt(a, b) => {
                let split = self.emit(Inst::Split(self.here() + 1, 0));
                let ha = self.node(a);
                self.fill(ha, self.here());
                let jmp = self.emit(Inst::Jmp(0));

                self.fill(vec![Hole::Out2(split)], self.here());
                let mut holes = self.node(b);
                holes.push(Hole::Out1(jmp));
                holes
            },
            Regex::Star(r) => {
                let split = self.emit(Inst::Split(self.here() + 1, 0));
                let hr = self.node(r);
                self.fill(hr, self.here());
                self.emit(Inst::Jmp(split));
                vec![Hole::Out2(split)]
            },
            Regex::Plus(r) => {
                let start = self.here();
                let hr = self.node(r);
                self.fill(hr, self.here());
                let split = self.emit(Inst::Split(start, 0));
                vec![Hole::Out2(split)]
            },
            Regex::Maybe(r) => {
                let split = self.emit(Inst::Split(self.here() + 1, 0));
                let mut holes = self.node(r);
                holes.push(Hole::Out2(split));
                holes
            },
            Regex::Match(r) => {
                let hr = self.node(r);
                self.fill(hr, self.here());
                self.emit(Inst::Match(self.next_id));
                self.next_id += 1;
                vec![]
            },
            Regex::AltMatch(a, b) => {
                let split = self.emit(Inst::Split(self.here() + 1, 0));
                let mut holes = self.node(a);
                self.fill(vec![Hole::Out2(split)], self.here());
                holes.extend(self.node(b));
                holes
            },
        }
    }
}

impl Hole {
    #[inline]
    fn pc(self) -> usize {
        match self {
            Self::Out1(pc) | Self::Out2(pc) => pc,
        }
    }
}

/// Thompson construction of an NFA program from a pattern or set of patterns
///
/// Patterns not already wrapped in [`Regex::Match`] are wrapped here, and
/// match IDs are assigned left to right.
///
/// # Errors
/// Returns [`GeneratorError::Unconnected`] if any jump operand is left
/// dangling or control can run off the end of the program.
pub fn generate(re: Regex) -> Result<Program, GeneratorError> {
    let mut g = Generator::default();
    let holes = g.node(&anchor(re));

    // A lone MATCH would read as a deterministic program falling off the end
    if matches!(g.insts.as_slice(), [Inst::Match(_)]) {
        g.emit(Inst::Fail);
    }

    let falls_off = g.insts.last().is_none_or(|i| i.falls_through(false));
    if !holes.is_empty() || falls_off {
        return Err(GeneratorError::Unconnected(holes.len() + usize::from(falls_off)));
    }

    tracing::debug!(insts = g.insts.len(), patterns = g.next_id, "Generated NFA program");

    Ok(Program::new(g.insts))
}
