//! Bytecode programs for the NFA and DFA virtual machines
//!
//! A program is a flat list of [`Inst`]s executed from offset 0.  Programs
//! produced by [`generate`] are Thompson NFAs using `CHAR`, `SPLIT`, `JMP` and
//! `MATCH`.  [`to_dfa`] turns one into a deterministic program built from
//! blocks of the form
//!
//! ```text
//! [MATCH id]
//! CHJMP lo hi
//! JMP   block
//! ...
//! FAIL
//! ```
//!
//! where each `CHJMP` consumes the current byte and falls through to the
//! following `JMP` if the byte is in range, and skips over that `JMP`
//! otherwise.  `MATCH` ends a thread in an NFA program, but in a
//! deterministic one it records the match and falls through to the rest of
//! its block.

use std::{fmt, num::ParseIntError, ops::Index, str::FromStr};

use crate::re::Regex;

pub mod builder;
pub mod dfa_builder;
pub mod dfa_scanner;
pub mod scanner;
pub mod thread;

pub use builder::{GeneratorError, generate};
pub use dfa_builder::to_dfa;
pub use dfa_scanner::DfaProgramScanner;
pub use scanner::NfaScanner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Inst {
    /// Consume one byte in the inclusive range, or kill the thread
    Char(u8, u8),
    /// Continue at both offsets, preferring the first
    Split(usize, usize),
    Jmp(usize),
    /// Accept with the given match ID
    Match(usize),
    /// Consume one byte in the inclusive range and continue at the next
    /// instruction, or skip the next instruction without consuming
    CharJmp(u8, u8),
    /// Kill the thread
    Fail,
}

impl Inst {
    /// Whether control can continue to the instruction after this one without
    /// an explicit jump, in a program of the given kind
    #[must_use]
    pub fn falls_through(self, deterministic: bool) -> bool {
        match self {
            Self::Char(..) | Self::CharJmp(..) => true,
            Self::Match(_) => deterministic,
            Self::Split(..) | Self::Jmp(_) | Self::Fail => false,
        }
    }

    /// The next instruction reached without consuming input when this one
    /// runs in a deterministic program, taking the miss branch of `CHJMP`
    fn epsilon_next(self, pc: usize) -> Option<usize> {
        match self {
            Self::Match(_) => Some(pc + 1),
            Self::Jmp(x) => Some(x),
            Self::CharJmp(..) => Some(pc + 2),
            Self::Char(..) | Self::Split(..) | Self::Fail => None,
        }
    }

    /// The jump targets encoded in this instruction
    #[must_use]
    pub fn targets(self) -> impl Iterator<Item = usize> {
        let (a, b) = match self {
            Self::Split(x, y) => (Some(x), Some(y)),
            Self::Jmp(x) => (Some(x), None),
            Self::Char(..) | Self::Match(_) | Self::CharJmp(..) | Self::Fail => (None, None),
        };

        a.into_iter().chain(b)
    }

    fn opcode(self) -> &'static str {
        match self {
            Self::Char(..) => "CHAR",
            Self::Split(..) => "SPLIT",
            Self::Jmp(_) => "JMP",
            Self::Match(_) => "MATCH",
            Self::CharJmp(..) => "CHJMP",
            Self::Fail => "FAIL",
        }
    }
}

fn fmt_byte(f: &mut fmt::Formatter<'_>, byte: u8) -> fmt::Result {
    write!(f, "{byte} ({})", byte.escape_ascii())
}

impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<6}", self.opcode())?;

        match *self {
            Self::Char(lo, hi) | Self::CharJmp(lo, hi) => {
                f.write_str(" ")?;
                fmt_byte(f, lo)?;
                if lo != hi {
                    f.write_str(", ")?;
                    fmt_byte(f, hi)?;
                }
                Ok(())
            },
            Self::Split(x, y) => write!(f, " {x}, {y}"),
            Self::Jmp(x) => write!(f, " {x}"),
            Self::Match(id) => write!(f, " {id}"),
            Self::Fail => Ok(()),
        }
    }
}

/// A compiled bytecode program
///
/// Every jump target is a valid offset into the program, and the last
/// instruction never falls through.  Every `CHJMP` is followed by a `JMP` and
/// at least one more instruction, and a deterministic program cannot loop
/// without consuming input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    insts: Vec<Inst>,
    deterministic: bool,
}

fn deterministic(insts: &[Inst]) -> bool {
    !insts
        .iter()
        .any(|i| matches!(i, Inst::Char(..) | Inst::Split(..)))
}

/// The first instruction found on a cycle that a deterministic program can
/// run around without consuming input
fn empty_loop(insts: &[Inst]) -> Option<usize> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        New,
        Open,
        Done,
    }

    let mut marks = vec![Mark::New; insts.len()];
    let mut path = vec![];
    for start in 0..insts.len() {
        let mut pc = Some(start);
        while let Some(p) = pc {
            match marks[p] {
                Mark::Done => break,
                Mark::Open => return Some(p),
                Mark::New => {
                    marks[p] = Mark::Open;
                    path.push(p);
                    pc = insts[p].epsilon_next(p);
                },
            }
        }

        for p in path.drain(..) {
            marks[p] = Mark::Done;
        }
    }

    None
}

impl Program {
    pub(crate) fn new(insts: Vec<Inst>) -> Self {
        let deterministic = deterministic(&insts);

        debug_assert!(
            insts
                .iter()
                .flat_map(|i| i.targets())
                .all(|t| t < insts.len())
        );
        debug_assert!(insts.last().is_some_and(|i| !i.falls_through(deterministic)));
        debug_assert!(!deterministic || empty_loop(&insts).is_none());

        Self {
            insts,
            deterministic,
        }
    }

    /// Generate a Thompson NFA program from a pattern or set of patterns
    ///
    /// # Errors
    /// Fails only if the generator leaves an instruction unconnected.
    pub fn compile(re: Regex) -> Result<Self, GeneratorError> { generate(re) }

    #[must_use]
    #[inline]
    pub fn insts(&self) -> &[Inst] { &self.insts }

    #[must_use]
    #[inline]
    pub fn len(&self) -> usize { self.insts.len() }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool { self.insts.is_empty() }

    /// The match ID accepted at `pc`, if it holds a `MATCH` instruction
    #[must_use]
    pub fn match_id(&self, pc: usize) -> Option<usize> {
        match self.insts.get(pc) {
            Some(&Inst::Match(id)) => Some(id),
            _ => None,
        }
    }

    /// Every `MATCH` instruction as `(pc, match ID)` pairs
    pub fn matches(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.insts.len()).filter_map(|pc| Some((pc, self.match_id(pc)?)))
    }

    /// Whether the program is the deterministic kind produced by [`to_dfa`]
    #[must_use]
    #[inline]
    pub fn is_deterministic(&self) -> bool { self.deterministic }

    /// Whether some pattern accepts without consuming any input
    #[must_use]
    pub fn matches_empty(&self) -> bool {
        let mut list = thread::ThreadList::new(self.len());
        thread::Closure::default().add(self, &mut list, 0);

        list.iter().any(|pc| self.match_id(pc).is_some())
    }

    #[must_use]
    #[inline]
    pub fn to_dfa(&self) -> Self { to_dfa(self) }

    /// Render the instruction graph for Graphviz
    #[must_use]
    #[inline]
    pub fn dot(&self) -> crate::dot::Graph<'static> { crate::dot::program(self) }

    /// Bind this program to an input for scanning with the NFA engine
    #[must_use]
    #[inline]
    pub fn scanner<'a, 't>(&'a self, text: &'t [u8]) -> NfaScanner<'a, 't> {
        NfaScanner::new(self, text)
    }

    /// Render the program one instruction per line in the form accepted by
    /// [`str::parse`]
    #[must_use]
    pub fn serialize(&self) -> String {
        use fmt::Write;

        let mut s = String::new();
        for &inst in &self.insts {
            s.push_str(inst.opcode());
            // Writing to a String never fails
            let _ = match inst {
                Inst::Char(lo, hi) | Inst::CharJmp(lo, hi) => write!(s, " {lo} {hi}"),
                Inst::Split(x, y) => write!(s, " {x} {y}"),
                Inst::Jmp(x) => write!(s, " {x}"),
                Inst::Match(id) => write!(s, " {id}"),
                Inst::Fail => Ok(()),
            };
            s.push('\n');
        }

        s
    }
}

impl Index<usize> for Program {
    type Output = Inst;

    #[inline]
    fn index(&self, pc: usize) -> &Inst { &self.insts[pc] }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{{")?;
        for (pc, inst) in self.insts.iter().enumerate() {
            writeln!(f, "    {pc:02} {inst}")?;
        }
        write!(f, "}}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProgramReadError {
    #[error("Program contains no instructions")]
    Empty,
    #[error("Unknown opcode {op:?} on line {line}")]
    UnknownOpcode { line: usize, op: String },
    #[error("{op} on line {line} takes {expected} operand(s), found {found}")]
    Arity {
        line: usize,
        op: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Invalid operand {text:?} on line {line}")]
    BadOperand {
        line: usize,
        text: String,
        #[source]
        source: ParseIntError,
    },
    #[error("Byte range {lo}-{hi} on line {line} is reversed")]
    ReversedRange { line: usize, lo: u8, hi: u8 },
    #[error("Jump target {target} on line {line} is past the end of the program")]
    BadTarget { line: usize, target: usize },
    #[error("CHJMP on line {line} is not followed by JMP")]
    LoneCharJmp { line: usize },
    #[error("CHJMP on line {line} has no instruction to skip to")]
    MissPastEnd { line: usize },
    #[error("Instruction on line {line} can loop without consuming input")]
    EmptyLoop { line: usize },
    #[error("Program falls through past its last instruction")]
    FallsOffEnd,
}

fn read_inst(line: usize, text: &str) -> Result<Inst, ProgramReadError> {
    fn operands<T: FromStr<Err = ParseIntError>, const N: usize>(
        line: usize,
        op: &'static str,
        args: &[&str],
    ) -> Result<[T; N], ProgramReadError> {
        if args.len() != N {
            return Err(ProgramReadError::Arity {
                line,
                op,
                expected: N,
                found: args.len(),
            });
        }

        let mut out = Vec::with_capacity(N);
        for &arg in args {
            out.push(arg.parse().map_err(|source| ProgramReadError::BadOperand {
                line,
                text: arg.into(),
                source,
            })?);
        }

        out.try_into()
            .map_err(|_| unreachable!("operand count was checked"))
    }

    fn range(line: usize, op: &'static str, args: &[&str]) -> Result<(u8, u8), ProgramReadError> {
        let [lo, hi] = operands::<u8, 2>(line, op, args)?;
        if lo > hi {
            return Err(ProgramReadError::ReversedRange { line, lo, hi });
        }
        Ok((lo, hi))
    }

    let mut words = text.split_whitespace();
    let op = words.next().unwrap_or_default();
    let args: Vec<_> = words.collect();

    Ok(match op {
        "CHAR" => {
            let (lo, hi) = range(line, "CHAR", &args)?;
            Inst::Char(lo, hi)
        },
        "CHJMP" => {
            let (lo, hi) = range(line, "CHJMP", &args)?;
            Inst::CharJmp(lo, hi)
        },
        "SPLIT" => {
            let [x, y] = operands::<usize, 2>(line, "SPLIT", &args)?;
            Inst::Split(x, y)
        },
        "JMP" => {
            let [x] = operands::<usize, 1>(line, "JMP", &args)?;
            Inst::Jmp(x)
        },
        "MATCH" => {
            let [id] = operands::<usize, 1>(line, "MATCH", &args)?;
            Inst::Match(id)
        },
        "FAIL" => {
            let [] = operands::<usize, 0>(line, "FAIL", &args)?;
            Inst::Fail
        },
        op => {
            return Err(ProgramReadError::UnknownOpcode {
                line,
                op: op.into(),
            });
        },
    })
}

impl FromStr for Program {
    type Err = ProgramReadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut insts = vec![];
        let mut lines = vec![];
        for (i, text) in s.lines().enumerate() {
            if text.trim().is_empty() {
                continue;
            }

            insts.push(read_inst(i + 1, text)?);
            lines.push(i + 1);
        }

        let Some(&last) = insts.last() else {
            return Err(ProgramReadError::Empty);
        };
        let deterministic = deterministic(&insts);
        if last.falls_through(deterministic) {
            return Err(ProgramReadError::FallsOffEnd);
        }

        for (pc, inst) in insts.iter().enumerate() {
            if let Some(target) = inst.targets().find(|&t| t >= insts.len()) {
                return Err(ProgramReadError::BadTarget {
                    line: lines[pc],
                    target,
                });
            }

            if matches!(inst, Inst::CharJmp(..)) {
                if !matches!(insts.get(pc + 1), Some(Inst::Jmp(_))) {
                    return Err(ProgramReadError::LoneCharJmp { line: lines[pc] });
                }

                if pc + 2 >= insts.len() {
                    return Err(ProgramReadError::MissPastEnd { line: lines[pc] });
                }
            }
        }

        if deterministic && let Some(pc) = empty_loop(&insts) {
            return Err(ProgramReadError::EmptyLoop { line: lines[pc] });
        }

        Ok(Self::new(insts))
    }
}

#[cfg(test)]
mod test {
    use super::{Inst, Program, ProgramReadError};
    use crate::re::parse;

    #[test]
    fn display() {
        let prog = Program::compile(parse(b"a|[b-d]").unwrap()).unwrap();

        assert_eq!(
            prog.to_string(),
            "{\n    00 SPLIT  1, 3\n    01 CHAR   97 (a)\n    02 JMP    4\n    03 CHAR   98 (b), \
             100 (d)\n    04 MATCH  0\n}"
        );
    }

    #[test]
    fn serialize_and_read() {
        let prog = Program::compile(parse(b"x(ab)*").unwrap()).unwrap();
        let text = prog.serialize();

        assert_eq!(text, "CHAR 120 120\nSPLIT 2 5\nCHAR 97 97\nCHAR 98 98\nJMP 1\nMATCH 0\n");
        assert_eq!(text.parse::<Program>(), Ok(prog.clone()));

        let dfa = prog.to_dfa();
        assert_eq!(dfa.serialize().parse::<Program>(), Ok(dfa));
    }

    #[test]
    fn read_errors() {
        assert_eq!("\n\n".parse::<Program>(), Err(ProgramReadError::Empty));
        assert!(matches!(
            "MATCH 0\nHALT\n".parse::<Program>(),
            Err(ProgramReadError::UnknownOpcode { line: 2, .. })
        ));
        assert!(matches!(
            "JMP 1 2".parse::<Program>(),
            Err(ProgramReadError::Arity {
                expected: 1,
                found: 2,
                ..
            })
        ));
        assert!(matches!(
            "CHAR 97 x\nMATCH 0".parse::<Program>(),
            Err(ProgramReadError::BadOperand { line: 1, .. })
        ));
        assert!(matches!(
            "CHAR 256 256\nMATCH 0".parse::<Program>(),
            Err(ProgramReadError::BadOperand { .. })
        ));
        assert_eq!(
            "CHAR 98 97\nMATCH 0".parse::<Program>(),
            Err(ProgramReadError::ReversedRange {
                line: 1,
                lo: 98,
                hi: 97
            })
        );
        assert_eq!(
            "SPLIT 1 7\nMATCH 0".parse::<Program>(),
            Err(ProgramReadError::BadTarget { line: 1, target: 7 })
        );
        assert_eq!(
            "CHJMP 1 2\nFAIL".parse::<Program>(),
            Err(ProgramReadError::LoneCharJmp { line: 1 })
        );
        assert_eq!("MATCH 0\nCHAR 1 1".parse::<Program>(), Err(ProgramReadError::FallsOffEnd));
    }

    #[test]
    fn rejects_programs_that_trap_engines() {
        // MATCH falls through in a deterministic program
        assert_eq!("MATCH 0\n".parse::<Program>(), Err(ProgramReadError::FallsOffEnd));
        assert_eq!(
            "CHJMP 97 97\nJMP 0\n".parse::<Program>(),
            Err(ProgramReadError::MissPastEnd { line: 1 })
        );
        assert_eq!(
            "MATCH 0\nJMP 0\n".parse::<Program>(),
            Err(ProgramReadError::EmptyLoop { line: 1 })
        );
        assert_eq!(
            "CHJMP 97 97\nJMP 3\nJMP 0\nFAIL\n".parse::<Program>(),
            Err(ProgramReadError::EmptyLoop { line: 1 })
        );

        // The same shapes are fine where MATCH ends the thread
        let nfa = "SPLIT 1 2\nMATCH 0\nCHAR 97 97\nJMP 0\n".parse::<Program>().unwrap();
        assert!(!nfa.is_deterministic());
        assert!(nfa.matches_empty());
    }

    #[test]
    fn matches_empty() {
        let yes = Program::compile(parse(b"(ab|a)*").unwrap()).unwrap();
        let no = Program::compile(parse(b"(ab|a)+").unwrap()).unwrap();

        assert!(yes.matches_empty());
        assert!(!no.matches_empty());
        assert!(yes.to_dfa().matches_empty());
        assert!(!no.to_dfa().matches_empty());
        assert!(yes.to_dfa().is_deterministic());
        assert!(!yes.is_deterministic());
    }

    #[test]
    fn match_table() {
        let prog = Program::compile(
            crate::re::Regex::alt_matches([parse(b"a").unwrap().pattern(), parse(b"b").unwrap().pattern()])
                .unwrap(),
        )
        .unwrap();

        let matches: Vec<_> = prog.matches().collect();
        assert_eq!(matches, [(2, 0), (4, 1)]);
        assert_eq!(prog[0], Inst::Split(1, 3));
        assert_eq!(prog.match_id(1), None);
    }
}
