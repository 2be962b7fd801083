use super::{Inst, Program};
use crate::scan::{Engine, Match, Resume, UnconsumedInput};

/// Longest-match scanning of a byte slice with a deterministic program from
/// [`to_dfa`](super::to_dfa)
///
/// Only one program counter is live at a time, so each input byte costs at
/// most one pass over the current block.
#[derive(Debug)]
pub struct DfaProgramScanner<'a, 't> {
    prog: &'a Program,
    text: &'t [u8],
    resume: Resume,
}

impl<'a, 't> DfaProgramScanner<'a, 't> {
    /// # Panics
    /// Panics if `prog` contains `CHAR` or `SPLIT` instructions.
    #[must_use]
    pub fn new(prog: &'a Program, text: &'t [u8]) -> Self {
        assert!(prog.is_deterministic(), "Program is not deterministic");

        Self {
            prog,
            text,
            resume: Resume::default(),
        }
    }

    #[must_use]
    #[inline]
    pub fn text(&self) -> &'t [u8] { self.text }
}

impl<'t> Engine<'t> for DfaProgramScanner<'_, 't> {
    fn step(&mut self, tc: usize) -> Option<Result<Match<'t>, UnconsumedInput>> {
        if !self.resume.begin(tc, self.text.len()) {
            return None;
        }

        let mut pc = 0;
        let mut i = tc;
        let mut accept = None;
        let fail = loop {
            match self.prog[pc] {
                Inst::Match(id) => {
                    if i > tc {
                        accept = Some((id, i));
                    }
                    pc += 1;
                },
                Inst::CharJmp(lo, hi) => match self.text.get(i) {
                    Some(b) if (lo..=hi).contains(b) => {
                        i += 1;
                        pc += 1;
                    },
                    Some(_) => pc += 2,
                    None => break i,
                },
                Inst::Jmp(x) => pc = x,
                Inst::Fail => break i,
                Inst::Char(..) | Inst::Split(..) => unreachable!(),
            }
        };

        Some(match accept {
            Some((id, end)) => Ok(self.resume.accept(self.text, id, tc, end)),
            None => Err(self.resume.reject(self.text, tc, fail)),
        })
    }
}
