use super::{
    Inst, Program,
    thread::{Closure, ThreadList},
};
use crate::scan::{Engine, Match, Resume, UnconsumedInput};

/// Longest-match scanning of a byte slice by simulating every thread of a
/// bytecode program in lockstep
///
/// Both kinds of program can be run.  Among threads accepting at the same
/// offset the lowest match ID wins.
#[derive(Debug)]
pub struct NfaScanner<'a, 't> {
    prog: &'a Program,
    text: &'t [u8],
    clist: ThreadList,
    nlist: ThreadList,
    closure: Closure,
    resume: Resume,
}

impl<'a, 't> NfaScanner<'a, 't> {
    #[must_use]
    pub fn new(prog: &'a Program, text: &'t [u8]) -> Self {
        Self {
            prog,
            text,
            clist: ThreadList::new(prog.len()),
            nlist: ThreadList::new(prog.len()),
            closure: Closure::default(),
            resume: Resume::default(),
        }
    }

    #[must_use]
    #[inline]
    pub fn text(&self) -> &'t [u8] { self.text }
}

impl<'t> Engine<'t> for NfaScanner<'_, 't> {
    fn step(&mut self, tc: usize) -> Option<Result<Match<'t>, UnconsumedInput>> {
        if !self.resume.begin(tc, self.text.len()) {
            return None;
        }

        let (prog, text) = (self.prog, self.text);
        let Self {
            clist,
            nlist,
            closure,
            ..
        } = self;

        clist.clear();
        closure.add(prog, clist, 0);

        let mut accept: Option<(usize, usize)> = None;
        let mut fail = text.len();

        for i in tc..=text.len() {
            let byte = text.get(i).copied();
            nlist.clear();

            // The list may grow while it is walked when a CHJMP falls back
            let mut k = 0;
            while let Some(pc) = clist.get(k) {
                k += 1;

                match prog[pc] {
                    Inst::Match(id) => {
                        if i > tc && accept.is_none_or(|(best, end)| end < i || id < best) {
                            accept = Some((id, i));
                        }
                    },
                    Inst::Char(lo, hi) => {
                        if byte.is_some_and(|b| (lo..=hi).contains(&b)) {
                            closure.add(prog, nlist, pc + 1);
                        }
                    },
                    Inst::CharJmp(lo, hi) => match byte {
                        Some(b) if (lo..=hi).contains(&b) => closure.add(prog, nlist, pc + 1),
                        Some(_) => closure.add(prog, clist, pc + 2),
                        None => (),
                    },
                    Inst::Split(..) | Inst::Jmp(_) | Inst::Fail => (),
                }
            }

            if byte.is_none() {
                break;
            }

            if nlist.is_empty() {
                fail = i;
                break;
            }

            std::mem::swap(clist, nlist);
        }

        Some(match accept {
            Some((id, end)) => Ok(self.resume.accept(text, id, tc, end)),
            None => Err(self.resume.reject(text, tc, fail)),
        })
    }
}

#[cfg(test)]
mod test {
    use crate::{
        prog::Program,
        re::{Regex, parse},
        scan::Engine,
    };

    fn compile(patterns: &[&str]) -> Program {
        Program::compile(
            Regex::alt_matches(
                patterns
                    .iter()
                    .map(|p| parse(p.as_bytes()).unwrap().pattern())
                    .collect::<Vec<_>>(),
            )
            .unwrap(),
        )
        .unwrap()
    }

    fn tokens(prog: &Program, text: &[u8]) -> Vec<(usize, usize, usize)> {
        let mut scan = prog.scanner(text);
        let mut out = vec![];
        let mut tc = 0;
        while let Some(Ok(m)) = scan.step(tc) {
            out.push((m.id, m.tc, m.end()));
            tc = m.end();
        }
        out
    }

    #[test]
    fn longest_match_and_tie_break() {
        let prog = compile(&["print", "[A-Za-z_][A-Za-z0-9_]*", " +"]);

        assert_eq!(tokens(&prog, b"print printer"), [(0, 0, 5), (2, 5, 6), (1, 6, 13)]);
        assert_eq!(tokens(&prog, b"prin"), [(1, 0, 4)]);
    }

    #[test]
    fn never_returns_empty_matches() {
        let prog = compile(&["a*", "b"]);
        let mut scan = prog.scanner(b"aac");

        let m = scan.step(0).unwrap().unwrap();
        assert_eq!((m.id, m.end()), (0, 2));

        let err = scan.step(2).unwrap().unwrap_err();
        assert_eq!((err.start_tc, err.fail_tc, err.text.as_slice()), (2, 2, &b"c"[..]));
    }

    #[test]
    fn backtracks_on_request() {
        let prog = compile(&["struct", "[ \n]+", r"\*", "[a-z]+"]);
        let text = b"struct\n  *";
        let mut scan = prog.scanner(text);

        assert_eq!(scan.step(0).unwrap().unwrap().end(), 6);
        assert_eq!(scan.step(6).unwrap().unwrap().end(), 9);

        let m = scan.step(2).unwrap().unwrap();
        assert_eq!((m.id, &*m.bytes, m.start_column), (3, &b"ruct"[..], 3));
        assert_eq!(scan.step(2).unwrap(), prog.scanner(text).step(2).unwrap());
    }

    #[test]
    fn runs_dfa_programs() {
        let prog = compile(&["if", "[a-z]+", "[0-9]+", " "]);
        let dfa = prog.to_dfa();
        let text = b"if iffy 42 if9";

        assert_eq!(tokens(&dfa, text), tokens(&prog, text));
        assert_eq!(tokens(&prog, text).len(), 8);
    }

    #[test]
    fn dfa_program_matches_continue_past_accepting_states() {
        let dfa = compile(&["a+"]).to_dfa();
        let m = dfa.scanner(b"aaa").step(0).unwrap().unwrap();
        assert_eq!((m.id, m.tc, m.end()), (0, 0, 3));

        let dfa = Program::compile(parse(b"a?").unwrap()).unwrap().to_dfa();
        let m = dfa.scanner(b"a").step(0).unwrap().unwrap();
        assert_eq!((m.id, m.tc, m.end()), (0, 0, 1));
    }
}
