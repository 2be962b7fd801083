use super::{Dfa, ERROR};
use crate::scan::{Engine, Match, Resume, UnconsumedInput};

/// Longest-match scanning of a byte slice with a table DFA
#[derive(Debug)]
pub struct DfaScanner<'a, 't> {
    dfa: &'a Dfa,
    text: &'t [u8],
    resume: Resume,
}

impl<'a, 't> DfaScanner<'a, 't> {
    #[must_use]
    pub fn new(dfa: &'a Dfa, text: &'t [u8]) -> Self {
        Self {
            dfa,
            text,
            resume: Resume::default(),
        }
    }

    #[must_use]
    #[inline]
    pub fn text(&self) -> &'t [u8] { self.text }
}

impl<'t> Engine<'t> for DfaScanner<'_, 't> {
    fn step(&mut self, tc: usize) -> Option<Result<Match<'t>, UnconsumedInput>> {
        if !self.resume.begin(tc, self.text.len()) {
            return None;
        }

        let mut state = self.dfa.start();
        let mut accept = None;
        let mut fail = self.text.len();

        for (i, &byte) in (tc..).zip(&self.text[tc..]) {
            state = self.dfa.next(state, byte);

            if state == ERROR {
                fail = i;
                break;
            }

            if let Some(id) = self.dfa.accepting(state) {
                accept = Some((id, i + 1));
            }
        }

        Some(match accept {
            Some((id, end)) => Ok(self.resume.accept(self.text, id, tc, end)),
            None => Err(self.resume.reject(self.text, tc, fail)),
        })
    }
}

#[cfg(test)]
mod test {
    use crate::{
        dfa::Dfa,
        re::{Regex, parse},
        scan::Engine,
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
        .minimize()
    }

    #[test]
    fn longest_match_and_tie_break() {
        let dfa = compile(&["print", "[A-Za-z_][A-Za-z0-9_]*", " +"]);
        let mut scan = dfa.scanner(b"print printer");

        let m = scan.step(0).unwrap().unwrap();
        assert_eq!((m.id, m.tc, m.end()), (0, 0, 5));
        let m = scan.step(5).unwrap().unwrap();
        assert_eq!((m.id, m.tc, m.end()), (2, 5, 6));
        let m = scan.step(6).unwrap().unwrap();
        assert_eq!((m.id, &*m.bytes), (1, &b"printer"[..]));
        assert!(scan.step(13).is_none());
        assert!(scan.step(0).is_none());
    }

    #[test]
    fn falls_back_to_last_accept() {
        let dfa = compile(&["a", "abc"]);
        let mut scan = dfa.scanner(b"abd");

        let m = scan.step(0).unwrap().unwrap();
        assert_eq!((m.id, m.end()), (0, 1));

        let err = scan.step(1).unwrap().unwrap_err();
        assert_eq!((err.start_tc, err.fail_tc), (1, 1));
        assert_eq!(err.text, b"b");

        let err = scan.step(2).unwrap().unwrap_err();
        assert_eq!((err.start_tc, err.fail_tc, err.start_column), (2, 2, 3));
        assert!(scan.step(3).is_none());
    }

    #[test]
    fn error_at_end_of_input() {
        let dfa = compile(&["abc"]);
        let mut scan = dfa.scanner(b"ab");

        let err = scan.step(0).unwrap().unwrap_err();
        assert_eq!((err.start_tc, err.fail_tc), (0, 2));
        assert_eq!(err.text, b"ab");
    }

    #[test]
    fn rewind_matches_fresh_scan() {
        let dfa = compile(&["struct", "[ \n]+", r"\*"]);
        let text = b"struct\n  *";
        let mut scan = dfa.scanner(text);

        let first = scan.step(0).unwrap().unwrap();
        assert_eq!((first.id, first.end()), (0, 6));
        let ws = scan.step(6).unwrap().unwrap();
        assert_eq!((ws.id, ws.end(), ws.end_line, ws.end_column), (1, 9, 2, 2));
        let star = scan.step(9).unwrap().unwrap();
        assert_eq!((star.id, star.start_line, star.start_column), (2, 2, 3));

        for tc in [7, 0, 6, 3] {
            let again = scan.step(tc).unwrap();
            let fresh = dfa.scanner(text).step(tc).unwrap();
            assert_eq!(again, fresh, "resuming at {tc}");
        }
    }
}
