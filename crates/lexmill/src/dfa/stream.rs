use std::borrow::Cow;

use super::{Dfa, ERROR};
use crate::{
    scan::{EmptyMatchError, LineTracker, Match, ScanError, UnconsumedInput},
    source::ByteSource,
};

/// Longest-match scanning of a forward-only [`ByteSource`] with a table DFA
///
/// Unlike the slice engines this one cannot rewind, so a pattern matching
/// the empty string at the cursor is reported as an [`EmptyMatchError`] and
/// ends the scan.  After an [`UnconsumedInput`] error the cursor is left
/// where it was; use [`skip_bytes`](Self::skip_bytes) to move past the bad input.
#[derive(Debug)]
pub struct StreamEngine<'a, S> {
    dfa: &'a Dfa,
    source: S,
    finished: bool,
}

impl<'a, S: ByteSource> StreamEngine<'a, S> {
    #[must_use]
    pub fn new(dfa: &'a Dfa, source: S) -> Self {
        Self {
            dfa,
            source,
            finished: false,
        }
    }

    #[inline]
    pub fn source(&self) -> &S { &self.source }

    #[inline]
    pub fn source_mut(&mut self) -> &mut S { &mut self.source }

    #[inline]
    pub fn into_source(self) -> S { self.source }

    /// Discard `n` bytes at the cursor
    pub fn skip_bytes(&mut self, n: usize) { self.source.advance(n); }

    /// Find the longest match at the cursor and advance past it
    ///
    /// Returns `None` at the end of input, and forever after a fatal error.
    pub fn step(&mut self) -> Option<Result<Match<'static>, ScanError>> {
        if self.finished {
            return None;
        }

        let Some(start) = self.source.current() else {
            self.finished = true;
            return self.source.take_error().map(|e| Err(e.into()));
        };

        let mut state = self.dfa.start();
        let mut accept = self.dfa.accepting(state).map(|id| (id, 0));
        let mut bytes = vec![];

        while let Some(byte) = self.source.peek(bytes.len()) {
            state = self.dfa.next(state, byte);
            bytes.push(byte);

            if state == ERROR {
                break;
            }

            if let Some(id) = self.dfa.accepting(state) {
                accept = Some((id, bytes.len()));
            }
        }

        if let Some(err) = self.source.take_error() {
            self.finished = true;
            return Some(Err(err.into()));
        }

        let mut lines = LineTracker::at(start.tc, start.line, start.column);
        Some(match accept {
            Some((id, 0)) => {
                self.finished = true;
                Err(EmptyMatchError {
                    id,
                    tc: start.tc,
                    line: start.line,
                    column: start.column,
                }
                .into())
            },
            Some((id, len)) => {
                bytes.truncate(len);
                for &byte in &bytes[..len - 1] {
                    lines.advance(byte);
                }
                self.source.advance(len);

                Ok(Match {
                    id,
                    tc: start.tc,
                    start_line: start.line,
                    start_column: start.column,
                    end_line: lines.line(),
                    end_column: lines.column(),
                    bytes: Cow::Owned(bytes),
                })
            },
            None => {
                // The last byte read is the one the automaton failed on, unless
                // the input ran out first
                let failed_on_byte = state == ERROR;
                let walked = if failed_on_byte { bytes.len() - 1 } else { bytes.len() };
                for &byte in &bytes[..walked] {
                    lines.advance(byte);
                }

                tracing::trace!(tc = start.tc, fail = lines.offset(), "No pattern matched");

                Err(UnconsumedInput {
                    start_tc: start.tc,
                    fail_tc: lines.offset(),
                    start_line: start.line,
                    start_column: start.column,
                    fail_line: lines.line(),
                    fail_column: lines.column(),
                    text: bytes,
                }
                .into())
            },
        })
    }
}

impl<S: ByteSource> Iterator for StreamEngine<'_, S> {
    type Item = Result<Match<'static>, ScanError>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> { self.step() }
}
