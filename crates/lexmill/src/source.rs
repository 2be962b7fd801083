//! Forward-only byte sources for scanning input that is not held in memory

use std::{collections::VecDeque, io};

use crate::scan::LineTracker;

const READ_CHUNK: usize = 4096;

/// A byte read from a source, along with its position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Character {
    pub byte: u8,
    /// Offset of this byte from the start of the input
    pub tc: usize,
    pub line: usize,
    pub column: usize,
}

/// A cursor over a stream of bytes with arbitrary lookahead
///
/// The cursor only moves forward.  Sources which can fail record the first
/// error they encounter and report end-of-input from then on.
pub trait ByteSource {
    /// The byte under the cursor, or `None` at end of input
    fn current(&mut self) -> Option<Character>;

    /// The byte `lookahead` positions past the cursor, or `None` if the input
    /// ends before it
    fn peek(&mut self, lookahead: usize) -> Option<u8>;

    /// Move the cursor forward by `n` bytes, returning whether a byte remains
    /// under it
    fn advance(&mut self, n: usize) -> bool;

    /// Offset of the cursor from the start of the input
    fn tc(&self) -> usize;

    /// Whether any byte has been read yet
    fn started(&self) -> bool;

    fn at_end(&mut self) -> bool { self.peek(0).is_none() }

    fn error(&self) -> Option<&io::Error>;

    /// Remove and return the recorded error, if any
    fn take_error(&mut self) -> Option<io::Error>;
}

/// A [`ByteSource`] over an in-memory slice
#[derive(Debug, Clone, Copy)]
pub struct SliceSource<'a> {
    text: &'a [u8],
    lines: LineTracker,
    started: bool,
}

impl<'a> SliceSource<'a> {
    #[must_use]
    pub fn new(text: &'a [u8]) -> Self {
        Self {
            text,
            lines: LineTracker::default(),
            started: false,
        }
    }
}

impl ByteSource for SliceSource<'_> {
    fn current(&mut self) -> Option<Character> {
        self.started = true;
        let l = self.lines;

        self.text.get(l.offset()).map(|&byte| Character {
            byte,
            tc: l.offset(),
            line: l.line(),
            column: l.column(),
        })
    }

    fn peek(&mut self, lookahead: usize) -> Option<u8> {
        self.started = true;
        self.text.get(self.lines.offset() + lookahead).copied()
    }

    fn advance(&mut self, n: usize) -> bool {
        self.started = true;
        for _ in 0..n {
            let Some(&byte) = self.text.get(self.lines.offset()) else {
                break;
            };
            self.lines.advance(byte);
        }

        self.lines.offset() < self.text.len()
    }

    #[inline]
    fn tc(&self) -> usize { self.lines.offset() }

    #[inline]
    fn started(&self) -> bool { self.started }

    #[inline]
    fn error(&self) -> Option<&io::Error> { None }

    #[inline]
    fn take_error(&mut self) -> Option<io::Error> { None }
}

/// A [`ByteSource`] reading from an [`io::Read`] implementation
///
/// Bytes are buffered only as far as lookahead requires.
#[derive(Debug)]
pub struct ReaderSource<R> {
    reader: R,
    buf: VecDeque<u8>,
    lines: LineTracker,
    eof: bool,
    error: Option<io::Error>,
    started: bool,
}

impl<R: io::Read> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: VecDeque::new(),
            lines: LineTracker::default(),
            eof: false,
            error: None,
            started: false,
        }
    }

    pub fn into_inner(self) -> R { self.reader }

    /// Read until the buffer holds more than `lookahead` bytes or the input
    /// runs out
    fn fill(&mut self, lookahead: usize) {
        self.started = true;
        let mut chunk = [0_u8; READ_CHUNK];

        while self.buf.len() <= lookahead && !self.eof {
            match self.reader.read(&mut chunk) {
                Ok(0) => self.eof = true,
                Ok(n) => self.buf.extend(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => (),
                Err(e) => {
                    tracing::debug!(tc = self.lines.offset() + self.buf.len(), "Read error: {e}");
                    self.error = Some(e);
                    self.eof = true;
                },
            }
        }
    }
}

impl<R: io::Read> ByteSource for ReaderSource<R> {
    fn current(&mut self) -> Option<Character> {
        self.fill(0);
        let l = self.lines;

        self.buf.front().map(|&byte| Character {
            byte,
            tc: l.offset(),
            line: l.line(),
            column: l.column(),
        })
    }

    fn peek(&mut self, lookahead: usize) -> Option<u8> {
        self.fill(lookahead);
        self.buf.get(lookahead).copied()
    }

    fn advance(&mut self, n: usize) -> bool {
        for _ in 0..n {
            self.fill(0);
            let Some(byte) = self.buf.pop_front() else {
                break;
            };
            self.lines.advance(byte);
        }

        self.fill(0);
        !self.buf.is_empty()
    }

    #[inline]
    fn tc(&self) -> usize { self.lines.offset() }

    #[inline]
    fn started(&self) -> bool { self.started }

    #[inline]
    fn error(&self) -> Option<&io::Error> { self.error.as_ref() }

    #[inline]
    fn take_error(&mut self) -> Option<io::Error> { self.error.take() }
}
