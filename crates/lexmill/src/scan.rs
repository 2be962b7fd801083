//! Types shared by the scanning engines

use std::borrow::Cow;

/// Compute the 1-based line and column of the byte at `offset`
///
/// Offsets past the end of `text` continue counting columns on the last line.
#[must_use]
pub fn line_col(text: &[u8], offset: usize) -> (usize, usize) {
    let head = &text[..offset.min(text.len())];
    let line = 1 + head.iter().filter(|&&b| b == b'\n').count();
    let line_start = head.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);

    (line, offset - line_start + 1)
}

/// Incremental line/column bookkeeping for a cursor that usually moves
/// forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineTracker {
    offset: usize,
    line: usize,
    column: usize,
}

impl Default for LineTracker {
    #[inline]
    fn default() -> Self {
        Self {
            offset: 0,
            line: 1,
            column: 1,
        }
    }
}

impl LineTracker {
    /// A tracker positioned at a known offset, line and column
    #[must_use]
    pub fn at(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }

    /// The 1-based line and column of the byte at `offset`, counting from the
    /// previously queried offset where possible
    pub fn position(&mut self, text: &[u8], offset: usize) -> (usize, usize) {
        if offset < self.offset {
            *self = Self::default();
        }

        for i in self.offset..offset {
            if text.get(i) == Some(&b'\n') {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }

        self.offset = offset;
        (self.line, self.column)
    }

    /// Advance past a single byte
    pub fn advance(&mut self, byte: u8) {
        self.offset += 1;
        if byte == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }

    #[must_use]
    #[inline]
    pub fn offset(&self) -> usize { self.offset }

    #[must_use]
    #[inline]
    pub fn line(&self) -> usize { self.line }

    #[must_use]
    #[inline]
    pub fn column(&self) -> usize { self.column }
}

/// One longest match produced by an engine
///
/// Line and column numbers are 1-based.  The end position is that of the
/// last matched byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match<'t> {
    /// Index of the pattern that matched, in declaration order
    pub id: usize,
    /// Offset of the first matched byte
    pub tc: usize,
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
    pub bytes: Cow<'t, [u8]>,
}

impl Match<'_> {
    /// Offset one past the last matched byte
    #[must_use]
    #[inline]
    pub fn end(&self) -> usize { self.tc + self.bytes.len() }

    #[must_use]
    pub fn into_owned(self) -> Match<'static> {
        Match {
            bytes: Cow::Owned(self.bytes.into_owned()),
            ..self
        }
    }
}

/// No pattern matched at the given offset
///
/// Scanning may continue after this error if the caller moves the cursor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "Could not match input starting at {start_line}:{start_column}, failing at \
     {fail_line}:{fail_column}: \"{}\"",
    .text.escape_ascii()
)]
pub struct UnconsumedInput {
    pub start_tc: usize,
    /// Offset of the byte the automaton failed on, or the input length if it
    /// ran out of input
    pub fail_tc: usize,
    pub start_line: usize,
    pub start_column: usize,
    pub fail_line: usize,
    pub fail_column: usize,
    /// The bytes from `start_tc` up to and including the failing byte
    pub text: Vec<u8>,
}

impl UnconsumedInput {
    pub(crate) fn new(lines: &mut LineTracker, text: &[u8], start_tc: usize, fail_tc: usize) -> Self {
        let (start_line, start_column) = lines.position(text, start_tc);
        let (fail_line, fail_column) = lines.position(text, fail_tc);

        Self {
            start_tc,
            fail_tc,
            start_line,
            start_column,
            fail_line,
            fail_column,
            text: text[start_tc.min(text.len())..(fail_tc + 1).min(text.len())].to_vec(),
        }
    }
}

/// A pattern matched zero bytes of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Pattern {id} matched the empty string at {line}:{column}")]
pub struct EmptyMatchError {
    pub id: usize,
    pub tc: usize,
    pub line: usize,
    pub column: usize,
}

/// Error type returned by lexer actions
pub type ActionError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error(transparent)]
    Unconsumed(#[from] UnconsumedInput),
    #[error(transparent)]
    EmptyMatch(#[from] EmptyMatchError),
    #[error("Lexer action failed")]
    Action(#[source] ActionError),
    #[error("Error reading input")]
    Io(#[from] std::io::Error),
}

/// A resumable longest-match scanner over a borrowed input
///
/// Every call to [`step`](Self::step) takes the cursor to scan from, so the
/// caller is free to rewind or skip ahead between calls.
pub trait Engine<'t> {
    /// Find the longest match starting at `tc`
    ///
    /// Returns `None` once the cursor reaches the end of the input, and
    /// forever after that.  Matches are never empty.
    fn step(&mut self, tc: usize) -> Option<Result<Match<'t>, UnconsumedInput>>;
}

/// Bookkeeping shared by the slice engines for resuming at arbitrary cursors
#[derive(Debug, Default)]
pub(crate) struct Resume {
    finished: bool,
    last_end: Option<usize>,
    pub lines: LineTracker,
}

impl Resume {
    /// Prepare a step starting at `tc`, returning false if scanning is over
    pub fn begin(&mut self, tc: usize, len: usize) -> bool {
        if self.finished {
            return false;
        }

        if let Some(end) = self.last_end.take()
            && end != tc
        {
            if tc < end {
                tracing::trace!(from = end, to = tc, "Cursor rewound");
            } else {
                tracing::trace!(from = end, to = tc, "Cursor skipped ahead");
            }
        }

        if tc >= len {
            self.finished = true;
            return false;
        }

        true
    }

    pub fn accept<'t>(&mut self, text: &'t [u8], id: usize, tc: usize, end: usize) -> Match<'t> {
        debug_assert!(tc < end);
        self.last_end = Some(end);

        let (start_line, start_column) = self.lines.position(text, tc);
        let (end_line, end_column) = self.lines.position(text, end - 1);

        Match {
            id,
            tc,
            start_line,
            start_column,
            end_line,
            end_column,
            bytes: Cow::Borrowed(&text[tc..end]),
        }
    }

    pub fn reject(&mut self, text: &[u8], tc: usize, fail: usize) -> UnconsumedInput {
        UnconsumedInput::new(&mut self.lines, text, tc, fail)
    }
}
