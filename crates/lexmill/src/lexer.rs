//! A lexer built from a list of patterns and the actions run on their matches
//!
//! Patterns are tried all at once.  The longest match wins, and among
//! matches of equal length the pattern added first wins.

use std::fmt;

use crate::{
    dfa::{Dfa, DfaScanner, StreamEngine},
    prog::{GeneratorError, NfaScanner, Program},
    re::{ParseError, Parser, Regex},
    scan::{ActionError, Engine, Match, ScanError, UnconsumedInput},
    source::ByteSource,
};

/// Cursor access handed to lexer actions
///
/// Actions may look at bytes past the end of their match and move the
/// cursor, for instance to skip the body of a block comment in one step.
pub trait Buffer {
    /// The byte at offset `tc`, or `None` if it is out of reach
    fn byte(&mut self, tc: usize) -> Option<u8>;

    /// The offset scanning will resume from, initially the end of the match
    fn tc(&self) -> usize;

    /// Move the offset scanning will resume from
    fn set_tc(&mut self, tc: usize);
}

#[derive(Debug)]
struct SliceBuffer<'t> {
    text: &'t [u8],
    tc: usize,
}

impl Buffer for SliceBuffer<'_> {
    #[inline]
    fn byte(&mut self, tc: usize) -> Option<u8> { self.text.get(tc).copied() }

    #[inline]
    fn tc(&self) -> usize { self.tc }

    #[inline]
    fn set_tc(&mut self, tc: usize) { self.tc = tc; }
}

#[derive(Debug)]
struct StreamBuffer<'s, S>(&'s mut S);

impl<S: ByteSource> Buffer for StreamBuffer<'_, S> {
    fn byte(&mut self, tc: usize) -> Option<u8> {
        let cur = self.0.tc();
        if tc < cur { None } else { self.0.peek(tc - cur) }
    }

    #[inline]
    fn tc(&self) -> usize { self.0.tc() }

    fn set_tc(&mut self, tc: usize) {
        let cur = self.0.tc();
        if tc < cur {
            tracing::warn!(from = cur, to = tc, "Cannot rewind a stream, ignoring");
        } else {
            self.0.advance(tc - cur);
        }
    }
}

/// A callback turning a match into a token
///
/// Returning `Ok(None)` produces no token, and scanning continues with the
/// next match.
pub type Action<T> =
    Box<dyn Fn(&mut dyn Buffer, &Match<'_>) -> Result<Option<T>, ActionError> + Send + Sync>;

/// Which automaton a [`Lexer`] compiles its patterns into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Thompson bytecode run by simulating every thread at once
    Nfa,
    /// A table DFA built from follow sets
    Dfa,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexerOptions {
    pub backend: Backend,
    /// Minimize the DFA after building it.  Ignored by the NFA backend.
    pub minimize: bool,
    /// Trace every parser production while compiling
    pub trace_parse: bool,
}

impl Default for LexerOptions {
    fn default() -> Self {
        Self {
            backend: Backend::Dfa,
            minimize: true,
            trace_parse: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("No patterns were added to the lexer")]
    NoPatterns,
    #[error("Error parsing pattern {index}")]
    Parse {
        index: usize,
        #[source]
        source: ParseError,
    },
    #[error(transparent)]
    Generator(#[from] GeneratorError),
    #[error("Pattern {index} ({pattern:?}) matches the empty string")]
    EmptyPattern { index: usize, pattern: String },
    #[error("The lexer must be compiled before scanning")]
    NotCompiled,
    #[error("Only the DFA backend can scan streams")]
    StreamUnsupported,
}

struct Pattern<T> {
    regex: Vec<u8>,
    action: Action<T>,
}

#[derive(Debug)]
enum Compiled {
    Nfa(Program),
    Dfa(Dfa),
}

/// A set of patterns and actions, compiled into a single automaton
pub struct Lexer<T> {
    patterns: Vec<Pattern<T>>,
    options: LexerOptions,
    compiled: Option<Compiled>,
}

impl<T> fmt::Debug for Lexer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lexer")
            .field(
                "patterns",
                &self
                    .patterns
                    .iter()
                    .map(|p| p.regex.escape_ascii().to_string())
                    .collect::<Vec<_>>(),
            )
            .field("options", &self.options)
            .field("compiled", &self.compiled.is_some())
            .finish_non_exhaustive()
    }
}

impl<T> Default for Lexer<T> {
    #[inline]
    fn default() -> Self { Self::with_options(LexerOptions::default()) }
}

impl<T> Lexer<T> {
    #[must_use]
    #[inline]
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn with_options(options: LexerOptions) -> Self {
        Self {
            patterns: vec![],
            options,
            compiled: None,
        }
    }

    #[must_use]
    #[inline]
    pub fn options(&self) -> LexerOptions { self.options }

    /// Add a pattern, with match ID equal to the number of patterns added
    /// before it
    ///
    /// Any previously compiled automaton is discarded.
    pub fn add<P: Into<Vec<u8>>, F>(&mut self, pattern: P, action: F)
    where F: Fn(&mut dyn Buffer, &Match<'_>) -> Result<Option<T>, ActionError> + Send + Sync + 'static
    {
        self.compiled = None;
        self.patterns.push(Pattern {
            regex: pattern.into(),
            action: Box::new(action),
        });
    }

    #[must_use]
    #[inline]
    pub fn is_compiled(&self) -> bool { self.compiled.is_some() }

    /// The compiled bytecode, if compiled with [`Backend::Nfa`]
    #[must_use]
    pub fn program(&self) -> Option<&Program> {
        match &self.compiled {
            Some(Compiled::Nfa(p)) => Some(p),
            _ => None,
        }
    }

    /// The compiled DFA, if compiled with [`Backend::Dfa`]
    #[must_use]
    pub fn dfa(&self) -> Option<&Dfa> {
        match &self.compiled {
            Some(Compiled::Dfa(d)) => Some(d),
            _ => None,
        }
    }

    /// Parse every pattern and build the automaton for the configured
    /// backend
    ///
    /// Does nothing if the lexer is already compiled.
    ///
    /// # Errors
    /// Fails if there are no patterns, if a pattern does not parse, or if a
    /// pattern matches the empty string on its own.
    pub fn compile(&mut self) -> Result<(), CompileError> {
        if self.patterns.is_empty() {
            return Err(CompileError::NoPatterns);
        }

        if self.compiled.is_some() {
            return Ok(());
        }

        let LexerOptions {
            backend,
            minimize,
            trace_parse,
        } = self.options;

        let mut patterns = Vec::with_capacity(self.patterns.len());
        for (index, pat) in self.patterns.iter().enumerate() {
            let re = Parser::new(&pat.regex)
                .with_trace(trace_parse)
                .parse()
                .map_err(|source| CompileError::Parse { index, source })?;

            let empty = match backend {
                Backend::Nfa => Program::compile(re.clone())?.matches_empty(),
                Backend::Dfa => Dfa::compile(re.clone()).matches_empty(),
            };
            if empty {
                return Err(CompileError::EmptyPattern {
                    index,
                    pattern: String::from_utf8_lossy(&pat.regex).into_owned(),
                });
            }

            patterns.push(re.pattern());
        }

        tracing::debug!(patterns = patterns.len(), ?backend, "Compiling lexer");
        let re = Regex::alt_matches(patterns).ok_or(CompileError::NoPatterns)?;

        self.compiled = Some(match backend {
            Backend::Nfa => {
                let prog = Program::compile(re)?;
                tracing::debug!(insts = prog.len(), "Compiled lexer program");
                Compiled::Nfa(prog)
            },
            Backend::Dfa => {
                let dfa = Dfa::compile(re);
                let before = dfa.state_count();
                let dfa = if minimize { dfa.minimize() } else { dfa };
                tracing::debug!(before, after = dfa.state_count(), "Compiled lexer DFA");
                Compiled::Dfa(dfa)
            },
        });

        Ok(())
    }

    /// Bind the compiled lexer to an input
    ///
    /// # Errors
    /// Returns [`CompileError::NotCompiled`] if [`compile`](Self::compile)
    /// has not succeeded since the last pattern was added.
    pub fn scanner<'l, 't>(&'l self, text: &'t [u8]) -> Result<Scanner<'l, 't, T>, CompileError> {
        let engine = match self.compiled.as_ref().ok_or(CompileError::NotCompiled)? {
            Compiled::Nfa(p) => SliceEngine::Nfa(p.scanner(text)),
            Compiled::Dfa(d) => SliceEngine::Dfa(d.scanner(text)),
        };

        Ok(Scanner {
            lexer: self,
            engine,
            text,
            tc: 0,
        })
    }

    /// Bind the compiled lexer to a forward-only byte source
    ///
    /// # Errors
    /// Returns [`CompileError::NotCompiled`] if the lexer is not compiled,
    /// or [`CompileError::StreamUnsupported`] if it was compiled with
    /// [`Backend::Nfa`].
    pub fn stream_scanner<S: ByteSource>(&self, source: S) -> Result<StreamScanner<'_, S, T>, CompileError> {
        match self.compiled.as_ref().ok_or(CompileError::NotCompiled)? {
            Compiled::Dfa(d) => Ok(StreamScanner {
                lexer: self,
                engine: StreamEngine::new(d, source),
            }),
            Compiled::Nfa(_) => Err(CompileError::StreamUnsupported),
        }
    }

    /// Run the action for a match, returning the token it produced
    fn act(&self, buf: &mut dyn Buffer, m: &Match<'_>) -> Result<Option<T>, ScanError> {
        (self.patterns[m.id].action)(buf, m).map_err(ScanError::Action)
    }
}

#[derive(Debug)]
enum SliceEngine<'l, 't> {
    Nfa(NfaScanner<'l, 't>),
    Dfa(DfaScanner<'l, 't>),
}

impl<'t> Engine<'t> for SliceEngine<'_, 't> {
    fn step(&mut self, tc: usize) -> Option<Result<Match<'t>, UnconsumedInput>> {
        match self {
            Self::Nfa(s) => s.step(tc),
            Self::Dfa(s) => s.step(tc),
        }
    }
}

/// An iterator over the tokens of an input held in memory
///
/// After an [`UnconsumedInput`] error the cursor stays where it was, so the
/// same error is returned again unless the caller moves the cursor with
/// [`set_tc`](Self::set_tc) or [`skip_bytes`](Self::skip_bytes).
pub struct Scanner<'l, 't, T> {
    lexer: &'l Lexer<T>,
    engine: SliceEngine<'l, 't>,
    text: &'t [u8],
    tc: usize,
}

impl<T> fmt::Debug for Scanner<'_, '_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scanner")
            .field("lexer", self.lexer)
            .field("engine", &self.engine)
            .field("tc", &self.tc)
            .finish_non_exhaustive()
    }
}

impl<'t, T> Scanner<'_, 't, T> {
    #[must_use]
    #[inline]
    pub fn text(&self) -> &'t [u8] { self.text }

    /// The offset the next match will start from
    #[must_use]
    #[inline]
    pub fn tc(&self) -> usize { self.tc }

    #[inline]
    pub fn set_tc(&mut self, tc: usize) { self.tc = tc; }

    #[inline]
    pub fn skip_bytes(&mut self, n: usize) { self.tc = self.tc.saturating_add(n); }
}

impl<T> Iterator for Scanner<'_, '_, T> {
    type Item = Result<T, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let m = match self.engine.step(self.tc)? {
                Ok(m) => m,
                Err(e) => return Some(Err(e.into())),
            };

            let mut buf = SliceBuffer {
                text: self.text,
                tc: m.end(),
            };
            let tok = self.lexer.act(&mut buf, &m);
            self.tc = buf.tc;

            match tok {
                Ok(None) => (),
                res => return res.transpose(),
            }
        }
    }
}

/// An iterator over the tokens of a [`ByteSource`]
///
/// Actions may move the cursor forward but not back.
pub struct StreamScanner<'l, S, T> {
    lexer: &'l Lexer<T>,
    engine: StreamEngine<'l, S>,
}

impl<S: fmt::Debug, T> fmt::Debug for StreamScanner<'_, S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamScanner")
            .field("lexer", self.lexer)
            .field("engine", &self.engine)
            .finish()
    }
}

impl<S: ByteSource, T> StreamScanner<'_, S, T> {
    #[inline]
    pub fn source(&self) -> &S { self.engine.source() }

    /// Discard `n` bytes at the cursor, e.g. to recover from unconsumed input
    #[inline]
    pub fn skip_bytes(&mut self, n: usize) { self.engine.skip_bytes(n); }
}

impl<S: ByteSource, T> Iterator for StreamScanner<'_, S, T> {
    type Item = Result<T, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let m = match self.engine.step()? {
                Ok(m) => m,
                Err(e) => return Some(Err(e)),
            };

            match self.lexer.act(&mut StreamBuffer(self.engine.source_mut()), &m) {
                Ok(None) => (),
                res => return res.transpose(),
            }
        }
    }
}

/// A general-purpose token type for actions to produce
///
/// Equality ignores `value`.
#[derive(Debug, Clone)]
pub struct Token<V> {
    pub ty: usize,
    pub value: V,
    pub lexeme: Vec<u8>,
    pub tc: usize,
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl<V> Token<V> {
    /// Build a token covering a match
    #[must_use]
    pub fn new(ty: usize, value: V, m: &Match<'_>) -> Self {
        Self {
            ty,
            value,
            lexeme: m.bytes.to_vec(),
            tc: m.tc,
            start_line: m.start_line,
            start_column: m.start_column,
            end_line: m.end_line,
            end_column: m.end_column,
        }
    }
}

impl<V> PartialEq for Token<V> {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty
            && self.lexeme == other.lexeme
            && self.tc == other.tc
            && self.start_line == other.start_line
            && self.start_column == other.start_column
            && self.end_line == other.end_line
            && self.end_column == other.end_column
    }
}

impl<V> Eq for Token<V> {}

impl<V: fmt::Display> fmt::Display for Token<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} ({}, {})-({}, {})",
            self.ty,
            self.value,
            self.tc,
            self.start_line,
            self.start_column,
            self.end_line,
            self.end_column
        )
    }
}
