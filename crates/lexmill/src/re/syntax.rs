//! Recursive-descent parser for the pattern syntax
//!
//! ```text
//! regex       := alternation EOF
//! alternation := atomic_ops ('|' alternation)?
//! atomic_ops  := atomic_op+
//! atomic_op   := atomic ('*' | '+' | '?')*
//! atomic      := char | '(' alternation ')'
//! char        := BYTE | '\' BYTE | '.' | class
//! class       := '[' '^'? class_item+ ']'
//! class_item  := class_byte ('-' class_byte)?
//! ```

use std::fmt;

use super::Regex;
use crate::{range_set::RangeSet, scan::line_col};

/// A failure to parse a pattern, with the chain of productions that were
/// being parsed when it occurred
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "Regex parse error in {production} at index {offset} (line {line}, column {column}): \
     {reason}{}",
    CausedBy(.cause.as_deref())
)]
pub struct ParseError {
    production: &'static str,
    offset: usize,
    line: usize,
    column: usize,
    reason: String,
    #[source]
    cause: Option<Box<ParseError>>,
}

/// Renders the rest of a cause chain after the outermost message
struct CausedBy<'a>(Option<&'a ParseError>);

impl fmt::Display for CausedBy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(cause) => write!(f, "\n  caused by: {cause}"),
            None => Ok(()),
        }
    }
}

impl ParseError {
    fn new(text: &[u8], production: &'static str, offset: usize, reason: impl Into<String>) -> Self {
        let (line, column) = line_col(text, offset);

        Self {
            production,
            offset,
            line,
            column,
            reason: reason.into(),
            cause: None,
        }
    }

    fn caused_by(self, cause: ParseError) -> Self {
        Self {
            cause: Some(cause.into()),
            ..self
        }
    }

    #[must_use]
    #[inline]
    pub fn production(&self) -> &'static str { self.production }

    /// Byte offset into the pattern where the failing production started
    #[must_use]
    #[inline]
    pub fn offset(&self) -> usize { self.offset }

    #[must_use]
    #[inline]
    pub fn line(&self) -> usize { self.line }

    #[must_use]
    #[inline]
    pub fn column(&self) -> usize { self.column }

    #[must_use]
    #[inline]
    pub fn reason(&self) -> &str { &self.reason }

    #[must_use]
    #[inline]
    pub fn cause(&self) -> Option<&ParseError> { self.cause.as_deref() }

    /// Every error in the cause chain, most specific first, ending with
    /// `self`
    #[must_use]
    pub fn chain(&self) -> Vec<&ParseError> {
        let mut out: Vec<_> = std::iter::successors(Some(self), |e| e.cause()).collect();
        out.reverse();
        out
    }

    /// The most specific error in the cause chain
    #[must_use]
    pub fn root_cause(&self) -> &ParseError {
        let mut err = self;
        while let Some(cause) = err.cause() {
            err = cause;
        }
        err
    }
}

enum Escape {
    Byte(u8),
    Class(RangeSet),
}

fn digit() -> RangeSet { [(b'0', b'9')].into_iter().collect() }

fn space() -> RangeSet { [(b'\t', b'\r'), (b' ', b' ')].into_iter().collect() }

fn word() -> RangeSet {
    [(b'0', b'9'), (b'A', b'Z'), (b'_', b'_'), (b'a', b'z')]
        .into_iter()
        .collect()
}

/// Parses a single pattern into a [`Regex`] terminated by
/// [`Regex::Eos`](super::Regex::Eos)
#[derive(Debug, Clone, Copy)]
pub struct Parser<'a> {
    text: &'a [u8],
    trace: bool,
}

/// Parse a single pattern with tracing disabled
///
/// # Errors
/// Returns an error if the pattern is not well-formed.
#[inline]
pub fn parse(text: &[u8]) -> Result<Regex, ParseError> { Parser::new(text).parse() }

impl<'a> Parser<'a> {
    #[must_use]
    #[inline]
    pub fn new(text: &'a [u8]) -> Self { Self { text, trace: false } }

    /// Emit a trace event on entry to every production
    #[must_use]
    #[inline]
    pub fn with_trace(self, trace: bool) -> Self { Self { trace, ..self } }

    /// Parse the pattern, wrapping it with [`Regex::pattern`]
    ///
    /// # Errors
    /// Returns an error if the pattern is not well-formed.
    pub fn parse(self) -> Result<Regex, ParseError> {
        let mut cursor = Cursor {
            text: self.text,
            pos: 0,
            trace: self.trace,
        };

        cursor.regex()
    }
}

struct Cursor<'a> {
    text: &'a [u8],
    pos: usize,
    trace: bool,
}

impl Cursor<'_> {
    fn enter(&self, production: &'static str) {
        if self.trace {
            tracing::trace!(
                production,
                offset = self.pos,
                rest = %self.text[self.pos..].escape_ascii(),
                "Entering production"
            );
        }
    }

    #[inline]
    fn peek(&self) -> Option<u8> { self.text.get(self.pos).copied() }

    fn eat(&mut self, byte: u8) -> bool {
        let hit = self.peek() == Some(byte);
        if hit {
            self.pos += 1;
        }
        hit
    }

    #[inline]
    fn error(&self, production: &'static str, offset: usize, reason: impl Into<String>) -> ParseError {
        ParseError::new(self.text, production, offset, reason)
    }

    fn regex(&mut self) -> Result<Regex, ParseError> {
        self.enter("regex");

        let body = self
            .alternation()
            .map_err(|e| self.error("regex", 0, "Invalid pattern").caused_by(e))?;

        if let Some(c) = self.peek() {
            let reason = if c == b')' {
                "Unconsumed input after unmatched ')'".to_owned()
            } else {
                format!("Unconsumed input starting with '{}'", c.escape_ascii())
            };

            return Err(self.error("regex", self.pos, reason));
        }

        Ok(body.pattern())
    }

    fn alternation(&mut self) -> Result<Regex, ParseError> {
        self.enter("alternation");

        let lhs = self.atomic_ops()?;

        if self.eat(b'|') {
            let rhs = self.alternation()?;
            Ok(Regex::alt(lhs, rhs))
        } else {
            Ok(lhs)
        }
    }

    fn atomic_ops(&mut self) -> Result<Regex, ParseError> {
        self.enter("atomic_ops");

        let start = self.pos;
        let mut items = vec![];

        while let Some(c) = self.peek()
            && c != b'|'
            && c != b')'
        {
            items.push(self.atomic_op()?);
        }

        match items.len() {
            0 => Err(self.error("atomic_ops", start, "Expected an expression")),
            1 => Ok(items.pop().unwrap_or_else(|| unreachable!())),
            _ => Ok(Regex::Cat(items)),
        }
    }

    fn atomic_op(&mut self) -> Result<Regex, ParseError> {
        self.enter("atomic_op");

        let mut re = self.atomic()?;

        loop {
            re = match self.peek() {
                Some(b'*') => re.star(),
                Some(b'+') => re.plus(),
                Some(b'?') => re.maybe(),
                _ => break Ok(re),
            };
            self.pos += 1;
        }
    }

    fn atomic(&mut self) -> Result<Regex, ParseError> {
        self.enter("atomic");

        if self.peek() == Some(b'(') {
            self.group()
        } else {
            self.char()
        }
    }

    fn group(&mut self) -> Result<Regex, ParseError> {
        self.enter("group");

        let start = self.pos;
        self.pos += 1;

        let inner = self
            .alternation()
            .map_err(|e| self.error("group", start, "Invalid group").caused_by(e))?;

        if self.eat(b')') {
            Ok(inner)
        } else {
            Err(self.error("group", start, "Unclosed parenthesis"))
        }
    }

    fn char(&mut self) -> Result<Regex, ParseError> {
        self.enter("char");

        let start = self.pos;
        match self.peek() {
            None => Err(self.error("char", start, "Unexpected end of pattern")),
            Some(b'[') => self.class(),
            Some(b'.') => {
                self.pos += 1;
                Ok(Regex::ANY)
            },
            Some(b'\\') => match self.escape()? {
                Escape::Byte(b) => Ok(Regex::Char(b)),
                Escape::Class(set) => Regex::class(set)
                    .ok_or_else(|| self.error("char", start, "Escape matches no bytes")),
            },
            Some(c @ (b'|' | b'+' | b'*' | b'?' | b'(' | b')' | b']' | b'^')) => Err(
                self.error("char", start, format!("Unexpected operator '{}'", c.escape_ascii())),
            ),
            Some(c) => {
                self.pos += 1;
                Ok(Regex::Char(c))
            },
        }
    }

    fn escape(&mut self) -> Result<Escape, ParseError> {
        self.enter("escape");

        let start = self.pos;
        self.pos += 1;

        let Some(c) = self.peek() else {
            return Err(self.error("escape", start, "Dangling backslash"));
        };
        self.pos += 1;

        Ok(match c {
            b'n' => Escape::Byte(b'\n'),
            b'r' => Escape::Byte(b'\r'),
            b't' => Escape::Byte(b'\t'),
            b'd' => Escape::Class(digit()),
            b'D' => Escape::Class(digit().inverted()),
            b's' => Escape::Class(space()),
            b'S' => Escape::Class(space().inverted()),
            b'w' => Escape::Class(word()),
            b'W' => Escape::Class(word().inverted()),
            c => Escape::Byte(c),
        })
    }

    fn class(&mut self) -> Result<Regex, ParseError> {
        self.enter("class");

        let start = self.pos;
        self.pos += 1;

        let negate = self.eat(b'^');
        let mut set = RangeSet::EMPTY;

        loop {
            self.class_item(&mut set)
                .map_err(|e| self.error("class", start, "Invalid character class").caused_by(e))?;

            match self.peek() {
                Some(b']') => {
                    self.pos += 1;
                    break;
                },
                Some(_) => (),
                None => return Err(self.error("class", start, "Unterminated character class")),
            }
        }

        if negate {
            set.invert();
        }

        Regex::class(set).ok_or_else(|| self.error("class", start, "Character class matches no bytes"))
    }

    fn class_item(&mut self, set: &mut RangeSet) -> Result<(), ParseError> {
        self.enter("class_item");

        let start = self.pos;
        let lo = match self.class_byte()? {
            Escape::Byte(b) => b,
            Escape::Class(c) => {
                set.union(&c);
                return Ok(());
            },
        };

        if self.peek() == Some(b'-') && self.text.get(self.pos + 1).is_some_and(|&c| c != b']') {
            self.pos += 1;

            let Escape::Byte(hi) = self.class_byte()? else {
                return Err(self.error("class_item", start, "Shorthand class used as a range bound"));
            };

            set.insert(lo, hi);
        } else {
            set.insert(lo, lo);
        }

        Ok(())
    }

    fn class_byte(&mut self) -> Result<Escape, ParseError> {
        match self.peek() {
            None => Err(self.error("class_item", self.pos, "Unterminated character class")),
            Some(b'\\') => self.escape(),
            Some(c) => {
                self.pos += 1;
                Ok(Escape::Byte(c))
            },
        }
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::parse;
    use crate::{
        range_set::RangeSet,
        re::{self, Regex},
    };

    fn assert_parse_eq(expected: Regex, s: &str) {
        assert_eq!(parse(s.as_bytes()).unwrap(), expected.pattern(), "parsing {s:?}");
    }

    fn c(b: u8) -> Regex { Regex::Char(b) }

    fn class(ranges: &[(u8, u8)]) -> Regex { Regex::class(ranges.iter().copied().collect()).unwrap() }

    #[test]
    fn postfix_chain() {
        assert_parse_eq(c(b'a').maybe().plus().star(), "a?+*");
        assert_parse_eq(Regex::Cat(vec![c(b'a'), c(b'b').plus()]), "ab+");
    }

    #[test]
    fn alternation_nests_right() {
        assert_parse_eq(
            Regex::alt(c(b'a'), Regex::alt(Regex::lit(b"cd"), c(b'e'))),
            "a|cd|e",
        );
        assert_parse_eq(
            Regex::Cat(vec![Regex::alt(c(b'a'), c(b'b')).star(), Regex::lit(b"xyz")]).star(),
            "((a|b)*(xyz))*",
        );
    }

    #[test]
    fn wildcard_and_escapes() {
        assert_parse_eq(Regex::ANY, ".");
        assert_parse_eq(Regex::Cat(vec![c(b'\n'), c(b'\t'), c(b'\r')]), r"\n\t\r");
        assert_parse_eq(Regex::Cat(vec![c(b'.'), c(b'*'), c(b'\\')]), r"\.\*\\");
        assert_parse_eq(Regex::Range(b'0', b'9'), r"\d");
        assert_parse_eq(class(&[(0, b'0' - 1), (b'9' + 1, 255)]), r"\D");
        assert_parse_eq(class(&[(b'\t', b'\r'), (b' ', b' ')]), r"\s");
        assert_parse_eq(
            class(&[(b'0', b'9'), (b'A', b'Z'), (b'_', b'_'), (b'a', b'z')]),
            r"\w",
        );
    }

    #[test]
    fn classes() {
        assert_parse_eq(class(&[(b'a', b'c'), (b'x', b'x')]), "[a-cx]");
        assert_parse_eq(Regex::Range(b'a', b'z'), "[a-mb-z]");
        assert_parse_eq(Regex::Range(b'a', b'f'), "[f-a]");
        assert_parse_eq(class(&[(b'+', b'+'), (b'-', b'-')]), "[+-]");
        assert_parse_eq(class(&[(b'0', b'9'), (b'_', b'_')]), r"[\d_]");
        assert_parse_eq(c(b']'), "[]]");
        assert_parse_eq(
            Regex::Cat(vec![
                class(&[(b'A', b'Z'), (b'_', b'_'), (b'a', b'z')]),
                class(&[(b'0', b'9'), (b'A', b'Z'), (b'_', b'_'), (b'a', b'z')]).star(),
            ]),
            "[A-Za-z_][A-Za-z0-9_]*",
        );
    }

    #[test]
    fn negated_class() {
        let expected: RangeSet = [(b'a', b'd')].into_iter().collect();
        assert_parse_eq(Regex::class(expected.inverted()).unwrap(), "[^abcd]");
        assert_eq!(parse(b"[^\x00]").unwrap(), Regex::Range(1, 255).pattern());
    }

    #[test]
    fn errors() {
        fn err(s: &str) -> super::ParseError { parse(s.as_bytes()).unwrap_err() }

        let e = err("(ab");
        assert_eq!((e.production(), e.offset()), ("regex", 0));
        let root = e.root_cause();
        assert_eq!((root.production(), root.offset()), ("group", 0));
        assert_eq!(root.reason(), "Unclosed parenthesis");

        let e = err("ab)c");
        assert_eq!((e.production(), e.offset()), ("regex", 2));

        assert_eq!(err("").root_cause().production(), "atomic_ops");
        assert_eq!(err("a||b").root_cause().offset(), 2);
        assert_eq!(err("a|").root_cause().production(), "atomic_ops");
        assert_eq!(err("*a").root_cause().production(), "char");
        assert_eq!(err("ab\\").root_cause().production(), "escape");
        assert_eq!(err("[abc").root_cause().production(), "class");
        assert_eq!(err("[a-").root_cause().production(), "class");
        assert_eq!(err(r"[a-\d]").root_cause().production(), "class_item");
        let e = parse(b"[^\x00-\xff]").unwrap_err();
        assert_eq!(e.root_cause().reason(), "Character class matches no bytes");

        let e = err("ab\n(c");
        let root = e.root_cause();
        assert_eq!((root.offset(), root.line(), root.column()), (3, 2, 1));

        let chain = e.chain();
        assert_eq!(chain.first().unwrap().production(), "group");
        assert_eq!(chain.last().unwrap().production(), "regex");
        assert!(e.to_string().contains("caused by"));
    }

    #[test]
    fn error_source_chain() {
        use std::error::Error;

        let e = parse(b"ab\n(c").unwrap_err();
        let source = e.source().unwrap();
        assert_eq!(Some(source.to_string()), e.cause().map(ToString::to_string));
        assert_eq!(e.cause().unwrap().production(), "group");
        assert!(source.source().is_none());

        assert_eq!(
            e.to_string(),
            "Regex parse error in regex at index 0 (line 1, column 1): Invalid pattern\n  caused by: \
             Regex parse error in group at index 3 (line 2, column 1): Unclosed parenthesis"
        );
    }

    fn stringify(re: &Regex, s: &mut String) {
        match re {
            Regex::Char(c) => s.push(char::from(*c)),
            Regex::Range(lo, hi) => {
                s.push('[');
                s.push(char::from(*lo));
                s.push('-');
                s.push(char::from(*hi));
                s.push(']');
            },
            Regex::Cat(v) => {
                for r in v {
                    s.push('(');
                    stringify(r, s);
                    s.push(')');
                }
            },
            Regex::Alt(a, b) => {
                s.push('(');
                stringify(a, s);
                s.push_str(")|(");
                stringify(b, s);
                s.push(')');
            },
            Regex::Star(r) | Regex::Plus(r) | Regex::Maybe(r) => {
                s.push('(');
                stringify(r, s);
                s.push(')');
                s.push(match re {
                    Regex::Star(_) => '*',
                    Regex::Plus(_) => '+',
                    _ => '?',
                });
            },
            r => unreachable!("{r:?} is not generated"),
        }
    }

    fn collapse(re: Regex) -> Regex {
        match re {
            Regex::Cat(mut v) if v.len() == 1 => collapse(v.pop().unwrap()),
            Regex::Cat(v) => Regex::Cat(v.into_iter().map(collapse).collect()),
            Regex::Alt(a, b) => Regex::alt(collapse(*a), collapse(*b)),
            Regex::Star(r) => collapse(*r).star(),
            Regex::Plus(r) => collapse(*r).plus(),
            Regex::Maybe(r) => collapse(*r).maybe(),
            r => r,
        }
    }

    proptest! {
        #[test]
        fn never_panics(s in prop::collection::vec(any::<u8>(), 0..32)) {
            let _ = parse(&s);
        }

        #[test]
        fn stringify_round_trip(r in re::prop::re(6, 32, 4, b'a'..=b'c')) {
            let mut s = String::new();
            stringify(&r, &mut s);

            prop_assert_eq!(parse(s.as_bytes()).unwrap(), collapse(r).pattern());
        }
    }
}
