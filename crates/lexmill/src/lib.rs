//! Compiler from sets of regular expressions to maximal-munch lexers
//!
//! Patterns are parsed into a [`Regex`](re::Regex) tree and lowered along one
//! of two paths: a Thompson construction into NFA bytecode ([`prog`]), or a
//! direct follow-set construction into a minimized table DFA ([`dfa`]).  The
//! [`lexer`] module ties the two together behind a token-producing scanner.

#![deny(
    clippy::disallowed_methods,
    clippy::suspicious,
    clippy::style,
    clippy::clone_on_ref_ptr,
    missing_debug_implementations,
    missing_copy_implementations
)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod dfa;
pub mod dot;
pub mod lexer;
pub mod prog;
pub mod range_set;
pub mod re;
pub mod scan;
pub mod source;

pub use lexer::{Backend, CompileError, Lexer, LexerOptions, Token};
pub use scan::{Match, ScanError};
