//! Compile a set of patterns into a lexer, then print its automaton or scan
//! standard input with it

#![deny(
    clippy::disallowed_methods,
    clippy::suspicious,
    clippy::style,
    clippy::clone_on_ref_ptr,
    missing_debug_implementations,
    missing_copy_implementations
)]
#![warn(clippy::pedantic, missing_docs)]
#![allow(clippy::module_name_repetitions)]

fn main() { entry::main(); }

mod entry {
    use std::io::{self, prelude::*};

    use anyhow::{Context, Result};
    use clap::Parser;
    use lexmill::{
        Backend, Lexer, LexerOptions, Match, ScanError,
        lexer::Buffer,
        source::ReaderSource,
    };
    use tracing_subscriber::{filter::LevelFilter, prelude::*};

    #[derive(Debug, Parser)]
    #[command(version, author, about)]
    struct Opts {
        /// Print more verbose logs
        #[arg(short, long, action = clap::ArgAction::Count)]
        verbose: u8,

        /// A pattern to add to the lexer, in order of priority
        #[arg(short, long = "pattern", required = true)]
        patterns: Vec<String>,

        /// What to print
        #[arg(short, long, default_value = "dfa")]
        format: Format,

        /// Skip DFA minimization
        #[arg(long)]
        no_minimize: bool,

        /// Trace the parser's productions
        #[arg(long)]
        trace_parse: bool,

        /// Scan standard input and print every match instead of the automaton
        #[arg(long)]
        scan: bool,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
    enum Format {
        /// Thompson bytecode listing
        Nfa,
        /// Thompson bytecode in its serialized text form
        NfaText,
        /// Bytecode after subset construction, serialized
        DfaProgram,
        /// Bytecode control flow as a Graphviz document
        NfaDot,
        /// DFA transition table
        Dfa,
        /// DFA as a Graphviz document
        Dot,
    }

    impl Format {
        fn backend(self) -> Backend {
            match self {
                Self::Nfa | Self::NfaText | Self::DfaProgram | Self::NfaDot => Backend::Nfa,
                Self::Dfa | Self::Dot => Backend::Dfa,
            }
        }
    }

    #[inline]
    pub fn main() {
        let opts = Opts::parse();

        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(io::stderr)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(match (cfg!(debug_assertions), opts.verbose) {
                (false, 0) => LevelFilter::INFO,
                (false, 1) | (true, 0) => LevelFilter::DEBUG,
                _ => LevelFilter::TRACE,
            })
            .init();

        tracing::debug!("{opts:#?}");

        std::process::exit(run(opts).map_or_else(
            |e| {
                tracing::error!("{e:?}");
                1
            },
            |()| 0,
        ));
    }

    fn own(_: &mut dyn Buffer, m: &Match<'_>) -> Result<Option<Match<'static>>, lexmill::scan::ActionError> {
        Ok(Some(m.clone().into_owned()))
    }

    #[inline]
    fn run(
        Opts {
            verbose: _,
            patterns,
            format,
            no_minimize,
            trace_parse,
            scan,
        }: Opts,
    ) -> Result<()> {
        let mut lexer = Lexer::with_options(LexerOptions {
            backend: format.backend(),
            minimize: !no_minimize,
            trace_parse,
        });

        for pat in patterns {
            lexer.add(pat, own);
        }

        lexer.compile().context("Error compiling lexer")?;

        if scan {
            return scan_stdin(&lexer);
        }

        let out = match (format, lexer.program(), lexer.dfa()) {
            (Format::Nfa, Some(p), _) => p.to_string(),
            (Format::NfaText, Some(p), _) => p.serialize(),
            (Format::DfaProgram, Some(p), _) => p.to_dfa().serialize(),
            (Format::NfaDot, Some(p), _) => p.dot().to_string(),
            (Format::Dfa, _, Some(d)) => d.to_string(),
            (Format::Dot, _, Some(d)) => d.dot().to_string(),
            _ => unreachable!(),
        };

        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", out.trim_end()).context("Error writing output")
    }

    fn print_match(out: &mut impl Write, m: &Match<'_>) -> io::Result<()> {
        writeln!(
            out,
            "{} {} ({}, {})-({}, {}) \"{}\"",
            m.id,
            m.tc,
            m.start_line,
            m.start_column,
            m.end_line,
            m.end_column,
            m.bytes.escape_ascii(),
        )
    }

    fn scan_stdin(lexer: &Lexer<Match<'static>>) -> Result<()> {
        let mut stdout = io::stdout().lock();
        let mut errors = 0_usize;

        if lexer.dfa().is_some() {
            let mut scan = lexer.stream_scanner(ReaderSource::new(io::stdin().lock()))?;
            while let Some(res) = scan.next() {
                match res {
                    Ok(m) => print_match(&mut stdout, &m).context("Error writing output")?,
                    Err(ScanError::Unconsumed(e)) => {
                        tracing::warn!("{e}");
                        errors += 1;
                        scan.skip_bytes(1);
                    },
                    Err(e) => return Err(e).context("Error scanning input"),
                }
            }
        } else {
            let mut text = vec![];
            io::stdin()
                .read_to_end(&mut text)
                .context("Error reading input")?;

            let mut scan = lexer.scanner(&text)?;
            while let Some(res) = scan.next() {
                match res {
                    Ok(m) => print_match(&mut stdout, &m).context("Error writing output")?,
                    Err(ScanError::Unconsumed(e)) => {
                        tracing::warn!("{e}");
                        errors += 1;
                        scan.set_tc(e.start_tc + 1);
                    },
                    Err(e) => return Err(e).context("Error scanning input"),
                }
            }
        }

        if errors > 0 {
            anyhow::bail!("{errors} region(s) of input could not be scanned");
        }

        Ok(())
    }
}
