use arbitrary::Arbitrary;
use lexmill::{
    dfa::Dfa,
    prog::{DfaProgramScanner, Program},
    re::{Parser, Regex},
    scan::Engine,
};

/// A handful of patterns and an input to scan with them
#[derive(Debug, Arbitrary)]
pub struct Case {
    pub patterns: Vec<Vec<u8>>,
    pub input: Vec<u8>,
}

type Outcome = Result<(usize, usize, usize), (usize, usize)>;

fn outcomes<'t>(mut engine: impl Engine<'t>, len: usize) -> Vec<Outcome> {
    let mut out = vec![];
    let mut tc = 0;
    while tc < len {
        match engine.step(tc) {
            Some(Ok(m)) => {
                out.push(Ok((m.id, m.tc, m.end())));
                tc = m.end();
            },
            Some(Err(e)) => {
                out.push(Err((e.start_tc, e.fail_tc)));
                tc = e.start_tc + 1;
            },
            None => break,
        }
    }
    out
}

/// Scan the input with every engine and panic if any two disagree
pub fn run_differential(Case { patterns, input }: Case) {
    let patterns: Vec<_> = patterns
        .iter()
        .take(8)
        .filter_map(|p| Parser::new(p).parse().ok())
        .map(Regex::pattern)
        .collect();
    let Some(re) = Regex::alt_matches(patterns) else {
        return;
    };

    let prog = Program::compile(re.clone()).unwrap();
    let prog_dfa = prog.to_dfa();
    let dfa = Dfa::compile(re);
    let min = dfa.clone().minimize();

    let expected = outcomes(prog.scanner(&input), input.len());
    assert_eq!(outcomes(dfa.scanner(&input), input.len()), expected);
    assert_eq!(outcomes(min.scanner(&input), input.len()), expected);
    assert_eq!(
        outcomes(DfaProgramScanner::new(&prog_dfa, &input), input.len()),
        expected
    );
    assert_eq!(outcomes(prog_dfa.scanner(&input), input.len()), expected);
    assert_eq!(prog_dfa.serialize().parse::<Program>().unwrap(), prog_dfa);
}
