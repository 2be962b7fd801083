use lexmill::re::{Parser, desugar};

fn main() {
    afl::fuzz!(|data: &[u8]| {
        if let Ok(re) = Parser::new(data).parse() {
            let _ = desugar(re);
        }
    });
}
