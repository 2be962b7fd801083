use fuzz_lexmill::{Case, run_differential};

fn main() {
    afl::fuzz!(|case: Case| {
        run_differential(case);
    });
}
