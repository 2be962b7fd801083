use super::Regex;

/// Rewrite every [`Regex::Class`] node into a right-nested binary
/// [`Regex::Alt`] of `Char`/`Range` leaves
///
/// Single ranges, including the `.` wildcard, are already leaves and are left
/// as they are.  The rewrite is idempotent.
#[must_use]
pub fn desugar(re: Regex) -> Regex {
    match re {
        Regex::Class(set) => set
            .ranges()
            .rev()
            .map(|(lo, hi)| Regex::range(lo, hi))
            .reduce(|rhs, lhs| Regex::alt(lhs, rhs))
            .unwrap_or_else(|| unreachable!("ClassSet is never empty")),
        Regex::Char(_) | Regex::Range(..) | Regex::Eos => re,
        Regex::Cat(v) => Regex::Cat(v.into_iter().map(desugar).collect()),
        Regex::Alt(a, b) => Regex::alt(desugar(*a), desugar(*b)),
        Regex::AltMatch(a, b) => Regex::alt_match(desugar(*a), desugar(*b)),
        Regex::Star(r) => desugar(*r).star(),
        Regex::Plus(r) => desugar(*r).plus(),
        Regex::Maybe(r) => desugar(*r).maybe(),
        Regex::Match(r) => Regex::Match(desugar(*r).into()),
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::desugar;
    use crate::re::{Regex, parse};

    #[test]
    fn class_to_alternation() {
        let re = parse(b"[a-cxz]").unwrap();

        assert_eq!(
            desugar(re),
            Regex::alt(
                Regex::Range(b'a', b'c'),
                Regex::alt(Regex::Char(b'x'), Regex::Char(b'z'))
            )
            .pattern()
        );
    }

    #[test]
    fn wildcard_untouched() {
        let re = parse(b".*").unwrap();
        assert_eq!(desugar(re.clone()), re);
    }

    fn has_class(re: &Regex) -> bool {
        match re {
            Regex::Class(_) => true,
            Regex::Char(_) | Regex::Range(..) | Regex::Eos => false,
            Regex::Cat(v) => v.iter().any(has_class),
            Regex::Alt(a, b) | Regex::AltMatch(a, b) => has_class(a) || has_class(b),
            Regex::Star(r) | Regex::Plus(r) | Regex::Maybe(r) | Regex::Match(r) => has_class(r),
        }
    }

    proptest! {
        #[test]
        fn idempotent(s in "[a-d\\[\\]^\\-|*()\\\\dws.]{1,12}") {
            let Ok(re) = parse(s.as_bytes()) else { return Ok(()) };
            let once = desugar(re.clone());

            prop_assert!(!has_class(&once));
            prop_assert_eq!(once.nullable(), re.nullable());
            prop_assert_eq!(desugar(once.clone()), once);
        }
    }
}
