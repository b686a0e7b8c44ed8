//! Compilation of a regular expression into the byte-level DFA the index walks.
//!
//! Patterns are matched against the entire generated string, so the DFA is
//! built anchored. States are minimized before the token index is derived
//! from them, which directly controls the index size.

use regex_automata::dfa::dense::{self, DFA};
use regex_automata::dfa::{Automaton, StartKind};
use regex_automata::util::primitives::StateID;
use regex_automata::Anchored;

use crate::{Error, Result};

/// Compiles `regex` into an anchored, minimized dense DFA and returns it
/// together with its start state.
pub(crate) fn compile(regex: &str) -> Result<(DFA<Vec<u32>>, StateID)> {
    let dfa = dense::Builder::new()
        .configure(
            dense::Config::new()
                .start_kind(StartKind::Anchored)
                .minimize(true),
        )
        .build(regex)
        .map_err(Box::new)?;

    let start_state = dfa
        .universal_start_state(Anchored::Yes)
        .ok_or(Error::NoUniversalStartState)?;
    if dfa.is_dead_state(start_state) {
        return Err(Error::EmptyLanguage);
    }

    Ok((dfa, start_state))
}
