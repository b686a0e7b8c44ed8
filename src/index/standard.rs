//! Eager construction of the token-transition table.

use bincode::{Decode, Encode};
use rayon::prelude::*;
use regex_automata::dfa::dense::DFA;
use regex_automata::dfa::Automaton;
use regex_automata::util::primitives::StateID as DfaStateId;
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use tracing::debug;

use crate::automaton;
use crate::prelude::*;
use crate::vocabulary::Vocabulary;
use crate::{Error, Result};

/// Result of walking every vocabulary token from one DFA state.
pub(crate) struct StateRow {
    pub(crate) state: DfaStateId,
    pub(crate) is_final: bool,
    pub(crate) token_transitions: HashMap<TokenId, StateId>,
    pub(crate) successors: Vec<DfaStateId>,
}

/// Walks each vocabulary token byte-by-byte from `state`.
///
/// A token is admitted iff every byte has a live DFA transition and the
/// landing state can still reach a match (it is intermediate, or a full
/// match at end of input). Every id sharing the token's bytes receives the
/// same landing state. Live landing states are reported as successors even
/// when the token itself is discarded, so exploration reaches them.
pub(crate) fn explore_state(
    dfa: &DFA<Vec<u32>>,
    vocabulary: &Vocabulary,
    state: DfaStateId,
) -> StateRow {
    let is_final = dfa.is_match_state(dfa.next_eoi_state(state));
    let mut token_transitions: HashMap<TokenId, StateId> = HashMap::default();
    let mut successor_set: HashSet<DfaStateId> = HashSet::default();
    let mut successors = Vec::new();

    'token_loop: for (token, ids) in vocabulary.tokens().iter() {
        let mut next_state = state;
        for &byte in token {
            next_state = dfa.next_state(next_state, byte);
            if dfa.is_dead_state(next_state) || dfa.is_quit_state(next_state) {
                continue 'token_loop;
            }
        }

        let is_intermediate_state = !dfa.is_match_state(next_state);
        let is_full_match_state = dfa.is_match_state(dfa.next_eoi_state(next_state));
        if is_intermediate_state || is_full_match_state {
            for &token_id in ids {
                token_transitions.insert(token_id, next_state.as_u32());
            }
        }
        if successor_set.insert(next_state) {
            successors.push(next_state);
        }
    }

    StateRow {
        state,
        is_final,
        token_transitions,
        successors,
    }
}

/// Token-transition table with every row materialized at construction.
#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct StandardIndex {
    initial_state: StateId,
    final_states: HashSet<StateId>,
    transitions: HashMap<StateId, HashMap<TokenId, StateId>>,
    eos_token_id: TokenId,
    vocab_size: usize,
}

impl StandardIndex {
    /// Builds the table by breadth-first exploration from the DFA start
    /// state. Rows within one frontier touch disjoint `(state, *)` keys and
    /// are computed in parallel; merging in frontier order keeps discovery
    /// independent of thread scheduling.
    pub(crate) fn new(regex: &str, vocabulary: &Vocabulary) -> Result<Self> {
        let started = std::time::Instant::now();
        let vocab_size = vocabulary.len();
        let eos_token_id = vocabulary.eos_token_id();
        let (dfa, start_state) = automaton::compile(regex)?;

        let mut transitions: HashMap<StateId, HashMap<TokenId, StateId>> = HashMap::default();
        let mut final_states: HashSet<StateId> = HashSet::default();
        let mut seen: HashSet<DfaStateId> = HashSet::from_iter([start_state]);
        let mut frontier: Vec<DfaStateId> = vec![start_state];

        while !frontier.is_empty() {
            let rows: Vec<StateRow> = frontier
                .par_iter()
                .map(|&state| explore_state(&dfa, vocabulary, state))
                .collect();

            let mut next_frontier = Vec::new();
            for row in rows {
                if row.is_final {
                    final_states.insert(row.state.as_u32());
                }
                if !row.token_transitions.is_empty() {
                    transitions.insert(row.state.as_u32(), row.token_transitions);
                }
                for successor in row.successors {
                    if seen.insert(successor) {
                        next_frontier.push(successor);
                    }
                }
            }
            frontier = next_frontier;
        }

        // Every final state accepts EOS and absorbs it.
        for &final_state in &final_states {
            transitions
                .entry(final_state)
                .or_default()
                .insert(eos_token_id, final_state);
        }

        if transitions.is_empty() {
            return Err(Error::EmptyLanguage);
        }

        debug!(
            states = seen.len(),
            rows = transitions.len(),
            finals = final_states.len(),
            elapsed = ?started.elapsed(),
            "built standard token index"
        );

        Ok(Self {
            initial_state: start_state.as_u32(),
            final_states,
            transitions,
            eos_token_id,
            vocab_size,
        })
    }

    pub fn initial_state(&self) -> StateId {
        self.initial_state
    }

    pub fn final_states(&self) -> &HashSet<StateId> {
        &self.final_states
    }

    pub fn transitions(&self) -> &HashMap<StateId, HashMap<TokenId, StateId>> {
        &self.transitions
    }

    pub fn is_final_state(&self, state: &StateId) -> bool {
        self.final_states.contains(state)
    }

    pub fn allowed_tokens(&self, state: &StateId) -> Option<Vec<TokenId>> {
        self.transitions
            .get(state)
            .map(|row| row.keys().copied().collect())
    }

    pub fn allowed_tokens_iter(&self, state: &StateId) -> Option<impl Iterator<Item = &TokenId>> {
        self.transitions.get(state).map(|row| row.keys())
    }

    pub fn next_state(&self, state: &StateId, token_id: &TokenId) -> Option<StateId> {
        self.transitions.get(state)?.get(token_id).copied()
    }

    pub fn eos_token_id(&self) -> TokenId {
        self.eos_token_id
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }
}
