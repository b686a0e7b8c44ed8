//! Lazy variant of the token-transition table.
//!
//! Rows are computed the first time a state is visited and published into a
//! concurrent insert-once map, trading the one-time cost of the eager
//! builder for a per-request cost bounded by the path actually walked. Row
//! computation is pure and re-derivable, so a racing double-compute is
//! benign and reads never take a global lock.

use dashmap::mapref::one::Ref;
use dashmap::DashMap;
use regex_automata::dfa::dense::DFA;
use regex_automata::dfa::Automaton;
use regex_automata::util::primitives::StateID as DfaStateId;
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use tracing::trace;

use super::standard::explore_state;
use crate::automaton;
use crate::prelude::*;
use crate::vocabulary::Vocabulary;
use crate::{Error, Result};

/// Token-transition table whose rows are derived on demand from a retained
/// DFA and vocabulary.
#[derive(Clone)]
pub struct CompressedIndex {
    regex: String,
    dfa: DFA<Vec<u32>>,
    initial_state: StateId,
    /// All byte-reachable DFA states; rows exist only for members.
    states: HashSet<StateId>,
    final_states: HashSet<StateId>,
    vocabulary: Vocabulary,
    eos_token_id: TokenId,
    vocab_size: usize,
    rows: DashMap<StateId, HashMap<TokenId, StateId>>,
}

impl CompressedIndex {
    pub(crate) fn new(regex: &str, vocabulary: &Vocabulary) -> Result<Self> {
        let (dfa, start_state) = automaton::compile(regex)?;

        // Byte-level reachability is cheap next to token walks and yields
        // the state universe and final set up front.
        let mut states: HashSet<StateId> = HashSet::default();
        let mut final_states: HashSet<StateId> = HashSet::default();
        let mut seen: HashSet<DfaStateId> = HashSet::from_iter([start_state]);
        let mut stack = vec![start_state];
        while let Some(state) = stack.pop() {
            states.insert(state.as_u32());
            if dfa.is_match_state(dfa.next_eoi_state(state)) {
                final_states.insert(state.as_u32());
            }
            for byte in 0..=u8::MAX {
                let next = dfa.next_state(state, byte);
                if dfa.is_dead_state(next) || dfa.is_quit_state(next) {
                    continue;
                }
                if seen.insert(next) {
                    stack.push(next);
                }
            }
        }

        let index = Self {
            regex: regex.to_string(),
            initial_state: start_state.as_u32(),
            states,
            final_states,
            vocabulary: vocabulary.clone(),
            eos_token_id: vocabulary.eos_token_id(),
            vocab_size: vocabulary.len(),
            rows: DashMap::new(),
            dfa,
        };

        // The initial row decides whether any continuation exists at all.
        let initial = index.initial_state;
        let initial_row_empty = index
            .row(&initial)
            .map(|row| row.is_empty())
            .unwrap_or(true);
        if initial_row_empty {
            return Err(Error::EmptyLanguage);
        }
        Ok(index)
    }

    /// Returns the row of `state`, computing and publishing it on first
    /// visit. `None` for states outside the DFA.
    fn row(&self, state: &StateId) -> Option<Ref<'_, StateId, HashMap<TokenId, StateId>>> {
        if let Some(row) = self.rows.get(state) {
            return Some(row);
        }
        if !self.states.contains(state) {
            return None;
        }

        let dfa_state = DfaStateId::new(*state as usize).ok()?;
        let explored = explore_state(&self.dfa, &self.vocabulary, dfa_state);
        let mut token_transitions = explored.token_transitions;
        if explored.is_final {
            token_transitions.insert(self.eos_token_id, *state);
        }
        trace!(
            state = *state,
            tokens = token_transitions.len(),
            "computed lazy row"
        );

        Some(self.rows.entry(*state).or_insert(token_transitions).downgrade())
    }

    pub fn initial_state(&self) -> StateId {
        self.initial_state
    }

    pub fn final_states(&self) -> &HashSet<StateId> {
        &self.final_states
    }

    pub fn is_final_state(&self, state: &StateId) -> bool {
        self.final_states.contains(state)
    }

    pub fn allowed_tokens(&self, state: &StateId) -> Option<Vec<TokenId>> {
        let row = self.row(state)?;
        if row.is_empty() {
            return None;
        }
        Some(row.keys().copied().collect())
    }

    pub fn next_state(&self, state: &StateId, token_id: &TokenId) -> Option<StateId> {
        self.row(state)?.get(token_id).copied()
    }

    /// Calls `f` for every token currently allowed at `state`; returns
    /// whether the state had a non-empty row.
    pub(crate) fn for_each_allowed(&self, state: &StateId, mut f: impl FnMut(TokenId)) -> bool {
        match self.row(state) {
            Some(row) if !row.is_empty() => {
                for token_id in row.keys() {
                    f(*token_id);
                }
                true
            }
            _ => false,
        }
    }

    /// Snapshot of the rows materialized so far.
    pub fn transitions(&self) -> HashMap<StateId, HashMap<TokenId, StateId>> {
        self.rows
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    pub fn eos_token_id(&self) -> TokenId {
        self.eos_token_id
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub(crate) fn regex(&self) -> &str {
        &self.regex
    }

    pub(crate) fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }
}

// The DFA is a pure function of the regex and the row cache is a memo, so
// identity is carried by the inputs alone.
impl PartialEq for CompressedIndex {
    fn eq(&self, other: &Self) -> bool {
        self.regex == other.regex
            && self.vocabulary == other.vocabulary
            && self.eos_token_id == other.eos_token_id
    }
}

impl std::fmt::Debug for CompressedIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressedIndex")
            .field("regex", &self.regex)
            .field("initial_state", &self.initial_state)
            .field("states", &self.states.len())
            .field("final_states", &self.final_states)
            .field("materialized_rows", &self.rows.len())
            .field("vocab_size", &self.vocab_size)
            .finish()
    }
}
