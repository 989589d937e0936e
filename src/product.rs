// Copyright 2020 Xavier Gillard
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! The labelled-ConsMDP product: the external-collaborator interface
//! for pairing a [`ConsMdp`] with a labelled deterministic Büchi
//! automaton.
//!
//! The core never builds a Büchi automaton from a temporal-logic
//! formula -- that synthesis step is an external service. What it does
//! accept is an already-built deterministic Büchi automaton over atomic
//! propositions, plus a labelling of states by the propositions that
//! hold there, and it produces the product `ConsMdp` the fixed-point
//! engine can then be pointed at directly with [`crate::engine::solve`].

use fxhash::FxHashSet;

use crate::consmdp::{ConsMdp, StateId};
use crate::error::ConsMdpResult;

/// A deterministic Büchi automaton over atomic propositions `AP`, whose
/// states are the dense range `0..num_states()`.
///
/// The automaton is intentionally not generic over how propositions are
/// represented by the caller's labelling; it only ever sees the set of
/// propositions [`Labelling::label`] reports for the successor state
/// being entered: the transition taken on entering `s'` is driven by
/// `L(s')`, never by the propositions of the state being left.
pub trait DetBuchiAutomaton<AP> {
    /// How many automaton states there are. Automaton states are the
    /// dense range `0..num_states()`.
    fn num_states(&self) -> usize;

    /// The automaton's initial state.
    fn initial(&self) -> usize;

    /// The (deterministic) transition taken from `q` when the successor
    /// state carries proposition set `label`.
    fn transition(&self, q: usize, label: &FxHashSet<AP>) -> usize;

    /// Whether `q` is an accepting automaton state.
    fn is_accepting(&self, q: usize) -> bool;
}

/// Labels every [`ConsMdp`] state with the set of atomic propositions
/// that hold there.
pub trait Labelling<AP> {
    /// The propositions holding at `s`.
    fn label(&self, s: StateId) -> FxHashSet<AP>;
}

impl<AP, F: Fn(StateId) -> FxHashSet<AP>> Labelling<AP> for F {
    fn label(&self, s: StateId) -> FxHashSet<AP> {
        self(s)
    }
}

/// Maps between a source `ConsMdp`'s states and the dense ids of the
/// product built by [`build`].
///
/// The product numbers its states as `s.index() * num_automaton_states
/// + q`, so both directions are O(1) arithmetic -- no lookup table is
/// needed, unlike a general product construction that would have to
/// intern arbitrary pairs.
#[derive(Debug, Clone, Copy)]
pub struct ProductIndex {
    num_automaton_states: usize,
}

impl ProductIndex {
    /// The product state standing for `(s, q)`.
    pub fn pair(&self, s: StateId, q: usize) -> StateId {
        StateId(s.index() * self.num_automaton_states + q)
    }

    /// The `(s, q)` pair a product state stands for.
    pub fn unpair(&self, product_state: StateId) -> (StateId, usize) {
        let idx = product_state.index();
        (StateId(idx / self.num_automaton_states), idx % self.num_automaton_states)
    }
}

/// Builds the product of `mdp` with `automaton` under `labelling`.
///
/// Every original action `src --[c, label]--> dist` becomes, for every
/// automaton state `q`, an action `(src, q) --[c, label]--> dist'` where
/// each successor `s'` of `dist` is remapped to `(s', automaton.transition(q,
/// labelling.label(s')))` at the same probability. The target set
/// returned is every `(s, q)` with `q` accepting.
///
/// Consumption is untouched by the construction, so a zero-consumption
/// cycle in the product projects (via [`ProductIndex::unpair`]) onto a
/// zero-consumption closed walk in `mdp`, and `mdp`'s states are finite,
/// so that walk revisits a state -- i.e. `mdp` itself has a
/// zero-consumption cycle. Conversely a deterministic automaton cannot
/// introduce a cycle `mdp` did not already have: the product preserves
/// the no-zero-consumption-cycle invariant iff the source did, exactly
/// as required.
pub fn build<AP>(
    mdp: &ConsMdp,
    labelling: &impl Labelling<AP>,
    automaton: &impl DetBuchiAutomaton<AP>,
) -> ConsMdpResult<(ConsMdp, FxHashSet<StateId>, ProductIndex)> {
    let num_q = automaton.num_states();
    let index = ProductIndex { num_automaton_states: num_q };

    let mut product = ConsMdp::new();
    for s in mdp.state_ids() {
        let reload = mdp.is_reload(s);
        let name = mdp.name(s).map(|n| n.to_string());
        for q in 0..num_q {
            let label = name
                .as_ref()
                .map(|n| format!("{n}@{q}"))
                .unwrap_or_else(|| format!("{}@{q}", s.index()));
            product.new_state(Some(label), reload);
        }
    }

    for s in mdp.state_ids() {
        for q in 0..num_q {
            for &a in mdp.actions_for(s) {
                let action = mdp.action(a);
                let mapping = action.distribution().support().iter().map(|&succ| {
                    let succ_label = labelling.label(succ);
                    let next_q = automaton.transition(q, &succ_label);
                    (index.pair(succ, next_q), action.distribution().probability(succ))
                });
                let dist = crate::distribution::Distribution::new(mapping)?;
                product.add_action(index.pair(s, q), dist, action.label(), action.consumption())?;
            }
        }
    }

    let mut targets = FxHashSet::default();
    for s in mdp.state_ids() {
        for q in 0..num_q {
            if automaton.is_accepting(q) {
                targets.insert(index.pair(s, q));
            }
        }
    }

    log::debug!(
        "built product consmdp: {} source state(s) x {} automaton state(s) = {} product state(s)",
        mdp.num_states(),
        num_q,
        product.num_states()
    );
    Ok((product, targets, index))
}
