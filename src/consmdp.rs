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

//! The consumption MDP graph: states, non-deterministic actions with
//! integer consumption, and the builder that assembles them.
//!
//! A [`ConsMdp`] plays both roles described in the design: it is the
//! mutable builder while states and actions are being appended, and it
//! becomes the frozen, solver-ready graph once [`ConsMdp::freeze`]
//! succeeds. Appending after a freeze simply un-freezes it again and
//! drops the derived caches (reverse index, MEC decomposition) --
//! there is no separate "already frozen" error, matching the lifecycle
//! described for this type.

use std::cell::RefCell;
use std::fmt;

use crate::distribution::Distribution;
use crate::error::{invalid_model, ConsMdpError, ConsMdpResult};
use crate::mec::Mec;

/// The id of a state, dense in `[0, num_states())`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct StateId(pub usize);

impl StateId {
    /// The numeric index of this state.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// The id of an action, dense in `[0, num_actions())`, stable across the
/// lifetime of the [`ConsMdp`] it belongs to (selectors refer to actions
/// by this index).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ActionId(pub usize);

impl ActionId {
    /// The numeric index of this action.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a{}", self.0)
    }
}

/// An immutable, committed action: `source --[consumption, label]--> dist`.
#[derive(Debug, Clone)]
pub struct Action {
    source: StateId,
    consumption: u32,
    label: String,
    distribution: Distribution,
}

impl Action {
    /// The state this action is enabled in.
    pub fn source(&self) -> StateId {
        self.source
    }

    /// The (non-negative) amount of resource this action consumes.
    pub fn consumption(&self) -> u32 {
        self.consumption
    }

    /// The opaque, display-only tag attached to this action.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The successor distribution of this action.
    pub fn distribution(&self) -> &Distribution {
        &self.distribution
    }
}

#[derive(Debug, Clone)]
struct StateRecord {
    name: Option<String>,
    reload: bool,
    actions: Vec<ActionId>,
}

/// The consumption MDP: a builder while being assembled, a frozen graph
/// once [`ConsMdp::freeze`] has validated it.
#[derive(Debug)]
pub struct ConsMdp {
    states: Vec<StateRecord>,
    actions: Vec<Action>,
    frozen: bool,
    incoming: Vec<Vec<ActionId>>,
    mec_cache: RefCell<Option<Vec<Mec>>>,
}

impl Default for ConsMdp {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsMdp {
    /// An empty consumption MDP.
    pub fn new() -> Self {
        ConsMdp {
            states: Vec::new(),
            actions: Vec::new(),
            frozen: false,
            incoming: Vec::new(),
            mec_cache: RefCell::new(None),
        }
    }

    /// Appends a new state and returns its id. O(1).
    pub fn new_state(&mut self, name: Option<impl Into<String>>, reload: bool) -> StateId {
        let id = StateId(self.states.len());
        self.states.push(StateRecord { name: name.map(Into::into), reload, actions: Vec::new() });
        self.invalidate_caches();
        id
    }

    /// Appends an action `src --[consumption, label]--> distribution`.
    ///
    /// Fails if `distribution` names a successor that does not exist in
    /// this `ConsMdp`, or (defensively, though [`Distribution`] already
    /// enforces this at construction) is not a valid distribution.
    pub fn add_action(
        &mut self,
        src: StateId,
        distribution: Distribution,
        label: impl Into<String>,
        consumption: u32,
    ) -> ConsMdpResult<ActionId> {
        self.require_state(src)?;
        for s in distribution.support() {
            self.require_state(*s)?;
        }
        let id = ActionId(self.actions.len());
        self.actions.push(Action { source: src, consumption, label: label.into(), distribution });
        self.states[src.0].actions.push(id);
        self.invalidate_caches();
        Ok(id)
    }

    fn require_state(&self, s: StateId) -> ConsMdpResult<()> {
        if s.0 >= self.states.len() {
            Err(invalid_model(format!("state {s:?} does not exist")))
        } else {
            Ok(())
        }
    }

    fn invalidate_caches(&mut self) {
        self.frozen = false;
        self.incoming.clear();
        *self.mec_cache.get_mut() = None;
    }

    /// The number of states.
    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// The number of committed actions.
    pub fn num_actions(&self) -> usize {
        self.actions.len()
    }

    /// An iterator over all state ids, `0..num_states()`.
    pub fn state_ids(&self) -> impl Iterator<Item = StateId> {
        (0..self.states.len()).map(StateId)
    }

    /// The human-readable name of a state, if any.
    pub fn name(&self, s: StateId) -> Option<&str> {
        self.states[s.0].name.as_deref()
    }

    /// Whether `s` is a reload state.
    pub fn is_reload(&self, s: StateId) -> bool {
        self.states[s.0].reload
    }

    /// The committed action with the given id.
    pub fn action(&self, a: ActionId) -> &Action {
        self.actions.get(a.0).unwrap_or_else(|| crate::error::action_not_found(a))
    }

    /// The outgoing actions of `s`, in insertion order. This order is
    /// part of the public contract: it is what makes tie-breaking in the
    /// fixed-point engine (and thus the emitted selector) deterministic.
    pub fn actions_for(&self, s: StateId) -> &[ActionId] {
        &self.states[s.0].actions
    }

    /// The actions that have `s` somewhere in their successor
    /// distribution. Only available once the graph is frozen.
    pub fn incoming_actions(&self, s: StateId) -> &[ActionId] {
        debug_assert!(self.frozen, "incoming_actions queried before freeze()");
        &self.incoming[s.0]
    }

    /// Whether this graph is currently frozen (i.e. [`ConsMdp::freeze`]
    /// has run to completion since the last append).
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Validates the structural invariants required at solve time and
    /// builds the reverse (incoming-action) index.
    ///
    /// This also performs the "no zero-consumption cycle" check eagerly,
    /// rather than leaving it to whichever solver runs first: doing it
    /// once here means every solver gets the guarantee for free and a
    /// caller is told about a malformed model before any fixed point
    /// runs.
    pub fn freeze(&mut self) -> ConsMdpResult<()> {
        for (idx, state) in self.states.iter().enumerate() {
            if state.actions.is_empty() {
                return Err(invalid_model(format!("state {idx} has no outgoing action")));
            }
        }

        self.check_no_zero_consumption_cycle()?;

        let mut incoming = vec![Vec::new(); self.states.len()];
        for (idx, action) in self.actions.iter().enumerate() {
            for succ in action.distribution.support() {
                incoming[succ.0].push(ActionId(idx));
            }
        }
        self.incoming = incoming;
        self.frozen = true;
        *self.mec_cache.get_mut() = None;
        log::debug!(
            "froze consmdp with {} states and {} actions",
            self.states.len(),
            self.actions.len()
        );
        Ok(())
    }

    fn check_no_zero_consumption_cycle(&self) -> ConsMdpResult<()> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }
        let mut mark = vec![Mark::Unvisited; self.states.len()];
        let mut stack: Vec<(StateId, usize)> = Vec::new();

        for start in self.state_ids() {
            if mark[start.0] != Mark::Unvisited {
                continue;
            }
            stack.push((start, 0));
            mark[start.0] = Mark::InProgress;
            while let Some(&(s, next_action_idx)) = stack.last() {
                let zero_cost_succs: Vec<StateId> = self.states[s.0]
                    .actions
                    .iter()
                    .map(|a| &self.actions[a.0])
                    .filter(|a| a.consumption == 0)
                    .flat_map(|a| a.distribution.support().iter().copied())
                    .collect();

                if next_action_idx >= zero_cost_succs.len() {
                    mark[s.0] = Mark::Done;
                    stack.pop();
                    continue;
                }
                stack.last_mut().unwrap().1 += 1;
                let succ = zero_cost_succs[next_action_idx];
                match mark[succ.0] {
                    Mark::InProgress => return Err(ConsMdpError::NonTerminating(succ)),
                    Mark::Done => {}
                    Mark::Unvisited => {
                        mark[succ.0] = Mark::InProgress;
                        stack.push((succ, 0));
                    }
                }
            }
        }
        Ok(())
    }

    /// The maximal end components of this graph, computed on first call
    /// and cached until the next structural change.
    pub fn mecs(&self) -> Vec<Mec> {
        if let Some(cached) = self.mec_cache.borrow().as_ref() {
            return cached.clone();
        }
        let computed = crate::mec::decompose(self);
        *self.mec_cache.borrow_mut() = Some(computed.clone());
        computed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_state_survival() -> ConsMdp {
        let mut mdp = ConsMdp::new();
        let s0 = mdp.new_state(Some("s0"), true);
        let s1 = mdp.new_state(Some("s1"), false);
        mdp.add_action(s0, Distribution::point_mass(s1), "go", 1).unwrap();
        mdp.add_action(s1, Distribution::point_mass(s0), "back", 1).unwrap();
        mdp
    }

    #[test]
    fn freeze_succeeds_on_well_formed_model() {
        let _ = env_logger::try_init();
        let mut mdp = two_state_survival();
        assert!(mdp.freeze().is_ok());
        assert!(mdp.is_frozen());
    }

    #[test]
    fn freeze_rejects_state_without_outgoing_action() {
        let mut mdp = ConsMdp::new();
        mdp.new_state(Some("lonely"), false);
        assert!(mdp.freeze().is_err());
    }

    #[test]
    fn add_action_rejects_unknown_successor() {
        let mut mdp = ConsMdp::new();
        let s0 = mdp.new_state(Some("s0"), false);
        let bogus = Distribution::point_mass(StateId(42));
        assert!(mdp.add_action(s0, bogus, "go", 1).is_err());
    }

    #[test]
    fn rejects_zero_consumption_self_loop() {
        let mut mdp = ConsMdp::new();
        let s0 = mdp.new_state(Some("s0"), true);
        mdp.add_action(s0, Distribution::point_mass(s0), "loop", 0).unwrap();
        assert!(matches!(mdp.freeze(), Err(ConsMdpError::NonTerminating(_))));
    }

    #[test]
    fn rejects_longer_zero_consumption_cycle() {
        let mut mdp = ConsMdp::new();
        let s0 = mdp.new_state(Some("s0"), false);
        let s1 = mdp.new_state(Some("s1"), false);
        mdp.add_action(s0, Distribution::point_mass(s1), "a", 0).unwrap();
        mdp.add_action(s1, Distribution::point_mass(s0), "b", 0).unwrap();
        assert!(matches!(mdp.freeze(), Err(ConsMdpError::NonTerminating(_))));
    }

    #[test]
    fn appending_after_freeze_invalidates_frozen_flag() {
        let mut mdp = two_state_survival();
        mdp.freeze().unwrap();
        assert!(mdp.is_frozen());
        mdp.new_state(Some("s2"), false);
        assert!(!mdp.is_frozen());
    }

    #[test]
    fn actions_for_preserves_insertion_order() {
        let mut mdp = ConsMdp::new();
        let s0 = mdp.new_state(Some("s0"), false);
        let s1 = mdp.new_state(Some("s1"), false);
        let a0 = mdp.add_action(s0, Distribution::point_mass(s1), "first", 1).unwrap();
        let a1 = mdp.add_action(s0, Distribution::point_mass(s1), "second", 2).unwrap();
        assert_eq!(mdp.actions_for(s0), &[a0, a1]);
    }

    #[test]
    fn incoming_actions_lists_every_action_that_targets_the_state() {
        let mut mdp = ConsMdp::new();
        let s0 = mdp.new_state(Some("s0"), false);
        let s1 = mdp.new_state(Some("s1"), false);
        let s2 = mdp.new_state(Some("s2"), false);
        // s0 and s1 both have an action landing on s2; s0 also has an
        // action landing on s1, which must not show up in s2's list.
        let a_s0_to_s1 = mdp.add_action(s0, Distribution::point_mass(s1), "to_s1", 1).unwrap();
        let a_s0_to_s2 = mdp.add_action(s0, Distribution::point_mass(s2), "to_s2", 1).unwrap();
        let a_s1_to_s2 = mdp.add_action(s1, Distribution::point_mass(s2), "to_s2", 1).unwrap();
        // give every state an outgoing action so freeze() accepts the model
        let a_s2_to_s0 = mdp.add_action(s2, Distribution::point_mass(s0), "back", 1).unwrap();
        mdp.freeze().unwrap();

        assert_eq!(mdp.incoming_actions(s2), &[a_s0_to_s2, a_s1_to_s2]);
        assert_eq!(mdp.incoming_actions(s1), &[a_s0_to_s1]);
        assert_eq!(mdp.incoming_actions(s0), &[a_s2_to_s0]);
    }
}
