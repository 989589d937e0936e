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

//! Finite-memory selectors: a step function from resource level to
//! action, per state.
//!
//! The general contract allows a state's rule to list several
//! `(lower_bound, action)` intervals. In practice every
//! one of the four qualitative objectives this crate solves is
//! witnessed by the same minimising action at every level at or above
//! a state's minimum level, so [`Selector::from_levels`] always
//! produces exactly one interval per winning state. The multi-interval
//! representation is kept because it is the correct general contract,
//! not because any builder here needs more than one rule.

use crate::consmdp::{ActionId, ConsMdp, StateId};
use crate::engine::{LevelVector, WitnessMap};

/// A finite-memory selector: for each state, a sorted list of
/// `(lower_bound, action)` rules. The action to play at a given level
/// is the one attached to the greatest lower bound not exceeding it.
#[derive(Debug, Clone)]
pub struct Selector {
    rules: Vec<Vec<(u32, ActionId)>>,
}

impl Selector {
    /// Builds a selector directly from a rule table, one sorted rule
    /// list per state index. Exposed for callers assembling a selector
    /// by hand (for instance after composing several objectives); most
    /// callers want [`Selector::from_levels`] instead.
    pub fn from_rules(rules: Vec<Vec<(u32, ActionId)>>) -> Self {
        debug_assert!(
            rules.iter().all(|r| r.windows(2).all(|w| w[0].0 < w[1].0)),
            "selector rules must be sorted by strictly increasing lower bound"
        );
        Selector { rules }
    }

    /// Builds a selector from a solved level vector and its witness
    /// map: every winning state gets a single rule starting at its
    /// minimum level, playing the action the engine minimised with.
    pub fn from_levels(mdp: &ConsMdp, levels: &LevelVector, witness: &WitnessMap) -> Self {
        let mut rules = vec![Vec::new(); mdp.num_states()];
        for s in mdp.state_ids() {
            if let Some(level) = levels.get(s) {
                if let Some(&action) = witness.get(&s) {
                    rules[s.index()].push((level, action));
                }
            }
        }
        Selector { rules }
    }

    /// The action to play in state `s` at resource level `level`, or
    /// `None` if `s` has no rule covering that level (either `s` is
    /// losing, or `level` is below `s`'s minimum level).
    pub fn select(&self, s: StateId, level: u32) -> Option<ActionId> {
        let rule = self.rules.get(s.index())?;
        match rule.binary_search_by(|(lower, _)| lower.cmp(&level)) {
            Ok(idx) => Some(rule[idx].1),
            Err(0) => None,
            Err(idx) => Some(rule[idx - 1].1),
        }
    }

    /// The minimum level from which `s` has any rule at all, or `None`
    /// if `s` is losing.
    pub fn minimum_level(&self, s: StateId) -> Option<u32> {
        self.rules.get(s.index()).and_then(|r| r.first()).map(|(lower, _)| *lower)
    }

    /// How many states have at least one rule.
    pub fn winning_count(&self) -> usize {
        self.rules.iter().filter(|r| !r.is_empty()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::Distribution;
    use crate::engine::safety_levels;

    #[test]
    fn select_below_minimum_level_returns_none() {
        let mut mdp = ConsMdp::new();
        let s0 = mdp.new_state(Some("s0"), true);
        let s1 = mdp.new_state(Some("s1"), false);
        mdp.add_action(s0, Distribution::point_mass(s1), "go", 1).unwrap();
        mdp.add_action(s1, Distribution::point_mass(s0), "back", 1).unwrap();
        mdp.freeze().unwrap();

        let (v, witness) = safety_levels(&mdp, 2, None).unwrap();
        let selector = Selector::from_levels(&mdp, &v, &witness);
        assert!(selector.select(s1, 0).is_none());
        assert!(selector.select(s1, 1).is_some());
    }

    #[test]
    fn select_at_and_above_minimum_level_returns_the_witness_action() {
        let mut mdp = ConsMdp::new();
        let s0 = mdp.new_state(Some("s0"), true);
        let s1 = mdp.new_state(Some("s1"), false);
        mdp.add_action(s0, Distribution::point_mass(s1), "go", 1).unwrap();
        mdp.add_action(s1, Distribution::point_mass(s0), "back", 1).unwrap();
        mdp.freeze().unwrap();

        let (v, witness) = safety_levels(&mdp, 2, None).unwrap();
        let selector = Selector::from_levels(&mdp, &v, &witness);
        let expected = witness[&s0];
        assert_eq!(selector.select(s0, 0), Some(expected));
        assert_eq!(selector.select(s0, 2), Some(expected));
    }

    #[test]
    fn a_losing_state_has_no_rule_at_any_level() {
        let mut mdp = ConsMdp::new();
        let s0 = mdp.new_state(Some("s0"), true);
        let dead_end = mdp.new_state(Some("dead_end"), false);
        mdp.add_action(s0, Distribution::point_mass(s0), "loop", 1).unwrap();
        mdp.add_action(dead_end, Distribution::point_mass(s0), "escape", 10).unwrap();
        mdp.freeze().unwrap();

        let (v, witness) = safety_levels(&mdp, 1, None).unwrap();
        let selector = Selector::from_levels(&mdp, &v, &witness);
        assert!(v.get(dead_end).is_none());
        assert!(selector.select(dead_end, 0).is_none());
        assert!(selector.select(dead_end, 100).is_none());
    }
}
