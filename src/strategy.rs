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

//! The counter strategy: a [`Selector`] bundled with a resource counter.
//!
//! This is the runtime object a simulator drives step by step; sampling
//! which successor is actually realised is the simulator's job, not
//! this crate's. It is a pure function of `(state, level)`, so two
//! plays started from identical configurations and fed identical
//! sampled successors agree exactly.

use crate::consmdp::{ActionId, ConsMdp, StateId};
use crate::error::{ConsMdpError, ConsMdpResult};
use crate::selector::Selector;

/// A selector plus the energy counter it is being played against.
///
/// Borrows the [`ConsMdp`] and [`Selector`] it was built from; it owns
/// nothing but the two numbers that make up its current configuration.
#[derive(Debug)]
pub struct Strategy<'a> {
    mdp: &'a ConsMdp,
    selector: &'a Selector,
    capacity: u32,
    state: StateId,
    level: u32,
}

impl<'a> Strategy<'a> {
    /// Starts a play at `initial_state` with `initial_level` units of
    /// resource.
    ///
    /// Fails with [`ConsMdpError::NoStrategy`] if `initial_state` has no
    /// rule at all in `selector` (its minimum level is infinite, so no
    /// initial resource would help). It does *not* fail merely because
    /// `initial_level` is below that minimum: that case is reported by
    /// the first [`Strategy::step`] as [`ConsMdpError::Exhaustion`],
    /// exactly as a too-low level discovered mid-play would be.
    ///
    /// If `initial_state` is itself a reload, `initial_level` is topped
    /// up to `capacity` immediately, the same way arriving at a reload
    /// via [`Strategy::step`] would be. This is what makes a reload's
    /// minimum level `0` in the fixed-point engine actually correct: the
    /// state is safe to start from at *any* level only because standing
    /// there already means a full tank, not because the first move is
    /// free.
    pub fn new(
        mdp: &'a ConsMdp,
        selector: &'a Selector,
        capacity: u32,
        initial_state: StateId,
        initial_level: u32,
    ) -> ConsMdpResult<Self> {
        if selector.minimum_level(initial_state).is_none() {
            return Err(ConsMdpError::NoStrategy(initial_state));
        }
        let level = if mdp.is_reload(initial_state) { capacity } else { initial_level };
        Ok(Strategy { mdp, selector, capacity, state: initial_state, level })
    }

    /// The state the play currently stands in.
    pub fn state(&self) -> StateId {
        self.state
    }

    /// The resource level the play currently has left.
    pub fn level(&self) -> u32 {
        self.level
    }

    /// The action the selector would choose at the current configuration,
    /// without committing to it.
    pub fn propose(&self) -> ConsMdpResult<ActionId> {
        self.selector
            .select(self.state, self.level)
            .ok_or(ConsMdpError::Exhaustion { state: self.state, level: self.level })
    }

    /// Commits to the selector's choice at the current configuration and
    /// advances the play to `sampled_successor`.
    ///
    /// `sampled_successor` is expected to come from the support of the
    /// chosen action's distribution -- sampling it is the simulator's
    /// job, not this crate's. Passing a state outside that support is a
    /// programmer error and panics, the same as any other malformed
    /// runtime query.
    ///
    /// Returns the action that was played. On success, `state()` and
    /// `level()` reflect the new configuration: the action's consumption
    /// is deducted, and the level is topped back up to `capacity` if
    /// `sampled_successor` is a reload.
    pub fn step(&mut self, sampled_successor: StateId) -> ConsMdpResult<ActionId> {
        let action_id = self.propose()?;
        let action = self.mdp.action(action_id);
        assert!(
            action.distribution().support().contains(&sampled_successor),
            "programmer error: {sampled_successor:?} is not a successor of the chosen action {action_id:?}"
        );

        let consumption = action.consumption();
        assert!(
            consumption <= self.level,
            "programmer error: selector chose an action costing more than the current level; \
             this would mean the selector was not actually sufficient at this configuration"
        );
        let remaining = self.level - consumption;
        self.level = if self.mdp.is_reload(sampled_successor) { self.capacity } else { remaining };
        self.state = sampled_successor;
        Ok(action_id)
    }
}
