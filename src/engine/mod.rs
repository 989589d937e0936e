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

//! The fixed-point engine: four interacting least/greatest fixed-point
//! iterations over per-state integer levels, sharing one family of
//! operators (`post`, `need`, `needR`, `act_min`, `act_minR`).
//!
//! Each objective is a small composition recipe built on top of
//! [`LevelVector`] rather than a class hierarchy with overridden hooks:
//! see `safety`, `pos_reach`, `as_reach` and `buchi` for the recipes
//! themselves, and `solve` for the single dispatch entry point.

mod as_reach;
mod buchi;
mod pos_reach;
mod safety;
mod solve;

pub use as_reach::almost_sure_reach;
pub use buchi::almost_sure_buchi;
pub use pos_reach::positive_reach;
pub use safety::safety_levels;
pub use solve::{solve, Objective, SolveConfig};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fxhash::FxHashMap;

use crate::consmdp::{ActionId, ConsMdp, StateId};
use crate::error::{ConsMdpError, ConsMdpResult};

/// A cooperative cancellation token. Cloning shares the same underlying
/// flag, so a caller can hold one end and pass clones into one or more
/// solver calls.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// A token that starts out not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub(crate) fn check_cancelled(token: Option<&CancellationToken>) -> ConsMdpResult<()> {
    match token {
        Some(t) if t.is_cancelled() => {
            log::warn!("fixed-point computation cancelled");
            Err(ConsMdpError::Cancelled)
        }
        _ => Ok(()),
    }
}

/// A per-state integer level, truncated at `capacity + 1` which stands
/// for the sentinel infinity ("no finite initial resource suffices").
#[derive(Debug, Clone)]
pub struct LevelVector {
    capacity: u32,
    levels: Vec<u32>,
}

impl LevelVector {
    /// Builds a vector with every entry set to the sentinel infinity.
    pub fn all_infinite(capacity: u32, num_states: usize) -> Self {
        LevelVector { capacity, levels: vec![capacity + 1; num_states] }
    }

    /// The capacity this vector was computed for.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// The sentinel value standing for infinity, `capacity + 1`.
    pub fn infinity(&self) -> u32 {
        self.capacity + 1
    }

    /// The raw, truncated level of `s` (may be the infinity sentinel).
    pub fn raw(&self, s: StateId) -> u32 {
        self.levels[s.index()]
    }

    /// The level of `s`, or `None` if it is infinite (no finite initial
    /// resource suffices from `s`).
    pub fn get(&self, s: StateId) -> Option<u32> {
        let v = self.raw(s);
        if v > self.capacity {
            None
        } else {
            Some(v)
        }
    }

    /// Sets the raw level of `s`, truncating at the infinity sentinel.
    pub fn set_raw(&mut self, s: StateId, value: u32) {
        self.levels[s.index()] = value.min(self.capacity + 1);
    }

    fn truncated(&self, value: u64) -> u32 {
        value.min(self.capacity as u64 + 1) as u32
    }
}

/// `post(a, v) = max over s' in support(a) of v[s']`, with no special
/// treatment of reload successors.
pub(crate) fn post(mdp: &ConsMdp, a: ActionId, v: &LevelVector) -> u32 {
    mdp.action(a)
        .distribution()
        .support()
        .iter()
        .map(|s| v.raw(*s))
        .max()
        .unwrap_or(0)
}

/// `postR(a, v)`: like `post`, but a reload successor always
/// contributes `0` regardless of its own stored level. Entering a
/// reload always tops the level back up, so a predecessor never needs
/// to budget for whatever that reload's own level happens to be; this
/// is what lets the discount be keyed on the *successor*, not on
/// whether the acting state itself is a reload.
pub(crate) fn post_r(mdp: &ConsMdp, a: ActionId, v: &LevelVector) -> u32 {
    mdp.action(a)
        .distribution()
        .support()
        .iter()
        .map(|s| if mdp.is_reload(*s) { 0 } else { v.raw(*s) })
        .max()
        .unwrap_or(0)
}

/// `need(a, v) = c + post(a, v)`, truncated.
pub(crate) fn need(mdp: &ConsMdp, a: ActionId, v: &LevelVector) -> u32 {
    let c = mdp.action(a).consumption() as u64;
    v.truncated(c + post(mdp, a, v) as u64)
}

/// `needR(a, v) = c + postR(a, v)`, truncated.
pub(crate) fn need_r(mdp: &ConsMdp, a: ActionId, v: &LevelVector) -> u32 {
    let c = mdp.action(a).consumption() as u64;
    v.truncated(c + post_r(mdp, a, v) as u64)
}

/// `min` over `actions(s)` of `need`, together with the minimising
/// action (smallest [`ActionId`] on ties, since `actions_for` is in
/// insertion order).
pub(crate) fn act_min(mdp: &ConsMdp, s: StateId, v: &LevelVector) -> (u32, ActionId) {
    arg_min(mdp.actions_for(s).iter().copied(), |a| need(mdp, a, v))
}

/// `min` over `actions(s)` of `needR`, with the same tie-break. Used
/// uniformly for every state, reload or not: the discount is a
/// property of the successor, not of the state doing the choosing.
pub(crate) fn act_min_r(mdp: &ConsMdp, s: StateId, v: &LevelVector) -> (u32, ActionId) {
    arg_min(mdp.actions_for(s).iter().copied(), |a| need_r(mdp, a, v))
}

/// Like [`act_min_r`], but only considering actions accepted by
/// `eligible`. Used by positive/almost-sure reachability, whose
/// constrained operator disqualifies actions that are not yet known to
/// be survivable and reachable.
pub(crate) fn act_min_constrained(
    mdp: &ConsMdp,
    s: StateId,
    v: &LevelVector,
    eligible: impl Fn(ActionId) -> bool,
) -> Option<(u32, ActionId)> {
    let candidates: Vec<ActionId> =
        mdp.actions_for(s).iter().copied().filter(|a| eligible(*a)).collect();
    if candidates.is_empty() {
        return None;
    }
    Some(arg_min(candidates.into_iter(), |a| need_r(mdp, a, v)))
}

/// Collapses a reload state's raw requirement to the fixed point's
/// `0`-or-infinity convention: a reload always restores the level to
/// `capacity` on entry, so if the cheapest eligible action's
/// requirement fits within `capacity`, the reload itself needs nothing
/// more; otherwise no initial level, however large, would help, and the
/// state is infinite.
pub(crate) fn reload_collapse(raw: u32, capacity: u32) -> u32 {
    if raw <= capacity {
        0
    } else {
        capacity + 1
    }
}

fn arg_min(actions: impl Iterator<Item = ActionId>, mut f: impl FnMut(ActionId) -> u32) -> (u32, ActionId) {
    let mut best: Option<(u32, ActionId)> = None;
    for a in actions {
        let val = f(a);
        match best {
            Some((b, _)) if b <= val => {}
            _ => best = Some((val, a)),
        }
    }
    best.expect("act_min called on a state with no actions; freeze() should have rejected this model")
}

/// The action each state realised its minimum with, for states that
/// currently have a finite level.
pub type WitnessMap = FxHashMap<StateId, ActionId>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::Distribution;

    fn line(n: usize) -> ConsMdp {
        let mut mdp = ConsMdp::new();
        let ids: Vec<_> = (0..n).map(|i| mdp.new_state(Some(format!("s{i}")), i == 0)).collect();
        for i in 0..n {
            if i > 0 {
                mdp.add_action(ids[i], Distribution::point_mass(ids[i - 1]), "back", 1).unwrap();
            }
            if i + 1 < n {
                mdp.add_action(ids[i], Distribution::point_mass(ids[i + 1]), "fwd", 1).unwrap();
            }
        }
        mdp.freeze().unwrap();
        mdp
    }

    #[test]
    fn post_takes_the_max_over_the_support() {
        let _ = env_logger::try_init();
        let mdp = line(3);
        let mut v = LevelVector::all_infinite(5, 3);
        v.set_raw(StateId(0), 0);
        v.set_raw(StateId(2), 4);
        let a = mdp.actions_for(StateId(1))[1]; // s1 -> s2 ("fwd")
        assert_eq!(post(&mdp, a, &v), 4);
    }

    #[test]
    fn need_truncates_at_infinity_sentinel() {
        let mdp = line(2);
        let v = LevelVector::all_infinite(3, 2);
        let a = mdp.actions_for(StateId(0))[0];
        assert_eq!(need(&mdp, a, &v), v.infinity());
    }

    #[test]
    fn act_min_picks_the_cheapest_action_breaking_ties_by_id() {
        let mdp = line(3);
        let mut v = LevelVector::all_infinite(5, 3);
        v.set_raw(StateId(0), 0);
        v.set_raw(StateId(2), 0);
        let (val, _) = act_min(&mdp, StateId(1), &v);
        assert_eq!(val, 1);
    }

    #[test]
    fn cancellation_token_reports_requested_cancellation() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
        assert!(check_cancelled(Some(&token)).is_err());
    }
}
