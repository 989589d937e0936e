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

//! The almost-sure reachability objective.
//!
//! A single positive-reachability computation is not enough: an action
//! can have positive probability of reaching the target while also
//! having positive probability of drifting into a trap from which the
//! target is unreachable, which would make reaching it *possible* but
//! not *almost sure*. The fix is the standard "peeling" iteration: start
//! from the set `U` of every state, repeatedly recompute positive
//! reachability allowing only actions whose entire support stays inside
//! the current `U`, shrink `U` to the states that still have a finite
//! value, and stop when `U` no longer shrinks. Every round removes at
//! least one state or stops, so this terminates within `|S|` rounds.

use fxhash::FxHashSet;

use crate::consmdp::{ActionId, ConsMdp, StateId};
use crate::engine::safety::derive_witness;
use crate::engine::{act_min_constrained, check_cancelled, reload_collapse, CancellationToken, LevelVector, WitnessMap};
use crate::error::ConsMdpResult;

/// Computes the almost-sure reachability level vector for target set
/// `T`, given the safe-level vector already computed for the same
/// capacity.
pub fn almost_sure_reach(
    mdp: &ConsMdp,
    capacity: u32,
    safe: &LevelVector,
    targets: &FxHashSet<StateId>,
    cancellation: Option<&CancellationToken>,
) -> ConsMdpResult<(LevelVector, WitnessMap)> {
    let universe: FxHashSet<StateId> = mdp.state_ids().collect();
    almost_sure_reach_within(mdp, capacity, safe, targets, &universe, cancellation)
}

/// Like [`almost_sure_reach`], but the peeling starts from (and never
/// leaves) `universe` rather than the whole state space. Used by the
/// Büchi solver to run a self-contained almost-sure reachability
/// computation inside a single maximal end component.
pub(crate) fn almost_sure_reach_within(
    mdp: &ConsMdp,
    capacity: u32,
    safe: &LevelVector,
    targets: &FxHashSet<StateId>,
    universe: &FxHashSet<StateId>,
    cancellation: Option<&CancellationToken>,
) -> ConsMdpResult<(LevelVector, WitnessMap)> {
    let mut u: FxHashSet<StateId> = universe.clone();

    let mut peel = 0u64;
    loop {
        check_cancelled(cancellation)?;
        let (v, witness) = restricted_positive_reach(mdp, capacity, safe, targets, &u, cancellation)?;
        let next_u: FxHashSet<StateId> = u.iter().copied().filter(|s| v.get(*s).is_some()).collect();
        peel += 1;
        if next_u == u {
            log::debug!("as_reach: U stabilised after {peel} peeling round(s)");
            return Ok((v, witness));
        }
        debug_assert!(
            peel <= universe.len() as u64 + 1,
            "almost-sure reachability peeling did not converge within |S| rounds"
        );
        log::trace!("as_reach: peeling round {peel} shrank U to {} state(s)", next_u.len());
        u = next_u;
    }
}

/// Positive reachability restricted to actions whose full successor
/// support lies inside `allowed`, on top of the usual safe-level
/// eligibility filter.
pub(crate) fn restricted_positive_reach(
    mdp: &ConsMdp,
    capacity: u32,
    safe: &LevelVector,
    targets: &FxHashSet<StateId>,
    allowed: &FxHashSet<StateId>,
    cancellation: Option<&CancellationToken>,
) -> ConsMdpResult<(LevelVector, WitnessMap)> {
    let n = mdp.num_states();
    let mut v = LevelVector::all_infinite(capacity, n);
    for &t in targets {
        if allowed.contains(&t) {
            v.set_raw(t, 0);
        }
    }

    let is_eligible = |mdp: &ConsMdp, a: ActionId, v: &LevelVector| {
        mdp.action(a)
            .distribution()
            .all(|succ| allowed.contains(&succ) && v.raw(succ) <= safe.raw(succ))
    };

    let max_rounds = (n as u64) * (capacity as u64 + 2) + 1;
    let mut round = 0u64;
    loop {
        check_cancelled(cancellation)?;
        let mut next = v.clone();
        let mut changed = false;
        for s in mdp.state_ids() {
            if !allowed.contains(&s) || targets.contains(&s) {
                continue;
            }
            let new_val = match act_min_constrained(mdp, s, &v, |a| is_eligible(mdp, a, &v)) {
                Some((val, _)) if mdp.is_reload(s) => reload_collapse(val, capacity),
                Some((val, _)) => val,
                None => v.infinity(),
            };
            if new_val != v.raw(s) {
                changed = true;
            }
            next.set_raw(s, new_val);
        }
        v = next;
        round += 1;
        if !changed {
            break;
        }
        debug_assert!(round <= max_rounds, "restricted positive reachability did not converge");
    }

    let witness = derive_witness(mdp, &v, |mdp, s, v| {
        match act_min_constrained(mdp, s, v, |a| is_eligible(mdp, a, v)) {
            Some((val, a)) if mdp.is_reload(s) => (reload_collapse(val, capacity), a),
            Some((val, a)) => (val, a),
            None => (v.infinity(), mdp.actions_for(s)[0]),
        }
    });
    Ok((v, witness))
}
