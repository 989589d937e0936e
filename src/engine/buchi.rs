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

//! The almost-sure Büchi objective: visit the target set `T` infinitely
//! often, almost surely, without ever running out of energy.
//!
//! The good set `G` starts empty and grows monotonically:
//!
//! 1. Decompose the graph into maximal end components (ignoring
//!    consumption; see [`crate::mec`]).
//! 2. For every MEC, run almost-sure reachability *confined to that
//!    MEC* targeting `T` on the first round, or the current `G`
//!    restricted to the MEC on every later round. Any state the MEC
//!    can use to recur into that seed forever contributes its level to
//!    the next round's candidate set. A MEC that never touches `T`
//!    (directly, or once `G` has grown to include one of its states)
//!    contributes nothing -- this is what keeps a one-shot, non-cyclic
//!    target out of `G`: reaching it once is not the same as being able
//!    to revisit it.
//! 3. Run one global almost-sure reachability pass towards the union of
//!    every MEC's contribution.
//! 4. The states with a finite result become the new `G`. If `G` did
//!    not change, stop; otherwise repeat.
//!
//! `G` is bounded above by the whole state space and never shrinks
//! once a round adds to it, so it converges in at most `|S|` rounds.

use fxhash::FxHashSet;

use crate::consmdp::{ConsMdp, StateId};
use crate::engine::as_reach::{almost_sure_reach, almost_sure_reach_within};
use crate::engine::{check_cancelled, CancellationToken, LevelVector, WitnessMap};
use crate::error::ConsMdpResult;

/// Computes the almost-sure Büchi level vector for target set `T`,
/// given the safe-level vector already computed for the same capacity.
pub fn almost_sure_buchi(
    mdp: &ConsMdp,
    capacity: u32,
    safe: &LevelVector,
    targets: &FxHashSet<StateId>,
    cancellation: Option<&CancellationToken>,
) -> ConsMdpResult<(LevelVector, WitnessMap)> {
    let mecs = mdp.mecs();
    let mut g: FxHashSet<StateId> = FxHashSet::default();
    let n = mdp.num_states();

    let mut round = 0u64;
    loop {
        check_cancelled(cancellation)?;
        let mut contributed: FxHashSet<StateId> = FxHashSet::default();

        for mec in &mecs {
            let mec_states: FxHashSet<StateId> = mec.states().iter().copied().collect();
            let seed: FxHashSet<StateId> = if round == 0 {
                mec_states.intersection(targets).copied().collect()
            } else {
                mec_states.intersection(&g).copied().collect()
            };
            if seed.is_empty() {
                continue;
            }
            let (local_v, _) = almost_sure_reach_within(mdp, capacity, safe, &seed, &mec_states, cancellation)?;
            contributed.extend(mec_states.iter().copied().filter(|s| local_v.get(*s).is_some()));
        }

        let (global_v, global_witness) = almost_sure_reach(mdp, capacity, safe, &contributed, cancellation)?;
        let new_g: FxHashSet<StateId> = mdp.state_ids().filter(|s| global_v.get(*s).is_some()).collect();

        round += 1;
        if new_g == g {
            log::debug!("buchi: good set stabilised after {round} round(s), |G| = {}", g.len());
            return Ok((global_v, global_witness));
        }
        debug_assert!(round <= n as u64 + 1, "almost-sure Büchi did not converge within |S| rounds");
        log::trace!("buchi: round {round} grew the good set to {} state(s)", new_g.len());
        g = new_g;
    }
}
