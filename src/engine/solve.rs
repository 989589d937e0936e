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

//! The single dispatch entry point tying the four objectives together.

use std::fmt;

use fxhash::FxHashSet;

use crate::consmdp::{ConsMdp, StateId};
use crate::engine::{
    almost_sure_buchi, almost_sure_reach, positive_reach, safety_levels, CancellationToken, LevelVector,
};
use crate::error::ConsMdpResult;
use crate::selector::Selector;

/// Which of the four qualitative objectives to solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    /// Survive forever, visiting no target in particular.
    Safety,
    /// Reach the target set with positive probability, without ever
    /// running out of energy.
    PosReach,
    /// Reach the target set almost surely, without ever running out of
    /// energy.
    AsReach,
    /// Visit the target set infinitely often, almost surely, without
    /// ever running out of energy.
    Buchi,
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Objective::Safety => "Safety",
            Objective::PosReach => "PosReach",
            Objective::AsReach => "AsReach",
            Objective::Buchi => "Buchi",
        };
        write!(f, "{name}")
    }
}

/// Parameters shared by every call to [`solve`].
#[derive(Debug, Clone, Default)]
pub struct SolveConfig {
    /// The energy capacity: the maximum level a reload can top a run
    /// back up to.
    pub capacity: u32,
    /// An optional cooperative cancellation token for long-running
    /// fixed-point computations.
    pub cancellation: Option<CancellationToken>,
}

impl SolveConfig {
    /// Builds a configuration with the given capacity and no
    /// cancellation token.
    pub fn new(capacity: u32) -> Self {
        SolveConfig { capacity, cancellation: None }
    }

    /// Attaches a cancellation token to this configuration.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// Solves `objective` on `mdp` for the given `targets`, returning the
/// minimum-level vector and a [`Selector`] realising it.
///
/// `targets` is ignored for [`Objective::Safety`], which has none.
///
/// # Panics
///
/// Panics if `mdp` has not been [frozen](ConsMdp::freeze). This is a
/// programmer error: every objective depends on the reverse index and
/// the zero-consumption-cycle check that freezing performs.
pub fn solve(
    mdp: &ConsMdp,
    targets: &FxHashSet<StateId>,
    objective: Objective,
    config: &SolveConfig,
) -> ConsMdpResult<(LevelVector, Selector)> {
    assert!(mdp.is_frozen(), "solve() requires a frozen ConsMdp; call freeze() first");

    let cancellation = config.cancellation.as_ref();
    let capacity = config.capacity;

    let (safe, safe_witness) = safety_levels(mdp, capacity, cancellation)?;
    if objective == Objective::Safety {
        let selector = Selector::from_levels(mdp, &safe, &safe_witness);
        log::info!("solved Safety: {} winning state(s)", selector.winning_count());
        return Ok((safe, selector));
    }

    let (pos, pos_witness) = positive_reach(mdp, capacity, &safe, targets, cancellation)?;
    if objective == Objective::PosReach {
        let selector = Selector::from_levels(mdp, &pos, &pos_witness);
        log::info!("solved PosReach: {} winning state(s)", selector.winning_count());
        return Ok((pos, selector));
    }

    let (asr, asr_witness) = almost_sure_reach(mdp, capacity, &safe, targets, cancellation)?;
    if objective == Objective::AsReach {
        let selector = Selector::from_levels(mdp, &asr, &asr_witness);
        log::info!("solved AsReach: {} winning state(s)", selector.winning_count());
        return Ok((asr, selector));
    }

    let (buchi, buchi_witness) = almost_sure_buchi(mdp, capacity, &safe, targets, cancellation)?;
    let selector = Selector::from_levels(mdp, &buchi, &buchi_witness);
    log::info!("solved Buchi: {} winning state(s)", selector.winning_count());
    Ok((buchi, selector))
}
