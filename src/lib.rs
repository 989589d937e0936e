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

//! # consmdp
//!
//! `consmdp` performs qualitative controller synthesis for Consumption
//! Markov Decision Processes: probabilistic decision models of
//! resource-constrained agents. Given a [`ConsMdp`], an integer
//! resource capacity, and a qualitative objective over a target set,
//! it decides for every state the minimum initial resource level from
//! which an objective-satisfying strategy exists, and produces such a
//! strategy in a compact, finite-memory representation.
//!
//! ## Quick example
//!
//! A two-state model where `s0` is a reload: each hop costs one unit
//! of energy, and we ask for the minimum level that lets every state
//! survive forever.
//!
//! ```
//! use consmdp::prelude::*;
//!
//! let mut mdp = ConsMdp::new();
//! let s0 = mdp.new_state(Some("s0"), true);
//! let s1 = mdp.new_state(Some("s1"), false);
//! mdp.add_action(s0, Distribution::point_mass(s1), "go", 1).unwrap();
//! mdp.add_action(s1, Distribution::point_mass(s0), "back", 1).unwrap();
//! mdp.freeze().unwrap();
//!
//! let targets = Default::default();
//! let config = SolveConfig::new(2);
//! let (levels, selector) = solve(&mdp, &targets, Objective::Safety, &config).unwrap();
//!
//! assert_eq!(levels.get(s0), Some(0));
//! assert_eq!(levels.get(s1), Some(1));
//!
//! let mut strategy = Strategy::new(&mdp, &selector, 2, s0, 0).unwrap();
//! for _ in 0..10 {
//!     let next = if strategy.state() == s0 { s1 } else { s0 };
//!     strategy.step(next).unwrap();
//! }
//! ```
//!
//! ## Layout
//!
//! The crate is organised leaves-first, each module depending only on
//! the ones above it:
//!
//! - [`distribution`] -- finite discrete probability distributions.
//! - [`consmdp`] -- the graph data model: states, actions, the builder.
//! - [`mec`] -- Maximal End Component decomposition, needed only by the
//!   Büchi solver.
//! - [`engine`] -- the fixed-point engine computing minimum levels for
//!   the four qualitative objectives, and the single [`engine::solve`]
//!   dispatch entry point.
//! - [`selector`] -- finite-memory selectors derived from the engine's
//!   witness tables.
//! - [`strategy`] -- the counter strategy: a selector bundled with a
//!   resource counter that a simulator can drive step by step.
//! - [`product`] -- the labelled-ConsMDP product with an externally
//!   supplied deterministic Büchi automaton.
//! - [`error`] -- the closed taxonomy of fallible conditions this crate
//!   ever raises.

pub mod consmdp;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod mec;
pub mod product;
pub mod selector;
pub mod strategy;

/// Re-exports the types most callers need, so that
/// `use consmdp::prelude::*;` is usually enough.
pub mod prelude {
    pub use crate::consmdp::{Action, ActionId, ConsMdp, StateId};
    pub use crate::distribution::Distribution;
    pub use crate::engine::{solve, CancellationToken, LevelVector, Objective, SolveConfig};
    pub use crate::error::{ConsMdpError, ConsMdpResult};
    pub use crate::mec::Mec;
    pub use crate::selector::Selector;
    pub use crate::strategy::Strategy;
    /// The target-set type every `solve` call and engine function
    /// expects; re-exported so callers don't need their own `fxhash`
    /// dependency just to build one.
    pub use fxhash::FxHashSet;
}
