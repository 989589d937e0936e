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

//! The closed taxonomy of fallible conditions the core ever raises.
//!
//! Anything not listed here (an out-of-range state id, a selector queried
//! for a state it does not know about, ...) is a programmer error and is
//! reported by panicking rather than by a `Result`.

use crate::consmdp::{ActionId, StateId};
use thiserror::Error;

/// Errors surfaced by the builder, the fixed-point engine and the runtime
/// strategy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsMdpError {
    /// A structural invariant required at solve time does not hold: a
    /// state with no outgoing action, an action whose successor
    /// distribution is not normalised, or an action naming a successor
    /// that does not exist.
    #[error("invalid model: {0}")]
    InvalidModel(String),

    /// The directed graph of zero-consumption transitions contains a
    /// cycle; no fixed-point solver can be guaranteed to terminate on
    /// such a model.
    #[error("zero-consumption cycle detected at or reachable from state {0:?}")]
    NonTerminating(StateId),

    /// A cooperative cancellation token fired while a fixed-point
    /// computation was in progress. Any vector or witness table
    /// accumulated so far must be discarded.
    #[error("computation cancelled")]
    Cancelled,

    /// The counter strategy was asked to act from a state and level for
    /// which the selector has no rule, i.e. the level fell below the
    /// minimum level of the current state.
    #[error("resource exhausted in state {state:?} at level {level}")]
    Exhaustion {
        /// the state the strategy was in when it ran out of options
        state: StateId,
        /// the resource level it had left
        level: u32,
    },

    /// A strategy was constructed for a state whose minimum level is
    /// infinite: no winning strategy exists regardless of initial
    /// resource level.
    #[error("no strategy exists from state {0:?}: minimum level is infinite")]
    NoStrategy(StateId),
}

/// A convenience alias, used throughout instead of repeating
/// `Result<T, ConsMdpError>` everywhere.
pub type ConsMdpResult<T> = Result<T, ConsMdpError>;

pub(crate) fn invalid_model(msg: impl Into<String>) -> ConsMdpError {
    ConsMdpError::InvalidModel(msg.into())
}

pub(crate) fn action_not_found(a: ActionId) -> ! {
    panic!("programmer error: unknown action id {a:?}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_mention_the_offending_state() {
        let err = ConsMdpError::NonTerminating(StateId(3));
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn exhaustion_carries_state_and_level() {
        let err = ConsMdpError::Exhaustion { state: StateId(1), level: 0 };
        match err {
            ConsMdpError::Exhaustion { state, level } => {
                assert_eq!(state, StateId(1));
                assert_eq!(level, 0);
            }
            _ => panic!("wrong variant"),
        }
    }
}
