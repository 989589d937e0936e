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

//! Finite discrete probability distributions over state identifiers.

use crate::consmdp::StateId;
use crate::error::{invalid_model, ConsMdpResult};

/// Tolerance within which a distribution's weights are allowed to sum to
/// something other than exactly one.
pub const NORMALISATION_TOLERANCE: f64 = 1e-9;

/// A finite discrete probability distribution over [`StateId`]s.
///
/// Internally the support is kept sorted by id in two parallel arrays, which
/// is what lets the MEC shrinking pass (see [`crate::mec`]) test "does this
/// distribution stay within a candidate state set" with a linear merge
/// rather than a hash lookup per successor.
#[derive(Debug, Clone)]
pub struct Distribution {
    support: Vec<StateId>,
    weights: Vec<f64>,
}

impl Distribution {
    /// Builds a distribution from a mapping of state id to (unnormalised
    /// tolerance aside) probability weight.
    ///
    /// Fails if any weight is non-positive, or if the weights do not sum to
    /// one within [`NORMALISATION_TOLERANCE`].
    pub fn new(mapping: impl IntoIterator<Item = (StateId, f64)>) -> ConsMdpResult<Self> {
        let mut entries: Vec<(StateId, f64)> = mapping.into_iter().collect();
        if entries.is_empty() {
            return Err(invalid_model("distribution has empty support"));
        }
        entries.sort_by_key(|(s, _)| *s);
        for (s, w) in &entries {
            if !(*w > 0.0) || !w.is_finite() {
                return Err(invalid_model(format!(
                    "distribution weight for state {s:?} is not a positive finite number"
                )));
            }
        }
        for window in entries.windows(2) {
            if window[0].0 == window[1].0 {
                return Err(invalid_model(format!(
                    "distribution lists state {:?} more than once",
                    window[0].0
                )));
            }
        }
        let total: f64 = entries.iter().map(|(_, w)| w).sum();
        if (total - 1.0).abs() > NORMALISATION_TOLERANCE {
            return Err(invalid_model(format!(
                "distribution weights sum to {total}, not 1 (tolerance {NORMALISATION_TOLERANCE})"
            )));
        }
        let (support, weights) = entries.into_iter().unzip();
        Ok(Distribution { support, weights })
    }

    /// Builds a distribution from exact rational weights, expressed as
    /// `(numerator, denominator)` pairs sharing a common denominator is not
    /// required. Useful when the caller wants to avoid floating-point
    /// normalisation error entirely.
    pub fn from_rational(mapping: impl IntoIterator<Item = (StateId, u64, u64)>) -> ConsMdpResult<Self> {
        let floats = mapping.into_iter().map(|(s, num, den)| {
            if den == 0 {
                (s, f64::NAN)
            } else {
                (s, num as f64 / den as f64)
            }
        });
        Self::new(floats)
    }

    /// A single-state, probability-one distribution. Common enough (every
    /// deterministic action is one of these) to warrant a constructor.
    pub fn point_mass(s: StateId) -> Self {
        Distribution { support: vec![s], weights: vec![1.0] }
    }

    /// The support of this distribution, sorted by state id.
    pub fn support(&self) -> &[StateId] {
        &self.support
    }

    /// The probability assigned to `s`, or `0.0` if `s` is not in the
    /// support.
    pub fn probability(&self, s: StateId) -> f64 {
        match self.support.binary_search(&s) {
            Ok(idx) => self.weights[idx],
            Err(_) => 0.0,
        }
    }

    /// Whether every state in the support satisfies `pred`.
    pub fn all(&self, mut pred: impl FnMut(StateId) -> bool) -> bool {
        self.support.iter().all(|s| pred(*s))
    }
}

impl PartialEq for Distribution {
    fn eq(&self, other: &Self) -> bool {
        self.support == other.support && self.weights == other.weights
    }
}
