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

//! Maximal End Component decomposition, ignoring consumption.
//!
//! Only the almost-sure Büchi solver (see [`crate::engine::buchi`]) needs
//! this; everything else in the engine works directly on the graph.

use fxhash::{FxHashMap, FxHashSet};

use crate::consmdp::{ActionId, ConsMdp, StateId};

/// A maximal end component: a set of states inducing a strongly
/// connected sub-graph, together with the set of actions that stay
/// entirely within it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mec {
    states: Vec<StateId>,
    actions: Vec<ActionId>,
}

impl Mec {
    /// The states of this end component, sorted by id.
    pub fn states(&self) -> &[StateId] {
        &self.states
    }

    /// The actions of this end component, sorted by id. Every one of
    /// them has its entire successor distribution inside `states()`.
    pub fn actions(&self) -> &[ActionId] {
        &self.actions
    }

    /// Whether `s` belongs to this end component.
    pub fn contains_state(&self, s: StateId) -> bool {
        self.states.binary_search(&s).is_ok()
    }

    /// Whether `a` belongs to this end component's action set.
    pub fn contains_action(&self, a: ActionId) -> bool {
        self.actions.binary_search(&a).is_ok()
    }
}

/// Computes the list of maximal end components of `mdp`, ignoring
/// consumption entirely (the underlying MDP's transition structure
/// only).
pub fn decompose(mdp: &ConsMdp) -> Vec<Mec> {
    let mut out = Vec::new();
    let all_states: FxHashSet<StateId> = mdp.state_ids().collect();
    if !all_states.is_empty() {
        shrink(mdp, all_states, &mut out);
    }
    out.sort_by(|a, b| a.states.first().cmp(&b.states.first()));
    out
}

/// Action `a` "stays within" `states` if its full successor support is
/// a subset of `states`. These are exactly the actions allowed to
/// contribute to an end component candidate on `states`.
fn contained_actions<'a>(
    mdp: &'a ConsMdp,
    s: StateId,
    states: &'a FxHashSet<StateId>,
) -> impl Iterator<Item = ActionId> + 'a {
    mdp.actions_for(s).iter().copied().filter(move |a| {
        mdp.action(*a).distribution().all(|succ| states.contains(&succ))
    })
}

fn shrink(mdp: &ConsMdp, states: FxHashSet<StateId>, out: &mut Vec<Mec>) {
    if states.is_empty() {
        return;
    }
    for scc in tarjan_scc(mdp, &states) {
        if scc.len() == 1 {
            let s = scc[0];
            let self_looping = contained_actions(mdp, s, &states).any(|a| {
                let supp = mdp.action(a).distribution().support();
                supp.len() == 1 && supp[0] == s
            });
            if !self_looping {
                continue;
            }
        }
        let scc_set: FxHashSet<StateId> = scc.iter().copied().collect();

        let mut remaining: FxHashSet<StateId> = FxHashSet::default();
        for &s in &scc_set {
            if contained_actions(mdp, s, &scc_set).next().is_some() {
                remaining.insert(s);
            }
        }

        if remaining.len() == scc_set.len() {
            let mut actions: Vec<ActionId> = scc_set
                .iter()
                .flat_map(|&s| contained_actions(mdp, s, &scc_set))
                .collect();
            actions.sort();
            let mut mec_states: Vec<StateId> = scc_set.into_iter().collect();
            mec_states.sort();
            out.push(Mec { states: mec_states, actions });
        } else if !remaining.is_empty() {
            shrink(mdp, remaining, out);
        }
    }
}

/// Iterative Tarjan SCC restricted to the subgraph induced by `states`
/// and the actions that stay within it. Returns every component
/// (including size-1 components with no self loop, which the caller
/// filters out).
struct TarjanState<'a> {
    mdp: &'a ConsMdp,
    universe: &'a FxHashSet<StateId>,
    index: FxHashMap<StateId, u32>,
    lowlink: FxHashMap<StateId, u32>,
    on_stack: FxHashSet<StateId>,
    stack: Vec<StateId>,
    next_index: u32,
    components: Vec<Vec<StateId>>,
}

impl<'a> TarjanState<'a> {
    fn visit(&mut self, v: StateId) {
        self.index.insert(v, self.next_index);
        self.lowlink.insert(v, self.next_index);
        self.next_index += 1;
        self.stack.push(v);
        self.on_stack.insert(v);

        for w in successors(self.mdp, v, self.universe) {
            if !self.index.contains_key(&w) {
                self.visit(w);
                let w_low = self.lowlink[&w];
                let v_low = self.lowlink[&v];
                self.lowlink.insert(v, v_low.min(w_low));
            } else if self.on_stack.contains(&w) {
                let w_idx = self.index[&w];
                let v_low = self.lowlink[&v];
                self.lowlink.insert(v, v_low.min(w_idx));
            }
        }

        if self.lowlink[&v] == self.index[&v] {
            let mut component = Vec::new();
            loop {
                let w = self.stack.pop().unwrap();
                self.on_stack.remove(&w);
                component.push(w);
                if w == v {
                    break;
                }
            }
            self.components.push(component);
        }
    }
}

/// Tarjan's SCC algorithm restricted to the subgraph induced by
/// `states` and the actions that stay within it. Returns every
/// component (including size-1 components with no self loop, which
/// the caller filters out).
fn tarjan_scc(mdp: &ConsMdp, states: &FxHashSet<StateId>) -> Vec<Vec<StateId>> {
    let mut ordered: Vec<StateId> = states.iter().copied().collect();
    ordered.sort();

    let mut tarjan = TarjanState {
        mdp,
        universe: states,
        index: FxHashMap::default(),
        lowlink: FxHashMap::default(),
        on_stack: FxHashSet::default(),
        stack: Vec::new(),
        next_index: 0,
        components: Vec::new(),
    };
    for root in ordered.drain(..) {
        if !tarjan.index.contains_key(&root) {
            tarjan.visit(root);
        }
    }
    tarjan.components
}

fn successors(mdp: &ConsMdp, s: StateId, states: &FxHashSet<StateId>) -> Vec<StateId> {
    let mut succs: Vec<StateId> = contained_actions(mdp, s, states)
        .flat_map(|a| mdp.action(a).distribution().support().iter().copied())
        .collect();
    succs.sort();
    succs.dedup();
    succs
}
