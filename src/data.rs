/* Automaton data read from the canvas elements. Used to evaluate the delta function, compute
 * epsilon closures and test words, and to turn computed automata back into canvas elements. */

use crate::elements::{Canvas, CanvasSize, Link, StateNode};
use crate::fa::{split_options, Symbol, FA};
use bitvec::prelude::*;
use indexmap::IndexMap;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use tracing::trace;

/// A set of states stored as a bitvec together with its hash, so that it can be used as a map key
/// without re-hashing the bits on every lookup.
#[derive(Clone)]
pub struct StateSet {
    bv: BitVec<u8>,
    hash: u64,
}

impl StateSet {
    pub fn new(bv: BitVec<u8>) -> Self {
        let mut hasher = DefaultHasher::new();
        bv.hash(&mut hasher);
        let hash = hasher.finish();
        Self { bv, hash }
    }

    /// Build a set over `num_states` states. Indices outside the range are ignored.
    pub fn from_states<I: IntoIterator<Item = usize>>(num_states: usize, states: I) -> Self {
        let mut bv: BitVec<u8> = BitVec::repeat(false, num_states);
        for state in states {
            if state < num_states {
                bv.set(state, true);
            }
        }
        Self::new(bv)
    }

    pub fn contains(&self, state: usize) -> bool {
        self.bv.get(state).map(|bit| *bit).unwrap_or(false)
    }

    /// Member states in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.bv.iter_ones()
    }

    pub fn len(&self) -> usize {
        self.bv.count_ones()
    }

    pub fn is_empty(&self) -> bool {
        self.bv.not_any()
    }

    /// Identifying string of the set, its sorted indices joined by commas, e.g. `0,2,4`.
    pub fn key(&self) -> String {
        self.iter()
            .map(|state| state.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Hash for StateSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl PartialEq for StateSet {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.bv == other.bv
    }
}

impl Eq for StateSet {}

impl fmt::Debug for StateSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FAState {
    name: String,
    transitions: IndexMap<Symbol, Vec<usize>>,
}

impl FAState {
    fn new(name: &str) -> Self {
        FAState {
            name: name.to_string(),
            transitions: IndexMap::new(),
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    /// Outgoing transitions in the order they were added.
    pub fn get_transitions(&self) -> &IndexMap<Symbol, Vec<usize>> {
        &self.transitions
    }

    fn add_transition(&mut self, symbol: Symbol, to: usize) {
        let targets = self.transitions.entry(symbol).or_default();
        if !targets.contains(&to) {
            targets.push(to);
        }
    }
}

/// Index addressed automaton. A state's index is its identifier, `starting_state` is None when
/// no start was designated.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FAData {
    states: Vec<FAState>,
    starting_state: Option<usize>,
    accepting_states: BitVec<u8>,
}

impl FAData {
    pub fn new() -> Self {
        FAData::default()
    }

    /// Build an automaton from canvas elements.
    pub fn from_canvas(canvas: &Canvas) -> Self {
        let mut fa = FAData::new();
        fa.load(canvas);
        fa
    }

    /// Reset this automaton and load the states and links of `canvas` into it. When several
    /// start designations are present the last one wins.
    pub fn load(&mut self, canvas: &Canvas) {
        *self = FAData::new();

        for node in canvas.nodes.iter() {
            let state_id = self.add_state(&node.text);
            if node.is_accept_state {
                self.set_accepting(state_id, true);
            }
        }

        let num_states = self.get_num_states();

        for link in canvas.links.iter() {
            match link {
                Link::Edge { from, to, text } if *from < num_states && *to < num_states => {
                    for option in split_options(text) {
                        self.add_transition(*from, Symbol::parse(option), *to);
                    }
                }
                Link::SelfLoop { node, text } if *node < num_states => {
                    for option in split_options(text) {
                        self.add_transition(*node, Symbol::parse(option), *node);
                    }
                }
                Link::Start { node } if *node < num_states => {
                    self.starting_state = Some(*node);
                }
                _ => trace!("skipping link to a missing state: {:?}", link),
            }
        }
    }

    /// Create canvas elements for this automaton. Every node is placed at a random position
    /// inside `bounds`; all labels between the same pair of states share one link.
    pub fn create_elements(&self, bounds: CanvasSize, rng: &mut fastrand::Rng) -> Canvas {
        let mut canvas = Canvas::new();

        for (state_id, state) in self.states.iter().enumerate() {
            let position = bounds.random_point(rng);
            canvas.add_node(StateNode::new(
                &state.name,
                position,
                self.is_accepting(state_id),
            ));
        }

        for (from, state) in self.states.iter().enumerate() {
            let mut labels_by_target: IndexMap<usize, Vec<String>> = IndexMap::new();

            for (symbol, targets) in state.transitions.iter() {
                for to in targets {
                    labels_by_target
                        .entry(*to)
                        .or_default()
                        .push(symbol.to_string());
                }
            }

            for (to, labels) in labels_by_target {
                canvas.add_link(Link::transition(from, to, &labels.join(",")));
            }
        }

        if let Some(start) = self.starting_state {
            canvas.add_link(Link::Start { node: start });
        }

        canvas
    }

    pub fn add_state(&mut self, name: &str) -> usize {
        let state_id = self.states.len();
        self.states.push(FAState::new(name));
        self.accepting_states.push(false);
        state_id
    }

    pub fn get_state(&self, state_id: usize) -> Option<&FAState> {
        self.states.get(state_id)
    }

    pub fn state_names(&self) -> Vec<&str> {
        self.states.iter().map(|state| state.name.as_str()).collect()
    }

    pub fn set_starting_state(&mut self, state_id: Option<usize>) {
        self.starting_state = state_id.filter(|id| *id < self.states.len());
    }

    pub fn set_accepting(&mut self, state_id: usize, accepting: bool) {
        if state_id < self.accepting_states.len() {
            self.accepting_states.set(state_id, accepting);
        }
    }

    pub fn is_accepting(&self, state_id: usize) -> bool {
        self.accepting_states
            .get(state_id)
            .map(|bit| *bit)
            .unwrap_or(false)
    }

    /// Add one transition. Targets behave as a set, repeated additions are ignored.
    pub fn add_transition(&mut self, from: usize, symbol: Symbol, to: usize) {
        if to >= self.states.len() {
            return;
        }
        if let Some(state) = self.states.get_mut(from) {
            state.add_transition(symbol, to);
        }
    }

    pub fn add_transitions(&mut self, from: usize, symbol: &Symbol, to: &[usize]) {
        for target in to {
            self.add_transition(from, symbol.clone(), *target);
        }
    }

    /// Targets reached from `state` by `symbol` alone, without following epsilon moves.
    pub fn shallow_delta(&self, state: usize, symbol: &Symbol) -> &[usize] {
        self.states
            .get(state)
            .and_then(|state| state.transitions.get(symbol))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All states reachable from `states` through epsilon transitions, including the states
    /// themselves. Explored with an explicit stack, states already in the closure are never pushed
    /// again so epsilon cycles terminate.
    pub fn epsilon_closure<I: IntoIterator<Item = usize>>(&self, states: I) -> StateSet {
        let num_states = self.get_num_states();
        let mut closure: BitVec<u8> = BitVec::repeat(false, num_states);
        let mut stack: Vec<usize> = Vec::new();

        for state in states {
            if state < num_states && !closure[state] {
                closure.set(state, true);
                stack.push(state);
            }
        }

        while let Some(top) = stack.pop() {
            for &target in self.shallow_delta(top, &Symbol::Epsilon) {
                if !closure[target] {
                    closure.set(target, true);
                    stack.push(target);
                }
            }
        }

        StateSet::new(closure)
    }

    /// Targets reached from `state` by `symbol`, allowing epsilon moves before and after it.
    /// For `Symbol::Epsilon` this is the epsilon closure of `state`.
    pub fn deep_delta(&self, state: usize, symbol: &Symbol) -> StateSet {
        if symbol.is_epsilon() {
            return self.epsilon_closure([state]);
        }

        let starts = self.epsilon_closure([state]);
        let shallow_targets: Vec<usize> = starts
            .iter()
            .flat_map(|from| self.shallow_delta(from, symbol).iter().copied())
            .collect();

        self.epsilon_closure(shallow_targets)
    }

    /// True when no transition is an epsilon move and no label leads to more than one state.
    pub fn is_deterministic(&self) -> bool {
        self.states.iter().all(|state| {
            state
                .transitions
                .iter()
                .all(|(symbol, targets)| !symbol.is_epsilon() && targets.len() <= 1)
        })
    }

    /// Every non epsilon label used by any transition, in first use order.
    pub fn labels(&self) -> Vec<&Symbol> {
        let mut labels: Vec<&Symbol> = Vec::new();
        for state in self.states.iter() {
            for symbol in state.transitions.keys() {
                if !symbol.is_epsilon() && !labels.contains(&symbol) {
                    labels.push(symbol);
                }
            }
        }
        labels
    }

    /// Run the automaton over a word given as a sequence of labels.
    pub fn accepts(&self, word: &[&str]) -> bool {
        let Some(start) = self.starting_state else {
            return false;
        };

        let mut current = self.epsilon_closure([start]);

        for label in word {
            let symbol = Symbol::parse(label);
            if symbol.is_epsilon() {
                continue;
            }

            let targets: Vec<usize> = current
                .iter()
                .flat_map(|state| self.shallow_delta(state, &symbol).iter().copied())
                .collect();
            current = self.epsilon_closure(targets);

            if current.is_empty() {
                return false;
            }
        }

        let accepted = current.iter().any(|state| self.is_accepting(state));
        accepted
    }
}

impl FA for FAData {
    fn get_num_states(&self) -> usize {
        self.states.len()
    }

    fn get_start_state(&self) -> Option<usize> {
        self.starting_state
    }

    fn get_acceptor_states(&self) -> &BitVec<u8> {
        &self.accepting_states
    }

    fn get_state_name(&self, state_id: usize) -> &str {
        self.states
            .get(state_id)
            .map(|state| state.name.as_str())
            .unwrap_or_default()
    }

    fn get_state_transitions(&self, state_id: usize) -> Vec<(&Symbol, &usize)> {
        let mut transition_list: Vec<(&Symbol, &usize)> = Vec::new();
        if let Some(state) = self.states.get(state_id) {
            for (symbol, targets) in state.transitions.iter() {
                for target in targets {
                    transition_list.push((symbol, target));
                }
            }
        }
        transition_list
    }
}

#[cfg(test)]
mod data_tests {
    use super::*;
    use crate::elements::Point;

    fn node(text: &str, accept: bool) -> StateNode {
        StateNode::new(text, Point { x: 10.0, y: 20.0 }, accept)
    }

    fn label(text: &str) -> Symbol {
        Symbol::Label(text.to_string())
    }

    // q0 -\epsilon-> q1 -a-> q2 -\epsilon-> q3, q1 -a,b-> q1, q3 accepting, q0 start
    fn sample_canvas() -> Canvas {
        let mut canvas = Canvas::new();
        let q0 = canvas.add_node(node("q0", false));
        let q1 = canvas.add_node(node("q1", false));
        let q2 = canvas.add_node(node("q2", false));
        let q3 = canvas.add_node(node("q3", true));
        canvas.add_link(Link::Start { node: q0 });
        canvas.add_link(Link::transition(q0, q1, "\\epsilon"));
        canvas.add_link(Link::transition(q1, q2, "a"));
        canvas.add_link(Link::transition(q2, q3, "\\epsilon"));
        canvas.add_link(Link::transition(q1, q1, "a, b"));
        canvas
    }

    #[test]
    fn test_load() {
        let fa = FAData::from_canvas(&sample_canvas());

        assert_eq!(fa.state_names(), vec!["q0", "q1", "q2", "q3"]);
        assert_eq!(fa.get_start_state(), Some(0));
        assert_eq!(
            fa.get_acceptor_states().iter_ones().collect::<Vec<_>>(),
            vec![3]
        );
        assert_eq!(fa.shallow_delta(0, &Symbol::Epsilon), &[1]);
        assert_eq!(fa.shallow_delta(1, &label("a")), &[2, 1]);
        assert_eq!(fa.shallow_delta(1, &label("b")), &[1]);
        assert!(fa.shallow_delta(3, &label("a")).is_empty());
    }

    #[test]
    fn test_load_resets_and_takes_last_start() {
        let mut canvas = sample_canvas();
        canvas.add_link(Link::Start { node: 2 });

        let mut fa = FAData::from_canvas(&canvas);
        assert_eq!(fa.get_start_state(), Some(2));

        let mut empty = Canvas::new();
        empty.add_node(node("only", false));
        fa.load(&empty);
        assert_eq!(fa.get_num_states(), 1);
        assert_eq!(fa.get_start_state(), None);
        assert!(fa.get_state_transitions(0).is_empty());
    }

    #[test]
    fn test_is_deterministic() {
        let fa = FAData::from_canvas(&sample_canvas());
        assert!(!fa.is_deterministic());

        let mut dfa = FAData::new();
        let s0 = dfa.add_state("s0");
        let s1 = dfa.add_state("s1");
        dfa.add_transition(s0, label("a"), s1);
        dfa.add_transition(s0, label("a"), s1);
        dfa.add_transition(s1, label("b"), s0);
        assert!(dfa.is_deterministic());

        dfa.add_transition(s0, label("a"), s0);
        assert!(!dfa.is_deterministic());

        let mut eps = FAData::new();
        let e0 = eps.add_state("e0");
        eps.add_transition(e0, Symbol::Epsilon, e0);
        assert!(!eps.is_deterministic());
    }

    #[test]
    fn test_epsilon_closure_includes_input_and_is_fixpoint() {
        let fa = FAData::from_canvas(&sample_canvas());

        let closure = fa.epsilon_closure([0]);
        assert_eq!(closure.iter().collect::<Vec<_>>(), vec![0, 1]);

        let again = fa.epsilon_closure(closure.iter());
        assert_eq!(closure, again);

        for state in 0..fa.get_num_states() {
            assert!(fa.epsilon_closure([state]).contains(state));
        }
    }

    #[test]
    fn test_epsilon_cycle_terminates() {
        let mut fa = FAData::new();
        let a = fa.add_state("a");
        let b = fa.add_state("b");
        let c = fa.add_state("c");
        fa.add_transition(a, Symbol::Epsilon, b);
        fa.add_transition(b, Symbol::Epsilon, c);
        fa.add_transition(c, Symbol::Epsilon, a);

        assert_eq!(fa.epsilon_closure([b]).len(), 3);
        assert_eq!(fa.epsilon_closure([b]).key(), "0,1,2");
    }

    #[test]
    fn test_deep_delta() {
        let fa = FAData::from_canvas(&sample_canvas());

        let targets = fa.deep_delta(0, &label("a"));
        assert_eq!(targets.key(), "1,2,3");

        let targets = fa.deep_delta(0, &label("b"));
        assert_eq!(targets.key(), "1");

        assert!(fa.deep_delta(3, &label("a")).is_empty());
        assert_eq!(fa.deep_delta(0, &Symbol::Epsilon).key(), "0,1");
    }

    #[test]
    fn test_accepts() {
        let fa = FAData::from_canvas(&sample_canvas());

        assert!(fa.accepts(&["a"]));
        assert!(fa.accepts(&["b", "b", "a"]));
        assert!(!fa.accepts(&[]));
        assert!(!fa.accepts(&["b"]));
        assert!(!fa.accepts(&["c"]));

        let mut no_start = FAData::from_canvas(&sample_canvas());
        no_start.set_starting_state(None);
        assert!(!no_start.accepts(&["a"]));
    }

    #[test]
    fn test_labels() {
        let fa = FAData::from_canvas(&sample_canvas());
        assert_eq!(fa.labels(), vec![&label("a"), &label("b")]);
    }

    #[test]
    fn test_create_elements_round_trip() {
        let fa = FAData::from_canvas(&sample_canvas());
        let mut rng = fastrand::Rng::with_seed(42);
        let canvas = fa.create_elements(CanvasSize::default(), &mut rng);

        assert_eq!(canvas.nodes.len(), 4);
        assert!(canvas.is_start(0));
        assert!(canvas.nodes[3].is_accept_state);
        assert!(canvas
            .links
            .contains(&Link::transition(1, 1, "a,b")));
        assert!(canvas
            .links
            .contains(&Link::transition(0, 1, "\\epsilon")));

        let reloaded = FAData::from_canvas(&canvas);
        for word in [
            vec![],
            vec!["a"],
            vec!["b"],
            vec!["a", "b", "a"],
            vec!["b", "b", "a"],
        ] {
            assert_eq!(fa.accepts(&word), reloaded.accepts(&word), "word {:?}", word);
        }
    }

    #[test]
    fn test_add_transitions_unions_targets() {
        let mut fa = FAData::new();
        let s0 = fa.add_state("s0");
        let s1 = fa.add_state("s1");
        let s2 = fa.add_state("s2");

        fa.add_transitions(s0, &label("a"), &[s1]);
        fa.add_transitions(s0, &label("a"), &[s2, s1, s2]);
        assert_eq!(fa.shallow_delta(s0, &label("a")), &[s1, s2]);

        // Targets outside the automaton are ignored
        fa.add_transitions(s0, &label("a"), &[7]);
        fa.add_transitions(s0, &label("b"), &[9]);
        assert_eq!(fa.shallow_delta(s0, &label("a")), &[s1, s2]);
        assert!(fa.shallow_delta(s0, &label("b")).is_empty());
        assert!(!fa.is_deterministic());

        fa.add_transitions(s1, &Symbol::Epsilon, &[s2]);
        assert_eq!(fa.deep_delta(s0, &label("a")), StateSet::from_states(3, [s1, s2]));
    }

    #[test]
    fn test_state_set() {
        let set = StateSet::from_states(5, [4, 0, 2, 9]);
        assert_eq!(set.key(), "0,2,4");
        assert_eq!(set.len(), 3);
        assert!(set.contains(2));
        assert!(!set.contains(9));
        assert_eq!(set, StateSet::from_states(5, [0, 2, 4]));
        assert!(StateSet::from_states(3, []).is_empty());
    }
}
