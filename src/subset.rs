/* Perform subset construction to convert an NFA with epsilon transitions into an equivalent DFA.
 * Each DFA state stands for the epsilon closed set of NFA states it was reached with. */

use crate::data::{FAData, StateSet};
use crate::elements::{Canvas, CanvasSize};
use crate::fa::{Symbol, FA};
use crate::minimize::construct_minimal_dfa;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubsetError {
    AlreadyDeterministic,
    NoStartingState,
}

impl fmt::Display for SubsetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubsetError::AlreadyDeterministic => {
                write!(f, "Tried to perform subset construction on a DFA.")
            }
            SubsetError::NoStartingState => write!(
                f,
                "FA has no starting state so subset construction failed."
            ),
        }
    }
}

impl std::error::Error for SubsetError {}

/// Display name of a DFA state: the sorted names of its NFA states, e.g. `{q0,q1}`.
fn set_name(nfa: &FAData, set: &StateSet) -> String {
    let mut names: Vec<&str> = set.iter().map(|state| nfa.get_state_name(state)).collect();
    names.sort_unstable();
    format!("{{{}}}", names.join(","))
}

fn is_accepting_set(nfa: &FAData, set: &StateSet) -> bool {
    set.iter().any(|state| nfa.is_accepting(state))
}

/// Apply the subset construction algorithm on an automaton with a starting state. DFA state 0 is
/// the closure of the NFA start. Unexplored sets are kept on a stack, so new states are numbered
/// in depth first discovery order, and labels are visited per member state in ascending state
/// order and per state in the order they were added.
pub fn construct_dfa(nfa: &FAData) -> Result<FAData, SubsetError> {
    let n0 = nfa
        .get_start_state()
        .ok_or(SubsetError::NoStartingState)?;

    let mut result = FAData::new();
    let mut q_list: HashMap<StateSet, usize> = HashMap::new(); // Mapping from nfa state set to DFA state
    let mut work_list: Vec<StateSet> = Vec::new();

    let q0 = nfa.epsilon_closure([n0]);
    let d0 = result.add_state(&set_name(nfa, &q0));
    result.set_starting_state(Some(d0));
    result.set_accepting(d0, is_accepting_set(nfa, &q0));
    q_list.insert(q0.clone(), d0);
    work_list.push(q0);

    while let Some(q) = work_list.pop() {
        let dq = q_list[&q];

        let mut transitions: IndexMap<&Symbol, Vec<usize>> = IndexMap::new();
        for state in q.iter() {
            let Some(nfa_state) = nfa.get_state(state) else {
                continue;
            };
            for symbol in nfa_state.get_transitions().keys() {
                if symbol.is_epsilon() {
                    continue;
                }
                let targets = transitions.entry(symbol).or_default();
                targets.extend(nfa.deep_delta(state, symbol).iter());
            }
        }

        for (symbol, targets) in transitions {
            let t = StateSet::from_states(nfa.get_num_states(), targets);

            let dt = match q_list.get(&t) {
                Some(&existing) => existing,
                None => {
                    let dt = result.add_state(&set_name(nfa, &t));
                    result.set_accepting(dt, is_accepting_set(nfa, &t));
                    trace!("new DFA state {} for {:?}", dt, t);
                    q_list.insert(t.clone(), dt);
                    work_list.push(t);
                    dt
                }
            };

            result.add_transition(dq, symbol.clone(), dt);
        }
    }

    debug!(
        "subset construction produced {} states from {}",
        result.get_num_states(),
        nfa.get_num_states()
    );

    Ok(result)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubsetOptions {
    /// Area the new nodes are placed in.
    pub bounds: CanvasSize,
    /// Merge equivalent DFA states before writing the result back.
    pub minimize: bool,
}

impl Default for SubsetOptions {
    fn default() -> Self {
        SubsetOptions {
            bounds: CanvasSize::default(),
            minimize: true,
        }
    }
}

/// Load the canvas as an automaton and replace all of its elements with an equivalent DFA.
/// Declines, leaving the canvas untouched, when the automaton is already deterministic or has no
/// starting state.
pub fn try_subset_construct(
    canvas: &mut Canvas,
    options: SubsetOptions,
    rng: &mut fastrand::Rng,
) -> Result<(), SubsetError> {
    let fa = FAData::from_canvas(canvas);

    if fa.is_deterministic() {
        return Err(SubsetError::AlreadyDeterministic);
    }

    let mut dfa = construct_dfa(&fa)?;
    if options.minimize {
        dfa = construct_minimal_dfa(&dfa);
    }
    canvas.replace(dfa.create_elements(options.bounds, rng));

    Ok(())
}

/// Subset construction on the canvas, returns whether it was performed.
pub fn subset_construct(canvas: &mut Canvas, options: SubsetOptions) -> bool {
    let mut rng = fastrand::Rng::new();
    match try_subset_construct(canvas, options, &mut rng) {
        Ok(()) => true,
        Err(err) => {
            warn!("{}", err);
            false
        }
    }
}

#[cfg(test)]
mod subset_tests {
    use super::*;
    use crate::elements::{Link, Point, StateNode};

    fn node(text: &str, accept: bool) -> StateNode {
        StateNode::new(text, Point { x: 0.0, y: 0.0 }, accept)
    }

    fn label(text: &str) -> Symbol {
        Symbol::Label(text.to_string())
    }

    #[test_log::test]
    fn test_declines_deterministic() {
        let mut canvas = Canvas::new();
        let q0 = canvas.add_node(node("q0", false));
        let q1 = canvas.add_node(node("q1", true));
        canvas.add_link(Link::Start { node: q0 });
        canvas.add_link(Link::transition(q0, q1, "a"));
        let before = canvas.clone();

        let mut rng = fastrand::Rng::with_seed(1);
        let result = try_subset_construct(&mut canvas, SubsetOptions::default(), &mut rng);
        assert_eq!(result, Err(SubsetError::AlreadyDeterministic));
        assert_eq!(canvas, before);

        assert!(!subset_construct(&mut canvas, SubsetOptions::default()));
        assert_eq!(canvas, before);
    }

    #[test_log::test]
    fn test_declines_without_start() {
        let mut canvas = Canvas::new();
        let q0 = canvas.add_node(node("q0", false));
        let q1 = canvas.add_node(node("q1", true));
        canvas.add_link(Link::transition(q0, q1, "a, \\epsilon"));
        let before = canvas.clone();

        let mut rng = fastrand::Rng::with_seed(1);
        let result = try_subset_construct(&mut canvas, SubsetOptions::default(), &mut rng);
        assert_eq!(result, Err(SubsetError::NoStartingState));
        assert_eq!(canvas, before);
    }

    #[test]
    fn test_epsilon_into_self_loop() {
        let mut canvas = Canvas::new();
        let q0 = canvas.add_node(node("q0", false));
        let q1 = canvas.add_node(node("q1", true));
        canvas.add_link(Link::Start { node: q0 });
        canvas.add_link(Link::transition(q0, q1, "\\epsilon"));
        canvas.add_link(Link::transition(q1, q1, "a"));

        let mut rng = fastrand::Rng::with_seed(3);
        assert!(try_subset_construct(&mut canvas, SubsetOptions::default(), &mut rng).is_ok());

        assert_eq!(canvas.nodes.len(), 1);
        assert_eq!(canvas.nodes[0].text, "{q0,q1}");
        assert!(canvas.nodes[0].is_accept_state);
        assert_eq!(canvas.links.len(), 2);
        assert!(canvas.links.contains(&Link::transition(0, 0, "a")));
        assert!(canvas.links.contains(&Link::Start { node: 0 }));
    }

    #[test]
    fn test_epsilon_into_self_loop_unminimized() {
        let mut canvas = Canvas::new();
        let q0 = canvas.add_node(node("q0", false));
        let q1 = canvas.add_node(node("q1", true));
        canvas.add_link(Link::Start { node: q0 });
        canvas.add_link(Link::transition(q0, q1, "\\epsilon"));
        canvas.add_link(Link::transition(q1, q1, "a"));

        let options = SubsetOptions {
            minimize: false,
            ..SubsetOptions::default()
        };
        let mut rng = fastrand::Rng::with_seed(3);
        assert!(try_subset_construct(&mut canvas, options, &mut rng).is_ok());

        let names: Vec<&str> = canvas.nodes.iter().map(|node| node.text.as_str()).collect();
        assert_eq!(names, vec!["{q0,q1}", "{q1}"]);
        assert!(canvas.nodes.iter().all(|node| node.is_accept_state));
        assert!(canvas.links.contains(&Link::transition(0, 1, "a")));
        assert!(canvas.links.contains(&Link::transition(1, 1, "a")));
    }

    #[test]
    fn test_construct_dfa_numbering() {
        // 0 -a-> 0, 0 -a-> 1, 0 -b-> 2, 1 -b-> 2, 2 accepting
        let mut nfa = FAData::new();
        let s0 = nfa.add_state("s0");
        let s1 = nfa.add_state("s1");
        let s2 = nfa.add_state("s2");
        nfa.set_starting_state(Some(s0));
        nfa.set_accepting(s2, true);
        nfa.add_transition(s0, label("a"), s0);
        nfa.add_transition(s0, label("a"), s1);
        nfa.add_transition(s0, label("b"), s2);
        nfa.add_transition(s1, label("b"), s2);

        let dfa = construct_dfa(&nfa).unwrap();

        assert!(dfa.is_deterministic());
        assert_eq!(dfa.state_names(), vec!["{s0}", "{s0,s1}", "{s2}"]);
        assert_eq!(dfa.get_start_state(), Some(0));
        assert_eq!(
            dfa.get_acceptor_states().iter_ones().collect::<Vec<_>>(),
            vec![2]
        );
        assert_eq!(dfa.shallow_delta(0, &label("a")), &[1]);
        assert_eq!(dfa.shallow_delta(0, &label("b")), &[2]);
        assert_eq!(dfa.shallow_delta(1, &label("a")), &[1]);
        assert_eq!(dfa.shallow_delta(1, &label("b")), &[2]);

        // Identical input gives identical numbering
        assert_eq!(construct_dfa(&nfa).unwrap(), dfa);
    }

    #[test]
    fn test_lifo_worklist_order() {
        // Start fans out to two fresh sets; the one discovered last is expanded first, so its
        // successor is numbered before the first set's successor.
        let mut nfa = FAData::new();
        let p = nfa.add_state("p");
        let x = nfa.add_state("x");
        let y = nfa.add_state("y");
        let xs = nfa.add_state("xs");
        let ys = nfa.add_state("ys");
        nfa.set_starting_state(Some(p));
        nfa.add_transition(p, Symbol::Epsilon, p);
        nfa.add_transition(p, label("a"), x);
        nfa.add_transition(p, label("b"), y);
        nfa.add_transition(x, label("c"), xs);
        nfa.add_transition(y, label("c"), ys);

        let dfa = construct_dfa(&nfa).unwrap();
        assert_eq!(
            dfa.state_names(),
            vec!["{p}", "{x}", "{y}", "{ys}", "{xs}"]
        );
    }

    #[test]
    fn test_language_preserved() {
        // (a+b)*ab over an epsilon NFA
        let mut nfa = FAData::new();
        let s0 = nfa.add_state("s0");
        let s1 = nfa.add_state("s1");
        let s2 = nfa.add_state("s2");
        let s3 = nfa.add_state("s3");
        nfa.set_starting_state(Some(s0));
        nfa.set_accepting(s3, true);
        nfa.add_transition(s0, label("a"), s0);
        nfa.add_transition(s0, label("b"), s0);
        nfa.add_transition(s0, Symbol::Epsilon, s1);
        nfa.add_transition(s1, label("a"), s2);
        nfa.add_transition(s2, label("b"), s3);

        let dfa = construct_dfa(&nfa).unwrap();
        assert!(dfa.is_deterministic());

        let words: Vec<Vec<&str>> = vec![
            vec![],
            vec!["a", "b"],
            vec!["b", "a", "b"],
            vec!["a", "a", "b"],
            vec!["a", "b", "a"],
            vec!["b"],
            vec!["a", "b", "b"],
        ];
        for word in words {
            assert_eq!(nfa.accepts(&word), dfa.accepts(&word), "word {:?}", word);
        }
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            SubsetError::AlreadyDeterministic.to_string(),
            "Tried to perform subset construction on a DFA."
        );
    }
}
