/* Merge equivalent states of a DFA by partition refinement. States start split into accepting and
 * non accepting sets, and a set is split whenever one of its members disagrees with a
 * representative about which set some label leads to. */

use crate::data::FAData;
use crate::fa::{Symbol, FA};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Assignment of every state to an equivalence class. `class_of[state]` is the class id, ids run
/// from 0 to `num_classes - 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Partition {
    class_of: Vec<usize>,
    num_classes: usize,
}

impl Partition {
    /// Accepting states in one class and the rest in another. A side without states gets no class.
    fn by_acceptance(dfa: &FAData) -> Self {
        let num_states = dfa.get_num_states();
        let any_accepting = (0..num_states).any(|state| dfa.is_accepting(state));
        let any_rejecting = (0..num_states).any(|state| !dfa.is_accepting(state));

        let class_of = (0..num_states)
            .map(|state| usize::from(dfa.is_accepting(state) && any_rejecting))
            .collect();
        let num_classes = usize::from(any_accepting) + usize::from(any_rejecting);

        Partition {
            class_of,
            num_classes,
        }
    }

    // Lowest state of every class
    fn representatives(&self) -> Vec<Option<usize>> {
        let mut representatives = vec![None; self.num_classes];
        for (state, class) in self.class_of.iter().enumerate() {
            representatives[*class].get_or_insert(state);
        }
        representatives
    }
}

// Target of a deterministic transition, None when the label is undefined for the state
fn destination(dfa: &FAData, state: usize, symbol: &Symbol) -> Option<usize> {
    dfa.shallow_delta(state, symbol).first().copied()
}

fn same_destination_classes(
    dfa: &FAData,
    state1: usize,
    state2: usize,
    alphabet: &[&Symbol],
    partition: &Partition,
) -> bool {
    alphabet.iter().all(|symbol| {
        let class1 = destination(dfa, state1, symbol).map(|dest| partition.class_of[dest]);
        let class2 = destination(dfa, state2, symbol).map(|dest| partition.class_of[dest]);
        class1 == class2
    })
}

/// Refine the acceptance split until no class contains two states whose transitions lead to
/// different classes. Each round compares every state with the lowest state of its class against
/// the previous round's partition, and the disagreeing states of a class move to one new class.
fn refine(dfa: &FAData) -> Partition {
    let alphabet = dfa.labels();
    let mut partition = Partition::by_acceptance(dfa);

    loop {
        let previous = partition.clone();
        let representatives = previous.representatives();
        let mut split_class: Vec<Option<usize>> = vec![None; previous.num_classes];

        for state in 0..previous.class_of.len() {
            let class = previous.class_of[state];
            let Some(representative) = representatives[class] else {
                continue;
            };
            if same_destination_classes(dfa, state, representative, &alphabet, &previous) {
                continue;
            }

            let new_class = match split_class[class] {
                Some(new_class) => new_class,
                None => {
                    let new_class = partition.num_classes;
                    partition.num_classes += 1;
                    split_class[class] = Some(new_class);
                    new_class
                }
            };
            partition.class_of[state] = new_class;
        }

        trace!("refined into {} classes", partition.num_classes);
        if partition.num_classes == previous.num_classes {
            return partition;
        }
    }
}

/// Merge the equivalent states of a deterministic automaton. Merged states are numbered by their
/// lowest original index and keep the name of that state, so the start state stays first when it
/// was first.
pub fn construct_minimal_dfa(dfa: &FAData) -> FAData {
    let partition = refine(dfa);
    let num_states = dfa.get_num_states();

    let mut class_to_new_state: HashMap<usize, usize> = HashMap::new();
    let mut representatives: Vec<usize> = Vec::new();
    let mut result = FAData::new();

    for state in 0..num_states {
        let class = partition.class_of[state];
        if !class_to_new_state.contains_key(&class) {
            let new_state = result.add_state(dfa.get_state_name(state));
            result.set_accepting(new_state, dfa.is_accepting(state));
            class_to_new_state.insert(class, new_state);
            representatives.push(state);
        }
    }

    for (new_state, representative) in representatives.iter().enumerate() {
        for (symbol, target) in dfa.get_state_transitions(*representative) {
            if let Some(new_target) = class_to_new_state.get(&partition.class_of[*target]) {
                result.add_transition(new_state, symbol.clone(), *new_target);
            }
        }
    }

    let start = dfa
        .get_start_state()
        .and_then(|start| class_to_new_state.get(&partition.class_of[start]))
        .copied();
    result.set_starting_state(start);

    debug!(
        "minimization merged {} states into {}",
        num_states,
        result.get_num_states()
    );

    result
}
