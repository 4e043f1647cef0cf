use crate::fa::{Symbol, FA};
use color_eyre::eyre::Result;
use petgraph::dot::Dot;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

fn symbol_label(symbol: &Symbol) -> String {
    match symbol {
        Symbol::Epsilon => "ε".to_string(),
        Symbol::Label(label) => label.clone(),
    }
}

/// Render an automaton as a Graphviz digraph. Labels between the same pair of states share one
/// edge.
pub fn to_dot<T: FA>(fa: &T) -> String {
    let mut graph: DiGraph<String, String> = DiGraph::new();
    let mut edge_map: HashMap<(usize, usize), EdgeIndex> = HashMap::new();

    for state in 0..fa.get_num_states() {
        let name = fa.get_state_name(state);
        let accepting = fa.get_acceptor_states().get(state).is_some_and(|bit| *bit);

        let label = match (fa.get_start_state() == Some(state), accepting) {
            (true, true) => format!("Start\nAccept\n{}", name),
            (true, false) => format!("Start\n{}", name),
            (false, true) => format!("Accept\n{}", name),
            (false, false) => name.to_string(),
        };
        graph.add_node(label);
    }

    for state in 0..fa.get_num_states() {
        for (symbol, target) in fa.get_state_transitions(state) {
            let label = symbol_label(symbol);

            match edge_map.get(&(state, *target)) {
                Some(&edge) => {
                    let merged = format!("{}, {}", graph[edge], label);
                    graph[edge] = merged;
                }
                None => {
                    let edge =
                        graph.add_edge(NodeIndex::new(state), NodeIndex::new(*target), label);
                    edge_map.insert((state, *target), edge);
                }
            }
        }
    }

    let dot = Dot::new(&graph).to_string();
    dot
}

/// Write the DOT rendering of an automaton to `path`.
pub fn save_dot<T: FA, P: AsRef<Path>>(fa: &T, path: P) -> Result<()> {
    let mut dot_file = File::create(path)?;
    dot_file.write_all(to_dot(fa).as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod dot_tests {
    use super::*;
    use crate::data::FAData;

    fn sample() -> FAData {
        let mut fa = FAData::new();
        let q0 = fa.add_state("q0");
        let q1 = fa.add_state("q1");
        fa.set_starting_state(Some(q0));
        fa.set_accepting(q1, true);
        fa.add_transition(q0, Symbol::Label("a".to_string()), q1);
        fa.add_transition(q0, Symbol::Label("b".to_string()), q1);
        fa.add_transition(q1, Symbol::Epsilon, q0);
        fa
    }

    #[test]
    fn test_to_dot() {
        let dot = to_dot(&sample());

        assert!(dot.starts_with("digraph"));
        assert!(dot.contains("0 -> 1"));
        assert!(dot.contains("1 -> 0"));
        assert!(dot.contains("a, b"));
        assert!(dot.contains("ε"));
        assert!(dot.contains("q0"));
        assert_eq!(dot.matches(" -> ").count(), 2);
    }

    #[test]
    fn test_save_dot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.dot");

        save_dot(&sample(), &path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, to_dot(&sample()));
    }
}
