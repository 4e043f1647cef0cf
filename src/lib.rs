//! # fsmtool
//!
//! Algorithms behind a finite state machine drawing tool. A drawing is a
//! [`Canvas`] of state nodes and labelled links; the transforms read it as an
//! automaton, rewrite it and hand back new canvas elements.
//!
//! This library provides functionality to:
//! - Parse transition labels (union, implicit concatenation, Kleene star,
//!   `\epsilon`) into reverse polish notation with the shunting-yard algorithm
//! - Load a canvas into an automaton and evaluate its delta function and
//!   epsilon closures
//! - Eliminate a state, folding the paths through it into regular expression
//!   labels
//! - Convert an NFA with epsilon transitions into a DFA using Subset Construction
//! - Minimize DFAs using Hopcroft's Algorithm
//! - Read and write `.fsmjson` canvas backups and export automata as DOT

// Re-export the modules
pub mod backup;
pub mod data;
pub mod dot;
pub mod elements;
pub mod eliminate;
pub mod expr;
pub mod fa;
pub mod minimize;
pub mod subset;

// Re-export commonly used functions for convenience
pub use backup::{read_canvas, write_canvas};
pub use data::FAData;
pub use elements::{Canvas, CanvasSize, Link, StateNode};
pub use eliminate::{eliminate, try_eliminate};
pub use expr::to_rpn;
pub use minimize::construct_minimal_dfa;
pub use subset::{construct_dfa, subset_construct, try_subset_construct, SubsetOptions};
