use bitvec::prelude::BitVec;
use std::fmt;

/// Reserved label text for an epsilon transition.
pub const EPSILON: &str = "\\epsilon";

/// Label text given to start designations when they are written back out.
pub const START_TEXT: &str = "start";

#[derive(Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub enum Symbol {
    Epsilon,
    Label(String),
}

impl Symbol {
    /// Parse a single (already trimmed) label option. The reserved epsilon text never becomes a
    /// consumable label.
    pub fn parse(text: &str) -> Self {
        if text == EPSILON {
            Symbol::Epsilon
        } else {
            Symbol::Label(text.to_string())
        }
    }

    pub fn is_epsilon(&self) -> bool {
        matches!(self, Symbol::Epsilon)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Epsilon => write!(f, "{}", EPSILON),
            Symbol::Label(label) => write!(f, "{}", label),
        }
    }
}

/// Split a comma separated link text into its trimmed, non-empty options.
pub fn split_options(text: &str) -> impl Iterator<Item = &str> {
    text.split(',').map(str::trim).filter(|option| !option.is_empty())
}

pub trait FA {
    fn get_num_states(&self) -> usize;
    fn get_start_state(&self) -> Option<usize>;
    fn get_acceptor_states(&self) -> &BitVec<u8>;
    fn get_state_name(&self, state_id: usize) -> &str;
    fn get_state_transitions(&self, state_id: usize) -> Vec<(&Symbol, &usize)>;
}
