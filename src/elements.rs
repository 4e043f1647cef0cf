/* Graph elements exchanged with the drawing surface. Nodes live in an arena and links refer to
 * them by index, so membership tests never depend on object identity. */

use crate::fa::split_options;

/// Distance kept between randomly placed nodes and the canvas border.
pub const CANVAS_PADDING: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl Default for CanvasSize {
    fn default() -> Self {
        CanvasSize {
            width: 800.0,
            height: 600.0,
        }
    }
}

impl CanvasSize {
    /// A random point inside the canvas, away from the border.
    pub fn random_point(&self, rng: &mut fastrand::Rng) -> Point {
        let span_x = (self.width - 2.0 * CANVAS_PADDING).max(0.0);
        let span_y = (self.height - 2.0 * CANVAS_PADDING).max(0.0);
        Point {
            x: rng.f64() * span_x + CANVAS_PADDING,
            y: rng.f64() * span_y + CANVAS_PADDING,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateNode {
    pub position: Point,
    pub text: String,
    pub is_accept_state: bool,
}

impl StateNode {
    pub fn new(text: &str, position: Point, is_accept_state: bool) -> Self {
        StateNode {
            position,
            text: text.to_string(),
            is_accept_state,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Link {
    /// Transition between two distinct nodes, labelled with comma separated options.
    Edge { from: usize, to: usize, text: String },
    /// Transition from a node back to itself.
    SelfLoop { node: usize, text: String },
    /// Marks a node as the starting state. Not a transition.
    Start { node: usize },
}

impl Link {
    /// Create a transition link, picking the self loop shape when both ends are the same node.
    pub fn transition(from: usize, to: usize, text: &str) -> Self {
        if from == to {
            Link::SelfLoop {
                node: from,
                text: text.to_string(),
            }
        } else {
            Link::Edge {
                from,
                to,
                text: text.to_string(),
            }
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Link::Edge { text, .. } | Link::SelfLoop { text, .. } => Some(text.as_str()),
            Link::Start { .. } => None,
        }
    }

    /// The label options carried by this link joined with explicit union, e.g. `a,b` -> `a+b`.
    pub fn union_text(&self) -> String {
        self.text()
            .map(|text| split_options(text).collect::<Vec<_>>().join("+"))
            .unwrap_or_default()
    }

    pub fn touches(&self, node_id: usize) -> bool {
        match self {
            Link::Edge { from, to, .. } => *from == node_id || *to == node_id,
            Link::SelfLoop { node, .. } | Link::Start { node } => *node == node_id,
        }
    }

    fn nodes_mut(&mut self) -> Vec<&mut usize> {
        match self {
            Link::Edge { from, to, .. } => vec![from, to],
            Link::SelfLoop { node, .. } | Link::Start { node } => vec![node],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Canvas {
    pub nodes: Vec<StateNode>,
    pub links: Vec<Link>,
}

impl Canvas {
    pub fn new() -> Self {
        Canvas::default()
    }

    pub fn add_node(&mut self, node: StateNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn add_link(&mut self, link: Link) {
        self.links.push(link);
    }

    /// Index of the first node whose text is `text`.
    pub fn find_node(&self, text: &str) -> Option<usize> {
        self.nodes.iter().position(|node| node.text == text)
    }

    /// True when any start designation points at `node_id`.
    pub fn is_start(&self, node_id: usize) -> bool {
        self.links
            .iter()
            .any(|link| matches!(link, Link::Start { node } if *node == node_id))
    }

    /// Remove a node and shift the node indices held by the remaining links. The caller must
    /// have removed every link touching the node first.
    pub fn remove_node(&mut self, node_id: usize) -> StateNode {
        debug_assert!(!self.links.iter().any(|link| link.touches(node_id)));

        let removed = self.nodes.remove(node_id);
        for link in self.links.iter_mut() {
            for index in link.nodes_mut() {
                if *index > node_id {
                    *index -= 1;
                }
            }
        }
        removed
    }

    /// Swap in a whole new set of elements.
    pub fn replace(&mut self, other: Canvas) {
        self.nodes = other.nodes;
        self.links = other.links;
    }
}
