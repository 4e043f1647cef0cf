/* State elimination. A node that is neither starting nor accepting is removed from the canvas and
 * every path through it is replaced by a single link whose label is the regular expression of
 * that path: incoming label, then the starred self loop labels, then the outgoing label. */

use crate::elements::{Canvas, Link};
use crate::expr::{outer_parens, to_rpn, ExprError, OuterParens};
use crate::fa::{split_options, EPSILON};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EliminateError {
    UnknownState(usize),
    AcceptingState(String),
    StartState(String),
}

impl fmt::Display for EliminateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EliminateError::UnknownState(node) => {
                write!(f, "There is no state with index {} to eliminate.", node)
            }
            EliminateError::AcceptingState(name) => {
                write!(f, "State {} is accepting and cannot be eliminated.", name)
            }
            EliminateError::StartState(name) => {
                write!(f, "State {} is the starting state and cannot be eliminated.", name)
            }
        }
    }
}

impl std::error::Error for EliminateError {}

/// Wrap `text` in parentheses when union is its outermost operation, so that it can be
/// concatenated with other fragments. A string that is already enclosed by one matching pair is
/// kept as is. Unbalanced input is kept as is and reported.
pub fn safe(text: &str, diagnostics: &mut Vec<ExprError>) -> String {
    if !text.contains('+') || !to_rpn(text).is_top_level_union() {
        return text.to_string();
    }

    match outer_parens(text) {
        OuterParens::Enclosing => text.to_string(),
        OuterParens::Absent | OuterParens::Separate => format!("({})", text),
        OuterParens::Unbalanced => {
            let err = ExprError::UnbalancedParenthesis(text.to_string());
            warn!("{}", err);
            diagnostics.push(err);
            text.to_string()
        }
    }
}

/// Drop one pair of parentheses enclosing the whole label.
pub fn strip_parenthesis(text: &str) -> String {
    if text.len() > 2 && outer_parens(text) == OuterParens::Enclosing {
        text[1..text.len() - 1].to_string()
    } else {
        text.to_string()
    }
}

// Remove every epsilon literal for which `redundant(previous char, next char)` holds. The previous
// char is taken from the output built so far.
fn strip_epsilon<F>(text: &str, redundant: F) -> String
where
    F: Fn(Option<char>, Option<char>) -> bool,
{
    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find(EPSILON) {
        result.push_str(&rest[..pos]);
        rest = &rest[pos + EPSILON.len()..];

        if !redundant(result.chars().last(), rest.chars().next()) {
            result.push_str(EPSILON);
        }
    }
    result.push_str(rest);
    result
}

/// Remove epsilon literals that are concatenated with something else: `a\epsilon` -> `a`,
/// `x*\epsilon` -> `x*`, `\epsilon(a+b)` -> `(a+b)`. Epsilon as a union option is kept.
pub fn remove_epsilon(text: &str) -> String {
    let after_operand = strip_epsilon(text, |previous, _| {
        previous.is_some_and(|ch| ch.is_alphanumeric() || ch == '*' || ch == ')')
    });
    strip_epsilon(&after_operand, |_, next| {
        next.is_some_and(|ch| ch.is_alphanumeric() || ch == '(')
    })
}

// `c*` for a single one character option, `(o1+o2+...)*` otherwise, empty without options
fn self_loop_fragment(options: &[&str]) -> String {
    match options {
        [] => String::new(),
        [single] if single.chars().count() == 1 => format!("{}*", single),
        _ => format!("({})*", options.join("+")),
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
enum LinkKey {
    Edge(usize, usize),
    SelfLoop(usize),
}

/// Merge links that connect the same ordered pair of nodes, and self loops on the same node, into
/// the first link of each group by joining their labels with union.
pub fn minimize_links(links: &mut Vec<Link>) {
    let mut groups: IndexMap<LinkKey, Vec<usize>> = IndexMap::new();

    for (index, link) in links.iter().enumerate() {
        let key = match link {
            Link::Edge { from, to, .. } if from == to => LinkKey::SelfLoop(*from),
            Link::Edge { from, to, .. } => LinkKey::Edge(*from, *to),
            Link::SelfLoop { node, .. } => LinkKey::SelfLoop(*node),
            Link::Start { .. } => continue,
        };
        groups.entry(key).or_default().push(index);
    }

    let mut deletable: HashSet<usize> = HashSet::new();

    for indices in groups.values() {
        let [first, rest @ ..] = indices.as_slice() else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }

        let merged = indices
            .iter()
            .map(|&index| links[index].union_text())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("+");

        if let Link::Edge { text, .. } | Link::SelfLoop { text, .. } = &mut links[*first] {
            *text = merged;
        }
        deletable.extend(rest.iter().copied());
    }

    if deletable.is_empty() {
        return;
    }

    let mut index = 0;
    links.retain(|_| {
        let keep = !deletable.contains(&index);
        index += 1;
        keep
    });
}

/// Eliminate the node with index `node_id` from the canvas. Returns the label problems found while
/// combining labels; those do not stop the elimination. Declined eliminations leave the canvas
/// untouched.
pub fn try_eliminate(
    canvas: &mut Canvas,
    node_id: usize,
) -> Result<Vec<ExprError>, EliminateError> {
    let Some(node) = canvas.nodes.get(node_id) else {
        return Err(EliminateError::UnknownState(node_id));
    };
    if node.is_accept_state {
        return Err(EliminateError::AcceptingState(node.text.clone()));
    }
    if canvas.is_start(node_id) {
        return Err(EliminateError::StartState(node.text.clone()));
    }

    let mut incoming: Vec<(usize, String)> = Vec::new();
    let mut outgoing: Vec<(usize, String)> = Vec::new();
    let mut self_options: Vec<&str> = Vec::new();
    let mut partitioned: HashSet<usize> = HashSet::new();

    for (index, link) in canvas.links.iter().enumerate() {
        match link {
            Link::SelfLoop { node, text } if *node == node_id => {
                self_options.extend(split_options(text));
            }
            Link::Edge { from, to, text } if *from == node_id && *to == node_id => {
                self_options.extend(split_options(text));
            }
            Link::Edge { from, to, .. } if *from == node_id => {
                outgoing.push((*to, link.union_text()));
            }
            Link::Edge { from, to, .. } if *to == node_id => {
                incoming.push((*from, link.union_text()));
            }
            _ => continue,
        }
        partitioned.insert(index);
    }

    let self_fragment = self_loop_fragment(&self_options);
    let mut diagnostics = Vec::new();

    // A link without options carries no transition, so no path runs through it
    incoming.retain(|(_, text)| !text.is_empty());
    let outgoing: Vec<(usize, String)> = outgoing
        .into_iter()
        .filter(|(_, text)| !text.is_empty())
        .map(|(to, text)| (to, safe(&text, &mut diagnostics)))
        .collect();

    let mut new_links = Vec::with_capacity(incoming.len() * outgoing.len());
    for (from, in_text) in incoming {
        let in_text = safe(&in_text, &mut diagnostics);

        for (to, out_text) in outgoing.iter() {
            let text = format!("{}{}{}", in_text, self_fragment, out_text);
            let text = strip_parenthesis(&remove_epsilon(&text));
            new_links.push(Link::transition(from, *to, &text));
        }
    }

    debug!(
        "eliminating {} replaces {} links with {}",
        canvas.nodes[node_id].text,
        partitioned.len(),
        new_links.len()
    );

    let mut index = 0;
    canvas.links.retain(|_| {
        let keep = !partitioned.contains(&index);
        index += 1;
        keep
    });
    canvas.links.extend(new_links);
    canvas.remove_node(node_id);

    minimize_links(&mut canvas.links);

    Ok(diagnostics)
}

/// Eliminate a node, returns whether it was eliminated.
pub fn eliminate(canvas: &mut Canvas, node_id: usize) -> bool {
    match try_eliminate(canvas, node_id) {
        Ok(_) => true,
        Err(err) => {
            warn!("{}", err);
            false
        }
    }
}
