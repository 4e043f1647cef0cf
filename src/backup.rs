/* Canvas backup files (.fsmjson). The format is the drawing tool's own JSON backup: a list of
 * nodes with positions and a list of links tagged by their kind. Link geometry is read when
 * present and written back with neutral values. */

use crate::elements::{Canvas, Link, Point, StateNode};
use crate::fa::START_TEXT;
use color_eyre::eyre::{Report, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;
use tracing::debug;

// Start arrows are drawn this far to the left of their node
const START_ARROW_OFFSET: f64 = -60.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupError {
    MissingNode { link: usize, node: usize },
}

impl fmt::Display for BackupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupError::MissingNode { link, node } => write!(
                f,
                "Link {} refers to node {} which is not in the backup.",
                link, node
            ),
        }
    }
}

impl std::error::Error for BackupError {}

fn half() -> f64 {
    0.5
}

fn above() -> f64 {
    -std::f64::consts::FRAC_PI_2
}

fn start_text() -> String {
    START_TEXT.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupNode {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub is_accept_state: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BackupLink {
    #[serde(rename = "Link", alias = "NodeLink", rename_all = "camelCase")]
    NodeLink {
        node_a: usize,
        node_b: usize,
        #[serde(default)]
        text: String,
        #[serde(default)]
        line_angle_adjust: f64,
        #[serde(default = "half")]
        parallel_part: f64,
        #[serde(default)]
        perpendicular_part: f64,
    },
    #[serde(rename_all = "camelCase")]
    SelfLink {
        node: usize,
        #[serde(default)]
        text: String,
        #[serde(default = "above")]
        anchor_angle: f64,
    },
    #[serde(rename_all = "camelCase")]
    StartLink {
        node: usize,
        #[serde(default = "start_text")]
        text: String,
        #[serde(default)]
        delta_x: f64,
        #[serde(default)]
        delta_y: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Backup {
    #[serde(default)]
    pub nodes: Vec<BackupNode>,
    #[serde(default)]
    pub links: Vec<BackupLink>,
}

impl Backup {
    pub fn from_canvas(canvas: &Canvas) -> Self {
        let nodes = canvas
            .nodes
            .iter()
            .map(|node| BackupNode {
                x: node.position.x,
                y: node.position.y,
                text: node.text.clone(),
                is_accept_state: node.is_accept_state,
            })
            .collect();

        let links = canvas
            .links
            .iter()
            .map(|link| match link {
                Link::Edge { from, to, text } => BackupLink::NodeLink {
                    node_a: *from,
                    node_b: *to,
                    text: text.clone(),
                    line_angle_adjust: 0.0,
                    parallel_part: half(),
                    perpendicular_part: 0.0,
                },
                Link::SelfLoop { node, text } => BackupLink::SelfLink {
                    node: *node,
                    text: text.clone(),
                    anchor_angle: above(),
                },
                Link::Start { node } => BackupLink::StartLink {
                    node: *node,
                    text: start_text(),
                    delta_x: START_ARROW_OFFSET,
                    delta_y: 0.0,
                },
            })
            .collect();

        Backup { nodes, links }
    }

    /// Convert to canvas elements. Every link must refer to nodes of this backup.
    pub fn into_canvas(self) -> Result<Canvas, BackupError> {
        let mut canvas = Canvas::new();

        for node in self.nodes {
            canvas.add_node(StateNode::new(
                &node.text,
                Point {
                    x: node.x,
                    y: node.y,
                },
                node.is_accept_state,
            ));
        }

        let num_nodes = canvas.nodes.len();
        let check = |link: usize, node: usize| {
            if node < num_nodes {
                Ok(node)
            } else {
                Err(BackupError::MissingNode { link, node })
            }
        };

        for (index, link) in self.links.into_iter().enumerate() {
            let link = match link {
                BackupLink::NodeLink {
                    node_a,
                    node_b,
                    text,
                    ..
                } => Link::transition(check(index, node_a)?, check(index, node_b)?, &text),
                BackupLink::SelfLink { node, text, .. } => Link::SelfLoop {
                    node: check(index, node)?,
                    text,
                },
                BackupLink::StartLink { node, .. } => Link::Start {
                    node: check(index, node)?,
                },
            };
            canvas.add_link(link);
        }

        Ok(canvas)
    }
}

pub fn canvas_to_string(canvas: &Canvas) -> Result<String> {
    Ok(serde_json::to_string(&Backup::from_canvas(canvas))?)
}

pub fn string_to_canvas(json: &str) -> Result<Canvas> {
    let backup: Backup = serde_json::from_str(json)?;
    backup.into_canvas().map_err(Report::new)
}

/// Load a canvas from a saved .fsmjson file
pub fn read_canvas<P: AsRef<Path>>(path: P) -> Result<Canvas> {
    let file = File::open(path.as_ref())?;
    let buf_reader = BufReader::new(file);

    let backup: Backup = serde_json::from_reader(buf_reader)?;
    let canvas = backup.into_canvas().map_err(Report::new)?;

    debug!(
        "read {} nodes and {} links from {}",
        canvas.nodes.len(),
        canvas.links.len(),
        path.as_ref().display()
    );
    Ok(canvas)
}

pub fn write_canvas<P: AsRef<Path>>(path: P, canvas: &Canvas) -> Result<()> {
    let json_string = serde_json::to_string_pretty(&Backup::from_canvas(canvas))?;

    let mut file = File::create(path.as_ref())?;
    writeln!(file, "{}", json_string)?;

    Ok(())
}
