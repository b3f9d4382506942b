use std::collections::HashMap;
use std::sync::Arc;

use eframe::egui::Pos2;

use crate::story::NodeContent;

#[derive(Clone, Debug)]
pub(in crate::app) struct SnapshotNode {
    pub id: String,
    pub content: Arc<NodeContent>,
    pub position: Pos2,
    /// Collision radius in world units.
    pub radius: f32,
    pub pinned: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub(in crate::app) struct SnapshotLink {
    pub source: String,
    pub target: String,
    pub label: Option<String>,
    pub directional: bool,
}

/// Committed layout state handed to readers. Only nodes with a finite
/// position are present; links may still name nodes that are absent.
#[derive(Clone, Debug, Default)]
pub(in crate::app) struct PositionSnapshot {
    pub revision: u64,
    pub nodes: Vec<SnapshotNode>,
    pub links: Vec<SnapshotLink>,
    index: HashMap<String, usize>,
}

impl PositionSnapshot {
    pub(super) fn new(revision: u64, nodes: Vec<SnapshotNode>, links: Vec<SnapshotLink>) -> Self {
        let index = nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.clone(), index))
            .collect();
        Self {
            revision,
            nodes,
            links,
            index,
        }
    }

    pub(in crate::app) fn node(&self, id: &str) -> Option<&SnapshotNode> {
        self.index.get(id).map(|&index| &self.nodes[index])
    }

    pub(in crate::app) fn position(&self, id: &str) -> Option<Pos2> {
        self.node(id).map(|node| node.position)
    }
}
