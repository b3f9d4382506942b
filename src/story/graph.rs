use std::collections::HashSet;

use serde::Deserialize;

/// Opaque payload a node renderer turns into a measurable visual element.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NodeContent {
    Text(String),
    Card { title: String, body: String },
}

impl NodeContent {
    pub fn summary(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Card { title, .. } => title,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub content: NodeContent,
    /// Seed position, only consulted the first time this id is seen.
    #[serde(default)]
    pub position: Option<[f32; 2]>,
}

impl GraphNode {
    pub fn text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: NodeContent::Text(text.into()),
            position: None,
        }
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.position = Some([x, y]);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub directional: bool,
}

impl GraphLink {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            label: None,
            directional: false,
        }
    }

    pub fn directed(mut self) -> Self {
        self.directional = true;
        self
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn connects(&self, source: &str, target: &str) -> bool {
        (self.source == source && self.target == target)
            || (!self.directional && self.source == target && self.target == source)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct StoryGraph {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub links: Vec<GraphLink>,
}

impl StoryGraph {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.iter().any(|node| node.id == id)
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn degree(&self, id: &str) -> usize {
        self.links
            .iter()
            .filter(|link| link.source == id || link.target == id)
            .count()
    }

    /// First `count` nodes plus every link whose endpoints are both among them.
    pub fn prefix(&self, count: usize) -> Self {
        let nodes = self.nodes.iter().take(count).cloned().collect::<Vec<_>>();
        let present = nodes
            .iter()
            .map(|node| node.id.as_str())
            .collect::<HashSet<_>>();
        let links = self
            .links
            .iter()
            .filter(|link| {
                present.contains(link.source.as_str()) && present.contains(link.target.as_str())
            })
            .cloned()
            .collect();
        Self { nodes, links }
    }

    /// Next free `node-N` id, counting past any existing ids of that shape.
    pub fn next_node_id(&self) -> String {
        let next = self
            .nodes
            .iter()
            .filter_map(|node| node.id.strip_prefix("node-")?.parse::<u64>().ok())
            .max()
            .map_or(1, |max| max + 1);
        format!("node-{next}")
    }

    pub fn push_node(&mut self, text: &str) -> String {
        let id = self.next_node_id();
        self.nodes.push(GraphNode::text(id.clone(), text));
        id
    }

    /// Appends the link unless an equivalent one exists. Returns whether it was added.
    pub fn push_link(&mut self, link: GraphLink) -> bool {
        if link.source == link.target
            || self
                .links
                .iter()
                .any(|existing| existing.connects(&link.source, &link.target))
        {
            return false;
        }
        self.links.push(link);
        true
    }
}
