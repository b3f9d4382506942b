use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};

use super::graph::StoryGraph;

pub(super) const DEMO_STORY: &str = include_str!("../../assets/demo_story.json");

pub fn parse_story_graph(raw: &str) -> Result<StoryGraph> {
    let graph: StoryGraph = serde_json::from_str(raw).context("invalid story graph JSON")?;

    if let Some(index) = graph.nodes.iter().position(|node| node.id.trim().is_empty()) {
        return Err(anyhow!("node at index {index} has an empty id"));
    }
    if let Some(index) = graph
        .links
        .iter()
        .position(|link| link.source.trim().is_empty() || link.target.trim().is_empty())
    {
        return Err(anyhow!("link at index {index} has an empty endpoint"));
    }

    Ok(graph)
}

pub fn load_story_graph(path: Option<&Path>) -> Result<StoryGraph> {
    let Some(path) = path else {
        return parse_story_graph(DEMO_STORY).context("built-in demo story is malformed");
    };

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read graph document {}", path.display()))?;
    parse_story_graph(&raw).with_context(|| format!("failed to parse {}", path.display()))
}
