mod feed;
mod graph;
mod parse;

pub use feed::{FeedMessage, FeedSource, spawn_feed};
pub use graph::{GraphLink, GraphNode, NodeContent, StoryGraph};
