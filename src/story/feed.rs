use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use super::graph::StoryGraph;
use super::parse::load_story_graph;

pub type FeedMessage = Result<StoryGraph, String>;

/// Where graph documents come from and how they are delivered.
#[derive(Clone, Debug)]
pub struct FeedSource {
    pub path: Option<PathBuf>,
    /// When set, the document is delivered one extra node at a time.
    pub reveal_interval: Option<Duration>,
}

/// Loads the document on a worker thread. Every message is a full node/link
/// list; the receiver reconciles each one into the live layout.
pub fn spawn_feed(source: FeedSource) -> Receiver<FeedMessage> {
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let graph = match load_story_graph(source.path.as_deref()) {
            Ok(graph) => graph,
            Err(error) => {
                warn!("graph feed failed: {error:#}");
                let _ = tx.send(Err(format!("{error:#}")));
                return;
            }
        };

        match source.reveal_interval {
            Some(interval) => reveal(&tx, &graph, interval),
            None => {
                let _ = tx.send(Ok(graph));
            }
        }
    });

    rx
}

fn reveal(tx: &Sender<FeedMessage>, graph: &StoryGraph, interval: Duration) {
    for count in 1..=graph.node_count() {
        if tx.send(Ok(graph.prefix(count))).is_err() {
            debug!("graph feed receiver dropped after {count} nodes");
            return;
        }
        if count < graph.node_count() {
            thread::sleep(interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_document_arrives_in_one_message() {
        let rx = spawn_feed(FeedSource {
            path: None,
            reveal_interval: None,
        });
        let graph = rx.recv().unwrap().unwrap();
        assert!(graph.node_count() > 0);
        assert!(rx.recv().is_err());
    }

    #[test]
    fn reveal_delivers_growing_prefixes() {
        let rx = spawn_feed(FeedSource {
            path: None,
            reveal_interval: Some(Duration::from_millis(1)),
        });
        let counts = rx
            .iter()
            .map(|message| message.unwrap().node_count())
            .collect::<Vec<_>>();
        assert!(counts.len() > 1);
        assert!(counts.windows(2).all(|pair| pair[1] == pair[0] + 1));
    }

    #[test]
    fn missing_file_reports_an_error() {
        let rx = spawn_feed(FeedSource {
            path: Some(PathBuf::from("/definitely/not/here.json")),
            reveal_interval: None,
        });
        let message = rx.recv().unwrap();
        assert!(message.unwrap_err().contains("failed to read graph document"));
    }
}
