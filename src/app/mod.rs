use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;

use eframe::egui::{self, Context, Pos2};
use tracing::{info, warn};

use crate::story::{FeedMessage, FeedSource, StoryGraph, spawn_feed};

mod engine;
mod graph;
mod physics;
mod render_utils;
mod sizes;
mod transform;
mod ui;

use engine::{EngineConfig, GraphEngine};
use graph::interaction::ReleasePolicy;

/// Startup choices taken from the command line.
#[derive(Clone, Debug, Default)]
pub struct LaunchOptions {
    pub source: Option<std::path::PathBuf>,
    pub reveal_interval: Option<Duration>,
    pub keep_pinned_on_release: bool,
    pub charge: Option<f32>,
    pub link_distance: Option<f32>,
    pub seed: Option<u64>,
}

impl LaunchOptions {
    fn feed_source(&self) -> FeedSource {
        FeedSource {
            path: self.source.clone(),
            reveal_interval: self.reveal_interval,
        }
    }

    fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default();
        if let Some(charge) = self.charge {
            config.simulation.charge = charge;
        }
        if let Some(link_distance) = self.link_distance {
            config.simulation.link_distance = link_distance;
        }
        config.simulation.seed = self.seed;
        if self.keep_pinned_on_release {
            config.interaction.release = ReleasePolicy::KeepPinned;
        }
        config
    }
}

pub struct StoryGraphApp {
    options: LaunchOptions,
    state: AppState,
    feed_rx: Option<Receiver<FeedMessage>>,
}

enum AppState {
    Loading,
    Ready(Box<ViewModel>),
    Error(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum EditMode {
    #[default]
    View,
    Add,
    Connect,
}

#[derive(Debug, Default)]
struct EditorState {
    mode: EditMode,
    draft_text: String,
    link_label: String,
    link_directed: bool,
    connect_source: Option<String>,
    status: Option<String>,
}

/// Primary press being tracked on the canvas, in canvas coordinates.
#[derive(Clone, Copy, Debug)]
struct PointerCapture {
    origin: Pos2,
    moving: bool,
}

struct ViewModel {
    graph: StoryGraph,
    engine: GraphEngine,
    mounted_at: Option<f64>,
    elapsed: Duration,
    pointer: Option<PointerCapture>,
    editor: EditorState,
    snapshots_heard: Rc<Cell<u64>>,
    clicks: Rc<RefCell<VecDeque<String>>>,
    fps_current: f32,
    fps_samples: VecDeque<f32>,
}

impl StoryGraphApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, options: LaunchOptions) -> Self {
        let feed_rx = Some(spawn_feed(options.feed_source()));
        Self {
            options,
            state: AppState::Loading,
            feed_rx,
        }
    }

    /// Drains the feed. Returns the error that ended it, if any.
    fn poll_feed(&mut self) -> Option<String> {
        let rx = self.feed_rx.take()?;
        loop {
            match rx.try_recv() {
                Ok(Ok(graph)) => match &mut self.state {
                    AppState::Ready(model) => model.apply_graph(graph),
                    _ => {
                        info!(
                            nodes = graph.node_count(),
                            links = graph.links.len(),
                            "graph document loaded"
                        );
                        let model = ViewModel::new(graph, self.options.engine_config());
                        self.state = AppState::Ready(Box::new(model));
                    }
                },
                Ok(Err(error)) => {
                    warn!("graph feed failed: {error}");
                    return Some(error);
                }
                Err(TryRecvError::Empty) => {
                    self.feed_rx = Some(rx);
                    return None;
                }
                Err(TryRecvError::Disconnected) => {
                    return match self.state {
                        AppState::Loading => Some("Graph feed worker disconnected".to_owned()),
                        _ => None,
                    };
                }
            }
        }
    }
}

impl eframe::App for StoryGraphApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        if let Some(error) = self.poll_feed() {
            self.state = AppState::Error(error);
        }
        if self.feed_rx.is_some() {
            ctx.request_repaint_after(Duration::from_millis(50));
        }

        let mut retry = false;
        let mut reload_requested = false;

        match &mut self.state {
            AppState::Loading => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Loading story graph...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
            }
            AppState::Error(error) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to load the story graph");
                    ui.add_space(6.0);
                    ui.label(error.as_str());
                    ui.add_space(10.0);
                    retry = ui.button("Retry").clicked();
                });
            }
            AppState::Ready(model) => {
                model.show(ctx, &mut reload_requested, self.feed_rx.is_some());
            }
        }

        if retry {
            self.state = AppState::Loading;
        }
        if (retry || reload_requested) && self.feed_rx.is_none() {
            self.feed_rx = Some(spawn_feed(self.options.feed_source()));
        }
    }
}
