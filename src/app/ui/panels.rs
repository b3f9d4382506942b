use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use eframe::egui::{self, Align, Context, Layout};
use tracing::debug;

use crate::story::{GraphLink, StoryGraph};

use super::super::engine::{EngineConfig, GraphEngine};
use super::super::{EditMode, EditorState, ViewModel};

impl ViewModel {
    pub(in crate::app) fn new(graph: StoryGraph, config: EngineConfig) -> Self {
        let mut engine = GraphEngine::new(config);

        let snapshots_heard = Rc::new(Cell::new(0));
        let counter = Rc::clone(&snapshots_heard);
        engine.subscribe(move |_| counter.set(counter.get() + 1));

        let clicks = Rc::new(RefCell::new(VecDeque::new()));
        let sink = Rc::clone(&clicks);
        engine.on_select(move |id| sink.borrow_mut().push_back(id.to_owned()));

        let mut model = Self {
            graph,
            engine,
            mounted_at: None,
            elapsed: Duration::ZERO,
            pointer: None,
            editor: EditorState {
                link_directed: true,
                ..Default::default()
            },
            snapshots_heard,
            clicks,
            fps_current: 0.0,
            fps_samples: VecDeque::new(),
        };
        model.sync_engine();
        model
    }

    /// Replaces the document with a newer delivery from the feed.
    pub(in crate::app) fn apply_graph(&mut self, graph: StoryGraph) {
        self.graph = graph;
        self.sync_engine();
    }

    pub(in crate::app) fn show(
        &mut self,
        ctx: &Context,
        reload_requested: &mut bool,
        is_streaming: bool,
    ) {
        self.update_clock(ctx);
        self.update_fps_counter(ctx);

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("story-graph");
                    ui.separator();
                    ui.label(format!("nodes: {}", self.graph.node_count()));
                    ui.label(format!("links: {}", self.graph.links.len()));
                    let reload_button =
                        ui.add_enabled(!is_streaming, egui::Button::new("Reload document"));
                    if reload_button.clicked() {
                        *reload_requested = true;
                    }
                    if ui.button("Fit view").clicked() {
                        self.engine.fit_view(40.0);
                    }
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        ui.label(self.fps_display_text());
                    });
                });
            });

        egui::TopBottomPanel::bottom("status_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(self.status_text());
                    if let Some(status) = &self.editor.status {
                        ui.separator();
                        ui.label(status.as_str());
                    }
                });
            });

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(300.0)
            .show(ctx, |ui| self.draw_controls(ui, is_streaming));

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(300.0)
            .show(ctx, |ui| self.draw_details(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| self.draw_graph(ui));

        self.handle_clicks();
    }

    fn update_clock(&mut self, ctx: &Context) {
        let now = ctx.input(|input| input.time);
        let mounted_at = *self.mounted_at.get_or_insert(now);
        self.elapsed = Duration::from_secs_f64((now - mounted_at).max(0.0));
    }

    /// Pushes the full current document into the engine.
    pub(in crate::app) fn sync_engine(&mut self) {
        let report = self
            .engine
            .reconcile(&self.graph.nodes, &self.graph.links, self.elapsed);
        debug!(
            added = report.added,
            removed = report.removed,
            dropped_links = report.dropped_links,
            "document synced"
        );
        if self
            .editor
            .connect_source
            .as_deref()
            .is_some_and(|source| !self.graph.contains(source))
        {
            self.editor.connect_source = None;
        }
    }

    fn handle_clicks(&mut self) {
        let clicked = self.clicks.borrow_mut().drain(..).collect::<Vec<_>>();
        for id in clicked {
            if self.editor.mode != EditMode::Connect {
                continue;
            }
            match self.editor.connect_source.take() {
                None => {
                    self.editor.status = Some(format!("Source {id}: click the target node"));
                    self.editor.connect_source = Some(id);
                }
                Some(source) if source == id => {
                    self.editor.status = Some("Connection cancelled".to_owned());
                }
                Some(source) => self.connect(source, id),
            }
        }
    }

    pub(in crate::app) fn set_edit_mode(&mut self, mode: EditMode) {
        if self.editor.mode == mode {
            return;
        }
        self.editor.mode = mode;
        self.editor.connect_source = None;
        self.editor.status = match mode {
            EditMode::View => None,
            EditMode::Add => Some("Type the node text, then press Add".to_owned()),
            EditMode::Connect => Some("Click the source node".to_owned()),
        };
    }

    fn link_from_editor(&self, source: String, target: String) -> GraphLink {
        let mut link = GraphLink::new(source, target);
        if self.editor.link_directed {
            link = link.directed();
        }
        let label = self.editor.link_label.trim();
        if !label.is_empty() {
            link = link.labelled(label);
        }
        link
    }

    /// Appends a node with the draft text. When a node is selected the new
    /// one is linked from it, so it spawns next to its neighbour.
    pub(in crate::app) fn add_node(&mut self) {
        let text = self.editor.draft_text.trim().to_owned();
        if text.is_empty() {
            self.editor.status = Some("Node text is empty".to_owned());
            return;
        }

        let id = self.graph.push_node(&text);
        if let Some(selected) = self.engine.selected().map(str::to_owned) {
            let link = self.link_from_editor(selected, id.clone());
            self.graph.push_link(link);
        }
        self.editor.draft_text.clear();
        self.editor.status = Some(format!("Added {id}"));
        self.sync_engine();
    }

    fn connect(&mut self, source: String, target: String) {
        let link = self.link_from_editor(source.clone(), target.clone());
        if self.graph.push_link(link) {
            self.editor.status = Some(format!("Linked {source} to {target}"));
            self.sync_engine();
        } else {
            self.editor.status = Some(format!("{source} and {target} are already linked"));
        }
    }
}
