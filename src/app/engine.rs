//! Per-mount façade tying simulation, size table, interaction and scene
//! building together.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use eframe::egui::{Vec2, pos2};
use tracing::debug;

use crate::story::{GraphLink, GraphNode};

use super::graph::interaction::{
    InteractionConfig, InteractionController, PointerEvent, ReleasePolicy,
};
use super::graph::scene::{Scene, SceneStyle, build_scene};
use super::physics::{
    PositionSnapshot, ReconcileReport, Simulation, SimulationConfig, SubscriberId,
};
use super::sizes::{MeasureOutcome, SizeOracleConfig, SizeTable};
use super::transform::ViewTransform;

#[derive(Clone, Debug, Default)]
pub(in crate::app) struct EngineConfig {
    pub simulation: SimulationConfig,
    pub sizes: SizeOracleConfig,
    pub interaction: InteractionConfig,
    pub style: SceneStyle,
}

type SelectCallback = Box<dyn FnMut(&str)>;

pub(in crate::app) struct GraphEngine {
    simulation_config: SimulationConfig,
    /// Created on the first reconcile.
    simulation: Option<Simulation>,
    sizes: SizeTable,
    controller: InteractionController,
    style: SceneStyle,
    on_select: Option<SelectCallback>,
    latest: Arc<PositionSnapshot>,
    emitted: u64,
    disposed: bool,
}

impl GraphEngine {
    pub(in crate::app) fn new(config: EngineConfig) -> Self {
        Self {
            simulation_config: config.simulation,
            simulation: None,
            sizes: SizeTable::new(config.sizes),
            controller: InteractionController::new(config.interaction),
            style: config.style,
            on_select: None,
            latest: Arc::default(),
            emitted: 0,
            disposed: false,
        }
    }

    pub(in crate::app) fn on_select(&mut self, callback: impl FnMut(&str) + 'static) {
        self.on_select = Some(Box::new(callback));
    }

    pub(in crate::app) fn reconcile(
        &mut self,
        nodes: &[GraphNode],
        links: &[GraphLink],
        now: Duration,
    ) -> ReconcileReport {
        if self.disposed {
            return ReconcileReport::default();
        }

        let ids = nodes
            .iter()
            .map(|node| node.id.as_str())
            .collect::<HashSet<_>>();
        self.sizes.retain(&ids);
        self.controller.retain(|id| ids.contains(id));

        let simulation = self
            .simulation
            .get_or_insert_with(|| Simulation::new(self.simulation_config.clone()));
        simulation.reconcile(nodes, links, &self.sizes, now)
    }

    /// Records a rendered size; a committed change rebuilds collision radii
    /// and nudges the layout.
    pub(in crate::app) fn measure(&mut self, id: &str, rendered: Vec2) -> MeasureOutcome {
        if self.disposed {
            return MeasureOutcome::Skipped;
        }
        let outcome = self.sizes.measure(id, rendered);
        if outcome == MeasureOutcome::Changed
            && let Some(simulation) = self.simulation.as_mut()
        {
            simulation.refresh_radii(&self.sizes);
            simulation.reheat(self.sizes.config().resize_heat);
        }
        outcome
    }

    /// Feeds one pointer event to the controller. A completed click is
    /// reported to the selection callback and returned.
    pub(in crate::app) fn handle_pointer(&mut self, event: PointerEvent) -> Option<String> {
        if self.disposed {
            return None;
        }
        let clicked = self.controller.handle(event, self.simulation.as_mut())?;
        debug!(id = clicked.as_str(), selected = self.controller.selected(), "node clicked");
        if let Some(callback) = self.on_select.as_mut() {
            callback(&clicked);
        }
        Some(clicked)
    }

    pub(in crate::app) fn advance(&mut self, now: Duration) -> usize {
        match self.simulation.as_mut() {
            Some(simulation) if !self.disposed => simulation.advance(now),
            _ => 0,
        }
    }

    /// Fires the pending coalesced frame, if any, and keeps its snapshot for
    /// drawing.
    pub(in crate::app) fn animation_frame(&mut self) -> Option<Arc<PositionSnapshot>> {
        let simulation = self.simulation.as_mut()?;
        let handle = simulation.pending_frame()?;
        let snapshot = simulation.fire_frame(handle)?;
        self.latest = Arc::clone(&snapshot);
        self.emitted += 1;
        Some(snapshot)
    }

    pub(in crate::app) fn latest(&self) -> &PositionSnapshot {
        &self.latest
    }

    pub(in crate::app) fn scene(&self) -> Scene {
        build_scene(
            &self.latest,
            &self.sizes,
            self.controller.selected(),
            self.style,
        )
    }

    pub(in crate::app) fn subscribe(
        &mut self,
        subscriber: impl FnMut(&PositionSnapshot) + 'static,
    ) -> Option<SubscriberId> {
        if self.disposed {
            return None;
        }
        let simulation = self
            .simulation
            .get_or_insert_with(|| Simulation::new(self.simulation_config.clone()));
        Some(simulation.subscribe(subscriber))
    }

    /// Keeps the stored config at the viewport the simulation accepted, so a
    /// later config edit does not push a jittered size back in.
    pub(in crate::app) fn set_viewport(&mut self, size: Vec2) {
        match self.simulation.as_mut() {
            Some(simulation) => {
                simulation.set_viewport(size);
                self.simulation_config.viewport = simulation.viewport();
            }
            None if size.is_finite() => {
                self.simulation_config.viewport = size.max(Vec2::splat(1.0));
            }
            None => {}
        }
    }

    pub(in crate::app) fn simulation_config(&self) -> &SimulationConfig {
        &self.simulation_config
    }

    pub(in crate::app) fn set_simulation_config(&mut self, config: SimulationConfig) {
        if let Some(simulation) = self.simulation.as_mut() {
            simulation.set_config(config.clone());
        }
        self.simulation_config = config;
    }

    pub(in crate::app) fn style(&self) -> SceneStyle {
        self.style
    }

    pub(in crate::app) fn set_style(&mut self, style: SceneStyle) {
        self.style = style;
    }

    pub(in crate::app) fn release_policy(&self) -> ReleasePolicy {
        self.controller.config().release
    }

    pub(in crate::app) fn set_release_policy(&mut self, release: ReleasePolicy) {
        self.controller.set_release_policy(release);
    }

    pub(in crate::app) fn reheat(&mut self) {
        if let Some(simulation) = self.simulation.as_mut() {
            simulation.reheat(1.0);
        }
    }

    pub(in crate::app) fn unpin_all(&mut self) {
        if let Some(simulation) = self.simulation.as_mut() {
            simulation.unpin_all();
        }
    }

    /// Centres the drawn nodes in the viewport at the largest scale that keeps
    /// `margin` screen pixels free on every side.
    pub(in crate::app) fn fit_view(&mut self, margin: f32) {
        let Some(bounds) = self.scene().bounds() else {
            return;
        };
        let viewport = self.simulation_config.viewport;
        let usable = (viewport - Vec2::splat(margin * 2.0)).max(Vec2::splat(1.0));
        let scale = (usable.x / bounds.width().max(1.0)).min(usable.y / bounds.height().max(1.0));

        let anchor = pos2(viewport.x * 0.5, viewport.y * 0.5);
        let centre = self.controller.transform().world_to_screen(bounds.center());
        self.controller.pan_by(anchor - centre);
        self.controller.zoom_to(scale, anchor);
    }

    pub(in crate::app) fn transform(&self) -> ViewTransform {
        self.controller.transform()
    }

    pub(in crate::app) fn selected(&self) -> Option<&str> {
        self.controller.selected()
    }

    pub(in crate::app) fn dragging(&self) -> Option<&str> {
        self.controller.dragging()
    }

    pub(in crate::app) fn is_pinned(&self, id: &str) -> bool {
        self.simulation
            .as_ref()
            .is_some_and(|simulation| simulation.is_pinned(id))
    }

    pub(in crate::app) fn alpha(&self) -> f32 {
        self.simulation.as_ref().map_or(0.0, Simulation::alpha)
    }

    pub(in crate::app) fn is_running(&self) -> bool {
        self.simulation
            .as_ref()
            .is_some_and(|simulation| simulation.is_running() || simulation.pending_frame().is_some())
    }

    pub(in crate::app) fn snapshots_emitted(&self) -> u64 {
        self.emitted
    }

    #[cfg(test)]
    pub(in crate::app) fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Stops the simulation and drops its pending frame and callbacks.
    pub(in crate::app) fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.on_select = None;
        if let Some(simulation) = self.simulation.as_mut() {
            simulation.dispose();
        }
    }
}

impl Drop for GraphEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use eframe::egui::{pos2, vec2};

    use super::*;
    use crate::app::graph::interaction::PointerTarget;

    fn engine() -> GraphEngine {
        GraphEngine::new(EngineConfig {
            simulation: SimulationConfig {
                seed: Some(5),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    fn story() -> (Vec<GraphNode>, Vec<GraphLink>) {
        (
            vec![
                GraphNode::text("a", "Alpha").at(100.0, 100.0),
                GraphNode::text("b", "Beta").at(300.0, 100.0),
            ],
            vec![GraphLink::new("a", "b").labelled("meets")],
        )
    }

    fn click(engine: &mut GraphEngine, id: &str, at: u64) -> Option<String> {
        engine.handle_pointer(PointerEvent::Down {
            pos: pos2(0.0, 0.0),
            target: PointerTarget::Node(id.to_owned()),
            time: Duration::from_millis(at),
        });
        engine.handle_pointer(PointerEvent::Up {
            pos: pos2(0.0, 0.0),
            time: Duration::from_millis(at + 50),
        })
    }

    #[test]
    fn committed_size_changes_rebuild_radii_and_nudge() {
        let mut engine = engine();
        let (nodes, links) = story();
        engine.reconcile(&nodes, &links, Duration::ZERO);
        for step in 0..60 {
            engine.advance(Duration::from_secs(step));
        }
        let cooled = engine.alpha();
        assert!(cooled < 0.1);

        assert_eq!(engine.measure("a", vec2(300.0, 80.0)), MeasureOutcome::Changed);
        assert!(engine.alpha() >= 0.1);
        assert_eq!(engine.latest().nodes.len(), 0);
        engine.animation_frame();
        assert_eq!(engine.latest().node("a").map(|node| node.radius), Some(150.0));

        let nudged = engine.alpha();
        assert_eq!(engine.measure("a", vec2(302.0, 83.0)), MeasureOutcome::Unchanged);
        assert_eq!(engine.alpha(), nudged);
    }

    #[test]
    fn sizes_measured_before_the_first_reconcile_are_used() {
        let mut engine = engine();
        engine.measure("a", vec2(40.0, 20.0));
        let (nodes, links) = story();
        engine.reconcile(&nodes, &links, Duration::ZERO);
        engine.animation_frame();
        assert_eq!(engine.latest().node("a").map(|node| node.radius), Some(20.0));
    }

    #[test]
    fn clicks_reach_the_selection_callback() {
        let mut engine = engine();
        let picked = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&picked);
        engine.on_select(move |id| sink.borrow_mut().push(id.to_owned()));

        let (nodes, links) = story();
        engine.reconcile(&nodes, &links, Duration::ZERO);
        assert_eq!(click(&mut engine, "b", 1000), Some("b".to_owned()));
        assert_eq!(engine.selected(), Some("b"));
        assert_eq!(*picked.borrow(), vec!["b".to_owned()]);
    }

    #[test]
    fn removing_the_selected_node_clears_selection_and_size() {
        let mut engine = engine();
        let (nodes, links) = story();
        engine.reconcile(&nodes, &links, Duration::ZERO);
        engine.measure("b", vec2(90.0, 40.0));
        click(&mut engine, "b", 0);

        engine.reconcile(&nodes[..1], &links, Duration::from_secs(1));
        assert_eq!(engine.selected(), None);
        engine.animation_frame();
        let scene = engine.scene();
        assert_eq!(scene.nodes.len(), 1);
        assert!(scene.links.is_empty());
    }

    #[test]
    fn frames_coalesce_and_are_counted() {
        let mut engine = engine();
        let heard = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&heard);
        engine.subscribe(move |_| *counter.borrow_mut() += 1);

        let (nodes, links) = story();
        engine.reconcile(&nodes, &links, Duration::ZERO);
        engine.advance(Duration::ZERO);
        engine.advance(Duration::from_millis(70));
        assert!(engine.animation_frame().is_some());
        assert!(engine.animation_frame().is_none());
        assert_eq!(engine.snapshots_emitted(), 1);
        assert_eq!(*heard.borrow(), 1);

        let scene = engine.scene();
        assert_eq!(scene.nodes.len(), 2);
        assert_eq!(scene.links[0].label.as_ref().map(|(text, _)| text.as_str()), Some("meets"));
    }

    #[test]
    fn fit_view_centres_the_drawn_nodes() {
        let mut engine = engine();
        let (nodes, links) = story();
        engine.reconcile(&nodes, &links, Duration::ZERO);
        engine.animation_frame();
        engine.fit_view(40.0);

        let transform = engine.transform();
        assert!((transform.k - 2.25).abs() < 1e-4);
        let centre = transform.world_to_screen(pos2(200.0, 100.0));
        assert!((centre.x - 400.0).abs() < 1e-3 && (centre.y - 300.0).abs() < 1e-3);
    }

    #[test]
    fn viewport_jitter_does_not_leak_through_config_edits() {
        let mut engine = engine();
        let (nodes, links) = story();
        engine.reconcile(&nodes, &links, Duration::ZERO);
        engine.set_viewport(vec2(1000.0, 800.0));
        engine.set_viewport(vec2(1000.5, 800.5));
        assert_eq!(engine.simulation_config().viewport, vec2(1000.0, 800.0));

        let config = SimulationConfig {
            link_distance: 90.0,
            ..engine.simulation_config().clone()
        };
        engine.set_simulation_config(config);
        let simulation = engine.simulation.as_ref().unwrap();
        assert_eq!(simulation.viewport(), vec2(1000.0, 800.0));
    }

    #[test]
    fn viewport_before_first_reconcile_is_clamped() {
        let mut engine = engine();
        engine.set_viewport(vec2(0.0, 300.0));
        engine.set_viewport(vec2(f32::NAN, 10.0));
        engine.reconcile(&[], &[], Duration::ZERO);
        assert_eq!(engine.simulation_config().viewport, vec2(1.0, 300.0));
        assert_eq!(engine.simulation.as_ref().unwrap().viewport(), vec2(1.0, 300.0));
    }

    #[test]
    fn disposed_engine_ignores_everything() {
        let mut engine = engine();
        let (nodes, links) = story();
        engine.reconcile(&nodes, &links, Duration::ZERO);
        engine.dispose();

        assert!(engine.is_disposed());
        assert!(engine.animation_frame().is_none());
        assert_eq!(engine.advance(Duration::from_secs(1)), 0);
        assert_eq!(click(&mut engine, "a", 0), None);
        assert_eq!(engine.reconcile(&nodes, &links, Duration::ZERO), ReconcileReport::default());
        assert!(engine.subscribe(|_| {}).is_none());
    }

    #[test]
    fn layout_changes_apply_without_reset() {
        let mut engine = engine();
        let (nodes, links) = story();
        engine.reconcile(&nodes, &links, Duration::ZERO);
        engine.animation_frame();
        let before = engine.latest().position("a");

        let config = SimulationConfig {
            charge: -100.0,
            ..engine.simulation_config().clone()
        };
        engine.set_simulation_config(config);
        assert_eq!(engine.simulation_config().charge, -100.0);
        engine.animation_frame();
        assert_eq!(engine.latest().position("a"), before);
    }
}
