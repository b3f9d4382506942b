//! Force-directed layout simulation.
//!
//! The simulation owns every node's kinematic state. Input arrives as full
//! node/link lists through [`Simulation::reconcile`], which keeps the state of
//! ids it has seen before and places new ones near a positioned neighbour.
//! Links are resolved to node indices on every reconcile; forces read
//! positions through those indices each tick.
//!
//! Heat ("alpha") scales the charge and link forces and decays towards
//! `alpha_target` every tick. The simulation goes idle once alpha drops below
//! `alpha_min` and is woken by [`Simulation::reheat`] or
//! [`Simulation::set_heat`].
//!
//! Ticks only schedule a snapshot; the snapshot itself is built once per
//! animation frame by [`Simulation::fire_frame`], so any number of ticks
//! between two frames produce a single emission.

mod forces;
mod quadtree;
mod schedule;
mod snapshot;
mod step;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use eframe::egui::{Pos2, Vec2, vec2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::story::{GraphLink, GraphNode, NodeContent};

use super::sizes::SizeTable;
pub(in crate::app) use schedule::FrameHandle;
use schedule::{Cadence, FrameSlot};
pub(in crate::app) use snapshot::{PositionSnapshot, SnapshotLink, SnapshotNode};
use step::PhysicsScratch;

/// Alpha decay that cools from 1 to `alpha_min` (0.001) in about 300 ticks.
pub(in crate::app) fn default_alpha_decay() -> f32 {
    1.0 - 0.001_f32.powf(1.0 / 300.0)
}

#[derive(Clone, Debug, PartialEq)]
pub(in crate::app) struct SimulationConfig {
    /// Pairwise charge; negative values repel.
    pub charge: f32,
    /// Barnes–Hut accuracy; larger approximates more aggressively.
    pub theta: f32,
    pub distance_min: f32,
    pub link_distance: f32,
    /// Extra clearance between the collision discs of linked nodes.
    pub link_padding: f32,
    pub center_strength: f32,
    pub collision_strength: f32,
    pub collision_padding: f32,
    pub alpha_min: f32,
    pub alpha_decay: f32,
    pub velocity_decay: f32,
    pub new_node_min_distance: f32,
    pub new_node_max_distance: f32,
    pub new_node_settle: Duration,
    /// Alpha a structural change (node or link added/removed) heats to.
    pub reconcile_heat: f32,
    pub tick_interval: Duration,
    pub max_ticks_per_frame: usize,
    pub viewport: Vec2,
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            charge: -400.0,
            theta: 0.9,
            distance_min: 1.0,
            link_distance: 150.0,
            link_padding: 24.0,
            center_strength: 0.1,
            collision_strength: 0.8,
            collision_padding: 0.0,
            alpha_min: 0.001,
            alpha_decay: default_alpha_decay(),
            velocity_decay: 0.4,
            new_node_min_distance: 100.0,
            new_node_max_distance: 150.0,
            new_node_settle: Duration::from_millis(1500),
            reconcile_heat: 0.3,
            tick_interval: Duration::from_micros(16_667),
            max_ticks_per_frame: 4,
            viewport: vec2(800.0, 600.0),
            seed: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum PinReason {
    /// Placed next to a neighbour on insertion; released at `release_at`.
    Settle { release_at: Duration },
    Held,
}

/// A node's pin, opaque outside the simulation. Captured before a gesture
/// overrides it so the gesture can put it back unchanged.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(in crate::app) struct Pin {
    target: Vec2,
    reason: PinReason,
}

#[derive(Debug)]
struct SimNode {
    id: String,
    content: Arc<NodeContent>,
    position: Vec2,
    velocity: Vec2,
    pin: Option<Pin>,
    radius: f32,
}

#[derive(Debug)]
struct SimLink {
    source: usize,
    target: usize,
    label: Option<String>,
    directional: bool,
    strength: f32,
    bias: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(in crate::app) struct ReconcileReport {
    pub added: usize,
    pub removed: usize,
    pub dropped_links: usize,
    /// Membership or connectivity changed, and the simulation was reheated.
    pub structural: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(in crate::app) struct SubscriberId(u64);

type Subscriber = Box<dyn FnMut(&PositionSnapshot)>;

pub(in crate::app) struct Simulation {
    config: SimulationConfig,
    nodes: Vec<SimNode>,
    index_by_id: HashMap<String, usize>,
    links: Vec<SimLink>,
    alpha: f32,
    alpha_target: f32,
    alpha_decay: f32,
    running: bool,
    rng: StdRng,
    frame: FrameSlot,
    cadence: Cadence,
    subscribers: Vec<(SubscriberId, Subscriber)>,
    next_subscriber: u64,
    scratch: PhysicsScratch,
    revision: u64,
    disposed: bool,
}

impl Simulation {
    pub(in crate::app) fn new(config: SimulationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let cadence = Cadence::new(config.tick_interval, config.max_ticks_per_frame);

        Self {
            alpha_decay: config.alpha_decay,
            config,
            nodes: Vec::new(),
            index_by_id: HashMap::new(),
            links: Vec::new(),
            alpha: 1.0,
            alpha_target: 0.0,
            running: true,
            rng,
            frame: FrameSlot::default(),
            cadence,
            subscribers: Vec::new(),
            next_subscriber: 0,
            scratch: PhysicsScratch::default(),
            revision: 0,
            disposed: false,
        }
    }

    /// Swaps tunables without touching kinematic state, then reheats gently.
    pub(in crate::app) fn set_config(&mut self, config: SimulationConfig) {
        if config == self.config {
            return;
        }
        self.cadence = Cadence::new(config.tick_interval, config.max_ticks_per_frame);
        self.config = config;
        self.reheat(self.config.reconcile_heat);
    }

    /// Moves the centring target to the middle of a `size` canvas.
    pub(in crate::app) fn set_viewport(&mut self, size: Vec2) {
        if !size.is_finite() {
            return;
        }
        let size = size.max(vec2(1.0, 1.0));
        let change = (size - self.config.viewport).abs();
        if change.x <= 1.0 && change.y <= 1.0 {
            return;
        }
        self.config.viewport = size;
        self.reheat(self.config.alpha_min * 100.0);
    }

    pub(in crate::app) fn viewport(&self) -> Vec2 {
        self.config.viewport
    }

    fn center(&self) -> Vec2 {
        self.config.viewport * 0.5
    }

    /// Brings the working set in line with `nodes`/`links`.
    ///
    /// Known ids keep their position, velocity and pin untouched. New ids
    /// next to an already positioned neighbour are placed 100–150 units
    /// from it and pinned for the settle window; other new ids land at a
    /// random point of the viewport. Links naming unknown ids are dropped.
    pub(in crate::app) fn reconcile(
        &mut self,
        nodes: &[GraphNode],
        links: &[GraphLink],
        sizes: &SizeTable,
        now: Duration,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        if self.disposed {
            return report;
        }

        let prior_links = self.link_keys();
        let incoming = nodes
            .iter()
            .map(|node| node.id.as_str())
            .collect::<HashSet<_>>();

        let mut prior = std::mem::take(&mut self.nodes)
            .into_iter()
            .map(|node| (node.id.clone(), node))
            .collect::<HashMap<_, _>>();
        let anchors = prior
            .values()
            .filter(|node| incoming.contains(node.id.as_str()) && node.position.is_finite())
            .map(|node| (node.id.clone(), node.position))
            .collect::<HashMap<_, _>>();

        let mut content_changed = false;
        let mut seen = HashSet::with_capacity(nodes.len());
        let mut next = Vec::with_capacity(nodes.len());
        for node in nodes {
            if !seen.insert(node.id.as_str()) {
                warn!(id = node.id.as_str(), "duplicate node id ignored");
                continue;
            }

            match prior.remove(&node.id) {
                Some(mut existing) => {
                    if *existing.content != node.content {
                        existing.content = Arc::new(node.content.clone());
                        content_changed = true;
                    }
                    next.push(existing);
                }
                None => {
                    report.added += 1;
                    next.push(self.place_new_node(node, links, &anchors, now));
                }
            }
        }
        report.removed = prior.len();

        self.index_by_id = next
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.clone(), index))
            .collect();
        self.nodes = next;
        report.dropped_links = self.resolve_links(links);
        self.refresh_radii(sizes);

        report.structural =
            report.added > 0 || report.removed > 0 || self.link_keys() != prior_links;
        if report.structural {
            debug!(
                added = report.added,
                removed = report.removed,
                dropped_links = report.dropped_links,
                nodes = self.nodes.len(),
                links = self.links.len(),
                "reconciled graph"
            );
            self.reheat(self.config.reconcile_heat);
        }
        if report.structural || content_changed {
            self.revision += 1;
            self.frame.schedule();
        }

        report
    }

    fn place_new_node(
        &mut self,
        node: &GraphNode,
        links: &[GraphLink],
        anchors: &HashMap<String, Vec2>,
        now: Duration,
    ) -> SimNode {
        let seeded = node
            .position
            .map(|[x, y]| vec2(x, y))
            .filter(|position| position.is_finite());
        let anchor = links.iter().find_map(|link| {
            let neighbour = if link.source == node.id {
                &link.target
            } else if link.target == node.id {
                &link.source
            } else {
                return None;
            };
            anchors.get(neighbour).copied()
        });

        let (position, pin) = match (seeded, anchor) {
            (Some(position), _) => (position, None),
            (None, Some(anchor)) => {
                let low = self.config.new_node_min_distance.min(self.config.new_node_max_distance);
                let high = self.config.new_node_min_distance.max(self.config.new_node_max_distance);
                let angle = self.rng.random_range(0.0..std::f32::consts::TAU);
                let distance = self.rng.random_range(low..=high);
                let position = anchor + Vec2::angled(angle) * distance;
                let pin = Pin {
                    target: position,
                    reason: PinReason::Settle {
                        release_at: now + self.config.new_node_settle,
                    },
                };
                (position, Some(pin))
            }
            (None, None) => {
                let viewport = self.config.viewport;
                let position = vec2(
                    self.rng.random_range(0.0..=viewport.x),
                    self.rng.random_range(0.0..=viewport.y),
                );
                (position, None)
            }
        };

        SimNode {
            id: node.id.clone(),
            content: Arc::new(node.content.clone()),
            position,
            velocity: Vec2::ZERO,
            pin,
            radius: 0.0,
        }
    }

    /// Resolves link endpoints to indices. Returns how many were dropped for
    /// naming an unknown node.
    fn resolve_links(&mut self, links: &[GraphLink]) -> usize {
        let mut dropped = 0;
        let mut seen = HashSet::with_capacity(links.len());
        let mut resolved = Vec::with_capacity(links.len());

        for link in links {
            let (Some(&source), Some(&target)) = (
                self.index_by_id.get(&link.source),
                self.index_by_id.get(&link.target),
            ) else {
                warn!(
                    source = link.source.as_str(),
                    target = link.target.as_str(),
                    "link references a node that is not in the graph; dropped"
                );
                dropped += 1;
                continue;
            };

            if source == target {
                debug!(id = link.source.as_str(), "self link ignored");
                continue;
            }

            let key = if link.directional {
                (source, target, true)
            } else {
                (source.min(target), source.max(target), false)
            };
            if !seen.insert(key) {
                continue;
            }

            resolved.push(SimLink {
                source,
                target,
                label: link.label.clone(),
                directional: link.directional,
                strength: 0.0,
                bias: 0.0,
            });
        }

        let mut degree = vec![0usize; self.nodes.len()];
        for link in &resolved {
            degree[link.source] += 1;
            degree[link.target] += 1;
        }
        for link in &mut resolved {
            let source_degree = degree[link.source] as f32;
            let target_degree = degree[link.target] as f32;
            link.strength = 1.0 / source_degree.min(target_degree);
            link.bias = source_degree / (source_degree + target_degree);
        }

        self.links = resolved;
        dropped
    }

    fn link_keys(&self) -> HashSet<(String, String, bool)> {
        self.links
            .iter()
            .map(|link| {
                (
                    self.nodes[link.source].id.clone(),
                    self.nodes[link.target].id.clone(),
                    link.directional,
                )
            })
            .collect()
    }

    /// Re-derives collision radii from measured sizes.
    pub(in crate::app) fn refresh_radii(&mut self, sizes: &SizeTable) {
        for node in &mut self.nodes {
            node.radius = sizes.radius(&node.id) + self.config.collision_padding;
        }
    }

    /// Fixes a node at `(x, y)` until [`Self::unpin`]. It keeps acting on
    /// other nodes but never moves itself.
    pub(in crate::app) fn pin(&mut self, id: &str, x: f32, y: f32) -> bool {
        let target = vec2(x, y);
        if !target.is_finite() {
            return false;
        }
        let Some(node) = self.node_mut(id) else {
            return false;
        };
        node.pin = Some(Pin {
            target,
            reason: PinReason::Held,
        });
        node.position = target;
        node.velocity = Vec2::ZERO;
        self.frame.schedule();
        true
    }

    pub(in crate::app) fn pin_state(&self, id: &str) -> Option<Pin> {
        self.node(id).and_then(|node| node.pin)
    }

    /// Reinstates a pin captured with [`Self::pin_state`]. A settle pin
    /// keeps its original release time; `None` frees the node.
    pub(in crate::app) fn restore_pin(&mut self, id: &str, pin: Option<Pin>) -> bool {
        let Some(node) = self.node_mut(id) else {
            return false;
        };
        node.pin = pin;
        if let Some(pin) = pin {
            node.position = pin.target;
            node.velocity = Vec2::ZERO;
        }
        self.frame.schedule();
        true
    }

    pub(in crate::app) fn unpin(&mut self, id: &str) -> bool {
        match self.node_mut(id) {
            Some(node) => node.pin.take().is_some(),
            None => false,
        }
    }

    pub(in crate::app) fn unpin_all(&mut self) {
        for node in &mut self.nodes {
            node.pin = None;
        }
        self.reheat(self.config.reconcile_heat);
    }

    /// Sets the alpha the simulation eases towards and how fast it gets there.
    pub(in crate::app) fn set_heat(&mut self, alpha_target: f32, decay_rate: f32) {
        self.alpha_target = alpha_target.max(0.0);
        self.alpha_decay = decay_rate.clamp(0.0, 1.0);
        if self.alpha_target >= self.config.alpha_min {
            self.wake();
        }
    }

    /// Raises alpha to at least `alpha`; never lowers it.
    pub(in crate::app) fn reheat(&mut self, alpha: f32) {
        if self.disposed {
            return;
        }
        self.alpha = self.alpha.max(alpha);
        if self.alpha >= self.config.alpha_min {
            self.wake();
        }
    }

    fn wake(&mut self) {
        if self.disposed || self.running {
            return;
        }
        self.running = true;
        self.cadence.reset();
    }

    /// Releases expired settle pins and runs the ticks owed at `now`.
    pub(in crate::app) fn advance(&mut self, now: Duration) -> usize {
        if self.disposed {
            return 0;
        }

        for node in &mut self.nodes {
            if let Some(Pin {
                reason: PinReason::Settle { release_at },
                ..
            }) = node.pin
                && release_at <= now
            {
                debug!(id = node.id.as_str(), "settle window over; node released");
                node.pin = None;
            }
        }

        if !self.running {
            return 0;
        }
        let due = self.cadence.due(now);
        let mut ran = 0;
        while ran < due && self.running {
            self.tick();
            ran += 1;
        }
        ran
    }

    /// One integration step under every force, then schedules a snapshot.
    pub(in crate::app) fn tick(&mut self) {
        if self.disposed {
            return;
        }
        step::step(self);
        self.revision += 1;
        self.frame.schedule();
    }

    pub(in crate::app) fn pending_frame(&self) -> Option<FrameHandle> {
        self.frame.pending()
    }

    /// Emits the snapshot for `handle` to subscribers. Stale handles and
    /// handles that fire after [`Self::dispose`] do nothing.
    pub(in crate::app) fn fire_frame(&mut self, handle: FrameHandle) -> Option<Arc<PositionSnapshot>> {
        if self.disposed || !self.frame.take(handle) {
            return None;
        }
        let snapshot = Arc::new(self.snapshot());
        for (_, subscriber) in &mut self.subscribers {
            subscriber(snapshot.as_ref());
        }
        Some(snapshot)
    }

    pub(in crate::app) fn subscribe(
        &mut self,
        subscriber: impl FnMut(&PositionSnapshot) + 'static,
    ) -> SubscriberId {
        self.next_subscriber += 1;
        let id = SubscriberId(self.next_subscriber);
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    #[cfg(test)]
    pub(in crate::app) fn unsubscribe(&mut self, id: SubscriberId) {
        self.subscribers.retain(|(existing, _)| *existing != id);
    }

    pub(in crate::app) fn snapshot(&self) -> PositionSnapshot {
        let nodes = self
            .nodes
            .iter()
            .filter(|node| node.position.is_finite())
            .map(|node| SnapshotNode {
                id: node.id.clone(),
                content: Arc::clone(&node.content),
                position: node.position.to_pos2(),
                radius: node.radius,
                pinned: node.pin.is_some(),
            })
            .collect();
        let links = self
            .links
            .iter()
            .map(|link| SnapshotLink {
                source: self.nodes[link.source].id.clone(),
                target: self.nodes[link.target].id.clone(),
                label: link.label.clone(),
                directional: link.directional,
            })
            .collect();
        PositionSnapshot::new(self.revision, nodes, links)
    }

    /// Stops the integrator and drops any pending frame and subscribers.
    pub(in crate::app) fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        debug!(nodes = self.nodes.len(), "simulation disposed");
        self.disposed = true;
        self.running = false;
        self.frame.cancel();
        self.subscribers.clear();
    }

    pub(in crate::app) fn position(&self, id: &str) -> Option<Pos2> {
        self.node(id)
            .map(|node| node.position)
            .filter(|position| position.is_finite())
            .map(Vec2::to_pos2)
    }

    #[cfg(test)]
    pub(in crate::app) fn velocity(&self, id: &str) -> Option<Vec2> {
        self.node(id).map(|node| node.velocity)
    }

    pub(in crate::app) fn is_pinned(&self, id: &str) -> bool {
        self.node(id).is_some_and(|node| node.pin.is_some())
    }

    #[cfg(test)]
    pub(in crate::app) fn radius(&self, id: &str) -> Option<f32> {
        self.node(id).map(|node| node.radius)
    }

    pub(in crate::app) fn alpha(&self) -> f32 {
        self.alpha
    }

    pub(in crate::app) fn is_running(&self) -> bool {
        self.running
    }

    #[cfg(test)]
    pub(in crate::app) fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[cfg(test)]
    pub(in crate::app) fn link_count(&self) -> usize {
        self.links.len()
    }

    fn node(&self, id: &str) -> Option<&SimNode> {
        self.index_by_id.get(id).map(|&index| &self.nodes[index])
    }

    fn node_mut(&mut self, id: &str) -> Option<&mut SimNode> {
        self.index_by_id.get(id).map(|&index| &mut self.nodes[index])
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use eframe::egui::pos2;
    use proptest::prelude::*;

    use super::*;
    use crate::app::sizes::SizeOracleConfig;

    fn seeded() -> Simulation {
        Simulation::new(SimulationConfig {
            seed: Some(7),
            ..Default::default()
        })
    }

    fn sizes() -> SizeTable {
        SizeTable::new(SizeOracleConfig::default())
    }

    fn node(id: &str) -> GraphNode {
        GraphNode::text(id, id.to_uppercase())
    }

    fn at(seconds: f32) -> Duration {
        Duration::from_secs_f32(seconds)
    }

    #[test]
    fn reconciling_the_same_graph_twice_changes_nothing() {
        let mut sim = seeded();
        let nodes = vec![node("a"), node("b"), node("c")];
        let links = vec![GraphLink::new("a", "b"), GraphLink::new("b", "c")];
        sim.reconcile(&nodes, &links, &sizes(), at(0.0));
        for _ in 0..400 {
            sim.tick();
        }
        let alpha = sim.alpha();
        let before = sim.snapshot();

        let first = sim.reconcile(&nodes, &links, &sizes(), at(1.0));
        let second = sim.reconcile(&nodes, &links, &sizes(), at(1.0));

        assert!(!first.structural && !second.structural);
        assert_eq!(sim.alpha(), alpha);
        assert!(!sim.is_running());
        for node in &before.nodes {
            assert_eq!(sim.position(&node.id), Some(node.position));
        }
    }

    #[test]
    fn known_nodes_keep_position_and_velocity_across_reconcile() {
        let mut sim = seeded();
        let links = vec![GraphLink::new("a", "b")];
        sim.reconcile(&[node("a"), node("b")], &links, &sizes(), at(0.0));
        for _ in 0..20 {
            sim.tick();
        }
        let kept = ["a", "b"].map(|id| (sim.position(id), sim.velocity(id)));

        let mut links = links;
        links.push(GraphLink::new("c", "a"));
        let report = sim.reconcile(&[node("a"), node("b"), node("c")], &links, &sizes(), at(0.5));

        assert_eq!(report.added, 1);
        assert!(report.structural);
        for (id, (position, velocity)) in ["a", "b"].into_iter().zip(kept) {
            assert_eq!(sim.position(id), position);
            assert_eq!(sim.velocity(id), velocity);
        }
    }

    #[test]
    fn new_node_lands_near_its_positioned_neighbour_and_settles() {
        let mut sim = seeded();
        sim.reconcile(&[node("a").at(100.0, 100.0)], &[], &sizes(), at(0.0));
        assert_eq!(sim.position("a"), Some(pos2(100.0, 100.0)));

        sim.reconcile(
            &[node("a"), node("b")],
            &[GraphLink::new("a", "b")],
            &sizes(),
            at(0.0),
        );
        let distance = sim.position("b").unwrap().distance(pos2(100.0, 100.0));
        assert!((99.999..=150.001).contains(&distance), "distance {distance}");
        assert!(sim.is_pinned("b"));
        assert!(!sim.is_pinned("a"));

        sim.advance(at(1.0));
        assert!(sim.is_pinned("b"));
        sim.advance(at(1.6));
        assert!(!sim.is_pinned("b"));
    }

    #[test]
    fn unconnected_new_nodes_land_inside_the_viewport_unpinned() {
        let mut sim = seeded();
        let nodes = (0..20).map(|i| node(&format!("n{i}"))).collect::<Vec<_>>();
        sim.reconcile(&nodes, &[], &sizes(), at(0.0));
        for node in &nodes {
            let position = sim.position(&node.id).unwrap();
            assert!((0.0..=800.0).contains(&position.x));
            assert!((0.0..=600.0).contains(&position.y));
            assert!(!sim.is_pinned(&node.id));
        }
    }

    #[test]
    fn links_to_missing_nodes_are_dropped() {
        let mut sim = seeded();
        let report = sim.reconcile(
            &[node("a")],
            &[GraphLink::new("a", "ghost")],
            &sizes(),
            at(0.0),
        );
        assert_eq!(report.dropped_links, 1);
        assert_eq!(sim.link_count(), 0);
        assert!(sim.snapshot().links.is_empty());
    }

    #[test]
    fn duplicate_and_self_links_collapse() {
        let mut sim = seeded();
        sim.reconcile(
            &[node("a"), node("b")],
            &[
                GraphLink::new("a", "b"),
                GraphLink::new("b", "a"),
                GraphLink::new("a", "b"),
                GraphLink::new("a", "a"),
                GraphLink::new("a", "b").directed(),
            ],
            &sizes(),
            at(0.0),
        );
        assert_eq!(sim.link_count(), 2);
    }

    #[test]
    fn duplicate_node_ids_keep_the_first() {
        let mut sim = seeded();
        sim.reconcile(
            &[node("a").at(1.0, 2.0), node("a").at(50.0, 50.0)],
            &[],
            &sizes(),
            at(0.0),
        );
        assert_eq!(sim.node_count(), 1);
        assert_eq!(sim.position("a"), Some(pos2(1.0, 2.0)));
    }

    #[test]
    fn removing_a_node_drops_it_and_reheats() {
        let mut sim = seeded();
        sim.reconcile(&[node("a"), node("b")], &[GraphLink::new("a", "b")], &sizes(), at(0.0));
        for _ in 0..400 {
            sim.tick();
        }
        let report = sim.reconcile(&[node("a")], &[GraphLink::new("a", "b")], &sizes(), at(1.0));
        assert_eq!(report.removed, 1);
        assert_eq!(report.dropped_links, 1);
        assert!(report.structural);
        assert!(sim.alpha() >= 0.3);
        assert!(sim.is_running());
        assert_eq!(sim.position("b"), None);
    }

    #[test]
    fn pinned_node_holds_exactly_under_repulsion() {
        let mut sim = seeded();
        sim.reconcile(
            &[node("a").at(50.0, 60.0), node("b").at(55.0, 60.0), node("c").at(50.0, 65.0)],
            &[GraphLink::new("a", "b"), GraphLink::new("a", "c")],
            &sizes(),
            at(0.0),
        );
        assert!(sim.pin("a", 50.0, 60.0));
        for _ in 0..100 {
            sim.tick();
            assert_eq!(sim.position("a"), Some(pos2(50.0, 60.0)));
        }
        assert!(sim.position("b").unwrap().distance(pos2(50.0, 60.0)) > 5.0);

        assert!(sim.unpin("a"));
        sim.reheat(1.0);
        for _ in 0..10 {
            sim.tick();
        }
        assert_ne!(sim.position("a"), Some(pos2(50.0, 60.0)));
    }

    #[test]
    fn pin_ignores_unknown_ids_and_non_finite_targets() {
        let mut sim = seeded();
        sim.reconcile(&[node("a")], &[], &sizes(), at(0.0));
        assert!(!sim.pin("missing", 1.0, 1.0));
        assert!(!sim.pin("a", f32::NAN, 1.0));
        assert!(!sim.is_pinned("a"));
        assert!(!sim.unpin("a"));
    }

    #[test]
    fn coincident_nodes_separate_without_nan() {
        let mut sim = seeded();
        sim.reconcile(
            &[node("a").at(10.0, 10.0), node("b").at(10.0, 10.0)],
            &[GraphLink::new("a", "b")],
            &sizes(),
            at(0.0),
        );
        for _ in 0..50 {
            sim.tick();
        }
        let a = sim.position("a").unwrap();
        let b = sim.position("b").unwrap();
        assert!(a.x.is_finite() && a.y.is_finite() && b.x.is_finite() && b.y.is_finite());
        assert!(a.distance(b) > 1.0);
    }

    #[test]
    fn measured_sizes_widen_the_collision_gap() {
        let mut sim = Simulation::new(SimulationConfig {
            seed: Some(1),
            charge: 0.0,
            center_strength: 0.0,
            ..Default::default()
        });
        let mut table = sizes();
        sim.reconcile(
            &[node("a").at(300.0, 300.0), node("b").at(350.0, 300.0)],
            &[],
            &table,
            at(0.0),
        );
        assert_eq!(sim.radius("a"), Some(60.0));

        table.measure("a", vec2(200.0, 200.0));
        table.measure("b", vec2(200.0, 200.0));
        sim.refresh_radii(&table);
        assert_eq!(sim.radius("a"), Some(100.0));

        for _ in 0..300 {
            sim.tick();
        }
        let gap = sim.position("a").unwrap().distance(sim.position("b").unwrap());
        assert!(gap > 150.0, "gap {gap}");
    }

    #[test]
    fn heat_target_keeps_the_simulation_warm_until_cooled() {
        let mut sim = seeded();
        sim.reconcile(&[node("a"), node("b")], &[], &sizes(), at(0.0));
        for _ in 0..500 {
            sim.tick();
        }
        assert!(sim.alpha() < 0.001);

        sim.set_heat(0.3, default_alpha_decay());
        assert!(sim.is_running());
        for _ in 0..1000 {
            sim.tick();
        }
        assert!((sim.alpha() - 0.3).abs() < 0.01);
        assert!(sim.is_running());

        sim.set_heat(0.0, default_alpha_decay());
        for _ in 0..1000 {
            sim.tick();
        }
        assert!(!sim.is_running());
    }

    #[test]
    fn ticks_between_frames_coalesce_into_one_snapshot() {
        let mut sim = seeded();
        let emitted = Rc::new(Cell::new(0));
        let counter = Rc::clone(&emitted);
        sim.subscribe(move |_| counter.set(counter.get() + 1));

        sim.reconcile(&[node("a"), node("b")], &[], &sizes(), at(0.0));
        let stale = sim.pending_frame().unwrap();
        sim.tick();
        sim.tick();
        sim.tick();
        let handle = sim.pending_frame().unwrap();

        assert!(sim.fire_frame(stale).is_none());
        let snapshot = sim.fire_frame(handle).unwrap();
        assert_eq!(snapshot.nodes.len(), 2);
        assert!(sim.fire_frame(handle).is_none());
        assert_eq!(emitted.get(), 1);
        assert_eq!(sim.pending_frame(), None);
    }

    #[test]
    fn unsubscribed_listeners_stop_hearing_frames() {
        let mut sim = seeded();
        let emitted = Rc::new(Cell::new(0));
        let counter = Rc::clone(&emitted);
        let id = sim.subscribe(move |_| counter.set(counter.get() + 1));
        sim.unsubscribe(id);
        sim.tick();
        let handle = sim.pending_frame().unwrap();
        assert!(sim.fire_frame(handle).is_some());
        assert_eq!(emitted.get(), 0);
    }

    #[test]
    fn frames_firing_after_dispose_are_ignored() {
        let mut sim = seeded();
        sim.reconcile(&[node("a")], &[], &sizes(), at(0.0));
        let handle = sim.pending_frame().unwrap();
        sim.dispose();

        assert!(sim.fire_frame(handle).is_none());
        sim.tick();
        assert_eq!(sim.advance(at(5.0)), 0);
        assert!(!sim.is_running());
        let report = sim.reconcile(&[node("a"), node("b")], &[], &sizes(), at(6.0));
        assert_eq!(report, ReconcileReport::default());
    }

    #[test]
    fn advance_follows_the_tick_cadence() {
        let mut sim = seeded();
        sim.reconcile(&[node("a")], &[], &sizes(), at(0.0));
        assert_eq!(sim.advance(Duration::ZERO), 1);
        assert_eq!(sim.advance(Duration::from_millis(5)), 0);
        assert_eq!(sim.advance(Duration::from_millis(40)), 2);
        assert_eq!(sim.advance(Duration::from_secs(10)), 4);
    }

    #[test]
    fn empty_graph_ticks_cleanly() {
        let mut sim = seeded();
        sim.reconcile(&[], &[], &sizes(), at(0.0));
        for _ in 0..10 {
            sim.tick();
        }
        let handle = sim.pending_frame().unwrap();
        let snapshot = sim.fire_frame(handle).unwrap();
        assert!(snapshot.nodes.is_empty());
    }

    #[test]
    fn viewport_changes_move_the_centre() {
        let mut sim = seeded();
        sim.reconcile(&[node("a").at(0.0, 0.0)], &[], &sizes(), at(0.0));
        sim.set_viewport(vec2(2000.0, 1000.0));
        for _ in 0..300 {
            sim.tick();
        }
        let position = sim.position("a").unwrap();
        assert!(position.distance(pos2(1000.0, 500.0)) < 5.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn snapshots_never_contain_non_finite_positions(
            seeds in prop::collection::vec(
                prop::option::of((0u8..4, 0u8..4)),
                0..24,
            ),
            edges in prop::collection::vec((0usize..30, 0usize..30, any::<bool>()), 0..40),
            ticks in 1usize..80,
        ) {
            let nodes = seeds
                .iter()
                .enumerate()
                .map(|(index, seed)| {
                    let node = node(&format!("n{index}"));
                    match seed {
                        Some((x, y)) => node.at(*x as f32 * 10.0, *y as f32 * 10.0),
                        None => node,
                    }
                })
                .collect::<Vec<_>>();
            let links = edges
                .iter()
                .map(|(from, to, directed)| {
                    let link = GraphLink::new(format!("n{from}"), format!("n{to}"));
                    if *directed { link.directed() } else { link }
                })
                .collect::<Vec<_>>();

            let mut sim = seeded();
            sim.reconcile(&nodes, &links, &sizes(), Duration::ZERO);
            for tick in 0..ticks {
                sim.tick();
                if tick % 20 == 0 {
                    sim.reconcile(&nodes[..nodes.len() / 2], &links, &sizes(), Duration::ZERO);
                    sim.reconcile(&nodes, &links, &sizes(), Duration::ZERO);
                }
            }

            let handle = sim.pending_frame().unwrap();
            let snapshot = sim.fire_frame(handle).unwrap();
            prop_assert_eq!(snapshot.nodes.len(), nodes.len());
            for node in &snapshot.nodes {
                prop_assert!(node.position.x.is_finite() && node.position.y.is_finite());
            }
        }
    }
}
