//! Pure mapping from a position snapshot to drawable world-space primitives.

use std::sync::Arc;

use eframe::egui::{Pos2, Rect, Vec2, vec2};

use crate::app::physics::PositionSnapshot;
use crate::app::sizes::SizeTable;
use crate::story::NodeContent;
use crate::util::direction_and_length;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(in crate::app) struct SceneStyle {
    pub curved_links: bool,
    pub arrow_length: f32,
    /// Labels sit this far above the link midpoint.
    pub label_lift: f32,
    pub curve_ratio: f32,
    pub max_curve_offset: f32,
}

impl Default for SceneStyle {
    fn default() -> Self {
        Self {
            curved_links: false,
            arrow_length: 10.0,
            label_lift: 5.0,
            curve_ratio: 0.2,
            max_curve_offset: 50.0,
        }
    }
}

#[derive(Clone, Debug)]
pub(in crate::app) struct SceneNode {
    pub id: String,
    pub content: Arc<NodeContent>,
    /// Footprint in world units, centred on the simulated position.
    pub rect: Rect,
    pub selected: bool,
    pub pinned: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(in crate::app) struct Arrowhead {
    pub tip: Pos2,
    /// Unit vector the arrow points along.
    pub direction: Vec2,
}

#[derive(Clone, Debug)]
pub(in crate::app) struct SceneLink {
    pub source: String,
    pub target: String,
    pub start: Pos2,
    pub end: Pos2,
    /// Quadratic control point for curved links.
    pub control: Option<Pos2>,
    pub label: Option<(String, Pos2)>,
    pub arrow: Option<Arrowhead>,
}

impl SceneLink {
    pub(in crate::app) fn midpoint(&self) -> Pos2 {
        match self.control {
            Some(control) => {
                let weighted = self.start.to_vec2() * 0.25
                    + control.to_vec2() * 0.5
                    + self.end.to_vec2() * 0.25;
                weighted.to_pos2()
            }
            None => self.start.lerp(self.end, 0.5),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub(in crate::app) struct Scene {
    pub nodes: Vec<SceneNode>,
    pub links: Vec<SceneLink>,
}

impl Scene {
    /// Topmost node whose footprint contains `world`.
    pub(in crate::app) fn node_at(&self, world: Pos2) -> Option<&SceneNode> {
        self.nodes.iter().rev().find(|node| node.rect.contains(world))
    }

    /// World-space bounds of every node, if any.
    pub(in crate::app) fn bounds(&self) -> Option<Rect> {
        self.nodes
            .iter()
            .map(|node| node.rect)
            .reduce(|bounds, rect| bounds.union(rect))
    }
}

pub(in crate::app) fn build_scene(
    snapshot: &PositionSnapshot,
    sizes: &SizeTable,
    selected: Option<&str>,
    style: SceneStyle,
) -> Scene {
    let mut nodes = snapshot
        .nodes
        .iter()
        .map(|node| SceneNode {
            id: node.id.clone(),
            content: Arc::clone(&node.content),
            rect: Rect::from_center_size(node.position, sizes.size_or_default(&node.id)),
            selected: selected == Some(node.id.as_str()),
            pinned: node.pinned,
        })
        .collect::<Vec<_>>();
    // Selected card paints last so it stays on top.
    nodes.sort_by_key(|node| node.selected);

    let links = snapshot
        .links
        .iter()
        .filter_map(|link| {
            let source = snapshot.node(&link.source)?;
            let target = snapshot.node(&link.target)?;
            let (direction, distance) =
                direction_and_length(target.position - source.position, Vec2::X);

            let start = source.position;
            let end = if link.directional {
                target.position - direction * target.radius
            } else {
                target.position
            };

            let control = style.curved_links.then(|| {
                let offset = (distance * style.curve_ratio).min(style.max_curve_offset);
                start.lerp(target.position, 0.5) + vec2(-direction.y, direction.x) * offset
            });

            let arrow = link.directional.then(|| {
                let along = match control {
                    Some(control) => direction_and_length(end - control, direction).0,
                    None => direction,
                };
                Arrowhead {
                    tip: end,
                    direction: along,
                }
            });

            let mut scene_link = SceneLink {
                source: link.source.clone(),
                target: link.target.clone(),
                start,
                end,
                control,
                label: None,
                arrow,
            };
            if let Some(label) = link.label.as_deref().filter(|label| !label.trim().is_empty()) {
                let anchor = scene_link.midpoint() - vec2(0.0, style.label_lift);
                scene_link.label = Some((label.to_owned(), anchor));
            }
            Some(scene_link)
        })
        .collect();

    Scene { nodes, links }
}
