use eframe::egui::Vec2;
use tracing::warn;

use super::Simulation;
use super::forces::{
    ChargeParams, CollisionParams, Spring, accumulate_charge_for_node, accumulate_collision_pairs,
    accumulate_springs, centering_shift,
};
use super::quadtree::QuadNode;

/// Buffers reused across ticks.
#[derive(Debug, Default)]
pub(super) struct PhysicsScratch {
    positions: Vec<Vec2>,
    predicted: Vec<Vec2>,
    velocity_deltas: Vec<Vec2>,
    radii: Vec<f32>,
    springs: Vec<Spring>,
}

pub(super) fn step(sim: &mut Simulation) {
    sim.alpha += (sim.alpha_target - sim.alpha) * sim.alpha_decay;
    let alpha = sim.alpha;
    let center = sim.center();

    let Simulation {
        config,
        nodes,
        links,
        scratch,
        ..
    } = sim;
    let node_count = nodes.len();

    scratch.positions.clear();
    scratch.predicted.clear();
    scratch.radii.clear();
    scratch.velocity_deltas.clear();
    scratch.velocity_deltas.resize(node_count, Vec2::ZERO);
    for node in nodes.iter() {
        scratch.positions.push(node.position);
        scratch.predicted.push(node.position + node.velocity);
        scratch.radii.push(node.radius);
    }

    scratch.springs.clear();
    scratch.springs.extend(links.iter().map(|link| Spring {
        source: link.source,
        target: link.target,
        rest_length: config
            .link_distance
            .max(nodes[link.source].radius + nodes[link.target].radius + config.link_padding),
        strength: link.strength,
        bias: link.bias,
    }));
    accumulate_springs(
        &scratch.springs,
        &scratch.predicted,
        alpha,
        &mut scratch.velocity_deltas,
    );

    if config.charge != 0.0
        && let Some(tree) = QuadNode::build(&scratch.positions)
    {
        let params = ChargeParams {
            strength: config.charge,
            alpha,
            theta: config.theta,
            distance_min_sq: config.distance_min * config.distance_min,
        };
        for index in 0..node_count {
            if !scratch.positions[index].is_finite() {
                continue;
            }
            accumulate_charge_for_node(
                &tree,
                index,
                &scratch.positions,
                params,
                &mut scratch.velocity_deltas[index],
            );
        }
    }

    let max_radius = scratch.radii.iter().copied().fold(0.0_f32, f32::max);
    if config.collision_strength > 0.0 && max_radius > 0.0 {
        for index in 0..node_count {
            scratch.predicted[index] += scratch.velocity_deltas[index];
        }
        if let Some(tree) = QuadNode::build(&scratch.predicted) {
            let reach = max_radius * 2.0;
            accumulate_collision_pairs(
                &tree,
                &tree,
                true,
                &scratch.predicted,
                &scratch.radii,
                CollisionParams {
                    strength: config.collision_strength,
                    max_collision_distance_sq: reach * reach,
                },
                &mut scratch.velocity_deltas,
            );
        }
    }

    let shift = centering_shift(
        &scratch.positions,
        center,
        config.center_strength,
    );
    let retained = 1.0 - config.velocity_decay.clamp(0.0, 1.0);

    for (index, node) in nodes.iter_mut().enumerate() {
        if let Some(pin) = node.pin {
            node.position = pin.target;
            node.velocity = Vec2::ZERO;
            continue;
        }

        let velocity = (node.velocity + scratch.velocity_deltas[index]) * retained;
        let position = node.position + shift + velocity;
        if velocity.is_finite() && position.is_finite() {
            node.velocity = velocity;
            node.position = position;
        } else {
            warn!(id = node.id.as_str(), "discarded non-finite integration step");
            node.velocity = Vec2::ZERO;
        }
    }

    if sim.alpha < sim.config.alpha_min {
        sim.running = false;
    }
}
