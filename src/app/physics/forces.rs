use eframe::egui::Vec2;

use crate::util::{COINCIDENT_EPSILON, fallback_direction};

use super::quadtree::QuadNode;

/// Direction from node `from` towards node `to` when they coincide.
/// Antisymmetric, so a coincident pair is pushed in opposite directions.
fn pair_fallback(from: usize, to: usize) -> Vec2 {
    if from < to {
        fallback_direction(from, to)
    } else {
        -fallback_direction(to, from)
    }
}

#[derive(Clone, Copy)]
pub(super) struct ChargeParams {
    /// Negative repels.
    pub(super) strength: f32,
    pub(super) alpha: f32,
    pub(super) theta: f32,
    pub(super) distance_min_sq: f32,
}

impl ChargeParams {
    /// Velocity change on a point at squared distance `distance_sq` from
    /// `weight` units of charge displaced by `delta`.
    fn pull(self, delta: Vec2, distance_sq: f32, weight: f32) -> Vec2 {
        let distance_sq = if distance_sq < self.distance_min_sq {
            (self.distance_min_sq * distance_sq).sqrt()
        } else {
            distance_sq
        };
        delta * (self.strength * weight * self.alpha / distance_sq)
    }
}

pub(super) fn accumulate_charge_for_node(
    node: &QuadNode,
    index: usize,
    positions: &[Vec2],
    params: ChargeParams,
    velocity_delta: &mut Vec2,
) {
    if node.mass <= 0.0 {
        return;
    }

    let point = positions[index];

    if node.is_leaf() {
        for &other in &node.indices {
            if other == index {
                continue;
            }
            let mut delta = positions[other] - point;
            let mut distance_sq = delta.length_sq();
            if distance_sq < COINCIDENT_EPSILON * COINCIDENT_EPSILON {
                delta = pair_fallback(index, other) * params.distance_min_sq.sqrt();
                distance_sq = params.distance_min_sq;
            }
            *velocity_delta += params.pull(delta, distance_sq, 1.0);
        }
        return;
    }

    let delta = node.center_of_mass - point;
    let distance_sq = delta.length_sq().max(COINCIDENT_EPSILON);
    let can_approximate = !node.bounds.contains(point)
        && (node.bounds.side_length() / distance_sq.sqrt()) < params.theta
        && node.mass > 1.0;

    if can_approximate {
        *velocity_delta += params.pull(delta, distance_sq, node.mass);
        return;
    }

    for child in node.children() {
        accumulate_charge_for_node(child, index, positions, params, velocity_delta);
    }
}

#[derive(Clone, Copy)]
pub(super) struct CollisionParams {
    pub(super) strength: f32,
    pub(super) max_collision_distance_sq: f32,
}

fn collide_pair(
    from: usize,
    to: usize,
    positions: &[Vec2],
    radii: &[f32],
    strength: f32,
    velocity_deltas: &mut [Vec2],
) {
    let reach = radii[from] + radii[to];
    let delta = positions[from] - positions[to];
    let distance_sq = delta.length_sq();
    if distance_sq >= reach * reach {
        return;
    }

    let distance = distance_sq.sqrt();
    let direction = if distance > COINCIDENT_EPSILON {
        delta / distance
    } else {
        -pair_fallback(from, to)
    };
    let push = direction * ((reach - distance) * strength);

    // The smaller node gives way more.
    let from_sq = radii[from] * radii[from];
    let to_sq = radii[to] * radii[to];
    let share = if from_sq + to_sq > 0.0 {
        to_sq / (from_sq + to_sq)
    } else {
        0.5
    };

    velocity_deltas[from] += push * share;
    velocity_deltas[to] -= push * (1.0 - share);
}

/// Visits every pair of points whose discs may overlap, once.
pub(super) fn accumulate_collision_pairs(
    node_a: &QuadNode,
    node_b: &QuadNode,
    same_node: bool,
    positions: &[Vec2],
    radii: &[f32],
    params: CollisionParams,
    velocity_deltas: &mut [Vec2],
) {
    if node_a.bounds.distance_sq_to(node_b.bounds) > params.max_collision_distance_sq {
        return;
    }

    if node_a.is_leaf() && node_b.is_leaf() {
        if same_node {
            for (offset, &from) in node_a.indices.iter().enumerate() {
                for &to in &node_a.indices[offset + 1..] {
                    collide_pair(from, to, positions, radii, params.strength, velocity_deltas);
                }
            }
        } else {
            for &from in &node_a.indices {
                for &to in &node_b.indices {
                    collide_pair(from, to, positions, radii, params.strength, velocity_deltas);
                }
            }
        }
        return;
    }

    if same_node {
        let children = node_a.children().collect::<Vec<_>>();
        for (offset, child_a) in children.iter().enumerate() {
            accumulate_collision_pairs(
                child_a,
                child_a,
                true,
                positions,
                radii,
                params,
                velocity_deltas,
            );
            for child_b in &children[offset + 1..] {
                accumulate_collision_pairs(
                    child_a,
                    child_b,
                    false,
                    positions,
                    radii,
                    params,
                    velocity_deltas,
                );
            }
        }
        return;
    }

    let split_a = if node_a.is_leaf() {
        false
    } else if node_b.is_leaf() {
        true
    } else {
        node_a.bounds.half_extent >= node_b.bounds.half_extent
    };

    if split_a {
        for child in node_a.children() {
            accumulate_collision_pairs(
                child,
                node_b,
                false,
                positions,
                radii,
                params,
                velocity_deltas,
            );
        }
    } else {
        for child in node_b.children() {
            accumulate_collision_pairs(
                node_a,
                child,
                false,
                positions,
                radii,
                params,
                velocity_deltas,
            );
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub(super) struct Spring {
    pub(super) source: usize,
    pub(super) target: usize,
    pub(super) rest_length: f32,
    pub(super) strength: f32,
    pub(super) bias: f32,
}

/// Pulls each pair towards its rest length, using positions advanced by the
/// current velocity so the spring anticipates where the ends are heading.
pub(super) fn accumulate_springs(
    springs: &[Spring],
    predicted: &[Vec2],
    alpha: f32,
    velocity_deltas: &mut [Vec2],
) {
    for spring in springs {
        let delta = predicted[spring.target] - predicted[spring.source];
        let mut distance = delta.length();
        let direction = if distance > COINCIDENT_EPSILON {
            delta / distance
        } else {
            distance = 0.0;
            pair_fallback(spring.source, spring.target)
        };
        let stretch = direction * ((distance - spring.rest_length) * alpha * spring.strength);

        velocity_deltas[spring.target] -= stretch * spring.bias;
        velocity_deltas[spring.source] += stretch * (1.0 - spring.bias);
    }
}

/// Offset that moves the centroid of `positions` a `strength` fraction of
/// the way to `center`.
pub(super) fn centering_shift(positions: &[Vec2], center: Vec2, strength: f32) -> Vec2 {
    let mut count = 0usize;
    let mut sum = Vec2::ZERO;
    for position in positions.iter().filter(|position| position.is_finite()) {
        sum += *position;
        count += 1;
    }
    if count == 0 {
        return Vec2::ZERO;
    }
    (center - sum / count as f32) * strength
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::vec2;

    fn charge(strength: f32) -> ChargeParams {
        ChargeParams {
            strength,
            alpha: 1.0,
            theta: 0.9,
            distance_min_sq: 1.0,
        }
    }

    #[test]
    fn negative_charge_pushes_points_apart() {
        let positions = vec![vec2(0.0, 0.0), vec2(10.0, 0.0)];
        let tree = QuadNode::build(&positions).unwrap();
        let mut left = Vec2::ZERO;
        let mut right = Vec2::ZERO;
        accumulate_charge_for_node(&tree, 0, &positions, charge(-400.0), &mut left);
        accumulate_charge_for_node(&tree, 1, &positions, charge(-400.0), &mut right);
        assert!(left.x < 0.0);
        assert!(right.x > 0.0);
        assert!((left + right).length() < 1e-4);
    }

    #[test]
    fn coincident_points_get_opposite_finite_pushes() {
        let positions = vec![vec2(3.0, 3.0), vec2(3.0, 3.0)];
        let tree = QuadNode::build(&positions).unwrap();
        let mut first = Vec2::ZERO;
        let mut second = Vec2::ZERO;
        accumulate_charge_for_node(&tree, 0, &positions, charge(-30.0), &mut first);
        accumulate_charge_for_node(&tree, 1, &positions, charge(-30.0), &mut second);
        assert!(first.is_finite() && second.is_finite());
        assert!(first.length() > 0.0);
        assert!((first + second).length() < 1e-4);
    }

    #[test]
    fn collision_separates_overlapping_discs_only() {
        let positions = vec![vec2(0.0, 0.0), vec2(30.0, 0.0), vec2(500.0, 0.0)];
        let radii = vec![20.0, 20.0, 20.0];
        let tree = QuadNode::build(&positions).unwrap();
        let mut deltas = vec![Vec2::ZERO; 3];
        accumulate_collision_pairs(
            &tree,
            &tree,
            true,
            &positions,
            &radii,
            CollisionParams {
                strength: 0.8,
                max_collision_distance_sq: 40.0 * 40.0,
            },
            &mut deltas,
        );
        assert!(deltas[0].x < 0.0);
        assert!(deltas[1].x > 0.0);
        assert_eq!(deltas[2], Vec2::ZERO);
        // overlap of 10 at strength 0.8, split evenly between equal discs
        assert!((deltas[1].x - 4.0).abs() < 1e-4);
    }

    #[test]
    fn springs_pull_stretched_links_together() {
        let predicted = vec![vec2(0.0, 0.0), vec2(300.0, 0.0)];
        let springs = [Spring {
            source: 0,
            target: 1,
            rest_length: 100.0,
            strength: 1.0,
            bias: 0.5,
        }];
        let mut deltas = vec![Vec2::ZERO; 2];
        accumulate_springs(&springs, &predicted, 0.5, &mut deltas);
        assert!((deltas[0].x - 50.0).abs() < 1e-4);
        assert!((deltas[1].x + 50.0).abs() < 1e-4);
    }

    #[test]
    fn centering_shift_ignores_empty_and_non_finite_sets() {
        assert_eq!(centering_shift(&[], vec2(10.0, 10.0), 1.0), Vec2::ZERO);
        let shift = centering_shift(
            &[vec2(0.0, 0.0), vec2(f32::NAN, 0.0), vec2(4.0, 0.0)],
            vec2(12.0, 0.0),
            0.5,
        );
        assert_eq!(shift, vec2(5.0, 0.0));
    }
}
