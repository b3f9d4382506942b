use eframe::egui::{Vec2, vec2};

/// Below this distance two points are treated as coincident.
pub const COINCIDENT_EPSILON: f32 = 0.0001;

/// Deterministic, well-spread direction for a pair of indices, used when two
/// points coincide and the true direction is undefined.
pub fn fallback_direction(a: usize, b: usize) -> Vec2 {
    let angle = ((a as f32) * 0.618_034 + (b as f32) * 0.414_214) * std::f32::consts::TAU;
    vec2(angle.cos(), angle.sin())
}

/// Unit direction and length of `delta`; coincident points fall back to `fallback`.
pub fn direction_and_length(delta: Vec2, fallback: Vec2) -> (Vec2, f32) {
    let length = delta.length();
    if length > COINCIDENT_EPSILON && length.is_finite() {
        (delta / length, length)
    } else {
        (fallback, 0.0)
    }
}

pub fn truncate_label(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head = chars.by_ref().take(max_chars).collect::<String>();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coincident_points_use_the_fallback() {
        let (direction, length) = direction_and_length(Vec2::ZERO, vec2(1.0, 0.0));
        assert_eq!(direction, vec2(1.0, 0.0));
        assert_eq!(length, 0.0);

        let (direction, length) = direction_and_length(vec2(3.0, 4.0), vec2(1.0, 0.0));
        assert!((direction - vec2(0.6, 0.8)).length() < 1e-6);
        assert_eq!(length, 5.0);
    }

    #[test]
    fn fallback_direction_is_unit_length() {
        for (a, b) in [(0, 1), (3, 7), (12, 2)] {
            assert!((fallback_direction(a, b).length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn truncate_label_marks_cut_text() {
        assert_eq!(truncate_label("short", 10), "short");
        assert_eq!(truncate_label("a longer label", 8), "a longer…");
    }
}
