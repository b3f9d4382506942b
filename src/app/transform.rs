//! Screen/world conversion under a pan/zoom transform.
//!
//! World coordinates are the simulation's layout space. Screen coordinates are
//! relative to the top-left corner of the graph canvas:
//! `screen = world * k + (x, y)`.

use eframe::egui::{Pos2, Vec2, pos2};

#[derive(Clone, Copy, Debug, PartialEq)]
pub(in crate::app) struct ScaleExtent {
    pub min: f32,
    pub max: f32,
}

impl ScaleExtent {
    pub(in crate::app) fn clamp(self, scale: f32) -> f32 {
        if scale.is_nan() {
            return 1.0_f32.clamp(self.min, self.max);
        }
        scale.clamp(self.min, self.max)
    }
}

impl Default for ScaleExtent {
    fn default() -> Self {
        Self { min: 0.1, max: 4.0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(in crate::app) struct ViewTransform {
    pub x: f32,
    pub y: f32,
    pub k: f32,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ViewTransform {
    pub(in crate::app) const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        k: 1.0,
    };

    pub(in crate::app) fn world_to_screen(self, world: Pos2) -> Pos2 {
        pos2(world.x * self.k + self.x, world.y * self.k + self.y)
    }

    pub(in crate::app) fn screen_to_world(self, screen: Pos2) -> Pos2 {
        pos2((screen.x - self.x) / self.k, (screen.y - self.y) / self.k)
    }

    /// A pointer displacement on screen expressed in world units.
    pub(in crate::app) fn screen_delta_to_world(self, delta: Vec2) -> Vec2 {
        delta / self.k
    }

    pub(in crate::app) fn translate_by(&mut self, delta: Vec2) {
        self.x += delta.x;
        self.y += delta.y;
    }

    /// Sets the scale (clamped to `extent`) keeping the world point under
    /// `anchor` fixed on screen.
    pub(in crate::app) fn zoom_to(&mut self, scale: f32, anchor: Pos2, extent: ScaleExtent) {
        let world = self.screen_to_world(anchor);
        self.k = extent.clamp(scale);
        self.x = anchor.x - world.x * self.k;
        self.y = anchor.y - world.y * self.k;
    }

    pub(in crate::app) fn zoom_by(&mut self, factor: f32, anchor: Pos2, extent: ScaleExtent) {
        self.zoom_to(self.k * factor, anchor, extent);
    }
}
