//! Measured node footprints and the collision radii derived from them.

use std::collections::{HashMap, HashSet};

use eframe::egui::{Vec2, vec2};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(in crate::app) struct SizeOracleConfig {
    /// Footprint assumed for nodes that have not been measured yet.
    pub default_size: Vec2,
    /// Changes at or below this many pixels in both dimensions are noise.
    pub noise_threshold: f32,
    /// Alpha the simulation is nudged to after a committed size change.
    pub resize_heat: f32,
}

impl Default for SizeOracleConfig {
    fn default() -> Self {
        Self {
            default_size: vec2(120.0, 60.0),
            noise_threshold: 5.0,
            resize_heat: 0.1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(in crate::app) enum MeasureOutcome {
    /// A new size was committed; collision radii need rebuilding.
    Changed,
    Unchanged,
    /// The element had no usable bounding box yet.
    Skipped,
}

#[derive(Debug, Default)]
pub(in crate::app) struct SizeTable {
    config: SizeOracleConfig,
    sizes: HashMap<String, Vec2>,
}

impl SizeTable {
    pub(in crate::app) fn new(config: SizeOracleConfig) -> Self {
        Self {
            config,
            sizes: HashMap::new(),
        }
    }

    pub(in crate::app) fn config(&self) -> SizeOracleConfig {
        self.config
    }

    pub(in crate::app) fn measure(&mut self, id: &str, rendered: Vec2) -> MeasureOutcome {
        if !rendered.is_finite() || rendered.x <= 0.0 || rendered.y <= 0.0 {
            return MeasureOutcome::Skipped;
        }

        if let Some(current) = self.sizes.get(id) {
            let delta = (rendered - *current).abs();
            if delta.x <= self.config.noise_threshold && delta.y <= self.config.noise_threshold {
                return MeasureOutcome::Unchanged;
            }
        }

        debug!(id, width = rendered.x, height = rendered.y, "node size committed");
        self.sizes.insert(id.to_owned(), rendered);
        MeasureOutcome::Changed
    }

    pub(in crate::app) fn get(&self, id: &str) -> Option<Vec2> {
        self.sizes.get(id).copied()
    }

    pub(in crate::app) fn size_or_default(&self, id: &str) -> Vec2 {
        self.get(id).unwrap_or(self.config.default_size)
    }

    /// Half the larger dimension of the measured (or default) footprint.
    pub(in crate::app) fn radius(&self, id: &str) -> f32 {
        let size = self.size_or_default(id);
        size.x.max(size.y) / 2.0
    }

    pub(in crate::app) fn retain(&mut self, ids: &HashSet<&str>) {
        self.sizes.retain(|id, _| ids.contains(id.as_str()));
    }

    #[cfg(test)]
    pub(in crate::app) fn len(&self) -> usize {
        self.sizes.len()
    }
}
