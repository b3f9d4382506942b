//! Pointer gestures on the graph canvas.
//!
//! A press on a node starts a node gesture: the node is pinned where it is
//! and the simulation heated. Moves turn the gesture into a drag that moves
//! the pin; a release within the click window without any move is a click
//! and toggles selection. A press on the background starts a pan that only
//! touches the transform. Wheel zoom is accepted at any time.

use std::time::Duration;

use eframe::egui::{Pos2, Vec2};
use tracing::debug;

use crate::app::physics::{Pin, Simulation, default_alpha_decay};
use crate::app::transform::{ScaleExtent, ViewTransform};

#[derive(Clone, Debug, PartialEq)]
pub(in crate::app) enum PointerTarget {
    Node(String),
    Background,
}

/// Pointer input in canvas-relative screen coordinates. `time` is measured
/// from engine mount.
#[derive(Clone, Debug, PartialEq)]
pub(in crate::app) enum PointerEvent {
    Down {
        pos: Pos2,
        target: PointerTarget,
        time: Duration,
    },
    Move {
        pos: Pos2,
    },
    Up {
        pos: Pos2,
        time: Duration,
    },
    /// Pointer left the canvas or the press was otherwise lost.
    Leave,
    Wheel {
        pos: Pos2,
        delta_y: f32,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(in crate::app) enum ReleasePolicy {
    /// Dragged nodes rejoin the free simulation on release.
    #[default]
    Unpin,
    KeepPinned,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(in crate::app) struct InteractionConfig {
    /// A press released strictly within this window, with no move, is a click.
    pub click_window: Duration,
    pub scale_extent: ScaleExtent,
    /// Scale factor per wheel pixel, as a power of two.
    pub wheel_sensitivity: f32,
    pub heat_on_drag: f32,
    pub cool_rate: f32,
    pub release: ReleasePolicy,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            click_window: Duration::from_millis(200),
            scale_extent: ScaleExtent::default(),
            wheel_sensitivity: 0.002,
            heat_on_drag: 0.3,
            cool_rate: default_alpha_decay(),
            release: ReleasePolicy::Unpin,
        }
    }
}

#[derive(Clone, Debug, Default)]
enum Gesture {
    #[default]
    Idle,
    NodePress {
        id: String,
        pointer_start: Pos2,
        node_start: Pos2,
        pressed_at: Duration,
        /// Pin the node had before the press, restored when nothing was dragged.
        prior_pin: Option<Pin>,
        dragged: bool,
    },
    Pan {
        last: Pos2,
    },
}

#[derive(Debug, Default)]
pub(in crate::app) struct InteractionController {
    config: InteractionConfig,
    transform: ViewTransform,
    gesture: Gesture,
    selected: Option<String>,
}

impl InteractionController {
    pub(in crate::app) fn new(config: InteractionConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub(in crate::app) fn config(&self) -> InteractionConfig {
        self.config
    }

    pub(in crate::app) fn set_release_policy(&mut self, release: ReleasePolicy) {
        self.config.release = release;
    }

    pub(in crate::app) fn transform(&self) -> ViewTransform {
        self.transform
    }

    pub(in crate::app) fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub(in crate::app) fn dragging(&self) -> Option<&str> {
        match &self.gesture {
            Gesture::NodePress {
                id, dragged: true, ..
            } => Some(id),
            _ => None,
        }
    }

    pub(in crate::app) fn zoom_to(&mut self, scale: f32, anchor: Pos2) {
        self.transform.zoom_to(scale, anchor, self.config.scale_extent);
    }

    pub(in crate::app) fn pan_by(&mut self, delta: Vec2) {
        self.transform.translate_by(delta);
    }

    /// Drops selection and any in-flight gesture that name a node no longer
    /// present.
    pub(in crate::app) fn retain(&mut self, contains: impl Fn(&str) -> bool) {
        if self.selected.as_deref().is_some_and(|id| !contains(id)) {
            debug!(id = self.selected.as_deref(), "selected node removed");
            self.selected = None;
        }
        if let Gesture::NodePress { id, .. } = &self.gesture
            && !contains(id)
        {
            self.gesture = Gesture::Idle;
        }
    }

    /// Applies one pointer event. Returns the clicked node id when the event
    /// completed a click.
    pub(in crate::app) fn handle(
        &mut self,
        event: PointerEvent,
        simulation: Option<&mut Simulation>,
    ) -> Option<String> {
        match event {
            PointerEvent::Wheel { pos, delta_y } => {
                if delta_y.is_finite() && delta_y != 0.0 {
                    let factor = 2.0_f32.powf(-delta_y * self.config.wheel_sensitivity);
                    self.transform.zoom_by(factor, pos, self.config.scale_extent);
                }
                None
            }
            PointerEvent::Down { pos, target, time } => {
                self.press(pos, target, time, simulation);
                None
            }
            PointerEvent::Move { pos } => {
                self.drag(pos, simulation);
                None
            }
            PointerEvent::Up { time, .. } => self.release(Some(time), simulation),
            PointerEvent::Leave => self.release(None, simulation),
        }
    }

    fn press(
        &mut self,
        pos: Pos2,
        target: PointerTarget,
        time: Duration,
        simulation: Option<&mut Simulation>,
    ) {
        if let Gesture::NodePress { .. } = self.gesture {
            self.release(None, simulation);
            return;
        }

        self.gesture = match target {
            PointerTarget::Background => Gesture::Pan { last: pos },
            PointerTarget::Node(id) => {
                let Some(simulation) = simulation else {
                    return;
                };
                let Some(node_start) = simulation.position(&id) else {
                    return;
                };
                let prior_pin = simulation.pin_state(&id);
                simulation.pin(&id, node_start.x, node_start.y);
                simulation.set_heat(self.config.heat_on_drag, self.config.cool_rate);
                Gesture::NodePress {
                    id,
                    pointer_start: pos,
                    node_start,
                    pressed_at: time,
                    prior_pin,
                    dragged: false,
                }
            }
        };
    }

    fn drag(&mut self, pos: Pos2, simulation: Option<&mut Simulation>) {
        let transform = self.transform;
        match &mut self.gesture {
            Gesture::Idle => {}
            Gesture::Pan { last } => {
                let delta = pos - *last;
                *last = pos;
                self.transform.translate_by(delta);
            }
            Gesture::NodePress {
                id,
                pointer_start,
                node_start,
                dragged,
                ..
            } => {
                *dragged = true;
                let target = *node_start + transform.screen_delta_to_world(pos - *pointer_start);
                if let Some(simulation) = simulation {
                    simulation.pin(id, target.x, target.y);
                }
            }
        }
    }

    fn release(&mut self, time: Option<Duration>, simulation: Option<&mut Simulation>) -> Option<String> {
        let Gesture::NodePress {
            id,
            pressed_at,
            prior_pin,
            dragged,
            ..
        } = std::mem::take(&mut self.gesture)
        else {
            return None;
        };

        let clicked = !dragged
            && time.is_some_and(|time| time.saturating_sub(pressed_at) < self.config.click_window);

        if let Some(simulation) = simulation {
            simulation.set_heat(0.0, self.config.cool_rate);
            if !dragged {
                simulation.restore_pin(&id, prior_pin);
            } else if self.config.release == ReleasePolicy::Unpin {
                simulation.unpin(&id);
            }
        }

        if !clicked {
            return None;
        }
        if self.selected.as_deref() == Some(id.as_str()) {
            self.selected = None;
        } else {
            self.selected = Some(id.clone());
        }
        Some(id)
    }
}
