use std::ops::RangeInclusive;

use eframe::egui::{self, Key, Response, Ui};

use super::super::graph::interaction::ReleasePolicy;
use super::super::{EditMode, ViewModel};

const SLIDER_KEY_BASE_RATE: f32 = 10.0;
const SLIDER_KEY_ACCEL_PER_SEC: f32 = 9.0;
const SLIDER_KEY_ACCEL_MAX: f32 = 40.0;

#[derive(Clone, Copy, Default)]
struct SliderKeyHoldState {
    positive_secs: f32,
    negative_secs: f32,
}

fn slider_key_accel_multiplier(hold_secs: f32) -> f32 {
    let ramp = hold_secs * SLIDER_KEY_ACCEL_PER_SEC;
    (1.0 + ramp + ramp * ramp * 0.15).min(SLIDER_KEY_ACCEL_MAX)
}

fn default_slider_key_step(min: f32, max: f32) -> f32 {
    ((max - min) / 200.0).max(0.0005)
}

/// Held arrow keys move a focused slider, faster the longer they are held.
fn apply_slider_arrow_acceleration_f32(
    ui: &Ui,
    response: &Response,
    value: &mut f32,
    min: f32,
    max: f32,
    step: f32,
) -> bool {
    let state_id = response.id.with("arrow_key_hold_state");
    let mut hold_state = ui.ctx().data(|data| {
        data.get_temp::<SliderKeyHoldState>(state_id)
            .unwrap_or_default()
    });

    if !response.has_focus() {
        ui.ctx()
            .data_mut(|data| data.insert_temp(state_id, SliderKeyHoldState::default()));
        return false;
    }

    let (delta_time, increase_down, decrease_down) = ui.input(|input| {
        (
            input.stable_dt.min(0.1),
            input.key_down(Key::ArrowRight) || input.key_down(Key::ArrowUp),
            input.key_down(Key::ArrowLeft) || input.key_down(Key::ArrowDown),
        )
    });

    hold_state.positive_secs = if increase_down {
        hold_state.positive_secs + delta_time
    } else {
        0.0
    };
    hold_state.negative_secs = if decrease_down {
        hold_state.negative_secs + delta_time
    } else {
        0.0
    };
    ui.ctx()
        .data_mut(|data| data.insert_temp(state_id, hold_state));

    let direction = (increase_down as i8) - (decrease_down as i8);
    if direction == 0 {
        return false;
    }

    let hold_secs = if direction > 0 {
        hold_state.positive_secs
    } else {
        hold_state.negative_secs
    };
    let speed = SLIDER_KEY_BASE_RATE * slider_key_accel_multiplier(hold_secs);
    let old_value = *value;
    *value = (*value + direction as f32 * step * speed * delta_time).clamp(min, max);

    ui.ctx().request_repaint();
    (*value - old_value).abs() > f32::EPSILON
}

fn layout_slider(
    ui: &mut Ui,
    value: &mut f32,
    range: RangeInclusive<f32>,
    text: &str,
    hover: &str,
) -> bool {
    let (min, max) = (*range.start(), *range.end());
    let slider = ui
        .add(
            egui::Slider::new(value, range)
                .text(text)
                .clamping(egui::SliderClamping::Always),
        )
        .on_hover_text(hover);
    if slider.hovered() {
        slider.request_focus();
    }
    slider.changed()
        | apply_slider_arrow_acceleration_f32(
            ui,
            &slider,
            value,
            min,
            max,
            default_slider_key_step(min, max),
        )
}

impl ViewModel {
    pub(in crate::app) fn draw_controls(&mut self, ui: &mut Ui, is_streaming: bool) {
        ui.heading("Editor");
        ui.separator();
        ui.add_enabled_ui(!is_streaming, |ui| self.draw_editor(ui));
        if is_streaming {
            ui.small("Editing unlocks once the document has been fully delivered.");
        }

        ui.add_space(10.0);
        ui.heading("Layout");
        ui.separator();
        self.draw_layout_controls(ui);
    }

    fn draw_editor(&mut self, ui: &mut Ui) {
        let mut mode = self.editor.mode;
        ui.horizontal(|ui| {
            ui.selectable_value(&mut mode, EditMode::View, "View")
                .on_hover_text("Drag, pan, zoom and select.");
            ui.selectable_value(&mut mode, EditMode::Add, "Add")
                .on_hover_text("Append a node, linked from the selection if any.");
            ui.selectable_value(&mut mode, EditMode::Connect, "Connect")
                .on_hover_text("Click a source node, then a target node.");
        });
        self.set_edit_mode(mode);

        match self.editor.mode {
            EditMode::View => {
                ui.label("Click a node to select it. Drag to move it.");
            }
            EditMode::Add => {
                ui.label("Node text");
                ui.text_edit_multiline(&mut self.editor.draft_text);
                if ui.button("Add node").clicked() {
                    self.add_node();
                }
            }
            EditMode::Connect => {
                match self.editor.connect_source.as_deref() {
                    Some(source) => ui.label(format!("Source: {source}")),
                    None => ui.label("Source: none"),
                };
            }
        }

        if self.editor.mode != EditMode::View {
            ui.horizontal(|ui| {
                ui.label("Link label");
                ui.text_edit_singleline(&mut self.editor.link_label);
            });
            ui.checkbox(&mut self.editor.link_directed, "Directed link")
                .on_hover_text("Draw an arrowhead at the target end.");
        }
    }

    fn draw_layout_controls(&mut self, ui: &mut Ui) {
        let mut config = self.engine.simulation_config().clone();
        let mut changed = false;

        changed |= layout_slider(
            ui,
            &mut config.charge,
            -1200.0..=0.0,
            "Charge",
            "Pairwise repulsion between all nodes.",
        );
        changed |= layout_slider(
            ui,
            &mut config.link_distance,
            40.0..=400.0,
            "Link distance",
            "Preferred length of a link before node sizes are accounted for.",
        );
        changed |= layout_slider(
            ui,
            &mut config.collision_strength,
            0.0..=1.0,
            "Collision",
            "How firmly overlapping cards push apart.",
        );
        changed |= layout_slider(
            ui,
            &mut config.center_strength,
            0.0..=0.5,
            "Centering",
            "Pull of the whole layout toward the canvas centre.",
        );
        if changed {
            self.engine.set_simulation_config(config);
        }

        ui.separator();

        let mut style = self.engine.style();
        if ui
            .checkbox(&mut style.curved_links, "Curved links")
            .on_hover_text("Bend links so opposite directions stay apart.")
            .changed()
        {
            self.engine.set_style(style);
        }

        let mut keep_pinned = self.engine.release_policy() == ReleasePolicy::KeepPinned;
        if ui
            .checkbox(&mut keep_pinned, "Keep nodes pinned after dragging")
            .changed()
        {
            self.engine.set_release_policy(if keep_pinned {
                ReleasePolicy::KeepPinned
            } else {
                ReleasePolicy::Unpin
            });
        }

        ui.horizontal(|ui| {
            if ui.button("Reheat").clicked() {
                self.engine.reheat();
            }
            if ui.button("Unpin all").clicked() {
                self.engine.unpin_all();
            }
        });
    }
}
