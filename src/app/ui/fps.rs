use eframe::egui::Context;

use super::super::ViewModel;

const FPS_SAMPLE_WINDOW: usize = 180;

impl ViewModel {
    pub(in crate::app) fn update_fps_counter(&mut self, ctx: &Context) {
        let dt = ctx.input(|input| input.stable_dt);
        if dt <= f32::EPSILON {
            return;
        }

        self.fps_current = (1.0 / dt).clamp(0.0, 1000.0);
        self.fps_samples.push_back(self.fps_current);
        while self.fps_samples.len() > FPS_SAMPLE_WINDOW {
            self.fps_samples.pop_front();
        }
    }

    pub(in crate::app) fn fps_display_text(&self) -> String {
        if self.fps_samples.is_empty() {
            return format!("FPS {:.0}", self.fps_current);
        }
        let avg = self.fps_samples.iter().sum::<f32>() / self.fps_samples.len() as f32;
        format!("FPS {:.0} | avg {:.1}", self.fps_current, avg)
    }

    pub(in crate::app) fn status_text(&self) -> String {
        let state = if self.engine.is_running() {
            "settling"
        } else {
            "at rest"
        };
        format!(
            "{} nodes | {} links | alpha {:.3} ({state}) | revision {} | snapshots {} heard / {} drawn",
            self.engine.latest().nodes.len(),
            self.engine.latest().links.len(),
            self.engine.alpha(),
            self.engine.latest().revision,
            self.snapshots_heard.get(),
            self.engine.snapshots_emitted(),
        )
    }
}
