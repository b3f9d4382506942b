use eframe::egui::{RichText, Ui};

use crate::story::NodeContent;

use super::super::ViewModel;

impl ViewModel {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui) {
        ui.heading("Selection Details");
        ui.add_space(6.0);

        let Some(selected_id) = self.engine.selected().map(str::to_owned) else {
            ui.label("Click a node in the graph to select it.");
            return;
        };

        let Some(node) = self.graph.node(&selected_id) else {
            ui.label("Selected node no longer exists in the document.");
            return;
        };

        ui.label(RichText::new(node.content.summary()).strong());
        ui.small(node.id.as_str());
        ui.add_space(6.0);

        if let NodeContent::Card { body, .. } = &node.content {
            ui.label(body.as_str());
            ui.add_space(6.0);
        }

        let pinned = self.engine.is_pinned(&selected_id);
        ui.label(format!("Pinned: {}", if pinned { "yes" } else { "no" }));
        ui.label(format!("Degree: {}", self.graph.degree(&selected_id)));
        if let Some(position) = self.engine.latest().position(&selected_id) {
            ui.label(format!("Position: {:.0}, {:.0}", position.x, position.y));
        }

        ui.separator();
        ui.label(RichText::new("Neighbours").strong());
        let mut any = false;
        for link in &self.graph.links {
            let (other, arrow) = if link.source == selected_id {
                (&link.target, if link.directional { "->" } else { "--" })
            } else if link.target == selected_id {
                (&link.source, if link.directional { "<-" } else { "--" })
            } else {
                continue;
            };
            any = true;
            let name = self
                .graph
                .node(other)
                .map_or(other.as_str(), |node| node.content.summary());
            match &link.label {
                Some(label) => ui.label(format!("{arrow} {name} ({label})")),
                None => ui.label(format!("{arrow} {name}")),
            };
        }
        if !any {
            ui.label("No links yet.");
        }
    }
}
