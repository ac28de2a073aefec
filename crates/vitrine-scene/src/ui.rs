//! Shared UI components for model display

use bevy_egui::egui;

use vitrine_core::metadata::{hierarchy_label, EntityMetadata, TechnicalMetadata};
use vitrine_core::notice::NoticeLevel;

use crate::types::NoticeBoard;

fn level_color(level: NoticeLevel) -> egui::Color32 {
    match level {
        NoticeLevel::Info => egui::Color32::from_rgb(50, 120, 200),
        NoticeLevel::Success => egui::Color32::from_rgb(50, 170, 80),
        NoticeLevel::Warning => egui::Color32::from_rgb(220, 160, 40),
        NoticeLevel::Error => egui::Color32::from_rgb(200, 50, 50),
    }
}

/// Toast in the top-right corner for the notice on the board
pub fn render_notice(ctx: &egui::Context, board: &NoticeBoard) {
    let Some(shown) = &board.current else {
        return;
    };

    egui::Area::new(egui::Id::new("vitrine_notice"))
        .anchor(egui::Align2::RIGHT_TOP, egui::vec2(-12.0, 12.0))
        .interactable(false)
        .show(ctx, |ui| {
            egui::Frame::popup(ui.style())
                .fill(level_color(shown.notice.level))
                .show(ui, |ui| {
                    ui.label(
                        egui::RichText::new(&shown.notice.message).color(egui::Color32::WHITE),
                    );
                });
        });
}

/// Descriptive metadata followed by the technical rows
pub fn render_metadata(
    ui: &mut egui::Ui,
    metadata: Option<&EntityMetadata>,
    technical: Option<&TechnicalMetadata>,
) {
    if let Some(metadata) = metadata {
        let fields = metadata.labelled();
        if !fields.is_empty() {
            egui::Grid::new("vitrine_metadata").num_columns(2).show(ui, |ui| {
                for (label, value) in fields {
                    ui.label(egui::RichText::new(label).strong());
                    ui.label(value);
                    ui.end_row();
                }
            });
            ui.separator();
        }
    }

    let Some(technical) = technical else {
        return;
    };
    ui.collapsing("Technical metadata", |ui| {
        egui::Grid::new("vitrine_technical").num_columns(2).show(ui, |ui| {
            for (label, value) in technical.rows() {
                ui.label(egui::RichText::new(label).small().color(egui::Color32::GRAY));
                ui.label(value);
                ui.end_row();
            }
        });
    });
}

/// Clickable list of model meshes; returns the index that was clicked
pub fn render_hierarchy<'a>(
    ui: &mut egui::Ui,
    names: impl IntoIterator<Item = (&'a str, bool)>,
) -> Option<usize> {
    let mut clicked = None;
    ui.collapsing("Hierarchy", |ui| {
        egui::ScrollArea::vertical().max_height(240.0).show(ui, |ui| {
            for (index, (name, selected)) in names.into_iter().enumerate() {
                if ui.selectable_label(selected, hierarchy_label(name)).clicked() {
                    clicked = Some(index);
                }
            }
        });
    });
    clicked
}
