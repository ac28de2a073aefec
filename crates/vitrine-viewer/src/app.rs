//! Bevy application setup

use bevy::prelude::*;
use bevy::winit::WinitSettings;
use bevy_egui::EguiPlugin;
use bevy_picking::{DefaultPickingPlugins, prelude::MeshPickingPlugin};
use tracing::info;

use vitrine_scene::types::Session;
use vitrine_scene::VitrineScenePlugin;

use crate::editor::EditorPlugin;
use crate::gallery::GalleryPlugin;
use crate::loader::{connect, LoaderPlugin};
use crate::measure::MeasurePlugin;
use crate::page::read_host_page;
use crate::ui::UiPlugin;

pub fn run() {
    let (config, page) = read_host_page();
    info!(source = ?page.source, lightweight = config.lightweight.is_enabled(), "Starting viewer");

    let mut session = Session::new(config);
    let repository = connect(&mut session);
    let canvas = page.canvas.clone();

    App::new()
        .insert_resource(WinitSettings::default())
        .add_plugins(DefaultPlugins
            .set(WindowPlugin {
                primary_window: Some(Window {
                    title: "Vitrine".to_string(),
                    canvas: Some(canvas),
                    fit_canvas_to_parent: true,
                    prevent_default_event_handling: false,
                    ..default()
                }),
                ..default()
            })
            .set(AssetPlugin {
                // Model URLs are absolute or relative to the page
                file_path: "".to_string(),
                // Repositories do not serve .meta files
                meta_check: bevy::asset::AssetMetaCheck::Never,
                ..default()
            })
        )
        // Picking plugins must be added before EguiPlugin
        .add_plugins(DefaultPickingPlugins)
        .add_plugins(MeshPickingPlugin)
        .add_plugins(EguiPlugin::default())
        .insert_resource(session)
        .insert_resource(page)
        .insert_resource(repository)
        .add_plugins(VitrineScenePlugin)
        .add_plugins(LoaderPlugin)
        .add_plugins(EditorPlugin)
        .add_plugins(MeasurePlugin)
        .add_plugins(GalleryPlugin)
        .add_plugins(UiPlugin)
        .run();
}
