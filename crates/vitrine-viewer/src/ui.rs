//! Editor panel and overlays using bevy_egui

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};
use tracing::warn;

use vitrine_core::clipping::ClipAxis;
use vitrine_core::editor::{
    clamp_light_intensity, uniform_scale, InteractionMode, LightGizmo, ScaleHandle,
    TransformMode, TransformSpace, MAX_LIGHT_INTENSITY,
};
use vitrine_core::metadata::hierarchy_label;
use vitrine_core::session::{LoadState, SaveTicket};
use vitrine_core::store::{StoreError, ViewStateStore};
use vitrine_core::view_state::{HexColor, LightSettings, LiveScene, SaveGroup};
use vitrine_core::Notice;
use vitrine_scene::camera::{MainCamera, OrbitSettings};
use vitrine_scene::models::from_transform;
use vitrine_scene::scene::HelperVisibility;
use vitrine_scene::types::{ModelMesh, ModelRoot, NoticeBoard, Session};
use vitrine_scene::ui::{render_hierarchy, render_metadata, render_notice};

use crate::capture::capture_png;
use crate::editor::{apply_material, material_properties, toggle_selection, Highlights, MeshTint};
use crate::gallery::{toggle_fullscreen, Fullscreen};
use crate::loader::{drain, push, put, take, Queue, Repository, Slot};
use crate::page::HostPage;

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PendingUploads>()
            .add_systems(Update, receive_uploads)
            // Main UI system runs in EguiPrimaryContextPass for proper input handling
            .add_systems(EguiPrimaryContextPass, ui_system);
    }
}

/// Saves, captures and uploads still in flight
#[derive(Resource, Default)]
pub struct PendingUploads {
    pub save: Queue<(SaveTicket, Result<(), StoreError>)>,
    pub capture: Slot<Result<Vec<u8>, String>>,
    pub thumbnail: Slot<Result<String, StoreError>>,
}

/// Grouped system parameters for the editor panel
#[derive(SystemParam)]
pub struct UiParams<'w, 's> {
    contexts: EguiContexts<'w, 's>,
    session: ResMut<'w, Session>,
    board: Res<'w, NoticeBoard>,
    page: Res<'w, HostPage>,
    repository: Res<'w, Repository>,
    uploads: Res<'w, PendingUploads>,
    fullscreen: ResMut<'w, Fullscreen>,
    helper_visibility: ResMut<'w, HelperVisibility>,
    highlights: ResMut<'w, Highlights>,
    orbit: Res<'w, OrbitSettings>,
    roots: Query<'w, 's, &'static mut Transform, With<ModelRoot>>,
    cameras: Query<
        'w,
        's,
        (&'static Camera, &'static GlobalTransform, &'static Transform),
        (With<MainCamera>, Without<ModelRoot>),
    >,
    model_meshes: Query<'w, 's, (Entity, &'static ModelMesh)>,
    tints: Query<'w, 's, &'static mut MeshTint>,
    handles: Query<'w, 's, &'static MeshMaterial3d<StandardMaterial>, With<ModelMesh>>,
    materials: ResMut<'w, Assets<StandardMaterial>>,
}

fn ui_system(mut params: UiParams) {
    let Ok(ctx) = params.contexts.ctx_mut() else { return };
    let ctx = ctx.clone();

    render_notice(&ctx, &params.board);
    render_ruler_labels(&ctx, &params);

    egui::SidePanel::right("vitrine_editor")
        .default_width(300.0)
        .resizable(true)
        .show(&ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.heading("Model");
                render_metadata(
                    ui,
                    params.session.metadata(),
                    params.session.model().map(|m| &m.technical),
                );

                if params.session.model().is_none() {
                    let status = match params.session.state() {
                        LoadState::Loading { .. } => "Loading model...".to_string(),
                        LoadState::Failed { reason, .. } => reason.clone(),
                        _ => "No model loaded".to_string(),
                    };
                    ui.label(egui::RichText::new(status).color(egui::Color32::GRAY));
                    return;
                }

                hierarchy_section(ui, &mut params);
                ui.separator();
                tools_section(ui, &mut params);
                transform_section(ui, &mut params);
                lights_section(ui, &mut params);
                helpers_section(ui, &mut params);
                clipping_section(ui, &mut params);
                material_section(ui, &mut params);
                if !params.session.config().lightweight.is_enabled() {
                    save_section(ui, &mut params);
                }
            });
        });
}

fn render_ruler_labels(ctx: &egui::Context, params: &UiParams) {
    let Ok((camera, camera_transform, _)) = params.cameras.single() else {
        return;
    };
    for (i, segment) in params.session.ruler.segments().iter().enumerate() {
        let Ok(pos) = camera.world_to_viewport(camera_transform, segment.midpoint) else {
            continue;
        };
        egui::Area::new(egui::Id::new(("vitrine_ruler_label", i)))
            .fixed_pos(egui::pos2(pos.x, pos.y))
            .interactable(false)
            .show(ctx, |ui| {
                ui.label(
                    egui::RichText::new(&segment.label)
                        .color(egui::Color32::WHITE)
                        .background_color(egui::Color32::from_black_alpha(160)),
                );
            });
    }
}

fn hierarchy_section(ui: &mut egui::Ui, params: &mut UiParams) {
    let mut entries: Vec<(Entity, String, bool)> = params
        .model_meshes
        .iter()
        .map(|(entity, mesh)| {
            (
                entity,
                mesh.name.clone(),
                params.highlights.selection.is_selected(entity),
            )
        })
        .collect();
    entries.sort_by_key(|(entity, ..)| *entity);

    let clicked = render_hierarchy(ui, entries.iter().map(|(_, name, selected)| (name.as_str(), *selected)));
    let Some(entity) = clicked.and_then(|index| entries.get(index)).map(|(e, ..)| *e) else {
        return;
    };

    toggle_selection(
        entity,
        &mut params.highlights,
        &params.tints,
        &params.handles,
        &mut params.materials,
    );
    let original = params.tints.get(entity).ok().map(|t| t.original);
    let props = params
        .handles
        .get(entity)
        .ok()
        .and_then(|h| params.materials.get(&h.0))
        .map(|material| material_properties(original, material));
    if let Some(props) = props {
        params.highlights.edited = Some((entity, props));
    }
}

fn tools_section(ui: &mut egui::Ui, params: &mut UiParams) {
    let mode = params.session.editor.mode();
    ui.horizontal(|ui| {
        if ui
            .selectable_label(mode == InteractionMode::Picking, "Face picking")
            .clicked()
        {
            params.session.toggle_picking();
        }
        if ui
            .selectable_label(mode == InteractionMode::Measuring, "Measure distance")
            .clicked()
        {
            params.session.toggle_measuring();
        }
        let label = if params.fullscreen.is_active() { "Exit fullscreen" } else { "Fullscreen" };
        if ui.button(label).clicked() {
            toggle_fullscreen(&mut params.fullscreen, &mut params.session);
        }
    });

    if mode == InteractionMode::Measuring && !params.session.ruler.is_empty() {
        ui.horizontal(|ui| {
            ui.label(format!("Total: {:.2}", params.session.ruler.total_length()));
            if ui.small_button("Clear").clicked() {
                params.session.ruler.clear();
            }
        });
    }
}

/// X/Y/Z drag fields; returns whether any changed
fn vec3_fields(ui: &mut egui::Ui, value: &mut Vec3, speed: f64) -> bool {
    let mut changed = false;
    ui.horizontal(|ui| {
        for (label, component) in [("X", &mut value.x), ("Y", &mut value.y), ("Z", &mut value.z)] {
            ui.label(label);
            changed |= ui
                .add(egui::DragValue::new(component).speed(speed).max_decimals(3))
                .changed();
        }
    });
    changed
}

/// Scale fields; returns the handle that was dragged
fn scale_fields(ui: &mut egui::Ui, scale: &mut Vec3) -> Option<ScaleHandle> {
    let mut handle = None;
    ui.horizontal(|ui| {
        for (label, component, axis) in [
            ("X", &mut scale.x, ScaleHandle::X),
            ("Y", &mut scale.y, ScaleHandle::Y),
            ("Z", &mut scale.z, ScaleHandle::Z),
        ] {
            ui.label(label);
            if ui
                .add(egui::DragValue::new(component).speed(0.01).range(0.001..=f32::MAX))
                .changed()
            {
                handle = Some(axis);
            }
        }
    });
    handle
}

fn transform_section(ui: &mut egui::Ui, params: &mut UiParams) {
    ui.collapsing("Transform", |ui| {
        let mut editor = params.session.editor.clone();
        ui.horizontal(|ui| {
            ui.selectable_value(&mut editor.transform_mode, TransformMode::None, "Off");
            ui.selectable_value(&mut editor.transform_mode, TransformMode::Translate, "Move");
            ui.selectable_value(&mut editor.transform_mode, TransformMode::Rotate, "Rotate");
            ui.selectable_value(&mut editor.transform_mode, TransformMode::Scale, "Scale");
        });
        let space = match editor.transform_space {
            TransformSpace::Local => "Local",
            TransformSpace::Global => "Global",
        };
        if ui.button(format!("Space: {}", space)).clicked() {
            editor.toggle_space();
        }
        if editor != params.session.editor {
            params.session.editor = editor.clone();
        }

        let Ok(mut transform) = params.roots.single_mut() else {
            return;
        };
        let current = *transform;
        let mut next = current;
        let local = editor.transform_space == TransformSpace::Local;

        match editor.transform_mode {
            TransformMode::None => {}
            TransformMode::Translate => {
                let mut position = current.translation;
                if vec3_fields(ui, &mut position, 0.01) {
                    let delta = position - current.translation;
                    next.translation += if local { current.rotation * delta } else { delta };
                }
            }
            TransformMode::Rotate => {
                let (x, y, z) = current.rotation.to_euler(EulerRot::XYZ);
                let before = Vec3::new(x.to_degrees(), y.to_degrees(), z.to_degrees());
                let mut degrees = before;
                if vec3_fields(ui, &mut degrees, 0.5) {
                    let d = degrees - before;
                    let delta = Quat::from_euler(
                        EulerRot::XYZ,
                        d.x.to_radians(),
                        d.y.to_radians(),
                        d.z.to_radians(),
                    );
                    next.rotation = if local {
                        current.rotation * delta
                    } else {
                        delta * current.rotation
                    };
                }
            }
            TransformMode::Scale => {
                let mut scale = current.scale;
                if let Some(handle) = scale_fields(ui, &mut scale) {
                    next.scale = uniform_scale(scale, handle);
                }
            }
        }

        if next != current {
            *transform = next;
        }
    });
}

fn color_button(ui: &mut egui::Ui, color: &mut HexColor) {
    let mut rgb = color.rgb();
    if ui.color_edit_button_srgb(&mut rgb).changed() {
        *color = HexColor::from_rgb(rgb[0], rgb[1], rgb[2]);
    }
}

fn light_row(ui: &mut egui::Ui, label: &str, light: &mut LightSettings) {
    ui.horizontal(|ui| {
        ui.label(label);
        color_button(ui, &mut light.color);
        let mut intensity = light.intensity;
        if ui
            .add(egui::Slider::new(&mut intensity, 0.0..=MAX_LIGHT_INTENSITY))
            .changed()
        {
            light.intensity = clamp_light_intensity(intensity);
        }
    });
}

fn lights_section(ui: &mut egui::Ui, params: &mut UiParams) {
    ui.collapsing("Lights", |ui| {
        let mut rig = params.session.lighting;
        light_row(ui, "Directional", &mut rig.directional);
        light_row(ui, "Ambient", &mut rig.ambient);
        light_row(ui, "Camera", &mut rig.camera);
        ui.horizontal(|ui| {
            ui.label("Background");
            color_button(ui, &mut rig.background);
        });

        let mut editor = params.session.editor.clone();
        ui.horizontal(|ui| {
            ui.selectable_value(&mut editor.light_gizmo, LightGizmo::None, "Fixed");
            ui.selectable_value(&mut editor.light_gizmo, LightGizmo::MoveLight, "Move light");
            ui.selectable_value(&mut editor.light_gizmo, LightGizmo::MoveTarget, "Move target");
        });
        match editor.light_gizmo {
            LightGizmo::None => {}
            LightGizmo::MoveLight => {
                vec3_fields(ui, &mut rig.directional_position, 0.1);
            }
            LightGizmo::MoveTarget => {
                vec3_fields(ui, &mut rig.directional_target, 0.1);
            }
        }
        if editor != params.session.editor {
            params.session.editor = editor;
        }

        if rig != params.session.lighting {
            if rig.background != params.session.lighting.background {
                if let Some(planes) = params.session.clipping.as_mut() {
                    planes.set_background(rig.background);
                }
            }
            params.session.lighting = rig;
        }
    });
}

fn helpers_section(ui: &mut egui::Ui, params: &mut UiParams) {
    ui.collapsing("Helpers", |ui| {
        let mut visibility = params.helper_visibility.clone();
        ui.checkbox(&mut visibility.grid, "Grid");
        ui.checkbox(&mut visibility.ground, "Ground");
        ui.checkbox(&mut visibility.axes, "Axes");
        ui.checkbox(&mut visibility.light, "Light helper");
        if visibility != *params.helper_visibility {
            *params.helper_visibility = visibility;
        }
    });
}

fn clipping_section(ui: &mut egui::Ui, params: &mut UiParams) {
    ui.collapsing("Clipping planes", |ui| {
        let Some(mut planes) = params.session.clipping.clone() else {
            return;
        };
        for axis in ClipAxis::ALL {
            let plane = *planes.plane(axis);
            ui.horizontal(|ui| {
                ui.label(axis.label());
                let mut value = plane.constant();
                let slider = egui::Slider::new(&mut value, plane.range()).step_by(plane.step() as f64);
                if ui.add(slider).changed() {
                    planes.set_constant(axis, value);
                }
                let mut shown = plane.helper_visible;
                if ui.checkbox(&mut shown, "Show").changed() {
                    planes.set_helper_visible(axis, shown);
                }
            });
        }
        if Some(&planes) != params.session.clipping.as_ref() {
            params.session.clipping = Some(planes);
        }
    });
}

fn material_section(ui: &mut egui::Ui, params: &mut UiParams) {
    let Some((entity, before)) = params.highlights.edited else {
        return;
    };
    let name = params
        .model_meshes
        .get(entity)
        .map(|(_, mesh)| hierarchy_label(&mesh.name))
        .unwrap_or_default();

    ui.collapsing("Material", |ui| {
        ui.label(egui::RichText::new(name).strong());
        let mut props = before;
        ui.horizontal(|ui| {
            ui.label("Color");
            color_button(ui, &mut props.color);
            ui.label("Emissive");
            color_button(ui, &mut props.emissive);
        });
        let mut emissive = props.emissive_intensity();
        if ui
            .add(egui::Slider::new(&mut emissive, 0.0..=1.0).text("Emissive intensity"))
            .changed()
        {
            props.set_emissive_intensity(emissive);
        }
        let mut metalness = props.metalness();
        if ui
            .add(egui::Slider::new(&mut metalness, 0.0..=1.0).text("Metalness"))
            .changed()
        {
            props.set_metalness(metalness);
        }

        if props != before {
            let highlighted = params.highlights.selection.is_selected(entity)
                || params.highlights.pick.current() == Some(entity);
            apply_material(
                entity,
                &props,
                &mut params.tints,
                &params.handles,
                &mut params.materials,
                highlighted,
            );
            params.highlights.edited = Some((entity, props));
        }
        if ui.small_button("Close").clicked() {
            params.highlights.edited = None;
        }
    });
}

fn save_section(ui: &mut egui::Ui, params: &mut UiParams) {
    ui.collapsing("Save view", |ui| {
        let mut selection = params.session.save_selection;
        for group in SaveGroup::ALL {
            ui.checkbox(selection.toggle_mut(group), group.label());
        }
        if selection != params.session.save_selection {
            params.session.save_selection = selection;
        }
        ui.horizontal(|ui| {
            if ui.button("Save").clicked() {
                start_save(params);
            }
            if ui.button("Create thumbnail").clicked() {
                start_capture(params);
            }
        });
    });
}

fn start_save(params: &mut UiParams) {
    let (Ok(root), Ok((_, _, camera))) = (params.roots.single(), params.cameras.single()) else {
        return;
    };
    let live = LiveScene {
        object: from_transform(root),
        camera_position: camera.translation,
        camera_target: params.orbit.target,
        lighting: params.session.lighting,
    };
    let Some(client) = params.repository.0.clone() else {
        params.session.notify(Notice::error("Repository unavailable"));
        return;
    };

    match params.session.prepare_save(&live) {
        Ok((ticket, request)) => {
            let slot = params.uploads.save.clone();
            wasm_bindgen_futures::spawn_local(async move {
                push(&slot, (ticket, client.save(&request).await));
            });
        }
        Err(e) => params.session.notify(Notice::error(format!("Cannot save: {}", e))),
    }
}

fn start_capture(params: &mut UiParams) {
    let selector = params.page.canvas.clone();
    let slot = params.uploads.capture.clone();
    wasm_bindgen_futures::spawn_local(async move {
        put(&slot, capture_png(&selector).await);
    });
}

/// Hand finished saves and captures back to the session
fn receive_uploads(
    mut session: ResMut<Session>,
    uploads: Res<PendingUploads>,
    repository: Res<Repository>,
) {
    // Several saves can finish within one frame
    for (ticket, result) in drain(&uploads.save) {
        session.on_save_result(ticket, result);
    }

    if let Some(result) = take(&uploads.capture) {
        let upload = result.and_then(|png| session.prepare_thumbnail(png).map_err(|e| e.to_string()));
        match (upload, repository.0.clone()) {
            (Ok(upload), Some(client)) => {
                let slot = uploads.thumbnail.clone();
                wasm_bindgen_futures::spawn_local(async move {
                    put(&slot, client.upload_thumbnail(&upload).await);
                });
            }
            (Ok(_), None) => session.notify(Notice::error("Repository unavailable")),
            (Err(e), _) => {
                warn!("Thumbnail capture failed: {}", e);
                session.notify(Notice::error(format!("Thumbnail capture failed: {}", e)));
            }
        }
    }

    if let Some(result) = take(&uploads.thumbnail) {
        session.on_thumbnail_result(result);
    }
}
