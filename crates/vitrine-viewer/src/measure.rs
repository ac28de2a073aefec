//! Distance measurement on the model surface

use bevy::light::NotShadowCaster;
use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use bevy_egui::EguiContexts;
use bevy_picking::mesh_picking::ray_cast::MeshRayCast;
use tracing::debug;

use vitrine_core::editor::InteractionMode;
use vitrine_core::measure::{RulerSegment, RulerStyle};
use vitrine_scene::camera::MainCamera;
use vitrine_scene::types::{ModelMesh, Session, ViewerHelper};

use crate::editor::cursor_hit;

/// Marker, segment or tick spawned for the ruler
#[derive(Component)]
pub struct RulerMark;

pub struct MeasurePlugin;

impl Plugin for MeasurePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, (measure_clicks, clear_ruler_marks).chain());
    }
}

fn measure_clicks(
    mut commands: Commands,
    mut session: ResMut<Session>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&Camera, &GlobalTransform), With<MainCamera>>,
    model_meshes: Query<(), With<ModelMesh>>,
    mut ray_cast: MeshRayCast,
    mut contexts: EguiContexts,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    if session.editor.mode() != InteractionMode::Measuring || !mouse_button.just_pressed(MouseButton::Left) {
        return;
    }
    let Ok(ctx) = contexts.ctx_mut() else { return };
    if ctx.wants_pointer_input() || ctx.is_pointer_over_area() {
        return;
    }
    let (Ok(window), Ok((camera, camera_transform))) = (windows.single(), cameras.single()) else {
        return;
    };
    let Some(grid_size) = session.model().map(|m| m.helpers.grid_size) else {
        return;
    };

    let hit = window.cursor_position().and_then(|cursor| {
        cursor_hit(&mut ray_cast, camera, camera_transform, cursor, &|e| {
            model_meshes.contains(e)
        })
    });
    let Some((_, point)) = hit else {
        return;
    };

    let style = RulerStyle::for_grid(grid_size);
    let material = materials.add(StandardMaterial {
        base_color: Color::BLACK,
        unlit: true,
        ..default()
    });

    commands.spawn((
        Mesh3d(meshes.add(Sphere::new(style.marker_radius))),
        MeshMaterial3d(material.clone()),
        Transform::from_translation(point),
        NotShadowCaster,
        RulerMark,
        ViewerHelper,
    ));

    let segment = session.ruler.add_point(point).cloned();
    if let Some(segment) = segment {
        debug!(length = segment.length, "Ruler segment added");
        spawn_segment(&mut commands, &mut meshes, material, &segment, &style);
    }
}

fn spawn_segment(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    material: Handle<StandardMaterial>,
    segment: &RulerSegment,
    style: &RulerStyle,
) {
    let direction = (segment.to - segment.from).normalize_or_zero();
    if direction == Vec3::ZERO {
        return;
    }
    let up = if direction.abs_diff_eq(Vec3::Y, 1e-3) || direction.abs_diff_eq(Vec3::NEG_Y, 1e-3) {
        Vec3::X
    } else {
        Vec3::Y
    };
    let thickness = style.tick_size / 2.0;

    commands.spawn((
        Mesh3d(meshes.add(Cuboid::new(thickness, thickness, segment.length))),
        MeshMaterial3d(material.clone()),
        Transform::from_translation(segment.midpoint).looking_to(direction, up),
        NotShadowCaster,
        RulerMark,
        ViewerHelper,
    ));

    let tick = meshes.add(Cuboid::from_length(style.tick_size));
    for point in &segment.ticks {
        commands.spawn((
            Mesh3d(tick.clone()),
            MeshMaterial3d(material.clone()),
            Transform::from_translation(*point).looking_to(direction, up),
            NotShadowCaster,
            RulerMark,
            ViewerHelper,
        ));
    }
}

/// Drop the ruler geometry once the session cleared the ruler
fn clear_ruler_marks(
    mut commands: Commands,
    session: Res<Session>,
    marks: Query<Entity, With<RulerMark>>,
) {
    if !session.is_changed() || !session.ruler.is_empty() {
        return;
    }
    for entity in &marks {
        commands.entity(entity).despawn();
    }
}
