//! Scene setup - lights, ground, grid, axes and the light helper

use bevy::light::NotShadowCaster;
use bevy::prelude::*;

use vitrine_core::framing::SceneHelpers;
use vitrine_core::view_state::LightingRig;

use crate::camera::CameraLight;
use crate::types::{to_color, Session, ViewerHelper};

/// Illuminance of the directional light at intensity 1
pub const DIRECTIONAL_LUX: f32 = 8_000.0;
/// Ambient brightness at intensity 1
pub const AMBIENT_BRIGHTNESS: f32 = 400.0;
/// Camera light output at intensity 1
pub const CAMERA_LIGHT_LUMENS: f32 = 2_000_000.0;

/// Marker component for the main directional light
#[derive(Component)]
pub struct MainDirectionalLight;

#[derive(Component)]
pub struct GroundPlane;

#[derive(Component)]
pub struct GridLine;

#[derive(Component)]
pub struct WorldAxis;

/// Marker for the directional light helper
#[derive(Component)]
pub struct LightHelper;

/// Which helpers the user has switched on
#[derive(Debug, Clone, PartialEq, Eq, Resource)]
pub struct HelperVisibility {
    pub grid: bool,
    pub ground: bool,
    pub axes: bool,
    pub light: bool,
}

impl Default for HelperVisibility {
    fn default() -> Self {
        Self {
            grid: true,
            ground: true,
            axes: false,
            light: false,
        }
    }
}

/// Plugin for scene setup
pub struct SceneSetupPlugin;

impl Plugin for SceneSetupPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<HelperVisibility>()
            .insert_resource(AmbientLight::default())
            .insert_resource(ClearColor(Color::WHITE))
            .add_systems(Startup, spawn_lights)
            .add_systems(Update, (apply_lighting, update_helper_visibility));
    }
}

fn spawn_lights(mut commands: Commands) {
    let rig = LightingRig::default();
    commands.spawn((
        DirectionalLight {
            illuminance: DIRECTIONAL_LUX,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_translation(rig.directional_position)
            .looking_at(rig.directional_target, Vec3::Y),
        MainDirectionalLight,
    ));
}

/// Push the session's lighting rig into the ECS lights
fn apply_lighting(
    session: Res<Session>,
    mut ambient: ResMut<AmbientLight>,
    mut clear_color: ResMut<ClearColor>,
    mut directional: Query<(&mut DirectionalLight, &mut Transform), With<MainDirectionalLight>>,
    mut camera_light: Query<&mut PointLight, With<CameraLight>>,
    mut light_helpers: Query<&mut Transform, (With<LightHelper>, Without<MainDirectionalLight>)>,
) {
    if !session.is_changed() {
        return;
    }
    let rig = &session.lighting;

    ambient.color = to_color(rig.ambient.color);
    ambient.brightness = rig.ambient.intensity * AMBIENT_BRIGHTNESS;
    clear_color.0 = to_color(rig.background);

    for (mut light, mut transform) in &mut directional {
        light.color = to_color(rig.directional.color);
        light.illuminance = rig.directional.intensity * DIRECTIONAL_LUX;
        *transform = Transform::from_translation(rig.directional_position)
            .looking_at(rig.directional_target, Vec3::Y);
    }

    for mut light in &mut camera_light {
        light.color = to_color(rig.camera.color);
        light.intensity = rig.camera.intensity * CAMERA_LIGHT_LUMENS;
    }

    for mut transform in &mut light_helpers {
        transform.translation = rig.directional_position;
    }
}

/// Remove every helper from a previous model
pub fn despawn_helpers(commands: &mut Commands, helpers: &Query<Entity, With<ViewerHelper>>) {
    for entity in helpers.iter() {
        commands.entity(entity).despawn();
    }
}

/// Spawn ground, grid, axes and light helper sized for the framed model
pub fn spawn_helpers(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    helpers: &SceneHelpers,
    rig: &LightingRig,
    visibility: &HelperVisibility,
) {
    let shown = |on: bool| if on { Visibility::Visible } else { Visibility::Hidden };

    // Ground sits a hair below Y = 0 so it does not fight with the model base
    let ground_y = -helpers.grid_size * 0.001;
    let ground_color = to_color(helpers.ground_color).with_alpha(helpers.ground_opacity);
    commands.spawn((
        Mesh3d(meshes.add(Plane3d::default().mesh().size(helpers.ground_size, helpers.ground_size))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: ground_color,
            alpha_mode: AlphaMode::Blend,
            perceptual_roughness: 1.0,
            ..default()
        })),
        Transform::from_xyz(0.0, ground_y, 0.0),
        NotShadowCaster,
        GroundPlane,
        ViewerHelper,
        shown(visibility.ground),
    ));

    let divisions = helpers.grid_divisions.max(1);
    let spacing = helpers.ground_size / divisions as f32;
    let half = helpers.ground_size / 2.0;
    let thickness = (helpers.grid_size / 2000.0).max(f32::EPSILON);
    let line_material = materials.add(StandardMaterial {
        base_color: Color::srgba(0.2, 0.2, 0.2, helpers.grid_opacity),
        unlit: true,
        alpha_mode: AlphaMode::Blend,
        ..default()
    });
    let line_x = meshes.add(Cuboid::new(helpers.ground_size, thickness, thickness));
    let line_z = meshes.add(Cuboid::new(thickness, thickness, helpers.ground_size));

    for i in 0..=divisions {
        let offset = -half + i as f32 * spacing;
        commands.spawn((
            Mesh3d(line_x.clone()),
            MeshMaterial3d(line_material.clone()),
            Transform::from_xyz(0.0, 0.0, offset),
            NotShadowCaster,
            GridLine,
            ViewerHelper,
            shown(visibility.grid),
        ));
        commands.spawn((
            Mesh3d(line_z.clone()),
            MeshMaterial3d(line_material.clone()),
            Transform::from_xyz(offset, 0.0, 0.0),
            NotShadowCaster,
            GridLine,
            ViewerHelper,
            shown(visibility.grid),
        ));
    }

    let axis_thickness = thickness * 4.0;
    let length = helpers.axes_length;
    let axes = [
        (Vec3::new(length, axis_thickness, axis_thickness), Vec3::X, Color::srgb(0.9, 0.2, 0.2)),
        (Vec3::new(axis_thickness, length, axis_thickness), Vec3::Y, Color::srgb(0.2, 0.9, 0.2)),
        (Vec3::new(axis_thickness, axis_thickness, length), Vec3::Z, Color::srgb(0.2, 0.2, 0.9)),
    ];
    for (size, direction, color) in axes {
        commands.spawn((
            Mesh3d(meshes.add(Cuboid::from_size(size))),
            MeshMaterial3d(materials.add(StandardMaterial {
                base_color: color,
                unlit: true,
                ..default()
            })),
            Transform::from_translation(direction * length / 2.0),
            NotShadowCaster,
            WorldAxis,
            ViewerHelper,
            shown(visibility.axes),
        ));
    }

    let marker = (helpers.light_helper_size / 20.0).max(f32::EPSILON);
    commands.spawn((
        Mesh3d(meshes.add(Cuboid::from_length(marker))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(1.0, 0.85, 0.2),
            unlit: true,
            ..default()
        })),
        Transform::from_translation(rig.directional_position),
        NotShadowCaster,
        LightHelper,
        ViewerHelper,
        shown(visibility.light && helpers.light_helper_visible),
    ));
}

fn update_helper_visibility(
    visibility: Res<HelperVisibility>,
    mut ground: Query<&mut Visibility, (With<GroundPlane>, Without<GridLine>, Without<WorldAxis>, Without<LightHelper>)>,
    mut grid: Query<&mut Visibility, (With<GridLine>, Without<WorldAxis>, Without<LightHelper>)>,
    mut axes: Query<&mut Visibility, (With<WorldAxis>, Without<LightHelper>)>,
    mut light: Query<&mut Visibility, (With<LightHelper>, Without<GroundPlane>, Without<GridLine>, Without<WorldAxis>)>,
) {
    if !visibility.is_changed() {
        return;
    }
    let shown = |on: bool| if on { Visibility::Visible } else { Visibility::Hidden };
    for mut v in &mut ground {
        *v = shown(visibility.ground);
    }
    for mut v in &mut grid {
        *v = shown(visibility.grid);
    }
    for mut v in &mut axes {
        *v = shown(visibility.axes);
    }
    for mut v in &mut light {
        *v = shown(visibility.light);
    }
}
