//! Clipping plane helpers and mesh culling
//!
//! The standard material has no user clip planes, so a mesh is hidden once
//! its whole world-space box lies on the discarded side of any active plane.
//! Partially cut meshes stay visible.

use bevy::light::NotShadowCaster;
use bevy::prelude::*;

use vitrine_core::clipping::{ClipAxis, ClippingPlaneSet};

use crate::types::{to_color, ModelMesh, Session, ViewerHelper};

/// Translucent quad showing one clipping plane
#[derive(Component)]
pub struct ClippingHelper {
    pub axis: ClipAxis,
}

/// Mesh hidden by the clipping planes
#[derive(Component)]
pub struct Clipped;

pub struct ClippingPlugin;

impl Plugin for ClippingPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, (sync_clipping_helpers, cull_clipped_meshes));
    }
}

/// Rotation that turns a Y-up plane mesh to face along `axis`
fn helper_rotation(axis: ClipAxis) -> Quat {
    match axis {
        ClipAxis::X => Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
        ClipAxis::Y => Quat::IDENTITY,
        ClipAxis::Z => Quat::from_rotation_x(std::f32::consts::FRAC_PI_2),
    }
}

/// Spawn the three (hidden) plane helpers for a fresh plane set
pub fn spawn_clipping_helpers(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    planes: &ClippingPlaneSet,
) {
    let size = planes.helper_size();
    let material = materials.add(StandardMaterial {
        base_color: to_color(planes.helper_color()).with_alpha(0.2),
        unlit: true,
        alpha_mode: AlphaMode::Blend,
        double_sided: true,
        cull_mode: None,
        ..default()
    });
    let mesh = meshes.add(Plane3d::default().mesh().size(size, size));

    for axis in ClipAxis::ALL {
        commands.spawn((
            Mesh3d(mesh.clone()),
            MeshMaterial3d(material.clone()),
            Transform::from_rotation(helper_rotation(axis)),
            NotShadowCaster,
            ClippingHelper { axis },
            ViewerHelper,
            Visibility::Hidden,
        ));
    }
}

fn sync_clipping_helpers(
    session: Res<Session>,
    mut helpers: Query<(&ClippingHelper, &mut Transform, &mut Visibility, &MeshMaterial3d<StandardMaterial>)>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    if !session.is_changed() {
        return;
    }
    let (Some(planes), Some(model)) = (session.clipping.as_ref(), session.model()) else {
        return;
    };
    let bounds = model.normalized.bounds;
    let color = to_color(planes.helper_color()).with_alpha(0.2);

    for (helper, mut transform, mut visibility, material) in &mut helpers {
        let plane = planes.plane(helper.axis);
        transform.translation = plane.helper_position(&bounds);
        *visibility = if plane.helper_visible {
            Visibility::Visible
        } else {
            Visibility::Hidden
        };
        if let Some(material) = materials.get_mut(&material.0) {
            if material.base_color != color {
                material.base_color = color;
            }
        }
    }
}

fn cull_clipped_meshes(
    mut commands: Commands,
    session: Res<Session>,
    mut model_meshes: Query<(Entity, &ModelMesh, &GlobalTransform, &mut Visibility, Has<Clipped>)>,
) {
    let Some(planes) = session.clipping.as_ref() else {
        return;
    };
    let active = planes.any_active();

    for (entity, mesh, global, mut visibility, was_clipped) in &mut model_meshes {
        let world = mesh.local_bounds.transformed(&Mat4::from(global.affine()));
        let corners = world.corners();
        let discarded = active
            && planes
                .planes()
                .iter()
                .any(|plane| corners.iter().all(|c| !plane.keeps(*c)));
        if discarded && !was_clipped {
            *visibility = Visibility::Hidden;
            commands.entity(entity).insert(Clipped);
        } else if !discarded && was_clipped {
            *visibility = Visibility::Inherited;
            commands.entity(entity).remove::<Clipped>();
        }
    }
}
