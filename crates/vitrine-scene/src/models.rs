//! Loaded model entities
//!
//! Once a glTF scene has spawned, its meshes are measured and reported to the
//! session as a `LoadedScene`. The placement the session computes comes back
//! as a `NodeTransform` on the model root.

use bevy::mesh::VertexAttributeValues;
use bevy::prelude::*;
use tracing::debug;

use vitrine_core::bounds::Aabb;
use vitrine_core::scene::{LoadedScene, MeshStats, NodeTransform, SceneObject};

use crate::types::{ModelMesh, ModelRoot, Session};

/// Plugin for model bookkeeping
pub struct ModelsPlugin;

impl Plugin for ModelsPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, track_model_bounds);
    }
}

pub fn to_transform(node: &NodeTransform) -> Transform {
    Transform {
        translation: node.translation,
        rotation: node.quat(),
        scale: node.scale,
    }
}

pub fn from_transform(transform: &Transform) -> NodeTransform {
    let (x, y, z) = transform.rotation.to_euler(EulerRot::XYZ);
    NodeTransform {
        translation: transform.translation,
        rotation: Vec3::new(x, y, z),
        scale: transform.scale,
    }
}

/// Mesh-space box of a mesh's POSITION attribute
pub fn mesh_bounds(mesh: &Mesh) -> Option<Aabb> {
    match mesh.attribute(Mesh::ATTRIBUTE_POSITION)? {
        VertexAttributeValues::Float32x3(positions) => {
            let bounds = Aabb::from_points(positions.iter().map(|p| Vec3::from_array(*p)));
            (!bounds.is_empty()).then_some(bounds)
        }
        _ => None,
    }
}

pub fn mesh_stats(mesh: &Mesh) -> MeshStats {
    MeshStats::from_counts(mesh.indices().map(|i| i.len()), mesh.count_vertices())
}

/// A mesh found under the model root
#[derive(Debug, Clone)]
pub struct MeasuredMesh {
    pub entity: Entity,
    pub mesh: ModelMesh,
}

/// Meshes under `root` and the scene they add up to
#[derive(Debug, Clone)]
pub struct MeasuredModel {
    pub scene: LoadedScene,
    pub meshes: Vec<MeasuredMesh>,
}

/// Walk the spawned hierarchy under `root` and measure every mesh.
///
/// The whole glTF scene is reported as one object whose local space is the
/// root's; its current transform is the root's own.
pub fn measure_model(
    root: Entity,
    name: &str,
    root_transform: &Transform,
    children: &Query<&Children>,
    mesh_query: &Query<(&Mesh3d, &GlobalTransform)>,
    names: &Query<&Name>,
    parents: &Query<&ChildOf>,
    mesh_assets: &Assets<Mesh>,
) -> MeasuredModel {
    let to_root = from_transform(root_transform).matrix().inverse();
    let mut local_bounds = Aabb::EMPTY;
    let mut stats = MeshStats::default();
    let mut meshes = Vec::new();

    for entity in children.iter_descendants(root) {
        let Ok((handle, global)) = mesh_query.get(entity) else {
            continue;
        };
        let Some(mesh) = mesh_assets.get(&handle.0) else {
            continue;
        };
        let Some(bounds) = mesh_bounds(mesh) else {
            continue;
        };

        let world = bounds.transformed(&Mat4::from(global.affine()));
        local_bounds = local_bounds.union(&world.transformed(&to_root));
        stats.add(mesh_stats(mesh));

        meshes.push(MeasuredMesh {
            entity,
            mesh: ModelMesh {
                local_bounds: bounds,
                name: mesh_name(entity, names, parents),
            },
        });
    }

    debug!(meshes = meshes.len(), vertices = stats.vertices, "Measured model");

    MeasuredModel {
        scene: LoadedScene::single(SceneObject {
            name: name.to_string(),
            local_bounds,
            transform: from_transform(root_transform),
            stats,
        }),
        meshes,
    }
}

/// glTF primitives are unnamed children of the named node
fn mesh_name(entity: Entity, names: &Query<&Name>, parents: &Query<&ChildOf>) -> String {
    if let Ok(name) = names.get(entity) {
        return name.as_str().to_string();
    }
    parents
        .get(entity)
        .ok()
        .and_then(|child_of| names.get(child_of.parent()).ok())
        .map(|name| name.as_str().to_string())
        .unwrap_or_default()
}

/// World box of all model meshes
pub fn model_world_bounds<'a>(
    meshes: impl IntoIterator<Item = (&'a ModelMesh, &'a GlobalTransform)>,
) -> Aabb {
    meshes.into_iter().fold(Aabb::EMPTY, |acc, (mesh, global)| {
        acc.union(&mesh.local_bounds.transformed(&Mat4::from(global.affine())))
    })
}

/// Refit the session's bounds after the model was moved, rotated or scaled
fn track_model_bounds(
    roots: Query<(), (With<ModelRoot>, Changed<GlobalTransform>)>,
    meshes: Query<(&ModelMesh, &GlobalTransform)>,
    mut session: ResMut<Session>,
) {
    if roots.is_empty() {
        return;
    }
    let Some(current) = session.model().map(|m| m.normalized.bounds) else {
        return;
    };
    let bounds = model_world_bounds(meshes.iter());
    let unchanged = bounds.min.abs_diff_eq(current.min, 1e-5) && bounds.max.abs_diff_eq(current.max, 1e-5);
    if bounds.is_empty() || unchanged {
        return;
    }
    session.on_bounds_changed(&bounds);
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::asset::RenderAssetUsages;
    use bevy::ecs::system::RunSystemOnce;
    use bevy::mesh::Indices;
    use bevy::render::render_resource::PrimitiveTopology;

    fn triangle() -> Mesh {
        Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default())
            .with_inserted_attribute(
                Mesh::ATTRIBUTE_POSITION,
                vec![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 3.0, -1.0]],
            )
    }

    #[test]
    fn test_mesh_bounds_from_positions() {
        let bounds = mesh_bounds(&triangle()).unwrap();
        assert_eq!(bounds.min, Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(bounds.max, Vec3::new(2.0, 3.0, 0.0));
    }

    #[test]
    fn test_mesh_stats_prefers_indices() {
        let plain = triangle();
        assert_eq!(mesh_stats(&plain), MeshStats { vertices: 3, faces: 1 });

        let indexed = triangle().with_inserted_indices(Indices::U32(vec![0, 1, 2, 2, 1, 0]));
        assert_eq!(mesh_stats(&indexed), MeshStats { vertices: 6, faces: 2 });
    }

    #[test]
    fn test_transform_conversion_round_trip() {
        let node = NodeTransform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Vec3::new(0.3, -0.2, 0.1),
            scale: Vec3::splat(2.0),
        };
        let back = from_transform(&to_transform(&node));
        assert!(back.translation.abs_diff_eq(node.translation, 1e-5));
        assert!(back.rotation.abs_diff_eq(node.rotation, 1e-5));
        assert!(back.scale.abs_diff_eq(node.scale, 1e-5));
    }

    #[test]
    fn test_measure_model_reports_root_space_bounds() {
        let mut app = App::new();
        app.add_plugins((MinimalPlugins, TransformPlugin, AssetPlugin::default()))
            .init_asset::<Mesh>();

        let handle = app.world_mut().resource_mut::<Assets<Mesh>>().add(triangle());
        let root = app
            .world_mut()
            .spawn((Transform::from_xyz(0.0, 5.0, 0.0), Name::new("bust")))
            .id();
        let node = app
            .world_mut()
            .spawn((Transform::from_xyz(1.0, 0.0, 0.0), Name::new("head"), ChildOf(root)))
            .id();
        let primitive = app
            .world_mut()
            .spawn((Mesh3d(handle), Transform::default(), ChildOf(node)))
            .id();
        app.update();

        let measured = app
            .world_mut()
            .run_system_once(
                move |children: Query<&Children>,
                      meshes: Query<(&Mesh3d, &GlobalTransform)>,
                      names: Query<&Name>,
                      parents: Query<&ChildOf>,
                      transforms: Query<&Transform>,
                      assets: Res<Assets<Mesh>>| {
                    let root_transform = transforms.get(root).copied().unwrap_or_default();
                    measure_model(root, "bust", &root_transform, &children, &meshes, &names, &parents, &assets)
                },
            )
            .unwrap();

        assert_eq!(measured.meshes.len(), 1);
        assert_eq!(measured.meshes[0].entity, primitive);
        assert_eq!(measured.meshes[0].mesh.name, "head");

        let object = &measured.scene.roots[0];
        assert!(object.local_bounds.min.abs_diff_eq(Vec3::new(1.0, 0.0, -1.0), 1e-5));
        assert!(object.local_bounds.max.abs_diff_eq(Vec3::new(3.0, 3.0, 0.0), 1e-5));
        assert_eq!(object.transform.translation, Vec3::new(0.0, 5.0, 0.0));
        assert_eq!(measured.scene.bounds().min.y, 5.0);
    }
}
