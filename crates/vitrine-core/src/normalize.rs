//! Scene normalization
//!
//! Places freshly loaded geometry in a deterministic rest pose: the combined
//! bounding box is centered on X/Z and its lowest point rests on the ground
//! plane (Y = 0). A saved pose replaces that policy entirely.

use glam::Vec3;
use tracing::debug;

use crate::bounds::Aabb;
use crate::scene::{LoadedScene, NodeTransform};
use crate::view_state::ObjectPose;

/// Transforms the backend should apply after a load
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedScene {
    /// New transform for each root, in the loader's order
    pub root_transforms: Vec<NodeTransform>,
    /// Neutral parent the roots must be attached to, if any
    pub container: Option<NodeTransform>,
    /// World bounds after the transforms are applied
    pub bounds: Aabb,
    /// Whether a saved pose was applied
    pub restored: bool,
    pub cast_shadows: bool,
    pub receive_shadows: bool,
}

impl NormalizedScene {
    /// Transform of the object the editor gizmo is attached to
    pub fn primary_transform(&self) -> NodeTransform {
        self.container
            .or_else(|| self.root_transforms.first().copied())
            .unwrap_or_default()
    }
}

/// Offset that moves `bounds` to rest on the ground, centered on X/Z
pub fn rest_offset(bounds: &Aabb) -> Vec3 {
    if bounds.is_empty() {
        return Vec3::ZERO;
    }
    let center = bounds.center();
    Vec3::new(-center.x, -bounds.min.y, -center.z)
}

pub fn normalize(scene: &LoadedScene, saved: Option<&ObjectPose>) -> NormalizedScene {
    match saved.filter(|pose| !pose.is_empty()) {
        Some(pose) => restore(scene, pose),
        None => rest(scene),
    }
}

fn restore(scene: &LoadedScene, pose: &ObjectPose) -> NormalizedScene {
    let root_transforms: Vec<NodeTransform> =
        scene.roots.iter().map(|obj| pose.apply_to(obj.transform)).collect();

    let bounds = scene
        .roots
        .iter()
        .zip(&root_transforms)
        .fold(Aabb::EMPTY, |acc, (obj, t)| {
            acc.union(&obj.local_bounds.transformed(&t.matrix()))
        });

    debug!(roots = root_transforms.len(), "Restored saved object pose");

    NormalizedScene {
        root_transforms,
        container: None,
        bounds,
        restored: true,
        cast_shadows: true,
        receive_shadows: true,
    }
}

fn rest(scene: &LoadedScene) -> NormalizedScene {
    let bounds = scene.bounds();
    let offset = rest_offset(&bounds);

    let (root_transforms, container) = if scene.needs_reparent {
        let roots = scene.roots.iter().map(|obj| obj.transform).collect();
        (roots, Some(NodeTransform::from_translation(offset)))
    } else {
        let roots = scene
            .roots
            .iter()
            .map(|obj| NodeTransform {
                translation: obj.transform.translation + offset,
                ..obj.transform
            })
            .collect();
        (roots, None)
    };

    debug!(
        offset = ?offset,
        reparented = container.is_some(),
        "Placed scene at rest pose"
    );

    NormalizedScene {
        root_transforms,
        container,
        bounds: bounds.translated(offset),
        restored: false,
        cast_shadows: true,
        receive_shadows: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{MeshStats, SceneObject, SceneShape};

    fn object(min: Vec3, max: Vec3, translation: Vec3) -> SceneObject {
        SceneObject {
            name: "mesh".to_string(),
            local_bounds: Aabb::new(min, max),
            transform: NodeTransform::from_translation(translation),
            stats: MeshStats::default(),
        }
    }

    #[test]
    fn test_rest_pose_centers_and_grounds() {
        let scene = LoadedScene::single(object(
            Vec3::new(-1.0, -2.0, -1.0),
            Vec3::new(1.0, 4.0, 1.0),
            Vec3::ZERO,
        ));
        let out = normalize(&scene, None);

        assert!(!out.restored);
        assert_eq!(out.root_transforms[0].translation, Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(out.bounds.min.y, 0.0);
        assert_eq!(out.bounds.center().x, 0.0);
        assert_eq!(out.bounds.center().z, 0.0);
    }

    #[test]
    fn test_rest_pose_is_independent_of_source_transform() {
        let a = LoadedScene::single(object(Vec3::splat(-1.0), Vec3::splat(1.0), Vec3::ZERO));
        let b = LoadedScene::single(object(
            Vec3::splat(-1.0),
            Vec3::splat(1.0),
            Vec3::new(40.0, -7.0, 3.0),
        ));
        assert_eq!(normalize(&a, None).bounds, normalize(&b, None).bounds);
    }

    #[test]
    fn test_array_uses_union_box() {
        let scene = LoadedScene {
            roots: vec![
                object(Vec3::ZERO, Vec3::ONE, Vec3::new(2.0, 1.0, 0.0)),
                object(Vec3::ZERO, Vec3::ONE, Vec3::new(-2.0, 3.0, 0.0)),
            ],
            shape: SceneShape::Array,
            needs_reparent: false,
        };
        let out = normalize(&scene, None);
        // union x: -2..3, center 0.5; min y 1
        assert_eq!(out.root_transforms[0].translation, Vec3::new(1.5, 0.0, -0.5));
        assert_eq!(out.root_transforms[1].translation, Vec3::new(-2.5, 2.0, -0.5));
        assert_eq!(out.bounds.min.y, 0.0);
    }

    #[test]
    fn test_group_is_reparented() {
        let scene = LoadedScene {
            roots: vec![object(Vec3::ZERO, Vec3::new(2.0, 2.0, 2.0), Vec3::ZERO)],
            shape: SceneShape::Group,
            needs_reparent: true,
        };
        let out = normalize(&scene, None);
        assert_eq!(out.root_transforms[0], NodeTransform::IDENTITY);
        assert_eq!(
            out.container.map(|c| c.translation),
            Some(Vec3::new(-1.0, 0.0, -1.0))
        );
        assert_eq!(out.primary_transform().translation, Vec3::new(-1.0, 0.0, -1.0));
    }

    #[test]
    fn test_saved_pose_applied_literally() {
        let scene = LoadedScene::single(object(
            Vec3::new(-1.0, -2.0, -1.0),
            Vec3::new(1.0, 4.0, 1.0),
            Vec3::ZERO,
        ));
        let pose = ObjectPose {
            position: Some(Vec3::new(5.0, 0.0, 0.0)),
            rotation_degrees: Some(Vec3::new(0.0, 90.0, 0.0)),
            scale: Some(Vec3::splat(2.0)),
        };
        let out = normalize(&scene, Some(&pose));
        let t = out.root_transforms[0];
        assert!(out.restored);
        assert_eq!(t.translation, Vec3::new(5.0, 0.0, 0.0));
        assert!((t.rotation.y - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert_eq!(t.scale, Vec3::splat(2.0));
        // No re-centering on the restored branch
        assert!((out.bounds.min.y + 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_pose_takes_rest_branch() {
        let scene = LoadedScene::single(object(Vec3::ZERO, Vec3::ONE, Vec3::ZERO));
        let out = normalize(&scene, Some(&ObjectPose::default()));
        assert!(!out.restored);
    }
}
