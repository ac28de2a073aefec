//! Loader output model
//!
//! Whatever backend parses the file reports back a `LoadedScene`: the
//! top-level objects it produced, their local bounds and their transforms.
//! The pipeline never touches engine objects directly; it computes
//! transforms and hands them back to the backend.

use glam::{EulerRot, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::bounds::Aabb;

/// Translation, Euler XYZ rotation (radians) and scale of a node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeTransform {
    pub translation: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl NodeTransform {
    pub const IDENTITY: NodeTransform = NodeTransform {
        translation: Vec3::ZERO,
        rotation: Vec3::ZERO,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn quat(&self) -> Quat {
        Quat::from_euler(EulerRot::XYZ, self.rotation.x, self.rotation.y, self.rotation.z)
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.quat(), self.translation)
    }

    /// Rotation in degrees, the unit persisted in view state
    pub fn rotation_degrees(&self) -> Vec3 {
        Vec3::new(
            self.rotation.x.to_degrees(),
            self.rotation.y.to_degrees(),
            self.rotation.z.to_degrees(),
        )
    }
}

/// Vertex and face counts of loaded geometry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshStats {
    pub vertices: usize,
    pub faces: usize,
}

impl MeshStats {
    /// Indexed geometry counts indices, otherwise positions; every three make a face
    pub fn from_counts(index_count: Option<usize>, position_count: usize) -> Self {
        let vertices = index_count.unwrap_or(position_count);
        Self {
            vertices,
            faces: vertices / 3,
        }
    }

    pub fn add(&mut self, other: MeshStats) {
        self.vertices += other.vertices;
        self.faces += other.faces;
    }
}

/// One top-level object produced by a loader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    /// Bounds of the object's geometry in its own space
    pub local_bounds: Aabb,
    pub transform: NodeTransform,
    pub stats: MeshStats,
}

impl SceneObject {
    pub fn world_bounds(&self) -> Aabb {
        self.local_bounds.transformed(&self.transform.matrix())
    }
}

/// How the loader packaged its output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SceneShape {
    Single,
    /// Several top-level objects (e.g. an OBJ split into parts)
    Array,
    /// A hierarchical group
    Group,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedScene {
    pub roots: Vec<SceneObject>,
    pub shape: SceneShape,
    /// The group must be parented to a neutral container before it can be
    /// moved; setting its own transform does not propagate to its children.
    pub needs_reparent: bool,
}

impl LoadedScene {
    pub fn single(object: SceneObject) -> Self {
        Self {
            roots: vec![object],
            shape: SceneShape::Single,
            needs_reparent: false,
        }
    }

    /// Union of the world bounds of every top-level object
    pub fn bounds(&self) -> Aabb {
        self.roots
            .iter()
            .fold(Aabb::EMPTY, |acc, obj| acc.union(&obj.world_bounds()))
    }

    pub fn stats(&self) -> MeshStats {
        let mut total = MeshStats::default();
        for obj in &self.roots {
            total.add(obj.stats);
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_stats() {
        assert_eq!(
            MeshStats::from_counts(Some(36), 24),
            MeshStats { vertices: 36, faces: 12 }
        );
        assert_eq!(
            MeshStats::from_counts(None, 9),
            MeshStats { vertices: 9, faces: 3 }
        );
    }

    #[test]
    fn test_scene_bounds_union() {
        let cube = |t: Vec3| SceneObject {
            name: "part".to_string(),
            local_bounds: Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5)),
            transform: NodeTransform::from_translation(t),
            stats: MeshStats::from_counts(Some(36), 8),
        };
        let scene = LoadedScene {
            roots: vec![cube(Vec3::ZERO), cube(Vec3::new(3.0, 0.0, 0.0))],
            shape: SceneShape::Array,
            needs_reparent: false,
        };
        let b = scene.bounds();
        assert_eq!(b.min, Vec3::new(-0.5, -0.5, -0.5));
        assert_eq!(b.max, Vec3::new(3.5, 0.5, 0.5));
        assert_eq!(scene.stats().faces, 24);
    }
}
