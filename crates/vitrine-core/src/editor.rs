//! Editing tools state
//!
//! Gizmo modes, interaction modes, highlight bookkeeping and the material
//! editor. Engines own the actual gizmos and materials; this module decides
//! what they should show.

use glam::Vec3;
use std::collections::HashSet;

use crate::notice::Notice;
use crate::view_state::HexColor;

/// Tint for a mesh under the picking cursor
pub const PICK_COLOR: HexColor = HexColor(0xFF_00_00);
/// Tint for a mesh selected in the hierarchy list
pub const SELECT_COLOR: HexColor = HexColor(0x00_FF_00);
pub const MAX_LIGHT_INTENSITY: f32 = 10.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransformMode {
    #[default]
    None,
    Translate,
    Rotate,
    Scale,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransformSpace {
    #[default]
    Local,
    Global,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LightGizmo {
    #[default]
    None,
    MoveLight,
    MoveTarget,
}

/// Handle being dragged on a scale gizmo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleHandle {
    X,
    Y,
    Z,
    XY,
    YZ,
    XZ,
    Uniform,
}

/// Scale edits stay uniform: the dragged component wins
pub fn uniform_scale(scale: Vec3, handle: ScaleHandle) -> Vec3 {
    let value = match handle {
        ScaleHandle::X | ScaleHandle::XY | ScaleHandle::XZ => scale.x,
        ScaleHandle::Y | ScaleHandle::YZ => scale.y,
        ScaleHandle::Z => scale.z,
        ScaleHandle::Uniform => return scale,
    };
    Vec3::splat(value)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InteractionMode {
    #[default]
    Orbit,
    Picking,
    Measuring,
}

/// Current tool selection of one viewer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorState {
    pub transform_mode: TransformMode,
    pub transform_space: TransformSpace,
    pub light_gizmo: LightGizmo,
    mode: InteractionMode,
}

impl EditorState {
    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    /// Toggle face picking; turns measuring off
    pub fn toggle_picking(&mut self) -> Notice {
        if self.mode == InteractionMode::Picking {
            self.mode = InteractionMode::Orbit;
            Notice::info("Face picking is disabled")
        } else {
            self.mode = InteractionMode::Picking;
            Notice::info("Face picking is enabled")
        }
    }

    /// Toggle distance measurement; turns picking off
    pub fn toggle_measuring(&mut self) -> Notice {
        if self.mode == InteractionMode::Measuring {
            self.mode = InteractionMode::Orbit;
            Notice::info("Distance measurement mode is disabled")
        } else {
            self.mode = InteractionMode::Measuring;
            Notice::info("Distance measurement mode is enabled")
        }
    }

    pub fn toggle_space(&mut self) {
        self.transform_space = match self.transform_space {
            TransformSpace::Local => TransformSpace::Global,
            TransformSpace::Global => TransformSpace::Local,
        };
    }
}

/// Color change the backend should apply to a mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tint<Id> {
    pub mesh: Id,
    pub color: HexColor,
}

/// Hover highlight for face picking; restores the previous mesh color
#[derive(Debug, Clone)]
pub struct PickHighlight<Id> {
    current: Option<(Id, HexColor)>,
}

impl<Id> Default for PickHighlight<Id> {
    fn default() -> Self {
        Self { current: None }
    }
}

impl<Id: Copy + PartialEq> PickHighlight<Id> {
    /// Update for the mesh now under the cursor (with its own color)
    pub fn hover(&mut self, hit: Option<(Id, HexColor)>) -> Vec<Tint<Id>> {
        let mut changes = Vec::new();
        let same = matches!((&self.current, &hit), (Some((a, _)), Some((b, _))) if a == b);
        if same {
            return changes;
        }
        if let Some((mesh, original)) = self.current.take() {
            changes.push(Tint {
                mesh,
                color: original,
            });
        }
        if let Some((mesh, original)) = hit {
            self.current = Some((mesh, original));
            changes.push(Tint {
                mesh,
                color: PICK_COLOR,
            });
        }
        changes
    }

    pub fn current(&self) -> Option<Id> {
        self.current.as_ref().map(|(id, _)| *id)
    }
}

/// Meshes highlighted from the hierarchy list
#[derive(Debug, Clone)]
pub struct Selection<Id> {
    selected: HashSet<Id>,
}

impl<Id> Default for Selection<Id> {
    fn default() -> Self {
        Self {
            selected: HashSet::new(),
        }
    }
}

impl<Id: Copy + Eq + std::hash::Hash> Selection<Id> {
    /// Flip one mesh; returns whether it is now selected
    pub fn toggle(&mut self, mesh: Id) -> bool {
        if self.selected.remove(&mesh) {
            false
        } else {
            self.selected.insert(mesh);
            true
        }
    }

    pub fn is_selected(&self, mesh: Id) -> bool {
        self.selected.contains(&mesh)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}

/// Editable material properties
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialProperties {
    pub color: HexColor,
    pub emissive: HexColor,
    emissive_intensity: f32,
    metalness: f32,
}

impl Default for MaterialProperties {
    fn default() -> Self {
        Self {
            color: HexColor::WHITE,
            emissive: HexColor(0),
            emissive_intensity: 0.0,
            metalness: 0.0,
        }
    }
}

impl MaterialProperties {
    pub fn new(color: HexColor, emissive: HexColor, emissive_intensity: f32, metalness: f32) -> Self {
        let mut props = Self {
            color,
            emissive,
            ..Self::default()
        };
        props.set_emissive_intensity(emissive_intensity);
        props.set_metalness(metalness);
        props
    }

    pub fn emissive_intensity(&self) -> f32 {
        self.emissive_intensity
    }

    pub fn metalness(&self) -> f32 {
        self.metalness
    }

    pub fn set_emissive_intensity(&mut self, value: f32) {
        self.emissive_intensity = value.clamp(0.0, 1.0);
    }

    pub fn set_metalness(&mut self, value: f32) {
        self.metalness = value.clamp(0.0, 1.0);
    }
}

pub fn clamp_light_intensity(value: f32) -> f32 {
    value.clamp(0.0, MAX_LIGHT_INTENSITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_scale_follows_handle() {
        let s = Vec3::new(2.0, 3.0, 4.0);
        assert_eq!(uniform_scale(s, ScaleHandle::X), Vec3::splat(2.0));
        assert_eq!(uniform_scale(s, ScaleHandle::XY), Vec3::splat(2.0));
        assert_eq!(uniform_scale(s, ScaleHandle::Y), Vec3::splat(3.0));
        assert_eq!(uniform_scale(s, ScaleHandle::YZ), Vec3::splat(3.0));
        assert_eq!(uniform_scale(s, ScaleHandle::Z), Vec3::splat(4.0));
        assert_eq!(uniform_scale(s, ScaleHandle::XZ), Vec3::splat(2.0));
        assert_eq!(uniform_scale(s, ScaleHandle::Uniform), s);
    }

    #[test]
    fn test_picking_and_measuring_are_exclusive() {
        let mut editor = EditorState::default();
        assert_eq!(editor.toggle_picking().message, "Face picking is enabled");
        assert_eq!(editor.mode(), InteractionMode::Picking);

        editor.toggle_measuring();
        assert_eq!(editor.mode(), InteractionMode::Measuring);

        assert_eq!(
            editor.toggle_measuring().message,
            "Distance measurement mode is disabled"
        );
        assert_eq!(editor.mode(), InteractionMode::Orbit);
    }

    #[test]
    fn test_pick_highlight_restores_color() {
        let mut pick = PickHighlight::default();
        let changes = pick.hover(Some((1u32, HexColor(0x12_34_56))));
        assert_eq!(changes, vec![Tint { mesh: 1, color: PICK_COLOR }]);

        assert!(pick.hover(Some((1, PICK_COLOR))).is_empty());

        let changes = pick.hover(Some((2, HexColor::WHITE)));
        assert_eq!(
            changes,
            vec![
                Tint { mesh: 1, color: HexColor(0x12_34_56) },
                Tint { mesh: 2, color: PICK_COLOR },
            ]
        );

        let changes = pick.hover(None);
        assert_eq!(changes, vec![Tint { mesh: 2, color: HexColor::WHITE }]);
        assert_eq!(pick.current(), None);
    }

    #[test]
    fn test_selection_toggle() {
        let mut sel = Selection::default();
        assert!(sel.toggle(7u64));
        assert!(sel.is_selected(7));
        assert!(!sel.toggle(7));
        assert!(sel.is_empty());
    }

    #[test]
    fn test_material_clamps() {
        let mut m = MaterialProperties::new(HexColor::WHITE, HexColor(0), 3.0, -1.0);
        assert_eq!(m.emissive_intensity(), 1.0);
        assert_eq!(m.metalness(), 0.0);
        m.set_metalness(0.4);
        assert_eq!(m.metalness(), 0.4);
        assert_eq!(clamp_light_intensity(12.0), 10.0);
    }
}
