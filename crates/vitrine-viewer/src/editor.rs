//! Face picking, hierarchy selection and the material editor

use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use bevy_egui::EguiContexts;
use bevy_picking::mesh_picking::ray_cast::{MeshRayCast, MeshRayCastSettings};

use vitrine_core::editor::{
    InteractionMode, MaterialProperties, PickHighlight, Selection, Tint, SELECT_COLOR,
};
use vitrine_scene::camera::MainCamera;
use vitrine_scene::types::{from_color, to_color, ModelMesh, Session};

/// Color a model mesh had before any highlight
#[derive(Component, Debug, Clone, Copy)]
pub struct MeshTint {
    pub original: Color,
}

/// Highlight bookkeeping and the mesh open in the material editor
#[derive(Resource, Default)]
pub struct Highlights {
    pub pick: PickHighlight<Entity>,
    pub selection: Selection<Entity>,
    pub edited: Option<(Entity, MaterialProperties)>,
}

pub struct EditorPlugin;

impl Plugin for EditorPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<Highlights>()
            .add_systems(Update, (hover_pick, pick_for_editing));
    }
}

/// First model mesh under the cursor and the hit point
pub fn cursor_hit(
    ray_cast: &mut MeshRayCast,
    camera: &Camera,
    camera_transform: &GlobalTransform,
    cursor: Vec2,
    is_model: &dyn Fn(Entity) -> bool,
) -> Option<(Entity, Vec3)> {
    let ray = camera.viewport_to_world(camera_transform, cursor).ok()?;
    let settings = MeshRayCastSettings::default().with_filter(&is_model);
    ray_cast
        .cast_ray(ray, &settings)
        .first()
        .map(|(entity, hit)| (*entity, hit.point))
}

/// Current base color of a mesh's own material
fn base_color(
    entity: Entity,
    handles: &Query<&MeshMaterial3d<StandardMaterial>, With<ModelMesh>>,
    materials: &Assets<StandardMaterial>,
) -> Option<Color> {
    let handle = handles.get(entity).ok()?;
    materials.get(&handle.0).map(|m| m.base_color)
}

pub fn set_base_color(
    entity: Entity,
    color: Color,
    handles: &Query<&MeshMaterial3d<StandardMaterial>, With<ModelMesh>>,
    materials: &mut Assets<StandardMaterial>,
) {
    if let Ok(handle) = handles.get(entity) {
        if let Some(material) = materials.get_mut(&handle.0) {
            material.base_color = color;
        }
    }
}

fn apply_tints(
    tints: Vec<Tint<Entity>>,
    handles: &Query<&MeshMaterial3d<StandardMaterial>, With<ModelMesh>>,
    materials: &mut Assets<StandardMaterial>,
) {
    for tint in tints {
        set_base_color(tint.mesh, to_color(tint.color), handles, materials);
    }
}

/// Tint the mesh under the cursor while face picking is on
fn hover_pick(
    session: Res<Session>,
    mut highlights: ResMut<Highlights>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&Camera, &GlobalTransform), With<MainCamera>>,
    model_meshes: Query<(), With<ModelMesh>>,
    handles: Query<&MeshMaterial3d<StandardMaterial>, With<ModelMesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut ray_cast: MeshRayCast,
    mut contexts: EguiContexts,
) {
    if session.editor.mode() != InteractionMode::Picking {
        if highlights.pick.current().is_some() {
            let tints = highlights.pick.hover(None);
            apply_tints(tints, &handles, &mut materials);
        }
        return;
    }
    let Ok(ctx) = contexts.ctx_mut() else { return };
    if ctx.wants_pointer_input() || ctx.is_pointer_over_area() {
        return;
    }
    let (Ok(window), Ok((camera, camera_transform))) = (windows.single(), cameras.single()) else {
        return;
    };

    let hit = window.cursor_position().and_then(|cursor| {
        cursor_hit(&mut ray_cast, camera, camera_transform, cursor, &|e| {
            model_meshes.contains(e)
        })
    });
    let hovered = hit.and_then(|(entity, _)| {
        base_color(entity, &handles, &materials).map(|color| (entity, from_color(color)))
    });

    if hovered.map(|(e, _)| e) == highlights.pick.current() {
        return;
    }
    let tints = highlights.pick.hover(hovered);
    apply_tints(tints, &handles, &mut materials);
}

/// A click while picking opens the mesh in the material editor
fn pick_for_editing(
    session: Res<Session>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    mut highlights: ResMut<Highlights>,
    tints: Query<&MeshTint>,
    handles: Query<&MeshMaterial3d<StandardMaterial>, With<ModelMesh>>,
    materials: Res<Assets<StandardMaterial>>,
) {
    if session.editor.mode() != InteractionMode::Picking || !mouse_button.just_pressed(MouseButton::Left) {
        return;
    }
    let Some(entity) = highlights.pick.current() else {
        return;
    };
    let Some(material) = handles.get(entity).ok().and_then(|h| materials.get(&h.0)) else {
        return;
    };
    let original = tints.get(entity).ok().map(|t| t.original);
    highlights.edited = Some((entity, material_properties(original, material)));
}

/// Editable properties of a material, starting from the unhighlighted color
pub fn material_properties(original: Option<Color>, material: &StandardMaterial) -> MaterialProperties {
    let color = original.unwrap_or(material.base_color);
    let emissive = Color::from(material.emissive);
    let intensity = if material.emissive == LinearRgba::BLACK { 0.0 } else { 1.0 };
    MaterialProperties::new(from_color(color), from_color(emissive), intensity, material.metallic)
}

/// Write edited properties into the mesh's material
pub fn apply_material(
    entity: Entity,
    props: &MaterialProperties,
    tints: &mut Query<&mut MeshTint>,
    handles: &Query<&MeshMaterial3d<StandardMaterial>, With<ModelMesh>>,
    materials: &mut Assets<StandardMaterial>,
    highlighted: bool,
) {
    let color = to_color(props.color);
    if let Ok(mut tint) = tints.get_mut(entity) {
        tint.original = color;
    }
    let Ok(handle) = handles.get(entity) else {
        return;
    };
    let Some(material) = materials.get_mut(&handle.0) else {
        return;
    };
    if !highlighted {
        material.base_color = color;
    }
    material.emissive = LinearRgba::from(to_color(props.emissive)) * props.emissive_intensity();
    material.metallic = props.metalness();
}

/// Flip a mesh's hierarchy highlight
pub fn toggle_selection(
    entity: Entity,
    highlights: &mut Highlights,
    tints: &Query<&mut MeshTint>,
    handles: &Query<&MeshMaterial3d<StandardMaterial>, With<ModelMesh>>,
    materials: &mut Assets<StandardMaterial>,
) {
    let color = if highlights.selection.toggle(entity) {
        to_color(SELECT_COLOR)
    } else {
        match tints.get(entity) {
            Ok(tint) => tint.original,
            Err(_) => return,
        }
    };
    set_base_color(entity, color, handles, materials);
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrine_core::view_state::HexColor;

    #[test]
    fn test_material_properties_ignore_highlight() {
        let material = StandardMaterial {
            base_color: to_color(SELECT_COLOR),
            metallic: 0.7,
            ..default()
        };
        let props = material_properties(Some(to_color(HexColor(0x33_66_99))), &material);
        assert_eq!(props.color, HexColor(0x33_66_99));
        assert_eq!(props.emissive_intensity(), 0.0);
        assert!((props.metalness() - 0.7).abs() < 1e-6);

        let props = material_properties(None, &material);
        assert_eq!(props.color, SELECT_COLOR);
    }
}
