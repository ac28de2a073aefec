//! Camera framing animation and orbit navigation

use bevy::input::mouse::{AccumulatedMouseMotion, AccumulatedMouseScroll, MouseScrollUnit};
use bevy::prelude::*;
use bevy_egui::EguiContexts;

use vitrine_core::framing::{CameraTween, DEFAULT_FOV_DEGREES, FAR_PLANE, NEAR_PLANE};

/// Marker component for the main camera
#[derive(Component)]
pub struct MainCamera;

/// Point light that rides along with the camera
#[derive(Component)]
pub struct CameraLight;

/// Orbit controller settings
#[derive(Debug, Clone, Resource)]
pub struct OrbitSettings {
    pub target: Vec3,
    pub sensitivity: f32,
    pub zoom_speed: f32,
    /// Turned off while a gizmo drag or a pick owns the pointer
    pub enabled: bool,
}

impl Default for OrbitSettings {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            sensitivity: 0.005,
            zoom_speed: 0.1,
            enabled: true,
        }
    }
}

/// Pull-in animation towards the framed camera position
#[derive(Debug, Clone, Resource, Default)]
pub struct CameraFraming {
    pub tween: Option<CameraTween>,
}

impl CameraFraming {
    pub fn start(&mut self, tween: CameraTween) {
        self.tween = Some(tween);
    }

    pub fn is_animating(&self) -> bool {
        self.tween.is_some()
    }
}

/// Plugin for camera controls
pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<OrbitSettings>()
            .init_resource::<CameraFraming>()
            .add_systems(Startup, spawn_camera)
            .add_systems(
                Update,
                (animate_framing, orbit_camera, follow_camera_light).chain(),
            );
    }
}

fn spawn_camera(mut commands: Commands) {
    commands.spawn((
        Camera3d::default(),
        Projection::Perspective(PerspectiveProjection {
            fov: DEFAULT_FOV_DEGREES.to_radians(),
            near: NEAR_PLANE,
            far: FAR_PLANE,
            ..default()
        }),
        Transform::from_xyz(0.0, 0.0, 10.0).looking_at(Vec3::ZERO, Vec3::Y),
        MainCamera,
    ));

    commands.spawn((
        PointLight {
            shadows_enabled: false,
            ..default()
        },
        Transform::from_xyz(0.0, 0.0, 10.0),
        CameraLight,
    ));
}

/// Advance the framing tween by wall-clock time
fn animate_framing(
    time: Res<Time>,
    orbit: Res<OrbitSettings>,
    mut framing: ResMut<CameraFraming>,
    mut cameras: Query<&mut Transform, With<MainCamera>>,
) {
    let Some(tween) = framing.tween.as_mut() else {
        return;
    };
    let position = tween.advance(time.delta());
    let finished = tween.is_finished();

    if let Ok(mut transform) = cameras.single_mut() {
        transform.translation = position;
        transform.look_at(orbit.target, Vec3::Y);
    }
    if finished {
        framing.tween = None;
    }
}

fn orbit_camera(
    mut cameras: Query<&mut Transform, With<MainCamera>>,
    mut orbit: ResMut<OrbitSettings>,
    framing: Res<CameraFraming>,
    motion: Res<AccumulatedMouseMotion>,
    scroll: Res<AccumulatedMouseScroll>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    mut contexts: EguiContexts,
) {
    if framing.is_animating() || !orbit.enabled {
        return;
    }
    let Ok(ctx) = contexts.ctx_mut() else { return };
    if ctx.wants_pointer_input() || ctx.is_pointer_over_area() {
        return;
    }
    let Ok(mut transform) = cameras.single_mut() else {
        return;
    };

    let offset = transform.translation - orbit.target;
    let mut radius = offset.length().max(NEAR_PLANE);
    let mut yaw = offset.x.atan2(offset.z);
    let mut pitch = (offset.y / radius).clamp(-1.0, 1.0).asin();

    if mouse_button.pressed(MouseButton::Left) {
        yaw -= motion.delta.x * orbit.sensitivity;
        pitch = (pitch + motion.delta.y * orbit.sensitivity).clamp(-1.5, 1.5);
    }

    if mouse_button.pressed(MouseButton::Right) {
        let pan_speed = radius * 0.002;
        let right = transform.right().as_vec3();
        let up = transform.up().as_vec3();
        orbit.target += (-right * motion.delta.x + up * motion.delta.y) * pan_speed;
    }

    if scroll.delta.y != 0.0 {
        radius = (radius * zoom_factor(scroll.delta.y, scroll.unit, orbit.zoom_speed)).max(NEAR_PLANE);
    }

    let direction = Vec3::new(
        pitch.cos() * yaw.sin(),
        pitch.sin(),
        pitch.cos() * yaw.cos(),
    );
    transform.translation = orbit.target + direction * radius;
    transform.look_at(orbit.target, Vec3::Y);
}

/// Browsers report wheel deltas in pixels, roughly this many per notch
const PIXELS_PER_LINE: f32 = 100.0;

/// Radius multiplier for one frame of scrolling. Always positive, so the
/// camera never crosses the orbit target however large the delta.
pub fn zoom_factor(delta: f32, unit: MouseScrollUnit, zoom_speed: f32) -> f32 {
    let lines = match unit {
        MouseScrollUnit::Line => delta,
        MouseScrollUnit::Pixel => delta / PIXELS_PER_LINE,
    };
    (1.0 - lines * zoom_speed).clamp(0.5, 1.5)
}

fn follow_camera_light(
    cameras: Query<&Transform, (With<MainCamera>, Without<CameraLight>)>,
    mut lights: Query<&mut Transform, With<CameraLight>>,
) {
    let Ok(camera) = cameras.single() else {
        return;
    };
    for mut light in &mut lights {
        light.translation = camera.translation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_factor_per_notch() {
        let speed = OrbitSettings::default().zoom_speed;
        assert!((zoom_factor(1.0, MouseScrollUnit::Line, speed) - 0.9).abs() < 1e-6);
        assert!((zoom_factor(-1.0, MouseScrollUnit::Line, speed) - 1.1).abs() < 1e-6);
        assert!((zoom_factor(100.0, MouseScrollUnit::Pixel, speed) - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_zoom_factor_stays_positive_for_large_deltas() {
        let speed = OrbitSettings::default().zoom_speed;
        assert_eq!(zoom_factor(100.0, MouseScrollUnit::Line, speed), 0.5);
        assert_eq!(zoom_factor(5000.0, MouseScrollUnit::Pixel, speed), 0.5);
        assert_eq!(zoom_factor(-5000.0, MouseScrollUnit::Pixel, speed), 1.5);
        assert!(zoom_factor(f32::MAX, MouseScrollUnit::Line, speed) > 0.0);
    }
}
