//! Camera framing
//!
//! Fits a perspective camera to a bounding box and describes the pull-in
//! animation towards the resting position. Distances follow from simple
//! trigonometry: half the box size over the tangent of half the field of view,
//! plus the half depth of the box protruding towards the camera.

use glam::Vec3;
use std::time::Duration;

use crate::bounds::Aabb;
use crate::view_state::HexColor;

pub const DEFAULT_FOV_DEGREES: f32 = 45.0;
pub const NEAR_PLANE: f32 = 0.001;
pub const FAR_PLANE: f32 = 999_000_000.0;

/// Distance multiplier for a fresh load, keeps the model off the canvas edges
pub const FRESH_OFFSET: f32 = 3.5;
/// The animation starts at this fraction of the framing distance
pub const PULL_START_FACTOR: f32 = 0.55;
pub const FRAMING_DURATION: Duration = Duration::from_millis(1500);

/// Resting camera position relative to the box size on a fresh load
const FRESH_POSITION_SCALE: Vec3 = Vec3::new(1.0, 1.4, 1.5);

/// Perspective camera parameters relevant for framing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Perspective {
    /// Vertical field of view in degrees
    pub fov_y_degrees: f32,
    /// Width over height
    pub aspect: f32,
}

impl Default for Perspective {
    fn default() -> Self {
        Self {
            fov_y_degrees: DEFAULT_FOV_DEGREES,
            aspect: 1.0,
        }
    }
}

impl Perspective {
    pub fn new(fov_y_degrees: f32, aspect: f32) -> Self {
        Self {
            fov_y_degrees,
            aspect,
        }
    }

    pub fn fov_y(&self) -> f32 {
        self.fov_y_degrees.to_radians()
    }

    /// Effective horizontal field of view in radians
    pub fn fov_x(&self) -> f32 {
        2.0 * ((self.fov_y() / 2.0).tan() * self.aspect).atan()
    }
}

/// Candidate camera distances for a box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramingDistances {
    /// Distance that fits the box width into the horizontal field of view
    pub horizontal: f32,
    /// Distance that fits the box height into the vertical field of view
    pub vertical: f32,
}

impl FramingDistances {
    pub fn fit(&self) -> f32 {
        self.horizontal.max(self.vertical)
    }
}

pub fn framing_distances(size: Vec3, perspective: &Perspective) -> FramingDistances {
    let half_depth = size.z / 2.0;
    let horizontal = half_depth + (size.x / 2.0 / (perspective.fov_x() / 2.0).tan()).abs();
    let vertical = half_depth + (size.y / 2.0 / (perspective.fov_y() / 2.0).tan()).abs();
    FramingDistances {
        horizontal,
        vertical,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FramingMode {
    /// No saved state: derive the camera from the box
    Fresh { offset: Option<f32> },
    /// Saved camera transform, used as is
    Restore { camera: Vec3, target: Vec3 },
}

/// Time-driven interpolation of the camera along its view axis.
///
/// Only `z` moves; `x` and `y` are held at the start values for the whole
/// animation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraTween {
    start: Vec3,
    end_z: f32,
    duration: Duration,
    elapsed: Duration,
}

impl CameraTween {
    pub fn new(start: Vec3, end_z: f32, duration: Duration) -> Self {
        Self {
            start,
            end_z,
            duration,
            elapsed: Duration::ZERO,
        }
    }

    pub fn progress(&self) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (self.elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0)
    }

    pub fn position(&self) -> Vec3 {
        let t = self.progress();
        Vec3::new(
            self.start.x,
            self.start.y,
            self.start.z + (self.end_z - self.start.z) * t,
        )
    }

    pub fn start(&self) -> Vec3 {
        self.start
    }

    pub fn end(&self) -> Vec3 {
        Vec3::new(self.start.x, self.start.y, self.end_z)
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.duration
    }

    /// Advance by wall-clock time and return the new camera position
    pub fn advance(&mut self, dt: Duration) -> Vec3 {
        self.elapsed = (self.elapsed + dt).min(self.duration);
        self.position()
    }
}

/// Result of framing a box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Framing {
    pub distances: FramingDistances,
    /// Orbit target
    pub target: Vec3,
    pub tween: CameraTween,
    pub restored: bool,
}

pub fn frame(bounds: &Aabb, perspective: &Perspective, mode: FramingMode) -> Framing {
    let size = bounds.size();
    let distances = framing_distances(size, perspective);

    match mode {
        FramingMode::Fresh { offset } => {
            let rest = size * FRESH_POSITION_SCALE;
            let mut distance = distances.fit();
            if let Some(offset) = offset.filter(|o| *o != 0.0) {
                distance *= offset;
            }
            let start = Vec3::new(rest.x, rest.y, distance * PULL_START_FACTOR);
            Framing {
                distances,
                target: Vec3::ZERO,
                tween: CameraTween::new(start, rest.z, FRAMING_DURATION),
                restored: false,
            }
        }
        FramingMode::Restore { camera, target } => {
            let start = Vec3::new(camera.x, camera.y, camera.z * PULL_START_FACTOR);
            Framing {
                distances,
                target,
                tween: CameraTween::new(start, camera.z, FRAMING_DURATION),
                restored: true,
            }
        }
    }
}

/// Sizes of the helper objects placed around a framed model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneHelpers {
    /// Largest bounding-box edge
    pub grid_size: f32,
    /// Edge length of the ground plane and the grid
    pub ground_size: f32,
    pub ground_color: HexColor,
    pub ground_opacity: f32,
    pub grid_divisions: u32,
    pub grid_opacity: f32,
    pub axes_length: f32,
    pub light_helper_size: f32,
    pub light_helper_visible: bool,
    pub light_target: Vec3,
}

impl SceneHelpers {
    pub fn for_bounds(bounds: &Aabb) -> Self {
        let grid_size = bounds.max_extent();
        Self {
            grid_size,
            ground_size: grid_size * 1.5,
            ground_color: HexColor(0x99_99_99),
            ground_opacity: 0.85,
            grid_divisions: 80,
            grid_opacity: 0.2,
            axes_length: grid_size,
            light_helper_size: grid_size,
            light_helper_visible: false,
            light_target: Vec3::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_distances_evaluate_both_axes() {
        let d = framing_distances(Vec3::new(10.0, 6.0, 4.0), &Perspective::new(45.0, 1.5));
        assert!(approx(d.horizontal, 10.047), "horizontal = {}", d.horizontal);
        assert!(approx(d.vertical, 9.243), "vertical = {}", d.vertical);
        assert_eq!(d.fit(), d.horizontal);

        // Tall box flips the winner
        let d = framing_distances(Vec3::new(1.0, 10.0, 1.0), &Perspective::new(45.0, 1.5));
        assert_eq!(d.fit(), d.vertical);
        assert!(d.horizontal > 0.0);
    }

    #[test]
    fn test_fov_x_matches_aspect_one() {
        let p = Perspective::new(60.0, 1.0);
        assert!(approx(p.fov_x(), p.fov_y()));
    }

    #[test]
    fn test_fresh_framing() {
        let bounds = Aabb::new(Vec3::new(-5.0, 0.0, -2.0), Vec3::new(5.0, 6.0, 2.0));
        let f = frame(
            &bounds,
            &Perspective::new(45.0, 1.5),
            FramingMode::Fresh {
                offset: Some(FRESH_OFFSET),
            },
        );
        let start = f.tween.start();
        assert!(approx(start.z, f.distances.fit() * FRESH_OFFSET * PULL_START_FACTOR));
        assert!(approx(start.y, 6.0 * 1.4));
        assert!(approx(f.tween.end().z, 4.0 * 1.5));
        assert_eq!(f.target, Vec3::ZERO);
    }

    #[test]
    fn test_zero_offset_is_ignored() {
        let bounds = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let f = frame(&bounds, &Perspective::default(), FramingMode::Fresh { offset: Some(0.0) });
        assert!(approx(f.tween.start().z, f.distances.fit() * PULL_START_FACTOR));
    }

    #[test]
    fn test_restore_keeps_saved_camera() {
        let bounds = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let camera = Vec3::new(3.0, 2.0, 10.0);
        let target = Vec3::new(0.0, 0.5, 0.0);
        let f = frame(&bounds, &Perspective::default(), FramingMode::Restore { camera, target });
        assert!(f.restored);
        assert_eq!(f.target, target);
        assert_eq!(f.tween.end(), camera);
        assert_eq!(f.tween.start(), Vec3::new(3.0, 2.0, 5.5));
    }

    #[test]
    fn test_tween_is_time_driven() {
        let mut tween = CameraTween::new(Vec3::new(1.0, 2.0, 0.0), 10.0, FRAMING_DURATION);
        let p = tween.advance(Duration::from_millis(750));
        assert_eq!(p, Vec3::new(1.0, 2.0, 5.0));
        assert!(!tween.is_finished());

        // Few long frames land on the same spot as many short ones
        let mut coarse = CameraTween::new(Vec3::ZERO, 10.0, FRAMING_DURATION);
        let mut fine = CameraTween::new(Vec3::ZERO, 10.0, FRAMING_DURATION);
        coarse.advance(Duration::from_millis(600));
        for _ in 0..60 {
            fine.advance(Duration::from_millis(10));
        }
        assert!(approx(coarse.position().z, fine.position().z));

        let end = tween.advance(Duration::from_secs(5));
        assert_eq!(end, Vec3::new(1.0, 2.0, 10.0));
        assert!(tween.is_finished());
    }

    #[test]
    fn test_helpers_scale_with_largest_extent() {
        let bounds = Aabb::new(Vec3::ZERO, Vec3::new(2.0, 8.0, 4.0));
        let h = SceneHelpers::for_bounds(&bounds);
        assert_eq!(h.grid_size, 8.0);
        assert_eq!(h.ground_size, 12.0);
        assert_eq!(h.axes_length, 8.0);
        assert!(!h.light_helper_visible);
    }
}
