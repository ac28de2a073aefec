//! Axis-aligned clipping planes
//!
//! Three planes, one per axis, each keeping the part of the model on the
//! negative side of its normal. A plane's constant is measured from the
//! model's bounding-box center and is always bounded by the half-extent on
//! its axis, so the full slider range sweeps exactly across the model.

use glam::Vec3;
use std::ops::RangeInclusive;

use crate::bounds::Aabb;
use crate::view_state::HexColor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClipAxis {
    X,
    Y,
    Z,
}

impl ClipAxis {
    pub const ALL: [ClipAxis; 3] = [ClipAxis::X, ClipAxis::Y, ClipAxis::Z];

    pub fn index(&self) -> usize {
        match self {
            ClipAxis::X => 0,
            ClipAxis::Y => 1,
            ClipAxis::Z => 2,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ClipAxis::X => "X",
            ClipAxis::Y => "Y",
            ClipAxis::Z => "Z",
        }
    }

    /// Plane normal; points towards the clipped-away side's opposite
    pub fn normal(&self) -> Vec3 {
        match self {
            ClipAxis::X => Vec3::NEG_X,
            ClipAxis::Y => Vec3::NEG_Y,
            ClipAxis::Z => Vec3::NEG_Z,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClippingPlane {
    pub axis: ClipAxis,
    constant: f32,
    bound: f32,
    /// Box center along the axis
    origin: f32,
    step: f32,
    pub helper_visible: bool,
    pub gizmo_attached: bool,
}

impl ClippingPlane {
    fn new(axis: ClipAxis, bounds: &Aabb) -> Self {
        let mut plane = Self {
            axis,
            constant: 0.0,
            bound: 0.0,
            origin: 0.0,
            step: 0.0,
            helper_visible: false,
            gizmo_attached: false,
        };
        plane.fit(bounds);
        plane.constant = plane.bound;
        plane
    }

    fn fit(&mut self, bounds: &Aabb) {
        let i = self.axis.index();
        self.bound = bounds.half_extent()[i];
        self.origin = bounds.center()[i];
        self.step = bounds.size()[i] / 100.0;
    }

    pub fn constant(&self) -> f32 {
        self.constant
    }

    /// Half-extent of the model along this plane's axis
    pub fn bound(&self) -> f32 {
        self.bound
    }

    pub fn range(&self) -> RangeInclusive<f32> {
        -self.bound..=self.bound
    }

    /// Slider increment, a hundredth of the extent
    pub fn step(&self) -> f32 {
        self.step
    }

    pub fn normal(&self) -> Vec3 {
        self.axis.normal()
    }

    /// Constant of the world-space plane `normal · p + w = 0`
    pub fn world_constant(&self) -> f32 {
        self.origin + self.constant
    }

    /// Point on the plane closest to the box center, where the helper sits
    pub fn helper_position(&self, bounds: &Aabb) -> Vec3 {
        let mut p = bounds.center();
        p[self.axis.index()] = self.world_constant();
        p
    }

    /// Whether `point` survives this plane
    pub fn keeps(&self, point: Vec3) -> bool {
        self.normal().dot(point) + self.world_constant() >= 0.0
    }

    fn is_open(&self) -> bool {
        self.constant >= self.bound
    }
}

/// What a display toggle changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipToggle {
    pub axis: ClipAxis,
    pub helper_visible: bool,
    pub gizmo_attached: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClippingPlaneSet {
    planes: [ClippingPlane; 3],
    helper_size: f32,
    helper_color: HexColor,
}

impl ClippingPlaneSet {
    /// Planes fitted to `bounds`, fully open, helpers hidden
    pub fn new(bounds: &Aabb, background: HexColor) -> Self {
        Self {
            planes: ClipAxis::ALL.map(|axis| ClippingPlane::new(axis, bounds)),
            helper_size: bounds.max_extent() * 2.0,
            helper_color: background.inverted(),
        }
    }

    pub fn plane(&self, axis: ClipAxis) -> &ClippingPlane {
        &self.planes[axis.index()]
    }

    pub fn planes(&self) -> &[ClippingPlane; 3] {
        &self.planes
    }

    pub fn helper_size(&self) -> f32 {
        self.helper_size
    }

    pub fn helper_color(&self) -> HexColor {
        self.helper_color
    }

    pub fn set_background(&mut self, background: HexColor) {
        self.helper_color = background.inverted();
    }

    /// Move a plane; the value is clamped to its bound. Returns the applied value.
    pub fn set_constant(&mut self, axis: ClipAxis, value: f32) -> f32 {
        let plane = &mut self.planes[axis.index()];
        plane.constant = value.clamp(-plane.bound, plane.bound);
        plane.constant
    }

    /// Show or hide one plane's helper together with its move gizmo
    pub fn set_helper_visible(&mut self, axis: ClipAxis, visible: bool) -> ClipToggle {
        let plane = &mut self.planes[axis.index()];
        plane.helper_visible = visible;
        plane.gizmo_attached = visible;
        ClipToggle {
            axis,
            helper_visible: plane.helper_visible,
            gizmo_attached: plane.gizmo_attached,
        }
    }

    /// Refit after the model's bounds changed (e.g. a scale edit).
    /// Open planes stay open; others are clamped to the new bound.
    pub fn rebound(&mut self, bounds: &Aabb) {
        for plane in &mut self.planes {
            let was_open = plane.is_open();
            plane.fit(bounds);
            plane.constant = if was_open {
                plane.bound
            } else {
                plane.constant.clamp(-plane.bound, plane.bound)
            };
        }
        self.helper_size = bounds.max_extent() * 2.0;
    }

    pub fn keeps(&self, point: Vec3) -> bool {
        self.planes.iter().all(|p| p.keeps(point))
    }

    pub fn any_active(&self) -> bool {
        self.planes.iter().any(|p| !p.is_open())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> Aabb {
        Aabb::new(Vec3::new(-2.0, 0.0, -1.0), Vec3::new(2.0, 6.0, 1.0))
    }

    #[test]
    fn test_planes_start_open() {
        let set = ClippingPlaneSet::new(&model(), HexColor::WHITE);
        assert_eq!(set.plane(ClipAxis::X).constant(), 2.0);
        assert_eq!(set.plane(ClipAxis::Y).constant(), 3.0);
        assert_eq!(set.plane(ClipAxis::Z).constant(), 1.0);
        assert!(!set.any_active());
        assert!(set.keeps(Vec3::new(2.0, 6.0, 1.0)));
        assert_eq!(set.helper_size(), 12.0);
        assert_eq!(set.helper_color(), HexColor(0));
        assert!((set.plane(ClipAxis::Y).step() - 0.06).abs() < 1e-6);
    }

    #[test]
    fn test_constant_clamped_to_half_extent() {
        let mut set = ClippingPlaneSet::new(&model(), HexColor::WHITE);
        assert_eq!(set.set_constant(ClipAxis::Y, 10.0), 3.0);
        assert_eq!(set.set_constant(ClipAxis::Y, -10.0), -3.0);
        assert_eq!(set.set_constant(ClipAxis::X, 0.5), 0.5);
    }

    #[test]
    fn test_clipping_cuts_model() {
        let mut set = ClippingPlaneSet::new(&model(), HexColor::WHITE);
        set.set_constant(ClipAxis::Y, 0.0);
        // Y plane sits at the box center (y = 3)
        assert!(set.keeps(Vec3::new(0.0, 2.9, 0.0)));
        assert!(!set.keeps(Vec3::new(0.0, 3.1, 0.0)));
        assert_eq!(set.plane(ClipAxis::Y).helper_position(&model()).y, 3.0);
        assert!(set.any_active());
    }

    #[test]
    fn test_toggle_affects_one_plane() {
        let mut set = ClippingPlaneSet::new(&model(), HexColor::WHITE);
        let change = set.set_helper_visible(ClipAxis::Y, true);
        assert_eq!(
            change,
            ClipToggle {
                axis: ClipAxis::Y,
                helper_visible: true,
                gizmo_attached: true
            }
        );
        assert!(!set.plane(ClipAxis::X).helper_visible);
        assert!(!set.plane(ClipAxis::Z).helper_visible);
        assert!(!set.plane(ClipAxis::X).gizmo_attached);

        let attached = set.planes().iter().filter(|p| p.gizmo_attached).count();
        assert_eq!(attached, 1);

        set.set_helper_visible(ClipAxis::Y, false);
        assert!(set.planes().iter().all(|p| !p.gizmo_attached && !p.helper_visible));
    }

    #[test]
    fn test_rebound_after_scale() {
        let mut set = ClippingPlaneSet::new(&model(), HexColor::WHITE);
        set.set_constant(ClipAxis::X, 1.5);

        let smaller = Aabb::new(Vec3::new(-1.0, 0.0, -0.5), Vec3::new(1.0, 3.0, 0.5));
        set.rebound(&smaller);
        assert_eq!(set.plane(ClipAxis::X).constant(), 1.0);
        assert_eq!(set.plane(ClipAxis::Y).constant(), 1.5);
        assert_eq!(set.plane(ClipAxis::Y).bound(), 1.5);
        assert_eq!(set.helper_size(), 6.0);
    }
}
