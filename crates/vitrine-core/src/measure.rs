//! Distance measurement
//!
//! Consecutive picked points are joined into segments. Each segment carries
//! its length label, the label position and tick marks every tenth of a unit.

use glam::Vec3;

/// Distance between tick marks along a segment
pub const TICK_SPACING: f32 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct RulerSegment {
    pub from: Vec3,
    pub to: Vec3,
    pub length: f32,
    pub midpoint: Vec3,
    /// Length with two decimals
    pub label: String,
    pub ticks: Vec<Vec3>,
}

impl RulerSegment {
    pub fn between(from: Vec3, to: Vec3) -> Self {
        let length = from.distance(to);
        let direction = (to - from).normalize_or_zero();
        let count = (length / TICK_SPACING + 1e-4).floor() as usize;
        let ticks = (0..=count)
            .map(|i| from + direction * (i as f32 * TICK_SPACING))
            .collect();
        Self {
            from,
            to,
            length,
            midpoint: from.lerp(to, 0.5),
            label: format!("{:.2}", length),
            ticks,
        }
    }
}

/// Marker sizes, proportional to the model's largest extent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RulerStyle {
    pub marker_radius: f32,
    pub tick_size: f32,
    pub label_size: f32,
}

impl RulerStyle {
    pub fn for_grid(grid_size: f32) -> Self {
        Self {
            marker_radius: grid_size / 150.0,
            tick_size: grid_size / 400.0,
            label_size: grid_size / 200.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ruler {
    points: Vec<Vec3>,
    segments: Vec<RulerSegment>,
}

impl Ruler {
    /// Add a picked point; returns the new segment once there are two points
    pub fn add_point(&mut self, point: Vec3) -> Option<&RulerSegment> {
        let previous = self.points.last().copied();
        self.points.push(point);
        let from = previous?;
        self.segments.push(RulerSegment::between(from, point));
        self.segments.last()
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn segments(&self) -> &[RulerSegment] {
        &self.segments
    }

    pub fn total_length(&self) -> f32 {
        self.segments.iter().map(|s| s.length).sum()
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.segments.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
