//! Persisted view state
//!
//! A view-state record stores how a model was last presented: object
//! transform, camera, the three lights and the background. Every key is
//! optional and every value is written as an array (`[x, y, z]`,
//! `["#RRGGBB"]`, `[0.3]`) so records written by older viewers stay readable.

use glam::Vec3;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

use crate::scene::NodeTransform;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ColorError {
    #[error("Invalid color: {0}")]
    Invalid(String),
}

/// 24-bit RGB color, persisted as `#RRGGBB`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ColorRepr", into = "String")]
pub struct HexColor(pub u32);

#[derive(Deserialize)]
#[serde(untagged)]
enum ColorRepr {
    Text(String),
    Number(u32),
}

impl TryFrom<ColorRepr> for HexColor {
    type Error = ColorError;

    fn try_from(repr: ColorRepr) -> Result<Self, Self::Error> {
        match repr {
            ColorRepr::Text(s) => s.parse(),
            ColorRepr::Number(n) if n <= 0xFF_FF_FF => Ok(HexColor(n)),
            ColorRepr::Number(n) => Err(ColorError::Invalid(n.to_string())),
        }
    }
}

impl From<HexColor> for String {
    fn from(color: HexColor) -> Self {
        color.to_string()
    }
}

impl FromStr for HexColor {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix('#')
            .or_else(|| trimmed.strip_prefix("0x"))
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        let expanded: String = match digits.len() {
            3 => digits.chars().flat_map(|c| [c, c]).collect(),
            6 => digits.to_string(),
            _ => return Err(ColorError::Invalid(s.to_string())),
        };

        u32::from_str_radix(&expanded, 16)
            .map(HexColor)
            .map_err(|_| ColorError::Invalid(s.to_string()))
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06X}", self.0 & 0xFF_FF_FF)
    }
}

impl HexColor {
    pub const WHITE: HexColor = HexColor(0xFF_FF_FF);

    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        HexColor(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    /// Complementary color, used for helpers drawn over the background
    pub fn inverted(&self) -> Self {
        HexColor(!self.0 & 0xFF_FF_FF)
    }

    pub fn rgb(&self) -> [u8; 3] {
        [(self.0 >> 16) as u8, (self.0 >> 8) as u8, self.0 as u8]
    }

    /// sRGB components in `0.0..=1.0`
    pub fn rgb_f32(&self) -> [f32; 3] {
        let [r, g, b] = self.rgb();
        [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0]
    }
}

/// Serde adapter for values persisted as a one-element array.
/// Reads accept a bare value or an array of any length (first element wins).
mod single {
    use super::*;

    pub fn serialize<T: Serialize, S: Serializer>(
        value: &Option<T>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => [v].serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany<T> {
            Many(Vec<T>),
            One(T),
        }

        Ok(match OneOrMany::<T>::deserialize(deserializer)? {
            OneOrMany::Many(values) => values.into_iter().next(),
            OneOrMany::One(value) => Some(value),
        })
    }
}

/// One light's color and intensity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSettings {
    pub color: HexColor,
    pub intensity: f32,
}

/// Live lighting and background of the scene
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightingRig {
    pub directional: LightSettings,
    pub directional_position: Vec3,
    pub directional_target: Vec3,
    pub ambient: LightSettings,
    /// Point light that follows the camera
    pub camera: LightSettings,
    pub background: HexColor,
}

impl Default for LightingRig {
    fn default() -> Self {
        Self {
            directional: LightSettings {
                color: HexColor::WHITE,
                intensity: 1.0,
            },
            directional_position: Vec3::new(0.0, 100.0, 50.0),
            directional_target: Vec3::ZERO,
            ambient: LightSettings {
                color: HexColor(0x40_40_40),
                intensity: 1.0,
            },
            camera: LightSettings {
                color: HexColor::WHITE,
                intensity: 0.3,
            },
            background: HexColor::WHITE,
        }
    }
}

/// Snapshot of everything a save can persist
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveScene {
    pub object: NodeTransform,
    pub camera_position: Vec3,
    pub camera_target: Vec3,
    pub lighting: LightingRig,
}

/// Independently persisted property groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveGroup {
    Position,
    Rotation,
    Scale,
    Camera,
    DirectionalLight,
    AmbientLight,
    CameraLight,
    Background,
}

impl SaveGroup {
    pub const ALL: [SaveGroup; 8] = [
        SaveGroup::Position,
        SaveGroup::Rotation,
        SaveGroup::Scale,
        SaveGroup::Camera,
        SaveGroup::DirectionalLight,
        SaveGroup::AmbientLight,
        SaveGroup::CameraLight,
        SaveGroup::Background,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SaveGroup::Position => "Position",
            SaveGroup::Rotation => "Rotation",
            SaveGroup::Scale => "Scale",
            SaveGroup::Camera => "Camera",
            SaveGroup::DirectionalLight => "Directional light",
            SaveGroup::AmbientLight => "Ambient light",
            SaveGroup::CameraLight => "Camera light",
            SaveGroup::Background => "Background color",
        }
    }
}

/// Which groups a save writes from the live scene; all on by default
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveSelection {
    enabled: [bool; 8],
}

impl Default for SaveSelection {
    fn default() -> Self {
        Self { enabled: [true; 8] }
    }
}

impl SaveSelection {
    pub fn none() -> Self {
        Self { enabled: [false; 8] }
    }

    pub fn is_enabled(&self, group: SaveGroup) -> bool {
        self.enabled[Self::index(group)]
    }

    pub fn set(&mut self, group: SaveGroup, enabled: bool) {
        self.enabled[Self::index(group)] = enabled;
    }

    pub fn toggle_mut(&mut self, group: SaveGroup) -> &mut bool {
        &mut self.enabled[Self::index(group)]
    }

    fn index(group: SaveGroup) -> usize {
        SaveGroup::ALL.iter().position(|g| *g == group).unwrap_or(0)
    }
}

/// Object transform fields of a record; rotation is in degrees
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ObjectPose {
    pub position: Option<Vec3>,
    pub rotation_degrees: Option<Vec3>,
    pub scale: Option<Vec3>,
}

impl ObjectPose {
    pub fn is_empty(&self) -> bool {
        self.position.is_none() && self.rotation_degrees.is_none() && self.scale.is_none()
    }

    /// Overwrite the present fields of `base`, leaving the rest untouched
    pub fn apply_to(&self, base: NodeTransform) -> NodeTransform {
        let mut out = base;
        if let Some(p) = self.position {
            out.translation = p;
        }
        if let Some(r) = self.rotation_degrees {
            out.rotation = Vec3::new(r.x.to_radians(), r.y.to_radians(), r.z.to_radians());
        }
        if let Some(s) = self.scale {
            out.scale = s;
        }
        out
    }
}

/// Persisted view-state record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obj_position: Option<Vec3>,
    /// Degrees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obj_rotation: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obj_scale: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_position: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controls_target: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light_position: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light_target: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "single")]
    pub light_color: Option<HexColor>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "single")]
    pub light_intensity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "single")]
    pub light_ambient_color: Option<HexColor>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "single")]
    pub light_ambient_intensity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "single")]
    pub light_camera_color: Option<HexColor>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "single")]
    pub light_camera_intensity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "single")]
    pub background_color: Option<HexColor>,
}

impl ViewState {
    /// Parse a stored record field by field.
    ///
    /// A malformed field is dropped with a warning and the rest of the record
    /// is kept; only a body that is not a JSON object fails as a whole.
    pub fn from_json_lenient(body: &str) -> Result<Self, serde_json::Error> {
        let fields: Map<String, Value> = serde_json::from_str(body)?;
        let mut state = ViewState::default();
        for (key, value) in fields {
            let mut one = Map::new();
            one.insert(key.clone(), value);
            match serde_json::from_value::<ViewState>(Value::Object(one)) {
                Ok(field) => state.fill_missing(&field),
                Err(e) => warn!(field = %key, error = %e, "Ignoring malformed view-state field"),
            }
        }
        Ok(state)
    }

    /// Tab-indented JSON, the format the save endpoint stores verbatim
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Record holding every group of the live scene
    pub fn capture(live: &LiveScene) -> Self {
        Self::merge(live, None, &SaveSelection::default())
    }

    /// Build the record to save.
    ///
    /// Enabled groups take the live value. Disabled groups re-emit the
    /// previous record's fields unchanged, or are omitted when there is none.
    pub fn merge(live: &LiveScene, previous: Option<&ViewState>, selection: &SaveSelection) -> Self {
        let fresh = Self::all_groups(live);
        let prev = previous.cloned().unwrap_or_default();
        let mut out = ViewState::default();
        for group in SaveGroup::ALL {
            let src = if selection.is_enabled(group) { &fresh } else { &prev };
            out.copy_group(src, group);
        }
        out
    }

    fn all_groups(live: &LiveScene) -> Self {
        let rig = &live.lighting;
        Self {
            obj_position: Some(live.object.translation),
            obj_rotation: Some(live.object.rotation_degrees()),
            obj_scale: Some(live.object.scale),
            camera_position: Some(live.camera_position),
            controls_target: Some(live.camera_target),
            light_position: Some(rig.directional_position),
            light_target: Some(rig.directional_target),
            light_color: Some(rig.directional.color),
            light_intensity: Some(rig.directional.intensity),
            light_ambient_color: Some(rig.ambient.color),
            light_ambient_intensity: Some(rig.ambient.intensity),
            light_camera_color: Some(rig.camera.color),
            light_camera_intensity: Some(rig.camera.intensity),
            background_color: Some(rig.background),
        }
    }

    fn copy_group(&mut self, src: &ViewState, group: SaveGroup) {
        match group {
            SaveGroup::Position => self.obj_position = src.obj_position,
            SaveGroup::Rotation => self.obj_rotation = src.obj_rotation,
            SaveGroup::Scale => self.obj_scale = src.obj_scale,
            SaveGroup::Camera => {
                self.camera_position = src.camera_position;
                self.controls_target = src.controls_target;
            }
            SaveGroup::DirectionalLight => {
                self.light_position = src.light_position;
                self.light_target = src.light_target;
                self.light_color = src.light_color;
                self.light_intensity = src.light_intensity;
            }
            SaveGroup::AmbientLight => {
                self.light_ambient_color = src.light_ambient_color;
                self.light_ambient_intensity = src.light_ambient_intensity;
            }
            SaveGroup::CameraLight => {
                self.light_camera_color = src.light_camera_color;
                self.light_camera_intensity = src.light_camera_intensity;
            }
            SaveGroup::Background => self.background_color = src.background_color,
        }
    }

    fn fill_missing(&mut self, other: &ViewState) {
        macro_rules! fill {
            ($($field:ident),*) => {
                $( if self.$field.is_none() { self.$field = other.$field; } )*
            };
        }
        fill!(
            obj_position,
            obj_rotation,
            obj_scale,
            camera_position,
            controls_target,
            light_position,
            light_target,
            light_color,
            light_intensity,
            light_ambient_color,
            light_ambient_intensity,
            light_camera_color,
            light_camera_intensity,
            background_color
        );
    }

    pub fn object_pose(&self) -> ObjectPose {
        ObjectPose {
            position: self.obj_position,
            rotation_degrees: self.obj_rotation,
            scale: self.obj_scale,
        }
    }

    /// Overwrite the lighting properties present in the record
    pub fn apply_lighting(&self, rig: &mut LightingRig) {
        if let Some(p) = self.light_position {
            rig.directional_position = p;
        }
        if let Some(t) = self.light_target {
            rig.directional_target = t;
        }
        if let Some(c) = self.light_color {
            rig.directional.color = c;
        }
        if let Some(i) = self.light_intensity {
            rig.directional.intensity = i;
        }
        if let Some(c) = self.light_ambient_color {
            rig.ambient.color = c;
        }
        if let Some(i) = self.light_ambient_intensity {
            rig.ambient.intensity = i;
        }
        if let Some(c) = self.light_camera_color {
            rig.camera.color = c;
        }
        if let Some(i) = self.light_camera_intensity {
            rig.camera.intensity = i;
        }
        if let Some(c) = self.background_color {
            rig.background = c;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live() -> LiveScene {
        LiveScene {
            object: NodeTransform {
                translation: Vec3::new(0.5, 2.0, -1.0),
                rotation: Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.25),
                scale: Vec3::splat(1.5),
            },
            camera_position: Vec3::new(3.0, 4.2, 9.0),
            camera_target: Vec3::ZERO,
            lighting: LightingRig {
                directional: LightSettings {
                    color: HexColor(0xFF_EE_DD),
                    intensity: 2.5,
                },
                directional_position: Vec3::new(10.0, 50.0, 5.0),
                directional_target: Vec3::new(0.0, 1.0, 0.0),
                ambient: LightSettings {
                    color: HexColor(0x10_20_30),
                    intensity: 0.7,
                },
                camera: LightSettings {
                    color: HexColor(0xAB_CD_EF),
                    intensity: 0.1,
                },
                background: HexColor(0x22_22_22),
            },
        }
    }

    #[test]
    fn test_hex_color_parse_and_display() {
        assert_eq!("#ffeedd".parse::<HexColor>().unwrap(), HexColor(0xFF_EE_DD));
        assert_eq!("0x404040".parse::<HexColor>().unwrap(), HexColor(0x40_40_40));
        assert_eq!("#fff".parse::<HexColor>().unwrap(), HexColor::WHITE);
        assert!("#12345".parse::<HexColor>().is_err());
        assert_eq!(HexColor(0x0A_0B_0C).to_string(), "#0A0B0C");
        assert_eq!(HexColor::WHITE.inverted(), HexColor(0));
        assert_eq!(HexColor(0x12_34_56).inverted(), HexColor(0xED_CB_A9));
    }

    #[test]
    fn test_wire_format() {
        let state = ViewState::capture(&live());
        let json: Value = serde_json::from_str(&state.to_pretty_json().unwrap()).unwrap();
        assert_eq!(json["lightColor"], serde_json::json!(["#FFEEDD"]));
        assert_eq!(json["lightIntensity"], serde_json::json!([2.5]));
        assert_eq!(json["objPosition"], serde_json::json!([0.5, 2.0, -1.0]));
        assert_eq!(json["objRotation"][1].as_f64().unwrap().round(), 90.0);
    }

    #[test]
    fn test_pretty_json_uses_tabs() {
        let state = ViewState {
            obj_scale: Some(Vec3::ONE),
            ..Default::default()
        };
        let text = state.to_pretty_json().unwrap();
        assert!(text.contains("\n\t\"objScale\""));
    }

    #[test]
    fn test_round_trip_all_groups() {
        let original = live();
        let saved = ViewState::merge(&original, None, &SaveSelection::default());
        let reloaded = ViewState::from_json_lenient(&saved.to_pretty_json().unwrap()).unwrap();

        let restored = reloaded.object_pose().apply_to(NodeTransform::IDENTITY);
        assert_eq!(restored.translation, original.object.translation);
        assert_eq!(restored.scale, original.object.scale);
        assert!((restored.rotation - original.object.rotation).length() < 1e-5);

        let mut rig = LightingRig::default();
        reloaded.apply_lighting(&mut rig);
        assert_eq!(rig, original.lighting);
        assert_eq!(reloaded.camera_position, Some(original.camera_position));
        assert_eq!(reloaded.controls_target, Some(original.camera_target));
    }

    #[test]
    fn test_merge_reemits_previous_for_disabled_groups() {
        let previous = ViewState {
            obj_position: Some(Vec3::new(9.0, 9.0, 9.0)),
            background_color: Some(HexColor(0x00_00_FF)),
            ..Default::default()
        };
        let mut selection = SaveSelection::default();
        selection.set(SaveGroup::Position, false);
        selection.set(SaveGroup::Background, false);
        selection.set(SaveGroup::CameraLight, false);

        let merged = ViewState::merge(&live(), Some(&previous), &selection);
        assert_eq!(merged.obj_position, Some(Vec3::new(9.0, 9.0, 9.0)));
        assert_eq!(merged.background_color, Some(HexColor(0x00_00_FF)));
        // No previous camera light: the group is left out entirely
        assert_eq!(merged.light_camera_color, None);
        assert_eq!(merged.light_camera_intensity, None);
        assert_eq!(merged.obj_scale, Some(Vec3::splat(1.5)));
    }

    #[test]
    fn test_merge_without_previous_reads_nothing() {
        let merged = ViewState::merge(&live(), None, &SaveSelection::none());
        assert_eq!(merged, ViewState::default());
    }

    #[test]
    fn test_lenient_parse_tolerates_partial_and_bad_fields() {
        let body = r##"{
            "objPosition": [1, 2, 3],
            "lightColor": "#00ff00",
            "lightIntensity": [0.5, 0.9],
            "backgroundColor": ["not a color"],
            "somethingElse": true
        }"##;
        let state = ViewState::from_json_lenient(body).unwrap();
        assert_eq!(state.obj_position, Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(state.light_color, Some(HexColor(0x00_FF_00)));
        assert_eq!(state.light_intensity, Some(0.5));
        assert_eq!(state.background_color, None);
        assert_eq!(state.obj_rotation, None);

        assert!(ViewState::from_json_lenient("[1, 2]").is_err());
    }

    #[test]
    fn test_pose_applies_present_fields_only() {
        let pose = ObjectPose {
            rotation_degrees: Some(Vec3::new(180.0, 0.0, 0.0)),
            ..Default::default()
        };
        let base = NodeTransform::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let out = pose.apply_to(base);
        assert_eq!(out.translation, Vec3::new(1.0, 0.0, 0.0));
        assert!((out.rotation.x - std::f32::consts::PI).abs() < 1e-6);
        assert_eq!(out.scale, Vec3::ONE);
    }
}
