//! Shared resources and markers

use bevy::prelude::*;
use std::ops::{Deref, DerefMut};
use std::time::Duration;

use vitrine_core::notice::{Notice, NOTICE_DURATION};
use vitrine_core::session::ViewerSession;
use vitrine_core::view_state::HexColor;
use vitrine_core::ViewerConfig;

/// The viewer session as an ECS resource
#[derive(Resource)]
pub struct Session(pub ViewerSession);

impl Session {
    pub fn new(config: ViewerConfig) -> Self {
        Self(ViewerSession::new(config))
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(ViewerConfig::default())
    }
}

impl Deref for Session {
    type Target = ViewerSession;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Session {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// Root entity of the currently shown model
#[derive(Component)]
pub struct ModelRoot;

/// A mesh belonging to the loaded model
#[derive(Component, Debug, Clone)]
pub struct ModelMesh {
    /// Mesh-space bounds
    pub local_bounds: vitrine_core::Aabb,
    pub name: String,
}

/// Anything the viewer adds around the model: grid, ground, axes, light and
/// clipping helpers. Excluded from bounds, picking and statistics.
#[derive(Component)]
pub struct ViewerHelper;

/// Notice currently on screen
#[derive(Debug, Clone)]
pub struct ShownNotice {
    pub notice: Notice,
    pub remaining: Duration,
}

/// Notices moved out of the session, shown one after another
#[derive(Debug, Clone, Resource, Default)]
pub struct NoticeBoard {
    pub current: Option<ShownNotice>,
}

impl NoticeBoard {
    /// Count down the shown notice and pull the next one from the session
    pub fn tick(&mut self, session: &mut ViewerSession, dt: Duration) {
        if let Some(shown) = self.current.as_mut() {
            shown.remaining = shown.remaining.saturating_sub(dt);
            if shown.remaining.is_zero() {
                self.current = None;
            }
        }
        if self.current.is_none() {
            self.current = session.notices_mut().pop().map(|notice| ShownNotice {
                notice,
                remaining: NOTICE_DURATION,
            });
        }
    }
}

pub fn to_color(color: HexColor) -> Color {
    let [r, g, b] = color.rgb();
    Color::srgb_u8(r, g, b)
}

pub fn from_color(color: Color) -> HexColor {
    let srgba = color.to_srgba();
    let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    HexColor::from_rgb(channel(srgba.red), channel(srgba.green), channel(srgba.blue))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_conversion_round_trip() {
        for hex in [0x00_00_00, 0xFF_FF_FF, 0x40_40_40, 0x12_34_56] {
            assert_eq!(from_color(to_color(HexColor(hex))), HexColor(hex));
        }
    }

    #[test]
    fn test_notice_board_shows_one_at_a_time() {
        let mut session = ViewerSession::new(ViewerConfig::default());
        session.notify(Notice::info("first"));
        session.notify(Notice::info("second"));

        let mut board = NoticeBoard::default();
        board.tick(&mut session, Duration::ZERO);
        assert_eq!(board.current.as_ref().map(|s| s.notice.message.as_str()), Some("first"));

        board.tick(&mut session, Duration::from_millis(6000));
        assert_eq!(board.current.as_ref().map(|s| s.notice.message.as_str()), Some("first"));

        board.tick(&mut session, Duration::from_millis(600));
        assert_eq!(board.current.as_ref().map(|s| s.notice.message.as_str()), Some("second"));
    }
}
