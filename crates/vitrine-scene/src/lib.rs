//! Vitrine Scene - Shared 3D rendering and UI components
//!
//! Bevy plugins that turn a `ViewerSession` into a scene: camera framing and
//! orbit controls, lighting, ground/grid/axes helpers, clipping planes and the
//! shared egui panels.

pub mod camera;
pub mod clipping;
pub mod models;
pub mod scene;
pub mod types;
pub mod ui;

use bevy::prelude::*;

/// Plugin that sets up the shared 3D scene components
pub struct VitrineScenePlugin;

impl Plugin for VitrineScenePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<types::Session>()
            .init_resource::<types::NoticeBoard>()
            .add_plugins(camera::CameraPlugin)
            .add_plugins(scene::SceneSetupPlugin)
            .add_plugins(models::ModelsPlugin)
            .add_plugins(clipping::ClippingPlugin)
            .add_systems(Update, tick_notices);
    }
}

fn tick_notices(
    time: Res<Time>,
    mut board: ResMut<types::NoticeBoard>,
    mut session: ResMut<types::Session>,
) {
    // Notices alone must not count as a scene change
    let session = session.bypass_change_detection();
    if board.current.is_none() && session.notices_mut().is_empty() {
        return;
    }
    board.tick(session, time.delta());
}

// Re-export commonly used types
pub use camera::{CameraFraming, MainCamera, OrbitSettings};
pub use scene::HelperVisibility;
pub use types::*;
