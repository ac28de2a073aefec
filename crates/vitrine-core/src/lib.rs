//! Vitrine Core - Model loading, framing and view-state pipeline
//!
//! This crate holds everything of the viewer that does not need a renderer:
//! - Source path parsing and format dispatch with loader fallbacks
//! - Scene normalization (rest pose) and camera framing
//! - Persisted view-state records and selective saves
//! - Clipping planes, measuring and editor tool state
//! - The repository HTTP client and entity metadata parsing

pub mod bounds;
pub mod clipping;
pub mod config;
pub mod editor;
pub mod format;
pub mod framing;
pub mod loader;
pub mod measure;
pub mod metadata;
pub mod normalize;
pub mod notice;
pub mod scene;
pub mod session;
pub mod source;
pub mod store;
pub mod view_state;

pub use bounds::Aabb;
pub use clipping::{ClipAxis, ClippingPlane, ClippingPlaneSet};
pub use config::{load_config, Lightweight, ViewerConfig};
pub use format::{DispatchError, LoadPlan, LoadRequest, ModelFormat};
pub use framing::{frame, Framing, FramingMode, Perspective, SceneHelpers};
pub use loader::{LoadError, SceneLoader};
pub use notice::{Notice, NoticeLevel, Notices};
pub use scene::{LoadedScene, MeshStats, NodeTransform, SceneObject, SceneShape};
pub use session::{LoadState, LoadTicket, LoadedModel, SaveTicket, SessionError, ViewerSession};
pub use source::ModelSource;
pub use store::{RepositoryClient, SaveRequest, StoreError, ThumbnailUpload, ViewStateStore};
pub use view_state::{HexColor, LightingRig, LiveScene, SaveGroup, SaveSelection, ViewState};
