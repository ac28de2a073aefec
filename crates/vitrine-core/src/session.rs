//! Viewer session
//!
//! One `ViewerSession` per viewer instance owns everything the load pipeline
//! touches: the configuration, the current plan, the saved view state, the
//! clipping planes and the notice queue.
//!
//! Loading is a small state machine (`Idle -> Loading -> Loaded | Failed`).
//! Every load gets a ticket, and results that carry anything but the current
//! ticket are discarded. Saves get their own tickets so that only the most
//! recently issued save reports back.

use glam::Vec3;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bounds::Aabb;
use crate::clipping::ClippingPlaneSet;
use crate::config::ViewerConfig;
use crate::editor::{EditorState, InteractionMode};
use crate::format::{DispatchError, LoadPlan, LoadRequest};
use crate::framing::{frame, Framing, FramingMode, Perspective, SceneHelpers, FRESH_OFFSET};
use crate::loader::{LoadError, SceneLoader};
use crate::measure::Ruler;
use crate::metadata::{EntityMetadata, MetadataError, TechnicalMetadata};
use crate::normalize::{normalize, NormalizedScene};
use crate::notice::{Notice, Notices};
use crate::scene::LoadedScene;
use crate::source::{entity_id_from_path, ModelSource, SourceError};
use crate::store::{SaveRequest, StoreError, ThumbnailUpload, ViewStateStore};
use crate::view_state::{LightingRig, LiveScene, SaveSelection, ViewState};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("A model is already loading")]
    AlreadyLoading,
    #[error("Result belongs to an outdated request")]
    Stale,
    #[error("No model is loaded")]
    NotLoaded,
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("Loading failed: {0}")]
    LoadFailed(String),
}

/// Identifies one load request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadTicket(u64);

/// Identifies one save request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SaveTicket(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading {
        ticket: LoadTicket,
        request: LoadRequest,
    },
    Loaded {
        ticket: LoadTicket,
    },
    Failed {
        ticket: LoadTicket,
        reason: String,
    },
}

/// Everything computed for a successfully loaded model
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedModel {
    pub scene: LoadedScene,
    pub normalized: NormalizedScene,
    pub framing: Framing,
    pub helpers: SceneHelpers,
    pub technical: TechnicalMetadata,
}

#[derive(Debug)]
pub struct ViewerSession {
    config: ViewerConfig,
    perspective: Perspective,
    state: LoadState,
    next_ticket: u64,
    plan: Option<LoadPlan>,
    /// Record fetched for the current load; `None` means fresh load
    fetched: Option<ViewState>,
    /// Values a disabled save group re-emits
    previous: Option<ViewState>,
    pending_save: Option<(SaveTicket, ViewState)>,
    model: Option<LoadedModel>,
    metadata: Option<EntityMetadata>,
    entity_id: Option<String>,
    notices: Notices,
    pub lighting: LightingRig,
    pub clipping: Option<ClippingPlaneSet>,
    pub editor: EditorState,
    pub ruler: Ruler,
    pub save_selection: SaveSelection,
}

impl ViewerSession {
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            config,
            perspective: Perspective::default(),
            state: LoadState::Idle,
            next_ticket: 0,
            plan: None,
            fetched: None,
            previous: None,
            pending_save: None,
            model: None,
            metadata: None,
            entity_id: None,
            notices: Notices::default(),
            lighting: LightingRig::default(),
            clipping: None,
            editor: EditorState::default(),
            ruler: Ruler::default(),
            save_selection: SaveSelection::default(),
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn plan(&self) -> Option<&LoadPlan> {
        self.plan.as_ref()
    }

    pub fn model(&self) -> Option<&LoadedModel> {
        self.model.as_ref()
    }

    pub fn metadata(&self) -> Option<&EntityMetadata> {
        self.metadata.as_ref()
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    pub fn previous_view_state(&self) -> Option<&ViewState> {
        self.previous.as_ref()
    }

    pub fn notices_mut(&mut self) -> &mut Notices {
        &mut self.notices
    }

    pub fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.perspective.aspect = aspect;
        }
    }

    pub fn perspective(&self) -> Perspective {
        self.perspective
    }

    /// Pick up the entity id from the container attribute or the page path.
    /// Lightweight viewers are not tied to an entity.
    pub fn resolve_entity_id(&mut self, attribute: Option<&str>, page_path: &str) -> Option<&str> {
        self.entity_id = if self.config.lightweight.is_enabled() {
            None
        } else {
            attribute
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string)
                .or_else(|| entity_id_from_path(&self.config.entity_id_uri, page_path))
        };
        self.entity_id.as_deref()
    }

    /// Store the entity's metadata export; returns the converted file that
    /// should be loaded instead of the upload, if the export names one.
    pub fn apply_metadata(&mut self, xml: &str) -> Result<Option<String>, MetadataError> {
        let metadata = EntityMetadata::parse(xml)?;
        let converted = metadata.converted_file().map(str::to_string);
        if let Some(path) = &converted {
            info!(path = %path, "Using converted file from metadata");
        }
        self.metadata = Some(metadata);
        Ok(converted)
    }

    fn issue_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    fn check_ticket(&self, ticket: LoadTicket) -> Result<(), SessionError> {
        match &self.state {
            LoadState::Loading { ticket: current, .. } if *current == ticket => Ok(()),
            _ => {
                debug!(?ticket, "Discarding result of outdated load");
                Err(SessionError::Stale)
            }
        }
    }

    /// Start loading `source_path`; rejected while another load is running
    pub fn begin_load(&mut self, source_path: &str) -> Result<(LoadTicket, LoadRequest), SessionError> {
        if matches!(self.state, LoadState::Loading { .. }) {
            self.notices.push(Notice::warning("A model is already loading"));
            return Err(SessionError::AlreadyLoading);
        }

        let ticket = LoadTicket(self.issue_ticket());
        let plan = ModelSource::parse(source_path)
            .map_err(SessionError::from)
            .and_then(|source| Ok(LoadPlan::build(&source, &self.config)?));

        let plan = match plan {
            Ok(plan) => plan,
            Err(e) => {
                let message = match &e {
                    SessionError::Dispatch(DispatchError::Unsupported(_)) => {
                        "Extension not supported yet".to_string()
                    }
                    other => other.to_string(),
                };
                self.notices.push(Notice::error(message));
                self.state = LoadState::Failed {
                    ticket,
                    reason: e.to_string(),
                };
                return Err(e);
            }
        };

        info!(source = %source_path, format = plan.request.format.name(), "Loading model");
        let request = plan.request.clone();
        self.plan = Some(plan);
        self.fetched = None;
        self.model = None;
        self.clipping = None;
        self.ruler.clear();
        self.state = LoadState::Loading {
            ticket,
            request: request.clone(),
        };
        Ok((ticket, request))
    }

    /// Where the saved view state of the current model lives
    pub fn view_state_url(&self) -> Option<String> {
        self.plan.as_ref().map(|p| p.view_state_url())
    }

    /// Record the outcome of the view-state fetch.
    ///
    /// Missing, malformed and unreachable records all lead to a fresh load.
    pub fn on_view_state(
        &mut self,
        ticket: LoadTicket,
        result: Result<Option<ViewState>, StoreError>,
    ) -> Result<(), SessionError> {
        self.check_ticket(ticket)?;
        let name = self
            .plan
            .as_ref()
            .map(|p| format!("{}_viewer", p.source.filename))
            .unwrap_or_default();

        self.fetched = match result {
            Ok(Some(state)) => {
                self.notices.push(Notice::info(format!("Settings {} found", name)));
                Some(state)
            }
            Ok(None) => {
                self.notices.push(Notice::info(format!("No settings {} found", name)));
                None
            }
            Err(e) => {
                warn!(error = %e, "View state unavailable, using defaults");
                self.notices.push(Notice::warning(format!("No settings {} found", name)));
                None
            }
        };
        Ok(())
    }

    /// A loader call failed; returns the follow-up request if a fallback applies
    pub fn on_load_failed(
        &mut self,
        ticket: LoadTicket,
        failed: &LoadRequest,
        error: LoadError,
    ) -> Result<Option<LoadRequest>, SessionError> {
        self.check_ticket(ticket)?;
        let plan = self.plan.as_ref().ok_or(SessionError::NotLoaded)?;

        if let Some(recovery) = plan.recover(failed, &error) {
            if let Some(notice) = recovery.notice {
                self.notices.push(notice);
            }
            self.state = LoadState::Loading {
                ticket,
                request: recovery.request.clone(),
            };
            return Ok(Some(recovery.request));
        }

        let notice = plan.failure_notice(&error);
        warn!(error = %error, "Model load failed");
        self.notices.push(notice);
        self.state = LoadState::Failed {
            ticket,
            reason: error.to_string(),
        };
        Ok(None)
    }

    /// Place the loaded scene, frame the camera and set up the tools
    pub fn finish_load(&mut self, ticket: LoadTicket, scene: LoadedScene) -> Result<&LoadedModel, SessionError> {
        self.check_ticket(ticket)?;
        let plan = self.plan.as_ref().ok_or(SessionError::NotLoaded)?;

        let fetched = self.fetched.clone();
        let pose = fetched.as_ref().map(|s| s.object_pose());
        let normalized = normalize(&scene, pose.as_ref());

        let mode = match fetched.as_ref().and_then(|s| s.camera_position) {
            Some(camera) => FramingMode::Restore {
                camera,
                target: fetched
                    .as_ref()
                    .and_then(|s| s.controls_target)
                    .unwrap_or(Vec3::ZERO),
            },
            None => FramingMode::Fresh {
                offset: Some(FRESH_OFFSET),
            },
        };
        let framing = frame(&normalized.bounds, &self.perspective, mode);

        let mut lighting = LightingRig::default();
        if let Some(state) = &fetched {
            state.apply_lighting(&mut lighting);
        }

        let helpers = SceneHelpers::for_bounds(&normalized.bounds);
        let technical = TechnicalMetadata {
            uploaded_file: plan.source.filename.clone(),
            loaded_format: plan.loaded_extension().to_string(),
            stats: scene.stats(),
        };

        self.previous = match fetched {
            Some(state) => Some(state),
            None => {
                let object = normalized.primary_transform();
                Some(ViewState {
                    obj_position: Some(object.translation),
                    obj_rotation: Some(object.rotation_degrees()),
                    obj_scale: Some(object.scale),
                    camera_position: Some(framing.tween.end()),
                    controls_target: Some(framing.target),
                    ..ViewState::default()
                })
            }
        };

        self.clipping = Some(ClippingPlaneSet::new(&normalized.bounds, lighting.background));
        self.lighting = lighting;
        self.state = LoadState::Loaded { ticket };

        info!(
            vertices = technical.stats.vertices,
            faces = technical.stats.faces,
            restored = normalized.restored,
            "Model ready"
        );

        Ok(self.model.insert(LoadedModel {
            scene,
            normalized,
            framing,
            helpers,
            technical,
        }))
    }

    /// Refit the clipping planes after the model's bounds changed
    pub fn on_bounds_changed(&mut self, bounds: &Aabb) {
        if let Some(model) = self.model.as_mut() {
            model.normalized.bounds = *bounds;
        }
        if let Some(clipping) = self.clipping.as_mut() {
            clipping.rebound(bounds);
        }
    }

    /// Build the save request for the live scene
    pub fn prepare_save(&mut self, live: &LiveScene) -> Result<(SaveTicket, SaveRequest), SessionError> {
        if !matches!(self.state, LoadState::Loaded { .. }) {
            return Err(SessionError::NotLoaded);
        }
        let plan = self.plan.as_ref().ok_or(SessionError::NotLoaded)?;

        let state = ViewState::merge(live, self.previous.as_ref(), &self.save_selection);
        let request = SaveRequest {
            state: state.clone(),
            path: plan.storage_path(&self.config.domain),
            filename: plan.source.filename.clone(),
        };
        let ticket = SaveTicket(self.issue_ticket());
        self.pending_save = Some((ticket, state));
        Ok((ticket, request))
    }

    /// Record the outcome of a save. Only the latest issued save is honored;
    /// returns whether this result was applied.
    pub fn on_save_result(&mut self, ticket: SaveTicket, result: Result<(), StoreError>) -> bool {
        let is_latest = matches!(&self.pending_save, Some((latest, _)) if *latest == ticket);
        if !is_latest {
            debug!(?ticket, "Ignoring response of superseded save");
            return false;
        }
        let Some((_, state)) = self.pending_save.take() else {
            return false;
        };

        match result {
            Ok(()) => {
                self.previous = Some(state);
                self.notices.push(Notice::success("Settings have been saved."));
            }
            Err(e) => {
                self.notices
                    .push(Notice::error(format!("Saving settings failed: {}", e)));
            }
        }
        true
    }

    /// Build the thumbnail upload for a rendered PNG
    pub fn prepare_thumbnail(&self, png: Vec<u8>) -> Result<ThumbnailUpload, SessionError> {
        if !matches!(self.state, LoadState::Loaded { .. }) {
            return Err(SessionError::NotLoaded);
        }
        let plan = self.plan.as_ref().ok_or(SessionError::NotLoaded)?;
        Ok(ThumbnailUpload {
            filename: plan.source.basename.clone(),
            path: plan.storage_path(&self.config.domain),
            png,
            entity_id: self.entity_id.clone().unwrap_or_default(),
        })
    }

    pub fn on_thumbnail_result(&mut self, result: Result<String, StoreError>) {
        let notice = match result {
            Ok(message) => Notice::success(message),
            Err(StoreError::Rejected(error)) => Notice::error(error),
            Err(e) => Notice::error(format!("Thumbnail upload failed: {}", e)),
        };
        self.notices.push(notice);
    }

    pub fn toggle_picking(&mut self) {
        let was_measuring = self.editor.mode() == InteractionMode::Measuring;
        let notice = self.editor.toggle_picking();
        if was_measuring {
            self.ruler.clear();
        }
        self.notices.push(notice);
    }

    /// Leaving measure mode clears the ruler
    pub fn toggle_measuring(&mut self) {
        let notice = self.editor.toggle_measuring();
        if self.editor.mode() != InteractionMode::Measuring {
            self.ruler.clear();
        }
        self.notices.push(notice);
    }

    /// Drive a complete load: view state, loader with fallbacks, placement
    pub async fn run_pipeline<L, S>(
        &mut self,
        source_path: &str,
        loader: &mut L,
        store: &S,
    ) -> Result<&LoadedModel, SessionError>
    where
        L: SceneLoader,
        S: ViewStateStore,
    {
        let (ticket, mut request) = self.begin_load(source_path)?;

        if let Some(url) = self.view_state_url() {
            let fetched = store.fetch(&url).await;
            self.on_view_state(ticket, fetched)?;
        }

        loop {
            match loader.load(&request).await {
                Ok(scene) => return self.finish_load(ticket, scene),
                Err(error) => {
                    let reason = error.to_string();
                    match self.on_load_failed(ticket, &request, error)? {
                        Some(next) => request = next,
                        None => return Err(SessionError::LoadFailed(reason)),
                    }
                }
            }
        }
    }
}
