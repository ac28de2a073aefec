//! Model loading driven by the session
//!
//! Metadata and view-state requests run on the browser's event loop and hand
//! their results back through shared slots. The glTF backend is Bevy's asset
//! server; other formats have no loader here and fail into the session's
//! fallback and notice handling.

use bevy::asset::LoadState;
use bevy::ecs::system::SystemParam;
use bevy::gltf::Gltf;
use bevy::light::NotShadowCaster;
use bevy::prelude::*;
use bevy::scene::SceneInstance;
use bevy::window::PrimaryWindow;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use vitrine_core::format::{LoadRequest, ModelFormat};
use vitrine_core::loader::LoadError;
use vitrine_core::session::{LoadTicket, LoadedModel};
use vitrine_core::store::{RepositoryClient, StoreError, ViewStateStore};
use vitrine_core::view_state::ViewState;
use vitrine_core::Notice;
use vitrine_scene::camera::{CameraFraming, MainCamera, OrbitSettings};
use vitrine_scene::clipping::spawn_clipping_helpers;
use vitrine_scene::models::{measure_model, to_transform};
use vitrine_scene::scene::{despawn_helpers, spawn_helpers, HelperVisibility};
use vitrine_scene::types::{ModelRoot, Session, ViewerHelper};

use crate::editor::MeshTint;
use crate::page::HostPage;

/// Plugin for model loading
pub struct LoaderPlugin;

impl Plugin for LoaderPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PendingFetches>()
            .init_resource::<LoadStage>()
            .add_systems(Startup, start_viewer)
            .add_systems(Update, (receive_fetches, drive_loading).chain());
    }
}

/// Repository client shared by the async tasks
#[derive(Resource, Clone)]
pub struct Repository(pub Option<RepositoryClient>);

pub(crate) type Slot<T> = Arc<Mutex<Option<T>>>;

/// Results of requests still in flight
#[derive(Resource, Default)]
pub struct PendingFetches {
    pub metadata: Slot<Result<String, StoreError>>,
    pub view_state: Slot<(LoadTicket, Result<Option<ViewState>, StoreError>)>,
}

pub(crate) fn put<T>(slot: &Slot<T>, value: T) {
    if let Ok(mut guard) = slot.lock() {
        *guard = Some(value);
    }
}

pub(crate) fn take<T>(slot: &Slot<T>) -> Option<T> {
    slot.try_lock().ok().and_then(|mut guard| guard.take())
}

/// Like a slot, but keeps every result that lands between two frames
pub(crate) type Queue<T> = Arc<Mutex<Vec<T>>>;

pub(crate) fn push<T>(queue: &Queue<T>, value: T) {
    if let Ok(mut guard) = queue.lock() {
        guard.push(value);
    }
}

/// Everything queued so far, oldest first. Empty while the queue is locked.
pub(crate) fn drain<T>(queue: &Queue<T>) -> Vec<T> {
    queue
        .try_lock()
        .map(|mut guard| std::mem::take(&mut *guard))
        .unwrap_or_default()
}

/// Where the current load stands on the ECS side
#[derive(Resource, Default)]
pub enum LoadStage {
    #[default]
    Idle,
    AwaitingMetadata,
    AwaitingViewState {
        ticket: LoadTicket,
        request: LoadRequest,
    },
    /// View state recorded; the model itself can be requested
    Ready {
        ticket: LoadTicket,
        request: LoadRequest,
    },
    LoadingAsset {
        ticket: LoadTicket,
        request: LoadRequest,
        handle: Handle<Gltf>,
    },
    Spawning {
        ticket: LoadTicket,
        root: Entity,
    },
    /// Scene is spawned; transforms propagate before it is measured
    Settling {
        ticket: LoadTicket,
        root: Entity,
    },
}

/// Kick off the metadata request, or go straight to loading
fn start_viewer(
    mut session: ResMut<Session>,
    page: Res<HostPage>,
    repository: Res<Repository>,
    pending: Res<PendingFetches>,
    mut stage: ResMut<LoadStage>,
) {
    let entity_id = session
        .resolve_entity_id(page.entity_attribute.as_deref(), &page.page_path)
        .map(str::to_string);

    match (entity_id, repository.0.clone()) {
        (Some(entity_id), Some(client)) => {
            info!(entity_id = %entity_id, "Fetching entity metadata");
            let slot = pending.metadata.clone();
            wasm_bindgen_futures::spawn_local(async move {
                put(&slot, client.fetch_metadata(&entity_id).await);
            });
            *stage = LoadStage::AwaitingMetadata;
        }
        _ => {
            let source = page.source.clone();
            begin(&mut session, source.as_deref(), &repository, &pending, &mut stage);
        }
    }
}

/// Start a load of `source` and request its view state
fn begin(
    session: &mut Session,
    source: Option<&str>,
    repository: &Repository,
    pending: &PendingFetches,
    stage: &mut LoadStage,
) {
    let Some(source) = source else {
        session.notify(Notice::warning("No model to display"));
        return;
    };
    let Ok((ticket, request)) = session.begin_load(source) else {
        return;
    };

    match (session.view_state_url(), repository.0.clone()) {
        (Some(url), Some(client)) => {
            let slot = pending.view_state.clone();
            wasm_bindgen_futures::spawn_local(async move {
                put(&slot, (ticket, client.fetch(&url).await));
            });
        }
        _ => put(&pending.view_state, (ticket, Ok(None))),
    }
    *stage = LoadStage::AwaitingViewState { ticket, request };
}

fn receive_fetches(
    mut session: ResMut<Session>,
    page: Res<HostPage>,
    repository: Res<Repository>,
    pending: Res<PendingFetches>,
    mut stage: ResMut<LoadStage>,
) {
    if let Some(result) = take(&pending.metadata) {
        let mut source = page.source.clone();
        match result {
            Ok(xml) => match session.apply_metadata(&xml) {
                Ok(Some(converted)) => source = Some(converted),
                Ok(None) => {}
                Err(e) => warn!("Metadata export unreadable: {}", e),
            },
            Err(e) => warn!("Metadata unavailable: {}", e),
        }
        begin(&mut session, source.as_deref(), &repository, &pending, &mut stage);
    }

    if let Some((ticket, result)) = take(&pending.view_state) {
        let settled = session.on_view_state(ticket, result).is_ok();
        *stage = match std::mem::take(&mut *stage) {
            LoadStage::AwaitingViewState {
                ticket: current,
                request,
            } if settled && current == ticket => LoadStage::Ready { ticket, request },
            other => other,
        };
    }
}

#[derive(SystemParam)]
pub struct LoadParams<'w, 's> {
    commands: Commands<'w, 's>,
    session: ResMut<'w, Session>,
    stage: ResMut<'w, LoadStage>,
    asset_server: Res<'w, AssetServer>,
    gltf_assets: Res<'w, Assets<Gltf>>,
    scene_spawner: Res<'w, SceneSpawner>,
    instances: Query<'w, 's, &'static SceneInstance>,
    old_models: Query<'w, 's, Entity, With<ModelRoot>>,
    old_helpers: Query<'w, 's, Entity, With<ViewerHelper>>,
    transforms: Query<'w, 's, &'static Transform, With<ModelRoot>>,
    children: Query<'w, 's, &'static Children>,
    mesh_query: Query<'w, 's, (&'static Mesh3d, &'static GlobalTransform)>,
    names: Query<'w, 's, &'static Name>,
    parents: Query<'w, 's, &'static ChildOf>,
    mesh_materials: Query<'w, 's, &'static MeshMaterial3d<StandardMaterial>>,
    meshes: ResMut<'w, Assets<Mesh>>,
    materials: ResMut<'w, Assets<StandardMaterial>>,
    windows: Query<'w, 's, &'static Window, With<PrimaryWindow>>,
    cameras: Query<'w, 's, &'static mut Transform, (With<MainCamera>, Without<ModelRoot>)>,
    framing: ResMut<'w, CameraFraming>,
    orbit: ResMut<'w, OrbitSettings>,
    helper_visibility: Res<'w, HelperVisibility>,
}

/// Advance the ECS side of the current load by one step
fn drive_loading(mut params: LoadParams) {
    let stage = std::mem::take(&mut *params.stage);
    *params.stage = match stage {
        LoadStage::Ready { ticket, request } => request_asset(&mut params, ticket, request),
        LoadStage::LoadingAsset {
            ticket,
            request,
            handle,
        } => poll_asset(&mut params, ticket, request, handle),
        LoadStage::Spawning { ticket, root } => {
            let ready = params
                .instances
                .get(root)
                .is_ok_and(|instance| params.scene_spawner.instance_is_ready(**instance));
            if ready {
                LoadStage::Settling { ticket, root }
            } else {
                LoadStage::Spawning { ticket, root }
            }
        }
        LoadStage::Settling { ticket, root } => {
            place_model(&mut params, ticket, root);
            LoadStage::Idle
        }
        other => other,
    };
}

fn request_asset(params: &mut LoadParams, ticket: LoadTicket, request: LoadRequest) -> LoadStage {
    let mut request = request;
    loop {
        if request.format == ModelFormat::Gltf {
            info!(url = %request.url, "Requesting glTF asset");
            let handle = params.asset_server.load::<Gltf>(request.url.clone());
            return LoadStage::LoadingAsset {
                ticket,
                request,
                handle,
            };
        }

        let error = LoadError::Loader {
            url: request.url.clone(),
            message: format!("no {} loader in this viewer", request.format.name()),
        };
        match params.session.on_load_failed(ticket, &request, error) {
            Ok(Some(next)) => request = next,
            _ => return LoadStage::Idle,
        }
    }
}

fn poll_asset(
    params: &mut LoadParams,
    ticket: LoadTicket,
    request: LoadRequest,
    handle: Handle<Gltf>,
) -> LoadStage {
    let failure = match params.asset_server.get_load_state(handle.id()) {
        Some(LoadState::Loaded) if params.asset_server.is_loaded_with_dependencies(handle.id()) => {
            let scene = params.gltf_assets.get(&handle).and_then(|gltf| {
                gltf.default_scene
                    .clone()
                    .or_else(|| gltf.scenes.first().cloned())
            });
            match scene {
                Some(scene) => return spawn_model(params, ticket, &request, scene),
                None => "file contains no scene".to_string(),
            }
        }
        Some(LoadState::Failed(e)) => e.to_string(),
        _ => {
            return LoadStage::LoadingAsset {
                ticket,
                request,
                handle,
            }
        }
    };

    let error = LoadError::Loader {
        url: request.url.clone(),
        message: failure,
    };
    match params.session.on_load_failed(ticket, &request, error) {
        Ok(Some(next)) => request_asset(params, ticket, next),
        _ => LoadStage::Idle,
    }
}

fn spawn_model(
    params: &mut LoadParams,
    ticket: LoadTicket,
    request: &LoadRequest,
    scene: Handle<Scene>,
) -> LoadStage {
    for entity in params.old_models.iter() {
        params.commands.entity(entity).despawn();
    }
    despawn_helpers(&mut params.commands, &params.old_helpers);

    let name = request
        .url
        .rsplit('/')
        .next()
        .unwrap_or(request.url.as_str())
        .to_string();
    let root = params
        .commands
        .spawn((
            SceneRoot(scene),
            Transform::default(),
            Visibility::default(),
            ModelRoot,
            Name::new(name),
        ))
        .id();
    LoadStage::Spawning { ticket, root }
}

/// Measure the spawned scene, let the session place it and set up the stage
fn place_model(params: &mut LoadParams, ticket: LoadTicket, root: Entity) {
    let root_transform = params.transforms.get(root).copied().unwrap_or_default();
    let name = params
        .names
        .get(root)
        .map(|n| n.as_str().to_string())
        .unwrap_or_default();
    let measured = measure_model(
        root,
        &name,
        &root_transform,
        &params.children,
        &params.mesh_query,
        &params.names,
        &params.parents,
        &params.meshes,
    );

    if let Ok(window) = params.windows.single() {
        params.session.set_aspect(window.width() / window.height());
    }

    let model: LoadedModel = match params.session.finish_load(ticket, measured.scene) {
        Ok(model) => model.clone(),
        Err(e) => {
            warn!("Discarding loaded model: {}", e);
            params.commands.entity(root).despawn();
            return;
        }
    };

    params
        .commands
        .entity(root)
        .insert(to_transform(&model.normalized.primary_transform()));

    for mesh in measured.meshes {
        // Own material per mesh so highlights and edits stay local
        let tint = params
            .mesh_materials
            .get(mesh.entity)
            .ok()
            .and_then(|m| params.materials.get(&m.0).cloned())
            .map(|material| {
                let original = material.base_color;
                (params.materials.add(material), original)
            });
        let mut entity = params.commands.entity(mesh.entity);
        entity.insert(mesh.mesh);
        if let Some((handle, original)) = tint {
            entity.insert((MeshMaterial3d(handle), MeshTint { original }));
        }
        if !model.normalized.cast_shadows {
            entity.insert(NotShadowCaster);
        }
    }

    params.orbit.target = model.framing.target;
    params.framing.start(model.framing.tween);
    if let Ok(mut camera) = params.cameras.single_mut() {
        *camera = Transform::from_translation(model.framing.tween.start())
            .looking_at(model.framing.target, Vec3::Y);
    }

    let lighting = params.session.lighting;
    spawn_helpers(
        &mut params.commands,
        &mut params.meshes,
        &mut params.materials,
        &model.helpers,
        &lighting,
        &params.helper_visibility,
    );
    if let Some(planes) = params.session.clipping.clone() {
        spawn_clipping_helpers(
            &mut params.commands,
            &mut params.meshes,
            &mut params.materials,
            &planes,
        );
    }
}

/// Repository client for the configured domain; failures become a notice
pub fn connect(session: &mut Session) -> Repository {
    match RepositoryClient::new(session.config()) {
        Ok(client) => Repository(Some(client)),
        Err(e) => {
            session.notify(Notice::error(format!("Repository unavailable: {}", e)));
            Repository(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_keeps_only_latest() {
        let slot: Slot<u32> = Slot::default();
        put(&slot, 1);
        put(&slot, 2);
        assert_eq!(take(&slot), Some(2));
        assert_eq!(take(&slot), None);
    }

    #[test]
    fn test_queue_drains_every_result_in_order() {
        let queue: Queue<u32> = Queue::default();
        push(&queue, 1);
        push(&queue, 2);
        push(&queue, 3);
        assert_eq!(drain(&queue), vec![1, 2, 3]);
        assert!(drain(&queue).is_empty());
    }

    #[test]
    fn test_drain_while_locked_loses_nothing() {
        let queue: Queue<u32> = Queue::default();
        push(&queue, 7);
        {
            let _held = queue.lock().unwrap();
            assert!(drain(&queue).is_empty());
        }
        assert_eq!(drain(&queue), vec![7]);
    }
}
