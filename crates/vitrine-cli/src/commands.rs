//! Subcommand implementations

use anyhow::{bail, Context, Result};
use glam::Vec3;
use std::path::Path;
use tracing::info;

use vitrine_core::format::Fallback;
use vitrine_core::framing::{frame as frame_box, FramingMode, Perspective, SceneHelpers};
use vitrine_core::metadata::EntityMetadata;
use vitrine_core::{
    Aabb, LoadPlan, ModelSource, RepositoryClient, SaveRequest, ThumbnailUpload, ViewState,
    ViewStateStore, ViewerConfig,
};

fn load_plan(config: &ViewerConfig, source: &str) -> Result<LoadPlan> {
    let source = ModelSource::parse(source)?;
    Ok(LoadPlan::build(&source, config)?)
}

/// Absolute URL for a path that may be relative to the repository domain
fn absolute(config: &ViewerConfig, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!(
            "{}/{}",
            config.domain.trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    }
}

pub fn plan(config: &ViewerConfig, source: &str) -> Result<()> {
    let plan = load_plan(config, source)?;
    let request = &plan.request;

    println!("Source:     {}", plan.source.original);
    println!("Format:     {}", request.format.name());
    if let Some(archive) = &plan.archive {
        println!("Archive:    {:?}", archive);
    }
    println!("URL:        {}", request.url);
    println!("Resources:  {}", request.resource_dir);
    if let Some(materials) = &request.materials {
        println!("Materials:  {}", materials);
    }
    if let Some(decoder) = &request.decoder {
        println!("Decoder:    {}", decoder);
    }
    match &plan.fallback {
        Fallback::None => println!("Fallback:   none"),
        Fallback::WithoutMaterials => println!("Fallback:   reload without materials"),
        Fallback::AlternatePath(path) => println!("Fallback:   {}", path),
    }
    println!("View state: {}", absolute(config, &plan.view_state_url()));
    println!("Storage:    {}", plan.storage_path(&config.domain));
    Ok(())
}

pub async fn state_get(config: &ViewerConfig, source: &str) -> Result<()> {
    let plan = load_plan(config, source)?;
    let client = RepositoryClient::new(config)?;
    let url = absolute(config, &plan.view_state_url());

    match client.fetch(&url).await? {
        Some(state) => println!("{}", state.to_pretty_json()?),
        None => println!("No settings {}_viewer found", plan.source.filename),
    }
    Ok(())
}

fn save_request(config: &ViewerConfig, plan: &LoadPlan, json: &str) -> Result<SaveRequest> {
    let state = ViewState::from_json_lenient(json).context("Invalid view state JSON")?;
    Ok(SaveRequest {
        state,
        path: plan.storage_path(&config.domain),
        filename: plan.source.filename.clone(),
    })
}

pub async fn state_save(config: &ViewerConfig, source: &str, file: &Path) -> Result<()> {
    let plan = load_plan(config, source)?;
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let request = save_request(config, &plan, &json)?;

    let client = RepositoryClient::new(config)?;
    client.save(&request).await?;
    info!(url = %absolute(config, &plan.view_state_url()), "View state stored");
    println!("Settings have been saved.");
    Ok(())
}

pub async fn metadata(config: &ViewerConfig, entity_id: &str) -> Result<()> {
    let client = RepositoryClient::new(config)?;
    info!(url = %client.metadata_url(entity_id), "Fetching metadata");
    let xml = client.fetch_metadata(entity_id).await?;
    let metadata = EntityMetadata::parse(&xml)?;

    for (label, value) in metadata.labelled() {
        println!("{:<24} {}", label, value);
    }
    if let Some(converted) = metadata.converted_file() {
        println!("{:<24} {}", "Converted file", converted);
    }
    println!("{:<24} {}", "Page", config.entity_page_url(entity_id));
    Ok(())
}

pub fn frame(min: Vec3, max: Vec3, aspect: f32, fov: f32, offset: f32) -> Result<()> {
    if aspect <= 0.0 || fov <= 0.0 || fov >= 180.0 {
        bail!("aspect must be positive and fov within (0, 180) degrees");
    }
    if min.cmpgt(max).any() {
        bail!("min must not exceed max on any axis");
    }
    let bounds = Aabb::new(min, max);

    let framing = frame_box(
        &bounds,
        &Perspective::new(fov, aspect),
        FramingMode::Fresh {
            offset: Some(offset),
        },
    );
    let helpers = SceneHelpers::for_bounds(&bounds);

    println!("Size:               {}", bounds.size());
    println!("Horizontal fit:     {:.4}", framing.distances.horizontal);
    println!("Vertical fit:       {:.4}", framing.distances.vertical);
    println!("Camera start:       {}", framing.tween.start());
    println!("Camera rest:        {}", framing.tween.end());
    println!("Orbit target:       {}", framing.target);
    println!("Grid size:          {:.4}", helpers.grid_size);
    println!("Ground size:        {:.4}", helpers.ground_size);
    Ok(())
}

fn thumbnail_upload(
    config: &ViewerConfig,
    plan: &LoadPlan,
    entity_id: &str,
    png: Vec<u8>,
) -> Result<ThumbnailUpload> {
    const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
    if !png.starts_with(PNG_SIGNATURE) {
        bail!("Thumbnail is not a PNG image");
    }
    Ok(ThumbnailUpload {
        filename: plan.source.basename.clone(),
        path: plan.storage_path(&config.domain),
        png,
        entity_id: entity_id.to_string(),
    })
}

pub async fn thumbnail(config: &ViewerConfig, source: &str, entity_id: &str, png: &Path) -> Result<()> {
    let plan = load_plan(config, source)?;
    let bytes = std::fs::read(png).with_context(|| format!("Failed to read {}", png.display()))?;
    let upload = thumbnail_upload(config, &plan, entity_id, bytes)?;

    let client = RepositoryClient::new(config)?;
    let message = client.upload_thumbnail(&upload).await?;
    println!("{}", message);
    Ok(())
}
