//! Vitrine CLI - Main entry point
//!
//! Inspects and maintains what the browser viewer reads from a repository:
//! load plans, saved view states, entity metadata and thumbnails.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use glam::Vec3;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use vitrine_core::framing::{DEFAULT_FOV_DEGREES, FRESH_OFFSET};

#[derive(Parser, Debug)]
#[command(name = "vitrine")]
#[command(about = "Model repository tool for the Vitrine 3D viewer")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "vitrine.toml", global = true)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show how a model file would be loaded
    Plan {
        /// Model path or URL as uploaded
        source: String,
    },
    /// Read or write the saved view state of a model
    State {
        #[command(subcommand)]
        action: StateAction,
    },
    /// Fetch and print the metadata export of an entity
    Metadata { entity_id: String },
    /// Compute the camera framing for a bounding box
    Frame {
        /// Minimum corner as x,y,z
        #[arg(long, value_parser = parse_vec3, allow_hyphen_values = true)]
        min: Vec3,
        /// Maximum corner as x,y,z
        #[arg(long, value_parser = parse_vec3, allow_hyphen_values = true)]
        max: Vec3,
        /// Viewport width over height
        #[arg(long, default_value_t = 1.0)]
        aspect: f32,
        /// Vertical field of view in degrees
        #[arg(long, default_value_t = DEFAULT_FOV_DEGREES)]
        fov: f32,
        /// Distance multiplier applied to the fitted distance
        #[arg(long, default_value_t = FRESH_OFFSET)]
        offset: f32,
    },
    /// Upload a PNG as the thumbnail of a model
    Thumbnail {
        source: String,
        entity_id: String,
        png: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum StateAction {
    /// Print the stored view state
    Get { source: String },
    /// Store a view state read from a JSON file
    Save { source: String, file: PathBuf },
}

/// Parse `x,y,z` into a vector
fn parse_vec3(value: &str) -> Result<Vec3, String> {
    let parts: Vec<f32> = value
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid number in '{}': {}", value, e))?;
    match parts.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(format!("expected x,y,z but got '{}'", value)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Vitrine v{}", env!("CARGO_PKG_VERSION"));

    let config = vitrine_core::load_config(&args.config)?;

    match args.command {
        Command::Plan { source } => commands::plan(&config, &source),
        Command::State { action } => match action {
            StateAction::Get { source } => commands::state_get(&config, &source).await,
            StateAction::Save { source, file } => commands::state_save(&config, &source, &file).await,
        },
        Command::Metadata { entity_id } => commands::metadata(&config, &entity_id).await,
        Command::Frame {
            min,
            max,
            aspect,
            fov,
            offset,
        } => commands::frame(min, max, aspect, fov, offset),
        Command::Thumbnail {
            source,
            entity_id,
            png,
        } => commands::thumbnail(&config, &source, &entity_id, &png).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vec3() {
        assert_eq!(parse_vec3("1,-2.5, 3").unwrap(), Vec3::new(1.0, -2.5, 3.0));
        assert!(parse_vec3("1,2").is_err());
        assert!(parse_vec3("a,b,c").is_err());
    }

    #[test]
    fn test_args_frame_with_negative_corner() {
        let args = Args::try_parse_from([
            "vitrine", "frame", "--min", "-1,-1,-1", "--max", "1,1,1", "--aspect", "1.5",
        ])
        .unwrap();
        match args.command {
            Command::Frame { min, max, aspect, fov, offset } => {
                assert_eq!(min, Vec3::splat(-1.0));
                assert_eq!(max, Vec3::ONE);
                assert_eq!(aspect, 1.5);
                assert_eq!(fov, DEFAULT_FOV_DEGREES);
                assert_eq!(offset, FRESH_OFFSET);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_args_global_config_after_subcommand() {
        let args = Args::try_parse_from([
            "vitrine", "state", "get", "/files/a.glb", "--config", "site.toml",
        ])
        .unwrap();
        assert_eq!(args.config, PathBuf::from("site.toml"));
        assert!(matches!(
            args.command,
            Command::State { action: StateAction::Get { .. } }
        ));
    }
}
