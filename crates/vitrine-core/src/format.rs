//! Format dispatch
//!
//! Maps a file extension onto exactly one loader strategy and works out every
//! URL the load needs: the model itself, companion files, decoder runtimes
//! and the fallbacks tried when the first attempt fails.

use thiserror::Error;
use tracing::{debug, info};

use crate::config::ViewerConfig;
use crate::loader::LoadError;
use crate::notice::Notice;
use crate::source::{proxy_path, ModelSource};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Extension not supported yet: {0}")]
    Unsupported(String),
}

/// Loader strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFormat {
    Obj,
    Fbx,
    Ply,
    Collada,
    Ifc,
    Stl,
    /// Plain point list
    Xyz,
    /// Point cloud data
    Pcd,
    /// Serialized engine object
    ObjectJson,
    ThreeDs,
    /// glTF, binary or text
    Gltf,
}

impl ModelFormat {
    pub const ALL: [ModelFormat; 11] = [
        ModelFormat::Obj,
        ModelFormat::Fbx,
        ModelFormat::Ply,
        ModelFormat::Collada,
        ModelFormat::Ifc,
        ModelFormat::Stl,
        ModelFormat::Xyz,
        ModelFormat::Pcd,
        ModelFormat::ObjectJson,
        ModelFormat::ThreeDs,
        ModelFormat::Gltf,
    ];

    pub fn from_extension(ext: &str) -> Option<Self> {
        let format = match ext.to_lowercase().as_str() {
            "obj" => ModelFormat::Obj,
            "fbx" => ModelFormat::Fbx,
            "ply" => ModelFormat::Ply,
            "dae" => ModelFormat::Collada,
            "ifc" => ModelFormat::Ifc,
            "stl" => ModelFormat::Stl,
            "xyz" => ModelFormat::Xyz,
            "pcd" => ModelFormat::Pcd,
            "json" => ModelFormat::ObjectJson,
            "3ds" => ModelFormat::ThreeDs,
            "glb" | "gltf" => ModelFormat::Gltf,
            _ => return None,
        };
        Some(format)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModelFormat::Obj => "OBJ",
            ModelFormat::Fbx => "FBX",
            ModelFormat::Ply => "PLY",
            ModelFormat::Collada => "COLLADA",
            ModelFormat::Ifc => "IFC",
            ModelFormat::Stl => "STL",
            ModelFormat::Xyz => "XYZ",
            ModelFormat::Pcd => "PCD",
            ModelFormat::ObjectJson => "JSON",
            ModelFormat::ThreeDs => "3DS",
            ModelFormat::Gltf => "glTF",
        }
    }

    /// Loader output is a hierarchy that has to be re-parented before moving
    pub fn needs_reparent(&self) -> bool {
        matches!(self, ModelFormat::Fbx)
    }
}

/// Archives the server extracts into a sibling directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    Zip,
    Rar,
    Tar,
    Gz,
    Xz,
}

impl ArchiveKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        let kind = match ext.to_lowercase().as_str() {
            "zip" => ArchiveKind::Zip,
            "rar" => ArchiveKind::Rar,
            "tar" => ArchiveKind::Tar,
            "gz" => ArchiveKind::Gz,
            "xz" => ArchiveKind::Xz,
            _ => return None,
        };
        Some(kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Model(ModelFormat),
    Archive(ArchiveKind),
    Unsupported(String),
}

impl Dispatch {
    pub fn from_extension(ext: &str) -> Self {
        if let Some(format) = ModelFormat::from_extension(ext) {
            Dispatch::Model(format)
        } else if let Some(kind) = ArchiveKind::from_extension(ext) {
            Dispatch::Archive(kind)
        } else {
            Dispatch::Unsupported(ext.to_lowercase())
        }
    }
}

/// One call into a loader backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub format: ModelFormat,
    pub url: String,
    /// Base directory for textures and other relative references
    pub resource_dir: String,
    /// Companion material library, loaded before the geometry
    pub materials: Option<String>,
    /// Decoder or parser runtime the loader needs (mesh compression, IFC)
    pub decoder: Option<String>,
    /// Zero for the first try
    pub attempt: u8,
}

/// What to do when the first request fails
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    None,
    /// Reload the geometry without its material library
    WithoutMaterials,
    /// Retry once at another location
    AlternatePath(String),
}

/// Next request after a failure, with the notice to show for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovery {
    pub request: LoadRequest,
    pub notice: Option<Notice>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadPlan {
    pub source: ModelSource,
    pub archive: Option<ArchiveKind>,
    pub request: LoadRequest,
    pub fallback: Fallback,
}

impl LoadPlan {
    pub fn build(source: &ModelSource, config: &ViewerConfig) -> Result<Self, DispatchError> {
        let proxied = |url: String| match config.lightweight.proxy_template() {
            Some(template) => proxy_path(template, &source.original, &url),
            None => url,
        };

        let plan = match Dispatch::from_extension(&source.extension) {
            Dispatch::Unsupported(ext) => return Err(DispatchError::Unsupported(ext)),
            Dispatch::Archive(kind) => {
                let dir = source.archive_dir();
                let url = format!("{}{}.glb", dir, source.basename);
                let alternate = format!("{}gltf/{}.glb", dir, source.basename);
                info!(url = %url, "Archive upload, loading extracted GLB");
                LoadPlan {
                    source: source.clone(),
                    archive: Some(kind),
                    request: LoadRequest {
                        format: ModelFormat::Gltf,
                        url: proxied(url),
                        resource_dir: dir,
                        materials: None,
                        decoder: Some(config.decoder_path()),
                        attempt: 0,
                    },
                    fallback: Fallback::AlternatePath(proxied(alternate)),
                }
            }
            Dispatch::Model(format) => {
                let (materials, decoder, fallback) = match format {
                    ModelFormat::Obj => (
                        Some(proxied(source.sibling("mtl"))),
                        None,
                        Fallback::WithoutMaterials,
                    ),
                    ModelFormat::Gltf => (
                        None,
                        Some(config.decoder_path()),
                        Fallback::AlternatePath(proxied(format!(
                            "{}gltf/{}",
                            source.dir, source.filename
                        ))),
                    ),
                    ModelFormat::Ifc => (None, Some(config.ifc_runtime_path()), Fallback::None),
                    _ => (None, None, Fallback::None),
                };
                LoadPlan {
                    source: source.clone(),
                    archive: None,
                    request: LoadRequest {
                        format,
                        url: proxied(source.original.clone()),
                        resource_dir: source.dir.clone(),
                        materials,
                        decoder,
                        attempt: 0,
                    },
                    fallback,
                }
            }
        };

        debug!(format = plan.request.format.name(), url = %plan.request.url, "Built load plan");
        Ok(plan)
    }

    /// Decide the follow-up after `failed` returned `error`.
    ///
    /// Each fallback is tried at most once; `None` means the load has failed.
    pub fn recover(&self, failed: &LoadRequest, error: &LoadError) -> Option<Recovery> {
        match (&self.fallback, error) {
            (Fallback::WithoutMaterials, LoadError::Companion { .. }) if failed.materials.is_some() => {
                Some(Recovery {
                    request: LoadRequest {
                        materials: None,
                        attempt: failed.attempt + 1,
                        ..failed.clone()
                    },
                    notice: Some(Notice::warning(
                        "Error occurred while loading attached MTL file.",
                    )),
                })
            }
            (Fallback::AlternatePath(url), LoadError::Loader { .. }) if failed.attempt == 0 => {
                info!(url = %url, "Retrying at alternate location");
                Some(Recovery {
                    request: LoadRequest {
                        url: url.clone(),
                        attempt: 1,
                        ..failed.clone()
                    },
                    notice: None,
                })
            }
            _ => None,
        }
    }

    /// Notice for a load that has run out of fallbacks
    pub fn failure_notice(&self, error: &LoadError) -> Notice {
        match (&self.fallback, error) {
            (Fallback::AlternatePath(_), _) => {
                Notice::error("Error occurred while loading attached GLB file.")
            }
            (_, LoadError::Loader { message, .. }) => Notice::error(format!(
                "Could not load {}: {}",
                self.source.filename, message
            )),
            (_, LoadError::Companion { url }) => {
                Notice::error(format!("Could not load companion file {}", url))
            }
        }
    }

    /// Extension of the file actually handed to the loader
    pub fn loaded_extension(&self) -> &str {
        if self.archive.is_some() {
            "glb"
        } else {
            &self.source.extension
        }
    }

    /// Storage path sent with saves and thumbnail uploads
    pub fn storage_path(&self, domain: &str) -> String {
        let uri = self.source.uri(domain);
        match self.archive {
            Some(_) => format!("{}{}", uri, self.source.archive_suffix()),
            None => uri,
        }
    }

    /// Location of the persisted view-state record.
    ///
    /// Archives keep their record next to the extracted files, under the
    /// same directory that `storage_path` sends with saves.
    pub fn view_state_url(&self) -> String {
        let dir = match self.archive {
            Some(_) => self.source.archive_dir(),
            None => self.source.dir.clone(),
        };
        format!("{}metadata/{}_viewer", dir.replace("gltf/", ""), self.source.filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Lightweight;

    fn plan(path: &str) -> LoadPlan {
        let source = ModelSource::parse(path).unwrap();
        LoadPlan::build(&source, &ViewerConfig::default()).unwrap()
    }

    #[test]
    fn test_every_supported_extension_maps_to_one_format() {
        let cases = [
            ("obj", ModelFormat::Obj),
            ("fbx", ModelFormat::Fbx),
            ("ply", ModelFormat::Ply),
            ("dae", ModelFormat::Collada),
            ("ifc", ModelFormat::Ifc),
            ("stl", ModelFormat::Stl),
            ("xyz", ModelFormat::Xyz),
            ("pcd", ModelFormat::Pcd),
            ("json", ModelFormat::ObjectJson),
            ("3ds", ModelFormat::ThreeDs),
            ("glb", ModelFormat::Gltf),
            ("gltf", ModelFormat::Gltf),
        ];
        for (ext, expected) in cases {
            assert_eq!(Dispatch::from_extension(ext), Dispatch::Model(expected), "{ext}");
            let matching = ModelFormat::ALL
                .iter()
                .filter(|f| ModelFormat::from_extension(ext) == Some(**f))
                .count();
            assert_eq!(matching, 1, "{ext}");
            let p = plan(&format!("/files/model.{}", ext.to_uppercase()));
            assert_eq!(p.request.format, expected);
        }
    }

    #[test]
    fn test_archives_and_unsupported() {
        for ext in ["zip", "rar", "tar", "gz", "xz"] {
            assert!(matches!(Dispatch::from_extension(ext), Dispatch::Archive(_)));
        }
        assert_eq!(
            Dispatch::from_extension("BLEND"),
            Dispatch::Unsupported("blend".to_string())
        );
        let source = ModelSource::parse("/files/model.blend").unwrap();
        assert_eq!(
            LoadPlan::build(&source, &ViewerConfig::default()),
            Err(DispatchError::Unsupported("blend".to_string()))
        );
    }

    #[test]
    fn test_obj_plan_falls_back_without_materials() {
        let p = plan("/files/bust.obj");
        assert_eq!(p.request.materials.as_deref(), Some("/files/bust.mtl"));

        let err = LoadError::Companion {
            url: "/files/bust.mtl".to_string(),
        };
        let recovery = p.recover(&p.request, &err).unwrap();
        assert_eq!(recovery.request.materials, None);
        assert_eq!(recovery.request.url, "/files/bust.obj");
        assert!(recovery.notice.is_some());

        // Geometry failure after that is terminal
        let err = LoadError::Loader {
            url: "/files/bust.obj".to_string(),
            message: "404".to_string(),
        };
        assert_eq!(p.recover(&recovery.request, &err), None);
    }

    #[test]
    fn test_archive_plan_retries_once() {
        let p = plan("https://repo.example/files/ship.ZIP");
        assert_eq!(p.archive, Some(ArchiveKind::Zip));
        assert_eq!(p.request.format, ModelFormat::Gltf);
        assert_eq!(p.request.url, "https://repo.example/files/ship_ZIP/ship.glb");
        assert_eq!(p.loaded_extension(), "glb");
        assert_eq!(p.storage_path("https://repo.example"), "files/ship_ZIP/");
        assert_eq!(
            p.view_state_url(),
            "https://repo.example/files/ship_ZIP/metadata/ship.ZIP_viewer"
        );

        let err = LoadError::Loader {
            url: p.request.url.clone(),
            message: "404".to_string(),
        };
        let retry = p.recover(&p.request, &err).unwrap();
        assert_eq!(retry.request.url, "https://repo.example/files/ship_ZIP/gltf/ship.glb");
        assert_eq!(retry.request.attempt, 1);
        assert_eq!(p.recover(&retry.request, &err), None);
        assert_eq!(
            p.failure_notice(&err).message,
            "Error occurred while loading attached GLB file."
        );
    }

    #[test]
    fn test_view_state_url_follows_storage_dir() {
        let direct = plan("https://repo.example/files/gltf/ship.glb");
        assert_eq!(
            direct.view_state_url(),
            "https://repo.example/files/metadata/ship.glb_viewer"
        );

        let archive = plan("https://repo.example/files/bust.rar");
        assert_eq!(
            archive.view_state_url(),
            "https://repo.example/files/bust_RAR/metadata/bust.rar_viewer"
        );
        // Record sits under the directory saves are posted to
        let stored = archive.storage_path("https://repo.example");
        assert!(archive.view_state_url().contains(&format!("{}metadata/", stored)));
    }

    #[test]
    fn test_gltf_plan_has_decoder() {
        let p = plan("/files/ship.glb");
        assert_eq!(p.request.decoder.as_deref(), Some("/viewer/decoders/draco/"));
        assert_eq!(p.fallback, Fallback::AlternatePath("/files/gltf/ship.glb".to_string()));
    }

    #[test]
    fn test_simple_formats_have_no_fallback() {
        let p = plan("/files/part.stl");
        let err = LoadError::Loader {
            url: p.request.url.clone(),
            message: "parse error".to_string(),
        };
        assert_eq!(p.recover(&p.request, &err), None);
        assert_eq!(
            p.failure_notice(&err).message,
            "Could not load part.stl: parse error"
        );
    }

    #[test]
    fn test_lightweight_rewrites_through_proxy() {
        let source = ModelSource::parse("/files/ship.zip").unwrap();
        let config = ViewerConfig {
            lightweight: Lightweight::Proxy("/proxy?file=%2Ffiles%2Fship.zip".to_string()),
            ..ViewerConfig::default()
        };
        let p = LoadPlan::build(&source, &config).unwrap();
        assert_eq!(p.request.url, "/proxy?file=%2Ffiles%2Fship_ZIP%2Fship.glb");
    }
}
