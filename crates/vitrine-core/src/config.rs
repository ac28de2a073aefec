//! Viewer configuration loading
//!
//! The host page hands the viewer a single configuration object. Keys use the
//! camelCase names the page scripts already emit, so the same document can be
//! read from JSON (inline in the page) or TOML (operator tooling).
//!
//! World space is right-handed with +Y up. "Ground" always means the Y = 0
//! plane; both the normalizer and the scene helpers rely on this.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Lightweight (proxied) delivery mode
///
/// Serialized as either a boolean or a proxy path template. `true` asks the
/// viewer to read the template from the container's `proxy` attribute.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "LightweightRepr", into = "LightweightRepr")]
pub enum Lightweight {
    #[default]
    Off,
    /// Enabled, template still to be read from the host page
    Requested,
    /// Enabled with a (possibly percent-encoded) proxy path template
    Proxy(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum LightweightRepr {
    Flag(bool),
    Template(String),
}

impl From<LightweightRepr> for Lightweight {
    fn from(repr: LightweightRepr) -> Self {
        match repr {
            LightweightRepr::Flag(false) => Lightweight::Off,
            LightweightRepr::Flag(true) => Lightweight::Requested,
            LightweightRepr::Template(t) if t.is_empty() => Lightweight::Off,
            LightweightRepr::Template(t) => Lightweight::Proxy(t),
        }
    }
}

impl From<Lightweight> for LightweightRepr {
    fn from(value: Lightweight) -> Self {
        match value {
            Lightweight::Off => LightweightRepr::Flag(false),
            Lightweight::Requested => LightweightRepr::Flag(true),
            Lightweight::Proxy(t) => LightweightRepr::Template(t),
        }
    }
}

impl Lightweight {
    /// Resolve a `Requested` mode against the container's `proxy` attribute.
    /// Without an attribute the viewer falls back to direct delivery.
    pub fn resolve(self, proxy_attribute: Option<&str>) -> Self {
        match self {
            Lightweight::Requested => match proxy_attribute {
                Some(t) if !t.is_empty() => Lightweight::Proxy(t.to_string()),
                _ => Lightweight::Off,
            },
            other => other,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Lightweight::Off)
    }

    pub fn proxy_template(&self) -> Option<&str> {
        match self {
            Lightweight::Proxy(t) => Some(t),
            _ => None,
        }
    }
}

/// Viewer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerConfig {
    /// Origin of the model repository (models, view state, save endpoints)
    #[serde(default = "default_domain")]
    pub domain: String,
    /// Origin serving the XML metadata export
    #[serde(default = "default_domain")]
    pub metadata_domain: String,
    /// DOM id of the element hosting the canvas
    #[serde(default = "default_container")]
    pub container: String,
    #[serde(default = "default_gallery_container")]
    pub gallery_container: String,
    #[serde(default = "default_gallery_image_class")]
    pub gallery_image_class: String,
    /// Base path of the viewer's static files
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// Page path pattern with a single `(.*)` capture for the entity id
    #[serde(default = "default_entity_id_uri")]
    pub entity_id_uri: String,
    #[serde(default = "default_view_entity_path")]
    pub view_entity_path: String,
    /// Container attribute carrying the entity id
    #[serde(default = "default_attribute_id")]
    pub attribute_id: String,
    #[serde(default)]
    pub lightweight: Lightweight,
    /// Form field carrying the view-state JSON on save
    #[serde(default = "default_save_field")]
    pub save_field: String,
    /// Mesh-compression decoder location (defaults under `basePath`)
    #[serde(default)]
    pub decoder_path: Option<String>,
    /// IFC parser runtime location (defaults under `basePath`)
    #[serde(default)]
    pub ifc_runtime_path: Option<String>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            metadata_domain: default_domain(),
            container: default_container(),
            gallery_container: default_gallery_container(),
            gallery_image_class: default_gallery_image_class(),
            base_path: default_base_path(),
            entity_id_uri: default_entity_id_uri(),
            view_entity_path: default_view_entity_path(),
            attribute_id: default_attribute_id(),
            lightweight: Lightweight::Off,
            save_field: default_save_field(),
            decoder_path: None,
            ifc_runtime_path: None,
        }
    }
}

fn default_domain() -> String {
    "http://localhost:8080".to_string()
}

fn default_container() -> String {
    "vitrine-viewer".to_string()
}

fn default_gallery_container() -> String {
    "vitrine-gallery".to_string()
}

fn default_gallery_image_class() -> String {
    "field--type-image".to_string()
}

fn default_base_path() -> String {
    "/viewer".to_string()
}

fn default_entity_id_uri() -> String {
    "/entity/(.*)/view".to_string()
}

fn default_view_entity_path() -> String {
    "/entity/".to_string()
}

fn default_attribute_id() -> String {
    "entity_id".to_string()
}

fn default_save_field() -> String {
    "view_state".to_string()
}

impl ViewerConfig {
    /// Parse the inline JSON object handed over by the host page
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid viewer configuration JSON")
    }

    pub fn decoder_path(&self) -> String {
        self.decoder_path
            .clone()
            .unwrap_or_else(|| format!("{}/decoders/draco/", self.base_path.trim_end_matches('/')))
    }

    pub fn ifc_runtime_path(&self) -> String {
        self.ifc_runtime_path
            .clone()
            .unwrap_or_else(|| format!("{}/decoders/ifc/", self.base_path.trim_end_matches('/')))
    }

    /// Page URL for an entity, used for "open entity" links
    pub fn entity_page_url(&self, entity_id: &str) -> String {
        format!("{}{}{}", self.domain, self.view_entity_path, entity_id)
    }
}

/// Load configuration from a TOML or JSON file, falling back to defaults
pub fn load_config(path: &Path) -> Result<ViewerConfig> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: ViewerConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => ViewerConfig::from_json_str(&content)?,
            _ => toml::from_str(&content)
                .with_context(|| format!("Invalid configuration in {}", path.display()))?,
        };
        info!(path = %path.display(), domain = %config.domain, "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(ViewerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lightweight_forms() {
        let cfg = ViewerConfig::from_json_str(r#"{"lightweight": false}"#).unwrap();
        assert_eq!(cfg.lightweight, Lightweight::Off);

        let cfg = ViewerConfig::from_json_str(r#"{"lightweight": true}"#).unwrap();
        assert_eq!(cfg.lightweight, Lightweight::Requested);

        let cfg = ViewerConfig::from_json_str(r#"{"lightweight": "/proxy?url=abc"}"#).unwrap();
        assert_eq!(cfg.lightweight.proxy_template(), Some("/proxy?url=abc"));
    }

    #[test]
    fn test_lightweight_resolve() {
        assert_eq!(
            Lightweight::Requested.resolve(Some("/p?u=x")),
            Lightweight::Proxy("/p?u=x".to_string())
        );
        assert_eq!(Lightweight::Requested.resolve(None), Lightweight::Off);
        assert_eq!(Lightweight::Off.resolve(Some("/p")), Lightweight::Off);
    }

    #[test]
    fn test_camel_case_keys() {
        let cfg = ViewerConfig::from_json_str(
            r#"{"domain": "https://repo.example", "metadataDomain": "https://meta.example",
                "basePath": "/modules/viewer", "entityIdUri": "/navigate/(.*)/view"}"#,
        )
        .unwrap();
        assert_eq!(cfg.metadata_domain, "https://meta.example");
        assert_eq!(cfg.decoder_path(), "/modules/viewer/decoders/draco/");
        assert_eq!(cfg.save_field, "view_state");
        assert_eq!(cfg.container, "vitrine-viewer");
    }

    #[test]
    fn test_load_config_missing_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let cfg = load_config(&temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.domain, "http://localhost:8080");
    }

    #[test]
    fn test_load_config_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vitrine.toml");
        std::fs::write(
            &path,
            "domain = \"https://repo.example\"\nlightweight = \"/proxy/%2Fmodel.glb\"\nsaveField = \"state\"\n",
        )
        .unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.domain, "https://repo.example");
        assert_eq!(cfg.save_field, "state");
        assert!(cfg.lightweight.is_enabled());
    }
}
