//! Host page integration
//!
//! The page publishes its configuration object as `window.vitrineConfig` and
//! places a container element (id from `container`) holding the canvas. The
//! container carries the model path in `src`, an optional `proxy` template and
//! the entity id attribute. A `?model=` query parameter overrides `src`.

use bevy::prelude::*;
use tracing::warn;
use wasm_bindgen::JsValue;

use vitrine_core::ViewerConfig;

/// Global the host page stores its configuration object in
const CONFIG_GLOBAL: &str = "vitrineConfig";

/// What the viewer learned from the host page at startup
#[derive(Debug, Clone, Resource, Default)]
pub struct HostPage {
    pub source: Option<String>,
    pub entity_attribute: Option<String>,
    pub page_path: String,
    /// CSS selector of the render canvas
    pub canvas: String,
}

/// Raw values read from the DOM
#[derive(Debug, Clone, Default)]
pub struct PageAttributes {
    pub config_json: Option<String>,
    pub src: Option<String>,
    pub proxy: Option<String>,
    pub entity_id: Option<String>,
    pub model_param: Option<String>,
    pub page_path: String,
}

/// Combine the page values into the effective configuration
pub fn resolve(attributes: PageAttributes) -> (ViewerConfig, HostPage) {
    let mut config = match attributes.config_json.as_deref() {
        Some(json) => ViewerConfig::from_json_str(json).unwrap_or_else(|e| {
            warn!("Ignoring host configuration: {:#}", e);
            ViewerConfig::default()
        }),
        None => ViewerConfig::default(),
    };
    config.lightweight = config.lightweight.resolve(attributes.proxy.as_deref());

    let source = attributes
        .model_param
        .or(attributes.src)
        .filter(|s| !s.trim().is_empty());

    let page = HostPage {
        source,
        entity_attribute: attributes.entity_id,
        page_path: attributes.page_path,
        canvas: format!("#{} canvas", config.container),
    };
    (config, page)
}

/// Read the configuration and container attributes from the live page
pub fn read_host_page() -> (ViewerConfig, HostPage) {
    resolve(read_attributes())
}

fn read_attributes() -> PageAttributes {
    let mut attributes = PageAttributes::default();
    let Some(window) = web_sys::window() else {
        return attributes;
    };

    attributes.config_json = js_sys::Reflect::get(&js_sys::global(), &JsValue::from_str(CONFIG_GLOBAL))
        .ok()
        .filter(|value| !value.is_undefined() && !value.is_null())
        .and_then(|value| js_sys::JSON::stringify(&value).ok())
        .and_then(|json| json.as_string());

    let location = window.location();
    attributes.page_path = location.pathname().unwrap_or_default();
    if let Ok(href) = location.href() {
        if let Ok(url) = web_sys::Url::new(&href) {
            attributes.model_param = url.search_params().get("model");
        }
    }

    // The container id lives in the configuration itself
    let container = attributes
        .config_json
        .as_deref()
        .and_then(|json| ViewerConfig::from_json_str(json).ok())
        .unwrap_or_default();
    let element = window
        .document()
        .and_then(|document| document.get_element_by_id(&container.container));
    if let Some(element) = element {
        attributes.src = element.get_attribute("src");
        attributes.proxy = element.get_attribute("proxy");
        attributes.entity_id = element.get_attribute(&container.attribute_id);
    } else {
        warn!(container = %container.container, "Viewer container not found");
    }

    attributes
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrine_core::Lightweight;

    #[test]
    fn test_query_parameter_overrides_src() {
        let (_, page) = resolve(PageAttributes {
            src: Some("/models/a.glb".to_string()),
            model_param: Some("/models/b.glb".to_string()),
            ..Default::default()
        });
        assert_eq!(page.source.as_deref(), Some("/models/b.glb"));
    }

    #[test]
    fn test_requested_lightweight_uses_proxy_attribute() {
        let (config, _) = resolve(PageAttributes {
            config_json: Some(r#"{"lightweight": true, "container": "stage"}"#.to_string()),
            proxy: Some("/proxy?url=ORIG".to_string()),
            ..Default::default()
        });
        assert_eq!(config.lightweight, Lightweight::Proxy("/proxy?url=ORIG".to_string()));

        let (config, page) = resolve(PageAttributes {
            config_json: Some(r#"{"lightweight": true, "container": "stage"}"#.to_string()),
            ..Default::default()
        });
        assert_eq!(config.lightweight, Lightweight::Off);
        assert_eq!(page.canvas, "#stage canvas");
    }

    #[test]
    fn test_bad_config_falls_back_to_defaults() {
        let (config, page) = resolve(PageAttributes {
            config_json: Some("{not json".to_string()),
            src: Some("  ".to_string()),
            ..Default::default()
        });
        assert_eq!(config.domain, ViewerConfig::default().domain);
        assert!(page.source.is_none());
    }
}
