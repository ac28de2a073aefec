//! Repository HTTP client
//!
//! Talks to the model repository: view-state records, the save endpoint,
//! thumbnail uploads and the XML metadata export. Requests carry no timeout
//! and are never retried; callers turn failures into notices.

use reqwest::header::CACHE_CONTROL;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::future::Future;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ViewerConfig;
use crate::view_state::ViewState;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Server returned {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Upload rejected: {0}")]
    Rejected(String),
}

/// A save of one view-state record
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub state: ViewState,
    /// Storage path of the model directory
    pub path: String,
    pub filename: String,
}

/// A rendered preview for the repository listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailUpload {
    /// Model basename; the server appends the image extension
    pub filename: String,
    pub path: String,
    pub png: Vec<u8>,
    pub entity_id: String,
}

/// Persistence of view-state records
pub trait ViewStateStore {
    /// `Ok(None)` when no record exists or the stored body is unusable
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Option<ViewState>, StoreError>>;

    fn save(&self, request: &SaveRequest) -> impl Future<Output = Result<(), StoreError>>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// reqwest-backed repository client
#[derive(Debug, Clone)]
pub struct RepositoryClient {
    client: Client,
    domain: String,
    metadata_domain: String,
    save_field: String,
}

impl RepositoryClient {
    pub fn new(config: &ViewerConfig) -> Result<Self, StoreError> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            domain: config.domain.trim_end_matches('/').to_string(),
            metadata_domain: config.metadata_domain.trim_end_matches('/').to_string(),
            save_field: config.save_field.clone(),
        })
    }

    pub fn save_url(&self) -> String {
        format!("{}/editor.php", self.domain)
    }

    pub fn thumbnail_url(&self) -> String {
        format!("{}/thumbnail_upload.php", self.domain)
    }

    pub fn metadata_url(&self, entity_id: &str) -> String {
        format!(
            "{}/export_xml_single/{}?page=0&_format=xml",
            self.metadata_domain, entity_id
        )
    }

    /// Upload a PNG preview; returns the server's message
    pub async fn upload_thumbnail(&self, upload: &ThumbnailUpload) -> Result<String, StoreError> {
        let url = self.thumbnail_url();
        let data = Part::bytes(upload.png.clone())
            .file_name(format!("{}.png", upload.filename))
            .mime_str("image/png")?;
        let form = Form::new()
            .text("filename", upload.filename.clone())
            .text("path", upload.path.clone())
            .part("data", data)
            .text("entity_id", upload.entity_id.clone());

        let response = self.client.post(&url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body: UploadResponse = serde_json::from_str(&response.text().await?)?;
        match body.error {
            Some(error) => Err(StoreError::Rejected(error)),
            None => {
                info!(filename = %upload.filename, "Thumbnail uploaded");
                Ok(body.message.unwrap_or_else(|| "Thumbnail saved.".to_string()))
            }
        }
    }

    /// Fetch the XML metadata export of an entity
    pub async fn fetch_metadata(&self, entity_id: &str) -> Result<String, StoreError> {
        let url = self.metadata_url(entity_id);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                url,
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

impl ViewStateStore for RepositoryClient {
    async fn fetch(&self, url: &str) -> Result<Option<ViewState>, StoreError> {
        let response = self
            .client
            .get(url)
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(url = %url, "No saved view state");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(StoreError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        match ViewState::from_json_lenient(&body) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                warn!(url = %url, error = %e, "Stored view state is not valid JSON, ignoring");
                Ok(None)
            }
        }
    }

    async fn save(&self, request: &SaveRequest) -> Result<(), StoreError> {
        let url = self.save_url();
        let payload = request.state.to_pretty_json()?;
        let response = self
            .client
            .post(&url)
            .form(&[
                (self.save_field.as_str(), payload.as_str()),
                ("path", request.path.as_str()),
                ("filename", request.filename.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                url,
                status: status.as_u16(),
            });
        }
        info!(path = %request.path, filename = %request.filename, "View state saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Form as AxumForm, Multipart, State};
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use glam::Vec3;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Vec<HashMap<String, String>>>>;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn saved_state(headers: HeaderMap) -> (AxumStatus, String) {
        let cache = headers
            .get("cache-control")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if cache != "no-cache" {
            return (AxumStatus::BAD_REQUEST, String::new());
        }
        (
            AxumStatus::OK,
            r#"{"objPosition":[1,2,3],"lightIntensity":[0.4]}"#.to_string(),
        )
    }

    async fn editor(State(captured): State<Captured>, AxumForm(form): AxumForm<HashMap<String, String>>) -> &'static str {
        captured.lock().unwrap().push(form);
        "ok"
    }

    async fn thumbnail(State(captured): State<Captured>, mut multipart: Multipart) -> Json<serde_json::Value> {
        let mut fields = HashMap::new();
        while let Some(field) = multipart.next_field().await.unwrap() {
            let name = field.name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.unwrap();
            fields.insert(name, bytes.len().to_string());
        }
        captured.lock().unwrap().push(fields);
        Json(serde_json::json!({ "message": "Thumbnail stored" }))
    }

    fn client(base: &str) -> RepositoryClient {
        RepositoryClient::new(&ViewerConfig {
            domain: base.to_string(),
            metadata_domain: base.to_string(),
            ..ViewerConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_found_not_found_and_malformed() {
        let router = Router::new()
            .route("/files/metadata/ship.glb_viewer", get(saved_state))
            .route("/files/metadata/broken.glb_viewer", get(|| async { "<html>oops</html>" }));
        let base = serve(router).await;
        let store = client(&base);

        let state = store
            .fetch(&format!("{}/files/metadata/ship.glb_viewer", base))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.obj_position, Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(state.light_intensity, Some(0.4));

        let missing = store
            .fetch(&format!("{}/files/metadata/none.glb_viewer", base))
            .await
            .unwrap();
        assert_eq!(missing, None);

        let broken = store
            .fetch(&format!("{}/files/metadata/broken.glb_viewer", base))
            .await
            .unwrap();
        assert_eq!(broken, None);
    }

    #[tokio::test]
    async fn test_save_posts_form() {
        let captured: Captured = Arc::default();
        let router = Router::new()
            .route("/editor.php", post(editor))
            .with_state(captured.clone());
        let base = serve(router).await;
        let store = client(&base);

        let request = SaveRequest {
            state: ViewState {
                obj_scale: Some(Vec3::ONE),
                ..ViewState::default()
            },
            path: "files/ship_ZIP/".to_string(),
            filename: "ship.zip".to_string(),
        };
        store.save(&request).await.unwrap();

        let forms = captured.lock().unwrap();
        assert_eq!(forms.len(), 1);
        assert_eq!(forms[0]["path"], "files/ship_ZIP/");
        assert_eq!(forms[0]["filename"], "ship.zip");
        let payload = &forms[0]["view_state"];
        assert!(payload.contains("\t\"objScale\""));
    }

    #[tokio::test]
    async fn test_save_surfaces_network_failure() {
        let store = client("http://127.0.0.1:9");
        let request = SaveRequest {
            state: ViewState::default(),
            path: String::new(),
            filename: "a.glb".to_string(),
        };
        assert!(store.save(&request).await.is_err());
    }

    #[tokio::test]
    async fn test_thumbnail_upload() {
        let captured: Captured = Arc::default();
        let router = Router::new()
            .route("/thumbnail_upload.php", post(thumbnail))
            .with_state(captured.clone());
        let base = serve(router).await;
        let store = client(&base);

        let message = store
            .upload_thumbnail(&ThumbnailUpload {
                filename: "ship".to_string(),
                path: "files/".to_string(),
                png: vec![0x89, b'P', b'N', b'G'],
                entity_id: "42".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(message, "Thumbnail stored");

        let fields = captured.lock().unwrap();
        assert_eq!(fields[0]["data"], "4");
        assert!(fields[0].contains_key("entity_id"));
        assert!(fields[0].contains_key("filename"));
        assert!(fields[0].contains_key("path"));
    }

    #[tokio::test]
    async fn test_thumbnail_rejected() {
        let router = Router::new().route(
            "/thumbnail_upload.php",
            post(|| async { Json(serde_json::json!({ "error": "Not allowed" })) }),
        );
        let base = serve(router).await;
        let err = client(&base)
            .upload_thumbnail(&ThumbnailUpload {
                filename: "ship".to_string(),
                path: String::new(),
                png: Vec::new(),
                entity_id: String::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected(msg) if msg == "Not allowed"));
    }

    #[test]
    fn test_metadata_url() {
        let store = RepositoryClient::new(&ViewerConfig {
            metadata_domain: "https://meta.example/".to_string(),
            ..ViewerConfig::default()
        })
        .unwrap();
        assert_eq!(
            store.metadata_url("abc"),
            "https://meta.example/export_xml_single/abc?page=0&_format=xml"
        );
    }
}
