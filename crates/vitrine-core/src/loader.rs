//! Loader backend seam
//!
//! Parsing files is the rendering backend's business. The pipeline only
//! describes what to load (`LoadRequest`) and consumes what came back.

use std::future::Future;
use thiserror::Error;

use crate::format::LoadRequest;
use crate::scene::LoadedScene;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// Network or parse failure of the model itself
    #[error("Failed to load {url}: {message}")]
    Loader { url: String, message: String },
    /// The companion material file could not be fetched or parsed
    #[error("Companion file unavailable: {url}")]
    Companion { url: String },
}

/// A backend able to turn a `LoadRequest` into scene objects
pub trait SceneLoader {
    fn load(
        &mut self,
        request: &LoadRequest,
    ) -> impl Future<Output = Result<LoadedScene, LoadError>>;
}
