//! Vitrine Viewer - Browser 3D model viewer
//!
//! Embedded in repository entity pages. Loads the model named by the host
//! container, restores its saved view state and lets editors adjust and save
//! the presentation.

mod app;
mod capture;
mod editor;
mod gallery;
mod loader;
mod measure;
mod page;
mod ui;

use wasm_bindgen::prelude::*;

/// WASM entry point
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();

    tracing_wasm::set_as_global_default_with_config(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(tracing::Level::WARN)
            .build(),
    );

    app::run();
}
