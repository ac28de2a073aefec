//! Thumbnail capture from the render canvas
//!
//! The center square of the canvas is scaled onto a 256x256 2D canvas and
//! encoded as PNG by the browser.

use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Blob, CanvasRenderingContext2d, HtmlCanvasElement};

pub const THUMBNAIL_SIZE: u32 = 256;

/// Source rectangle (x, y, side) of the largest centered square
pub fn square_crop(width: u32, height: u32) -> (f64, f64, f64) {
    let side = width.min(height) as f64;
    let x = (width as f64 - side) / 2.0;
    let y = (height as f64 - side) / 2.0;
    (x, y, side)
}

/// Render the canvas matched by `selector` into PNG bytes
pub async fn capture_png(selector: &str) -> Result<Vec<u8>, String> {
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or("No document")?;

    let source: HtmlCanvasElement = document
        .query_selector(selector)
        .map_err(|_| format!("Invalid canvas selector {}", selector))?
        .ok_or("Canvas not found")?
        .dyn_into()
        .map_err(|_| "Element is not a canvas")?;

    let thumbnail: HtmlCanvasElement = document
        .create_element("canvas")
        .map_err(|_| "Failed to create canvas")?
        .dyn_into()
        .map_err(|_| "Element is not a canvas")?;
    thumbnail.set_width(THUMBNAIL_SIZE);
    thumbnail.set_height(THUMBNAIL_SIZE);

    let context: CanvasRenderingContext2d = thumbnail
        .get_context("2d")
        .map_err(|_| "2D context unavailable")?
        .ok_or("2D context unavailable")?
        .dyn_into()
        .map_err(|_| "2D context unavailable")?;

    let (x, y, side) = square_crop(source.width(), source.height());
    let size = THUMBNAIL_SIZE as f64;
    context
        .draw_image_with_html_canvas_element_and_sw_and_sh_and_dx_and_dy_and_dw_and_dh(
            &source, x, y, side, side, 0.0, 0.0, size, size,
        )
        .map_err(|e| format!("Drawing canvas failed: {:?}", e))?;

    let mut encode = |resolve: js_sys::Function, _reject: js_sys::Function| {
        if let Err(e) = thumbnail.to_blob_with_type(&resolve, "image/png") {
            tracing::warn!("Canvas encoding failed: {:?}", e);
        }
    };
    let blob: Blob = JsFuture::from(js_sys::Promise::new(&mut encode))
        .await
        .map_err(|e| format!("Canvas encoding failed: {:?}", e))?
        .dyn_into()
        .map_err(|_| "Canvas is empty")?;

    let buffer = JsFuture::from(blob.array_buffer())
        .await
        .map_err(|e| format!("Reading PNG failed: {:?}", e))?;
    Ok(js_sys::Uint8Array::new(&buffer).to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_crop_centers_on_long_side() {
        assert_eq!(square_crop(800, 600), (100.0, 0.0, 600.0));
        assert_eq!(square_crop(300, 500), (0.0, 100.0, 300.0));
        assert_eq!(square_crop(256, 256), (0.0, 0.0, 256.0));
    }
}
