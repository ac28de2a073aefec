//! Image gallery and fullscreen mode on the host page
//!
//! Elements carrying the gallery image class are gathered into a strip at the
//! top of the gallery container. Clicking an image opens it in a modal that
//! zooms with the mouse wheel; clicking anywhere outside closes it again.

use bevy::prelude::*;
use std::cell::Cell;
use std::rc::Rc;
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, HtmlImageElement, MouseEvent, Node, WheelEvent};

use vitrine_core::{Notice, ViewerConfig};
use vitrine_scene::types::Session;

pub const ZOOM_STEP: f32 = 0.1;
pub const MIN_ZOOM: f32 = 0.15;
pub const MAX_ZOOM: f32 = 5.0;
/// Scale a dismissed modal reopens at
pub const RESET_ZOOM: f32 = 1.5;

/// Height cap for a gallery holding a single thumbnail
const SINGLE_THUMBNAIL_HEIGHT: &str = "180px";

pub struct GalleryPlugin;

impl Plugin for GalleryPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<Fullscreen>()
            .add_systems(Startup, setup_gallery)
            .add_systems(Update, sync_fullscreen);
    }
}

/// Scale of the image shown in the gallery modal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageZoom(f32);

impl Default for ImageZoom {
    fn default() -> Self {
        Self(1.0)
    }
}

impl ImageZoom {
    pub fn scale(&self) -> f32 {
        self.0
    }

    /// Wheel down shrinks, wheel up enlarges, one step per event
    pub fn on_wheel(&mut self, delta_y: f64) -> f32 {
        if delta_y > 0.0 {
            self.0 = (self.0 - ZOOM_STEP).max(MIN_ZOOM);
        } else if delta_y < 0.0 {
            self.0 = (self.0 + ZOOM_STEP).min(MAX_ZOOM);
        }
        self.0
    }

    pub fn reset(&mut self) {
        self.0 = RESET_ZOOM;
    }

    pub fn css_transform(&self) -> String {
        format!("scale({})", self.0)
    }
}

/// Whether the viewer container is meant to fill the screen
#[derive(Debug, Clone, Copy, Resource, Default, PartialEq, Eq)]
pub struct Fullscreen {
    active: bool,
    /// The browser has reported fullscreen since the last request
    entered: bool,
}

impl Fullscreen {
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Flip the requested mode and return it
    pub fn toggle(&mut self) -> bool {
        self.active = !self.active;
        self.entered = false;
        self.active
    }

    /// Follow the browser leaving fullscreen on its own (Escape, F11).
    /// Returns whether the mode changed.
    pub fn sync(&mut self, document_fullscreen: bool) -> bool {
        if !self.active {
            return false;
        }
        if document_fullscreen {
            self.entered = true;
            return false;
        }
        if self.entered {
            self.active = false;
            self.entered = false;
            return true;
        }
        false
    }
}

fn document() -> Option<Document> {
    web_sys::window().and_then(|w| w.document())
}

/// Put the viewer container into or out of fullscreen
pub fn apply_fullscreen(container: &str, active: bool) -> Result<(), JsValue> {
    let document = document().ok_or_else(|| JsValue::from_str("No document"))?;
    if active {
        let element = document
            .get_element_by_id(container)
            .ok_or_else(|| JsValue::from_str("Viewer container not found"))?;
        element.request_fullscreen()
    } else {
        if document.fullscreen_element().is_some() {
            document.exit_fullscreen();
        }
        Ok(())
    }
}

fn sync_fullscreen(mut fullscreen: ResMut<Fullscreen>) {
    if !fullscreen.is_active() {
        return;
    }
    let in_fullscreen = document().is_some_and(|d| d.fullscreen_element().is_some());
    if fullscreen.sync(in_fullscreen) {
        debug!("Browser left fullscreen");
    }
}

fn setup_gallery(session: Res<Session>) {
    match build_gallery(session.config()) {
        Ok(0) => {}
        Ok(count) => debug!(count, "Built image gallery"),
        Err(e) => warn!("Building image gallery failed: {:?}", e),
    }
}

/// Toggle handler used by the editor panel
pub fn toggle_fullscreen(fullscreen: &mut Fullscreen, session: &mut Session) {
    let active = fullscreen.toggle();
    if let Err(e) = apply_fullscreen(&session.config().container, active) {
        fullscreen.toggle();
        warn!("Fullscreen request failed: {:?}", e);
        session.notify(Notice::error("Fullscreen is not available"));
    }
}

fn set_style(element: &HtmlElement, property: &str, value: &str) {
    if let Err(e) = element.style().set_property(property, value) {
        warn!(property, "Setting style failed: {:?}", e);
    }
}

fn html(element: Element) -> Result<HtmlElement, JsValue> {
    element
        .dyn_into::<HtmlElement>()
        .map_err(|_| JsValue::from_str("Element is not HTML"))
}

/// Gather gallery images into the container and wire up the modal.
/// Returns the number of gallery elements moved.
pub fn build_gallery(config: &ViewerConfig) -> Result<usize, JsValue> {
    let Some(document) = document() else {
        return Ok(0);
    };
    let Some(main) = document.get_element_by_id(&config.gallery_container) else {
        return Ok(0);
    };

    // Snapshot the live collection; moving elements mutates it
    let collection = document.get_elements_by_class_name(&config.gallery_image_class);
    let sources: Vec<Element> = (0..collection.length())
        .filter_map(|i| collection.item(i))
        .collect();
    if sources.is_empty() {
        return Ok(0);
    }

    let image_list = html(document.create_element("div")?)?;
    image_list.set_id("image-list");

    let modal = html(document.create_element("div")?)?;
    modal.set_id("modalGallery");
    modal.set_class_name("modalGallery");

    let modal_image: HtmlImageElement = document
        .create_element("img")?
        .dyn_into()
        .map_err(|_| JsValue::from_str("Element is not an image"))?;
    modal_image.set_class_name("modalImage");

    let close = html(document.create_element("span")?)?;
    close.set_class_name("closeGallery");
    close.set_title("Close");
    close.set_inner_text("\u{00d7}");

    let zoom = Rc::new(Cell::new(ImageZoom::default()));

    {
        let zoom = zoom.clone();
        let modal_image = modal_image.clone();
        let on_wheel = Closure::wrap(Box::new(move |event: WheelEvent| {
            event.prevent_default();
            event.stop_propagation();
            let mut current = zoom.get();
            current.on_wheel(event.delta_y());
            zoom.set(current);
            set_style(&modal_image, "transform", &current.css_transform());
        }) as Box<dyn FnMut(_)>);
        modal.add_event_listener_with_callback("wheel", on_wheel.as_ref().unchecked_ref())?;
        on_wheel.forget();
    }

    {
        let modal = modal.clone();
        let on_close = Closure::wrap(Box::new(move |_: MouseEvent| {
            set_style(&modal, "display", "none");
        }) as Box<dyn FnMut(_)>);
        close.add_event_listener_with_callback("click", on_close.as_ref().unchecked_ref())?;
        on_close.forget();
    }

    {
        let modal = modal.clone();
        let image_list = image_list.clone();
        let modal_image = modal_image.clone();
        let zoom = zoom.clone();
        let on_outside = Closure::wrap(Box::new(move |event: MouseEvent| {
            let target = event.target().and_then(|t| t.dyn_into::<Node>().ok());
            let target = target.as_ref();
            if modal.contains(target) || image_list.contains(target) {
                return;
            }
            set_style(&modal, "display", "none");
            let mut current = zoom.get();
            current.reset();
            zoom.set(current);
            set_style(&modal_image, "transform", &current.css_transform());
        }) as Box<dyn FnMut(_)>);
        document.add_event_listener_with_callback("click", on_outside.as_ref().unchecked_ref())?;
        on_outside.forget();
    }

    modal.append_child(&modal_image)?;
    modal.append_child(&close)?;

    for source in &sources {
        let anchors = source.get_elements_by_tag_name("a");
        for anchor in (0..anchors.length()).filter_map(|i| anchors.item(i)) {
            anchor.set_attribute("href", "#")?;
            anchor.set_attribute("class", "image-list-item")?;
        }

        let images = source.get_elements_by_tag_name("img");
        let images: Vec<HtmlImageElement> = (0..images.length())
            .filter_map(|i| images.item(i))
            .filter_map(|e| e.dyn_into::<HtmlImageElement>().ok())
            .collect();
        if let [only] = images.as_slice() {
            set_style(only, "max-width", "fit-content");
            set_style(only, "max-height", SINGLE_THUMBNAIL_HEIGHT);
        }
        for image in images {
            let modal = modal.clone();
            let image_list = image_list.clone();
            let modal_image = modal_image.clone();
            let shown = image.clone();
            let on_open = Closure::wrap(Box::new(move |_: MouseEvent| {
                set_style(&modal, "display", "block");
                set_style(&modal, "z-index", "999");
                set_style(&image_list, "z-index", "0");
                modal_image.set_src(&shown.src());
            }) as Box<dyn FnMut(_)>);
            image.add_event_listener_with_callback("click", on_open.as_ref().unchecked_ref())?;
            on_open.forget();
        }

        image_list.append_child(source)?;
    }

    let first = main.first_child();
    main.insert_before(&image_list, first.as_ref())?;
    main.insert_before(&modal, Some(&image_list))?;
    Ok(sources.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_zoom_steps_and_bounds() {
        let mut zoom = ImageZoom::default();
        assert!((zoom.on_wheel(-3.0) - 1.1).abs() < 1e-6);
        assert!((zoom.on_wheel(120.0) - 1.0).abs() < 1e-6);
        assert_eq!(zoom.on_wheel(0.0), zoom.scale());

        for _ in 0..100 {
            zoom.on_wheel(1.0);
        }
        assert_eq!(zoom.scale(), MIN_ZOOM);
        for _ in 0..100 {
            zoom.on_wheel(-1.0);
        }
        assert_eq!(zoom.scale(), MAX_ZOOM);

        zoom.reset();
        assert_eq!(zoom.css_transform(), "scale(1.5)");
    }

    #[test]
    fn test_fullscreen_follows_browser_exit() {
        let mut fullscreen = Fullscreen::default();
        assert!(!fullscreen.sync(false));

        assert!(fullscreen.toggle());
        // Request still pending in the browser
        assert!(!fullscreen.sync(false));
        assert!(fullscreen.is_active());
        assert!(!fullscreen.sync(true));
        assert!(fullscreen.is_active());

        // Escape pressed: browser dropped fullscreen without us
        assert!(fullscreen.sync(false));
        assert!(!fullscreen.is_active());
        assert!(fullscreen.toggle());
        assert!(!fullscreen.toggle());
        assert!(!fullscreen.sync(false));
    }
}
