// marker_engine: Rust/WASM engine behind the AR landing site.
// All state and decisions live here; JS forwards host events and applies the returned effects.

mod access;
mod controller;
mod effects;
mod error;
mod media;
mod theme;
mod types;

use wasm_bindgen::prelude::*;

pub use access::{normalize_code, AccessOutcome, ProjectEntry, ProjectIndex, SavedCodes};
pub use controller::{ControllerSnapshot, MarkerState, MarkerVideoController, Playback, VideoSlot};
pub use effects::{Control, Effect, EffectList};
pub use error::EngineError;
pub use media::{FlashControl, FlashState, QualityLevel, TorchReading};
pub use theme::{Rgb, SkyKeyframe, Theme, ThemePalette, MINUTES_PER_DAY};
pub use types::*;

/// Initialize panic hook and console logging.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    #[cfg(target_arch = "wasm32")]
    tracing_wasm::set_as_global_default_with_config(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(log_level())
            .build(),
    );
}

/// Transitions are logged in debug builds; release builds keep warnings only.
#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
fn log_level() -> tracing::Level {
    if cfg!(debug_assertions) {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    }
}

fn to_js(err: EngineError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Marker video controller exposed to JavaScript.
/// Every event handler returns the effect list as JSON: `{ "effects": [ { "type": ... } ] }`.
#[wasm_bindgen]
pub struct MarkerController {
    config: SceneConfig,
    inner: MarkerVideoController,
}

#[wasm_bindgen]
impl MarkerController {
    /// Parse and validate the scene configuration. A rejection means the scene must not be built.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<MarkerController, JsValue> {
        let config = SceneConfig::from_json(config_json).map_err(to_js)?;
        let inner = MarkerVideoController::new(&config).map_err(to_js)?;
        Ok(MarkerController { config, inner })
    }

    /// Attribute string for the AR scene element.
    pub fn tracker_attributes(&self) -> String {
        self.config.tracker_attributes()
    }

    /// Marker configs as JSON, in marker order, for building the video entities.
    pub fn markers_json(&self) -> Result<String, JsValue> {
        to_json(&self.config.markers)
    }

    pub fn on_scene_ready(&mut self) -> Result<String, JsValue> {
        to_json(&self.inner.on_scene_ready())
    }

    pub fn on_marker_found(&mut self, marker: u32) -> Result<String, JsValue> {
        let effects = self
            .inner
            .on_marker_found(MarkerIndex::new(marker))
            .map_err(to_js)?;
        to_json(&effects)
    }

    pub fn on_marker_lost(&mut self, marker: u32) -> Result<String, JsValue> {
        let effects = self
            .inner
            .on_marker_lost(MarkerIndex::new(marker))
            .map_err(to_js)?;
        to_json(&effects)
    }

    pub fn on_video_ended(&mut self, marker: u32, video: u32) -> Result<String, JsValue> {
        let effects = self
            .inner
            .on_video_ended(MarkerIndex::new(marker), VideoIndex::new(video))
            .map_err(to_js)?;
        to_json(&effects)
    }

    /// Called when `play()` rejects, typically the autoplay policy.
    pub fn on_play_rejected(&mut self, marker: u32, video: u32) -> Result<String, JsValue> {
        let effects = self
            .inner
            .on_play_rejected(MarkerIndex::new(marker), VideoIndex::new(video))
            .map_err(to_js)?;
        to_json(&effects)
    }

    pub fn rotate_manually(&mut self) -> Result<String, JsValue> {
        to_json(&self.inner.rotate_manually())
    }

    /// `reading_json` is `{ "supported": bool, "on": bool }`, or `null` without a camera track.
    pub fn toggle_flash(&mut self, reading_json: &str) -> Result<String, JsValue> {
        let reading: Option<TorchReading> = serde_json::from_str(reading_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid torch reading: {}", e)))?;
        to_json(&self.inner.toggle_flash(reading))
    }

    pub fn on_torch_applied(&mut self, success: bool) -> Result<String, JsValue> {
        to_json(&self.inner.on_torch_applied(success))
    }

    pub fn toggle_audio(&mut self) -> Result<String, JsValue> {
        to_json(&self.inner.toggle_audio())
    }

    /// `level` is `"high"` or `"low"`.
    pub fn set_quality(&mut self, level: &str) -> Result<String, JsValue> {
        let level: QualityLevel = level.parse().map_err(to_js)?;
        to_json(&self.inner.set_quality(level))
    }

    pub fn toggle_quality(&mut self) -> Result<String, JsValue> {
        let level = self.inner.quality().toggled();
        to_json(&self.inner.set_quality(level))
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        to_json(&self.inner.snapshot())
    }
}

/// Access-code router for the landing page.
#[wasm_bindgen]
pub struct AccessRouter {
    index: ProjectIndex,
    saved: SavedCodes,
}

#[wasm_bindgen]
impl AccessRouter {
    /// `saved_json` is whatever was kept in localStorage, if anything.
    #[wasm_bindgen(constructor)]
    pub fn new(index_json: &str, saved_json: Option<String>) -> Result<AccessRouter, JsValue> {
        let index = ProjectIndex::from_json(index_json).map_err(to_js)?;
        let saved = SavedCodes::from_storage(saved_json.as_deref());
        Ok(AccessRouter { index, saved })
    }

    /// Resolve a code; successful codes are remembered.
    pub fn submit(&mut self, code: &str) -> Result<String, JsValue> {
        let outcome = self.index.resolve(code);
        if matches!(outcome, AccessOutcome::Redirect { .. }) {
            self.saved.remember(code);
        }
        to_json(&outcome)
    }

    pub fn forget(&mut self, code: &str) -> bool {
        self.saved.forget(code)
    }

    pub fn clear_saved(&mut self) {
        self.saved.clear();
    }

    /// Saved codes, most recent first, ready for localStorage.
    pub fn saved_json(&self) -> Result<String, JsValue> {
        self.saved.to_storage().map_err(to_js)
    }
}

/// Theme for a minute of the day with the default palette.
#[wasm_bindgen]
pub fn theme_at(minute_of_day: u32) -> Result<String, JsValue> {
    to_json(&Theme::at(&ThemePalette::default(), minute_of_day))
}

/// Theme for the browser's local time.
#[wasm_bindgen]
pub fn theme_now() -> Result<String, JsValue> {
    let now = js_sys::Date::new_0();
    let minute = now.get_hours() * 60 + now.get_minutes();
    theme_at(minute)
}
