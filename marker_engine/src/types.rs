// Strong typing over raw indices. Newtypes for marker and video positions, serde config types.
// Configuration arrives from JS as JSON and is validated once, before the scene is built.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Marker index, assigned by configuration order. Newtype for type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct MarkerIndex(u32);

impl MarkerIndex {
    pub fn new(index: u32) -> Self {
        MarkerIndex(index)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

/// Position of a video inside its marker's rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct VideoIndex(u32);

impl VideoIndex {
    pub fn new(index: u32) -> Self {
        VideoIndex(index)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }

    /// Next index in a rotation of `len` videos, wrapping to 0.
    pub fn next(&self, len: usize) -> Self {
        if len == 0 {
            return VideoIndex(0);
        }
        VideoIndex(((self.as_usize() + 1) % len) as u32)
    }
}

/// A playable video attached to a marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSource {
    pub src: String,
    /// Render width in scene units.
    pub width: f32,
    /// Render height in scene units.
    pub height: f32,
}

/// One tracked image target and its video rotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub videos: Vec<VideoSource>,
}

/// Tracker tuning passed through to the AR scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingSettings {
    /// Maximum number of markers tracked at once.
    #[serde(default = "default_max_track")]
    pub max_track: u32,
    /// One-euro filter minimum cutoff.
    #[serde(default = "default_filter_min_cf")]
    pub filter_min_cf: f64,
    /// One-euro filter speed coefficient.
    #[serde(default = "default_filter_beta")]
    pub filter_beta: f64,
    /// Frames a target must be seen before "found" fires.
    #[serde(default = "default_warmup_tolerance")]
    pub warmup_tolerance: u32,
    /// Frames a target may be missed before "lost" fires.
    #[serde(default = "default_miss_tolerance")]
    pub miss_tolerance: u32,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        TrackingSettings {
            max_track: default_max_track(),
            filter_min_cf: default_filter_min_cf(),
            filter_beta: default_filter_beta(),
            warmup_tolerance: default_warmup_tolerance(),
            miss_tolerance: default_miss_tolerance(),
        }
    }
}

fn default_max_track() -> u32 {
    1
}

fn default_filter_min_cf() -> f64 {
    0.0001
}

fn default_filter_beta() -> f64 {
    0.001
}

fn default_warmup_tolerance() -> u32 {
    5
}

fn default_miss_tolerance() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

/// Scene configuration passed from JS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Compiled image-target file consumed by the tracker.
    pub target_src: String,
    #[serde(default)]
    pub tracking: TrackingSettings,
    /// Videos start muted so the browser allows autoplay.
    #[serde(default = "default_true")]
    pub start_muted: bool,
    pub markers: Vec<MarkerConfig>,
}

impl SceneConfig {
    /// Parse and validate a configuration document.
    pub fn from_json(json: &str) -> Result<SceneConfig, EngineError> {
        let config: SceneConfig = serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.target_src.trim().is_empty() {
            return Err(EngineError::InvalidConfig("target_src is empty".to_string()));
        }
        if self.tracking.max_track == 0 {
            return Err(EngineError::InvalidConfig(
                "tracking.max_track must be at least 1".to_string(),
            ));
        }
        if self.markers.is_empty() {
            return Err(EngineError::InvalidConfig("no markers declared".to_string()));
        }

        for (i, marker) in self.markers.iter().enumerate() {
            if marker.videos.is_empty() {
                return Err(EngineError::InvalidConfig(format!("marker {} has no videos", i)));
            }
            for (j, video) in marker.videos.iter().enumerate() {
                if video.src.trim().is_empty() {
                    return Err(EngineError::InvalidConfig(format!(
                        "marker {} video {} has an empty source",
                        i, j
                    )));
                }
                if !(video.width > 0.0 && video.height > 0.0) {
                    return Err(EngineError::InvalidConfig(format!(
                        "marker {} video {} has non-positive dimensions",
                        i, j
                    )));
                }
            }
        }

        Ok(())
    }

    /// Attribute string for the AR scene element.
    pub fn tracker_attributes(&self) -> String {
        let t = &self.tracking;
        format!(
            "imageTargetSrc: {}; maxTrack: {}; filterMinCF: {}; filterBeta: {}; warmupTolerance: {}; missTolerance: {}",
            self.target_src,
            t.max_track,
            t.filter_min_cf,
            t.filter_beta,
            t.warmup_tolerance,
            t.miss_tolerance
        )
    }
}
