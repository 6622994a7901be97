// Side-effect commands returned to JS. The engine decides, JS applies them in order.

use serde::{Deserialize, Serialize};

use crate::types::{MarkerIndex, VideoIndex};

/// UI control a label/enabled effect targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Control {
    Flash,
    Audio,
    Quality,
    Rotate,
}

/// Single command for the JS glue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Effect {
    /// Make a video entity visible in the scene.
    ShowVideo { marker: MarkerIndex, video: VideoIndex },
    HideVideo { marker: MarkerIndex, video: VideoIndex },
    /// Start playback. A looping video never fires "ended".
    PlayVideo {
        marker: MarkerIndex,
        video: VideoIndex,
        looping: bool,
    },
    PauseVideo { marker: MarkerIndex, video: VideoIndex },
    /// Seek to time 0.
    RewindVideo { marker: MarkerIndex, video: VideoIndex },
    SetMuted {
        marker: MarkerIndex,
        video: VideoIndex,
        muted: bool,
    },
    /// Register the "ended" callback that drives auto-advance.
    AttachEndedListener { marker: MarkerIndex, video: VideoIndex },
    DetachEndedListener { marker: MarkerIndex, video: VideoIndex },
    ShowControl { control: Control },
    HideControl { control: Control },
    SetControlEnabled { control: Control, enabled: bool },
    SetControlLabel { control: Control, label: String },
    /// Apply the torch constraint on the camera track.
    RequestTorch { on: bool },
    /// Renderer antialias hint.
    SetAntialias { enabled: bool },
}

/// Ordered effect list produced by one transition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectList {
    pub effects: Vec<Effect>,
}

impl EffectList {
    pub fn new() -> Self {
        EffectList::default()
    }

    pub fn push(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn extend(&mut self, other: EffectList) {
        self.effects.extend(other.effects);
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Effect> {
        self.effects.iter()
    }

    pub fn contains(&self, effect: &Effect) -> bool {
        self.effects.contains(effect)
    }
}

impl From<Vec<Effect>> for EffectList {
    fn from(effects: Vec<Effect>) -> Self {
        EffectList { effects }
    }
}
