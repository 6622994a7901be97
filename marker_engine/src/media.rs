// Flash/torch, audio and quality controls.
// The engine never touches the camera track itself: JS reads the torch capability,
// the engine decides, JS applies the constraint and reports back.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::effects::{Control, Effect, EffectList};
use crate::error::EngineError;

/// Torch capability and current setting read from the camera video track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorchReading {
    pub supported: bool,
    #[serde(default)]
    pub on: bool,
}

/// Flash control state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FlashState {
    /// Not toggled yet.
    #[default]
    Unknown,
    /// No camera track was available.
    NoCamera,
    /// The track has no torch capability.
    Unsupported,
    Off,
    On,
    /// Constraint requested, waiting for the result.
    Pending { target: bool },
}

#[derive(Debug, Clone, Default)]
pub struct FlashControl {
    state: FlashState,
}

impl FlashControl {
    pub fn new() -> Self {
        FlashControl::default()
    }

    pub fn state(&self) -> FlashState {
        self.state
    }

    /// Handle a flash button press given what the camera track reports.
    pub fn toggle(&mut self, reading: Option<TorchReading>) -> EffectList {
        let mut effects = EffectList::new();

        let reading = match reading {
            Some(reading) => reading,
            None => {
                debug!("flash toggle without a camera track");
                self.state = FlashState::NoCamera;
                disable(&mut effects, "No camera");
                return effects;
            }
        };

        if !reading.supported {
            debug!("torch capability not supported");
            self.state = FlashState::Unsupported;
            disable(&mut effects, "Flash not supported");
            return effects;
        }

        let target = !reading.on;
        self.state = FlashState::Pending { target };
        effects.push(Effect::RequestTorch { on: target });
        effects
    }

    /// Result of applying the torch constraint. The label only changes on success.
    pub fn on_applied(&mut self, success: bool) -> EffectList {
        let mut effects = EffectList::new();

        let target = match self.state {
            FlashState::Pending { target } => target,
            other => {
                debug!(?other, "torch result without a pending request");
                return effects;
            }
        };

        if success {
            self.state = if target { FlashState::On } else { FlashState::Off };
            effects.push(Effect::SetControlLabel {
                control: Control::Flash,
                label: flash_label(target).to_string(),
            });
        } else {
            warn!(requested = target, "torch constraint rejected");
            self.state = if target { FlashState::Off } else { FlashState::On };
        }

        effects
    }

    /// Initial label for a freshly built scene.
    pub fn reset(&mut self) -> EffectList {
        self.state = FlashState::Unknown;
        EffectList::from(vec![
            Effect::SetControlEnabled {
                control: Control::Flash,
                enabled: true,
            },
            Effect::SetControlLabel {
                control: Control::Flash,
                label: flash_label(false).to_string(),
            },
        ])
    }
}

fn disable(effects: &mut EffectList, label: &str) {
    effects.push(Effect::SetControlEnabled {
        control: Control::Flash,
        enabled: false,
    });
    effects.push(Effect::SetControlLabel {
        control: Control::Flash,
        label: label.to_string(),
    });
}

fn flash_label(on: bool) -> &'static str {
    if on {
        "Flash: ON"
    } else {
        "Flash: OFF"
    }
}

pub fn audio_label(muted: bool) -> &'static str {
    if muted {
        "Sound: OFF"
    } else {
        "Sound: ON"
    }
}

/// Render quality. Only affects the antialias hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QualityLevel {
    #[default]
    High,
    Low,
}

impl QualityLevel {
    pub fn antialias(&self) -> bool {
        matches!(self, QualityLevel::High)
    }

    pub fn label(&self) -> &'static str {
        match self {
            QualityLevel::High => "Quality: High",
            QualityLevel::Low => "Quality: Low",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            QualityLevel::High => QualityLevel::Low,
            QualityLevel::Low => QualityLevel::High,
        }
    }
}

impl FromStr for QualityLevel {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(QualityLevel::High),
            "low" => Ok(QualityLevel::Low),
            other => Err(EngineError::InvalidQuality(other.to_string())),
        }
    }
}

/// Effects for switching to `level`.
pub fn quality_effects(level: QualityLevel) -> EffectList {
    EffectList::from(vec![
        Effect::SetAntialias {
            enabled: level.antialias(),
        },
        Effect::SetControlLabel {
            control: Control::Quality,
            label: level.label().to_string(),
        },
    ])
}
