// Day/night theme for the 404 page: time of day -> sky color and star visibility.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn lerp(&self, other: &Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        Rgb {
            r: lerp_channel(self.r, other.r, t),
            g: lerp_channel(self.g, other.g, t),
            b: lerp_channel(self.b, other.b, t),
        }
    }

    /// Relative luminance, 0.0 to 1.0.
    pub fn luminance(&self) -> f32 {
        (0.2126 * self.r as f32 + 0.7152 * self.g as f32 + 0.0722 * self.b as f32) / 255.0
    }
}

fn lerp_channel(a: u8, b: u8, t: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * t).round() as u8
}

/// Sky color at a minute of the day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkyKeyframe {
    pub minute: u32,
    pub color: Rgb,
}

/// Keyframed sky colors plus the dawn/dusk windows that fade stars.
/// Deserialization goes through `ThemePalette::new`, so a loaded palette is sorted and validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PaletteFile")]
pub struct ThemePalette {
    keyframes: Vec<SkyKeyframe>,
    /// Stars fade out over [dawn_start, dawn_end].
    dawn: (u32, u32),
    /// Stars fade in over [dusk_start, dusk_end].
    dusk: (u32, u32),
}

#[derive(Deserialize)]
struct PaletteFile {
    keyframes: Vec<SkyKeyframe>,
    dawn: (u32, u32),
    dusk: (u32, u32),
}

impl TryFrom<PaletteFile> for ThemePalette {
    type Error = EngineError;

    fn try_from(file: PaletteFile) -> Result<Self, Self::Error> {
        ThemePalette::new(file.keyframes, file.dawn, file.dusk)
    }
}

impl Default for ThemePalette {
    fn default() -> Self {
        ThemePalette {
            keyframes: vec![
                SkyKeyframe { minute: 0, color: Rgb::new(0x0b, 0x10, 0x26) },
                SkyKeyframe { minute: 300, color: Rgb::new(0x1b, 0x2a, 0x4a) },
                SkyKeyframe { minute: 390, color: Rgb::new(0xf6, 0xa6, 0x6b) },
                SkyKeyframe { minute: 480, color: Rgb::new(0x87, 0xce, 0xeb) },
                SkyKeyframe { minute: 1020, color: Rgb::new(0x87, 0xce, 0xeb) },
                SkyKeyframe { minute: 1140, color: Rgb::new(0xfd, 0x5e, 0x53) },
                SkyKeyframe { minute: 1260, color: Rgb::new(0x0b, 0x10, 0x26) },
            ],
            dawn: (300, 420),
            dusk: (1140, 1260),
        }
    }
}

impl ThemePalette {
    pub fn new(
        mut keyframes: Vec<SkyKeyframe>,
        dawn: (u32, u32),
        dusk: (u32, u32),
    ) -> Result<Self, EngineError> {
        if keyframes.is_empty() {
            return Err(EngineError::InvalidConfig("theme has no keyframes".to_string()));
        }
        if let Some(bad) = keyframes.iter().find(|k| k.minute >= MINUTES_PER_DAY) {
            return Err(EngineError::InvalidConfig(format!(
                "keyframe minute {} is past midnight",
                bad.minute
            )));
        }
        for (start, end) in [dawn, dusk] {
            if start > end || end >= MINUTES_PER_DAY {
                return Err(EngineError::InvalidConfig(format!(
                    "invalid fade window {}..{}",
                    start, end
                )));
            }
        }
        if dawn.1 > dusk.0 {
            return Err(EngineError::InvalidConfig("dawn overlaps dusk".to_string()));
        }

        keyframes.sort_by_key(|k| k.minute);
        Ok(ThemePalette {
            keyframes,
            dawn,
            dusk,
        })
    }

    pub fn keyframes(&self) -> &[SkyKeyframe] {
        &self.keyframes
    }

    pub fn dawn(&self) -> (u32, u32) {
        self.dawn
    }

    pub fn dusk(&self) -> (u32, u32) {
        self.dusk
    }

    /// Interpolated sky color. Wraps from the last keyframe back to the first across midnight.
    pub fn sky_color(&self, minute: u32) -> Rgb {
        let minute = minute % MINUTES_PER_DAY;
        let frames = &self.keyframes;
        let (first, last) = match (frames.first(), frames.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Rgb::new(0, 0, 0),
        };

        let next_pos = frames.iter().position(|k| k.minute > minute);
        let (prev, next) = match next_pos {
            Some(0) | None => (last, first),
            Some(i) => (&frames[i - 1], &frames[i]),
        };

        let span = (next.minute + MINUTES_PER_DAY - prev.minute) % MINUTES_PER_DAY;
        if span == 0 {
            return prev.color;
        }
        let elapsed = (minute + MINUTES_PER_DAY - prev.minute) % MINUTES_PER_DAY;
        prev.color.lerp(&next.color, elapsed as f32 / span as f32)
    }

    /// 1.0 at night, 0.0 during the day, linear in between.
    pub fn star_opacity(&self, minute: u32) -> f32 {
        let minute = minute % MINUTES_PER_DAY;
        let (dawn_start, dawn_end) = self.dawn;
        let (dusk_start, dusk_end) = self.dusk;

        if minute <= dawn_start || minute >= dusk_end {
            1.0
        } else if minute < dawn_end {
            1.0 - ramp(minute, dawn_start, dawn_end)
        } else if minute <= dusk_start {
            0.0
        } else {
            ramp(minute, dusk_start, dusk_end)
        }
    }
}

fn ramp(minute: u32, start: u32, end: u32) -> f32 {
    if end <= start {
        return 1.0;
    }
    (minute - start) as f32 / (end - start) as f32
}

/// Resolved theme for one moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub background: String,
    pub foreground: String,
    pub star_opacity: f32,
    pub is_night: bool,
}

impl Theme {
    pub fn at(palette: &ThemePalette, minute: u32) -> Theme {
        let sky = palette.sky_color(minute);
        let star_opacity = palette.star_opacity(minute);
        let foreground = if sky.luminance() > 0.5 {
            Rgb::new(0x1a, 0x1a, 0x1a)
        } else {
            Rgb::new(0xf5, 0xf5, 0xf5)
        };

        Theme {
            background: sky.to_hex(),
            foreground: foreground.to_hex(),
            star_opacity,
            is_night: star_opacity >= 0.5,
        }
    }
}
