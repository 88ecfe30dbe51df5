//! Normal and horror presentation presets.

use serde::{Deserialize, Serialize};

use crate::color::Rgb;

/// Hemisphere ground color, shared by both modes.
pub const HEMISPHERE_GROUND: u32 = 0x333333;

/// Which preset is live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresentationMode {
    #[default]
    Normal,
    Horror,
}

impl PresentationMode {
    pub fn from_horror(on: bool) -> Self {
        if on {
            Self::Horror
        } else {
            Self::Normal
        }
    }
}

/// Every visual parameter that a mode switch assigns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresentationBundle {
    pub hemisphere_intensity: f32,
    pub hemisphere_sky: Rgb,
    pub hemisphere_ground: Rgb,
    pub key_intensity: f32,
    pub key_color: Rgb,
    pub exposure: f32,
    pub eye_emissive: Rgb,
    pub eye_emissive_intensity: f32,
    pub bloom_strength: f32,
    pub film_enabled: bool,
}

impl PresentationBundle {
    pub fn normal() -> Self {
        Self {
            hemisphere_intensity: 0.85,
            hemisphere_sky: Rgb::from_hex(0xffffff),
            hemisphere_ground: Rgb::from_hex(HEMISPHERE_GROUND),
            key_intensity: 1.1,
            key_color: Rgb::from_hex(0xffffff),
            exposure: 1.0,
            eye_emissive: Rgb::from_hex(0x000000),
            eye_emissive_intensity: 0.0,
            bloom_strength: 0.0,
            film_enabled: false,
        }
    }

    pub fn horror() -> Self {
        Self {
            hemisphere_intensity: 0.35,
            hemisphere_sky: Rgb::from_hex(0x555577),
            hemisphere_ground: Rgb::from_hex(HEMISPHERE_GROUND),
            key_intensity: 2.0,
            key_color: Rgb::from_hex(0xff3a2a),
            exposure: 1.2,
            eye_emissive: Rgb::from_hex(0xff2222),
            eye_emissive_intensity: 2.0,
            bloom_strength: 0.8,
            film_enabled: true,
        }
    }

    pub fn for_mode(mode: PresentationMode) -> Self {
        match mode {
            PresentationMode::Normal => Self::normal(),
            PresentationMode::Horror => Self::horror(),
        }
    }

    pub fn bloom_enabled(&self) -> bool {
        self.bloom_strength > 0.0
    }
}

/// Current mode plus the bundle it assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct Presentation {
    mode: PresentationMode,
    live: PresentationBundle,
}

impl Default for Presentation {
    fn default() -> Self {
        Self::new(PresentationMode::Normal)
    }
}

impl Presentation {
    pub fn new(mode: PresentationMode) -> Self {
        Self {
            mode,
            live: PresentationBundle::for_mode(mode),
        }
    }

    /// Assign the full bundle for `mode`. No blending between presets.
    pub fn set_mode(&mut self, mode: PresentationMode) {
        if self.mode != mode {
            tracing::info!("Presentation mode: {:?}", mode);
        }
        self.mode = mode;
        self.live = PresentationBundle::for_mode(mode);
    }

    pub fn set_horror(&mut self, on: bool) {
        self.set_mode(PresentationMode::from_horror(on));
    }

    pub fn toggle(&mut self) -> PresentationMode {
        self.set_horror(!self.is_horror());
        self.mode
    }

    pub fn mode(&self) -> PresentationMode {
        self.mode
    }

    pub fn is_horror(&self) -> bool {
        self.mode == PresentationMode::Horror
    }

    pub fn bundle(&self) -> &PresentationBundle {
        &self.live
    }

    /// Text for the toggle control.
    pub fn label(&self) -> &'static str {
        if self.is_horror() {
            "Horror: ON"
        } else {
            "Horror: OFF"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_normal() {
        let p = Presentation::default();
        assert!(!p.is_horror());
        assert_eq!(p.bundle(), &PresentationBundle::normal());
        assert_eq!(p.label(), "Horror: OFF");
    }

    #[test]
    fn test_set_horror_is_idempotent() {
        let mut once = Presentation::default();
        once.set_horror(true);

        let mut twice = Presentation::default();
        twice.set_horror(true);
        twice.set_horror(true);

        assert_eq!(once, twice);
        assert_eq!(twice.label(), "Horror: ON");
    }

    #[test]
    fn test_round_trip_restores_normal_bundle() {
        let mut p = Presentation::default();
        p.set_horror(true);
        p.set_horror(false);
        assert_eq!(p.bundle(), &PresentationBundle::normal());
        assert_eq!(p.mode(), PresentationMode::Normal);
    }

    #[test]
    fn test_toggle_flips() {
        let mut p = Presentation::default();
        assert_eq!(p.toggle(), PresentationMode::Horror);
        assert_eq!(p.toggle(), PresentationMode::Normal);
    }

    #[test]
    fn test_horror_literals() {
        let h = PresentationBundle::horror();
        assert_eq!(h.hemisphere_intensity, 0.35);
        assert_eq!(h.key_intensity, 2.0);
        assert_eq!(h.exposure, 1.2);
        assert_eq!(h.eye_emissive_intensity, 2.0);
        assert!(h.bloom_enabled());
        assert!(h.film_enabled);
        assert_eq!(h.hemisphere_ground, PresentationBundle::normal().hemisphere_ground);

        let n = PresentationBundle::normal();
        assert!(!n.bloom_enabled());
        assert_eq!(n.eye_emissive, Rgb::BLACK);
    }
}
