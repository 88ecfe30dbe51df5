//! Linear RGB colors parsed from sRGB hex literals.

use glam::Vec3;

use crate::error::ConfigError;

/// A linear-space RGB color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb { r: 1.0, g: 1.0, b: 1.0 };
    pub const BLACK: Rgb = Rgb { r: 0.0, g: 0.0, b: 0.0 };

    /// Build a linear color from a packed sRGB `0xRRGGBB` literal.
    pub fn from_hex(hex: u32) -> Self {
        let channel = |shift: u32| srgb_to_linear(((hex >> shift) & 0xff) as f32 / 255.0);
        Self {
            r: channel(16),
            g: channel(8),
            b: channel(0),
        }
    }

    /// Parse `"#rrggbb"` (the leading `#` is optional).
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let digits = s.trim().trim_start_matches('#');
        if digits.len() != 6 {
            return Err(ConfigError::Parse(format!("invalid color '{}'", s)));
        }
        let hex = u32::from_str_radix(digits, 16)
            .map_err(|e| ConfigError::Parse(format!("invalid color '{}': {}", s, e)))?;
        Ok(Self::from_hex(hex))
    }

    pub fn scaled(self, k: f32) -> Self {
        Self {
            r: self.r * k,
            g: self.g * k,
            b: self.b * k,
        }
    }

    pub fn lerp(self, other: Rgb, t: f32) -> Self {
        Self {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
        }
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.r, self.g, self.b)
    }

    pub fn to_array4(self, a: f32) -> [f32; 4] {
        [self.r, self.g, self.b, a]
    }
}

/// sRGB transfer function inverse.
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hex_extremes() {
        assert_eq!(Rgb::from_hex(0xffffff), Rgb::WHITE);
        assert_eq!(Rgb::from_hex(0x000000), Rgb::BLACK);
    }

    #[test]
    fn test_parse_matches_from_hex() {
        assert_eq!(Rgb::parse("#ffd54f").unwrap(), Rgb::from_hex(0xffd54f));
        assert_eq!(Rgb::parse("ff3a2a").unwrap(), Rgb::from_hex(0xff3a2a));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Rgb::parse("#fff").is_err());
        assert!(Rgb::parse("#gggggg").is_err());
    }

    #[test]
    fn test_srgb_midpoint_is_darker_in_linear() {
        let c = Rgb::from_hex(0x808080);
        assert!(c.r > 0.2 && c.r < 0.23);
    }
}
