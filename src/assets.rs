//! Asset loading with graceful degradation
//!
//! Nothing here is fatal: a broken model becomes the placeholder body, a
//! broken fur pattern becomes procedural noise, and a missing environment
//! image is simply skipped.

use glam::Vec3;
use std::path::Path;
use std::sync::Arc;

use crate::color::srgb_to_linear;
use crate::config::Config;
use crate::error::{AssetError, ConfigError};
use crate::fur::FurPattern;
use crate::model::CatModel;

/// Ambient light derived from an environment image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvironmentLight {
    /// Mean linear radiance of the image
    pub radiance: Vec3,
    pub strength: f32,
}

impl EnvironmentLight {
    pub fn load<P: AsRef<Path>>(path: P, strength: f32) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let img = image::open(path)
            .map_err(|e| AssetError::EnvironmentLoad(format!("{}: {}", path.display(), e)))?;

        // HDR decodes straight to linear floats; 8-bit formats are sRGB
        let is_hdr = matches!(
            img,
            image::DynamicImage::ImageRgb32F(_) | image::DynamicImage::ImageRgba32F(_)
        );
        let rgb = img.to_rgb32f();

        let count = (rgb.width() as usize) * (rgb.height() as usize);
        if count == 0 {
            return Err(AssetError::EnvironmentLoad(format!(
                "{}: empty image",
                path.display()
            )));
        }

        let sum = rgb.pixels().fold(Vec3::ZERO, |acc, p| {
            let c = Vec3::from(p.0);
            if is_hdr {
                acc + c
            } else {
                acc + Vec3::new(srgb_to_linear(c.x), srgb_to_linear(c.y), srgb_to_linear(c.z))
            }
        });

        Ok(Self {
            radiance: sum / count as f32,
            strength,
        })
    }

    /// Load when a path is given; failures are logged at debug level and ignored.
    pub fn load_optional(path: Option<&Path>, strength: f32) -> Option<Self> {
        let path = path?;
        match Self::load(path, strength) {
            Ok(env) => {
                tracing::info!("Loaded environment {}", path.display());
                Some(env)
            }
            Err(e) => {
                tracing::debug!("Skipping environment: {}", e);
                None
            }
        }
    }

    /// Ambient term added to the hemisphere light.
    pub fn ambient(&self) -> Vec3 {
        self.radiance * self.strength
    }
}

/// Everything the scene needs from disk.
pub struct SceneAssets {
    pub model: CatModel,
    pub pattern: Arc<FurPattern>,
    pub environment: Option<EnvironmentLight>,
}

impl SceneAssets {
    /// Load all assets named in `config`, substituting fallbacks as needed.
    ///
    /// Only an invalid appearance section is an error.
    pub fn load(config: &Config) -> Result<Self, ConfigError> {
        let style = config.appearance.style()?;
        let model = CatModel::load_or_placeholder(&config.assets.model, &style);
        let pattern = Arc::new(FurPattern::load_or_procedural(&config.assets.fur_texture));
        let environment = EnvironmentLight::load_optional(
            config.assets.environment.as_deref(),
            config.appearance.environment_strength,
        );

        Ok(Self {
            model,
            pattern,
            environment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_environment_is_none() {
        assert!(EnvironmentLight::load_optional(Some(Path::new("nope/env.hdr")), 0.25).is_none());
        assert!(EnvironmentLight::load_optional(None, 0.25).is_none());
    }

    #[test]
    fn test_environment_average() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("env.png");
        let img = image::RgbImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                image::Rgb([255, 255, 255])
            } else {
                image::Rgb([0, 0, 0])
            }
        });
        img.save(&path).unwrap();

        let env = EnvironmentLight::load(&path, 0.25).unwrap();
        assert!((env.radiance - Vec3::splat(0.5)).length() < 1e-5);
        assert!((env.ambient() - Vec3::splat(0.125)).length() < 1e-5);
    }

    #[test]
    fn test_scene_assets_fall_back() {
        let mut config = Config::default();
        config.assets.model = "missing/cat.glb".into();
        config.assets.fur_texture = "missing/fur.png".into();
        config.assets.environment = Some("missing/env.hdr".into());

        let assets = SceneAssets::load(&config).unwrap();
        assert!(assets.model.is_placeholder);
        assert!(assets.pattern.procedural);
        assert!(assets.environment.is_none());
    }
}
