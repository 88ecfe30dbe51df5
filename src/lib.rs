//! furcat - interactive 3D cat viewer
//!
//! Renders a glTF cat (or a placeholder body) with:
//! - Shell-based fur that sways in a light wind
//! - Keyboard-triggered facial expressions and a tail swish
//! - A toggleable horror presentation with bloom and film grain
//! - Damped orbit camera controls

pub mod animation;
pub mod assets;
pub mod avatar;
pub mod camera;
pub mod clock;
pub mod color;
pub mod config;
pub mod error;
pub mod fur;
pub mod mesh;
pub mod model;
pub mod scene;
pub mod skinning;

#[cfg(feature = "native-ui")]
pub mod ui;

pub use config::Config;
pub use error::{FurcatError, Result};
pub use scene::{CatScene, FrameSink, FrameView, HeadlessSink};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
