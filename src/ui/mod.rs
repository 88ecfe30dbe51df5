//! Native egui UI for furcat.
//!
//! Provides a desktop window with:
//! - The cat viewport (drag to orbit, scroll to zoom)
//! - Horror toggle and expression buttons
//! - Status of the mode, active expressions and fur
//!
//! Enabled via the default `native-ui` feature.

mod app;
mod renderer;
mod viewport;

pub use app::FurcatApp;
pub use renderer::{CatRenderer, RendererSink};
