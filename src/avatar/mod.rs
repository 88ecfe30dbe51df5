//! Cat avatar behavior
//!
//! Handles expressions, morph channels, the tail swish and presentation modes.

pub mod driver;
pub mod expression;
pub mod morph;
pub mod presentation;

pub use driver::{ExpressionDriver, TailSwish};
pub use expression::{ExpressionDef, ExpressionTable};
pub use morph::{MorphChannels, MorphTarget};
pub use presentation::{Presentation, PresentationBundle, PresentationMode};
