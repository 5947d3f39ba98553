//! TriStack Timeline Model
//!
//! Defines the core data contracts for a stacked collage:
//! - **Clips:** Source media references and the immutable selection batch
//! - **Geometry:** Frame sizes, band rectangles, and affine transforms
//! - **Timeline:** Composition tracks laid out from time zero
//! - **Render spec:** Per-track layer instructions and output frame settings
//!
//! Times are in seconds, geometry in output pixels.

pub mod clip;
pub mod geometry;
pub mod render_spec;
pub mod timeline;

pub use clip::*;
pub use geometry::*;
pub use render_spec::*;
pub use timeline::*;
