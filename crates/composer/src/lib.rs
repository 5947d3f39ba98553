//! TriStack Timeline Composer
//!
//! Turns a batch of source clips into a [`RenderSpec`]:
//! - **Inspection:** read container headers to find each clip's video track
//! - **Composition:** one timeline track per clip, all starting at zero
//! - **Layout:** a fixed scale plus a per-band vertical offset per track
//!
//! No pixels are touched here; rendering happens in the export engine.
//!
//! [`RenderSpec`]: tristack_timeline_model::RenderSpec

pub mod compose;
pub mod inspect;

pub use compose::*;
pub use inspect::*;
