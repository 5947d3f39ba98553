//! TriStack Render Engine
//!
//! Asynchronous export of a composed [`RenderSpec`](tristack_timeline_model::RenderSpec)
//! into a single vertical video file, plus the post-export commit into a
//! media library.
//!
//! # Pipeline Architecture
//!
//! ```text
//! clip A ──┐
//! clip B ──┼── TimelineComposer ── RenderSpec
//! clip C ──┘                           │
//!                                      ▼
//!                         ExportEngine (coordinator task)
//!                           │                    │
//!                   progress sampler      transcode worker
//!                   (every 100 ms)        (ffmpeg backend)
//!                           │                    │
//!                           ▼                    ▼
//!                      on_progress          output.mp4
//!                                                │
//!                                                ▼
//!                                     MediaLibrary::commit
//! ```

pub mod backend;
pub mod export;
pub mod ffmpeg;
pub mod library;
pub mod output;
pub mod pipeline;
pub mod progress;

pub use backend::*;
pub use export::*;
pub use ffmpeg::FfmpegBackend;
pub use library::*;
pub use pipeline::*;
pub use progress::*;
