//! Video Object Appraiser
//!
//! Finds user-named objects in a video and prices them. Detection, naming
//! and pricing are delegated to an external vision-language model; this
//! crate only orchestrates:
//!
//! 1. **Detection**: package the clip and instructions, call the model with
//!    bounded exponential backoff, validate the structured JSON answer.
//! 2. **Frame extraction**: decode the clip at each object's timestamp
//!    (clamped into the clip) and capture one frame.
//! 3. **Annotation**: draw the object's normalized box onto its frame.
//!
//! # Module Structure
//!
//! - `detect`: model request/response, retry policy, provider error classes
//! - `ingest`: frame extraction from local video files
//! - `annotate`: box overlay and JPEG re-encoding
//! - `session` / `pipeline`: per-object jobs and the stale-update guard
//! - `report`: output files and result table
//! - `config`: file + environment configuration, API credential

pub mod annotate;
pub mod config;
pub mod detect;
pub mod ingest;
pub mod jpeg;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod session;

pub use annotate::{annotate, annotate_jpeg, pixel_rect, stroke_width, PixelRect};
pub use config::AppConfig;
pub use detect::{
    DetectionClient, DetectionTransport, GeminiTransport, ProviderError, RetryPolicy, VideoPayload,
};
pub use ingest::{clamp_timestamp, extract_frame, extract_rgb, VideoFile};
pub use model::{
    parse_target_names, AnnotatedImage, BoundingBox, DetectedObject, Detection, DetectionRequest,
    DisplayObject,
};
pub use pipeline::{render_frame, FramePipeline, FrameProgress};
pub use session::{FrameUpdate, Session};
