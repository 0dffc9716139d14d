//! Core records exchanged between the detection client, the frame pipeline
//! and the display surface.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Normalized box in [0, 1] relative to frame width/height.
///
/// The producer does not guarantee `x_min < x_max` or `y_min < y_max`;
/// consumers must handle inverted and degenerate boxes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl BoundingBox {
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }
}

/// One object instance reported by the vision model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    pub name: String,
    pub description: String,
    /// Seconds from the start of the clip.
    pub timestamp: f64,
    #[serde(rename = "boundingBox")]
    pub bounding_box: BoundingBox,
    /// Free-form price estimate, e.g. "$450 - $550".
    pub price: String,
}

/// Result of a detection call: the parsed objects plus the model text
/// exactly as it was returned.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub objects: Vec<DetectedObject>,
    pub raw_json: String,
}

impl Detection {
    pub fn empty() -> Self {
        Self {
            objects: Vec::new(),
            raw_json: "[]".to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Annotated frame for one display slot.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotatedImage {
    pub jpeg: Vec<u8>,
    /// Set once the image has been written to the output directory.
    pub path: Option<PathBuf>,
}

/// Card-level view of a detected object. `image` starts empty and is filled
/// exactly once by that object's frame pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayObject {
    pub name: String,
    pub price: String,
    pub timestamp: f64,
    pub image: Option<AnnotatedImage>,
}

impl From<&DetectedObject> for DisplayObject {
    fn from(object: &DetectedObject) -> Self {
        Self {
            name: object.name.clone(),
            price: object.price.clone(),
            timestamp: object.timestamp,
            image: None,
        }
    }
}

/// Validated user input for a single detection run.
#[derive(Clone, Debug)]
pub struct DetectionRequest {
    pub video_path: PathBuf,
    pub targets: Vec<String>,
}

impl DetectionRequest {
    /// Validate local input before anything touches the network.
    pub fn new(video_path: Option<&Path>, query: &str) -> Result<Self> {
        let video_path = video_path.ok_or_else(|| anyhow!("no video selected"))?;
        if !video_path.is_file() {
            return Err(anyhow!(
                "video '{}' is not a readable file",
                video_path.display()
            ));
        }
        let targets = parse_target_names(query);
        if targets.is_empty() {
            return Err(anyhow!("enter at least one object name to look for"));
        }
        Ok(Self {
            video_path: video_path.to_path_buf(),
            targets,
        })
    }
}

/// Split a free-text query on commas, dropping blanks and surrounding
/// whitespace.
pub fn parse_target_names(query: &str) -> Vec<String> {
    query
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
