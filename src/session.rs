//! Per-session display state.
//!
//! The session owns the current display list and the raw response of the
//! latest detection run. Frame pipelines never touch it directly: they send
//! [`FrameUpdate`]s, and the owner applies them here. An update lands only if
//! its generation, slot index and object name all still match the current
//! list, so results from a superseded run are dropped instead of overwriting
//! a newer run's slot.

use anyhow::{Context, Result};

use crate::model::{AnnotatedImage, Detection, DetectedObject, DisplayObject};

/// Outcome of one object's extract → annotate pipeline.
#[derive(Debug)]
pub struct FrameUpdate {
    pub generation: u64,
    pub index: usize,
    pub name: String,
    pub result: Result<Vec<u8>>,
}

#[derive(Debug, Default)]
pub struct Session {
    generation: u64,
    objects: Vec<DetectedObject>,
    display: Vec<DisplayObject>,
    /// One flag per slot; a slot settles once, with or without an image.
    settled: Vec<bool>,
    raw_json: Option<String>,
    outstanding: usize,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the previous results with a fresh run and return its
    /// generation. Every slot starts without an image.
    pub fn begin_run(&mut self, detection: &Detection) -> u64 {
        self.generation += 1;
        self.objects = detection.objects.clone();
        self.display = detection.objects.iter().map(DisplayObject::from).collect();
        self.settled = vec![false; self.display.len()];
        self.raw_json = Some(detection.raw_json.clone());
        self.outstanding = self.display.len();
        log::debug!(
            "run {} started with {} object(s)",
            self.generation,
            self.display.len()
        );
        self.generation
    }

    /// Drop all results, e.g. after a terminal detection failure. Pending
    /// frame jobs from the discarded run become stale.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.objects.clear();
        self.display.clear();
        self.settled.clear();
        self.raw_json = None;
        self.outstanding = 0;
    }

    /// Apply a pipeline result. Returns true when an image was stored.
    ///
    /// Stale updates are ignored. A failed pipeline settles its slot but
    /// leaves the image absent.
    pub fn apply(&mut self, update: FrameUpdate) -> bool {
        if update.generation != self.generation {
            log::debug!(
                "dropping stale frame for '{}' from run {} (current run {})",
                update.name,
                update.generation,
                self.generation
            );
            return false;
        }
        let Some(slot) = self.display.get_mut(update.index) else {
            log::debug!("dropping frame for missing slot {}", update.index);
            return false;
        };
        if slot.name != update.name {
            log::debug!(
                "dropping frame for '{}': slot {} now holds '{}'",
                update.name,
                update.index,
                slot.name
            );
            return false;
        }
        if self.settled[update.index] {
            log::debug!("slot {} already settled", update.index);
            return false;
        }

        self.settled[update.index] = true;
        self.outstanding = self.outstanding.saturating_sub(1);
        match update.result {
            Ok(jpeg) => {
                slot.image = Some(AnnotatedImage { jpeg, path: None });
                true
            }
            Err(err) => {
                log::warn!(
                    "frame for '{}' at {:.2}s unavailable: {:#}",
                    slot.name,
                    slot.timestamp,
                    err
                );
                false
            }
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Pipelines of the current run that have not reported back yet.
    pub fn pending(&self) -> usize {
        self.outstanding
    }

    pub fn objects(&self) -> &[DisplayObject] {
        &self.display
    }

    pub(crate) fn objects_mut(&mut self) -> &mut [DisplayObject] {
        &mut self.display
    }

    /// Detected objects of the current run, in display order.
    pub fn detections(&self) -> &[DetectedObject] {
        &self.objects
    }

    pub fn raw_json(&self) -> Option<&str> {
        self.raw_json.as_deref()
    }

    /// Raw response re-indented for inspection. Text that is not JSON is
    /// returned as-is.
    pub fn raw_json_pretty(&self) -> Option<Result<String>> {
        let raw = self.raw_json.as_deref()?;
        Some(match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(value) => serde_json::to_string_pretty(&value).context("pretty-print raw response"),
            Err(_) => Ok(raw.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BoundingBox;
    use anyhow::anyhow;

    fn object(name: &str, timestamp: f64) -> DetectedObject {
        DetectedObject {
            name: name.to_string(),
            description: String::new(),
            timestamp,
            bounding_box: BoundingBox::new(0.1, 0.1, 0.5, 0.5),
            price: "$10 - $20".to_string(),
        }
    }

    fn detection(names: &[&str]) -> Detection {
        Detection {
            objects: names.iter().map(|name| object(name, 1.0)).collect(),
            raw_json: "[]".to_string(),
        }
    }

    fn update(generation: u64, index: usize, name: &str, jpeg: &[u8]) -> FrameUpdate {
        FrameUpdate {
            generation,
            index,
            name: name.to_string(),
            result: Ok(jpeg.to_vec()),
        }
    }

    #[test]
    fn new_run_starts_without_images() {
        let mut session = Session::new();
        session.begin_run(&detection(&["chair", "sofa"]));
        assert_eq!(session.objects().len(), 2);
        assert!(session.objects().iter().all(|o| o.image.is_none()));
        assert_eq!(session.pending(), 2);
    }

    #[test]
    fn update_fills_only_its_slot() {
        let mut session = Session::new();
        let generation = session.begin_run(&detection(&["chair", "sofa"]));
        assert!(session.apply(update(generation, 1, "sofa", b"sofa-jpeg")));
        assert!(session.objects()[0].image.is_none());
        assert_eq!(
            session.objects()[1].image.as_ref().map(|i| i.jpeg.as_slice()),
            Some(&b"sofa-jpeg"[..])
        );
        assert_eq!(session.pending(), 1);
    }

    #[test]
    fn stale_generation_never_overwrites_newer_run() {
        let mut session = Session::new();
        let first = session.begin_run(&detection(&["chair"]));
        let second = session.begin_run(&detection(&["chair"]));
        assert_ne!(first, second);

        assert!(!session.apply(update(first, 0, "chair", b"old")));
        assert!(session.objects()[0].image.is_none());

        assert!(session.apply(update(second, 0, "chair", b"new")));
        assert!(!session.apply(update(first, 0, "chair", b"old")));
        assert_eq!(
            session.objects()[0].image.as_ref().map(|i| i.jpeg.as_slice()),
            Some(&b"new"[..])
        );
    }

    #[test]
    fn mismatched_name_or_index_is_dropped() {
        let mut session = Session::new();
        let generation = session.begin_run(&detection(&["chair"]));
        assert!(!session.apply(update(generation, 0, "lamp", b"x")));
        assert!(!session.apply(update(generation, 3, "chair", b"x")));
        assert_eq!(session.pending(), 1);
    }

    #[test]
    fn failed_pipeline_settles_slot_without_image() {
        let mut session = Session::new();
        let generation = session.begin_run(&detection(&["chair", "sofa"]));
        let failed = FrameUpdate {
            generation,
            index: 0,
            name: "chair".to_string(),
            result: Err(anyhow!("corrupt stream")),
        };
        assert!(!session.apply(failed));
        assert!(session.apply(update(generation, 1, "sofa", b"ok")));
        assert!(session.objects()[0].image.is_none());
        assert!(session.objects()[1].image.is_some());
        assert_eq!(session.pending(), 0);
    }

    #[test]
    fn settled_slot_ignores_later_updates() {
        let mut session = Session::new();
        let generation = session.begin_run(&detection(&["chair", "sofa"]));
        let failed = FrameUpdate {
            generation,
            index: 0,
            name: "chair".to_string(),
            result: Err(anyhow!("decoder error")),
        };
        assert!(!session.apply(failed));
        assert_eq!(session.pending(), 1);

        assert!(!session.apply(update(generation, 0, "chair", b"late")));
        assert!(session.objects()[0].image.is_none());
        assert_eq!(session.pending(), 1);

        assert!(session.apply(update(generation, 1, "sofa", b"ok")));
        assert!(!session.apply(update(generation, 1, "sofa", b"again")));
        assert_eq!(session.pending(), 0);
    }

    #[test]
    fn clear_discards_results_and_invalidates_jobs() {
        let mut session = Session::new();
        let generation = session.begin_run(&detection(&["chair"]));
        session.clear();
        assert!(session.objects().is_empty());
        assert!(session.raw_json().is_none());
        assert!(!session.apply(update(generation, 0, "chair", b"late")));
    }

    #[test]
    fn raw_json_is_pretty_printed() -> Result<()> {
        let mut session = Session::new();
        session.begin_run(&Detection {
            objects: Vec::new(),
            raw_json: r#"[{"name":"Lamp"}]"#.to_string(),
        });
        let pretty = session.raw_json_pretty().transpose()?.unwrap_or_default();
        assert!(pretty.contains("\n"));
        assert!(pretty.contains("\"name\": \"Lamp\""));
        Ok(())
    }
}
