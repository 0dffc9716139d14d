//! Result output: annotated images, a results file and the raw model
//! response, plus the text table printed by the CLI.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::session::Session;

pub const RESULTS_FILE: &str = "results.json";
pub const RAW_FILE: &str = "raw.json";

#[derive(Debug, Serialize)]
pub struct ReportEntry {
    pub name: String,
    pub description: String,
    pub price: String,
    pub timestamp: f64,
    /// `None` while the frame pipeline for this object has not produced an
    /// image (or failed).
    pub image: Option<PathBuf>,
}

/// Write images, `results.json` and `raw.json` into `dir`, recording each
/// image path on its display slot.
pub fn write_report(dir: &Path, session: &mut Session) -> Result<Vec<ReportEntry>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create output directory {}", dir.display()))?;

    let descriptions: Vec<String> = session
        .detections()
        .iter()
        .map(|object| object.description.clone())
        .collect();

    let mut entries = Vec::with_capacity(descriptions.len());
    for (index, display) in session.objects_mut().iter_mut().enumerate() {
        let mut image_path = None;
        if let Some(image) = display.image.as_mut() {
            let path = dir.join(image_file_name(index, &display.name));
            std::fs::write(&path, &image.jpeg)
                .with_context(|| format!("write {}", path.display()))?;
            image.path = Some(path.clone());
            image_path = Some(path);
        }
        entries.push(ReportEntry {
            name: display.name.clone(),
            description: descriptions.get(index).cloned().unwrap_or_default(),
            price: display.price.clone(),
            timestamp: display.timestamp,
            image: image_path,
        });
    }

    let results_path = dir.join(RESULTS_FILE);
    let results = serde_json::to_string_pretty(&entries).context("serialize results")?;
    std::fs::write(&results_path, results)
        .with_context(|| format!("write {}", results_path.display()))?;

    if let Some(raw) = session.raw_json_pretty() {
        let raw_path = dir.join(RAW_FILE);
        std::fs::write(&raw_path, raw?).with_context(|| format!("write {}", raw_path.display()))?;
    }

    log::info!("wrote {} result(s) to {}", entries.len(), dir.display());
    Ok(entries)
}

/// `03-herman-miller-aeron-chair.jpg`
pub fn image_file_name(index: usize, name: &str) -> String {
    let mut slug = String::new();
    for c in name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
        if slug.len() >= 48 {
            break;
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        format!("{:02}.jpg", index + 1)
    } else {
        format!("{:02}-{}.jpg", index + 1, slug)
    }
}

/// Human-readable table of results.
pub fn render_table(entries: &[ReportEntry]) -> String {
    if entries.is_empty() {
        return "No matching objects found.\n".to_string();
    }
    let name_width = entries
        .iter()
        .map(|entry| entry.name.chars().count())
        .max()
        .unwrap_or(4)
        .clamp(4, 48);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>3}  {:<name_width$}  {:>8}  {:<18}  IMAGE",
        "#", "NAME", "TIME", "PRICE"
    );
    for (index, entry) in entries.iter().enumerate() {
        let image = entry
            .image
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "(pending)".to_string());
        let _ = writeln!(
            out,
            "{:>3}  {:<name_width$}  {:>7.2}s  {:<18}  {}",
            index + 1,
            truncate(&entry.name, name_width),
            entry.timestamp,
            entry.price,
            image
        );
    }
    out
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundingBox, DetectedObject, Detection};
    use crate::session::FrameUpdate;

    #[test]
    fn image_names_are_slugged_and_numbered() {
        assert_eq!(
            image_file_name(2, "Herman Miller Aeron Chair!"),
            "03-herman-miller-aeron-chair.jpg"
        );
        assert_eq!(image_file_name(0, "  ***  "), "01.jpg");
    }

    #[test]
    fn empty_results_render_no_matches() {
        assert_eq!(render_table(&[]), "No matching objects found.\n");
    }

    #[test]
    fn report_writes_images_results_and_raw() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut session = Session::new();
        let raw = r#"[{"name":"Lamp"},{"name":"Rug"}]"#;
        let generation = session.begin_run(&Detection {
            objects: ["Lamp", "Rug"]
                .iter()
                .map(|name| DetectedObject {
                    name: name.to_string(),
                    description: format!("{} description", name),
                    timestamp: 1.0,
                    bounding_box: BoundingBox::new(0.0, 0.0, 1.0, 1.0),
                    price: "$5".to_string(),
                })
                .collect(),
            raw_json: raw.to_string(),
        });
        session.apply(FrameUpdate {
            generation,
            index: 0,
            name: "Lamp".to_string(),
            result: Ok(vec![0xFF, 0xD8, 0xFF, 0xD9]),
        });

        let entries = write_report(dir.path(), &mut session)?;
        assert_eq!(entries.len(), 2);
        let lamp = entries[0].image.clone().unwrap_or_default();
        assert!(lamp.ends_with("01-lamp.jpg"));
        assert_eq!(std::fs::read(&lamp)?, vec![0xFF, 0xD8, 0xFF, 0xD9]);
        assert!(entries[1].image.is_none());
        assert_eq!(session.objects()[0].image.as_ref().and_then(|i| i.path.clone()), Some(lamp));

        let results: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join(RESULTS_FILE))?)?;
        assert_eq!(results[1]["description"], "Rug description");
        let raw_written = std::fs::read_to_string(dir.path().join(RAW_FILE))?;
        assert!(raw_written.contains("\"name\": \"Rug\""));

        let table = render_table(&entries);
        assert!(table.contains("(pending)"));
        Ok(())
    }
}
