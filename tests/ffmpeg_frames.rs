#![cfg(feature = "video-ffmpeg")]

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::Result;
use image::RgbImage;

use video_appraiser::{extract_rgb, VideoFile};

/// One second of red followed by one second of blue, 64x48 at 10 fps,
/// encoded by the ffmpeg CLI. Returns `None` when the CLI is not installed.
fn red_then_blue(dir: &Path, file_name: &str) -> Option<PathBuf> {
    let path = dir.join(file_name);
    let status = Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error", "-y"])
        .args(["-f", "lavfi", "-i", "color=c=red:s=64x48:r=10:d=1"])
        .args(["-f", "lavfi", "-i", "color=c=blue:s=64x48:r=10:d=1"])
        .args(["-filter_complex", "[0:v][1:v]concat=n=2:v=1[out]", "-map", "[out]"])
        .args(["-c:v", "mpeg4", "-q:v", "2", "-g", "5", "-pix_fmt", "yuv420p"])
        .arg(&path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match status {
        Ok(status) if status.success() => Some(path),
        _ => {
            eprintln!("ffmpeg CLI unavailable, skipping");
            None
        }
    }
}

fn is_red(frame: &RgbImage) -> bool {
    let [r, _, b] = frame.get_pixel(32, 24).0;
    r > 150 && b < 100
}

fn is_blue(frame: &RgbImage) -> bool {
    let [r, _, b] = frame.get_pixel(32, 24).0;
    b > 150 && r < 100
}

#[test]
fn frames_follow_the_requested_time() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let Some(clip) = red_then_blue(dir.path(), "clip.mp4") else {
        return Ok(());
    };

    let duration = VideoFile::open(&clip)?.duration().unwrap_or_default();
    assert!((duration - 2.0).abs() < 0.2, "duration {}", duration);

    let early = extract_rgb(&clip, 0.3)?;
    assert_eq!(early.dimensions(), (64, 48));
    assert!(is_red(&early));
    assert!(is_blue(&extract_rgb(&clip, 1.5)?));
    Ok(())
}

#[test]
fn out_of_range_times_clamp_to_first_and_last_frames() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let Some(clip) = red_then_blue(dir.path(), "clip.mp4") else {
        return Ok(());
    };

    let before = extract_rgb(&clip, -3.0)?;
    assert_eq!(before.dimensions(), (64, 48));
    assert!(is_red(&before));
    assert_eq!(before.as_raw(), extract_rgb(&clip, 0.0)?.as_raw());

    let after = extract_rgb(&clip, 50.0)?;
    assert_eq!(after.dimensions(), (64, 48));
    assert!(is_blue(&after));

    assert!(is_red(&extract_rgb(&clip, f64::NAN)?));
    Ok(())
}

#[test]
fn times_are_relative_to_the_first_frame() -> Result<()> {
    // MPEG-TS output starts its clock well after zero.
    let dir = tempfile::tempdir()?;
    let Some(clip) = red_then_blue(dir.path(), "clip.ts") else {
        return Ok(());
    };

    assert!(is_red(&extract_rgb(&clip, 0.3)?));
    assert!(is_blue(&extract_rgb(&clip, 1.5)?));
    Ok(())
}
