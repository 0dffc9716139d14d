//! FFmpeg-backed local video decoder.
//!
//! Seeks to the keyframe at or before the target, then decodes forward until
//! the first frame presented at or after the target. At end of stream the
//! last decoded frame is used, so seeking to the clip duration still yields
//! the final frame.

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;
use image::RgbImage;
use std::path::Path;

/// `AVFormatContext::duration` and container-level seeks use microseconds.
const AV_TIME_BASE: f64 = 1_000_000.0;

pub(crate) struct FfmpegVideo {
    path: String,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    time_base: ffmpeg::Rational,
    /// Presentation time of the stream's first frame, in seconds.
    start: f64,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
}

impl FfmpegVideo {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&path)
            .with_context(|| format!("failed to open video '{}' with ffmpeg", path.display()))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow!("file has no video track"))?;
        let stream_index = input_stream.index();
        let time_base = input_stream.time_base();
        let start = match input_stream.start_time() {
            // AV_NOPTS_VALUE
            i64::MIN => 0.0,
            ts => seconds(ts, time_base),
        };
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        log::debug!(
            "opened {} ({}x{}, stream {}, starts at {:.3}s)",
            path.display(),
            decoder.width(),
            decoder.height(),
            stream_index,
            start
        );

        Ok(Self {
            path: path.display().to_string(),
            input,
            stream_index,
            time_base,
            start,
            decoder,
            scaler,
        })
    }

    pub(crate) fn duration(&self) -> Option<f64> {
        let duration = self.input.duration();
        (duration > 0).then(|| duration as f64 / AV_TIME_BASE)
    }

    /// `target` is relative to the first frame, not the container clock.
    pub(crate) fn frame_at(&mut self, target: f64) -> Result<RgbImage> {
        let seek_ts = ((target + self.start) * AV_TIME_BASE) as i64;
        self.input
            .seek(seek_ts, ..seek_ts)
            .with_context(|| format!("seek {} to {:.3}s", self.path, target))?;
        self.decoder.flush();

        let time_base = self.time_base;
        let target = target + self.start;
        let mut decoded = ffmpeg::frame::Video::empty();
        let mut last: Option<ffmpeg::frame::Video> = None;

        for (stream, packet) in self.input.packets() {
            if stream.index() != self.stream_index {
                continue;
            }
            self.decoder
                .send_packet(&packet)
                .context("send packet to ffmpeg decoder")?;
            while self.decoder.receive_frame(&mut decoded).is_ok() {
                if reached(&decoded, time_base, target) {
                    return to_rgb(&mut self.scaler, &decoded);
                }
                last = Some(decoded.clone());
            }
        }

        self.decoder.send_eof().context("flush ffmpeg decoder")?;
        while self.decoder.receive_frame(&mut decoded).is_ok() {
            if reached(&decoded, time_base, target) {
                return to_rgb(&mut self.scaler, &decoded);
            }
            last = Some(decoded.clone());
        }

        match last {
            Some(frame) => to_rgb(&mut self.scaler, &frame),
            None => Err(anyhow!("{} decoded no frames", self.path)),
        }
    }
}

/// Frames without a timestamp are taken as-is.
fn reached(frame: &ffmpeg::frame::Video, time_base: ffmpeg::Rational, target: f64) -> bool {
    let Some(ts) = frame.timestamp().or_else(|| frame.pts()) else {
        return true;
    };
    seconds(ts, time_base) + 1e-3 >= target
}

fn seconds(ts: i64, time_base: ffmpeg::Rational) -> f64 {
    ts as f64 * f64::from(time_base.numerator()) / f64::from(time_base.denominator())
}

fn to_rgb(
    scaler: &mut ffmpeg::software::scaling::Context,
    frame: &ffmpeg::frame::Video,
) -> Result<RgbImage> {
    let mut rgb_frame = ffmpeg::frame::Video::empty();
    scaler
        .run(frame, &mut rgb_frame)
        .context("scale frame to RGB")?;
    let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;
    RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| anyhow!("decoded frame does not match {}x{}", width, height))
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        return Ok((
            data.get(..row_bytes * height as usize)
                .context("ffmpeg frame is shorter than expected")?
                .to_vec(),
            width,
            height,
        ));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}
