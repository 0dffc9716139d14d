//! appraise - find named objects in a video and price them
//!
//! 1. Validates the video path and the comma-separated object query
//! 2. Sends the clip to the vision model and parses its JSON answer
//! 3. Extracts and annotates one frame per detected object, in parallel
//! 4. Writes annotated frames, results.json and raw.json to the output dir

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use video_appraiser::config::AppConfig;
use video_appraiser::report::{render_table, write_report};
use video_appraiser::{DetectionClient, DetectionRequest, FramePipeline, Session};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "appraise",
    about = "Detect named objects in a video and estimate their prices"
)]
struct Args {
    /// Video file to analyze
    #[arg(long, value_name = "PATH")]
    video: Option<PathBuf>,

    /// Comma-separated object names, e.g. "chair, sofa, lamp"
    #[arg(long, short, default_value = "")]
    targets: String,

    /// Output directory (overrides config)
    #[arg(long, env = "APPRAISER_OUT_DIR", value_name = "DIR")]
    out: Option<PathBuf>,

    /// Print the raw model response, pretty-printed
    #[arg(long)]
    raw: bool,

    /// Print results as JSON instead of a table
    #[arg(long)]
    json: bool,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let config = AppConfig::load()?;
    let request = DetectionRequest::new(args.video.as_deref(), &args.targets)?;
    let out_dir = args.out.clone().unwrap_or_else(|| config.output.dir.clone());
    log::debug!("config: {:?}", config);

    let client = DetectionClient::from_config(&config);
    let pipeline = FramePipeline::new(config.output.jpeg_quality);
    let mut session = Session::new();

    let detection = {
        let _stage = ui.stage("Detect objects");
        client.detect_request(&request)
    };
    let detection = match detection {
        Ok(detection) => detection,
        Err(err) => {
            session.clear();
            return Err(err);
        }
    };

    let generation = session.begin_run(&detection);
    if !detection.is_empty() {
        let mut progress = ui.progress("Extract frames", detection.objects.len() as u64);
        pipeline.launch(&request.video_path, generation, &detection.objects);
        pipeline.wait(&mut session, |settled| {
            let name = detection
                .objects
                .get(settled.index)
                .map(|object| object.name.as_str())
                .unwrap_or_default();
            let label = if settled.stored {
                name.to_string()
            } else {
                format!("{} (no frame)", name)
            };
            progress.tick(&label);
        });
    }

    let entries = {
        let _stage = ui.stage("Write results");
        write_report(&out_dir, &mut session)?
    };

    if args.json {
        let json = serde_json::to_string_pretty(&entries).context("serialize results")?;
        println!("{}", json);
    } else {
        print!("{}", render_table(&entries));
    }

    if args.raw {
        if let Some(raw) = session.raw_json_pretty() {
            println!("{}", raw?);
        }
    }

    Ok(())
}
