use std::path::Path;

use anyhow::{anyhow, Result};

use video_appraiser::{jpeg, BoundingBox, DetectedObject, Detection, FramePipeline, Session};

fn detection(names: &[&str], timestamp: f64) -> Detection {
    Detection {
        objects: names
            .iter()
            .map(|name| DetectedObject {
                name: name.to_string(),
                description: String::new(),
                timestamp,
                bounding_box: BoundingBox::new(0.1, 0.1, 0.9, 0.9),
                price: "$20 - $40".to_string(),
            })
            .collect(),
        raw_json: "[]".to_string(),
    }
}

#[test]
fn second_run_never_receives_first_run_images() -> Result<()> {
    let mut session = Session::new();
    let pipeline = FramePipeline::new(90);

    // Same names and slots in both runs; only the generation tells them apart.
    let first = detection(&["chair", "sofa"], 1.0);
    let first_generation = session.begin_run(&first);
    pipeline.launch(Path::new("stub://32x24@2"), first_generation, &first.objects);

    let second = detection(&["chair", "sofa"], 1.0);
    let second_generation = session.begin_run(&second);
    pipeline.launch(Path::new("stub://96x64@2"), second_generation, &second.objects);

    pipeline.wait(&mut session, |_| {});
    // Give any late first-run jobs a chance to land.
    std::thread::sleep(std::time::Duration::from_millis(50));
    pipeline.poll(&mut session);

    assert_eq!(session.generation(), second_generation);
    for display in session.objects() {
        let image = display
            .image
            .as_ref()
            .ok_or_else(|| anyhow!("missing image for {}", display.name))?;
        assert_eq!(jpeg::decode(&image.jpeg)?.dimensions(), (96, 64));
    }
    Ok(())
}

#[test]
fn out_of_range_timestamps_still_produce_images() -> Result<()> {
    let mut session = Session::new();
    let pipeline = FramePipeline::new(90);

    let mut run = detection(&["rug", "lamp", "vase"], 0.0);
    run.objects[0].timestamp = -5.0;
    run.objects[1].timestamp = 3600.0;
    run.objects[2].timestamp = f64::NAN;
    let generation = session.begin_run(&run);
    pipeline.launch(Path::new("stub://48x48@4"), generation, &run.objects);
    pipeline.wait(&mut session, |_| {});

    assert!(session.objects().iter().all(|o| o.image.is_some()));
    Ok(())
}

#[test]
fn degenerate_box_frame_is_the_plain_extracted_frame() -> Result<()> {
    let mut session = Session::new();
    let pipeline = FramePipeline::new(90);

    let mut run = detection(&["ghost"], 1.0);
    run.objects[0].bounding_box = BoundingBox::new(0.9, 0.9, 0.1, 0.1);
    let generation = session.begin_run(&run);
    pipeline.launch(Path::new("stub://40x40@2"), generation, &run.objects);
    pipeline.wait(&mut session, |_| {});

    let plain = video_appraiser::extract_frame(Path::new("stub://40x40@2"), 1.0, 90)?;
    let image = session.objects()[0]
        .image
        .as_ref()
        .ok_or_else(|| anyhow!("missing image"))?;
    assert_eq!(image.jpeg, plain);
    Ok(())
}
