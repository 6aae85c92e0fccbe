use clap::Parser;
use opencv::{
    core::{Mat, Size},
    highgui,
    prelude::*,
    videoio::{self, VideoCapture, VideoWriter},
};
use spotwatch::{visualization, Config, Detector, Tracker, TrackerConfig};
use std::path::{Path, PathBuf};

const WINDOW_NAME: &str = "spotwatch";

#[derive(Parser)]
#[command(
    name = "spotwatch",
    about = "Continuity-aware object tracking over a video stream",
    version
)]
struct Args {
    /// Path to the config JSON file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Video file path, or a camera index such as "0"
    #[arg(short, long, required = true)]
    input: String,

    /// Optional output video path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Show a preview window (ESC exits)
    #[arg(short, long)]
    visualize: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::from_file(&args.config)?;
    let mut detector = Detector::new(&config)?;
    let mut tracker = Tracker::new(TrackerConfig::from_config(&config))?;

    tracker.set_detected_callback(|det| {
        println!("{} detected, {:.4} confident", det.label(), det.confidence());
    });
    tracker.set_expired_callback(|det| {
        println!(
            "{} expired, last spotted {:.1}s ago",
            det.label(),
            det.last_spotted().elapsed().as_secs_f32()
        );
    });

    let mut capture = open_capture(&args.input)?;
    let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as i32;
    let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as i32;
    let fps = match capture.get(videoio::CAP_PROP_FPS)? {
        fps if fps > 0.0 => fps,
        _ => 30.0,
    };

    let mut writer = match &args.output {
        Some(path) => Some(open_writer(path, fps, width, height)?),
        None => None,
    };
    if args.visualize {
        highgui::named_window(WINDOW_NAME, highgui::WINDOW_NORMAL)?;
    }

    let mut frame = Mat::default();
    let mut frame_count = 0u64;
    while capture.read(&mut frame)? {
        if frame.empty() {
            break;
        }

        let detections = detector.detect(&frame)?;
        tracker.process_frame_detections(detections);

        let mut annotated = frame.try_clone()?;
        visualization::draw_tracks(&mut annotated, tracker.tracks())?;

        if let Some(writer) = writer.as_mut() {
            writer.write(&annotated)?;
        }
        if args.visualize {
            highgui::imshow(WINDOW_NAME, &annotated)?;
            if highgui::wait_key(1)? == 27 {
                println!("\nTracking interrupted by user.");
                break;
            }
        }

        frame_count += 1;
        if frame_count % 100 == 0 {
            println!(
                "processed {} frames, {} live tracks",
                frame_count,
                tracker.tracks().len()
            );
        }
    }

    println!(
        "done: {} frames processed, {} tracks still live",
        frame_count,
        tracker.tracks().len()
    );
    Ok(())
}

fn open_capture(input: &str) -> anyhow::Result<VideoCapture> {
    let capture = match input.parse::<i32>() {
        Ok(index) => VideoCapture::new(index, videoio::CAP_ANY)?,
        Err(_) => VideoCapture::from_file(input, videoio::CAP_ANY)?,
    };
    if !capture.is_opened()? {
        anyhow::bail!("failed to open video source {input:?}");
    }
    Ok(capture)
}

fn open_writer(path: &Path, fps: f64, width: i32, height: i32) -> anyhow::Result<VideoWriter> {
    let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')?;
    let writer = VideoWriter::new(
        &path.to_string_lossy(),
        fourcc,
        fps,
        Size::new(width, height),
        true,
    )?;
    if !writer.is_opened()? {
        anyhow::bail!("failed to open video writer at {}", path.display());
    }
    Ok(writer)
}
