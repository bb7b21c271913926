//! Annotates live camera frames with skeletal keypoints and renders an SVG overlay.

use std::{path::PathBuf, time::Instant};

use clap::Parser;
use posecam::{
    engine::{OnnxPoseEngine, PoseEngine},
    overlay::{draw_pose, shadow_text, RenderStats, SvgCanvas, DEFAULT_THRESHOLD},
    pipeline::{run_pipeline, PipelineConfig},
    resolution::Resolution,
    timer::FpsEstimator,
    webcam::CaptureFormat,
};

#[derive(Parser)]
struct Args {
    /// `.onnx` pose model path.
    #[arg(long, default_value = "models/posenet_decoder.onnx")]
    model: PathBuf,

    /// Label file path.
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Flip video horizontally.
    #[arg(long)]
    mirror: bool,

    /// Number of categories with the highest score to display.
    #[arg(long, default_value_t = 1)]
    top_k: usize,

    /// Index of which video source to use.
    #[arg(long, default_value_t = 0)]
    camera_idx: u32,

    /// Classifier score threshold.
    #[arg(long, default_value_t = 0.5)]
    threshold: f32,

    /// Which video source to use.
    #[arg(long, default_value = "/dev/video0")]
    videosrc: PathBuf,

    /// Use H.264 input.
    #[arg(long)]
    h264: bool,

    /// Use JPEG input.
    #[arg(long)]
    jpeg: bool,
}

fn main() -> Result<(), posecam::Error> {
    posecam::init_logger!();
    let args = Args::parse();

    // Classifier-only options; the pose path accepts but never reads them.
    log::debug!(
        "labels={:?} top_k={} camera_idx={} threshold={}",
        args.labels,
        args.top_k,
        args.camera_idx,
        args.threshold,
    );

    let format = if args.h264 {
        CaptureFormat::H264
    } else if args.jpeg {
        CaptureFormat::Jpeg
    } else {
        CaptureFormat::Raw
    };

    let mut engine = OnnxPoseEngine::load(&args.model)?;
    let shape = engine.input_tensor_shape();
    log::info!("pose model input: {}", shape.resolution());

    let config = PipelineConfig {
        src_size: Resolution::RES_VGA,
        mirror: args.mirror,
        device: Some(args.videosrc),
        format,
        overlay_sink: None,
    };

    let mut fps_counter = FpsEstimator::new(30);
    let mut stats = RenderStats::new();

    run_pipeline(
        &mut engine,
        config,
        |engine, input| engine.run_inference(input),
        |engine, raw, src_size, inference_box| {
            let mut canvas = SvgCanvas::new(src_size);

            let start = Instant::now();
            let (poses, inference_time_ms) = engine.parse_output(raw)?;
            let parse_time_ms = start.elapsed().as_secs_f64() * 1000.0;

            stats.record(parse_time_ms, inference_time_ms as f64);
            let avg_inference_ms = stats.avg_inference_time_ms().unwrap_or(0.0);
            let text_line = format!(
                "PoseNet: {:.1}ms ({:.2} fps) TrueFPS: {:.2} Nposes {}",
                avg_inference_ms,
                1000.0 / avg_inference_ms,
                fps_counter.advance(),
                poses.len(),
            );

            shadow_text(&mut canvas, 10, 20, &text_line, 16);
            for pose in &poses {
                draw_pose(
                    &mut canvas,
                    pose,
                    src_size,
                    inference_box,
                    "yellow",
                    DEFAULT_THRESHOLD,
                );
            }

            Ok((canvas.serialize(), false))
        },
    )
}
