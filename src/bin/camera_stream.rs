//! Publishes camera frames as base64-encoded JPEGs over a ZeroMQ PUB socket.

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use clap::Parser;
use posecam::{
    resolution::Resolution,
    stream::{self, FootagePublisher, StreamConfig},
    webcam::{Webcam, WebcamOptions},
};

#[derive(Parser)]
struct Args {
    /// Remote endpoint the PUB socket connects to.
    #[arg(long, default_value = "tcp://127.0.0.1:4664")]
    endpoint: String,

    /// Video device path; probes all devices when omitted.
    #[arg(long)]
    device: Option<PathBuf>,

    /// JPEG encode quality (0-100).
    #[arg(long, default_value_t = 75)]
    quality: u8,
}

fn main() -> Result<(), posecam::Error> {
    posecam::init_logger!();
    let args = Args::parse();

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed))?;
    }

    let publisher = FootagePublisher::connect(&args.endpoint)?;

    let mut options = WebcamOptions::default().resolution(Resolution::RES_VGA);
    if let Some(device) = &args.device {
        options = options.device(device);
    }
    let mut webcam = Webcam::open(options)?;

    let config = StreamConfig {
        resolution: Resolution::RES_VGA,
        jpeg_quality: args.quality,
    };

    // The camera handle lives in this scope; any exit, interrupt included, releases it once.
    stream::run(&mut webcam, &publisher, &config, &stop)
}
