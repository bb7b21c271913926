//! The capture/inference/render loop of the pose camera.

use std::path::PathBuf;

use crate::{
    engine::{PoseEngine, RawOutput},
    image::Image,
    resolution::{RescaleBox, Resolution},
    webcam::{CaptureFormat, Webcam, WebcamOptions},
    Error,
};

/// Configuration of [`run_pipeline`].
pub struct PipelineConfig {
    /// Source display size. The camera is asked to deliver this; the overlay is rendered at
    /// whatever size the camera actually selects.
    pub src_size: Resolution,
    /// Flip frames horizontally before inference and rendering.
    pub mirror: bool,
    /// Explicit video device path; probes all devices when `None`.
    pub device: Option<PathBuf>,
    /// Encoding to read frames in.
    pub format: CaptureFormat,
    /// Receives the rendered overlay markup after every frame.
    pub overlay_sink: Option<Box<dyn FnMut(&str)>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            src_size: Resolution::RES_VGA,
            mirror: false,
            device: None,
            format: CaptureFormat::default(),
            overlay_sink: None,
        }
    }
}

/// Runs the capture loop, invoking `inf_cb` and then `render_cb` once per frame, in frame order.
///
/// Each frame is (optionally mirrored and) letterboxed into the engine's input resolution before
/// `inf_cb` runs the model on it. `render_cb` receives the raw model output along with the source
/// size and the inference [`RescaleBox`], and returns the rendered overlay markup plus a stop
/// flag; returning `true` terminates the pipeline and releases the camera.
pub fn run_pipeline<E, I, R>(
    engine: &mut E,
    mut config: PipelineConfig,
    mut inf_cb: I,
    mut render_cb: R,
) -> Result<(), Error>
where
    E: PoseEngine,
    I: FnMut(&mut E, &Image) -> Result<RawOutput, Error>,
    R: FnMut(&mut E, RawOutput, Resolution, RescaleBox) -> Result<(String, bool), Error>,
{
    let mut options = WebcamOptions::default()
        .format(config.format)
        .resolution(config.src_size);
    if let Some(device) = &config.device {
        options = options.device(device);
    }
    let mut webcam = Webcam::open(options)?;

    let src_size = webcam.resolution();
    let input_res = engine.input_tensor_shape().resolution();
    let src_ratio = src_size
        .aspect_ratio()
        .ok_or("camera delivered a zero-sized frame format")?;
    // The region of the letterboxed inference image actually covered by the source frame. The
    // renderer maps detection coordinates back out of this box.
    let inference_box = input_res.fit_aspect_ratio(src_ratio);

    log::debug!(
        "pipeline: source {}, inference input {}, inference box {:?}",
        src_size,
        input_res,
        inference_box,
    );

    loop {
        let mut frame = webcam.read()?;
        if config.mirror {
            frame.flip_horizontal_in_place();
        }

        let input = frame.aspect_aware_resize(input_res);
        let raw = inf_cb(engine, &input)?;
        let (overlay, stop) = render_cb(engine, raw, src_size, inference_box)?;

        log::trace!("overlay markup: {} bytes", overlay.len());
        if let Some(sink) = &mut config.overlay_sink {
            sink(&overlay);
        }

        if stop {
            return Ok(());
        }
    }
}
