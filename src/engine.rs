//! Pose inference engines.
//!
//! The render loop only talks to the narrow [`PoseEngine`] interface; [`OnnxPoseEngine`] backs
//! it with a tract-onnx model whose decoder head emits ready-made poses (pose scores, keypoint
//! scores and keypoint coordinates), so no in-crate heatmap decoding is needed.

use std::{path::Path, time::Instant};

use tract_onnx::prelude::{
    tract_data::internal::DimLike, tract_ndarray, tvec, Framework, Graph, InferenceModelExt,
    SimplePlan, TValue, TVec, Tensor,
    TypedFact, TypedOp,
};

use crate::{
    image::Image,
    pose::{Keypoint, KeypointKind, Pose, NUM_KEYPOINTS},
    resolution::Resolution,
    timer::Timer,
    Error,
};

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Shape of the input tensor a pose model expects, in `(batch, height, width, channels)` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TensorShape {
    pub batch: usize,
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl TensorShape {
    /// Returns the spatial size of the input as a [`Resolution`].
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width as u32, self.height as u32)
    }
}

/// Unparsed model output, as returned by [`PoseEngine::run_inference`].
pub struct RawOutput {
    outputs: TVec<TValue>,
    inference_time_ms: f32,
}

/// The inference collaborator of the render loop.
pub trait PoseEngine {
    /// Returns the tensor shape the model expects its input frames in.
    fn input_tensor_shape(&self) -> TensorShape;

    /// Runs the pose model on one frame.
    ///
    /// `input` must already have the spatial size reported by
    /// [`input_tensor_shape`][Self::input_tensor_shape].
    fn run_inference(&mut self, input: &Image) -> Result<RawOutput, Error>;

    /// Parses a raw model output into poses, also returning the inference wall time in
    /// milliseconds.
    fn parse_output(&self, raw: RawOutput) -> Result<(Vec<Pose>, f32), Error>;
}

/// Describes in what order a model expects its input image data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InputLayout {
    Nchw,
    Nhwc,
}

/// A pose model loaded from an ONNX file, run on the CPU via tract.
pub struct OnnxPoseEngine {
    model: Model,
    shape: TensorShape,
    layout: InputLayout,
    t_infer: Timer,
}

impl OnnxPoseEngine {
    /// Loads a pre-trained decoder-style pose model from an ONNX file path.
    ///
    /// The path must have a `.onnx` extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::load_impl(path.as_ref())
    }

    fn load_impl(path: &Path) -> Result<Self, Error> {
        match path.extension() {
            Some(ext) if ext == "onnx" => {}
            _ => return Err("pose model path must have `.onnx` extension".into()),
        }

        let model_data = std::fs::read(path)?;
        Self::from_onnx(&model_data)
    }

    /// Loads a pre-trained decoder-style pose model from an in-memory ONNX file.
    pub fn from_onnx(raw: &[u8]) -> Result<Self, Error> {
        let graph = tract_onnx::onnx().model_for_read(&mut &*raw)?;
        let model = graph.into_optimized()?.into_runnable()?;

        let fact = model.model().input_fact(0)?;
        let dims = fact
            .shape
            .iter()
            .map(|dim| dim.to_usize())
            .collect::<Result<Vec<_>, _>>()?;

        let (layout, w, h) = match *dims.as_slice() {
            [1, 3, h, w] => (InputLayout::Nchw, w, h),
            [1, h, w, 3] => (InputLayout::Nhwc, w, h),
            _ => {
                return Err(format!("invalid pose model input shape: {:?}", dims).into());
            }
        };

        log::debug!("loaded pose model, input {}x{} ({:?})", w, h, layout);

        Ok(Self {
            model,
            shape: TensorShape {
                batch: 1,
                height: h,
                width: w,
                channels: 3,
            },
            layout,
            t_infer: Timer::new("infer"),
        })
    }
}

impl PoseEngine for OnnxPoseEngine {
    fn input_tensor_shape(&self) -> TensorShape {
        self.shape
    }

    fn run_inference(&mut self, input: &Image) -> Result<RawOutput, Error> {
        check_input_resolution(input.resolution(), self.shape.resolution())?;

        let (w, h) = (self.shape.width, self.shape.height);
        let tensor: Tensor = match self.layout {
            InputLayout::Nchw => {
                tract_ndarray::Array4::from_shape_fn(
                    (1, 3, h, w),
                    |(_, c, y, x)| input.get(x as u32, y as u32)[c] as f32 / 255.0,
                )
                .into()
            }
            InputLayout::Nhwc => {
                tract_ndarray::Array4::from_shape_fn(
                    (1, h, w, 3),
                    |(_, y, x, c)| input.get(x as u32, y as u32)[c] as f32 / 255.0,
                )
                .into()
            }
        };

        let start = Instant::now();
        let outputs = self.t_infer.time(|| self.model.run(tvec!(tensor.into())))?;
        let inference_time_ms = start.elapsed().as_secs_f32() * 1000.0;
        log::trace!("{}", self.t_infer);

        Ok(RawOutput {
            outputs,
            inference_time_ms,
        })
    }

    fn parse_output(&self, raw: RawOutput) -> Result<(Vec<Pose>, f32), Error> {
        if raw.outputs.len() < 3 {
            return Err(format!(
                "pose model must have 3 outputs (pose scores, keypoint scores, keypoint \
                coordinates), this one has {}",
                raw.outputs.len()
            )
            .into());
        }

        let keypoint_scores = raw.outputs[1].to_array_view::<f32>()?;
        let dims = keypoint_scores.shape();
        if dims.len() < 2 {
            return Err(format!("invalid keypoint score shape: {:?}", dims).into());
        }
        let (num_poses, num_keypoints) = (dims[dims.len() - 2], dims[dims.len() - 1]);

        let pose_scores = raw.outputs[0].to_array_view::<f32>()?;
        let coords = raw.outputs[2].to_array_view::<f32>()?;

        let poses = parse_decoder_outputs(
            pose_scores.as_slice().ok_or("non-contiguous pose scores")?,
            keypoint_scores
                .as_slice()
                .ok_or("non-contiguous keypoint scores")?,
            coords.as_slice().ok_or("non-contiguous coordinates")?,
            num_poses,
            num_keypoints,
        )?;

        Ok((poses, raw.inference_time_ms))
    }
}

fn check_input_resolution(input: Resolution, expected: Resolution) -> Result<(), Error> {
    if input != expected {
        return Err(format!(
            "input frame is {}, but the model expects {}",
            input, expected
        )
        .into());
    }
    Ok(())
}

/// Builds [`Pose`]s from flattened decoder output buffers.
///
/// `pose_scores` holds one overall score per pose; poses scoring `0.0` are slots the decoder
/// left unused and are dropped. `coords` holds `(y, x)` pairs in inference-image pixels, in the
/// decoder's keypoint order, which matches the [`KeypointKind`] vocabulary order.
fn parse_decoder_outputs(
    pose_scores: &[f32],
    keypoint_scores: &[f32],
    coords: &[f32],
    num_poses: usize,
    num_keypoints: usize,
) -> Result<Vec<Pose>, Error> {
    if num_keypoints > NUM_KEYPOINTS {
        return Err(format!(
            "pose model emits {} keypoints, but at most {} are supported",
            num_keypoints, NUM_KEYPOINTS
        )
        .into());
    }
    if pose_scores.len() < num_poses
        || keypoint_scores.len() < num_poses * num_keypoints
        || coords.len() < num_poses * num_keypoints * 2
    {
        return Err("pose model output tensors are inconsistently sized".into());
    }

    let mut poses = Vec::new();
    for p in 0..num_poses {
        if pose_scores[p] == 0.0 {
            continue;
        }

        let mut pose = Pose::new();
        for k in 0..num_keypoints {
            let kind = KeypointKind::from_index(k).unwrap();
            let score = keypoint_scores[p * num_keypoints + k];
            let y = coords[(p * num_keypoints + k) * 2];
            let x = coords[(p * num_keypoints + k) * 2 + 1];
            pose.set(kind, Keypoint::new(x, y, score));
        }
        poses.push(pose);
    }

    Ok(poses)
}
