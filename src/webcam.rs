//! V4L2 webcam access.
//!
//! Currently, only V4L2 `VIDEO_CAPTURE` devices yielding JFIF JPEG, Motion JPEG, or packed YUYV
//! frames are supported. H.264 capture would require a video decoder this crate does not carry.

use std::path::{Path, PathBuf};

use linuxvideo::{
    format::{PixFormat, PixelFormat},
    stream::ReadStream,
    CapabilityFlags, Device,
};

use crate::{image::Image, resolution::Resolution, timer::Timer};

/// The encoding in which frames are read off the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureFormat {
    /// JFIF JPEG or Motion JPEG frames, decoded by the crate's JPEG path.
    #[default]
    Jpeg,
    /// Uncompressed packed YUYV (YUV 4:2:2) frames.
    Raw,
    /// H.264 encoded frames. Selectable, but rejected when opening the camera.
    H264,
}

impl CaptureFormat {
    fn pixelformat(&self) -> PixelFormat {
        match self {
            Self::Jpeg => PixelFormat::MJPG,
            Self::Raw => PixelFormat::YUYV,
            Self::H264 => PixelFormat::from_fourcc(*b"H264"),
        }
    }
}

/// Capture configuration options.
#[derive(Default)]
pub struct WebcamOptions {
    device: Option<PathBuf>,
    format: CaptureFormat,
    resolution: Option<Resolution>,
}

impl WebcamOptions {
    /// Sets the path of the video device to open (eg. `/dev/video0`).
    ///
    /// If unset, the first device supporting the requested capture format is used.
    pub fn device(self, device: impl Into<PathBuf>) -> Self {
        Self {
            device: Some(device.into()),
            ..self
        }
    }

    /// Sets the encoding to request from the camera.
    pub fn format(mut self, format: CaptureFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the desired capture resolution.
    ///
    /// The driver may pick a different resolution if the camera cannot deliver the desired one;
    /// the actually selected size is reported by [`Webcam::resolution`].
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = Some(resolution);
        self
    }
}

/// A webcam yielding a stream of [`Image`]s.
pub struct Webcam {
    stream: ReadStream,
    width: u32,
    height: u32,
    format: CaptureFormat,
    t_dequeue: Timer,
    t_decode: Timer,
}

impl Webcam {
    /// Opens the first supported webcam found.
    ///
    /// This function can block for a significant amount of time while the webcam initializes (on
    /// the order of hundreds of milliseconds).
    pub fn open(options: WebcamOptions) -> Result<Self, crate::Error> {
        if options.format == CaptureFormat::H264 {
            return Err("H.264 capture is not supported (no in-crate video decoder)".into());
        }

        if let Some(path) = &options.device {
            let dev = Device::open(path)?;
            return match Self::open_impl(dev, path, &options)? {
                Some(webcam) => Ok(webcam),
                None => Err(format!(
                    "device {} does not support video capture in the requested format",
                    path.display()
                )
                .into()),
            };
        }

        for res in linuxvideo::list()? {
            match res {
                Ok(dev) => {
                    let path = dev.path()?;
                    match Self::open_impl(dev, &path, &options) {
                        Ok(Some(webcam)) => return Ok(webcam),
                        Ok(None) => {}
                        Err(e) => {
                            log::warn!("{}", e);
                        }
                    }
                }
                Err(e) => {
                    log::warn!("{}", e);
                }
            }
        }

        Err("no supported webcam device found".into())
    }

    fn open_impl(
        dev: Device,
        path: &Path,
        options: &WebcamOptions,
    ) -> Result<Option<Self>, crate::Error> {
        let caps = dev.capabilities()?.device_capabilities();
        log::debug!("device {} capabilities: {:?}", path.display(), caps);

        if !caps.contains(CapabilityFlags::VIDEO_CAPTURE) {
            return Ok(None);
        }

        let res = options.resolution.unwrap_or(Resolution::RES_VGA);
        let capture = dev.video_capture(PixFormat::new(
            res.width(),
            res.height(),
            options.format.pixelformat(),
        ))?;

        let format = capture.format();
        let width = format.width();
        let height = format.height();
        match (options.format, format.pixel_format()) {
            (CaptureFormat::Jpeg, PixelFormat::JPEG | PixelFormat::MJPG) => {}
            (CaptureFormat::Raw, PixelFormat::YUYV) => {}
            (_, e) => return Err(format!("unsupported pixel format {}", e).into()),
        }

        log::info!(
            "opened {}, {}x{} {}",
            path.display(),
            width,
            height,
            format.pixel_format(),
        );

        let stream = capture.into_stream()?;

        Ok(Some(Self {
            stream,
            width,
            height,
            format: options.format,
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        }))
    }

    /// Returns the resolution the camera actually delivers frames at.
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Reads the next frame from the camera.
    ///
    /// If no frame is available, this method will block until one is.
    pub fn read(&mut self) -> Result<Image, crate::Error> {
        let (width, height, format) = (self.width, self.height, self.format);
        let t_decode = &mut self.t_decode;
        let dequeue_guard = self.t_dequeue.start();
        Ok(self.stream.dequeue(|buf| {
            drop(dequeue_guard);
            let decoded = t_decode.time(|| match format {
                CaptureFormat::Jpeg => Image::decode_jpeg(&buf),
                CaptureFormat::Raw => Image::from_yuyv(width, height, &buf),
                CaptureFormat::H264 => unreachable!("H.264 is rejected when opening"),
            });
            let image = match decoded {
                Ok(image) => image,
                Err(e) => {
                    // As sad as it is, but even high-quality webcams produce occasional corrupted
                    // MJPG frames, presumably due to USB data corruption. Hand back a blank image
                    // instead of skipping it, which would cause 2x latency spikes.
                    log::error!("webcam decode error: {}", e);
                    Image::new(width, height)
                }
            };
            Ok(image)
        })?)
    }

    /// Returns profiling timers for frame dequeueing and decoding.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_dequeue, &self.t_decode].into_iter()
    }
}
