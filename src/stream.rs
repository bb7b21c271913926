//! Camera footage publishing over a ZeroMQ PUB socket.
//!
//! Each message is a base64-encoded JPEG frame with no further framing; subscribers decode the
//! payload directly. Frames are sent at full capture rate with no throttling or backoff.

use std::sync::atomic::{AtomicBool, Ordering};

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::{image::Image, resolution::Resolution, webcam::Webcam, Error};

/// Configuration of the streaming loop.
pub struct StreamConfig {
    /// Frames are stretched to this size before encoding.
    pub resolution: Resolution,
    /// JPEG encode quality (0-100).
    pub jpeg_quality: u8,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution::RES_VGA,
            jpeg_quality: 75,
        }
    }
}

/// Encodes a frame into the on-wire payload: JPEG compression, then base64.
pub fn encode_frame(frame: &Image, quality: u8) -> Result<String, Error> {
    Ok(STANDARD.encode(frame.encode_jpeg(quality)?))
}

/// A PUB socket publishing camera footage to a fixed remote address.
pub struct FootagePublisher {
    socket: zmq::Socket,
}

impl FootagePublisher {
    /// Connects the publishing socket to `endpoint`.
    pub fn connect(endpoint: &str) -> Result<Self, Error> {
        let context = zmq::Context::new();
        let socket = context.socket(zmq::PUB)?;
        socket.connect(endpoint)?;
        log::info!("publishing footage to {}", endpoint);
        Ok(Self { socket })
    }

    /// Publishes one frame.
    pub fn publish(&self, payload: &str) -> Result<(), Error> {
        self.socket.send(payload.as_bytes(), 0)?;
        Ok(())
    }
}

/// Runs the streaming loop until `stop` is raised or a camera read fails.
///
/// The camera handle is owned by the caller's scope, so it is released exactly once on every
/// exit path, interrupt included. Note that a stalled camera that keeps returning frames
/// successfully is not detected; the loop just keeps publishing whatever it reads.
pub fn run(
    webcam: &mut Webcam,
    publisher: &FootagePublisher,
    config: &StreamConfig,
    stop: &AtomicBool,
) -> Result<(), Error> {
    while !stop.load(Ordering::Relaxed) {
        let frame = webcam.read()?;
        let frame = frame.resize(config.resolution);
        publisher.publish(&encode_frame(&frame, config.jpeg_quality)?)?;
    }

    log::info!("interrupted, stopping stream");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_base64_jpeg() {
        let frame = Image::new(32, 24);
        let payload = encode_frame(&frame, 75).unwrap();

        let jpeg = STANDARD.decode(payload).unwrap();
        // JFIF SOI marker.
        assert_eq!(&jpeg[..2], &[0xff, 0xd8]);
        let back = Image::decode_jpeg(&jpeg).unwrap();
        assert_eq!(back.resolution(), Resolution::new(32, 24));
    }
}
