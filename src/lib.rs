//! Pose overlay rendering and camera frame streaming.
//!
//! # Environment Variables
//!
//! Some parts of this crate can be overridden by setting environment variables:
//!
//! * `POSECAM_JPEG_BACKEND`: Configures the JPEG image decoder to use. Allowed values are:
//!   * `mozjpeg`: uses the [mozjpeg] library to decode JPEG images.
//!   * `jpeg-decoder`: uses the [jpeg-decoder] crate (via the `image` crate).
//!
//! [mozjpeg]: https://github.com/mozilla/mozjpeg
//! [jpeg-decoder]: https://github.com/image-rs/jpeg-decoder/

use log::LevelFilter;

pub mod engine;
pub mod image;
pub mod overlay;
pub mod pipeline;
pub mod pose;
pub mod resolution;
pub mod stream;
pub mod timer;
pub mod webcam;

pub type Error = Box<dyn std::error::Error + Sync + Send>;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    env_logger::Builder::new()
        .filter(Some(calling_crate), LevelFilter::Debug)
        .filter(Some(env!("CARGO_PKG_NAME")), LevelFilter::Debug)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and this library will log at *debug* level; `RUST_LOG` overrides the
/// defaults.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
