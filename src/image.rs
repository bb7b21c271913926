//! Image manipulation.
//!
//! This module provides the [`Image`] type, an owned RGBA image, along with the JPEG
//! encode/decode and resizing operations the camera tools need.

use std::{
    env::{self, VarError},
    fmt, process,
};

use image::{codecs::jpeg::JpegEncoder, ColorType, ImageBuffer, Rgba, RgbaImage};
use once_cell::sync::Lazy;

use crate::resolution::Resolution;

/// Because computers, we support more than one JPEG decoding backend.
enum JpegBackend {
    /// Uses the `jpeg-decoder` crate, a robust but slow pure-Rust JPEG decoder.
    JpegDecoder,
    /// Uses the `mozjpeg` crate, a wrapper around Mozilla's libjpeg fork. Robust and fast, but C.
    MozJpeg,
}

const DEFAULT_BACKEND: JpegBackend = JpegBackend::MozJpeg;

static JPEG_BACKEND: Lazy<JpegBackend> = Lazy::new(|| match env::var("POSECAM_JPEG_BACKEND") {
    Ok(v) if v == "mozjpeg" => JpegBackend::MozJpeg,
    Ok(v) if v == "jpeg-decoder" => JpegBackend::JpegDecoder,
    Ok(v) => {
        eprintln!("invalid value set for `POSECAM_JPEG_BACKEND` variable: '{v}'; exiting");
        process::exit(1);
    }
    Err(VarError::NotPresent) => DEFAULT_BACKEND,
    Err(VarError::NotUnicode(s)) => {
        eprintln!(
            "invalid value set for `POSECAM_JPEG_BACKEND` variable: {}; exiting",
            s.to_string_lossy()
        );
        process::exit(1);
    }
});

/// An 8-bit sRGB image with alpha channel.
#[derive(Clone)]
pub struct Image {
    buf: RgbaImage,
}

impl Image {
    /// Creates an empty image of a specified size.
    ///
    /// The image will start out black and fully transparent.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: ImageBuffer::new(width, height),
        }
    }

    /// Decodes a JFIF JPEG or Motion JPEG from a byte slice.
    pub fn decode_jpeg(data: &[u8]) -> Result<Self, crate::Error> {
        let buf = match *JPEG_BACKEND {
            JpegBackend::JpegDecoder => {
                image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)?.to_rgba8()
            }
            JpegBackend::MozJpeg => {
                let mut decompress = mozjpeg::Decompress::new_mem(data)?.rgba()?;
                let buf = decompress
                    .read_scanlines_flat()
                    .ok_or("failed to decode image")?;
                ImageBuffer::from_raw(
                    decompress.width().try_into()?,
                    decompress.height().try_into()?,
                    buf,
                )
                .ok_or("failed to create image buffer")?
            }
        };

        Ok(Self { buf })
    }

    /// Encodes the image as a JPEG with the given quality (0-100).
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, crate::Error> {
        // The JPEG encoder rejects RGBA input, so strip the alpha channel first.
        let rgb = image::DynamicImage::ImageRgba8(self.buf.clone()).to_rgb8();
        let mut out = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
        encoder.encode(rgb.as_raw(), self.width(), self.height(), ColorType::Rgb8)?;
        Ok(out)
    }

    /// Converts a packed YUYV (YUV 4:2:2) buffer into an [`Image`].
    ///
    /// `width` must be even, since each 4-byte unit encodes two horizontally adjacent pixels
    /// and cannot straddle rows. `data` must hold at least `width * height * 2` bytes.
    pub fn from_yuyv(width: u32, height: u32, data: &[u8]) -> Result<Self, crate::Error> {
        if width % 2 != 0 {
            return Err(format!("YUYV width must be even, got {}", width).into());
        }
        let expected = width as usize * height as usize * 2;
        if data.len() < expected {
            return Err(format!(
                "YUYV buffer too small: got {} bytes, need {}",
                data.len(),
                expected
            )
            .into());
        }

        let mut buf = RgbaImage::new(width, height);
        for (i, chunk) in data[..expected].chunks_exact(4).enumerate() {
            let [y0, u, y1, v] = [chunk[0], chunk[1], chunk[2], chunk[3]];
            let x = (i as u32 * 2) % width;
            let y = (i as u32 * 2) / width;
            buf.put_pixel(x, y, yuv_to_rgba(y0, u, v));
            buf.put_pixel(x + 1, y, yuv_to_rgba(y1, u, v));
        }

        Ok(Self { buf })
    }

    /// Returns the width of this image, in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    /// Returns the height of this image, in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    /// Returns the size of this image.
    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Stretches this image to a new size, ignoring its aspect ratio.
    ///
    /// For performance (as this runs on the CPU), this uses nearest neighbor interpolation, so
    /// the result won't look very good, but it should suffice for most use cases.
    pub fn resize(&self, new_res: Resolution) -> Image {
        let mut out = Image::new(new_res.width(), new_res.height());
        if self.width() == 0 || self.height() == 0 {
            return out;
        }

        for dest_y in 0..new_res.height() {
            for dest_x in 0..new_res.width() {
                let src_x = ((dest_x as f32 + 0.5) / new_res.width() as f32
                    * self.width() as f32) as u32;
                let src_y = ((dest_y as f32 + 0.5) / new_res.height() as f32
                    * self.height() as f32) as u32;
                let pixel = *self.buf.get_pixel(src_x.min(self.width() - 1), src_y.min(self.height() - 1));
                out.buf.put_pixel(dest_x, dest_y, pixel);
            }
        }

        out
    }

    /// Resizes this image to a new size, adding black bars to keep the original aspect ratio.
    ///
    /// This is how camera frames are fitted into the (typically differently-shaped) network
    /// input; the bar geometry is recoverable via [`Resolution::fit_aspect_ratio`].
    pub fn aspect_aware_resize(&self, new_res: Resolution) -> Image {
        let cur_ratio = match self.resolution().aspect_ratio() {
            Some(ratio) => ratio,
            // A zero-pixel image has nothing to resize; return an empty image of the right size.
            None => return Image::new(new_res.width(), new_res.height()),
        };

        log::trace!(
            "aspect-aware resize from {} -> {} ({})",
            self.resolution(),
            new_res,
            cur_ratio,
        );

        let mut out = Image::new(new_res.width(), new_res.height());
        let target = new_res.fit_aspect_ratio(cur_ratio);
        let (target_x, target_y) = (target.x as u32, target.y as u32);
        let (target_w, target_h) = (target.width as u32, target.height as u32);

        for dest_y in 0..target_h {
            for dest_x in 0..target_w {
                let src_x =
                    ((dest_x as f32 + 0.5) / target_w as f32 * self.width() as f32) as u32;
                let src_y =
                    ((dest_y as f32 + 0.5) / target_h as f32 * self.height() as f32) as u32;

                let pixel = *self
                    .buf
                    .get_pixel(src_x.min(self.width() - 1), src_y.min(self.height() - 1));
                out.buf.put_pixel(target_x + dest_x, target_y + dest_y, pixel);
            }
        }

        out
    }

    /// Mirrors the image around its vertical axis.
    pub fn flip_horizontal_in_place(&mut self) {
        image::imageops::flip_horizontal_in_place(&mut self.buf);
    }

    /// Gets the RGBA color at the given pixel coordinates.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this image.
    pub fn get(&self, x: u32, y: u32) -> [u8; 4] {
        self.buf[(x, y)].0
    }

    /// Sets the RGBA color at the given pixel coordinates.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this image.
    pub fn set(&mut self, x: u32, y: u32, color: [u8; 4]) {
        self.buf[(x, y)] = Rgba(color);
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} Image", self.width(), self.height())
    }
}

fn yuv_to_rgba(y: u8, u: u8, v: u8) -> Rgba<u8> {
    // BT.601 integer conversion.
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;

    let clamp = |v: i32| v.clamp(0, 255) as u8;
    let r = clamp((298 * c + 409 * e + 128) >> 8);
    let g = clamp((298 * c - 100 * d - 208 * e + 128) >> 8);
    let b = clamp((298 * c + 516 * d + 128) >> 8);
    Rgba([r, g, b, 255])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_stretches_to_exact_size() {
        let mut img = Image::new(4, 2);
        img.set(0, 0, [255, 0, 0, 255]);
        let out = img.resize(Resolution::new(8, 8));
        assert_eq!(out.resolution(), Resolution::new(8, 8));
        assert_eq!(out.get(0, 0), [255, 0, 0, 255]);
    }

    #[test]
    fn aspect_aware_resize_letterboxes() {
        let mut img = Image::new(4, 4);
        for y in 0..4 {
            for x in 0..4 {
                img.set(x, y, [255, 255, 255, 255]);
            }
        }

        // 4:4 into 8x4 -> pillarboxed with 2px black bars left and right.
        let out = img.aspect_aware_resize(Resolution::new(8, 4));
        assert_eq!(out.get(0, 0), [0, 0, 0, 0]);
        assert_eq!(out.get(1, 0), [0, 0, 0, 0]);
        assert_eq!(out.get(2, 0), [255, 255, 255, 255]);
        assert_eq!(out.get(5, 3), [255, 255, 255, 255]);
        assert_eq!(out.get(6, 3), [0, 0, 0, 0]);
    }

    #[test]
    fn flip_mirrors_pixels() {
        let mut img = Image::new(2, 1);
        img.set(0, 0, [1, 2, 3, 255]);
        img.set(1, 0, [4, 5, 6, 255]);
        img.flip_horizontal_in_place();
        assert_eq!(img.get(0, 0), [4, 5, 6, 255]);
        assert_eq!(img.get(1, 0), [1, 2, 3, 255]);
    }

    #[test]
    fn yuyv_decodes_grey() {
        // Y=128, U=V=128 is a mid grey.
        let data = [128, 128, 128, 128];
        let img = Image::from_yuyv(2, 1, &data).unwrap();
        let [r, g, b, a] = img.get(0, 0);
        assert_eq!(a, 255);
        assert!(r == g && g == b, "expected grey, got {:?}", (r, g, b));
        assert!((100..=160).contains(&r));
    }

    #[test]
    fn yuyv_rejects_short_buffers() {
        assert!(Image::from_yuyv(4, 4, &[0; 8]).is_err());
    }

    #[test]
    fn yuyv_rejects_odd_widths() {
        // An odd width would make pixel pairs straddle row boundaries.
        assert!(Image::from_yuyv(3, 2, &[0; 12]).is_err());
    }

    #[test]
    fn jpeg_roundtrip_preserves_size() {
        let img = Image::new(16, 8);
        let jpeg = img.encode_jpeg(75).unwrap();
        let back = Image::decode_jpeg(&jpeg).unwrap();
        assert_eq!(back.resolution(), Resolution::new(16, 8));
    }
}
