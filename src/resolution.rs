//! Types for representing image resolutions and inference regions.

use std::fmt;

/// Resolution (`width x height`) of an image, window, camera, or display.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    /// VGA resolution: `640x480`.
    ///
    /// This is the default source size of both camera tools.
    pub const RES_VGA: Self = Self {
        width: 640,
        height: 480,
    };

    /// Creates a new [`Resolution`] of `width x height`.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns the width of this [`Resolution`].
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height of this [`Resolution`].
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Computes the [`AspectRatio`] of this [`Resolution`].
    ///
    /// If `self` has a width or height of 0, `None` is returned.
    pub fn aspect_ratio(&self) -> Option<AspectRatio> {
        AspectRatio::new(self.width(), self.height())
    }

    /// Computes a centered, maximally sized [`RescaleBox`] that lies inside of `self` and has the
    /// given aspect ratio.
    ///
    /// This is the region of a source frame that gets handed to the inference engine, and that
    /// detection coordinates are mapped back out of.
    pub fn fit_aspect_ratio(&self, ratio: AspectRatio) -> RescaleBox {
        let to_ratio = match self.aspect_ratio() {
            Some(ratio) => ratio,
            None => return RescaleBox::new(0.0, 0.0, self.width() as f32, self.height() as f32),
        };

        let from_ratio = ratio.as_f32();
        let to_ratio = to_ratio.as_f32();

        let (y_min, x_min, w, h);
        if from_ratio > to_ratio {
            // Inference input has a wider aspect ratio than the source.
            // => Resulting size is limited by the source width. Letterboxing.
            w = self.width();
            h = (self.width() as f32 / from_ratio) as u32;

            x_min = 0;
            y_min = (self.height() - h) / 2;
        } else {
            // Source has a wider (or equal) aspect ratio than the inference input.
            // => Resulting size is limited by the source height. Pillarboxing.
            w = (self.height() as f32 * from_ratio) as u32;
            h = self.height();

            x_min = (self.width() - w) / 2;
            y_min = 0;
        }

        let rect = RescaleBox::new(x_min as f32, y_min as f32, w as f32, h as f32);
        log::trace!(
            "fit aspect ratio {} in resolution {} -> {:?}",
            ratio,
            self,
            rect
        );
        rect
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// The region of a source frame that was fed to the inference engine.
///
/// Detection coordinates are in inference-image pixels; the box maps them back to source display
/// coordinates. A box with zero width or height produces non-finite scale factors downstream,
/// which is deliberately not guarded against.
#[derive(Clone, Copy, PartialEq)]
pub struct RescaleBox {
    /// X coordinate of the box's left edge, in source pixels.
    pub x: f32,
    /// Y coordinate of the box's top edge, in source pixels.
    pub y: f32,
    /// Width of the box, in source pixels.
    pub width: f32,
    /// Height of the box, in source pixels.
    pub height: f32,
}

impl RescaleBox {
    /// Creates a box from its top-left corner and size.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Creates a box covering an entire frame of resolution `res`, ie. an identity rescaling.
    pub fn full(res: Resolution) -> Self {
        Self::new(0.0, 0.0, res.width() as f32, res.height() as f32)
    }
}

impl fmt::Debug for RescaleBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RescaleBox @ ({},{}), size {}x{}",
            self.x, self.y, self.width, self.height
        )
    }
}

/// Ratio of a width to a height of an image.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct AspectRatio {
    // Invariant: `width` and `height` are nonzero and as small as possible (ie. their GCD is 1).
    width: u32,
    height: u32,
}

impl AspectRatio {
    /// 1:1 aspect ratio.
    ///
    /// Common for CNN inputs.
    pub const SQUARE: Self = Self {
        width: 1,
        height: 1,
    };

    /// Creates the aspect ratio representing `width:height`.
    ///
    /// If either `width` or `height` is `0`, returns `None`.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }

        let gcd = gcd(width, height);
        Some(Self {
            width: width / gcd,
            height: height / gcd,
        })
    }

    /// Returns the `f32` corresponding to this ratio.
    #[inline]
    pub fn as_f32(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl fmt::Debug for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

const fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b > 0 {
        let t = b;
        b = a % b;
        a = t;
    }

    a
}
