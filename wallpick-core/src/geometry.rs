//! Pure crop geometry: minimum zoom, centering and crop surface sizing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Slack used when comparing scaled pixel lengths, absorbs float rounding noise.
pub const PIXEL_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: i32,
    pub height: i32,
}

impl Dimensions {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Fails with `InvalidDimension` unless both sides are positive.
    pub fn validate(self) -> Result<Self> {
        if self.width <= 0 || self.height <= 0 {
            return Err(Error::InvalidDimension {
                width: self.width,
                height: self.height,
            });
        }
        Ok(self)
    }

    /// Size after scaling by `zoom`, floored to whole pixels.
    pub fn scaled(self, zoom: f64) -> Dimensions {
        Dimensions {
            width: (self.width as f64 * zoom + PIXEL_EPSILON).floor() as i32,
            height: (self.height as f64 * zoom + PIXEL_EPSILON).floor() as i32,
        }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Dimensions {
    type Err = String;

    /// Parses `WIDTHxHEIGHT`, e.g. `1080x1920`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
        let width = w.trim().parse::<i32>().map_err(|e| format!("bad width '{}': {}", w, e))?;
        let height = h.trim().parse::<i32>().map_err(|e| format!("bad height '{}': {}", h, e))?;
        Ok(Dimensions { width, height })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Offset {
    pub x: i32,
    pub y: i32,
}

impl Offset {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

impl FromStr for Offset {
    type Err = String;

    /// Parses `X,Y`, e.g. `-40,120`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (x, y) = s
            .trim()
            .split_once(',')
            .ok_or_else(|| format!("expected X,Y, got '{}'", s))?;
        let x = x.trim().parse::<i32>().map_err(|e| format!("bad x '{}': {}", x, e))?;
        let y = y.trim().parse::<i32>().map_err(|e| format!("bad y '{}': {}", y, e))?;
        Ok(Offset { x, y })
    }
}

/// How much larger than the screen the crop surface is.
///
/// Supplied from settings at startup, never derived at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropSurfacePolicy {
    /// Multiplier applied to both screen axes. Must be >= 1.
    pub scale: f64,
    /// Extra pixels added on every edge. Must be >= 0.
    pub inset: i32,
}

impl Default for CropSurfacePolicy {
    fn default() -> Self {
        Self { scale: 1.0, inset: 0 }
    }
}

impl CropSurfacePolicy {
    pub fn validate(self) -> Result<Self> {
        if !self.scale.is_finite() || self.scale < 1.0 || self.inset < 0 {
            return Err(Error::InvalidSurfacePolicy {
                scale: self.scale,
                inset: self.inset,
            });
        }
        Ok(self)
    }
}

/// Smallest zoom at which `image` covers `surface` on both axes.
pub fn min_zoom(image: Dimensions, surface: Dimensions) -> Result<f64> {
    let image = image.validate()?;
    let surface = surface.validate()?;

    let zoom_x = surface.width as f64 / image.width as f64;
    let zoom_y = surface.height as f64 / image.height as f64;
    Ok(zoom_x.max(zoom_y))
}

/// Offset that places `inner` inside `outer`.
///
/// The vertical axis is always centered. Horizontally, `align_start` pins
/// inner's start edge to outer's start edge, and `mirrored` moves that start
/// edge to the right for right-to-left layouts. Halves are floored so the
/// result is reproducible when the difference is odd or negative.
pub fn centered_offset(
    inner: Dimensions,
    outer: Dimensions,
    align_start: bool,
    mirrored: bool,
) -> Result<Offset> {
    let inner = inner.validate()?;
    let outer = outer.validate()?;

    let free_x = outer.width - inner.width;
    let free_y = outer.height - inner.height;

    let x = match (align_start, mirrored) {
        (true, false) => 0,
        (true, true) => free_x,
        (false, _) => free_x.div_euclid(2),
    };

    Ok(Offset {
        x,
        y: free_y.div_euclid(2),
    })
}

/// Crop surface for `screen` under `policy`. Never smaller than the screen.
pub fn default_crop_surface_size(screen: Dimensions, policy: CropSurfacePolicy) -> Result<Dimensions> {
    let screen = screen.validate()?;
    let policy = policy.validate()?;

    let grow = |side: i32| -> Option<i32> {
        let scaled = (side as f64 * policy.scale - PIXEL_EPSILON).ceil();
        if scaled > i32::MAX as f64 {
            return None;
        }
        (scaled as i32).max(side).checked_add(policy.inset.checked_mul(2)?)
    };

    match (grow(screen.width), grow(screen.height)) {
        (Some(width), Some(height)) => Ok(Dimensions { width, height }),
        _ => Err(Error::InvalidSurfacePolicy {
            scale: policy.scale,
            inset: policy.inset,
        }),
    }
}
