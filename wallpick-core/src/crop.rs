//! Live zoom/pan state of a preview session and the crop rectangle it resolves to.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::geometry::{self, Dimensions, Offset, PIXEL_EPSILON};

/// Float noise tolerated when rounding scaled pixels, well under `PIXEL_EPSILON`.
const ROUNDING_SLACK: f64 = PIXEL_EPSILON / 4.0;

/// Crop bounds in source-image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CropRectangle {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl CropRectangle {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    /// Widened so extreme edges cannot overflow; negative when inverted.
    pub fn width(&self) -> i64 {
        self.right as i64 - self.left as i64
    }

    pub fn height(&self) -> i64 {
        self.bottom as i64 - self.top as i64
    }

    /// Whether the rectangle, rendered at `zoom`, fills `surface` on both axes.
    ///
    /// Inverted or empty rectangles and non-positive zooms never cover.
    pub fn covers(&self, surface: Dimensions, zoom: f64) -> bool {
        zoom.is_finite()
            && zoom > 0.0
            && self.width() > 0
            && self.height() > 0
            && self.width() as f64 * zoom + PIXEL_EPSILON >= surface.width as f64
            && self.height() as f64 * zoom + PIXEL_EPSILON >= surface.height as f64
    }

    /// Fails with `InvalidCropRectangle` unless the rectangle covers `surface` at `zoom`.
    pub fn ensure_covers(&self, surface: Dimensions, zoom: f64) -> Result<()> {
        if self.covers(surface, zoom) {
            return Ok(());
        }
        Err(Error::InvalidCropRectangle {
            width: self.width(),
            height: self.height(),
            zoom,
            surface_width: surface.width,
            surface_height: surface.height,
        })
    }

    /// Intersects with the image bounds, for decoders that reject out-of-range crops.
    pub fn clamped_to(&self, image: Dimensions) -> CropRectangle {
        let left = self.left.clamp(0, image.width);
        let top = self.top.clamp(0, image.height);
        CropRectangle {
            left,
            top,
            right: self.right.clamp(left, image.width),
            bottom: self.bottom.clamp(top, image.height),
        }
    }
}

impl fmt::Display for CropRectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}] ({}x{})",
            self.left,
            self.top,
            self.right,
            self.bottom,
            self.width(),
            self.height()
        )
    }
}

/// Zoom and scroll of an in-progress preview.
///
/// `scroll` is the position of the crop surface's top-left corner inside the
/// image scaled by `zoom`, so it is measured in scaled pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct CropState {
    image: Dimensions,
    surface: Dimensions,
    min_zoom: f64,
    zoom: f64,
    scroll: Offset,
}

impl CropState {
    /// Default framing: minimum zoom with the surface centered on the image.
    pub fn new(image: Dimensions, surface: Dimensions) -> Result<Self> {
        Self::framed(image, surface, false, false)
    }

    /// Minimum zoom, with the surface either centered or pinned to the start
    /// edge (the right edge when `mirrored`).
    pub fn framed(image: Dimensions, surface: Dimensions, align_start: bool, mirrored: bool) -> Result<Self> {
        let min_zoom = geometry::min_zoom(image, surface)?;
        let scaled = image.scaled(min_zoom);
        let scroll = geometry::centered_offset(surface, scaled, align_start, mirrored)?;

        let mut state = Self {
            image,
            surface,
            min_zoom,
            zoom: min_zoom,
            scroll,
        };
        state.clamp_scroll();
        log::debug!(
            "crop state for {} on {} surface: zoom {:.4}, scroll {}",
            image,
            surface,
            min_zoom,
            state.scroll
        );
        Ok(state)
    }

    pub fn image(&self) -> Dimensions {
        self.image
    }

    pub fn surface(&self) -> Dimensions {
        self.surface
    }

    pub fn min_zoom(&self) -> f64 {
        self.min_zoom
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn scroll(&self) -> Offset {
        self.scroll
    }

    /// Replaces the zoom, keeping the point under the viewport center fixed.
    pub fn apply_zoom(&mut self, new_zoom: f64) -> Result<()> {
        if !new_zoom.is_finite() || new_zoom < self.min_zoom {
            return Err(Error::ZoomBelowMinimum {
                requested: new_zoom,
                minimum: self.min_zoom,
            });
        }

        let center_x = (self.scroll.x as f64 + self.surface.width as f64 / 2.0) / self.zoom;
        let center_y = (self.scroll.y as f64 + self.surface.height as f64 / 2.0) / self.zoom;

        self.zoom = new_zoom;
        self.scroll = Offset {
            x: (center_x * new_zoom - self.surface.width as f64 / 2.0).round() as i32,
            y: (center_y * new_zoom - self.surface.height as f64 / 2.0).round() as i32,
        };
        self.clamp_scroll();
        Ok(())
    }

    /// Pans by `delta` scaled pixels, stopping at the image edges.
    pub fn apply_scroll(&mut self, delta: Offset) {
        self.scroll = Offset {
            x: self.scroll.x.saturating_add(delta.x),
            y: self.scroll.y.saturating_add(delta.y),
        };
        self.clamp_scroll();
    }

    /// Largest scroll that keeps the viewport inside the scaled image.
    pub fn max_scroll(&self) -> Offset {
        let max_x = self.image.width as f64 * self.zoom - self.surface.width as f64;
        let max_y = self.image.height as f64 * self.zoom - self.surface.height as f64;
        Offset {
            x: ((max_x + ROUNDING_SLACK).floor() as i32).max(0),
            y: ((max_y + ROUNDING_SLACK).floor() as i32).max(0),
        }
    }

    fn clamp_scroll(&mut self) {
        let max = self.max_scroll();
        self.scroll = Offset {
            x: self.scroll.x.clamp(0, max.x),
            y: self.scroll.y.clamp(0, max.y),
        };
    }

    /// Current viewport in source-image pixels, rounded outward so it never
    /// under-covers the surface.
    pub fn resolve_crop_rectangle(&self) -> CropRectangle {
        let left = self.scroll.x as f64 / self.zoom;
        let top = self.scroll.y as f64 / self.zoom;
        let right = left + self.surface.width as f64 / self.zoom;
        let bottom = top + self.surface.height as f64 / self.zoom;
        // Slack in image pixels; at most ROUNDING_SLACK once scaled back up.
        let slack = ROUNDING_SLACK / self.zoom;

        CropRectangle {
            left: (left + slack).floor() as i32,
            top: (top + slack).floor() as i32,
            right: (right - slack).ceil() as i32,
            bottom: (bottom - slack).ceil() as i32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{default_crop_surface_size, min_zoom, CropSurfacePolicy};

    #[test]
    fn default_framing_shows_whole_image() {
        let image = Dimensions::new(1000, 2000);
        let screen = Dimensions::new(1000, 2000);
        assert_eq!(min_zoom(image, screen).unwrap(), 1.0);

        let surface =
            default_crop_surface_size(screen, CropSurfacePolicy { scale: 1.5, inset: 0 }).unwrap();
        assert_eq!(surface, Dimensions::new(1500, 3000));

        let state = CropState::new(image, surface).unwrap();
        assert_eq!(state.zoom(), 1.5);
        assert_eq!(state.scroll(), Offset::new(0, 0));
        assert_eq!(state.resolve_crop_rectangle(), CropRectangle::new(0, 0, 1000, 2000));
    }

    #[test]
    fn default_framing_centers_wide_image() {
        let state = CropState::new(Dimensions::new(4000, 2000), Dimensions::new(1000, 2000)).unwrap();
        assert_eq!(state.zoom(), 1.0);
        assert_eq!(state.scroll(), Offset::new(1500, 0));
        assert_eq!(state.resolve_crop_rectangle(), CropRectangle::new(1500, 0, 2500, 2000));
    }

    #[test]
    fn start_aligned_framing_follows_layout_direction() {
        let image = Dimensions::new(4000, 2000);
        let surface = Dimensions::new(1000, 2000);

        let ltr = CropState::framed(image, surface, true, false).unwrap();
        assert_eq!(ltr.resolve_crop_rectangle(), CropRectangle::new(0, 0, 1000, 2000));

        let rtl = CropState::framed(image, surface, true, true).unwrap();
        assert_eq!(rtl.resolve_crop_rectangle(), CropRectangle::new(3000, 0, 4000, 2000));
    }

    #[test]
    fn small_image_is_zoomed_past_one() {
        let state = CropState::new(Dimensions::new(500, 500), Dimensions::new(1080, 1920)).unwrap();
        assert!(state.zoom() > 1.0);
        assert!(state.resolve_crop_rectangle().covers(state.surface(), state.zoom()));
    }

    #[test]
    fn zoom_below_minimum_is_rejected() {
        let mut state = CropState::new(Dimensions::new(1000, 2000), Dimensions::new(1500, 3000)).unwrap();
        let err = state.apply_zoom(1.2).unwrap_err();
        assert!(matches!(err, Error::ZoomBelowMinimum { .. }));
        assert!(state.apply_zoom(f64::NAN).is_err());
        assert_eq!(state.zoom(), 1.5);
    }

    #[test]
    fn zoom_in_keeps_center_and_bounds() {
        let image = Dimensions::new(1000, 2000);
        let surface = Dimensions::new(1500, 3000);
        let mut state = CropState::new(image, surface).unwrap();
        state.apply_zoom(3.0).unwrap();

        let rect = state.resolve_crop_rectangle();
        assert_eq!(rect, CropRectangle::new(250, 500, 750, 1500));
        assert!(rect.covers(surface, 3.0));
    }

    #[test]
    fn scroll_is_clamped_to_image() {
        let image = Dimensions::new(1000, 2000);
        let surface = Dimensions::new(1500, 3000);
        let mut state = CropState::new(image, surface).unwrap();
        state.apply_zoom(3.0).unwrap();

        state.apply_scroll(Offset::new(-100_000, -100_000));
        assert_eq!(state.scroll(), Offset::new(0, 0));

        state.apply_scroll(Offset::new(100_000, 100_000));
        assert_eq!(state.scroll(), state.max_scroll());
        let rect = state.resolve_crop_rectangle();
        assert_eq!((rect.right, rect.bottom), (1000, 2000));
    }

    #[test]
    fn resolved_rectangle_never_under_covers() {
        let images = [(1000, 2000), (4032, 3024), (777, 1333), (1920, 1080), (3, 7)];
        let surfaces = [(1080, 1920), (1441, 2561), (1500, 3000)];
        for (iw, ih) in images {
            for (sw, sh) in surfaces {
                let image = Dimensions::new(iw, ih);
                let surface = Dimensions::new(sw, sh);
                let mut state = CropState::new(image, surface).unwrap();
                for factor in [1.0, 1.01, 1.37, 2.5, 7.0] {
                    state.apply_zoom(state.min_zoom() * factor).unwrap();
                    state.apply_scroll(Offset::new(37, -11));
                    let rect = state.resolve_crop_rectangle();
                    assert!(
                        rect.covers(surface, state.zoom()),
                        "{image} on {surface} at {}: {rect}",
                        state.zoom()
                    );
                    assert!(rect.left >= 0 && rect.top >= 0);
                }
            }
        }
    }

    #[test]
    fn ensure_covers_reports_shortfall() {
        let rect = CropRectangle::new(0, 0, 100, 100);
        let err = rect.ensure_covers(Dimensions::new(200, 100), 1.5).unwrap_err();
        assert!(matches!(err, Error::InvalidCropRectangle { width: 100, .. }));
        assert!(rect.ensure_covers(Dimensions::new(200, 200), 2.0).is_ok());
    }

    #[test]
    fn inverted_rectangle_or_non_positive_zoom_never_covers() {
        let surface = Dimensions::new(1500, 3000);
        let inverted = CropRectangle::new(1000, 2000, 0, 0);
        assert!(!inverted.covers(surface, -1.5));
        assert!(!inverted.covers(surface, 1.5));

        let upright = CropRectangle::new(0, 0, 1000, 2000);
        assert!(upright.covers(surface, 1.5));
        assert!(!upright.covers(surface, 0.0));
        assert!(!upright.covers(surface, -1.5));
    }

    #[test]
    fn extreme_edges_do_not_overflow() {
        let rect = CropRectangle::new(i32::MIN, 0, i32::MAX, 3000);
        assert_eq!(rect.width(), u32::MAX as i64);
        assert!(rect.covers(Dimensions::new(1500, 3000), 1.0));

        let inverted = CropRectangle::new(i32::MAX, 0, i32::MIN, 3000);
        assert!(matches!(
            inverted.ensure_covers(Dimensions::new(1500, 3000), 1.0),
            Err(Error::InvalidCropRectangle { width, .. }) if width < 0
        ));
    }

    #[test]
    fn clamping_keeps_rect_inside_image() {
        let rect = CropRectangle::new(-3, 10, 1005, 2001);
        assert_eq!(
            rect.clamped_to(Dimensions::new(1000, 2000)),
            CropRectangle::new(0, 10, 1000, 2000)
        );
    }
}
