//! Landmark overlay.
//!
//! Draws detected hands on a surface aligned with the video frame. Drawing is a side
//! effect of each processed frame and never feeds back into the decision pipeline:
//! `OverlayRenderer::draw` logs surface failures and reports `false` instead of
//! returning an error.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use image::{Rgba, RgbaImage};

use crate::classify::{HandLandmarks, Landmark};
use crate::error::GestureError;
use crate::frame::FrameDimensions;

/// Landmark index pairs forming the hand skeleton (21-point hand topology).
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    (5, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    (9, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    (13, 17),
    (0, 17),
    (17, 18),
    (18, 19),
    (19, 20),
];

pub const CONNECTOR_COLOR: Rgba<u8> = Rgba([0x00, 0xFF, 0x00, 0xFF]);
pub const CONNECTOR_WIDTH: u32 = 5;
pub const LANDMARK_COLOR: Rgba<u8> = Rgba([0xFF, 0x00, 0x00, 0xFF]);
pub const LANDMARK_RADIUS: u32 = 2;

/// A drawable surface. Coordinates are in pixels.
pub trait OverlaySurface: Send {
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
    fn line(&mut self, from: (f32, f32), to: (f32, f32), color: Rgba<u8>, width: u32) -> Result<()>;
    fn point(&mut self, at: (f32, f32), color: Rgba<u8>, radius: u32) -> Result<()>;
}

#[derive(Default)]
pub struct OverlayRenderer {
    draws: u64,
    failures: u64,
}

impl OverlayRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the surface and draw every hand. Returns `false` if the draw was skipped.
    pub fn draw(
        &mut self,
        surface: &mut dyn OverlaySurface,
        dimensions: FrameDimensions,
        hands: &[HandLandmarks],
    ) -> bool {
        match Self::draw_hands(surface, dimensions, hands) {
            Ok(()) => {
                self.draws += 1;
                true
            }
            Err(err) => {
                self.failures += 1;
                log::warn!("overlay draw skipped: {}", GestureError::Render(format!("{:#}", err)));
                false
            }
        }
    }

    pub fn draws(&self) -> u64 {
        self.draws
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    fn draw_hands(
        surface: &mut dyn OverlaySurface,
        dimensions: FrameDimensions,
        hands: &[HandLandmarks],
    ) -> Result<()> {
        surface.resize(dimensions.width, dimensions.height)?;
        surface.clear()?;
        let to_pixels = |landmark: &Landmark| {
            (
                landmark.x * dimensions.width as f32,
                landmark.y * dimensions.height as f32,
            )
        };
        for hand in hands {
            for &(from, to) in HAND_CONNECTIONS.iter() {
                surface.line(
                    to_pixels(&hand.points[from]),
                    to_pixels(&hand.points[to]),
                    CONNECTOR_COLOR,
                    CONNECTOR_WIDTH,
                )?;
            }
            for landmark in hand.points.iter() {
                surface.point(to_pixels(landmark), LANDMARK_COLOR, LANDMARK_RADIUS)?;
            }
        }
        Ok(())
    }
}

/// In-memory RGBA overlay.
pub struct RasterOverlay {
    image: RgbaImage,
}

impl RasterOverlay {
    pub fn new() -> Self {
        Self {
            image: RgbaImage::new(1, 1),
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.image
            .save(path)
            .with_context(|| format!("failed to write overlay {}", path.display()))
    }

    fn stamp(&mut self, cx: f32, cy: f32, color: Rgba<u8>, radius: u32) {
        let r = radius as i64;
        let (cx, cy) = (cx.round() as i64, cy.round() as i64);
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy > r * r {
                    continue;
                }
                let (x, y) = (cx + dx, cy + dy);
                if x >= 0 && y >= 0 && (x as u32) < self.image.width() && (y as u32) < self.image.height() {
                    self.image.put_pixel(x as u32, y as u32, color);
                }
            }
        }
    }
}

impl Default for RasterOverlay {
    fn default() -> Self {
        Self::new()
    }
}

/// Raster overlay shared between a session and the host that displays or saves it.
#[derive(Clone, Default)]
pub struct SharedOverlay {
    inner: Arc<Mutex<RasterOverlay>>,
}

impl SharedOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dimensions of the last drawn overlay.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.inner.lock().ok().map(|overlay| overlay.image().dimensions())
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.lock()?.save_png(path)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, RasterOverlay>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("overlay lock poisoned"))
    }
}

impl OverlaySurface for SharedOverlay {
    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.lock()?.resize(width, height)
    }

    fn clear(&mut self) -> Result<()> {
        self.lock()?.clear()
    }

    fn line(&mut self, from: (f32, f32), to: (f32, f32), color: Rgba<u8>, width: u32) -> Result<()> {
        self.lock()?.line(from, to, color, width)
    }

    fn point(&mut self, at: (f32, f32), color: Rgba<u8>, radius: u32) -> Result<()> {
        self.lock()?.point(at, color, radius)
    }
}

fn check_point(at: (f32, f32)) -> Result<()> {
    if at.0.is_finite() && at.1.is_finite() {
        Ok(())
    } else {
        Err(anyhow!("landmark coordinates are not finite"))
    }
}

impl OverlaySurface for RasterOverlay {
    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(anyhow!("overlay size {}x{} is empty", width, height));
        }
        if self.image.width() != width || self.image.height() != height {
            self.image = RgbaImage::new(width, height);
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        for pixel in self.image.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
        Ok(())
    }

    fn line(&mut self, from: (f32, f32), to: (f32, f32), color: Rgba<u8>, width: u32) -> Result<()> {
        check_point(from)?;
        check_point(to)?;
        let steps = (to.0 - from.0).abs().max((to.1 - from.1).abs()).ceil().max(1.0) as u32;
        let radius = width / 2;
        for step in 0..=steps {
            let t = step as f32 / steps as f32;
            let x = from.0 + (to.0 - from.0) * t;
            let y = from.1 + (to.1 - from.1) * t;
            self.stamp(x, y, color, radius);
        }
        Ok(())
    }

    fn point(&mut self, at: (f32, f32), color: Rgba<u8>, radius: u32) -> Result<()> {
        check_point(at)?;
        self.stamp(at.0, at.1, color, radius);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{HandSide, LANDMARK_COUNT};

    fn hand(x: f32, y: f32) -> HandLandmarks {
        HandLandmarks {
            points: [Landmark { x, y, z: 0.0 }; LANDMARK_COUNT],
            hand_side: HandSide::Right,
        }
    }

    #[test]
    fn draw_sizes_surface_to_frame_and_marks_landmarks() {
        let mut renderer = OverlayRenderer::new();
        let mut surface = RasterOverlay::new();
        let dims = FrameDimensions::new(40, 20).unwrap();

        assert!(renderer.draw(&mut surface, dims, &[hand(0.5, 0.5)]));
        assert_eq!(surface.image().dimensions(), (40, 20));
        assert_eq!(*surface.image().get_pixel(20, 10), LANDMARK_COLOR);
        assert_eq!(renderer.draws(), 1);
    }

    #[test]
    fn draw_clears_previous_frame() {
        let mut renderer = OverlayRenderer::new();
        let mut surface = RasterOverlay::new();
        let dims = FrameDimensions::new(40, 20).unwrap();

        renderer.draw(&mut surface, dims, &[hand(0.1, 0.1)]);
        renderer.draw(&mut surface, dims, &[]);
        assert!(surface.image().pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn bad_landmarks_skip_the_draw_without_panicking() {
        let mut renderer = OverlayRenderer::new();
        let mut surface = RasterOverlay::new();
        let dims = FrameDimensions::new(40, 20).unwrap();

        assert!(!renderer.draw(&mut surface, dims, &[hand(f32::NAN, 0.5)]));
        assert_eq!(renderer.failures(), 1);
    }

    #[test]
    fn shared_overlay_is_visible_to_the_host() {
        let mut renderer = OverlayRenderer::new();
        let host = SharedOverlay::new();
        let mut surface = host.clone();
        let dims = FrameDimensions::new(16, 12).unwrap();

        assert!(renderer.draw(&mut surface, dims, &[hand(0.5, 0.5)]));
        assert_eq!(host.dimensions(), Some((16, 12)));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlay.png");
        host.save_png(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn off_surface_points_are_clipped() {
        let mut renderer = OverlayRenderer::new();
        let mut surface = RasterOverlay::new();
        let dims = FrameDimensions::new(10, 10).unwrap();
        assert!(renderer.draw(&mut surface, dims, &[hand(3.0, -2.0)]));
    }
}
