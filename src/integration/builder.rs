//! Builder for creating RawDetection objects from decoder outputs.

use nalgebra::Point2;

use super::RawDetection;

/// Builder for creating `RawDetection` objects from various decoder outputs.
#[derive(Debug, Clone, Default)]
pub struct RawDetectionBuilder {
    corner_points: Vec<Point2<f32>>,
    cell_size: Option<u32>,
    text: String,
    raw_bytes: Option<Vec<u8>>,
}

impl RawDetectionBuilder {
    /// Create a new raw detection builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the three finder-pattern centers (bottom-left, top-left, top-right)
    /// in image pixels.
    pub fn finder_patterns(
        mut self,
        bottom_left: (f32, f32),
        top_left: (f32, f32),
        top_right: (f32, f32),
    ) -> Self {
        self.corner_points = [bottom_left, top_left, top_right]
            .into_iter()
            .map(|(x, y)| Point2::new(x, y))
            .collect();
        self
    }

    /// Append one result point, keeping the decoder's order.
    pub fn point(mut self, x: f32, y: f32) -> Self {
        self.corner_points.push(Point2::new(x, y));
        self
    }

    /// Set the number of modules across one side of the code.
    pub fn cell_size(mut self, cell_size: u32) -> Self {
        self.cell_size = Some(cell_size);
        self
    }

    /// Set the QR code version (1..=40); the cell size is `17 + 4 * version`,
    /// saturating at `u32::MAX`.
    pub fn version(self, version: u32) -> Self {
        self.cell_size(version.saturating_mul(4).saturating_add(17))
    }

    /// Set the decoded text. Raw bytes default to its UTF-8 encoding.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set the decoded raw bytes.
    pub fn raw_bytes(mut self, raw_bytes: Vec<u8>) -> Self {
        self.raw_bytes = Some(raw_bytes);
        self
    }

    /// Build the final `RawDetection`.
    pub fn build(self) -> RawDetection {
        let raw_bytes = self
            .raw_bytes
            .unwrap_or_else(|| self.text.as_bytes().to_vec());
        RawDetection {
            corner_points: self.corner_points,
            cell_size: self.cell_size,
            text: self.text,
            raw_bytes,
        }
    }
}
