//! Trait for QR decoding backends.

use nalgebra::Point2;

/// One camera frame handed to the decoder.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    /// Raw pixel bytes (format depends on the decoder)
    pub pixels: Vec<u8>,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

impl Frame {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            pixels,
            width,
            height,
        }
    }
}

/// A decoded QR code in image space.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawDetection {
    /// Finder-pattern centers in image pixels (top-left origin), ordered
    /// bottom-left, top-left, top-right. Extra points are ignored.
    pub corner_points: Vec<Point2<f32>>,
    /// Modules across one side of the code, if the decoder could tell
    pub cell_size: Option<u32>,
    /// Decoded payload as text
    pub text: String,
    /// Decoded payload as raw bytes
    pub raw_bytes: Vec<u8>,
}

/// Trait for QR decoding backends.
///
/// Implement this trait to connect any barcode reader to the tracking driver.
///
/// # Example
///
/// ```ignore
/// use qrtrack_rs::integration::{DecodeSource, RawDetection};
///
/// struct MyReader {
///     // Your barcode reader here
/// }
///
/// impl DecodeSource for MyReader {
///     type Error = std::io::Error;
///
///     fn decode(&mut self, input: &[u8], width: u32, height: u32) -> Result<Vec<RawDetection>, Self::Error> {
///         // Locate and decode every QR code in the frame
///         Ok(vec![])
///     }
/// }
/// ```
pub trait DecodeSource {
    /// Error type for decoding failures.
    type Error: std::fmt::Display;

    /// Decode every QR code in a frame.
    ///
    /// # Arguments
    /// * `input` - Raw image bytes (format depends on implementation)
    /// * `width` - Image width in pixels
    /// * `height` - Image height in pixels
    ///
    /// # Returns
    /// The decoded codes (possibly none), or an error. The driver treats an
    /// error as a cycle without detections.
    fn decode(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<RawDetection>, Self::Error>;
}
