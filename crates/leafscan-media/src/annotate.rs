//! Detection overlay.

use std::io::Cursor;

use ab_glyph::{FontArc, PxScale};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use leafscan_models::{InferenceResult, Prediction};
use metrics::counter;
use tracing::debug;

use crate::error::{MediaError, MediaResult};
use crate::font::locate_font;

const ANNOTATIONS_TOTAL: &str = "leafscan_annotations_total";

/// Extension used when the input format cannot be identified.
const FALLBACK_EXTENSION: &str = "jpg";

/// Colors and sizes used for the overlay.
#[derive(Debug, Clone, Copy)]
pub struct AnnotationStyle {
    pub color: Rgb<u8>,
    /// Border thickness in pixels
    pub thickness: u32,
    pub font_size: f32,
    /// Gap between the label baseline area and the box top
    pub label_offset: i32,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            color: Rgb([0, 255, 0]),
            thickness: 2,
            font_size: 18.0,
            label_offset: 10,
        }
    }
}

/// Output of [`Annotator::annotate`].
#[derive(Debug, Clone)]
pub struct AnnotatedImage {
    /// Encoded image
    pub bytes: Vec<u8>,
    /// File extension matching the encoding
    pub extension: &'static str,
    /// Number of boxes drawn
    pub boxes_drawn: usize,
}

impl AnnotatedImage {
    /// Whether the bytes differ from the input.
    pub fn is_modified(&self) -> bool {
        self.boxes_drawn > 0
    }
}

/// Draws detection boxes and labels onto images.
#[derive(Clone)]
pub struct Annotator {
    font: Option<FontArc>,
    style: AnnotationStyle,
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Annotator {
    /// Create an annotator. Without a font only boxes are drawn.
    pub fn new(font: Option<FontArc>) -> Self {
        Self {
            font,
            style: AnnotationStyle::default(),
        }
    }

    /// Create an annotator using the font found by [`locate_font`].
    pub fn from_env() -> Self {
        Self::new(locate_font())
    }

    pub fn with_style(mut self, style: AnnotationStyle) -> Self {
        self.style = style;
        self
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Overlay every detection in `result` onto the encoded `image`.
    ///
    /// Without detections the input bytes are returned as-is. Otherwise the
    /// image is decoded, drawn on and re-encoded in its own format when that
    /// format can be written, JPEG otherwise.
    pub fn annotate(&self, image: &[u8], result: &InferenceResult) -> MediaResult<AnnotatedImage> {
        let format = image::guess_format(image).ok();

        if !result.has_detections() {
            counter!(ANNOTATIONS_TOTAL, "outcome" => "unchanged").increment(1);
            return Ok(AnnotatedImage {
                bytes: image.to_vec(),
                extension: extension_for_bytes(image),
                boxes_drawn: 0,
            });
        }

        let format = format.ok_or(MediaError::UnknownFormat)?;
        let mut canvas = image::load_from_memory_with_format(image, format)?.to_rgb8();
        let boxes_drawn = self.draw_detections(&mut canvas, result.detections());

        let output_format = if is_writable(format) {
            format
        } else {
            ImageFormat::Jpeg
        };
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(canvas).write_to(&mut Cursor::new(&mut bytes), output_format)?;

        debug!(boxes = boxes_drawn, format = ?output_format, "Annotated image");
        counter!(ANNOTATIONS_TOTAL, "outcome" => "drawn").increment(1);

        Ok(AnnotatedImage {
            bytes,
            extension: extension_for(output_format),
            boxes_drawn,
        })
    }

    /// Draw boxes and labels in place. Returns how many boxes were drawn.
    ///
    /// Predictions without spatial fields and degenerate boxes are skipped.
    pub fn draw_detections<'a>(
        &self,
        image: &mut RgbImage,
        predictions: impl IntoIterator<Item = &'a Prediction>,
    ) -> usize {
        let mut drawn = 0;

        for prediction in predictions {
            let Some(spatial) = prediction.spatial else {
                continue;
            };
            let corners = spatial.to_corners();
            if corners.is_degenerate() {
                continue;
            }

            // Keep the rectangle walk bounded by the canvas, not by remote coordinates
            let margin = i64::from(self.style.thickness);
            let visible = corners.clamp_to(image.width(), image.height(), margin);
            if visible.is_degenerate() {
                continue;
            }

            let (x1, y1) = (clamp_i32(visible.x1), clamp_i32(visible.y1));
            let (width, height) = (visible.width(), visible.height());

            for t in 0..self.style.thickness as i64 {
                let (w, h) = (width - 2 * t, height - 2 * t);
                if w <= 0 || h <= 0 {
                    break;
                }
                let rect = Rect::at(x1 + t as i32, y1 + t as i32).of_size(w as u32 + 1, h as u32 + 1);
                draw_hollow_rect_mut(image, rect, self.style.color);
            }

            if let Some(font) = &self.font {
                let text_y = (y1 - self.style.label_offset - self.style.font_size as i32).max(0);
                draw_text_mut(
                    image,
                    self.style.color,
                    x1.max(0),
                    text_y,
                    PxScale::from(self.style.font_size),
                    font,
                    &prediction.display_label(),
                );
            }

            drawn += 1;
        }

        drawn
    }
}

/// File extension matching the encoded image, JPEG when unrecognized.
pub fn extension_for_bytes(image: &[u8]) -> &'static str {
    image::guess_format(image)
        .map(extension_for)
        .unwrap_or(FALLBACK_EXTENSION)
}

/// Extension of an upload in one of the formats this crate can re-encode.
///
/// `None` for anything else, including bytes that are not an image at all.
pub fn supported_extension(image: &[u8]) -> Option<&'static str> {
    image::guess_format(image)
        .ok()
        .filter(|format| is_writable(*format))
        .map(extension_for)
}

/// MIME type for a file extension produced by [`Annotator::annotate`].
pub fn content_type_for_extension(extension: &str) -> &'static str {
    ImageFormat::from_extension(extension)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

fn is_writable(format: ImageFormat) -> bool {
    matches!(
        format,
        ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Bmp | ImageFormat::WebP
    )
}

fn extension_for(format: ImageFormat) -> &'static str {
    format
        .extensions_str()
        .first()
        .copied()
        .unwrap_or(FALLBACK_EXTENSION)
}

fn clamp_i32(value: i64) -> i32 {
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageBuffer;
    use leafscan_models::CenterBox;
    use serde_json::json;

    const BACKGROUND: Rgb<u8> = Rgb([10, 20, 30]);

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img: RgbImage = ImageBuffer::from_pixel(width, height, BACKGROUND);
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn detection_result() -> InferenceResult {
        InferenceResult::from_value(json!({
            "predictions": [
                {"x": 100, "y": 100, "width": 40, "height": 20, "class": "blight", "confidence": 0.8734}
            ]
        }))
    }

    #[test]
    fn test_classification_only_returns_input_bytes() {
        let input = png_bytes(64, 48);
        let result = InferenceResult::from_value(json!({
            "predictions": [{"class": "healthy", "confidence": 0.99}],
            "top": "healthy",
            "confidence": 0.99
        }));

        let annotated = Annotator::default().annotate(&input, &result).unwrap();
        assert_eq!(annotated.bytes, input);
        assert_eq!(annotated.extension, "png");
        assert!(!annotated.is_modified());
    }

    #[test]
    fn test_unknown_bytes_without_detections_pass_through() {
        let input = b"not an image".to_vec();
        let result = InferenceResult::from_value(json!({"predictions": []}));

        let annotated = Annotator::default().annotate(&input, &result).unwrap();
        assert_eq!(annotated.bytes, input);
        assert_eq!(annotated.extension, "jpg");
    }

    #[test]
    fn test_detection_draws_box_at_computed_corners() {
        let input = png_bytes(200, 200);

        let annotated = Annotator::default()
            .annotate(&input, &detection_result())
            .unwrap();
        assert_eq!(annotated.boxes_drawn, 1);
        assert_eq!(annotated.extension, "png");

        let output = image::load_from_memory(&annotated.bytes).unwrap().to_rgb8();
        let green = Rgb([0, 255, 0]);
        assert_eq!(*output.get_pixel(80, 90), green);
        assert_eq!(*output.get_pixel(120, 110), green);
        assert_eq!(*output.get_pixel(100, 90), green);
        assert_eq!(*output.get_pixel(81, 91), green);
        assert_eq!(*output.get_pixel(100, 100), BACKGROUND);
        assert_eq!(*output.get_pixel(5, 5), BACKGROUND);
    }

    #[test]
    fn test_unknown_bytes_with_detections_fail() {
        let err = Annotator::default()
            .annotate(b"garbage", &detection_result())
            .unwrap_err();
        assert!(matches!(err, MediaError::UnknownFormat));
    }

    #[test]
    fn test_extension_for_bytes() {
        assert_eq!(extension_for_bytes(&png_bytes(4, 4)), "png");
        assert_eq!(extension_for_bytes(b"plain text"), "jpg");
    }

    #[test]
    fn test_supported_extension() {
        assert_eq!(supported_extension(&png_bytes(4, 4)), Some("png"));
        assert_eq!(supported_extension(b"plain text"), None);
        assert_eq!(supported_extension(b"GIF89a\x01\x00\x01\x00"), None);
        assert_eq!(supported_extension(&[]), None);
    }

    #[test]
    fn test_content_type_for_extension() {
        assert_eq!(content_type_for_extension("jpg"), "image/jpeg");
        assert_eq!(content_type_for_extension("png"), "image/png");
        assert_eq!(content_type_for_extension("xyz"), "application/octet-stream");
    }

    #[test]
    fn test_box_partly_outside_image_is_clipped() {
        let mut canvas: RgbImage = ImageBuffer::from_pixel(50, 50, BACKGROUND);
        let prediction = Prediction::detection("spot", 0.5, CenterBox::new(45.0, 45.0, 30.0, 30.0));

        let drawn = Annotator::default().draw_detections(&mut canvas, [&prediction]);
        assert_eq!(drawn, 1);
        assert_eq!(*canvas.get_pixel(30, 30), Rgb([0, 255, 0]));
    }

    #[test]
    fn test_oversized_box_is_clipped_to_canvas() {
        let mut canvas: RgbImage = ImageBuffer::from_pixel(50, 50, BACKGROUND);
        let huge = Prediction::detection("spot", 0.5, CenterBox::new(25.0, 25.0, 2.0e8, 30.0));
        let overflowing = Prediction::detection("spot", 0.5, CenterBox::new(9.0e18, 10.0, 9.0e18, 4.0));

        let drawn = Annotator::default().draw_detections(&mut canvas, [&huge, &overflowing]);

        // The huge box keeps its side edges off-canvas; the other lies entirely outside
        assert_eq!(drawn, 1);
        assert_eq!(*canvas.get_pixel(0, 10), Rgb([0, 255, 0]));
        assert_eq!(*canvas.get_pixel(49, 40), Rgb([0, 255, 0]));
        assert_eq!(*canvas.get_pixel(0, 25), BACKGROUND);
        assert_eq!(*canvas.get_pixel(49, 25), BACKGROUND);
    }

    #[test]
    fn test_degenerate_and_classification_records_skipped() {
        let mut canvas: RgbImage = ImageBuffer::from_pixel(50, 50, BACKGROUND);
        let flat = Prediction::detection("spot", 0.5, CenterBox::new(10.0, 10.0, 0.0, 10.0));
        let label_only = Prediction::classification("healthy", 0.9);

        let drawn = Annotator::default().draw_detections(&mut canvas, [&flat, &label_only]);
        assert_eq!(drawn, 0);
        assert!(canvas.pixels().all(|p| *p == BACKGROUND));
    }
}
